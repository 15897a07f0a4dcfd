//! Local checkout cache commands.
//!
//! # Environment Variables
//!
//! - `CHECKOUT_CACHE_PATH` - cache file (default `.checkout-cache.json`)

use tillpoint_checkout::cache::{FileCache, LocalCache};
use tillpoint_checkout::config::cache_path_from_env;
use tracing::info;

use super::print_json;

/// Print every live entry with its expiry.
///
/// # Errors
///
/// Returns an error if the cache file cannot be read or parsed.
pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let cache = FileCache::new(cache_path_from_env());
    let entries = cache.entries().await?;

    info!(path = %cache.path().display(), count = entries.len(), "Loaded cache");
    print_json(&entries)
}

/// Remove `key`, or the whole cache when no key is given.
///
/// # Errors
///
/// Returns an error if the cache file cannot be rewritten or removed.
pub async fn clear(key: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let cache = FileCache::new(cache_path_from_env());

    match key {
        Some(key) => {
            cache.delete(key).await?;
            info!(key, "Cache key removed");
        }
        None => {
            cache.clear().await?;
            info!(path = %cache.path().display(), "Cache cleared");
        }
    }
    Ok(())
}
