//! Checkout configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CHECKOUT_GATEWAY_URL` - GraphQL endpoint of the commerce backend
//!
//! ## Optional
//! - `CHECKOUT_STORE_CODE` - Store view code sent with every request (default: default)
//! - `CHECKOUT_CUSTOMER_TOKEN` - Bearer token of a signed-in customer
//! - `CHECKOUT_CACHE_PATH` - File backing the local cache (default: .checkout-cache.json)
//! - `CHECKOUT_TOTALS_TTL_SECS` - Lifetime of cached payment totals (default: 2592000, 30 days)
//! - `CHECKOUT_EMAIL_DEBOUNCE_MS` - Quiet period before checking an email (default: 1000)
//! - `CHECKOUT_GUEST_ENABLED` - Allow checkout without an account (default: true)
//! - `CHECKOUT_BASE_PATH` - Path prefix of the checkout steps (default: /checkout)
//! - `CHECKOUT_CART_URL` - Cart page (default: /cart)
//! - `CHECKOUT_LOGIN_URL` - Account login page (default: /account/login)
//! - `CHECKOUT_HOME_URL` - Storefront home page (default: /)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tillpoint_core::CheckoutStep;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Default lifetime of cached payment totals (30 days).
pub const DEFAULT_TOTALS_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Default quiet period before an email availability check.
pub const DEFAULT_EMAIL_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Full configuration of a checkout process.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Commerce backend connection
    pub gateway: GatewayConfig,
    /// Step machine behaviour
    pub settings: CheckoutSettings,
    /// File backing the local cache
    pub cache_path: PathBuf,
    /// Error tracking
    pub telemetry: TelemetryConfig,
}

/// Sentry settings. Both are optional; without a DSN nothing is reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
}

impl TelemetryConfig {
    /// Read `SENTRY_DSN` and `SENTRY_ENVIRONMENT`. Empty values count as unset.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        }
    }
}

/// Commerce backend connection.
///
/// Implements `Debug` manually to redact the customer token.
#[derive(Clone)]
pub struct GatewayConfig {
    /// GraphQL endpoint
    pub endpoint: Url,
    /// Store view code
    pub store_code: String,
    /// Bearer token of a signed-in customer
    pub customer_token: Option<SecretString>,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("store_code", &self.store_code)
            .field(
                "customer_token",
                &self.customer_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Behaviour of the checkout step machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSettings {
    /// Where the checkout lives and where guards redirect to
    pub routes: CheckoutRoutes,
    /// Lifetime of cached payment totals
    pub totals_ttl: Duration,
    /// Quiet period before an email availability check
    pub email_debounce: Duration,
    /// Whether shoppers may check out without an account
    pub guest_checkout_enabled: bool,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            routes: CheckoutRoutes::default(),
            totals_ttl: DEFAULT_TOTALS_TTL,
            email_debounce: DEFAULT_EMAIL_DEBOUNCE,
            guest_checkout_enabled: true,
        }
    }
}

/// URLs the checkout navigates between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRoutes {
    /// Prefix of the step URLs, without trailing slash
    pub base_path: String,
    /// Cart page
    pub cart_url: String,
    /// Account login page
    pub login_url: String,
    /// Storefront home page
    pub home_url: String,
}

impl Default for CheckoutRoutes {
    fn default() -> Self {
        Self {
            base_path: "/checkout".to_string(),
            cart_url: "/cart".to_string(),
            login_url: "/account/login".to_string(),
            home_url: "/".to_string(),
        }
    }
}

impl CheckoutRoutes {
    /// URL of a checkout step, e.g. `/checkout/billing`.
    #[must_use]
    pub fn step_url(&self, step: CheckoutStep) -> String {
        format!(
            "{}/{}",
            self.base_path.trim_end_matches('/'),
            step.url_segment()
        )
    }
}

impl CheckoutConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid,
    /// or if the customer token looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let gateway = GatewayConfig::from_env()?;
        let settings = CheckoutSettings::from_env()?;
        let cache_path = cache_path_from_env();

        Ok(Self {
            gateway,
            settings,
            cache_path,
            telemetry: TelemetryConfig::from_env(),
        })
    }
}

/// Location of the file-backed checkout cache.
///
/// Reads `CHECKOUT_CACHE_PATH`, defaulting to `.checkout-cache.json`.
#[must_use]
pub fn cache_path_from_env() -> PathBuf {
    PathBuf::from(get_env_or_default(
        "CHECKOUT_CACHE_PATH",
        ".checkout-cache.json",
    ))
}

impl GatewayConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let endpoint = Url::parse(&get_required_env("CHECKOUT_GATEWAY_URL")?).map_err(|e| {
            ConfigError::InvalidEnvVar("CHECKOUT_GATEWAY_URL".to_string(), e.to_string())
        })?;
        let customer_token = get_optional_env("CHECKOUT_CUSTOMER_TOKEN")
            .map(|token| {
                validate_secret_strength(&token, "CHECKOUT_CUSTOMER_TOKEN")?;
                Ok::<_, ConfigError>(SecretString::from(token))
            })
            .transpose()?;

        Ok(Self {
            endpoint,
            store_code: get_env_or_default("CHECKOUT_STORE_CODE", "default"),
            customer_token,
        })
    }

    /// Whether a customer token is configured.
    #[must_use]
    pub fn has_customer_token(&self) -> bool {
        self.customer_token
            .as_ref()
            .is_some_and(|t| !t.expose_secret().is_empty())
    }
}

impl CheckoutSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let totals_ttl = Duration::from_secs(parse_env(
            "CHECKOUT_TOTALS_TTL_SECS",
            DEFAULT_TOTALS_TTL.as_secs(),
        )?);
        let email_debounce = Duration::from_millis(parse_env(
            "CHECKOUT_EMAIL_DEBOUNCE_MS",
            u64::try_from(DEFAULT_EMAIL_DEBOUNCE.as_millis()).unwrap_or(1000),
        )?);
        let guest_checkout_enabled = parse_env("CHECKOUT_GUEST_ENABLED", true)?;

        let defaults = CheckoutRoutes::default();
        let routes = CheckoutRoutes {
            base_path: get_env_or_default("CHECKOUT_BASE_PATH", &defaults.base_path),
            cart_url: get_env_or_default("CHECKOUT_CART_URL", &defaults.cart_url),
            login_url: get_env_or_default("CHECKOUT_LOGIN_URL", &defaults.login_url),
            home_url: get_env_or_default("CHECKOUT_HOME_URL", &defaults.home_url),
        };
        validate_path("CHECKOUT_BASE_PATH", &routes.base_path)?;
        validate_path("CHECKOUT_CART_URL", &routes.cart_url)?;
        validate_path("CHECKOUT_LOGIN_URL", &routes.login_url)?;
        validate_path("CHECKOUT_HOME_URL", &routes.home_url)?;

        Ok(Self {
            routes,
            totals_ttl,
            email_debounce,
            guest_checkout_enabled,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to a default when unset.
fn parse_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Paths are site-relative.
fn validate_path(key: &str, path: &str) -> Result<(), ConfigError> {
    if path.starts_with('/') {
        Ok(())
    } else {
        Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("must start with '/' (got {path:?})"),
        ))
    }
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Paste the token issued by the backend."
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_edges() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_shannon_entropy_counts_chars_not_bytes() {
        assert!((shannon_entropy("éééé") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("éa") - 1.0).abs() < 0.01);
        assert!((shannon_entropy("日本日本") - shannon_entropy("abab")).abs() < f64::EPSILON);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let err = validate_secret_strength("your-token-here", "TEST_VAR").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("q8Zr2xLk0vPm7TnB4wHy9cJd", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_path() {
        assert!(validate_path("X", "/cart").is_ok());
        assert!(validate_path("X", "cart").is_err());
    }

    #[test]
    fn test_step_urls() {
        let routes = CheckoutRoutes {
            base_path: "/en/checkout/".to_string(),
            ..CheckoutRoutes::default()
        };
        assert_eq!(routes.step_url(CheckoutStep::Billing), "/en/checkout/billing");
        assert_eq!(
            CheckoutRoutes::default().step_url(CheckoutStep::Details),
            "/checkout/success"
        );
    }

    #[test]
    fn test_gateway_config_debug_redacts_token() {
        let config = GatewayConfig {
            endpoint: Url::parse("https://shop.test/graphql").unwrap(),
            store_code: "default".to_string(),
            customer_token: Some(SecretString::from("tok_live_9f8e7d6c5b4a")),
        };

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("https://shop.test/graphql"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("tok_live_9f8e7d6c5b4a"));
        assert!(config.has_customer_token());
    }

    #[test]
    fn test_settings_defaults() {
        let settings = CheckoutSettings::default();
        assert_eq!(settings.totals_ttl, Duration::from_secs(2_592_000));
        assert_eq!(settings.email_debounce, Duration::from_millis(1000));
        assert!(settings.guest_checkout_enabled);
    }
}
