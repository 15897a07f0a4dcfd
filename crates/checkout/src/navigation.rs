//! URL navigation capability.
//!
//! The orchestrator never touches a router directly; it is handed a
//! [`Navigator`] and keeps the URL in sync with the current step through it.

use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};

use regex::Regex;
use tillpoint_core::CheckoutStep;

use crate::config::CheckoutRoutes;

/// History operations the checkout needs.
pub trait Navigator: Send + Sync {
    /// Path currently shown, e.g. `/checkout/billing`.
    fn current_path(&self) -> String;

    /// Navigate to `path`, adding a history entry.
    fn push(&self, path: &str);

    /// Navigate to `path`, replacing the current history entry.
    fn replace(&self, path: &str);

    /// Return to the previous history entry, if any.
    fn go_back(&self);
}

/// Step named by the last path segment under the checkout base path.
///
/// `/checkout/billing` and `/checkout/billing/` both yield `Billing`;
/// anything outside the base path yields `None`.
#[must_use]
pub fn step_from_path(routes: &CheckoutRoutes, path: &str) -> Option<CheckoutStep> {
    let caps = STEP_PATH.captures(path)?;
    if caps.get(1)?.as_str() != routes.base_path.trim_end_matches('/') {
        return None;
    }
    CheckoutStep::from_url_segment(caps.get(2)?.as_str()).ok()
}

/// Splits a path into the prefix before the last segment and that segment,
/// ignoring a trailing slash, query or fragment.
static STEP_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^?#]*)/([a-z]+)/?(?:[?#].*)?$").expect("Invalid regex"));

/// In-memory history stack.
///
/// Used by the CLI and tests in place of a browser router.
#[derive(Debug)]
pub struct HistoryNavigator {
    stack: Mutex<Vec<String>>,
}

impl HistoryNavigator {
    /// History with a single entry at `path`.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            stack: Mutex::new(vec![path.into()]),
        }
    }

    /// Copy of the history entries, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.entries().clone()
    }

    fn entries(&self) -> MutexGuard<'_, Vec<String>> {
        self.stack.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Navigator for HistoryNavigator {
    fn current_path(&self) -> String {
        self.entries().last().cloned().unwrap_or_default()
    }

    fn push(&self, path: &str) {
        tracing::debug!(path, "history push");
        self.entries().push(path.to_string());
    }

    fn replace(&self, path: &str) {
        tracing::debug!(path, "history replace");
        let mut entries = self.entries();
        entries.pop();
        entries.push(path.to_string());
    }

    fn go_back(&self) {
        let mut entries = self.entries();
        if entries.len() > 1 {
            entries.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_from_path() {
        let routes = CheckoutRoutes::default();
        assert_eq!(
            step_from_path(&routes, "/checkout/shipping"),
            Some(CheckoutStep::Shipping)
        );
        assert_eq!(
            step_from_path(&routes, "/checkout/billing/"),
            Some(CheckoutStep::Billing)
        );
        assert_eq!(
            step_from_path(&routes, "/checkout/success?ref=mail"),
            Some(CheckoutStep::Details)
        );
        assert_eq!(step_from_path(&routes, "/checkout"), None);
        assert_eq!(step_from_path(&routes, "/checkout/unknown"), None);
        assert_eq!(step_from_path(&routes, "/cart"), None);
        assert_eq!(step_from_path(&routes, "/other/checkout/billing"), None);
        assert_eq!(
            step_from_path(&routes, "/checkout/billing?next=/cart/edit"),
            Some(CheckoutStep::Billing)
        );
    }

    #[test]
    fn test_step_from_path_custom_base() {
        let routes = CheckoutRoutes {
            base_path: "/en/pay.now/".to_string(),
            ..CheckoutRoutes::default()
        };
        assert_eq!(
            step_from_path(&routes, "/en/pay.now/billing"),
            Some(CheckoutStep::Billing)
        );
        assert_eq!(step_from_path(&routes, "/en/payXnow/billing"), None);
    }

    #[test]
    fn test_history_push_replace_back() {
        let nav = HistoryNavigator::new("/checkout/shipping");
        nav.push("/checkout/billing");
        assert_eq!(nav.current_path(), "/checkout/billing");

        nav.replace("/checkout/success");
        assert_eq!(nav.history(), vec!["/checkout/shipping", "/checkout/success"]);

        nav.go_back();
        assert_eq!(nav.current_path(), "/checkout/shipping");

        nav.go_back();
        assert_eq!(nav.current_path(), "/checkout/shipping");
    }
}
