//! Checkout error type with Sentry integration.
//!
//! Handlers return `Result<Outcome, CheckoutError>`. Only boundary
//! validation produces an `Err`; gateway failures are reported here and
//! surface to the shopper as a notification instead.

use thiserror::Error;
use tillpoint_core::EmailError;

use crate::cache::CacheError;
use crate::gateway::GatewayError;

/// Errors returned by checkout operations.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Commerce backend call failed.
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Local cache read or write failed.
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Handler input rejected at the boundary.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Email field did not hold a valid address.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),
}

impl CheckoutError {
    /// Shorthand for [`CheckoutError::InvalidInput`].
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

/// Result type alias for `CheckoutError`.
pub type Result<T> = std::result::Result<T, CheckoutError>;

/// Send a gateway failure to Sentry and the log.
///
/// Returns the message to show the shopper.
pub fn report_gateway_error(operation: &str, error: &GatewayError) -> String {
    let event_id = sentry::capture_error(error);
    tracing::error!(
        operation,
        error = %error,
        sentry_event_id = %event_id,
        "Gateway call failed"
    );
    error.user_message()
}

/// Add a breadcrumb for a checkout event.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of steps
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "Entered billing step", Some(&[("cart_id", "abc")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data.unwrap_or_default() {
        breadcrumb.data.insert(
            (*key).to_string(),
            serde_json::Value::String((*value).to_string()),
        );
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_error_display() {
        let err = CheckoutError::invalid("payment method code is empty");
        assert_eq!(err.to_string(), "Invalid input: payment method code is empty");

        let err = CheckoutError::from(GatewayError::UserError("Cart is locked".to_string()));
        assert_eq!(err.to_string(), "Gateway error: User error: Cart is locked");
    }

    #[test]
    fn test_report_gateway_error_returns_user_message() {
        let message = report_gateway_error(
            "place_order",
            &GatewayError::message("The requested qty is not available"),
        );
        assert_eq!(message, "The requested qty is not available");

        let message = report_gateway_error(
            "place_order",
            &GatewayError::InvalidResponse("empty".to_string()),
        );
        assert_eq!(message, crate::gateway::GENERIC_ERROR_MESSAGE);
    }
}
