//! Checkout wizard steps.

use core::fmt;

use serde::{Deserialize, Serialize};

/// A step of the checkout wizard.
///
/// `Details` is terminal: it is only entered after the order was placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckoutStep {
    /// Shipping address and delivery method.
    #[default]
    Shipping,
    /// Billing address and payment method.
    Billing,
    /// Order placed, confirmation shown.
    Details,
}

/// The input is not a known checkout URL segment.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown checkout step: {0}")]
pub struct ParseStepError(pub String);

impl CheckoutStep {
    /// All steps in wizard order.
    pub const ALL: [Self; 3] = [Self::Shipping, Self::Billing, Self::Details];

    /// URL path segment used for the step.
    #[must_use]
    pub const fn url_segment(self) -> &'static str {
        match self {
            Self::Shipping => "shipping",
            Self::Billing => "billing",
            Self::Details => "success",
        }
    }

    /// Look up a step by its URL segment.
    ///
    /// # Errors
    ///
    /// Returns [`ParseStepError`] for anything but `shipping`, `billing`
    /// and `success`.
    pub fn from_url_segment(segment: &str) -> Result<Self, ParseStepError> {
        Self::ALL
            .into_iter()
            .find(|step| step.url_segment() == segment)
            .ok_or_else(|| ParseStepError(segment.to_string()))
    }

    /// Whether no transition leaves this step.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Details)
    }
}

impl fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shipping => write!(f, "SHIPPING"),
            Self::Billing => write!(f, "BILLING"),
            Self::Details => write!(f, "DETAILS"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_url_segments_round_trip() {
        for step in CheckoutStep::ALL {
            assert_eq!(
                CheckoutStep::from_url_segment(step.url_segment()).unwrap(),
                step
            );
        }
        assert!(CheckoutStep::from_url_segment("payment").is_err());
    }

    #[test]
    fn test_only_details_is_terminal() {
        assert!(CheckoutStep::Details.is_terminal());
        assert!(!CheckoutStep::Billing.is_terminal());
        assert!(!CheckoutStep::Shipping.is_terminal());
    }

    #[test]
    fn test_serde_uses_screaming_case() {
        assert_eq!(
            serde_json::to_string(&CheckoutStep::Billing).unwrap(),
            "\"BILLING\""
        );
    }
}
