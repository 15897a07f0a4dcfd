//! Single entry point for the presentation layer.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tillpoint_core::Address;
use tracing::{debug, instrument};

use super::{CartSnapshot, CheckoutOrchestrator, Outcome, PaymentInformation};
use crate::error::Result;
use crate::gateway::{ShippingInformation, ShippingMethodSelection};

/// Everything the shopper (or a script) can do on the checkout page.
///
/// Deserializes from tagged maps, e.g. `{ action: change_email, email: a@b.co }`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CheckoutAction {
    EstimateShipping {
        address: Address,
    },
    /// Wait for every pending shipping estimate.
    SettleEstimates,
    SelectShippingMethod(ShippingMethodSelection),
    SaveAddressInformation(ShippingInformation),
    SavePaymentInformation(PaymentInformation),
    ChangeEmail {
        email: String,
    },
    ToggleCreateUser,
    ChangePassword {
        password: String,
    },
    ToggleDeliveryMethod,
    SelectStore {
        #[serde(default)]
        address: Option<Address>,
    },
    ToggleEmailRequired,
    GoBack,
    /// The shopper moved to `path` outside the checkout's own navigation.
    Navigate {
        path: String,
    },
    UpdateCart(CartSnapshot),
    /// Let time pass, e.g. for the email debounce.
    Pause {
        millis: u64,
    },
}

impl CheckoutAction {
    /// Short name for logs. Never includes field values.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::EstimateShipping { .. } => "estimate_shipping",
            Self::SettleEstimates => "settle_estimates",
            Self::SelectShippingMethod(_) => "select_shipping_method",
            Self::SaveAddressInformation(_) => "save_address_information",
            Self::SavePaymentInformation(_) => "save_payment_information",
            Self::ChangeEmail { .. } => "change_email",
            Self::ToggleCreateUser => "toggle_create_user",
            Self::ChangePassword { .. } => "change_password",
            Self::ToggleDeliveryMethod => "toggle_delivery_method",
            Self::SelectStore { .. } => "select_store",
            Self::ToggleEmailRequired => "toggle_email_required",
            Self::GoBack => "go_back",
            Self::Navigate { .. } => "navigate",
            Self::UpdateCart(_) => "update_cart",
            Self::Pause { .. } => "pause",
        }
    }
}

impl std::fmt::Debug for CheckoutAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutAction")
            .field("action", &self.name())
            .finish_non_exhaustive()
    }
}

impl CheckoutOrchestrator {
    /// Dispatch an action to its handler.
    ///
    /// `SettleEstimates` reports the last settled outcome, a failure if any
    /// estimate failed.
    ///
    /// # Errors
    ///
    /// Propagates the handler's boundary validation error.
    #[instrument(skip_all, fields(session_id = %self.session.id, action = action.name()))]
    pub async fn handle(&mut self, action: CheckoutAction) -> Result<Outcome> {
        debug!(step = %self.session.step, "Handling checkout action");

        match action {
            CheckoutAction::EstimateShipping { address } => {
                Ok(self.on_shipping_estimation_fields_change(address))
            }
            CheckoutAction::SettleEstimates => {
                let outcomes = self.settle_estimates().await;
                Ok(outcomes
                    .iter()
                    .find(|o| o.is_failure())
                    .or_else(|| outcomes.last())
                    .cloned()
                    .unwrap_or(Outcome::Unchanged))
            }
            CheckoutAction::SelectShippingMethod(method) => self.on_shipping_method_select(method),
            CheckoutAction::SaveAddressInformation(information) => {
                self.save_address_information(information).await
            }
            CheckoutAction::SavePaymentInformation(information) => {
                self.save_payment_information(information).await
            }
            CheckoutAction::ChangeEmail { email } => Ok(self.on_email_change(email)),
            CheckoutAction::ToggleCreateUser => Ok(self.on_create_user_change()),
            CheckoutAction::ChangePassword { password } => Ok(self.on_password_change(password)),
            CheckoutAction::ToggleDeliveryMethod => Ok(self.handle_select_delivery_method()),
            CheckoutAction::SelectStore { address } => Ok(self.on_store_select(address)),
            CheckoutAction::ToggleEmailRequired => Ok(self.on_change_email_required()),
            CheckoutAction::GoBack => Ok(self.go_back().await),
            CheckoutAction::Navigate { path } => {
                self.services.navigator.push(&path);
                Ok(self.on_location_change().await)
            }
            CheckoutAction::UpdateCart(cart) => Ok(self.on_cart_update(cart).await),
            CheckoutAction::Pause { millis } => {
                tokio::time::sleep(Duration::from_millis(millis)).await;
                Ok(Outcome::Unchanged)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_action_deserializes_from_tagged_map() {
        let action: CheckoutAction =
            serde_json::from_str(r#"{"action": "change_email", "email": "a@b.co"}"#).unwrap();
        assert_eq!(action.name(), "change_email");

        let action: CheckoutAction = serde_json::from_str(
            r#"{"action": "select_shipping_method", "carrier_code": "flatrate", "method_code": "flatrate"}"#,
        )
        .unwrap();
        assert!(matches!(action, CheckoutAction::SelectShippingMethod(_)));

        let action: CheckoutAction =
            serde_json::from_str(r#"{"action": "update_cart", "items_count": 0}"#).unwrap();
        match action {
            CheckoutAction::UpdateCart(cart) => assert!(cart.is_empty()),
            other => panic!("unexpected action {}", other.name()),
        }
    }

    #[test]
    fn test_action_debug_hides_password() {
        let action = CheckoutAction::ChangePassword {
            password: "s3cret-pass".to_string(),
        };
        let debug = format!("{action:?}");
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("change_password"));
    }
}
