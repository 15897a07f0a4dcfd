//! Billing step: billing address, payment method and order placement.

use tillpoint_core::CheckoutStep;
use tracing::{info, instrument};

use super::{CheckoutOrchestrator, Outcome, PaymentInformation};
use crate::address::billing_address_input;
use crate::error::{CheckoutError, Result};

impl CheckoutOrchestrator {
    /// Submit billing and place the order.
    ///
    /// Runs save billing address, set payment method and place order
    /// strictly in sequence. The first failure stops the chain with one
    /// error notification; calls that already succeeded are not undone, so
    /// the shopper can retry from the same state.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::InvalidInput` outside the billing step,
    /// without a cart or without a payment method code, and
    /// `CheckoutError::InvalidEmail` when a guest email does not parse.
    #[instrument(
        skip(self, information),
        fields(
            session_id = %self.session.id,
            step = %self.session.step,
            payment_method = %information.payment_method.code
        )
    )]
    pub async fn save_payment_information(
        &mut self,
        information: PaymentInformation,
    ) -> Result<Outcome> {
        if self.session.step != CheckoutStep::Billing {
            return Err(CheckoutError::invalid(format!(
                "payment information cannot be saved on the {} step",
                self.session.step
            )));
        }
        if information.payment_method.code.trim().is_empty() {
            return Err(CheckoutError::invalid("payment method code is empty"));
        }
        let cart_id = self.require_cart_id()?;

        // Virtual carts never saw a shipping form; account creation takes
        // the name from billing.
        if self.cart.is_virtual {
            self.session.shipping_address = tillpoint_core::Address {
                firstname: information.billing_address.firstname.clone(),
                lastname: information.billing_address.lastname.clone(),
                ..tillpoint_core::Address::default()
            };
        }

        self.session.is_loading = true;
        self.session.billing_address = information.billing_address.clone();

        if !self.customer.signed_in
            && let Some(outcome) = self.guard_guest().await?
        {
            return Ok(outcome);
        }

        let shipping = (!self.cart.is_virtual).then_some(&self.session.shipping_address);
        let billing = billing_address_input(
            &information.billing_address,
            shipping,
            information.same_as_shipping,
            &self.countries,
        );

        let gateway = self.services.gateway.clone();

        if let Err(e) = gateway.set_billing_address(&cart_id, &billing).await {
            return Ok(self.fail("set_billing_address", &e));
        }
        if let Err(e) = gateway
            .set_payment_method(&cart_id, &information.payment_method)
            .await
        {
            return Ok(self.fail("set_payment_method", &e));
        }
        let order_id = match gateway.place_order(&cart_id).await {
            Ok(order_id) => order_id,
            Err(e) => return Ok(self.fail("place_order", &e)),
        };

        Ok(self.set_details_step(order_id).await)
    }

    /// Enter the success step after an order was placed.
    async fn set_details_step(&mut self, order_id: String) -> Outcome {
        info!(session_id = %self.session.id, order_id = %order_id, "Order placed");

        self.session.cart_id = None;
        self.forget_cart_id().await;
        self.forget_totals().await;
        self.services.state.reset_cart();

        self.session.is_loading = false;
        self.session.payment_totals = None;
        self.session.order_id = Some(order_id);

        let success_url = self.step_url(CheckoutStep::Details);
        self.push(&success_url);
        self.transition(CheckoutStep::Details)
    }
}
