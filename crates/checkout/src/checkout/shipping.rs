//! Shipping step: delivery estimates, method selection, address submission.

use tillpoint_core::{Address, CheckoutStep};
use tracing::{debug, info, instrument, warn};

use super::{CheckoutOrchestrator, EstimateResult, Outcome};
use crate::error::{CheckoutError, Result};
use crate::gateway::{ShippingInformation, ShippingMethodSelection};

impl CheckoutOrchestrator {
    /// Ask the gateway for delivery options for an edited address.
    ///
    /// Does not wait for the answer: the estimate runs as a spawned task and
    /// is applied by [`Self::settle_next_estimate`]. Without a cart this is
    /// a no-op.
    #[instrument(skip(self, address), fields(session_id = %self.session.id))]
    pub fn on_shipping_estimation_fields_change(&mut self, address: Address) -> Outcome {
        let Some(cart_id) = self.session.cart_id.clone() else {
            debug!("No cart to estimate shipping for");
            return Outcome::Unchanged;
        };

        self.session.requests_sent = self.session.requests_sent.saturating_add(1);
        self.session.is_delivery_options_loading = true;

        let normalized = self.normalize(&address);
        self.session.estimate_address = Some(address);

        let gateway = self.services.gateway.clone();
        self.estimates
            .spawn(async move { gateway.estimate_shipping(&cart_id, &normalized).await });

        Outcome::Unchanged
    }

    /// Apply the next shipping estimate to finish.
    ///
    /// Estimates are applied in completion order and the resolving response
    /// replaces the method list, so a slow stale request can overwrite a
    /// newer one. Loading stays on while more than the resolving request
    /// was outstanding. Returns `None` when nothing is pending.
    #[instrument(skip(self), fields(session_id = %self.session.id))]
    pub async fn settle_next_estimate(&mut self) -> Option<Outcome> {
        let joined = self.estimates.join_next().await?;

        let outstanding = self.session.requests_sent;
        self.session.requests_sent = outstanding.saturating_sub(1);

        Some(match joined {
            Ok(result) => self.apply_estimate(result, outstanding),
            Err(e) => {
                warn!(error = %e, "Shipping estimate task did not finish");
                self.session.is_delivery_options_loading = outstanding > 1;
                Outcome::Unchanged
            }
        })
    }

    /// Settle every pending estimate. Outcomes are in completion order.
    pub async fn settle_estimates(&mut self) -> Vec<Outcome> {
        let mut outcomes = Vec::with_capacity(self.estimates.len());
        while let Some(outcome) = self.settle_next_estimate().await {
            outcomes.push(outcome);
        }
        outcomes
    }

    fn apply_estimate(&mut self, result: EstimateResult, outstanding: u32) -> Outcome {
        match result {
            Ok(methods) => {
                debug!(count = methods.len(), outstanding, "Shipping estimate settled");
                self.session.shipping_methods = methods;
                self.session.is_delivery_options_loading = outstanding > 1;
                Outcome::Unchanged
            }
            Err(e) => self.fail("estimate_shipping", &e),
        }
    }

    /// Remember the delivery method the shopper picked.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::InvalidInput` for empty carrier or method codes.
    pub fn on_shipping_method_select(
        &mut self,
        method: ShippingMethodSelection,
    ) -> Result<Outcome> {
        validate_selection(&method)?;
        self.session.selected_shipping_method = Some(method);
        Ok(Outcome::Unchanged)
    }

    /// Flip between home delivery and pick up in store.
    pub fn handle_select_delivery_method(&mut self) -> Outcome {
        self.session.is_pick_in_store_method_selected =
            !self.session.is_pick_in_store_method_selected;
        Outcome::Unchanged
    }

    /// Remember the pickup store address, or clear it.
    pub fn on_store_select(&mut self, address: Option<Address>) -> Outcome {
        self.session.selected_store_address = address;
        Outcome::Unchanged
    }

    /// Submit the shipping address and delivery method.
    ///
    /// Guests first get an account created (when requested) or their email
    /// saved on the cart. On success the totals are cached, the payment
    /// methods stored and the checkout moves to billing.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::InvalidInput` outside the shipping step,
    /// without a cart or with an incomplete delivery method, and
    /// `CheckoutError::InvalidEmail` when a guest email does not parse.
    #[instrument(
        skip(self, information),
        fields(session_id = %self.session.id, step = %self.session.step)
    )]
    pub async fn save_address_information(
        &mut self,
        information: ShippingInformation,
    ) -> Result<Outcome> {
        if self.session.step != CheckoutStep::Shipping {
            return Err(CheckoutError::invalid(format!(
                "shipping information cannot be saved on the {} step",
                self.session.step
            )));
        }
        validate_selection(&information.shipping_method)?;
        let cart_id = self.require_cart_id()?;

        self.session.is_loading = true;
        self.session.shipping_address = information.shipping_address.clone();
        self.session.selected_shipping_method = Some(information.shipping_method.clone());

        if !self.customer.signed_in
            && let Some(outcome) = self.guard_guest().await?
        {
            return Ok(outcome);
        }

        let shipping_address = self.delivery_address(&information);
        let payload = ShippingInformation {
            shipping_address: self.normalize(&shipping_address),
            billing_address: information
                .billing_address
                .as_ref()
                .map(|billing| self.normalize(billing)),
            shipping_method: information.shipping_method,
        };

        let details = match self
            .services
            .gateway
            .save_address_information(&cart_id, &payload)
            .await
        {
            Ok(details) => details,
            Err(e) => return Ok(self.fail("save_address_information", &e)),
        };

        info!(grand_total = %details.totals.grand_total(), "Shipping information saved");
        self.cache_totals(&details.totals).await;
        self.session.payment_methods = details.payment_methods;
        self.session.payment_totals = Some(details.totals);
        self.session.is_loading = false;

        let billing_url = self.step_url(CheckoutStep::Billing);
        self.push(&billing_url);
        Ok(self.transition(CheckoutStep::Billing))
    }

    /// Address the order ships to.
    ///
    /// With the pickup carrier chosen in pick-in-store mode the goods go to
    /// the selected store; the shopper's contact details stay on it.
    fn delivery_address(&self, information: &ShippingInformation) -> Address {
        let contact = &information.shipping_address;
        match &self.session.selected_store_address {
            Some(store)
                if self.session.is_pick_in_store_method_selected
                    && information.shipping_method.is_pickup_in_store() =>
            {
                Address {
                    id: None,
                    firstname: contact.firstname.clone(),
                    lastname: contact.lastname.clone(),
                    telephone: contact.telephone.clone(),
                    ..store.clone()
                }
            }
            _ => contact.clone(),
        }
    }
}

fn validate_selection(method: &ShippingMethodSelection) -> Result<()> {
    if method.carrier_code.trim().is_empty() || method.method_code.trim().is_empty() {
        return Err(CheckoutError::invalid(
            "shipping method needs a carrier code and a method code",
        ));
    }
    Ok(())
}
