//! Initial step selection, cart and customer guards, URL tracking.

use tillpoint_core::CheckoutStep;
use tracing::{debug, instrument};

use super::{CartSnapshot, CheckoutOrchestrator, Outcome};
use crate::navigation::step_from_path;
use crate::state::Notification;

pub(crate) const EMPTY_CART_MESSAGE: &str = "Please add at least one product to cart!";
pub(crate) const DOWNLOADABLE_MESSAGE: &str =
    "Please sign in or remove downloadable products from cart!";
pub(crate) const MISSING_SHIPPING_MESSAGE: &str =
    "Please add a shipping address and a shipping method!";

impl CheckoutOrchestrator {
    /// Pick the step for the current URL, then run the guards.
    pub(super) async fn enter(&mut self, placed_order_id: Option<String>) -> Outcome {
        let url_step = step_from_path(&self.settings.routes, &self.last_path);
        let placed_order_id = placed_order_id.filter(|id| !id.is_empty());

        if url_step == Some(CheckoutStep::Details) {
            if let Some(order_id) = placed_order_id {
                self.session.order_id = Some(order_id);
                self.session.step = CheckoutStep::Details;
                self.session.is_loading = false;
                return Outcome::Unchanged;
            }
            debug!("Success page opened without a placed order");
            self.forget_totals().await;
            self.session.step = self.entry_step();
            return self.redirect_to_cart();
        }

        self.session.step = self.entry_step();
        if let Some(outcome) = self.check_guards() {
            self.session.is_loading = false;
            return outcome;
        }

        if self.cart.is_virtual {
            let billing_url = self.step_url(CheckoutStep::Billing);
            if self.last_path != billing_url {
                self.replace(&billing_url);
            }
            return self.fetch_payment_methods().await;
        }

        if url_step == Some(CheckoutStep::Billing) {
            match self.cached_totals().await {
                Some(totals) => {
                    self.session.payment_totals = Some(totals);
                    self.session.step = CheckoutStep::Billing;
                    return self.fetch_payment_methods().await;
                }
                None => {
                    debug!("No cached totals for billing, starting at shipping");
                    let shipping_url = self.step_url(CheckoutStep::Shipping);
                    self.replace(&shipping_url);
                }
            }
        }

        Outcome::Unchanged
    }

    const fn entry_step(&self) -> CheckoutStep {
        if self.cart.is_virtual {
            CheckoutStep::Billing
        } else {
            CheckoutStep::Shipping
        }
    }

    /// Cart guards, then customer guards.
    pub(super) fn check_guards(&mut self) -> Option<Outcome> {
        self.check_cart_guards()
            .or_else(|| self.check_customer_guards())
    }

    /// Empty cart or minimum order amount not reached.
    ///
    /// Outside the success step this sends the shopper to the cart once,
    /// with one notice; repeated updates of the same cart stay quiet.
    fn check_cart_guards(&mut self) -> Option<Outcome> {
        if self.session.step.is_terminal() {
            return None;
        }

        let notice = if self.cart.is_empty() {
            Some(EMPTY_CART_MESSAGE.to_string())
        } else if !self.cart.minimum_order_amount_reached {
            self.cart
                .minimum_order_description
                .clone()
                .filter(|d| !d.is_empty())
        } else {
            self.cart_notice_shown = false;
            return None;
        };

        if self.cart_notice_shown {
            return Some(Outcome::Unchanged);
        }
        self.cart_notice_shown = true;

        if let Some(message) = notice {
            self.notify(Notification::info(message));
        }
        Some(self.redirect_to_cart())
    }

    /// Guest checkout disabled, or downloadable items for a guest.
    fn check_customer_guards(&mut self) -> Option<Outcome> {
        if self.customer.signed_in {
            return None;
        }

        if !self.settings.guest_checkout_enabled {
            let to = self.settings.routes.home_url.clone();
            self.push(&to);
            return Some(Outcome::Redirected { to });
        }

        if self.cart.has_downloadable {
            self.notify(Notification::info(DOWNLOADABLE_MESSAGE));
            return Some(self.redirect_to_login());
        }

        None
    }

    /// Load payment methods for a cart entering billing without a shipping
    /// submission.
    pub(super) async fn fetch_payment_methods(&mut self) -> Outcome {
        let Some(cart_id) = self.session.cart_id.clone() else {
            self.session.is_loading = false;
            return Outcome::Unchanged;
        };

        match self.services.gateway.get_payment_methods(&cart_id).await {
            Ok(methods) => {
                self.session.payment_methods = methods;
                self.session.is_loading = false;
                Outcome::Unchanged
            }
            Err(e) => self.fail("get_payment_methods", &e),
        }
    }

    /// React to the URL having changed (back button, manual edit).
    #[instrument(skip(self), fields(session_id = %self.session.id, step = %self.session.step))]
    pub async fn on_location_change(&mut self) -> Outcome {
        let path = self.services.navigator.current_path();
        let previous = step_from_path(&self.settings.routes, &self.last_path);
        let current = step_from_path(&self.settings.routes, &path);
        self.last_path = path;

        match (previous, current) {
            (Some(CheckoutStep::Billing), Some(CheckoutStep::Shipping))
                if self.session.step == CheckoutStep::Billing =>
            {
                self.forget_totals().await;
                self.session.is_guest_email_saved = false;
                self.transition(CheckoutStep::Shipping)
            }
            (Some(CheckoutStep::Details), Some(CheckoutStep::Billing)) => {
                self.forget_totals().await;
                self.redirect_to_cart()
            }
            (_, Some(CheckoutStep::Details)) if self.session.order_id.is_none() => {
                self.forget_totals().await;
                self.redirect_to_cart()
            }
            _ => Outcome::Unchanged,
        }
    }

    /// Navigate back one history entry.
    ///
    /// Leaving billing drops the cached totals and stops the loading state.
    #[instrument(skip(self), fields(session_id = %self.session.id, step = %self.session.step))]
    pub async fn go_back(&mut self) -> Outcome {
        if self.session.step == CheckoutStep::Billing {
            self.session.is_loading = false;
            self.forget_totals().await;
        }
        self.services.navigator.go_back();
        self.on_location_change().await
    }

    /// Apply a new cart snapshot from the storefront.
    ///
    /// Runs the cart guards. When the cart just finished loading a virtual
    /// cart skips to billing, and a physical cart on billing without a
    /// chosen delivery method is sent back to shipping.
    #[instrument(skip(self, cart), fields(session_id = %self.session.id, step = %self.session.step))]
    pub async fn on_cart_update(&mut self, cart: CartSnapshot) -> Outcome {
        let finished_loading = self.cart.is_loading && !cart.is_loading;
        self.cart = cart;

        if !self.session.step.is_terminal()
            && let Some(cart_id) = self.cart.cart_id.clone().filter(|id| !id.is_empty())
            && self.session.cart_id.as_deref() != Some(cart_id.as_str())
        {
            self.remember_cart_id(&cart_id).await;
            self.session.cart_id = Some(cart_id);
        }

        if let Some(outcome) = self.check_cart_guards() {
            return outcome;
        }

        if !finished_loading {
            return Outcome::Unchanged;
        }

        match self.session.step {
            CheckoutStep::Shipping if self.cart.is_virtual => {
                let billing_url = self.step_url(CheckoutStep::Billing);
                self.replace(&billing_url);
                self.session.shipping_address = tillpoint_core::Address::default();
                self.session.is_guest_email_saved = false;
                let outcome = self.transition(CheckoutStep::Billing);
                match self.fetch_payment_methods().await {
                    failed @ Outcome::Failed { .. } => failed,
                    _ => outcome,
                }
            }
            CheckoutStep::Shipping => {
                if step_from_path(&self.settings.routes, &self.last_path).is_some() {
                    let shipping_url = self.step_url(CheckoutStep::Shipping);
                    if self.last_path != shipping_url {
                        self.replace(&shipping_url);
                    }
                }
                Outcome::Unchanged
            }
            CheckoutStep::Billing
                if !self.cart.is_virtual
                    && self.session.selected_shipping_method.is_none()
                    && self.session.payment_totals.is_none() =>
            {
                self.notify(Notification::info(MISSING_SHIPPING_MESSAGE));
                let shipping_url = self.step_url(CheckoutStep::Shipping);
                self.replace(&shipping_url);
                self.transition(CheckoutStep::Shipping)
            }
            _ => Outcome::Unchanged,
        }
    }
}
