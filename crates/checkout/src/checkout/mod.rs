//! Checkout step machine.
//!
//! # Architecture
//!
//! [`CheckoutOrchestrator`] owns one [`CheckoutSession`] and is driven by
//! one task through `&mut self` handlers. Everything outside the session
//! is injected through [`Services`]:
//!
//! - the commerce gateway for every remote call
//! - the local cache for payment totals and the cart id
//! - the navigator to keep the URL in step with the state machine
//! - the shared state sink for notifications and cart resets
//!
//! Steps move `SHIPPING -> BILLING -> DETAILS`; a virtual cart starts at
//! `BILLING`. Gateway failures never change the step: loading is cleared
//! and the shopper gets one error notification.
//!
//! Shipping estimates are the only concurrent work. Each address edit
//! spawns an estimate into a [`JoinSet`]; [`CheckoutOrchestrator::settle_estimates`]
//! applies them in completion order.
//!
//! # Example
//!
//! ```rust,ignore
//! let (mut checkout, _) = CheckoutOrchestrator::mount(services, settings, context).await;
//! checkout.handle(CheckoutAction::ChangeEmail { email }).await?;
//! let outcome = checkout.save_address_information(information).await?;
//! ```

mod account;
mod action;
mod billing;
mod guards;
mod session;
mod shipping;

pub use action::CheckoutAction;
pub use session::{
    CartSnapshot, CheckoutContext, CheckoutSession, CustomerSnapshot, Outcome, PaymentInformation,
};

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tillpoint_core::{Address, CheckoutStep, Country, PaymentTotals};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{info, instrument, warn};

use crate::cache::{LocalCache, keys};
use crate::config::CheckoutSettings;
use crate::error::{add_breadcrumb, report_gateway_error};
use crate::gateway::{CommerceGateway, GatewayError, ShippingMethod};
use crate::navigation::Navigator;
use crate::state::{Notification, SharedState};

/// Services the checkout is wired to.
#[derive(Clone)]
pub struct Services {
    pub gateway: Arc<dyn CommerceGateway>,
    pub cache: Arc<dyn LocalCache>,
    pub navigator: Arc<dyn Navigator>,
    pub state: Arc<dyn SharedState>,
}

type EstimateResult = Result<Vec<ShippingMethod>, GatewayError>;

/// Drives one checkout from mount to unmount.
pub struct CheckoutOrchestrator {
    services: Services,
    settings: CheckoutSettings,
    session: CheckoutSession,
    cart: CartSnapshot,
    customer: CustomerSnapshot,
    countries: Vec<Country>,
    estimates: JoinSet<EstimateResult>,
    email_check: Option<JoinHandle<()>>,
    email_available: Arc<AtomicBool>,
    /// Path last seen or set, to detect back/forward moves
    last_path: String,
    cart_notice_shown: bool,
}

impl CheckoutOrchestrator {
    /// Create the session and pick the initial step.
    ///
    /// Hides breadcrumbs, restores cached payment totals, applies the cart
    /// and customer guards and starts an email availability check for a
    /// prefilled email. The returned outcome is a redirect when a guard
    /// fired, a failure when prefetching payment methods failed, and
    /// `Unchanged` otherwise.
    #[instrument(skip_all, fields(cart_id = ?context.cart.cart_id))]
    pub async fn mount(
        services: Services,
        settings: CheckoutSettings,
        context: CheckoutContext,
    ) -> (Self, Outcome) {
        services.state.set_breadcrumbs_enabled(false);

        let cart_id = match context.cart.cart_id.clone().filter(|id| !id.is_empty()) {
            Some(id) => Some(id),
            None => read_cached::<String>(services.cache.as_ref(), keys::CART_ID).await,
        };
        let email = context.customer.email.clone().unwrap_or_default();
        let last_path = services.navigator.current_path();

        let mut session = CheckoutSession::new(cart_id, email);
        session.is_loading = context.cart.is_virtual;
        session.shipping_address.id = context
            .customer
            .default_shipping_address_id
            .filter(|_| context.customer.signed_in);

        let mut checkout = Self {
            services,
            settings,
            session,
            cart: context.cart,
            customer: context.customer,
            countries: context.countries,
            estimates: JoinSet::new(),
            email_check: None,
            email_available: Arc::new(AtomicBool::new(true)),
            last_path,
            cart_notice_shown: false,
        };

        if let Some(cart_id) = checkout.session.cart_id.clone() {
            checkout.remember_cart_id(&cart_id).await;
        }

        info!(
            session_id = %checkout.session.id,
            is_virtual = checkout.cart.is_virtual,
            signed_in = checkout.customer.signed_in,
            "Checkout mounted"
        );

        let outcome = checkout.enter(context.placed_order_id).await;

        if !checkout.session.email.is_empty() {
            let email = checkout.session.email.clone();
            checkout.schedule_email_check(email);
        }

        (checkout, outcome)
    }

    /// Read access for the presentation layer.
    #[must_use]
    pub const fn session(&self) -> &CheckoutSession {
        &self.session
    }

    #[must_use]
    pub const fn step(&self) -> CheckoutStep {
        self.session.step
    }

    #[must_use]
    pub const fn cart(&self) -> &CartSnapshot {
        &self.cart
    }

    #[must_use]
    pub const fn customer(&self) -> &CustomerSnapshot {
        &self.customer
    }

    #[must_use]
    pub const fn settings(&self) -> &CheckoutSettings {
        &self.settings
    }

    /// Shipping estimates spawned and not yet settled.
    #[must_use]
    pub fn pending_estimates(&self) -> usize {
        self.estimates.len()
    }

    /// Tear the checkout down.
    ///
    /// Cancels the pending email check, shows breadcrumbs again and clears
    /// the selected pickup store. Returns the final session.
    #[instrument(skip(self), fields(session_id = %self.session.id))]
    pub fn unmount(mut self) -> CheckoutSession {
        if let Some(handle) = self.email_check.take() {
            handle.abort();
        }
        self.estimates.abort_all();
        self.services.state.set_breadcrumbs_enabled(true);
        self.services.state.clear_pickup_store();
        info!(step = %self.session.step, "Checkout unmounted");
        self.session.clone()
    }

    // =========================================================================
    // Shared helpers
    // =========================================================================

    fn notify(&self, notification: Notification) {
        self.services.state.notify(notification);
    }

    /// Report a gateway failure: loading cleared, one error notification.
    fn fail(&mut self, operation: &str, error: &GatewayError) -> Outcome {
        let message = report_gateway_error(operation, error);
        self.session.is_loading = false;
        self.session.is_delivery_options_loading = false;
        self.notify(Notification::error(message.clone()));
        Outcome::Failed { message }
    }

    fn transition(&mut self, to: CheckoutStep) -> Outcome {
        let from = self.session.step;
        self.session.step = to;

        let session_id = self.session.id.to_string();
        add_breadcrumb(
            "checkout",
            &format!("{from} -> {to}"),
            Some(&[("session_id", session_id.as_str())]),
        );
        info!(session_id = %self.session.id, %from, %to, "Checkout step changed");

        Outcome::Transitioned { from, to }
    }

    fn push(&mut self, path: &str) {
        self.services.navigator.push(path);
        self.last_path = path.to_string();
    }

    fn replace(&mut self, path: &str) {
        self.services.navigator.replace(path);
        self.last_path = path.to_string();
    }

    fn step_url(&self, step: CheckoutStep) -> String {
        self.settings.routes.step_url(step)
    }

    fn redirect_to_cart(&mut self) -> Outcome {
        let to = self.settings.routes.cart_url.clone();
        self.push(&to);
        Outcome::Redirected { to }
    }

    fn redirect_to_login(&mut self) -> Outcome {
        let to = self.settings.routes.login_url.clone();
        self.replace(&to);
        Outcome::Redirected { to }
    }

    fn normalize(&self, address: &Address) -> Address {
        crate::address::normalize_address(address, &self.countries)
    }

    fn require_cart_id(&self) -> crate::error::Result<String> {
        self.session
            .cart_id
            .clone()
            .ok_or_else(|| crate::error::CheckoutError::invalid("checkout has no active cart"))
    }

    // =========================================================================
    // Cache
    // =========================================================================

    async fn cache_totals(&self, totals: &PaymentTotals) {
        write_cached(
            self.services.cache.as_ref(),
            keys::PAYMENT_TOTALS,
            totals,
            self.settings.totals_ttl,
        )
        .await;
    }

    async fn cached_totals(&self) -> Option<PaymentTotals> {
        read_cached(self.services.cache.as_ref(), keys::PAYMENT_TOTALS).await
    }

    async fn forget_totals(&self) {
        delete_cached(self.services.cache.as_ref(), keys::PAYMENT_TOTALS).await;
    }

    async fn remember_cart_id(&self, cart_id: &str) {
        write_cached(
            self.services.cache.as_ref(),
            keys::CART_ID,
            &cart_id,
            self.settings.totals_ttl,
        )
        .await;
    }

    async fn forget_cart_id(&self) {
        delete_cached(self.services.cache.as_ref(), keys::CART_ID).await;
    }
}

impl Drop for CheckoutOrchestrator {
    fn drop(&mut self) {
        if let Some(handle) = self.email_check.take() {
            handle.abort();
        }
    }
}

// Cache failures are logged and read as misses; they never block a step.

async fn read_cached<T: DeserializeOwned>(cache: &dyn LocalCache, key: &str) -> Option<T> {
    match cache.get(key).await {
        Ok(Some(value)) => match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(key, error = %e, "Discarding unreadable cache entry");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!(key, error = %e, "Cache read failed");
            None
        }
    }
}

async fn write_cached<T: Serialize + ?Sized>(
    cache: &dyn LocalCache,
    key: &str,
    value: &T,
    ttl: std::time::Duration,
) {
    let value = match serde_json::to_value(value) {
        Ok(value) => value,
        Err(e) => {
            warn!(key, error = %e, "Cache value not serializable");
            return;
        }
    };
    if let Err(e) = cache.set(key, value, ttl).await {
        warn!(key, error = %e, "Cache write failed");
    }
}

async fn delete_cached(cache: &dyn LocalCache, key: &str) {
    if let Err(e) = cache.delete(key).await {
        warn!(key, error = %e, "Cache delete failed");
    }
}
