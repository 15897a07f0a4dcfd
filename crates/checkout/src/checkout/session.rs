//! Checkout session state and the snapshots the storefront feeds in.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tillpoint_core::{Address, AddressId, CheckoutStep, Country, PaymentTotals};
use uuid::Uuid;

use crate::gateway::{
    PaymentMethod, PaymentMethodInput, ShippingMethod, ShippingMethodSelection,
};

/// Everything the checkout page renders from.
///
/// Created on mount, mutated only by the orchestrator and discarded on
/// unmount. The password is never serialized.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSession {
    /// Correlates log lines of one checkout
    pub id: Uuid,
    pub step: CheckoutStep,
    /// Cleared once the order is placed
    pub cart_id: Option<String>,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub selected_shipping_method: Option<ShippingMethodSelection>,
    pub shipping_methods: Vec<ShippingMethod>,
    pub payment_methods: Vec<PaymentMethod>,
    /// Address of the latest shipping estimate request
    pub estimate_address: Option<Address>,
    pub email: String,
    pub is_create_user: bool,
    #[serde(skip)]
    pub password: Option<SecretString>,
    pub is_delivery_options_loading: bool,
    /// Shipping estimates issued and not yet settled
    pub requests_sent: u32,
    pub is_loading: bool,
    pub payment_totals: Option<PaymentTotals>,
    /// Set only after a successful order placement
    pub order_id: Option<String>,
    pub is_guest_email_saved: bool,
    pub is_visible_email_required: bool,
    pub is_pick_in_store_method_selected: bool,
    pub selected_store_address: Option<Address>,
}

impl CheckoutSession {
    pub(crate) fn new(cart_id: Option<String>, email: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            step: CheckoutStep::Shipping,
            cart_id,
            shipping_address: Address::default(),
            billing_address: Address::default(),
            selected_shipping_method: None,
            shipping_methods: Vec::new(),
            payment_methods: Vec::new(),
            estimate_address: None,
            email,
            is_create_user: false,
            password: None,
            is_delivery_options_loading: false,
            requests_sent: 0,
            is_loading: false,
            payment_totals: None,
            order_id: None,
            is_guest_email_saved: false,
            is_visible_email_required: false,
            is_pick_in_store_method_selected: false,
            selected_store_address: None,
        }
    }
}

/// Cart as the storefront currently sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CartSnapshot {
    pub cart_id: Option<String>,
    pub items_count: u32,
    /// Only non-physical items, so there is nothing to ship
    pub is_virtual: bool,
    pub is_loading: bool,
    pub has_downloadable: bool,
    pub minimum_order_amount_reached: bool,
    pub minimum_order_description: Option<String>,
}

impl Default for CartSnapshot {
    fn default() -> Self {
        Self {
            cart_id: None,
            items_count: 0,
            is_virtual: false,
            is_loading: false,
            has_downloadable: false,
            minimum_order_amount_reached: true,
            minimum_order_description: None,
        }
    }
}

impl CartSnapshot {
    /// Whether the cart finished loading and holds nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !self.is_loading && self.items_count == 0
    }
}

/// The shopper's account state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerSnapshot {
    pub signed_in: bool,
    pub email: Option<String>,
    pub default_shipping_address_id: Option<AddressId>,
}

/// Inputs the checkout mounts with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckoutContext {
    pub cart: CartSnapshot,
    pub customer: CustomerSnapshot,
    /// Countries with their regions, for region code lookup
    pub countries: Vec<Country>,
    /// Order placed before a reload onto the success page
    pub placed_order_id: Option<String>,
}

/// Billing step submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInformation {
    pub billing_address: Address,
    #[serde(default)]
    pub same_as_shipping: bool,
    pub payment_method: PaymentMethodInput,
}

/// What a handler did to the checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// The step changed.
    Transitioned { from: CheckoutStep, to: CheckoutStep },
    /// The step stayed; fields may have changed.
    Unchanged,
    /// A guard sent the shopper elsewhere.
    Redirected { to: String },
    /// A gateway call failed and the shopper was notified.
    Failed { message: String },
}

impl Outcome {
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}
