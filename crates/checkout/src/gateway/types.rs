//! Request and response types exchanged with the commerce gateway.
//!
//! These are plain Rust types, decoupled from the generated GraphQL
//! structs so fakes and the orchestrator never depend on codegen.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tillpoint_core::{Address, AddressId, Email, PaymentTotals};

/// Carrier code the backend uses for "pick up in store".
pub const PICKUP_CARRIER_CODE: &str = "instore";

/// A priced delivery option for the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingMethod {
    pub carrier_code: String,
    pub method_code: String,
    #[serde(default)]
    pub carrier_title: Option<String>,
    #[serde(default)]
    pub method_title: Option<String>,
    pub amount: Decimal,
    #[serde(default = "default_available")]
    pub available: bool,
    #[serde(default)]
    pub error_message: Option<String>,
}

const fn default_available() -> bool {
    true
}

/// The delivery method the shopper picked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShippingMethodSelection {
    pub carrier_code: String,
    pub method_code: String,
}

impl ShippingMethodSelection {
    /// Whether the selection is the in-store pickup carrier.
    #[must_use]
    pub fn is_pickup_in_store(&self) -> bool {
        self.carrier_code == PICKUP_CARRIER_CODE
    }
}

/// A payment method offered for the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub code: String,
    pub title: String,
}

/// Result of saving the shipping information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub payment_methods: Vec<PaymentMethod>,
    pub totals: PaymentTotals,
}

/// Normalized addresses plus the delivery method, ready for submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingInformation {
    pub shipping_address: Address,
    pub billing_address: Option<Address>,
    pub shipping_method: ShippingMethodSelection,
}

/// Billing address payload.
///
/// When billing is the same as a saved shipping address only the address
/// book id travels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BillingAddressInput {
    Saved {
        customer_address_id: AddressId,
        same_as_shipping: bool,
    },
    New {
        address: Address,
        same_as_shipping: bool,
    },
}

/// Payment method selection with method-specific data (e.g. a purchase
/// order number).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PaymentMethodInput {
    pub code: String,
    #[serde(default)]
    pub additional_data: BTreeMap<String, String>,
}

/// Data needed to register a customer during checkout.
#[derive(Debug, Clone)]
pub struct AccountInput {
    pub email: Email,
    pub firstname: String,
    pub lastname: String,
    pub password: SecretString,
    pub is_subscribed: bool,
}

/// Outcome of registering a customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountCreation {
    /// Account is active and the shopper is signed in.
    SignedIn,
    /// Account exists but the shopper must confirm the email first.
    ConfirmationRequired,
}
