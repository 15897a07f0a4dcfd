//! Scenario tests for the Tillpoint checkout.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p tillpoint-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `step_machine` - initial step, transitions, URL sync, unmount
//! - `shipping_estimates` - concurrent estimates and the loading flag
//! - `guards` - cart, guest and account guards
//! - `billing` - the billing submission chain
//! - `email_debounce` - debounced availability checks (paused time)
//! - `graphql_gateway` - the HTTP gateway against a stub backend
//!
//! Everything runs in-process: the gateway is [`FakeGateway`], the cache a
//! `MemoryCache`, navigation a `HistoryNavigator` and shared state an
//! `EventLog`.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tillpoint_checkout::cache::MemoryCache;
use tillpoint_checkout::config::CheckoutSettings;
use tillpoint_checkout::gateway::{
    AccountCreation, AccountInput, BillingAddressInput, CommerceGateway, GatewayError,
    PaymentDetails, PaymentMethod, PaymentMethodInput, ShippingInformation, ShippingMethod,
    ShippingMethodSelection,
};
use tillpoint_checkout::navigation::HistoryNavigator;
use tillpoint_checkout::state::EventLog;
use tillpoint_checkout::{
    CartSnapshot, CheckoutContext, CheckoutOrchestrator, CustomerSnapshot, Outcome, Services,
};
use tillpoint_core::{Address, Country, CurrencyCode, Email, PaymentTotals, Region, RegionId};

pub const CART_ID: &str = "cart-1";
pub const ORDER_ID: &str = "000000123";

// =============================================================================
// FakeGateway
// =============================================================================

/// Gateway operations, for scripting failures and counting calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    EstimateShipping,
    SaveAddressInformation,
    SaveGuestEmail,
    GetPaymentMethods,
    SetBillingAddress,
    SetPaymentMethod,
    PlaceOrder,
    IsEmailAvailable,
    CreateAccount,
}

/// A recorded gateway call with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    EstimateShipping { cart_id: String, address: Address },
    SaveAddressInformation { cart_id: String, information: ShippingInformation },
    SaveGuestEmail { cart_id: String, email: String },
    GetPaymentMethods { cart_id: String },
    SetBillingAddress { cart_id: String, billing: BillingAddressInput },
    SetPaymentMethod { cart_id: String, method: PaymentMethodInput },
    PlaceOrder { cart_id: String },
    IsEmailAvailable { email: String },
    CreateAccount { email: String, firstname: String, lastname: String },
}

impl GatewayCall {
    #[must_use]
    pub const fn operation(&self) -> Operation {
        match self {
            Self::EstimateShipping { .. } => Operation::EstimateShipping,
            Self::SaveAddressInformation { .. } => Operation::SaveAddressInformation,
            Self::SaveGuestEmail { .. } => Operation::SaveGuestEmail,
            Self::GetPaymentMethods { .. } => Operation::GetPaymentMethods,
            Self::SetBillingAddress { .. } => Operation::SetBillingAddress,
            Self::SetPaymentMethod { .. } => Operation::SetPaymentMethod,
            Self::PlaceOrder { .. } => Operation::PlaceOrder,
            Self::IsEmailAvailable { .. } => Operation::IsEmailAvailable,
            Self::CreateAccount { .. } => Operation::CreateAccount,
        }
    }
}

/// Scripted estimate answer, keyed by postcode.
#[derive(Debug, Clone)]
struct ScriptedEstimate {
    delay: Duration,
    methods: Vec<ShippingMethod>,
}

/// In-memory [`CommerceGateway`] with scripted answers and a call log.
///
/// Every operation succeeds with canned data unless told to fail.
pub struct FakeGateway {
    calls: Mutex<Vec<GatewayCall>>,
    failures: Mutex<HashMap<Operation, String>>,
    estimates: Mutex<HashMap<String, ScriptedEstimate>>,
    taken_emails: Mutex<HashSet<String>>,
    email_available: AtomicBool,
    account_creation: Mutex<AccountCreation>,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap()
}

impl FakeGateway {
    #[must_use]
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            estimates: Mutex::new(HashMap::new()),
            taken_emails: Mutex::new(HashSet::new()),
            email_available: AtomicBool::new(true),
            account_creation: Mutex::new(AccountCreation::SignedIn),
        }
    }

    /// Make `operation` fail with a GraphQL error carrying `message`.
    #[must_use]
    pub fn failing(self, operation: Operation, message: &str) -> Self {
        lock(&self.failures).insert(operation, message.to_string());
        self
    }

    /// Answer estimates for `postcode` after `delay` with `methods`.
    #[must_use]
    pub fn with_estimate(
        self,
        postcode: &str,
        delay: Duration,
        methods: Vec<ShippingMethod>,
    ) -> Self {
        lock(&self.estimates).insert(postcode.to_string(), ScriptedEstimate { delay, methods });
        self
    }

    /// Report `email` as already registered.
    #[must_use]
    pub fn with_taken_email(self, email: &str) -> Self {
        lock(&self.taken_emails).insert(email.to_string());
        self
    }

    #[must_use]
    pub fn with_account_creation(self, creation: AccountCreation) -> Self {
        *lock(&self.account_creation) = creation;
        self
    }

    /// Every call so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<GatewayCall> {
        lock(&self.calls).clone()
    }

    /// Calls of one operation.
    #[must_use]
    pub fn calls_of(&self, operation: Operation) -> Vec<GatewayCall> {
        lock(&self.calls)
            .iter()
            .filter(|call| call.operation() == operation)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn count(&self, operation: Operation) -> usize {
        self.calls_of(operation).len()
    }

    /// Whether the last availability answer was "available".
    #[must_use]
    pub fn last_email_answer(&self) -> bool {
        self.email_available.load(Ordering::Relaxed)
    }

    fn record(&self, call: GatewayCall) -> Result<(), GatewayError> {
        let operation = call.operation();
        lock(&self.calls).push(call);
        match lock(&self.failures).get(&operation) {
            Some(message) => Err(GatewayError::message(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CommerceGateway for FakeGateway {
    async fn estimate_shipping(
        &self,
        cart_id: &str,
        address: &Address,
    ) -> Result<Vec<ShippingMethod>, GatewayError> {
        let scripted = lock(&self.estimates).get(&address.postcode).cloned();
        let result = self.record(GatewayCall::EstimateShipping {
            cart_id: cart_id.to_string(),
            address: address.clone(),
        });

        let ScriptedEstimate { delay, methods } = scripted.unwrap_or_else(|| ScriptedEstimate {
            delay: Duration::ZERO,
            methods: vec![flat_rate("5.00")],
        });
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result.map(|()| methods)
    }

    async fn save_address_information(
        &self,
        cart_id: &str,
        information: &ShippingInformation,
    ) -> Result<PaymentDetails, GatewayError> {
        self.record(GatewayCall::SaveAddressInformation {
            cart_id: cart_id.to_string(),
            information: information.clone(),
        })?;
        Ok(PaymentDetails {
            payment_methods: payment_methods(),
            totals: sample_totals(),
        })
    }

    async fn save_guest_email(&self, cart_id: &str, email: &Email) -> Result<(), GatewayError> {
        self.record(GatewayCall::SaveGuestEmail {
            cart_id: cart_id.to_string(),
            email: email.as_str().to_string(),
        })
    }

    async fn get_payment_methods(&self, cart_id: &str) -> Result<Vec<PaymentMethod>, GatewayError> {
        self.record(GatewayCall::GetPaymentMethods {
            cart_id: cart_id.to_string(),
        })?;
        Ok(payment_methods())
    }

    async fn set_billing_address(
        &self,
        cart_id: &str,
        billing: &BillingAddressInput,
    ) -> Result<(), GatewayError> {
        self.record(GatewayCall::SetBillingAddress {
            cart_id: cart_id.to_string(),
            billing: billing.clone(),
        })
    }

    async fn set_payment_method(
        &self,
        cart_id: &str,
        method: &PaymentMethodInput,
    ) -> Result<(), GatewayError> {
        self.record(GatewayCall::SetPaymentMethod {
            cart_id: cart_id.to_string(),
            method: method.clone(),
        })
    }

    async fn place_order(&self, cart_id: &str) -> Result<String, GatewayError> {
        self.record(GatewayCall::PlaceOrder {
            cart_id: cart_id.to_string(),
        })?;
        Ok(ORDER_ID.to_string())
    }

    async fn is_email_available(&self, email: &Email) -> Result<bool, GatewayError> {
        self.record(GatewayCall::IsEmailAvailable {
            email: email.as_str().to_string(),
        })?;
        let available = !lock(&self.taken_emails).contains(email.as_str());
        self.email_available.store(available, Ordering::Relaxed);
        Ok(available)
    }

    async fn create_account(
        &self,
        account: &AccountInput,
    ) -> Result<AccountCreation, GatewayError> {
        self.record(GatewayCall::CreateAccount {
            email: account.email.as_str().to_string(),
            firstname: account.firstname.clone(),
            lastname: account.lastname.clone(),
        })?;
        Ok(lock(&self.account_creation).clone())
    }
}

// =============================================================================
// Harness
// =============================================================================

/// Fakes wired together, kept around for assertions.
pub struct Harness {
    pub gateway: Arc<FakeGateway>,
    pub cache: Arc<MemoryCache>,
    pub navigator: Arc<HistoryNavigator>,
    pub state: Arc<EventLog>,
    pub settings: CheckoutSettings,
}

impl Harness {
    /// Fakes with the browser at `path`.
    #[must_use]
    pub fn new(gateway: FakeGateway, path: &str) -> Self {
        Self {
            gateway: Arc::new(gateway),
            cache: Arc::new(MemoryCache::new()),
            navigator: Arc::new(HistoryNavigator::new(path)),
            state: Arc::new(EventLog::new()),
            settings: CheckoutSettings::default(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: CheckoutSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn services(&self) -> Services {
        Services {
            gateway: self.gateway.clone(),
            cache: self.cache.clone(),
            navigator: self.navigator.clone(),
            state: self.state.clone(),
        }
    }

    pub async fn mount(&self, context: CheckoutContext) -> (CheckoutOrchestrator, Outcome) {
        CheckoutOrchestrator::mount(self.services(), self.settings.clone(), context).await
    }

    /// Current URL.
    #[must_use]
    pub fn path(&self) -> String {
        use tillpoint_checkout::navigation::Navigator;
        self.navigator.current_path()
    }
}

// =============================================================================
// Fixtures
// =============================================================================

#[must_use]
pub fn flat_rate(amount: &str) -> ShippingMethod {
    ShippingMethod {
        carrier_code: "flatrate".to_string(),
        method_code: "flatrate".to_string(),
        carrier_title: Some("Flat Rate".to_string()),
        method_title: Some("Fixed".to_string()),
        amount: Decimal::from_str(amount).unwrap(),
        available: true,
        error_message: None,
    }
}

#[must_use]
pub fn flat_rate_selection() -> ShippingMethodSelection {
    ShippingMethodSelection {
        carrier_code: "flatrate".to_string(),
        method_code: "flatrate".to_string(),
    }
}

#[must_use]
pub fn payment_methods() -> Vec<PaymentMethod> {
    vec![PaymentMethod {
        code: "checkmo".to_string(),
        title: "Check / Money order".to_string(),
    }]
}

#[must_use]
pub fn checkmo() -> PaymentMethodInput {
    PaymentMethodInput {
        code: "checkmo".to_string(),
        ..PaymentMethodInput::default()
    }
}

#[must_use]
pub fn sample_totals() -> PaymentTotals {
    PaymentTotals {
        subtotal: Decimal::from(40),
        subtotal_incl_tax: Decimal::from(40),
        discount_amount: Decimal::ZERO,
        shipping_amount: Decimal::from(5),
        shipping_incl_tax: Decimal::from(5),
        tax_amount: Decimal::ZERO,
        grand_total: Decimal::from(45),
        items_qty: 2,
        quote_currency_code: CurrencyCode::USD,
    }
}

#[must_use]
pub fn us_countries() -> Vec<Country> {
    vec![Country {
        id: "US".to_string(),
        name: Some("United States".to_string()),
        available_regions: vec![
            Region {
                id: RegionId::new(5),
                code: "CA".to_string(),
                name: "California".to_string(),
            },
            Region {
                id: RegionId::new(57),
                code: "TX".to_string(),
                name: "Texas".to_string(),
            },
        ],
    }]
}

/// A complete Californian address as typed into the form.
#[must_use]
pub fn shipping_address() -> Address {
    Address {
        firstname: "Grace".to_string(),
        lastname: "Hopper".to_string(),
        street: vec!["1 Main St".to_string()],
        city: "Los Angeles".to_string(),
        postcode: "90001".to_string(),
        telephone: "555-0101".to_string(),
        country_id: Some("US".to_string()),
        region_id: Some(RegionId::new(5)),
        ..Address::default()
    }
}

/// Address with only the fields an estimate needs.
#[must_use]
pub fn estimate_address(postcode: &str) -> Address {
    Address {
        postcode: postcode.to_string(),
        country_id: Some("US".to_string()),
        region_id: Some(RegionId::new(5)),
        ..Address::default()
    }
}

#[must_use]
pub fn shipping_information(address: Address) -> ShippingInformation {
    ShippingInformation {
        shipping_address: address,
        billing_address: None,
        shipping_method: flat_rate_selection(),
    }
}

#[must_use]
pub fn physical_cart() -> CartSnapshot {
    CartSnapshot {
        cart_id: Some(CART_ID.to_string()),
        items_count: 2,
        ..CartSnapshot::default()
    }
}

#[must_use]
pub fn virtual_cart() -> CartSnapshot {
    CartSnapshot {
        is_virtual: true,
        ..physical_cart()
    }
}

#[must_use]
pub fn guest_context(cart: CartSnapshot) -> CheckoutContext {
    CheckoutContext {
        cart,
        customer: CustomerSnapshot::default(),
        countries: us_countries(),
        placed_order_id: None,
    }
}

#[must_use]
pub fn customer_context(cart: CartSnapshot) -> CheckoutContext {
    CheckoutContext {
        customer: CustomerSnapshot {
            signed_in: true,
            email: Some("ada@example.com".to_string()),
            default_shipping_address_id: None,
        },
        ..guest_context(cart)
    }
}
