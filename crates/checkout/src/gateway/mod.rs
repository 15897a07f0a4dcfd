//! Remote commerce gateway.
//!
//! # Architecture
//!
//! - [`CommerceGateway`] is the async RPC boundary the checkout talks to.
//!   The orchestrator only ever sees this trait, so tests swap in fakes.
//! - [`GraphQLGateway`] is the production implementation: `graphql_client`
//!   generated queries sent over `reqwest`.
//! - Email availability answers are cached in memory via `moka` (5 minute
//!   TTL); everything else mutates the cart and is never cached.
//!
//! # Example
//!
//! ```rust,ignore
//! use tillpoint_checkout::gateway::{CommerceGateway, GraphQLGateway};
//!
//! let gateway = GraphQLGateway::new(&config.gateway);
//! let methods = gateway.estimate_shipping("cart-123", &address).await?;
//! ```

mod graphql;
pub mod types;

pub use graphql::GraphQLGateway;
pub use types::*;

use async_trait::async_trait;
use thiserror::Error;
use tillpoint_core::{Address, Email};

/// Message shown to the shopper when a failure carries nothing usable.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong!";

/// Operations the checkout issues against the commerce backend.
///
/// Every call is request/response. Implementations must be cheap to share
/// (`Arc<dyn CommerceGateway>`) because shipping estimates run as spawned
/// tasks.
#[async_trait]
pub trait CommerceGateway: Send + Sync {
    /// Price the available delivery methods for an address.
    async fn estimate_shipping(
        &self,
        cart_id: &str,
        address: &Address,
    ) -> Result<Vec<ShippingMethod>, GatewayError>;

    /// Save shipping (and optionally billing) address with the chosen
    /// delivery method. Returns payment methods and totals.
    async fn save_address_information(
        &self,
        cart_id: &str,
        information: &ShippingInformation,
    ) -> Result<PaymentDetails, GatewayError>;

    /// Attach a guest email to the cart.
    async fn save_guest_email(&self, cart_id: &str, email: &Email) -> Result<(), GatewayError>;

    /// Payment methods for a cart that skips the shipping step.
    async fn get_payment_methods(&self, cart_id: &str) -> Result<Vec<PaymentMethod>, GatewayError>;

    /// Set the billing address on the cart.
    async fn set_billing_address(
        &self,
        cart_id: &str,
        billing: &BillingAddressInput,
    ) -> Result<(), GatewayError>;

    /// Set the payment method on the cart.
    async fn set_payment_method(
        &self,
        cart_id: &str,
        method: &PaymentMethodInput,
    ) -> Result<(), GatewayError>;

    /// Place the order. Returns the order number.
    async fn place_order(&self, cart_id: &str) -> Result<String, GatewayError>;

    /// Whether no customer account uses this email yet.
    async fn is_email_available(&self, email: &Email) -> Result<bool, GatewayError>;

    /// Register a customer account.
    async fn create_account(&self, account: &AccountInput)
    -> Result<AccountCreation, GatewayError>;
}

/// Errors that can occur when talking to the commerce backend.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// GraphQL query returned errors.
    #[error("GraphQL errors: {}", format_graphql_errors(.0))]
    GraphQL(Vec<GraphQLError>),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Response was well-formed but carried a value we cannot use.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Business error from a mutation (e.g., invalid input).
    #[error("User error: {0}")]
    UserError(String),
}

impl GatewayError {
    /// Message to show the shopper.
    ///
    /// Backend-provided messages are passed through; transport failures
    /// collapse to [`GENERIC_ERROR_MESSAGE`].
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::GraphQL(errors) => errors
                .iter()
                .map(|e| e.message.trim())
                .find(|m| !m.is_empty())
                .map_or_else(|| GENERIC_ERROR_MESSAGE.to_string(), str::to_string),
            Self::UserError(message) if !message.trim().is_empty() => message.clone(),
            Self::RateLimited(seconds) => {
                format!("Too many requests, please try again in {seconds} seconds.")
            }
            _ => GENERIC_ERROR_MESSAGE.to_string(),
        }
    }

    /// Shorthand for a single-message GraphQL error.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::GraphQL(vec![GraphQLError {
            message: message.into(),
            locations: vec![],
            path: vec![],
        }])
    }
}

/// A GraphQL error returned by the backend.
#[derive(Debug, Clone)]
pub struct GraphQLError {
    /// Error message.
    pub message: String,
    /// Source locations in the query.
    pub locations: Vec<GraphQLErrorLocation>,
    /// Path to the error in the response.
    pub path: Vec<serde_json::Value>,
}

/// Location in a GraphQL query where an error occurred.
#[derive(Debug, Clone)]
pub struct GraphQLErrorLocation {
    /// Line number (1-indexed).
    pub line: i64,
    /// Column number (1-indexed).
    pub column: i64,
}

fn format_graphql_errors(errors: &[GraphQLError]) -> String {
    if errors.is_empty() {
        return "(no error details provided)".to_string();
    }

    errors
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let mut parts = Vec::new();

            if !e.message.is_empty() {
                parts.push(e.message.clone());
            }

            if !e.path.is_empty() {
                let path_str = e
                    .path
                    .iter()
                    .map(|p| match p {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(".");
                parts.push(format!("path: {path_str}"));
            }

            if let Some(loc) = e.locations.first() {
                parts.push(format!("at line {}:{}", loc.line, loc.column));
            }

            if parts.is_empty() {
                format!("[error {}]: (no details)", i + 1)
            } else {
                parts.join(" ")
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}
