//! GraphQL implementation of the commerce gateway.
//!
//! Uses `graphql_client` for type-safe operations with `reqwest` 0.13 for
//! HTTP. Email availability answers are cached using `moka` (5-minute TTL).

mod conversions;
pub mod queries;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use graphql_client::{GraphQLQuery, Response};
use moka::future::Cache;
use secrecy::{ExposeSecret, SecretString};
use tillpoint_core::{Address, Email};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::config::GatewayConfig;
use crate::gateway::types::{
    AccountCreation, AccountInput, BillingAddressInput, PaymentDetails, PaymentMethod,
    PaymentMethodInput, ShippingInformation, ShippingMethod,
};
use crate::gateway::{CommerceGateway, GatewayError, GraphQLError, GraphQLErrorLocation};

use conversions::{
    billing_address_input, convert_payment_details, convert_payment_methods,
    convert_shipping_method, create_customer_input, estimate_address, payment_method_input,
    shipping_information_input,
};
use queries::{
    CreateCustomer, EstimateShippingCosts, GetPaymentMethods, IsEmailAvailable, PlaceOrder,
    SaveAddressInformation, SaveGuestEmail, SetBillingAddress, SetPaymentMethod,
    create_customer, estimate_shipping_costs, get_payment_methods, is_email_available,
    place_order, save_address_information, save_guest_email, set_billing_address,
    set_payment_method,
};

/// Longest slice of a response body that ends up in logs or errors.
const BODY_PREVIEW_CHARS: usize = 500;

// =============================================================================
// GraphQLGateway
// =============================================================================

/// Client for the commerce backend's GraphQL endpoint.
///
/// Cheap to clone; all clones share the HTTP client, the customer token and
/// the email availability cache.
#[derive(Clone)]
pub struct GraphQLGateway {
    inner: Arc<GraphQLGatewayInner>,
}

struct GraphQLGatewayInner {
    client: reqwest::Client,
    endpoint: String,
    store_code: String,
    customer_token: RwLock<Option<SecretString>>,
    email_cache: Cache<String, bool>,
}

impl GraphQLGateway {
    /// Create a new gateway client.
    #[must_use]
    pub fn new(config: &GatewayConfig) -> Self {
        let email_cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();
        let customer_token = config
            .customer_token
            .clone()
            .filter(|_| config.has_customer_token());
        debug!(
            store_code = %config.store_code,
            signed_in = customer_token.is_some(),
            "Commerce gateway configured"
        );

        Self {
            inner: Arc::new(GraphQLGatewayInner {
                client: reqwest::Client::new(),
                endpoint: config.endpoint.to_string(),
                store_code: config.store_code.clone(),
                customer_token: RwLock::new(customer_token),
                email_cache,
            }),
        }
    }

    /// Whether requests are sent on behalf of a signed-in customer.
    pub async fn is_signed_in(&self) -> bool {
        self.inner.customer_token.read().await.is_some()
    }

    /// Execute a GraphQL operation.
    async fn execute<Q: GraphQLQuery>(
        &self,
        variables: Q::Variables,
    ) -> Result<Q::ResponseData, GatewayError>
    where
        Q::Variables: serde::Serialize,
    {
        let request_body = Q::build_query(variables);

        let mut request = self
            .inner
            .client
            .post(&self.inner.endpoint)
            .header("Store", &self.inner.store_code)
            .header("Content-Type", "application/json")
            .json(&request_body);

        if let Some(token) = self.inner.customer_token.read().await.as_ref() {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(GatewayError::RateLimited(retry_after));
        }

        // Read the body as text first for better error diagnostics
        let response_text = response.text().await?;
        let preview = || {
            response_text
                .chars()
                .take(BODY_PREVIEW_CHARS)
                .collect::<String>()
        };

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %preview(),
                "Commerce gateway returned non-success status"
            );
            return Err(GatewayError::message(format!(
                "HTTP {status}: {}",
                response_text.chars().take(200).collect::<String>()
            )));
        }

        let response: Response<Q::ResponseData> = match serde_json::from_str(&response_text) {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    body = %preview(),
                    "Failed to parse GraphQL response"
                );
                return Err(GatewayError::Parse(e));
            }
        };

        if let Some(errors) = response.errors
            && !errors.is_empty()
        {
            debug!(errors = ?errors, "GraphQL errors in response");

            return Err(GatewayError::GraphQL(
                errors
                    .into_iter()
                    .map(|e| GraphQLError {
                        message: e.message,
                        locations: e.locations.map_or_else(Vec::new, |locs| {
                            locs.into_iter()
                                .map(|l| GraphQLErrorLocation {
                                    line: i64::from(l.line),
                                    column: i64::from(l.column),
                                })
                                .collect()
                        }),
                        path: e.path.map_or_else(Vec::new, |p| {
                            p.into_iter()
                                .map(|fragment| match fragment {
                                    graphql_client::PathFragment::Key(s) => {
                                        serde_json::Value::String(s)
                                    }
                                    graphql_client::PathFragment::Index(i) => {
                                        serde_json::Value::Number(i.into())
                                    }
                                })
                                .collect()
                        }),
                    })
                    .collect(),
            ));
        }

        response.data.ok_or_else(|| {
            tracing::error!(
                body = %preview(),
                "GraphQL response has no data and no errors"
            );
            GatewayError::message("No data in response")
        })
    }
}

#[async_trait]
impl CommerceGateway for GraphQLGateway {
    #[instrument(skip(self, address), fields(cart_id = %cart_id))]
    async fn estimate_shipping(
        &self,
        cart_id: &str,
        address: &Address,
    ) -> Result<Vec<ShippingMethod>, GatewayError> {
        let variables = estimate_shipping_costs::Variables {
            cart_id: cart_id.to_string(),
            address: estimate_address(address),
        };

        let data = self.execute::<EstimateShippingCosts>(variables).await?;

        data.estimate_shipping_costs
            .into_iter()
            .map(convert_shipping_method)
            .collect()
    }

    #[instrument(skip(self, information), fields(cart_id = %cart_id))]
    async fn save_address_information(
        &self,
        cart_id: &str,
        information: &ShippingInformation,
    ) -> Result<PaymentDetails, GatewayError> {
        let variables = save_address_information::Variables {
            cart_id: cart_id.to_string(),
            address_information: shipping_information_input(information),
        };

        let data = self.execute::<SaveAddressInformation>(variables).await?;

        convert_payment_details(data.save_address_information)
    }

    #[instrument(skip(self, email), fields(cart_id = %cart_id))]
    async fn save_guest_email(&self, cart_id: &str, email: &Email) -> Result<(), GatewayError> {
        let variables = save_guest_email::Variables {
            cart_id: cart_id.to_string(),
            email: email.as_str().to_string(),
        };

        let data = self.execute::<SaveGuestEmail>(variables).await?;

        if data.save_guest_email.saved {
            Ok(())
        } else {
            Err(GatewayError::UserError(
                "The email could not be saved on the cart.".to_string(),
            ))
        }
    }

    #[instrument(skip(self), fields(cart_id = %cart_id))]
    async fn get_payment_methods(&self, cart_id: &str) -> Result<Vec<PaymentMethod>, GatewayError> {
        let variables = get_payment_methods::Variables {
            cart_id: cart_id.to_string(),
        };

        let data = self.execute::<GetPaymentMethods>(variables).await?;

        Ok(convert_payment_methods(data.get_payment_methods))
    }

    #[instrument(skip(self, billing), fields(cart_id = %cart_id))]
    async fn set_billing_address(
        &self,
        cart_id: &str,
        billing: &BillingAddressInput,
    ) -> Result<(), GatewayError> {
        let variables = set_billing_address::Variables {
            input: billing_address_input(cart_id, billing),
        };

        self.execute::<SetBillingAddress>(variables).await?;
        Ok(())
    }

    #[instrument(skip(self, method), fields(cart_id = %cart_id, code = %method.code))]
    async fn set_payment_method(
        &self,
        cart_id: &str,
        method: &PaymentMethodInput,
    ) -> Result<(), GatewayError> {
        let variables = set_payment_method::Variables {
            input: payment_method_input(cart_id, method),
        };

        self.execute::<SetPaymentMethod>(variables).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(cart_id = %cart_id))]
    async fn place_order(&self, cart_id: &str) -> Result<String, GatewayError> {
        let variables = place_order::Variables {
            cart_id: cart_id.to_string(),
        };

        let data = self.execute::<PlaceOrder>(variables).await?;
        let order_id = data.place_order.order.order_id;

        if order_id.is_empty() {
            return Err(GatewayError::InvalidResponse(
                "placeOrder returned an empty order id".to_string(),
            ));
        }
        Ok(order_id)
    }

    #[instrument(skip(self, email))]
    async fn is_email_available(&self, email: &Email) -> Result<bool, GatewayError> {
        let cache_key = email.as_str().to_string();

        if let Some(available) = self.inner.email_cache.get(&cache_key).await {
            debug!("Cache hit for email availability");
            return Ok(available);
        }

        let variables = is_email_available::Variables {
            email: cache_key.clone(),
        };

        let data = self.execute::<IsEmailAvailable>(variables).await?;

        // A missing payload means the backend cannot tell; let checkout go on
        let available = data.is_email_available.is_none_or(|r| r.is_email_available);

        self.inner.email_cache.insert(cache_key, available).await;

        Ok(available)
    }

    #[instrument(skip(self, account))]
    async fn create_account(
        &self,
        account: &AccountInput,
    ) -> Result<AccountCreation, GatewayError> {
        let variables = create_customer::Variables {
            input: create_customer_input(account),
        };

        let data = self.execute::<CreateCustomer>(variables).await?;
        let result = data.create_customer;

        // The new account now owns the email
        self.inner
            .email_cache
            .insert(account.email.as_str().to_string(), false)
            .await;

        match result.status {
            create_customer::CustomerCreationStatus::CONFIRMATION_REQUIRED => {
                Ok(AccountCreation::ConfirmationRequired)
            }
            create_customer::CustomerCreationStatus::CREATED => {
                if let Some(token) = result.token {
                    *self.inner.customer_token.write().await = Some(SecretString::from(token));
                }
                debug!(customer_id = result.customer.id, "Customer account created");
                Ok(AccountCreation::SignedIn)
            }
            create_customer::CustomerCreationStatus::Other(status) => Err(
                GatewayError::InvalidResponse(format!("unknown customer status: {status}")),
            ),
        }
    }
}
