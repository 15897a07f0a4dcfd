//! HTTP gateway against a stub GraphQL backend.
//!
//! The backend is an axum router on an ephemeral local port that answers
//! by `operationName` and records every request it receives.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::{Json, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::{Value, json};
use tillpoint_checkout::cache::MemoryCache;
use tillpoint_checkout::config::{CheckoutSettings, GatewayConfig};
use tillpoint_checkout::gateway::{
    AccountCreation, AccountInput, CommerceGateway, GatewayError, GraphQLGateway,
};
use tillpoint_checkout::navigation::HistoryNavigator;
use tillpoint_checkout::state::EventLog;
use tillpoint_checkout::{CheckoutOrchestrator, Outcome, PaymentInformation, Services};
use tillpoint_core::{CheckoutStep, Email};
use tillpoint_integration_tests::{
    CART_ID, checkmo, customer_context, estimate_address, physical_cart, shipping_address,
    shipping_information,
};
use url::Url;

// =============================================================================
// Stub backend
// =============================================================================

#[derive(Clone)]
struct Reply {
    status: StatusCode,
    retry_after: Option<u64>,
    body: Value,
}

impl Reply {
    fn data(data: Value) -> Self {
        Self {
            status: StatusCode::OK,
            retry_after: None,
            body: json!({ "data": data }),
        }
    }

    fn errors(message: &str) -> Self {
        Self {
            status: StatusCode::OK,
            retry_after: None,
            body: json!({ "errors": [{ "message": message }] }),
        }
    }
}

#[derive(Debug, Clone)]
struct Received {
    operation: String,
    store: Option<String>,
    authorization: Option<String>,
    variables: Value,
}

#[derive(Default)]
struct Backend {
    replies: Mutex<HashMap<String, Reply>>,
    received: Mutex<Vec<Received>>,
}

impl Backend {
    fn reply(&self, operation: &str, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .insert(operation.to_string(), reply);
    }

    fn received(&self) -> Vec<Received> {
        self.received.lock().unwrap().clone()
    }

    fn received_for(&self, operation: &str) -> Vec<Received> {
        self.received()
            .into_iter()
            .filter(|r| r.operation == operation)
            .collect()
    }
}

fn header_value(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn graphql(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let operation = body["operationName"].as_str().unwrap_or_default().to_string();
    backend.received.lock().unwrap().push(Received {
        operation: operation.clone(),
        store: header_value(&headers, header::HeaderName::from_static("store")),
        authorization: header_value(&headers, header::AUTHORIZATION),
        variables: body["variables"].clone(),
    });

    let reply = backend
        .replies
        .lock()
        .unwrap()
        .get(&operation)
        .cloned()
        .unwrap_or_else(|| Reply::errors(&format!("no stub for {operation}")));

    let mut response = (reply.status, Json(reply.body)).into_response();
    if let Some(seconds) = reply.retry_after {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
    }
    response
}

async fn start(backend: Arc<Backend>) -> Url {
    let app = Router::new()
        .route("/graphql", post(graphql))
        .with_state(backend);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{addr}/graphql")).unwrap()
}

async fn gateway_with(backend: &Arc<Backend>, token: Option<&str>) -> GraphQLGateway {
    let endpoint = start(backend.clone()).await;
    GraphQLGateway::new(&GatewayConfig {
        endpoint,
        store_code: "default".to_string(),
        customer_token: token.map(|t| SecretString::from(t.to_string())),
    })
}

fn shipping_method_json() -> Value {
    json!([{
        "carrier_code": "flatrate",
        "method_code": "flatrate",
        "carrier_title": "Flat Rate",
        "method_title": "Fixed",
        "amount": "5.00",
        "available": true,
        "error_message": null
    }])
}

fn payment_details_json() -> Value {
    json!({
        "payment_methods": [{ "code": "checkmo", "title": "Check / Money order" }],
        "totals": {
            "subtotal": "40.00",
            "subtotal_incl_tax": "40.00",
            "discount_amount": "0.00",
            "shipping_amount": "5.00",
            "shipping_incl_tax": "5.00",
            "tax_amount": "0.00",
            "grand_total": "45.00",
            "items_qty": 2,
            "quote_currency_code": "USD"
        }
    })
}

fn account() -> AccountInput {
    AccountInput {
        email: Email::parse("ada@example.com").unwrap(),
        firstname: "Ada".to_string(),
        lastname: "Lovelace".to_string(),
        password: SecretString::from("analytical engine".to_string()),
        is_subscribed: false,
    }
}

// =============================================================================
// Requests and responses
// =============================================================================

#[tokio::test]
async fn test_estimate_shipping_parses_methods_and_sends_store_header() {
    let backend = Arc::new(Backend::default());
    backend.reply(
        "EstimateShippingCosts",
        Reply::data(json!({ "estimateShippingCosts": shipping_method_json() })),
    );
    let gateway = gateway_with(&backend, None).await;

    let methods = gateway
        .estimate_shipping(CART_ID, &estimate_address("90001"))
        .await
        .unwrap();

    assert_eq!(methods.len(), 1);
    assert_eq!(methods[0].carrier_code, "flatrate");
    assert_eq!(methods[0].amount, Decimal::new(500, 2));
    assert!(methods[0].available);

    let received = backend.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].store.as_deref(), Some("default"));
    assert_eq!(received[0].authorization, None);
    assert_eq!(received[0].variables["cartId"], json!(CART_ID));
}

#[tokio::test]
async fn test_save_address_information_parses_totals() {
    let backend = Arc::new(Backend::default());
    backend.reply(
        "SaveAddressInformation",
        Reply::data(json!({ "saveAddressInformation": payment_details_json() })),
    );
    let gateway = gateway_with(&backend, None).await;

    let details = gateway
        .save_address_information(CART_ID, &shipping_information(shipping_address()))
        .await
        .unwrap();

    assert_eq!(details.payment_methods[0].code, "checkmo");
    assert_eq!(details.totals.grand_total, Decimal::new(4500, 2));
    assert_eq!(details.totals.items_qty, 2);

    let variables = &backend.received()[0].variables;
    assert_eq!(
        variables["addressInformation"]["shipping_carrier_code"],
        json!("flatrate")
    );
}

#[tokio::test]
async fn test_totals_keep_any_quote_currency() {
    let mut details = payment_details_json();
    details["totals"]["quote_currency_code"] = json!("SEK");
    let backend = Arc::new(Backend::default());
    backend.reply(
        "SaveAddressInformation",
        Reply::data(json!({ "saveAddressInformation": details })),
    );
    let gateway = gateway_with(&backend, None).await;

    let details = gateway
        .save_address_information(CART_ID, &shipping_information(shipping_address()))
        .await
        .unwrap();

    assert_eq!(details.totals.quote_currency_code.as_str(), "SEK");
    assert_eq!(details.totals.grand_total().to_string(), "SEK 45.00");
    let cached = serde_json::to_value(&details.totals).unwrap();
    assert_eq!(cached["quote_currency_code"], json!("SEK"));
}

#[tokio::test]
async fn test_graphql_errors_become_the_user_message() {
    let backend = Arc::new(Backend::default());
    backend.reply("PlaceOrder", Reply::errors("The cart isn't active."));
    let gateway = gateway_with(&backend, None).await;

    let error = gateway.place_order(CART_ID).await.unwrap_err();

    assert!(matches!(error, GatewayError::GraphQL(_)));
    assert_eq!(error.user_message(), "The cart isn't active.");
}

#[tokio::test]
async fn test_too_many_requests_is_rate_limited() {
    let backend = Arc::new(Backend::default());
    backend.reply(
        "GetPaymentMethods",
        Reply {
            status: StatusCode::TOO_MANY_REQUESTS,
            retry_after: Some(7),
            body: json!({}),
        },
    );
    let gateway = gateway_with(&backend, None).await;

    let error = gateway.get_payment_methods(CART_ID).await.unwrap_err();

    assert!(matches!(error, GatewayError::RateLimited(7)));
    assert!(error.user_message().contains("7 seconds"));
}

#[tokio::test]
async fn test_server_error_is_a_gateway_error() {
    let backend = Arc::new(Backend::default());
    backend.reply(
        "GetPaymentMethods",
        Reply {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            retry_after: None,
            body: json!({ "message": "boom" }),
        },
    );
    let gateway = gateway_with(&backend, None).await;

    let result = gateway.get_payment_methods(CART_ID).await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_empty_order_id_is_invalid() {
    let backend = Arc::new(Backend::default());
    backend.reply(
        "PlaceOrder",
        Reply::data(json!({ "placeOrder": { "order": { "order_id": "" } } })),
    );
    let gateway = gateway_with(&backend, None).await;

    let error = gateway.place_order(CART_ID).await.unwrap_err();

    assert!(matches!(error, GatewayError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_unsaved_guest_email_is_a_user_error() {
    let backend = Arc::new(Backend::default());
    backend.reply(
        "SaveGuestEmail",
        Reply::data(json!({ "saveGuestEmail": { "saved": false } })),
    );
    let gateway = gateway_with(&backend, None).await;

    let error = gateway
        .save_guest_email(CART_ID, &Email::parse("guest@example.com").unwrap())
        .await
        .unwrap_err();

    assert!(matches!(error, GatewayError::UserError(_)));
}

#[tokio::test]
async fn test_email_availability_is_cached() {
    let backend = Arc::new(Backend::default());
    backend.reply(
        "IsEmailAvailable",
        Reply::data(json!({ "isEmailAvailable": { "isEmailAvailable": false } })),
    );
    let gateway = gateway_with(&backend, None).await;
    let email = Email::parse("taken@example.com").unwrap();

    assert!(!gateway.is_email_available(&email).await.unwrap());
    assert!(!gateway.is_email_available(&email).await.unwrap());

    assert_eq!(backend.received_for("IsEmailAvailable").len(), 1);
}

#[tokio::test]
async fn test_missing_availability_payload_counts_as_available() {
    let backend = Arc::new(Backend::default());
    backend.reply(
        "IsEmailAvailable",
        Reply::data(json!({ "isEmailAvailable": null })),
    );
    let gateway = gateway_with(&backend, None).await;

    let available = gateway
        .is_email_available(&Email::parse("new@example.com").unwrap())
        .await
        .unwrap();

    assert!(available);
}

// =============================================================================
// Customer token
// =============================================================================

#[tokio::test]
async fn test_configured_token_is_sent_as_bearer() {
    let backend = Arc::new(Backend::default());
    backend.reply(
        "GetPaymentMethods",
        Reply::data(json!({ "getPaymentMethods": [] })),
    );
    let gateway = gateway_with(&backend, Some("tok-configured")).await;

    gateway.get_payment_methods(CART_ID).await.unwrap();

    assert!(gateway.is_signed_in().await);
    assert_eq!(
        backend.received()[0].authorization.as_deref(),
        Some("Bearer tok-configured")
    );
}

#[tokio::test]
async fn test_empty_configured_token_stays_anonymous() {
    let backend = Arc::new(Backend::default());
    backend.reply(
        "GetPaymentMethods",
        Reply::data(json!({ "getPaymentMethods": [] })),
    );
    let gateway = gateway_with(&backend, Some("")).await;

    gateway.get_payment_methods(CART_ID).await.unwrap();

    assert!(!gateway.is_signed_in().await);
    assert_eq!(backend.received()[0].authorization, None);
}

#[tokio::test]
async fn test_created_account_signs_in_later_requests() {
    let backend = Arc::new(Backend::default());
    backend.reply(
        "CreateCustomer",
        Reply::data(json!({
            "createCustomer": {
                "status": "CREATED",
                "customer": { "id": 42, "email": "ada@example.com" },
                "token": "tok-123"
            }
        })),
    );
    backend.reply(
        "PlaceOrder",
        Reply::data(json!({ "placeOrder": { "order": { "order_id": "000000123" } } })),
    );
    let gateway = gateway_with(&backend, None).await;
    assert!(!gateway.is_signed_in().await);

    let creation = gateway.create_account(&account()).await.unwrap();
    let order_id = gateway.place_order(CART_ID).await.unwrap();

    assert_eq!(creation, AccountCreation::SignedIn);
    assert_eq!(order_id, "000000123");
    assert!(gateway.is_signed_in().await);
    let orders = backend.received_for("PlaceOrder");
    assert_eq!(orders[0].authorization.as_deref(), Some("Bearer tok-123"));

    // the new account owns the email without asking the backend again
    let email = Email::parse("ada@example.com").unwrap();
    assert!(!gateway.is_email_available(&email).await.unwrap());
    assert!(backend.received_for("IsEmailAvailable").is_empty());
}

#[tokio::test]
async fn test_account_needing_confirmation_stays_anonymous() {
    let backend = Arc::new(Backend::default());
    backend.reply(
        "CreateCustomer",
        Reply::data(json!({
            "createCustomer": {
                "status": "CONFIRMATION_REQUIRED",
                "customer": { "id": 43, "email": "ada@example.com" },
                "token": null
            }
        })),
    );
    let gateway = gateway_with(&backend, None).await;

    let creation = gateway.create_account(&account()).await.unwrap();

    assert_eq!(creation, AccountCreation::ConfirmationRequired);
    assert!(!gateway.is_signed_in().await);
}

// =============================================================================
// Orchestrator over HTTP
// =============================================================================

#[tokio::test]
async fn test_customer_checkout_over_http() {
    let backend = Arc::new(Backend::default());
    backend.reply(
        "SaveAddressInformation",
        Reply::data(json!({ "saveAddressInformation": payment_details_json() })),
    );
    backend.reply(
        "SetBillingAddress",
        Reply::data(json!({ "setBillingAddressOnCart": { "cart": { "id": CART_ID } } })),
    );
    backend.reply(
        "SetPaymentMethod",
        Reply::data(json!({ "setPaymentMethodOnCart": { "cart": { "id": CART_ID } } })),
    );
    backend.reply(
        "PlaceOrder",
        Reply::data(json!({ "placeOrder": { "order": { "order_id": "000000124" } } })),
    );
    backend.reply(
        "IsEmailAvailable",
        Reply::data(json!({ "isEmailAvailable": { "isEmailAvailable": false } })),
    );
    let gateway = gateway_with(&backend, Some("tok-customer")).await;
    let services = Services {
        gateway: Arc::new(gateway),
        cache: Arc::new(MemoryCache::new()),
        navigator: Arc::new(HistoryNavigator::new("/checkout/shipping")),
        state: Arc::new(EventLog::new()),
    };

    let (mut checkout, _) = CheckoutOrchestrator::mount(
        services,
        CheckoutSettings::default(),
        customer_context(physical_cart()),
    )
    .await;
    checkout
        .save_address_information(shipping_information(shipping_address()))
        .await
        .unwrap();
    let outcome = checkout
        .save_payment_information(PaymentInformation {
            billing_address: shipping_address(),
            same_as_shipping: true,
            payment_method: checkmo(),
        })
        .await
        .unwrap();

    assert_eq!(
        outcome,
        Outcome::Transitioned {
            from: CheckoutStep::Billing,
            to: CheckoutStep::Details,
        }
    );
    assert_eq!(checkout.session().order_id.as_deref(), Some("000000124"));

    let operations: Vec<String> = backend
        .received()
        .into_iter()
        .map(|r| r.operation)
        .filter(|op| op != "IsEmailAvailable")
        .collect();
    assert_eq!(
        operations,
        vec![
            "SaveAddressInformation",
            "SetBillingAddress",
            "SetPaymentMethod",
            "PlaceOrder",
        ]
    );
    let billing = &backend.received_for("SetBillingAddress")[0].variables;
    assert_eq!(billing["input"]["cart_id"], json!(CART_ID));
}
