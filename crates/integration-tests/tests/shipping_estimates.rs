//! Overlapping shipping estimates and the delivery options loading flag.
//!
//! Time is paused so estimate delays decide the completion order.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use tillpoint_checkout::CheckoutAction;
use tillpoint_checkout::gateway::{PICKUP_CARRIER_CODE, ShippingInformation, ShippingMethodSelection};
use tillpoint_checkout::{CheckoutError, Outcome};
use tillpoint_core::{Address, RegionValue};
use tillpoint_integration_tests::{
    FakeGateway, GatewayCall, Harness, Operation, customer_context, estimate_address, flat_rate,
    flat_rate_selection, guest_context, physical_cart, shipping_address, shipping_information,
};

const SHIPPING: &str = "/checkout/shipping";
const POSTCODES: [&str; 3] = ["10001", "10002", "10003"];

fn permutations() -> Vec<[u64; 3]> {
    vec![
        [100, 200, 300],
        [100, 300, 200],
        [200, 100, 300],
        [200, 300, 100],
        [300, 100, 200],
        [300, 200, 100],
    ]
}

#[tokio::test(start_paused = true)]
async fn test_loading_stays_on_until_every_estimate_settles() {
    for delays in permutations() {
        let mut gateway = FakeGateway::new();
        for (postcode, delay) in POSTCODES.iter().zip(delays) {
            gateway = gateway.with_estimate(
                postcode,
                Duration::from_millis(delay),
                vec![flat_rate("5.00")],
            );
        }
        let harness = Harness::new(gateway, SHIPPING);
        let (mut checkout, _) = harness.mount(guest_context(physical_cart())).await;

        for postcode in POSTCODES {
            checkout.on_shipping_estimation_fields_change(estimate_address(postcode));
            assert!(checkout.session().is_delivery_options_loading);
        }
        assert_eq!(checkout.session().requests_sent, 3);

        let mut settled = 0;
        while let Some(outcome) = checkout.settle_next_estimate().await {
            settled += 1;
            assert_eq!(outcome, Outcome::Unchanged);
            let unresolved = checkout.pending_estimates();
            assert_eq!(
                checkout.session().is_delivery_options_loading,
                unresolved > 0,
                "delays {delays:?}, settled {settled}"
            );
        }

        assert_eq!(settled, 3);
        assert_eq!(checkout.session().requests_sent, 0);
        assert!(!checkout.session().is_delivery_options_loading);
        assert_eq!(checkout.session().shipping_methods.len(), 1);
    }
}

#[tokio::test(start_paused = true)]
async fn test_stale_estimate_can_overwrite_newer_one() {
    let gateway = FakeGateway::new()
        .with_estimate("10001", Duration::from_millis(300), vec![flat_rate("9.00")])
        .with_estimate("10002", Duration::from_millis(100), vec![flat_rate("5.00")]);
    let harness = Harness::new(gateway, SHIPPING);
    let (mut checkout, _) = harness.mount(guest_context(physical_cart())).await;

    checkout.on_shipping_estimation_fields_change(estimate_address("10001"));
    checkout.on_shipping_estimation_fields_change(estimate_address("10002"));
    let outcomes = checkout.settle_estimates().await;

    assert_eq!(outcomes, vec![Outcome::Unchanged, Outcome::Unchanged]);
    // completion order wins, not request order
    assert_eq!(
        checkout.session().shipping_methods,
        vec![flat_rate("9.00")]
    );
    assert_eq!(
        checkout.session().estimate_address,
        Some(estimate_address("10002"))
    );
}

#[tokio::test(start_paused = true)]
async fn test_estimate_sends_normalized_address() {
    let harness = Harness::new(FakeGateway::new(), SHIPPING);
    let (mut checkout, _) = harness.mount(guest_context(physical_cart())).await;

    checkout.on_shipping_estimation_fields_change(estimate_address("90001"));
    checkout.settle_estimates().await;

    let calls = harness.gateway.calls_of(Operation::EstimateShipping);
    let [GatewayCall::EstimateShipping { cart_id, address }] = calls.as_slice() else {
        panic!("expected one estimate, got {calls:?}");
    };
    assert_eq!(cart_id, "cart-1");
    assert_eq!(address.country_id, None);
    assert_eq!(address.country_code.as_deref(), Some("US"));
    assert_eq!(address.region, Some(RegionValue::Name("CA".to_string())));
}

#[tokio::test(start_paused = true)]
async fn test_failed_estimate_clears_loading_and_notifies() {
    let gateway = FakeGateway::new().failing(Operation::EstimateShipping, "Carrier unavailable");
    let harness = Harness::new(gateway, SHIPPING);
    let (mut checkout, _) = harness.mount(guest_context(physical_cart())).await;

    checkout
        .handle(CheckoutAction::EstimateShipping {
            address: estimate_address("90001"),
        })
        .await
        .unwrap();
    let outcome = checkout
        .handle(CheckoutAction::SettleEstimates)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        Outcome::Failed {
            message: "Carrier unavailable".to_string()
        }
    );
    assert!(!checkout.session().is_delivery_options_loading);
    assert_eq!(checkout.session().requests_sent, 0);
    assert_eq!(harness.state.notifications().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_estimate_without_cart_is_ignored() {
    let harness = Harness::new(FakeGateway::new(), SHIPPING);
    let mut cart = physical_cart();
    cart.cart_id = None;
    let (mut checkout, _) = harness.mount(guest_context(cart)).await;

    let outcome = checkout.on_shipping_estimation_fields_change(estimate_address("90001"));

    assert_eq!(outcome, Outcome::Unchanged);
    assert_eq!(checkout.pending_estimates(), 0);
    assert_eq!(checkout.session().requests_sent, 0);
    assert!(!checkout.session().is_delivery_options_loading);
    assert!(checkout.settle_next_estimate().await.is_none());
    assert_eq!(harness.gateway.count(Operation::EstimateShipping), 0);
}

#[tokio::test]
async fn test_shipping_method_selection_is_validated() {
    let harness = Harness::new(FakeGateway::new(), SHIPPING);
    let (mut checkout, _) = harness.mount(guest_context(physical_cart())).await;

    let result = checkout.on_shipping_method_select(ShippingMethodSelection {
        carrier_code: "flatrate".to_string(),
        method_code: " ".to_string(),
    });
    assert!(matches!(result, Err(CheckoutError::InvalidInput(_))));
    assert_eq!(checkout.session().selected_shipping_method, None);

    let selection = flat_rate_selection();
    checkout
        .handle(CheckoutAction::SelectShippingMethod(selection.clone()))
        .await
        .unwrap();
    assert_eq!(checkout.session().selected_shipping_method, Some(selection));
}

#[tokio::test]
async fn test_pickup_store_selection() {
    let harness = Harness::new(FakeGateway::new(), SHIPPING);
    let (mut checkout, _) = harness.mount(guest_context(physical_cart())).await;
    let store = estimate_address("94105");

    checkout.handle(CheckoutAction::ToggleDeliveryMethod).await.unwrap();
    checkout
        .handle(CheckoutAction::SelectStore {
            address: Some(store.clone()),
        })
        .await
        .unwrap();

    assert!(checkout.session().is_pick_in_store_method_selected);
    assert_eq!(checkout.session().selected_store_address, Some(store));

    checkout.handle(CheckoutAction::ToggleDeliveryMethod).await.unwrap();
    checkout
        .handle(CheckoutAction::SelectStore { address: None })
        .await
        .unwrap();
    assert!(!checkout.session().is_pick_in_store_method_selected);
    assert_eq!(checkout.session().selected_store_address, None);
}

#[tokio::test]
async fn test_pickup_in_store_ships_to_the_selected_store() {
    let harness = Harness::new(FakeGateway::new(), SHIPPING);
    let (mut checkout, _) = harness.mount(customer_context(physical_cart())).await;
    let store = Address {
        street: vec!["500 Market St".to_string()],
        city: "San Francisco".to_string(),
        ..estimate_address("94105")
    };
    checkout.handle_select_delivery_method();
    checkout.on_store_select(Some(store));

    let pickup = ShippingMethodSelection {
        carrier_code: PICKUP_CARRIER_CODE.to_string(),
        method_code: "pickup".to_string(),
    };
    checkout
        .save_address_information(ShippingInformation {
            shipping_method: pickup,
            ..shipping_information(shipping_address())
        })
        .await
        .unwrap();

    let calls = harness.gateway.calls_of(Operation::SaveAddressInformation);
    let [GatewayCall::SaveAddressInformation { information, .. }] = calls.as_slice() else {
        panic!("expected one shipping submission, got {calls:?}");
    };
    assert_eq!(information.shipping_address.city, "San Francisco");
    assert_eq!(information.shipping_address.postcode, "94105");
    assert_eq!(information.shipping_address.firstname, "Grace");
    assert_eq!(information.shipping_address.telephone, "555-0101");
}

#[tokio::test]
async fn test_store_is_ignored_for_home_delivery() {
    let harness = Harness::new(FakeGateway::new(), SHIPPING);
    let (mut checkout, _) = harness.mount(customer_context(physical_cart())).await;
    checkout.on_store_select(Some(estimate_address("94105")));

    checkout
        .save_address_information(shipping_information(shipping_address()))
        .await
        .unwrap();

    let calls = harness.gateway.calls_of(Operation::SaveAddressInformation);
    let [GatewayCall::SaveAddressInformation { information, .. }] = calls.as_slice() else {
        panic!("expected one shipping submission, got {calls:?}");
    };
    assert_eq!(information.shipping_address.city, "Los Angeles");
}
