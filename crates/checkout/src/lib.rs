//! Tillpoint Checkout library.
//!
//! The checkout step machine (shipping, billing, order placement) and the
//! services it drives:
//!
//! - [`checkout`] - the orchestrator that owns a [`checkout::CheckoutSession`]
//! - [`gateway`] - the commerce backend boundary and its GraphQL client
//! - [`cache`] - persistent key/value store with expiry
//! - [`navigation`] - URL history capability
//! - [`state`] - shared application state sink (notifications, cart reset)
//! - [`address`] - pure address normalization

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod address;
pub mod cache;
pub mod checkout;
pub mod config;
pub mod error;
pub mod gateway;
pub mod navigation;
pub mod state;

pub use checkout::{
    CartSnapshot, CheckoutAction, CheckoutContext, CheckoutOrchestrator, CheckoutSession,
    CustomerSnapshot, Outcome, PaymentInformation, Services,
};
pub use error::CheckoutError;
