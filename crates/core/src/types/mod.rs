//! Core types for Tillpoint.
//!
//! This module provides type-safe wrappers for checkout domain concepts.

pub mod address;
pub mod email;
pub mod id;
pub mod money;
pub mod step;
pub mod totals;

pub use address::{Address, Country, Region, RegionValue};
pub use email::{Email, EmailError};
pub use id::*;
pub use money::{CurrencyCode, Money, UnknownCurrency};
pub use step::{CheckoutStep, ParseStepError};
pub use totals::PaymentTotals;
