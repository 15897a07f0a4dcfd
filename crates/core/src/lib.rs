//! Tillpoint Core - Shared checkout domain types.
//!
//! This crate provides the types shared by every Tillpoint component:
//! - `checkout` - Checkout orchestration (step machine, gateway, cache)
//! - `cli` - Command-line driver for scripted checkouts
//!
//! # Architecture
//!
//! The core crate contains only types and pure helpers - no I/O, no HTTP
//! clients, no async. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, money, addresses, regions, checkout
//!   steps and payment totals

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
