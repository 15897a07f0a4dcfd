//! Payment totals returned after the shipping step.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::money::{CurrencyCode, Money};

/// Snapshot of the cart totals once shipping has been priced.
///
/// Stored in the local cache between the shipping and billing steps so a
/// reload on the billing step does not have to re-query shipping cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTotals {
    pub subtotal: Decimal,
    pub subtotal_incl_tax: Decimal,
    pub discount_amount: Decimal,
    pub shipping_amount: Decimal,
    pub shipping_incl_tax: Decimal,
    pub tax_amount: Decimal,
    pub grand_total: Decimal,
    pub items_qty: u32,
    pub quote_currency_code: CurrencyCode,
}

impl PaymentTotals {
    /// Grand total as a money value.
    #[must_use]
    pub const fn grand_total(&self) -> Money {
        Money::new(self.grand_total, self.quote_currency_code)
    }
}
