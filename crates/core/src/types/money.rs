//! Decimal money amounts.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An amount with its ISO 4217 currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// Amount in the currency's standard unit (e.g., dollars, not cents).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Money {
    /// Create a new amount.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let amount = self.amount.round_dp(2);
        match self.currency_code.symbol() {
            Some(symbol) => write!(f, "{symbol}{amount:.2}"),
            None => write!(f, "{} {amount:.2}", self.currency_code),
        }
    }
}

/// ISO 4217 currency code: three uppercase ASCII letters.
///
/// The set is open; whatever quote currency the store is configured with
/// passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode([u8; 3]);

impl CurrencyCode {
    pub const USD: Self = Self(*b"USD");
    pub const EUR: Self = Self(*b"EUR");
    pub const GBP: Self = Self(*b"GBP");
    pub const CAD: Self = Self(*b"CAD");
    pub const AUD: Self = Self(*b"AUD");

    /// The three-letter code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        // Only ASCII letters are ever stored.
        core::str::from_utf8(&self.0).unwrap_or("XXX")
    }

    /// Display symbol for the common currencies.
    #[must_use]
    pub fn symbol(self) -> Option<&'static str> {
        match &self.0 {
            b"USD" | b"CAD" | b"AUD" => Some("$"),
            b"EUR" => Some("€"),
            b"GBP" => Some("£"),
            _ => None,
        }
    }
}

impl Default for CurrencyCode {
    fn default() -> Self {
        Self::USD
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for CurrencyCode {
    type Err = UnknownCurrency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code: [u8; 3] = s
            .trim()
            .as_bytes()
            .try_into()
            .map_err(|_| UnknownCurrency(s.to_string()))?;
        if !code.iter().all(u8::is_ascii_alphabetic) {
            return Err(UnknownCurrency(s.to_string()));
        }
        Ok(Self(code.map(|b| b.to_ascii_uppercase())))
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = UnknownCurrency;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.as_str().to_string()
    }
}

/// The value is not a three-letter currency code.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid currency code: {0}")]
pub struct UnknownCurrency(pub String);
