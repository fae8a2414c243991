//! Money Representation
//!
//! All monetary values are fixed-point decimals stored as `i64` minor units
//! (cents). Conversion between client-facing decimal strings and the internal
//! representation goes through `rust_decimal` exclusively; binary floating
//! point never touches an amount.

use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::BankError;

/// Supported settlement currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    Eur,
    Usd,
    Gbp,
}

impl Currency {
    /// Number of minor-unit digits (all supported currencies use 2).
    pub const fn minor_units(&self) -> u32 {
        match self {
            Currency::Eur | Currency::Usd | Currency::Gbp => 2,
        }
    }

    /// ISO 4217 code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
            Currency::Gbp => "GBP",
        }
    }

    /// Parse an ISO 4217 code (case-insensitive).
    pub fn parse(s: &str) -> Result<Self, BankError> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EUR" => Ok(Currency::Eur),
            "USD" => Ok(Currency::Usd),
            "GBP" => Ok(Currency::Gbp),
            other => Err(BankError::InvalidRequest(format!(
                "unsupported currency: {other}"
            ))),
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A monetary amount in minor units of its currency.
///
/// The inner value is intentionally private; arithmetic goes through the
/// checked methods so overflow and sign violations surface as errors instead
/// of silent wraparound.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Construct from raw minor units.
    pub const fn from_minor(minor: i64) -> Self {
        Amount(minor)
    }

    /// Raw minor units.
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// True for amounts strictly greater than zero.
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Parse a client-provided decimal string into minor units.
    ///
    /// # Errors
    /// * `InvalidRequest` - not a decimal number
    /// * `PrecisionOverflow` - more fractional digits than the currency allows
    /// * `Overflow` - does not fit in i64 minor units
    pub fn parse(s: &str, currency: Currency) -> Result<Self, BankError> {
        let decimal = Decimal::from_str(s.trim())
            .map_err(|_| BankError::InvalidRequest(format!("invalid amount: {s}")))?;
        Self::from_decimal(decimal, currency)
    }

    /// Convert a `Decimal` into minor units.
    pub fn from_decimal(value: Decimal, currency: Currency) -> Result<Self, BankError> {
        let units = currency.minor_units();
        if value.scale() > units {
            // Reject rather than truncate; 10.001 EUR is not a valid amount.
            let normalized = value.normalize();
            if normalized.scale() > units {
                return Err(BankError::PrecisionOverflow);
            }
        }
        let scaled = value
            .checked_mul(Decimal::from(10i64.pow(units)))
            .ok_or(BankError::Overflow)?;
        scaled.to_i64().map(Amount).ok_or(BankError::Overflow)
    }

    /// Render as a decimal string, e.g. `150000` minor EUR -> `"1500.00"`.
    pub fn format(&self, currency: Currency) -> String {
        let units = currency.minor_units();
        let d = Decimal::new(self.0, units);
        format!("{:.prec$}", d, prec = units as usize)
    }

    /// Checked addition.
    pub fn checked_add(&self, other: Amount) -> Result<Amount, BankError> {
        self.0
            .checked_add(other.0)
            .map(Amount)
            .ok_or(BankError::Overflow)
    }

    /// Checked subtraction.
    pub fn checked_sub(&self, other: Amount) -> Result<Amount, BankError> {
        self.0
            .checked_sub(other.0)
            .map(Amount)
            .ok_or(BankError::Overflow)
    }

    /// Signed negation, for the debit side of an entry pair.
    pub const fn negated(&self) -> Amount {
        Amount(-self.0)
    }
}
