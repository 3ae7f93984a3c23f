//! Money Module
//!
//! Amounts and balances are `u64` minor units (1 VND, 1 cent) everywhere,
//! including the HTTP API; nothing ever sees a float. This module renders
//! them for display and maps them to and from `NUMERIC` columns.
//!
//! ```rust
//! use retail_ledger::money::{format_amount, Currency};
//!
//! // VND has no minor unit
//! assert_eq!(format_amount(1_250_000, Currency::Vnd), "1,250,000");
//! assert_eq!(format_amount(1_250, Currency::Usd), "12.50");
//! ```

use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core_types::Amount;

// ============================================================================
// Error Types
// ============================================================================

/// Money conversion errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Precision overflow: provided {provided} decimals, max allowed {max}")]
    PrecisionOverflow { provided: u32, max: u32 },

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Amount too large, would overflow")]
    Overflow,

    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),
}

// ============================================================================
// Currency
// ============================================================================

/// Account currency. No conversion between currencies is ever performed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Vnd,
    Usd,
    Eur,
}

impl Currency {
    /// Minor-unit decimals
    pub fn decimals(&self) -> u32 {
        match self {
            Currency::Vnd => 0,
            Currency::Usd | Currency::Eur => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Vnd => "VND",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "VND" => Ok(Currency::Vnd),
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            other => Err(MoneyError::UnsupportedCurrency(other.to_string())),
        }
    }
}

// ============================================================================
// Format: Internal → Client
// ============================================================================

/// Render minor units as a grouped display string, e.g. `1,250,000` or `12.50`
pub fn format_amount(value: Amount, currency: Currency) -> String {
    let decimals = currency.decimals();
    let divisor = 10u64.pow(decimals);
    let whole = group_thousands(value / divisor);
    if decimals == 0 {
        whole
    } else {
        format!(
            "{}.{:0width$}",
            whole,
            value % divisor,
            width = decimals as usize
        )
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Convert minor units to a NUMERIC value for SQL binds
pub fn amount_to_decimal(value: Amount) -> Decimal {
    Decimal::from(value)
}

/// Convert a NUMERIC column back into minor units
pub fn decimal_to_amount(value: Decimal) -> Result<Amount, MoneyError> {
    if value.is_sign_negative() {
        return Err(MoneyError::InvalidAmount);
    }
    if !value.fract().is_zero() {
        return Err(MoneyError::PrecisionOverflow {
            provided: value.scale(),
            max: 0,
        });
    }
    value.to_u64().ok_or(MoneyError::Overflow)
}
