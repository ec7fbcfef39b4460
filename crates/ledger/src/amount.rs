use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// A quantity of a currency. Quantities are exact decimals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    pub quantity: Decimal,
    pub currency: String,
}

impl Amount {
    pub fn new(quantity: Decimal, currency: impl Into<String>) -> Self {
        Self {
            quantity,
            currency: currency.into(),
        }
    }

    /// Parse `"<quantity> <CURRENCY>"`, e.g. `"100.00 USD"`.
    pub fn parse(text: &str) -> Result<Self, LedgerError> {
        let mut parts = text.split_whitespace();
        let (Some(quantity), Some(currency), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(LedgerError::InvalidAmount(text.to_string()));
        };
        let quantity =
            Decimal::from_str(quantity).map_err(|_| LedgerError::InvalidAmount(text.to_string()))?;
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(LedgerError::InvalidAmount(text.to_string()));
        }
        Ok(Self::new(quantity, currency))
    }

    pub fn is_positive(&self) -> bool {
        self.quantity > Decimal::ZERO
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.quantity, self.currency)
    }
}
