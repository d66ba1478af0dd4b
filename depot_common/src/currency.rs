use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

pub const CURRENCY_CREDITS: &str = "credits";
pub const CURRENCY_ESSENCE: &str = "essence";

/// The two spendable currencies in the game economy. Credits is the primary pricing currency;
/// essence is the premium currency used for purchase prices and expedite spends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    Credits,
    Essence,
}

#[derive(Debug, Clone, Error)]
#[error("Unknown currency: {0}")]
pub struct UnknownCurrencyError(String);

impl FromStr for Currency {
    type Err = UnknownCurrencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            CURRENCY_CREDITS => Ok(Self::Credits),
            CURRENCY_ESSENCE => Ok(Self::Essence),
            other => Err(UnknownCurrencyError(other.to_string())),
        }
    }
}

impl From<String> for Currency {
    fn from(value: String) -> Self {
        value.parse().unwrap_or(Currency::Credits)
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Currency::Credits => write!(f, "Credits"),
            Currency::Essence => write!(f, "Essence"),
        }
    }
}
