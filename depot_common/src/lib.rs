mod coins;
mod currency;

pub mod op;

pub use coins::{Coins, CoinsConversionError};
pub use currency::{Currency, CURRENCY_CREDITS, CURRENCY_ESSENCE};
