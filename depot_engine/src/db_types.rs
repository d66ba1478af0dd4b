use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use depot_common::Coins;
use log::error;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid conversion: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------        OrderId        -------------------------------------------------------
/// The public reference for an order. This is the identifier callers hold on to; the integer
/// row id is internal to the database.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    /// Generates a fresh order reference, e.g. `dpt-9xK2mFqL3aZv`.
    pub fn random() -> Self {
        let suffix: String = rand::thread_rng().sample_iter(&Alphanumeric).take(12).map(char::from).collect();
        Self(format!("dpt-{suffix}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

//--------------------------------------      OrderState       -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderState {
    /// The deposit has been taken, but no stock could be reserved yet (back-ordered).
    Placed,
    /// Stock is reserved and the order is waiting out its lead time.
    Scheduled,
    /// The lead time has elapsed. The order can be completed until the pickup window closes.
    ReadyForPickup,
    /// The order was picked up and paid in full.
    Completed,
    /// The order was cancelled by the player and the deposit (less any fee) refunded.
    CancelledRefund,
    /// The pickup window lapsed and part of the deposit was forfeited.
    CancelledForfeit,
}

impl OrderState {
    /// Open orders hold (or are waiting for) a stock reservation and count against the
    /// player's concurrency caps.
    pub fn is_open(&self) -> bool {
        matches!(self, OrderState::Placed | OrderState::Scheduled)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderState::Completed | OrderState::CancelledRefund | OrderState::CancelledForfeit)
    }
}

impl Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderState::Placed => write!(f, "Placed"),
            OrderState::Scheduled => write!(f, "Scheduled"),
            OrderState::ReadyForPickup => write!(f, "ReadyForPickup"),
            OrderState::Completed => write!(f, "Completed"),
            OrderState::CancelledRefund => write!(f, "CancelledRefund"),
            OrderState::CancelledForfeit => write!(f, "CancelledForfeit"),
        }
    }
}

impl FromStr for OrderState {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Placed" => Ok(Self::Placed),
            "Scheduled" => Ok(Self::Scheduled),
            "ReadyForPickup" => Ok(Self::ReadyForPickup),
            "Completed" => Ok(Self::Completed),
            "CancelledRefund" => Ok(Self::CancelledRefund),
            "CancelledForfeit" => Ok(Self::CancelledForfeit),
            s => Err(ConversionError(format!("Invalid order state: {s}"))),
        }
    }
}

impl From<String> for OrderState {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order state: {value}. But this conversion cannot fail. Defaulting to Placed");
            OrderState::Placed
        })
    }
}

//--------------------------------------        Rarity         -------------------------------------------------------
/// Catalog rarity tiers. Deposit percentages and base lead times key off the tier. Tiers the
/// engine does not recognise fall back to defaults at the formula level, so the catalog is free
/// to introduce new tiers ahead of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

impl Display for Rarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rarity::Common => write!(f, "common"),
            Rarity::Rare => write!(f, "rare"),
            Rarity::Epic => write!(f, "epic"),
            Rarity::Legendary => write!(f, "legendary"),
        }
    }
}

impl FromStr for Rarity {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "common" => Ok(Self::Common),
            "rare" => Ok(Self::Rare),
            "epic" => Ok(Self::Epic),
            "legendary" => Ok(Self::Legendary),
            s => Err(ConversionError(format!("Invalid rarity tier: {s}"))),
        }
    }
}

//--------------------------------------      StockReason      -------------------------------------------------------
/// Why a stock ledger entry exists. `Reserve` removes units from the available pool when an
/// order is scheduled; `Release` returns them (cancellation) or closes out a reservation
/// (completion, where it is paired with a `Sale`); `Restock` is an operator top-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum StockReason {
    Restock,
    Reserve,
    Release,
    Sale,
}

impl Display for StockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StockReason::Restock => write!(f, "Restock"),
            StockReason::Reserve => write!(f, "Reserve"),
            StockReason::Release => write!(f, "Release"),
            StockReason::Sale => write!(f, "Sale"),
        }
    }
}

impl FromStr for StockReason {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Restock" => Ok(Self::Restock),
            "Reserve" => Ok(Self::Reserve),
            "Release" => Ok(Self::Release),
            "Sale" => Ok(Self::Sale),
            s => Err(ConversionError(format!("Invalid stock reason: {s}"))),
        }
    }
}

impl From<String> for StockReason {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid stock reason: {value}. But this conversion cannot fail. Defaulting to Restock");
            StockReason::Restock
        })
    }
}

//--------------------------------------        Order          -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_ref: OrderId,
    pub user_id: i64,
    pub item_id: i64,
    pub quantity: i64,
    /// Percentage of the total price taken as a deposit at creation. Clamped to [10, 90].
    pub deposit_pct: i64,
    pub deposit_credits: Coins,
    pub deposit_essence: Coins,
    /// Total essence spent shortening the lead time, across all expedites.
    pub expedite_spend: Coins,
    /// Unit prices frozen at creation. Later catalog price changes never affect this order.
    pub price_credits: Coins,
    pub price_essence: Coins,
    pub eta_at: DateTime<Utc>,
    /// Set when the order transitions to `ReadyForPickup`; null before that.
    pub pickup_expires_at: Option<DateTime<Utc>>,
    pub state: OrderState,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Total locked-in price for the order, per currency.
    pub fn total_credits(&self) -> Coins {
        self.price_credits * self.quantity
    }

    pub fn total_essence(&self) -> Coins {
        self.price_essence * self.quantity
    }

    /// Balance still due at pickup, floored at zero per currency.
    pub fn remaining_credits(&self) -> Coins {
        self.total_credits().saturating_sub(self.deposit_credits)
    }

    pub fn remaining_essence(&self) -> Coins {
        self.total_essence().saturating_sub(self.deposit_essence)
    }
}

//--------------------------------------       NewOrder        -------------------------------------------------------
/// A fully-priced order, ready for insertion. All the derived economics (deposit split, locked
/// prices, ETA) have been computed by the creation flow before this record is built.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_ref: OrderId,
    pub user_id: i64,
    pub item_id: i64,
    pub quantity: i64,
    pub deposit_pct: i64,
    pub deposit_credits: Coins,
    pub deposit_essence: Coins,
    pub expedite_spend: Coins,
    pub price_credits: Coins,
    pub price_essence: Coins,
    pub eta_at: DateTime<Utc>,
    pub idempotency_key: Option<String>,
}

//--------------------------------------   StockLedgerEntry    -------------------------------------------------------
/// One row per stock-affecting event. Append-only; entries are never mutated or deleted, and
/// `delta` is never zero. Available stock for an item is the item's base stock plus the sum of
/// its ledger deltas.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StockLedgerEntry {
    pub id: i64,
    pub item_id: i64,
    pub delta: i64,
    pub reason: StockReason,
    pub order_ref: Option<OrderId>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------      CatalogItem      -------------------------------------------------------
/// A purchasable catalog entry. The catalog itself (and its admin CRUD) is owned by another
/// service; the engine only reads these rows. `rarity` is kept as free text so that unknown
/// tiers degrade to formula fallbacks instead of failing the row decode.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: i64,
    pub name: String,
    pub item_type: String,
    pub rarity: String,
    /// Unit prices. A zero price in a currency means the item does not cost that currency.
    pub price_credits: Coins,
    pub price_essence: Coins,
    /// Base stock before any ledger deltas are applied.
    pub stock: i64,
    /// When true, availability is enforced: reservations may not take the pool below zero.
    pub limited_stock: bool,
    /// When true, a failed reservation back-orders the purchase instead of rejecting it.
    pub backorder: bool,
    pub active: bool,
    pub available_from: Option<DateTime<Utc>>,
    pub available_until: Option<DateTime<Utc>>,
    pub min_tier: i64,
    pub min_level: i64,
    pub daily_limit: Option<i64>,
    pub weekly_limit: Option<i64>,
    pub lifetime_limit: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl CatalogItem {
    pub fn rarity_tier(&self) -> Option<Rarity> {
        self.rarity.parse().ok()
    }

    /// Whether the item can be purchased at the given instant, ignoring stock.
    pub fn is_available_at(&self, now: DateTime<Utc>) -> bool {
        if !self.active {
            return false;
        }
        if let Some(from) = self.available_from {
            if now < from {
                return false;
            }
        }
        if let Some(until) = self.available_until {
            if now > until {
                return false;
            }
        }
        true
    }
}

//--------------------------------------    NewCatalogItem     -------------------------------------------------------
/// An insertable catalog row. Only used by the seed/admin surface and tests; the production
/// catalog is maintained by another service.
#[derive(Debug, Clone)]
pub struct NewCatalogItem {
    pub name: String,
    pub item_type: String,
    pub rarity: String,
    pub price_credits: Coins,
    pub price_essence: Coins,
    pub stock: i64,
    pub limited_stock: bool,
    pub backorder: bool,
    pub active: bool,
    pub available_from: Option<DateTime<Utc>>,
    pub available_until: Option<DateTime<Utc>>,
    pub min_tier: i64,
    pub min_level: i64,
    pub daily_limit: Option<i64>,
    pub weekly_limit: Option<i64>,
    pub lifetime_limit: Option<i64>,
}

impl NewCatalogItem {
    pub fn new<S: Into<String>>(name: S, rarity: Rarity, price_credits: Coins) -> Self {
        Self {
            name: name.into(),
            item_type: "gear".to_string(),
            rarity: rarity.to_string(),
            price_credits,
            price_essence: Coins::ZERO,
            stock: 0,
            limited_stock: false,
            backorder: true,
            active: true,
            available_from: None,
            available_until: None,
            min_tier: 0,
            min_level: 0,
            daily_limit: None,
            weekly_limit: None,
            lifetime_limit: None,
        }
    }

    pub fn with_stock(mut self, stock: i64) -> Self {
        self.stock = stock;
        self.limited_stock = true;
        self
    }

    pub fn strict_stock(mut self) -> Self {
        self.backorder = false;
        self
    }

    pub fn with_essence_price(mut self, price: Coins) -> Self {
        self.price_essence = price;
        self
    }

    pub fn with_requirements(mut self, min_tier: i64, min_level: i64) -> Self {
        self.min_tier = min_tier;
        self.min_level = min_level;
        self
    }

    pub fn with_limits(mut self, daily: Option<i64>, weekly: Option<i64>, lifetime: Option<i64>) -> Self {
        self.daily_limit = daily;
        self.weekly_limit = weekly;
        self.lifetime_limit = lifetime;
        self
    }
}

//--------------------------------------       Balance         -------------------------------------------------------
/// A per-user, per-currency balance row. Mutations go through the conditional update in the
/// balances db module and are always paired with a `balance_log` row.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Balance {
    pub id: i64,
    pub user_id: i64,
    pub currency: String,
    pub balance: Coins,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------    PurchaseRecord     -------------------------------------------------------
/// Written once per completed order. Doubles as the idempotency record for completion and as
/// the source for purchase-velocity queries.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub id: i64,
    pub user_id: i64,
    pub item_id: i64,
    pub quantity: i64,
    pub order_ref: OrderId,
    pub paid_credits: Coins,
    pub paid_essence: Coins,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn order_state_round_trip() {
        for state in [
            OrderState::Placed,
            OrderState::Scheduled,
            OrderState::ReadyForPickup,
            OrderState::Completed,
            OrderState::CancelledRefund,
            OrderState::CancelledForfeit,
        ] {
            let s = state.to_string();
            assert_eq!(s.parse::<OrderState>().unwrap(), state);
        }
        assert!("Pending".parse::<OrderState>().is_err());
    }

    #[test]
    fn open_and_terminal_states() {
        assert!(OrderState::Placed.is_open());
        assert!(OrderState::Scheduled.is_open());
        assert!(!OrderState::ReadyForPickup.is_open());
        assert!(OrderState::Completed.is_terminal());
        assert!(OrderState::CancelledRefund.is_terminal());
        assert!(OrderState::CancelledForfeit.is_terminal());
        assert!(!OrderState::ReadyForPickup.is_terminal());
    }

    #[test]
    fn rarity_parsing_is_case_insensitive() {
        assert_eq!("Legendary".parse::<Rarity>().unwrap(), Rarity::Legendary);
        assert_eq!(" rare ".parse::<Rarity>().unwrap(), Rarity::Rare);
        assert!("mythic".parse::<Rarity>().is_err());
    }

    #[test]
    fn remaining_price_floors_at_zero() {
        let order = Order {
            id: 1,
            order_ref: OrderId::random(),
            user_id: 1,
            item_id: 1,
            quantity: 2,
            deposit_pct: 60,
            deposit_credits: Coins::from(500),
            deposit_essence: Coins::ZERO,
            expedite_spend: Coins::ZERO,
            price_credits: Coins::from(100),
            price_essence: Coins::ZERO,
            eta_at: Utc::now(),
            pickup_expires_at: None,
            state: OrderState::Scheduled,
            idempotency_key: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        // Deposit (500) exceeds the total (200); the remainder must not go negative.
        assert_eq!(order.remaining_credits(), Coins::ZERO);
        assert_eq!(order.total_credits(), Coins::from(200));
    }
}
