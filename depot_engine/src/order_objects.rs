use chrono::{DateTime, Utc};
use depot_common::Coins;
use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderState};

//--------------------------------------  CreateOrderRequest   -------------------------------------------------------
/// A purchase request. The authenticated identity (and its tier/level, which the session layer
/// owns) is supplied by the caller; the engine never resolves identity itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: i64,
    pub user_tier: i64,
    pub user_level: i64,
    pub item_id: i64,
    pub quantity: i64,
    /// Essence to spend at creation to shorten the lead time. Zero means no expedite.
    #[serde(default)]
    pub expedite_spend: Coins,
    /// Optional caller-supplied token making a retried request observe the original result.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl CreateOrderRequest {
    pub fn new(user_id: i64, item_id: i64, quantity: i64) -> Self {
        Self { user_id, user_tier: 0, user_level: 0, item_id, quantity, expedite_spend: Coins::ZERO, idempotency_key: None }
    }

    pub fn with_profile(mut self, tier: i64, level: i64) -> Self {
        self.user_tier = tier;
        self.user_level = level;
        self
    }

    pub fn with_expedite(mut self, essence: Coins) -> Self {
        self.expedite_spend = essence;
        self
    }

    pub fn with_idempotency_key<S: Into<String>>(mut self, key: S) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

//--------------------------------------     CreatedOrder      -------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedOrder {
    pub order: Order,
    /// False when an idempotency key matched an existing order and no side effects were applied.
    pub freshly_created: bool,
    pub expedited: bool,
}

//--------------------------------------   OrderQueryFilter    -------------------------------------------------------
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderQueryFilter {
    pub item_id: Option<i64>,
    pub states: Option<Vec<OrderState>>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl OrderQueryFilter {
    pub fn with_item_id(mut self, item_id: i64) -> Self {
        self.item_id = Some(item_id);
        self
    }

    pub fn with_state(mut self, state: OrderState) -> Self {
        self.states.get_or_insert_with(Vec::new).push(state);
        self
    }

    pub fn paged(mut self, limit: i64, offset: i64) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.item_id.is_none() &&
            self.states.as_ref().map(|s| s.is_empty()).unwrap_or(true) &&
            self.since.is_none() &&
            self.until.is_none()
    }
}

//--------------------------------------     OrderSummary      -------------------------------------------------------
/// An order annotated for display: the item's name/type and millisecond countdowns. Countdowns
/// are only present while they are meaningful and positive; an elapsed timer is omitted rather
/// than reported as negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order: Order,
    pub item_name: String,
    pub item_type: String,
    /// Milliseconds until `eta_at`. Only populated while the order is `Scheduled`.
    pub ready_in_ms: Option<i64>,
    /// Milliseconds until the pickup window closes. Only populated while `ReadyForPickup`.
    pub pickup_expires_in_ms: Option<i64>,
}

impl OrderSummary {
    pub fn annotate(order: Order, item_name: String, item_type: String, now: DateTime<Utc>) -> Self {
        let ready_in_ms = match order.state {
            OrderState::Scheduled => positive_millis(order.eta_at, now),
            _ => None,
        };
        let pickup_expires_in_ms = match order.state {
            OrderState::ReadyForPickup => order.pickup_expires_at.and_then(|t| positive_millis(t, now)),
            _ => None,
        };
        Self { order, item_name, item_type, ready_in_ms, pickup_expires_in_ms }
    }
}

fn positive_millis(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Option<i64> {
    let ms = (deadline - now).num_milliseconds();
    (ms > 0).then_some(ms)
}

//--------------------------------------    CompletedOrder     -------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedOrder {
    pub order: Order,
    pub items_minted: i64,
    /// The balance charged at pickup, per currency (the deposit is not included here).
    pub paid_credits: Coins,
    pub paid_essence: Coins,
    /// False when an idempotency key matched an existing purchase record.
    pub freshly_completed: bool,
}

//--------------------------------------    ExpeditedOrder     -------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpeditedOrder {
    pub order: Order,
    pub total_expedite_spend: Coins,
    pub new_eta: DateTime<Utc>,
}

//--------------------------------------    CancelledOrder     -------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelledOrder {
    pub order: Order,
    pub refund_credits: Coins,
    pub refund_essence: Coins,
}

//-------------------------------------- ReconciliationOutcome -------------------------------------------------------
/// The result of one full reconciliation cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconciliationOutcome {
    /// Back-ordered (`Placed`) orders that acquired a reservation this cycle.
    pub promoted: Vec<Order>,
    /// `Scheduled` orders whose ETA elapsed and are now ready for pickup.
    pub released: Vec<Order>,
    /// `ReadyForPickup` orders whose pickup window lapsed.
    pub forfeited: Vec<Order>,
}

impl ReconciliationOutcome {
    pub fn total_count(&self) -> usize {
        self.promoted.len() + self.released.len() + self.forfeited.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_count() == 0
    }
}
