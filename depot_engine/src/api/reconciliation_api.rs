use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;

use crate::{
    order_objects::ReconciliationOutcome,
    traits::{OrderGatewayDatabase, OrderGatewayError},
};

/// The advisory lock name shared by every reconciler instance.
pub const RECONCILER_LOCK: &str = "depot.reconciler";

/// `ReconciliationApi` drives the periodic background passes that move orders through their
/// time-based states: promoting back-orders when stock returns, releasing due orders for pickup,
/// and forfeiting orders whose pickup window has lapsed.
///
/// Only one reconciler may run a cycle at a time across the whole deployment. Exclusion is by a
/// named advisory lock with a TTL, so a crashed holder's lock lapses on its own.
pub struct ReconciliationApi<B> {
    db: B,
    holder: String,
}

impl<B> Debug for ReconciliationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi({})", self.holder)
    }
}

impl<B> ReconciliationApi<B> {
    /// `holder` identifies this instance in the advisory lock table. It must be stable for the
    /// life of the process and unique across instances.
    pub fn new(db: B, holder: String) -> Self {
        Self { db, holder }
    }
}

impl<B> ReconciliationApi<B>
where B: OrderGatewayDatabase
{
    /// Runs one reconciliation cycle, if this instance can win the advisory lock.
    ///
    /// Returns `None` when another instance holds the lock (a normal outcome worth at most a
    /// debug line), and the tally of state changes otherwise. Each order is processed in its own
    /// transaction, so one poisoned order cannot wedge the whole pass.
    pub async fn run_cycle(&self, lock_ttl: Duration) -> Result<Option<ReconciliationOutcome>, OrderGatewayError> {
        if !self.db.try_acquire_named_lock(RECONCILER_LOCK, &self.holder, lock_ttl).await? {
            debug!("🔒️ Reconciliation lock is held elsewhere; skipping this cycle");
            return Ok(None);
        }
        let outcome = self.run_passes().await;
        if let Err(e) = self.db.release_named_lock(RECONCILER_LOCK, &self.holder).await {
            warn!("🔒️ Could not release the reconciliation lock (it will lapse by TTL): {e}");
        }
        outcome.map(Some)
    }

    async fn run_passes(&self) -> Result<ReconciliationOutcome, OrderGatewayError> {
        let now = Utc::now();
        let promoted = self.db.promote_backorders(now).await?;
        for order in &promoted {
            info!("🕰️ Back-order {} promoted to Scheduled (ETA {})", order.order_ref, order.eta_at);
        }
        let released = self.db.release_due_orders(now).await?;
        for order in &released {
            info!(
                "🕰️ Order {} is ready for pickup until {}",
                order.order_ref,
                order.pickup_expires_at.map(|t| t.to_string()).unwrap_or_else(|| "unknown".to_string())
            );
        }
        let forfeited = self.db.forfeit_lapsed_orders(now).await?;
        for order in &forfeited {
            info!("🕰️ Order {} lapsed its pickup window and was forfeited", order.order_ref);
        }
        let outcome = ReconciliationOutcome { promoted, released, forfeited };
        if !outcome.is_empty() {
            info!(
                "🕰️ Reconciliation cycle complete: {} promoted, {} released, {} forfeited",
                outcome.promoted.len(),
                outcome.released.len(),
                outcome.forfeited.len()
            );
        }
        Ok(outcome)
    }
}
