use depot_engine::{db_types::Order, OrderGatewayDatabase, ReconciliationApi};
use log::*;
use rand::Rng;
use tokio::task::JoinHandle;

use crate::config::ServerConfig;

/// Starts the reconciliation worker. Do not await the returned JoinHandle, as it will run
/// indefinitely.
///
/// Every tick, the worker sleeps a random jitter and then attempts one reconciliation cycle. A
/// cycle that loses the advisory lock race is skipped quietly; errors are logged and the loop
/// carries on to the next tick.
pub fn start_reconciler<B>(db: B, config: &ServerConfig) -> JoinHandle<()>
where B: OrderGatewayDatabase + Send + Sync + 'static {
    let interval = config.worker_interval;
    let jitter = config.worker_jitter;
    let lock_ttl = config.lock_ttl;
    let api = ReconciliationApi::new(db, config.instance_id.clone());
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        info!("🕰️ Order reconciliation worker started ({api:?})");
        loop {
            timer.tick().await;
            if !jitter.is_zero() {
                let delay = rand::thread_rng().gen_range(std::time::Duration::ZERO..jitter);
                tokio::time::sleep(delay).await;
            }
            debug!("🕰️ Running order reconciliation cycle");
            match api.run_cycle(lock_ttl).await {
                Ok(Some(outcome)) => {
                    if !outcome.is_empty() {
                        info!(
                            "🕰️ Reconciliation: {} promoted, {} released, {} forfeited",
                            outcome.promoted.len(),
                            outcome.released.len(),
                            outcome.forfeited.len()
                        );
                        debug!("🕰️ Promoted back-orders: {}", order_list(&outcome.promoted));
                        debug!("🕰️ Released for pickup: {}", order_list(&outcome.released));
                        debug!("🕰️ Forfeited: {}", order_list(&outcome.forfeited));
                    }
                },
                Ok(None) => debug!("🕰️ Another instance ran this cycle"),
                Err(e) => error!("🕰️ Error running reconciliation cycle: {e}"),
            }
        }
    })
}

fn order_list(orders: &[Order]) -> String {
    orders
        .iter()
        .map(|o| format!("[{}] order_ref: {} user: {}", o.id, o.order_ref, o.user_id))
        .collect::<Vec<String>>()
        .join(", ")
}
