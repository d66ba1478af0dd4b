//! Economy formulas and their tunable constants.
//!
//! Every tunable lives in the settings table so operators can adjust the economy without a
//! redeploy, and every tunable has a hardcoded fallback so a missing or malformed row can never
//! break an order flow. The struct is loaded per operation; there is no long-lived cache.
use depot_common::Coins;

use crate::db_types::Rarity;

/// Settings-table keys for the economy tunables.
pub mod keys {
    pub const DEPOSIT_PCT_PREFIX: &str = "deposit_pct.";
    pub const ETA_BASE_MINUTES_PREFIX: &str = "eta.base_minutes.";
    pub const EXPEDITE_K: &str = "expedite.k";
    pub const EXPEDITE_CAP_PCT: &str = "expedite.cap_pct";
    pub const PICKUP_WINDOW_HOURS: &str = "pickup.window_hours";
    pub const CANCEL_FEE_PCT: &str = "fees.cancel_pct";
    pub const FORFEIT_FEE_PCT: &str = "fees.forfeit_pct";
    pub const MAX_OPEN_ORDERS: &str = "limits.max_open_orders";
    pub const MAX_OPEN_PER_ITEM: &str = "limits.max_open_per_item";
}

const DEPOSIT_PCT_FLOOR: i64 = 10;
const DEPOSIT_PCT_CEIL: i64 = 90;

/// A snapshot of the economy tunables. `Default` carries the hardcoded fallbacks; the settings
/// loader overrides whichever keys are present.
#[derive(Debug, Clone, PartialEq)]
pub struct EconomyTuning {
    pub deposit_pct_common: i64,
    pub deposit_pct_rare: i64,
    pub deposit_pct_epic: i64,
    pub deposit_pct_legendary: i64,
    pub eta_minutes_common: i64,
    pub eta_minutes_rare: i64,
    pub eta_minutes_epic: i64,
    pub eta_minutes_legendary: i64,
    /// Applied to tiers the engine does not recognise.
    pub eta_minutes_default: i64,
    pub expedite_k: f64,
    pub expedite_cap_pct: i64,
    pub pickup_window_hours: i64,
    /// Deducted from the refund when cancelling an order that already holds a reservation.
    pub cancel_fee_pct: i64,
    /// Deducted from the deposit refund when a ready order is never picked up.
    pub forfeit_fee_pct: i64,
    pub max_open_orders: i64,
    pub max_open_per_item: i64,
}

impl Default for EconomyTuning {
    fn default() -> Self {
        Self {
            deposit_pct_common: 30,
            deposit_pct_rare: 40,
            deposit_pct_epic: 50,
            deposit_pct_legendary: 60,
            eta_minutes_common: 15,
            eta_minutes_rare: 120,
            eta_minutes_epic: 480,
            eta_minutes_legendary: 1440,
            eta_minutes_default: 60,
            expedite_k: 0.1,
            expedite_cap_pct: 85,
            pickup_window_hours: 6,
            cancel_fee_pct: 10,
            forfeit_fee_pct: 20,
            max_open_orders: 5,
            max_open_per_item: 2,
        }
    }
}

impl EconomyTuning {
    /// Deposit percentage for a rarity tier, clamped to [10, 90]. Unrecognised tiers pay the
    /// common-tier deposit.
    pub fn deposit_pct(&self, rarity: Option<Rarity>) -> i64 {
        let pct = match rarity {
            Some(Rarity::Common) | None => self.deposit_pct_common,
            Some(Rarity::Rare) => self.deposit_pct_rare,
            Some(Rarity::Epic) => self.deposit_pct_epic,
            Some(Rarity::Legendary) => self.deposit_pct_legendary,
        };
        pct.clamp(DEPOSIT_PCT_FLOOR, DEPOSIT_PCT_CEIL)
    }

    /// Base lead time in minutes for a rarity tier, before any expedite is applied.
    pub fn base_eta_minutes(&self, rarity: Option<Rarity>) -> i64 {
        match rarity {
            Some(Rarity::Common) => self.eta_minutes_common,
            Some(Rarity::Rare) => self.eta_minutes_rare,
            Some(Rarity::Epic) => self.eta_minutes_epic,
            Some(Rarity::Legendary) => self.eta_minutes_legendary,
            None => self.eta_minutes_default,
        }
    }

    /// The fraction of the base wait removed by spending `essence`, with diminishing returns:
    /// `min(cap/100, 1 − 1/(1 + k·e))`. Each additional unit of essence buys less reduction,
    /// and the cap guarantees a floor on the wait regardless of spend.
    pub fn expedite_reduction(&self, essence: Coins) -> f64 {
        let e = essence.value().max(0) as f64;
        let cap = (self.expedite_cap_pct as f64 / 100.0).clamp(0.0, 1.0);
        let reduction = 1.0 - 1.0 / (1.0 + self.expedite_k * e);
        reduction.min(cap)
    }

    /// Final wait in minutes for the given tier and total expedite spend. Never below 1 minute.
    pub fn wait_minutes(&self, rarity: Option<Rarity>, expedite_spend: Coins) -> i64 {
        let base = self.base_eta_minutes(rarity);
        let reduction = self.expedite_reduction(expedite_spend);
        let scaled = (base as f64 * (1.0 - reduction)).floor() as i64;
        scaled.max(1)
    }
}

#[cfg(test)]
mod test {
    use depot_common::Coins;

    use super::EconomyTuning;
    use crate::db_types::Rarity;

    #[test]
    fn fallback_deposit_percentages() {
        let t = EconomyTuning::default();
        assert_eq!(t.deposit_pct(Some(Rarity::Common)), 30);
        assert_eq!(t.deposit_pct(Some(Rarity::Rare)), 40);
        assert_eq!(t.deposit_pct(Some(Rarity::Epic)), 50);
        assert_eq!(t.deposit_pct(Some(Rarity::Legendary)), 60);
        // Unknown tiers pay the common deposit.
        assert_eq!(t.deposit_pct(None), 30);
    }

    #[test]
    fn deposit_pct_is_clamped() {
        let mut t = EconomyTuning::default();
        t.deposit_pct_common = 5;
        t.deposit_pct_legendary = 95;
        assert_eq!(t.deposit_pct(Some(Rarity::Common)), 10);
        assert_eq!(t.deposit_pct(Some(Rarity::Legendary)), 90);
    }

    #[test]
    fn fallback_eta_minutes() {
        let t = EconomyTuning::default();
        assert_eq!(t.base_eta_minutes(Some(Rarity::Common)), 15);
        assert_eq!(t.base_eta_minutes(Some(Rarity::Rare)), 120);
        assert_eq!(t.base_eta_minutes(Some(Rarity::Epic)), 480);
        assert_eq!(t.base_eta_minutes(Some(Rarity::Legendary)), 1440);
        assert_eq!(t.base_eta_minutes(None), 60);
    }

    #[test]
    fn zero_spend_means_no_reduction() {
        let t = EconomyTuning::default();
        assert_eq!(t.expedite_reduction(Coins::ZERO), 0.0);
        assert_eq!(t.wait_minutes(Some(Rarity::Rare), Coins::ZERO), 120);
    }

    #[test]
    fn expedite_is_monotonic_with_diminishing_returns() {
        let t = EconomyTuning::default();
        let mut last_wait = i64::MAX;
        let mut last_gain = i64::MAX;
        let mut prev = t.wait_minutes(Some(Rarity::Legendary), Coins::ZERO);
        for spend in [1, 5, 10, 50, 100, 500, 1000] {
            let wait = t.wait_minutes(Some(Rarity::Legendary), Coins::from(spend));
            assert!(wait <= last_wait, "wait must never increase with spend");
            let gain = prev - wait;
            assert!(gain <= last_gain || gain == 0, "each step should buy no more than the last");
            last_wait = wait;
            last_gain = gain.max(1);
            prev = wait;
        }
    }

    #[test]
    fn cap_bounds_the_reduction() {
        let t = EconomyTuning::default();
        // An absurd spend cannot push the reduction past the cap...
        let reduction = t.expedite_reduction(Coins::from(10_000_000));
        assert!((reduction - 0.85).abs() < f64::EPSILON);
        // ...so the wait never drops below base × (1 − cap), and never below one minute.
        let wait = t.wait_minutes(Some(Rarity::Legendary), Coins::from(10_000_000));
        assert_eq!(wait, (1440.0_f64 * 0.15).floor() as i64);
        assert!(t.wait_minutes(Some(Rarity::Common), Coins::from(10_000_000)) >= 1);
    }
}
