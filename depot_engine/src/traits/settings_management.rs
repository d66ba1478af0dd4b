use crate::{helpers::EconomyTuning, traits::OrderGatewayError};

/// Keyed configuration consulted by the formulas and the reconciliation passes.
///
/// Lookups fail soft: an absent or malformed value yields `None`, and the caller falls back to
/// the hardcoded default. Values are re-read per operation rather than cached.
#[allow(async_fn_in_trait)]
pub trait SettingsManagement {
    async fn get_int(&self, key: &str) -> Result<Option<i64>, OrderGatewayError>;

    async fn get_float(&self, key: &str) -> Result<Option<f64>, OrderGatewayError>;

    /// Writes a setting. Exposed for the (out-of-scope) admin surface and tests.
    async fn set_setting(&self, key: &str, value: &str) -> Result<(), OrderGatewayError>;

    /// Loads the full economy tuning snapshot, applying fallbacks for missing keys.
    async fn economy_tuning(&self) -> Result<EconomyTuning, OrderGatewayError>;
}
