use depot_common::{Coins, Currency};

use crate::{
    db_types::{Balance, OrderId},
    traits::OrderGatewayError,
};

/// The per-user, per-currency balance ledger.
///
/// Balances never go negative: debits are conditional and fail with `InsufficientFunds` when
/// the balance cannot cover the amount. Every mutation writes a paired audit row carrying the
/// signed delta, a reason, and (when relevant) the order reference.
#[allow(async_fn_in_trait)]
pub trait BalanceManagement {
    /// Fetches the balance row for the user/currency pair, creating a zero balance if none
    /// exists yet.
    async fn fetch_or_create_balance(&self, user_id: i64, currency: Currency) -> Result<Balance, OrderGatewayError>;

    /// Whether the user's balance covers `amount`. A zero amount is always covered.
    async fn has_enough(&self, user_id: i64, currency: Currency, amount: Coins) -> Result<bool, OrderGatewayError>;

    /// Adds `amount` to the balance. Fails with `InvalidAmount` if `amount` is negative.
    async fn credit(
        &self,
        user_id: i64,
        currency: Currency,
        amount: Coins,
        reason: &str,
        order_ref: Option<&OrderId>,
    ) -> Result<Balance, OrderGatewayError>;

    /// Subtracts `amount` from the balance, failing with `InsufficientFunds` when the balance
    /// would go negative.
    async fn debit(
        &self,
        user_id: i64,
        currency: Currency,
        amount: Coins,
        reason: &str,
        order_ref: Option<&OrderId>,
    ) -> Result<Balance, OrderGatewayError>;
}
