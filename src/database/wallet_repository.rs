use crate::database::error::DatabaseError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};

/// Outcome of an idempotent top-up credit.
#[derive(Debug, Clone)]
pub struct TopUpCredit {
    /// False when this authorization id was already credited; the
    /// balance is untouched in that case.
    pub credited: bool,
    pub balance: Decimal,
}

#[async_trait]
pub trait WalletStore: Send + Sync {
    /// Credit a top-up onto the user's balance at most once per payment
    /// authorization id. The top-up ledger insert and the balance update
    /// commit in one transaction, so a replayed webhook can never
    /// double-credit.
    async fn credit_topup(
        &self,
        payment_intent_id: &str,
        user_id: &str,
        amount: Decimal,
    ) -> Result<TopUpCredit, DatabaseError>;

    async fn balance_of(&self, user_id: &str) -> Result<Decimal, DatabaseError>;
}

pub struct PgWalletStore {
    pool: PgPool,
}

impl PgWalletStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WalletStore for PgWalletStore {
    async fn credit_topup(
        &self,
        payment_intent_id: &str,
        user_id: &str,
        amount: Decimal,
    ) -> Result<TopUpCredit, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let inserted = sqlx::query(
            "INSERT INTO wallet_topups (payment_intent_id, user_id, amount) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (payment_intent_id) DO NOTHING",
        )
        .bind(payment_intent_id)
        .bind(user_id)
        .bind(amount)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if inserted.rows_affected() == 0 {
            // Already credited by a prior delivery; report current balance.
            tx.rollback().await.map_err(DatabaseError::from_sqlx)?;
            let balance = self.balance_of(user_id).await?;
            return Ok(TopUpCredit {
                credited: false,
                balance,
            });
        }

        let row = sqlx::query(
            "INSERT INTO wallet_balances (user_id, balance) \
             VALUES ($1, $2) \
             ON CONFLICT (user_id) DO UPDATE \
             SET balance = wallet_balances.balance + EXCLUDED.balance, updated_at = NOW() \
             RETURNING balance",
        )
        .bind(user_id)
        .bind(amount)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let balance: Decimal = row.try_get("balance").map_err(DatabaseError::from_sqlx)?;

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;

        Ok(TopUpCredit {
            credited: true,
            balance,
        })
    }

    async fn balance_of(&self, user_id: &str) -> Result<Decimal, DatabaseError> {
        let row = sqlx::query("SELECT balance FROM wallet_balances WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        match row {
            Some(row) => row.try_get("balance").map_err(DatabaseError::from_sqlx),
            None => Ok(Decimal::ZERO),
        }
    }
}
