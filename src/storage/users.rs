use anyhow::{Context, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor};

use crate::domain::{BalanceOverflow, Cents, UserBalance, UserId};

/// Balance rows, one per user.
///
/// Every method runs a single statement, so it accepts either the pool or an open
/// transaction as executor.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserStore;

impl UserStore {
    /// Add `amount` to the user's balance, creating the row with `balance = amount` if absent.
    /// Returns the new balance.
    ///
    /// SQLite turns an overflowing integer sum into REAL. The balance methods report that as
    /// [`BalanceOverflow`]; the caller must roll the unit back.
    pub async fn credit_or_create<'e>(
        &self,
        executor: impl SqliteExecutor<'e>,
        user_id: UserId,
        amount: Cents,
    ) -> Result<Cents> {
        let row = sqlx::query(
            r#"
            INSERT INTO users (user_id, balance)
            VALUES (?, ?)
            ON CONFLICT(user_id) DO UPDATE SET balance = balance + excluded.balance
            RETURNING balance
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .fetch_one(executor)
        .await
        .context("Failed to credit or create user balance")?;

        decode_balance(&row, user_id)
    }

    /// Add `amount` to an existing balance. `None` when the user does not exist.
    pub async fn credit<'e>(
        &self,
        executor: impl SqliteExecutor<'e>,
        user_id: UserId,
        amount: Cents,
    ) -> Result<Option<Cents>> {
        let row = sqlx::query(
            "UPDATE users SET balance = balance + ? WHERE user_id = ? RETURNING balance",
        )
        .bind(amount)
        .bind(user_id)
        .fetch_optional(executor)
        .await
        .context("Failed to credit user balance")?;

        row.map(|r| decode_balance(&r, user_id)).transpose()
    }

    /// Subtract `amount` from an existing balance without any floor.
    /// `None` when the user does not exist. Overdraft policy is the caller's concern.
    pub async fn debit<'e>(
        &self,
        executor: impl SqliteExecutor<'e>,
        user_id: UserId,
        amount: Cents,
    ) -> Result<Option<Cents>> {
        let row = sqlx::query(
            "UPDATE users SET balance = balance - ? WHERE user_id = ? RETURNING balance",
        )
        .bind(amount)
        .bind(user_id)
        .fetch_optional(executor)
        .await
        .context("Failed to debit user balance")?;

        row.map(|r| decode_balance(&r, user_id)).transpose()
    }

    pub async fn get_balance<'e>(
        &self,
        executor: impl SqliteExecutor<'e>,
        user_id: UserId,
    ) -> Result<Option<UserBalance>> {
        let row = sqlx::query("SELECT user_id, balance FROM users WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(executor)
            .await
            .context("Failed to fetch user balance")?;

        row.map(|r| {
            Ok(UserBalance {
                user_id: r.get("user_id"),
                balance: decode_balance(&r, user_id)?,
            })
        })
        .transpose()
    }
}

fn decode_balance(row: &SqliteRow, user_id: UserId) -> Result<Cents> {
    row.try_get::<i64, _>("balance")
        .map_err(|_| BalanceOverflow { user_id }.into())
}
