use anyhow::{Context, Result};
use sqlx::{QueryBuilder, Row, Sqlite, SqliteExecutor};

use crate::domain::{Cents, Transaction, TransactionQuery, UserId};

use super::{decode_date, encode_date};

/// Append-only audit log of signed balance deltas.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionLog;

impl TransactionLog {
    /// Append an entry and assign its id.
    pub async fn append<'e>(
        &self,
        executor: impl SqliteExecutor<'e>,
        entry: &mut Transaction,
    ) -> Result<()> {
        let row = sqlx::query(
            r#"
            INSERT INTO transactions (user_id, amount, date, message)
            VALUES (?, ?, ?, ?)
            RETURNING transaction_id
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.amount)
        .bind(encode_date(entry.date))
        .bind(&entry.message)
        .fetch_one(executor)
        .await
        .context("Failed to append transaction")?;

        entry.transaction_id = row.get("transaction_id");
        Ok(())
    }

    /// List a user's entries. Sorting goes through the allow-listed column enum; user id,
    /// limit and offset are bound parameters.
    pub async fn list<'e>(
        &self,
        executor: impl SqliteExecutor<'e>,
        query: &TransactionQuery,
    ) -> Result<Vec<Transaction>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT transaction_id, user_id, amount, date, message FROM transactions WHERE user_id = ",
        );
        builder.push_bind(query.user_id);

        builder.push(" ORDER BY ");
        if let Some(order) = query.order_by {
            builder
                .push(order.column.column())
                .push(" ")
                .push(order.direction.keyword())
                .push(", ");
        }
        builder.push("transaction_id");

        // SQLite needs a LIMIT clause for OFFSET; -1 is unbounded.
        let limit = if query.limit == 0 { -1 } else { query.limit };
        builder.push(" LIMIT ").push_bind(limit);
        builder.push(" OFFSET ").push_bind(query.offset);

        let rows = builder
            .build()
            .fetch_all(executor)
            .await
            .context("Failed to list transactions")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    /// Sum of amounts and number of entries for a user.
    pub async fn summarize<'e>(
        &self,
        executor: impl SqliteExecutor<'e>,
        user_id: UserId,
    ) -> Result<(Cents, i64)> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(amount), 0) AS total, COUNT(*) AS entries
            FROM transactions
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_one(executor)
        .await
        .context("Failed to summarize transactions")?;

        Ok((row.get("total"), row.get("entries")))
    }

    fn row_to_transaction(row: &sqlx::sqlite::SqliteRow) -> Result<Transaction> {
        let date_str: String = row.get("date");
        Ok(Transaction {
            transaction_id: row.get("transaction_id"),
            user_id: row.get("user_id"),
            amount: row.get("amount"),
            date: decode_date(&date_str).context("Invalid transaction date")?,
            message: row.get("message"),
        })
    }
}
