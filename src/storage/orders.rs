use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection, SqliteExecutor};
use std::collections::BTreeMap;

use crate::domain::{Cents, Order, OrderId, OrderRequest, Refund, ServiceId};

use super::{decode_date, encode_date};

/// Order rows and their reservation state.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderStore;

impl OrderStore {
    pub async fn exists<'e>(
        &self,
        executor: impl SqliteExecutor<'e>,
        order_id: OrderId,
    ) -> Result<bool> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM orders WHERE order_id = ?) AS found")
            .bind(order_id)
            .fetch_one(executor)
            .await
            .context("Failed to check order existence")?;

        Ok(row.get::<i64, _>("found") != 0)
    }

    pub async fn insert<'e>(&self, executor: impl SqliteExecutor<'e>, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (order_id, user_id, service_id, amount, date, blocked)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(order.order_id)
        .bind(order.user_id)
        .bind(order.service_id)
        .bind(order.amount)
        .bind(encode_date(order.date))
        .bind(order.blocked)
        .execute(executor)
        .await
        .context("Failed to insert order")?;
        Ok(())
    }

    pub async fn get<'e>(
        &self,
        executor: impl SqliteExecutor<'e>,
        order_id: OrderId,
    ) -> Result<Option<Order>> {
        let row = sqlx::query(
            r#"
            SELECT order_id, user_id, service_id, amount, date, blocked
            FROM orders
            WHERE order_id = ?
            "#,
        )
        .bind(order_id)
        .fetch_optional(executor)
        .await
        .context("Failed to fetch order")?;

        row.as_ref().map(Self::row_to_order).transpose()
    }

    /// Flip a reserved order to charged. Only a row matching every field of `request`
    /// while still blocked is touched; returns whether one was.
    pub async fn mark_charged<'e>(
        &self,
        executor: impl SqliteExecutor<'e>,
        request: &OrderRequest,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET blocked = 0
            WHERE order_id = ? AND user_id = ? AND service_id = ? AND amount = ? AND blocked = 1
            "#,
        )
        .bind(request.order_id)
        .bind(request.user_id)
        .bind(request.service_id)
        .bind(request.amount)
        .execute(executor)
        .await
        .context("Failed to charge order")?;

        Ok(result.rows_affected() == 1)
    }

    /// Cancel a reserved order: unblock it and zero its amount.
    ///
    /// Returns the refund read from the row, or `None` if the order is missing or already
    /// charged/cancelled. Must run inside a transaction; the claiming write comes first so the
    /// write lock is held before anything is read.
    pub async fn release(
        &self,
        conn: &mut SqliteConnection,
        order_id: OrderId,
    ) -> Result<Option<Refund>> {
        let claimed = sqlx::query(
            r#"
            UPDATE orders
            SET blocked = 0
            WHERE order_id = ? AND blocked = 1 AND amount <> 0
            RETURNING order_id, user_id, amount
            "#,
        )
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to claim order for cancellation")?;

        let Some(row) = claimed else {
            return Ok(None);
        };
        let refund = Refund {
            order_id: row.get("order_id"),
            user_id: row.get("user_id"),
            amount: row.get("amount"),
        };

        sqlx::query("UPDATE orders SET amount = 0 WHERE order_id = ?")
            .bind(order_id)
            .execute(&mut *conn)
            .await
            .context("Failed to zero cancelled order")?;

        Ok(Some(refund))
    }

    /// Sum non-zero order amounts per service for orders dated in `[from, to)`.
    pub async fn service_totals<'e>(
        &self,
        executor: impl SqliteExecutor<'e>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<BTreeMap<ServiceId, Cents>> {
        let rows = sqlx::query(
            r#"
            SELECT service_id, SUM(amount) AS total
            FROM orders
            WHERE date >= ? AND date < ? AND amount <> 0
            GROUP BY service_id
            ORDER BY service_id
            "#,
        )
        .bind(encode_date(from))
        .bind(encode_date(to))
        .fetch_all(executor)
        .await
        .context("Failed to aggregate orders by service")?;

        Ok(rows
            .iter()
            .map(|row| (row.get("service_id"), row.get("total")))
            .collect())
    }

    fn row_to_order(row: &sqlx::sqlite::SqliteRow) -> Result<Order> {
        let date_str: String = row.get("date");
        Ok(Order {
            order_id: row.get("order_id"),
            user_id: row.get("user_id"),
            service_id: row.get("service_id"),
            amount: row.get("amount"),
            date: decode_date(&date_str).context("Invalid order date")?,
            blocked: row.get::<i64, _>("blocked") != 0,
        })
    }
}
