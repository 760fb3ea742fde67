// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use saldo::application::{LedgerConfig, LedgerService};
use saldo::domain::{ManualClock, OrderRequest};
use saldo::storage::Repository;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    test_service_with(LedgerConfig::default()).await
}

pub async fn test_service_with(config: LedgerConfig) -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = LedgerService::init(db_path.to_str().unwrap(), config).await?;
    Ok((service, temp_dir))
}

/// Test service whose timestamps come from the returned clock
pub async fn test_service_at(
    start: DateTime<Utc>,
) -> Result<(LedgerService, Arc<ManualClock>, TempDir)> {
    let (service, temp_dir) = test_service().await?;
    let clock = Arc::new(ManualClock::new(start));
    let service = service.with_clock(clock.clone());
    Ok((service, clock, temp_dir))
}

/// Helper to parse a date-time string ("%Y-%m-%d %H:%M:%S") into DateTime<Utc>
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .unwrap()
        .and_utc()
}

/// Helper to parse a date string into DateTime<Utc>
pub fn parse_date(date_str: &str) -> DateTime<Utc> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

/// Run raw SQL against the test database through a second connection, bypassing the service
pub async fn execute_sql(temp_dir: &TempDir, sql: &str) -> Result<()> {
    let db_path = temp_dir.path().join("test.db");
    let url = format!("sqlite:{}", db_path.to_str().unwrap());
    let repo = Repository::connect(&url, Duration::from_secs(5)).await?;
    sqlx::query(sql).execute(repo.pool()).await?;
    repo.close().await;
    Ok(())
}

pub fn order(order_id: i64, user_id: i64, service_id: i64, amount: i64) -> OrderRequest {
    OrderRequest {
        order_id,
        user_id,
        service_id,
        amount,
    }
}

pub async fn balance_of(service: &LedgerService, user_id: i64) -> Result<i64> {
    Ok(service.get_balance(user_id).await?.balance)
}
