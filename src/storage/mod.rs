mod orders;
mod repository;
mod transactions;
mod users;

pub use orders::*;
pub use repository::*;
pub use transactions::*;
pub use users::*;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

/// SQL migration for the initial schema
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");

/// Dates are stored as `YYYY-MM-DDTHH:MM:SSZ` so string order is time order.
pub(crate) fn encode_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub(crate) fn decode_date(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("Invalid timestamp '{}'", value))?
        .with_timezone(&Utc))
}
