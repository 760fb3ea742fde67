use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Cents, UserId, ValidationError};

pub type TransactionId = i64;

pub const MSG_REPLENISHMENT: &str = "replenishment of the balance";
pub const MSG_SERVICE_PAYMENT: &str = "service payment";
pub const MSG_PAYMENT_CANCELLED: &str = "cancellation of service payment";

/// One entry of the append-only audit log.
/// The sign of `amount` encodes direction: positive credits, negative debits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: TransactionId,
    pub user_id: UserId,
    pub amount: Cents,
    pub date: DateTime<Utc>,
    pub message: String,
}

impl Transaction {
    /// Build an entry. The id is assigned by the log on append.
    pub fn new(
        user_id: UserId,
        amount: Cents,
        date: DateTime<Utc>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            transaction_id: 0,
            user_id,
            amount,
            date,
            message: message.into(),
        }
    }
}

/// Columns a transaction listing may be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    Amount,
    Date,
}

impl SortColumn {
    pub fn column(&self) -> &'static str {
        match self {
            SortColumn::Amount => "amount",
            SortColumn::Date => "date",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn keyword(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Ordering for transaction listings, restricted to known columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionOrder {
    pub column: SortColumn,
    pub direction: SortDirection,
}

impl TransactionOrder {
    /// Parse forms like `amount`, `date desc`, `AMOUNT ASC`.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidOrderBy(input.to_string());
        let mut words = input.split_whitespace();

        let column = match words.next().map(str::to_lowercase).as_deref() {
            Some("amount") => SortColumn::Amount,
            Some("date") => SortColumn::Date,
            _ => return Err(invalid()),
        };
        let direction = match words.next().map(str::to_lowercase).as_deref() {
            None | Some("asc") => SortDirection::Asc,
            Some("desc") => SortDirection::Desc,
            Some(_) => return Err(invalid()),
        };
        if words.next().is_some() {
            return Err(invalid());
        }

        Ok(Self { column, direction })
    }
}

/// Listing request for a user's transactions. `limit == 0` means no limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionQuery {
    pub user_id: UserId,
    pub order_by: Option<TransactionOrder>,
    pub limit: i64,
    pub offset: i64,
}

impl TransactionQuery {
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id,
            order_by: None,
            limit: 0,
            offset: 0,
        }
    }

    pub fn order_by(mut self, order: TransactionOrder) -> Self {
        self.order_by = Some(order);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_order_by() {
        assert_eq!(
            TransactionOrder::parse("amount").unwrap(),
            TransactionOrder {
                column: SortColumn::Amount,
                direction: SortDirection::Asc
            }
        );
        assert_eq!(
            TransactionOrder::parse("  DATE   desc ").unwrap(),
            TransactionOrder {
                column: SortColumn::Date,
                direction: SortDirection::Desc
            }
        );
    }

    #[test]
    fn test_parse_order_by_rejects_unknown_input() {
        for input in [
            "",
            "balance",
            "amount sideways",
            "date desc, user_id",
            "amount; DROP TABLE users",
            "amount desc limit",
        ] {
            assert_eq!(
                TransactionOrder::parse(input),
                Err(ValidationError::InvalidOrderBy(input.to_string())),
                "input {input:?}"
            );
        }
    }

    #[test]
    fn test_new_entry_has_no_id_yet() {
        let debit = Transaction::new(1, -500, Utc::now(), MSG_SERVICE_PAYMENT);
        assert_eq!(debit.transaction_id, 0);
        assert_eq!(debit.amount, -500);
        assert_eq!(debit.message, "service payment");
    }
}
