use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Cents;

pub type UserId = i64;

/// Current spendable balance of a user.
///
/// Rows are created implicitly by the first accrual and are never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBalance {
    pub user_id: UserId,
    pub balance: Cents,
}

/// Result of comparing a user's stored balance against the sum of their log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub user_id: UserId,
    pub balance: Cents,
    pub ledger_total: Cents,
    pub entry_count: i64,
}

impl Reconciliation {
    pub fn is_consistent(&self) -> bool {
        self.balance == self.ledger_total
    }

    /// Stored balance minus the log total; zero when consistent.
    pub fn drift(&self) -> Cents {
        self.balance.saturating_sub(self.ledger_total)
    }
}

/// A credit or debit would take the balance outside the `i64` cent range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("balance of user {user_id} would leave the representable range")]
pub struct BalanceOverflow {
    pub user_id: UserId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconciliation_drift() {
        let ok = Reconciliation {
            user_id: 1,
            balance: 6000,
            ledger_total: 6000,
            entry_count: 3,
        };
        assert!(ok.is_consistent());
        assert_eq!(ok.drift(), 0);

        let off = Reconciliation {
            ledger_total: 5000,
            ..ok
        };
        assert!(!off.is_consistent());
        assert_eq!(off.drift(), 1000);
    }
}
