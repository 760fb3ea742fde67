use std::time::Duration;

/// Whether debits (Block, Transfer) may take a balance below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverdraftPolicy {
    /// Debit unconditionally; balances may go negative.
    #[default]
    Allow,
    /// Reject a debit that would leave the balance below zero.
    Deny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerConfig {
    pub overdraft: OverdraftPolicy,
    /// How long a writer waits for the SQLite lock before the unit fails.
    pub busy_timeout: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            overdraft: OverdraftPolicy::default(),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl LedgerConfig {
    pub fn with_overdraft(mut self, overdraft: OverdraftPolicy) -> Self {
        self.overdraft = overdraft;
        self
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }
}
