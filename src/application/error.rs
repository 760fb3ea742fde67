use thiserror::Error;

use crate::domain::{BalanceOverflow, Cents, OrderId, UserId, ValidationError};

/// Coarse classification used by transports to pick a response class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input, rejected before touching storage.
    Validation,
    /// Well-formed input that the current ledger state refuses.
    Domain,
    /// The store failed; the unit was rolled back.
    Storage,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("user with id {0} does not exist")]
    UserNotFound(UserId),

    #[error("sender with id {0} does not exist")]
    SenderNotFound(UserId),

    #[error("receiver with id {0} does not exist")]
    ReceiverNotFound(UserId),

    #[error("order does not exist")]
    OrderNotFound(OrderId),

    #[error("order {0} already exists")]
    OrderAlreadyExists(OrderId),

    #[error("cannot unblock order {0}: it does not exist or is already charged or cancelled")]
    OrderNotUnblockable(OrderId),

    #[error("insufficient funds for user {user_id}: balance {balance}, required {required}")]
    InsufficientFunds {
        user_id: UserId,
        balance: Cents,
        required: Cents,
    },

    #[error("users did not use the services in {year}-{month:02}")]
    NoReportData { year: i32, month: u32 },

    #[error("user {0} has no transactions")]
    NoTransactions(UserId),

    #[error(transparent)]
    BalanceOverflow(BalanceOverflow),

    /// Query text and driver details stay in the source chain, not in the message.
    #[error("storage failure")]
    Storage(#[source] anyhow::Error),
}

/// Storage code reports through `anyhow`; overflow is the one typed failure it can raise that
/// belongs to the caller rather than the store.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<BalanceOverflow>() {
            Some(overflow) => AppError::BalanceOverflow(*overflow),
            None => AppError::Storage(err),
        }
    }
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::Storage(_) => ErrorKind::Storage,
            _ => ErrorKind::Domain,
        }
    }

    /// True when the caller can fix the request; false for server-side failures.
    pub fn is_client_error(&self) -> bool {
        self.kind() != ErrorKind::Storage
    }
}
