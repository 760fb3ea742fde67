use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Cents, UserId};

pub type OrderId = i64;
pub type ServiceId = i64;

/// Lifecycle position of an order, derived from its `blocked` flag and amount.
///
/// `Reserved` is the only non-terminal state: it moves to `Charged` or `Cancelled` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderState {
    /// Funds left the balance and are held for the order.
    Reserved,
    /// Funds were earned; the amount is kept for reporting.
    Charged,
    /// Funds went back to the user; the amount was zeroed.
    Cancelled,
}

impl OrderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::Reserved => "reserved",
            OrderState::Charged => "charged",
            OrderState::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A service order paid from a user's balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub service_id: ServiceId,
    pub amount: Cents,
    pub date: DateTime<Utc>,
    pub blocked: bool,
}

impl Order {
    /// A freshly reserved order.
    pub fn reserved(request: &OrderRequest, date: DateTime<Utc>) -> Self {
        Self {
            order_id: request.order_id,
            user_id: request.user_id,
            service_id: request.service_id,
            amount: request.amount,
            date,
            blocked: true,
        }
    }

    pub fn state(&self) -> OrderState {
        if self.blocked {
            OrderState::Reserved
        } else if self.amount == 0 {
            OrderState::Cancelled
        } else {
            OrderState::Charged
        }
    }
}

/// Caller-supplied order coordinates used by Block and Charge.
///
/// Charge matches a stored row on all four fields; the client never controls the
/// `blocked` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub service_id: ServiceId,
    pub amount: Cents,
}

/// What an Unblock gave back, read from the order row rather than trusted from the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refund {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub amount: Cents,
}
