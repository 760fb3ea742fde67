use serde::{Deserialize, Serialize};

use super::{Cents, UserId};

/// A movement of funds from one user's balance to another's.
/// Executed as one unit: a debit entry for the sender and a credit entry for the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub amount: Cents,
}

impl TransferRequest {
    pub fn new(sender_id: UserId, receiver_id: UserId, amount: Cents) -> Self {
        Self {
            sender_id,
            receiver_id,
            amount,
        }
    }

    /// Log message for the sender's debit entry.
    pub fn outgoing_message(&self) -> String {
        format!("outgoing transfer to user {}", self.receiver_id)
    }

    /// Log message for the receiver's credit entry.
    pub fn incoming_message(&self) -> String {
        format!("incoming transfer from user {}", self.sender_id)
    }
}

/// Balances of both participants after a committed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub sender_balance: Cents,
    pub receiver_balance: Cents,
}
