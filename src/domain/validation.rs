//! Input checks that run before any storage access. Pure functions, no I/O.

use thiserror::Error;

use super::{Cents, OrderId, OrderRequest, ServiceId, TransactionQuery, TransferRequest, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("the amount of funds must be greater than 0")]
    NonPositiveAmount,

    #[error("user id must not be less than 1")]
    InvalidUserId,

    #[error("service id must not be less than 1")]
    InvalidServiceId,

    #[error("order id must not be less than 1")]
    InvalidOrderId,

    #[error("sender id must not be less than 1")]
    InvalidSenderId,

    #[error("receiver id must not be less than 1")]
    InvalidReceiverId,

    #[error("sender and receiver must be different users")]
    SelfTransfer,

    #[error("limit must not be negative")]
    NegativeLimit,

    #[error("offset must not be negative")]
    NegativeOffset,

    #[error("cannot order transactions by '{0}'; use amount or date, optionally asc or desc")]
    InvalidOrderBy(String),

    #[error("year must not be less than 2007, got {0}")]
    YearTooEarly(i32),

    #[error("year {0} is out of range")]
    YearOutOfRange(i32),

    #[error("month must be between 1 and 12, got {0}")]
    InvalidMonth(u32),
}

pub fn validate_amount(amount: Cents) -> Result<(), ValidationError> {
    if amount <= 0 {
        return Err(ValidationError::NonPositiveAmount);
    }
    Ok(())
}

pub fn validate_user_id(user_id: UserId) -> Result<(), ValidationError> {
    if user_id < 1 {
        return Err(ValidationError::InvalidUserId);
    }
    Ok(())
}

pub fn validate_order_id(order_id: OrderId) -> Result<(), ValidationError> {
    if order_id < 1 {
        return Err(ValidationError::InvalidOrderId);
    }
    Ok(())
}

pub fn validate_service_id(service_id: ServiceId) -> Result<(), ValidationError> {
    if service_id < 1 {
        return Err(ValidationError::InvalidServiceId);
    }
    Ok(())
}

pub fn validate_accrual(user_id: UserId, amount: Cents) -> Result<(), ValidationError> {
    validate_amount(amount)?;
    validate_user_id(user_id)
}

/// Shared by Block and Charge. Checks amount first, then user, service and order ids.
pub fn validate_order_request(request: &OrderRequest) -> Result<(), ValidationError> {
    validate_amount(request.amount)?;
    validate_user_id(request.user_id)?;
    validate_service_id(request.service_id)?;
    validate_order_id(request.order_id)
}

pub fn validate_transfer(request: &TransferRequest) -> Result<(), ValidationError> {
    if request.sender_id < 1 {
        return Err(ValidationError::InvalidSenderId);
    }
    if request.receiver_id < 1 {
        return Err(ValidationError::InvalidReceiverId);
    }
    validate_amount(request.amount)?;
    if request.sender_id == request.receiver_id {
        return Err(ValidationError::SelfTransfer);
    }
    Ok(())
}

pub fn validate_transaction_query(query: &TransactionQuery) -> Result<(), ValidationError> {
    validate_user_id(query.user_id)?;
    if query.limit < 0 {
        return Err(ValidationError::NegativeLimit);
    }
    if query.offset < 0 {
        return Err(ValidationError::NegativeOffset);
    }
    Ok(())
}
