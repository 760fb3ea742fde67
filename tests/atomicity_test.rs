mod common;

use anyhow::Result;
use common::{balance_of, execute_sql, order, test_service};
use saldo::application::{AppError, ErrorKind};
use saldo::domain::{BalanceOverflow, OrderState, TransactionQuery, TransferRequest};

const REJECT_ALL_LOG_ENTRIES: &str = r#"
    CREATE TRIGGER reject_log BEFORE INSERT ON transactions
    BEGIN
        SELECT RAISE(ABORT, 'transaction log unavailable');
    END;
"#;

fn assert_storage_failure(err: &AppError) {
    assert!(matches!(err, AppError::Storage(_)), "got {:?}", err);
    assert_eq!(err.kind(), ErrorKind::Storage);
    assert_eq!(err.to_string(), "storage failure");
}

fn assert_overflow(err: &AppError, user_id: i64) {
    match err {
        AppError::BalanceOverflow(overflow) => assert_eq!(overflow.user_id, user_id),
        other => panic!("expected balance overflow, got {:?}", other),
    }
    assert_eq!(err.kind(), ErrorKind::Domain);
}

async fn log_len(service: &saldo::LedgerService, user_id: i64) -> Result<usize> {
    match service
        .get_user_transactions(&TransactionQuery::for_user(user_id))
        .await
    {
        Ok(entries) => Ok(entries.len()),
        Err(AppError::NoTransactions(_)) => Ok(0),
        Err(err) => Err(err.into()),
    }
}

// ========================
// Failing log writes
// ========================

#[tokio::test]
async fn test_accrual_rolls_back_when_log_write_fails() -> Result<()> {
    let (service, temp) = test_service().await?;
    service.accrue(1, 500, None).await?;
    execute_sql(&temp, REJECT_ALL_LOG_ENTRIES).await?;

    let err = service.accrue(1, 100, None).await.unwrap_err();
    assert_storage_failure(&err);
    assert_eq!(balance_of(&service, 1).await?, 500);

    // A user created by the failed unit must not survive either
    let err = service.accrue(2, 100, None).await.unwrap_err();
    assert_storage_failure(&err);
    assert!(matches!(
        service.get_balance(2).await.unwrap_err(),
        AppError::UserNotFound(2)
    ));

    Ok(())
}

#[tokio::test]
async fn test_block_rolls_back_when_log_write_fails() -> Result<()> {
    let (service, temp) = test_service().await?;
    service.accrue(1, 500, None).await?;
    execute_sql(&temp, REJECT_ALL_LOG_ENTRIES).await?;

    let err = service.block_funds(order(1, 1, 1, 200)).await.unwrap_err();
    assert_storage_failure(&err);

    assert_eq!(balance_of(&service, 1).await?, 500);
    assert!(matches!(
        service.get_order(1).await.unwrap_err(),
        AppError::OrderNotFound(1)
    ));
    assert_eq!(log_len(&service, 1).await?, 1);

    Ok(())
}

#[tokio::test]
async fn test_unblock_rolls_back_when_log_write_fails() -> Result<()> {
    let (service, temp) = test_service().await?;
    service.accrue(1, 500, None).await?;
    service.block_funds(order(1, 1, 1, 200)).await?;
    execute_sql(&temp, REJECT_ALL_LOG_ENTRIES).await?;

    let err = service.unblock_funds(1).await.unwrap_err();
    assert_storage_failure(&err);

    assert_eq!(balance_of(&service, 1).await?, 300);
    let stored = service.get_order(1).await?;
    assert_eq!(stored.state(), OrderState::Reserved);
    assert_eq!(stored.amount, 200);

    Ok(())
}

#[tokio::test]
async fn test_transfer_rolls_back_when_receiver_log_write_fails() -> Result<()> {
    let (service, temp) = test_service().await?;
    service.accrue(1, 500, None).await?;
    service.accrue(2, 100, None).await?;

    // Fails on the last statement of the unit, after both balances have moved
    execute_sql(
        &temp,
        r#"
        CREATE TRIGGER reject_incoming BEFORE INSERT ON transactions
        WHEN NEW.amount > 0
        BEGIN
            SELECT RAISE(ABORT, 'transaction log unavailable');
        END;
        "#,
    )
    .await?;

    let err = service
        .transfer_funds(TransferRequest::new(1, 2, 150))
        .await
        .unwrap_err();
    assert_storage_failure(&err);

    assert_eq!(balance_of(&service, 1).await?, 500);
    assert_eq!(balance_of(&service, 2).await?, 100);
    assert_eq!(log_len(&service, 1).await?, 1);
    assert_eq!(log_len(&service, 2).await?, 1);

    Ok(())
}

// ========================
// Balances at the i64 edge
// ========================

#[tokio::test]
async fn test_accrual_past_max_balance_is_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;

    service.accrue(1, i64::MAX, None).await?;
    let err = service.accrue(1, 1, None).await.unwrap_err();
    assert_overflow(&err, 1);

    assert_eq!(balance_of(&service, 1).await?, i64::MAX);
    assert_eq!(log_len(&service, 1).await?, 1);

    Ok(())
}

#[tokio::test]
async fn test_block_past_min_balance_is_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service.accrue(1, 1, None).await?;

    service.block_funds(order(1, 1, 1, i64::MAX)).await?;
    assert_eq!(balance_of(&service, 1).await?, 1 - i64::MAX);

    let err = service
        .block_funds(order(2, 1, 1, i64::MAX))
        .await
        .unwrap_err();
    assert_overflow(&err, 1);

    assert_eq!(balance_of(&service, 1).await?, 1 - i64::MAX);
    assert!(matches!(
        service.get_order(2).await.unwrap_err(),
        AppError::OrderNotFound(2)
    ));
    assert_eq!(log_len(&service, 1).await?, 2);

    Ok(())
}

#[tokio::test]
async fn test_transfer_into_full_balance_is_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service.accrue(1, 10, None).await?;
    service.accrue(2, i64::MAX, None).await?;

    let err = service
        .transfer_funds(TransferRequest::new(1, 2, 5))
        .await
        .unwrap_err();
    assert_overflow(&err, 2);

    assert_eq!(balance_of(&service, 1).await?, 10);
    assert_eq!(balance_of(&service, 2).await?, i64::MAX);
    assert_eq!(log_len(&service, 1).await?, 1);

    Ok(())
}

#[tokio::test]
async fn test_refund_into_full_balance_is_rejected() -> Result<()> {
    let (service, temp) = test_service().await?;
    service.accrue(1, 10, None).await?;
    service.block_funds(order(1, 1, 1, 5)).await?;
    execute_sql(
        &temp,
        "UPDATE users SET balance = 9223372036854775807 WHERE user_id = 1",
    )
    .await?;

    let err = service.unblock_funds(1).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::BalanceOverflow(BalanceOverflow { user_id: 1 })
    ));

    assert_eq!(balance_of(&service, 1).await?, i64::MAX);
    assert_eq!(service.get_order(1).await?.state(), OrderState::Reserved);

    Ok(())
}
