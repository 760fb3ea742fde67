use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqliteConnection};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::{
    Cents, Clock, MSG_PAYMENT_CANCELLED, MSG_REPLENISHMENT, MSG_SERVICE_PAYMENT, Order, OrderId,
    OrderRequest, Reconciliation, Refund, ReportPeriod, ServiceReport, SystemClock, Transaction,
    TransactionQuery, TransferOutcome, TransferRequest, UserBalance, UserId, validate_accrual,
    validate_order_id, validate_order_request, validate_transaction_query, validate_transfer,
    validate_user_id,
};
use crate::storage::Repository;

use super::{AppError, LedgerConfig, OverdraftPolicy};

/// Application service providing the ledger operations.
///
/// Every mutating operation validates its input, then runs as one SQLite transaction that
/// either commits completely or is rolled back before the error is returned. Nothing here
/// retries: a debit or credit replayed without a deduplication key would apply twice.
pub struct LedgerService {
    repo: Repository,
    clock: Arc<dyn Clock>,
    config: LedgerConfig,
}

impl LedgerService {
    /// Create a new ledger service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self {
            repo,
            clock: Arc::new(SystemClock),
            config: LedgerConfig::default(),
        }
    }

    /// Create (if needed) and migrate the database at the given path.
    pub async fn init(database_path: &str, config: LedgerConfig) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url, config.busy_timeout).await?;
        Ok(Self::new(repo).with_config(config))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str, config: LedgerConfig) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url, config.busy_timeout).await?;
        Ok(Self::new(repo).with_config(config))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_config(mut self, config: LedgerConfig) -> Self {
        self.config = config;
        self
    }

    pub async fn close(&self) {
        self.repo.close().await;
    }

    // ========================
    // Balance operations
    // ========================

    /// Credit a user's balance, creating the user on first accrual.
    pub async fn accrue(
        &self,
        user_id: UserId,
        amount: Cents,
        message: Option<String>,
    ) -> Result<UserBalance, AppError> {
        validate_accrual(user_id, amount)?;

        let message = message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| MSG_REPLENISHMENT.to_string());
        let entry = Transaction::new(user_id, amount, self.clock.now_secs(), message);

        let mut tx = self.repo.begin().await?;
        let outcome = self.accrue_in(&mut tx, entry).await;
        let balance = Self::finish(tx, outcome, "accrual").await?;

        info!(user_id, amount, balance, "funds accrued");
        Ok(UserBalance { user_id, balance })
    }

    async fn accrue_in(
        &self,
        conn: &mut SqliteConnection,
        mut entry: Transaction,
    ) -> Result<Cents, AppError> {
        let balance = self
            .repo
            .users
            .credit_or_create(&mut *conn, entry.user_id, entry.amount)
            .await?;
        self.repo.transactions.append(&mut *conn, &mut entry).await?;
        Ok(balance)
    }

    /// Current balance of an existing user.
    pub async fn get_balance(&self, user_id: UserId) -> Result<UserBalance, AppError> {
        validate_user_id(user_id)?;

        let balance = self
            .repo
            .users
            .get_balance(self.repo.pool(), user_id)
            .await?
            .ok_or(AppError::UserNotFound(user_id))?;

        debug!(user_id, balance = balance.balance, "balance read");
        Ok(balance)
    }

    /// Move funds between two existing users. Both log entries and both balance changes
    /// commit together or not at all.
    pub async fn transfer_funds(
        &self,
        request: TransferRequest,
    ) -> Result<TransferOutcome, AppError> {
        validate_transfer(&request)?;

        let now = self.clock.now_secs();
        let mut tx = self.repo.begin().await?;
        let outcome = self.transfer_in(&mut tx, &request, now).await;
        let result = Self::finish(tx, outcome, "transfer").await;

        match &result {
            Ok(balances) => info!(
                sender_id = request.sender_id,
                receiver_id = request.receiver_id,
                amount = request.amount,
                sender_balance = balances.sender_balance,
                "transfer committed"
            ),
            Err(err) => warn!(
                sender_id = request.sender_id,
                receiver_id = request.receiver_id,
                error = %err,
                "transfer rejected"
            ),
        }
        result
    }

    async fn transfer_in(
        &self,
        conn: &mut SqliteConnection,
        request: &TransferRequest,
        now: DateTime<Utc>,
    ) -> Result<TransferOutcome, AppError> {
        let sender_balance = self
            .repo
            .users
            .debit(&mut *conn, request.sender_id, request.amount)
            .await?
            .ok_or(AppError::SenderNotFound(request.sender_id))?;
        self.check_overdraft(request.sender_id, sender_balance, request.amount)?;

        let mut outgoing = Transaction::new(
            request.sender_id,
            -request.amount,
            now,
            request.outgoing_message(),
        );
        self.repo
            .transactions
            .append(&mut *conn, &mut outgoing)
            .await?;

        let receiver_balance = self
            .repo
            .users
            .credit(&mut *conn, request.receiver_id, request.amount)
            .await?
            .ok_or(AppError::ReceiverNotFound(request.receiver_id))?;

        let mut incoming = Transaction::new(
            request.receiver_id,
            request.amount,
            now,
            request.incoming_message(),
        );
        self.repo
            .transactions
            .append(&mut *conn, &mut incoming)
            .await?;

        Ok(TransferOutcome {
            sender_balance,
            receiver_balance,
        })
    }

    // ========================
    // Order operations
    // ========================

    /// Reserve funds for a new order: debit the user, record the order as blocked and log
    /// the payment.
    pub async fn block_funds(&self, request: OrderRequest) -> Result<Order, AppError> {
        validate_order_request(&request)?;

        let order = Order::reserved(&request, self.clock.now_secs());
        let mut tx = self.repo.begin().await?;
        let outcome = self.block_in(&mut tx, &order).await;
        let balance = match Self::finish(tx, outcome, "block").await {
            Ok(balance) => balance,
            Err(err) => {
                warn!(
                    order_id = order.order_id,
                    user_id = order.user_id,
                    error = %err,
                    "block rejected"
                );
                return Err(err);
            }
        };

        info!(
            order_id = order.order_id,
            user_id = order.user_id,
            service_id = order.service_id,
            amount = order.amount,
            balance,
            "funds blocked"
        );
        Ok(order)
    }

    async fn block_in(
        &self,
        conn: &mut SqliteConnection,
        order: &Order,
    ) -> Result<Cents, AppError> {
        let balance = self
            .repo
            .users
            .debit(&mut *conn, order.user_id, order.amount)
            .await?
            .ok_or(AppError::UserNotFound(order.user_id))?;
        self.check_overdraft(order.user_id, balance, order.amount)?;

        if self.repo.orders.exists(&mut *conn, order.order_id).await? {
            return Err(AppError::OrderAlreadyExists(order.order_id));
        }
        self.repo.orders.insert(&mut *conn, order).await?;

        let mut entry = Transaction::new(
            order.user_id,
            -order.amount,
            order.date,
            MSG_SERVICE_PAYMENT,
        );
        self.repo.transactions.append(&mut *conn, &mut entry).await?;
        Ok(balance)
    }

    /// Finalize a reserved order. The balance is untouched: the funds left at block time.
    ///
    /// Fails with [`AppError::OrderNotFound`] if no blocked order matches all four fields,
    /// which covers a second charge of the same order.
    pub async fn charge_funds(&self, request: OrderRequest) -> Result<(), AppError> {
        validate_order_request(&request)?;

        let charged = self
            .repo
            .orders
            .mark_charged(self.repo.pool(), &request)
            .await?;
        if !charged {
            warn!(
                order_id = request.order_id,
                "charge rejected: no matching reserved order"
            );
            return Err(AppError::OrderNotFound(request.order_id));
        }

        info!(
            order_id = request.order_id,
            user_id = request.user_id,
            service_id = request.service_id,
            amount = request.amount,
            "order charged"
        );
        Ok(())
    }

    /// Cancel a reserved order and return its amount to the user.
    ///
    /// Amount and user are taken from the order row. Orders that were already charged or
    /// cancelled are refused, so a second unblock changes nothing.
    pub async fn unblock_funds(&self, order_id: OrderId) -> Result<Refund, AppError> {
        validate_order_id(order_id)?;

        let now = self.clock.now_secs();
        let mut tx = self.repo.begin().await?;
        let outcome = self.unblock_in(&mut tx, order_id, now).await;
        let (refund, balance) = match Self::finish(tx, outcome, "unblock").await {
            Ok(done) => done,
            Err(err) => {
                warn!(order_id, error = %err, "unblock rejected");
                return Err(err);
            }
        };

        info!(
            order_id,
            user_id = refund.user_id,
            amount = refund.amount,
            balance,
            "order cancelled, funds returned"
        );
        Ok(refund)
    }

    async fn unblock_in(
        &self,
        conn: &mut SqliteConnection,
        order_id: OrderId,
        now: DateTime<Utc>,
    ) -> Result<(Refund, Cents), AppError> {
        let refund = self
            .repo
            .orders
            .release(&mut *conn, order_id)
            .await?
            .ok_or(AppError::OrderNotUnblockable(order_id))?;

        let balance = self
            .repo
            .users
            .credit(&mut *conn, refund.user_id, refund.amount)
            .await?
            .ok_or(AppError::UserNotFound(refund.user_id))?;

        let mut entry =
            Transaction::new(refund.user_id, refund.amount, now, MSG_PAYMENT_CANCELLED);
        self.repo.transactions.append(&mut *conn, &mut entry).await?;
        Ok((refund, balance))
    }

    /// Look up a single order.
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order, AppError> {
        validate_order_id(order_id)?;

        self.repo
            .orders
            .get(self.repo.pool(), order_id)
            .await?
            .ok_or(AppError::OrderNotFound(order_id))
    }

    // ========================
    // Log and reporting
    // ========================

    /// A page of the user's log entries. An empty page is reported as
    /// [`AppError::NoTransactions`].
    pub async fn get_user_transactions(
        &self,
        query: &TransactionQuery,
    ) -> Result<Vec<Transaction>, AppError> {
        validate_transaction_query(query)?;

        let entries = self
            .repo
            .transactions
            .list(self.repo.pool(), query)
            .await?;
        if entries.is_empty() {
            return Err(AppError::NoTransactions(query.user_id));
        }

        debug!(user_id = query.user_id, count = entries.len(), "transactions listed");
        Ok(entries)
    }

    /// Per-service totals of non-zero orders dated in the given month.
    ///
    /// A month without usage is [`AppError::NoReportData`], not an empty report.
    pub async fn get_report(&self, year: i32, month: u32) -> Result<ServiceReport, AppError> {
        let period = ReportPeriod::new(year, month)?;
        let (from, to) = period.bounds()?;

        let totals = self
            .repo
            .orders
            .service_totals(self.repo.pool(), from, to)
            .await?;
        if totals.is_empty() {
            return Err(AppError::NoReportData { year, month });
        }

        info!(year, month, services = totals.len(), "report generated");
        Ok(ServiceReport { period, totals })
    }

    /// Compare a user's balance with the sum of their log entries, read from one snapshot.
    pub async fn reconcile(&self, user_id: UserId) -> Result<Reconciliation, AppError> {
        validate_user_id(user_id)?;

        let mut tx = self.repo.begin().await?;
        let balance = self.repo.users.get_balance(&mut *tx, user_id).await?;
        let (ledger_total, entry_count) =
            self.repo.transactions.summarize(&mut *tx, user_id).await?;
        tx.commit().await.context("Failed to finish reconciliation read")?;

        let balance = balance.ok_or(AppError::UserNotFound(user_id))?;
        let reconciliation = Reconciliation {
            user_id,
            balance: balance.balance,
            ledger_total,
            entry_count,
        };

        if !reconciliation.is_consistent() {
            warn!(
                user_id,
                balance = reconciliation.balance,
                ledger_total,
                "balance does not match transaction log"
            );
        }
        Ok(reconciliation)
    }

    // ========================
    // Helpers
    // ========================

    fn check_overdraft(
        &self,
        user_id: UserId,
        balance_after: Cents,
        amount: Cents,
    ) -> Result<(), AppError> {
        if self.config.overdraft == OverdraftPolicy::Deny && balance_after < 0 {
            return Err(AppError::InsufficientFunds {
                user_id,
                balance: balance_after.saturating_add(amount),
                required: amount,
            });
        }
        Ok(())
    }

    /// Commit on success; on failure roll back before handing the error back.
    async fn finish<T>(
        tx: sqlx::Transaction<'static, Sqlite>,
        outcome: Result<T, AppError>,
        operation: &'static str,
    ) -> Result<T, AppError> {
        match outcome {
            Ok(value) => {
                tx.commit()
                    .await
                    .with_context(|| format!("Failed to commit {}", operation))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(operation, error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }
}
