use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::time::Duration;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use crate::application::{AppError, LedgerConfig, LedgerService, OverdraftPolicy};
use crate::domain::{
    OrderRequest, TransactionOrder, TransactionQuery, TransferRequest, format_cents, parse_cents,
};
use crate::io::{write_report, write_transactions_json};

/// Saldo - user balances, order escrow and monthly service reports
#[derive(Parser)]
#[command(name = "saldo")]
#[command(about = "A balance ledger: accrue, reserve, charge, refund and transfer user funds")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "SALDO_DATABASE", default_value = "saldo.db")]
    pub database: String,

    /// Enable verbose (debug) logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Refuse blocks and transfers that would take a balance below zero
    #[arg(long, env = "SALDO_DENY_OVERDRAFT", global = true)]
    pub deny_overdraft: bool,

    /// Seconds a write waits for the database lock before failing
    #[arg(long, env = "SALDO_BUSY_TIMEOUT", default_value_t = 5, global = true)]
    pub busy_timeout_secs: u64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Credit funds to a user's balance (creates the user if needed)
    Accrue {
        user_id: i64,

        /// Amount to credit (e.g., "100" or "99.50")
        amount: String,

        /// Log message (defaults to "replenishment of the balance")
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Show a user's balance
    Balance { user_id: i64 },

    /// Reserve funds for a new order
    Block {
        order_id: i64,
        user_id: i64,
        service_id: i64,
        amount: String,
    },

    /// Charge a reserved order
    Charge {
        order_id: i64,
        user_id: i64,
        service_id: i64,
        amount: String,
    },

    /// Cancel a reserved order and refund its amount
    Unblock { order_id: i64 },

    /// Transfer funds between two users
    Transfer {
        sender_id: i64,
        receiver_id: i64,
        amount: String,
    },

    /// List a user's transactions
    Transactions {
        user_id: i64,

        /// Sort by "amount" or "date", optionally followed by "asc" or "desc"
        #[arg(long)]
        order_by: Option<String>,

        /// Maximum number of entries (0 = all)
        #[arg(short, long, default_value_t = 0)]
        limit: i64,

        /// Number of entries to skip
        #[arg(long, default_value_t = 0)]
        offset: i64,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Monthly per-service revenue report ("service_id;total" lines)
    Report {
        year: i32,
        month: u32,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Abort the scan after this many seconds
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
    },

    /// Show a single order
    Order { order_id: i64 },

    /// Check that a user's balance matches their transaction log
    Check { user_id: i64 },
}

impl Cli {
    /// Install the global tracing subscriber. `RUST_LOG` wins over `--verbose`.
    pub fn init_tracing(&self) {
        let default_level = if self.verbose { "debug" } else { "warn" };
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    pub fn ledger_config(&self) -> LedgerConfig {
        let overdraft = if self.deny_overdraft {
            OverdraftPolicy::Deny
        } else {
            OverdraftPolicy::Allow
        };
        LedgerConfig::default()
            .with_overdraft(overdraft)
            .with_busy_timeout(Duration::from_secs(self.busy_timeout_secs))
    }

    pub async fn run(self) -> Result<()> {
        let result = self.dispatch().await;
        if let Err(err) = &result {
            log_failure(err);
        }
        result
    }

    async fn dispatch(self) -> Result<()> {
        let config = self.ledger_config();
        let service = if matches!(self.command, Commands::Init) {
            LedgerService::init(&self.database, config).await?
        } else {
            LedgerService::connect(&self.database, config).await?
        };

        match self.command {
            Commands::Init => {
                println!("Database initialized: {}", self.database);
            }

            Commands::Accrue {
                user_id,
                amount,
                message,
            } => {
                let amount = parse_amount(&amount)?;
                let balance = service.accrue(user_id, amount, message).await?;
                println!(
                    "Credited {} to user {} (balance {})",
                    format_cents(amount),
                    user_id,
                    format_cents(balance.balance)
                );
            }

            Commands::Balance { user_id } => {
                let balance = service.get_balance(user_id).await?;
                println!(
                    "User {}: {}",
                    balance.user_id,
                    format_cents(balance.balance)
                );
            }

            Commands::Block {
                order_id,
                user_id,
                service_id,
                amount,
            } => {
                let request = order_request(order_id, user_id, service_id, &amount)?;
                let order = service.block_funds(request).await?;
                println!(
                    "Order {} created, {} reserved for service {}",
                    order.order_id,
                    format_cents(order.amount),
                    order.service_id
                );
            }

            Commands::Charge {
                order_id,
                user_id,
                service_id,
                amount,
            } => {
                let request = order_request(order_id, user_id, service_id, &amount)?;
                service.charge_funds(request).await?;
                println!("Funds for order {} charged", order_id);
            }

            Commands::Unblock { order_id } => {
                let refund = service.unblock_funds(order_id).await?;
                println!(
                    "Order {} cancelled, {} refunded to user {}",
                    refund.order_id,
                    format_cents(refund.amount),
                    refund.user_id
                );
            }

            Commands::Transfer {
                sender_id,
                receiver_id,
                amount,
            } => {
                let amount = parse_amount(&amount)?;
                let outcome = service
                    .transfer_funds(TransferRequest::new(sender_id, receiver_id, amount))
                    .await?;
                println!(
                    "Transferred {} from user {} to user {} (balances {} / {})",
                    format_cents(amount),
                    sender_id,
                    receiver_id,
                    format_cents(outcome.sender_balance),
                    format_cents(outcome.receiver_balance)
                );
            }

            Commands::Transactions {
                user_id,
                order_by,
                limit,
                offset,
                json,
            } => {
                let mut query = TransactionQuery::for_user(user_id)
                    .limit(limit)
                    .offset(offset);
                if let Some(order_by) = order_by {
                    let order = TransactionOrder::parse(&order_by).map_err(AppError::from)?;
                    query = query.order_by(order);
                }
                run_transactions_command(&service, &query, json).await?;
            }

            Commands::Report {
                year,
                month,
                output,
                timeout_secs,
            } => {
                run_report_command(&service, year, month, output.as_deref(), timeout_secs).await?;
            }

            Commands::Order { order_id } => {
                let order = service.get_order(order_id).await?;
                println!("Order {}", order.order_id);
                println!("  User:     {}", order.user_id);
                println!("  Service:  {}", order.service_id);
                println!("  Amount:   {}", format_cents(order.amount));
                println!("  Date:     {}", order.date.format("%Y-%m-%d %H:%M:%S"));
                println!("  State:    {}", order.state());
            }

            Commands::Check { user_id } => {
                let check = service.reconcile(user_id).await?;
                println!("User {}", check.user_id);
                println!("  Balance:      {}", format_cents(check.balance));
                println!("  Log total:    {}", format_cents(check.ledger_total));
                println!("  Log entries:  {}", check.entry_count);
                if check.is_consistent() {
                    println!("  Status:       OK");
                } else {
                    println!("  Status:       MISMATCH ({})", format_cents(check.drift()));
                }
            }
        }

        service.close().await;
        Ok(())
    }
}

async fn run_transactions_command(
    service: &LedgerService,
    query: &TransactionQuery,
    json: bool,
) -> Result<()> {
    let entries = service.get_user_transactions(query).await?;

    if json {
        return write_transactions_json(&entries, std::io::stdout().lock());
    }

    println!("{:<8} {:<20} {:>12} MESSAGE", "ID", "DATE", "AMOUNT");
    println!("{}", "-".repeat(70));
    for entry in &entries {
        println!(
            "{:<8} {:<20} {:>12} {}",
            entry.transaction_id,
            entry.date.format("%Y-%m-%d %H:%M:%S"),
            format_cents(entry.amount),
            entry.message
        );
    }
    Ok(())
}

async fn run_report_command(
    service: &LedgerService,
    year: i32,
    month: u32,
    output: Option<&str>,
    timeout_secs: u64,
) -> Result<()> {
    let report = tokio::time::timeout(
        Duration::from_secs(timeout_secs),
        service.get_report(year, month),
    )
    .await
    .map_err(|_| anyhow::anyhow!("Report generation timed out after {}s", timeout_secs))??;

    match output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            let lines = write_report(&report, file)?;
            println!(
                "Report for {}-{:02} written to {} ({} services, total {})",
                year,
                month,
                path,
                lines,
                format_cents(report.total())
            );
        }
        None => {
            write_report(&report, std::io::stdout().lock())?;
            println!();
        }
    }
    Ok(())
}

fn parse_amount(amount: &str) -> Result<i64> {
    parse_cents(amount)
        .with_context(|| format!("Invalid amount '{}'. Use '50.00' or '50'", amount))
}

fn order_request(
    order_id: i64,
    user_id: i64,
    service_id: i64,
    amount: &str,
) -> Result<OrderRequest> {
    Ok(OrderRequest {
        order_id,
        user_id,
        service_id,
        amount: parse_amount(amount)?,
    })
}

/// Domain and validation failures are the caller's problem and get a short line; storage
/// failures are logged with the full chain, which the printed message leaves out.
fn log_failure(err: &anyhow::Error) {
    match err.downcast_ref::<AppError>() {
        Some(AppError::Storage(inner)) => {
            error!(detail = %format!("{:#}", inner), "storage failure")
        }
        Some(app_err) => warn!(kind = ?app_err.kind(), "{}", app_err),
        None => error!("{:#}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cli(db_path: &str, args: &[&str]) -> Cli {
        let mut argv = vec!["saldo", "--database", db_path];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[tokio::test]
    async fn test_init_then_accrue() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("cli.db");
        let db_path = db_path.to_str().unwrap();

        cli(db_path, &["init"]).run().await.unwrap();
        assert!(temp_dir.path().join("cli.db").exists());

        cli(db_path, &["accrue", "3", "12.50"]).run().await.unwrap();
        cli(db_path, &["block", "1", "3", "2", "2.50"])
            .run()
            .await
            .unwrap();

        let service = LedgerService::connect(db_path, LedgerConfig::default())
            .await
            .unwrap();
        assert_eq!(service.get_balance(3).await.unwrap().balance, 1000);
        service.close().await;
    }

    #[tokio::test]
    async fn test_commands_other_than_init_need_a_database() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("missing.db");

        let path = db_path.to_str().unwrap();

        let result = cli(path, &["balance", "1"]).run().await;
        assert!(result.is_err());
        assert!(!db_path.exists());
    }

    #[test]
    fn test_global_flags_build_config() {
        let args = ["--deny-overdraft", "--busy-timeout-secs", "9", "balance", "1"];
        let config = cli("x.db", &args).ledger_config();
        assert_eq!(config.overdraft, OverdraftPolicy::Deny);
        assert_eq!(config.busy_timeout, Duration::from_secs(9));
    }
}
