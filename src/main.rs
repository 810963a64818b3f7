use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cashpoint::application::coordinator::Coordinator;
use cashpoint::domain::account::Amount;
use cashpoint::domain::ports::{AccountStore, SharedStore};
use cashpoint::domain::transaction::{Outcome, TransactionId, TransactionType};
use cashpoint::error::AtmError;
use cashpoint::infrastructure::in_memory::InMemoryStore;
use cashpoint::infrastructure::seed::seed_sample_accounts;
use cashpoint::interfaces::csv::operation_reader::{
    OperationKind, OperationReader, OperationRecord,
};
use cashpoint::interfaces::csv::report_writer::ReportWriter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input ATM operation script (CSV)
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let store: SharedStore = match cli.db_path {
        Some(path) => open_persistent_store(path)?,
        None => Arc::new(InMemoryStore::new()),
    };

    let seeded = seed_sample_accounts(store.as_ref()).await.into_diagnostic()?;
    if seeded > 0 {
        info!(accounts = seeded, "provisioned sample accounts");
    }

    let coordinator = Coordinator::new(store.clone());
    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = OperationReader::new(file);

    // Binds script-local handles to the journal ids assigned at runtime.
    let mut handles: HashMap<u32, (TransactionType, TransactionId)> = HashMap::new();

    for row in reader.operations() {
        match row {
            Ok(record) => {
                if let Err(e) = run_operation(&coordinator, &mut handles, record).await {
                    error!(error = %e, "operation failed");
                }
            }
            Err(e) => {
                error!(error = %e, "skipping malformed script row");
            }
        }
    }

    let accounts = store.all().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());
    writer.write_accounts(&accounts).into_diagnostic()?;

    Ok(())
}

#[cfg(feature = "storage-rocksdb")]
fn open_persistent_store(path: PathBuf) -> Result<SharedStore> {
    use cashpoint::infrastructure::rocksdb::RocksDbStore;
    let store = RocksDbStore::open(path).into_diagnostic()?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_persistent_store(_path: PathBuf) -> Result<SharedStore> {
    Err(miette::miette!(
        "--db-path requires this binary to be built with the storage-rocksdb feature"
    ))
}

async fn run_operation(
    coordinator: &Coordinator,
    handles: &mut HashMap<u32, (TransactionType, TransactionId)>,
    record: OperationRecord,
) -> cashpoint::error::Result<()> {
    match record.op {
        OperationKind::Withdraw => {
            let account = require(record.account, "withdraw requires an account")?;
            let amount = Amount::new(require(record.amount, "withdraw requires an amount")?)?;
            let transaction = coordinator.initiate_withdrawal(account, amount).await?;
            if let Some(handle) = record.handle {
                handles.insert(handle, (TransactionType::Withdrawal, transaction.id));
            }
        }
        OperationKind::Deposit => {
            let account = require(record.account, "deposit requires an account")?;
            let amount = Amount::new(require(record.amount, "deposit requires an amount")?)?;
            let transaction = coordinator.initiate_deposit(account, amount).await?;
            if let Some(handle) = record.handle {
                handles.insert(handle, (TransactionType::Deposit, transaction.id));
            }
        }
        OperationKind::Complete => {
            let handle = require(record.handle, "complete requires a handle")?;
            let outcome: Outcome =
                require(record.outcome, "complete requires an outcome")?.parse()?;
            let (kind, transaction_id) = *handles
                .get(&handle)
                .ok_or_else(|| AtmError::Validation(format!("unknown handle: {handle}")))?;
            match kind {
                TransactionType::Withdrawal => {
                    coordinator
                        .complete_withdrawal(transaction_id, outcome, record.reason)
                        .await?;
                }
                TransactionType::Deposit => {
                    coordinator
                        .complete_deposit(transaction_id, outcome, record.reason)
                        .await?;
                }
                TransactionType::BalanceInquiry => {
                    return Err(AtmError::Validation(format!(
                        "handle {handle} does not refer to a completable transaction"
                    )));
                }
            }
        }
        OperationKind::Balance => {
            let account = require(record.account, "balance requires an account")?;
            let summary = coordinator.balance(account).await?;
            info!(
                account,
                card = %summary.masked_card_number,
                balance = %summary.balance,
                available = %summary.available_balance,
                remaining_limit = %summary.remaining_daily_limit,
                "balance inquiry"
            );
        }
        OperationKind::History => {
            let account = require(record.account, "history requires an account")?;
            let entries = coordinator.history(account).await?;
            info!(account, entries = entries.len(), "transaction history");
        }
    }
    Ok(())
}

fn require<T>(value: Option<T>, message: &str) -> cashpoint::error::Result<T> {
    value.ok_or_else(|| AtmError::Validation(message.to_string()))
}
