use clap::Parser;
use miette::{IntoDiagnostic, Result};
use payledger::application::settlement::{OrderRequest, SettlementEngine};
use payledger::config::SettlementConfig;
use payledger::domain::order::OrderRef;
use payledger::domain::ports::{AccountStore, SettlementStoreHandle};
use payledger::infrastructure::in_memory::InMemoryStore;
use payledger::infrastructure::notifier::TracingNotifier;
use payledger::interfaces::csv::account_writer::AccountWriter;
use payledger::interfaces::csv::command_reader::{CommandReader, LedgerCommand};
use payledger::telemetry;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, warn};

#[cfg(feature = "storage-rocksdb")]
use payledger::infrastructure::rocksdb::RocksDBStore;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input commands CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "PAYLEDGER_DB_PATH")]
    db_path: Option<PathBuf>,

    /// JSON file with pricing and reconciliation settings.
    #[arg(long, env = "PAYLEDGER_CONFIG")]
    config: Option<PathBuf>,
}

fn open_store(db_path: Option<PathBuf>) -> Result<SettlementStoreHandle> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => Ok(Arc::new(RocksDBStore::open(path).into_diagnostic()?)),
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            eprintln!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(Arc::new(InMemoryStore::new()))
        }
        None => Ok(Arc::new(InMemoryStore::new())),
    }
}

async fn apply(engine: &SettlementEngine, command: LedgerCommand) -> payledger::error::Result<()> {
    match command {
        LedgerCommand::RegisterUser { user, lang } => {
            engine.register_user(user, lang).await.map(|_| ())
        }
        LedgerCommand::DefinePromo(promo) => engine.register_promo(promo).await,
        LedgerCommand::Create {
            order,
            user,
            amount,
            gateway,
            promo,
        } => engine
            .create_order(OrderRequest {
                id: order,
                user,
                amount,
                gateway,
                promo,
            })
            .await
            .map(|_| ()),
        LedgerCommand::Acknowledge(order) => {
            engine.acknowledge(OrderRef::Id(order)).await?;
            Ok(())
        }
        LedgerCommand::Settle(order, outcome) => {
            if !engine.settle(OrderRef::Id(order), outcome).await?.is_success() {
                warn!(order, "Settlement for unknown order ignored");
            }
            Ok(())
        }
        LedgerCommand::Consume { user, seconds } => {
            engine.consume_credit(user, seconds).await.map(|_| ())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init();

    let config = SettlementConfig::load(cli.config.as_deref()).into_diagnostic()?;
    let store = open_store(cli.db_path)?;
    let engine = SettlementEngine::new(
        store.clone(),
        config.pricing,
        Arc::new(TracingNotifier),
    );

    let file = File::open(cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    for command_result in reader.commands() {
        match command_result {
            Ok(command) => {
                if let Err(e) = apply(&engine, command).await {
                    error!("Error processing command: {}", e);
                }
            }
            Err(e) => {
                error!("Error reading command: {}", e);
            }
        }
    }

    let accounts = store.all_accounts().await.into_diagnostic()?;

    let stdout = io::stdout();
    let mut writer = AccountWriter::new(stdout.lock());
    writer.write_accounts(accounts).into_diagnostic()?;

    Ok(())
}
