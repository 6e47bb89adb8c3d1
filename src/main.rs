use clap::{Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result, miette};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use wallet_settlement::application::orchestrator::WithdrawalOrchestrator;
use wallet_settlement::application::payout_client::{PayoutClient, TokenCache};
use wallet_settlement::config::{PayPalConfig, SettlementConfig};
use wallet_settlement::domain::account::AccountKey;
use wallet_settlement::domain::money::Amount;
use wallet_settlement::domain::ports::{SharedGateway, SharedLedger, SharedTransactionLog};
use wallet_settlement::infrastructure::alerting::TracingReconciliationSink;
use wallet_settlement::infrastructure::in_memory::{InMemoryLedger, InMemoryTransactionLog};
use wallet_settlement::infrastructure::paypal::PayPalGateway;
#[cfg(feature = "storage-rocksdb")]
use wallet_settlement::infrastructure::rocksdb::RocksDBStore;
use wallet_settlement::infrastructure::simulated::SimulatedGateway;
use wallet_settlement::interfaces::csv::request_reader::{AccountSeedReader, RequestReader};
use wallet_settlement::interfaces::csv::transaction_writer::TransactionWriter;
use wallet_settlement::interfaces::response::WithdrawalResponse;
use wallet_settlement::logging::init_logging;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// YAML settlement configuration (fee rates, timeouts, currency).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    log_json: bool,

    #[arg(long, global = true, env = "PAYPAL_CLIENT_ID", hide_env_values = true)]
    paypal_client_id: Option<String>,

    #[arg(long, global = true, env = "PAYPAL_SECRET", hide_env_values = true)]
    paypal_secret: Option<String>,

    /// Gateway API base URL. Defaults to the PayPal sandbox.
    #[arg(long, global = true, env = "PAYPAL_API")]
    paypal_api: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Open accounts from an `account,balance` CSV. Existing accounts are left untouched.
    Seed { accounts: PathBuf },
    /// Run every `account,amount,destination` row of a CSV as a withdrawal.
    Withdraw {
        requests: PathBuf,

        /// Open accounts from an `account,balance` CSV before processing.
        #[arg(long)]
        accounts: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = GatewayKind::Paypal)]
        gateway: GatewayKind,

        /// Destination the simulated gateway refuses. Repeatable.
        #[arg(long)]
        reject: Vec<String>,
    },
    /// Print an account's current balance.
    Balance { account: String },
    /// Print an account's transactions as CSV, newest first.
    History { account: String },
    /// Print the fee breakdown for an amount.
    Fees { amount: String },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum GatewayKind {
    Paypal,
    Simulated,
}

fn open_storage(db_path: Option<PathBuf>) -> Result<(SharedLedger, SharedTransactionLog)> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store = RocksDBStore::open(path).into_diagnostic()?;
            Ok((Arc::new(store.clone()), Arc::new(store)))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            warn!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok((
                Arc::new(InMemoryLedger::new()),
                Arc::new(InMemoryTransactionLog::new()),
            ))
        }
        None => Ok((
            Arc::new(InMemoryLedger::new()),
            Arc::new(InMemoryTransactionLog::new()),
        )),
    }
}

async fn seed_accounts(ledger: &SharedLedger, path: &Path) -> Result<()> {
    let file = File::open(path).into_diagnostic()?;
    for seed in AccountSeedReader::new(file).seeds() {
        match seed {
            Ok((account, balance)) => {
                ledger
                    .open_account(&account, balance)
                    .await
                    .into_diagnostic()?;
                info!(account = %account, balance = %balance, "account opened");
            }
            Err(e) => warn!(error = %e, "skipping account row"),
        }
    }
    Ok(())
}

fn build_gateway(
    cli: &Cli,
    config: &SettlementConfig,
    kind: GatewayKind,
    reject: &[String],
) -> Result<SharedGateway> {
    match kind {
        GatewayKind::Paypal => {
            let paypal = PayPalConfig::new(
                cli.paypal_client_id.clone(),
                cli.paypal_secret.clone(),
                cli.paypal_api.clone(),
            );
            let gateway = PayPalGateway::new(
                paypal,
                config.email_subject.clone(),
                config.payout_note.clone(),
                config.payout_timeout(),
            )
            .into_diagnostic()?;
            Ok(Arc::new(gateway))
        }
        GatewayKind::Simulated => Ok(Arc::new(
            reject
                .iter()
                .fold(SimulatedGateway::new(), |gw, dest| gw.reject_destination(dest.clone())),
        )),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging("info", cli.log_json);

    let config = match &cli.config {
        Some(path) => SettlementConfig::from_yaml_file(path).into_diagnostic()?,
        None => SettlementConfig::default(),
    };

    if let Command::Fees { amount } = &cli.command {
        let amount: Amount = amount.parse().into_diagnostic()?;
        let breakdown = config.fee_schedule().into_diagnostic()?.calculate(amount);
        println!("{}", serde_json::to_string(&breakdown).into_diagnostic()?);
        return Ok(());
    }

    let (ledger, log) = open_storage(cli.db_path.clone())?;

    match &cli.command {
        Command::Fees { .. } => {}
        Command::Seed { accounts } => seed_accounts(&ledger, accounts).await?,
        Command::Balance { account } => {
            let key = AccountKey::new(account.as_str()).into_diagnostic()?;
            match ledger.balance(&key).await.into_diagnostic()? {
                Some(balance) => println!("{},{}", key, balance),
                None => return Err(miette!("account {} not found", key)),
            }
        }
        Command::History { account } => {
            let key = AccountKey::new(account.as_str()).into_diagnostic()?;
            let transactions = log.list_by_account(&key).await.into_diagnostic()?;
            let stdout = io::stdout();
            TransactionWriter::new(stdout.lock())
                .write_transactions(&transactions)
                .into_diagnostic()?;
        }
        Command::Withdraw {
            requests,
            accounts,
            gateway,
            reject,
        } => {
            if let Some(path) = accounts {
                seed_accounts(&ledger, path).await?;
            }

            let payouts = PayoutClient::new(
                build_gateway(&cli, &config, *gateway, reject)?,
                Arc::new(TokenCache::new(config.token_safety_margin())),
                config.payout_timeout(),
            );
            let orchestrator = WithdrawalOrchestrator::new(
                ledger,
                log,
                payouts,
                Arc::new(TracingReconciliationSink),
                &config,
            )
            .into_diagnostic()?;

            let file = File::open(requests).into_diagnostic()?;
            let mut handles = Vec::new();
            for request in RequestReader::new(file).requests() {
                let orchestrator = orchestrator.clone();
                handles.push(tokio::spawn(async move {
                    match request {
                        Ok(request) => {
                            WithdrawalResponse::from_result(&orchestrator.withdraw(request).await)
                        }
                        Err(e) => WithdrawalResponse::from_error(&e),
                    }
                }));
            }

            let stdout = io::stdout();
            let mut out = stdout.lock();
            for handle in handles {
                let response = handle.await.into_diagnostic()?;
                let line = serde_json::to_string(&response).into_diagnostic()?;
                writeln!(out, "{}", line).into_diagnostic()?;
            }
        }
    }

    Ok(())
}
