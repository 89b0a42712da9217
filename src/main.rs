use chrono::Utc;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use votepay::application::admin::AdminService;
use votepay::application::orchestrator::VoteOrchestrator;
use votepay::config::{DEFAULT_MAX_VOTES_PER_PURCHASE, VoteConfig};
use votepay::domain::ports::VoteStoreRef;
use votepay::domain::pricing::{Amount, Currency, PRICE_PER_VOTE};
use votepay::domain::vote::PurchaseRequest;
use votepay::error::{ErrorClass, VoteError};
use votepay::infrastructure::gateway::SimulatedGateway;
use votepay::infrastructure::in_memory::InMemoryStore;
use votepay::infrastructure::notifier::LogNotifier;
#[cfg(feature = "storage-rocksdb")]
use votepay::infrastructure::rocksdb::RocksDbStore;
use votepay::interfaces::csv::contestant_reader::ContestantReader;
use votepay::interfaces::csv::event_reader::{CallbackOutcome, Event, EventReader};
use votepay::interfaces::csv::standings_writer::StandingsWriter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Scripted events CSV file (`type, contestant, email, votes, outcome`)
    input: PathBuf,

    /// Contestant roster CSV, used only when the store is empty
    #[arg(long)]
    contestants: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Price of one vote in minor currency units
    #[arg(long, env = "VOTEPAY_PRICE_PER_VOTE", default_value_t = PRICE_PER_VOTE)]
    price_per_vote: u64,

    #[arg(long, env = "VOTEPAY_CURRENCY", value_enum, default_value_t = Currency::Ngn)]
    currency: Currency,

    /// Largest vote quantity accepted in one purchase
    #[arg(long, env = "VOTEPAY_MAX_VOTES", default_value_t = DEFAULT_MAX_VOTES_PER_PURCHASE)]
    max_votes: u32,

    /// Administrator emails allowed to evict and reinstate
    #[arg(
        long = "admin",
        env = "VOTEPAY_ADMINS",
        value_delimiter = ',',
        default_value = "operator@localhost"
    )]
    admins: Vec<String>,

    /// Identity used for `evict` and `reinstate` rows
    #[arg(long, env = "VOTEPAY_OPERATOR", default_value = "operator@localhost")]
    operator: String,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();
}

fn open_store(db_path: Option<PathBuf>) -> Result<VoteStoreRef> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store = RocksDbStore::open(path).into_diagnostic()?;
            Ok(Arc::new(store))
        }
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

async fn replay_purchase(
    orchestrator: &VoteOrchestrator,
    gateway: &SimulatedGateway,
    request: PurchaseRequest,
    outcome: CallbackOutcome,
) -> votepay::error::Result<()> {
    let pending = orchestrator.begin(request).await?;
    match outcome {
        CallbackOutcome::Success => {
            gateway.succeed(pending.reference());
        }
        CallbackOutcome::Cancel => {
            gateway.cancel(pending.reference());
        }
        CallbackOutcome::Drop => {
            gateway.drop_callback(pending.reference());
        }
    }
    orchestrator.settle(pending).await.map(|_| ())
}

fn report(row: usize, e: &VoteError) {
    match e.class() {
        ErrorClass::PaymentBoundary => info!(row, error = %e, "purchase not completed"),
        _ => warn!(row, error = %e, "Error processing event"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = VoteConfig {
        price_per_vote: Amount::new(cli.price_per_vote).into_diagnostic()?,
        currency: cli.currency,
        max_votes_per_purchase: cli.max_votes,
        admins: cli.admins,
        ..Default::default()
    };

    let store = open_store(cli.db_path)?;
    let gateway = Arc::new(SimulatedGateway::new());
    let admin = AdminService::new(store.clone(), config.clone());
    let orchestrator = VoteOrchestrator::new(
        store,
        gateway.clone(),
        Arc::new(LogNotifier::new(config.currency)),
        config,
    );

    if let Some(path) = cli.contestants {
        let file = File::open(path).into_diagnostic()?;
        let mut roster = Vec::new();
        for (i, row) in ContestantReader::new(file).contestants().enumerate() {
            match row {
                Ok(contestant) => roster.push(contestant),
                Err(e) => warn!(row = i + 2, error = %e, "Error reading contestant"),
            }
        }
        admin.seed_if_empty(roster).await.into_diagnostic()?;
    }

    let file = File::open(cli.input).into_diagnostic()?;
    for (i, event) in EventReader::new(file).events().enumerate() {
        // Header is line 1.
        let row = i + 2;
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                warn!(row, error = %e, "Error reading event");
                continue;
            }
        };
        let result = match event {
            Event::Purchase { request, outcome } => {
                replay_purchase(&orchestrator, &gateway, request, outcome).await
            }
            Event::Evict(id) => admin
                .set_evicted(&cli.operator, &id, true)
                .await
                .map(|_| ()),
            Event::Reinstate(id) => admin
                .set_evicted(&cli.operator, &id, false)
                .await
                .map(|_| ()),
        };
        if let Err(e) = result {
            report(row, &e);
        }
    }

    orchestrator.stale_pending(Utc::now()).await.into_diagnostic()?;
    orchestrator.audit().await.into_diagnostic()?;

    let standings = orchestrator.standings().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = StandingsWriter::new(stdout.lock());
    writer.write_standings(&standings).into_diagnostic()?;

    Ok(())
}
