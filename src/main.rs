use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use courier_bridge::api::{ApiServer, ApiState};
use courier_bridge::db::{self, MessageRepo};
use courier_bridge::{
    AgentClient, Config, HistoryReader, Ingestor, MediaCache, NetworkSession, ProtocolSession,
};

/// Capacity of the inbound event stream between webhook and ingestion
const EVENT_QUEUE: usize = 128;

/// Courier - messaging-network bridge for AI agents
#[derive(Parser)]
#[command(name = "courier", version, about)]
struct Cli {
    /// Port to listen on
    #[arg(long, env = "COURIER_PORT", default_value = "8080")]
    port: u16,

    /// Path to the message database
    #[arg(long, env = "COURIER_DB", default_value = "courier.db")]
    db: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Seed the environment from .env when present; real environment wins
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("failed to load .env: {e}");
        }
    }

    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,courier_bridge=info",
        1 => "info,courier_bridge=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::from_env(cli.port, cli.db)?;

    let pool = db::init(&config.db_path)?;
    tracing::info!(path = %config.db_path.display(), "message store ready");

    let session: Arc<dyn ProtocolSession> = Arc::new(NetworkSession::new(&config.session));
    let repo = MessageRepo::new(pool.clone());
    let history = HistoryReader::new(repo.clone(), session.clone());
    let media = Arc::new(MediaCache::new());
    let agent = AgentClient::new(&config.agent_base_url);

    let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE);

    let ingestor = Ingestor::new(
        session.clone(),
        agent,
        history.clone(),
        media.clone(),
        repo,
        &config.server_base_url,
    );
    let ingest_handle = tokio::spawn(ingestor.run(events_rx));

    let api = ApiServer::new(
        ApiState {
            db: pool,
            history,
            media,
            session,
            events: events_tx,
        },
        config.port,
    );
    let api_handle = api.spawn();

    tracing::info!(
        agent = %config.agent_base_url,
        server = %config.server_base_url,
        "courier bridge running"
    );

    // Run until interrupted or a core task exits
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
        }
        result = api_handle => {
            match result {
                Ok(Ok(())) => tracing::warn!("API server exited"),
                Ok(Err(e)) => return Err(e.into()),
                Err(e) => return Err(e.into()),
            }
        }
        _ = ingest_handle => {
            tracing::warn!("ingestion loop exited");
        }
    }

    Ok(())
}
