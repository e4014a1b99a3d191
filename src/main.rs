use clap::{Parser, Subcommand};
use printwatch::config::{self, Config};
use printwatch::{ManualClock, MemoryBackends, StatusIngestor, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "printwatch", version, about = "Printer status ingestion and print reconciliation")]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP ingestion service.
    Serve,
    /// Process an NDJSON file of reports for one printer and print each outcome.
    Replay {
        #[arg(long)]
        printer: String,
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => Config::default(),
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(config.logging.tracing_level())
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => serve(config).await,
        Command::Replay { printer, file } => replay(config, &printer, file).await,
    }
}

async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    tracing::info!("Starting printwatch {}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Status TTL {}s, debounce window {}s",
        config.ingest.status_ttl_secs,
        config.ingest.debounce_secs
    );

    let clock = Arc::new(SystemClock);
    let memory = MemoryBackends::new(clock.clone(), config.ingest.notify_buffer);

    let mut updates = memory.notifier.subscribe();
    tokio::spawn(async move {
        while let Ok(update) = updates.recv().await {
            tracing::debug!("Printer {} updated", update.printer_id);
        }
    });

    let ingestor = StatusIngestor::new(memory.backends(), clock, config.ingest.clone());
    let app = printwatch::web::api::create_router(ingestor);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!("Web API listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn replay(
    config: Config,
    printer_id: &str,
    file: PathBuf,
) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
    let memory = MemoryBackends::new(clock.clone(), config.ingest.notify_buffer);
    let ingestor = StatusIngestor::new(memory.backends(), clock.clone(), config.ingest.clone());

    let reader = tokio::io::BufReader::new(tokio::fs::File::open(&file).await?);
    let summary = printwatch::replay::replay(&ingestor, &clock, printer_id, reader).await?;

    for outcome in &summary.outcomes {
        println!("{}", serde_json::to_string(outcome)?);
    }
    tracing::info!(
        "Replayed {} reports from {} ({} rejected)",
        summary.outcomes.len(),
        file.display(),
        summary.rejected
    );
    Ok(())
}
