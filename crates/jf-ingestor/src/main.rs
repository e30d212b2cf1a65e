use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use clap::Parser;
use dotenvy::dotenv;
use jf_common::date::processing_time;
use jf_common::db::{connect_pool, DbPoolError, JobStore, MemoryJobStore, PgJobStore, StoreError};
use jf_common::logging::{init_tracing_subscriber, install_tracing_panic_hook};
use jf_common::pipeline::{run_batch, BatchSummary, PipelineError};
use jf_common::{run_id, Gazetteer, GazetteerError};
use tracing::{error, info};

const APP_NAME: &str = "jf-ingestor";

#[derive(Debug, Parser)]
#[command(
    name = "jf-ingestor",
    about = "Normalize scraped job postings and store new ones"
)]
struct Cli {
    /// Country whose reference tables drive normalization
    #[arg(long, env = "JF_COUNTRY", default_value = "finland")]
    country: String,

    /// Directory holding one sub-directory of reference tables per country
    #[arg(long, env = "JF_RESOURCES_DIR", default_value = "resources")]
    resources_dir: PathBuf,

    /// Newline-delimited JSON feed, `-` for stdin
    #[arg(long, env = "JF_INPUT", default_value = "-")]
    input: String,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    db_url: Option<String>,

    /// Normalize and deduplicate in memory without touching the database
    #[arg(long)]
    dry_run: bool,

    /// Expose Prometheus metrics on this port while the batch runs
    #[arg(long, env = "JF_METRICS_PORT")]
    metrics_port: Option<u16>,
}

#[derive(Debug, thiserror::Error)]
enum IngestError {
    #[error("failed to load reference tables: {0}")]
    Gazetteer(#[from] GazetteerError),
    #[error("database pool error: {0}")]
    DbPool(#[from] DbPoolError),
    #[error("schema setup failed: {0}")]
    Schema(#[from] StoreError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("failed to open feed {path}: {source}")]
    Input {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("DATABASE_URL (or --db-url) is required unless --dry-run is set")]
    MissingDatabaseUrl,
}

fn open_feed(input: &str) -> Result<Box<dyn BufRead>, IngestError> {
    if input == "-" {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file = File::open(input).map_err(|source| IngestError::Input {
        path: input.to_string(),
        source,
    })?;
    Ok(Box::new(BufReader::new(file)))
}

async fn ingest<S: JobStore>(
    feed: Box<dyn BufRead>,
    gazetteer: &Gazetteer,
    store: &S,
) -> Result<BatchSummary, IngestError> {
    store.ensure_schema().await?;
    Ok(run_batch(feed, gazetteer, store, processing_time).await?)
}

async fn run(cli: Cli) -> Result<BatchSummary, IngestError> {
    if let Some(port) = cli.metrics_port {
        jf_metrics::init_metrics(port);
    }

    let gazetteer = Gazetteer::load(&cli.resources_dir, &cli.country)?;
    let feed = open_feed(&cli.input)?;

    info!(
        run_id = run_id::get(),
        country = gazetteer.country(),
        input = %cli.input,
        dry_run = cli.dry_run,
        "starting ingestion batch"
    );

    if cli.dry_run {
        let store = MemoryJobStore::new();
        return ingest(feed, &gazetteer, &store).await;
    }

    let db_url = cli.db_url.as_deref().ok_or(IngestError::MissingDatabaseUrl)?;
    let store = PgJobStore::new(connect_pool(db_url).await?);
    ingest(feed, &gazetteer, &store).await
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_tracing_subscriber(APP_NAME);
    install_tracing_panic_hook(APP_NAME);

    match run(Cli::parse()).await {
        Ok(summary) => println!("{summary}"),
        Err(err) => {
            error!(error = %err, "ingestion failed");
            eprintln!("{APP_NAME} failed: {err}");
            std::process::exit(1);
        }
    }
}
