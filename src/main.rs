use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use retail_copilot::{
    batch::BatchRunner,
    config::{Config, LogFormat},
    db::{self, SchemaInspector, SqlExecutor},
    model::ModelClient,
    pipeline::Orchestrator,
    retrieval::{DocumentCorpus, LexicalRetriever},
};

/// Answer retail-analytics questions from a JSONL batch file.
#[derive(Debug, Parser)]
#[command(name = "retail-copilot", version, about)]
struct Cli {
    /// Input JSONL file, one question per line
    #[arg(long)]
    batch: PathBuf,

    /// Output JSONL file, one answer record per input line
    #[arg(long, default_value = "outputs.jsonl")]
    out: PathBuf,

    /// Path to the retail SQLite database (overrides DATABASE_PATH)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Directory of markdown policy documents (overrides DOCS_DIR)
    #[arg(long)]
    docs: Option<PathBuf>,

    /// Concurrent question workers (overrides BATCH_WORKERS)
    #[arg(long)]
    workers: Option<usize>,

    /// Directory for per-question trace dumps (overrides TRACE_DIR)
    #[arg(long)]
    trace_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(db_path) = cli.db.clone() {
        config.database.path = db_path;
    }
    if let Some(docs_dir) = cli.docs.clone() {
        config.retrieval.docs_dir = docs_dir;
    }

    // Initialize logging
    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Retail copilot starting..."
    );

    // Connect to the retail dataset (read-only)
    let pool = match db::connect(&config.database).await {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, "Failed to open retail database");
            return Err(e.into());
        }
    };

    // Inspect once up front to fail fast on an unusable database; the
    // orchestrator re-inspects per question so it never works from this copy.
    let inspector = SchemaInspector::new(pool.clone());
    match inspector.describe().await {
        Ok(s) => info!(tables = s.tables.len(), "Schema inspected"),
        Err(e) => {
            error!(error = %e, "Failed to inspect schema");
            return Err(e.into());
        }
    }

    // Load and index the document corpus
    let corpus = match DocumentCorpus::load_dir(&config.retrieval.docs_dir) {
        Ok(c) => {
            info!(
                dir = %config.retrieval.docs_dir.display(),
                chunks = c.len(),
                "Document corpus indexed"
            );
            c
        }
        Err(e) => {
            error!(error = %e, "Failed to load document corpus");
            return Err(e.into());
        }
    };
    let retriever = Arc::new(LexicalRetriever::new(corpus));

    // Initialize the model client
    let model = match ModelClient::new(&config.model, config.request.clone()) {
        Ok(c) => {
            info!(
                base_url = %config.model.base_url,
                model = %config.model.model_name,
                "Model client initialized"
            );
            Arc::new(c)
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize model client");
            return Err(e.into());
        }
    };

    let orchestrator = Arc::new(Orchestrator::new(
        model,
        retriever,
        SqlExecutor::new(pool, config.database.query_timeout_ms),
        inspector,
        config.retrieval.top_k,
        config.repair.clone(),
        config.penalties.clone(),
    ));

    let workers = cli.workers.unwrap_or(config.batch.workers);
    let trace_dir = cli.trace_dir.or_else(|| config.batch.trace_dir.clone());
    let runner = BatchRunner::new(orchestrator, workers, trace_dir);

    let summary = match runner.run(&cli.batch, &cli.out).await {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Batch run failed");
            return Err(e.into());
        }
    };

    info!(
        total = summary.total,
        answered = summary.answered,
        degraded = summary.degraded,
        output = %cli.out.display(),
        "Done"
    );
    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
