//! # Retail Copilot
//!
//! A question-answering agent over a retail SQLite dataset. Natural-language
//! questions arrive as JSONL, flow through an explicit workflow state
//! machine, and come out as structured answer records with confidence
//! scores and citations.
//!
//! ## Pipeline
//!
//! ```text
//! question → router → [retrieve → planner] → generate_sql ⇄ execute_sql
//!                                                   ↓
//!                              synthesize ⇄ validator → output record
//! ```
//!
//! The router picks an answering strategy (`sql`, `rag`, or `hybrid`).
//! SQL questions go straight to generation against the live schema; rag
//! questions answer from BM25-retrieved document chunks; hybrid questions
//! do both, with a constraint-planning step grounding the SQL in the
//! retrieved documents. Failed SQL executions are regenerated with error
//! feedback up to a fixed attempt ceiling, and answers that miss their
//! format hint get a single corrective re-synthesis.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use retail_copilot::batch::BatchRunner;
//! use retail_copilot::config::Config;
//! use retail_copilot::db::{self, SchemaInspector, SqlExecutor};
//! use retail_copilot::model::ModelClient;
//! use retail_copilot::pipeline::Orchestrator;
//! use retail_copilot::retrieval::{DocumentCorpus, LexicalRetriever};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let pool = db::connect(&config.database).await?;
//!     let schema = SchemaInspector::new(pool.clone()).describe().await?;
//!     let corpus = DocumentCorpus::load_dir(&config.retrieval.docs_dir)?;
//!     let model = Arc::new(ModelClient::new(&config.model, config.request.clone())?);
//!     let orchestrator = Arc::new(Orchestrator::new(
//!         model,
//!         Arc::new(LexicalRetriever::new(corpus)),
//!         SqlExecutor::new(pool, config.database.query_timeout_ms),
//!         schema.render_prompt(),
//!         config.retrieval.top_k,
//!         config.repair.clone(),
//!         config.penalties.clone(),
//!     ));
//!     let runner = BatchRunner::new(orchestrator, config.batch.workers, None);
//!     runner.run("questions.jsonl".as_ref(), "outputs.jsonl".as_ref()).await?;
//!     Ok(())
//! }
//! ```

/// JSONL batch execution with bounded concurrency.
pub mod batch;
/// Environment-driven configuration.
pub mod config;
/// Retail database access: schema inspection and read-only execution.
pub mod db;
/// Error types and result aliases.
pub mod error;
/// OpenAI-compatible chat-completion client and message types.
pub mod model;
/// Workflow state types and the orchestrating state machine.
pub mod pipeline;
/// System prompts for each model-backed stage.
pub mod prompts;
/// Markdown corpus loading and BM25 lexical retrieval.
pub mod retrieval;
/// Individual workflow stage implementations.
pub mod stages;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use pipeline::{Orchestrator, OutputRecord, Question};
