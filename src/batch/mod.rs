//! JSONL batch execution.
//!
//! Reads one question per input line, answers them with bounded
//! concurrency, and writes exactly one output record per input line, in
//! input order. An unreadable line still produces an output record so
//! downstream consumers can join inputs and outputs positionally.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::error::{AppError, AppResult};
use crate::pipeline::{AgentState, FormatHint, Orchestrator, OutputRecord, Question};

/// One line of the input batch file.
///
/// `question_text` is accepted as an alias because both spellings occur in
/// the wild.
#[derive(Debug, Deserialize)]
struct InputLine {
    #[serde(default)]
    id: Option<String>,
    #[serde(alias = "question_text")]
    question: String,
    #[serde(default)]
    format_hint: Option<String>,
}

/// Counters for a completed batch run.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub total: usize,
    pub answered: usize,
    /// Lines that produced a placeholder record (unparseable input or an
    /// aborted pipeline).
    pub degraded: usize,
}

/// Runs a batch of questions through a shared orchestrator.
pub struct BatchRunner {
    orchestrator: Arc<Orchestrator>,
    workers: usize,
    trace_dir: Option<PathBuf>,
}

impl BatchRunner {
    pub fn new(orchestrator: Arc<Orchestrator>, workers: usize, trace_dir: Option<PathBuf>) -> Self {
        Self {
            orchestrator,
            workers: workers.max(1),
            trace_dir,
        }
    }

    /// Answer every line of `input` and write the records to `output`.
    pub async fn run(&self, input: &Path, output: &Path) -> AppResult<BatchSummary> {
        let raw = tokio::fs::read_to_string(input).await?;
        let lines: Vec<String> = raw.lines().map(|l| l.to_string()).collect();
        let total = lines.len();

        info!(
            input = %input.display(),
            questions = total,
            workers = self.workers,
            "Starting batch run"
        );

        if let Some(dir) = &self.trace_dir {
            tokio::fs::create_dir_all(dir).await?;
        }

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks: JoinSet<(usize, OutputRecord)> = JoinSet::new();

        for (index, line) in lines.into_iter().enumerate() {
            let orchestrator = Arc::clone(&self.orchestrator);
            let semaphore = Arc::clone(&semaphore);
            let trace_dir = self.trace_dir.clone();

            tasks.spawn(async move {
                // Closed only if the JoinSet is dropped mid-run.
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => return (index, unreadable_record(index, None, "worker pool closed")),
                };

                let question = match parse_line(&line, index) {
                    Ok(question) => question,
                    Err(err) => {
                        warn!(line = index + 1, reason = %err.reason, "Skipping unreadable input line");
                        return (index, unreadable_record(index, err.id, &err.reason));
                    }
                };

                let (record, state) = orchestrator.answer(question).await;
                if let Some(dir) = trace_dir {
                    dump_trace(&dir, &state).await;
                }
                (index, record)
            });
        }

        let mut records: Vec<Option<OutputRecord>> = (0..total).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, record)) => records[index] = Some(record),
                Err(err) => {
                    // A panicked worker must not break the one-line-per-input
                    // contract; the slot is filled after the loop.
                    error!(error = %err, "Batch worker panicked");
                }
            }
        }

        let mut summary = BatchSummary {
            total,
            ..BatchSummary::default()
        };

        let mut out = tokio::fs::File::create(output).await?;
        for (index, slot) in records.into_iter().enumerate() {
            let record = slot
                .unwrap_or_else(|| unreadable_record(index, None, "worker terminated abnormally"));
            if record.confidence > 0.0 || record.final_answer != Value::Null {
                summary.answered += 1;
            } else {
                summary.degraded += 1;
            }
            let json = serde_json::to_string(&record).map_err(|e| AppError::Internal {
                message: format!("Failed to serialize output record: {}", e),
            })?;
            out.write_all(json.as_bytes()).await?;
            out.write_all(b"\n").await?;
        }
        out.flush().await?;

        info!(
            output = %output.display(),
            answered = summary.answered,
            degraded = summary.degraded,
            "Batch run complete"
        );
        Ok(summary)
    }
}

/// Why a line could not become a question. The id survives whenever the
/// JSON parsed far enough to carry one, so the placeholder record keeps it.
#[derive(Debug)]
struct LineError {
    id: Option<String>,
    reason: String,
}

impl LineError {
    fn anonymous(reason: impl Into<String>) -> Self {
        Self {
            id: None,
            reason: reason.into(),
        }
    }
}

/// Parse one input line into a question, defaulting the id to the 1-based
/// line number and the format hint to `string`.
fn parse_line(line: &str, index: usize) -> Result<Question, LineError> {
    if line.trim().is_empty() {
        return Err(LineError::anonymous("empty line"));
    }

    let parsed: InputLine = serde_json::from_str(line)
        .map_err(|e| LineError::anonymous(format!("invalid JSON: {}", e)))?;

    if parsed.question.trim().is_empty() {
        return Err(LineError {
            id: parsed.id,
            reason: "empty question text".to_string(),
        });
    }

    let format_hint = match parsed.format_hint.as_deref() {
        Some(raw) => match FormatHint::parse(raw) {
            Some(hint) => hint,
            None => {
                return Err(LineError {
                    id: parsed.id,
                    reason: format!("unknown format hint: {}", raw),
                })
            }
        },
        None => FormatHint::String,
    };

    let id = parsed.id.unwrap_or_else(|| format!("line-{}", index + 1));
    Ok(Question::new(id, parsed.question, format_hint))
}

/// Placeholder record for a line that never reached the pipeline.
fn unreadable_record(index: usize, id: Option<String>, reason: &str) -> OutputRecord {
    OutputRecord {
        id: id.unwrap_or_else(|| format!("line-{}", index + 1)),
        final_answer: Value::Null,
        sql: String::new(),
        confidence: 0.0,
        explanation: format!("Input line could not be processed: {}", reason),
        citations: Vec::new(),
    }
}

/// Best-effort trace dump; failures are logged, never fatal to the batch.
async fn dump_trace(dir: &Path, state: &AgentState) {
    let file_name: String = state
        .question
        .id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let path = dir.join(format!("{}.json", file_name));

    match serde_json::to_vec_pretty(state) {
        Ok(bytes) => {
            if let Err(err) = tokio::fs::write(&path, bytes).await {
                warn!(path = %path.display(), error = %err, "Failed to write trace dump");
            }
        }
        Err(err) => warn!(error = %err, "Failed to serialize trace"),
    }
}
