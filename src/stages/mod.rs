//! Workflow stage implementations.
//!
//! One file per stage of the answer pipeline:
//! - [`Router`]: classifies a question into an answering strategy
//! - [`RetrievalStage`]: fetches and formats document chunks
//! - [`ConstraintPlanner`]: extracts structured constraints from chunks
//! - [`SqlGenerator`]: produces a SQLite statement from question + schema
//! - [`validator`]: pure format-hint checking of candidate answers
//! - [`Synthesizer`]: merges all evidence into the final answer
//!
//! Each stage receives an immutable view of the agent state and returns a
//! typed patch; the orchestrator owns all merging.

mod planner;
mod retrieve;
mod router;
mod sql_gen;
mod synthesizer;
pub mod validator;

pub use planner::ConstraintPlanner;
pub use retrieve::RetrievalStage;
pub use router::Router;
pub use sql_gen::{ErrorFeedback, SqlGenerator};
pub use synthesizer::{score_confidence, Synthesis, Synthesizer};

/// Extract JSON from a completion string, handling markdown code blocks.
///
/// Attempts extraction in this order:
/// 1. Raw JSON (fast path)
/// 2. ```json ... ``` code blocks
/// 3. ``` ... ``` code blocks
pub(crate) fn extract_json_from_completion(completion: &str) -> Result<&str, String> {
    let trimmed = completion.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Ok(trimmed);
    }

    if completion.contains("```json") {
        return completion
            .split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "Found ```json block but content was empty or malformed".to_string());
    }

    if completion.contains("```") {
        return completion
            .split("```")
            .nth(1)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "Found ``` block but content was empty or malformed".to_string());
    }

    Err(format!(
        "No JSON found in response. First 100 chars: '{}'",
        completion.chars().take(100).collect::<String>()
    ))
}

/// Strip markdown fences from a generated SQL statement.
///
/// Small models wrap statements in ```sql fences despite prompt guidance.
pub(crate) fn strip_sql_fences(completion: &str) -> String {
    let trimmed = completion.trim();
    if !trimmed.contains("```") {
        return trimmed.to_string();
    }

    let inner = trimmed
        .split("```")
        .nth(1)
        .unwrap_or(trimmed)
        .trim_start_matches("sql")
        .trim_start_matches("sqlite");
    inner.trim().to_string()
}
