use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use super::extract_json_from_completion;
use crate::config::PenaltyConfig;
use crate::error::ModelResult;
use crate::model::{CompletionModel, Message};
use crate::pipeline::AgentState;
use crate::prompts::SYNTHESIS_PROMPT;

/// Rows beyond this are elided from the synthesis prompt to keep it bounded.
const MAX_PROMPT_ROWS: usize = 50;

/// Expected synthesis completion shape.
#[derive(Debug, Deserialize)]
struct SynthesisResponse {
    final_answer: Value,
    #[serde(default)]
    explanation: String,
}

/// Final answer produced by a synthesis pass.
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub answer: Value,
    pub explanation: String,
    /// Table names then chunk ids, de-duplicated, first-used order. Built
    /// from evidence actually supplied to the prompt, never from model text.
    pub citations: Vec<String>,
}

/// Merges all gathered evidence into the final answer.
pub struct Synthesizer {
    model: Arc<dyn CompletionModel>,
}

impl Synthesizer {
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        Self { model }
    }

    /// Produce an answer from the current state. `retry_reason` is present
    /// only on the single validation-triggered re-synthesis.
    pub async fn synthesize(
        &self,
        state: &AgentState,
        retry_reason: Option<&str>,
    ) -> ModelResult<Synthesis> {
        let messages = vec![
            Message::system(SYNTHESIS_PROMPT),
            Message::user(Self::build_user_message(state, retry_reason)),
        ];

        let completion = self.model.complete(messages).await?;
        let (answer, explanation) = Self::map_completion(&completion);

        info!(
            question_id = %state.question.id,
            retry = retry_reason.is_some(),
            "Synthesis completed"
        );

        Ok(Synthesis {
            answer,
            explanation,
            citations: build_citations(state),
        })
    }

    fn build_user_message(state: &AgentState, retry_reason: Option<&str>) -> String {
        let sql_result = if state.result_rows.is_empty() {
            match state.last_sql_error() {
                Some(error) => format!("SQL execution failed: {}", error),
                None => "No SQL results available.".to_string(),
            }
        } else {
            let shown = &state.result_rows[..state.result_rows.len().min(MAX_PROMPT_ROWS)];
            let mut rendered = serde_json::to_string(shown).unwrap_or_default();
            if state.result_rows.len() > MAX_PROMPT_ROWS {
                rendered.push_str(&format!(
                    " (showing {} of {} rows)",
                    MAX_PROMPT_ROWS,
                    state.result_rows.len()
                ));
            }
            rendered
        };

        let mut message = format!(
            "Question: {}\nFormat hint: {}\n\nSQL query: {}\n\nSQL result: {}\n\nDocument context:\n{}",
            state.question.text,
            state.question.format_hint.as_str(),
            state.last_statement(),
            sql_result,
            if state.context.is_empty() {
                "(none)"
            } else {
                state.context.as_str()
            },
        );

        if let Some(reason) = retry_reason {
            message.push_str(&format!(
                "\n\nYour previous answer did not match the format hint: {}. \
                 Answer again matching the format hint exactly.",
                reason
            ));
        }

        message
    }

    /// Parse the completion; unparseable output degrades to a string answer
    /// so validation gets a chance to catch the mismatch.
    fn map_completion(completion: &str) -> (Value, String) {
        match extract_json_from_completion(completion)
            .ok()
            .and_then(|json| serde_json::from_str::<SynthesisResponse>(json).ok())
        {
            Some(parsed) => (parsed.final_answer, parsed.explanation),
            None => {
                warn!(
                    completion_preview = %completion.chars().take(120).collect::<String>(),
                    "Unparseable synthesis output, using raw completion as answer"
                );
                (Value::String(completion.trim().to_string()), String::new())
            }
        }
    }
}

/// Build citations from the evidence actually used.
///
/// Table names come only from the final successful attempt; a failed final
/// attempt contributes nothing. Chunk ids come from the chunks rendered into
/// the synthesis context.
pub(crate) fn build_citations(state: &AgentState) -> Vec<String> {
    let mut citations = Vec::new();

    if let Some(attempt) = state.last_attempt() {
        if attempt.error.is_none() {
            for table in &attempt.referenced_tables {
                if !citations.contains(table) {
                    citations.push(table.clone());
                }
            }
        }
    }

    for chunk in &state.chunks {
        if !citations.contains(&chunk.chunk_id) {
            citations.push(chunk.chunk_id.clone());
        }
    }

    citations
}

/// Heuristic confidence score as a pure function of the recorded history.
///
/// Starts at 1.0, subtracts the named penalties, clamps to [0.0, 1.0].
pub fn score_confidence(state: &AgentState, penalties: &PenaltyConfig) -> f64 {
    let mut confidence = 1.0;

    confidence -= penalties.sql_retry * state.sql_retries() as f64;

    if state.last_sql_error().is_some() {
        confidence -= penalties.final_execution_error;
    }

    if state.synthesis_attempts > 1 {
        confidence -= penalties.validation_failure;
    }

    if state.citations.is_empty() {
        confidence -= penalties.no_citations;
    }

    if state.routing.is_some_and(|r| r.fallback) {
        confidence -= penalties.routing_fallback;
    }

    confidence.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{FormatHint, Question, RoutingDecision, SqlAttempt};
    use crate::retrieval::RetrievedChunk;
    use serde_json::json;

    fn base_state() -> AgentState {
        AgentState::new(Question::new(
            "q1",
            "What is total revenue in June 1997?",
            FormatHint::Float,
        ))
    }

    fn ok_attempt(n: u32, tables: &[&str]) -> SqlAttempt {
        SqlAttempt {
            statement: format!("SELECT {}", n),
            attempt_number: n,
            error: None,
            row_count: Some(1),
            referenced_tables: tables.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn failed_attempt(n: u32) -> SqlAttempt {
        SqlAttempt {
            statement: format!("SELECT {}", n),
            attempt_number: n,
            error: Some("syntax error".to_string()),
            row_count: None,
            referenced_tables: vec![],
        }
    }

    fn chunk(id: &str) -> RetrievedChunk {
        RetrievedChunk {
            doc_id: "kpi.md".to_string(),
            chunk_id: id.to_string(),
            text: "text".to_string(),
            score: 1.0,
        }
    }

    #[test]
    fn test_map_completion_json() {
        let (answer, explanation) =
            Synthesizer::map_completion(r#"{"final_answer": 1234.5, "explanation": "sum"}"#);
        assert_eq!(answer, json!(1234.5));
        assert_eq!(explanation, "sum");
    }

    #[test]
    fn test_map_completion_fenced() {
        let (answer, _) = Synthesizer::map_completion(
            "```json\n{\"final_answer\": \"Beverages\", \"explanation\": \"top\"}\n```",
        );
        assert_eq!(answer, json!("Beverages"));
    }

    #[test]
    fn test_map_completion_unparseable_degrades_to_string() {
        let (answer, explanation) = Synthesizer::map_completion("The revenue was high.");
        assert_eq!(answer, json!("The revenue was high."));
        assert!(explanation.is_empty());
    }

    #[test]
    fn test_citations_from_final_successful_attempt_and_chunks() {
        let mut state = base_state();
        state.sql_attempts.push(failed_attempt(1));
        state
            .sql_attempts
            .push(ok_attempt(2, &["orders", "order_items"]));
        state.chunks.push(chunk("kpi.md::chunk0"));
        state.chunks.push(chunk("kpi.md::chunk0")); // duplicate dropped

        assert_eq!(
            build_citations(&state),
            vec![
                "orders".to_string(),
                "order_items".to_string(),
                "kpi.md::chunk0".to_string()
            ]
        );
    }

    #[test]
    fn test_citations_exclude_failed_final_attempt_tables() {
        let mut state = base_state();
        let mut attempt = failed_attempt(3);
        attempt.referenced_tables = vec!["orders".to_string()];
        state.sql_attempts.push(attempt);
        assert!(build_citations(&state).is_empty());
    }

    #[test]
    fn test_prompt_carries_error_on_terminal_failure() {
        let mut state = base_state();
        state.sql_attempts.push(failed_attempt(3));
        let message = Synthesizer::build_user_message(&state, None);
        assert!(message.contains("SQL execution failed: syntax error"));
    }

    #[test]
    fn test_prompt_carries_retry_reason() {
        let state = base_state();
        let message = Synthesizer::build_user_message(&state, Some("expected float, got dict"));
        assert!(message.contains("did not match the format hint"));
        assert!(message.contains("expected float, got dict"));
    }

    #[test]
    fn test_confidence_perfect_run() {
        let mut state = base_state();
        state.sql_attempts.push(ok_attempt(1, &["orders"]));
        state.citations = vec!["orders".to_string()];
        state.synthesis_attempts = 1;
        assert_eq!(score_confidence(&state, &PenaltyConfig::default()), 1.0);
    }

    #[test]
    fn test_confidence_one_retry() {
        let mut state = base_state();
        state.sql_attempts.push(failed_attempt(1));
        state.sql_attempts.push(ok_attempt(2, &["orders"]));
        state.citations = vec!["orders".to_string()];
        state.synthesis_attempts = 1;
        let confidence = score_confidence(&state, &PenaltyConfig::default());
        assert!((confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_ceiling_exhaustion() {
        let mut state = base_state();
        state.sql_attempts.push(failed_attempt(1));
        state.sql_attempts.push(failed_attempt(2));
        state.sql_attempts.push(failed_attempt(3));
        state.synthesis_attempts = 1;
        // 2 retries (0.4) + final error (0.3) + no citations (0.2)
        let confidence = score_confidence(&state, &PenaltyConfig::default());
        assert!((confidence - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_clamped_to_zero() {
        let mut state = base_state();
        state.sql_attempts.push(failed_attempt(1));
        state.sql_attempts.push(failed_attempt(2));
        state.sql_attempts.push(failed_attempt(3));
        state.synthesis_attempts = 2;
        state.routing = Some(RoutingDecision::fallback());
        let confidence = score_confidence(&state, &PenaltyConfig::default());
        assert_eq!(confidence, 0.0);
    }

    #[test]
    fn test_confidence_validation_retry_penalty() {
        let mut state = base_state();
        state.sql_attempts.push(ok_attempt(1, &["orders"]));
        state.citations = vec!["orders".to_string()];
        state.synthesis_attempts = 2;
        let confidence = score_confidence(&state, &PenaltyConfig::default());
        assert!((confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_always_in_unit_interval() {
        let penalties = PenaltyConfig::default();
        let mut state = base_state();
        for n in 1..=3 {
            state.sql_attempts.push(failed_attempt(n));
        }
        state.synthesis_attempts = 2;
        state.routing = Some(RoutingDecision::fallback());
        let confidence = score_confidence(&state, &penalties);
        assert!((0.0..=1.0).contains(&confidence));
    }
}
