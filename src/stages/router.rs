use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use super::extract_json_from_completion;
use crate::error::ModelResult;
use crate::model::{CompletionModel, Message};
use crate::pipeline::{Question, RoutingDecision};
use crate::prompts::ROUTER_PROMPT;

/// Expected routing completion shape.
#[derive(Debug, Deserialize)]
struct RouteResponse {
    strategy: String,
}

/// Classifies a question into an answering strategy.
///
/// The decision is made once per question and never revised. Unmappable
/// model output falls back to hybrid (the most capable superset) with the
/// degraded-confidence flag set; only transport failures propagate.
pub struct Router {
    model: Arc<dyn CompletionModel>,
}

impl Router {
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        Self { model }
    }

    /// Classify the question.
    pub async fn classify(&self, question: &Question) -> ModelResult<RoutingDecision> {
        let messages = vec![
            Message::system(ROUTER_PROMPT),
            Message::user(format!("Question: {}", question.text)),
        ];

        let completion = self.model.complete(messages).await?;
        debug!(question_id = %question.id, completion = %completion, "Router completion");

        let decision = Self::map_completion(&completion);
        if decision.fallback {
            warn!(
                question_id = %question.id,
                completion_preview = %completion.chars().take(120).collect::<String>(),
                "Router output unmappable, falling back to hybrid"
            );
        } else {
            info!(question_id = %question.id, mode = %decision.mode.as_str(), "Question routed");
        }

        Ok(decision)
    }

    /// Map a completion to a decision, tolerating fenced JSON and bare labels.
    fn map_completion(completion: &str) -> RoutingDecision {
        // JSON shape first, then a bare "sql"/"rag"/"hybrid" label.
        let strategy = match extract_json_from_completion(completion)
            .ok()
            .and_then(|json| serde_json::from_str::<RouteResponse>(json).ok())
        {
            Some(parsed) => parsed.strategy,
            None => completion.to_string(),
        };

        match strategy.trim().to_lowercase().parse() {
            Ok(mode) => RoutingDecision::new(mode),
            Err(_) => RoutingDecision::fallback(),
        }
    }
}
