use std::sync::Arc;

use tracing::{debug, info};

use super::strip_sql_fences;
use crate::error::ModelResult;
use crate::model::{CompletionModel, Message};
use crate::pipeline::Question;
use crate::prompts::SQL_GENERATION_PROMPT;

/// Prior attempt context fed back into generation on a retry.
#[derive(Debug, Clone)]
pub struct ErrorFeedback {
    /// The statement that failed.
    pub statement: String,
    /// The full error text, not a summary.
    pub error: String,
}

/// Generates one SQLite statement per call from question, live schema and
/// extracted constraints.
pub struct SqlGenerator {
    model: Arc<dyn CompletionModel>,
}

impl SqlGenerator {
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        Self { model }
    }

    /// Generate a statement. `feedback` is present on retries (attempt > 1)
    /// and carries the previous failure verbatim.
    pub async fn generate(
        &self,
        question: &Question,
        schema_text: &str,
        constraints_summary: &str,
        feedback: Option<&ErrorFeedback>,
    ) -> ModelResult<String> {
        let mut user_message = format!(
            "{}\n\nQuestion: {}\n\nConstraints:\n{}",
            schema_text, question.text, constraints_summary
        );

        if let Some(feedback) = feedback {
            user_message.push_str(&format!(
                "\n\nPrevious error: {}\nPrevious query: {}",
                feedback.error, feedback.statement
            ));
        }

        let messages = vec![
            Message::system(SQL_GENERATION_PROMPT),
            Message::user(user_message),
        ];

        let completion = self.model.complete(messages).await?;
        let statement = strip_sql_fences(&completion);

        if feedback.is_some() {
            info!(question_id = %question.id, "Regenerated SQL with error feedback");
        } else {
            debug!(question_id = %question.id, statement = %statement, "Generated SQL");
        }

        Ok(statement)
    }
}
