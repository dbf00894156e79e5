//! Explicit state machine driving one question to a terminal answer.
//!
//! The orchestrator owns the [`AgentState`] for a question and advances it
//! through a fixed transition table. Stages never see each other and never
//! hold the state across invocations; each one receives what it needs and
//! returns a typed result that the orchestrator merges back in.

use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::{PenaltyConfig, RepairConfig};
use crate::db::{SchemaInspector, SqlExecutor};
use crate::error::AppError;
use crate::model::CompletionModel;
use crate::retrieval::LexicalRetriever;
use crate::stages::{
    score_confidence, validator, ConstraintPlanner, ErrorFeedback, RetrievalStage, Router,
    SqlGenerator, Synthesizer,
};

use super::state::{AgentState, OutputRecord, Question, RouteMode, SqlAttempt};

/// Workflow stages. Transitions are decided by the orchestrator alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Routing,
    Retrieving,
    Planning,
    GeneratingSql,
    ExecutingSql,
    Validating,
    Synthesizing,
    Done,
}

/// Drives one question through route, retrieve, plan, generate, execute,
/// validate and synthesize, always producing exactly one [`OutputRecord`].
pub struct Orchestrator {
    router: Router,
    retrieval: RetrievalStage,
    planner: ConstraintPlanner,
    sql_generator: SqlGenerator,
    synthesizer: Synthesizer,
    executor: SqlExecutor,
    /// Re-inspected before every generation attempt so schema changes made
    /// after startup are visible to the prompt.
    schema: SchemaInspector,
    repair: RepairConfig,
    penalties: PenaltyConfig,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        model: Arc<dyn CompletionModel>,
        retriever: Arc<LexicalRetriever>,
        executor: SqlExecutor,
        schema: SchemaInspector,
        top_k: usize,
        repair: RepairConfig,
        penalties: PenaltyConfig,
    ) -> Self {
        Self {
            router: Router::new(Arc::clone(&model)),
            retrieval: RetrievalStage::new(retriever, top_k),
            planner: ConstraintPlanner::new(Arc::clone(&model)),
            sql_generator: SqlGenerator::new(Arc::clone(&model)),
            synthesizer: Synthesizer::new(model),
            executor,
            schema,
            repair,
            penalties,
        }
    }

    /// Answer one question. Infallible by contract: a model transport or
    /// schema inspection failure aborts the traversal and yields a degraded
    /// record with confidence 0.0 instead of an error.
    pub async fn answer(&self, question: Question) -> (OutputRecord, AgentState) {
        let mut state = AgentState::new(question);
        let mut stage = Stage::Routing;

        loop {
            match self.step(stage, &mut state).await {
                Ok(Stage::Done) => break,
                Ok(next) => stage = next,
                Err(err) => {
                    error!(
                        question_id = %state.question.id,
                        stage = ?stage,
                        error = %err,
                        "Pipeline aborted"
                    );
                    let record = Self::degraded_record(&state, &err);
                    return (record, state);
                }
            }
        }

        let record = self.finish(&state);
        info!(
            question_id = %state.question.id,
            confidence = record.confidence,
            sql_attempts = state.sql_attempts.len(),
            "Question answered"
        );
        (record, state)
    }

    /// Run one stage and return the next one per the transition table.
    async fn step(&self, stage: Stage, state: &mut AgentState) -> Result<Stage, AppError> {
        match stage {
            Stage::Routing => self.route(state).await,
            Stage::Retrieving => Ok(self.retrieve(state)),
            Stage::Planning => self.plan(state).await,
            Stage::GeneratingSql => self.generate_sql(state).await,
            Stage::ExecutingSql => Ok(self.execute_sql(state).await),
            Stage::Validating => Ok(Self::validate(state, &self.repair)),
            Stage::Synthesizing => self.synthesize(state).await,
            Stage::Done => Ok(Stage::Done),
        }
    }

    async fn route(&self, state: &mut AgentState) -> Result<Stage, AppError> {
        let decision = self.router.classify(&state.question).await?;
        state.record(
            "router",
            format!(
                "mode={} fallback={}",
                decision.mode.as_str(),
                decision.fallback
            ),
        );
        state.routing = Some(decision);

        Ok(if decision.mode.uses_retrieval() {
            Stage::Retrieving
        } else {
            Stage::GeneratingSql
        })
    }

    fn retrieve(&self, state: &mut AgentState) -> Stage {
        let chunks = self.retrieval.retrieve(&state.question.text);
        state.context = RetrievalStage::format_context(&chunks);
        state.record("retrieve", format!("chunks={}", chunks.len()));
        state.chunks = chunks;

        let mode = state.routing.map(|r| r.mode).unwrap_or(RouteMode::Hybrid);
        if mode == RouteMode::Rag {
            Stage::Synthesizing
        } else {
            Stage::Planning
        }
    }

    async fn plan(&self, state: &mut AgentState) -> Result<Stage, AppError> {
        state.constraints = self.planner.extract(&state.question, &state.context).await?;
        state.record("planner", format!("constraints={}", state.constraints.len()));
        Ok(Stage::GeneratingSql)
    }

    async fn generate_sql(&self, state: &mut AgentState) -> Result<Stage, AppError> {
        let feedback = state.last_attempt().and_then(|attempt| {
            attempt.error.as_ref().map(|err| ErrorFeedback {
                statement: attempt.statement.clone(),
                error: err.clone(),
            })
        });

        // Inspected per attempt, never cached; a table added or altered
        // mid-batch grounds the very next generation prompt.
        let schema_text = self.schema.describe().await?.render_prompt();

        let summary = ConstraintPlanner::summarize(&state.constraints);
        let statement = self
            .sql_generator
            .generate(&state.question, &schema_text, &summary, feedback.as_ref())
            .await?;

        let attempt_number = state.sql_attempts.len() as u32 + 1;
        state.record("generate_sql", format!("attempt={}", attempt_number));
        state.sql_attempts.push(SqlAttempt {
            statement,
            attempt_number,
            error: None,
            row_count: None,
            referenced_tables: Vec::new(),
        });

        Ok(Stage::ExecutingSql)
    }

    async fn execute_sql(&self, state: &mut AgentState) -> Stage {
        let statement = state.last_statement().to_string();
        match self.executor.execute(&statement).await {
            Ok(result) => {
                state.result_rows = result.rows;
                let row_count = state.result_rows.len();
                if let Some(attempt) = state.sql_attempts.last_mut() {
                    attempt.row_count = Some(row_count);
                    attempt.referenced_tables = result.referenced_tables;
                }
                state.record("execute_sql", format!("rows={}", row_count));
                Stage::Validating
            }
            Err(err) => {
                let message = err.to_string();
                if let Some(attempt) = state.sql_attempts.last_mut() {
                    attempt.error = Some(message.clone());
                }
                state.record("execute_sql", format!("error={}", message));

                if (state.sql_attempts.len() as u32) < self.repair.max_sql_attempts {
                    warn!(
                        question_id = %state.question.id,
                        attempt = state.sql_attempts.len(),
                        error = %message,
                        "SQL execution failed, regenerating"
                    );
                    Stage::GeneratingSql
                } else {
                    warn!(
                        question_id = %state.question.id,
                        attempts = state.sql_attempts.len(),
                        "SQL repair ceiling reached, synthesizing from failure"
                    );
                    Stage::Synthesizing
                }
            }
        }
    }

    /// First entry (no answer yet) passes straight through to synthesis.
    /// After that, a failed check triggers at most one re-synthesis.
    fn validate(state: &mut AgentState, repair: &RepairConfig) -> Stage {
        let answer = match state.current_answer.clone() {
            Some(answer) => answer,
            None => {
                state.record("validator", "no answer yet");
                return Stage::Synthesizing;
            }
        };

        let result = validator::check(&answer, state.question.format_hint);
        state.record(
            "validator",
            if result.passed {
                "passed".to_string()
            } else {
                format!(
                    "failed: {}",
                    result.reason.as_deref().unwrap_or("unspecified")
                )
            },
        );

        let next = if result.passed {
            Stage::Done
        } else if state.synthesis_attempts < repair.max_synthesis_attempts {
            Stage::Synthesizing
        } else {
            Stage::Done
        };
        state.validation = Some(result);
        next
    }

    async fn synthesize(&self, state: &mut AgentState) -> Result<Stage, AppError> {
        let retry_reason = state
            .validation
            .as_ref()
            .filter(|v| !v.passed)
            .and_then(|v| v.reason.clone());

        let synthesis = self
            .synthesizer
            .synthesize(state, retry_reason.as_deref())
            .await?;

        state.current_answer = Some(synthesis.answer);
        state.explanation = synthesis.explanation;
        state.citations = synthesis.citations;
        state.synthesis_attempts += 1;
        state.record(
            "synthesize",
            format!("attempt={}", state.synthesis_attempts),
        );

        Ok(Stage::Validating)
    }

    fn finish(&self, state: &AgentState) -> OutputRecord {
        OutputRecord {
            id: state.question.id.clone(),
            final_answer: state.current_answer.clone().unwrap_or(Value::Null),
            sql: state.last_statement().to_string(),
            confidence: score_confidence(state, &self.penalties),
            explanation: state.explanation.clone(),
            citations: state.citations.clone(),
        }
    }

    fn degraded_record(state: &AgentState, err: &AppError) -> OutputRecord {
        OutputRecord {
            id: state.question.id.clone(),
            final_answer: Value::Null,
            sql: state.last_statement().to_string(),
            confidence: 0.0,
            explanation: format!("Pipeline aborted: {}", err),
            citations: Vec::new(),
        }
    }
}
