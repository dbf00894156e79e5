use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::retrieval::RetrievedChunk;

/// Expected structural type of the final answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatHint {
    Int,
    Float,
    Dict,
    List,
    String,
}

impl FormatHint {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatHint::Int => "int",
            FormatHint::Float => "float",
            FormatHint::Dict => "dict",
            FormatHint::List => "list",
            FormatHint::String => "string",
        }
    }

    /// Parse the hint strings that appear in input batches.
    ///
    /// The upstream batch files use Python-flavored hints (`list[dict]`,
    /// `{category: revenue}`), so prefixes and brace literals are accepted.
    pub fn parse(raw: &str) -> Option<Self> {
        let lower = raw.trim().to_lowercase();
        if lower.starts_with('{') {
            return Some(FormatHint::Dict);
        }
        if lower.starts_with("list") || lower.starts_with('[') {
            return Some(FormatHint::List);
        }
        match lower.as_str() {
            "int" | "integer" => Some(FormatHint::Int),
            "float" | "number" => Some(FormatHint::Float),
            "dict" => Some(FormatHint::Dict),
            "str" | "string" => Some(FormatHint::String),
            _ => None,
        }
    }
}

impl std::str::FromStr for FormatHint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FormatHint::parse(s).ok_or_else(|| format!("unknown format hint: {}", s))
    }
}

/// Immutable input question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub format_hint: FormatHint,
}

impl Question {
    pub fn new(id: impl Into<String>, text: impl Into<String>, format_hint: FormatHint) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            format_hint,
        }
    }
}

/// Answering strategy selected by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteMode {
    Sql,
    Rag,
    Hybrid,
}

impl RouteMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteMode::Sql => "sql",
            RouteMode::Rag => "rag",
            RouteMode::Hybrid => "hybrid",
        }
    }

    /// True when the strategy includes document retrieval.
    pub fn uses_retrieval(&self) -> bool {
        matches!(self, RouteMode::Rag | RouteMode::Hybrid)
    }

    /// True when the strategy includes SQL generation.
    pub fn uses_sql(&self) -> bool {
        matches!(self, RouteMode::Sql | RouteMode::Hybrid)
    }
}

impl std::str::FromStr for RouteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sql" => Ok(RouteMode::Sql),
            "rag" => Ok(RouteMode::Rag),
            "hybrid" => Ok(RouteMode::Hybrid),
            other => Err(format!("unknown route mode: {}", other)),
        }
    }
}

/// Routing decision, produced exactly once per question and never revised.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub mode: RouteMode,
    /// Set when the model output could not be mapped to a mode and the
    /// router fell back to hybrid; reduces final confidence.
    pub fallback: bool,
}

impl RoutingDecision {
    pub fn new(mode: RouteMode) -> Self {
        Self {
            mode,
            fallback: false,
        }
    }

    pub fn fallback() -> Self {
        Self {
            mode: RouteMode::Hybrid,
            fallback: true,
        }
    }
}

/// Kind of structured constraint extracted from retrieved documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    DateRange,
    KpiFormula,
    CategoryFilter,
}

/// A structured constraint grounding SQL generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub value: String,
}

/// One SQL generation/execution attempt; history is append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlAttempt {
    pub statement: String,
    /// 1-based attempt counter.
    pub attempt_number: u32,
    /// Execution error, if the attempt failed.
    pub error: Option<String>,
    /// Row count of a successful execution.
    pub row_count: Option<usize>,
    /// Tables referenced by the statement, first-seen order.
    pub referenced_tables: Vec<String>,
}

/// Outcome of checking an answer against its format hint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub passed: bool,
    pub reason: Option<String>,
}

impl ValidationResult {
    pub fn pass() -> Self {
        Self {
            passed: true,
            reason: None,
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            reason: Some(reason.into()),
        }
    }
}

/// One recorded stage execution, for observability and confidence scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageEvent {
    pub stage: String,
    pub at: DateTime<Utc>,
    pub detail: String,
}

/// Aggregate state for one question's traversal of the workflow graph.
///
/// Owned exclusively by the orchestrator. Stages receive a snapshot and
/// return typed patches; nothing holds a reference across invocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub question: Question,
    pub routing: Option<RoutingDecision>,
    pub chunks: Vec<RetrievedChunk>,
    /// Formatted retrieval context actually fed to downstream prompts.
    pub context: String,
    pub constraints: Vec<Constraint>,
    pub sql_attempts: Vec<SqlAttempt>,
    /// Rows from the last successful execution.
    pub result_rows: Vec<Value>,
    pub current_answer: Option<Value>,
    pub explanation: String,
    pub citations: Vec<String>,
    pub validation: Option<ValidationResult>,
    /// Synthesis invocations so far (bounded by config).
    pub synthesis_attempts: u32,
    /// Append-only stage execution log.
    pub trace: Vec<StageEvent>,
}

impl AgentState {
    pub fn new(question: Question) -> Self {
        Self {
            question,
            routing: None,
            chunks: Vec::new(),
            context: String::new(),
            constraints: Vec::new(),
            sql_attempts: Vec::new(),
            result_rows: Vec::new(),
            current_answer: None,
            explanation: String::new(),
            citations: Vec::new(),
            validation: None,
            synthesis_attempts: 0,
            trace: Vec::new(),
        }
    }

    /// Record a stage execution event.
    pub fn record(&mut self, stage: &str, detail: impl Into<String>) {
        self.trace.push(StageEvent {
            stage: stage.to_string(),
            at: Utc::now(),
            detail: detail.into(),
        });
    }

    /// The most recent SQL attempt, if any.
    pub fn last_attempt(&self) -> Option<&SqlAttempt> {
        self.sql_attempts.last()
    }

    /// Number of SQL retries incurred (attempts beyond the first).
    pub fn sql_retries(&self) -> u32 {
        self.sql_attempts.len().saturating_sub(1) as u32
    }

    /// Error of the most recent attempt, when it failed.
    pub fn last_sql_error(&self) -> Option<&str> {
        self.last_attempt().and_then(|a| a.error.as_deref())
    }

    /// The statement of the most recent attempt, or "" if none exists.
    pub fn last_statement(&self) -> &str {
        self.last_attempt().map(|a| a.statement.as_str()).unwrap_or("")
    }

    /// True when a stage with the given trace name ran.
    pub fn stage_ran(&self, stage: &str) -> bool {
        self.trace.iter().any(|e| e.stage == stage)
    }
}

/// Terminal, immutable output; one per question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputRecord {
    pub id: String,
    pub final_answer: Value,
    /// Empty string when no statement was ever generated.
    pub sql: String,
    pub confidence: f64,
    pub explanation: String,
    /// Table names and chunk ids, de-duplicated, first-used order.
    pub citations: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_hint_parse() {
        assert_eq!(FormatHint::parse("int"), Some(FormatHint::Int));
        assert_eq!(FormatHint::parse("float"), Some(FormatHint::Float));
        assert_eq!(FormatHint::parse("str"), Some(FormatHint::String));
        assert_eq!(FormatHint::parse("string"), Some(FormatHint::String));
        assert_eq!(FormatHint::parse("dict"), Some(FormatHint::Dict));
        assert_eq!(FormatHint::parse("list"), Some(FormatHint::List));
        assert_eq!(FormatHint::parse("list[dict]"), Some(FormatHint::List));
        assert_eq!(
            FormatHint::parse("{category: revenue}"),
            Some(FormatHint::Dict)
        );
        assert_eq!(FormatHint::parse("tuple"), None);
    }

    #[test]
    fn test_route_mode_from_str() {
        assert_eq!("sql".parse::<RouteMode>().unwrap(), RouteMode::Sql);
        assert_eq!(" RAG ".parse::<RouteMode>().unwrap(), RouteMode::Rag);
        assert_eq!("Hybrid".parse::<RouteMode>().unwrap(), RouteMode::Hybrid);
        assert!("graph".parse::<RouteMode>().is_err());
    }

    #[test]
    fn test_route_mode_capabilities() {
        assert!(RouteMode::Sql.uses_sql());
        assert!(!RouteMode::Sql.uses_retrieval());
        assert!(RouteMode::Rag.uses_retrieval());
        assert!(!RouteMode::Rag.uses_sql());
        assert!(RouteMode::Hybrid.uses_sql());
        assert!(RouteMode::Hybrid.uses_retrieval());
    }

    #[test]
    fn test_routing_fallback_flag() {
        let decision = RoutingDecision::fallback();
        assert_eq!(decision.mode, RouteMode::Hybrid);
        assert!(decision.fallback);

        let decision = RoutingDecision::new(RouteMode::Sql);
        assert!(!decision.fallback);
    }

    #[test]
    fn test_state_retry_accounting() {
        let question = Question::new("q1", "total revenue", FormatHint::Float);
        let mut state = AgentState::new(question);
        assert_eq!(state.sql_retries(), 0);
        assert!(state.last_attempt().is_none());
        assert_eq!(state.last_statement(), "");

        state.sql_attempts.push(SqlAttempt {
            statement: "SELECT 1".to_string(),
            attempt_number: 1,
            error: Some("syntax error".to_string()),
            row_count: None,
            referenced_tables: vec![],
        });
        state.sql_attempts.push(SqlAttempt {
            statement: "SELECT 2".to_string(),
            attempt_number: 2,
            error: None,
            row_count: Some(1),
            referenced_tables: vec!["orders".to_string()],
        });

        assert_eq!(state.sql_retries(), 1);
        assert!(state.last_sql_error().is_none());
        assert_eq!(state.last_statement(), "SELECT 2");
    }

    #[test]
    fn test_state_trace_recording() {
        let mut state = AgentState::new(Question::new("q", "x", FormatHint::String));
        state.record("router", "mode=sql");
        state.record("generate_sql", "attempt=1");
        assert!(state.stage_ran("router"));
        assert!(state.stage_ran("generate_sql"));
        assert!(!state.stage_ran("retrieve"));
        assert_eq!(state.trace.len(), 2);
    }

    #[test]
    fn test_output_record_serializes_all_fields() {
        let record = OutputRecord {
            id: "q7".to_string(),
            final_answer: serde_json::json!(123.45),
            sql: "SELECT 1".to_string(),
            confidence: 0.8,
            explanation: "test".to_string(),
            citations: vec!["orders".to_string(), "kpi.md::chunk0".to_string()],
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"id\":\"q7\""));
        assert!(json.contains("\"final_answer\":123.45"));
        assert!(json.contains("\"citations\""));
    }
}
