use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub model: ModelConfig,
    pub database: DatabaseConfig,
    pub retrieval: RetrievalConfig,
    pub request: RequestConfig,
    pub repair: RepairConfig,
    pub penalties: PenaltyConfig,
    pub logging: LoggingConfig,
    pub batch: BatchConfig,
}

/// Completion endpoint configuration (OpenAI-compatible chat API)
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub api_key: String,
    pub base_url: String,
    pub model_name: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// Retail dataset configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
    pub query_timeout_ms: u64,
}

/// Document corpus / lexical index configuration
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub docs_dir: PathBuf,
    pub top_k: usize,
}

/// HTTP request configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
}

/// Bounds for the generation-execution repair loop and re-synthesis
#[derive(Debug, Clone)]
pub struct RepairConfig {
    /// Total SQL attempts per question (initial + retries).
    pub max_sql_attempts: u32,
    /// Total synthesis attempts per question (initial + format retry).
    pub max_synthesis_attempts: u32,
}

/// Named confidence penalty constants.
///
/// Exposed as configuration so the heuristics can be recalibrated without
/// code changes. Confidence starts at 1.0 and each applicable penalty is
/// subtracted, then the result is clamped to [0.0, 1.0].
#[derive(Debug, Clone)]
pub struct PenaltyConfig {
    /// Applied once per SQL retry incurred.
    pub sql_retry: f64,
    /// Applied when the final accepted attempt still carried an error.
    pub final_execution_error: f64,
    /// Applied when validation forced a re-synthesis.
    pub validation_failure: f64,
    /// Applied when the answer carries no citations at all.
    pub no_citations: f64,
    /// Applied when the router fell back to hybrid on unmappable output.
    pub routing_fallback: f64,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Batch processing configuration
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Maximum questions processed concurrently.
    pub workers: usize,
    /// Optional directory for per-question stage trace dumps.
    pub trace_dir: Option<PathBuf>,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let model = ModelConfig {
            api_key: env::var("MODEL_API_KEY").unwrap_or_default(),
            base_url: env::var("MODEL_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:11434/v1".to_string()),
            model_name: env::var("MODEL_NAME")
                .unwrap_or_else(|_| "phi3.5:3.8b-mini-instruct-q4_K_M".to_string()),
            temperature: env_parse("MODEL_TEMPERATURE", 0.0),
            max_tokens: env_parse("MODEL_MAX_TOKENS", 1024),
        };

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/northwind.sqlite".to_string()),
            ),
            max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 5),
            query_timeout_ms: env_parse("SQL_TIMEOUT_MS", 10_000),
        };

        let retrieval = RetrievalConfig {
            docs_dir: PathBuf::from(env::var("DOCS_DIR").unwrap_or_else(|_| "./docs".to_string())),
            top_k: env_parse("RETRIEVAL_TOP_K", 3),
        };

        let request = RequestConfig {
            timeout_ms: env_parse("REQUEST_TIMEOUT_MS", 30_000),
        };

        let repair = RepairConfig {
            max_sql_attempts: env_parse("MAX_SQL_ATTEMPTS", 3),
            max_synthesis_attempts: env_parse("MAX_SYNTHESIS_ATTEMPTS", 2),
        };

        let penalties = PenaltyConfig {
            sql_retry: env_parse("PENALTY_SQL_RETRY", 0.2),
            final_execution_error: env_parse("PENALTY_EXECUTION_ERROR", 0.3),
            validation_failure: env_parse("PENALTY_VALIDATION_FAILURE", 0.3),
            no_citations: env_parse("PENALTY_NO_CITATIONS", 0.2),
            routing_fallback: env_parse("PENALTY_ROUTING_FALLBACK", 0.1),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let batch = BatchConfig {
            workers: env_parse("BATCH_WORKERS", 4).max(1),
            trace_dir: env::var("TRACE_DIR").ok().map(PathBuf::from),
        };

        Ok(Config {
            model,
            database,
            retrieval,
            request,
            repair,
            penalties,
            logging,
            batch,
        })
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self { timeout_ms: 30_000 }
    }
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            max_sql_attempts: 3,
            max_synthesis_attempts: 2,
        }
    }
}

impl Default for PenaltyConfig {
    fn default() -> Self {
        Self {
            sql_retry: 0.2,
            final_execution_error: 0.3,
            validation_failure: 0.3,
            no_citations: 0.2,
            routing_fallback: 0.1,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            trace_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repair_default_ceilings() {
        let repair = RepairConfig::default();
        assert_eq!(repair.max_sql_attempts, 3);
        assert_eq!(repair.max_synthesis_attempts, 2);
    }

    #[test]
    fn test_penalty_defaults() {
        let p = PenaltyConfig::default();
        assert_eq!(p.sql_retry, 0.2);
        assert_eq!(p.final_execution_error, 0.3);
        assert_eq!(p.validation_failure, 0.3);
        assert_eq!(p.no_citations, 0.2);
        assert_eq!(p.routing_fallback, 0.1);
    }

    #[test]
    fn test_env_parse_falls_back_on_garbage() {
        std::env::set_var("TEST_ENV_PARSE_GARBAGE", "not-a-number");
        let v: u32 = env_parse("TEST_ENV_PARSE_GARBAGE", 7);
        assert_eq!(v, 7);
        std::env::remove_var("TEST_ENV_PARSE_GARBAGE");
    }
}
