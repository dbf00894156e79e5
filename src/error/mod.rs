use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("SQL tool error: {0}")]
    Sql(#[from] SqlToolError),

    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Language-model client errors
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Model unavailable: {message}")]
    Unavailable { message: String },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors from the retail database tool (schema inspection and execution)
#[derive(Debug, Error)]
pub enum SqlToolError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("non-select statement")]
    NonSelect,

    #[error("SQL syntax error: {message}")]
    Syntax { message: String },

    #[error("unknown table or column: {message}")]
    Semantic { message: String },

    #[error("SQL execution timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("SQL execution failed: {message}")]
    Execution { message: String },
}

impl SqlToolError {
    /// Classify a raw sqlx error into syntax / semantic / execution.
    ///
    /// SQLite reports both classes through the message text, so message
    /// inspection is the only classification signal available.
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        let message = err.to_string();
        let lower = message.to_lowercase();
        if lower.contains("syntax error") {
            SqlToolError::Syntax { message }
        } else if lower.contains("no such table") || lower.contains("no such column") {
            SqlToolError::Semantic { message }
        } else {
            SqlToolError::Execution { message }
        }
    }
}

/// Errors from the document corpus / lexical index
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Failed to read corpus directory {dir}: {message}")]
    CorpusUnreadable { dir: String, message: String },

    #[error("Corpus is empty: no chunks indexed from {dir}")]
    EmptyCorpus { dir: String },
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// Result type alias for database tool operations
pub type SqlToolResult<T> = Result<T, SqlToolError>;
