use std::time::Duration;

use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, SqlitePool};
use tracing::{debug, warn};

use crate::error::{SqlToolError, SqlToolResult};

/// Result of a successful query execution.
#[derive(Debug, Clone)]
pub struct SqlResult {
    /// Result rows as JSON objects, column name -> value.
    pub rows: Vec<Value>,
    /// Column names in select order.
    pub columns: Vec<String>,
    /// Table names referenced by the statement, first-seen order.
    pub referenced_tables: Vec<String>,
}

/// Read-only SQL executor for the retail dataset.
#[derive(Clone)]
pub struct SqlExecutor {
    pool: SqlitePool,
    timeout_ms: u64,
}

impl SqlExecutor {
    pub fn new(pool: SqlitePool, timeout_ms: u64) -> Self {
        Self { pool, timeout_ms }
    }

    /// Execute a single read-only statement.
    ///
    /// Mutating statements are rejected before touching the database, and
    /// execution is bounded by the configured timeout. All failure classes
    /// surface as a single [`SqlToolError`]; there are no partial results.
    pub async fn execute(&self, statement: &str) -> SqlToolResult<SqlResult> {
        if !is_select(statement) {
            warn!(statement, "Rejected non-select statement");
            return Err(SqlToolError::NonSelect);
        }

        let referenced_tables = referenced_tables(statement);

        let fetch = sqlx::query(statement).fetch_all(&self.pool);
        let rows = match tokio::time::timeout(Duration::from_millis(self.timeout_ms), fetch).await {
            Ok(result) => result.map_err(SqlToolError::from_sqlx)?,
            Err(_) => {
                return Err(SqlToolError::Timeout {
                    timeout_ms: self.timeout_ms,
                })
            }
        };

        let columns: Vec<String> = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let decoded: Vec<Value> = rows.iter().map(decode_row).collect();

        debug!(
            rows = decoded.len(),
            tables = ?referenced_tables,
            "SQL execution succeeded"
        );

        Ok(SqlResult {
            rows: decoded,
            columns,
            referenced_tables,
        })
    }
}

/// True when the statement is a plain read (SELECT or a WITH-prefixed query).
pub fn is_select(statement: &str) -> bool {
    let trimmed = statement.trim_start();
    let head: String = trimmed.chars().take(6).collect::<String>().to_lowercase();
    head.starts_with("select") || head.starts_with("with")
}

/// Statically extract the table names a statement references.
///
/// Scans for identifiers following FROM/JOIN keywords; this is a citation
/// aid, not a SQL parser, so subqueries contribute their inner FROM targets
/// and parenthesized sources are skipped.
pub fn referenced_tables(statement: &str) -> Vec<String> {
    let mut tables = Vec::new();
    let tokens: Vec<&str> = statement.split_whitespace().collect();

    for (i, token) in tokens.iter().enumerate() {
        let keyword = token.trim_matches(|c: char| !c.is_alphanumeric());
        if !keyword.eq_ignore_ascii_case("from") && !keyword.eq_ignore_ascii_case("join") {
            continue;
        }
        let Some(next) = tokens.get(i + 1) else {
            continue;
        };
        if next.starts_with('(') {
            // Derived table; its inner FROM will be scanned on its own.
            continue;
        }
        let name = next
            .trim_matches(|c: char| "(),;".contains(c))
            .to_lowercase();
        if name.is_empty() || name == "select" {
            continue;
        }
        if !tables.contains(&name) {
            tables.push(name);
        }
    }

    tables
}

fn decode_row(row: &SqliteRow) -> Value {
    let mut object = Map::new();
    for (i, column) in row.columns().iter().enumerate() {
        object.insert(column.name().to_string(), decode_value(row, i));
    }
    Value::Object(object)
}

/// Decode one SQLite value into JSON, trying integer, real, then text.
fn decode_value(row: &SqliteRow, index: usize) -> Value {
    if let Ok(value) = row.try_get::<Option<i64>, _>(index) {
        return value.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(value) = row.try_get::<Option<f64>, _>(index) {
        return value.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(value) = row.try_get::<Option<String>, _>(index) {
        return value.map(Value::from).unwrap_or(Value::Null);
    }
    Value::Null
}
