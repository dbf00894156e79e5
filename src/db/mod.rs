//! Retail dataset access: live schema inspection and read-only execution.

mod executor;
mod schema;

pub use executor::{is_select, referenced_tables, SqlExecutor, SqlResult};
pub use schema::{ColumnSchema, DatabaseSchema, SchemaInspector, TableSchema};

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::{SqlToolError, SqlToolResult};

/// Open a pooled, read-only connection to the retail dataset.
///
/// Multiple questions share the pool concurrently; read-only mode is a
/// second line of defense behind the executor's non-select rejection.
pub async fn connect(config: &DatabaseConfig) -> SqlToolResult<SqlitePool> {
    let database_url = format!("sqlite://{}", config.path.display());

    let options = SqliteConnectOptions::from_str(&database_url)
        .map_err(|e| SqlToolError::Connection {
            message: format!("Invalid database URL: {}", e),
        })?
        .read_only(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await
        .map_err(|e| SqlToolError::Connection {
            message: format!("Failed to connect to database: {}", e),
        })?;

    info!(path = %config.path.display(), "Retail database connected (read-only)");
    Ok(pool)
}
