use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::{SqlToolError, SqlToolResult};

/// Declared column of a retail table.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSchema {
    pub name: String,
    pub declared_type: String,
    pub primary_key: bool,
}

/// A retail table with its declared columns, in declaration order.
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
}

/// Live snapshot of the database schema.
#[derive(Debug, Clone, Default)]
pub struct DatabaseSchema {
    pub tables: Vec<TableSchema>,
}

impl DatabaseSchema {
    /// Render the schema as grounding text for SQL generation.
    ///
    /// Beyond the raw tables this carries the revenue formula, the common
    /// join paths and the SQLite dialect warnings; small models keep
    /// reaching for vendor date functions without them.
    pub fn render_prompt(&self) -> String {
        let mut parts = vec!["Database Schema (SQLite):".to_string()];

        for table in &self.tables {
            parts.push(format!("\n{}:", table.name));
            for col in &table.columns {
                let pk_marker = if col.primary_key { " (PRIMARY KEY)" } else { "" };
                parts.push(format!("  - {} ({}){}", col.name, col.declared_type, pk_marker));
            }
        }

        parts.push("\nRevenue Calculation: UnitPrice * Quantity * (1 - Discount)".to_string());
        parts.push("\nCommon Joins:".to_string());
        parts.push("  - orders JOIN order_items ON orders.OrderID = order_items.OrderID".to_string());
        parts.push(
            "  - order_items JOIN products ON order_items.ProductID = products.ProductID"
                .to_string(),
        );
        parts.push(
            "  - products JOIN categories ON products.CategoryID = categories.CategoryID (to get CategoryName)"
                .to_string(),
        );
        parts.push(
            "  - orders JOIN customers ON orders.CustomerID = customers.CustomerID".to_string(),
        );
        parts.push("\nIMPORTANT SQLite Syntax:".to_string());
        parts.push("  - Use strftime('%Y', OrderDate) for year extraction".to_string());
        parts.push("  - Use strftime('%m', OrderDate) for month extraction".to_string());
        parts.push(
            "  - Date filtering: OrderDate >= '1997-01-01' AND OrderDate <= '1997-12-31'"
                .to_string(),
        );
        parts.push(
            "  - NEVER use DATEPART or YEAR() - use strftime() instead".to_string(),
        );
        parts.push(
            "  - CategoryName is in categories table, NOT products - always JOIN categories!"
                .to_string(),
        );

        parts.join("\n")
    }
}

/// Introspects the live retail database schema.
///
/// Always queries `sqlite_master` and `PRAGMA table_info` per call; SQL
/// generation must never see a stale cached copy of the schema.
#[derive(Clone)]
pub struct SchemaInspector {
    pool: SqlitePool,
}

impl SchemaInspector {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Describe every user table with its declared columns.
    pub async fn describe(&self) -> SqlToolResult<DatabaseSchema> {
        let table_rows = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(SqlToolError::from_sqlx)?;

        let mut tables = Vec::with_capacity(table_rows.len());

        for row in table_rows {
            let name: String = row.try_get("name").map_err(SqlToolError::from_sqlx)?;

            // PRAGMA arguments cannot be bound; the name comes straight from
            // sqlite_master so quoting it is sufficient.
            let column_rows = sqlx::query(&format!("PRAGMA table_info(\"{}\")", name))
                .fetch_all(&self.pool)
                .await
                .map_err(SqlToolError::from_sqlx)?;

            let columns = column_rows
                .iter()
                .map(|col| {
                    let col_name: String = col.try_get("name")?;
                    let declared_type: String = col.try_get("type")?;
                    let pk: i64 = col.try_get("pk")?;
                    Ok(ColumnSchema {
                        name: col_name,
                        declared_type,
                        primary_key: pk > 0,
                    })
                })
                .collect::<Result<Vec<_>, sqlx::Error>>()
                .map_err(SqlToolError::from_sqlx)?;

            tables.push(TableSchema { name, columns });
        }

        debug!(tables = tables.len(), "Inspected database schema");
        Ok(DatabaseSchema { tables })
    }
}
