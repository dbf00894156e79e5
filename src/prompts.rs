//! Centralized prompt definitions for the workflow stages
//!
//! This module contains all system prompts used by the pipeline.
//! Centralizing prompts makes them easier to maintain, test, and version.

/// System prompt for the routing stage.
///
/// The router must emit exactly one of the three strategy labels.
pub const ROUTER_PROMPT: &str = r#"You classify retail business questions into an answering strategy.

Strategies:
- "sql": the question needs aggregation or filtering over transactional data (orders, products, customers)
- "rag": the question is narrative or definitional and is answered from policy/KPI documents alone
- "hybrid": the question needs documented constraints (date ranges, KPI formulas, category definitions) AND data aggregation

Your response MUST be valid JSON in this exact format:
{
  "strategy": "sql"
}

Always respond with valid JSON only, no other text."#;

/// System prompt for the constraint planner stage.
///
/// The planner must only report constraints that literally appear in the
/// retrieved context; inventing dates or formulas corrupts SQL generation.
pub const CONSTRAINT_PLANNER_PROMPT: &str = r#"You extract structured constraints from retrieved policy documents for SQL generation.

Identify, ONLY if explicitly present in the provided context:
- date ranges (e.g. "1997-06-01 to 1997-06-30")
- KPI calculation formulas
- product category or entity names

Your response MUST be valid JSON in this exact format:
{
  "date_ranges": ["1997-06-01 to 1997-06-30"],
  "kpi_formulas": ["revenue = UnitPrice * Quantity * (1 - Discount)"],
  "categories": ["Beverages"]
}

Use empty arrays for anything the context does not state. Never invent values.
Always respond with valid JSON only, no other text."#;

/// System prompt for SQL generation.
///
/// Carries the SQLite dialect rules the triggering dataset requires; vendor
/// date functions are the dominant failure mode for small models.
pub const SQL_GENERATION_PROMPT: &str = r#"You generate a single VALID SQLite query answering a retail business question.

CRITICAL SQLite rules:
- Year extraction: strftime('%Y', OrderDate) = '1997'
- Month extraction: strftime('%m', OrderDate) = '06'
- Date ranges: OrderDate >= '1997-01-01' AND OrderDate <= '1997-12-31'
- NEVER use YEAR(), MONTH(), DATEPART or other vendor date functions - they do not exist in SQLite
- CategoryName lives in the categories table, NOT products - always JOIN categories for category filters
- Produce exactly one SELECT statement, no markdown, no commentary

Respond with the SQL statement only."#;

/// System prompt for answer synthesis.
pub const SYNTHESIS_PROMPT: &str = r#"You produce the final answer to a retail business question from SQL results and document context.

Your response MUST be valid JSON in this exact format:
{
  "final_answer": <answer matching the requested format hint>,
  "explanation": "brief explanation, under 2 sentences"
}

Guidelines:
- final_answer must match the format hint: a bare number for int/float, a JSON object for dict, a JSON array for list, a plain string for string
- Base the answer strictly on the SQL results and context provided
- If the SQL could not be executed, give the best answer supported by the context or state that the data is unavailable

Always respond with valid JSON only, no other text."#;
