use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use super::extract_json_from_completion;
use crate::error::ModelResult;
use crate::model::{CompletionModel, Message};
use crate::pipeline::{Constraint, ConstraintKind, Question};
use crate::prompts::CONSTRAINT_PLANNER_PROMPT;

/// Expected constraint extraction shape.
#[derive(Debug, Default, Deserialize)]
struct ConstraintResponse {
    #[serde(default)]
    date_ranges: Vec<String>,
    #[serde(default)]
    kpi_formulas: Vec<String>,
    #[serde(default)]
    categories: Vec<String>,
}

/// Extracts structured constraints from retrieved document chunks.
///
/// Hybrid path only. An empty set is a valid outcome and downstream SQL
/// generation proceeds unconstrained; the planner must never invent
/// constraints absent from the retrieved text.
pub struct ConstraintPlanner {
    model: Arc<dyn CompletionModel>,
}

impl ConstraintPlanner {
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        Self { model }
    }

    /// Extract constraints from the retrieval context.
    pub async fn extract(
        &self,
        question: &Question,
        context: &str,
    ) -> ModelResult<Vec<Constraint>> {
        if context.trim().is_empty() {
            debug!(question_id = %question.id, "No retrieval context, skipping extraction");
            return Ok(Vec::new());
        }

        let messages = vec![
            Message::system(CONSTRAINT_PLANNER_PROMPT),
            Message::user(format!(
                "Question: {}\n\nRetrieved context:\n{}",
                question.text, context
            )),
        ];

        let completion = self.model.complete(messages).await?;
        let constraints = Self::map_completion(&completion);

        if constraints.is_empty() {
            info!(question_id = %question.id, "No constraints extracted from context");
        } else {
            info!(
                question_id = %question.id,
                constraints = constraints.len(),
                "Extracted constraints"
            );
        }

        Ok(constraints)
    }

    /// Render constraints as a summary block for the SQL generation prompt.
    pub fn summarize(constraints: &[Constraint]) -> String {
        if constraints.is_empty() {
            return "No specific constraints extracted.".to_string();
        }

        let section = |kind: ConstraintKind| -> String {
            constraints
                .iter()
                .filter(|c| c.kind == kind)
                .map(|c| c.value.as_str())
                .collect::<Vec<_>>()
                .join("; ")
        };

        format!(
            "Date Ranges: {}\nKPI Formulas: {}\nCategories/Entities: {}",
            section(ConstraintKind::DateRange),
            section(ConstraintKind::KpiFormula),
            section(ConstraintKind::CategoryFilter),
        )
    }

    fn map_completion(completion: &str) -> Vec<Constraint> {
        let parsed: ConstraintResponse = match extract_json_from_completion(completion)
            .ok()
            .and_then(|json| serde_json::from_str(json).ok())
        {
            Some(parsed) => parsed,
            None => {
                warn!(
                    completion_preview = %completion.chars().take(120).collect::<String>(),
                    "Unparseable planner output, treating as no constraints"
                );
                return Vec::new();
            }
        };

        let mut constraints = Vec::new();
        let keep = |v: &String| !v.trim().is_empty() && v.trim().to_lowercase() != "none";

        for value in parsed.date_ranges.iter().filter(|v| keep(v)) {
            constraints.push(Constraint {
                kind: ConstraintKind::DateRange,
                value: value.trim().to_string(),
            });
        }
        for value in parsed.kpi_formulas.iter().filter(|v| keep(v)) {
            constraints.push(Constraint {
                kind: ConstraintKind::KpiFormula,
                value: value.trim().to_string(),
            });
        }
        for value in parsed.categories.iter().filter(|v| keep(v)) {
            constraints.push(Constraint {
                kind: ConstraintKind::CategoryFilter,
                value: value.trim().to_string(),
            });
        }

        constraints
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_full_response() {
        let completion = r#"{
            "date_ranges": ["1997-06-01 to 1997-06-30"],
            "kpi_formulas": ["revenue = UnitPrice * Quantity * (1 - Discount)"],
            "categories": ["Beverages"]
        }"#;
        let constraints = ConstraintPlanner::map_completion(completion);
        assert_eq!(constraints.len(), 3);
        assert_eq!(constraints[0].kind, ConstraintKind::DateRange);
        assert_eq!(constraints[1].kind, ConstraintKind::KpiFormula);
        assert_eq!(constraints[2].kind, ConstraintKind::CategoryFilter);
    }

    #[test]
    fn test_map_empty_arrays_yield_no_constraints() {
        let completion = r#"{"date_ranges": [], "kpi_formulas": [], "categories": []}"#;
        assert!(ConstraintPlanner::map_completion(completion).is_empty());
    }

    #[test]
    fn test_map_filters_none_placeholders() {
        let completion = r#"{"date_ranges": ["None", "  "], "kpi_formulas": [], "categories": []}"#;
        assert!(ConstraintPlanner::map_completion(completion).is_empty());
    }

    #[test]
    fn test_map_unparseable_is_empty_not_error() {
        assert!(ConstraintPlanner::map_completion("no constraints here").is_empty());
    }

    #[test]
    fn test_map_missing_fields_default() {
        let completion = r#"{"categories": ["Condiments"]}"#;
        let constraints = ConstraintPlanner::map_completion(completion);
        assert_eq!(constraints.len(), 1);
        assert_eq!(constraints[0].kind, ConstraintKind::CategoryFilter);
    }

    #[test]
    fn test_summarize_empty() {
        assert_eq!(
            ConstraintPlanner::summarize(&[]),
            "No specific constraints extracted."
        );
    }

    #[test]
    fn test_summarize_groups_by_kind() {
        let constraints = vec![
            Constraint {
                kind: ConstraintKind::DateRange,
                value: "1997-06-01 to 1997-06-30".to_string(),
            },
            Constraint {
                kind: ConstraintKind::CategoryFilter,
                value: "Beverages".to_string(),
            },
        ];
        let summary = ConstraintPlanner::summarize(&constraints);
        assert!(summary.contains("Date Ranges: 1997-06-01 to 1997-06-30"));
        assert!(summary.contains("Categories/Entities: Beverages"));
    }
}
