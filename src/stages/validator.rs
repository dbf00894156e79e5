//! Pure format-hint validation of candidate answers.
//!
//! Structural coercion rules: a JSON value satisfies the hint directly, and
//! a string satisfies int/float/dict/list when it parses cleanly to one.

use serde_json::Value;

use crate::pipeline::{FormatHint, ValidationResult};

/// Check a candidate answer against the required format hint.
pub fn check(answer: &Value, hint: FormatHint) -> ValidationResult {
    match hint {
        FormatHint::Int => check_int(answer),
        FormatHint::Float => check_float(answer),
        FormatHint::Dict => check_container(answer, hint),
        FormatHint::List => check_container(answer, hint),
        FormatHint::String => check_string(answer),
    }
}

fn check_int(answer: &Value) -> ValidationResult {
    match answer {
        Value::Number(n) if n.is_i64() || n.is_u64() => ValidationResult::pass(),
        Value::Number(n) => match n.as_f64() {
            // Whole-valued floats coerce cleanly to int.
            Some(f) if f.fract() == 0.0 => ValidationResult::pass(),
            _ => ValidationResult::fail(format!("expected int, got non-integral number {}", n)),
        },
        Value::String(s) if s.trim().parse::<i64>().is_ok() => ValidationResult::pass(),
        other => ValidationResult::fail(format!(
            "expected int, got {}: {}",
            type_name(other),
            preview(other)
        )),
    }
}

fn check_float(answer: &Value) -> ValidationResult {
    match answer {
        Value::Number(_) => ValidationResult::pass(),
        Value::String(s) if s.trim().parse::<f64>().is_ok() => ValidationResult::pass(),
        other => ValidationResult::fail(format!(
            "expected float, got {}: {}",
            type_name(other),
            preview(other)
        )),
    }
}

fn check_container(answer: &Value, hint: FormatHint) -> ValidationResult {
    let wanted_object = hint == FormatHint::Dict;
    let matches = |value: &Value| {
        if wanted_object {
            value.is_object()
        } else {
            value.is_array()
        }
    };

    if matches(answer) {
        return ValidationResult::pass();
    }

    // A string holding a JSON literal of the right shape satisfies the hint.
    if let Value::String(s) = answer {
        if let Ok(parsed) = serde_json::from_str::<Value>(s) {
            if matches(&parsed) {
                return ValidationResult::pass();
            }
        }
    }

    ValidationResult::fail(format!(
        "expected {}, got {}: {}",
        hint.as_str(),
        type_name(answer),
        preview(answer)
    ))
}

fn check_string(answer: &Value) -> ValidationResult {
    match answer {
        Value::String(s) if !s.trim().is_empty() => ValidationResult::pass(),
        Value::String(_) => ValidationResult::fail("expected string, got empty string"),
        other => ValidationResult::fail(format!(
            "expected string, got {}: {}",
            type_name(other),
            preview(other)
        )),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

fn preview(value: &Value) -> String {
    let rendered = value.to_string();
    rendered.chars().take(80).collect()
}
