//! JSON filter syntax.
//!
//! ```json
//! {
//!   "lang": "en",
//!   "tags": ["rust", "search"],
//!   "year": {"$gte": 2020, "$lt": 2025},
//!   "$or": [{"draft": false}, {"reviewed": {"$exists": true}}]
//! }
//! ```
//!
//! Top-level entries are combined with AND. A scalar value is an equality
//! test, a list value is a membership test, and an object holds one or more
//! operators that must all hold.

use serde_json::{Map, Value};

use crate::data::DataValue;
use crate::error::{LexstoreError, Result};
use crate::filter::predicate::{Condition, Predicate};

/// Parse a JSON filter document into a predicate tree.
pub fn parse_value(value: &Value) -> Result<Predicate> {
    match value {
        Value::Null => Ok(Predicate::And(Vec::new())),
        Value::Object(map) => parse_object(map),
        other => Err(LexstoreError::invalid_filter(format!(
            "filter must be an object, got {}",
            json_type(other)
        ))),
    }
}

fn parse_object(map: &Map<String, Value>) -> Result<Predicate> {
    let mut clauses = Vec::with_capacity(map.len());
    for (key, value) in map {
        match key.as_str() {
            "$and" => clauses.push(Predicate::And(parse_list(key, value)?)),
            "$or" => clauses.push(Predicate::Or(parse_list(key, value)?)),
            "$not" => clauses.push(Predicate::Not(Box::new(parse_nested(key, value)?))),
            op if op.starts_with('$') => {
                return Err(LexstoreError::invalid_filter(format!(
                    "unknown logical operator '{op}'"
                )));
            }
            field => clauses.extend(parse_field(field, value)?),
        }
    }
    Ok(flatten(clauses))
}

fn flatten(mut clauses: Vec<Predicate>) -> Predicate {
    if clauses.len() == 1 {
        clauses.remove(0)
    } else {
        Predicate::And(clauses)
    }
}

fn parse_nested(op: &str, value: &Value) -> Result<Predicate> {
    match value {
        Value::Object(map) => parse_object(map),
        other => Err(LexstoreError::invalid_filter(format!(
            "'{op}' expects an object, got {}",
            json_type(other)
        ))),
    }
}

fn parse_list(op: &str, value: &Value) -> Result<Vec<Predicate>> {
    let items = value.as_array().ok_or_else(|| {
        LexstoreError::invalid_filter(format!("'{op}' expects an array, got {}", json_type(value)))
    })?;
    if items.is_empty() {
        return Err(LexstoreError::invalid_filter(format!(
            "'{op}' requires at least one clause"
        )));
    }
    items.iter().map(|item| parse_nested(op, item)).collect()
}

fn parse_field(field: &str, value: &Value) -> Result<Vec<Predicate>> {
    let leaf = |condition: Condition| Predicate::Field {
        field: field.to_string(),
        condition,
    };
    match value {
        Value::Object(ops) => {
            if ops.is_empty() {
                return Err(LexstoreError::invalid_filter(format!(
                    "field '{field}' has an empty operator object"
                )));
            }
            ops.iter()
                .map(|(op, operand)| parse_condition(field, op, operand).map(&leaf))
                .collect()
        }
        Value::Array(_) => Ok(vec![leaf(Condition::In(scalar_list(field, "list", value)?))]),
        scalar => Ok(vec![leaf(Condition::Eq(scalar_value(field, "equality", scalar)?))]),
    }
}

/// Parse one `"$op": operand` pair for `field`.
pub(crate) fn parse_condition(field: &str, op: &str, operand: &Value) -> Result<Condition> {
    let condition = match op {
        "$eq" => Condition::Eq(scalar_value(field, op, operand)?),
        "$ne" => Condition::Ne(scalar_value(field, op, operand)?),
        "$gt" => Condition::Gt(numeric_value(field, op, operand)?),
        "$gte" => Condition::Gte(numeric_value(field, op, operand)?),
        "$lt" => Condition::Lt(numeric_value(field, op, operand)?),
        "$lte" => Condition::Lte(numeric_value(field, op, operand)?),
        "$in" => Condition::In(scalar_list(field, op, operand)?),
        "$nin" => Condition::Nin(scalar_list(field, op, operand)?),
        "$exists" => Condition::Exists(operand.as_bool().ok_or_else(|| {
            mismatch(field, op, "a boolean", operand)
        })?),
        unknown => {
            return Err(LexstoreError::invalid_filter(format!(
                "unknown operator '{unknown}' on field '{field}'"
            )));
        }
    };
    Ok(condition)
}

fn scalar_value(field: &str, op: &str, operand: &Value) -> Result<DataValue> {
    match operand {
        Value::Array(_) | Value::Object(_) => Err(mismatch(field, op, "a scalar", operand)),
        _ => DataValue::from_json(operand).ok_or_else(|| mismatch(field, op, "a scalar", operand)),
    }
}

fn numeric_value(field: &str, op: &str, operand: &Value) -> Result<DataValue> {
    match DataValue::from_json(operand) {
        Some(value) if value.is_numeric() => Ok(value),
        _ => Err(mismatch(field, op, "a number", operand)),
    }
}

fn scalar_list(field: &str, op: &str, operand: &Value) -> Result<Vec<DataValue>> {
    let items = operand
        .as_array()
        .ok_or_else(|| mismatch(field, op, "an array", operand))?;
    items
        .iter()
        .map(|item| scalar_value(field, op, item))
        .collect()
}

fn mismatch(field: &str, op: &str, expected: &str, got: &Value) -> LexstoreError {
    LexstoreError::invalid_filter(format!(
        "'{op}' on field '{field}' expects {expected}, got {}",
        json_type(got)
    ))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
