//! Metadata filters.
//!
//! A [`Filter`] is a predicate tree evaluated against a document's metadata
//! record. Filters are built from JSON (see [`parser`]) or with the typed
//! constructors:
//!
//! ```
//! use lexstore::data::{DataValue, Metadata};
//! use lexstore::filter::{Condition, Filter};
//!
//! let recent = Filter::condition("year", Condition::Gte(DataValue::Int64(2023))).unwrap();
//! let english = Filter::eq("lang", "en");
//! let filter = Filter::and(vec![recent, english]);
//!
//! let mut metadata = Metadata::new();
//! metadata.insert("year".into(), DataValue::Int64(2024));
//! metadata.insert("lang".into(), DataValue::from("en"));
//! assert!(filter.evaluate(&metadata));
//! ```

pub mod parser;
pub mod predicate;

use std::str::FromStr;

use serde_json::Value;

use crate::data::{DataValue, Metadata};
use crate::error::{LexstoreError, Result};

pub use predicate::{Condition, Predicate};

/// A validated metadata filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    predicate: Predicate,
}

impl Filter {
    /// The open filter: matches every document.
    pub fn all() -> Self {
        Filter {
            predicate: Predicate::And(Vec::new()),
        }
    }

    /// Build a filter from a JSON value.
    pub fn from_json(value: &Value) -> Result<Self> {
        parser::parse_value(value).map(Filter::from)
    }

    /// Parse a filter from JSON text.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| LexstoreError::invalid_filter(format!("malformed filter JSON: {e}")))?;
        Self::from_json(&value)
    }

    /// `field == value`.
    pub fn eq(field: impl Into<String>, value: impl Into<DataValue>) -> Self {
        Filter::from(Predicate::Field {
            field: field.into(),
            condition: Condition::Eq(value.into()),
        })
    }

    /// Apply a condition to a field.
    ///
    /// Fails with [`LexstoreError::InvalidFilter`] when the operand does not
    /// suit the operator (a non-numeric bound, a nested list in a set).
    pub fn condition(field: impl Into<String>, condition: Condition) -> Result<Self> {
        let field = field.into();
        check_operand(&field, &condition)?;
        Ok(Filter::from(Predicate::Field { field, condition }))
    }

    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::from(Predicate::And(
            filters.into_iter().map(|f| f.predicate).collect(),
        ))
    }

    /// Disjunction. An empty disjunction matches nothing.
    pub fn or(filters: Vec<Filter>) -> Self {
        Filter::from(Predicate::Or(
            filters.into_iter().map(|f| f.predicate).collect(),
        ))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(filter: Filter) -> Self {
        Filter::from(Predicate::Not(Box::new(filter.predicate)))
    }

    /// Whether this filter matches every record without looking at it.
    pub fn is_open(&self) -> bool {
        matches!(&self.predicate, Predicate::And(children) if children.is_empty())
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// Evaluate against a metadata record.
    pub fn evaluate(&self, metadata: &Metadata) -> bool {
        self.predicate.evaluate(metadata)
    }
}

impl Default for Filter {
    fn default() -> Self {
        Filter::all()
    }
}

impl From<Predicate> for Filter {
    fn from(predicate: Predicate) -> Self {
        Filter { predicate }
    }
}

impl FromStr for Filter {
    type Err = LexstoreError;

    fn from_str(s: &str) -> Result<Self> {
        Filter::parse(s)
    }
}

impl TryFrom<Value> for Filter {
    type Error = LexstoreError;

    fn try_from(value: Value) -> Result<Self> {
        Filter::from_json(&value)
    }
}

fn check_operand(field: &str, condition: &Condition) -> Result<()> {
    let bad = |expected: &str, got: &DataValue| {
        Err(LexstoreError::invalid_filter(format!(
            "'{}' on field '{field}' expects {expected}, got {}",
            condition.operator(),
            got.type_name()
        )))
    };
    match condition {
        Condition::Gt(v) | Condition::Gte(v) | Condition::Lt(v) | Condition::Lte(v) => {
            match v.as_number() {
                Some(n) if n.is_finite() => Ok(()),
                _ => bad("a finite number", v),
            }
        }
        Condition::Eq(v) | Condition::Ne(v) if !v.is_scalar() => bad("a scalar", v),
        Condition::In(set) | Condition::Nin(set) => match set.iter().find(|v| !v.is_scalar()) {
            Some(v) => bad("a list of scalars", v),
            None => Ok(()),
        },
        _ => Ok(()),
    }
}
