//! Predicate tree and its evaluation against a metadata record.

use std::cmp::Ordering;

use crate::data::{DataValue, Metadata};

/// A test applied to the value of one metadata field.
///
/// Absent fields: comparisons, equality and `In` are false; `Nin` and `Ne`
/// are true; `Exists(false)` is true.
///
/// List-valued fields: `Eq` and `In` match when any element matches; `Ne` and
/// `Nin` match when no element does; ordering comparisons never match.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(DataValue),
    Ne(DataValue),
    Gt(DataValue),
    Gte(DataValue),
    Lt(DataValue),
    Lte(DataValue),
    In(Vec<DataValue>),
    Nin(Vec<DataValue>),
    Exists(bool),
}

impl Condition {
    /// Operator name as written in JSON filters.
    pub fn operator(&self) -> &'static str {
        match self {
            Condition::Eq(_) => "$eq",
            Condition::Ne(_) => "$ne",
            Condition::Gt(_) => "$gt",
            Condition::Gte(_) => "$gte",
            Condition::Lt(_) => "$lt",
            Condition::Lte(_) => "$lte",
            Condition::In(_) => "$in",
            Condition::Nin(_) => "$nin",
            Condition::Exists(_) => "$exists",
        }
    }

    /// Evaluate against a field value (`None` when the field is absent).
    pub fn matches(&self, value: Option<&DataValue>) -> bool {
        match self {
            Condition::Exists(expected) => value.is_some() == *expected,
            Condition::Eq(operand) => value.is_some_and(|v| equals(v, operand)),
            Condition::Ne(operand) => !value.is_some_and(|v| equals(v, operand)),
            Condition::In(set) => value.is_some_and(|v| member_of(v, set)),
            Condition::Nin(set) => !value.is_some_and(|v| member_of(v, set)),
            Condition::Gt(operand) => compare(value, operand, |o| o == Ordering::Greater),
            Condition::Gte(operand) => compare(value, operand, |o| o != Ordering::Less),
            Condition::Lt(operand) => compare(value, operand, |o| o == Ordering::Less),
            Condition::Lte(operand) => compare(value, operand, |o| o != Ordering::Greater),
        }
    }
}

fn equals(value: &DataValue, operand: &DataValue) -> bool {
    match value.as_list() {
        Some(items) if operand.is_scalar() => items.iter().any(|v| v.matches(operand)),
        _ => value.matches(operand),
    }
}

fn member_of(value: &DataValue, set: &[DataValue]) -> bool {
    match value.as_list() {
        Some(items) => items.iter().any(|v| set.iter().any(|s| v.matches(s))),
        None => set.iter().any(|s| value.matches(s)),
    }
}

fn compare(
    value: Option<&DataValue>,
    operand: &DataValue,
    accept: impl Fn(Ordering) -> bool,
) -> bool {
    value
        .and_then(|v| v.compare_numeric(operand))
        .is_some_and(accept)
}

/// A boolean expression over metadata fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// True when every child is true; an empty conjunction is always true.
    And(Vec<Predicate>),
    /// True when any child is true; an empty disjunction is always false.
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    Field { field: String, condition: Condition },
}

impl Predicate {
    /// Evaluate against a metadata record.
    ///
    /// Pure and short-circuiting: conjunctions stop at the first false child,
    /// disjunctions at the first true one.
    pub fn evaluate(&self, metadata: &Metadata) -> bool {
        match self {
            Predicate::And(children) => children.iter().all(|p| p.evaluate(metadata)),
            Predicate::Or(children) => children.iter().any(|p| p.evaluate(metadata)),
            Predicate::Not(inner) => !inner.evaluate(metadata),
            Predicate::Field { field, condition } => condition.matches(metadata.get(field)),
        }
    }

    /// Number of field leaves in the tree.
    pub fn leaf_count(&self) -> usize {
        match self {
            Predicate::And(children) | Predicate::Or(children) => {
                children.iter().map(Predicate::leaf_count).sum()
            }
            Predicate::Not(inner) => inner.leaf_count(),
            Predicate::Field { .. } => 1,
        }
    }
}
