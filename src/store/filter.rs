//! Settings filter predicates
//!
//! Callers describe the settings a room or party must have as a JSON object.
//! A plain value means equality; an operator object such as
//! `{"@func": ">=", "@value": 10}` means a numeric comparison, and
//! `{"@func": "in", "@value": [..]}` means membership. The document is parsed
//! once into a closed set of predicates and anything else is rejected.

use crate::error::{MatchmakingError, Result};
use crate::types::Settings;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

const FUNC_KEY: &str = "@func";
const VALUE_KEY: &str = "@value";

/// Numeric comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    fn parse(func: &str) -> Option<Self> {
        match func {
            "=" | "==" => Some(CompareOp::Eq),
            "!=" | "<>" => Some(CompareOp::Ne),
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Ge),
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Le),
            _ => None,
        }
    }

    pub fn apply(&self, left: f64, right: f64) -> bool {
        match self {
            CompareOp::Eq => left == right,
            CompareOp::Ne => left != right,
            CompareOp::Gt => left > right,
            CompareOp::Ge => left >= right,
            CompareOp::Lt => left < right,
            CompareOp::Le => left <= right,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
        };
        write!(f, "{}", symbol)
    }
}

/// One condition over a single settings field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    /// Field equals a scalar value; numbers compare numerically
    Equals { field: String, value: Value },
    /// Field is a number satisfying the comparison
    Compare {
        field: String,
        op: CompareOp,
        value: f64,
    },
    /// Field equals one of the listed scalars
    In { field: String, values: Vec<Value> },
}

impl Predicate {
    pub fn field(&self) -> &str {
        match self {
            Predicate::Equals { field, .. }
            | Predicate::Compare { field, .. }
            | Predicate::In { field, .. } => field,
        }
    }

    pub fn matches(&self, settings: &Settings) -> bool {
        let Some(actual) = settings.get(self.field()) else {
            return false;
        };

        match self {
            Predicate::Equals { value, .. } => scalar_eq(actual, value),
            Predicate::Compare { op, value, .. } => actual
                .as_f64()
                .map_or(false, |actual| op.apply(actual, *value)),
            Predicate::In { values, .. } => values.iter().any(|v| scalar_eq(actual, v)),
        }
    }
}

fn scalar_eq(left: &Value, right: &Value) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(l), Some(r)) => l == r,
        _ => left == right,
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

fn invalid(reason: String) -> anyhow::Error {
    MatchmakingError::InvalidFilter { reason }.into()
}

/// Conjunction of predicates; an empty filter matches everything
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsFilter {
    predicates: Vec<Predicate>,
}

impl SettingsFilter {
    pub fn new(predicates: Vec<Predicate>) -> Self {
        Self { predicates }
    }

    /// Parse a filter document
    pub fn parse(document: &Value) -> Result<Self> {
        let object = match document {
            Value::Null => return Ok(Self::default()),
            Value::Object(object) => object,
            other => {
                return Err(invalid(format!(
                    "filter must be an object, got {}",
                    other
                )))
            }
        };

        let mut predicates = Vec::with_capacity(object.len());
        for (field, condition) in object {
            predicates.push(Self::parse_condition(field, condition)?);
        }
        Ok(Self { predicates })
    }

    fn parse_condition(field: &str, condition: &Value) -> Result<Predicate> {
        let operator = match condition {
            Value::Object(operator) => operator,
            value if is_scalar(value) => {
                return Ok(Predicate::Equals {
                    field: field.to_string(),
                    value: value.clone(),
                })
            }
            other => {
                return Err(invalid(format!(
                    "unsupported condition for '{}': {}",
                    field, other
                )))
            }
        };

        let func = operator
            .get(FUNC_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| invalid(format!("condition for '{}' has no {}", field, FUNC_KEY)))?;
        let value = operator
            .get(VALUE_KEY)
            .ok_or_else(|| invalid(format!("condition for '{}' has no {}", field, VALUE_KEY)))?;

        if func == "in" {
            let values = value
                .as_array()
                .ok_or_else(|| invalid(format!("'in' for '{}' needs an array", field)))?;
            if let Some(bad) = values.iter().find(|v| !is_scalar(v)) {
                return Err(invalid(format!("'in' for '{}' has non-scalar {}", field, bad)));
            }
            return Ok(Predicate::In {
                field: field.to_string(),
                values: values.clone(),
            });
        }

        let op = CompareOp::parse(func)
            .ok_or_else(|| invalid(format!("unsupported function '{}'", func)))?;
        let number = value
            .as_f64()
            .ok_or_else(|| invalid(format!("'{}' for '{}' needs a number", func, field)))?;

        Ok(Predicate::Compare {
            field: field.to_string(),
            op,
            value: number,
        })
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn matches(&self, settings: &Settings) -> bool {
        self.predicates.iter().all(|p| p.matches(settings))
    }
}
