//! Argument typing: raw marker text → literal of the field's kind.
use std::fmt;

use ordered_float::OrderedFloat;
use serde::Serialize;
use thiserror::Error;

use crate::kinds::FieldKind;
use crate::rules::{ArgSpec, Rule};

/// A typed rule argument. Floats are totally ordered so plans can be compared
/// and hashed; comparisons against them are exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum Literal {
    Int(i64),
    Float(OrderedFloat<f64>),
    Text(String),
    Count(usize),
    List(Vec<Literal>),
}

impl Literal {
    /// The value a float32 field compares against: numbers rounded to single
    /// precision, everything else unchanged.
    pub fn to_single(&self) -> Literal {
        match self {
            Literal::Int(i) => Literal::Float(OrderedFloat(*i as f32 as f64)),
            Literal::Float(x) => Literal::Float(OrderedFloat(x.0 as f32 as f64)),
            Literal::List(items) => Literal::List(items.iter().map(Literal::to_single).collect()),
            other => other.clone(),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(i) => write!(f, "{i}"),
            Literal::Float(x) => write!(f, "{:?}", x.0),
            Literal::Text(s) => f.write_str(s),
            Literal::Count(n) => write!(f, "{n}"),
            Literal::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArgumentError {
    #[error("rule `{rule}` takes no argument")]
    Unexpected { rule: &'static str },
    #[error("rule `{rule}` requires an argument (`{rule}=<value>`)")]
    Missing { rule: &'static str },
    #[error("argument must not be empty")]
    Empty,
    #[error("`{raw}` is not a base-10 integer")]
    NotInteger { raw: String },
    #[error("{value} is out of range for this field ({min}..={max})")]
    OutOfRange { value: i64, min: i64, max: i64 },
    #[error("`{raw}` is not a finite decimal number")]
    NotNumber { raw: String },
    #[error("`{raw}` overflows a float{bits} field")]
    FloatOverflow { raw: String, bits: u8 },
    #[error("`{raw}` is not a non-negative integer")]
    NotCount { raw: String },
    #[error("a {kind} field cannot carry a typed argument")]
    Untypable { kind: &'static str },
}

/// Types `raw` for `rule` applied to a field of `kind`. Compatibility of the
/// rule with the kind is assumed to be checked already.
pub fn type_argument(rule: Rule, raw: Option<&str>, kind: &FieldKind) -> Result<Option<Literal>, ArgumentError> {
    let spec = rule.argument();
    let raw = match (spec, raw) {
        (ArgSpec::None, None) => return Ok(None),
        (ArgSpec::None, Some(_)) => return Err(ArgumentError::Unexpected { rule: rule.name() }),
        (_, None) => return Err(ArgumentError::Missing { rule: rule.name() }),
        (_, Some(raw)) => raw,
    };
    if raw.trim().is_empty() {
        return Err(ArgumentError::Empty);
    }
    let literal = match spec {
        ArgSpec::None => return Err(ArgumentError::Unexpected { rule: rule.name() }),
        ArgSpec::FieldTyped => typed_scalar(raw, kind)?,
        ArgSpec::Count => Literal::Count(count(raw)?),
        ArgSpec::List => Literal::List(
            raw.split_whitespace()
                .map(|item| typed_scalar(item, kind))
                .collect::<Result<Vec<_>, _>>()?,
        ),
    };
    Ok(Some(literal))
}

fn typed_scalar(raw: &str, kind: &FieldKind) -> Result<Literal, ArgumentError> {
    match kind {
        FieldKind::Integer { min, max } => {
            let value = raw
                .trim()
                .parse::<i64>()
                .map_err(|_| ArgumentError::NotInteger { raw: raw.to_string() })?;
            if value < *min || value > *max {
                return Err(ArgumentError::OutOfRange { value, min: *min, max: *max });
            }
            Ok(Literal::Int(value))
        }
        FieldKind::Float { bits } => match raw.trim().parse::<f64>() {
            Ok(value) if *bits == 32 && value.abs() > f32::MAX as f64 => {
                Err(ArgumentError::FloatOverflow { raw: raw.to_string(), bits: *bits })
            }
            Ok(value) if value.is_finite() => Ok(Literal::Float(OrderedFloat(value))),
            _ => Err(ArgumentError::NotNumber { raw: raw.to_string() }),
        },
        FieldKind::Text => Ok(Literal::Text(raw.to_string())),
        other => Err(ArgumentError::Untypable { kind: other.describe() }),
    }
}

fn count(raw: &str) -> Result<usize, ArgumentError> {
    raw.trim().parse::<usize>().map_err(|_| ArgumentError::NotCount { raw: raw.to_string() })
}
