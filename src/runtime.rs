//! In-process validators.
//!
//! A `Validator` is the executable half of an emitted artifact: the same
//! checks the generated Go evaluates, run against a `Record` instance. All
//! checks run (collect-all); the result lists every violation in plan order.
use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;

use crate::kinds::FieldKind;
use crate::markers::FieldPath;
use crate::plan::{Check, ValidationPlan};
use crate::rules::Rule;
use crate::typer::Literal;

// -------------------------------- Values ---------------------------------- //

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null, // nil pointer
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Record(Record),
}

/// Field name → value, in insertion order. Missing fields read as the zero
/// value of their kind, like Go struct fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record(IndexMap<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.0.insert(field.to_string(), value.into());
        self
    }

    pub fn insert(&mut self, field: &str, value: impl Into<Value>) {
        self.0.insert(field.to_string(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn is_zero(&self) -> bool {
        self.0.values().all(Value::is_zero)
    }
}

impl Value {
    pub fn zero(kind: &FieldKind) -> Value {
        match kind {
            FieldKind::Integer { .. } => Value::Int(0),
            FieldKind::Float { .. } => Value::Float(0.0),
            FieldKind::Text => Value::Text(String::new()),
            FieldKind::Bool => Value::Bool(false),
            FieldKind::Record { .. } => Value::Record(Record::new()),
            FieldKind::Pointer { .. } | FieldKind::Collection | FieldKind::Opaque => Value::Null,
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Int(i) => *i == 0,
            Value::Float(x) => *x == 0.0,
            Value::Text(s) => s.is_empty(),
            Value::Record(r) => r.is_zero(),
        }
    }

    /// A float32 field's value, rounded to single precision.
    pub fn to_single(&self) -> Value {
        match self {
            Value::Int(i) => Value::Float(*i as f32 as f64),
            Value::Float(x) => Value::Float(*x as f32 as f64),
            other => other.clone(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this value could inhabit a field of `kind`.
    pub fn conforms(&self, kind: &FieldKind) -> bool {
        match (kind, self) {
            (FieldKind::Integer { min, max }, Value::Int(i)) => min <= i && i <= max,
            (FieldKind::Float { .. }, Value::Float(_) | Value::Int(_)) => true,
            (FieldKind::Text, Value::Text(_)) => true,
            (FieldKind::Bool, Value::Bool(_)) => true,
            (FieldKind::Record { .. }, Value::Record(_)) => true,
            (FieldKind::Pointer { .. }, Value::Null) => true,
            (FieldKind::Pointer { to }, value) => value.conforms(to),
            (FieldKind::Collection | FieldKind::Opaque, _) => true,
            _ => false,
        }
    }

    pub fn from_json(json: &serde_json::Value) -> Result<Value, ValueError> {
        from_json_at(json, &mut Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    #[error("at `{path}`: arrays are not supported in record instances")]
    Array { path: String },
    #[error("at `{path}`: number {number} is not representable")]
    Number { path: String, number: String },
}

fn from_json_at(json: &serde_json::Value, path: &mut Vec<String>) -> Result<Value, ValueError> {
    use serde_json::Value as Json;
    Ok(match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Value::Int(i),
            (None, Some(x)) => Value::Float(x),
            (None, None) => {
                return Err(ValueError::Number { path: path.join("."), number: n.to_string() });
            }
        },
        Json::String(s) => Value::Text(s.clone()),
        Json::Array(_) => return Err(ValueError::Array { path: path.join(".") }),
        Json::Object(map) => {
            let mut record = Record::new();
            for (key, value) in map {
                path.push(key.clone());
                record.insert(key, from_json_at(value, path)?);
                path.pop();
            }
            Value::Record(record)
        }
    })
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Value::Record(v)
    }
}

// ------------------------------ Violations -------------------------------- //

/// One failed check on a concrete value (a format violation).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub path: String,
    pub rule: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub argument: Option<String>,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Violations(Vec<Violation>);

impl Violations {
    pub fn is_valid(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.0.iter()
    }

    /// `(path, rule)` pairs, handy for assertions and summaries.
    pub fn keys(&self) -> Vec<(String, &'static str)> {
        self.0.iter().map(|v| (v.path.clone(), v.rule)).collect()
    }

    pub fn into_result(self) -> Result<(), ValidationFailure> {
        if self.0.is_empty() { Ok(()) } else { Err(ValidationFailure { violations: self.0 }) }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}", summary(.violations))]
pub struct ValidationFailure {
    pub violations: Vec<Violation>,
}

fn summary(violations: &[Violation]) -> String {
    violations.iter().map(|v| v.message.as_str()).collect::<Vec<_>>().join("; ")
}

// ------------------------------ Validators -------------------------------- //

/// Where delegating `required` checks find the nested record's validator.
pub trait ValidatorLookup {
    fn validator(&self, record: &str) -> Option<&Validator>;
}

impl ValidatorLookup for () {
    fn validator(&self, _record: &str) -> Option<&Validator> {
        None
    }
}

impl ValidatorLookup for IndexMap<String, Validator> {
    fn validator(&self, record: &str) -> Option<&Validator> {
        self.get(record)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Validator {
    record: String,
    checks: Vec<Check>,
}

impl Validator {
    pub fn new(plan: &ValidationPlan) -> Self {
        Self { record: plan.record.clone(), checks: plan.checks.clone() }
    }

    pub fn record(&self) -> &str {
        &self.record
    }

    pub fn validate(&self, instance: &Record, lookup: &dyn ValidatorLookup) -> Violations {
        let mut out = Vec::new();
        self.validate_into(instance, &FieldPath::root(), lookup, &mut out);
        Violations(out)
    }

    fn validate_into(&self, instance: &Record, prefix: &FieldPath, lookup: &dyn ValidatorLookup, out: &mut Vec<Violation>) {
        for check in &self.checks {
            let Some(value) = resolve(instance, check) else {
                continue; // behind a nil pointer
            };
            let path = join(prefix, &check.path);

            if let Some(target) = &check.delegate {
                if let Some(inner) = lookup.validator(target) {
                    let empty = Record::new();
                    let record = match &value {
                        Value::Record(r) => r,
                        _ => &empty,
                    };
                    inner.validate_into(record, &path, lookup, out);
                    continue;
                }
            }

            if !value.conforms(&check.kind) {
                out.push(Violation {
                    path: path.to_string(),
                    rule: check.rule.name(),
                    argument: check.argument.as_ref().map(ToString::to_string),
                    message: format!("field {path} must be of kind {}", check.kind.describe()),
                });
                continue;
            }
            let broken = match (check.rule, &check.kind) {
                // the generated Go compares the pointer itself against nil
                (Rule::Required, FieldKind::Pointer { .. }) => value == Value::Null,
                (rule, FieldKind::Float { bits: 32 }) => {
                    rule.violated(&value.to_single(), check.argument.as_ref().map(Literal::to_single).as_ref())
                }
                (rule, _) => rule.violated(&value, check.argument.as_ref()),
            };
            if broken {
                out.push(Violation {
                    path: path.to_string(),
                    rule: check.rule.name(),
                    argument: check.argument.as_ref().map(ToString::to_string),
                    message: format!("field {path} {}", check.rule.describe(check.argument.as_ref())),
                });
            }
        }
    }
}

fn join(prefix: &FieldPath, path: &FieldPath) -> FieldPath {
    path.segments().iter().fold(prefix.clone(), |acc, s| acc.child(s))
}

/// Reads the checked value out of an instance. `None` when a guarding
/// pointer on the way is nil (missing counts as nil).
fn resolve(instance: &Record, check: &Check) -> Option<Value> {
    let segments = check.path.segments();
    let Some((leaf, parents)) = segments.split_last() else {
        return None;
    };
    let empty = Record::new();
    let mut current = instance;
    let mut walked = FieldPath::root();
    for segment in parents {
        walked = walked.child(segment);
        let guarded = check.guards.contains(&walked);
        current = match current.get(segment) {
            Some(Value::Record(r)) => r,
            None | Some(Value::Null) if guarded => return None,
            _ => &empty,
        };
    }
    Some(current.get(leaf).cloned().unwrap_or_else(|| Value::zero(&check.kind)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_values() {
        assert!(Value::Null.is_zero());
        assert!(Value::Float(-0.0).is_zero());
        assert!(!Value::Float(f64::NAN).is_zero());
        assert!(Record::new().with("A", 0).with("B", "").is_zero());
        assert!(!Record::new().with("A", 0).with("B", "x").is_zero());
        assert_eq!(Value::zero(&FieldKind::Text), Value::Text(String::new()));
    }

    #[test]
    fn conformance() {
        let uint8 = FieldKind::Integer { min: 0, max: 255 };
        assert!(Value::Int(200).conforms(&uint8));
        assert!(!Value::Int(300).conforms(&uint8));
        let float = FieldKind::Float { bits: 64 };
        assert!(Value::Int(3).conforms(&float));
        assert!(!Value::Text("3".into()).conforms(&float));
        let ptr = FieldKind::Pointer { to: Box::new(FieldKind::Text) };
        assert!(Value::Null.conforms(&ptr));
        assert!(Value::Text("x".into()).conforms(&ptr));
    }

    #[test]
    fn json_instances() {
        let json = serde_json::json!({"Name": "a", "Age": 3, "Score": 1.5, "P": {"X": null}});
        let Value::Record(r) = Value::from_json(&json).unwrap() else { panic!("record") };
        assert_eq!(r.get("Age"), Some(&Value::Int(3)));
        assert_eq!(r.get("Score"), Some(&Value::Float(1.5)));
        let err = Value::from_json(&serde_json::json!({"Tags": [1]})).unwrap_err();
        assert_eq!(err, ValueError::Array { path: "Tags".into() });
    }

    #[test]
    fn required_pointer_is_satisfied_by_any_non_nil_target() {
        let plan = ValidationPlan {
            record: "T".into(),
            position: crate::syntax::Position { line: 1, column: 1 },
            checks: vec![Check {
                path: FieldPath::parse("Ref"),
                guards: Vec::new(),
                rule: Rule::Required,
                argument: None,
                kind: FieldKind::Pointer { to: Box::new(FieldKind::Text) },
                go_type: "*string".into(),
                position: crate::syntax::Position { line: 2, column: 5 },
                delegate: None,
            }],
        };
        let validator = Validator::new(&plan);
        assert!(validator.validate(&Record::new().with("Ref", ""), &()).is_valid());
        assert_eq!(validator.validate(&Record::new(), &()).keys(), [("Ref".to_string(), "required")]);
        let null = Record::new().with("Ref", Value::Null);
        assert_eq!(validator.validate(&null, &()).len(), 1);
    }

    #[test]
    fn failure_summary_joins_messages() {
        let v = |m: &str| Violation { path: "A".into(), rule: "required", argument: None, message: m.into() };
        let failure = Violations(vec![v("field A is required"), v("field B is required")])
            .into_result()
            .unwrap_err();
        assert_eq!(failure.to_string(), "field A is required; field B is required");
    }
}
