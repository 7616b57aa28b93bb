//! The rule catalog.
//!
//! Every rule the marker language knows is one `Rule` variant. Names (and
//! aliases) resolve through a static table built once; after lookup nothing
//! branches on strings again.
pub mod formats;

use std::cmp::Ordering;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Serialize, Serializer};

use crate::kinds::FieldKind;
use crate::runtime::Value;
use crate::typer::Literal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rule {
    Required,
    Eq,
    Ne,
    Gte,
    Lte,
    Gt,
    Lt,
    Length,
    MinLength,
    MaxLength,
    Email,
    Uuid,
    Ipv4,
    Ipv6,
    Enum,
}

/// What a rule expects after `=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgSpec {
    None,
    FieldTyped, // same kind as the field
    Count,      // non-negative integer
    List,       // whitespace-separated, each item field-typed
}

static CATALOG: Lazy<IndexMap<&'static str, Rule>> = Lazy::new(|| {
    let mut table = IndexMap::new();
    for rule in Rule::ALL {
        table.insert(rule.name(), rule);
        for alias in rule.aliases() {
            table.insert(*alias, rule);
        }
    }
    table
});

/// Name (or alias) → rule.
pub fn lookup(name: &str) -> Option<Rule> {
    CATALOG.get(name).copied()
}

/// Every accepted spelling, in catalog order.
pub fn names() -> impl Iterator<Item = &'static str> {
    CATALOG.keys().copied()
}

impl Rule {
    pub const ALL: [Rule; 15] = [
        Rule::Required,
        Rule::Eq,
        Rule::Ne,
        Rule::Gte,
        Rule::Lte,
        Rule::Gt,
        Rule::Lt,
        Rule::Length,
        Rule::MinLength,
        Rule::MaxLength,
        Rule::Email,
        Rule::Uuid,
        Rule::Ipv4,
        Rule::Ipv6,
        Rule::Enum,
    ];

    /// Canonical name; violations and plans always use this spelling.
    pub fn name(self) -> &'static str {
        match self {
            Rule::Required => "required",
            Rule::Eq => "eq",
            Rule::Ne => "ne",
            Rule::Gte => "gte",
            Rule::Lte => "lte",
            Rule::Gt => "gt",
            Rule::Lt => "lt",
            Rule::Length => "length",
            Rule::MinLength => "minlength",
            Rule::MaxLength => "maxlength",
            Rule::Email => "email",
            Rule::Uuid => "uuid",
            Rule::Ipv4 => "ipv4",
            Rule::Ipv6 => "ipv6",
            Rule::Enum => "enum",
        }
    }

    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Rule::Gte => &["min"],
            Rule::Lte => &["max"],
            _ => &[],
        }
    }

    pub fn argument(self) -> ArgSpec {
        match self {
            Rule::Required | Rule::Email | Rule::Uuid | Rule::Ipv4 | Rule::Ipv6 => ArgSpec::None,
            Rule::Eq | Rule::Ne | Rule::Gte | Rule::Lte | Rule::Gt | Rule::Lt => ArgSpec::FieldTyped,
            Rule::Length | Rule::MinLength | Rule::MaxLength => ArgSpec::Count,
            Rule::Enum => ArgSpec::List,
        }
    }

    /// Kind compatibility. `required` on a record is accepted here; whether it
    /// can actually be checked (own plan, or a comparable zero value) is decided
    /// once every plan of the unit is known.
    pub fn accepts(self, kind: &FieldKind) -> bool {
        match self {
            Rule::Required => matches!(
                kind,
                FieldKind::Integer { .. }
                    | FieldKind::Float { .. }
                    | FieldKind::Text
                    | FieldKind::Bool
                    | FieldKind::Pointer { .. }
                    | FieldKind::Record { .. }
            ),
            Rule::Eq | Rule::Ne | Rule::Enum => kind.is_numeric() || matches!(kind, FieldKind::Text),
            Rule::Gte | Rule::Lte | Rule::Gt | Rule::Lt => kind.is_numeric(),
            Rule::Length
            | Rule::MinLength
            | Rule::MaxLength
            | Rule::Email
            | Rule::Uuid
            | Rule::Ipv4
            | Rule::Ipv6 => matches!(kind, FieldKind::Text),
        }
    }

    /// Human-readable constraint, completing "field X ...".
    pub fn describe(self, argument: Option<&Literal>) -> String {
        let arg = argument.map(ToString::to_string).unwrap_or_default();
        match self {
            Rule::Required => "is required".to_string(),
            Rule::Eq => format!("must equal {arg}"),
            Rule::Ne => format!("must not equal {arg}"),
            Rule::Gte => format!("must be >= {arg}"),
            Rule::Lte => format!("must be <= {arg}"),
            Rule::Gt => format!("must be > {arg}"),
            Rule::Lt => format!("must be < {arg}"),
            Rule::Length => format!("must be exactly {arg} characters long"),
            Rule::MinLength => format!("must be at least {arg} characters long"),
            Rule::MaxLength => format!("must be at most {arg} characters long"),
            Rule::Email => "must be a valid email address".to_string(),
            Rule::Uuid => "must be a valid UUID".to_string(),
            Rule::Ipv4 => "must be a valid IPv4 address".to_string(),
            Rule::Ipv6 => "must be a valid IPv6 address".to_string(),
            Rule::Enum => format!("must be one of [{arg}]"),
        }
    }

    /// Whether a scalar `value` (already known to match the field's kind)
    /// breaks this rule. Conditions mirror the emitted Go comparisons exactly,
    /// NaN behaviour included.
    pub fn violated(self, value: &Value, argument: Option<&Literal>) -> bool {
        use Ordering::{Equal, Greater, Less};
        let cmp = || argument.and_then(|arg| compare(value, arg));
        let chars = || value.as_text().map(|s| s.chars().count());
        let count = || match argument {
            Some(Literal::Count(n)) => Some(*n),
            _ => None,
        };
        match self {
            Rule::Required => value.is_zero(),
            Rule::Eq => cmp() != Some(Equal),
            Rule::Ne => cmp() == Some(Equal),
            Rule::Gte => cmp() == Some(Less),
            Rule::Lte => cmp() == Some(Greater),
            Rule::Gt => matches!(cmp(), Some(Less | Equal)),
            Rule::Lt => matches!(cmp(), Some(Greater | Equal)),
            Rule::Length => chars() != count(),
            Rule::MinLength => matches!((chars(), count()), (Some(c), Some(n)) if c < n),
            Rule::MaxLength => matches!((chars(), count()), (Some(c), Some(n)) if c > n),
            Rule::Email => !value.as_text().is_some_and(formats::is_email),
            Rule::Uuid => !value.as_text().is_some_and(formats::is_uuid),
            Rule::Ipv4 => !value.as_text().is_some_and(formats::is_ipv4),
            Rule::Ipv6 => !value.as_text().is_some_and(formats::is_ipv6),
            Rule::Enum => match argument {
                Some(Literal::List(items)) => !items.iter().any(|item| compare(value, item) == Some(Equal)),
                _ => true,
            },
        }
    }
}

fn compare(value: &Value, literal: &Literal) -> Option<Ordering> {
    match (value, literal) {
        (Value::Int(v), Literal::Int(l)) => Some(v.cmp(l)),
        (Value::Int(v), Literal::Float(l)) => (*v as f64).partial_cmp(&l.0),
        (Value::Float(v), Literal::Float(l)) => v.partial_cmp(&l.0),
        (Value::Float(v), Literal::Int(l)) => v.partial_cmp(&(*l as f64)),
        (Value::Text(v), Literal::Text(l)) => Some(v.as_str().cmp(l.as_str())),
        _ => None,
    }
}

impl Serialize for Rule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}
