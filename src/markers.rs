//! Marker extraction.
//!
//! Walks one record declaration depth-first, fields in declaration order, and
//! reads `+govalid:<rule>[=<argument>]` lines from each field's doc comment.
//! Anonymous struct fields are expanded inline right after their owning field,
//! so their markers land in the enclosing record's list with a dotted path.
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};

use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::syntax::{Comment, FieldDecl, Position, TypeDecl, TypeExpr};

pub const MARKER_PREFIX: &str = "+govalid:";

static MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\+govalid:(?P<rule>[A-Za-z_][A-Za-z0-9_]*)?(?P<rest>.*)$").expect("marker pattern")
});

// -------------------------------- Types ---------------------------------- //

/// Dotted sequence of field names from the owning named record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.to_string());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn parse(dotted: &str) -> Self {
        Self(dotted.split('.').filter(|s| !s.is_empty()).map(str::to_string).collect())
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub rule: String,
    pub argument: Option<String>, // verbatim text after `=`, trailing whitespace stripped
    pub position: Position,
}

#[derive(Debug, Clone)]
pub struct ExtractedMarker<'u> {
    pub path: FieldPath,
    pub guards: Vec<FieldPath>, // pointer fields on the way down; each must be non-nil
    pub ty: &'u TypeExpr,
    pub marker: Marker,
}

// ------------------------------ Extraction -------------------------------- //

/// Markers of one named record, anonymous nesting flattened.
pub fn extract_record<'u>(record: &'u TypeDecl, diagnostics: &mut Diagnostics) -> Vec<ExtractedMarker<'u>> {
    let mut out = Vec::new();
    if let Some(fields) = record.record_fields() {
        walk(&record.name, fields, &FieldPath::root(), &[], &mut out, diagnostics);
    }
    out
}

fn walk<'u>(
    record: &str,
    fields: &'u [FieldDecl],
    prefix: &FieldPath,
    guards: &[FieldPath],
    out: &mut Vec<ExtractedMarker<'u>>,
    diagnostics: &mut Diagnostics,
) {
    for field in fields {
        for name in &field.names {
            let path = prefix.child(name);
            for parsed in markers_in(&field.doc) {
                match parsed {
                    Ok(marker) => out.push(ExtractedMarker {
                        path: path.clone(),
                        guards: guards.to_vec(),
                        ty: &field.ty,
                        marker,
                    }),
                    Err(malformed) => diagnostics.push(Diagnostic {
                        kind: DiagnosticKind::MalformedMarker,
                        record: record.to_string(),
                        path: path.to_string(),
                        rule: None,
                        message: malformed.message,
                        position: malformed.position,
                    }),
                }
            }

            match &field.ty {
                TypeExpr::Struct(inner) => walk(record, inner, &path, guards, out, diagnostics),
                TypeExpr::Pointer(pointee) => {
                    if let TypeExpr::Struct(inner) = pointee.as_ref() {
                        let mut guards = guards.to_vec();
                        guards.push(path.clone());
                        walk(record, inner, &path, &guards, out, diagnostics);
                    }
                }
                _ => {}
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Malformed {
    pub message: String,
    pub position: Position,
}

/// Every marker line in a doc comment group, in order.
pub fn markers_in(doc: &[Comment]) -> Vec<Result<Marker, Malformed>> {
    let mut out = Vec::new();
    for comment in doc {
        for (i, line) in comment.text.split('\n').enumerate() {
            // block comments often carry a ` * ` gutter
            let body = line.trim_start();
            let body = if i > 0 { body.trim_start_matches('*').trim_start() } else { body };
            if !body.starts_with(MARKER_PREFIX) {
                continue;
            }
            let indent = line.chars().count() - body.chars().count();
            let position = if i == 0 {
                Position { line: comment.position.line, column: comment.position.column + 2 + indent as u32 }
            } else {
                Position { line: comment.position.line + i as u32, column: indent as u32 + 1 }
            };
            out.push(parse_marker(body, position));
        }
    }
    out
}

pub fn parse_marker(text: &str, position: Position) -> Result<Marker, Malformed> {
    let malformed = |message: String| Malformed { message, position };
    let Some(caps) = MARKER.captures(text) else {
        return Err(malformed(format!("`{text}` is not a marker")));
    };
    let rest = caps.name("rest").map_or("", |m| m.as_str());
    let Some(rule) = caps.name("rule") else {
        return Err(malformed(format!("marker `{}` has no rule name", text.trim_end())));
    };
    let argument = match rest.strip_prefix('=') {
        Some(argument) => Some(argument.trim_end().to_string()),
        None if rest.trim().is_empty() => None,
        None => {
            return Err(malformed(format!(
                "unexpected `{}` after rule `{}`; arguments are written `{}{}=<value>`",
                rest.trim(),
                rule.as_str(),
                MARKER_PREFIX,
                rule.as_str(),
            )));
        }
    };
    Ok(Marker { rule: rule.as_str().to_string(), argument, position })
}
