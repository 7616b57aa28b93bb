//! Compile-time diagnostics and their per-unit reporter.
//!
//! A diagnostic never stops analysis: it withholds exactly one check, and the
//! unit as a whole is failed if any were reported.
use std::fmt;

use colored::Colorize;
use serde::Serialize;
use thiserror::Error;

use crate::syntax::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DiagnosticKind {
    MalformedMarker,
    UnknownRule,
    IncompatibleRule,
    InvalidArgument,
    DuplicateRule,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiagnosticKind::MalformedMarker => "malformed-marker",
            DiagnosticKind::UnknownRule => "unknown-rule",
            DiagnosticKind::IncompatibleRule => "incompatible-rule",
            DiagnosticKind::InvalidArgument => "invalid-argument",
            DiagnosticKind::DuplicateRule => "duplicate-rule",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("{position}: {record}.{path}: {message} [{kind}]")]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub record: String,        // owning named record
    pub path: String,          // dotted field path
    pub rule: Option<String>,  // as written, when one could be read
    pub message: String,
    pub position: Position,
}

/// Append-only, per-unit collection.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        tracing::debug!(%diagnostic, "diagnostic");
        self.items.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn for_record<'a>(&'a self, record: &'a str) -> impl Iterator<Item = &'a Diagnostic> + 'a {
        self.items.iter().filter(move |d| d.record == record)
    }

    pub fn has_record(&self, record: &str) -> bool {
        self.for_record(record).next().is_some()
    }

    /// Source order. The sort is stable, so diagnostics at one position keep
    /// the order they were reported in.
    pub fn finish(mut self) -> Self {
        self.items.sort_by_key(|d| d.position);
        self
    }

    /// Terminal rendering, one line per diagnostic, prefixed with the unit name.
    pub fn render(&self, unit: &str) -> String {
        let mut out = String::new();
        for d in &self.items {
            out.push_str(&format!(
                "{}:{} {} {}.{}: {}\n",
                unit.bold(),
                d.position,
                format!("error[{}]", d.kind).red().bold(),
                d.record,
                d.path.cyan(),
                d.message,
            ));
        }
        out
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;
    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diag(line: u32, path: &str) -> Diagnostic {
        Diagnostic {
            kind: DiagnosticKind::UnknownRule,
            record: "User".into(),
            path: path.into(),
            rule: Some("nope".into()),
            message: "unknown rule `nope`".into(),
            position: Position { line, column: 5 },
        }
    }

    #[test]
    fn finish_sorts_by_position_stably() {
        let mut ds = Diagnostics::new();
        ds.push(diag(9, "B"));
        ds.push(diag(3, "A"));
        ds.push(diag(9, "C"));
        let paths: Vec<_> = ds.finish().iter().map(|d| d.path.clone()).collect();
        assert_eq!(paths, ["A", "B", "C"]);
    }

    #[test]
    fn display_carries_path_and_kind() {
        let d = diag(3, "Profile.Age");
        assert_eq!(d.to_string(), "3:5: User.Profile.Age: unknown rule `nope` [unknown-rule]");
    }

    #[test]
    fn render_includes_unit_name() {
        colored::control::set_override(false);
        let mut ds = Diagnostics::new();
        ds.push(diag(3, "A"));
        assert_eq!(ds.render("user.go"), "user.go:3:5 error[unknown-rule] User.A: unknown rule `nope`\n");
    }
}
