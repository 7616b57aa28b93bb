//! Validation plans.
//!
//! Design goals:
//! - One plan per named record with at least one valid check anywhere in its
//!   tree (anonymous nesting included). No markers at all → no plan, silently.
//! - Every marker either becomes exactly one `Check` or exactly one
//!   diagnostic; siblings are never affected.
//! - `(path, rule)` is unique within a plan.
//!
//! Plans are built per record independently, then resolved together: a
//! `required` check on a named record delegates to that record's own plan,
//! or falls back to a zero-value comparison when the record type allows one.
use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::Serialize;

use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::kinds::{FieldKind, TypeEnv};
use crate::markers::{self, ExtractedMarker, FieldPath};
use crate::rules::{self, Rule};
use crate::syntax::{Position, SourceUnit, TypeDecl};
use crate::typer::{self, Literal};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Check {
    pub path: FieldPath,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub guards: Vec<FieldPath>, // pointers that must be non-nil for the check to run
    pub rule: Rule,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub argument: Option<Literal>,
    pub kind: FieldKind,
    pub go_type: String,
    pub position: Position,
    /// Record whose own validator a `required` check hands off to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegate: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationPlan {
    pub record: String,
    pub position: Position,
    pub checks: Vec<Check>,
}

impl ValidationPlan {
    pub fn uses(&self, rule: Rule) -> bool {
        self.checks.iter().any(|c| c.rule == rule && c.delegate.is_none())
    }

    pub fn delegates(&self) -> bool {
        self.checks.iter().any(|c| c.delegate.is_some())
    }
}

// ------------------------------- Building --------------------------------- //

/// Plans for every analysable record of `unit`, in declaration order.
pub fn build_plans(unit: &SourceUnit, diagnostics: &mut Diagnostics) -> IndexMap<String, ValidationPlan> {
    let env = TypeEnv::new(unit);
    let mut plans = IndexMap::new();
    for decl in &unit.decls {
        if decl.record_fields().is_none() {
            if decl.type_params.is_some() {
                tracing::debug!(record = %decl.name, "generic record skipped");
            }
            continue;
        }
        if let Some(plan) = build_record(&env, decl, diagnostics) {
            plans.insert(decl.name.clone(), plan);
        }
    }
    resolve_records(&mut plans, diagnostics);
    plans
}

fn build_record(env: &TypeEnv<'_>, decl: &TypeDecl, diagnostics: &mut Diagnostics) -> Option<ValidationPlan> {
    let extracted = markers::extract_record(decl, diagnostics);
    if extracted.is_empty() {
        tracing::debug!(record = %decl.name, "no markers");
        return None;
    }

    let mut seen = BTreeSet::<(FieldPath, Rule)>::new();
    let mut checks = Vec::new();
    for found in extracted {
        let report = |kind: DiagnosticKind, message: String| Diagnostic {
            kind,
            record: decl.name.clone(),
            path: found.path.to_string(),
            rule: Some(found.marker.rule.clone()),
            message,
            position: found.marker.position,
        };
        match resolve_marker(env, &found) {
            Ok(check) => {
                if seen.insert((check.path.clone(), check.rule)) {
                    checks.push(check);
                } else {
                    diagnostics.push(report(
                        DiagnosticKind::DuplicateRule,
                        format!("rule `{}` is already applied to this field", check.rule.name()),
                    ));
                }
            }
            Err((kind, message)) => diagnostics.push(report(kind, message)),
        }
    }

    if checks.is_empty() {
        tracing::debug!(record = %decl.name, "every marker was rejected");
        return None;
    }
    tracing::debug!(record = %decl.name, checks = checks.len(), "plan built");
    Some(ValidationPlan { record: decl.name.clone(), position: decl.position, checks })
}

fn resolve_marker(env: &TypeEnv<'_>, found: &ExtractedMarker<'_>) -> Result<Check, (DiagnosticKind, String)> {
    let name = found.marker.rule.as_str();
    let Some(rule) = rules::lookup(name) else {
        return Err((DiagnosticKind::UnknownRule, format!("unknown rule `{name}`")));
    };
    let kind = env.kind_of(found.ty);
    let incompatible = || {
        (
            DiagnosticKind::IncompatibleRule,
            format!("rule `{name}` cannot be applied to a {} field (`{}`)", kind.describe(), found.ty),
        )
    };
    if !rule.accepts(&kind) {
        return Err(incompatible());
    }
    // an anonymous record has no plan to delegate to
    if let (Rule::Required, FieldKind::Record { name: None, comparable: false }) = (rule, &kind) {
        return Err(incompatible());
    }
    let argument = typer::type_argument(rule, found.marker.argument.as_deref(), &kind)
        .map_err(|e| (DiagnosticKind::InvalidArgument, format!("invalid argument for `{name}`: {e}")))?;
    Ok(Check {
        path: found.path.clone(),
        guards: found.guards.clone(),
        rule,
        argument,
        go_type: found.ty.to_string(),
        kind,
        position: found.marker.position,
        delegate: None,
    })
}

// ------------------------------ Resolution -------------------------------- //

/// Settles `required` checks on named records. Dropping an unsatisfiable
/// check can empty a plan, which can in turn unsettle its dependents, so this
/// runs to a fixpoint. Checks only ever disappear, so it terminates.
fn resolve_records(plans: &mut IndexMap<String, ValidationPlan>, diagnostics: &mut Diagnostics) {
    loop {
        let planned: BTreeSet<String> = plans.keys().cloned().collect();
        let mut dropped = false;
        for plan in plans.values_mut() {
            let record = plan.record.clone();
            plan.checks.retain_mut(|check| {
                let FieldKind::Record { name: Some(target), comparable } = &check.kind else {
                    return true;
                };
                if check.rule != Rule::Required {
                    return true;
                }
                if planned.contains(target) {
                    check.delegate = Some(target.clone());
                    return true;
                }
                check.delegate = None;
                if *comparable {
                    return true;
                }
                diagnostics.push(Diagnostic {
                    kind: DiagnosticKind::IncompatibleRule,
                    record: record.clone(),
                    path: check.path.to_string(),
                    rule: Some(check.rule.name().to_string()),
                    message: format!(
                        "rule `required` cannot be applied to `{}`: it has no validation plan and its zero value is not comparable",
                        check.go_type,
                    ),
                    position: check.position,
                });
                dropped = true;
                false
            });
        }
        plans.retain(|name, plan| {
            let keep = !plan.checks.is_empty();
            if !keep {
                tracing::debug!(record = %name, "plan emptied during resolution");
            }
            keep
        });
        if !dropped {
            break;
        }
    }
}
