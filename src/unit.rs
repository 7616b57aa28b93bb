//! One source unit, end to end: parse → extract → plan → emit.
use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::Serialize;

use crate::codegen::{Codegen, CodegenOptions};
use crate::diagnostics::Diagnostics;
use crate::plan::{self, ValidationPlan};
use crate::runtime::{Record, Validator, ValidatorLookup, Violations};
use crate::syntax::{self, SyntaxError};

/// The emitted output for one record.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub record: String,
    pub file_name: String,
    pub source: String, // Go
    pub validator: Validator,
    /// False when the record, or any record it delegates to, has diagnostics:
    /// the artifact is missing checks and must not replace what is on disk.
    pub authoritative: bool,
}

#[derive(Debug, Clone)]
pub struct CompiledUnit {
    pub source_name: String,
    pub package: String,
    /// Every analysable struct declaration, planned or not.
    pub records: Vec<String>,
    pub plans: IndexMap<String, ValidationPlan>,
    pub artifacts: Vec<Artifact>,
    pub diagnostics: Diagnostics,
    validators: IndexMap<String, Validator>,
}

/// Serializable debug view used by `govalid plan`.
#[derive(Debug, Serialize)]
pub struct PlanView<'a> {
    pub source: &'a str,
    pub package: &'a str,
    pub plans: Vec<&'a ValidationPlan>,
    pub diagnostics: &'a Diagnostics,
}

pub fn compile_source(source_name: &str, source: &str, options: &CodegenOptions) -> Result<CompiledUnit, SyntaxError> {
    let unit = syntax::parse_source(source)?;
    tracing::debug!(source = source_name, package = %unit.package, decls = unit.decls.len(), "parsed");

    let records = unit.decls.iter().filter(|d| d.record_fields().is_some()).map(|d| d.name.clone()).collect();
    let mut diagnostics = Diagnostics::new();
    let plans = plan::build_plans(&unit, &mut diagnostics);
    let diagnostics = diagnostics.finish();

    let unsettled = unsettled_records(&plans, &diagnostics);
    let mut artifacts = Vec::with_capacity(plans.len());
    let mut validators = IndexMap::new();
    for plan in plans.values() {
        let mut cg = Codegen::new(options);
        cg.emit(&unit.package, source_name, plan);
        let validator = Validator::new(plan);
        let authoritative = !unsettled.contains(&plan.record);
        if !authoritative {
            tracing::warn!(record = %plan.record, "record or a delegate has diagnostics; artifact is not authoritative");
        }
        validators.insert(plan.record.clone(), validator.clone());
        artifacts.push(Artifact {
            record: plan.record.clone(),
            file_name: options.file_name(&plan.record),
            source: cg.into_string(),
            validator,
            authoritative,
        });
    }

    Ok(CompiledUnit {
        source_name: source_name.to_string(),
        package: unit.package,
        records,
        plans,
        artifacts,
        diagnostics,
        validators,
    })
}

/// Records with diagnostics, plus every record that delegates to one of them
/// directly or transitively.
fn unsettled_records(plans: &IndexMap<String, ValidationPlan>, diagnostics: &Diagnostics) -> BTreeSet<String> {
    let mut out: BTreeSet<String> =
        plans.keys().filter(|name| diagnostics.has_record(name)).cloned().collect();
    loop {
        let before = out.len();
        for plan in plans.values() {
            let tainted = plan.checks.iter().filter_map(|c| c.delegate.as_ref()).any(|d| out.contains(d));
            if tainted {
                out.insert(plan.record.clone());
            }
        }
        if out.len() == before {
            return out;
        }
    }
}

impl CompiledUnit {
    /// No diagnostics anywhere in the unit.
    pub fn is_success(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn artifact(&self, record: &str) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.record == record)
    }

    pub fn validate(&self, record: &str, instance: &Record) -> Option<Violations> {
        self.validator(record).map(|v| v.validate(instance, self))
    }

    pub fn plan_view(&self) -> PlanView<'_> {
        PlanView {
            source: &self.source_name,
            package: &self.package,
            plans: self.plans.values().collect(),
            diagnostics: &self.diagnostics,
        }
    }
}

impl ValidatorLookup for CompiledUnit {
    fn validator(&self, record: &str) -> Option<&Validator> {
        self.validators.get(record)
    }
}
