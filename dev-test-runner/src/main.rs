//! Runs every fixture under `fixtures/`: `input.go` is compiled and checked
//! against the expectations in `cases.json`.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, bail, ensure};
use colored::Colorize;
use govalid::path_de::from_str_with_path;
use govalid::{CodegenOptions, CompiledUnit, Value, compile_source};
use regex::Regex;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FixtureSpec {
    /// records that get a plan, in declaration order
    #[serde(default)]
    records: Vec<String>,
    #[serde(default)]
    diagnostics: Vec<ExpectedDiagnostic>,
    /// record → regexes the generated Go must match
    #[serde(default)]
    patterns: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    instances: Vec<InstanceCase>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExpectedDiagnostic {
    kind: String, // kebab-case, as rendered
    path: String,
    #[serde(default)]
    rule: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct InstanceCase {
    name: String,
    record: String,
    value: serde_json::Value,
    /// `[path, rule]` pairs in report order
    #[serde(default)]
    violations: Vec<(String, String)>,
}

fn run_fixture(dir: &Path) -> anyhow::Result<()> {
    let source = std::fs::read_to_string(dir.join("input.go")).context("failed to read input.go")?;
    let spec_src = std::fs::read_to_string(dir.join("cases.json")).context("failed to read cases.json")?;
    let spec: FixtureSpec = from_str_with_path(&spec_src).context("invalid cases.json")?;

    let options = CodegenOptions::default();
    let unit = compile_source("input.go", &source, &options)?;

    // 1) plans
    let records: Vec<_> = unit.plans.keys().cloned().collect();
    ensure!(records == spec.records, "plans: expected {:?}, got {records:?}", spec.records);

    // 2) diagnostics, in source order
    let got: Vec<_> = unit.diagnostics.iter().collect();
    ensure!(
        got.len() == spec.diagnostics.len(),
        "diagnostics: expected {}, got {}:\n{}",
        spec.diagnostics.len(),
        got.len(),
        unit.diagnostics.render("input.go"),
    );
    for (expected, diagnostic) in spec.diagnostics.iter().zip(got) {
        let matches = diagnostic.kind.to_string() == expected.kind
            && diagnostic.path == expected.path
            && (expected.rule.is_none() || diagnostic.rule == expected.rule);
        ensure!(matches, "diagnostic mismatch: expected {expected:?}, got `{diagnostic}`");
    }

    // 3) generated text
    for (record, patterns) in &spec.patterns {
        let artifact = unit.artifact(record).with_context(|| format!("no artifact for {record}"))?;
        for pattern in patterns {
            let re = Regex::new(pattern).with_context(|| format!("bad pattern {pattern}"))?;
            ensure!(re.is_match(&artifact.source), "{record}: generated Go does not match /{pattern}/\n{}", artifact.source);
        }
    }
    check_idempotent(&unit, &source, &options)?;

    // 4) runtime semantics
    for case in &spec.instances {
        let Value::Record(instance) = Value::from_json(&case.value)? else {
            bail!("{}: instance must be a JSON object", case.name);
        };
        let violations = unit
            .validate(&case.record, &instance)
            .with_context(|| format!("{}: no validator for {}", case.name, case.record))?;
        let got: Vec<(String, String)> =
            violations.keys().into_iter().map(|(path, rule)| (path, rule.to_string())).collect();
        ensure!(got == case.violations, "{}: expected {:?}, got {got:?}", case.name, case.violations);
    }
    Ok(())
}

fn check_idempotent(unit: &CompiledUnit, source: &str, options: &CodegenOptions) -> anyhow::Result<()> {
    let again = compile_source("input.go", source, options)?;
    for (a, b) in unit.artifacts.iter().zip(&again.artifacts) {
        ensure!(a.source == b.source, "{}: emission is not deterministic", a.record);
    }
    Ok(())
}

fn fixture_dirs(root: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(root).with_context(|| format!("failed to list {}", root.display()))? {
        let path = entry?.path();
        if path.join("input.go").is_file() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn main() -> ExitCode {
    let root = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures"));
    let dirs = match fixture_dirs(&root) {
        Ok(dirs) => dirs,
        Err(error) => {
            eprintln!("{error:#}");
            return ExitCode::FAILURE;
        }
    };

    let mut failures = 0;
    for dir in &dirs {
        let name = dir.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        match run_fixture(dir) {
            Ok(()) => eprintln!("{} {name}", "✅".green()),
            Err(error) => {
                failures += 1;
                eprintln!("{} {name}: {error:#}", "❌".red());
            }
        }
    }
    eprintln!("{} fixtures, {failures} failed", dirs.len());
    if failures == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
