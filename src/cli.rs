//! CLI: Go sources → (generated validators | check | plan view)
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rayon::prelude::*;
use serde::Serialize;

use crate::codegen::{CodegenOptions, DEFAULT_SUFFIX, GENERATED_HEADER};
use crate::diagnostics::Diagnostics;
use crate::syntax::SyntaxError;
use crate::unit::{CompiledUnit, compile_source};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// generate struct validators from `+govalid:` markers in Go doc comments
#[derive(Parser, Debug)]
#[command(name = "govalid", version)]
pub struct CommandLineInterface {
    /// log debug events to stderr (RUST_LOG overrides)
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// compile and write `<type>_validator.go` files
    Generate(GenerateOut),
    /// compile without writing; fail on diagnostics or stale generated files
    Check(GenerateOut),
    /// print the validation plans as JSON (debug view)
    Plan(PlanOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// One or more inputs. May be literal paths or quoted glob patterns
    /// (`_test.go` and generated files are skipped by globs)
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(Args, Debug, Clone)]
struct EmitSettings {
    /// generated file name suffix
    #[arg(long, default_value = DEFAULT_SUFFIX)]
    suffix: String,

    /// do not emit the `func (t *T) Validate() error` method
    #[arg(long, default_value_t = false)]
    no_method: bool,

    /// diagnostics output format
    #[arg(long, value_enum, default_value_t = Format::Human)]
    format: Format,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Human,
    Json,
}

#[derive(clap::Parser, Debug)]
struct GenerateOut {
    #[command(flatten)]
    input_settings: InputSettings,

    #[command(flatten)]
    emit_settings: EmitSettings,

    /// directory for generated files (next to each input if omitted)
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct PlanOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

/// One input file and what became of it.
struct LoadedUnit {
    path: PathBuf,
    outcome: Result<CompiledUnit, SyntaxError>,
}

#[derive(Serialize)]
struct UnitReport<'a> {
    source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    syntax_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    diagnostics: Option<&'a Diagnostics>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stale: Vec<String>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl EmitSettings {
    fn codegen_options(&self) -> CodegenOptions {
        CodegenOptions { suffix: self.suffix.clone(), emit_method: !self.no_method }
    }
}

impl InputSettings {
    /// Units compile independently; results keep input order.
    fn compile(&self, options: &CodegenOptions) -> anyhow::Result<Vec<LoadedUnit>> {
        let source_paths =
            resolve_file_path_patterns(&self.input).context("failed to resolve input file paths")?;
        tracing::debug!(files = source_paths.len(), "compiling");
        source_paths
            .par_iter()
            .map(|source_path| {
                let source = std::fs::read_to_string(source_path)
                    .with_context(|| format!("failed to read source file {}", source_path.display()))?;
                let source_name = source_path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| source_path.to_string_lossy().to_string());
                Ok(LoadedUnit { path: source_path.clone(), outcome: compile_source(&source_name, &source, options) })
            })
            .collect()
    }
}

impl LoadedUnit {
    fn failed(&self) -> bool {
        !matches!(&self.outcome, Ok(unit) if unit.is_success())
    }

    fn target_dir(&self, out_dir: Option<&Path>) -> PathBuf {
        match out_dir {
            Some(dir) => dir.to_path_buf(),
            None => self.path.parent().map(Path::to_path_buf).unwrap_or_default(),
        }
    }

    fn report(&self, stale: Vec<String>) -> UnitReport<'_> {
        let (syntax_error, diagnostics) = match &self.outcome {
            Ok(unit) => (None, Some(&unit.diagnostics)),
            Err(error) => (Some(error.to_string()), None),
        };
        UnitReport { source: self.path.display().to_string(), syntax_error, diagnostics, stale }
    }

    fn render_human(&self, stale: &[String]) -> String {
        let source = self.path.display().to_string();
        let mut out = match &self.outcome {
            Ok(unit) => unit.diagnostics.render(&source),
            Err(error) => format!("{source}: error[syntax] {error}\n"),
        };
        for file in stale {
            out.push_str(&format!("{file}: stale (run `govalid generate`)\n"));
        }
        out
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn run(&self) -> anyhow::Result<ExitCode> {
        match &self.cmd {
            Command::Generate(target) => target.run(false),
            Command::Check(target) => target.run(true),
            Command::Plan(target) => target.run(),
        }
    }
}

impl GenerateOut {
    fn run(&self, check_only: bool) -> anyhow::Result<ExitCode> {
        let options = self.emit_settings.codegen_options();
        let units = self.input_settings.compile(&options)?;
        let out_dir = self.out_dir.as_deref();

        let mut failed = false;
        let mut reports = Vec::with_capacity(units.len());
        let mut human = String::new();
        for loaded in &units {
            failed |= loaded.failed();
            let mut stale = Vec::new();
            if let Ok(unit) = &loaded.outcome {
                let dir = loaded.target_dir(out_dir);
                for artifact in &unit.artifacts {
                    if !artifact.authoritative {
                        tracing::warn!(record = %artifact.record, "not writing {}", artifact.file_name);
                        continue;
                    }
                    let path = dir.join(&artifact.file_name);
                    if check_only {
                        let on_disk = std::fs::read_to_string(&path).ok();
                        if on_disk.as_deref() != Some(artifact.source.as_str()) {
                            stale.push(path.display().to_string());
                        }
                        continue;
                    }
                    std::fs::create_dir_all(&dir)
                        .with_context(|| format!("failed to create output directory {}", dir.display()))?;
                    std::fs::write(&path, &artifact.source)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    tracing::info!(record = %artifact.record, path = %path.display(), "wrote validator");
                }
                for path in orphaned_files(unit, &dir, &options) {
                    if check_only {
                        stale.push(path.display().to_string());
                        continue;
                    }
                    std::fs::remove_file(&path).with_context(|| format!("failed to remove {}", path.display()))?;
                    tracing::info!(path = %path.display(), "removed validator of unannotated record");
                }
            }
            failed |= !stale.is_empty();
            match self.emit_settings.format {
                Format::Human => human.push_str(&loaded.render_human(&stale)),
                Format::Json => reports.push(loaded.report(stale)),
            }
        }

        match self.emit_settings.format {
            Format::Human => eprint!("{human}"),
            Format::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        }
        Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
    }
}

impl PlanOut {
    fn run(&self) -> anyhow::Result<ExitCode> {
        let units = self.input_settings.compile(&CodegenOptions::default())?;
        let mut failed = false;
        let mut views = Vec::with_capacity(units.len());
        for loaded in &units {
            failed |= loaded.failed();
            match &loaded.outcome {
                Ok(unit) => views.push(unit.plan_view()),
                Err(error) => eprintln!("{}: error[syntax] {error}", loaded.path.display()),
            }
        }
        let plan_src = serde_json::to_string_pretty(&views)?;
        if let Some(out) = self.out.as_ref() {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create output directory {}", parent.display()))?;
            }
            std::fs::write(out, &plan_src).with_context(|| format!("failed to write {}", out.display()))?;
        } else {
            println!("{plan_src}");
        }
        Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// Generated files left behind by records of `unit` that no longer carry any
/// markers. Records with diagnostics keep their files.
fn orphaned_files(unit: &CompiledUnit, dir: &Path, options: &CodegenOptions) -> Vec<PathBuf> {
    unit.records
        .iter()
        .filter(|record| !unit.plans.contains_key(*record) && !unit.diagnostics.has_record(record))
        .map(|record| dir.join(options.file_name(record)))
        .filter(|path| {
            std::fs::read_to_string(path).is_ok_and(|text| is_generated_from(&text, &unit.source_name))
        })
        .collect()
}

/// Whether `text` is a file we emitted for `source_name`.
fn is_generated_from(text: &str, source_name: &str) -> bool {
    let mut lines = text.lines();
    lines.next() == Some(GENERATED_HEADER) && lines.next() == Some(format!("// source: {source_name}").as_str())
}

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            // Treat as a glob pattern
            let mut matched_any = false;
            for entry in glob::glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))? {
                let path = entry?;
                matched_any = true;
                if is_skipped(&path) {
                    tracing::debug!(path = %path.display(), "skipped");
                    continue;
                }
                out.push(path);
            }
            if !matched_any {
                // Pattern was explicitly a glob but matched nothing -> surface as an error
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            // Treat as a literal path
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

/// Test files and files we generated ourselves.
fn is_skipped(path: &Path) -> bool {
    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    if name.ends_with("_test.go") || path.is_dir() {
        return true;
    }
    let Ok(file) = std::fs::File::open(path) else {
        return false;
    };
    let mut first = String::new();
    match std::io::BufReader::new(file).read_line(&mut first) {
        Ok(_) => first.trim_end() == GENERATED_HEADER,
        Err(_) => false,
    }
}
