//! Annotation-driven validation code generation for Go structs.
//!
//! Field doc comments carry `+govalid:<rule>[=<argument>]` markers; each
//! named struct with markers gets a `Validate<Type>` function in a sibling Go
//! file, plus an in-process [`runtime::Validator`] with the same semantics.
//!
//! ```text
//! syntax → markers → rules/typer → plan → codegen
//!                                      ↘ diagnostics
//! ```
pub mod cli;
pub mod codegen;
pub mod diagnostics;
pub mod kinds;
pub mod markers;
pub mod path_de;
pub mod plan;
pub mod rules;
pub mod runtime;
pub mod syntax;
pub mod typer;
pub mod unit;

pub use codegen::CodegenOptions;
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use plan::{Check, ValidationPlan};
pub use rules::Rule;
pub use runtime::{Record, Validator, Value, Violation, Violations};
pub use unit::{Artifact, CompiledUnit, compile_source};
