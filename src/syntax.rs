//! Go declaration front end.
//!
//! Only the slice of Go the rule compiler needs is modelled: the package
//! clause and `type` declarations, with struct fields, tags, doc comments and
//! type expressions. Everything else in a file (imports, funcs, vars, consts)
//! is skipped by balanced-delimiter scanning.
pub mod lexer;
pub mod parser;

use std::fmt;

use serde::Serialize;
use thiserror::Error;

// ------------------------------ Positions -------------------------------- //

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyntaxError {
    #[error("{position}: unexpected character `{text}`")]
    UnexpectedCharacter { text: String, position: Position },
    #[error("{position}: expected {expected}, found {found}")]
    Unexpected { expected: &'static str, found: String, position: Position },
    #[error("unexpected end of file while parsing {context}")]
    UnexpectedEof { context: &'static str },
    #[error("missing package clause")]
    MissingPackage,
}

// --------------------------------- AST ----------------------------------- //

/// One parsed source file.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub package: String,
    pub decls: Vec<TypeDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub text: String,        // without `//` or `/* */`
    pub position: Position,  // of the comment's first character
}

/// `type Name[params] = ty` or `type Name ty`
#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub name: String,
    pub type_params: Option<String>, // raw `[T any]`, generic decls are never analysed
    pub alias: bool,
    pub ty: TypeExpr,
    pub doc: Vec<Comment>,
    pub position: Position,
}

impl TypeDecl {
    /// A plain (non-generic, non-alias) struct declaration: the only thing that
    /// can own a validation plan.
    pub fn record_fields(&self) -> Option<&[FieldDecl]> {
        match (&self.ty, &self.type_params, self.alias) {
            (TypeExpr::Struct(fields), None, false) => Some(fields),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub names: Vec<String>,  // several for `A, B int`; one for embedded fields
    pub embedded: bool,
    pub ty: TypeExpr,
    pub tag: Option<String>, // raw, quotes included
    pub doc: Vec<Comment>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Named(String),
    Qualified { package: String, name: String },
    /// `List[int]`, `pkg.Box[T]`; the base is kept for display only
    Instantiated { base: Box<TypeExpr>, args: String },
    Pointer(Box<TypeExpr>),
    Slice(Box<TypeExpr>),
    Array { len: String, elem: Box<TypeExpr> },
    Map { key: Box<TypeExpr>, value: Box<TypeExpr> },
    Chan { dir: ChanDir, elem: Box<TypeExpr> },
    Struct(Vec<FieldDecl>),
    /// `func(...)...` and `interface{...}` are opaque; source text kept verbatim
    Func(String),
    Interface(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

// Struct identity in Go includes names, types and tags, so field comparison
// ignores docs and positions.
impl PartialEq for FieldDecl {
    fn eq(&self, other: &Self) -> bool {
        self.names == other.names
            && self.embedded == other.embedded
            && self.ty == other.ty
            && self.tag == other.tag
    }
}

/// Renders a type expression as Go source. Anonymous structs are written on
/// one line so they can appear inside composite literals.
impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Named(name) => write!(f, "{name}"),
            TypeExpr::Qualified { package, name } => write!(f, "{package}.{name}"),
            TypeExpr::Instantiated { base, args } => write!(f, "{base}{args}"),
            TypeExpr::Pointer(inner) => write!(f, "*{inner}"),
            TypeExpr::Slice(elem) => write!(f, "[]{elem}"),
            TypeExpr::Array { len, elem } => write!(f, "[{len}]{elem}"),
            TypeExpr::Map { key, value } => write!(f, "map[{key}]{value}"),
            TypeExpr::Chan { dir, elem } => match dir {
                ChanDir::Both => write!(f, "chan {elem}"),
                ChanDir::Send => write!(f, "chan<- {elem}"),
                ChanDir::Recv => write!(f, "<-chan {elem}"),
            },
            TypeExpr::Struct(fields) if fields.is_empty() => write!(f, "struct{{}}"),
            TypeExpr::Struct(fields) => {
                write!(f, "struct {{ ")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    if !field.embedded {
                        write!(f, "{} ", field.names.join(", "))?;
                    }
                    write!(f, "{}", field.ty)?;
                    if let Some(tag) = &field.tag {
                        write!(f, " {tag}")?;
                    }
                }
                write!(f, " }}")
            }
            TypeExpr::Func(raw) | TypeExpr::Interface(raw) => write!(f, "{raw}"),
        }
    }
}

/// Lex and parse one Go source file.
pub fn parse_source(source: &str) -> Result<SourceUnit, SyntaxError> {
    let tokens = lexer::lex(source)?;
    parser::Parser::new(source, tokens).source_unit()
}
