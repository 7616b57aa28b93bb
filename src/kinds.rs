//! Field kinds: what a marker is typed against.
//!
//! Go types are resolved through the unit's own declarations (defined types
//! and aliases) down to an underlying kind. Anything declared elsewhere is
//! `Opaque`; the compiler never guesses at foreign packages.
use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::Serialize;

use crate::syntax::{SourceUnit, TypeDecl, TypeExpr};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    Integer { min: i64, max: i64 },
    Float { bits: u8 },
    Text,
    Bool,
    /// `name` is `None` for anonymous structs
    Record { name: Option<String>, comparable: bool },
    Pointer { to: Box<FieldKind> },
    Collection,
    Opaque,
}

impl FieldKind {
    pub fn describe(&self) -> &'static str {
        match self {
            FieldKind::Integer { .. } => "integer",
            FieldKind::Float { .. } => "floating-point",
            FieldKind::Text => "string",
            FieldKind::Bool => "bool",
            FieldKind::Record { name: Some(_), .. } => "struct",
            FieldKind::Record { name: None, .. } => "anonymous struct",
            FieldKind::Pointer { .. } => "pointer",
            FieldKind::Collection => "collection",
            FieldKind::Opaque => "opaque type",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldKind::Integer { .. } | FieldKind::Float { .. })
    }
}

const UNSIGNED_MAX: i64 = i64::MAX; // uint64 values above this cannot be expressed

fn predeclared(name: &str) -> Option<FieldKind> {
    let int = |min: i64, max: i64| Some(FieldKind::Integer { min, max });
    match name {
        "int" | "int64" => int(i64::MIN, i64::MAX),
        "int32" | "rune" => int(i32::MIN as i64, i32::MAX as i64),
        "int16" => int(i16::MIN as i64, i16::MAX as i64),
        "int8" => int(i8::MIN as i64, i8::MAX as i64),
        "uint" | "uint64" | "uintptr" => int(0, UNSIGNED_MAX),
        "uint32" => int(0, u32::MAX as i64),
        "uint16" => int(0, u16::MAX as i64),
        "uint8" | "byte" => int(0, u8::MAX as i64),
        "float32" => Some(FieldKind::Float { bits: 32 }),
        "float64" => Some(FieldKind::Float { bits: 64 }),
        "string" => Some(FieldKind::Text),
        "bool" => Some(FieldKind::Bool),
        _ => None,
    }
}

// ----------------------------- Environment ------------------------------- //

/// The type declarations of one source unit, by name.
pub struct TypeEnv<'u> {
    decls: IndexMap<&'u str, &'u TypeDecl>,
}

impl<'u> TypeEnv<'u> {
    pub fn new(unit: &'u SourceUnit) -> Self {
        let decls = unit.decls.iter().map(|d| (d.name.as_str(), d)).collect();
        Self { decls }
    }

    pub fn decl(&self, name: &str) -> Option<&'u TypeDecl> {
        self.decls.get(name).copied()
    }

    pub fn kind_of(&self, ty: &TypeExpr) -> FieldKind {
        self.kind_guarded(ty, &mut BTreeSet::new())
    }

    fn kind_guarded(&self, ty: &TypeExpr, visiting: &mut BTreeSet<String>) -> FieldKind {
        match ty {
            TypeExpr::Named(name) => {
                // local declarations shadow predeclared identifiers
                let Some(decl) = self.decl(name) else {
                    return predeclared(name).unwrap_or(FieldKind::Opaque);
                };
                if decl.type_params.is_some() || !visiting.insert(name.clone()) {
                    return FieldKind::Opaque;
                }
                let kind = match (&decl.ty, self.kind_guarded(&decl.ty, visiting)) {
                    // a defined type over a struct is its own record type; an alias is not
                    (TypeExpr::Struct(_), FieldKind::Record { comparable, .. }) => {
                        FieldKind::Record { name: Some(name.clone()), comparable }
                    }
                    (_, FieldKind::Record { name: Some(_), comparable }) if !decl.alias => {
                        FieldKind::Record { name: Some(name.clone()), comparable }
                    }
                    (_, kind) => kind,
                };
                visiting.remove(name);
                kind
            }
            TypeExpr::Struct(_) => FieldKind::Record {
                name: None,
                comparable: self.comparable(ty, visiting),
            },
            TypeExpr::Pointer(inner) => FieldKind::Pointer { to: Box::new(self.kind_guarded(inner, visiting)) },
            TypeExpr::Slice(_) | TypeExpr::Array { .. } | TypeExpr::Map { .. } | TypeExpr::Chan { .. } => {
                FieldKind::Collection
            }
            TypeExpr::Qualified { .. }
            | TypeExpr::Instantiated { .. }
            | TypeExpr::Func(_)
            | TypeExpr::Interface(_) => FieldKind::Opaque,
        }
    }

    /// Whether `==` against a zero composite literal would compile in Go.
    fn comparable(&self, ty: &TypeExpr, visiting: &mut BTreeSet<String>) -> bool {
        match ty {
            TypeExpr::Slice(_) | TypeExpr::Map { .. } | TypeExpr::Func(_) => false,
            TypeExpr::Array { elem, .. } => self.comparable(elem, visiting),
            TypeExpr::Struct(fields) => fields.iter().all(|f| self.comparable(&f.ty, visiting)),
            TypeExpr::Named(name) => match self.decl(name) {
                Some(decl) if visiting.insert(name.clone()) => {
                    let out = self.comparable(&decl.ty, visiting);
                    visiting.remove(name);
                    out
                }
                _ => true,
            },
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_source;

    fn kinds(src: &str) -> Vec<FieldKind> {
        let unit = parse_source(src).unwrap();
        let env = TypeEnv::new(&unit);
        let record = unit.decls.iter().find(|d| d.name == "T").unwrap();
        record.record_fields().unwrap().iter().map(|f| env.kind_of(&f.ty)).collect()
    }

    #[test]
    fn predeclared_and_defined_types() {
        let ks = kinds(
            "package p\ntype Status string\ntype Age uint8\ntype T struct {\n\tA int\n\tB float32\n\tC Status\n\tD Age\n\tE bool\n\tF []int\n\tG time.Time\n}\n",
        );
        assert_eq!(ks[0], FieldKind::Integer { min: i64::MIN, max: i64::MAX });
        assert_eq!(ks[1], FieldKind::Float { bits: 32 });
        assert_eq!(ks[2], FieldKind::Text);
        assert_eq!(ks[3], FieldKind::Integer { min: 0, max: 255 });
        assert_eq!(ks[4], FieldKind::Bool);
        assert_eq!(ks[5], FieldKind::Collection);
        assert_eq!(ks[6], FieldKind::Opaque);
    }

    #[test]
    fn records_aliases_and_pointers() {
        let ks = kinds(
            "package p\ntype Addr struct { Tags []string }\ntype A = Addr\ntype Home Addr\ntype T struct {\n\tX A\n\tY *struct{ N int }\n\tZ struct{ N int }\n\tH Home\n}\n",
        );
        assert_eq!(ks[0], FieldKind::Record { name: Some("Addr".into()), comparable: false });
        assert_eq!(ks[3], FieldKind::Record { name: Some("Home".into()), comparable: false });
        assert_eq!(
            ks[1],
            FieldKind::Pointer { to: Box::new(FieldKind::Record { name: None, comparable: true }) }
        );
        assert_eq!(ks[2], FieldKind::Record { name: None, comparable: true });
    }

    #[test]
    fn self_referential_definitions_terminate() {
        let ks = kinds("package p\ntype L L\ntype T struct { A L }\n");
        assert_eq!(ks[0], FieldKind::Opaque);
    }
}
