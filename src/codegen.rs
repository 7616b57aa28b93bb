//! Go emission: validation plan → `<type>_validator.go`.
//!
//! Design goals:
//! - Output is a pure function of (plan, package, options); re-running on an
//!   unchanged plan yields byte-identical text.
//! - Only the imports a plan needs, sorted.
//! - Every check gets its own sentinel error so callers can `errors.Is` on it.
use std::collections::BTreeSet;

use crate::kinds::FieldKind;
use crate::markers::FieldPath;
use crate::plan::{Check, ValidationPlan};
use crate::rules::{Rule, formats};
use crate::typer::Literal;

pub const GENERATED_HEADER: &str = "// Code generated by govalid; DO NOT EDIT.";
pub const DEFAULT_SUFFIX: &str = "_validator.go";

const INDENT: &str = "\t";

// ————————————————————————————————————————————————————————————————————————————
// OPTIONS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq)]
pub struct CodegenOptions {
    pub suffix: String,       // appended to the snake_case record name
    pub emit_method: bool,    // also emit `func (t *T) Validate() error`
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self { suffix: DEFAULT_SUFFIX.to_string(), emit_method: true }
    }
}

impl CodegenOptions {
    pub fn file_name(&self, record: &str) -> String {
        format!("{}{}", snake_case(record), self.suffix)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// EMITTER
// ————————————————————————————————————————————————————————————————————————————

pub struct Codegen<'o> {
    options: &'o CodegenOptions,
    out: String,
}

impl<'o> Codegen<'o> {
    pub fn new(options: &'o CodegenOptions) -> Self {
        Self { options, out: String::new() }
    }

    pub fn into_string(self) -> String {
        self.out
    }

    /// One complete Go file for `plan`.
    pub fn emit(&mut self, package: &str, source_name: &str, plan: &ValidationPlan) {
        let ty = plan.record.as_str();
        let sentinels = sentinel_names(plan);

        self.line(0, GENERATED_HEADER);
        self.line(0, &format!("// source: {source_name}"));
        self.blank();
        self.line(0, &format!("package {package}"));
        self.blank();
        self.imports(plan);
        self.sentinels(plan, &sentinels);
        self.regexps(plan);

        // ----- Validate<Type> ----- //
        self.line(0, &format!("// Validate{ty} checks every govalid marker on {ty} and returns all failures joined."));
        self.line(0, &format!("func Validate{ty}(t *{ty}) error {{"));
        self.line(1, "if t == nil {");
        self.line(2, &format!("return ErrNil{ty}"));
        self.line(1, "}");
        self.blank();
        self.line(1, "var errs []error");
        self.blank();
        for (check, sentinel) in plan.checks.iter().zip(&sentinels) {
            self.check(ty, check, sentinel.as_deref());
            self.blank();
        }
        self.line(1, "return errors.Join(errs...)");
        self.line(0, "}");

        if self.options.emit_method {
            self.blank();
            self.line(0, &format!("// Validate checks t against the govalid markers on {ty}."));
            self.line(0, &format!("func (t *{ty}) Validate() error {{"));
            self.line(1, &format!("return Validate{ty}(t)"));
            self.line(0, "}");
        }
    }

    fn imports(&mut self, plan: &ValidationPlan) {
        let mut imports = BTreeSet::from(["errors"]);
        if plan.delegates() {
            imports.insert("fmt");
        }
        if plan.uses(Rule::Ipv4) || plan.uses(Rule::Ipv6) {
            imports.insert("net/netip");
        }
        if plan.uses(Rule::Email) || plan.uses(Rule::Uuid) {
            imports.insert("regexp");
        }
        if plan.uses(Rule::Length) || plan.uses(Rule::MinLength) || plan.uses(Rule::MaxLength) {
            imports.insert("unicode/utf8");
        }
        if imports.len() == 1 {
            self.line(0, "import \"errors\"");
        } else {
            self.line(0, "import (");
            for import in imports {
                self.line(1, &format!("\"{import}\""));
            }
            self.line(0, ")");
        }
        self.blank();
    }

    fn sentinels(&mut self, plan: &ValidationPlan, names: &[Option<String>]) {
        let ty = plan.record.as_str();
        self.line(0, "var (");
        self.line(1, &format!("// ErrNil{ty} is returned when a nil *{ty} is validated."));
        self.line(1, &format!("ErrNil{ty} = errors.New({})", go_quote(&format!("input {ty} is nil"))));
        for (check, name) in plan.checks.iter().zip(names) {
            let Some(name) = name else { continue };
            let message = format!("field {} {}", check.path, check.rule.describe(check.argument.as_ref()));
            self.blank();
            self.line(1, &format!("// {name} reports that {} failed the {} rule.", check.path, check.rule.name()));
            self.line(1, &format!("{name} = errors.New({})", go_quote(&message)));
        }
        self.line(0, ")");
        self.blank();
    }

    fn regexps(&mut self, plan: &ValidationPlan) {
        let ty = plan.record.as_str();
        let mut any = false;
        if plan.uses(Rule::Email) {
            self.line(0, &format!("var {} = regexp.MustCompile({})", regexp_var(ty, Rule::Email), go_quote(formats::EMAIL_PATTERN)));
            any = true;
        }
        if plan.uses(Rule::Uuid) {
            self.line(0, &format!("var {} = regexp.MustCompile({})", regexp_var(ty, Rule::Uuid), go_quote(formats::UUID_PATTERN)));
            any = true;
        }
        if any {
            self.blank();
        }
    }

    fn check(&mut self, ty: &str, check: &Check, sentinel: Option<&str>) {
        if check.delegate.is_none() && sentinel.is_none() {
            return;
        }
        let mut depth = 1;
        if !check.guards.is_empty() {
            let guard = check
                .guards
                .iter()
                .map(|g| format!("{} != nil", field_expr(g)))
                .collect::<Vec<_>>()
                .join(" && ");
            self.line(depth, &format!("if {guard} {{"));
            depth += 1;
        }

        let expr = field_expr(&check.path);
        match (&check.delegate, sentinel) {
            (Some(inner), _) => {
                self.line(depth, &format!("if err := Validate{inner}(&{expr}); err != nil {{"));
                self.line(
                    depth + 1,
                    &format!("errs = append(errs, fmt.Errorf({}, err))", go_quote(&format!("field {}: %w", check.path))),
                );
            }
            (None, sentinel) => {
                self.line(depth, &format!("if {} {{", condition(ty, check, &expr)));
                self.line(depth + 1, &format!("errs = append(errs, {})", sentinel.unwrap_or_default()));
            }
        }
        self.line(depth, "}");

        if !check.guards.is_empty() {
            self.line(depth - 1, "}");
        }
    }

    fn line(&mut self, depth: usize, text: &str) {
        for _ in 0..depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }
}

// ————————————————————————————————————————————————————————————————————————————
// GO EXPRESSIONS
// ————————————————————————————————————————————————————————————————————————————

/// The text following `if ` (and preceding ` {`) that is true when the check
/// is violated.
fn condition(ty: &str, check: &Check, expr: &str) -> String {
    let arg = || check.argument.as_ref().map(go_literal).unwrap_or_default();
    // format and length rules take a plain string; defined string types convert
    let text = || if check.go_type == "string" { expr.to_string() } else { format!("string({expr})") };
    match check.rule {
        Rule::Required => match &check.kind {
            FieldKind::Integer { .. } | FieldKind::Float { .. } => format!("{expr} == 0"),
            FieldKind::Text => format!("{expr} == \"\""),
            FieldKind::Bool => format!("!{expr}"),
            FieldKind::Record { .. } => format!("{expr} == ({}{{}})", check.go_type),
            FieldKind::Pointer { .. } | FieldKind::Collection | FieldKind::Opaque => format!("{expr} == nil"),
        },
        Rule::Eq => format!("{expr} != {}", arg()),
        Rule::Ne => format!("{expr} == {}", arg()),
        Rule::Gte => format!("{expr} < {}", arg()),
        Rule::Lte => format!("{expr} > {}", arg()),
        Rule::Gt => format!("{expr} <= {}", arg()),
        Rule::Lt => format!("{expr} >= {}", arg()),
        Rule::Length => format!("utf8.RuneCountInString({}) != {}", text(), arg()),
        Rule::MinLength => format!("utf8.RuneCountInString({}) < {}", text(), arg()),
        Rule::MaxLength => format!("utf8.RuneCountInString({}) > {}", text(), arg()),
        Rule::Email | Rule::Uuid => format!("!{}.MatchString({})", regexp_var(ty, check.rule), text()),
        Rule::Ipv4 => format!("addr, err := netip.ParseAddr({}); err != nil || !addr.Is4()", text()),
        Rule::Ipv6 => format!("addr, err := netip.ParseAddr({}); err != nil || !addr.Is6() || addr.Zone() != \"\"", text()),
        Rule::Enum => match &check.argument {
            Some(Literal::List(items)) => items
                .iter()
                .map(|item| format!("{expr} != {}", go_literal(item)))
                .collect::<Vec<_>>()
                .join(" && "),
            _ => "true".to_string(),
        },
    }
}

fn field_expr(path: &FieldPath) -> String {
    let mut out = String::from("t");
    for segment in path.segments() {
        out.push('.');
        out.push_str(segment);
    }
    out
}

fn go_literal(literal: &Literal) -> String {
    match literal {
        Literal::Text(s) => go_quote(s),
        other => other.to_string(),
    }
}

/// A Go interpreted string literal.
pub fn go_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

// ————————————————————————————————————————————————————————————————————————————
// NAMES
// ————————————————————————————————————————————————————————————————————————————

/// Sentinel error names, one per non-delegating check: `Err<Type>_<Path><Rule>Validation`.
/// Path segments lose their underscores, so the last `_` always separates the
/// type from the path and names from different records in one package cannot
/// meet. Collisions within a record (`first_name` next to `firstName`) get a
/// numeric suffix in check order.
fn sentinel_names(plan: &ValidationPlan) -> Vec<Option<String>> {
    let mut taken = BTreeSet::new();
    taken.insert(format!("ErrNil{}", plan.record));
    plan.checks
        .iter()
        .map(|check| {
            if check.delegate.is_some() {
                return None;
            }
            let path: String = check.path.segments().iter().map(|s| pascal(s)).collect();
            let base = format!("Err{}_{}{}Validation", plan.record, path, rule_pascal(check.rule));
            let mut name = base.clone();
            let mut n = 2;
            while !taken.insert(name.clone()) {
                name = format!("{base}{n}");
                n += 1;
            }
            Some(name)
        })
        .collect()
}

fn regexp_var(ty: &str, rule: Rule) -> String {
    let suffix = if rule == Rule::Email { "Email" } else { "UUID" };
    format!("{}{suffix}Regexp", lower_first(ty))
}

fn rule_pascal(rule: Rule) -> &'static str {
    match rule {
        Rule::Required => "Required",
        Rule::Eq => "Eq",
        Rule::Ne => "Ne",
        Rule::Gte => "Gte",
        Rule::Lte => "Lte",
        Rule::Gt => "Gt",
        Rule::Lt => "Lt",
        Rule::Length => "Length",
        Rule::MinLength => "MinLength",
        Rule::MaxLength => "MaxLength",
        Rule::Email => "Email",
        Rule::Uuid => "UUID",
        Rule::Ipv4 => "IPv4",
        Rule::Ipv6 => "IPv6",
        Rule::Enum => "Enum",
    }
}

fn pascal(segment: &str) -> String {
    segment
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `UserProfile` → `user_profile`, `HTTPServer` → `http_server`.
pub fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|j| chars[j]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(char::is_lowercase),
                _ => false,
            };
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_names() {
        assert_eq!(snake_case("User"), "user");
        assert_eq!(snake_case("UserProfile"), "user_profile");
        assert_eq!(snake_case("HTTPServer"), "http_server");
        assert_eq!(snake_case("Ipv4Addr"), "ipv4_addr");
        assert_eq!(snake_case("user_v2"), "user_v2");
        assert_eq!(CodegenOptions::default().file_name("UserProfile"), "user_profile_validator.go");
    }

    #[test]
    fn quoting() {
        assert_eq!(go_quote("plain"), "\"plain\"");
        assert_eq!(go_quote("a\"b\\c\n"), "\"a\\\"b\\\\c\\n\"");
        assert_eq!(go_quote("\u{1}"), "\"\\x01\"");
        assert_eq!(go_quote("ñ"), "\"ñ\"");
    }

    #[test]
    fn pascal_segments() {
        assert_eq!(pascal("name"), "Name");
        assert_eq!(pascal("first_name"), "FirstName");
        assert_eq!(pascal("Age"), "Age");
    }

    #[test]
    fn sentinels_keep_record_and_path_apart() {
        let unit = crate::unit::compile_source(
            "m.go",
            "package p\ntype User struct {\n\t// +govalid:required\n\tNameX string\n}\ntype UserName struct {\n\t// +govalid:required\n\tX string\n}\n",
            &CodegenOptions::default(),
        )
        .unwrap();
        let user = sentinel_names(&unit.plans["User"]);
        let user_name = sentinel_names(&unit.plans["UserName"]);
        assert_eq!(user, [Some("ErrUser_NameXRequiredValidation".to_string())]);
        assert_eq!(user_name, [Some("ErrUserName_XRequiredValidation".to_string())]);
    }

    #[test]
    fn go_literals() {
        assert_eq!(go_literal(&Literal::Int(-3)), "-3");
        assert_eq!(go_literal(&Literal::Float(ordered_float::OrderedFloat(18.0))), "18.0");
        assert_eq!(go_literal(&Literal::Text("a b".into())), "\"a b\"");
    }
}
