use govalid::{CodegenOptions, CompiledUnit, DiagnosticKind, Record, Rule, compile_source};

fn compile(src: &str) -> CompiledUnit {
    compile_source("model.go", src, &CodegenOptions::default()).expect("valid Go")
}

fn violations(unit: &CompiledUnit, record: &str, instance: &Record) -> Vec<(String, &'static str)> {
    unit.validate(record, instance).expect("record has a validator").keys()
}

fn diagnostic_kinds(unit: &CompiledUnit) -> Vec<DiagnosticKind> {
    unit.diagnostics.iter().map(|d| d.kind).collect()
}

// ----- Nop and Inside ----- //

#[test]
fn unannotated_records_emit_nothing() {
    let unit = compile(
        "package p

// Plain has tags and comments but no markers.
type Plain struct {
	Name string `json:\"name\"`
	// a regular comment
	Age int
}
",
    );
    assert!(unit.plans.is_empty());
    assert!(unit.artifacts.is_empty());
    assert!(unit.is_success());
}

#[test]
fn anonymous_nested_markers_reach_the_owner() {
    let unit = compile(
        "package p

type User struct {
	Profile struct {
		Contact struct {
			// +govalid:email
			Email string
		}
	}
}
",
    );
    assert_eq!(unit.plans.keys().collect::<Vec<_>>(), ["User"]);
    let plan = &unit.plans["User"];
    assert_eq!(plan.checks.len(), 1);
    assert_eq!(plan.checks[0].path.to_string(), "Profile.Contact.Email");
    assert_eq!(unit.artifacts.len(), 1);

    let bad = Record::new().with("Profile", Record::new().with("Contact", Record::new().with("Email", "nope")));
    assert_eq!(violations(&unit, "User", &bad), [("Profile.Contact.Email".to_string(), "email")]);
}

#[test]
fn block_comments_carry_markers() {
    let unit = compile(
        "/*
 * Copyright header.
 */
package p

/** Host is documented with a starred block. **/
type Host struct {
	/*
	 * +govalid:uuid
	 */
	ID string

	/* +govalid:ipv4 */
	Addr string

	Port int /* trailing, not a doc comment */
}
",
    );
    assert!(unit.is_success());
    let rules: Vec<_> = unit.plans["Host"].checks.iter().map(|c| (c.path.to_string(), c.rule)).collect();
    assert_eq!(rules, [("ID".to_string(), Rule::Uuid), ("Addr".to_string(), Rule::Ipv4)]);
    assert_eq!(unit.plans["Host"].checks[0].position.line, 9);

    let bad = Record::new().with("ID", "nope").with("Addr", "10.0.0.1");
    assert_eq!(violations(&unit, "Host", &bad), [("ID".to_string(), "uuid")]);
}

// ----- Rule semantics ----- //

#[test]
fn eq_and_ne_across_kinds() {
    let unit = compile(
        "package p

type T struct {
	// +govalid:eq=active
	State string

	// +govalid:eq=100
	Count int

	// +govalid:ne=3.14
	Ratio float64
}
",
    );
    let ok = Record::new().with("State", "active").with("Count", 100).with("Ratio", 2.5);
    assert!(violations(&unit, "T", &ok).is_empty());

    let bad = Record::new().with("State", "inactive").with("Count", 99).with("Ratio", 3.14);
    let rules: Vec<_> = violations(&unit, "T", &bad).into_iter().map(|(_, r)| r).collect();
    assert_eq!(rules, ["eq", "eq", "ne"]);
}

#[test]
fn gte_boundary_is_inclusive() {
    let unit = compile("package p\ntype T struct {\n\t// +govalid:gte=18\n\tAge int\n}\n");
    let age = |n: i64| violations(&unit, "T", &Record::new().with("Age", n)).len();
    assert_eq!(age(17), 1);
    assert_eq!(age(18), 0);
    assert_eq!(age(19), 0);
}

#[test]
fn length_is_exact() {
    let unit = compile("package p\ntype T struct {\n\t// +govalid:length=7\n\tCode string\n}\n");
    let code = |s: &str| violations(&unit, "T", &Record::new().with("Code", s)).len();
    assert_eq!(code("abcdef"), 1);
    assert_eq!(code("abcdefg"), 0);
    assert_eq!(code("abcdefgh"), 1);
}

#[test]
fn minlength_and_maxlength_are_independent() {
    let unit = compile(
        "package p\ntype T struct {\n\t// +govalid:minlength=2\n\t// +govalid:maxlength=4\n\tName string\n}\n",
    );
    assert_eq!(violations(&unit, "T", &Record::new().with("Name", "a")), [("Name".to_string(), "minlength")]);
    assert_eq!(violations(&unit, "T", &Record::new().with("Name", "abcde")), [("Name".to_string(), "maxlength")]);
    assert!(violations(&unit, "T", &Record::new().with("Name", "abc")).is_empty());
}

#[test]
fn format_rules() {
    let unit = compile(
        "package p

type Host struct {
	// +govalid:email
	Email string
	// +govalid:uuid
	ID string
	// +govalid:ipv4
	V4 string
	// +govalid:ipv6
	V6 string
}
",
    );
    let good = Record::new()
        .with("Email", "ops@example.com")
        .with("ID", "123e4567-e89b-12d3-a456-426614174000")
        .with("V4", "192.168.1.10")
        .with("V6", "2001:db8::1");
    assert!(violations(&unit, "Host", &good).is_empty());

    let bad = Record::new()
        .with("Email", "ops@")
        .with("ID", "123e4567e89b12d3a456426614174000")
        .with("V4", "256.0.0.1")
        .with("V6", "2001:db8:::1");
    assert_eq!(violations(&unit, "Host", &bad).len(), 4);
}

#[test]
fn two_markers_two_violations() {
    let unit = compile(
        "package p\ntype T struct {\n\t// +govalid:required\n\t// +govalid:email\n\tEmail string\n}\n",
    );
    assert_eq!(
        violations(&unit, "T", &Record::new()),
        [("Email".to_string(), "required"), ("Email".to_string(), "email")]
    );
}

#[test]
fn aliases_report_canonical_names() {
    let unit = compile("package p\ntype T struct {\n\t// +govalid:min=1\n\t// +govalid:max=9\n\tN int\n}\n");
    assert_eq!(unit.plans["T"].checks[0].rule, Rule::Gte);
    assert_eq!(violations(&unit, "T", &Record::new().with("N", 10)), [("N".to_string(), "lte")]);
}

// ----- Diagnostics ----- //

#[test]
fn length_on_integer_is_incompatible_and_omitted() {
    let unit = compile(
        "package p\ntype T struct {\n\t// +govalid:length=3\n\tAge int\n\n\t// +govalid:required\n\tName string\n}\n",
    );
    assert_eq!(diagnostic_kinds(&unit), [DiagnosticKind::IncompatibleRule]);
    assert!(!unit.is_success());
    let plan = &unit.plans["T"];
    assert_eq!(plan.checks.len(), 1);
    assert_eq!(plan.checks[0].path.to_string(), "Name");
    assert!(!unit.artifacts[0].authoritative);
}

#[test]
fn diagnostics_do_not_taint_other_records() {
    let unit = compile(
        "package p

type Bad struct {
	// +govalid:bogus
	// +govalid:required
	X int
}

type Good struct {
	// +govalid:required
	Y int
}
",
    );
    assert_eq!(diagnostic_kinds(&unit), [DiagnosticKind::UnknownRule]);
    assert!(!unit.artifact("Bad").unwrap().authoritative);
    assert!(unit.artifact("Good").unwrap().authoritative);
}

#[test]
fn integer_arguments_respect_field_width() {
    let unit = compile(
        "package p\ntype T struct {\n\t// +govalid:lte=255\n\tA uint8\n\t// +govalid:lte=256\n\tB uint8\n\t// +govalid:gte=-1\n\tC uint\n}\n",
    );
    assert_eq!(diagnostic_kinds(&unit), [DiagnosticKind::InvalidArgument, DiagnosticKind::InvalidArgument]);
    assert_eq!(unit.plans["T"].checks.len(), 1);
}

#[test]
fn float32_arguments_must_fit_single_precision() {
    let unit = compile(
        "package p\ntype T struct {\n\t// +govalid:lte=1e39\n\tX float32\n\t// +govalid:lte=1e39\n\tY float64\n\t// +govalid:gt=0.1\n\tZ float32\n}\n",
    );
    assert_eq!(diagnostic_kinds(&unit), [DiagnosticKind::InvalidArgument]);
    assert_eq!(unit.diagnostics.iter().next().unwrap().path, "X");
    let source = &unit.artifact("T").unwrap().source;
    assert!(!source.contains("t.X > 1e39"));
    assert!(source.contains("if t.Y > "));

    // Go rounds both sides of a float32 comparison to single precision
    let z = |x: f64| violations(&unit, "T", &Record::new().with("Y", 0.0).with("Z", x)).len();
    assert_eq!(z(0.1f32 as f64), 1);
    assert_eq!(z(0.2), 0);
}

#[test]
fn min_and_gte_on_one_field_are_duplicates() {
    let unit = compile("package p\ntype T struct {\n\t// +govalid:min=1\n\t// +govalid:gte=1\n\tN int\n}\n");
    assert_eq!(diagnostic_kinds(&unit), [DiagnosticKind::DuplicateRule]);
    assert_eq!(unit.plans["T"].checks.len(), 1);
}

#[test]
fn diagnostics_surface_in_source_order() {
    let unit = compile(
        "package p

type T struct {
	// +govalid:email
	A int

	// +govalid:
	B string

	// +govalid:uuid=x
	C string
}
",
    );
    assert_eq!(
        diagnostic_kinds(&unit),
        [DiagnosticKind::IncompatibleRule, DiagnosticKind::MalformedMarker, DiagnosticKind::InvalidArgument]
    );
    let lines: Vec<_> = unit.diagnostics.iter().map(|d| d.position.line).collect();
    assert_eq!(lines, [4, 7, 10]);
}

#[test]
fn syntax_errors_abort_the_unit() {
    let err = compile_source("x.go", "package p\ntype T struct {\n\tA int\n", &CodegenOptions::default());
    assert!(err.is_err());
}

// ----- Records, pointers, delegation ----- //

#[test]
fn required_on_a_planned_record_delegates() {
    let unit = compile(
        "package p

type Address struct {
	// +govalid:required
	City string
}

type User struct {
	// +govalid:required
	Home Address
}
",
    );
    assert_eq!(unit.plans["User"].checks[0].delegate.as_deref(), Some("Address"));
    let user = Record::new().with("Home", Record::new().with("City", ""));
    assert_eq!(violations(&unit, "User", &user), [("Home.City".to_string(), "required")]);

    let source = &unit.artifact("User").unwrap().source;
    assert!(source.contains("if err := ValidateAddress(&t.Home); err != nil {"));
    assert!(source.contains("\"fmt\""));
}

#[test]
fn delegating_to_a_record_with_diagnostics_is_not_authoritative() {
    let unit = compile(
        "package p

type Address struct {
	// +govalid:bogus
	// +govalid:required
	City string
}

type User struct {
	// +govalid:required
	Home Address
}

type Account struct {
	// +govalid:required
	Owner User
}

type Other struct {
	// +govalid:required
	Name string
}
",
    );
    assert_eq!(diagnostic_kinds(&unit), [DiagnosticKind::UnknownRule]);
    assert!(unit.artifact("User").unwrap().source.contains("ValidateAddress("));
    assert!(!unit.artifact("Address").unwrap().authoritative);
    assert!(!unit.artifact("User").unwrap().authoritative);
    assert!(!unit.artifact("Account").unwrap().authoritative);
    assert!(unit.artifact("Other").unwrap().authoritative);
}

#[test]
fn pointer_guards_skip_nil_sub_records() {
    let unit = compile(
        "package p

type T struct {
	Extra *struct {
		// +govalid:gte=1
		N int
	}

	// +govalid:required
	Ref *string
}
",
    );
    assert_eq!(violations(&unit, "T", &Record::new()), [("Ref".to_string(), "required")]);

    let present = Record::new().with("Extra", Record::new().with("N", 0)).with("Ref", "x");
    assert_eq!(violations(&unit, "T", &present), [("Extra.N".to_string(), "gte")]);
}

#[test]
fn required_pointers_only_reject_nil() {
    let unit = compile(
        "package p

type T struct {
	// +govalid:required
	Ref *string

	// +govalid:required
	Opt *struct {
		N int
	}
}
",
    );
    let zero_targets = Record::new().with("Ref", "").with("Opt", Record::new().with("N", 0));
    assert!(violations(&unit, "T", &zero_targets).is_empty());
    assert_eq!(
        violations(&unit, "T", &Record::new()),
        [("Ref".to_string(), "required"), ("Opt".to_string(), "required")]
    );

    let source = &unit.artifact("T").unwrap().source;
    assert!(source.contains("if t.Ref == nil {"));
    assert!(source.contains("if t.Opt == nil {"));
}

#[test]
fn defined_string_types_convert_in_generated_code() {
    let unit = compile(
        "package p\ntype Code string\ntype T struct {\n\t// +govalid:maxlength=3\n\tC Code\n}\n",
    );
    let source = &unit.artifact("T").unwrap().source;
    assert!(source.contains("utf8.RuneCountInString(string(t.C)) > 3"));
}

#[test]
fn mismatched_instance_values_are_reported() {
    let unit = compile("package p\ntype T struct {\n\t// +govalid:gte=1\n\tN int\n}\n");
    let got = unit.validate("T", &Record::new().with("N", "one")).unwrap();
    assert_eq!(got.len(), 1);
    assert!(got.iter().next().unwrap().message.contains("integer"));
}

// ----- Emission ----- //

#[test]
fn emission_is_idempotent() {
    let src = "package p

type Address struct {
	// +govalid:required
	City string
}

type User struct {
	// +govalid:required
	// +govalid:maxlength=50
	Name string
	// +govalid:email
	Email string
	// +govalid:required
	Home Address
}
";
    let a = compile(src);
    let b = compile(src);
    let sources = |u: &CompiledUnit| u.artifacts.iter().map(|a| a.source.clone()).collect::<Vec<_>>();
    assert_eq!(sources(&a), sources(&b));
}

#[test]
fn method_emission_is_optional() {
    let src = "package p\ntype T struct {\n\t// +govalid:required\n\tN int\n}\n";
    let with = compile(src);
    let options = CodegenOptions { emit_method: false, ..CodegenOptions::default() };
    let without = compile_source("model.go", src, &options).unwrap();
    assert!(with.artifacts[0].source.contains("func (t *T) Validate() error {"));
    assert!(!without.artifacts[0].source.contains("Validate() error"));
    assert_eq!(with.artifacts[0].file_name, "t_validator.go");
}

#[test]
fn generated_file_layout() {
    let unit = compile("package models\ntype Account struct {\n\t// +govalid:required\n\tOwner string\n}\n");
    let expected = "// Code generated by govalid; DO NOT EDIT.
// source: model.go

package models

import \"errors\"

var (
	// ErrNilAccount is returned when a nil *Account is validated.
	ErrNilAccount = errors.New(\"input Account is nil\")

	// ErrAccount_OwnerRequiredValidation reports that Owner failed the required rule.
	ErrAccount_OwnerRequiredValidation = errors.New(\"field Owner is required\")
)

// ValidateAccount checks every govalid marker on Account and returns all failures joined.
func ValidateAccount(t *Account) error {
	if t == nil {
		return ErrNilAccount
	}

	var errs []error

	if t.Owner == \"\" {
		errs = append(errs, ErrAccount_OwnerRequiredValidation)
	}

	return errors.Join(errs...)
}

// Validate checks t against the govalid markers on Account.
func (t *Account) Validate() error {
	return ValidateAccount(t)
}
";
    assert_eq!(unit.artifacts[0].source, expected);
    assert_eq!(unit.artifacts[0].file_name, "account_validator.go");
}
