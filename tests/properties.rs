use govalid::{CodegenOptions, Record, compile_source};
use proptest::prelude::*;

const TYPES: &[&str] = &["int", "int8", "uint16", "float64", "string", "bool", "[]string", "*int", "map[string]int"];

fn field_name() -> impl Strategy<Value = String> {
    "[A-Z][a-zA-Z0-9]{0,8}"
}

/// Comments that look nothing like markers.
fn plain_comment() -> impl Strategy<Value = String> {
    "[a-zA-Z ,.]{0,30}"
}

fn struct_source(fields: &[(String, usize, Option<String>)]) -> String {
    let mut src = String::from("package p\n\ntype T struct {\n");
    for (i, (name, ty, comment)) in fields.iter().enumerate() {
        if let Some(comment) = comment {
            src.push_str(&format!("\t// {comment}\n"));
        }
        src.push_str(&format!("\t{name}{i} {}\n", TYPES[*ty]));
    }
    src.push_str("}\n");
    src
}

/// Markers valid on a `string` field, each rule at most once.
fn string_markers() -> impl Strategy<Value = Vec<&'static str>> {
    proptest::sample::subsequence(
        vec![
            "required",
            "minlength=1",
            "maxlength=40",
            "email",
            "eq=x",
            "enum=a b c",
        ],
        0..=6,
    )
}

proptest! {
    #[test]
    fn structs_without_markers_produce_nothing(
        fields in prop::collection::vec((field_name(), 0..TYPES.len(), prop::option::of(plain_comment())), 0..8)
    ) {
        let src = struct_source(&fields);
        let unit = compile_source("t.go", &src, &CodegenOptions::default()).unwrap();
        prop_assert!(unit.plans.is_empty());
        prop_assert!(unit.artifacts.is_empty());
        prop_assert!(unit.diagnostics.is_empty());
    }

    #[test]
    fn emission_is_deterministic(markers in string_markers(), with_method in any::<bool>()) {
        let mut src = String::from("package p\n\ntype T struct {\n");
        for marker in &markers {
            src.push_str(&format!("\t// +govalid:{marker}\n"));
        }
        src.push_str("\tName string\n\n\t// +govalid:gte=0\n\tAge int\n}\n");

        let options = CodegenOptions { emit_method: with_method, ..CodegenOptions::default() };
        let a = compile_source("t.go", &src, &options).unwrap();
        let b = compile_source("t.go", &src, &options).unwrap();
        prop_assert!(a.is_success());
        prop_assert_eq!(a.plans["T"].checks.len(), markers.len() + 1);
        prop_assert_eq!(&a.artifacts[0].source, &b.artifacts[0].source);
    }

    #[test]
    fn gte_violated_exactly_below_the_bound(bound in -1000i64..1000, value in -1000i64..1000) {
        let src = format!("package p\ntype T struct {{\n\t// +govalid:gte={bound}\n\tN int\n}}\n");
        let unit = compile_source("t.go", &src, &CodegenOptions::default()).unwrap();
        let got = unit.validate("T", &Record::new().with("N", value)).unwrap();
        prop_assert_eq!(got.is_valid(), value >= bound);
    }

    #[test]
    fn length_counts_characters(s in "\\PC{0,12}", n in 0usize..12) {
        let src = format!("package p\ntype T struct {{\n\t// +govalid:length={n}\n\tS string\n}}\n");
        let unit = compile_source("t.go", &src, &CodegenOptions::default()).unwrap();
        let got = unit.validate("T", &Record::new().with("S", s.as_str())).unwrap();
        prop_assert_eq!(got.is_valid(), s.chars().count() == n);
    }
}
