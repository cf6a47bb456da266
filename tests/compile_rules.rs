use std::sync::Arc;

use regex::Regex;
use serde_json::json;

use fieldrule::registry::{Predicate, Primitive};
use fieldrule::{
    compile, ArrayKind, CompileContext, EnumType, RuleError, RuleKind, Schema, ValidationOptions,
};

#[test]
fn min_length_boundary() {
    let field = compile("min:5", &CompileContext::new()).expect("compile ok");
    assert_eq!(field.checks().len(), 1);
    let check = &field.checks()[0];
    assert_eq!(check.holds(&json!("abcd")), Some(false));
    assert_eq!(check.holds(&json!("abcde")), Some(true));
    assert_eq!(field.metadata().min_length, Some(5));
}

#[test]
fn max_length_counts_characters_and_elements() {
    let field = compile("max:3", &CompileContext::new()).expect("compile ok");
    let check = &field.checks()[0];
    assert_eq!(check.holds(&json!("äöü")), Some(true));
    assert_eq!(check.holds(&json!([1, 2, 3, 4])), Some(false));
    // neither a string nor a sequence
    assert_eq!(check.holds(&json!(12)), Some(false));
}

#[test]
fn checks_follow_token_order() {
    let field = compile("required|string|min:3|max:20", &CompileContext::new()).expect("compile ok");
    assert_eq!(
        field.kinds(),
        vec![RuleKind::Required, RuleKind::String, RuleKind::Min, RuleKind::Max]
    );
    let metadata = field.metadata();
    assert_eq!(metadata.required, Some(true));
    assert_eq!(metadata.type_name.as_deref(), Some("string"));
    assert_eq!(metadata.min_length, Some(3));
    assert_eq!(metadata.max_length, Some(20));
}

#[test]
fn empty_rules_compile_to_nothing() {
    let field = compile("", &CompileContext::new()).expect("compile ok");
    assert!(field.checks().is_empty());
    assert_eq!(field.metadata().to_json(), json!({}));
}

#[test]
fn unknown_rule_aborts_compilation() {
    let err = compile("required|strnig|max:3", &CompileContext::new()).unwrap_err();
    assert_eq!(err, RuleError::UnknownRule("strnig".to_string()));
    assert!(err.is_configuration());
}

#[test]
fn missing_parameters_fail_at_compile_time() {
    let context = CompileContext::new();
    for rules in ["enum", "pattern", "object", "array", "min", "max:", "unique:email", "exist"] {
        let err = compile(rules, &context).unwrap_err();
        assert!(
            matches!(err, RuleError::MissingArgument { .. }),
            "{rules} should need an argument, got {err}"
        );
    }
    // an entity without a field name is still not enough
    let with_entity = CompileContext::new().with_entity("User");
    assert!(matches!(
        compile("unique", &with_entity).unwrap_err(),
        RuleError::MissingArgument { .. }
    ));
}

#[test]
fn non_numeric_length_is_invalid() {
    let err = compile("min:three", &CompileContext::new()).unwrap_err();
    assert!(matches!(err, RuleError::InvalidArgument { ref rule, .. } if rule == "min"));
}

#[test]
fn enum_metadata_and_membership() {
    let context = CompileContext::new().with_enum(EnumType::new("Role", ["admin", "member"]));
    let field = compile("enum", &context).expect("compile ok");
    assert_eq!(field.checks()[0].holds(&json!("admin")), Some(true));
    assert_eq!(field.checks()[0].holds(&json!("guest")), Some(false));
    assert_eq!(
        field.metadata().to_json(),
        json!({"enum": ["admin", "member"], "enumName": "Role"})
    );
}

#[test]
fn numeric_kinds() {
    let context = CompileContext::new();
    let int = compile("int", &context).unwrap();
    assert_eq!(int.checks()[0].holds(&json!(4)), Some(true));
    assert_eq!(int.checks()[0].holds(&json!(4.5)), Some(false));
    assert_eq!(int.metadata().type_name.as_deref(), Some("integer"));

    let number = compile("number", &context).unwrap();
    assert_eq!(number.checks()[0].holds(&json!(4.5)), Some(true));
    assert_eq!(number.checks()[0].holds(&json!("4.5")), Some(false));

    let decimal = compile("decimal", &context).unwrap();
    assert_eq!(decimal.checks()[0].holds(&json!("12.50")), Some(true));
    assert_eq!(decimal.checks()[0].holds(&json!("12,50")), Some(false));
    assert_eq!(decimal.metadata().format.as_deref(), Some("decimal"));

    let float = compile("float", &context).unwrap();
    assert_eq!(float.metadata().format.as_deref(), Some("float"));
    assert_eq!(float.metadata().type_name.as_deref(), Some("number"));
}

#[test]
fn string_formats() {
    let context = CompileContext::new();
    let email = compile("email", &context).unwrap();
    assert_eq!(email.checks()[0].holds(&json!("a@b.com")), Some(true));
    assert_eq!(email.checks()[0].holds(&json!("a@")), Some(false));
    assert_eq!(email.metadata().format.as_deref(), Some("email"));

    let uuid = compile("uuid", &context).unwrap();
    assert_eq!(
        uuid.checks()[0].holds(&json!("3f0b6c1e-2a4d-4c8e-9f10-1b2c3d4e5f60")),
        Some(true)
    );
    // version 1 identifiers are not accepted
    assert_eq!(
        uuid.checks()[0].holds(&json!("3f0b6c1e-2a4d-1c8e-9f10-1b2c3d4e5f60")),
        Some(false)
    );
}

#[test]
fn pattern_records_source_text() {
    let context = CompileContext::new().with_pattern(Regex::new(r"^[A-Z]{3}$").unwrap());
    let field = compile("pattern", &context).unwrap();
    assert_eq!(field.metadata().pattern.as_deref(), Some(r"^[A-Z]{3}$"));
    assert_eq!(field.checks()[0].holds(&json!("ABC")), Some(true));
    assert_eq!(field.checks()[0].holds(&json!("AB")), Some(false));
}

#[test]
fn date_emits_coercion_then_check() {
    let field = compile("date", &CompileContext::new()).unwrap();
    assert_eq!(field.checks().len(), 2);
    assert!(matches!(field.checks()[0].predicate(), Predicate::CoerceDate));
    assert!(matches!(
        field.checks()[1].predicate(),
        Predicate::Primitive(Primitive::Date)
    ));
    assert_eq!(
        field.metadata().to_json(),
        json!({"type": "string", "format": "date-time"})
    );
}

#[test]
fn array_of_numbers_checks_sequence_then_elements() {
    let context = CompileContext::new().with_array_kind(ArrayKind::Number);
    let field = compile("array", &context).unwrap();
    assert_eq!(field.checks().len(), 2);
    let value = json!([1, "x", 3]);
    assert_eq!(field.checks()[0].holds(&value), Some(true));
    assert_eq!(field.checks()[1].holds(&value), Some(false));
    assert_eq!(field.checks()[1].holds(&json!([1, 2, 3])), Some(true));
    assert_eq!(
        field.metadata().to_json(),
        json!({"type": "array", "isArray": true, "items": "number"})
    );
}

#[test]
fn array_kind_may_come_from_the_rule() {
    let field = compile("array:string", &CompileContext::new()).unwrap();
    assert_eq!(field.metadata().items.as_deref(), Some("string"));
    // the context wins over the rule argument
    let context = CompileContext::new().with_array_kind(ArrayKind::Number);
    let field = compile("array:string", &context).unwrap();
    assert_eq!(field.metadata().items.as_deref(), Some("number"));
}

#[test]
fn later_tokens_refine_metadata() {
    let context = CompileContext::new().with_array_kind(ArrayKind::String);
    let field = compile("string|array", &context).unwrap();
    assert_eq!(field.metadata().type_name.as_deref(), Some("array"));
    let field = compile("required|optional", &context).unwrap();
    assert_eq!(field.metadata().required, Some(false));
    assert!(!field.metadata().is_required());
}

#[test]
fn object_references_nested_type() {
    let address = Schema::new("Address")
        .field("city", "required|string", CompileContext::new())
        .unwrap();
    let context = CompileContext::new().with_nested(Arc::new(address));
    let field = compile("object", &context).unwrap();
    assert_eq!(field.checks()[0].holds(&json!({"city": "Oslo"})), None);
    assert_eq!(
        field.metadata().to_json(),
        json!({"type": "object", "nestedType": "Address"})
    );
}

#[test]
fn store_rules_need_entity_and_field() {
    let context = CompileContext::new().with_entity("User");
    let unique = compile("unique:email", &context).unwrap();
    assert_eq!(unique.metadata().unique_items, Some(true));
    assert_eq!(unique.checks()[0].holds(&json!("a@b.com")), None);
    let exist = compile("exist:id", &context).unwrap();
    assert_eq!(exist.metadata().to_json(), json!({}));
}

#[test]
fn example_is_carried_by_every_fragment() {
    let context = CompileContext::new().with_example("jane@example.com");
    let field = compile("required|email", &context).unwrap();
    for check in field.checks() {
        assert_eq!(check.metadata().example, Some(json!("jane@example.com")));
    }
    assert_eq!(
        field.metadata().to_json(),
        json!({"required": true, "format": "email", "example": "jane@example.com"})
    );
}

#[test]
fn each_option_wraps_primary_checks() {
    let context = CompileContext::new().with_options(ValidationOptions::each());
    let field = compile("string|max:2", &context).unwrap();
    assert!(field
        .checks()
        .iter()
        .all(|check| matches!(check.predicate(), Predicate::Each(_))));
    assert_eq!(field.checks()[0].holds(&json!(["a", "b"])), Some(true));
    assert_eq!(field.checks()[1].holds(&json!(["ab", "abc"])), Some(false));
}

#[test]
fn compilation_is_deterministic() {
    let context = CompileContext::new()
        .with_enum(EnumType::new("Color", ["red", "green"]))
        .with_example("red");
    let first = compile("required|enum|max:5", &context).unwrap();
    let second = compile("required|enum|max:5", &context).unwrap();
    assert_eq!(first.metadata(), second.metadata());
    assert_eq!(first.kinds(), second.kinds());
    let fragments = |f: &fieldrule::CompiledField| {
        f.checks().iter().map(|c| c.metadata().clone()).collect::<Vec<_>>()
    };
    assert_eq!(fragments(&first), fragments(&second));
}
