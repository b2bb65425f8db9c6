use serde_json::{Map, Value, json};

use form_spec::{
    Catalog, FieldSpec, FormSpec, NoopTranslator, RuleKind, ValidationRule, schema,
    validate_form, validate_step,
};

fn fixture(name: &str) -> &'static str {
    match name {
        "onboarding" => include_str!("../tests/fixtures/onboarding.json"),
        _ => panic!("unknown fixture {}", name),
    }
}

fn data(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("object data")
}

fn nickname(rules: &[ValidationRule]) -> schema::FieldSchema {
    let field = FieldSpec::new("nickname", "Input").with_rules(rules);
    schema::generate_field(&field, &NoopTranslator).expect("input has a schema")
}

#[test]
fn optional_fields_accept_empty_input() {
    let optional = nickname(&[ValidationRule::with_value(RuleKind::MinLength, 2)]);
    assert!(optional.parse(Some(&json!(""))).is_ok());
    assert!(optional.parse(None).is_ok());
    assert!(optional.parse(Some(&json!("a"))).is_err());

    let required = nickname(&[
        ValidationRule::new(RuleKind::Required),
        ValidationRule::with_value(RuleKind::MinLength, 2),
    ]);
    let issues = required.parse(Some(&json!(""))).expect_err("empty");
    assert_eq!(issues[0].code, "required");
    let issues = required.parse(Some(&json!("a"))).expect_err("too short");
    assert_eq!(issues[0].code, "min_length");
    assert_eq!(required.parse(Some(&json!("ab"))).expect("valid"), json!("ab"));
}

#[test]
fn hidden_fields_are_not_validated() {
    let spec: FormSpec = serde_json::from_str(fixture("onboarding")).expect("deserialize");
    let personal = &spec.steps[0];

    let adult = validate_step(
        personal,
        &data(json!({ "fullName": "Ada", "age": 30 })),
        &NoopTranslator,
    );
    assert!(adult.valid, "{:?}", adult.errors);

    let minor = validate_step(
        personal,
        &data(json!({ "fullName": "Ada", "age": 12 })),
        &NoopTranslator,
    );
    assert!(!minor.valid);
    assert_eq!(minor.missing_required, vec!["guardianName"]);
    assert_eq!(minor.errors[0].path, "/guardianName");
}

#[test]
fn message_keys_are_translated_and_interpolated() {
    let mut catalog = Catalog::new();
    catalog.insert("errors.tooShort", "Use at least {{value}} characters");
    let field = FieldSpec::new("nickname", "Input").with_rules(&[ValidationRule {
        message_key: Some("errors.tooShort".into()),
        ..ValidationRule::with_value(RuleKind::MinLength, 3)
    }]);
    let schema = schema::generate_field(&field, &catalog).expect("schema");
    let issues = schema.parse(Some(&json!("ab"))).expect_err("too short");
    assert_eq!(issues[0].message, "Use at least 3 characters");
}

#[test]
fn whole_form_validation_collects_every_step() {
    let spec: FormSpec = serde_json::from_str(fixture("onboarding")).expect("deserialize");
    let result = validate_form(&spec, &Map::new(), &NoopTranslator);
    assert!(!result.valid);
    assert_eq!(
        result.missing_required,
        vec!["fullName", "age", "email", "accountType", "idVerification", "terms"]
    );
}

#[test]
fn step_schema_exports_json_schema() {
    let spec: FormSpec = serde_json::from_str(fixture("onboarding")).expect("deserialize");
    let exported = schema::generate(&spec.steps[1].fields, &NoopTranslator).to_json_schema(None);
    assert_eq!(exported["type"], "object");
    assert_eq!(exported["properties"]["email"]["format"], "email");
    let required = exported["required"].as_array().expect("required list");
    assert!(required.iter().any(|name| name == "companyName"));
}
