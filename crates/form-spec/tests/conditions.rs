use serde_json::{Map, Value, json};

use form_spec::{Condition, FormSpec, resolve_visibility, visible_fields};

fn fixture(name: &str) -> &'static str {
    match name {
        "nested_conditions" => include_str!("../tests/fixtures/nested_conditions.json"),
        "onboarding" => include_str!("../tests/fixtures/onboarding.json"),
        _ => panic!("unknown fixture {}", name),
    }
}

fn data(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("object data")
}

#[test]
fn nested_tree_combines_and_or_not() {
    let condition: Condition =
        serde_json::from_str(fixture("nested_conditions")).expect("deserialize");
    assert!(matches!(condition, Condition::Complex(_)));

    let cases = [
        (json!({}), false),
        (json!({ "country": "NL" }), true),
        (json!({ "age": "21", "employment": "employed" }), true),
        (json!({ "age": 17, "employment": "employed" }), false),
        (json!({ "email": "a@b.io" }), true),
        (json!({ "email": "a@b.io", "newsletter": true }), false),
    ];
    for (input, expected) in cases {
        assert_eq!(
            condition.evaluate(&data(input.clone())),
            expected,
            "input {}",
            input
        );
    }
}

#[test]
fn leaf_comparison_requires_a_present_value() {
    let condition: Condition =
        serde_json::from_value(json!({ "fieldName": "age", "operator": "greaterThan", "value": 18 }))
            .expect("deserialize");
    assert!(condition.evaluate(&data(json!({ "age": 20 }))));
    assert!(!condition.evaluate(&data(json!({ "age": 17 }))));
    assert!(!condition.evaluate(&data(json!({}))));
}

#[test]
fn unknown_operators_hide_the_field() {
    let condition: Condition =
        serde_json::from_value(json!({ "fieldName": "age", "operator": "between", "value": [1, 2] }))
            .expect("unknown operators still deserialize");
    assert!(!condition.evaluate(&data(json!({ "age": 1 }))));
}

#[test]
fn step_visibility_follows_current_values() {
    let spec: FormSpec = serde_json::from_str(fixture("onboarding")).expect("deserialize");
    let account = &spec.steps[1];

    let hidden = resolve_visibility(account, &data(json!({ "accountType": "personal" })));
    assert_eq!(hidden.get("companyName"), Some(&false));
    assert_eq!(hidden.get("email"), Some(&true));

    let values = data(json!({ "accountType": "business", "email": "a@b.io" }));
    let names = visible_fields(account, &values)
        .into_iter()
        .map(|field| field.field_name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["email", "accountType", "companyName"]);
}
