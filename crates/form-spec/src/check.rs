//! Static diagnostics for a form configuration.
//!
//! None of these block a form from running: unknown components render as
//! placeholders and dangling conditions simply evaluate against a missing
//! value. Hosts surface them to whoever authors the configuration.

use std::collections::{BTreeMap, BTreeSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::condition::Operator;
use crate::registry;
use crate::spec::form::FormSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConfigIssueKind {
    UnknownComponent,
    DanglingCondition,
    UnknownOperator,
    DuplicateField,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigIssue {
    pub kind: ConfigIssueKind,
    pub step: String,
    pub field: String,
    pub message: String,
}

pub fn check_spec(spec: &FormSpec) -> Vec<ConfigIssue> {
    let known = spec
        .all_fields()
        .map(|field| field.field_name.as_str())
        .collect::<BTreeSet<_>>();
    let mut seen = BTreeMap::new();
    let mut issues = Vec::new();

    for step in &spec.steps {
        for field in &step.fields {
            let mut push = |kind, message: String| {
                issues.push(ConfigIssue {
                    kind,
                    step: step.id.clone(),
                    field: field.field_name.clone(),
                    message,
                })
            };

            if !registry::is_registered(&field.component) {
                push(
                    ConfigIssueKind::UnknownComponent,
                    format!("unknown component '{}'", field.component),
                );
            }

            if let Some(first_step) = seen.insert(field.field_name.as_str(), step.id.as_str()) {
                push(
                    ConfigIssueKind::DuplicateField,
                    format!(
                        "field '{}' is already declared in step '{}'",
                        field.field_name, first_step
                    ),
                );
            }

            let Some(condition) = &field.condition else {
                continue;
            };
            for name in condition.referenced_fields() {
                if !known.contains(name) {
                    push(
                        ConfigIssueKind::DanglingCondition,
                        format!("condition references unknown field '{}'", name),
                    );
                }
            }
            for operator in condition.operators() {
                if let Operator::Unknown(name) = operator {
                    push(
                        ConfigIssueKind::UnknownOperator,
                        format!("condition uses unknown operator '{}'", name),
                    );
                }
            }
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(value: serde_json::Value) -> FormSpec {
        serde_json::from_value(value).expect("spec")
    }

    #[test]
    fn clean_spec_has_no_issues() {
        let spec = spec(serde_json::json!({
            "steps": [{
                "id": "one",
                "title": "One",
                "fields": [
                    { "fieldName": "age", "component": "Input" },
                    {
                        "fieldName": "guardian",
                        "component": "Input",
                        "condition": { "fieldName": "age", "operator": "lessThan", "value": 18 }
                    }
                ]
            }]
        }));
        assert!(check_spec(&spec).is_empty());
    }

    #[test]
    fn reports_each_problem_kind() {
        let spec = spec(serde_json::json!({
            "steps": [
                {
                    "id": "one",
                    "title": "One",
                    "fields": [
                        { "fieldName": "name", "component": "Fancy" },
                        {
                            "fieldName": "extra",
                            "component": "Input",
                            "condition": {
                                "logic": "OR",
                                "rules": [
                                    { "fieldName": "ghost", "operator": "equals", "value": 1 },
                                    { "fieldName": "name", "operator": "looksLike", "value": 1 }
                                ]
                            }
                        }
                    ]
                },
                {
                    "id": "two",
                    "title": "Two",
                    "fields": [{ "fieldName": "name", "component": "Input" }]
                }
            ]
        }));
        let kinds = check_spec(&spec)
            .into_iter()
            .map(|issue| (issue.kind, issue.step, issue.field))
            .collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![
                (ConfigIssueKind::UnknownComponent, "one".into(), "name".into()),
                (ConfigIssueKind::DanglingCondition, "one".into(), "extra".into()),
                (ConfigIssueKind::UnknownOperator, "one".into(), "extra".into()),
                (ConfigIssueKind::DuplicateField, "two".into(), "name".into()),
            ]
        );
    }
}
