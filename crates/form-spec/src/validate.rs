use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::i18n::Translate;
use crate::schema;
use crate::spec::form::FormSpec;
use crate::spec::step::StepSpec;
use crate::visibility::resolve_visibility;

/// One failed constraint on one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FieldIssue {
    pub field: String,
    pub path: String,
    pub message: String,
    pub code: String,
}

impl FieldIssue {
    pub fn new(field: &str, code: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            path: format!("/{}", field),
            message: message.into(),
            code: code.to_string(),
        }
    }
}

/// Outcome of validating a step (or a whole form).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldIssue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_required: Vec<String>,
}

impl ValidationResult {
    pub(crate) fn extend(&mut self, issues: Vec<FieldIssue>) {
        for issue in issues {
            if issue.code == "required" && !self.missing_required.contains(&issue.field) {
                self.missing_required.push(issue.field.clone());
            }
            self.errors.push(issue);
        }
    }

    pub(crate) fn finish(mut self) -> Self {
        self.valid = self.errors.is_empty();
        self
    }

    /// Issues reported for a single field.
    pub fn issues_for<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a FieldIssue> + 'a {
        self.errors.iter().filter(move |issue| issue.field == field)
    }
}

/// Validates the visible fields of one step against `data`.
pub fn validate_step(
    step: &StepSpec,
    data: &Map<String, Value>,
    translator: &dyn Translate,
) -> ValidationResult {
    let visibility = resolve_visibility(step, data);
    schema::generate(&step.fields, translator).validate(data, Some(&visibility))
}

/// Validates every step of a form in order and merges the results.
pub fn validate_form(
    spec: &FormSpec,
    data: &Map<String, Value>,
    translator: &dyn Translate,
) -> ValidationResult {
    let mut result = ValidationResult::default();
    for step in &spec.steps {
        let step_result = validate_step(step, data, translator);
        result.extend(step_result.errors);
    }
    result.finish()
}
