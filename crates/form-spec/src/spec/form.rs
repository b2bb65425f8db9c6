use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::spec::field::FieldSpec;
use crate::spec::step::StepSpec;

/// Storage key used when a form enables persistence without naming one.
pub const DEFAULT_PERSIST_KEY: &str = "multi-step-form-data";

/// Top-level multi-step form definition as supplied by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FormSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub steps: Vec<StepSpec>,
    #[serde(default)]
    pub initial_step: usize,
    #[serde(default = "default_true")]
    pub allow_back_navigation: bool,
    #[serde(default)]
    pub persist_data: bool,
    #[serde(default = "default_persist_key")]
    pub persist_key: String,
}

fn default_true() -> bool {
    true
}

fn default_persist_key() -> String {
    DEFAULT_PERSIST_KEY.to_string()
}

impl FormSpec {
    pub fn new(steps: Vec<StepSpec>) -> Self {
        Self {
            id: None,
            title: None,
            steps,
            initial_step: 0,
            allow_back_navigation: true,
            persist_data: false,
            persist_key: default_persist_key(),
        }
    }

    pub fn step(&self, index: usize) -> Option<&StepSpec> {
        self.steps.get(index)
    }

    pub fn step_index(&self, step_id: &str) -> Option<usize> {
        self.steps.iter().position(|step| step.id == step_id)
    }

    /// Every field of every step, in declaration order.
    pub fn all_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.steps.iter().flat_map(|step| step.fields.iter())
    }
}
