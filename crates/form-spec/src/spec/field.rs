use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::condition::Condition;
use crate::spec::validation::ValidationRule;

/// Declarative description of one form control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub field_name: String,
    pub component: String,
    #[serde(default)]
    pub props: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

impl FieldSpec {
    pub fn new(field_name: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            component: component.into(),
            props: Map::new(),
            condition: None,
        }
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    pub fn with_rules(mut self, rules: &[ValidationRule]) -> Self {
        let encoded = rules
            .iter()
            .filter_map(|rule| serde_json::to_value(rule).ok())
            .collect();
        self.props.insert("validations".into(), Value::Array(encoded));
        self
    }

    pub fn with_condition(mut self, condition: impl Into<Condition>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Parses `props.validations`; malformed entries are logged and dropped.
    pub fn validations(&self) -> Vec<ValidationRule> {
        let Some(entries) = self.props.get("validations") else {
            return Vec::new();
        };
        let Some(entries) = entries.as_array() else {
            warn!(field = %self.field_name, "props.validations is not an array; ignoring");
            return Vec::new();
        };

        entries
            .iter()
            .filter_map(
                |entry| match serde_json::from_value::<ValidationRule>(entry.clone()) {
                    Ok(rule) => Some(rule),
                    Err(err) => {
                        warn!(field = %self.field_name, %err, "skipping malformed validation rule");
                        None
                    }
                },
            )
            .collect()
    }

    pub fn prop_str(&self, key: &str) -> Option<&str> {
        self.props.get(key).and_then(Value::as_str)
    }

    /// Whether a `required` rule is attached.
    pub fn is_required(&self) -> bool {
        self.validations().iter().any(ValidationRule::is_required)
    }
}
