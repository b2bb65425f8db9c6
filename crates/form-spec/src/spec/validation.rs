use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Catalogue of validation rule types understood by the schema generator.
///
/// Unknown names are kept as [`RuleKind::Unknown`] so a backend that ships a
/// newer rule never breaks deserialization of the whole form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RuleKind {
    Required,
    MinLength,
    MaxLength,
    Min,
    Max,
    Email,
    Url,
    Regex,
    Number,
    Integer,
    Positive,
    Negative,
    Boolean,
    Date,
    Array,
    Object,
    Includes,
    StartsWith,
    EndsWith,
    Uuid,
    Cuid,
    Length,
    Unknown(String),
}

impl RuleKind {
    pub fn as_str(&self) -> &str {
        match self {
            RuleKind::Required => "required",
            RuleKind::MinLength => "minLength",
            RuleKind::MaxLength => "maxLength",
            RuleKind::Min => "min",
            RuleKind::Max => "max",
            RuleKind::Email => "email",
            RuleKind::Url => "url",
            RuleKind::Regex => "regex",
            RuleKind::Number => "number",
            RuleKind::Integer => "integer",
            RuleKind::Positive => "positive",
            RuleKind::Negative => "negative",
            RuleKind::Boolean => "boolean",
            RuleKind::Date => "date",
            RuleKind::Array => "array",
            RuleKind::Object => "object",
            RuleKind::Includes => "includes",
            RuleKind::StartsWith => "startsWith",
            RuleKind::EndsWith => "endsWith",
            RuleKind::Uuid => "uuid",
            RuleKind::Cuid => "cuid",
            RuleKind::Length => "length",
            RuleKind::Unknown(name) => name,
        }
    }
}

impl From<String> for RuleKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "required" => RuleKind::Required,
            "minLength" => RuleKind::MinLength,
            "maxLength" => RuleKind::MaxLength,
            "min" => RuleKind::Min,
            "max" => RuleKind::Max,
            "email" => RuleKind::Email,
            "url" => RuleKind::Url,
            "regex" => RuleKind::Regex,
            "number" => RuleKind::Number,
            "integer" => RuleKind::Integer,
            "positive" => RuleKind::Positive,
            "negative" => RuleKind::Negative,
            "boolean" => RuleKind::Boolean,
            "date" => RuleKind::Date,
            "array" => RuleKind::Array,
            "object" => RuleKind::Object,
            "includes" => RuleKind::Includes,
            "startsWith" => RuleKind::StartsWith,
            "endsWith" => RuleKind::EndsWith,
            "uuid" => RuleKind::Uuid,
            "cuid" => RuleKind::Cuid,
            "length" => RuleKind::Length,
            _ => RuleKind::Unknown(name),
        }
    }
}

impl From<RuleKind> for String {
    fn from(kind: RuleKind) -> Self {
        kind.as_str().to_string()
    }
}

/// One named constraint attached to a field through `props.validations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    #[serde(rename = "type")]
    #[schemars(with = "String")]
    pub kind: RuleKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_key: Option<String>,
}

impl ValidationRule {
    pub fn new(kind: RuleKind) -> Self {
        Self {
            kind,
            value: None,
            message_key: None,
        }
    }

    pub fn with_value(kind: RuleKind, value: impl Into<Value>) -> Self {
        Self {
            kind,
            value: Some(value.into()),
            message_key: None,
        }
    }

    pub fn is_required(&self) -> bool {
        self.kind == RuleKind::Required
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_rule_types_survive_deserialization() {
        let rule: ValidationRule =
            serde_json::from_value(json!({ "type": "palindrome", "value": true })).unwrap();
        assert_eq!(rule.kind, RuleKind::Unknown("palindrome".into()));
        assert_eq!(serde_json::to_value(&rule).unwrap()["type"], "palindrome");
    }

    #[test]
    fn camel_case_names_map_to_kinds() {
        let rule: ValidationRule =
            serde_json::from_value(json!({ "type": "minLength", "value": 2, "messageKey": "short" }))
                .unwrap();
        assert_eq!(rule.kind, RuleKind::MinLength);
        assert_eq!(rule.message_key.as_deref(), Some("short"));
    }
}
