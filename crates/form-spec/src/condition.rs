use std::cmp::Ordering;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Nesting limit for complex conditions; deeper trees evaluate to `false`.
pub const MAX_CONDITION_DEPTH: usize = 32;

/// Comparison applied by a [`ConditionRule`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    In,
    NotIn,
    IsEmpty,
    IsNotEmpty,
    IsTrue,
    IsFalse,
    IsDefined,
    IsUndefined,
    Unknown(String),
}

impl Operator {
    pub fn as_str(&self) -> &str {
        match self {
            Operator::Equals => "equals",
            Operator::NotEquals => "notEquals",
            Operator::GreaterThan => "greaterThan",
            Operator::GreaterThanOrEqual => "greaterThanOrEqual",
            Operator::LessThan => "lessThan",
            Operator::LessThanOrEqual => "lessThanOrEqual",
            Operator::Contains => "contains",
            Operator::NotContains => "notContains",
            Operator::StartsWith => "startsWith",
            Operator::EndsWith => "endsWith",
            Operator::In => "in",
            Operator::NotIn => "notIn",
            Operator::IsEmpty => "isEmpty",
            Operator::IsNotEmpty => "isNotEmpty",
            Operator::IsTrue => "isTrue",
            Operator::IsFalse => "isFalse",
            Operator::IsDefined => "isDefined",
            Operator::IsUndefined => "isUndefined",
            Operator::Unknown(name) => name,
        }
    }
}

impl From<String> for Operator {
    fn from(name: String) -> Self {
        match name.as_str() {
            "equals" => Operator::Equals,
            "notEquals" => Operator::NotEquals,
            "greaterThan" => Operator::GreaterThan,
            "greaterThanOrEqual" => Operator::GreaterThanOrEqual,
            "lessThan" => Operator::LessThan,
            "lessThanOrEqual" => Operator::LessThanOrEqual,
            "contains" => Operator::Contains,
            "notContains" => Operator::NotContains,
            "startsWith" => Operator::StartsWith,
            "endsWith" => Operator::EndsWith,
            "in" => Operator::In,
            "notIn" => Operator::NotIn,
            "isEmpty" => Operator::IsEmpty,
            "isNotEmpty" => Operator::IsNotEmpty,
            "isTrue" => Operator::IsTrue,
            "isFalse" => Operator::IsFalse,
            "isDefined" => Operator::IsDefined,
            "isUndefined" => Operator::IsUndefined,
            _ => Operator::Unknown(name),
        }
    }
}

impl From<Operator> for String {
    fn from(operator: Operator) -> Self {
        operator.as_str().to_string()
    }
}

/// Leaf condition comparing one form value against an expected value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConditionRule {
    pub field_name: String,
    #[schemars(with = "String")]
    pub operator: Operator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// Boolean connective of a [`ComplexCondition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Logic {
    #[serde(alias = "and")]
    And,
    #[serde(alias = "or")]
    Or,
    #[serde(alias = "not")]
    Not,
}

/// Composite condition; `rules` and `conditions` form one set of children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ComplexCondition {
    pub logic: Logic,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<ConditionRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<ComplexCondition>,
}

/// Visibility condition attached to a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Condition {
    Complex(ComplexCondition),
    Rule(ConditionRule),
}

impl Condition {
    /// Evaluates the condition against the current form values.
    pub fn evaluate(&self, data: &Map<String, Value>) -> bool {
        match self {
            Condition::Rule(rule) => rule.evaluate(data),
            Condition::Complex(complex) => complex.evaluate_at(data, 1),
        }
    }

    /// Every leaf rule of the tree, in tree order.
    pub fn rules(&self) -> Vec<&ConditionRule> {
        let mut rules = Vec::new();
        match self {
            Condition::Rule(rule) => rules.push(rule),
            Condition::Complex(complex) => complex.collect_rules(&mut rules),
        }
        rules
    }

    /// Names of every field the condition reads, in tree order.
    pub fn referenced_fields(&self) -> Vec<&str> {
        self.rules()
            .into_iter()
            .map(|rule| rule.field_name.as_str())
            .collect()
    }

    pub fn operators(&self) -> Vec<&Operator> {
        self.rules().into_iter().map(|rule| &rule.operator).collect()
    }
}

impl From<ConditionRule> for Condition {
    fn from(rule: ConditionRule) -> Self {
        Condition::Rule(rule)
    }
}

impl From<ComplexCondition> for Condition {
    fn from(complex: ComplexCondition) -> Self {
        Condition::Complex(complex)
    }
}

/// Free-function form of [`Condition::evaluate`].
pub fn evaluate(condition: &Condition, data: &Map<String, Value>) -> bool {
    condition.evaluate(data)
}

impl ComplexCondition {
    pub fn evaluate(&self, data: &Map<String, Value>) -> bool {
        self.evaluate_at(data, 1)
    }

    fn evaluate_at(&self, data: &Map<String, Value>, depth: usize) -> bool {
        if depth > MAX_CONDITION_DEPTH {
            warn!(
                depth,
                limit = MAX_CONDITION_DEPTH,
                "condition nesting exceeds limit; treating as false"
            );
            return false;
        }

        let mut children = self
            .rules
            .iter()
            .map(|rule| rule.evaluate(data))
            .chain(
                self.conditions
                    .iter()
                    .map(|nested| nested.evaluate_at(data, depth + 1)),
            );

        match self.logic {
            Logic::And => children.all(|value| value),
            Logic::Or => children.any(|value| value),
            Logic::Not => !children.any(|value| value),
        }
    }

    fn collect_rules<'a>(&'a self, rules: &mut Vec<&'a ConditionRule>) {
        rules.extend(self.rules.iter());
        for nested in &self.conditions {
            nested.collect_rules(rules);
        }
    }
}

impl ConditionRule {
    pub fn new(field_name: impl Into<String>, operator: Operator, value: Option<Value>) -> Self {
        Self {
            field_name: field_name.into(),
            operator,
            value,
        }
    }

    pub fn evaluate(&self, data: &Map<String, Value>) -> bool {
        let actual = data.get(&self.field_name);
        let expected = self.value.as_ref();

        match &self.operator {
            Operator::Equals => loosely_equal(actual, expected),
            Operator::NotEquals => !loosely_equal(actual, expected),
            Operator::GreaterThan => compare(actual, expected, |o| o == Ordering::Greater),
            Operator::GreaterThanOrEqual => compare(actual, expected, |o| o != Ordering::Less),
            Operator::LessThan => compare(actual, expected, |o| o == Ordering::Less),
            Operator::LessThanOrEqual => compare(actual, expected, |o| o != Ordering::Greater),
            Operator::Contains => contains(actual, expected),
            Operator::NotContains => !contains(actual, expected),
            Operator::StartsWith => match (actual, expected) {
                (Some(Value::String(text)), Some(Value::String(prefix))) => {
                    text.starts_with(prefix.as_str())
                }
                _ => false,
            },
            Operator::EndsWith => match (actual, expected) {
                (Some(Value::String(text)), Some(Value::String(suffix))) => {
                    text.ends_with(suffix.as_str())
                }
                _ => false,
            },
            Operator::In => is_member(actual, expected),
            Operator::NotIn => !is_member(actual, expected),
            Operator::IsEmpty => is_empty_value(actual),
            Operator::IsNotEmpty => !is_empty_value(actual),
            Operator::IsTrue => matches!(actual, Some(Value::Bool(true))),
            Operator::IsFalse => matches!(actual, Some(Value::Bool(false))),
            Operator::IsDefined => !matches!(actual, None | Some(Value::Null)),
            Operator::IsUndefined => matches!(actual, None | Some(Value::Null)),
            Operator::Unknown(name) => {
                warn!(
                    operator = %name,
                    field = %self.field_name,
                    "unknown condition operator; treating as false"
                );
                false
            }
        }
    }
}

/// `true` for missing values, `null`, blank strings, and empty arrays or objects.
pub fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(_) => false,
    }
}

/// Reads numbers and numeric strings as `f64`.
pub(crate) fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                None
            } else {
                trimmed.parse::<f64>().ok().filter(|value| value.is_finite())
            }
        }
        _ => None,
    }
}

fn loosely_equal(left: Option<&Value>, right: Option<&Value>) -> bool {
    match (left, right) {
        (None | Some(Value::Null), None | Some(Value::Null)) => true,
        (Some(Value::Number(left)), Some(Value::Number(right))) => left.as_f64() == right.as_f64(),
        (Some(left), Some(right)) => left == right,
        _ => false,
    }
}

fn compare<F>(actual: Option<&Value>, expected: Option<&Value>, predicate: F) -> bool
where
    F: Fn(Ordering) -> bool,
{
    let (Some(actual), Some(expected)) = (actual, expected) else {
        return false;
    };
    match (as_number(actual), as_number(expected)) {
        (Some(left), Some(right)) => left.partial_cmp(&right).is_some_and(predicate),
        _ => false,
    }
}

fn contains(actual: Option<&Value>, expected: Option<&Value>) -> bool {
    match (actual, expected) {
        (Some(Value::String(text)), Some(Value::String(needle))) => text.contains(needle.as_str()),
        (Some(Value::Array(items)), Some(needle)) => items
            .iter()
            .any(|item| loosely_equal(Some(item), Some(needle))),
        _ => false,
    }
}

fn is_member(actual: Option<&Value>, expected: Option<&Value>) -> bool {
    let Some(Value::Array(options)) = expected else {
        return false;
    };
    let in_options = |value: &Value| {
        options
            .iter()
            .any(|option| loosely_equal(Some(value), Some(option)))
    };
    match actual {
        None | Some(Value::Null) => false,
        Some(Value::Array(selected)) => selected.iter().any(in_options),
        Some(value) => in_options(value),
    }
}
