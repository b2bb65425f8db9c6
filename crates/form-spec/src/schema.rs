//! Runtime validation schemas derived from field configuration.
//!
//! Required-ness is explicit: a field without a `required` rule accepts
//! empty input and only enforces its other rules once a value is present.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Number, Value, json};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use tracing::warn;

use crate::condition::{as_number, is_empty_value};
use crate::i18n::{Translate, interpolate};
use crate::props::merge_props;
use crate::registry::{self, FieldFamily};
use crate::spec::field::FieldSpec;
use crate::spec::validation::{RuleKind, ValidationRule};
use crate::validate::{FieldIssue, ValidationResult};
use crate::visibility::VisibilityMap;

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+'-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$")
        .expect("email pattern compiles")
});

static CUID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^c[^\s-]{8,}$").expect("cuid pattern compiles"));

/// Value shape a field must have before its rules run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseType {
    String,
    StringArray,
    Boolean,
    Number,
    Date,
    DateRange,
    IdentityVerification,
}

impl BaseType {
    /// Picks the base type from the widget family and its merged props.
    pub fn for_family(family: FieldFamily, props: &Map<String, Value>) -> Self {
        match family {
            FieldFamily::Boolean => BaseType::Boolean,
            FieldFamily::Numeric => BaseType::Number,
            FieldFamily::Date => BaseType::Date,
            FieldFamily::DateRange => BaseType::DateRange,
            FieldFamily::IdentityVerification => BaseType::IdentityVerification,
            FieldFamily::ToggleGroup
                if props.get("type").and_then(Value::as_str) == Some("multiple") =>
            {
                BaseType::StringArray
            }
            _ => BaseType::String,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BaseType::String => "string",
            BaseType::StringArray => "string_array",
            BaseType::Boolean => "boolean",
            BaseType::Number => "number",
            BaseType::Date => "date",
            BaseType::DateRange => "date_range",
            BaseType::IdentityVerification => "identity_verification",
        }
    }

    fn is_empty(self, value: Option<&Value>) -> bool {
        match (self, value) {
            (_, None | Some(Value::Null)) => true,
            (BaseType::String | BaseType::Number | BaseType::Date, Some(Value::String(text))) => {
                text.trim().is_empty()
            }
            (BaseType::StringArray, Some(Value::Array(items))) => items.is_empty(),
            (BaseType::DateRange, Some(Value::Object(range))) => {
                is_empty_value(range.get("from")) && is_empty_value(range.get("to"))
            }
            _ => false,
        }
    }

    fn is_blank_text(self, value: Option<&Value>) -> bool {
        matches!(
            (self, value),
            (BaseType::String, Some(Value::String(text))) if !text.is_empty() && text.trim().is_empty()
        )
    }
}

#[derive(Debug, Clone)]
enum Check {
    MinLength(usize),
    MaxLength(usize),
    ExactLength(usize),
    MinNumber(f64),
    MaxNumber(f64),
    MinDate(Date),
    MaxDate(Date),
    Email,
    Url,
    Uuid,
    Cuid,
    Pattern(Regex),
    Includes(String),
    StartsWith(String),
    EndsWith(String),
    Numeric,
    Integer,
    Positive,
    Negative,
    IsBoolean,
    IsDate,
    IsArray,
    IsObject,
}

#[derive(Debug, Clone)]
struct Constraint {
    check: Check,
    code: &'static str,
    message: Option<String>,
}

/// Validation schema for one field.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    field: String,
    base: BaseType,
    required: bool,
    required_message: Option<String>,
    constraints: Vec<Constraint>,
}

impl FieldSchema {
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn base(&self) -> BaseType {
        self.base
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Checks a value and returns it coerced (dates as `YYYY-MM-DD`).
    ///
    /// Empty input passes untouched unless the field is required.
    pub fn parse(&self, value: Option<&Value>) -> Result<Value, Vec<FieldIssue>> {
        if self.base.is_empty(value) {
            if self.required {
                return Err(vec![self.required_issue()]);
            }
            // Whitespace on an optional text field is still checked as text.
            if !self.base.is_blank_text(value) {
                return Ok(value.cloned().unwrap_or(Value::Null));
            }
        }
        let Some(value) = value else {
            return Ok(Value::Null);
        };

        let coerced = self.coerce(value).ok_or_else(|| {
            vec![self.issue(
                "invalid_type",
                format!("Expected {}", expected_label(self.base)),
            )]
        })?;

        let mut issues = Vec::new();
        if self.required && !self.satisfies_required(&coerced) {
            issues.push(self.required_issue());
        }
        for constraint in &self.constraints {
            if !self.check(&constraint.check, value, &coerced) {
                let message = constraint
                    .message
                    .clone()
                    .unwrap_or_else(|| default_message(&constraint.check, self.base));
                issues.push(self.issue(constraint.code, message));
            }
        }

        if issues.is_empty() {
            Ok(coerced)
        } else {
            Err(issues)
        }
    }

    fn coerce(&self, value: &Value) -> Option<Value> {
        match self.base {
            BaseType::String => value.is_string().then(|| value.clone()),
            BaseType::StringArray => value
                .as_array()
                .filter(|items| items.iter().all(Value::is_string))
                .map(|_| value.clone()),
            BaseType::Boolean => value.is_boolean().then(|| value.clone()),
            BaseType::Number => value
                .as_f64()
                .filter(|number| number.is_finite())
                .map(|_| value.clone()),
            BaseType::Date => coerce_date(value).map(|date| Value::String(format_date(date))),
            BaseType::DateRange => {
                let range = value.as_object()?;
                let mut coerced = Map::new();
                for key in ["from", "to"] {
                    match range.get(key) {
                        None | Some(Value::Null) => {}
                        Some(Value::String(text)) if text.trim().is_empty() => {}
                        Some(bound) => {
                            let date = coerce_date(bound)?;
                            coerced.insert(key.into(), Value::String(format_date(date)));
                        }
                    }
                }
                if let (Some(from), Some(to)) = (
                    coerced.get("from").and_then(Value::as_str),
                    coerced.get("to").and_then(Value::as_str),
                ) && from > to
                {
                    return None;
                }
                Some(Value::Object(coerced))
            }
            BaseType::IdentityVerification => match value {
                Value::Bool(_) => Some(value.clone()),
                Value::Object(map) => {
                    map.get("completed").and_then(Value::as_bool)?;
                    if let Some(session) = map.get("sessionId")
                        && !(session.is_string() || session.is_null())
                    {
                        return None;
                    }
                    if let Some(timestamp) = map.get("timestamp")
                        && !(timestamp.is_string() || timestamp.is_number() || timestamp.is_null())
                    {
                        return None;
                    }
                    Some(value.clone())
                }
                _ => None,
            },
        }
    }

    fn satisfies_required(&self, coerced: &Value) -> bool {
        match self.base {
            BaseType::Boolean => coerced.as_bool() == Some(true),
            BaseType::IdentityVerification => match coerced {
                Value::Bool(done) => *done,
                Value::Object(map) => map.get("completed").and_then(Value::as_bool) == Some(true),
                _ => false,
            },
            BaseType::DateRange => coerced.get("from").is_some(),
            _ => true,
        }
    }

    fn check(&self, check: &Check, raw: &Value, coerced: &Value) -> bool {
        let text = coerced.as_str();
        match check {
            Check::MinLength(min) => measure(coerced).is_none_or(|len| len >= *min),
            Check::MaxLength(max) => measure(coerced).is_none_or(|len| len <= *max),
            Check::ExactLength(len) => measure(coerced).is_none_or(|actual| actual == *len),
            Check::MinNumber(min) => as_number(coerced).is_none_or(|value| value >= *min),
            Check::MaxNumber(max) => as_number(coerced).is_none_or(|value| value <= *max),
            Check::MinDate(min) => coerce_date(coerced).is_none_or(|date| date >= *min),
            Check::MaxDate(max) => coerce_date(coerced).is_none_or(|date| date <= *max),
            Check::Email => text.is_none_or(|text| EMAIL.is_match(text) && !text.contains("..")),
            Check::Url => text.is_none_or(|text| url::Url::parse(text).is_ok()),
            Check::Uuid => text.is_none_or(|text| uuid::Uuid::parse_str(text).is_ok()),
            Check::Cuid => text.is_none_or(|text| CUID.is_match(text)),
            Check::Pattern(regex) => text.is_none_or(|text| regex.is_match(text)),
            Check::Includes(needle) => text.is_none_or(|text| text.contains(needle.as_str())),
            Check::StartsWith(prefix) => text.is_none_or(|text| text.starts_with(prefix.as_str())),
            Check::EndsWith(suffix) => text.is_none_or(|text| text.ends_with(suffix.as_str())),
            Check::Numeric => as_number(coerced).is_some(),
            Check::Integer => as_number(coerced).is_some_and(|value| value.fract() == 0.0),
            Check::Positive => as_number(coerced).is_some_and(|value| value > 0.0),
            Check::Negative => as_number(coerced).is_some_and(|value| value < 0.0),
            Check::IsBoolean => match raw {
                Value::Bool(_) => true,
                Value::String(text) => matches!(text.as_str(), "true" | "false"),
                _ => false,
            },
            Check::IsDate => coerce_date(raw).is_some(),
            Check::IsArray => raw.is_array(),
            Check::IsObject => raw.is_object(),
        }
    }

    fn required_issue(&self) -> FieldIssue {
        let message = self.required_message.clone().unwrap_or_else(|| match self.base {
            BaseType::Boolean => "This field must be checked".to_string(),
            BaseType::StringArray => "Select at least one option".to_string(),
            BaseType::IdentityVerification => "Identity verification must be completed".to_string(),
            _ => "This field is required".to_string(),
        });
        self.issue("required", message)
    }

    fn issue(&self, code: &str, message: String) -> FieldIssue {
        FieldIssue::new(&self.field, code, message)
    }

    /// JSON-Schema rendition of this field for static tooling.
    pub fn to_json_schema(&self) -> Value {
        let mut schema = Map::new();
        match self.base {
            BaseType::String => {
                schema.insert("type".into(), json!("string"));
            }
            BaseType::StringArray => {
                schema.insert("type".into(), json!("array"));
                schema.insert("items".into(), json!({ "type": "string" }));
            }
            BaseType::Boolean => {
                schema.insert("type".into(), json!("boolean"));
            }
            BaseType::Number => {
                schema.insert("type".into(), json!("number"));
            }
            BaseType::Date => {
                schema.insert("type".into(), json!("string"));
                schema.insert("format".into(), json!("date"));
            }
            BaseType::DateRange => {
                schema.insert("type".into(), json!("object"));
                schema.insert(
                    "properties".into(),
                    json!({
                        "from": { "type": "string", "format": "date" },
                        "to": { "type": "string", "format": "date" }
                    }),
                );
            }
            BaseType::IdentityVerification => {
                schema.insert(
                    "anyOf".into(),
                    json!([
                        { "type": "boolean" },
                        {
                            "type": "object",
                            "required": ["completed"],
                            "properties": {
                                "completed": { "type": "boolean" },
                                "sessionId": { "type": "string" },
                                "data": {},
                                "timestamp": { "type": ["string", "number"] }
                            }
                        }
                    ]),
                );
            }
        }

        let array = self.base == BaseType::StringArray;
        let (min_len, max_len) = if array {
            ("minItems", "maxItems")
        } else {
            ("minLength", "maxLength")
        };
        for constraint in &self.constraints {
            match &constraint.check {
                Check::MinLength(min) => {
                    schema.insert(min_len.into(), json!(min));
                }
                Check::MaxLength(max) => {
                    schema.insert(max_len.into(), json!(max));
                }
                Check::ExactLength(len) => {
                    schema.insert(min_len.into(), json!(len));
                    schema.insert(max_len.into(), json!(len));
                }
                Check::MinNumber(min) => {
                    if let Some(number) = Number::from_f64(*min) {
                        schema.insert("minimum".into(), Value::Number(number));
                    }
                }
                Check::MaxNumber(max) => {
                    if let Some(number) = Number::from_f64(*max) {
                        schema.insert("maximum".into(), Value::Number(number));
                    }
                }
                Check::MinDate(min) => {
                    schema.insert("formatMinimum".into(), json!(format_date(*min)));
                }
                Check::MaxDate(max) => {
                    schema.insert("formatMaximum".into(), json!(format_date(*max)));
                }
                Check::Email => {
                    schema.insert("format".into(), json!("email"));
                }
                Check::Url => {
                    schema.insert("format".into(), json!("uri"));
                }
                Check::Uuid => {
                    schema.insert("format".into(), json!("uuid"));
                }
                Check::Pattern(regex) => {
                    schema.insert("pattern".into(), json!(regex.as_str()));
                }
                _ => {}
            }
        }

        Value::Object(schema)
    }
}

/// Validation schema for a set of fields, keyed by field name.
#[derive(Debug, Clone, Default)]
pub struct StepSchema {
    fields: Vec<FieldSchema>,
}

impl StepSchema {
    pub fn get(&self, field_name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|schema| schema.field == field_name)
    }

    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Validates `data`, skipping fields marked hidden in `visibility`.
    pub fn validate(
        &self,
        data: &Map<String, Value>,
        visibility: Option<&VisibilityMap>,
    ) -> ValidationResult {
        let mut result = ValidationResult::default();
        for schema in &self.fields {
            let visible = visibility
                .and_then(|map| map.get(&schema.field).copied())
                .unwrap_or(true);
            if !visible {
                continue;
            }
            if let Err(issues) = schema.parse(data.get(&schema.field)) {
                result.extend(issues);
            }
        }
        result.finish()
    }

    /// Object-level JSON Schema, optionally restricted to visible fields.
    pub fn to_json_schema(&self, visibility: Option<&VisibilityMap>) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for schema in &self.fields {
            if !visibility
                .and_then(|map| map.get(&schema.field).copied())
                .unwrap_or(true)
            {
                continue;
            }
            properties.insert(schema.field.clone(), schema.to_json_schema());
            if schema.required {
                required.push(Value::String(schema.field.clone()));
            }
        }

        let mut root = Map::new();
        root.insert("type".into(), Value::String("object".into()));
        root.insert("properties".into(), Value::Object(properties));
        if !required.is_empty() {
            root.insert("required".into(), Value::Array(required));
        }
        Value::Object(root)
    }
}

/// Builds the schema for every value-bearing field of a step.
pub fn generate(fields: &[FieldSpec], translator: &dyn Translate) -> StepSchema {
    StepSchema {
        fields: fields
            .iter()
            .filter_map(|field| generate_field(field, translator))
            .collect(),
    }
}

/// Builds one field's schema in isolation, for live validation.
///
/// Unknown components and widgets without a form value yield `None`.
pub fn generate_field(field: &FieldSpec, translator: &dyn Translate) -> Option<FieldSchema> {
    let widget = registry::get(&field.component)?;
    if !widget.binds_value() {
        return None;
    }

    let props = merge_props(widget.default_props(), &field.props);
    let merged = FieldSpec {
        props,
        ..field.clone()
    };
    let base = BaseType::for_family(widget.family, &merged.props);

    let mut schema = FieldSchema {
        field: field.field_name.clone(),
        base,
        required: false,
        required_message: None,
        constraints: Vec::new(),
    };

    for rule in merged.validations() {
        let message = rule
            .message_key
            .as_deref()
            .and_then(|key| translator.translate(key))
            .map(|template| {
                let args = json!({ "value": rule.value, "field": field.field_name });
                interpolate(&template, &args)
            });

        if rule.kind == RuleKind::Required {
            schema.required = true;
            schema.required_message = message;
            continue;
        }

        match constraint_for(&rule, base) {
            Some((check, code)) => schema.constraints.push(Constraint {
                check,
                code,
                message,
            }),
            None => warn!(
                field = %field.field_name,
                rule = rule.kind.as_str(),
                base = base.as_str(),
                "validation rule not applicable; skipping"
            ),
        }
    }

    Some(schema)
}

fn constraint_for(rule: &ValidationRule, base: BaseType) -> Option<(Check, &'static str)> {
    let value = rule.value.as_ref();
    let textual = matches!(base, BaseType::String);
    let countable = matches!(base, BaseType::String | BaseType::StringArray);

    let constraint = match &rule.kind {
        RuleKind::MinLength if countable => (Check::MinLength(as_count(value)?), "min_length"),
        RuleKind::MaxLength if countable => (Check::MaxLength(as_count(value)?), "max_length"),
        RuleKind::Length if countable => (Check::ExactLength(as_count(value)?), "length"),
        RuleKind::Min => match base {
            BaseType::Number => (Check::MinNumber(as_number(value?)?), "min"),
            BaseType::Date => (Check::MinDate(coerce_date(value?)?), "min"),
            _ if countable => (Check::MinLength(as_count(value)?), "min"),
            _ => return None,
        },
        RuleKind::Max => match base {
            BaseType::Number => (Check::MaxNumber(as_number(value?)?), "max"),
            BaseType::Date => (Check::MaxDate(coerce_date(value?)?), "max"),
            _ if countable => (Check::MaxLength(as_count(value)?), "max"),
            _ => return None,
        },
        RuleKind::Email if textual => (Check::Email, "email"),
        RuleKind::Url if textual => (Check::Url, "url"),
        RuleKind::Uuid if textual => (Check::Uuid, "uuid"),
        RuleKind::Cuid if textual => (Check::Cuid, "cuid"),
        RuleKind::Regex if textual => {
            let pattern = value?.as_str()?;
            match Regex::new(pattern) {
                Ok(regex) => (Check::Pattern(regex), "pattern"),
                Err(err) => {
                    warn!(pattern, %err, "invalid regex in validation rule");
                    return None;
                }
            }
        }
        RuleKind::Includes if textual => (Check::Includes(as_text(value)?), "includes"),
        RuleKind::StartsWith if textual => (Check::StartsWith(as_text(value)?), "starts_with"),
        RuleKind::EndsWith if textual => (Check::EndsWith(as_text(value)?), "ends_with"),
        RuleKind::Number if matches!(base, BaseType::String | BaseType::Number) => {
            (Check::Numeric, "number")
        }
        RuleKind::Integer if matches!(base, BaseType::String | BaseType::Number) => {
            (Check::Integer, "integer")
        }
        RuleKind::Positive if matches!(base, BaseType::String | BaseType::Number) => {
            (Check::Positive, "positive")
        }
        RuleKind::Negative if matches!(base, BaseType::String | BaseType::Number) => {
            (Check::Negative, "negative")
        }
        RuleKind::Boolean => (Check::IsBoolean, "boolean"),
        RuleKind::Date => (Check::IsDate, "date"),
        RuleKind::Array => (Check::IsArray, "array"),
        RuleKind::Object => (Check::IsObject, "object"),
        _ => return None,
    };
    Some(constraint)
}

fn as_count(value: Option<&Value>) -> Option<usize> {
    let number = as_number(value?)?;
    (number >= 0.0 && number.fract() == 0.0).then_some(number as usize)
}

fn as_text(value: Option<&Value>) -> Option<String> {
    value?.as_str().map(str::to_string)
}

fn measure(value: &Value) -> Option<usize> {
    match value {
        Value::String(text) => Some(text.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

/// Parses `YYYY-MM-DD` or RFC 3339 timestamps into a calendar date.
pub fn coerce_date(value: &Value) -> Option<Date> {
    let text = value.as_str()?.trim();
    Date::parse(text, format_description!("[year]-[month]-[day]"))
        .ok()
        .or_else(|| {
            OffsetDateTime::parse(text, &Rfc3339)
                .ok()
                .map(|moment| moment.date())
        })
}

pub(crate) fn format_date(date: Date) -> String {
    date.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| date.to_string())
}

fn expected_label(base: BaseType) -> &'static str {
    match base {
        BaseType::String => "text",
        BaseType::StringArray => "a list of options",
        BaseType::Boolean => "true or false",
        BaseType::Number => "a number",
        BaseType::Date => "a valid date",
        BaseType::DateRange => "a valid date range",
        BaseType::IdentityVerification => "an identity verification result",
    }
}

fn default_message(check: &Check, base: BaseType) -> String {
    let unit = if base == BaseType::StringArray {
        "items"
    } else {
        "characters"
    };
    match check {
        Check::MinLength(min) => format!("Must contain at least {} {}", min, unit),
        Check::MaxLength(max) => format!("Must contain at most {} {}", max, unit),
        Check::ExactLength(len) => format!("Must contain exactly {} {}", len, unit),
        Check::MinNumber(min) => format!("Must be at least {}", min),
        Check::MaxNumber(max) => format!("Must be at most {}", max),
        Check::MinDate(min) => format!("Must be on or after {}", format_date(*min)),
        Check::MaxDate(max) => format!("Must be on or before {}", format_date(*max)),
        Check::Email => "Invalid email address".to_string(),
        Check::Url => "Invalid URL".to_string(),
        Check::Uuid => "Invalid UUID".to_string(),
        Check::Cuid => "Invalid CUID".to_string(),
        Check::Pattern(_) => "Invalid format".to_string(),
        Check::Includes(needle) => format!("Must include \"{}\"", needle),
        Check::StartsWith(prefix) => format!("Must start with \"{}\"", prefix),
        Check::EndsWith(suffix) => format!("Must end with \"{}\"", suffix),
        Check::Numeric => "Must be a number".to_string(),
        Check::Integer => "Must be a whole number".to_string(),
        Check::Positive => "Must be greater than 0".to_string(),
        Check::Negative => "Must be less than 0".to_string(),
        Check::IsBoolean => "Must be true or false".to_string(),
        Check::IsDate => "Must be a valid date".to_string(),
        Check::IsArray => "Must be a list".to_string(),
        Check::IsObject => "Must be an object".to_string(),
    }
}
