use serde_json::{Map, Value};

use crate::spec::field::FieldSpec;
use crate::spec::step::StepSpec;

pub type VisibilityMap = std::collections::BTreeMap<String, bool>;

/// A field without a condition is always visible.
pub fn is_visible(field: &FieldSpec, data: &Map<String, Value>) -> bool {
    field
        .condition
        .as_ref()
        .is_none_or(|condition| condition.evaluate(data))
}

pub fn resolve_visibility(step: &StepSpec, data: &Map<String, Value>) -> VisibilityMap {
    step.fields
        .iter()
        .map(|field| (field.field_name.clone(), is_visible(field, data)))
        .collect()
}

/// Fields of `step` shown for the current values, in declaration order.
pub fn visible_fields<'a>(step: &'a StepSpec, data: &Map<String, Value>) -> Vec<&'a FieldSpec> {
    step.fields
        .iter()
        .filter(|field| is_visible(field, data))
        .collect()
}
