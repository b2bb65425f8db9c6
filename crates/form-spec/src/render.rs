use serde_json::{Map, Value, json};
use tracing::warn;

use crate::{
    i18n::{Translate, resolve_text},
    orchestrator::FormState,
    props::merge_props,
    registry::{self, FieldFamily},
    schema,
    spec::{field::FieldSpec, form::FormSpec},
    visibility::{is_visible, resolve_visibility},
};

/// How a field ends up on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderKind {
    /// Value-bearing control bound to form data.
    Control,
    /// Display or action element with no form value.
    Static,
    /// Inline placeholder for an unregistered component.
    Unknown,
}

impl RenderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderKind::Control => "control",
            RenderKind::Static => "static",
            RenderKind::Unknown => "unknown",
        }
    }
}

/// One field of the active step, resolved for display.
#[derive(Debug, Clone)]
pub struct RenderedField {
    pub field_name: String,
    pub component: String,
    pub kind: RenderKind,
    pub family: Option<FieldFamily>,
    pub visible: bool,
    pub required: bool,
    pub label: Option<String>,
    pub placeholder: Option<String>,
    pub description: Option<String>,
    pub props: Map<String, Value>,
    pub current_value: Option<Value>,
}

/// Collected payload used by both text and JSON renderers.
#[derive(Debug, Clone)]
pub struct RenderPayload {
    pub form_id: Option<String>,
    pub form_title: Option<String>,
    pub step_id: String,
    pub step_title: String,
    pub step_description: Option<String>,
    pub step_index: usize,
    pub total_steps: usize,
    pub completed_steps: Vec<usize>,
    pub is_submitting: bool,
    pub fields: Vec<RenderedField>,
    pub schema: Value,
}

/// Build the renderer payload for the step `state` points at.
pub fn build_render_payload(
    spec: &FormSpec,
    state: &FormState,
    translator: &dyn Translate,
    namespace: Option<&str>,
) -> RenderPayload {
    let step = spec.step(state.current_step);
    if step.is_none() {
        warn!(step = state.current_step, steps = spec.steps.len(), "rendering a step that does not exist");
    }
    let data = &state.form_data;

    let (fields, schema) = match step {
        Some(step) => {
            let fields = step
                .fields
                .iter()
                .map(|field| render_field(field, data, translator, namespace))
                .collect();
            let visibility = resolve_visibility(step, data);
            let schema = schema::generate(&step.fields, translator).to_json_schema(Some(&visibility));
            (fields, schema)
        }
        None => (Vec::new(), json!({ "type": "object", "properties": {} })),
    };

    RenderPayload {
        form_id: spec.id.clone(),
        form_title: spec.title.clone(),
        step_id: step.map(|step| step.id.clone()).unwrap_or_default(),
        step_title: step.map(|step| step.title.clone()).unwrap_or_default(),
        step_description: step.and_then(|step| step.description.clone()),
        step_index: state.current_step,
        total_steps: spec.steps.len(),
        completed_steps: state.completed_steps.iter().copied().collect(),
        is_submitting: state.is_submitting,
        fields,
        schema,
    }
}

fn render_field(
    field: &FieldSpec,
    data: &Map<String, Value>,
    translator: &dyn Translate,
    namespace: Option<&str>,
) -> RenderedField {
    let visible = is_visible(field, data);
    let widget = registry::get(&field.component);
    let props = match widget {
        Some(widget) => merge_props(widget.default_props(), &field.props),
        None => field.props.clone(),
    };
    let text = |key: &str, fallback: &str| {
        resolve_text(
            translator,
            props.get(key).and_then(Value::as_str),
            namespace,
            props.get(fallback).and_then(Value::as_str),
        )
    };

    let kind = match widget {
        None => RenderKind::Unknown,
        Some(widget) if widget.binds_value() => RenderKind::Control,
        Some(_) => RenderKind::Static,
    };
    let bound = visible && kind == RenderKind::Control;
    let required = kind == RenderKind::Control
        && schema::generate_field(field, translator).is_some_and(|schema| schema.is_required());

    RenderedField {
        field_name: field.field_name.clone(),
        component: field.component.clone(),
        kind,
        family: widget.map(|widget| widget.family),
        visible,
        required,
        label: text("labelKey", "label"),
        placeholder: text("placeholderKey", "placeholder"),
        description: text("descriptionKey", "description"),
        current_value: bound
            .then(|| data.get(&field.field_name).cloned())
            .flatten(),
        props,
    }
}

/// Render the payload as a structured JSON-friendly value.
pub fn render_json_ui(payload: &RenderPayload) -> Value {
    let fields = payload
        .fields
        .iter()
        .map(|field| {
            let mut map = Map::new();
            map.insert("fieldName".into(), Value::String(field.field_name.clone()));
            map.insert("component".into(), Value::String(field.component.clone()));
            map.insert("kind".into(), Value::String(field.kind.as_str().into()));
            map.insert("visible".into(), Value::Bool(field.visible));
            map.insert("required".into(), Value::Bool(field.required));
            for (key, text) in [
                ("label", &field.label),
                ("placeholder", &field.placeholder),
                ("description", &field.description),
            ] {
                if let Some(text) = text {
                    map.insert(key.into(), Value::String(text.clone()));
                }
            }
            if field.kind == RenderKind::Unknown {
                map.insert(
                    "error".into(),
                    Value::String(format!("unknown component: {}", field.component)),
                );
            }
            if let Some(value) = &field.current_value {
                map.insert("value".into(), value.clone());
            }
            map.insert("props".into(), Value::Object(field.props.clone()));
            Value::Object(map)
        })
        .collect::<Vec<_>>();

    json!({
        "formId": payload.form_id,
        "formTitle": payload.form_title,
        "step": {
            "id": payload.step_id,
            "title": payload.step_title,
            "description": payload.step_description,
            "index": payload.step_index,
            "total": payload.total_steps,
        },
        "completedSteps": payload.completed_steps,
        "isSubmitting": payload.is_submitting,
        "fields": fields,
        "schema": payload.schema,
    })
}

/// Render the payload as human-friendly text.
pub fn render_text(payload: &RenderPayload) -> String {
    let mut lines = Vec::new();
    if let Some(title) = &payload.form_title {
        lines.push(format!("Form: {}", title));
    }
    lines.push(format!(
        "Step {}/{}: {}",
        payload.step_index + 1,
        payload.total_steps,
        payload.step_title
    ));
    if let Some(description) = &payload.step_description {
        lines.push(format!("  {}", description));
    }
    if payload.is_submitting {
        lines.push("Submitting...".to_string());
    }

    for field in payload.fields.iter().filter(|field| field.visible) {
        let title = field.label.as_deref().unwrap_or(&field.field_name);
        match field.kind {
            RenderKind::Unknown => {
                lines.push(format!(" ! unknown component: {}", field.component));
            }
            RenderKind::Static => {
                lines.push(format!(" * {}", title));
            }
            RenderKind::Control => {
                let mut entry = format!(" - {} ({})", title, field.field_name);
                if field.required {
                    entry.push_str(" [required]");
                }
                if let Some(value) = &field.current_value {
                    entry.push_str(&format!(" = {}", value_to_display(value)));
                }
                lines.push(entry);
                if let Some(description) = &field.description {
                    lines.push(format!("     {}", description));
                }
            }
        }
    }

    lines.join("\n")
}

/// Plain-text form of a value; arrays become comma separated lists.
pub fn value_to_display(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(num) => num.to_string(),
        Value::Array(items) => items
            .iter()
            .map(value_to_display)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}
