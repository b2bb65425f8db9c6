use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::debug;

use form_spec::{
    Catalog, Condition, FormError, FormOptions, FormSpec, FormState, MultiStepForm, RenderPayload,
    Transition, TransitionError, VerificationResult, build_render_payload, check_spec,
    render_json_ui as form_render_json_ui, render_text as form_render_text, resolve_visibility,
    schema, validate_form as form_validate_form, validate_step as form_validate_step,
};

const DEFAULT_SPEC: &str = include_str!("../../form-spec/tests/fixtures/onboarding.json");

#[derive(Debug, Error)]
enum ComponentError {
    #[error("failed to parse config/{0}")]
    ConfigParse(#[source] serde_json::Error),
    #[error("failed to parse input: {0}")]
    InputParse(#[source] serde_json::Error),
    #[error("step '{0}' is not part of the form")]
    StepUnavailable(String),
    #[error("json encode error: {0}")]
    JsonEncode(#[source] serde_json::Error),
    #[error(transparent)]
    Form(#[from] FormError),
}

#[derive(Debug, Deserialize, Serialize, Default)]
struct ComponentConfig {
    #[serde(default)]
    form_spec_json: Option<String>,
    /// Nested message catalogue used for labels and validation messages.
    #[serde(default)]
    messages: Option<Value>,
    #[serde(default)]
    namespace: Option<String>,
}

struct Loaded {
    spec: FormSpec,
    catalog: Catalog,
    namespace: Option<String>,
}

fn load(config_json: &str) -> Result<Loaded, ComponentError> {
    let config = if config_json.trim().is_empty() {
        ComponentConfig::default()
    } else {
        serde_json::from_str(config_json).map_err(ComponentError::ConfigParse)?
    };

    let spec_json = config.form_spec_json.as_deref().unwrap_or(DEFAULT_SPEC);
    let spec = serde_json::from_str(spec_json).map_err(ComponentError::ConfigParse)?;
    let catalog = config
        .messages
        .as_ref()
        .map(Catalog::from_value)
        .unwrap_or_default();
    Ok(Loaded {
        spec,
        catalog,
        namespace: config.namespace,
    })
}

fn parse_data(data_json: &str) -> Result<Map<String, Value>, ComponentError> {
    if data_json.trim().is_empty() {
        return Ok(Map::new());
    }
    serde_json::from_str(data_json).map_err(ComponentError::InputParse)
}

/// Missing state, or state without `currentStep`, starts at the form's initial step.
fn parse_state(spec: &FormSpec, state_json: &str) -> Result<FormState, ComponentError> {
    if state_json.trim().is_empty() {
        return Ok(FormState::at_step(spec.initial_step));
    }
    let raw: Value = serde_json::from_str(state_json).map_err(ComponentError::InputParse)?;
    let has_step = raw.get("currentStep").is_some();
    let mut state: FormState = serde_json::from_value(raw).map_err(ComponentError::InputParse)?;
    if !has_step {
        state.current_step = spec.initial_step;
    }
    Ok(state)
}

fn encode<T: Serialize>(value: &T) -> Result<Value, ComponentError> {
    serde_json::to_value(value).map_err(ComponentError::JsonEncode)
}

fn respond(result: Result<Value, ComponentError>) -> String {
    match result {
        Ok(value) => serde_json::to_string(&value).unwrap_or_else(|error| {
            json!({"error": format!("json encode: {}", error)}).to_string()
        }),
        Err(err) => json!({ "error": err.to_string() }).to_string(),
    }
}

fn respond_string(result: Result<String, ComponentError>) -> String {
    match result {
        Ok(value) => value,
        Err(err) => json!({ "error": err.to_string() }).to_string(),
    }
}

fn step_index(spec: &FormSpec, step_id: &str) -> Result<usize, ComponentError> {
    spec.step_index(step_id)
        .ok_or_else(|| ComponentError::StepUnavailable(step_id.to_string()))
}

pub fn describe(config_json: &str) -> String {
    respond(load(config_json).and_then(|loaded| encode(&loaded.spec)))
}

/// Configuration diagnostics; an empty array means the form is clean.
pub fn check(config_json: &str) -> String {
    respond(load(config_json).and_then(|loaded| encode(&check_spec(&loaded.spec))))
}

pub fn step_schema(config_json: &str, step_id: &str, data_json: &str) -> String {
    respond(load(config_json).and_then(|loaded| {
        let index = step_index(&loaded.spec, step_id)?;
        let step = &loaded.spec.steps[index];
        let data = parse_data(data_json)?;
        let visibility = resolve_visibility(step, &data);
        Ok(schema::generate(&step.fields, &loaded.catalog).to_json_schema(Some(&visibility)))
    }))
}

pub fn validate_step(config_json: &str, step_id: &str, data_json: &str) -> String {
    respond(load(config_json).and_then(|loaded| {
        let index = step_index(&loaded.spec, step_id)?;
        let data = parse_data(data_json)?;
        encode(&form_validate_step(
            &loaded.spec.steps[index],
            &data,
            &loaded.catalog,
        ))
    }))
}

pub fn validate_form(config_json: &str, data_json: &str) -> String {
    respond(load(config_json).and_then(|loaded| {
        let data = parse_data(data_json)?;
        encode(&form_validate_form(&loaded.spec, &data, &loaded.catalog))
    }))
}

pub fn validate_field(config_json: &str, field_name: &str, value_json: &str) -> String {
    respond(load(config_json).and_then(|loaded| {
        let value: Value = serde_json::from_str(value_json).map_err(ComponentError::InputParse)?;
        let form = MultiStepForm::builder(loaded.spec)
            .translator(std::sync::Arc::new(loaded.catalog))
            .build()?;
        encode(&form.validate_field(field_name, &value)?)
    }))
}

fn condition_visibility(condition_json: &str, data_json: &str) -> Result<Value, ComponentError> {
    let condition: Condition =
        serde_json::from_str(condition_json).map_err(ComponentError::InputParse)?;
    let data = parse_data(data_json)?;
    Ok(json!({ "visible": condition.evaluate(&data) }))
}

pub fn evaluate_condition(condition_json: &str, data_json: &str) -> String {
    respond(condition_visibility(condition_json, data_json))
}

fn verification_patch(result_json: &str) -> Result<Value, ComponentError> {
    let result: VerificationResult =
        serde_json::from_str(result_json).map_err(ComponentError::InputParse)?;
    Ok(json!({
        "valid": form_spec::autofill::is_valid(&result),
        "patch": form_spec::autofill::map(&result),
    }))
}

/// Maps a verification result into a form-data patch.
pub fn autofill(result_json: &str) -> String {
    respond(verification_patch(result_json))
}

fn render_payload(config_json: &str, state_json: &str) -> Result<RenderPayload, ComponentError> {
    let loaded = load(config_json)?;
    let state = parse_state(&loaded.spec, state_json)?;
    let steps = loaded.spec.steps.len();
    if let Some(index) = std::iter::once(state.current_step)
        .chain(state.completed_steps.iter().copied())
        .find(|&index| index >= steps)
    {
        return Err(FormError::StepOutOfRange { index, steps }.into());
    }
    Ok(build_render_payload(
        &loaded.spec,
        &state,
        &loaded.catalog,
        loaded.namespace.as_deref(),
    ))
}

pub fn render_text(config_json: &str, state_json: &str) -> String {
    respond_string(render_payload(config_json, state_json).map(|payload| form_render_text(&payload)))
}

pub fn render_json_ui(config_json: &str, state_json: &str) -> String {
    respond(render_payload(config_json, state_json).map(|payload| form_render_json_ui(&payload)))
}

/// Merges `patch_json` into the state's data and tries to leave the active step.
///
/// Blocked transitions report `status: "error"` with the validation result;
/// the returned state always reflects the merged data.
pub fn submit_step(config_json: &str, state_json: &str, patch_json: &str) -> String {
    respond(load(config_json).and_then(|loaded| {
        let state = parse_state(&loaded.spec, state_json)?;
        let patch = parse_data(patch_json)?;
        let mut form = MultiStepForm::builder(loaded.spec)
            .translator(std::sync::Arc::new(loaded.catalog))
            .options(FormOptions {
                namespace: loaded.namespace,
                ..FormOptions::default()
            })
            .resume(state)
            .build()?;
        form.update_step_data(patch);

        let outcome = futures::executor::block_on(form.go_to_next_step());
        debug!(step = form.current_step(), ok = outcome.is_ok(), "step submission processed");
        let (status, validation) = match outcome {
            Ok(Transition::Advanced { .. }) => ("need_input", Value::Null),
            Ok(Transition::Submitted) => ("complete", Value::Null),
            Err(TransitionError::Validation(result)) => ("error", encode(&result)?),
            Err(err) => ("error", json!({ "valid": false, "message": err.to_string() })),
        };
        Ok(json!({
            "status": status,
            "state": encode(form.state())?,
            "validation": validation,
        }))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(payload: &str) -> Value {
        serde_json::from_str(payload).expect("json")
    }

    #[test]
    fn describe_returns_default_spec() {
        let spec = parse(&describe(""));
        assert_eq!(spec["id"], "onboarding");
        assert_eq!(spec["steps"].as_array().map(Vec::len), Some(3));
    }

    #[test]
    fn bad_config_is_reported_as_error_object() {
        let response = parse(&describe("{not json"));
        assert!(
            response["error"]
                .as_str()
                .is_some_and(|message| message.starts_with("failed to parse config"))
        );
    }

    #[test]
    fn check_lists_configuration_issues() {
        let spec = json!({
            "steps": [{
                "id": "s",
                "title": "S",
                "fields": [{ "fieldName": "x", "component": "Nope" }]
            }]
        });
        let config = json!({ "form_spec_json": spec.to_string() });
        let issues = parse(&check(&config.to_string()));
        assert_eq!(issues[0]["kind"], "unknown_component");
        assert_eq!(parse(&check("")), json!([]));
    }

    #[test]
    fn step_schema_hides_conditional_fields() {
        let schema = parse(&step_schema("", "account", r#"{"accountType":"personal"}"#));
        assert!(schema["properties"].get("companyName").is_none());
        let schema = parse(&step_schema(
            "",
            "account",
            r#"{"accountType":"business","email":"a@b.io"}"#,
        ));
        assert!(schema["properties"].get("companyName").is_some());
        let missing = parse(&step_schema("", "nope", "{}"));
        assert_eq!(missing["error"], "step 'nope' is not part of the form");
    }

    #[test]
    fn validate_step_reports_missing_required() {
        let result = parse(&validate_step("", "personal", "{}"));
        assert_eq!(result["valid"], false);
        assert_eq!(result["missingRequired"], json!(["fullName", "age"]));
    }

    #[test]
    fn validate_field_uses_translated_messages() {
        let config = json!({ "messages": { "errors": { "required": "Please fill this in" } } });
        let result = parse(&validate_field(&config.to_string(), "fullName", r#""""#));
        assert_eq!(result["errors"][0]["message"], "Please fill this in");
        let unknown = parse(&validate_field("", "ghost", "1"));
        assert_eq!(unknown["error"], "unknown field 'ghost'");
    }

    #[test]
    fn evaluate_condition_returns_visibility() {
        let condition = r#"{"fieldName":"age","operator":"greaterThan","value":18}"#;
        assert_eq!(parse(&evaluate_condition(condition, r#"{"age":20}"#))["visible"], true);
        assert_eq!(parse(&evaluate_condition(condition, "{}"))["visible"], false);
    }

    #[test]
    fn autofill_maps_verification_results() {
        let result = json!({
            "status": "approved",
            "sessionId": "s-1",
            "person": { "firstName": "Ada", "lastName": "Lovelace" }
        });
        let response = parse(&autofill(&result.to_string()));
        assert_eq!(response["valid"], true);
        assert_eq!(response["patch"]["fullName"], "Ada Lovelace");
    }

    #[test]
    fn render_outputs_active_step() {
        let text = render_text("", r#"{"currentStep":1}"#);
        assert!(text.contains("Step 2/3: Account"));
        let ui = parse(&render_json_ui("", "{}"));
        assert_eq!(ui["step"]["id"], "personal");
        let out_of_range = parse(&render_json_ui("", r#"{"currentStep":9}"#));
        assert!(out_of_range["error"].is_string());
    }

    #[test]
    fn submit_step_advances_or_reports_validation() {
        let blocked = parse(&submit_step("", "{}", r#"{"fullName":"Ada"}"#));
        assert_eq!(blocked["status"], "error");
        assert_eq!(blocked["validation"]["missingRequired"], json!(["age"]));
        assert_eq!(blocked["state"]["formData"]["fullName"], "Ada");

        let state = blocked["state"].to_string();
        let advanced = parse(&submit_step("", &state, r#"{"age":33}"#));
        assert_eq!(advanced["status"], "need_input");
        assert_eq!(advanced["state"]["currentStep"], 1);
        assert_eq!(advanced["state"]["completedSteps"], json!([0]));
    }

    fn config_starting_on_second_step() -> String {
        let spec = json!({
            "initialStep": 1,
            "steps": [
                { "id": "a", "title": "A", "fields": [] },
                { "id": "b", "title": "B", "fields": [] },
                { "id": "c", "title": "C", "fields": [] }
            ]
        });
        json!({ "form_spec_json": spec.to_string() }).to_string()
    }

    #[test]
    fn missing_state_starts_at_the_initial_step() {
        let config = config_starting_on_second_step();
        assert!(render_text(&config, "").contains("Step 2/3: B"));
        assert_eq!(parse(&render_json_ui(&config, "{}"))["step"]["id"], "b");

        let submitted = parse(&submit_step(&config, "", "{}"));
        assert_eq!(submitted["status"], "need_input");
        assert_eq!(submitted["state"]["currentStep"], 2);
        assert_eq!(submitted["state"]["completedSteps"], json!([1]));
    }

    #[test]
    fn state_with_foreign_completed_steps_is_rejected() {
        let config = config_starting_on_second_step();
        let state = r#"{"currentStep":0,"completedSteps":[4]}"#;
        assert!(parse(&render_text(&config, state))["error"].is_string());
        assert!(parse(&submit_step(&config, state, "{}"))["error"].is_string());
    }
}
