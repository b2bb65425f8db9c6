mod wizard;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use component_form::{check, step_schema, validate_form, validate_step};
use form_spec::{
    FieldFamily, FileStorage, FormSpec, MultiStepForm, RenderKind, RenderedField, Transition,
    TransitionError, ValidationResult, VerificationResult, render_json_ui, schema::coerce_date,
};
use serde_json::{Map, Number, Value, json};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use wizard::{
    AnswerParseError, PromptContext, Verbosity, WizardPresenter, field_choices, is_multiple,
};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Text-based multi-step form runner",
    long_about = "Runs data-driven multi-step forms interactively and validates, checks and exports their configuration"
)]
struct Cli {
    /// Show verbose output and debug logs.
    #[arg(long, global = true, alias = "debug")]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum RenderMode {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Walk through a form step by step in a text shell.
    Wizard {
        /// Path to the form configuration JSON.
        #[arg(long, value_name = "SPEC")]
        spec: PathBuf,
        /// Optional JSON file with initial form data.
        #[arg(long, value_name = "DATA")]
        data: Option<PathBuf>,
        /// Directory used to persist in-progress form data.
        #[arg(long, value_name = "DIR", env = "STEPFORM_STORAGE_DIR")]
        storage_dir: Option<PathBuf>,
        /// Render output mode for each step.
        #[arg(long, value_enum, default_value_t = RenderMode::Text)]
        format: RenderMode,
    },
    /// Validate form data against a form configuration.
    Validate {
        #[arg(long, value_name = "SPEC")]
        spec: PathBuf,
        #[arg(long, value_name = "DATA")]
        data: PathBuf,
        /// Only validate the step with this id.
        #[arg(long, value_name = "STEP")]
        step: Option<String>,
    },
    /// Print the JSON Schema derived for one step.
    Schema {
        #[arg(long, value_name = "SPEC")]
        spec: PathBuf,
        #[arg(long, value_name = "STEP")]
        step: String,
    },
    /// Report configuration problems such as unknown components.
    Check {
        #[arg(long, value_name = "SPEC")]
        spec: PathBuf,
    },
    /// Print the JSON Schema of the form configuration format.
    SpecSchema,
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Command::Wizard {
            spec,
            data,
            storage_dir,
            format,
        } => run_wizard(spec, data, storage_dir, format, cli.verbose),
        Command::Validate { spec, data, step } => run_validate(spec, data, step),
        Command::Schema { spec, step } => run_schema(spec, step),
        Command::Check { spec } => run_check(spec),
        Command::SpecSchema => run_spec_schema(),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn config_json(spec_path: &Path) -> CliResult<String> {
    let spec_str = fs::read_to_string(spec_path)?;
    Ok(json!({ "form_spec_json": spec_str }).to_string())
}

fn parse_component_result(response: &str) -> CliResult<Value> {
    let value: Value = serde_json::from_str(response)?;
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        Err(error.into())
    } else {
        Ok(value)
    }
}

fn run_validate(spec_path: PathBuf, data_path: PathBuf, step: Option<String>) -> CliResult<()> {
    let config = config_json(&spec_path)?;
    let data = fs::read_to_string(data_path)?;
    let response = match &step {
        Some(step) => validate_step(&config, step, &data),
        None => validate_form(&config, &data),
    };
    let result: ValidationResult = serde_json::from_value(parse_component_result(&response)?)?;

    println!(
        "Validation result: {}",
        if result.valid { "valid" } else { "invalid" }
    );
    describe_validation(&result);

    if result.valid {
        Ok(())
    } else {
        Err("validation failed".into())
    }
}

fn describe_validation(result: &ValidationResult) {
    if !result.errors.is_empty() {
        println!("Errors:");
        for error in &result.errors {
            println!("  {} - {} ({})", error.path, error.message, error.code);
        }
    }
    if !result.missing_required.is_empty() {
        println!(
            "Missing required fields: {}",
            result.missing_required.join(", ")
        );
    }
}

fn run_schema(spec_path: PathBuf, step: String) -> CliResult<()> {
    let config = config_json(&spec_path)?;
    let schema = parse_component_result(&step_schema(&config, &step, "{}"))?;
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

fn run_check(spec_path: PathBuf) -> CliResult<()> {
    let config = config_json(&spec_path)?;
    let issues = parse_component_result(&check(&config))?;
    let issues = issues.as_array().cloned().unwrap_or_default();
    if issues.is_empty() {
        println!("No configuration issues found.");
        return Ok(());
    }
    for issue in &issues {
        println!(
            "  {}/{} [{}] {}",
            issue["step"].as_str().unwrap_or("<unknown>"),
            issue["field"].as_str().unwrap_or("<unknown>"),
            issue["kind"].as_str().unwrap_or("issue"),
            issue["message"].as_str().unwrap_or("")
        );
    }
    Err(format!("{} configuration issue(s) found", issues.len()).into())
}

fn run_spec_schema() -> CliResult<()> {
    let schema = schemars::schema_for!(FormSpec);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

/// One line of wizard input after command handling.
enum Reply {
    Value(Value),
    Verification(Box<VerificationResult>),
    Keep,
    Back,
    Reset,
}

fn run_wizard(
    spec_path: PathBuf,
    data_path: Option<PathBuf>,
    storage_dir: Option<PathBuf>,
    format: RenderMode,
    verbose: bool,
) -> CliResult<()> {
    let spec: FormSpec = serde_json::from_str(&fs::read_to_string(&spec_path)?)?;
    let mut builder = MultiStepForm::builder(spec);
    if let Some(dir) = storage_dir {
        debug!(dir = %dir.display(), "persisting wizard data");
        builder = builder.storage(Arc::new(FileStorage::new(dir)));
    }
    let mut form = builder.build()?;

    if let Some(path) = data_path {
        let data: Map<String, Value> = serde_json::from_str(&fs::read_to_string(path)?)?;
        form.update_step_data(data);
    }

    let mut presenter = WizardPresenter::new(Verbosity::from_verbose(verbose));

    'steps: loop {
        let payload = form.render();
        if let RenderMode::Json = format {
            println!("JSON UI:\n{}", render_json_ui(&payload));
        }
        presenter.show_step(&payload);

        let names = form
            .current_step_spec()
            .fields
            .iter()
            .map(|field| field.field_name.clone())
            .collect::<Vec<_>>();
        let mut index = 0;
        for name in &names {
            // Visibility can change with every answer.
            let payload = form.render();
            let Some(field) = payload
                .fields
                .iter()
                .find(|field| &field.field_name == name)
            else {
                continue;
            };
            if !field.visible || field.kind != RenderKind::Control {
                continue;
            }
            index += 1;
            let total = payload
                .fields
                .iter()
                .filter(|field| field.visible && field.kind == RenderKind::Control)
                .count();
            let prompt = PromptContext::new(field, index, total);

            match prompt_field(&prompt, field, &presenter)? {
                Reply::Value(value) => form.update_field(name.clone(), value),
                Reply::Verification(result) => {
                    if !form.apply_autofill(&result) {
                        eprintln!("Verification was not approved; nothing was filled in.");
                    }
                }
                Reply::Keep => {}
                Reply::Back => {
                    if !form.go_to_previous_step() {
                        eprintln!("Cannot go back from this step.");
                    }
                    continue 'steps;
                }
                Reply::Reset => {
                    form.reset_form();
                    continue 'steps;
                }
            }
        }

        match futures::executor::block_on(form.go_to_next_step()) {
            Ok(Transition::Advanced { from, to }) => {
                debug!(from, to, "wizard advanced");
            }
            Ok(Transition::Submitted) => {
                presenter.show_completion(form.form_data());
                break;
            }
            Err(TransitionError::Validation(result)) => presenter.show_validation(&result),
            Err(err) => {
                warn!(%err, "wizard transition blocked");
                eprintln!("{}", err);
            }
        }
    }

    Ok(())
}

fn prompt_field(
    prompt: &PromptContext,
    field: &RenderedField,
    presenter: &WizardPresenter,
) -> CliResult<Reply> {
    loop {
        presenter.show_prompt(prompt);
        print!("> ");
        io::stdout().flush()?;
        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Err("wizard input ended before the form was completed".into());
        }

        let trimmed = input.trim();
        match trimmed {
            _ if trimmed.eq_ignore_ascii_case("exit") => {
                return Err("wizard aborted by user".into());
            }
            ":back" => return Ok(Reply::Back),
            ":reset" => return Ok(Reply::Reset),
            _ => {}
        }

        if field.family == Some(FieldFamily::IdentityVerification) && !trimmed.is_empty() {
            match parse_verification(trimmed) {
                Ok(result) => return Ok(Reply::Verification(Box::new(result))),
                Err(err) => {
                    presenter.show_parse_error(&err);
                    continue;
                }
            }
        }

        match parse_answer(field, trimmed) {
            Ok(Some(value)) => return Ok(Reply::Value(value)),
            Ok(None) => return Ok(Reply::Keep),
            Err(err) => presenter.show_parse_error(&err),
        }
    }
}

fn parse_verification(raw: &str) -> Result<VerificationResult, AnswerParseError> {
    serde_json::from_str(raw).map_err(|err| {
        AnswerParseError::new(
            "Paste the verification result as JSON.",
            Some(err.to_string()),
        )
    })
}

/// Converts one line of input into a form value; `None` keeps the current value.
fn parse_answer(field: &RenderedField, raw: &str) -> Result<Option<Value>, AnswerParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        if field.current_value.is_some() || !field.required {
            return Ok(None);
        }
        return Err(AnswerParseError::new("This field requires an answer.", None));
    }

    let value = match field.family {
        Some(FieldFamily::Boolean) => parse_boolean(raw)?,
        Some(FieldFamily::Numeric) => parse_number(raw)?,
        Some(FieldFamily::Date) => parse_date(raw)?,
        Some(FieldFamily::DateRange) => parse_date_range(raw)?,
        Some(FieldFamily::ToggleGroup) if is_multiple(field) => Value::Array(
            raw.split(',')
                .map(|part| parse_choice(field, part.trim()))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Some(FieldFamily::Choice | FieldFamily::ToggleGroup) => parse_choice(field, raw)?,
        _ => Value::String(raw.to_string()),
    };
    Ok(Some(value))
}

fn parse_boolean(raw: &str) -> Result<Value, AnswerParseError> {
    match raw.to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Ok(Value::Bool(true)),
        "false" | "f" | "no" | "n" | "0" => Ok(Value::Bool(false)),
        _ => Err(AnswerParseError::new(
            "Please enter yes or no.",
            Some("expected boolean (y/n/true/false)".to_string()),
        )),
    }
}

fn parse_number(raw: &str) -> Result<Value, AnswerParseError> {
    if let Ok(integer) = raw.parse::<i64>() {
        return Ok(Value::Number(Number::from(integer)));
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| {
            AnswerParseError::new(
                "Please enter a number.",
                Some("expected finite number".to_string()),
            )
        })
}

fn parse_date(raw: &str) -> Result<Value, AnswerParseError> {
    let value = Value::String(raw.to_string());
    if coerce_date(&value).is_some() {
        Ok(value)
    } else {
        Err(AnswerParseError::new(
            "Please enter a date.",
            Some("expected YYYY-MM-DD".to_string()),
        ))
    }
}

fn parse_date_range(raw: &str) -> Result<Value, AnswerParseError> {
    let (from, to) = raw.split_once("..").unwrap_or((raw, ""));
    let mut range = Map::new();
    range.insert("from".into(), parse_date(from.trim())?);
    if !to.trim().is_empty() {
        range.insert("to".into(), parse_date(to.trim())?);
    }
    Ok(Value::Object(range))
}

fn parse_choice(field: &RenderedField, raw: &str) -> Result<Value, AnswerParseError> {
    let allowed = field_choices(field);
    if allowed.is_empty() {
        return Ok(Value::String(raw.to_string()));
    }
    allowed
        .iter()
        .find(|choice| choice.eq_ignore_ascii_case(raw))
        .map(|choice| Value::String(choice.clone()))
        .ok_or_else(|| {
            AnswerParseError::new(
                format!("Choose one of: {}.", allowed.join(", ")),
                Some(format!("allowed values: {}", allowed.join(", "))),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use form_spec::{FormSpec, FormState, NoopTranslator, build_render_payload};

    fn field(component: &str, props: Value) -> RenderedField {
        let spec: FormSpec = serde_json::from_value(json!({
            "steps": [{
                "id": "s",
                "title": "S",
                "fields": [{ "fieldName": "f", "component": component, "props": props }]
            }]
        }))
        .expect("spec");
        build_render_payload(&spec, &FormState::default(), &NoopTranslator, None)
            .fields
            .remove(0)
    }

    #[test]
    fn parse_answer_boolean_accepts_yes() {
        let checkbox = field("Checkbox", json!({}));
        assert_eq!(
            parse_answer(&checkbox, "yes").unwrap(),
            Some(Value::Bool(true))
        );
        assert!(parse_answer(&checkbox, "maybe").is_err());
    }

    #[test]
    fn parse_answer_numbers_prefer_integers() {
        let slider = field("Slider", json!({}));
        assert_eq!(parse_answer(&slider, "42").unwrap(), Some(json!(42)));
        assert_eq!(parse_answer(&slider, "4.5").unwrap(), Some(json!(4.5)));
    }

    #[test]
    fn parse_answer_choice_checks_options() {
        let select = field(
            "Select",
            json!({ "options": [{ "label": "Alpha", "value": "alpha" }, "beta"] }),
        );
        assert!(parse_answer(&select, "gamma").is_err());
        assert_eq!(parse_answer(&select, "BETA").unwrap(), Some(json!("beta")));
    }

    #[test]
    fn parse_answer_multiple_toggle_yields_array() {
        let toggle = field(
            "ToggleGroup",
            json!({ "type": "multiple", "options": ["a", "b", "c"] }),
        );
        assert_eq!(
            parse_answer(&toggle, "a, c").unwrap(),
            Some(json!(["a", "c"]))
        );
    }

    #[test]
    fn parse_answer_date_range_splits_bounds() {
        let range = field("DateRangePicker", json!({}));
        assert_eq!(
            parse_answer(&range, "2024-01-01..2024-01-31").unwrap(),
            Some(json!({ "from": "2024-01-01", "to": "2024-01-31" }))
        );
        assert!(parse_answer(&field("DatePicker", json!({})), "soon").is_err());
    }

    #[test]
    fn parse_answer_requires_input_for_required_fields() {
        let required = field("Input", json!({ "validations": [{ "type": "required" }] }));
        assert!(parse_answer(&required, "").is_err());
        let optional = field("Input", json!({}));
        assert_eq!(parse_answer(&optional, "").unwrap(), None);
    }

    #[test]
    fn prompt_shows_current_multi_value_as_list() {
        let spec: FormSpec = serde_json::from_value(json!({
            "steps": [{
                "id": "s",
                "title": "S",
                "fields": [{
                    "fieldName": "tags",
                    "component": "ToggleGroup",
                    "props": { "type": "multiple", "options": ["a", "b", "c"] }
                }]
            }]
        }))
        .expect("spec");
        let mut state = FormState::default();
        state.form_data.insert("tags".into(), json!(["a", "c"]));
        let payload = build_render_payload(&spec, &state, &NoopTranslator, None);

        let prompt = PromptContext::new(&payload.fields[0], 1, 1);
        assert_eq!(prompt.current.as_deref(), Some("a, c"));
        assert_eq!(prompt.hint.as_deref(), Some("(comma separated: a/b/c)"));
    }
}
