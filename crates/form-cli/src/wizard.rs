use form_spec::render::value_to_display;
use form_spec::{FieldFamily, RenderKind, RenderPayload, RenderedField, ValidationResult};
use serde_json::{Map, Value};

/// Controls which bits of state the wizard prints.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Verbosity {
    /// Clean output: field prompts only.
    Clean,
    /// Verbose output: progress, visible fields, error details.
    Verbose,
}

impl Verbosity {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Clean
        }
    }

    pub fn is_verbose(&self) -> bool {
        matches!(self, Verbosity::Verbose)
    }
}

/// Prints step headers, prompts and validation feedback.
pub struct WizardPresenter {
    verbosity: Verbosity,
    header_printed: bool,
}

impl WizardPresenter {
    pub fn new(verbosity: Verbosity) -> Self {
        Self {
            verbosity,
            header_printed: false,
        }
    }

    pub fn show_step(&mut self, payload: &RenderPayload) {
        if !self.header_printed {
            if let Some(title) = &payload.form_title {
                println!("Form: {}", title);
            }
            println!("Commands: :back, :reset, exit");
            self.header_printed = true;
        }
        println!(
            "Step {}/{}: {}",
            payload.step_index + 1,
            payload.total_steps,
            payload.step_title
        );
        if let Some(description) = &payload.step_description {
            println!("{}", description);
        }
        if self.verbosity.is_verbose() {
            println!("Completed steps: {:?}", payload.completed_steps);
            for field in payload.fields.iter().filter(|field| field.visible) {
                println!(" - {} [{}]", field.field_name, field.kind.as_str());
            }
        }
        for field in payload.fields.iter().filter(|field| field.visible) {
            match field.kind {
                RenderKind::Unknown => {
                    eprintln!("Skipping unknown component: {}", field.component)
                }
                RenderKind::Static => {
                    if let Some(label) = &field.label {
                        println!("{}", label);
                    }
                }
                RenderKind::Control => {}
            }
        }
    }

    pub fn show_prompt(&self, prompt: &PromptContext) {
        let mut line = format!("{}/{} {}", prompt.index, prompt.total, prompt.title);
        if prompt.required {
            line.push_str(" *");
        }
        if let Some(hint) = &prompt.hint {
            line.push(' ');
            line.push_str(hint);
        }
        if let Some(current) = &prompt.current {
            line.push_str(&format!(" [{}]", current));
        }
        println!("{}", line);
        if let Some(description) = &prompt.description {
            println!("{}", description);
        }
        if self.verbosity.is_verbose() && !prompt.choices.is_empty() {
            println!("Choices: {}", prompt.choices.join(", "));
        }
    }

    pub fn show_parse_error(&self, error: &AnswerParseError) {
        eprintln!("Invalid answer: {}", error.user_message);
        if self.verbosity.is_verbose()
            && let Some(debug) = &error.debug_message
        {
            eprintln!("  Expected: {}", debug);
        }
    }

    pub fn show_validation(&self, result: &ValidationResult) {
        if !result.errors.is_empty() {
            eprintln!("Validation errors:");
            for error in &result.errors {
                eprintln!("  {}: {}", error.path, error.message);
            }
        }
        if !result.missing_required.is_empty() {
            eprintln!(
                "Missing required fields: {}",
                result.missing_required.join(", ")
            );
        }
    }

    pub fn show_completion(&self, data: &Map<String, Value>) {
        println!("Done ✅");
        match serde_json::to_string_pretty(data) {
            Ok(pretty) => println!("{}", pretty),
            Err(err) => eprintln!("Failed to serialize form data to JSON: {}", err),
        }
    }
}

/// Context used to format a single prompt.
pub struct PromptContext {
    pub index: usize,
    pub total: usize,
    pub title: String,
    pub description: Option<String>,
    pub required: bool,
    pub hint: Option<String>,
    pub choices: Vec<String>,
    pub current: Option<String>,
}

impl PromptContext {
    pub fn new(field: &RenderedField, index: usize, total: usize) -> Self {
        let choices = field_choices(field);
        Self {
            index,
            total,
            title: field
                .label
                .clone()
                .unwrap_or_else(|| field.field_name.clone()),
            description: field.description.clone(),
            required: field.required,
            hint: field_hint(field, &choices),
            current: field.current_value.as_ref().map(value_to_display),
            choices,
        }
    }
}

/// Option values offered by a choice or toggle field.
pub fn field_choices(field: &RenderedField) -> Vec<String> {
    field
        .props
        .get("options")
        .and_then(Value::as_array)
        .map(|options| {
            options
                .iter()
                .filter_map(|option| match option {
                    Value::String(value) => Some(value.clone()),
                    Value::Object(map) => map
                        .get("value")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

fn field_hint(field: &RenderedField, choices: &[String]) -> Option<String> {
    match field.family? {
        FieldFamily::Boolean => Some("(yes/no)".to_string()),
        FieldFamily::Numeric => Some("(number)".to_string()),
        FieldFamily::Date => Some("(YYYY-MM-DD)".to_string()),
        FieldFamily::DateRange => Some("(YYYY-MM-DD..YYYY-MM-DD)".to_string()),
        FieldFamily::IdentityVerification => Some("(verification result JSON)".to_string()),
        FieldFamily::ToggleGroup if is_multiple(field) => {
            Some(format!("(comma separated: {})", choices.join("/")))
        }
        FieldFamily::Choice | FieldFamily::ToggleGroup if !choices.is_empty() => {
            Some(format!("({})", choices.join("/")))
        }
        _ => None,
    }
}

pub fn is_multiple(field: &RenderedField) -> bool {
    field.props.get("type").and_then(Value::as_str) == Some("multiple")
}

/// Error produced when parsing answers from the user.
#[derive(Debug)]
pub struct AnswerParseError {
    pub user_message: String,
    pub debug_message: Option<String>,
}

impl AnswerParseError {
    pub fn new(user_message: impl Into<String>, debug_message: Option<String>) -> Self {
        Self {
            user_message: user_message.into(),
            debug_message,
        }
    }
}
