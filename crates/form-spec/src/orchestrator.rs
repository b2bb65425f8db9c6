//! Multi-step navigation, submission and persistence.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::autofill::{self, VerificationResult};
use crate::check::check_spec;
use crate::error::FormError;
use crate::i18n::{NoopTranslator, Translate};
use crate::render::{RenderPayload, build_render_payload};
use crate::schema;
use crate::spec::field::FieldSpec;
use crate::spec::form::FormSpec;
use crate::spec::step::StepSpec;
use crate::storage::{
    DEFAULT_SENSITIVE_PATTERNS, FormStorage, SensitiveFilter, StorageError, decode_form_data,
    encode_form_data,
};
use crate::validate::{ValidationResult, validate_step};
use crate::visibility;

/// Snapshot of a running form.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormState {
    pub current_step: usize,
    pub form_data: Map<String, Value>,
    pub completed_steps: BTreeSet<usize>,
    pub is_submitting: bool,
}

impl FormState {
    pub fn at_step(step: usize) -> Self {
        Self {
            current_step: step,
            ..Self::default()
        }
    }
}

/// Host hooks fired on navigation and submission.
#[async_trait]
pub trait FormCallbacks: Send + Sync {
    fn on_step_change(&self, _from: usize, _to: usize) {}

    fn on_step_complete(&self, _step_id: &str, _data: &Map<String, Value>) {}

    /// Final submission; an `Err` keeps the form on its last step.
    async fn on_complete(&self, _data: &Map<String, Value>) -> Result<(), String> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCallbacks;

impl FormCallbacks for NoopCallbacks {}

/// Extra check run after a step's schema passes.
#[async_trait]
pub trait StepValidator: Send + Sync {
    async fn validate(&self, data: &Map<String, Value>) -> Result<(), String>;
}

#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("step has {} invalid field(s)", .0.errors.len())]
    Validation(ValidationResult),
    #[error("step '{step}' was rejected: {message}")]
    StepRejected { step: String, message: String },
    #[error("submission failed: {0}")]
    Submission(String),
}

/// Successful outcome of [`MultiStepForm::go_to_next_step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Advanced { from: usize, to: usize },
    Submitted,
}

/// Engine-level knobs that do not belong in the form configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct FormOptions {
    /// Translation namespace consulted after the root lookup.
    pub namespace: Option<String>,
    pub sensitive_patterns: Vec<String>,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            namespace: None,
            sensitive_patterns: DEFAULT_SENSITIVE_PATTERNS
                .iter()
                .map(|pattern| pattern.to_string())
                .collect(),
        }
    }
}

pub struct MultiStepFormBuilder {
    spec: FormSpec,
    options: FormOptions,
    translator: Arc<dyn Translate + Send + Sync>,
    storage: Option<Arc<dyn FormStorage>>,
    callbacks: Box<dyn FormCallbacks>,
    validators: HashMap<String, Box<dyn StepValidator>>,
    resume: Option<FormState>,
}

impl MultiStepFormBuilder {
    pub fn options(mut self, options: FormOptions) -> Self {
        self.options = options;
        self
    }

    pub fn translator(mut self, translator: Arc<dyn Translate + Send + Sync>) -> Self {
        self.translator = translator;
        self
    }

    pub fn storage(mut self, storage: Arc<dyn FormStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn callbacks(mut self, callbacks: impl FormCallbacks + 'static) -> Self {
        self.callbacks = Box::new(callbacks);
        self
    }

    /// Attaches a custom validator to the step with id `step_id`.
    pub fn step_validator(
        mut self,
        step_id: impl Into<String>,
        validator: impl StepValidator + 'static,
    ) -> Self {
        self.validators.insert(step_id.into(), Box::new(validator));
        self
    }

    /// Starts from a previously captured state instead of the initial step.
    ///
    /// Persisted data is not loaded when resuming.
    pub fn resume(mut self, state: FormState) -> Self {
        self.resume = Some(state);
        self
    }

    pub fn build(self) -> Result<MultiStepForm, FormError> {
        let steps = self.spec.steps.len();
        if steps == 0 {
            return Err(FormError::NoSteps);
        }
        if self.spec.initial_step >= steps {
            return Err(FormError::InitialStepOutOfRange {
                initial: self.spec.initial_step,
                steps,
            });
        }
        for issue in check_spec(&self.spec) {
            warn!(step = %issue.step, field = %issue.field, "{}", issue.message);
        }
        for step_id in self.validators.keys() {
            if self.spec.step_index(step_id).is_none() {
                warn!(step = %step_id, "step validator attached to an unknown step");
            }
        }

        let resumed = self.resume.is_some();
        let state = match self.resume {
            Some(mut state) => {
                let out_of_range = std::iter::once(state.current_step)
                    .chain(state.completed_steps.iter().copied())
                    .find(|&index| index >= steps);
                if let Some(index) = out_of_range {
                    return Err(FormError::StepOutOfRange { index, steps });
                }
                // A captured submission never survives into a new instance.
                state.is_submitting = false;
                state
            }
            None => FormState::at_step(self.spec.initial_step),
        };

        let mut form = MultiStepForm {
            state,
            filter: SensitiveFilter::new(self.options.sensitive_patterns.as_slice()),
            spec: self.spec,
            options: self.options,
            translator: self.translator,
            storage: self.storage,
            callbacks: self.callbacks,
            validators: self.validators,
        };
        if form.spec.persist_data
            && !resumed
            && form.storage.is_some()
            && let Err(err) = form.load_form_data()
        {
            warn!(%err, key = %form.spec.persist_key, "failed to restore persisted form data");
        }
        Ok(form)
    }
}

/// Runtime state machine driving one form instance.
pub struct MultiStepForm {
    spec: FormSpec,
    state: FormState,
    options: FormOptions,
    filter: SensitiveFilter,
    translator: Arc<dyn Translate + Send + Sync>,
    storage: Option<Arc<dyn FormStorage>>,
    callbacks: Box<dyn FormCallbacks>,
    validators: HashMap<String, Box<dyn StepValidator>>,
}

impl fmt::Debug for MultiStepForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiStepForm")
            .field("spec", &self.spec)
            .field("state", &self.state)
            .field("options", &self.options)
            .field("validators", &self.validators.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl MultiStepForm {
    pub fn builder(spec: FormSpec) -> MultiStepFormBuilder {
        MultiStepFormBuilder {
            spec,
            options: FormOptions::default(),
            translator: Arc::new(NoopTranslator),
            storage: None,
            callbacks: Box::new(NoopCallbacks),
            validators: HashMap::new(),
            resume: None,
        }
    }

    /// A form with default options, no storage and no callbacks.
    pub fn new(spec: FormSpec) -> Result<Self, FormError> {
        Self::builder(spec).build()
    }

    pub fn spec(&self) -> &FormSpec {
        &self.spec
    }

    pub fn state(&self) -> &FormState {
        &self.state
    }

    pub fn current_step(&self) -> usize {
        self.state.current_step
    }

    pub fn current_step_spec(&self) -> &StepSpec {
        // `current_step` is kept in range by every transition.
        &self.spec.steps[self.state.current_step]
    }

    pub fn form_data(&self) -> &Map<String, Value> {
        &self.state.form_data
    }

    pub fn completed_steps(&self) -> &BTreeSet<usize> {
        &self.state.completed_steps
    }

    pub fn is_submitting(&self) -> bool {
        self.state.is_submitting
    }

    pub fn is_first_step(&self) -> bool {
        self.state.current_step == 0
    }

    pub fn is_last_step(&self) -> bool {
        self.state.current_step + 1 == self.spec.steps.len()
    }

    pub fn can_go_back(&self) -> bool {
        self.spec.allow_back_navigation && !self.is_first_step()
    }

    /// Share of steps completed, as a percentage.
    pub fn progress(&self) -> f64 {
        self.state.completed_steps.len() as f64 / self.spec.steps.len() as f64 * 100.0
    }

    pub fn visible_fields(&self) -> Vec<&FieldSpec> {
        visibility::visible_fields(self.current_step_spec(), &self.state.form_data)
    }

    pub fn render(&self) -> RenderPayload {
        build_render_payload(
            &self.spec,
            &self.state,
            self.translator.as_ref(),
            self.options.namespace.as_deref(),
        )
    }

    /// Shallow-merges `patch` into the form data.
    pub fn update_step_data(&mut self, patch: Map<String, Value>) {
        if patch.is_empty() {
            return;
        }
        self.state.form_data.extend(patch);
        self.persist();
    }

    pub fn update_field(&mut self, field_name: impl Into<String>, value: Value) {
        let mut patch = Map::new();
        patch.insert(field_name.into(), value);
        self.update_step_data(patch);
    }

    pub fn validate_current_step(&self) -> ValidationResult {
        validate_step(
            self.current_step_spec(),
            &self.state.form_data,
            self.translator.as_ref(),
        )
    }

    /// Validates one candidate value without touching the form data.
    pub fn validate_field(
        &self,
        field_name: &str,
        value: &Value,
    ) -> Result<ValidationResult, FormError> {
        let field = self
            .spec
            .all_fields()
            .find(|field| field.field_name == field_name)
            .ok_or_else(|| FormError::UnknownField(field_name.to_string()))?;
        let mut result = ValidationResult::default();
        if let Some(schema) = schema::generate_field(field, self.translator.as_ref())
            && let Err(issues) = schema.parse(Some(value))
        {
            result.extend(issues);
        }
        Ok(result.finish())
    }

    /// Validates the active step and advances, or submits on the last step.
    pub async fn go_to_next_step(&mut self) -> Result<Transition, TransitionError> {
        let from = self.state.current_step;
        let step_id = self.current_step_spec().id.clone();

        let result = self.validate_current_step();
        if !result.valid {
            warn!(step = %step_id, issues = result.errors.len(), "step validation failed");
            return Err(TransitionError::Validation(result));
        }

        if let Some(validator) = self.validators.get(&step_id)
            && let Err(message) = validator.validate(&self.state.form_data).await
        {
            error!(step = %step_id, %message, "custom step validation rejected the transition");
            return Err(TransitionError::StepRejected {
                step: step_id,
                message,
            });
        }

        if !self.is_last_step() {
            let to = from + 1;
            self.callbacks
                .on_step_complete(&step_id, &self.state.form_data);
            self.state.current_step = to;
            self.state.completed_steps.insert(from);
            self.callbacks.on_step_change(from, to);
            debug!(from, to, "advanced to next step");
            return Ok(Transition::Advanced { from, to });
        }

        self.state.is_submitting = true;
        let outcome = self.callbacks.on_complete(&self.state.form_data).await;
        self.state.is_submitting = false;
        match outcome {
            Ok(()) => {
                self.state.completed_steps.insert(from);
                info!(form = ?self.spec.id, "form submitted");
                Ok(Transition::Submitted)
            }
            Err(message) => {
                error!(form = ?self.spec.id, %message, "form submission failed");
                Err(TransitionError::Submission(message))
            }
        }
    }

    /// Steps back once; returns whether the state changed.
    pub fn go_to_previous_step(&mut self) -> bool {
        if !self.can_go_back() {
            return false;
        }
        let from = self.state.current_step;
        self.state.current_step = from - 1;
        self.callbacks.on_step_change(from, from - 1);
        true
    }

    /// Jumps to a completed step or the one directly after the active step.
    pub fn go_to_step(&mut self, index: usize) -> bool {
        let from = self.state.current_step;
        let reachable =
            self.state.completed_steps.contains(&index) || index == from + 1;
        if !reachable || index >= self.spec.steps.len() {
            debug!(from, to = index, "ignoring jump to unreachable step");
            return false;
        }
        if index != from {
            self.state.current_step = index;
            self.callbacks.on_step_change(from, index);
        }
        true
    }

    pub fn complete_current_step(&mut self) {
        self.state.completed_steps.insert(self.state.current_step);
    }

    /// Clears all progress and forgets the persisted entry.
    pub fn reset_form(&mut self) {
        self.state = FormState::at_step(self.spec.initial_step);
        if let Some(storage) = &self.storage
            && let Err(err) = storage.remove(&self.spec.persist_key)
        {
            warn!(%err, key = %self.spec.persist_key, "failed to clear persisted form data");
        }
    }

    /// Applies an approved verification result; returns whether anything changed.
    pub fn apply_autofill(&mut self, result: &VerificationResult) -> bool {
        if !autofill::is_valid(result) {
            debug!(status = %result.status, "ignoring unapproved verification result");
            return false;
        }
        self.update_step_data(autofill::map(result));
        true
    }

    /// Writes the filtered form data to storage.
    pub fn save_form_data(&self) -> Result<(), FormError> {
        let storage = self.storage_or_err()?;
        let encoded = encode_form_data(&self.filter.filter(&self.state.form_data))?;
        storage.set(&self.spec.persist_key, &encoded)?;
        Ok(())
    }

    /// Replaces the form data with the persisted entry, if there is one.
    pub fn load_form_data(&mut self) -> Result<bool, FormError> {
        let key = &self.spec.persist_key;
        let Some(raw) = self.storage_or_err()?.get(key)? else {
            return Ok(false);
        };
        self.state.form_data = decode_form_data(key, &raw)?;
        debug!(key = %key, fields = self.state.form_data.len(), "restored persisted form data");
        Ok(true)
    }

    fn storage_or_err(&self) -> Result<&Arc<dyn FormStorage>, StorageError> {
        self.storage
            .as_ref()
            .ok_or_else(|| StorageError::Unavailable("no storage configured".into()))
    }

    fn persist(&self) {
        if !self.spec.persist_data || self.storage.is_none() {
            return;
        }
        if let Err(err) = self.save_form_data() {
            warn!(%err, key = %self.spec.persist_key, "failed to persist form data");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::validation::{RuleKind, ValidationRule};
    use serde_json::json;

    fn two_step_spec() -> FormSpec {
        let name = FieldSpec::new("name", "Input")
            .with_rules(&[ValidationRule::new(RuleKind::Required)]);
        let email = FieldSpec::new("email", "EmailInput");
        FormSpec::new(vec![
            StepSpec {
                id: "about".into(),
                title: "About".into(),
                description: None,
                fields: vec![name],
            },
            StepSpec {
                id: "contact".into(),
                title: "Contact".into(),
                description: None,
                fields: vec![email],
            },
        ])
    }

    #[test]
    fn construction_rejects_empty_and_out_of_range_specs() {
        assert!(matches!(
            MultiStepForm::new(FormSpec::new(Vec::new())),
            Err(FormError::NoSteps)
        ));
        let mut spec = two_step_spec();
        spec.initial_step = 2;
        assert!(matches!(
            MultiStepForm::new(spec),
            Err(FormError::InitialStepOutOfRange { initial: 2, steps: 2 })
        ));
    }

    #[test]
    fn go_to_step_only_reaches_completed_or_next_steps() {
        let mut spec = two_step_spec();
        spec.steps.push(StepSpec {
            id: "done".into(),
            title: "Done".into(),
            description: None,
            fields: Vec::new(),
        });
        let mut form = MultiStepForm::new(spec).expect("form");
        let before = form.state().clone();
        assert!(!form.go_to_step(2));
        assert_eq!(form.state(), &before);
        assert!(form.go_to_step(1));
        assert_eq!(form.current_step(), 1);
        assert!(!form.go_to_step(0));
        form.complete_current_step();
        assert!(form.go_to_previous_step());
        assert!(form.go_to_step(1));
    }

    #[test]
    fn back_navigation_respects_flag() {
        let mut spec = two_step_spec();
        spec.allow_back_navigation = false;
        spec.initial_step = 1;
        let mut form = MultiStepForm::new(spec).expect("form");
        assert!(!form.go_to_previous_step());
        assert_eq!(form.current_step(), 1);
    }

    #[test]
    fn validate_field_reports_unknown_fields() {
        let form = MultiStepForm::new(two_step_spec()).expect("form");
        assert!(matches!(
            form.validate_field("missing", &json!("x")),
            Err(FormError::UnknownField(_))
        ));
        let result = form.validate_field("email", &json!("nope")).expect("field");
        assert!(!result.valid);
        assert_eq!(result.errors[0].code, "email");
    }

    #[test]
    fn resume_restores_state_and_checks_range() {
        let mut state = FormState::at_step(1);
        state.completed_steps.insert(0);
        state.form_data.insert("name".into(), json!("Ada"));
        let form = MultiStepForm::builder(two_step_spec())
            .resume(state.clone())
            .build()
            .expect("form");
        assert_eq!(form.state(), &state);
        assert!(form.can_go_back());

        let result = MultiStepForm::builder(two_step_spec())
            .resume(FormState::at_step(5))
            .build();
        assert!(matches!(
            result,
            Err(FormError::StepOutOfRange { index: 5, steps: 2 })
        ));
    }

    #[test]
    fn resume_rejects_completed_steps_outside_the_form() {
        let mut state = FormState::at_step(1);
        state.completed_steps.extend([0, 5, 7]);
        let result = MultiStepForm::builder(two_step_spec())
            .resume(state)
            .build();
        assert!(matches!(
            result,
            Err(FormError::StepOutOfRange { index: 5, steps: 2 })
        ));
    }

    #[test]
    fn resume_clears_a_stale_submitting_flag() {
        let mut state = FormState::at_step(1);
        state.is_submitting = true;
        let form = MultiStepForm::builder(two_step_spec())
            .resume(state)
            .build()
            .expect("form");
        assert!(!form.is_submitting());
    }

    #[test]
    fn manual_save_without_storage_is_an_error() {
        let form = MultiStepForm::new(two_step_spec()).expect("form");
        assert!(matches!(
            form.save_form_data(),
            Err(FormError::Storage(StorageError::Unavailable(_)))
        ));
    }
}
