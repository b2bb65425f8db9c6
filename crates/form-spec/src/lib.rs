#![allow(missing_docs)]

pub mod autofill;
pub mod check;
pub mod condition;
pub mod error;
pub mod i18n;
pub mod orchestrator;
pub mod props;
pub mod registry;
pub mod render;
pub mod schema;
pub mod spec;
pub mod storage;
pub mod validate;
pub mod visibility;

pub use autofill::{VerificationResult, VerifiedDocument, VerifiedPerson};
pub use check::{ConfigIssue, ConfigIssueKind, check_spec};
pub use condition::{ComplexCondition, Condition, ConditionRule, Logic, Operator};
pub use error::FormError;
pub use i18n::{Catalog, NoopTranslator, Translate, interpolate, resolve_text};
pub use orchestrator::{
    FormCallbacks, FormOptions, FormState, MultiStepForm, MultiStepFormBuilder, NoopCallbacks,
    StepValidator, Transition, TransitionError,
};
pub use props::merge_props;
pub use registry::{FieldFamily, Widget, WidgetKind};
pub use render::{
    RenderKind, RenderPayload, RenderedField, build_render_payload, render_json_ui, render_text,
};
pub use schema::{BaseType, FieldSchema, StepSchema, generate as step_schema};
pub use spec::{FieldSpec, FormSpec, RuleKind, StepSpec, ValidationRule};
pub use storage::{FileStorage, FormStorage, MemoryStorage, SensitiveFilter, StorageError};
pub use validate::{FieldIssue, ValidationResult, validate_form, validate_step};
pub use visibility::{VisibilityMap, resolve_visibility, visible_fields};
