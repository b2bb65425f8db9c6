pub mod field;
pub mod form;
pub mod step;
pub mod validation;

pub use field::FieldSpec;
pub use form::{DEFAULT_PERSIST_KEY, FormSpec};
pub use step::StepSpec;
pub use validation::{RuleKind, ValidationRule};
