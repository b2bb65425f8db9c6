use thiserror::Error;

use crate::storage::StorageError;

/// Errors raised while building or driving a form.
#[derive(Debug, Error)]
pub enum FormError {
    #[error("form has no steps")]
    NoSteps,
    #[error("initial step {initial} is out of range for a form with {steps} steps")]
    InitialStepOutOfRange { initial: usize, steps: usize },
    #[error("step {index} is out of range for a form with {steps} steps")]
    StepOutOfRange { index: usize, steps: usize },
    #[error("unknown component '{0}'")]
    UnknownComponent(String),
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("failed to parse form spec: {0}")]
    Parse(#[source] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
