use thiserror::Error;

use crate::evaluator::EvaluatorError;
use crate::rich::WalkError;
use crate::schema::SchemaError;
use crate::telemetry::TelemetryError;

#[derive(Error, Debug)]
pub enum PreviewError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Evaluator error: {0}")]
    Evaluator(#[from] EvaluatorError),

    #[error("Rich document error: {0}")]
    Walk(#[from] WalkError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
}

impl PreviewError {
    /// Faults after which no partial preview can be produced.
    ///
    /// Syntax faults and schema mismatches never reach this type; they are
    /// reported as invalid variables.
    pub fn is_fatal(&self) -> bool {
        match self {
            PreviewError::Walk(_) | PreviewError::Evaluator(_) | PreviewError::Schema(_) => true,
            PreviewError::Config(_) | PreviewError::Telemetry(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PreviewError>;
