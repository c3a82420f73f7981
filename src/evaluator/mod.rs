//! Template evaluation boundary.
//!
//! The rich-document walker renders show conditions and repeat collections
//! through a [`TemplateEvaluator`]. [`LiquidEvaluator`] is the production
//! implementation backed by the `liquid` crate; tests may supply their own.

mod filters;
mod liquid_backend;

pub use filters::{Digest, Json, Pluralize, ToSentence};
pub use liquid_backend::LiquidEvaluator;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors raised while parsing or rendering through the evaluator.
#[derive(Debug, Error)]
pub enum EvaluatorError {
    /// The evaluator rejected the template source
    #[error("Template parse error: {0}")]
    Parse(String),

    /// Rendering failed (undefined variable, filter failure, ...)
    #[error("Template render error: {0}")]
    Render(String),

    /// The render context could not be converted
    #[error("Invalid render variables: {0}")]
    Variables(String),

    /// A collection expression rendered to something other than an array
    #[error("Expression '{expression}' did not resolve to an array")]
    NotAnArray { expression: String },

    /// A collection expression rendered to text that is not JSON
    #[error("Expression '{expression}' rendered undecodable output: {source}")]
    Decode {
        expression: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type EvaluatorResult<T> = Result<T, EvaluatorError>;

/// Renders Liquid-family source against a JSON variable context.
#[async_trait]
pub trait TemplateEvaluator: Send + Sync {
    /// Render `source` with `variables` as the global context.
    async fn render(&self, source: &str, variables: &Value) -> EvaluatorResult<String>;

    /// Reject sources this evaluator cannot parse. Accepts everything by
    /// default.
    fn check_syntax(&self, _source: &str) -> EvaluatorResult<()> {
        Ok(())
    }

    /// Resolve a collection expression to its concrete elements.
    ///
    /// The default renders `{{ expression | json }}` and decodes the output.
    async fn resolve_collection(
        &self,
        expression: &str,
        variables: &Value,
    ) -> EvaluatorResult<Vec<Value>> {
        let source = format!("{{{{ {} | json }}}}", expression);
        let rendered = self.render(&source, variables).await?;

        match serde_json::from_str::<Value>(rendered.trim()) {
            Ok(Value::Array(items)) => Ok(items),
            Ok(_) => Err(EvaluatorError::NotAnArray {
                expression: expression.to_string(),
            }),
            Err(source) => Err(EvaluatorError::Decode {
                expression: expression.to_string(),
                source,
            }),
        }
    }
}
