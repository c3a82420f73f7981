// Ambient layer (shared components)
pub mod config;
pub mod error;
pub mod metrics;
pub mod telemetry;

// Template analysis
pub mod analyzer;
pub mod filters;
pub mod schema;
pub mod template;

// Rendering and example data
pub mod evaluator;
pub mod mock;
pub mod preview;
pub mod rich;

pub use analyzer::{AnalysisResult, TemplateAnalyzer, Variable};
pub use error::{PreviewError, Result};
pub use preview::{Preview, PreviewAnalysis, PreviewPipeline};
pub use schema::{is_path_allowed, SchemaNode};
