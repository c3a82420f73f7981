//! End-to-end preview pipeline.
//!
//! Plain templates go straight to the analyzer. Rich documents are decoded,
//! their dynamic attributes rewritten into output syntax, and the serialized
//! result analyzed as template text. The valid variables then feed the
//! example-object builder, and rendering runs the show/repeat pass before
//! handing the document to the evaluator. Invalid variables get stand-ins
//! at render time only, so a template that references them still previews.

use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::analyzer::{AnalysisResult, TemplateAnalyzer};
use crate::config::{PreviewConfig, Settings};
use crate::error::{PreviewError, Result};
use crate::evaluator::{LiquidEvaluator, TemplateEvaluator};
use crate::filters::FilterRegistry;
use crate::metrics::AnalysisMetrics;
use crate::mock::VariableObjectBuilder;
use crate::rich::{collect_hints, default_rewrite, DocumentHints, DocumentWalker, RichNode, DOC};
use crate::schema::SchemaNode;

/// How the content was interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Text,
    RichDocument,
}

/// Variables discovered in a piece of content plus example data for them
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewAnalysis {
    pub kind: ContentKind,
    #[serde(flatten)]
    pub result: AnalysisResult,
    /// Example object built from the valid variables
    pub variables: Value,
}

/// A rendered preview
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Preview {
    #[serde(flatten)]
    pub result: AnalysisResult,
    pub variables: Value,
    pub rendered: String,
    /// Why rendering failed; the analysis above is still complete
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render_error: Option<String>,
}

pub struct PreviewPipeline<E: TemplateEvaluator = LiquidEvaluator> {
    evaluator: E,
    filters: FilterRegistry,
    config: PreviewConfig,
}

impl PreviewPipeline<LiquidEvaluator> {
    pub fn new(config: PreviewConfig) -> Self {
        let evaluator = LiquidEvaluator::new(config.template_cache_size);
        Self::with_evaluator(evaluator, config)
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.preview.clone())
    }
}

impl Default for PreviewPipeline<LiquidEvaluator> {
    fn default() -> Self {
        Self::new(PreviewConfig::default())
    }
}

impl<E: TemplateEvaluator> PreviewPipeline<E> {
    pub fn with_evaluator(evaluator: E, config: PreviewConfig) -> Self {
        Self {
            evaluator,
            filters: FilterRegistry::with_defaults(),
            config,
        }
    }

    /// Filter validators used during analysis; register custom ones here
    pub fn filters_mut(&mut self) -> &mut FilterRegistry {
        &mut self.filters
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    /// Discover and classify variables, then build example data for them
    pub fn analyze(&self, content: &str, schema: Option<&SchemaNode>) -> PreviewAnalysis {
        let analyzer = TemplateAnalyzer::new(schema, &self.filters)
            .with_options(self.config.analyzer_options());

        let (kind, result, hints) = match decode_document(content) {
            Some(document) => {
                let hints = collect_hints(&document, self.config.default_digest_events);
                let rewritten = default_rewrite(&document, &self.config.translation_namespace);
                // serializing a decoded tree cannot fail
                let source = rewritten.to_json().unwrap_or_default();
                (ContentKind::RichDocument, self.analyze_source(&analyzer, &source), hints)
            }
            None => (
                ContentKind::Text,
                self.analyze_source(&analyzer, content),
                DocumentHints::default(),
            ),
        };

        let variables = VariableObjectBuilder::from_config(&self.config).build(
            &result.valid_names(),
            &hints.array_variables,
            &hints.flag_paths,
        );

        PreviewAnalysis {
            kind,
            result,
            variables,
        }
    }

    fn analyze_source(&self, analyzer: &TemplateAnalyzer<'_>, source: &str) -> AnalysisResult {
        analyzer.analyze_checked(source, |source| {
            self.evaluator
                .check_syntax(source)
                .map_err(|e| e.to_string())
        })
    }

    /// Rewritten, pruned and expanded document tree, ready for rendering
    pub async fn transform_document(&self, document: &RichNode, variables: &Value) -> Result<RichNode> {
        let rewritten = default_rewrite(document, &self.config.translation_namespace);
        let walked = DocumentWalker::new(&self.evaluator, variables)
            .walk(&rewritten)
            .await?;
        Ok(walked)
    }

    /// Render content against `variables`; rich documents are transformed
    /// first and rendered as serialized JSON
    pub async fn render_document(&self, content: &str, variables: &Value) -> Result<String> {
        let source = match decode_document(content) {
            Some(document) => self
                .transform_document(&document, variables)
                .await?
                .to_json()?,
            None => content.to_string(),
        };
        Ok(self.evaluator.render(&source, variables).await?)
    }

    /// Analyze, synthesize example data and render in one go.
    ///
    /// Evaluator failures leave `rendered` empty and are reported in
    /// `render_error`; only walk failures are returned as errors.
    pub async fn preview(&self, content: &str, schema: Option<&SchemaNode>) -> Result<Preview> {
        let started = Instant::now();
        let analysis = self.analyze(content, schema);

        let render_variables = VariableObjectBuilder::from_config(&self.config)
            .with_stand_ins(&analysis.variables, &analysis.result.invalid_names());
        let (rendered, render_error) = match self.render_document(content, &render_variables).await {
            Ok(rendered) => (rendered, None),
            Err(PreviewError::Evaluator(e)) => {
                warn!(error = %e, "Preview render failed, keeping analysis");
                (String::new(), Some(e.to_string()))
            }
            Err(e) => return Err(e),
        };

        AnalysisMetrics::record_pipeline_duration(started.elapsed().as_secs_f64());
        info!(
            kind = ?analysis.kind,
            valid = analysis.result.valid_variables.len(),
            invalid = analysis.result.invalid_variables.len(),
            rendered = render_error.is_none(),
            "Preview rendered"
        );

        Ok(Preview {
            result: analysis.result,
            variables: analysis.variables,
            rendered,
            render_error,
        })
    }

    /// [`preview`](Self::preview), degrading to an empty preview on failure
    pub async fn preview_or_empty(&self, content: &str, schema: Option<&SchemaNode>) -> Preview {
        match self.preview(content, schema).await {
            Ok(preview) => preview,
            Err(e) => {
                warn!(error = %e, fatal = e.is_fatal(), "Preview failed, returning empty result");
                Preview::default()
            }
        }
    }
}

/// A rich document is a JSON object whose root type is `doc`
fn decode_document(content: &str) -> Option<RichNode> {
    if !content.trim_start().starts_with('{') {
        return None;
    }
    RichNode::parse(content).ok().filter(|node| node.kind == DOC)
}
