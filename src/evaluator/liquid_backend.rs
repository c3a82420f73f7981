use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use lazy_static::lazy_static;
use serde_json::Value;
use tracing::debug;

use super::{Digest, EvaluatorError, EvaluatorResult, Json, Pluralize, TemplateEvaluator, ToSentence};

lazy_static! {
    /// Stdlib tags and filters plus the notification filters; built once per process
    static ref PARSER: liquid::Parser = liquid::ParserBuilder::with_stdlib()
        .filter(Json)
        .filter(ToSentence)
        .filter(Digest)
        .filter(Pluralize)
        .build()
        .unwrap();
}

/// Evaluator backed by the `liquid` crate.
///
/// Parsed templates are cached by source text. When the cache reaches its
/// capacity it is cleared before the next insert.
pub struct LiquidEvaluator {
    cache: DashMap<String, Arc<liquid::Template>>,
    capacity: usize,
}

impl LiquidEvaluator {
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: DashMap::new(),
            capacity,
        }
    }

    /// Parse without rendering; used to check sources up front
    pub fn parse(&self, source: &str) -> EvaluatorResult<()> {
        self.template(source).map(|_| ())
    }

    pub fn cached_templates(&self) -> usize {
        self.cache.len()
    }

    fn template(&self, source: &str) -> EvaluatorResult<Arc<liquid::Template>> {
        if let Some(template) = self.cache.get(source) {
            return Ok(Arc::clone(template.value()));
        }

        let template = Arc::new(
            PARSER
                .parse(source)
                .map_err(|e| EvaluatorError::Parse(e.to_string()))?,
        );

        if self.capacity > 0 {
            if self.cache.len() >= self.capacity {
                debug!(capacity = self.capacity, "Template cache full, clearing");
                self.cache.clear();
            }
            self.cache.insert(source.to_string(), Arc::clone(&template));
        }
        Ok(template)
    }
}

impl Default for LiquidEvaluator {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl TemplateEvaluator for LiquidEvaluator {
    fn check_syntax(&self, source: &str) -> EvaluatorResult<()> {
        self.parse(source)
    }

    async fn render(&self, source: &str, variables: &Value) -> EvaluatorResult<String> {
        let template = self.template(source)?;
        let globals = match variables {
            Value::Null => liquid::Object::new(),
            other => liquid_core::model::to_object(other)
                .map_err(|e| EvaluatorError::Variables(e.to_string()))?,
        };
        template
            .render(&globals)
            .map_err(|e| EvaluatorError::Render(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_render_with_variables() {
        let evaluator = LiquidEvaluator::default();
        let rendered = evaluator
            .render(
                "Hello {{ payload.name | upcase }}",
                &json!({"payload": {"name": "ada"}}),
            )
            .await
            .unwrap();
        assert_eq!(rendered, "Hello ADA");
    }

    #[tokio::test]
    async fn test_resolve_collection() {
        let evaluator = LiquidEvaluator::default();
        let items = evaluator
            .resolve_collection(
                "payload.items",
                &json!({"payload": {"items": [{"name": "a"}, {"name": "b"}]}}),
            )
            .await
            .unwrap();
        assert_eq!(items, vec![json!({"name": "a"}), json!({"name": "b"})]);
    }

    #[tokio::test]
    async fn test_resolve_collection_rejects_scalars() {
        let evaluator = LiquidEvaluator::default();
        let err = evaluator
            .resolve_collection("payload.name", &json!({"payload": {"name": "ada"}}))
            .await
            .unwrap_err();
        assert!(matches!(err, EvaluatorError::NotAnArray { .. }));
    }

    #[tokio::test]
    async fn test_parse_error() {
        let evaluator = LiquidEvaluator::default();
        let err = evaluator.render("{% if %}", &json!({})).await.unwrap_err();
        assert!(matches!(err, EvaluatorError::Parse(_)));
    }

    #[test]
    fn test_check_syntax_rejects_unknown_tags() {
        let evaluator = LiquidEvaluator::default();
        assert!(evaluator.check_syntax("{{ payload.name | toSentence }}").is_ok());
        let err = evaluator.check_syntax("{% foo %}").unwrap_err();
        assert!(matches!(err, EvaluatorError::Parse(_)));
    }

    #[tokio::test]
    async fn test_notification_filters() {
        let evaluator = LiquidEvaluator::default();
        let variables = json!({
            "payload": {
                "count": 3,
                "one": 1,
                "people": [{"name": "Ada"}, {"name": "Bob"}, {"name": "Cy"}, {"name": "Di"}]
            }
        });

        let rendered = evaluator
            .render("{{ payload.people | toSentence: 'name' }}", &variables)
            .await
            .unwrap();
        assert_eq!(rendered, "Ada, Bob, Cy and Di");

        let rendered = evaluator
            .render("{{ payload.people | toSentence: 'name', 2, 'more' }}", &variables)
            .await
            .unwrap();
        assert_eq!(rendered, "Ada, Bob and 2 more");

        let rendered = evaluator
            .render("{{ payload.people | digest: 3, 'name' }}", &variables)
            .await
            .unwrap();
        assert_eq!(rendered, "Ada, Bob, Cy and 1 other");

        let rendered = evaluator
            .render(
                "{{ payload.count | pluralize: 'item' }} / {{ payload.one | pluralize: 'person', 'people' }}",
                &variables,
            )
            .await
            .unwrap();
        assert_eq!(rendered, "3 items / 1 person");
    }

    #[test]
    fn test_cache_is_bounded() {
        let evaluator = LiquidEvaluator::new(2);
        evaluator.parse("{{ a }}").unwrap();
        evaluator.parse("{{ b }}").unwrap();
        evaluator.parse("{{ a }}").unwrap();
        assert_eq!(evaluator.cached_templates(), 2);
        evaluator.parse("{{ c }}").unwrap();
        assert_eq!(evaluator.cached_templates(), 1);
    }
}
