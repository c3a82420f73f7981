//! End-to-end tests for the preview engine
//!
//! These tests exercise analysis, example-data synthesis and rich-document
//! rendering through the public API only.

use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::{json, Value};

use template_preview_engine::analyzer::{AnalysisResult, TemplateAnalyzer};
use template_preview_engine::config::PreviewConfig;
use template_preview_engine::evaluator::{
    EvaluatorError, EvaluatorResult, LiquidEvaluator, TemplateEvaluator,
};
use template_preview_engine::filters::FilterRegistry;
use template_preview_engine::mock::{keys_to_object, ArrayVariable};
use template_preview_engine::preview::{ContentKind, PreviewPipeline};
use template_preview_engine::rich::{DocumentWalker, RichNode};
use template_preview_engine::{is_path_allowed, PreviewError, SchemaNode};

fn analyze(source: &str, schema: Option<&SchemaNode>) -> AnalysisResult {
    let filters = FilterRegistry::with_defaults();
    TemplateAnalyzer::new(schema, &filters).analyze(source)
}

fn assert_disjoint_and_unique(result: &AnalysisResult) {
    let valid = result.valid_names();
    let invalid = result.invalid_names();
    let valid_set: HashSet<&String> = valid.iter().collect();
    let invalid_set: HashSet<&String> = invalid.iter().collect();
    assert_eq!(valid_set.len(), valid.len(), "duplicate valid names");
    assert_eq!(invalid_set.len(), invalid.len(), "duplicate invalid names");
    assert!(valid_set.is_disjoint(&invalid_set));
}

fn texts(node: &RichNode, out: &mut Vec<String>) {
    if let Some(text) = &node.text {
        out.push(text.clone());
    }
    for child in node.content.iter().flatten() {
        texts(child, out);
    }
}

// =============================================================================
// Analyzer
// =============================================================================

mod analyzer_tests {
    use super::*;

    #[test]
    fn test_templates_without_variables_are_empty() {
        for source in ["", "Hello there", "{% if true %}yes{% endif %}", "{{ 'literal' }}"] {
            assert!(analyze(source, None).is_empty(), "{}", source);
        }
    }

    #[test]
    fn test_schema_classification() {
        let schema = SchemaNode::object([(
            "payload",
            SchemaNode::object([("phone", SchemaNode::string())]),
        )]);
        let result = analyze("{{payload.phone}} {{test}}", Some(&schema));
        assert_eq!(result.valid_names(), vec!["payload.phone"]);
        assert_eq!(result.invalid_names(), vec!["test"]);
    }

    #[test]
    fn test_loop_iterator_is_dropped() {
        let result = analyze(
            "{% for item in payload.items %}{{item.name}}{{invalid}}{% endfor %}",
            None,
        );
        assert_eq!(result.valid_names(), vec!["payload.items"]);
        assert_eq!(result.invalid_names(), vec!["invalid"]);
    }

    #[test]
    fn test_deduplication_law() {
        let result = analyze(
            "{{user.name}} {{user.name}} {{payload.name}} {{payload.name}}",
            None,
        );
        assert_eq!(result.valid_names(), vec!["payload.name"]);
        assert_eq!(result.invalid_names(), vec!["user.name"]);
    }

    #[test]
    fn test_lists_are_unique_and_disjoint() {
        let templates = [
            "{{ payload.a }}{% if payload.a and payload.b %}{{ payload.b }}{% endif %}",
            "{% assign x = payload.a %}{{ x }}{{ x.y }}{{ nope }}{{ nope }}",
            "{% case payload.kind %}{% when payload.other %}{{ payload.kind }}{% else %}{{ a }}{% endcase %}",
            "{% for i in (1..payload.count) %}{{ forloop.index }}{{ i }}{% endfor %}{{ payload.count }}",
            "{% capture c %}{{ payload.a | default: payload.fallback }}{% endcapture %}{{ c }}",
        ];
        for source in templates {
            assert_disjoint_and_unique(&analyze(source, None));
        }
    }

    #[test]
    fn test_json_schema_input() {
        let schema = SchemaNode::from_json_schema(&json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "payload": {
                    "type": "object",
                    "additionalProperties": false,
                    "properties": {
                        "items": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "additionalProperties": false,
                                "properties": {"title": {"type": "string"}}
                            }
                        },
                        "meta": {"type": "object"}
                    }
                }
            }
        }))
        .unwrap();

        assert!(is_path_allowed(Some(&schema), "payload.items[0].title"));
        assert!(is_path_allowed(Some(&schema), "payload.items.title"));
        assert!(is_path_allowed(Some(&schema), "payload.meta.anything.deep"));
        assert!(!is_path_allowed(Some(&schema), "payload.items[0].price"));
        assert!(!is_path_allowed(Some(&schema), "payload.missing"));

        let result = analyze(
            "{% for item in payload.items %}{{ item.title }}{% endfor %}{{ payload.items[1].title }}{{ payload.nope }}",
            Some(&schema),
        );
        assert_eq!(result.valid_names(), vec!["payload.items", "payload.items[1].title"]);
        assert_eq!(result.invalid_names(), vec!["payload.nope"]);
    }

    #[test]
    fn test_filter_issue_surfaces_first() {
        let result = analyze("{{ payload.name | default }}", None);
        let variable = &result.invalid_variables[0];
        assert_eq!(variable.name, "payload.name");
        assert!(variable.filter_message.is_some());
        assert_eq!(variable.issue(), variable.filter_message.as_deref());
    }

    #[test]
    fn test_digest_key_path_is_implied() {
        let result = analyze(
            "{{ steps.digest-1.events | toSentence: 'payload.name', 2, 'others' }}",
            None,
        );
        assert_eq!(
            result.valid_names(),
            vec!["steps.digest-1.events", "steps.digest-1.events.payload.name"]
        );
    }

    #[test]
    fn test_syntax_error_is_reported_not_raised() {
        let result = analyze("Hello {{ payload.name", None);
        assert!(result.valid_variables.is_empty());
        assert_eq!(result.invalid_variables.len(), 1);
        assert!(result.invalid_variables[0].message.is_some());
    }
}

// =============================================================================
// Example data
// =============================================================================

mod mock_tests {
    use super::*;

    #[test]
    fn test_array_broadcast_law() {
        let object = keys_to_object(
            &["payload.items[0].name", "payload.items[0].price", "payload.items[1].name"],
            &[ArrayVariable::new("payload.items", 2)],
        );
        let items = object["payload"]["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        for item in items {
            assert_eq!(item["name"], json!("name"));
            assert_eq!(item["price"], json!("price"));
        }
    }

    #[test]
    fn test_prefix_pruning_law() {
        let object = keys_to_object(&["payload", "payload.profile.avatar"], &[]);
        assert!(object["payload"].is_object());
        assert_eq!(object["payload"]["profile"]["avatar"], json!("avatar"));
    }

    #[test]
    fn test_analysis_feeds_builder() {
        let result = analyze(
            "{{ steps.d.events | digest: 2, 'payload.user.name' }} {{ payload.title }}",
            None,
        );
        let object = keys_to_object(&result.valid_names(), &[]);
        let events = object["steps"]["d"]["events"].as_array().unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0]["payload"]["user"]["name"], json!("name"));
        assert_eq!(object["payload"]["title"], json!("title"));
    }
}

// =============================================================================
// Rich documents
// =============================================================================

mod rich_document_tests {
    use super::*;

    fn document() -> String {
        json!({
            "type": "doc",
            "content": [
                {"type": "paragraph", "content": [
                    {"type": "text", "text": "Hi "},
                    {"type": "variable", "attrs": {"id": "payload.name", "fallback": "friend"}}
                ]},
                {"type": "repeat", "attrs": {"each": "payload.items", "iterations": 2}, "content": [
                    {"type": "paragraph", "content": [
                        {"type": "variable", "attrs": {"id": "payload.items.title"}}
                    ]}
                ]},
                {"type": "paragraph", "attrs": {"showIfKey": "payload.vip"}, "content": [
                    {"type": "text", "text": "VIP"}
                ]}
            ]
        })
        .to_string()
    }

    #[test]
    fn test_analyze_rich_document() {
        let pipeline = PreviewPipeline::new(PreviewConfig::default());
        let analysis = pipeline.analyze(&document(), None);

        assert_eq!(analysis.kind, ContentKind::RichDocument);
        let valid: HashSet<String> = analysis.result.valid_names().into_iter().collect();
        for name in ["payload.name", "payload.items", "payload.items.title", "payload.vip"] {
            assert!(valid.contains(name), "missing {}", name);
        }
        assert!(analysis.result.invalid_variables.is_empty());
        assert_eq!(
            analysis.variables,
            json!({"payload": {
                "name": "name",
                "items": [{"title": "title"}, {"title": "title"}],
                "vip": true
            }})
        );
    }

    #[tokio::test]
    async fn test_preview_rich_document() {
        let pipeline = PreviewPipeline::new(PreviewConfig::default());
        let preview = pipeline.preview(&document(), None).await.unwrap();

        let rendered = RichNode::parse(&preview.rendered).unwrap();
        let mut out = Vec::new();
        texts(&rendered, &mut out);
        assert_eq!(out, vec!["Hi ", "name", "title", "title", "VIP"]);
    }

    #[tokio::test]
    async fn test_pruning_leaves_siblings_untouched() {
        let root: RichNode = serde_json::from_value(json!({
            "type": "doc",
            "content": [
                {"type": "paragraph", "attrs": {"showIfKey": "payload.show"},
                 "content": [{"type": "text", "text": "conditional"}]},
                {"type": "paragraph", "attrs": {"textAlign": "center", "data-x": [1, 2]},
                 "content": [{"type": "text", "text": "sibling", "marks": [{"type": "italic"}]}]}
            ]
        }))
        .unwrap();
        let evaluator = LiquidEvaluator::default();
        let variables = json!({"payload": {"show": false}});

        let walked = DocumentWalker::new(&evaluator, &variables)
            .walk(&root)
            .await
            .unwrap();
        let content = walked.content.unwrap();
        assert_eq!(content.len(), 1);
        assert_eq!(
            serde_json::to_value(&content[0]).unwrap(),
            serde_json::to_value(&root.content.as_ref().unwrap()[1]).unwrap()
        );
    }
}

// =============================================================================
// Failure handling
// =============================================================================

mod failure_tests {
    use super::*;

    struct BrokenEvaluator;

    #[async_trait]
    impl TemplateEvaluator for BrokenEvaluator {
        async fn render(&self, _source: &str, _variables: &Value) -> EvaluatorResult<String> {
            Err(EvaluatorError::Render("evaluator offline".to_string()))
        }
    }

    fn repeat_document() -> String {
        json!({
            "type": "doc",
            "content": [{"type": "repeat", "attrs": {"each": "payload.items"}, "content": [
                {"type": "paragraph"}
            ]}]
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_collection_failure_is_fatal() {
        let pipeline = PreviewPipeline::with_evaluator(BrokenEvaluator, PreviewConfig::default());
        let err = pipeline
            .render_document(&repeat_document(), &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, PreviewError::Walk(_)));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_invalid_variable_still_previews() {
        let schema = SchemaNode::object([(
            "payload",
            SchemaNode::object([("name", SchemaNode::string())]),
        )]);
        let pipeline = PreviewPipeline::new(PreviewConfig::default());
        let preview = pipeline
            .preview_or_empty("Hi {{ payload.name }}, {{ payload.age }} {{ nope }}", Some(&schema))
            .await;
        assert_eq!(preview.rendered, "Hi name, age nope");
        assert_eq!(preview.result.valid_names(), vec!["payload.name"]);
        assert_eq!(preview.result.invalid_names(), vec!["payload.age", "nope"]);
        assert_eq!(preview.variables, json!({"payload": {"name": "name"}}));
    }

    #[tokio::test]
    async fn test_digest_template_previews() {
        let pipeline = PreviewPipeline::new(PreviewConfig::default());
        let preview = pipeline
            .preview(
                "{{ steps.d.events | digest: 2, 'payload.user.name' }} ordered {{ payload.count | pluralize: 'item' }}",
                None,
            )
            .await
            .unwrap();
        assert!(preview.render_error.is_none());
        assert_eq!(preview.rendered, "name, name and 1 other ordered 0 items");
    }

    #[tokio::test]
    async fn test_unknown_tag_reported_not_rendered() {
        let pipeline = PreviewPipeline::new(PreviewConfig::default());
        let preview = pipeline
            .preview_or_empty("{{ payload.name }} {% foo %}", None)
            .await;
        assert!(preview.rendered.is_empty());
        assert!(preview.render_error.is_some());
        assert_eq!(preview.result.invalid_variables.len(), 1);
        assert_eq!(preview.result.invalid_variables[0].name, "{% foo %}");
    }

    #[tokio::test]
    async fn test_preview_degrades_to_empty() {
        let pipeline = PreviewPipeline::with_evaluator(BrokenEvaluator, PreviewConfig::default());
        let preview = pipeline.preview_or_empty(&repeat_document(), None).await;
        assert!(preview.rendered.is_empty());
        assert!(preview.result.is_empty());
        assert!(preview.variables.is_null());
    }
}
