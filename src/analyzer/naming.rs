//! Validity policy for discovered variable names

use lazy_static::lazy_static;
use regex::Regex;

use super::scope::LocalScope;
use super::AnalyzerOptions;
use crate::schema::{is_path_allowed, split_path, SchemaNode};

lazy_static! {
    /// Namespaces that accept arbitrary keys when no schema is supplied
    static ref DYNAMIC_PATH: Regex = Regex::new(
        r"^(?:subscriber\.data\.|payload\.|steps\.[^.\[\]]+\.events(?:\[\d+\])?\.payload\.)"
    )
    .unwrap();
    static ref EVENTS_COLLECTION: Regex = Regex::new(r"^steps\.[^.\[\]]+\.events$").unwrap();
    static ref PROPERTY_CHAIN: Regex =
        Regex::new(r"^[A-Za-z_][\w-]*(?:\.[A-Za-z_][\w-]*)*$").unwrap();
}

/// Outcome of checking one variable name
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Verdict {
    /// Bound by the template itself; never reported
    Local,
    Valid,
    Invalid(String),
}

/// `steps.<stepId>.events`, the digest events collection of a step
pub fn is_events_collection(name: &str) -> bool {
    EVENTS_COLLECTION.is_match(name)
}

/// Paths under a namespace that is open without a schema
pub fn is_dynamic_path(name: &str) -> bool {
    DYNAMIC_PATH.is_match(name)
}

/// A quoted filter argument that reads like `payload.name`
pub fn is_property_chain(value: &str) -> bool {
    PROPERTY_CHAIN.is_match(value)
}

pub(crate) struct NamePolicy<'a> {
    pub schema: Option<&'a SchemaNode>,
    pub options: &'a AnalyzerOptions,
}

impl NamePolicy<'_> {
    pub fn judge(&self, name: &str, scope: &LocalScope) -> Verdict {
        if scope.binds(name) {
            return Verdict::Local;
        }

        let translation_prefix = format!("{}.", self.options.translation_namespace);
        if name.starts_with(&translation_prefix) {
            return Verdict::Valid;
        }

        let Some(segments) = split_path(name) else {
            return Verdict::Invalid(format!("'{}' is not a valid variable path", name));
        };

        if segments.len() == 1 {
            if name == self.options.content_placeholder {
                return Verdict::Valid;
            }
            let mut message = format!("Variable '{}' must be namespaced", name);
            if self.options.suggest_payload_namespace {
                message.push_str(&format!(", did you mean 'payload.{}'?", name));
            }
            return Verdict::Invalid(message);
        }

        match self.schema {
            None if is_dynamic_path(name) || is_events_collection(name) => Verdict::Valid,
            None => Verdict::Invalid(format!(
                "Variable '{}' is not available; use the 'payload' or 'subscriber.data' namespace",
                name
            )),
            Some(schema) if is_path_allowed(Some(schema), name) => Verdict::Valid,
            Some(_) => Verdict::Invalid(format!(
                "Variable '{}' is not defined in the variable schema",
                name
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn judge(name: &str, schema: Option<&SchemaNode>) -> Verdict {
        let options = AnalyzerOptions::default();
        NamePolicy {
            schema,
            options: &options,
        }
        .judge(name, &LocalScope::new())
    }

    #[test]
    fn test_single_segment_names() {
        assert_eq!(judge("content", None), Verdict::Valid);
        match judge("name", None) {
            Verdict::Invalid(message) => assert!(message.contains("payload.name")),
            other => panic!("unexpected verdict {:?}", other),
        }
    }

    #[test]
    fn test_dynamic_paths_without_schema() {
        assert_eq!(judge("payload.order.id", None), Verdict::Valid);
        assert_eq!(judge("subscriber.data.plan", None), Verdict::Valid);
        assert_eq!(judge("steps.digest-1.events", None), Verdict::Valid);
        assert_eq!(judge("steps.digest-1.events[0].payload.name", None), Verdict::Valid);
        assert!(matches!(judge("subscriber.firstName", None), Verdict::Invalid(_)));
        assert!(matches!(judge("user.name", None), Verdict::Invalid(_)));
    }

    #[test]
    fn test_translation_names_always_valid() {
        let schema = SchemaNode::object([("payload", SchemaNode::string())]);
        assert_eq!(judge("t.welcome.title", Some(&schema)), Verdict::Valid);
    }

    #[test]
    fn test_local_names_are_skipped() {
        let options = AnalyzerOptions::default();
        let policy = NamePolicy {
            schema: None,
            options: &options,
        };
        assert_eq!(
            policy.judge("item.name", &LocalScope::new().with("item")),
            Verdict::Local
        );
    }

    #[test]
    fn test_property_chain() {
        assert!(is_property_chain("payload.name"));
        assert!(is_property_chain("name"));
        assert!(!is_property_chain("a b"));
        assert!(!is_property_chain("payload."));
    }
}
