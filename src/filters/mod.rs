//! Structural validation of output filters.
//!
//! Only filters present in the [`FilterRegistry`] are checked; any other
//! filter name passes through untouched. Each validator receives a
//! [`FilterContext`] describing the filtered value, followed by the
//! positional arguments.

use std::collections::HashMap;

use serde::Serialize;

use crate::template::{FilterArg, FilterCall};

/// A structural problem with a filter application
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterIssue {
    pub message: String,
}

impl FilterIssue {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Facts about the value a filter is applied to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterContext {
    /// The value is a collection of objects, so list-formatting filters
    /// need a key path to pick a field from each element
    pub requires_key_path: bool,
}

/// Validator signature: context slot first, then positional arguments
pub type FilterValidatorFn = fn(FilterContext, &[&FilterArg]) -> Vec<FilterIssue>;

/// Filter name → validator
#[derive(Clone)]
pub struct FilterRegistry {
    validators: HashMap<String, FilterValidatorFn>,
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl FilterRegistry {
    /// Registry with no validators; every filter passes
    pub fn empty() -> Self {
        Self {
            validators: HashMap::new(),
        }
    }

    /// Registry with the built-in validators
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry
            .register("digest", validate_digest)
            .register("toSentence", validate_to_sentence)
            .register("pluralize", validate_pluralize)
            .register("default", validate_default)
            .register("truncate", validate_truncate)
            .register("truncatewords", validate_truncate)
            .register("date", validate_date);
        registry
    }

    /// Register (or replace) the validator for a filter name
    pub fn register(&mut self, name: impl Into<String>, validator: FilterValidatorFn) -> &mut Self {
        self.validators.insert(name.into(), validator);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.validators.contains_key(name)
    }

    /// Issues for a single filter application
    pub fn validate(&self, name: &str, context: FilterContext, args: &[FilterArg]) -> Vec<FilterIssue> {
        let Some(validator) = self.validators.get(name) else {
            return Vec::new();
        };
        let positional: Vec<&FilterArg> = args
            .iter()
            .filter(|a| !matches!(a, FilterArg::Keyword(..)))
            .collect();
        validator(context, &positional)
    }

    /// First issue found across a filter chain, in chain order
    pub fn first_issue(&self, filters: &[FilterCall], context: FilterContext) -> Option<FilterIssue> {
        filters
            .iter()
            .find_map(|f| self.validate(&f.name, context, &f.args).into_iter().next())
    }
}

fn is_numeric(arg: &FilterArg) -> bool {
    arg.is_number() || arg.is_variable()
}

fn is_textual(arg: &FilterArg) -> bool {
    arg.as_str().is_some() || arg.is_variable()
}

fn validate_digest(context: FilterContext, args: &[&FilterArg]) -> Vec<FilterIssue> {
    let mut issues = Vec::new();
    if let Some(max_names) = args.first() {
        if !is_numeric(max_names) {
            issues.push(FilterIssue::new(
                "The 'digest' filter expects the number of names to display as its first argument",
            ));
        }
    }
    match args.get(1) {
        Some(key_path) if key_path.as_str().is_none() => issues.push(FilterIssue::new(
            "The 'digest' filter expects a quoted key path as its second argument",
        )),
        None if context.requires_key_path => issues.push(FilterIssue::new(
            "The 'digest' filter requires a key path (e.g. 'payload.name') when applied to events",
        )),
        _ => {}
    }
    issues
}

fn validate_to_sentence(context: FilterContext, args: &[&FilterArg]) -> Vec<FilterIssue> {
    let mut issues = Vec::new();
    match args.first() {
        Some(key_path) if key_path.as_str().is_none() => issues.push(FilterIssue::new(
            "The 'toSentence' filter expects a quoted key path as its first argument",
        )),
        None if context.requires_key_path => issues.push(FilterIssue::new(
            "The 'toSentence' filter requires a key path (e.g. 'payload.name') when applied to events",
        )),
        _ => {}
    }
    if let Some(limit) = args.get(1) {
        if !is_numeric(limit) {
            issues.push(FilterIssue::new(
                "The 'toSentence' filter expects a number as its second argument",
            ));
        }
    }
    issues
}

fn validate_pluralize(_: FilterContext, args: &[&FilterArg]) -> Vec<FilterIssue> {
    match args.first() {
        Some(noun) if is_textual(noun) => Vec::new(),
        _ => vec![FilterIssue::new(
            "The 'pluralize' filter expects the noun to pluralize as its first argument",
        )],
    }
}

fn validate_default(_: FilterContext, args: &[&FilterArg]) -> Vec<FilterIssue> {
    if args.is_empty() {
        vec![FilterIssue::new("The 'default' filter requires a fallback value")]
    } else {
        Vec::new()
    }
}

fn validate_truncate(_: FilterContext, args: &[&FilterArg]) -> Vec<FilterIssue> {
    match args.first() {
        Some(length) if !is_numeric(length) => vec![FilterIssue::new(
            "Truncation filters expect a number as their first argument",
        )],
        _ => Vec::new(),
    }
}

fn validate_date(_: FilterContext, args: &[&FilterArg]) -> Vec<FilterIssue> {
    match args.first() {
        Some(format) if is_textual(format) => Vec::new(),
        _ => vec![FilterIssue::new(
            "The 'date' filter expects a format string as its first argument",
        )],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::split_filters;

    fn first_issue(expression: &str, requires_key_path: bool) -> Option<FilterIssue> {
        let (_, filters) = split_filters(expression);
        FilterRegistry::with_defaults().first_issue(&filters, FilterContext { requires_key_path })
    }

    #[test]
    fn test_unknown_filter_passes() {
        assert!(first_issue("payload.a | shout: 1, 2, 3", false).is_none());
    }

    #[test]
    fn test_valid_filters_pass() {
        assert!(first_issue("payload.a | default: 'x' | truncate: 20 | upcase", false).is_none());
        assert!(first_issue("steps.d.events | toSentence: 'payload.name', 2, 'others'", true).is_none());
        assert!(first_issue("steps.d.events | digest: 2, 'payload.name'", true).is_none());
    }

    #[test]
    fn test_default_without_fallback() {
        let issue = first_issue("payload.a | default", false).unwrap();
        assert!(issue.message.contains("fallback"));
    }

    #[test]
    fn test_to_sentence_key_path_required_for_events() {
        assert!(first_issue("steps.d.events | toSentence", true).is_some());
        assert!(first_issue("payload.names | toSentence", false).is_none());
        assert!(first_issue("steps.d.events | toSentence: 3", true).is_some());
    }

    #[test]
    fn test_digest_arguments() {
        assert!(first_issue("steps.d.events | digest: 'two'", false).is_some());
        assert!(first_issue("steps.d.events | digest: 2", true).is_some());
        assert!(first_issue("steps.d.events | digest: 2, payload.key", false).is_some());
    }

    #[test]
    fn test_only_first_issue_surfaces() {
        let issue = first_issue("payload.a | default | date", false).unwrap();
        assert!(issue.message.contains("'default'"));
    }

    #[test]
    fn test_custom_registration() {
        fn always_fails(_: FilterContext, _: &[&FilterArg]) -> Vec<FilterIssue> {
            vec![FilterIssue::new("nope")]
        }
        let mut registry = FilterRegistry::empty();
        registry.register("shout", always_fails);
        let (_, filters) = split_filters("payload.a | shout");
        assert_eq!(
            registry.first_issue(&filters, FilterContext::default()),
            Some(FilterIssue::new("nope"))
        );
        assert!(!registry.contains("default"));
    }
}
