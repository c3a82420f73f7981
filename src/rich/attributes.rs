//! Attribute-to-output rewrite

use serde_json::Value;

use super::{RichKind, RichNode, BUTTON, EACH_KEY, SHOW_IF_KEY};

/// An attribute rewritten into output syntax when `flag` is truthy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributePair {
    pub attribute: &'static str,
    pub flag: &'static str,
}

const fn pair(attribute: &'static str, flag: &'static str) -> AttributePair {
    AttributePair { attribute, flag }
}

const VARIABLE_ATTRIBUTES: &[AttributePair] = &[pair("id", "id")];

const BUTTON_ATTRIBUTES: &[AttributePair] = &[
    pair("text", "isTextVariable"),
    pair("url", "isUrlVariable"),
];

const IMAGE_ATTRIBUTES: &[AttributePair] = &[
    pair("src", "isSrcVariable"),
    pair("externalLink", "isExternalLinkVariable"),
];

const LINK_ATTRIBUTES: &[AttributePair] = &[pair("href", "isUrlVariable")];

/// Pairs checked on every node. The attribute is its own flag.
pub const COMMON_ATTRIBUTES: &[AttributePair] =
    &[pair(SHOW_IF_KEY, SHOW_IF_KEY), pair(EACH_KEY, EACH_KEY)];

/// Flags kept after rewriting so later passes still see variable, show and
/// repeat semantics
pub const FIRST_CLASS_FLAGS: &[&str] = &["id", SHOW_IF_KEY, EACH_KEY];

/// Type-specific pairs for a node kind
pub fn attribute_pairs(kind: RichKind) -> &'static [AttributePair] {
    match kind {
        RichKind::Variable => VARIABLE_ATTRIBUTES,
        RichKind::Button => BUTTON_ATTRIBUTES,
        RichKind::Image => IMAGE_ATTRIBUTES,
        RichKind::Link => LINK_ATTRIBUTES,
        RichKind::Repeat | RichKind::Generic => &[],
    }
}

/// `{{ name }}`, or `{{ name | default: 'fallback' }}` with a fallback.
///
/// Single quotes in the fallback become `’` since Liquid string literals
/// have no escape sequence.
pub fn wrap_output(name: &str, fallback: Option<&str>) -> String {
    match fallback.filter(|f| !f.is_empty()) {
        Some(fallback) => format!(
            "{{{{ {} | default: '{}' }}}}",
            name,
            fallback.replace('\'', "\u{2019}")
        ),
        None => format!("{{{{ {} }}}}", name),
    }
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Null) | None => false,
        Some(_) => true,
    }
}

/// Rewrite dynamic attributes of `node` and every descendant (content and
/// marks), returning a new tree.
///
/// `should_transform(kind, attribute, value)` decides whether a flagged
/// attribute is wrapped; `should_clear(flag)` decides whether its flag is
/// reset to `false` afterwards.
pub fn rewrite_attributes<T, C>(node: &RichNode, should_transform: &T, should_clear: &C) -> RichNode
where
    T: Fn(&str, &str, &str) -> bool,
    C: Fn(&str) -> bool,
{
    let mut rewritten = RichNode {
        kind: node.kind.clone(),
        attrs: node.attrs.clone(),
        marks: None,
        content: None,
        text: node.text.clone(),
        extra: node.extra.clone(),
    };

    if let Some(attrs) = rewritten.attrs.as_mut() {
        let fallback = attrs
            .get("fallback")
            .and_then(Value::as_str)
            .map(str::to_string);
        let alias = attrs
            .get("aliasFor")
            .and_then(Value::as_str)
            .filter(|a| !a.is_empty())
            .map(str::to_string);

        let pairs = attribute_pairs(node.kind()).iter().chain(COMMON_ATTRIBUTES);
        for &AttributePair { attribute, flag } in pairs {
            if !is_truthy(attrs.get(flag)) {
                continue;
            }
            let Some(value) = attrs
                .get(attribute)
                .and_then(Value::as_str)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
            else {
                continue;
            };

            if should_transform(node.kind.as_str(), attribute, value.as_str())
                && !value.contains("{{")
            {
                let wrapped = if attribute == "id" {
                    let name = alias.as_deref().unwrap_or(&value);
                    wrap_output(name, fallback.as_deref())
                } else {
                    wrap_output(&value, None)
                };
                attrs.insert(attribute.to_string(), Value::String(wrapped));
            }
            if should_clear(flag) {
                attrs.insert(flag.to_string(), Value::Bool(false));
            }
        }
    }

    if let Some(marks) = node.marks.as_ref() {
        rewritten.marks = Some(
            marks
                .iter()
                .map(|m| rewrite_attributes(m, should_transform, should_clear))
                .collect(),
        );
    }
    if let Some(content) = node.content.as_ref() {
        rewritten.content = Some(
            content
                .iter()
                .map(|c| rewrite_attributes(c, should_transform, should_clear))
                .collect(),
        );
    }
    rewritten
}

/// Rewrite with the standard predicates: button text that is a translation
/// key is left alone, and first-class flags are never cleared.
pub fn default_rewrite(node: &RichNode, translation_namespace: &str) -> RichNode {
    let translation_prefix = format!("{}.", translation_namespace);
    let should_transform = |kind: &str, attribute: &str, value: &str| {
        !(kind == BUTTON && attribute == "text" && value.starts_with(&translation_prefix))
    };
    let should_clear = |flag: &str| !FIRST_CLASS_FLAGS.contains(&flag);
    rewrite_attributes(node, &should_transform, &should_clear)
}
