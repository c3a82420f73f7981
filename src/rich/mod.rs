//! Rich-document model and rewrites.
//!
//! Rich documents are trees of [`RichNode`]s (`doc` → paragraphs, variables,
//! repeats, buttons, images; links live in text `marks`). The rewrites here
//! turn such a tree into something a Liquid evaluator can render:
//!
//! - [`rewrite_attributes`] wraps dynamic attributes in `{{ ... }}` output
//! - [`DocumentWalker`] prunes hidden nodes, expands repeats and flattens
//!   variable markers in one breadth-first pass
//! - [`collect_hints`] gathers repeat collections and show flags for mock data

mod attributes;
mod hints;
mod walker;

pub use attributes::{
    attribute_pairs, default_rewrite, rewrite_attributes, wrap_output, AttributePair,
    COMMON_ATTRIBUTES, FIRST_CLASS_FLAGS,
};
pub use hints::{collect_hints, DocumentHints};
pub use walker::{bare_expression, DocumentWalker};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::evaluator::EvaluatorError;

pub const DOC: &str = "doc";
pub const TEXT: &str = "text";
pub const VARIABLE: &str = "variable";
pub const REPEAT: &str = "repeat";
pub const BUTTON: &str = "button";
pub const IMAGE: &str = "image";
pub const INLINE_IMAGE: &str = "inlineImage";
pub const LINK: &str = "link";

/// Show-condition attribute
pub const SHOW_IF_KEY: &str = "showIfKey";
/// Repeat collection attribute
pub const EACH_KEY: &str = "each";
/// Repeat count attribute
pub const ITERATIONS_KEY: &str = "iterations";

/// Rich document errors
#[derive(Debug, Error)]
pub enum WalkError {
    #[error("Invalid rich document: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Failed to resolve repeat collection '{expression}': {source}")]
    CollectionResolution {
        expression: String,
        #[source]
        source: EvaluatorError,
    },
}

pub type WalkResult<T> = Result<T, WalkError>;

/// One node of a rich document.
///
/// Fields other than the ones below are kept verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RichNode {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marks: Option<Vec<RichNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<RichNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The node kinds the rewrites and the walker treat specially
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RichKind {
    Variable,
    Repeat,
    Button,
    /// `image` and `inlineImage`
    Image,
    Link,
    Generic,
}

impl RichKind {
    /// Attributes holding variable paths that repeat expansion may index
    pub fn dynamic_attributes(&self) -> &'static [&'static str] {
        match self {
            RichKind::Variable => &["id", "aliasFor"],
            RichKind::Button => &["text", "url"],
            RichKind::Image => &["src", "externalLink"],
            RichKind::Link => &["href"],
            RichKind::Repeat | RichKind::Generic => &[],
        }
    }
}

impl RichNode {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            attrs: None,
            marks: None,
            content: None,
            text: None,
            extra: Map::new(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::new(TEXT)
        }
    }

    pub fn with_attr(mut self, key: &str, value: Value) -> Self {
        self.attrs
            .get_or_insert_with(Map::new)
            .insert(key.to_string(), value);
        self
    }

    pub fn with_content(mut self, content: Vec<RichNode>) -> Self {
        self.content = Some(content);
        self
    }

    pub fn parse(source: &str) -> WalkResult<Self> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn to_json(&self) -> WalkResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attrs.as_ref()?.get(key)
    }

    /// Non-empty string attribute
    pub fn str_attr(&self, key: &str) -> Option<&str> {
        self.attr(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    pub fn remove_attr(&mut self, key: &str) -> Option<Value> {
        self.attrs.as_mut()?.remove(key)
    }

    pub fn kind(&self) -> RichKind {
        match self.kind.as_str() {
            VARIABLE => RichKind::Variable,
            REPEAT => RichKind::Repeat,
            BUTTON => RichKind::Button,
            IMAGE | INLINE_IMAGE => RichKind::Image,
            LINK => RichKind::Link,
            _ => RichKind::Generic,
        }
    }

    pub fn show_condition(&self) -> Option<&str> {
        self.str_attr(SHOW_IF_KEY)
    }

    pub fn each(&self) -> Option<&str> {
        self.str_attr(EACH_KEY)
    }

    /// Declared repeat count; numbers and numeric strings are accepted
    pub fn iterations(&self) -> Option<usize> {
        match self.attr(ITERATIONS_KEY)? {
            Value::Number(n) => n.as_u64().map(|n| n as usize),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}
