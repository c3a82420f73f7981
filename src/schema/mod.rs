//! Variable schema model and path gate.
//!
//! A [`SchemaNode`] is the type descriptor that template variables are
//! checked against. [`is_path_allowed`] decides whether a dotted/bracketed
//! read such as `payload.items[0].name` is legal for a schema.

mod path;

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;

pub use path::{
    depth, is_strict_prefix, join_segments, normalize_path, split_path, strip_indices,
    PathSegment, PathSegments,
};

/// Schema conversion errors
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Unsupported schema type: {0}")]
    UnsupportedType(String),

    #[error("Invalid schema at '{path}': {message}")]
    Invalid { path: String, message: String },
}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Kind of value a schema node describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    Object,
    Array,
    String,
    Number,
    Boolean,
    Null,
    Union,
}

impl SchemaKind {
    fn from_type_name(name: &str) -> SchemaResult<Self> {
        match name {
            "object" => Ok(SchemaKind::Object),
            "array" => Ok(SchemaKind::Array),
            "string" => Ok(SchemaKind::String),
            "number" | "integer" => Ok(SchemaKind::Number),
            "boolean" => Ok(SchemaKind::Boolean),
            "null" => Ok(SchemaKind::Null),
            other => Err(SchemaError::UnsupportedType(other.to_string())),
        }
    }
}

/// Recursive, immutable type descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub kind: SchemaKind,
    pub properties: HashMap<String, SchemaNode>,
    pub items: Option<Box<SchemaNode>>,
    pub additional_properties: bool,
}

impl SchemaNode {
    fn leaf(kind: SchemaKind) -> Self {
        Self {
            kind,
            properties: HashMap::new(),
            items: None,
            additional_properties: false,
        }
    }

    pub fn string() -> Self {
        Self::leaf(SchemaKind::String)
    }

    pub fn number() -> Self {
        Self::leaf(SchemaKind::Number)
    }

    pub fn boolean() -> Self {
        Self::leaf(SchemaKind::Boolean)
    }

    pub fn null() -> Self {
        Self::leaf(SchemaKind::Null)
    }

    /// Closed object with the given properties
    pub fn object<I, K>(properties: I) -> Self
    where
        I: IntoIterator<Item = (K, SchemaNode)>,
        K: Into<String>,
    {
        Self {
            kind: SchemaKind::Object,
            properties: properties
                .into_iter()
                .map(|(k, v)| (k.into(), v))
                .collect(),
            items: None,
            additional_properties: false,
        }
    }

    /// Array whose elements follow `items`
    pub fn array(items: SchemaNode) -> Self {
        Self {
            kind: SchemaKind::Array,
            properties: HashMap::new(),
            items: Some(Box::new(items)),
            additional_properties: false,
        }
    }

    /// Open or close the node to properties it does not declare
    pub fn with_additional_properties(mut self, allowed: bool) -> Self {
        self.additional_properties = allowed;
        self
    }

    /// Build a schema node from a JSON Schema document.
    ///
    /// Understands `type` (string or list), `properties`, `items`,
    /// `additionalProperties` and `anyOf`/`oneOf`. Objects without an
    /// explicit `additionalProperties` are open, as in JSON Schema.
    pub fn from_json_schema(value: &Value) -> SchemaResult<Self> {
        convert(value, "#")
    }

    fn property(&self, name: &str) -> Option<&SchemaNode> {
        self.properties.get(name)
    }
}

fn convert(value: &Value, at: &str) -> SchemaResult<SchemaNode> {
    let obj = match value {
        Value::Object(obj) => obj,
        // `true` accepts anything, `false` accepts nothing
        Value::Bool(open) => {
            return Ok(SchemaNode::leaf(SchemaKind::Object).with_additional_properties(*open))
        }
        _ => {
            return Err(SchemaError::Invalid {
                path: at.to_string(),
                message: "schema must be an object or boolean".to_string(),
            })
        }
    };

    let variants = obj
        .get("anyOf")
        .or_else(|| obj.get("oneOf"))
        .and_then(Value::as_array);
    if let Some(variants) = variants {
        let converted = variants
            .iter()
            .enumerate()
            .map(|(i, v)| convert(v, &format!("{}/anyOf/{}", at, i)))
            .collect::<SchemaResult<Vec<_>>>()?;
        return Ok(merge_union(converted));
    }

    let kind = match obj.get("type") {
        Some(Value::String(name)) => SchemaKind::from_type_name(name)?,
        Some(Value::Array(names)) => {
            let kinds = names
                .iter()
                .filter_map(Value::as_str)
                .filter(|n| *n != "null")
                .map(SchemaKind::from_type_name)
                .collect::<SchemaResult<Vec<_>>>()?;
            match kinds.as_slice() {
                [single] => *single,
                [] => SchemaKind::Null,
                _ => SchemaKind::Union,
            }
        }
        Some(other) => {
            return Err(SchemaError::Invalid {
                path: at.to_string(),
                message: format!("unexpected 'type' value {}", other),
            })
        }
        None if obj.contains_key("properties") => SchemaKind::Object,
        None if obj.contains_key("items") => SchemaKind::Array,
        None => SchemaKind::Union,
    };

    let mut properties = HashMap::new();
    if let Some(Value::Object(props)) = obj.get("properties") {
        for (name, prop) in props {
            let child = convert(prop, &format!("{}/properties/{}", at, name))?;
            properties.insert(name.clone(), child);
        }
    }

    let items = match obj.get("items") {
        Some(items) => Some(Box::new(convert(items, &format!("{}/items", at))?)),
        None => None,
    };

    let additional_properties = match obj.get("additionalProperties") {
        Some(Value::Bool(allowed)) => *allowed,
        Some(Value::Object(_)) => true,
        _ => matches!(kind, SchemaKind::Object | SchemaKind::Union),
    };

    Ok(SchemaNode {
        kind,
        properties,
        items,
        additional_properties,
    })
}

fn merge_union(variants: Vec<SchemaNode>) -> SchemaNode {
    let mut merged = SchemaNode::leaf(SchemaKind::Union);
    for variant in variants {
        merged.additional_properties |= variant.additional_properties;
        for (name, prop) in variant.properties {
            merged.properties.entry(name).or_insert(prop);
        }
        if merged.items.is_none() {
            merged.items = variant.items;
        }
    }
    merged
}

/// Decide whether `path` is a legal read against `schema`.
///
/// No schema means an open world and every path is allowed. Malformed
/// paths are rejected.
pub fn is_path_allowed(schema: Option<&SchemaNode>, path: &str) -> bool {
    let Some(schema) = schema else {
        return true;
    };
    let Some(segments) = split_path(path) else {
        return false;
    };

    let mut current = schema;
    for segment in &segments {
        let key = segment.as_key();

        if let Some(next) = current.property(&key) {
            current = next;
            continue;
        }

        if let Some(items) = current.items.as_deref() {
            if matches!(current.kind, SchemaKind::Array | SchemaKind::Union) {
                match segment {
                    PathSegment::Index(_) => {
                        current = items;
                        continue;
                    }
                    // `items.0.name` indexes like `items[0].name`
                    PathSegment::Key(name) if name.parse::<usize>().is_ok() => {
                        current = items;
                        continue;
                    }
                    PathSegment::Key(name) => {
                        if let Some(next) = items.property(name) {
                            current = next;
                            continue;
                        }
                    }
                }
            }
        }

        return current.additional_properties;
    }

    true
}
