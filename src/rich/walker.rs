//! Conditional pruning, repeat expansion and variable flattening

use std::collections::VecDeque;

use serde_json::Value;
use tracing::{debug, warn};

use super::{RichKind, RichNode, WalkError, WalkResult, EACH_KEY, SHOW_IF_KEY, TEXT};
use crate::evaluator::TemplateEvaluator;
use crate::metrics::DocumentMetrics;
use crate::template::split_filters;

/// Bare path of an attribute value that may already be wrapped as output
/// (`{{ payload.items | default: x }}` → `payload.items`)
pub fn bare_expression(value: &str) -> String {
    let inner = value
        .trim()
        .trim_start_matches("{{")
        .trim_end_matches("}}")
        .trim_start_matches('-')
        .trim_end_matches('-');
    split_filters(inner).0
}

/// Runs the show/repeat pass over a document against a variable context.
///
/// Children of each dequeued node are rebuilt before the node's children
/// are queued, so indices into already-visited levels never shift.
pub struct DocumentWalker<'a, E: TemplateEvaluator + ?Sized> {
    evaluator: &'a E,
    variables: &'a Value,
}

impl<'a, E: TemplateEvaluator + ?Sized> DocumentWalker<'a, E> {
    pub fn new(evaluator: &'a E, variables: &'a Value) -> Self {
        Self {
            evaluator,
            variables,
        }
    }

    /// Transform a copy of `root`.
    ///
    /// A show condition that fails to render keeps its node. A repeat
    /// collection that fails to resolve aborts the walk.
    pub async fn walk(&self, root: &RichNode) -> WalkResult<RichNode> {
        let mut document = root.clone();
        let mut queue: VecDeque<Vec<usize>> = VecDeque::new();
        queue.push_back(Vec::new());

        while let Some(path) = queue.pop_front() {
            let Some(node) = node_at(&mut document, &path) else {
                continue;
            };
            flatten_variable(node);

            let Some(children) = node.content.take() else {
                continue;
            };
            let rebuilt = self.rebuild_children(children).await?;
            let count = rebuilt.len();
            node.content = Some(rebuilt);

            for index in 0..count {
                let mut child = path.clone();
                child.push(index);
                queue.push_back(child);
            }
        }
        Ok(document)
    }

    /// New child list with hidden nodes dropped and repeats replaced by
    /// their indexed clones. Each clone is checked once and never expanded
    /// as the repeat it came from.
    async fn rebuild_children(&self, children: Vec<RichNode>) -> WalkResult<Vec<RichNode>> {
        let mut pending: VecDeque<RichNode> = children.into();
        let mut rebuilt = Vec::with_capacity(pending.len());

        while let Some(mut child) = pending.pop_front() {
            if let Some(condition) = child.show_condition().map(str::to_string) {
                child.remove_attr(SHOW_IF_KEY);
                if !self.is_visible(&condition).await {
                    debug!(condition = %condition, kind = %child.kind, "Pruning hidden node");
                    DocumentMetrics::record_node_hidden();
                    continue;
                }
            }

            if let Some(each) = child.each().map(bare_expression) {
                let clones = self.expand_repeat(&child, &each).await?;
                for clone in clones.into_iter().rev() {
                    pending.push_front(clone);
                }
                continue;
            }

            rebuilt.push(child);
        }
        Ok(rebuilt)
    }

    async fn is_visible(&self, condition: &str) -> bool {
        let source = if condition.contains("{{") {
            condition.to_string()
        } else {
            format!("{{{{ {} }}}}", condition)
        };

        match self.evaluator.render(&source, self.variables).await {
            Ok(rendered) => !matches!(rendered.trim(), "" | "false"),
            Err(e) => {
                warn!(condition = %condition, error = %e, "Show condition failed, keeping node");
                DocumentMetrics::record_condition_failure();
                true
            }
        }
    }

    async fn expand_repeat(&self, repeat: &RichNode, each: &str) -> WalkResult<Vec<RichNode>> {
        let items = self
            .evaluator
            .resolve_collection(each, self.variables)
            .await
            .map_err(|source| WalkError::CollectionResolution {
                expression: each.to_string(),
                source,
            })?;

        let count = match repeat.iterations() {
            Some(limit) => items.len().min(limit),
            None => items.len(),
        };
        DocumentMetrics::record_repeat_expanded();
        debug!(collection = %each, count, "Expanding repeat");

        let template = repeat.content.as_deref().unwrap_or_default();
        let mut clones = Vec::with_capacity(count * template.len());
        for index in 0..count {
            for child in template {
                let mut clone = child.clone();
                index_paths(&mut clone, each, index);
                clones.push(clone);
            }
        }
        Ok(clones)
    }
}

fn node_at<'n>(root: &'n mut RichNode, path: &[usize]) -> Option<&'n mut RichNode> {
    let mut node = root;
    for &index in path {
        node = node.content.as_mut()?.get_mut(index)?;
    }
    Some(node)
}

/// `variable` nodes become text nodes showing their identifier
fn flatten_variable(node: &mut RichNode) {
    if node.kind() != RichKind::Variable {
        return;
    }
    let id = node.str_attr("id").unwrap_or_default().to_string();
    node.kind = TEXT.to_string();
    node.text = Some(id);
    node.attrs = None;
}

/// Insert `[index]` after `collection` in every dynamic attribute of the
/// subtree that reads through it
fn index_paths(node: &mut RichNode, collection: &str, index: usize) {
    let mut keys: Vec<&'static str> = node.kind().dynamic_attributes().to_vec();
    keys.extend([SHOW_IF_KEY, EACH_KEY]);

    if let Some(attrs) = node.attrs.as_mut() {
        for key in keys {
            if let Some(Value::String(value)) = attrs.get_mut(key) {
                *value = insert_index(value, collection, index);
            }
        }
    }

    for mark in node.marks.iter_mut().flatten() {
        index_paths(mark, collection, index);
    }
    for child in node.content.iter_mut().flatten() {
        index_paths(child, collection, index);
    }
}

fn is_path_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ']')
}

/// `payload.items.name` → `payload.items[0].name`; already indexed or
/// unrelated paths are returned unchanged
fn insert_index(value: &str, collection: &str, index: usize) -> String {
    if collection.is_empty() {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len() + 4);
    let mut rest = value;

    while let Some(found) = rest.find(collection) {
        let end = found + collection.len();
        let bounded_before = rest[..found]
            .chars()
            .next_back()
            .map_or(true, |c| !is_path_char(c));
        let followed_by_dot = rest[end..].starts_with('.');

        out.push_str(&rest[..end]);
        if bounded_before && followed_by_dot {
            out.push_str(&format!("[{}]", index));
        }
        rest = &rest[end..];
    }
    out.push_str(rest);
    out
}
