//! Mock-data hints gathered from a rich document

use super::{bare_expression, RichNode};
use crate::mock::ArrayVariable;

/// Collections and show flags declared by a document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentHints {
    pub array_variables: Vec<ArrayVariable>,
    pub flag_paths: Vec<String>,
}

/// Walk `root` depth-first, recording every repeat collection (with its
/// declared count, or `default_iterations`) and every show condition path.
pub fn collect_hints(root: &RichNode, default_iterations: usize) -> DocumentHints {
    let mut hints = DocumentHints::default();
    visit(root, default_iterations, &mut hints);
    hints
}

fn visit(node: &RichNode, default_iterations: usize, hints: &mut DocumentHints) {
    if let Some(each) = node.each() {
        let path = bare_expression(each);
        if !path.is_empty() && !hints.array_variables.iter().any(|a| a.path == path) {
            hints.array_variables.push(ArrayVariable {
                path,
                iterations: node.iterations().unwrap_or(default_iterations),
            });
        }
    }
    if let Some(condition) = node.show_condition() {
        let path = bare_expression(condition);
        if !path.is_empty() && !hints.flag_paths.contains(&path) {
            hints.flag_paths.push(path);
        }
    }
    for child in node.content.iter().flatten() {
        visit(child, default_iterations, hints);
    }
}
