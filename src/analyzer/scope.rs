//! Names bound inside the template subtree being walked

use std::collections::HashSet;

use crate::schema::is_strict_prefix;

/// Loop metadata object available inside `for` bodies
pub const FOR_LOOP_METADATA: &str = "forloop";
/// Loop metadata object available inside `tablerow` bodies
pub const TABLEROW_LOOP_METADATA: &str = "tablerowloop";

/// Set of locally bound names (loop iterators, assigned and captured names).
///
/// Scopes are extended by copy with [`LocalScope::with`], so a binding made
/// while walking one branch never leaks into its siblings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalScope {
    names: HashSet<String>,
}

impl LocalScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of this scope with `name` bound
    pub fn with(&self, name: &str) -> Self {
        let mut extended = self.clone();
        extended.names.insert(name.to_string());
        extended
    }

    /// Whether `path` reads a local binding, either exactly or through it
    /// (`item` binds `item.name` and `item[0]`)
    pub fn binds(&self, path: &str) -> bool {
        self.names
            .iter()
            .any(|name| path == name || is_strict_prefix(name, path))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for LocalScope {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(Into::into).collect(),
        }
    }
}
