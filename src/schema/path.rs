//! Dot/bracket variable path handling

use smallvec::SmallVec;

/// One step of a variable path such as `payload.items[0].name`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Named property access (`.name` or `["name"]`)
    Key(String),
    /// Numeric index access (`[0]`)
    Index(usize),
}

impl PathSegment {
    /// Segment rendered as a property name (indices become their decimal form)
    pub fn as_key(&self) -> String {
        match self {
            PathSegment::Key(key) => key.clone(),
            PathSegment::Index(idx) => idx.to_string(),
        }
    }
}

/// Segments of a parsed path; most template paths are shallow
pub type PathSegments = SmallVec<[PathSegment; 8]>;

/// Split a variable path into its segments.
///
/// `payload.items[0].name` yields `payload`, `items`, `0`, `name`. Quoted
/// bracket keys (`user["first name"]`) become [`PathSegment::Key`]. Returns
/// `None` for malformed paths (empty segments, unbalanced brackets).
pub fn split_path(path: &str) -> Option<PathSegments> {
    let path = path.trim();
    if path.is_empty() {
        return None;
    }

    let mut segments = PathSegments::new();
    for part in path.split('.') {
        if part.is_empty() {
            return None;
        }

        let (name, mut rest) = match part.find('[') {
            Some(pos) => (&part[..pos], &part[pos..]),
            None => (part, ""),
        };

        if name.contains(']') {
            return None;
        }
        if !name.is_empty() {
            segments.push(PathSegment::Key(name.to_string()));
        } else if segments.is_empty() {
            // A path cannot open with a bracket
            return None;
        }

        while !rest.is_empty() {
            if !rest.starts_with('[') {
                return None;
            }
            let close = rest.find(']')?;
            let inner = rest[1..close].trim();
            segments.push(parse_bracket(inner)?);
            rest = &rest[close + 1..];
        }
    }

    Some(segments)
}

fn parse_bracket(inner: &str) -> Option<PathSegment> {
    if inner.is_empty() {
        return None;
    }
    if let Ok(idx) = inner.parse::<usize>() {
        return Some(PathSegment::Index(idx));
    }
    let quoted = (inner.starts_with('"') && inner.ends_with('"'))
        || (inner.starts_with('\'') && inner.ends_with('\''));
    if quoted && inner.len() >= 2 {
        return Some(PathSegment::Key(inner[1..inner.len() - 1].to_string()));
    }
    // Dynamic lookups (`items[i]`) are treated as an opaque key
    Some(PathSegment::Key(inner.to_string()))
}

/// Rewrite quoted bracket keys into dot notation, keeping numeric indices.
///
/// `user["name"].tags[0]` becomes `user.name.tags[0]`.
pub fn normalize_path(path: &str) -> String {
    match split_path(path) {
        Some(segments) => join_segments(&segments),
        None => path.trim().to_string(),
    }
}

/// Render segments back into a dot/bracket path
pub fn join_segments(segments: &[PathSegment]) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            PathSegment::Key(key) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(key);
            }
            PathSegment::Index(idx) => {
                out.push('[');
                out.push_str(&idx.to_string());
                out.push(']');
            }
        }
    }
    out
}

/// Path with every numeric index removed (`a.b[1].c` → `a.b.c`)
pub fn strip_indices(path: &str) -> String {
    match split_path(path) {
        Some(segments) => {
            let keys: Vec<PathSegment> = segments
                .into_iter()
                .filter(|s| matches!(s, PathSegment::Key(_)))
                .collect();
            join_segments(&keys)
        }
        None => path.trim().to_string(),
    }
}

/// Number of dot-separated segments, used for shallow-to-deep ordering
pub fn depth(path: &str) -> usize {
    path.split('.').count()
}

/// Whether `prefix` is a strict path-prefix of `path` (`a.b` of `a.b.c` or `a.b[0]`)
pub fn is_strict_prefix(prefix: &str, path: &str) -> bool {
    path.len() > prefix.len()
        && path.starts_with(prefix)
        && matches!(path.as_bytes()[prefix.len()], b'.' | b'[')
}
