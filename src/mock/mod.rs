//! Example-object synthesis from discovered variable paths.
//!
//! [`VariableObjectBuilder`] turns the flat list of valid variable names
//! into one nested JSON object that a preview can be rendered against.
//! Array collections are pre-sized and every element receives the same
//! keys; digest event collections get a shared `payload` shape.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::analyzer::{is_events_collection, CONTENT_PLACEHOLDER};
use crate::config::PreviewConfig;
use crate::schema::{depth, is_strict_prefix, normalize_path, split_path, strip_indices, PathSegment};

lazy_static! {
    static ref DIGEST_PAYLOAD: Regex =
        Regex::new(r"^(steps\.[^.\[\]]+\.events)(?:\[\d+\])?\.payload\.(.+)$").unwrap();
    static ref STEP_STATUS: Regex = Regex::new(r"^steps\.[^.\[\]]+\.(?:seen|read)$").unwrap();
    static ref STEP_DATE: Regex =
        Regex::new(r"^steps\.[^.\[\]]+\.(?:lastSeenDate|lastReadDate)$").unwrap();
}

/// Example elements allowed per collection unless configured otherwise
pub const DEFAULT_MAX_ITERATIONS: usize = 50;

/// A path that denotes a collection, with the number of example elements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayVariable {
    pub path: String,
    pub iterations: usize,
}

impl ArrayVariable {
    pub fn new(path: impl Into<String>, iterations: usize) -> Self {
        Self {
            path: path.into(),
            iterations,
        }
    }
}

/// Builds example variable objects
#[derive(Debug, Clone)]
pub struct VariableObjectBuilder {
    content_placeholder: String,
    default_digest_events: usize,
    max_iterations: usize,
}

impl Default for VariableObjectBuilder {
    fn default() -> Self {
        Self {
            content_placeholder: CONTENT_PLACEHOLDER.to_string(),
            default_digest_events: 3,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// Build with default settings and no flag paths
pub fn keys_to_object<S: AsRef<str>>(paths: &[S], array_variables: &[ArrayVariable]) -> Value {
    VariableObjectBuilder::default().build(paths, array_variables, &[] as &[&str])
}

impl VariableObjectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &PreviewConfig) -> Self {
        Self {
            content_placeholder: config.content_placeholder.clone(),
            default_digest_events: config.default_digest_events,
            max_iterations: config.max_iterations,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Nested example object for `paths`.
    ///
    /// `flag_paths` are set to `true` instead of a stand-in string.
    pub fn build<S, F>(&self, paths: &[S], array_variables: &[ArrayVariable], flag_paths: &[F]) -> Value
    where
        S: AsRef<str>,
        F: AsRef<str>,
    {
        let flags: HashSet<String> = flag_paths
            .iter()
            .map(|f| strip_indices(f.as_ref()))
            .collect();

        let requested: Vec<&str> = paths
            .iter()
            .map(|p| p.as_ref())
            .chain(flag_paths.iter().map(|f| f.as_ref()))
            .collect();

        let mut candidates: Vec<String> = Vec::new();
        for path in requested {
            let path = normalize_path(path);
            if !path.is_empty() && !candidates.contains(&path) && self.is_namespaced(&path) {
                candidates.push(path);
            }
        }

        let mut root = Value::Object(Map::new());

        let (digest_paths, scalar_paths): (Vec<String>, Vec<String>) = candidates
            .into_iter()
            .partition(|p| DIGEST_PAYLOAD.is_match(p) || is_events_collection(p));
        self.place_digest_events(&mut root, &digest_paths, array_variables);

        let mut arrays: Vec<ArrayVariable> = array_variables
            .iter()
            .map(|a| ArrayVariable::new(strip_indices(&a.path), a.iterations.min(self.max_iterations)))
            .collect();
        arrays.extend(implied_arrays(&scalar_paths, &arrays, self.max_iterations));
        arrays.sort_by_key(|a| depth(&a.path));
        for array in &arrays {
            let Some(keys) = keys_of(&array.path) else {
                continue;
            };
            let elements = vec![Value::Object(Map::new()); array.iterations];
            place(&mut root, &keys, &Value::Array(elements));
        }

        let mut leaves: Vec<String> = Vec::new();
        for path in scalar_paths.iter().map(|p| strip_indices(p)) {
            if !leaves.contains(&path) {
                leaves.push(path);
            }
        }
        // keep only the most specific paths, parents first
        let mut ordered: Vec<&String> = leaves
            .iter()
            .filter(|p| !leaves.iter().any(|other| is_strict_prefix(p, other)))
            .collect();
        ordered.sort_by_key(|p| depth(p));

        for path in ordered {
            let Some(keys) = keys_of(path) else {
                continue;
            };
            let value = if flags.contains(path.as_str()) {
                Value::Bool(true)
            } else {
                stand_in(path, &keys)
            };
            place(&mut root, &keys, &value);
        }

        debug!(paths = paths.len(), arrays = arrays.len(), "Built example variables");
        root
    }

    /// Copy of `object` with a stand-in added for every path in `paths` that
    /// is not already present.
    ///
    /// Unlike [`build`](Self::build) this keeps un-namespaced names, and it
    /// never overwrites or reshapes an existing value. It gives the renderer
    /// something to print for variables the analysis rejected.
    pub fn with_stand_ins<S: AsRef<str>>(&self, object: &Value, paths: &[S]) -> Value {
        let mut seeded = object.clone();
        if !seeded.is_object() {
            seeded = Value::Object(Map::new());
        }
        for path in paths {
            let path = normalize_path(path.as_ref());
            if let Some(keys) = keys_of(&path) {
                let value = stand_in(&path, &keys);
                fill(&mut seeded, &keys, &value);
            }
        }
        seeded
    }

    fn is_namespaced(&self, path: &str) -> bool {
        path.contains('.') || path == self.content_placeholder
    }

    /// Aggregate every `<events>[.idx].payload.<rest>` under its events path
    /// into one payload shape shared by all example events
    fn place_digest_events(
        &self,
        root: &mut Value,
        digest_paths: &[String],
        array_variables: &[ArrayVariable],
    ) {
        let mut order: Vec<String> = Vec::new();
        let mut payloads: HashMap<String, Value> = HashMap::new();

        for path in digest_paths {
            let (events, rest) = match DIGEST_PAYLOAD.captures(path) {
                Some(caps) => (caps[1].to_string(), Some(strip_indices(&caps[2]))),
                None => (path.clone(), None),
            };
            if !payloads.contains_key(&events) {
                order.push(events.clone());
                payloads.insert(events.clone(), Value::Object(Map::new()));
            }
            if let (Some(rest), Some(payload)) = (rest, payloads.get_mut(&events)) {
                if let Some(keys) = keys_of(&rest) {
                    let leaf = keys.last().cloned().unwrap_or_default();
                    place(payload, &keys, &Value::String(leaf));
                }
            }
        }

        for events in order {
            let count = array_variables
                .iter()
                .find(|a| strip_indices(&a.path) == events)
                .map(|a| a.iterations)
                .unwrap_or(self.default_digest_events)
                .min(self.max_iterations);
            let payload = payloads.remove(&events).unwrap_or(Value::Object(Map::new()));
            let mut event = Map::new();
            event.insert("payload".to_string(), payload);

            if let Some(keys) = keys_of(&events) {
                let elements = vec![Value::Object(event); count];
                place(root, &keys, &Value::Array(elements));
            }
        }
    }
}

/// Arrays implied by explicit indices (`payload.list[2].x` → 3 elements)
/// that were not declared, capped at `max_iterations` elements
fn implied_arrays(paths: &[String], declared: &[ArrayVariable], max_iterations: usize) -> Vec<ArrayVariable> {
    let mut implied: Vec<ArrayVariable> = Vec::new();
    for path in paths {
        let Some(segments) = split_path(path) else {
            continue;
        };
        let mut prefix: Vec<String> = Vec::new();
        for segment in segments {
            match segment {
                PathSegment::Key(key) => prefix.push(key),
                PathSegment::Index(index) => {
                    let array_path = prefix.join(".");
                    let count = index.saturating_add(1).min(max_iterations);
                    if declared.iter().any(|a| a.path == array_path) {
                        continue;
                    }
                    match implied.iter_mut().find(|a| a.path == array_path) {
                        Some(existing) => existing.iterations = existing.iterations.max(count),
                        None => implied.push(ArrayVariable::new(array_path, count)),
                    }
                }
            }
        }
    }
    implied
}

fn keys_of(path: &str) -> Option<Vec<String>> {
    let keys: Vec<String> = split_path(path)?
        .into_iter()
        .filter_map(|s| match s {
            PathSegment::Key(key) => Some(key),
            PathSegment::Index(_) => None,
        })
        .collect();
    (!keys.is_empty()).then_some(keys)
}

fn stand_in(path: &str, keys: &[String]) -> Value {
    if STEP_STATUS.is_match(path) {
        Value::Bool(false)
    } else if STEP_DATE.is_match(path) {
        Value::String(Utc::now().to_rfc3339())
    } else {
        Value::String(keys.last().cloned().unwrap_or_default())
    }
}

/// Write `value` at `keys`, fanning out across every element of any array
/// met on the way. Existing arrays and objects at the leaf are kept.
fn place(node: &mut Value, keys: &[String], value: &Value) {
    if let Value::Array(elements) = node {
        for element in elements.iter_mut() {
            place(element, keys, value);
        }
        return;
    }
    let Some((key, rest)) = keys.split_first() else {
        return;
    };
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    let Value::Object(map) = node else {
        return;
    };

    if rest.is_empty() {
        if !matches!(map.get(key), Some(Value::Array(_) | Value::Object(_))) {
            map.insert(key.clone(), value.clone());
        }
        return;
    }
    let child = map
        .entry(key.clone())
        .or_insert_with(|| Value::Object(Map::new()));
    place(child, rest, value);
}

/// Like [`place`], but only adds: existing leaves stay and scalars met on
/// the way end the write.
fn fill(node: &mut Value, keys: &[String], value: &Value) {
    if let Value::Array(elements) = node {
        for element in elements.iter_mut() {
            fill(element, keys, value);
        }
        return;
    }
    let Some((key, rest)) = keys.split_first() else {
        return;
    };
    let Value::Object(map) = node else {
        return;
    };

    if rest.is_empty() {
        map.entry(key.clone()).or_insert_with(|| value.clone());
        return;
    }
    let child = map
        .entry(key.clone())
        .or_insert_with(|| Value::Object(Map::new()));
    fill(child, rest, value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_stand_ins() {
        let object = keys_to_object(&["payload.user.name", "subscriber.data.plan"], &[]);
        assert_eq!(
            object,
            json!({
                "payload": {"user": {"name": "name"}},
                "subscriber": {"data": {"plan": "plan"}}
            })
        );
    }

    #[test]
    fn test_unnamespaced_paths_dropped() {
        let object = keys_to_object(&["name", "content", "payload.a"], &[]);
        assert_eq!(object, json!({"content": "content", "payload": {"a": "a"}}));
    }

    #[test]
    fn test_array_broadcast() {
        let object = keys_to_object(
            &["payload.items[0].name", "payload.items[0].price", "payload.items[1].name"],
            &[ArrayVariable::new("payload.items", 2)],
        );
        assert_eq!(
            object,
            json!({"payload": {"items": [
                {"name": "name", "price": "price"},
                {"name": "name", "price": "price"}
            ]}})
        );
    }

    #[test]
    fn test_prefix_pruning() {
        let object = keys_to_object(&["payload", "payload.profile.avatar"], &[]);
        assert_eq!(object, json!({"payload": {"profile": {"avatar": "avatar"}}}));
    }

    #[test]
    fn test_declared_array_survives_scalar_reference() {
        let object = keys_to_object(&["payload.items"], &[ArrayVariable::new("payload.items", 2)]);
        assert_eq!(object, json!({"payload": {"items": [{}, {}]}}));
    }

    #[test]
    fn test_implied_array_from_index() {
        let object = keys_to_object(&["payload.list[1].title"], &[]);
        assert_eq!(
            object,
            json!({"payload": {"list": [{"title": "title"}, {"title": "title"}]}})
        );
    }

    #[test]
    fn test_nested_arrays() {
        let object = keys_to_object(
            &["payload.groups.tags.label"],
            &[
                ArrayVariable::new("payload.groups.tags", 1),
                ArrayVariable::new("payload.groups", 2),
            ],
        );
        assert_eq!(
            object,
            json!({"payload": {"groups": [
                {"tags": [{"label": "label"}]},
                {"tags": [{"label": "label"}]}
            ]}})
        );
    }

    #[test]
    fn test_flags_are_true() {
        let object = VariableObjectBuilder::new().build(
            &["payload.name"],
            &[],
            &["payload.showBanner"],
        );
        assert_eq!(
            object,
            json!({"payload": {"name": "name", "showBanner": true}})
        );
    }

    #[test]
    fn test_digest_events_payload() {
        let object = keys_to_object(
            &[
                "steps.digest-1.events",
                "steps.digest-1.events[0].payload.name",
                "steps.digest-1.events.payload.order.id",
            ],
            &[ArrayVariable::new("steps.digest-1.events", 2)],
        );
        let event = json!({"payload": {"name": "name", "order": {"id": "id"}}});
        assert_eq!(
            object,
            json!({"steps": {"digest-1": {"events": [event.clone(), event]}}})
        );
    }

    #[test]
    fn test_digest_events_default_count() {
        let object = keys_to_object(&["steps.d.events.payload.name"], &[]);
        assert_eq!(object["steps"]["d"]["events"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_huge_index_is_capped() {
        let object = keys_to_object(&["payload.list[18446744073709551615].x"], &[]);
        let list = object["payload"]["list"].as_array().unwrap();
        assert_eq!(list.len(), DEFAULT_MAX_ITERATIONS);
        assert_eq!(list[0], json!({"x": "x"}));

        let object = keys_to_object(&["payload.list[100000000000].x"], &[]);
        assert_eq!(object["payload"]["list"].as_array().unwrap().len(), DEFAULT_MAX_ITERATIONS);
    }

    #[test]
    fn test_declared_iterations_are_capped() {
        let builder = VariableObjectBuilder::new().with_max_iterations(4);
        let object = builder.build(
            &["payload.items.name", "steps.d.events.payload.name"],
            &[
                ArrayVariable::new("payload.items", 1_000_000_000_000),
                ArrayVariable::new("steps.d.events", usize::MAX),
            ],
            &[] as &[&str],
        );
        assert_eq!(object["payload"]["items"].as_array().unwrap().len(), 4);
        assert_eq!(object["steps"]["d"]["events"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_with_stand_ins_only_adds() {
        let builder = VariableObjectBuilder::new();
        let object = keys_to_object(&["payload.name", "payload.items[1].id"], &[]);
        let seeded = builder.with_stand_ins(
            &object,
            &["nope", "payload.name", "payload.name.first", "payload.items.label"],
        );
        assert_eq!(
            seeded,
            json!({
                "nope": "nope",
                "payload": {
                    "name": "name",
                    "items": [{"id": "id", "label": "label"}, {"id": "id", "label": "label"}]
                }
            })
        );
    }

    #[test]
    fn test_step_status_values() {
        let object = keys_to_object(&["steps.d.seen", "steps.d.read", "steps.d.lastSeenDate"], &[]);
        assert_eq!(object["steps"]["d"]["seen"], json!(false));
        assert_eq!(object["steps"]["d"]["read"], json!(false));
        let date = object["steps"]["d"]["lastSeenDate"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(date).is_ok());
    }
}
