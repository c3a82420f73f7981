//! Custom filters registered on the liquid parser

use liquid_core::{Display_filter, Filter, FilterReflection, ParseFilter};
use liquid_core::{Error, Expression, FilterParameters, FromFilterParameters};
use liquid_core::{Result, Runtime};
use liquid_core::{Value, ValueView};
use serde_json::Value as JsonValue;

/// `{{ value | json }}` serialises the input as compact JSON
#[derive(Clone, ParseFilter, FilterReflection)]
#[filter(
    name = "json",
    description = "Serialize the input as JSON.",
    parsed(JsonFilter)
)]
pub struct Json;

#[derive(Debug, Default, Display_filter)]
#[name = "json"]
struct JsonFilter;

impl Filter for JsonFilter {
    fn evaluate(&self, input: &dyn ValueView, _runtime: &dyn Runtime) -> Result<Value> {
        let encoded = serde_json::to_string(&input.to_value())
            .map_err(|e| Error::with_msg(format!("json filter: {}", e)))?;
        Ok(Value::scalar(encoded))
    }
}

#[derive(Debug, FilterParameters)]
struct ToSentenceArgs {
    #[parameter(description = "Path of the value to read from each element.", arg_type = "str")]
    key_path: Option<Expression>,
    #[parameter(description = "Number of elements to name before summarising the rest.", arg_type = "integer")]
    limit: Option<Expression>,
    #[parameter(description = "Word used for the remaining elements.", arg_type = "str")]
    more_text: Option<Expression>,
}

/// `{{ list | toSentence: 'name', 2, 'others' }}` → `a, b and 3 others`
#[derive(Clone, ParseFilter, FilterReflection)]
#[filter(
    name = "toSentence",
    description = "Join array elements into an English sentence.",
    parameters(ToSentenceArgs),
    parsed(ToSentenceFilter)
)]
pub struct ToSentence;

#[derive(Debug, FromFilterParameters, Display_filter)]
#[name = "toSentence"]
struct ToSentenceFilter {
    #[parameters]
    args: ToSentenceArgs,
}

impl Filter for ToSentenceFilter {
    fn evaluate(&self, input: &dyn ValueView, runtime: &dyn Runtime) -> Result<Value> {
        let args = self.args.evaluate(runtime)?;
        let key_path = args.key_path.map(|k| k.to_string());
        let names = element_names(input, key_path.as_deref())?;
        let limit = args.limit.map(|n| n.max(0) as usize);
        let more_text = args.more_text.map(|m| m.to_string());
        Ok(Value::scalar(sentence(&names, limit, more_text.as_deref())))
    }
}

#[derive(Debug, FilterParameters)]
struct DigestArgs {
    #[parameter(description = "Number of names to display.", arg_type = "integer")]
    max_names: Option<Expression>,
    #[parameter(description = "Path of the name inside each event.", arg_type = "str")]
    key_path: Option<Expression>,
}

/// `{{ steps.d.events | digest: 2, 'payload.name' }}` → `Ada, Bob and 1 other`
#[derive(Clone, ParseFilter, FilterReflection)]
#[filter(
    name = "digest",
    description = "Summarise digest events by name.",
    parameters(DigestArgs),
    parsed(DigestFilter)
)]
pub struct Digest;

#[derive(Debug, FromFilterParameters, Display_filter)]
#[name = "digest"]
struct DigestFilter {
    #[parameters]
    args: DigestArgs,
}

const DIGEST_NAMES: usize = 2;

impl Filter for DigestFilter {
    fn evaluate(&self, input: &dyn ValueView, runtime: &dyn Runtime) -> Result<Value> {
        let args = self.args.evaluate(runtime)?;
        let key_path = args.key_path.map(|k| k.to_string());
        let names = element_names(input, key_path.as_deref())?;
        let limit = args.max_names.map(|n| n.max(0) as usize).unwrap_or(DIGEST_NAMES);
        Ok(Value::scalar(sentence(&names, Some(limit), None)))
    }
}

#[derive(Debug, FilterParameters)]
struct PluralizeArgs {
    #[parameter(description = "Singular noun.", arg_type = "str")]
    noun: Expression,
    #[parameter(description = "Plural noun, defaults to the singular plus 's'.", arg_type = "str")]
    plural: Option<Expression>,
}

/// `{{ count | pluralize: 'item' }}` → `3 items`
#[derive(Clone, ParseFilter, FilterReflection)]
#[filter(
    name = "pluralize",
    description = "Prefix a noun with a count, pluralising it when needed.",
    parameters(PluralizeArgs),
    parsed(PluralizeFilter)
)]
pub struct Pluralize;

#[derive(Debug, FromFilterParameters, Display_filter)]
#[name = "pluralize"]
struct PluralizeFilter {
    #[parameters]
    args: PluralizeArgs,
}

impl Filter for PluralizeFilter {
    fn evaluate(&self, input: &dyn ValueView, runtime: &dyn Runtime) -> Result<Value> {
        let args = self.args.evaluate(runtime)?;
        let count = match to_json(input)? {
            JsonValue::Number(n) => n.as_f64().unwrap_or(0.0),
            JsonValue::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
            JsonValue::Array(items) => items.len() as f64,
            _ => 0.0,
        };
        let noun = if count == 1.0 {
            args.noun.to_string()
        } else {
            match args.plural {
                Some(plural) => plural.to_string(),
                None => format!("{}s", args.noun),
            }
        };
        let count = if count.fract() == 0.0 {
            format!("{}", count as i64)
        } else {
            count.to_string()
        };
        Ok(Value::scalar(format!("{} {}", count, noun)))
    }
}

fn to_json(input: &dyn ValueView) -> Result<JsonValue> {
    serde_json::to_value(input.to_value()).map_err(|e| Error::with_msg(e.to_string()))
}

/// Display text of every element, read at `key_path` when given.
/// Elements without a value at the path are skipped.
fn element_names(input: &dyn ValueView, key_path: Option<&str>) -> Result<Vec<String>> {
    let elements = match to_json(input)? {
        JsonValue::Array(items) => items,
        JsonValue::Null => Vec::new(),
        other => vec![other],
    };

    let names = elements
        .iter()
        .filter_map(|element| match key_path {
            Some(path) => path.split('.').try_fold(element, |node, key| node.get(key)),
            None => Some(element),
        })
        .filter_map(|value| match value {
            JsonValue::String(s) => Some(s.clone()),
            JsonValue::Null => None,
            other => Some(other.to_string()),
        })
        .collect();
    Ok(names)
}

/// `a`, `a and b`, `a, b and c`; past `limit` names the rest are counted
fn sentence(names: &[String], limit: Option<usize>, more_text: Option<&str>) -> String {
    let limit = limit.unwrap_or(names.len());
    match names {
        [] => String::new(),
        [only] => only.clone(),
        [rest @ .., last] if names.len() <= limit => format!("{} and {}", rest.join(", "), last),
        _ => {
            let remaining = names.len() - limit;
            let more = more_text
                .map(str::to_string)
                .unwrap_or_else(|| if remaining == 1 { "other" } else { "others" }.to_string());
            if limit == 0 {
                format!("{} {}", remaining, more)
            } else {
                format!("{} and {} {}", names[..limit].join(", "), remaining, more)
            }
        }
    }
}
