//! Helpers for reading Liquid expressions: filter chains, filter
//! arguments and the identifiers referenced by conditions.

use crate::schema::normalize_path;

const KEYWORDS: &[&str] = &[
    "and", "or", "not", "contains", "true", "false", "nil", "null", "empty", "blank", "in",
    "reversed", "with", "as", "for",
];

/// A filter applied in an output chain
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCall {
    pub name: String,
    pub args: Vec<FilterArg>,
}

/// A filter argument, typed by its surface syntax
#[derive(Debug, Clone, PartialEq)]
pub enum FilterArg {
    Str(String),
    Number(f64),
    Boolean(bool),
    Nil,
    /// A variable path, normalised to dot notation
    Variable(String),
    /// `name: value`
    Keyword(String, Box<FilterArg>),
}

impl FilterArg {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FilterArg::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, FilterArg::Number(_))
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, FilterArg::Variable(_))
    }
}

/// Split `source` on `separator`, ignoring separators inside quotes,
/// brackets and parentheses. Parts are returned untrimmed.
pub fn split_top_level(source: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut nesting = 0usize;
    let mut start = 0;

    for (idx, c) in source.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' => quote = Some(c),
                '(' | '[' => nesting += 1,
                ')' | ']' => nesting = nesting.saturating_sub(1),
                c if c == separator && nesting == 0 => {
                    parts.push(&source[start..idx]);
                    start = idx + c.len_utf8();
                }
                _ => {}
            },
        }
    }
    parts.push(&source[start..]);
    parts
}

/// Like [`split_top_level`], for a multi-character separator such as `" or "`
pub fn split_top_level_str<'s>(source: &'s str, separator: &str) -> Vec<&'s str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut nesting = 0usize;
    let mut start = 0;

    for (idx, c) in source.char_indices() {
        if idx < start {
            continue;
        }
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' => quote = Some(c),
                '(' | '[' => nesting += 1,
                ')' | ']' => nesting = nesting.saturating_sub(1),
                _ if nesting == 0 && !separator.is_empty() && source[idx..].starts_with(separator) => {
                    parts.push(&source[start..idx]);
                    start = idx + separator.len();
                }
                _ => {}
            },
        }
    }
    parts.push(&source[start..]);
    parts
}

/// Split an output expression into its base expression and filter chain
pub fn split_filters(expression: &str) -> (String, Vec<FilterCall>) {
    let mut parts = split_top_level(expression, '|').into_iter();
    let base = parts.next().unwrap_or_default().trim().to_string();
    let filters = parts
        .map(parse_filter)
        .filter(|f| !f.name.is_empty())
        .collect();
    (base, filters)
}

fn parse_filter(segment: &str) -> FilterCall {
    let segment = segment.trim();
    let (name, args) = match segment.split_once(':') {
        Some((name, args)) => (name.trim(), args),
        None => (segment, ""),
    };

    let args = if args.trim().is_empty() {
        Vec::new()
    } else {
        split_top_level(args, ',')
            .into_iter()
            .map(parse_arg)
            .collect()
    };

    FilterCall {
        name: name.to_string(),
        args,
    }
}

fn parse_arg(raw: &str) -> FilterArg {
    let raw = raw.trim();

    if let Some(inner) = unquote(raw) {
        return FilterArg::Str(inner.to_string());
    }
    if let Ok(n) = raw.parse::<f64>() {
        return FilterArg::Number(n);
    }
    match raw {
        "true" => return FilterArg::Boolean(true),
        "false" => return FilterArg::Boolean(false),
        "nil" | "null" | "empty" | "blank" => return FilterArg::Nil,
        _ => {}
    }

    let keyword = split_top_level(raw, ':');
    if keyword.len() == 2 && is_identifier_start(keyword[0].trim()) {
        return FilterArg::Keyword(
            keyword[0].trim().to_string(),
            Box::new(parse_arg(keyword[1])),
        );
    }

    FilterArg::Variable(normalize_path(raw))
}

fn unquote(raw: &str) -> Option<&str> {
    if raw.len() < 2 {
        return None;
    }
    let first = raw.chars().next()?;
    if (first == '"' || first == '\'') && raw.ends_with(first) {
        Some(&raw[1..raw.len() - 1])
    } else {
        None
    }
}

fn is_identifier_start(s: &str) -> bool {
    s.chars()
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false)
}

/// Whether the expression is a literal rather than a variable reference
pub fn is_literal(expression: &str) -> bool {
    let expression = expression.trim();
    unquote(expression).is_some()
        || expression.parse::<f64>().is_ok()
        || matches!(
            expression,
            "true" | "false" | "nil" | "null" | "empty" | "blank"
        )
        || (expression.starts_with('(') && expression.contains(".."))
}

/// Whether the expression, with quoted sections removed, contains whitespace
pub fn has_unquoted_whitespace(expression: &str) -> bool {
    let mut quote: Option<char> = None;
    for c in expression.trim().chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c.is_whitespace() => return true,
            None => {}
        }
    }
    false
}

/// Variable paths referenced by a condition, assignment or filter chain.
///
/// String literals, numbers, operators, boolean keywords and filter names
/// are skipped. `name:` keyword labels are skipped but their values are
/// scanned.
pub fn identifiers(expression: &str) -> Vec<String> {
    let mut found = Vec::new();
    for (i, segment) in split_top_level(expression, '|').into_iter().enumerate() {
        let scanned = if i == 0 {
            segment
        } else {
            match segment.split_once(':') {
                Some((_, args)) => args,
                None => continue,
            }
        };
        scan_identifiers(scanned, &mut found);
    }
    found
}

fn scan_identifiers(source: &str, found: &mut Vec<String>) {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut i = 0;

    while i < chars.len() {
        let (_, c) = chars[i];

        if c == '"' || c == '\'' {
            i += 1;
            while i < chars.len() && chars[i].1 != c {
                i += 1;
            }
            i += 1;
            continue;
        }

        let preceded_by_word = i > 0 && {
            let prev = chars[i - 1].1;
            prev.is_alphanumeric() || prev == '_'
        };
        if !(c.is_ascii_alphabetic() || c == '_') || preceded_by_word {
            i += 1;
            continue;
        }

        let start = i;
        i = consume_word(&chars, i);
        loop {
            if i + 1 < chars.len() && chars[i].1 == '.' && is_word_char(chars[i + 1].1) {
                i = consume_word(&chars, i + 1);
            } else if i < chars.len() && chars[i].1 == '[' {
                match closing_bracket(&chars, i) {
                    Some(close) => i = close + 1,
                    None => break,
                }
            } else {
                break;
            }
        }

        let begin = chars[start].0;
        let end = chars.get(i).map(|(idx, _)| *idx).unwrap_or(source.len());
        let word = &source[begin..end];

        let labelled = source[end..].trim_start().starts_with(':');
        if !labelled && !KEYWORDS.contains(&word) {
            found.push(normalize_path(word));
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

fn consume_word(chars: &[(usize, char)], mut i: usize) -> usize {
    while i < chars.len() && is_word_char(chars[i].1) {
        i += 1;
    }
    i
}

fn closing_bracket(chars: &[(usize, char)], open: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (offset, (_, c)) in chars[open + 1..].iter().enumerate() {
        match quote {
            Some(q) if *c == q => quote = None,
            Some(_) => {}
            None if *c == '"' || *c == '\'' => quote = Some(*c),
            None if *c == ']' => return Some(open + 1 + offset),
            None => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_filters() {
        let (base, filters) =
            split_filters("payload.name | default: 'a, b' | truncate: 10, '...'");
        assert_eq!(base, "payload.name");
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0].name, "default");
        assert_eq!(filters[0].args, vec![FilterArg::Str("a, b".into())]);
        assert_eq!(
            filters[1].args,
            vec![FilterArg::Number(10.0), FilterArg::Str("...".into())]
        );
    }

    #[test]
    fn test_filter_arg_kinds() {
        let (_, filters) = split_filters("x | f: payload.a, true, nil, sep: ' and '");
        assert_eq!(
            filters[0].args,
            vec![
                FilterArg::Variable("payload.a".into()),
                FilterArg::Boolean(true),
                FilterArg::Nil,
                FilterArg::Keyword("sep".into(), Box::new(FilterArg::Str(" and ".into()))),
            ]
        );
    }

    #[test]
    fn test_pipe_inside_quotes_is_not_a_filter() {
        let (base, filters) = split_filters("'a|b' | upcase");
        assert_eq!(base, "'a|b'");
        assert_eq!(filters.len(), 1);
    }

    #[test]
    fn test_identifiers_in_condition() {
        let ids = identifiers("payload.count > 3 and subscriber.name == 'Ann' or payload.tags contains \"x\"");
        assert_eq!(ids, vec!["payload.count", "subscriber.name", "payload.tags"]);
    }

    #[test]
    fn test_identifiers_skip_filter_names() {
        let ids = identifiers("payload.a | append: payload.b | upcase | replace: 'x', payload.c");
        assert_eq!(ids, vec!["payload.a", "payload.b", "payload.c"]);
    }

    #[test]
    fn test_identifiers_with_brackets_and_ranges() {
        assert_eq!(identifiers("payload.items[0].name"), vec!["payload.items[0].name"]);
        assert_eq!(identifiers("user['first']"), vec!["user.first"]);
        assert_eq!(identifiers("(1..payload.count)"), vec!["payload.count"]);
        assert_eq!(identifiers("limit: payload.max offset: 2"), vec!["payload.max"]);
        assert!(identifiers("3.5 == 'text' and true").is_empty());
    }

    #[test]
    fn test_is_literal() {
        assert!(is_literal("'hello'"));
        assert!(is_literal("42"));
        assert!(is_literal("nil"));
        assert!(is_literal("(1..3)"));
        assert!(!is_literal("payload.a"));
    }

    #[test]
    fn test_unquoted_whitespace() {
        assert!(has_unquoted_whitespace("payload. name"));
        assert!(!has_unquoted_whitespace("user['first name']"));
    }
}
