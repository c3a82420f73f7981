//! Splits template source into text, output and tag tokens

use lazy_static::lazy_static;
use regex::Regex;

use super::ast::{Span, Token};
use super::SyntaxError;

lazy_static! {
    static ref END_RAW: Regex = Regex::new(r"\{%-?\s*endraw\s*-?%\}").unwrap();
    static ref END_COMMENT: Regex = Regex::new(r"\{%-?\s*endcomment\s*-?%\}").unwrap();
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RawToken {
    Text(String),
    Output { markup: String, token: Token },
    Tag(TagToken),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TagToken {
    pub name: String,
    pub markup: String,
    pub token: Token,
}

#[derive(Clone, Copy)]
enum Delimiter {
    Output,
    Tag,
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<RawToken>, SyntaxError> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < source.len() {
        let Some((start, delimiter)) = next_delimiter(source, pos) else {
            tokens.push(RawToken::Text(source[pos..].to_string()));
            break;
        };

        if start > pos {
            tokens.push(RawToken::Text(source[pos..start].to_string()));
        }

        let closer = match delimiter {
            Delimiter::Output => "}}",
            Delimiter::Tag => "%}",
        };
        let Some(close) = source[start + 2..].find(closer) else {
            return Err(unclosed_delimiter(source, start, closer));
        };
        let end = start + 2 + close + 2;
        let token = Token {
            text: source[start..end].to_string(),
            span: Span { start, end },
        };
        let inner = strip_whitespace_control(&source[start + 2..end - 2]);
        pos = end;

        match delimiter {
            Delimiter::Output => tokens.push(RawToken::Output {
                markup: inner.to_string(),
                token,
            }),
            Delimiter::Tag => {
                let (name, markup) = split_tag(inner);
                match name {
                    "" => {
                        return Err(SyntaxError::new("Tag name is missing", Some(token)));
                    }
                    n if n.starts_with('#') => {}
                    "raw" => {
                        let found = END_RAW.find(&source[pos..]).ok_or_else(|| {
                            SyntaxError::new("'raw' tag was never closed", Some(token.clone()))
                        })?;
                        tokens.push(RawToken::Text(
                            source[pos..pos + found.start()].to_string(),
                        ));
                        pos += found.end();
                    }
                    "comment" => {
                        let found = END_COMMENT.find(&source[pos..]).ok_or_else(|| {
                            SyntaxError::new("'comment' tag was never closed", Some(token.clone()))
                        })?;
                        pos += found.end();
                    }
                    _ => tokens.push(RawToken::Tag(TagToken {
                        name: name.to_string(),
                        markup: markup.to_string(),
                        token,
                    })),
                }
            }
        }
    }

    Ok(tokens)
}

fn next_delimiter(source: &str, from: usize) -> Option<(usize, Delimiter)> {
    let output = source[from..].find("{{").map(|i| from + i);
    let tag = source[from..].find("{%").map(|i| from + i);
    match (output, tag) {
        (Some(o), Some(t)) if t < o => Some((t, Delimiter::Tag)),
        (Some(o), _) => Some((o, Delimiter::Output)),
        (None, Some(t)) => Some((t, Delimiter::Tag)),
        (None, None) => None,
    }
}

fn strip_whitespace_control(inner: &str) -> &str {
    let inner = inner.strip_prefix('-').unwrap_or(inner);
    let inner = inner.strip_suffix('-').unwrap_or(inner);
    inner.trim()
}

fn split_tag(inner: &str) -> (&str, &str) {
    match inner.find(char::is_whitespace) {
        Some(idx) => (&inner[..idx], inner[idx..].trim()),
        None => (inner, ""),
    }
}

fn unclosed_delimiter(source: &str, start: usize, closer: &str) -> SyntaxError {
    let line_end = source[start..]
        .find('\n')
        .map(|i| start + i)
        .unwrap_or(source.len());
    let token = Token {
        text: source[start..line_end].to_string(),
        span: Span {
            start,
            end: line_end,
        },
    };
    SyntaxError::new(format!("Missing closing '{}'", closer), Some(token))
}
