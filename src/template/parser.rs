//! Builds the structured parse tree from lexer tokens

use std::vec::IntoIter;

use lazy_static::lazy_static;
use regex::Regex;

use super::ast::{
    Assign, Capture, Case, Conditional, ConditionalBranch, ConditionalKind, ForLoop,
    LoopCollection, LoopKind, Node, Output, Tag, When,
};
use super::expression::{split_top_level, split_top_level_str};
use super::lexer::{tokenize, RawToken, TagToken};
use super::SyntaxError;

lazy_static! {
    static ref FOR_MARKUP: Regex =
        Regex::new(r"(?s)^([A-Za-z_][\w-]*)\s+in\s+(\([^)]*\)|\S+)\s*(.*)$").unwrap();
    static ref ASSIGN_MARKUP: Regex = Regex::new(r"(?s)^([A-Za-z_][\w-]*)\s*=\s*(.+)$").unwrap();
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][\w-]*$").unwrap();
}

const BRANCH_TAGS: &[&str] = &["else", "elsif", "when"];

/// Parse template source into a node list
pub fn parse(source: &str) -> Result<Vec<Node>, SyntaxError> {
    let mut parser = Parser {
        tokens: tokenize(source)?.into_iter(),
    };
    let (nodes, stray) = parser.parse_nodes(&[])?;
    match stray {
        Some(tag) => Err(unexpected(tag)),
        None => Ok(nodes),
    }
}

struct Parser {
    tokens: IntoIter<RawToken>,
}

impl Parser {
    /// Parse until one of `terminators` (returned) or end of input (`None`)
    fn parse_nodes(
        &mut self,
        terminators: &[&str],
    ) -> Result<(Vec<Node>, Option<TagToken>), SyntaxError> {
        let mut nodes = Vec::new();

        while let Some(raw) = self.tokens.next() {
            match raw {
                RawToken::Text(text) => nodes.push(Node::Text(text)),
                RawToken::Output { markup, token } => nodes.push(Node::Output(Output {
                    expression: markup,
                    token,
                })),
                RawToken::Tag(tag) => {
                    if terminators.contains(&tag.name.as_str()) {
                        return Ok((nodes, Some(tag)));
                    }
                    if tag.name.starts_with("end") || BRANCH_TAGS.contains(&tag.name.as_str()) {
                        return Err(unexpected(tag));
                    }
                    nodes.push(self.parse_tag(tag)?);
                }
            }
        }

        Ok((nodes, None))
    }

    fn parse_tag(&mut self, tag: TagToken) -> Result<Node, SyntaxError> {
        match tag.name.as_str() {
            "if" => self.parse_conditional(ConditionalKind::If, tag),
            "unless" => self.parse_conditional(ConditionalKind::Unless, tag),
            "for" => self.parse_loop(LoopKind::For, tag),
            "tablerow" => self.parse_loop(LoopKind::Tablerow, tag),
            "case" => self.parse_case(tag),
            "capture" => self.parse_capture(tag),
            "assign" => parse_assign(tag),
            "echo" => {
                if tag.markup.is_empty() {
                    return Err(SyntaxError::new("'echo' requires an expression", Some(tag.token)));
                }
                Ok(Node::Output(Output {
                    expression: tag.markup,
                    token: tag.token,
                }))
            }
            _ => Ok(Node::Tag(Tag {
                name: tag.name,
                markup: tag.markup,
                token: tag.token,
            })),
        }
    }

    fn parse_conditional(
        &mut self,
        kind: ConditionalKind,
        open: TagToken,
    ) -> Result<Node, SyntaxError> {
        if open.markup.is_empty() {
            return Err(SyntaxError::new(
                format!("'{}' requires a condition", kind.tag_name()),
                Some(open.token),
            ));
        }

        let end_tag = format!("end{}", kind.tag_name());
        let mut branches = Vec::new();
        let mut condition = Some(open.markup.clone());
        let mut branch_token = open.token.clone();

        loop {
            let terminators: Vec<&str> = if condition.is_some() {
                vec!["elsif", "else", end_tag.as_str()]
            } else {
                vec![end_tag.as_str()]
            };
            let (body, end) = self.parse_nodes(&terminators)?;
            branches.push(ConditionalBranch {
                condition: condition.take(),
                body,
                token: branch_token,
            });

            let Some(end) = end else {
                return Err(unclosed(&open));
            };
            match end.name.as_str() {
                "elsif" => {
                    if end.markup.is_empty() {
                        return Err(SyntaxError::new("'elsif' requires a condition", Some(end.token)));
                    }
                    condition = Some(end.markup);
                    branch_token = end.token;
                }
                "else" => branch_token = end.token,
                _ => break,
            }
        }

        Ok(Node::Conditional(Conditional { kind, branches }))
    }

    fn parse_loop(&mut self, kind: LoopKind, open: TagToken) -> Result<Node, SyntaxError> {
        let Some(caps) = FOR_MARKUP.captures(&open.markup) else {
            return Err(SyntaxError::new(
                format!("Invalid '{}' syntax, expected 'item in collection'", kind.tag_name()),
                Some(open.token),
            ));
        };

        let variable = caps[1].to_string();
        let collection = parse_collection(&caps[2]);
        let params = caps[3].trim().to_string();

        let end_tag = format!("end{}", kind.tag_name());
        let (body, end) = self.parse_nodes(&["else", end_tag.as_str()])?;
        let else_body = match end {
            None => return Err(unclosed(&open)),
            Some(tag) if tag.name == "else" => {
                let (else_body, end) = self.parse_nodes(&[end_tag.as_str()])?;
                if end.is_none() {
                    return Err(unclosed(&open));
                }
                else_body
            }
            Some(_) => Vec::new(),
        };

        Ok(Node::For(ForLoop {
            kind,
            variable,
            collection,
            params,
            body,
            else_body,
            token: open.token,
        }))
    }

    fn parse_case(&mut self, open: TagToken) -> Result<Node, SyntaxError> {
        if open.markup.is_empty() {
            return Err(SyntaxError::new("'case' requires a subject", Some(open.token)));
        }

        // Anything before the first `when` is ignored
        let (_, mut end) = self.parse_nodes(&["when", "else", "endcase"])?;
        let mut whens = Vec::new();
        let mut else_body = Vec::new();

        loop {
            let Some(tag) = end else {
                return Err(unclosed(&open));
            };
            match tag.name.as_str() {
                "when" => {
                    let values = split_when_values(&tag.markup);
                    if values.is_empty() {
                        return Err(SyntaxError::new("'when' requires a value", Some(tag.token)));
                    }
                    let (body, next) = self.parse_nodes(&["when", "else", "endcase"])?;
                    whens.push(When {
                        values,
                        body,
                        token: tag.token,
                    });
                    end = next;
                }
                "else" => {
                    let (body, next) = self.parse_nodes(&["endcase"])?;
                    else_body = body;
                    end = next;
                }
                _ => break,
            }
        }

        Ok(Node::Case(Case {
            subject: open.markup,
            whens,
            else_body,
            token: open.token,
        }))
    }

    fn parse_capture(&mut self, open: TagToken) -> Result<Node, SyntaxError> {
        let target = open
            .markup
            .trim_matches(|c| c == '"' || c == '\'')
            .to_string();
        if !IDENTIFIER.is_match(&target) {
            return Err(SyntaxError::new(
                "'capture' requires a variable name",
                Some(open.token),
            ));
        }

        let (body, end) = self.parse_nodes(&["endcapture"])?;
        if end.is_none() {
            return Err(unclosed(&open));
        }

        Ok(Node::Capture(Capture {
            target,
            body,
            token: open.token,
        }))
    }
}

fn parse_assign(tag: TagToken) -> Result<Node, SyntaxError> {
    let Some(caps) = ASSIGN_MARKUP.captures(&tag.markup) else {
        return Err(SyntaxError::new(
            "Invalid 'assign' syntax, expected 'name = value'",
            Some(tag.token),
        ));
    };
    Ok(Node::Assign(Assign {
        target: caps[1].to_string(),
        expression: caps[2].trim().to_string(),
        token: tag.token,
    }))
}

fn parse_collection(raw: &str) -> LoopCollection {
    let range = raw
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .and_then(|r| r.split_once(".."));
    match range {
        Some((start, end)) => LoopCollection::Range {
            start: start.trim().to_string(),
            end: end.trim().to_string(),
        },
        None => LoopCollection::Expression(raw.to_string()),
    }
}

fn split_when_values(markup: &str) -> Vec<String> {
    split_top_level(markup, ',')
        .into_iter()
        .flat_map(|part| split_top_level_str(part, " or "))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

fn unexpected(tag: TagToken) -> SyntaxError {
    SyntaxError::new(format!("Unexpected tag '{}'", tag.name), Some(tag.token))
}

fn unclosed(open: &TagToken) -> SyntaxError {
    SyntaxError::new(
        format!("'{}' tag was never closed", open.name),
        Some(open.token.clone()),
    )
}
