//! Template variable analysis.
//!
//! [`TemplateAnalyzer`] walks a parsed Liquid template, threading the set of
//! locally bound names through loops, assignments and captures, and sorts
//! every variable reference into a valid or an invalid list:
//! - outputs (`{{ payload.name | default: 'x' }}`) with their filter chain
//! - `if`/`unless`/`elsif` conditions, `case`/`when` subjects and values
//! - `for`/`tablerow` collections (including range bounds) and parameters
//! - `assign` right-hand sides
//!
//! Each name is reported once; the first occurrence wins.

mod naming;
mod scope;

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, warn};

use crate::filters::{FilterContext, FilterRegistry};
use crate::metrics::AnalysisMetrics;
use crate::schema::{normalize_path, SchemaNode};
use crate::template::{
    self, has_unquoted_whitespace, identifiers, is_literal, split_filters, Case, FilterArg,
    FilterCall, ForLoop, LoopCollection, LoopKind, Node, Output, SyntaxError, Token,
};

pub use naming::{is_dynamic_path, is_events_collection, is_property_chain};
pub use scope::{LocalScope, FOR_LOOP_METADATA, TABLEROW_LOOP_METADATA};

use naming::{NamePolicy, Verdict};

/// Name of the layout placeholder that needs no namespace
pub const CONTENT_PLACEHOLDER: &str = "content";

/// A variable occurrence found in a template
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    /// Dot/bracket path, e.g. `payload.items[0].name`
    pub name: String,
    /// Source text of the token the variable was found in
    pub output: String,
    pub output_start: usize,
    pub output_end: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_message: Option<String>,
    /// Tag or filter the variable was discovered through
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl Variable {
    fn at(name: impl Into<String>, token: &Token) -> Self {
        Self {
            name: name.into(),
            output: token.text.clone(),
            output_start: token.span.start,
            output_end: token.span.end,
            message: None,
            filter_message: None,
            context: None,
        }
    }

    /// The diagnostic to show for this variable; filter issues win
    pub fn issue(&self) -> Option<&str> {
        self.filter_message.as_deref().or(self.message.as_deref())
    }
}

/// The two disjoint, ordered variable lists produced by an analysis
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub valid_variables: Vec<Variable>,
    pub invalid_variables: Vec<Variable>,
}

impl AnalysisResult {
    pub fn is_empty(&self) -> bool {
        self.valid_variables.is_empty() && self.invalid_variables.is_empty()
    }

    pub fn valid_names(&self) -> Vec<String> {
        self.valid_variables.iter().map(|v| v.name.clone()).collect()
    }

    pub fn invalid_names(&self) -> Vec<String> {
        self.invalid_variables.iter().map(|v| v.name.clone()).collect()
    }

    /// Best-effort result for a template the parser rejected
    pub fn from_syntax_error(error: &SyntaxError) -> Self {
        let Some(token) = &error.token else {
            return Self::default();
        };
        let mut variable = Variable::at(token.text.trim(), token);
        variable.message = Some(error.message.clone());
        Self {
            valid_variables: Vec::new(),
            invalid_variables: vec![variable],
        }
    }
}

/// Knobs for the naming policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerOptions {
    pub content_placeholder: String,
    pub translation_namespace: String,
    /// Suggest `payload.<name>` for un-namespaced variables
    pub suggest_payload_namespace: bool,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            content_placeholder: CONTENT_PLACEHOLDER.to_string(),
            translation_namespace: "t".to_string(),
            suggest_payload_namespace: true,
        }
    }
}

/// Accumulates the lists for one pass; the dedup set spans the whole pass
#[derive(Default)]
struct AnalysisContext {
    seen: HashSet<String>,
    result: AnalysisResult,
}

impl AnalysisContext {
    fn push(&mut self, variable: Variable, valid: bool) {
        if !self.seen.insert(variable.name.clone()) {
            return;
        }
        if valid {
            self.result.valid_variables.push(variable);
        } else {
            self.result.invalid_variables.push(variable);
        }
    }
}

/// Walks a template and classifies its variables against an optional schema
pub struct TemplateAnalyzer<'a> {
    schema: Option<&'a SchemaNode>,
    filters: &'a FilterRegistry,
    options: AnalyzerOptions,
}

impl<'a> TemplateAnalyzer<'a> {
    pub fn new(schema: Option<&'a SchemaNode>, filters: &'a FilterRegistry) -> Self {
        Self {
            schema,
            filters,
            options: AnalyzerOptions::default(),
        }
    }

    pub fn with_options(mut self, options: AnalyzerOptions) -> Self {
        self.options = options;
        self
    }

    /// Parse and analyze template source.
    ///
    /// Syntax errors never propagate: the faulty token, if any, becomes the
    /// single invalid variable; otherwise the result is empty.
    pub fn analyze(&self, source: &str) -> AnalysisResult {
        self.analyze_checked(source, |_| Ok(()))
    }

    /// [`analyze`](Self::analyze), additionally running `check` over the
    /// source once the structural parse succeeds.
    ///
    /// `check` is the rendering engine's own parse. Its rejection is a
    /// syntax fault like any other; the faulty token is the first opaque tag
    /// the message names, if there is one.
    pub fn analyze_checked<F>(&self, source: &str, check: F) -> AnalysisResult
    where
        F: FnOnce(&str) -> Result<(), String>,
    {
        let parsed = template::parse(source).and_then(|nodes| match check(source) {
            Ok(()) => Ok(nodes),
            Err(message) => {
                let token = first_opaque_tag(&nodes, &message);
                Err(SyntaxError::new(message, token))
            }
        });

        let result = match parsed {
            Ok(nodes) => self.analyze_nodes(&nodes, &LocalScope::new()),
            Err(err) => {
                warn!(error = %err, "Template failed to parse, reporting faulty token");
                AnalysisMetrics::record_syntax_error();
                AnalysisResult::from_syntax_error(&err)
            }
        };

        AnalysisMetrics::record_variables(
            result.valid_variables.len(),
            result.invalid_variables.len(),
        );
        result
    }

    /// Analyze already-parsed nodes with an initial local scope
    pub fn analyze_nodes(&self, nodes: &[Node], scope: &LocalScope) -> AnalysisResult {
        let mut ctx = AnalysisContext::default();
        self.walk(nodes, scope, &mut ctx);
        ctx.result
    }

    fn policy(&self) -> NamePolicy<'_> {
        NamePolicy {
            schema: self.schema,
            options: &self.options,
        }
    }

    fn walk(&self, nodes: &[Node], scope: &LocalScope, ctx: &mut AnalysisContext) {
        // Assignments and captures bind for the following siblings only
        let mut scope = scope.clone();

        for node in nodes {
            match node {
                Node::Text(_) => {}
                Node::Output(output) => self.visit_output(output, &scope, ctx),
                Node::Assign(assign) => {
                    let extended = scope.with(&assign.target);
                    self.check_expression(&assign.expression, &assign.token, "assign", &extended, ctx);
                    scope = extended;
                }
                Node::Capture(capture) => {
                    let child = scope.with(&capture.target);
                    self.walk(&capture.body, &child, ctx);
                    scope = child;
                }
                Node::For(for_loop) => self.visit_loop(for_loop, &scope, ctx),
                Node::Conditional(conditional) => {
                    let tag = conditional.kind.tag_name();
                    for branch in &conditional.branches {
                        if let Some(condition) = &branch.condition {
                            self.check_expression(condition, &branch.token, tag, &scope, ctx);
                        }
                        self.walk(&branch.body, &scope, ctx);
                    }
                }
                Node::Case(case) => self.visit_case(case, &scope, ctx),
                Node::Tag(tag) => match tag.name.as_str() {
                    "increment" | "decrement" => {
                        let counter = tag.markup.trim();
                        if !counter.is_empty() {
                            scope = scope.with(counter);
                        }
                    }
                    "cycle" => self.check_expression(&tag.markup, &tag.token, "cycle", &scope, ctx),
                    other => debug!(tag = %other, "Skipping tag without variable semantics"),
                },
            }
        }
    }

    fn visit_output(&self, output: &Output, scope: &LocalScope, ctx: &mut AnalysisContext) {
        let (base, filters) = split_filters(&output.expression);

        if base.is_empty() || is_literal(&base) {
            self.check_filter_arguments(&filters, &output.token, scope, ctx);
            return;
        }

        if has_unquoted_whitespace(&base) {
            let mut variable = Variable::at(base.as_str(), &output.token);
            variable.message = Some(format!(
                "Variable '{}' contains whitespace; variable paths cannot contain spaces",
                base
            ));
            ctx.push(variable, false);
            return;
        }

        let name = normalize_path(&base);
        let filter_context = FilterContext {
            requires_key_path: is_events_collection(&name),
        };
        let filter_message = self
            .filters
            .first_issue(&filters, filter_context)
            .map(|issue| issue.message);

        let valid = self.record(&name, &output.token, None, filter_message, scope, ctx);
        self.check_filter_arguments(&filters, &output.token, scope, ctx);

        if valid && is_events_collection(&name) {
            self.check_implied_key_paths(&name, &filters, &output.token, scope, ctx);
        }
    }

    /// `{{ steps.d.events | toSentence: 'payload.name' }}` reads
    /// `steps.d.events.payload.name` from every event
    fn check_implied_key_paths(
        &self,
        parent: &str,
        filters: &[FilterCall],
        token: &Token,
        scope: &LocalScope,
        ctx: &mut AnalysisContext,
    ) {
        for filter in filters {
            let key_path_position = match filter.name.as_str() {
                "toSentence" => 0,
                "digest" => 1,
                _ => continue,
            };
            let Some(key_path) = filter.args.get(key_path_position).and_then(FilterArg::as_str)
            else {
                continue;
            };
            if !is_property_chain(key_path) {
                continue;
            }
            let implied = format!("{}.{}", parent, key_path);
            self.record(&implied, token, Some(filter.name.as_str()), None, scope, ctx);
        }
    }

    fn check_filter_arguments(
        &self,
        filters: &[FilterCall],
        token: &Token,
        scope: &LocalScope,
        ctx: &mut AnalysisContext,
    ) {
        for filter in filters {
            for arg in &filter.args {
                let arg = match arg {
                    FilterArg::Keyword(_, value) => value.as_ref(),
                    other => other,
                };
                if let FilterArg::Variable(name) = arg {
                    self.record(name, token, Some(filter.name.as_str()), None, scope, ctx);
                }
            }
        }
    }

    fn visit_loop(&self, for_loop: &ForLoop, scope: &LocalScope, ctx: &mut AnalysisContext) {
        let tag = for_loop.kind.tag_name();

        match &for_loop.collection {
            LoopCollection::Range { start, end } => {
                for bound in [start, end] {
                    if bound.parse::<i64>().is_err() {
                        self.check_expression(bound, &for_loop.token, tag, scope, ctx);
                    }
                }
            }
            LoopCollection::Expression(expression) => {
                let (base, _) = split_filters(expression);
                if !is_literal(&base) {
                    self.record(&normalize_path(&base), &for_loop.token, Some(tag), None, scope, ctx);
                }
            }
        }

        if !for_loop.params.is_empty() {
            self.check_expression(&for_loop.params, &for_loop.token, tag, scope, ctx);
        }

        let mut body_scope = scope.with(&for_loop.variable).with(FOR_LOOP_METADATA);
        if for_loop.kind == LoopKind::Tablerow {
            body_scope = body_scope.with(TABLEROW_LOOP_METADATA);
        }
        self.walk(&for_loop.body, &body_scope, ctx);
        self.walk(&for_loop.else_body, scope, ctx);
    }

    fn visit_case(&self, case: &Case, scope: &LocalScope, ctx: &mut AnalysisContext) {
        self.check_expression(&case.subject, &case.token, "case", scope, ctx);

        for when in &case.whens {
            for value in &when.values {
                if !is_literal(value) {
                    self.check_expression(value, &when.token, "when", scope, ctx);
                }
            }
            self.walk(&when.body, scope, ctx);
        }
        self.walk(&case.else_body, scope, ctx);
    }

    fn check_expression(
        &self,
        expression: &str,
        token: &Token,
        context: &str,
        scope: &LocalScope,
        ctx: &mut AnalysisContext,
    ) {
        for name in identifiers(expression) {
            self.record(&name, token, Some(context), None, scope, ctx);
        }
    }

    /// Classify and record one name; returns whether it was valid
    fn record(
        &self,
        name: &str,
        token: &Token,
        context: Option<&str>,
        filter_message: Option<String>,
        scope: &LocalScope,
        ctx: &mut AnalysisContext,
    ) -> bool {
        let verdict = self.policy().judge(name, scope);
        if verdict == Verdict::Local {
            return false;
        }

        let mut variable = Variable::at(name, token);
        variable.context = context.map(str::to_string);
        let valid = match verdict {
            Verdict::Invalid(message) => {
                variable.message = Some(message);
                false
            }
            _ => filter_message.is_none(),
        };
        variable.filter_message = filter_message;

        debug!(variable = %name, valid, "Classified template variable");
        ctx.push(variable, valid);
        valid
    }
}

/// Token of the first opaque tag, at any depth, whose name `message` mentions
fn first_opaque_tag(nodes: &[Node], message: &str) -> Option<Token> {
    nodes.iter().find_map(|node| match node {
        Node::Tag(tag) if message.contains(tag.name.as_str()) => Some(tag.token.clone()),
        Node::Capture(capture) => first_opaque_tag(&capture.body, message),
        Node::For(for_loop) => first_opaque_tag(&for_loop.body, message)
            .or_else(|| first_opaque_tag(&for_loop.else_body, message)),
        Node::Conditional(conditional) => conditional
            .branches
            .iter()
            .find_map(|branch| first_opaque_tag(&branch.body, message)),
        Node::Case(case) => case
            .whens
            .iter()
            .find_map(|when| first_opaque_tag(&when.body, message))
            .or_else(|| first_opaque_tag(&case.else_body, message)),
        _ => None,
    })
}
