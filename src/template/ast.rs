//! Parse tree produced by the structural Liquid parser

use serde::Serialize;

/// Byte range of a token in the template source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// Raw delimiter text (`{{ ... }}` or `{% ... %}`) with its position
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub text: String,
    pub span: Span,
}

/// A node of the parsed template
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Output(Output),
    Assign(Assign),
    Capture(Capture),
    For(ForLoop),
    Conditional(Conditional),
    Case(Case),
    /// Any other tag, kept opaque
    Tag(Tag),
}

/// `{{ expression | filter: args }}` or `{% echo ... %}`
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    /// Everything between the delimiters, trimmed
    pub expression: String,
    pub token: Token,
}

/// `{% assign target = expression %}`
#[derive(Debug, Clone, PartialEq)]
pub struct Assign {
    pub target: String,
    pub expression: String,
    pub token: Token,
}

/// `{% capture target %}...{% endcapture %}`
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    pub target: String,
    pub body: Vec<Node>,
    pub token: Token,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    For,
    Tablerow,
}

impl LoopKind {
    pub fn tag_name(&self) -> &'static str {
        match self {
            LoopKind::For => "for",
            LoopKind::Tablerow => "tablerow",
        }
    }
}

/// What a loop iterates over
#[derive(Debug, Clone, PartialEq)]
pub enum LoopCollection {
    /// `(start..end)`, each bound an expression or integer literal
    Range { start: String, end: String },
    Expression(String),
}

/// `{% for variable in collection params %}` and `{% tablerow ... %}`
#[derive(Debug, Clone, PartialEq)]
pub struct ForLoop {
    pub kind: LoopKind,
    pub variable: String,
    pub collection: LoopCollection,
    /// Trailing parameters (`limit: 2 offset: n reversed`)
    pub params: String,
    pub body: Vec<Node>,
    pub else_body: Vec<Node>,
    pub token: Token,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalKind {
    If,
    Unless,
}

impl ConditionalKind {
    pub fn tag_name(&self) -> &'static str {
        match self {
            ConditionalKind::If => "if",
            ConditionalKind::Unless => "unless",
        }
    }
}

/// `if`/`unless` with its `elsif` and `else` branches in source order
#[derive(Debug, Clone, PartialEq)]
pub struct Conditional {
    pub kind: ConditionalKind,
    pub branches: Vec<ConditionalBranch>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalBranch {
    /// `None` for the `else` branch
    pub condition: Option<String>,
    pub body: Vec<Node>,
    pub token: Token,
}

/// `{% case subject %}{% when a, b %}...{% else %}...{% endcase %}`
#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    pub subject: String,
    pub whens: Vec<When>,
    pub else_body: Vec<Node>,
    pub token: Token,
}

#[derive(Debug, Clone, PartialEq)]
pub struct When {
    pub values: Vec<String>,
    pub body: Vec<Node>,
    pub token: Token,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub name: String,
    pub markup: String,
    pub token: Token,
}
