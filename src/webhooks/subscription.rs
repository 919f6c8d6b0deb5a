//! Subscription-query payloads.
//!
//! A webhook may carry a GraphQL subscription document describing the payload
//! it wants, e.g.
//!
//! ```text
//! subscription {
//!   event {
//!     ... on PaymentMethodInitializeTokenizationSession {
//!       user { id }
//!       channel { id }
//!       paymentFlowToSupport
//!       data
//!     }
//!   }
//! }
//! ```
//!
//! Only the selection-set subset needed for payload projection is supported:
//! fields, aliases, nested selections, inline fragments, named fragments,
//! `__typename`, comments and commas. Arguments, variables and directives are
//! rejected. The payload is the projection of the `event` field.

use std::collections::HashMap;

use serde_json::{Map, Value};
use thiserror::Error;

/// Deepest selection nesting accepted while parsing or projecting.
const MAX_DEPTH: usize = 32;

/// Selections one projection may visit, counting each fragment expansion.
const MAX_SELECTIONS: usize = 10_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Unexpected end of subscription query")]
    UnexpectedEnd,

    #[error("Expected {expected}, found `{found}`")]
    UnexpectedToken { expected: &'static str, found: String },

    #[error("Unsupported syntax in subscription query: {0}")]
    Unsupported(&'static str),

    #[error("Subscription query must select the `event` field")]
    MissingEvent,

    #[error("Cannot query field `{field}` on type `{type_name}`")]
    UnknownField { type_name: String, field: String },

    #[error("Field `{0}` of object type must have a selection of subfields")]
    SelectionRequired(String),

    #[error("Field `{0}` must not have a selection since it is a scalar")]
    SelectionNotAllowed(String),

    #[error("Unknown fragment `{0}`")]
    UnknownFragment(String),

    #[error("Fragment `{0}` spreads itself")]
    FragmentCycle(String),

    #[error("Subscription query nests too deeply")]
    TooDeep,

    #[error("Subscription query expands to too many fields")]
    TooLarge,
}

/// Data an event exposes to subscription queries.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionNode {
    /// Leaf value (strings, enums, JSON blobs). `Null` also stands in for an
    /// absent object.
    Scalar(Value),
    Object {
        type_name: &'static str,
        fields: Vec<(&'static str, ProjectionNode)>,
    },
}

impl ProjectionNode {
    pub fn object(type_name: &'static str, fields: Vec<(&'static str, ProjectionNode)>) -> Self {
        Self::Object { type_name, fields }
    }

    pub fn scalar(value: impl Into<Value>) -> Self {
        Self::Scalar(value.into())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Selection {
    Field {
        alias: Option<String>,
        name: String,
        selections: Vec<Selection>,
    },
    InlineFragment {
        type_condition: Option<String>,
        selections: Vec<Selection>,
    },
    FragmentSpread(String),
}

#[derive(Debug, Clone, PartialEq)]
struct FragmentDefinition {
    type_condition: String,
    selections: Vec<Selection>,
}

/// Parsed subscription document.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionQuery {
    event: Vec<Selection>,
    fragments: HashMap<String, FragmentDefinition>,
}

impl SubscriptionQuery {
    pub fn parse(source: &str) -> Result<Self, QueryError> {
        let tokens = tokenize(source)?;
        Parser {
            tokens,
            pos: 0,
            depth: 0,
        }
        .document()
    }

    /// Project `event` through the query's `event` selection.
    pub fn project(&self, event: &ProjectionNode) -> Result<Value, QueryError> {
        let mut out = Map::new();
        let mut evaluator = Evaluator {
            fragments: &self.fragments,
            active: Vec::new(),
            visited: 0,
        };
        evaluator.select_into(&self.event, event, &mut out, 0)?;
        Ok(Value::Object(out))
    }
}

// ============ Tokenizer ============

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LBrace,
    RBrace,
    Colon,
    Spread,
    Name(String),
    Other(char),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::LBrace => "{".to_string(),
            Token::RBrace => "}".to_string(),
            Token::Colon => ":".to_string(),
            Token::Spread => "...".to_string(),
            Token::Name(name) => name.clone(),
            Token::Other(c) => c.to_string(),
        }
    }
}

fn tokenize(source: &str) -> Result<Vec<Token>, QueryError> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() || c == ',' || c == '\u{feff}' => {
                chars.next();
            }
            '#' => {
                while let Some(c) = chars.next() {
                    if c == '\n' || c == '\r' {
                        break;
                    }
                }
            }
            '{' => {
                chars.next();
                tokens.push(Token::LBrace);
            }
            '}' => {
                chars.next();
                tokens.push(Token::RBrace);
            }
            ':' => {
                chars.next();
                tokens.push(Token::Colon);
            }
            '.' => {
                for _ in 0..3 {
                    if chars.next() != Some('.') {
                        return Err(QueryError::UnexpectedToken {
                            expected: "`...`",
                            found: ".".to_string(),
                        });
                    }
                }
                tokens.push(Token::Spread);
            }
            c if c == '_' || c.is_ascii_alphabetic() => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c == '_' || c.is_ascii_alphanumeric() {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Name(name));
            }
            other => {
                chars.next();
                tokens.push(Token::Other(other));
            }
        }
    }

    Ok(tokens)
}

// ============ Parser ============

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Selection sets currently open.
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<Token, QueryError> {
        let token = self.tokens.get(self.pos).cloned().ok_or(QueryError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn expect(&mut self, want: Token, expected: &'static str) -> Result<(), QueryError> {
        let token = self.next()?;
        if token == want {
            Ok(())
        } else {
            Err(unexpected(expected, &token))
        }
    }

    fn name(&mut self) -> Result<String, QueryError> {
        match self.next()? {
            Token::Name(name) => Ok(name),
            other => Err(unexpected("a name", &other)),
        }
    }

    fn document(mut self) -> Result<SubscriptionQuery, QueryError> {
        let mut operation = None;
        let mut fragments = HashMap::new();

        while let Some(token) = self.peek() {
            match token {
                Token::Name(keyword) if keyword == "fragment" => {
                    self.pos += 1;
                    let name = self.name()?;
                    let on = self.name()?;
                    if on != "on" {
                        return Err(unexpected("`on`", &Token::Name(on)));
                    }
                    let type_condition = self.name()?;
                    let selections = self.selection_set()?;
                    fragments.insert(
                        name,
                        FragmentDefinition {
                            type_condition,
                            selections,
                        },
                    );
                }
                Token::Name(keyword) if keyword == "subscription" => {
                    self.pos += 1;
                    if let Some(Token::Name(_)) = self.peek() {
                        // Operation name
                        self.pos += 1;
                    }
                    self.reject_unsupported()?;
                    operation = Some(self.selection_set()?);
                }
                Token::LBrace => {
                    operation = Some(self.selection_set()?);
                }
                Token::Name(keyword) if keyword == "query" || keyword == "mutation" => {
                    return Err(QueryError::Unsupported("only subscription operations"));
                }
                other => return Err(unexpected("`subscription` or `fragment`", other)),
            }
        }

        let root = operation.ok_or(QueryError::MissingEvent)?;
        let event = root
            .into_iter()
            .find_map(|selection| match selection {
                Selection::Field {
                    name, selections, ..
                } if name == "event" => Some(selections),
                _ => None,
            })
            .ok_or(QueryError::MissingEvent)?;

        Ok(SubscriptionQuery { event, fragments })
    }

    fn selection_set(&mut self) -> Result<Vec<Selection>, QueryError> {
        if self.depth >= MAX_DEPTH {
            return Err(QueryError::TooDeep);
        }
        self.depth += 1;
        let selections = self.selections();
        self.depth -= 1;
        selections
    }

    fn selections(&mut self) -> Result<Vec<Selection>, QueryError> {
        self.expect(Token::LBrace, "`{`")?;
        let mut selections = Vec::new();
        loop {
            match self.peek() {
                Some(Token::RBrace) => {
                    self.pos += 1;
                    return Ok(selections);
                }
                Some(_) => selections.push(self.selection()?),
                None => return Err(QueryError::UnexpectedEnd),
            }
        }
    }

    fn selection(&mut self) -> Result<Selection, QueryError> {
        if self.peek() == Some(&Token::Spread) {
            self.pos += 1;
            return match self.peek() {
                Some(Token::Name(name)) if name == "on" => {
                    self.pos += 1;
                    let type_condition = Some(self.name()?);
                    self.reject_unsupported()?;
                    let selections = self.selection_set()?;
                    Ok(Selection::InlineFragment {
                        type_condition,
                        selections,
                    })
                }
                Some(Token::Name(_)) => Ok(Selection::FragmentSpread(self.name()?)),
                Some(Token::LBrace) => Ok(Selection::InlineFragment {
                    type_condition: None,
                    selections: self.selection_set()?,
                }),
                Some(other) => Err(unexpected("a fragment", other)),
                None => Err(QueryError::UnexpectedEnd),
            };
        }

        let first = self.name()?;
        let (alias, name) = if self.peek() == Some(&Token::Colon) {
            self.pos += 1;
            (Some(first), self.name()?)
        } else {
            (None, first)
        };

        self.reject_unsupported()?;
        let selections = if self.peek() == Some(&Token::LBrace) {
            self.selection_set()?
        } else {
            Vec::new()
        };

        Ok(Selection::Field {
            alias,
            name,
            selections,
        })
    }

    fn reject_unsupported(&self) -> Result<(), QueryError> {
        match self.peek() {
            Some(Token::Other('(')) => Err(QueryError::Unsupported("arguments and variables")),
            Some(Token::Other('@')) => Err(QueryError::Unsupported("directives")),
            _ => Ok(()),
        }
    }
}

fn unexpected(expected: &'static str, found: &Token) -> QueryError {
    QueryError::UnexpectedToken {
        expected,
        found: found.describe(),
    }
}

// ============ Evaluation ============

struct Evaluator<'a> {
    fragments: &'a HashMap<String, FragmentDefinition>,
    /// Fragments currently being expanded, for cycle detection.
    active: Vec<&'a str>,
    /// Selections visited so far, bounded by `MAX_SELECTIONS`.
    visited: usize,
}

impl<'a> Evaluator<'a> {
    fn select_into(
        &mut self,
        selections: &'a [Selection],
        node: &ProjectionNode,
        out: &mut Map<String, Value>,
        depth: usize,
    ) -> Result<(), QueryError> {
        if depth > MAX_DEPTH {
            return Err(QueryError::TooDeep);
        }

        let ProjectionNode::Object { type_name, fields } = node else {
            return Ok(());
        };

        for selection in selections {
            self.visited += 1;
            if self.visited > MAX_SELECTIONS {
                return Err(QueryError::TooLarge);
            }
            match selection {
                Selection::Field {
                    alias,
                    name,
                    selections,
                } => {
                    let key = alias.as_deref().unwrap_or(name).to_string();
                    let value = if name == "__typename" {
                        Value::String(type_name.to_string())
                    } else {
                        let child = fields
                            .iter()
                            .find(|(field, _)| field == name)
                            .map(|(_, child)| child)
                            .ok_or_else(|| QueryError::UnknownField {
                                type_name: type_name.to_string(),
                                field: name.clone(),
                            })?;
                        self.resolve(name, selections, child, depth)?
                    };
                    out.insert(key, value);
                }
                Selection::InlineFragment {
                    type_condition,
                    selections,
                } => {
                    if type_condition.as_deref().is_none_or(|t| t == *type_name) {
                        self.select_into(selections, node, out, depth + 1)?;
                    }
                }
                Selection::FragmentSpread(name) => {
                    let fragments: &'a HashMap<String, FragmentDefinition> = self.fragments;
                    let (fragment_name, fragment) = fragments
                        .get_key_value(name)
                        .ok_or_else(|| QueryError::UnknownFragment(name.clone()))?;
                    if self.active.contains(&fragment_name.as_str()) {
                        return Err(QueryError::FragmentCycle(name.clone()));
                    }
                    if fragment.type_condition == *type_name {
                        self.active.push(fragment_name);
                        self.select_into(&fragment.selections, node, out, depth + 1)?;
                        self.active.pop();
                    }
                }
            }
        }

        Ok(())
    }

    fn resolve(
        &mut self,
        name: &str,
        selections: &'a [Selection],
        node: &ProjectionNode,
        depth: usize,
    ) -> Result<Value, QueryError> {
        match node {
            ProjectionNode::Scalar(Value::Null) => Ok(Value::Null),
            ProjectionNode::Scalar(value) => {
                if selections.is_empty() {
                    Ok(value.clone())
                } else {
                    Err(QueryError::SelectionNotAllowed(name.to_string()))
                }
            }
            ProjectionNode::Object { .. } => {
                if selections.is_empty() {
                    return Err(QueryError::SelectionRequired(name.to_string()));
                }
                let mut out = Map::new();
                self.select_into(selections, node, &mut out, depth + 1)?;
                Ok(Value::Object(out))
            }
        }
    }
}
