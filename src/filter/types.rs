use serde::{Deserialize, Serialize};
use std::fmt;

/// Operators recognised in a parsed `$filter` expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    And,
    Or,
    StartsWith,
    EndsWith,
    Contains,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKind {
    Comparison,
    Logical,
    Function,
}

impl Operator {
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "eq" => Self::Eq,
            "ne" => Self::Ne,
            "gt" => Self::Gt,
            "ge" => Self::Ge,
            "lt" => Self::Lt,
            "le" => Self::Le,
            "and" => Self::And,
            "or" => Self::Or,
            "startswith" => Self::StartsWith,
            "endswith" => Self::EndsWith,
            "contains" => Self::Contains,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Ge => "ge",
            Self::Lt => "lt",
            Self::Le => "le",
            Self::And => "and",
            Self::Or => "or",
            Self::StartsWith => "startswith",
            Self::EndsWith => "endswith",
            Self::Contains => "contains",
        }
    }

    #[must_use]
    pub const fn kind(self) -> OperatorKind {
        match self {
            Self::Eq | Self::Ne | Self::Gt | Self::Ge | Self::Lt | Self::Le => {
                OperatorKind::Comparison
            }
            Self::And | Self::Or => OperatorKind::Logical,
            Self::StartsWith | Self::EndsWith | Self::Contains => OperatorKind::Function,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A literal or field-name token as produced by the query-string parser.
///
/// Identifiers and quoted strings both arrive as `String`; quoted strings still
/// carry their single quotes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl Value {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Operator(Operator),
    Value(Value),
}

/// Node of a parsed filter expression.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterNode {
    pub token: Token,
    pub children: Vec<FilterNode>,
}

impl FilterNode {
    #[must_use]
    pub const fn leaf(value: Value) -> Self {
        Self { token: Token::Value(value), children: Vec::new() }
    }

    /// Field-name leaf.
    #[must_use]
    pub fn field(name: &str) -> Self {
        Self::leaf(Value::String(name.to_string()))
    }

    #[must_use]
    pub fn value(v: impl Into<Value>) -> Self {
        Self::leaf(v.into())
    }

    #[must_use]
    pub fn binary(op: Operator, left: Self, right: Self) -> Self {
        Self { token: Token::Operator(op), children: vec![left, right] }
    }

    /// `field op value`, the shape produced for comparisons and functions alike.
    #[must_use]
    pub fn cmp(field: &str, op: Operator, value: impl Into<Value>) -> Self {
        Self::binary(op, Self::field(field), Self::value(value))
    }

    #[must_use]
    pub fn and(left: Self, right: Self) -> Self {
        Self::binary(Operator::And, left, right)
    }

    #[must_use]
    pub fn or(left: Self, right: Self) -> Self {
        Self::binary(Operator::Or, left, right)
    }

    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    #[must_use]
    pub const fn operator(&self) -> Option<Operator> {
        match self.token {
            Token::Operator(op) => Some(op),
            Token::Value(_) => None,
        }
    }

    /// Depth of the tree; a leaf has depth 1.
    #[must_use]
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(Self::depth).max().unwrap_or(0)
    }
}
