use crate::errors::ODataError;
use serde::{Deserialize, Serialize};

use super::types::{FilterNode, Operator, Token, Value};

// Serde-facing shape of a filter tree handed over by an out-of-process parser.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterNodeSerde {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FilterNodeSerde>,
}

impl TryFrom<FilterNodeSerde> for FilterNode {
    type Error = ODataError;
    fn try_from(ns: FilterNodeSerde) -> Result<Self, Self::Error> {
        let token = match (ns.op, ns.value) {
            (Some(op), None) => Token::Operator(
                Operator::from_token(&op)
                    .ok_or_else(|| ODataError::syntax(format!("unknown operator '{op}'")))?,
            ),
            (None, Some(v)) => Token::Value(v),
            // `{"value": null}` deserializes to `None`, treat it as a null literal.
            (None, None) if ns.children.is_empty() => Token::Value(Value::Null),
            (None, None) => {
                return Err(ODataError::syntax("node has children but no operator"));
            }
            (Some(_), Some(_)) => {
                return Err(ODataError::syntax("node carries both an operator and a value"));
            }
        };
        let children = ns.children.into_iter().map(Self::try_from).collect::<Result<_, _>>()?;
        Ok(Self { token, children })
    }
}

impl From<&FilterNode> for FilterNodeSerde {
    fn from(node: &FilterNode) -> Self {
        let (op, value) = match &node.token {
            Token::Operator(op) => (Some(op.as_str().to_string()), None),
            Token::Value(v) => (None, Some(v.clone())),
        };
        Self { op, value, children: node.children.iter().map(Self::from).collect() }
    }
}

/// # Errors
/// Returns `InvalidFilterSyntax` if the JSON is malformed or names an unknown operator.
pub fn parse_filter_json(json: &str) -> Result<FilterNode, ODataError> {
    let ns: FilterNodeSerde =
        serde_json::from_str(json).map_err(|e| ODataError::syntax(e.to_string()))?;
    FilterNode::try_from(ns)
}

/// # Errors
/// Returns an error if serialization fails.
pub fn filter_to_json(node: &FilterNode) -> Result<String, ODataError> {
    Ok(serde_json::to_string(&FilterNodeSerde::from(node))?)
}
