// Filter AST handed over by the query-string parser.
mod parse;
mod types;

pub use parse::{FilterNodeSerde, filter_to_json, parse_filter_json};
pub use types::{FilterNode, Operator, OperatorKind, Token, Value};
