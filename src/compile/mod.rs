//! Lowering of a filter AST into a backend-native predicate.
//!
//! The traversal lives here once; everything backend-specific sits behind
//! [`Dialect`]. Two dialects ship with the crate: [`DocumentDialect`] (BSON
//! query documents) and [`JsonbDialect`] (SQL over a `jsonb` column).

mod document;
mod jsonb;

pub use document::DocumentDialect;
pub use jsonb::{JsonbDialect, JsonbPredicate, field_path};

use crate::config::QueryOptions;
use crate::errors::ODataError;
use crate::filter::{FilterNode, Operator, OperatorKind, Token, Value};
use bson::oid::ObjectId;
use std::fmt;

/// Comparison operators after lowering (`ge`/`le` become inclusive ranges).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparison {
    #[must_use]
    pub const fn is_range(self) -> bool {
        matches!(self, Self::Gt | Self::Gte | Self::Lt | Self::Lte)
    }

    const fn from_operator(op: Operator) -> Option<Self> {
        Some(match op {
            Operator::Eq => Self::Eq,
            Operator::Ne => Self::Ne,
            Operator::Gt => Self::Gt,
            Operator::Ge => Self::Gte,
            Operator::Lt => Self::Lt,
            Operator::Le => Self::Lte,
            _ => return None,
        })
    }
}

/// Sanitized comparison operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    ObjectId(ObjectId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    StartsWith,
    EndsWith,
    Contains,
}

/// Case-insensitive string-match condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub kind: PatternKind,
    /// Sanitized literal text, not yet escaped.
    pub text: String,
}

impl Pattern {
    /// Regular expression matching the literal text at the anchor implied by `kind`.
    #[must_use]
    pub fn regex(&self) -> String {
        let escaped = regex::escape(&self.text);
        match self.kind {
            PatternKind::StartsWith => format!("^{escaped}"),
            PatternKind::EndsWith => format!("{escaped}$"),
            PatternKind::Contains => escaped,
        }
    }
}

/// Compiled filter: either no restriction at all or a native predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate<P> {
    MatchAll,
    Native(P),
}

impl<P> Predicate<P> {
    #[must_use]
    pub const fn is_match_all(&self) -> bool {
        matches!(self, Self::MatchAll)
    }

    pub fn into_native(self) -> Option<P> {
        match self {
            Self::MatchAll => None,
            Self::Native(p) => Some(p),
        }
    }
}

/// Backend capabilities needed by the shared traversal.
pub trait Dialect {
    type Predicate: Clone + fmt::Debug;

    /// Native spelling of a comparison operator.
    fn operator_token(&self, op: Comparison) -> &'static str;
    fn compare(&self, field: &str, op: Comparison, value: Literal) -> Self::Predicate;
    fn pattern(&self, field: &str, pattern: &Pattern) -> Self::Predicate;
    fn all_of(&self, left: Self::Predicate, right: Self::Predicate) -> Self::Predicate;
    fn any_of(&self, left: Self::Predicate, right: Self::Predicate) -> Self::Predicate;
    /// Native form of [`Predicate::MatchAll`], used when a predicate must be materialized.
    fn match_all(&self) -> Self::Predicate;

    fn materialize(&self, predicate: Predicate<Self::Predicate>) -> Self::Predicate {
        match predicate {
            Predicate::MatchAll => self.match_all(),
            Predicate::Native(p) => p,
        }
    }
}

/// Removes every single quote from a string literal.
#[must_use]
pub fn strip_quotes(s: &str) -> String {
    s.replace('\'', "")
}

pub struct Compiler<'a, D: Dialect> {
    dialect: &'a D,
    options: &'a QueryOptions,
}

impl<'a, D: Dialect> Compiler<'a, D> {
    #[must_use]
    pub const fn new(dialect: &'a D, options: &'a QueryOptions) -> Self {
        Self { dialect, options }
    }

    /// # Errors
    /// Returns `InvalidFilterSyntax` when the tree violates the operator shapes.
    pub fn compile(&self, node: &FilterNode) -> Result<Predicate<D::Predicate>, ODataError> {
        let out = self.lower(node, 1)?;
        log::debug!("compiled filter: {out:?}");
        Ok(out)
    }

    fn lower(&self, node: &FilterNode, depth: usize) -> Result<Predicate<D::Predicate>, ODataError> {
        if depth > self.options.max_depth {
            return Err(ODataError::syntax(format!(
                "filter nesting exceeds {} levels",
                self.options.max_depth
            )));
        }
        let op = match &node.token {
            Token::Value(_) if node.is_leaf() => return Ok(Predicate::MatchAll),
            Token::Value(v) => {
                if self.options.strict_nodes {
                    return Err(ODataError::syntax(format!("value {v:?} used as an operator")));
                }
                log::warn!("filter node {v:?} has children but no operator; matching all");
                return Ok(Predicate::MatchAll);
            }
            Token::Operator(op) => *op,
        };
        let [left, right] = node.children.as_slice() else {
            return Err(ODataError::syntax(format!(
                "operator '{op}' expects 2 operands, got {}",
                node.children.len()
            )));
        };
        match op.kind() {
            OperatorKind::Logical => {
                let l = self.operand(left, depth)?;
                let r = self.operand(right, depth)?;
                Ok(self.combine(op, l, r))
            }
            OperatorKind::Comparison => {
                let field = self.field_name(op, left)?;
                let cmp = Comparison::from_operator(op)
                    .ok_or_else(|| ODataError::syntax(format!("'{op}' is not a comparison")))?;
                let value = self.comparison_literal(field, cmp, right)?;
                Ok(Predicate::Native(self.dialect.compare(field, cmp, value)))
            }
            OperatorKind::Function => {
                let field = self.field_name(op, left)?;
                let text = match &right.token {
                    Token::Value(Value::String(s)) if right.is_leaf() => strip_quotes(s),
                    _ => {
                        return Err(ODataError::syntax(format!(
                            "{op}() requires a string literal"
                        )));
                    }
                };
                let kind = match op {
                    Operator::StartsWith => PatternKind::StartsWith,
                    Operator::EndsWith => PatternKind::EndsWith,
                    _ => PatternKind::Contains,
                };
                let pattern = Pattern { kind, text };
                Ok(Predicate::Native(self.dialect.pattern(field, &pattern)))
            }
        }
    }

    // Each side is compiled and checked on its own, left before right.
    fn operand(&self, node: &FilterNode, depth: usize) -> Result<Predicate<D::Predicate>, ODataError> {
        if self.options.strict_nodes && matches!(node.token, Token::Value(_)) {
            return Err(ODataError::syntax("logical operands must be expressions"));
        }
        self.lower(node, depth + 1)
    }

    fn combine(
        &self,
        op: Operator,
        left: Predicate<D::Predicate>,
        right: Predicate<D::Predicate>,
    ) -> Predicate<D::Predicate> {
        use Predicate::{MatchAll, Native};
        match (op, left, right) {
            (Operator::And, MatchAll, other) | (Operator::And, other, MatchAll) => other,
            (Operator::And, Native(l), Native(r)) => Native(self.dialect.all_of(l, r)),
            (_, MatchAll, _) | (_, _, MatchAll) => MatchAll,
            (_, Native(l), Native(r)) => Native(self.dialect.any_of(l, r)),
        }
    }

    fn field_name<'n>(&self, op: Operator, node: &'n FilterNode) -> Result<&'n str, ODataError> {
        let name = match &node.token {
            Token::Value(Value::String(s)) if node.is_leaf() => s.as_str(),
            _ => {
                return Err(ODataError::syntax(format!(
                    "left operand of '{op}' must be a field name"
                )));
            }
        };
        if name.is_empty() || name.starts_with('$') {
            return Err(ODataError::syntax(format!("invalid field name '{name}'")));
        }
        Ok(name)
    }

    fn comparison_literal(
        &self,
        field: &str,
        op: Comparison,
        node: &FilterNode,
    ) -> Result<Literal, ODataError> {
        let value = match &node.token {
            Token::Value(v) if node.is_leaf() => v,
            _ => {
                return Err(ODataError::syntax(format!(
                    "right operand of '{field}' comparison must be a literal"
                )));
            }
        };
        let is_id = field == self.options.id_field;
        Ok(match value {
            Value::String(s) => {
                let s = strip_quotes(s);
                match ObjectId::parse_str(&s) {
                    Ok(oid) if is_id => Literal::ObjectId(oid),
                    Err(_) if is_id && op.is_range() => {
                        return Err(ODataError::syntax(format!("'{s}' is not a valid object id")));
                    }
                    _ => Literal::String(s),
                }
            }
            _ if is_id && op.is_range() => {
                return Err(ODataError::syntax(format!("{field} requires an object id literal")));
            }
            Value::Null => Literal::Null,
            Value::Boolean(b) => Literal::Boolean(*b),
            Value::Integer(i) => Literal::Integer(*i),
            Value::Float(f) => Literal::Float(*f),
        })
    }
}

/// Compiles with default [`QueryOptions`].
///
/// # Errors
/// Returns `InvalidFilterSyntax` when the tree violates the operator shapes.
pub fn compile<D: Dialect>(
    node: &FilterNode,
    dialect: &D,
) -> Result<Predicate<D::Predicate>, ODataError> {
    Compiler::new(dialect, &QueryOptions::default()).compile(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Operator as Op;

    // Renders predicates as plain strings to check the traversal independently of any backend.
    struct Echo;

    impl Dialect for Echo {
        type Predicate = String;
        fn operator_token(&self, op: Comparison) -> &'static str {
            match op {
                Comparison::Eq => "==",
                Comparison::Ne => "!=",
                Comparison::Gt => ">",
                Comparison::Gte => ">=",
                Comparison::Lt => "<",
                Comparison::Lte => "<=",
            }
        }
        fn compare(&self, field: &str, op: Comparison, value: Literal) -> String {
            format!("{field} {} {value:?}", self.operator_token(op))
        }
        fn pattern(&self, field: &str, pattern: &Pattern) -> String {
            format!("{field} ~ {}", pattern.regex())
        }
        fn all_of(&self, l: String, r: String) -> String {
            format!("({l} AND {r})")
        }
        fn any_of(&self, l: String, r: String) -> String {
            format!("({l} OR {r})")
        }
        fn match_all(&self) -> String {
            "TRUE".into()
        }
    }

    fn native(n: &FilterNode) -> String {
        compile(n, &Echo).unwrap().into_native().unwrap()
    }

    #[test]
    fn quotes_stripped_from_every_comparison() {
        for op in [Op::Eq, Op::Ne, Op::Gt, Op::Ge, Op::Lt, Op::Le] {
            let s = native(&FilterNode::cmp("name", op, "'O'Brien'"));
            assert!(s.ends_with("String(\"OBrien\")"), "{op}: {s}");
        }
    }

    #[test]
    fn ge_le_map_to_inclusive_ranges() {
        assert_eq!(native(&FilterNode::cmp("age", Op::Ge, 10)), "age >= Integer(10)");
        assert_eq!(native(&FilterNode::cmp("age", Op::Le, 10)), "age <= Integer(10)");
    }

    #[test]
    fn id_range_requires_object_id() {
        let bad = FilterNode::cmp("_id", Op::Gt, "'zzz'");
        assert!(matches!(compile(&bad, &Echo), Err(ODataError::InvalidFilterSyntax(_))));
        let not_string = FilterNode::cmp("_id", Op::Lt, 5);
        assert!(compile(&not_string, &Echo).is_err());
        let good = FilterNode::cmp("_id", Op::Gt, "'5f1d7a2b9c3e4d5f6a7b8c9d'");
        assert!(native(&good).contains("ObjectId("));
    }

    #[test]
    fn id_equality_keeps_non_hex_strings() {
        let s = native(&FilterNode::cmp("_id", Op::Eq, "'custom-key'"));
        assert_eq!(s, "_id == String(\"custom-key\")");
        let s = native(&FilterNode::cmp("_id", Op::Eq, "'5f1d7a2b9c3e4d5f6a7b8c9d'"));
        assert!(s.contains("ObjectId("));
    }

    #[test]
    fn hex_strings_on_other_fields_stay_strings() {
        let s = native(&FilterNode::cmp("ref", Op::Gt, "'5f1d7a2b9c3e4d5f6a7b8c9d'"));
        assert!(s.contains("String("));
    }

    #[test]
    fn functions_build_anchored_patterns() {
        assert_eq!(native(&FilterNode::cmp("name", Op::StartsWith, "'Jo'")), "name ~ ^Jo");
        assert_eq!(native(&FilterNode::cmp("name", Op::EndsWith, "'Jo'")), "name ~ Jo$");
        assert_eq!(native(&FilterNode::cmp("name", Op::Contains, "'a.b'")), "name ~ a\\.b");
    }

    #[test]
    fn function_requires_string_literal() {
        let n = FilterNode::cmp("name", Op::Contains, 3);
        assert!(compile(&n, &Echo).is_err());
    }

    #[test]
    fn field_must_be_a_string_token() {
        let n = FilterNode::binary(Op::Eq, FilterNode::value(0), FilterNode::field("x"));
        assert!(compile(&n, &Echo).is_err());
        let n = FilterNode::cmp("$where", Op::Eq, "'1'");
        assert!(compile(&n, &Echo).is_err());
    }

    #[test]
    fn logical_nodes_nest() {
        let n = FilterNode::or(
            FilterNode::and(FilterNode::cmp("a", Op::Eq, 1), FilterNode::cmp("b", Op::Ne, true)),
            FilterNode::cmp("c", Op::Lt, 0.5),
        );
        assert_eq!(
            native(&n),
            "((a == Integer(1) AND b != Boolean(true)) OR c < Float(0.5))"
        );
    }

    #[test]
    fn left_error_wins_for_or() {
        let bad_left = FilterNode::cmp("_id", Op::Gt, "'nope'");
        let bad_right = FilterNode::cmp("name", Op::Contains, 1);
        let n = FilterNode::or(bad_left, bad_right);
        let err = compile(&n, &Echo).unwrap_err().to_string();
        assert!(err.contains("object id"), "{err}");
    }

    #[test]
    fn right_error_is_not_swallowed() {
        let n = FilterNode::or(
            FilterNode::cmp("a", Op::Eq, 1),
            FilterNode::cmp("_id", Op::Ge, "'bad'"),
        );
        assert!(compile(&n, &Echo).is_err());
        let n = FilterNode::and(
            FilterNode::cmp("a", Op::Eq, 1),
            FilterNode::cmp("_id", Op::Le, "'bad'"),
        );
        assert!(compile(&n, &Echo).is_err());
    }

    #[test]
    fn leaf_root_matches_all() {
        assert!(compile(&FilterNode::field("name"), &Echo).unwrap().is_match_all());
    }

    #[test]
    fn match_all_operands_simplify() {
        let a = FilterNode::cmp("a", Op::Eq, 1);
        let and = FilterNode::and(FilterNode::field("x"), a.clone());
        assert_eq!(native(&and), "a == Integer(1)");
        let or = FilterNode::or(FilterNode::field("x"), a);
        assert!(compile(&or, &Echo).unwrap().is_match_all());
    }

    #[test]
    fn malformed_node_permissive_vs_strict() {
        let malformed = FilterNode {
            token: Token::Value(Value::from("oops")),
            children: vec![FilterNode::field("a"), FilterNode::value(1)],
        };
        assert!(compile(&malformed, &Echo).unwrap().is_match_all());
        let strict = QueryOptions { strict_nodes: true, ..QueryOptions::default() };
        let c = Compiler::new(&Echo, &strict);
        assert!(c.compile(&malformed).is_err());
        let bare_operand = FilterNode::and(FilterNode::field("x"), FilterNode::cmp("a", Op::Eq, 1));
        assert!(c.compile(&bare_operand).is_err());
        assert!(c.compile(&FilterNode::field("x")).unwrap().is_match_all());
    }

    #[test]
    fn operator_arity_checked() {
        let n = FilterNode { token: Token::Operator(Op::Eq), children: vec![FilterNode::field("a")] };
        assert!(compile(&n, &Echo).is_err());
    }

    #[test]
    fn nesting_limit_enforced() {
        let mut n = FilterNode::cmp("a", Op::Eq, 1);
        for _ in 0..10 {
            n = FilterNode::and(n, FilterNode::cmp("b", Op::Eq, 2));
        }
        let shallow = QueryOptions { max_depth: 4, ..QueryOptions::default() };
        assert!(Compiler::new(&Echo, &shallow).compile(&n).is_err());
        assert!(compile(&n, &Echo).is_ok());
    }

    #[test]
    fn compile_does_not_touch_the_tree() {
        let n = FilterNode::cmp("name", Op::Eq, "'x'");
        let before = n.clone();
        let _ = compile(&n, &Echo).unwrap();
        assert_eq!(n, before);
    }
}
