use serde_json::Value as JsonValue;

use super::{Comparison, Dialect, Literal, Pattern};

/// Predicate over a single `jsonb` column.
///
/// Paths and values are never spliced into SQL text; rendering binds them as
/// parameters (see [`crate::jsonb::Statement`]).
#[derive(Debug, Clone, PartialEq)]
pub enum JsonbPredicate {
    /// Always true; renders as `TRUE`.
    True,
    /// Never true; stands in for a scope with no fields.
    False,
    /// `(col #> path) <op> value::jsonb`; range operators also require equal `jsonb_typeof`.
    Compare { path: Vec<String>, op: &'static str, value: JsonValue },
    /// `(col #>> path) ~* pattern`, for JSON strings only.
    Matches { path: Vec<String>, pattern: String },
    /// `(col #>> path) = value`, used by the scoping clause.
    TextEquals { path: Vec<String>, value: String },
    All(Box<JsonbPredicate>, Box<JsonbPredicate>),
    Any(Box<JsonbPredicate>, Box<JsonbPredicate>),
}

/// Splits a dotted field name into a `jsonb` path.
#[must_use]
pub fn field_path(field: &str) -> Vec<String> {
    field.split('.').map(str::to_string).collect()
}

/// Lowers filters into `jsonb` path predicates for PostgreSQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonbDialect;

impl JsonbDialect {
    #[must_use]
    pub fn literal(value: Literal) -> JsonValue {
        match value {
            Literal::Null => JsonValue::Null,
            Literal::Boolean(b) => JsonValue::Bool(b),
            Literal::Integer(i) => JsonValue::from(i),
            // Non-finite floats have no JSON form.
            Literal::Float(f) => serde_json::Number::from_f64(f).map_or(JsonValue::Null, JsonValue::Number),
            Literal::String(s) => JsonValue::String(s),
            Literal::ObjectId(oid) => JsonValue::String(oid.to_hex()),
        }
    }
}

impl Dialect for JsonbDialect {
    type Predicate = JsonbPredicate;

    fn operator_token(&self, op: Comparison) -> &'static str {
        match op {
            Comparison::Eq => "=",
            // Missing keys count as "not equal", as they do for documents.
            Comparison::Ne => "IS DISTINCT FROM",
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
        }
    }

    fn compare(&self, field: &str, op: Comparison, value: Literal) -> JsonbPredicate {
        JsonbPredicate::Compare {
            path: field_path(field),
            op: self.operator_token(op),
            value: Self::literal(value),
        }
    }

    fn pattern(&self, field: &str, pattern: &Pattern) -> JsonbPredicate {
        JsonbPredicate::Matches { path: field_path(field), pattern: pattern.regex() }
    }

    fn all_of(&self, left: JsonbPredicate, right: JsonbPredicate) -> JsonbPredicate {
        JsonbPredicate::All(Box::new(left), Box::new(right))
    }

    fn any_of(&self, left: JsonbPredicate, right: JsonbPredicate) -> JsonbPredicate {
        JsonbPredicate::Any(Box::new(left), Box::new(right))
    }

    fn match_all(&self) -> JsonbPredicate {
        JsonbPredicate::True
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile;
    use crate::filter::{FilterNode, Operator as Op};
    use serde_json::json;

    fn native(n: &FilterNode) -> JsonbPredicate {
        compile(n, &JsonbDialect).unwrap().into_native().unwrap()
    }

    #[test]
    fn comparison_binds_json_value() {
        assert_eq!(
            native(&FilterNode::cmp("count", Op::Lt, 0.1)),
            JsonbPredicate::Compare { path: vec!["count".into()], op: "<", value: json!(0.1) }
        );
        assert_eq!(
            native(&FilterNode::cmp("event", Op::Ne, "'departed'")),
            JsonbPredicate::Compare {
                path: vec!["event".into()],
                op: "IS DISTINCT FROM",
                value: json!("departed")
            }
        );
    }

    #[test]
    fn dotted_fields_become_paths() {
        let p = native(&FilterNode::cmp("meta.owner.name", Op::Eq, "'a'"));
        assert!(matches!(p, JsonbPredicate::Compare { ref path, .. } if path == &["meta", "owner", "name"]));
    }

    #[test]
    fn object_id_rendered_as_hex_text() {
        let p = native(&FilterNode::cmp("_id", Op::Ge, "'5F1D7A2B9C3E4D5F6A7B8C9D'"));
        assert_eq!(
            p,
            JsonbPredicate::Compare {
                path: vec!["_id".into()],
                op: ">=",
                value: json!("5f1d7a2b9c3e4d5f6a7b8c9d")
            }
        );
    }

    #[test]
    fn endswith_builds_regex() {
        assert_eq!(
            native(&FilterNode::cmp("upc_code", Op::EndsWith, "'789'")),
            JsonbPredicate::Matches { path: vec!["upc_code".into()], pattern: "789$".into() }
        );
    }

    #[test]
    fn non_finite_float_becomes_null() {
        assert_eq!(JsonbDialect::literal(Literal::Float(f64::NAN)), JsonValue::Null);
    }
}
