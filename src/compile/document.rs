use bson::{Bson, Document as BsonDocument, doc};

use super::{Comparison, Dialect, Literal, Pattern};

/// Lowers filters into MongoDB-style query documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentDialect;

impl DocumentDialect {
    #[must_use]
    pub fn literal(value: Literal) -> Bson {
        match value {
            Literal::Null => Bson::Null,
            Literal::Boolean(b) => Bson::Boolean(b),
            Literal::Integer(i) => Bson::Int64(i),
            Literal::Float(f) => Bson::Double(f),
            Literal::String(s) => Bson::String(s),
            Literal::ObjectId(oid) => Bson::ObjectId(oid),
        }
    }
}

impl Dialect for DocumentDialect {
    type Predicate = BsonDocument;

    fn operator_token(&self, op: Comparison) -> &'static str {
        match op {
            Comparison::Eq => "$eq",
            Comparison::Ne => "$ne",
            Comparison::Gt => "$gt",
            Comparison::Gte => "$gte",
            Comparison::Lt => "$lt",
            Comparison::Lte => "$lte",
        }
    }

    fn compare(&self, field: &str, op: Comparison, value: Literal) -> BsonDocument {
        let mut cond = BsonDocument::new();
        cond.insert(self.operator_token(op), Self::literal(value));
        let mut out = BsonDocument::new();
        out.insert(field, cond);
        out
    }

    fn pattern(&self, field: &str, pattern: &Pattern) -> BsonDocument {
        let mut out = BsonDocument::new();
        out.insert(field, doc! { "$regex": pattern.regex(), "$options": "i" });
        out
    }

    fn all_of(&self, left: BsonDocument, right: BsonDocument) -> BsonDocument {
        doc! { "$and": [left, right] }
    }

    fn any_of(&self, left: BsonDocument, right: BsonDocument) -> BsonDocument {
        doc! { "$or": [left, right] }
    }

    fn match_all(&self) -> BsonDocument {
        BsonDocument::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{Predicate, compile};
    use crate::filter::{FilterNode, Operator as Op};
    use bson::oid::ObjectId;

    fn native(n: &FilterNode) -> BsonDocument {
        compile(n, &DocumentDialect).unwrap().into_native().unwrap()
    }

    #[test]
    fn equality_sanitizes_quotes() {
        let d = native(&FilterNode::cmp("name", Op::Eq, "'O'Brien'"));
        assert_eq!(d, doc! { "name": { "$eq": "OBrien" } });
    }

    #[test]
    fn range_tokens() {
        assert_eq!(native(&FilterNode::cmp("age", Op::Ge, 10)), doc! { "age": { "$gte": 10_i64 } });
        assert_eq!(native(&FilterNode::cmp("age", Op::Le, 1.5)), doc! { "age": { "$lte": 1.5 } });
        assert_eq!(native(&FilterNode::cmp("ok", Op::Ne, true)), doc! { "ok": { "$ne": true } });
    }

    #[test]
    fn id_literal_is_typed() {
        let hex = "5f1d7a2b9c3e4d5f6a7b8c9d";
        let d = native(&FilterNode::cmp("_id", Op::Gt, format!("'{hex}'")));
        let oid = ObjectId::parse_str(hex).unwrap();
        assert_eq!(d, doc! { "_id": { "$gt": oid } });
    }

    #[test]
    fn startswith_is_case_insensitive_regex() {
        let d = native(&FilterNode::cmp("name", Op::StartsWith, "'Jo'"));
        assert_eq!(d, doc! { "name": { "$regex": "^Jo", "$options": "i" } });
    }

    #[test]
    fn connectives_are_two_element_arrays() {
        let n = FilterNode::or(FilterNode::cmp("a", Op::Eq, 1), FilterNode::cmp("b", Op::Eq, 2));
        assert_eq!(
            native(&n),
            doc! { "$or": [ { "a": { "$eq": 1_i64 } }, { "b": { "$eq": 2_i64 } } ] }
        );
    }

    #[test]
    fn match_all_materializes_to_empty_document() {
        let p: Predicate<BsonDocument> = Predicate::MatchAll;
        assert!(DocumentDialect.materialize(p).is_empty());
    }
}
