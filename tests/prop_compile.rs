use bson::{Bson, doc};
use odatalite::compile::{DocumentDialect, JsonbDialect, Predicate, compile};
use odatalite::document::{self, Collection};
use odatalite::filter::{FilterNode, Operator as Op, Value};
use odatalite::ParameterSet;
use proptest::prelude::*;

fn comparison() -> impl Strategy<Value = FilterNode> {
    let field = prop_oneof![Just("a"), Just("b"), Just("c")];
    let op = prop_oneof![
        Just(Op::Eq),
        Just(Op::Ne),
        Just(Op::Gt),
        Just(Op::Ge),
        Just(Op::Lt),
        Just(Op::Le)
    ];
    (field, op, 0i64..5).prop_map(|(f, op, v)| FilterNode::cmp(f, op, v))
}

fn ids(col: &Collection, filter: FilterNode) -> Vec<String> {
    let mut sink: Vec<serde_json::Value> = Vec::new();
    document::run_query("s", &ParameterSet::new().with_filter(filter), col, &mut sink).unwrap();
    sink.iter().map(|d| d["_id"].to_string()).collect()
}

fn arbitrary_tree() -> impl Strategy<Value = FilterNode> {
    let leaf = prop_oneof![
        any::<i64>().prop_map(|i| FilterNode::value(i)),
        "[a-z$']{0,6}".prop_map(|s| FilterNode::value(s.as_str())),
        Just(FilterNode::value(Value::Null)),
    ];
    leaf.prop_recursive(6, 48, 2, |inner| {
        let op = prop_oneof![
            Just(Op::Eq),
            Just(Op::Gt),
            Just(Op::And),
            Just(Op::Or),
            Just(Op::StartsWith),
            Just(Op::Contains)
        ];
        (op, inner.clone(), inner).prop_map(|(op, l, r)| FilterNode::binary(op, l, r))
    })
}

proptest! {
    #[test]
    fn prop_quotes_never_survive(raw in "[a-zA-Z' ]{0,24}") {
        let node = FilterNode::cmp("name", Op::Eq, raw.as_str());
        let Predicate::Native(p) = compile(&node, &DocumentDialect).unwrap() else {
            panic!("comparison compiled to match-all");
        };
        let expected = raw.replace('\'', "");
        prop_assert_eq!(p, doc! { "name": { "$eq": expected } });
    }

    #[test]
    fn prop_and_is_associative(
        rows in proptest::collection::vec((0i64..5, 0i64..5, 0i64..5), 0..30),
        a in comparison(),
        b in comparison(),
        c in comparison(),
    ) {
        let col = Collection::new("assoc");
        for (x, y, z) in rows {
            col.insert_document(doc! { "a": x, "b": y, "c": z, "connection_id": "s" }).unwrap();
        }
        let left = FilterNode::and(FilterNode::and(a.clone(), b.clone()), c.clone());
        let right = FilterNode::and(a, FilterNode::and(b, c));
        prop_assert_eq!(ids(&col, left), ids(&col, right));
    }

    #[test]
    fn prop_or_is_associative(
        rows in proptest::collection::vec((0i64..5, 0i64..5, 0i64..5), 0..30),
        a in comparison(),
        b in comparison(),
        c in comparison(),
    ) {
        let col = Collection::new("assoc_or");
        for (x, y, z) in rows {
            col.insert_document(doc! { "a": x, "b": y, "c": z, "connection_id": "s" }).unwrap();
        }
        let left = FilterNode::or(FilterNode::or(a.clone(), b.clone()), c.clone());
        let right = FilterNode::or(a, FilterNode::or(b, c));
        prop_assert_eq!(ids(&col, left), ids(&col, right));
    }

    #[test]
    fn prop_or_is_commutative(
        rows in proptest::collection::vec((0i64..5, 0i64..5, 0i64..5), 0..30),
        a in comparison(),
        b in comparison(),
    ) {
        let col = Collection::new("comm");
        for (x, y, z) in rows {
            col.insert_document(doc! { "a": x, "b": y, "c": z, "connection_id": "s" }).unwrap();
        }
        prop_assert_eq!(
            ids(&col, FilterNode::or(a.clone(), b.clone())),
            ids(&col, FilterNode::or(b, a))
        );
    }

    #[test]
    fn prop_arbitrary_trees_never_panic(tree in arbitrary_tree()) {
        let doc_result = compile(&tree, &DocumentDialect);
        let sql_result = compile(&tree, &JsonbDialect);
        prop_assert_eq!(doc_result.is_ok(), sql_result.is_ok());
        if let Ok(Predicate::Native(p)) = doc_result {
            let sample = doc! { "x": Bson::Null };
            let _ = odatalite::document::eval::matches(&sample, &p);
        }
    }
}
