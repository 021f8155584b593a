//! PostgreSQL backend: records live in one `jsonb` column of a table.

#[cfg(feature = "postgres")]
mod client;
mod params;
mod sql;

#[cfg(feature = "postgres")]
pub use client::connect;
pub use params::SqlParam;
#[cfg(feature = "postgres")]
pub use params::{PgParam, PgParamStore};
pub use sql::{Statement, count_all_statement, count_statement, quote_ident, select_statement};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::Instant;

use crate::compile::{Compiler, Dialect, JsonbDialect, JsonbPredicate, Predicate, field_path};
use crate::config::QueryOptions;
use crate::devlog::{self, QueryBench};
use crate::errors::ODataError;
use crate::params::{Direction, ParameterSet};
use crate::scope::ScopeClause;

/// Table and `jsonb` column holding the records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonbTarget {
    pub table: String,
    pub column: String,
}

impl JsonbTarget {
    /// # Errors
    /// Returns `Config` when either name is empty.
    pub fn new(table: &str, column: &str) -> Result<Self, ODataError> {
        if table.trim().is_empty() || table.split('.').any(str::is_empty) {
            return Err(ODataError::Config(format!("invalid table name '{table}'")));
        }
        if column.trim().is_empty() {
            return Err(ODataError::Config("column name must not be empty".into()));
        }
        Ok(Self { table: table.to_string(), column: column.to_string() })
    }
}

/// Native query descriptor for the `jsonb` backend.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonbQuery {
    pub predicate: JsonbPredicate,
    /// Top-level keys of the returned object; `None` returns the whole column.
    pub projection: Option<Vec<String>>,
    pub order: Vec<(Vec<String>, Direction)>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Execution boundary for the `jsonb` backend.
#[async_trait]
pub trait JsonbClient: Send + Sync {
    /// Runs a statement whose single column is a `jsonb` document.
    async fn fetch_documents(&self, statement: &Statement) -> Result<Vec<JsonValue>, ODataError>;

    /// Runs a `COUNT(*)` statement.
    async fn fetch_count(&self, statement: &Statement) -> Result<i64, ODataError>;
}

/// Scope condition: the scope id equals at least one scope field as text.
#[must_use]
pub fn scope_predicate(scope: &ScopeClause) -> JsonbPredicate {
    scope
        .fields
        .iter()
        .map(|f| JsonbPredicate::TextEquals { path: field_path(f), value: scope.value.clone() })
        .reduce(|l, r| JsonbPredicate::Any(Box::new(l), Box::new(r)))
        .unwrap_or(JsonbPredicate::False)
}

#[must_use]
pub fn assemble(
    predicate: Predicate<JsonbPredicate>,
    params: &ParameterSet,
    scope: &ScopeClause,
) -> JsonbQuery {
    let scoped = scope_predicate(scope);
    let predicate = match predicate {
        Predicate::MatchAll => scoped,
        Predicate::Native(p) => JsonbDialect.all_of(p, scoped),
    };
    let mut order: Vec<(Vec<String>, Direction)> = Vec::new();
    for item in params.order_items() {
        let path = field_path(&item.field);
        if order.iter().any(|(seen, _)| *seen == path) {
            continue;
        }
        let dir = if item.is_descending() { Direction::Desc } else { Direction::Asc };
        order.push((path, dir));
    }
    JsonbQuery {
        predicate,
        projection: params.projection_fields().map(<[String]>::to_vec),
        order,
        limit: params.top,
        offset: params.skip,
    }
}

/// # Errors
/// Returns `InvalidFilterSyntax` when the filter cannot be compiled.
pub fn build_query(scope_id: &str, params: &ParameterSet) -> Result<JsonbQuery, ODataError> {
    build_query_with(&QueryOptions::default(), scope_id, params)
}

/// # Errors
/// Returns `Config` for invalid options and `InvalidFilterSyntax` for bad filters.
pub fn build_query_with(
    options: &QueryOptions,
    scope_id: &str,
    params: &ParameterSet,
) -> Result<JsonbQuery, ODataError> {
    options.validate()?;
    let predicate = match &params.filter {
        Some(node) => Compiler::new(&JsonbDialect, options).compile(node)?,
        None => Predicate::MatchAll,
    };
    Ok(assemble(predicate, params, &ScopeClause::new(scope_id, options)))
}

/// Runs the page query into `sink` and returns the total number of matches.
///
/// # Errors
/// Compilation, backend and record decoding errors are returned unchanged.
pub async fn run_query<C, T>(
    scope_id: &str,
    params: &ParameterSet,
    client: &C,
    target: &JsonbTarget,
    sink: &mut Vec<T>,
) -> Result<u64, ODataError>
where
    C: JsonbClient + ?Sized,
    T: DeserializeOwned,
{
    run_query_with(&QueryOptions::default(), scope_id, params, client, target, sink).await
}

/// # Errors
/// Compilation, backend and record decoding errors are returned unchanged.
pub async fn run_query_with<C, T>(
    options: &QueryOptions,
    scope_id: &str,
    params: &ParameterSet,
    client: &C,
    target: &JsonbTarget,
    sink: &mut Vec<T>,
) -> Result<u64, ODataError>
where
    C: JsonbClient + ?Sized,
    T: DeserializeOwned,
{
    let query = build_query_with(options, scope_id, params)?;
    let page = select_statement(&query, target);
    let count = count_statement(&query, target);
    log::debug!("jsonb page query: {}", page.sql);

    let start = Instant::now();
    let rows = client.fetch_documents(&page).await?;
    sink.clear();
    sink.reserve(rows.len());
    for row in rows {
        sink.push(serde_json::from_value(row)?);
    }
    let total = to_count(client.fetch_count(&count).await?)?;
    devlog::record(QueryBench::find("jsonb", &target.table, start, sink.len(), total));
    Ok(total)
}

/// Unfiltered, unscoped row count of the target table.
///
/// # Errors
/// Returns the client's error.
pub async fn count_only<C: JsonbClient + ?Sized>(
    client: &C,
    target: &JsonbTarget,
) -> Result<u64, ODataError> {
    let start = Instant::now();
    let n = to_count(client.fetch_count(&count_all_statement(target)).await?)?;
    devlog::record(QueryBench::count("jsonb", &target.table, start, n));
    Ok(n)
}

fn to_count(n: i64) -> Result<u64, ODataError> {
    u64::try_from(n).map_err(|_| ODataError::backend(format!("negative row count {n}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterNode, Operator as Op};
    use crate::params::OrderItem;
    use serde_json::json;

    #[test]
    fn target_names_validated() {
        assert!(JsonbTarget::new("items", "data").is_ok());
        assert!(matches!(JsonbTarget::new("", "data"), Err(ODataError::Config(_))));
        assert!(matches!(JsonbTarget::new("s.", "data"), Err(ODataError::Config(_))));
        assert!(matches!(JsonbTarget::new("items", " "), Err(ODataError::Config(_))));
    }

    #[test]
    fn scope_is_a_disjunction_of_text_equalities() {
        let scope = ScopeClause::new("c1", &QueryOptions::default());
        assert_eq!(
            scope_predicate(&scope),
            JsonbPredicate::Any(
                Box::new(JsonbPredicate::TextEquals {
                    path: vec!["connection_id".into()],
                    value: "c1".into()
                }),
                Box::new(JsonbPredicate::TextEquals {
                    path: vec!["connection".into()],
                    value: "c1".into()
                }),
            )
        );
        let empty = ScopeClause { value: "c1".into(), fields: Vec::new() };
        assert_eq!(scope_predicate(&empty), JsonbPredicate::False);
    }

    #[test]
    fn build_query_ands_filter_with_scope() {
        let params = ParameterSet::new()
            .with_filter(FilterNode::cmp("age", Op::Ge, 21))
            .with_select(&["name", "age"])
            .with_order_by(vec![OrderItem::new("meta.ts", Some("desc"))])
            .with_top(5);
        let q = build_query("c1", &params).unwrap();
        let JsonbPredicate::All(left, right) = &q.predicate else {
            panic!("expected conjunction, got {:?}", q.predicate);
        };
        assert_eq!(
            **left,
            JsonbPredicate::Compare { path: vec!["age".into()], op: ">=", value: json!(21) }
        );
        assert!(matches!(**right, JsonbPredicate::Any(..)));
        assert_eq!(q.projection, Some(vec!["name".to_string(), "age".to_string()]));
        assert_eq!(q.order, vec![(vec!["meta".to_string(), "ts".to_string()], Direction::Desc)]);
        assert_eq!((q.limit, q.offset), (Some(5), None));
    }

    #[test]
    fn repeated_sort_field_keeps_first_direction() {
        let params = ParameterSet::new().with_order_by(vec![
            OrderItem::new("a", Some("asc")),
            OrderItem::new("b", None),
            OrderItem::new("a", Some("desc")),
        ]);
        let q = build_query("c1", &params).unwrap();
        assert_eq!(
            q.order,
            vec![(vec!["a".to_string()], Direction::Asc), (vec!["b".to_string()], Direction::Asc)]
        );
    }

    #[test]
    fn negative_counts_are_backend_errors() {
        assert_eq!(to_count(4).unwrap(), 4);
        assert!(matches!(to_count(-1), Err(ODataError::BackendExecution(_))));
    }
}
