//! Document-store backend: query assembly plus execution against a [`DocumentStore`].

pub mod eval;
mod store;

pub use store::Collection;

use bson::{Bson, Document as BsonDocument, doc};
use serde::de::DeserializeOwned;
use std::time::Instant;

use crate::compile::{Compiler, DocumentDialect, Predicate};
use crate::config::QueryOptions;
use crate::devlog::{self, QueryBench};
use crate::errors::ODataError;
use crate::params::ParameterSet;
use crate::scope::ScopeClause;

/// Native query descriptor for a MongoDB-style store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentQuery {
    pub filter: BsonDocument,
    /// `None` returns whole documents.
    pub projection: Option<BsonDocument>,
    pub sort: BsonDocument,
    pub limit: Option<i64>,
    pub skip: Option<i64>,
}

/// Execution boundary for document stores.
pub trait DocumentStore {
    /// # Errors
    /// Returns `BackendExecution` when the store rejects the query.
    fn find(&self, query: &DocumentQuery) -> Result<Vec<BsonDocument>, ODataError>;

    /// # Errors
    /// Returns `BackendExecution` when the store rejects the filter.
    fn count(&self, filter: &BsonDocument) -> Result<u64, ODataError>;

    /// # Errors
    /// Returns `BackendExecution` when the store cannot be read.
    fn count_all(&self) -> Result<u64, ODataError>;

    fn name(&self) -> String {
        String::from("documents")
    }
}

/// Filter restricting results to records owned by the scope id.
#[must_use]
pub fn scope_document(scope: &ScopeClause) -> BsonDocument {
    let mut arms: Vec<BsonDocument> = scope
        .fields
        .iter()
        .map(|f| {
            let mut d = BsonDocument::new();
            d.insert(f.as_str(), scope.value.as_str());
            d
        })
        .collect();
    if arms.len() == 1 {
        return arms.remove(0);
    }
    doc! { "$or": arms }
}

/// Combines a compiled predicate with the scope, projection, ordering and paging.
#[must_use]
pub fn assemble(
    predicate: Predicate<BsonDocument>,
    params: &ParameterSet,
    scope: &ScopeClause,
    id_field: &str,
) -> DocumentQuery {
    let scoped = scope_document(scope);
    let filter = match predicate {
        Predicate::MatchAll => scoped,
        Predicate::Native(p) => doc! { "$and": [p, scoped] },
    };

    let projection = params.projection_fields().map(|fields| {
        let mut p = BsonDocument::new();
        for f in fields {
            p.insert(f.as_str(), 1_i32);
        }
        if !p.contains_key(id_field) {
            p.insert(id_field, 0_i32);
        }
        p
    });

    // A repeated field keeps its first direction and position.
    let mut sort = BsonDocument::new();
    for item in params.order_items() {
        if sort.contains_key(&item.field) {
            continue;
        }
        sort.insert(item.field.as_str(), if item.is_descending() { -1_i32 } else { 1_i32 });
    }

    DocumentQuery { filter, projection, sort, limit: params.top, skip: params.skip }
}

/// # Errors
/// Returns `InvalidFilterSyntax` when the filter cannot be compiled.
pub fn build_query(scope_id: &str, params: &ParameterSet) -> Result<DocumentQuery, ODataError> {
    build_query_with(&QueryOptions::default(), scope_id, params)
}

/// # Errors
/// Returns `Config` for invalid options and `InvalidFilterSyntax` for bad filters.
pub fn build_query_with(
    options: &QueryOptions,
    scope_id: &str,
    params: &ParameterSet,
) -> Result<DocumentQuery, ODataError> {
    options.validate()?;
    let predicate = match &params.filter {
        Some(node) => Compiler::new(&DocumentDialect, options).compile(node)?,
        None => Predicate::MatchAll,
    };
    let scope = ScopeClause::new(scope_id, options);
    Ok(assemble(predicate, params, &scope, &options.id_field))
}

/// Runs the page query into `sink` and returns the total number of matches.
///
/// # Errors
/// Compilation, backend and record decoding errors are returned unchanged.
pub fn run_query<S, T>(
    scope_id: &str,
    params: &ParameterSet,
    store: &S,
    sink: &mut Vec<T>,
) -> Result<u64, ODataError>
where
    S: DocumentStore + ?Sized,
    T: DeserializeOwned,
{
    run_query_with(&QueryOptions::default(), scope_id, params, store, sink)
}

/// # Errors
/// Compilation, backend and record decoding errors are returned unchanged.
pub fn run_query_with<S, T>(
    options: &QueryOptions,
    scope_id: &str,
    params: &ParameterSet,
    store: &S,
    sink: &mut Vec<T>,
) -> Result<u64, ODataError>
where
    S: DocumentStore + ?Sized,
    T: DeserializeOwned,
{
    let query = build_query_with(options, scope_id, params)?;
    let start = Instant::now();
    let docs = store.find(&query)?;
    sink.clear();
    sink.reserve(docs.len());
    for d in docs {
        sink.push(serde_json::from_value(Bson::Document(d).into_relaxed_extjson())?);
    }
    let total = store.count(&query.filter)?;
    devlog::record(QueryBench::find("document", &store.name(), start, sink.len(), total));
    Ok(total)
}

/// Unfiltered, unscoped record count.
///
/// # Errors
/// Returns the store's error.
pub fn count_only<S: DocumentStore + ?Sized>(store: &S) -> Result<u64, ODataError> {
    let start = Instant::now();
    let n = store.count_all()?;
    devlog::record(QueryBench::count("document", &store.name(), start, n));
    Ok(n)
}
