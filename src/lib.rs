//! Translates OData-style query parameters (`$filter`, `$select`, `$orderby`,
//! `$top`, `$skip`) into native queries for a MongoDB-style document store and
//! for PostgreSQL tables keeping each record in a `jsonb` column.
//!
//! The filter AST comes from an external parser; [`compile`] lowers it through a
//! backend [`compile::Dialect`], and the [`document`] and [`jsonb`] modules
//! assemble and run the final queries.

pub mod devlog;

pub mod compile;
pub mod config;
pub mod document;
pub mod errors;
pub mod filter;
pub mod jsonb;
pub mod logger;
pub mod params;
pub mod scope;

pub use compile::{Compiler, Dialect, DocumentDialect, JsonbDialect, JsonbPredicate, Predicate};
pub use config::QueryOptions;
pub use document::{Collection, DocumentQuery, DocumentStore};
pub use errors::ODataError;
pub use filter::{FilterNode, Operator, Token, Value, parse_filter_json};
pub use jsonb::{JsonbClient, JsonbQuery, JsonbTarget, Statement};
pub use params::{Direction, OrderItem, ParameterSet, parse_params_json};
pub use scope::ScopeClause;

/// Initializes logging from `ODATALITE_*` environment variables.
///
/// # Errors
/// Returns an error if the logging configuration cannot be built.
pub fn init() -> Result<(), ODataError> {
    logger::configure_from_env()
}
