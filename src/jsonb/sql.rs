//! SQL text rendering for [`JsonbQuery`]. Every path, value and page bound is
//! passed as a parameter; only quoted identifiers are spliced in.

use std::fmt::Write as _;

use super::params::SqlParam;
use super::{JsonbQuery, JsonbTarget};
use crate::compile::{JsonbPredicate, field_path};
use crate::params::Direction;

/// `jsonb_build_object` takes at most 100 arguments; 32 pairs stays well below.
const PROJECTION_CHUNK: usize = 32;

/// Rendered SQL with its positional parameters (`$1` is `params[0]`).
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

#[derive(Default)]
struct Binder {
    params: Vec<SqlParam>,
}

impl Binder {
    fn bind(&mut self, param: SqlParam) -> String {
        self.params.push(param);
        format!("${}", self.params.len())
    }

    fn path(&mut self, path: &[String]) -> String {
        format!("{}::text[]", self.bind(SqlParam::Path(path.to_vec())))
    }
}

/// Double-quotes an identifier, doubling embedded quotes. Dotted names are
/// treated as `schema.table`.
#[must_use]
pub fn quote_ident(name: &str) -> String {
    name.split('.')
        .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}

fn is_range(op: &str) -> bool {
    matches!(op, ">" | ">=" | "<" | "<=")
}

fn render(pred: &JsonbPredicate, col: &str, b: &mut Binder) -> String {
    match pred {
        JsonbPredicate::True => "TRUE".to_string(),
        JsonbPredicate::False => "FALSE".to_string(),
        JsonbPredicate::Compare { path, op, value } => {
            let p = b.path(path);
            let v = b.bind(SqlParam::Json(value.clone()));
            if is_range(op) {
                // jsonb orders across types; ranges only hold within one.
                format!("(jsonb_typeof({col} #> {p}) = jsonb_typeof({v}::jsonb) AND ({col} #> {p}) {op} {v}::jsonb)")
            } else {
                format!("({col} #> {p}) {op} {v}::jsonb")
            }
        }
        JsonbPredicate::Matches { path, pattern } => {
            let p = b.path(path);
            let v = b.bind(SqlParam::Text(pattern.clone()));
            format!("(jsonb_typeof({col} #> {p}) = 'string' AND ({col} #>> {p}) ~* {v})")
        }
        JsonbPredicate::TextEquals { path, value } => {
            let p = b.path(path);
            let v = b.bind(SqlParam::Text(value.clone()));
            format!("({col} #>> {p}) = {v}")
        }
        JsonbPredicate::All(l, r) => {
            let l = render(l, col, b);
            let r = render(r, col, b);
            format!("({l} AND {r})")
        }
        JsonbPredicate::Any(l, r) => {
            let l = render(l, col, b);
            let r = render(r, col, b);
            format!("({l} OR {r})")
        }
    }
}

fn projection(fields: Option<&[String]>, col: &str, b: &mut Binder) -> String {
    let Some(fields) = fields else {
        return col.to_string();
    };
    let chunks: Vec<String> = fields
        .chunks(PROJECTION_CHUNK)
        .map(|chunk| {
            let pairs: Vec<String> = chunk
                .iter()
                .map(|f| {
                    let k = b.bind(SqlParam::Text(f.clone()));
                    let p = b.path(&field_path(f));
                    format!("{k}::text, {col} #> {p}")
                })
                .collect();
            format!("jsonb_build_object({})", pairs.join(", "))
        })
        .collect();
    chunks.join(" || ")
}

/// Page query: projected documents, ordered and paginated.
#[must_use]
pub fn select_statement(query: &JsonbQuery, target: &JsonbTarget) -> Statement {
    let col = quote_ident(&target.column);
    let mut b = Binder::default();
    let proj = projection(query.projection.as_deref(), &col, &mut b);
    let mut sql = format!("SELECT {proj} AS doc FROM {}", quote_ident(&target.table));
    let filter = render(&query.predicate, &col, &mut b);
    let _ = write!(sql, " WHERE {filter}");
    if !query.order.is_empty() {
        let keys: Vec<String> = query
            .order
            .iter()
            .map(|(path, dir)| {
                let p = b.path(path);
                let dir = if *dir == Direction::Desc { "DESC" } else { "ASC" };
                format!("({col} #> {p}) {dir}")
            })
            .collect();
        let _ = write!(sql, " ORDER BY {}", keys.join(", "));
    }
    if let Some(limit) = query.limit {
        let n = b.bind(SqlParam::Int(limit));
        let _ = write!(sql, " LIMIT {n}");
    }
    if let Some(offset) = query.offset {
        let n = b.bind(SqlParam::Int(offset));
        let _ = write!(sql, " OFFSET {n}");
    }
    Statement { sql, params: b.params }
}

/// Total matches for the same predicate, ignoring projection, order and paging.
#[must_use]
pub fn count_statement(query: &JsonbQuery, target: &JsonbTarget) -> Statement {
    let col = quote_ident(&target.column);
    let mut b = Binder::default();
    let filter = render(&query.predicate, &col, &mut b);
    Statement {
        sql: format!("SELECT COUNT(*) FROM {} WHERE {filter}", quote_ident(&target.table)),
        params: b.params,
    }
}

#[must_use]
pub fn count_all_statement(target: &JsonbTarget) -> Statement {
    Statement { sql: format!("SELECT COUNT(*) FROM {}", quote_ident(&target.table)), params: Vec::new() }
}
