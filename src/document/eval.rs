use bson::{Bson, Document as BsonDocument};
use regex::Regex;
use std::cmp::Ordering;

use crate::errors::ODataError;

pub(crate) const MAX_PATH_DEPTH: usize = 32;
pub(crate) const MAX_SORT_FIELDS: usize = 32;

/// `(pattern, options, compiled)` for every `$regex` in a filter.
type Patterns = Vec<(String, String, Regex)>;

/// A filter prepared for repeated evaluation: each `$regex` is compiled once.
pub struct Matcher<'a> {
    filter: &'a BsonDocument,
    patterns: Patterns,
}

impl<'a> Matcher<'a> {
    /// # Errors
    /// Returns a backend error when a `$regex` pattern does not compile.
    pub fn new(filter: &'a BsonDocument) -> Result<Self, ODataError> {
        let mut patterns = Patterns::new();
        collect_patterns(filter, &mut patterns)?;
        Ok(Self { filter, patterns })
    }

    /// # Errors
    /// Returns a backend error for operators outside the supported subset.
    pub fn matches(&self, doc: &BsonDocument) -> Result<bool, ODataError> {
        eval(doc, self.filter, &self.patterns)
    }
}

/// Evaluates a MongoDB-style query document against `doc`.
///
/// # Errors
/// Returns a backend error for operators outside the supported subset or invalid regexes.
pub fn matches(doc: &BsonDocument, filter: &BsonDocument) -> Result<bool, ODataError> {
    Matcher::new(filter)?.matches(doc)
}

// Malformed shapes are skipped here and reported by `eval`.
fn collect_patterns(filter: &BsonDocument, out: &mut Patterns) -> Result<(), ODataError> {
    for (key, cond) in filter {
        match (key.as_str(), cond) {
            ("$and" | "$or" | "$nor", Bson::Array(items)) => {
                for item in items {
                    if let Bson::Document(d) = item {
                        collect_patterns(d, out)?;
                    }
                }
            }
            (_, Bson::Document(ops)) => {
                let options = match ops.get("$options") {
                    Some(Bson::String(s)) => s.as_str(),
                    _ => "",
                };
                if let Some(Bson::String(pattern)) = ops.get("$regex")
                    && !out.iter().any(|(p, o, _)| p == pattern && o == options)
                {
                    out.push((pattern.clone(), options.to_string(), build_regex(pattern, options)?));
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn eval(doc: &BsonDocument, filter: &BsonDocument, patterns: &Patterns) -> Result<bool, ODataError> {
    for (key, cond) in filter {
        let ok = match key.as_str() {
            "$and" => {
                let mut all = true;
                for f in clauses(key, cond)? {
                    if !eval(doc, f, patterns)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "$or" => {
                let mut any = false;
                for f in clauses(key, cond)? {
                    if eval(doc, f, patterns)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            "$nor" => {
                let mut none = true;
                for f in clauses(key, cond)? {
                    if eval(doc, f, patterns)? {
                        none = false;
                        break;
                    }
                }
                none
            }
            k if k.starts_with('$') => {
                return Err(ODataError::backend(format!("unknown top level operator: {k}")));
            }
            path => field_matches(get_path(doc, path), cond, patterns)?,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn clauses<'a>(op: &str, cond: &'a Bson) -> Result<Vec<&'a BsonDocument>, ODataError> {
    let Bson::Array(items) = cond else {
        return Err(ODataError::backend(format!("{op} argument must be an array")));
    };
    if items.is_empty() {
        return Err(ODataError::backend(format!("{op} argument must be a non-empty array")));
    }
    items
        .iter()
        .map(|b| match b {
            Bson::Document(d) => Ok(d),
            _ => Err(ODataError::backend(format!("{op} entries must be objects"))),
        })
        .collect()
}

fn is_operator_doc(cond: &Bson) -> bool {
    matches!(cond, Bson::Document(d) if d.keys().next().is_some_and(|k| k.starts_with('$')))
}

fn field_matches(value: Option<&Bson>, cond: &Bson, patterns: &Patterns) -> Result<bool, ODataError> {
    let Bson::Document(ops) = cond else {
        return Ok(equals(value, cond));
    };
    if !is_operator_doc(cond) {
        return Ok(equals(value, cond));
    }
    let options = match ops.get("$options") {
        Some(Bson::String(s)) => s.as_str(),
        Some(_) => return Err(ODataError::backend("$options must be a string")),
        None => "",
    };
    for (op, arg) in ops {
        let ok = match op.as_str() {
            "$eq" => equals(value, arg),
            "$ne" => !equals(value, arg),
            "$gt" => ordered(value, arg, |o| o == Ordering::Greater),
            "$gte" => ordered(value, arg, |o| o != Ordering::Less),
            "$lt" => ordered(value, arg, |o| o == Ordering::Less),
            "$lte" => ordered(value, arg, |o| o != Ordering::Greater),
            "$in" => in_set(value, arg)?,
            "$nin" => !in_set(value, arg)?,
            "$exists" => value.is_some() == truthy(arg),
            "$regex" => regex_matches(value, arg, options, patterns)?,
            "$options" => true,
            other => return Err(ODataError::backend(format!("unknown operator: {other}"))),
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

// Arrays match when any element does; a missing field equals null.
fn equals(value: Option<&Bson>, target: &Bson) -> bool {
    match value {
        None => matches!(target, Bson::Null),
        Some(Bson::Array(items)) if !matches!(target, Bson::Array(_)) => {
            items.iter().any(|v| values_equal(v, target))
        }
        Some(v) => values_equal(v, target),
    }
}

fn values_equal(a: &Bson, b: &Bson) -> bool {
    if is_num(a) && is_num(b) {
        return as_f64_num(a) == as_f64_num(b);
    }
    a == b
}

fn ordered(value: Option<&Bson>, target: &Bson, pred: impl Fn(Ordering) -> bool) -> bool {
    match value {
        Some(Bson::Array(items)) => items.iter().any(|v| comparable(v, target).is_some_and(&pred)),
        Some(v) => comparable(v, target).is_some_and(pred),
        None => false,
    }
}

// Range operators only compare values of the same type class.
fn comparable(a: &Bson, b: &Bson) -> Option<Ordering> {
    if is_num(a) && is_num(b) {
        return as_f64_num(a).partial_cmp(&as_f64_num(b));
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => Some(x.cmp(y)),
        (Bson::Null, Bson::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

fn in_set(value: Option<&Bson>, set: &Bson) -> Result<bool, ODataError> {
    let Bson::Array(items) = set else {
        return Err(ODataError::backend("$in/$nin needs an array"));
    };
    Ok(items.iter().any(|t| equals(value, t)))
}

fn truthy(b: &Bson) -> bool {
    match b {
        Bson::Boolean(v) => *v,
        Bson::Null => false,
        Bson::Int32(i) => *i != 0,
        Bson::Int64(i) => *i != 0,
        Bson::Double(f) => *f != 0.0,
        _ => true,
    }
}

fn build_regex(pattern: &str, options: &str) -> Result<Regex, ODataError> {
    regex::RegexBuilder::new(pattern)
        .case_insensitive(options.contains('i'))
        .multi_line(options.contains('m'))
        .dot_matches_new_line(options.contains('s'))
        .build()
        .map_err(|e| ODataError::backend(format!("invalid regex: {e}")))
}

fn regex_matches(
    value: Option<&Bson>,
    pattern: &Bson,
    options: &str,
    patterns: &Patterns,
) -> Result<bool, ODataError> {
    let Bson::String(pattern) = pattern else {
        return Err(ODataError::backend("$regex has to be a string"));
    };
    let built;
    let re = match patterns.iter().find(|(p, o, _)| p == pattern && o == options) {
        Some((_, _, re)) => re,
        None => {
            built = build_regex(pattern, options)?;
            &built
        }
    };
    Ok(match value {
        Some(Bson::String(s)) => re.is_match(s),
        Some(Bson::Array(items)) => {
            items.iter().any(|v| matches!(v, Bson::String(s) if re.is_match(s)))
        }
        _ => false,
    })
}

pub(crate) fn get_path<'a>(doc: &'a BsonDocument, path: &str) -> Option<&'a Bson> {
    if path.is_empty() || path.len() > 1024 {
        return None;
    }
    let mut cur = doc;
    let mut parts = path.split('.').peekable();
    let mut segs = 0usize;
    while let Some(part) = parts.next() {
        segs += 1;
        if segs > MAX_PATH_DEPTH {
            return None;
        }
        let v = cur.get(part)?;
        if parts.peek().is_none() {
            return Some(v);
        }
        match v {
            Bson::Document(d) => cur = d,
            _ => return None,
        }
    }
    None
}

/// Orders documents by a sort specification (`{field: 1 | -1}`), keys in order.
pub fn compare_docs(a: &BsonDocument, b: &BsonDocument, sort: &BsonDocument) -> Ordering {
    for (field, dir) in sort.iter().take(MAX_SORT_FIELDS) {
        let va = get_path(a, field).unwrap_or(&Bson::Null);
        let vb = get_path(b, field).unwrap_or(&Bson::Null);
        let ord = compare_bson(va, vb);
        if ord != Ordering::Equal {
            return if is_descending(dir) { ord.reverse() } else { ord };
        }
    }
    Ordering::Equal
}

fn is_descending(dir: &Bson) -> bool {
    match dir {
        Bson::Int32(i) => *i < 0,
        Bson::Int64(i) => *i < 0,
        Bson::Double(f) => *f < 0.0,
        _ => false,
    }
}

fn is_num(x: &Bson) -> bool {
    matches!(x, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_))
}

#[allow(clippy::cast_precision_loss)]
fn as_f64_num(x: &Bson) -> f64 {
    match x {
        Bson::Int32(i) => f64::from(*i),
        Bson::Int64(i) => *i as f64,
        Bson::Double(f) => *f,
        Bson::Decimal128(d) => d.to_string().parse::<f64>().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

/// Total order used for sorting: numbers compare numerically, otherwise by type rank.
pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    if is_num(a) && is_num(b) {
        return as_f64_num(a).total_cmp(&as_f64_num(b));
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.cmp(y),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

// Cross-type sort order, lowest first.
const fn type_rank(v: &Bson) -> u8 {
    match v {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::Symbol(_) | Bson::String(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::DbPointer(_) => 12,
        Bson::JavaScriptCode(_) | Bson::JavaScriptCodeWithScope(_) => 13,
        Bson::MaxKey => 255,
    }
}

/// Applies a projection document. Inclusion projections keep the listed fields
/// (and `_id` unless it is set to 0); exclusion-only projections drop the listed fields.
pub fn apply_projection(doc: &BsonDocument, projection: &BsonDocument, id_field: &str) -> BsonDocument {
    let inclusion = projection.iter().any(|(k, v)| k != id_field && truthy(v));
    if !inclusion {
        let mut out = doc.clone();
        for (k, v) in projection {
            if !truthy(v) {
                remove_path(&mut out, k);
            }
        }
        return out;
    }
    let keep_id = projection.get(id_field).is_none_or(truthy);
    let mut out = BsonDocument::new();
    if keep_id && let Some(id) = doc.get(id_field) {
        out.insert(id_field, id.clone());
    }
    for (k, v) in projection {
        if k == id_field || !truthy(v) {
            continue;
        }
        if let Some(found) = get_path(doc, k) {
            set_path(&mut out, k, found.clone());
        }
    }
    out
}

fn set_path(root: &mut BsonDocument, path: &str, value: Bson) {
    let mut cur = root;
    let mut parts = path.split('.').peekable();
    while let Some(seg) = parts.next() {
        if parts.peek().is_none() {
            cur.insert(seg, value);
            return;
        }
        if !matches!(cur.get(seg), Some(Bson::Document(_))) {
            cur.insert(seg, BsonDocument::new());
        }
        match cur.get_mut(seg) {
            Some(Bson::Document(d)) => cur = d,
            _ => return,
        }
    }
}

fn remove_path(root: &mut BsonDocument, path: &str) {
    match path.split_once('.') {
        None => {
            root.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(d)) = root.get_mut(head) {
                remove_path(d, rest);
            }
        }
    }
}
