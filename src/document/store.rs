use bson::oid::ObjectId;
use bson::{Bson, Document as BsonDocument};
use parking_lot::RwLock;

use super::eval::{Matcher, apply_projection, compare_docs};
use super::{DocumentQuery, DocumentStore};
use crate::config::DEFAULT_ID_FIELD;
use crate::errors::ODataError;

/// In-memory document collection speaking the query subset the compiler emits.
///
/// Records keep insertion order; documents without an `_id` get a fresh `ObjectId`.
pub struct Collection {
    name: String,
    id_field: String,
    docs: RwLock<Vec<BsonDocument>>,
}

impl Collection {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            id_field: DEFAULT_ID_FIELD.to_string(),
            docs: RwLock::new(Vec::new()),
        }
    }

    /// Uses `field` as the primary key instead of `_id`.
    #[must_use]
    pub fn with_id_field(mut self, field: &str) -> Self {
        self.id_field = field.to_string();
        self
    }

    /// # Errors
    /// Returns a backend error when a document with the same id already exists.
    pub fn insert_document(&self, mut document: BsonDocument) -> Result<Bson, ODataError> {
        let id = match document.get(self.id_field.as_str()) {
            Some(id) => id.clone(),
            None => {
                let id = Bson::ObjectId(ObjectId::new());
                document.insert(self.id_field.as_str(), id.clone());
                id
            }
        };
        let mut docs = self.docs.write();
        if docs.iter().any(|d| d.get(self.id_field.as_str()) == Some(&id)) {
            return Err(ODataError::backend(format!("duplicate key: {id}")));
        }
        docs.push(document);
        Ok(id)
    }

    /// # Errors
    /// Returns the first insert error; earlier documents stay inserted.
    pub fn insert_many<I: IntoIterator<Item = BsonDocument>>(
        &self,
        documents: I,
    ) -> Result<Vec<Bson>, ODataError> {
        documents.into_iter().map(|d| self.insert_document(d)).collect()
    }

    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }
}

impl DocumentStore for Collection {
    fn find(&self, query: &DocumentQuery) -> Result<Vec<BsonDocument>, ODataError> {
        let skip = match query.skip {
            Some(s) if s < 0 => {
                return Err(ODataError::backend("skip value must be non-negative"));
            }
            Some(s) => usize::try_from(s).unwrap_or(usize::MAX),
            None => 0,
        };
        // 0 means no limit; a negative limit asks for a single batch of |limit|.
        let limit = match query.limit {
            None | Some(0) => usize::MAX,
            Some(l) => usize::try_from(l.unsigned_abs()).unwrap_or(usize::MAX),
        };

        let matcher = Matcher::new(&query.filter)?;
        let mut out = Vec::new();
        for d in self.docs.read().iter() {
            if matcher.matches(d)? {
                out.push(d.clone());
            }
        }
        if !query.sort.is_empty() {
            out.sort_by(|a, b| compare_docs(a, b, &query.sort));
        }
        let page = out.into_iter().skip(skip).take(limit);
        Ok(match &query.projection {
            Some(p) => page.map(|d| apply_projection(&d, p, self.id_field.as_str())).collect(),
            None => page.collect(),
        })
    }

    fn count(&self, filter: &BsonDocument) -> Result<u64, ODataError> {
        let matcher = Matcher::new(filter)?;
        let mut n = 0u64;
        for d in self.docs.read().iter() {
            if matcher.matches(d)? {
                n += 1;
            }
        }
        Ok(n)
    }

    fn count_all(&self) -> Result<u64, ODataError> {
        Ok(u64::try_from(self.len()).unwrap_or(u64::MAX))
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn seeded() -> Collection {
        let col = Collection::new("people");
        col.insert_many([
            doc! { "k": 1, "v": 3, "x": 0 },
            doc! { "k": 2, "v": 1, "x": 0 },
            doc! { "k": 3, "v": 2, "x": 1 },
        ])
        .unwrap();
        col
    }

    #[test]
    fn insert_assigns_object_ids() {
        let col = seeded();
        assert_eq!(col.len(), 3);
        let all = col.find(&DocumentQuery::default()).unwrap();
        assert!(all.iter().all(|d| matches!(d.get("_id"), Some(Bson::ObjectId(_)))));
        let id = all[0].get("_id").unwrap().clone();
        let by_id = DocumentQuery { filter: doc! { "_id": id.clone() }, ..DocumentQuery::default() };
        assert_eq!(col.find(&by_id).unwrap(), vec![all[0].clone()]);
        assert!(matches!(
            col.insert_document(doc! { "_id": id }),
            Err(ODataError::BackendExecution(_))
        ));
        assert_eq!(col.len(), 3);
    }

    #[test]
    fn find_sorts_projects_and_paginates() {
        let col = seeded();
        let q = DocumentQuery {
            filter: doc! { "x": 0 },
            projection: Some(doc! { "k": 1, "_id": 0 }),
            sort: doc! { "v": 1 },
            limit: Some(1),
            skip: None,
        };
        assert_eq!(col.find(&q).unwrap(), vec![doc! { "k": 2 }]);
        assert_eq!(col.count(&q.filter).unwrap(), 2);
    }

    #[test]
    fn negative_skip_rejected_negative_limit_absolute() {
        let col = seeded();
        let mut q = DocumentQuery::default();
        q.skip = Some(-1);
        assert!(matches!(col.find(&q), Err(ODataError::BackendExecution(_))));
        q.skip = None;
        q.limit = Some(-2);
        assert_eq!(col.find(&q).unwrap().len(), 2);
        q.limit = Some(0);
        assert_eq!(col.find(&q).unwrap().len(), 3);
    }

    #[test]
    fn custom_id_field_and_invalid_pattern() {
        let col = Collection::new("keys").with_id_field("key");
        col.insert_document(doc! { "key": "k1", "name": "a" }).unwrap();
        assert!(col.insert_document(doc! { "key": "k1" }).is_err());
        let fresh = col.insert_document(doc! { "name": "b" }).unwrap();
        assert!(matches!(fresh, Bson::ObjectId(_)));
        assert_eq!(col.name(), "keys");

        let bad = doc! { "name": { "$regex": "(" } };
        assert!(matches!(col.count(&bad), Err(ODataError::BackendExecution(_))));
        let empty = Collection::new("empty");
        assert!(empty.count(&bad).is_err());
    }
}
