//! In-memory document store
//!
//! Used in dev mode when MongoDB is unreachable and by the test suite.
//! Interprets the subset of the MongoDB query language the services use.

use async_trait::async_trait;
use bson::{Bson, Document};
use dashmap::DashMap;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::db::{Backend, Page};
use crate::types::{FirmamentError, Result};

/// Collections of documents keyed by `_id`
#[derive(Default)]
pub struct MemoryBackend {
    collections: DashMap<String, BTreeMap<String, Document>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

fn doc_id(doc: &Document) -> Result<String> {
    match doc.get("_id") {
        Some(Bson::String(id)) => Ok(id.clone()),
        Some(Bson::ObjectId(oid)) => Ok(oid.to_hex()),
        _ => Err(FirmamentError::Database("Document is missing _id".into())),
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, collection: &str, doc: Document) -> Result<()> {
        let id = doc_id(&doc)?;
        let mut docs = self.collections.entry(collection.to_string()).or_default();
        if docs.contains_key(&id) {
            return Err(FirmamentError::Conflict(format!(
                "Duplicate id {} in {}",
                id, collection
            )));
        }
        docs.insert(id, doc);
        Ok(())
    }

    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>> {
        Ok(self.collections.get(collection).and_then(|docs| {
            docs.values()
                .find(|doc| matches_filter(doc, &filter))
                .cloned()
        }))
    }

    async fn find_many(
        &self,
        collection: &str,
        filter: Document,
        page: Page,
    ) -> Result<Vec<Document>> {
        let mut found: Vec<Document> = self
            .collections
            .get(collection)
            .map(|docs| {
                docs.values()
                    .filter(|doc| matches_filter(doc, &filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(field) = page.sort_by {
            found.sort_by(|a, b| match (a.get(field), b.get(field)) {
                (Some(x), Some(y)) => compare(x, y).unwrap_or(Ordering::Equal),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            });
        }
        if let Some(limit) = page.limit {
            found.truncate(limit);
        }
        Ok(found)
    }

    async fn replace_one(&self, collection: &str, id: &str, doc: Document) -> Result<bool> {
        let Some(mut docs) = self.collections.get_mut(collection) else {
            return Ok(false);
        };
        match docs.get_mut(id) {
            Some(existing) => {
                *existing = doc;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_one(&self, collection: &str, id: &str) -> Result<bool> {
        Ok(self
            .collections
            .get_mut(collection)
            .map(|mut docs| docs.remove(id).is_some())
            .unwrap_or(false))
    }

    async fn count(&self, collection: &str, filter: Document) -> Result<u64> {
        Ok(self
            .collections
            .get(collection)
            .map(|docs| docs.values().filter(|doc| matches_filter(doc, &filter)).count() as u64)
            .unwrap_or(0))
    }

    async fn estimated_count(&self, collection: &str) -> Result<u64> {
        Ok(self
            .collections
            .get(collection)
            .map(|docs| docs.len() as u64)
            .unwrap_or(0))
    }
}

/// Evaluate a query document against a stored document
fn matches_filter(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, condition)| match key.as_str() {
        "$or" => match condition {
            Bson::Array(branches) => branches.iter().any(|branch| match branch {
                Bson::Document(sub) => matches_filter(doc, sub),
                _ => false,
            }),
            _ => false,
        },
        field => matches_field(doc.get(field), condition),
    })
}

fn matches_field(value: Option<&Bson>, condition: &Bson) -> bool {
    if let Bson::Document(ops) = condition {
        if !ops.is_empty() && ops.keys().all(|k| k.starts_with('$')) {
            return ops.iter().all(|(op, arg)| apply_operator(value, op, arg));
        }
    }
    equals(value, condition)
}

/// Equality with array membership, as MongoDB matches scalars against arrays
fn equals(value: Option<&Bson>, expected: &Bson) -> bool {
    match value {
        Some(Bson::Array(items)) => {
            items.iter().any(|item| scalar_eq(item, expected))
                || matches!(expected, Bson::Array(_)) && value == Some(expected)
        }
        Some(v) => scalar_eq(v, expected),
        None => matches!(expected, Bson::Null),
    }
}

fn scalar_eq(a: &Bson, b: &Bson) -> bool {
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn as_f64(v: &Bson) -> Option<f64> {
    match v {
        Bson::Double(d) => Some(*d),
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        _ => None,
    }
}

fn compare(a: &Bson, b: &Bson) -> Option<Ordering> {
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        _ => as_f64(a)?.partial_cmp(&as_f64(b)?),
    }
}

fn apply_operator(value: Option<&Bson>, op: &str, arg: &Bson) -> bool {
    match op {
        "$ne" => !equals(value, arg),
        "$in" => match arg {
            Bson::Array(options) => options.iter().any(|opt| equals(value, opt)),
            _ => false,
        },
        "$gte" => value
            .and_then(|v| compare(v, arg))
            .is_some_and(|o| o != Ordering::Less),
        "$lt" => value
            .and_then(|v| compare(v, arg))
            .is_some_and(|o| o == Ordering::Less),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn sample() -> Document {
        doc! {
            "_id": "s1",
            "userId": "u1",
            "canView": ["u2", "u3"],
            "canEdit": [],
            "x": 10.5,
            "username": "marie",
        }
    }

    #[test]
    fn test_equality_and_arrays() {
        let d = sample();
        assert!(matches_filter(&d, &doc! { "userId": "u1" }));
        assert!(!matches_filter(&d, &doc! { "userId": "u2" }));
        assert!(matches_filter(&d, &doc! { "canView": "u3" }));
        assert!(!matches_filter(&d, &doc! { "canEdit": "u3" }));
        assert!(matches_filter(&d, &doc! { "x": 10.5 }));
        assert!(matches_filter(&d, &doc! { "missing": Bson::Null }));
    }

    #[test]
    fn test_operators() {
        let d = sample();
        assert!(matches_filter(
            &d,
            &doc! { "$or": [ { "userId": "u9" }, { "canView": "u2" } ] }
        ));
        assert!(matches_filter(&d, &doc! { "userId": { "$ne": "u9" } }));
        assert!(matches_filter(&d, &doc! { "_id": { "$in": ["s0", "s1"] } }));
        assert!(matches_filter(
            &d,
            &doc! { "username": { "$gte": "mar", "$lt": "mar\u{10FFFF}" } }
        ));
        assert!(!matches_filter(
            &d,
            &doc! { "username": { "$gte": "mb", "$lt": "mb\u{10FFFF}" } }
        ));
    }

    #[tokio::test]
    async fn test_find_many_sorts_and_limits() {
        let backend = MemoryBackend::new();
        for (id, name) in [("a", "zoe"), ("b", "ada"), ("c", "lin"), ("d", "bo")] {
            backend
                .insert("users", doc! { "_id": id, "username": name })
                .await
                .unwrap();
        }

        let all = backend
            .find_many("users", doc! {}, Page::default())
            .await
            .unwrap();
        let ids: Vec<_> = all.iter().map(|d| d.get_str("_id").unwrap()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);

        let page = backend
            .find_many("users", doc! {}, Page::sorted_by("username").limit(2))
            .await
            .unwrap();
        let names: Vec<_> = page.iter().map(|d| d.get_str("username").unwrap()).collect();
        assert_eq!(names, vec!["ada", "bo"]);
    }

    #[tokio::test]
    async fn test_round_trip_operations() {
        let backend = MemoryBackend::new();
        backend.insert("stars", sample()).await.unwrap();
        assert!(matches!(
            backend.insert("stars", sample()).await,
            Err(FirmamentError::Conflict(_))
        ));

        let found = backend
            .find_one("stars", doc! { "canView": "u2" })
            .await
            .unwrap();
        assert!(found.is_some());

        let mut updated = sample();
        updated.insert("userId", "u7");
        assert!(backend.replace_one("stars", "s1", updated).await.unwrap());
        assert_eq!(backend.count("stars", doc! { "userId": "u7" }).await.unwrap(), 1);

        assert!(backend.delete_one("stars", "s1").await.unwrap());
        assert_eq!(backend.estimated_count("stars").await.unwrap(), 0);
        assert!(!backend.replace_one("stars", "s1", sample()).await.unwrap());
    }
}
