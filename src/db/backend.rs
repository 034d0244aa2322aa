//! Storage backend abstraction and typed repositories

use async_trait::async_trait;
use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

use crate::db::schemas::Metadata;
use crate::types::{FirmamentError, Result};

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Trait for schemas with mutable metadata
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// A document type that can live in a [`Records`] repository
pub trait Record:
    Serialize + DeserializeOwned + Send + Sync + Unpin + IntoIndexes + MutMetadata
{
    fn id(&self) -> &str;
}

/// Ascending order and size bound for [`Backend::find_many`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    /// Sort field; `_id` when unset
    pub sort_by: Option<&'static str>,
    pub limit: Option<usize>,
}

impl Page {
    pub fn sorted_by(field: &'static str) -> Self {
        Self {
            sort_by: Some(field),
            limit: None,
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Document store operating on raw BSON documents.
///
/// Filters use the MongoDB query language; implementations must support
/// field equality (including array membership), `$or`, `$in`, `$ne`,
/// `$gte` and `$lt`.
#[async_trait]
pub trait Backend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn insert(&self, collection: &str, doc: Document) -> Result<()>;

    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>>;

    /// Matching documents in the page's order, at most `page.limit` of them
    async fn find_many(
        &self,
        collection: &str,
        filter: Document,
        page: Page,
    ) -> Result<Vec<Document>>;

    /// Replace the document with the given id; false if it does not exist
    async fn replace_one(&self, collection: &str, id: &str, doc: Document) -> Result<bool>;

    /// Delete the document with the given id; false if it does not exist
    async fn delete_one(&self, collection: &str, id: &str) -> Result<bool>;

    async fn count(&self, collection: &str, filter: Document) -> Result<u64>;

    /// Fast, possibly stale document count
    async fn estimated_count(&self, collection: &str) -> Result<u64>;

    async fn ensure_indexes(
        &self,
        _collection: &str,
        _indexes: Vec<(Document, Option<IndexOptions>)>,
    ) -> Result<()> {
        Ok(())
    }
}

/// Typed repository over one backend collection
pub struct Records<T> {
    backend: Arc<dyn Backend>,
    collection: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Records<T> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            collection: self.collection,
            _marker: PhantomData,
        }
    }
}

impl<T: Record> Records<T> {
    pub fn new(backend: Arc<dyn Backend>, collection: &'static str) -> Self {
        Self {
            backend,
            collection,
            _marker: PhantomData,
        }
    }

    pub fn collection_name(&self) -> &'static str {
        self.collection
    }

    /// Apply schema-defined indexes
    pub async fn ensure_indexes(&self) -> Result<()> {
        self.backend
            .ensure_indexes(self.collection, T::into_indices())
            .await
    }

    /// Insert a document, setting metadata timestamps
    pub async fn insert(&self, mut item: T) -> Result<T> {
        *item.mut_metadata() = Metadata::new();
        let doc = bson::to_document(&item)?;
        self.backend.insert(self.collection, doc).await?;
        debug!("Inserted {} into {}", item.id(), self.collection);
        Ok(item)
    }

    pub async fn get(&self, id: &str) -> Result<Option<T>> {
        self.find_one(doc! { "_id": id }).await
    }

    pub async fn find_one(&self, filter: Document) -> Result<Option<T>> {
        match self.backend.find_one(self.collection, filter).await? {
            Some(doc) => Ok(Some(bson::from_document(doc)?)),
            None => Ok(None),
        }
    }

    /// All matches in `_id` order
    pub async fn find(&self, filter: Document) -> Result<Vec<T>> {
        self.find_page(filter, Page::default()).await
    }

    pub async fn find_page(&self, filter: Document, page: Page) -> Result<Vec<T>> {
        self.backend
            .find_many(self.collection, filter, page)
            .await?
            .into_iter()
            .map(|doc| bson::from_document(doc).map_err(FirmamentError::from))
            .collect()
    }

    /// Persist the whole document, bumping `updated_at`
    pub async fn save(&self, item: &mut T) -> Result<()> {
        item.mut_metadata().touch();
        let doc = bson::to_document(&*item)?;
        if self.backend.replace_one(self.collection, item.id(), doc).await? {
            Ok(())
        } else {
            Err(FirmamentError::NotFound(format!(
                "{} no longer exists",
                item.id()
            )))
        }
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        self.backend.delete_one(self.collection, id).await
    }

    pub async fn count(&self, filter: Document) -> Result<u64> {
        self.backend.count(self.collection, filter).await
    }

    pub async fn estimated_count(&self) -> Result<u64> {
        self.backend.estimated_count(self.collection).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::StarDoc;
    use crate::db::MemoryBackend;

    fn stars() -> Records<StarDoc> {
        Records::new(Arc::new(MemoryBackend::new()), "stars")
    }

    #[tokio::test]
    async fn test_insert_sets_timestamps() {
        let repo = stars();
        let star = repo
            .insert(StarDoc {
                id: "s1".into(),
                user_id: "u1".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(star.metadata.created_at.is_some());

        let loaded = repo.get("s1").await.unwrap().unwrap();
        assert_eq!(loaded.user_id, "u1");
        assert_eq!(loaded.metadata, star.metadata);
    }

    #[tokio::test]
    async fn test_save_missing_is_not_found() {
        let repo = stars();
        let mut ghost = StarDoc {
            id: "ghost".into(),
            ..Default::default()
        };
        assert!(matches!(
            repo.save(&mut ghost).await,
            Err(FirmamentError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_and_count() {
        let repo = stars();
        for id in ["a", "b", "c"] {
            repo.insert(StarDoc {
                id: id.into(),
                user_id: "u1".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        }
        assert_eq!(repo.count(doc! { "userId": "u1" }).await.unwrap(), 3);
        assert!(repo.delete("b").await.unwrap());
        assert!(!repo.delete("b").await.unwrap());
        assert_eq!(repo.estimated_count().await.unwrap(), 2);
    }
}
