//! MongoDB client and backend implementation

use async_trait::async_trait;
use bson::{doc, Document};
use futures_util::TryStreamExt;
use mongodb::{
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
    Client, Collection, Database, IndexModel,
};
use tracing::info;

use crate::db::{Backend, Page};
use crate::types::{FirmamentError, Result};

/// Duplicate key error code reported by the server
const DUPLICATE_KEY: i32 = 11000;

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Connect and verify the connection with a ping
    pub async fn new(uri: &str, db_name: &str) -> Result<Self> {
        info!("Connecting to MongoDB at {}", uri);

        // Use serverSelectionTimeoutMS to avoid hanging on unreachable MongoDB
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| FirmamentError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| FirmamentError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    fn database(&self) -> Database {
        self.client.database(&self.db_name)
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.database().collection::<Document>(name)
    }

    /// Get the database name
    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY
    )
}

#[async_trait]
impl Backend for MongoClient {
    fn name(&self) -> &'static str {
        "mongodb"
    }

    async fn insert(&self, collection: &str, doc: Document) -> Result<()> {
        self.collection(collection)
            .insert_one(doc)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    FirmamentError::Conflict("Record already exists".into())
                } else {
                    FirmamentError::Database(format!("Insert failed: {}", e))
                }
            })?;
        Ok(())
    }

    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>> {
        self.collection(collection)
            .find_one(filter)
            .await
            .map_err(|e| FirmamentError::Database(format!("Find failed: {}", e)))
    }

    async fn find_many(
        &self,
        collection: &str,
        filter: Document,
        page: Page,
    ) -> Result<Vec<Document>> {
        let mut sort = Document::new();
        sort.insert(page.sort_by.unwrap_or("_id"), 1);
        let coll = self.collection(collection);
        let mut find = coll.find(filter).sort(sort);
        if let Some(limit) = page.limit {
            find = find.limit(limit as i64);
        }
        let cursor = find
            .await
            .map_err(|e| FirmamentError::Database(format!("Find failed: {}", e)))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| FirmamentError::Database(format!("Cursor failed: {}", e)))
    }

    async fn replace_one(&self, collection: &str, id: &str, doc: Document) -> Result<bool> {
        let result = self
            .collection(collection)
            .replace_one(doc! { "_id": id }, doc)
            .await
            .map_err(|e| FirmamentError::Database(format!("Replace failed: {}", e)))?;
        Ok(result.matched_count > 0)
    }

    async fn delete_one(&self, collection: &str, id: &str) -> Result<bool> {
        let result = self
            .collection(collection)
            .delete_one(doc! { "_id": id })
            .await
            .map_err(|e| FirmamentError::Database(format!("Delete failed: {}", e)))?;
        Ok(result.deleted_count > 0)
    }

    async fn count(&self, collection: &str, filter: Document) -> Result<u64> {
        self.collection(collection)
            .count_documents(filter)
            .await
            .map_err(|e| FirmamentError::Database(format!("Count failed: {}", e)))
    }

    async fn estimated_count(&self, collection: &str) -> Result<u64> {
        self.collection(collection)
            .estimated_document_count()
            .await
            .map_err(|e| FirmamentError::Database(format!("Count failed: {}", e)))
    }

    async fn ensure_indexes(
        &self,
        collection: &str,
        indexes: Vec<(Document, Option<IndexOptions>)>,
    ) -> Result<()> {
        if indexes.is_empty() {
            return Ok(());
        }

        let models: Vec<IndexModel> = indexes
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.collection(collection)
            .create_indexes(models)
            .await
            .map_err(|e| FirmamentError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }
}
