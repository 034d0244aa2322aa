//! In-memory blob store for dev mode and tests

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

use crate::blob::BlobStore;
use crate::types::{FirmamentError, Result};

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: DashMap<String, (Bytes, String)>,
    deletes: AtomicUsize,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.blobs.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.blobs.get(key).map(|entry| entry.0.clone())
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Number of delete calls received
    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<()> {
        if key.is_empty() {
            return Err(FirmamentError::Storage("Empty blob key".into()));
        }
        debug!("Stored {} ({} bytes)", key, bytes.len());
        self.blobs
            .insert(key.to_string(), (bytes, content_type.to_string()));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.blobs.remove(key);
        Ok(())
    }

    async fn sign(&self, key: &str, ttl_seconds: u64) -> Result<String> {
        Ok(format!(
            "memory://{}?expires={}",
            urlencoding::encode(key),
            ttl_seconds
        ))
    }
}
