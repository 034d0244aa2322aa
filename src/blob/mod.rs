//! Blob store adapter
//!
//! Opaque key-addressed storage for uploaded media. Keys are hierarchical
//! paths under the owning star (see [`keys`]); retrieval always goes through
//! time-limited signed URLs.

pub mod keys;
pub mod memory;
pub mod s3;

pub use keys::{blob_key, death_certificate_key};
pub use memory::MemoryBlobStore;
pub use s3::{S3BlobStore, S3Config};

use async_trait::async_trait;
use bytes::Bytes;

use crate::types::Result;

#[async_trait]
pub trait BlobStore: Send + Sync {
    fn name(&self) -> &'static str;

    /// Store bytes under `key`, failing with `Storage` on error
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<()>;

    /// Remove the blob; callers treat failures as non-fatal
    async fn delete(&self, key: &str) -> Result<()>;

    /// Time-limited retrieval URL
    async fn sign(&self, key: &str, ttl_seconds: u64) -> Result<String>;
}
