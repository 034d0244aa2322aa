//! Document persistence
//!
//! Services talk to a [`Backend`] through typed [`Records`] repositories.
//! Production runs on MongoDB; dev mode and tests use the in-memory backend.

pub mod backend;
pub mod memory;
pub mod mongo;
pub mod schemas;

pub use backend::{Backend, IntoIndexes, MutMetadata, Page, Record, Records};
pub use memory::MemoryBackend;
pub use mongo::MongoClient;
