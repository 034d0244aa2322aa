//! Firmament - backend for the digital star memorial platform
//!
//! Every user owns one or more stars placed in a shared 3D sky. A star
//! holds photo albums, video albums and 3D rooms, plus loose audios,
//! documents and messages. Owners share any level of that hierarchy with
//! other users through view and edit lists.
//!
//! ## Layers
//!
//! - **routes / server**: hyper HTTP front, JSON in and out
//! - **services**: resource lifecycles, each guarded by the access engine
//! - **access**: pure authorization decisions over the star hierarchy
//! - **placement**: spawn coordinates on concentric shells
//! - **db / blob**: MongoDB documents and S3-compatible objects, with
//!   in-memory stand-ins for development and tests

pub mod access;
pub mod auth;
pub mod blob;
pub mod config;
pub mod db;
pub mod placement;
pub mod resources;
pub mod routes;
pub mod server;
pub mod services;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use services::{Services, SignTtl};
pub use types::{FirmamentError, Result};
