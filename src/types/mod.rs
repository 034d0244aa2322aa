//! Shared types for Firmament

pub mod error;

pub use error::{FirmamentError, Result};
