//! HTTP server for Firmament

pub mod http;

pub use http::{dispatch, run, AppState};
