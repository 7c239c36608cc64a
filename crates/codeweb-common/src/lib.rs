//! Common utilities for codeweb
//!
//! This crate provides the error type shared by the data-access layer and the
//! HTTP server.

pub mod error;

pub use error::{CodewebError, Result};
