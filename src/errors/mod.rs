//! # Error Handling
//!
//! Error types for cloudkeys, built on `thiserror`.

pub mod types;

pub use types::{Error, Result};
