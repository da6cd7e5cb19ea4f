//! Persistence layer for warnetd
//!
//! Provides:
//! - Customer records (balance, time_remaining, status)
//! - Session rows (append-mostly lifecycle log)
//! - Activity journal (append-only)
//!
//! This crate is the only place that touches SQL; everything above it
//! goes through the [`Store`] trait.

mod activity;
mod sqlite;
mod traits;

pub use activity::*;
pub use sqlite::*;
pub use traits::*;

use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
