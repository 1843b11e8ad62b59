//! Error taxonomy of the chat core.
//!
//! Validation errors (`InvalidArgument`, `Unauthorized`, `Forbidden`) are
//! raised before the store is touched; `AlreadyExists` and `NotFound` come
//! out of the store's keyed operations; everything else the store can fail
//! with surfaces as `Unavailable`, which is distinguishable from "no data"
//! and safe to retry for idempotent operations.

use std::sync::{Mutex, MutexGuard};

use skillswap_store::{Database, StoreError};
use thiserror::Error;

/// Errors surfaced by the chat service and its components.
#[derive(Error, Debug)]
pub enum ChatError {
    /// Malformed input: empty message text, self-chat attempt, oversized
    /// payloads.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Message access on a conversation whose request is not accepted.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Accept attempted by someone other than the addressed peer.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A chat request for this pair already exists.
    #[error("Chat request already exists for this pair")]
    AlreadyExists,

    /// No record exists for the given key.
    #[error("Record not found")]
    NotFound,

    /// The underlying store failed or is unusable.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for ChatError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ChatError::NotFound,
            StoreError::AlreadyExists => ChatError::AlreadyExists,
            other => ChatError::Unavailable(other.to_string()),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ChatError>;

/// Lock the shared database handle.
///
/// A poisoned lock means a writer panicked mid-operation; the connection is
/// treated as unusable and surfaces as [`ChatError::Unavailable`] rather
/// than propagating the panic into every caller.
pub(crate) fn lock_database(db: &Mutex<Database>) -> Result<MutexGuard<'_, Database>> {
    db.lock()
        .map_err(|_| ChatError::Unavailable("database lock poisoned".to_string()))
}
