//! # skillswap-store
//!
//! Durable storage for the SkillSwap chat core, backed by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for the three
//! persisted collections: users, chat requests, and messages.  The store is
//! the serialization point for the two invariants callers rely on: at most
//! one chat request per unordered user pair (the pair's canonical
//! conversation id is the primary key) and strictly increasing message
//! timestamps per conversation.

pub mod chat_requests;
pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod users;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
