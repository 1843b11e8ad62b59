//! Domain model structs persisted in the local SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the presentation layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skillswap_shared::{ConversationId, RequestStatus, UserId};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A user profile as stored by the directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRecord {
    /// Opaque, stable id assigned by the identity provider.
    pub id: UserId,
    /// Unique, user-chosen handle (stored lowercase).
    pub username: String,
    /// Optional avatar image URL.
    pub avatar_url: Option<String>,
    /// Skills the user offers to teach.
    pub skills_known: Vec<String>,
    /// Skills the user wants to learn.
    pub skills_to_learn: Vec<String>,
    /// When the profile was first created.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// ChatRequest
// ---------------------------------------------------------------------------

/// The access-authorization record for one unordered user pair.
///
/// Logically keyed by the pair's canonical [`ConversationId`]; at most one
/// record exists per pair regardless of which side initiated it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRequest {
    /// Canonical conversation id of the pair; also the primary key.
    pub conversation_id: ConversationId,
    /// The user who initiated the request.
    pub from_id: UserId,
    /// The addressed peer; the only side allowed to accept.
    pub to_id: UserId,
    /// Lifecycle state: pending until the addressee accepts.
    pub status: RequestStatus,
    /// Server timestamp at creation.
    pub created_at: DateTime<Utc>,
}

impl ChatRequest {
    /// Whether `user` is one of the two participants.
    pub fn involves(&self, user: &UserId) -> bool {
        &self.from_id == user || &self.to_id == user
    }

    /// The other participant from `user`'s point of view.
    pub fn peer_of(&self, user: &UserId) -> &UserId {
        if &self.from_id == user {
            &self.to_id
        } else {
            &self.from_id
        }
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single chat message.  Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Unique message identifier; makes duplicate delivery detectable.
    pub id: Uuid,
    /// The conversation this message belongs to.
    pub conversation_id: ConversationId,
    /// Id of the sending participant.
    pub sender_id: UserId,
    /// Message body (non-empty, pre-trimmed by the service layer).
    pub text: String,
    /// Store-assigned timestamp, strictly increasing per conversation.
    pub timestamp: DateTime<Utc>,
    /// Store-assigned per-conversation sequence number.
    pub seq: i64,
}
