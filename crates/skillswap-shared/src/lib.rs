//! # skillswap-shared
//!
//! Pure types shared across the SkillSwap chat core: user and conversation
//! identifiers and the chat-request status enum.  No I/O lives here.

pub mod types;

pub use types::{ConversationId, ParseStatusError, RequestStatus, UserId};
