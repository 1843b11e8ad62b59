//! The chat service: the async facade the presentation layer talks to.
//!
//! Composes the request ledger, the message store, the live update broker,
//! and the user directory.  The ledger gates the message store: nothing can
//! be appended or read until the pair's request is accepted.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use skillswap_shared::{ConversationId, UserId};
use skillswap_store::{ChatRequest, Database, Message};

use crate::broker::{Broker, ChatEvent, Subscription, Topic};
use crate::config::CoreConfig;
use crate::directory::{StoreDirectory, UserDirectory, UserProfile};
use crate::error::{lock_database, ChatError, Result};
use crate::ledger::{PairStatus, RequestLedger};

/// A pending request joined with the sender's display identity.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingRequest {
    pub request: ChatRequest,
    pub from_username: String,
}

/// One entry of the peer list: a visible user plus the last message of the
/// shared conversation, if any.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerSummary {
    pub profile: UserProfile,
    pub last_message: Option<String>,
}

/// Pairwise chat authorization and messaging, behind one handle.
///
/// Cheap to clone; clones share the database, broker, and directory.
#[derive(Clone)]
pub struct ChatService {
    db: Arc<Mutex<Database>>,
    ledger: RequestLedger,
    broker: Broker,
    directory: Arc<dyn UserDirectory>,
    config: CoreConfig,
}

impl ChatService {
    /// Open the service against the configured database path, with a
    /// store-backed directory.
    pub async fn open(config: CoreConfig) -> Result<Self> {
        let db = match &config.db_path {
            Some(path) => Database::open_at(path)?,
            None => Database::new()?,
        };
        Ok(Self::with_database(db, config))
    }

    /// Build the service around an already-open database.
    pub fn with_database(db: Database, config: CoreConfig) -> Self {
        let db = Arc::new(Mutex::new(db));
        let directory = Arc::new(StoreDirectory::new(db.clone()));
        Self::with_parts(db, directory, config)
    }

    /// Build the service from explicit parts; the seam for swapping in an
    /// external [`UserDirectory`] implementation.
    pub fn with_parts(
        db: Arc<Mutex<Database>>,
        directory: Arc<dyn UserDirectory>,
        config: CoreConfig,
    ) -> Self {
        Self {
            ledger: RequestLedger::new(db.clone()),
            broker: Broker::new(),
            db,
            directory,
            config,
        }
    }

    /// The directory this service resolves display identities from.
    pub fn directory(&self) -> Arc<dyn UserDirectory> {
        self.directory.clone()
    }

    // ------------------------------------------------------------------
    // Ledger operations
    // ------------------------------------------------------------------

    /// Authorization state between `me` and `peer`.
    pub async fn status(&self, me: &UserId, peer: &UserId) -> Result<PairStatus> {
        self.ledger.status(me, peer)
    }

    /// Create a pending chat request towards `peer` and notify their live
    /// request subscribers.
    pub async fn request_chat(&self, me: &UserId, peer: &UserId) -> Result<ChatRequest> {
        let request = self.ledger.create(me, peer)?;

        self.broker.publish(
            &Topic::Requests(request.to_id.clone()),
            ChatEvent::RequestCreated(request.clone()),
        );
        Ok(request)
    }

    /// Accept a pending request addressed to `me`.
    ///
    /// Idempotent; the acceptance event is published only on the actual
    /// transition, so retries do not re-notify.
    pub async fn accept_incoming(
        &self,
        request_id: &ConversationId,
        me: &UserId,
    ) -> Result<ChatRequest> {
        let (request, transitioned) = self.ledger.accept(request_id, me)?;

        if transitioned {
            self.broker.publish(
                &Topic::Requests(request.to_id.clone()),
                ChatEvent::RequestAccepted(request.clone()),
            );
        }
        Ok(request)
    }

    /// Pending requests addressed to `me`, enriched with the sender's
    /// username (falling back to a shortened id for unknown senders).
    pub async fn list_incoming(&self, me: &UserId) -> Result<Vec<IncomingRequest>> {
        let requests = self.ledger.list_incoming(me)?;

        let mut incoming = Vec::with_capacity(requests.len());
        for request in requests {
            let from_username = match self.directory.resolve_user(&request.from_id) {
                Ok(profile) => profile.username,
                Err(ChatError::NotFound) => request.from_id.short().to_string(),
                Err(other) => return Err(other),
            };
            incoming.push(IncomingRequest {
                request,
                from_username,
            });
        }
        Ok(incoming)
    }

    // ------------------------------------------------------------------
    // Messaging
    // ------------------------------------------------------------------

    /// Append a message to the conversation with `peer` and fan it out to
    /// live subscribers.
    pub async fn send(&self, me: &UserId, peer: &UserId, text: &str) -> Result<Message> {
        let conversation_id = RequestLedger::conversation_for(me, peer)?;

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ChatError::InvalidArgument(
                "message text must not be empty".to_string(),
            ));
        }
        if trimmed.chars().count() > self.config.max_message_len {
            return Err(ChatError::InvalidArgument(format!(
                "message exceeds {} characters",
                self.config.max_message_len
            )));
        }

        self.ensure_accepted(me, peer)?;

        let message = {
            let mut db = lock_database(&self.db)?;
            db.append_message(&conversation_id, me, trimmed)?
        };

        tracing::debug!(
            conversation = %conversation_id,
            sender = %me,
            seq = message.seq,
            "message appended"
        );

        self.broker.publish(
            &Topic::Conversation(conversation_id),
            ChatEvent::MessageAppended(message.clone()),
        );
        Ok(message)
    }

    /// Ordered history of the conversation with `peer`.
    pub async fn history(&self, me: &UserId, peer: &UserId) -> Result<Vec<Message>> {
        let conversation_id = RequestLedger::conversation_for(me, peer)?;
        self.ensure_accepted(me, peer)?;

        let db = lock_database(&self.db)?;
        Ok(db.messages_for_conversation(&conversation_id)?)
    }

    /// Subscribe to the conversation with `peer`: the full history is
    /// replayed into the subscription (in order) before live appends.
    ///
    /// A message appended while the subscription is being established may
    /// be delivered twice (once replayed, once live); consumers deduplicate
    /// by message id.
    pub async fn subscribe_history(&self, me: &UserId, peer: &UserId) -> Result<Subscription> {
        let conversation_id = RequestLedger::conversation_for(me, peer)?;
        self.ensure_accepted(me, peer)?;

        // Register before reading history so nothing falls between replay
        // and live delivery.
        let mut subscription = self
            .broker
            .subscribe(Topic::Conversation(conversation_id.clone()));

        let history = {
            let db = lock_database(&self.db)?;
            db.messages_for_conversation(&conversation_id)?
        };
        subscription.preload(history.into_iter().map(ChatEvent::MessageAppended).collect());

        Ok(subscription)
    }

    /// Subscribe to requests addressed to `me`.  The currently pending
    /// requests are replayed as `RequestCreated` events so a reconnecting
    /// subscriber resynchronizes instead of staying stale.
    pub async fn subscribe_incoming_requests(&self, me: &UserId) -> Result<Subscription> {
        let mut subscription = self.broker.subscribe(Topic::Requests(me.clone()));

        let pending = self.ledger.list_incoming(me)?;
        subscription.preload(pending.into_iter().map(ChatEvent::RequestCreated).collect());

        Ok(subscription)
    }

    // ------------------------------------------------------------------
    // Directory views
    // ------------------------------------------------------------------

    /// Users visible to `me`, optionally filtered by a case-insensitive
    /// username search term.
    pub async fn list_users(&self, me: &UserId, search: Option<&str>) -> Result<Vec<UserProfile>> {
        let mut users = self.directory.list_users(me)?;

        if let Some(term) = search {
            let term = term.trim().to_lowercase();
            if !term.is_empty() {
                users.retain(|u| u.username.contains(&term));
            }
        }
        Ok(users)
    }

    /// The peer list with each conversation's latest message text, built
    /// from one aggregated store query rather than a per-peer poll.
    pub async fn peer_summaries(&self, me: &UserId) -> Result<Vec<PeerSummary>> {
        let users = self.directory.list_users(me)?;

        let latest = {
            let db = lock_database(&self.db)?;
            db.latest_messages()?
        };

        Ok(users
            .into_iter()
            .map(|profile| {
                let conversation_id = ConversationId::for_pair(me, &profile.id);
                let last_message = latest.get(&conversation_id).map(|m| m.text.clone());
                PeerSummary {
                    profile,
                    last_message,
                }
            })
            .collect())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn ensure_accepted(&self, me: &UserId, peer: &UserId) -> Result<()> {
        if self.ledger.status(me, peer)?.is_accepted() {
            Ok(())
        } else {
            Err(ChatError::Unauthorized(
                "chat request has not been accepted".to_string(),
            ))
        }
    }
}
