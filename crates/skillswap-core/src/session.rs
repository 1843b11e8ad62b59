//! Client-side session cache.
//!
//! One [`ChatSession`] per signed-in UI session.  It owns the live
//! subscriptions and keeps an explicit cache of what the presentation layer
//! renders: the incoming-request list and, once a peer is selected, that
//! conversation's status and messages.  Selecting a different peer cancels
//! the previous conversation subscription before the new one is
//! established, so no listener leaks and no stale-conversation event
//! reaches the new view.

use std::collections::HashSet;

use skillswap_shared::{ConversationId, UserId};
use skillswap_store::Message;
use uuid::Uuid;

use crate::broker::{ChatEvent, Subscription};
use crate::directory::UserProfile;
use crate::error::Result;
use crate::ledger::PairStatus;
use crate::service::{ChatService, IncomingRequest};

/// Cached state of the currently selected conversation.
pub struct PeerView {
    peer: UserProfile,
    status: PairStatus,
    messages: Vec<Message>,
    seen: HashSet<Uuid>,
    subscription: Option<Subscription>,
}

impl PeerView {
    pub fn peer(&self) -> &UserProfile {
        &self.peer
    }

    pub fn status(&self) -> &PairStatus {
        &self.status
    }

    /// Messages in append order, deduplicated by id.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}

/// Live, self-updating cache for one user's chat UI.
pub struct ChatSession {
    service: ChatService,
    me: UserId,
    incoming: Vec<IncomingRequest>,
    requests_sub: Subscription,
    view: Option<PeerView>,
}

impl ChatSession {
    /// Start a session for `me`: subscribes to incoming requests (current
    /// pending ones are replayed and picked up on the next [`sync`]).
    ///
    /// [`sync`]: ChatSession::sync
    pub async fn start(service: ChatService, me: UserId) -> Result<Self> {
        let requests_sub = service.subscribe_incoming_requests(&me).await?;

        Ok(Self {
            service,
            me,
            incoming: Vec::new(),
            requests_sub,
            view: None,
        })
    }

    pub fn me(&self) -> &UserId {
        &self.me
    }

    /// Incoming pending requests, oldest first.
    pub fn incoming(&self) -> &[IncomingRequest] {
        &self.incoming
    }

    /// The currently selected conversation, if any.
    pub fn view(&self) -> Option<&PeerView> {
        self.view.as_ref()
    }

    /// Select `peer` as the active conversation.
    ///
    /// The previous conversation subscription (if any) is cancelled before
    /// the new one is established.  If the pair is accepted, the full
    /// history starts streaming into the cache; otherwise the view only
    /// carries the pair status.
    pub async fn select_peer(&mut self, peer_id: &UserId) -> Result<()> {
        if let Some(mut old) = self.view.take() {
            if let Some(sub) = old.subscription.as_mut() {
                sub.cancel();
            }
        }

        let peer = self.service.directory().resolve_user(peer_id)?;
        let status = self.service.status(&self.me, peer_id).await?;

        let subscription = if status.is_accepted() {
            Some(self.service.subscribe_history(&self.me, peer_id).await?)
        } else {
            None
        };

        self.view = Some(PeerView {
            peer,
            status,
            messages: Vec::new(),
            seen: HashSet::new(),
            subscription,
        });
        Ok(())
    }

    /// Send a message to the selected peer.  The cache picks the message
    /// up through the live subscription on the next [`sync`].
    ///
    /// [`sync`]: ChatSession::sync
    pub async fn send(&self, text: &str) -> Result<Message> {
        let peer_id = self
            .view
            .as_ref()
            .map(|v| v.peer.id.clone())
            .ok_or_else(|| {
                crate::error::ChatError::InvalidArgument("no peer selected".to_string())
            })?;
        self.service.send(&self.me, &peer_id, text).await
    }

    /// Accept an incoming request and update the cache: the entry leaves
    /// the incoming list, and if the initiator is the selected peer the
    /// view flips to accepted and starts streaming history.
    pub async fn accept(&mut self, request_id: &ConversationId) -> Result<()> {
        let request = self.service.accept_incoming(request_id, &self.me).await?;

        self.incoming
            .retain(|r| r.request.conversation_id != request.conversation_id);

        let selected_initiator = self
            .view
            .as_ref()
            .map(|v| v.peer.id == request.from_id)
            .unwrap_or(false);
        if selected_initiator {
            let peer_id = request.from_id.clone();
            let subscription = self.service.subscribe_history(&self.me, &peer_id).await?;
            if let Some(view) = self.view.as_mut() {
                view.status = PairStatus::Accepted;
                view.subscription = Some(subscription);
            }
        }
        Ok(())
    }

    /// Drain buffered events into the cache.  Call from the UI loop; never
    /// blocks.
    pub fn sync(&mut self) {
        while let Some(event) = self.requests_sub.try_recv() {
            self.apply_request_event(event);
        }

        if let Some(view) = self.view.as_mut() {
            if let Some(sub) = view.subscription.as_mut() {
                while let Some(event) = sub.try_recv() {
                    if let ChatEvent::MessageAppended(message) = event {
                        // Replay and live delivery can overlap; the id set
                        // keeps duplicates out of the cache.
                        if view.seen.insert(message.id) {
                            view.messages.push(message);
                        }
                    }
                }
            }
        }
    }

    fn apply_request_event(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::RequestCreated(request) => {
                let already_cached = self
                    .incoming
                    .iter()
                    .any(|r| r.request.conversation_id == request.conversation_id);
                if already_cached {
                    return;
                }

                let from_username = match self.service.directory().resolve_user(&request.from_id) {
                    Ok(profile) => profile.username,
                    Err(_) => request.from_id.short().to_string(),
                };
                self.incoming.push(IncomingRequest {
                    request,
                    from_username,
                });
            }
            ChatEvent::RequestAccepted(request) => {
                self.incoming
                    .retain(|r| r.request.conversation_id != request.conversation_id);
            }
            ChatEvent::MessageAppended(_) => {}
        }
    }
}
