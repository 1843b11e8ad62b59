//! Chat request ledger: the authoritative per-pair authorization state.
//!
//! State machine per unordered user pair:
//!
//! ```text
//! none --create--> pending --accept (by addressee)--> accepted
//! ```
//!
//! `accepted` is terminal; there is no revocation and no rejection state
//! (rejection is simply never accepting).

use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::Serialize;
use skillswap_shared::{ConversationId, RequestStatus, UserId};
use skillswap_store::{ChatRequest, Database, StoreError};

use crate::error::{lock_database, ChatError, Result};

/// Authorization state of one unordered user pair, as derived from the
/// ledger record (never inferred from message presence).
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum PairStatus {
    /// No request exists between the two users.
    None,
    /// A request exists and awaits acceptance by the addressee.
    Pending { initiator: UserId },
    /// The pair may exchange messages.
    Accepted,
}

impl PairStatus {
    pub fn is_accepted(&self) -> bool {
        matches!(self, PairStatus::Accepted)
    }
}

/// Manages the lifecycle of the access-authorization record per user pair.
#[derive(Clone)]
pub struct RequestLedger {
    db: Arc<Mutex<Database>>,
}

impl RequestLedger {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    /// Reject self-pairs and resolve the canonical conversation id.
    pub fn conversation_for(a: &UserId, b: &UserId) -> Result<ConversationId> {
        if a == b {
            return Err(ChatError::InvalidArgument(
                "cannot open a conversation with yourself".to_string(),
            ));
        }
        Ok(ConversationId::for_pair(a, b))
    }

    /// Authorization state of the pair `{a, b}`.
    pub fn status(&self, a: &UserId, b: &UserId) -> Result<PairStatus> {
        let id = Self::conversation_for(a, b)?;

        let db = lock_database(&self.db)?;
        match db.get_chat_request(&id) {
            Ok(request) => Ok(match request.status {
                RequestStatus::Pending => PairStatus::Pending {
                    initiator: request.from_id,
                },
                RequestStatus::Accepted => PairStatus::Accepted,
            }),
            Err(StoreError::NotFound) => Ok(PairStatus::None),
            Err(other) => Err(other.into()),
        }
    }

    /// Create a pending request from `from` to `to`.
    ///
    /// Fails with [`ChatError::AlreadyExists`] if a record for the pair
    /// already exists in any status, including one the peer created
    /// concurrently: both sides race to the same primary key and exactly
    /// one insert wins.
    pub fn create(&self, from: &UserId, to: &UserId) -> Result<ChatRequest> {
        let id = Self::conversation_for(from, to)?;

        let request = ChatRequest {
            conversation_id: id,
            from_id: from.clone(),
            to_id: to.clone(),
            status: RequestStatus::Pending,
            created_at: Utc::now(),
        };

        {
            let db = lock_database(&self.db)?;
            db.insert_chat_request(&request)?;
        }

        tracing::info!(
            conversation = %request.conversation_id,
            from = %request.from_id,
            to = %request.to_id,
            "chat request created"
        );
        Ok(request)
    }

    /// Accept the request identified by `id`, acting as `acting_user`.
    ///
    /// Only the addressed peer may accept; anyone else (the initiator
    /// included) gets [`ChatError::Forbidden`].  Idempotent: accepting an
    /// already-accepted request succeeds without a second transition.
    /// Returns the record and whether this call performed the transition.
    pub fn accept(&self, id: &ConversationId, acting_user: &UserId) -> Result<(ChatRequest, bool)> {
        let db = lock_database(&self.db)?;

        let mut request = db.get_chat_request(id)?;

        if &request.to_id != acting_user {
            return Err(ChatError::Forbidden(format!(
                "only {} may accept this request",
                request.to_id
            )));
        }

        if request.status == RequestStatus::Accepted {
            return Ok((request, false));
        }

        db.mark_request_accepted(id)?;
        request.status = RequestStatus::Accepted;

        tracing::info!(conversation = %id, by = %acting_user, "chat request accepted");
        Ok((request, true))
    }

    /// Pending requests addressed to `user`, oldest first.
    pub fn list_incoming(&self, user: &UserId) -> Result<Vec<ChatRequest>> {
        let db = lock_database(&self.db)?;
        Ok(db.list_incoming_pending(user)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skillswap_store::UserRecord;

    fn test_ledger() -> (tempfile::TempDir, RequestLedger) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        for (id, name) in [("u1", "alice"), ("u2", "bob"), ("u3", "carol")] {
            db.upsert_user(&UserRecord {
                id: UserId::from(id),
                username: name.to_string(),
                avatar_url: None,
                skills_known: vec![],
                skills_to_learn: vec![],
                created_at: Utc::now(),
            })
            .unwrap();
        }
        (dir, RequestLedger::new(Arc::new(Mutex::new(db))))
    }

    #[test]
    fn status_walks_the_state_machine() {
        let (_dir, ledger) = test_ledger();
        let (u1, u2) = (UserId::from("u1"), UserId::from("u2"));

        assert_eq!(ledger.status(&u1, &u2).unwrap(), PairStatus::None);

        let request = ledger.create(&u1, &u2).unwrap();
        assert_eq!(
            ledger.status(&u2, &u1).unwrap(),
            PairStatus::Pending { initiator: u1.clone() }
        );

        ledger.accept(&request.conversation_id, &u2).unwrap();
        assert_eq!(ledger.status(&u1, &u2).unwrap(), PairStatus::Accepted);
    }

    #[test]
    fn self_pair_is_invalid() {
        let (_dir, ledger) = test_ledger();
        let u1 = UserId::from("u1");
        assert!(matches!(
            ledger.create(&u1, &u1),
            Err(ChatError::InvalidArgument(_))
        ));
        assert!(matches!(
            ledger.status(&u1, &u1),
            Err(ChatError::InvalidArgument(_))
        ));
    }

    #[test]
    fn duplicate_create_from_either_side_fails() {
        let (_dir, ledger) = test_ledger();
        let (u1, u2) = (UserId::from("u1"), UserId::from("u2"));

        ledger.create(&u1, &u2).unwrap();
        assert!(matches!(ledger.create(&u1, &u2), Err(ChatError::AlreadyExists)));
        assert!(matches!(ledger.create(&u2, &u1), Err(ChatError::AlreadyExists)));
    }

    #[test]
    fn initiator_cannot_accept() {
        let (_dir, ledger) = test_ledger();
        let (u1, u2) = (UserId::from("u1"), UserId::from("u2"));

        let request = ledger.create(&u1, &u2).unwrap();
        assert!(matches!(
            ledger.accept(&request.conversation_id, &u1),
            Err(ChatError::Forbidden(_))
        ));

        // A third party cannot accept either.
        assert!(matches!(
            ledger.accept(&request.conversation_id, &UserId::from("u3")),
            Err(ChatError::Forbidden(_))
        ));
    }

    #[test]
    fn accept_is_idempotent() {
        let (_dir, ledger) = test_ledger();
        let (u1, u2) = (UserId::from("u1"), UserId::from("u2"));

        let request = ledger.create(&u1, &u2).unwrap();
        let (first, transitioned) = ledger.accept(&request.conversation_id, &u2).unwrap();
        assert!(transitioned);
        assert_eq!(first.status, RequestStatus::Accepted);

        let (second, transitioned) = ledger.accept(&request.conversation_id, &u2).unwrap();
        assert!(!transitioned);
        assert_eq!(second.status, RequestStatus::Accepted);
    }

    #[test]
    fn accept_missing_request_is_not_found() {
        let (_dir, ledger) = test_ledger();
        let id = ConversationId::for_pair(&"u1".into(), &"u2".into());
        assert!(matches!(
            ledger.accept(&id, &UserId::from("u2")),
            Err(ChatError::NotFound)
        ));
    }

    #[test]
    fn incoming_is_ordered_oldest_first() {
        let (_dir, ledger) = test_ledger();
        let u2 = UserId::from("u2");

        ledger.create(&UserId::from("u1"), &u2).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        ledger.create(&UserId::from("u3"), &u2).unwrap();

        let incoming = ledger.list_incoming(&u2).unwrap();
        assert_eq!(incoming.len(), 2);
        assert!(incoming[0].created_at <= incoming[1].created_at);
        assert_eq!(incoming[0].from_id, UserId::from("u1"));
    }
}
