//! CRUD operations for [`ChatRequest`] rows.
//!
//! The conversation id (canonical form of the unordered user pair) is the
//! primary key, so concurrent request creation from both sides of a pair
//! serializes on the key and exactly one record survives.

use chrono::{DateTime, Utc};
use rusqlite::params;
use skillswap_shared::{ConversationId, RequestStatus, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::ChatRequest;
use crate::users::rfc3339;

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new chat request.
    ///
    /// Fails with [`StoreError::AlreadyExists`] if any record for the pair
    /// is already present, in either status and from either initiator.
    pub fn insert_chat_request(&self, request: &ChatRequest) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO chat_requests (conversation_id, from_id, to_id, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    request.conversation_id.as_str(),
                    request.from_id.as_str(),
                    request.to_id.as_str(),
                    request.status.as_str(),
                    rfc3339(&request.created_at),
                ],
            )
            .map_err(StoreError::from_insert)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch the single request for a conversation id.
    pub fn get_chat_request(&self, id: &ConversationId) -> Result<ChatRequest> {
        self.conn()
            .query_row(
                "SELECT conversation_id, from_id, to_id, status, created_at
                 FROM chat_requests
                 WHERE conversation_id = ?1",
                params![id.as_str()],
                row_to_request,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// List pending requests addressed to `user`, oldest first.
    pub fn list_incoming_pending(&self, user: &UserId) -> Result<Vec<ChatRequest>> {
        let mut stmt = self.conn().prepare(
            "SELECT conversation_id, from_id, to_id, status, created_at
             FROM chat_requests
             WHERE to_id = ?1 AND status = 'pending'
             ORDER BY created_at ASC",
        )?;

        let rows = stmt.query_map(params![user.as_str()], row_to_request)?;

        let mut requests = Vec::new();
        for row in rows {
            requests.push(row?);
        }
        Ok(requests)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Transition a request to `accepted`.
    ///
    /// Idempotent: accepting an already-accepted request is a no-op.
    /// Fails with [`StoreError::NotFound`] if no record exists for the id.
    pub fn mark_request_accepted(&self, id: &ConversationId) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE chat_requests
             SET status = 'accepted'
             WHERE conversation_id = ?1",
            params![id.as_str()],
        )?;

        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`ChatRequest`].
fn row_to_request(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatRequest> {
    let conversation_id: String = row.get(0)?;
    let from_id: String = row.get(1)?;
    let to_id: String = row.get(2)?;
    let status_str: String = row.get(3)?;
    let created_str: String = row.get(4)?;

    let status: RequestStatus = status_str.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(ChatRequest {
        conversation_id: ConversationId::from_raw(conversation_id),
        from_id: UserId::new(from_id),
        to_id: UserId::new(to_id),
        status,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        for (id, name) in [("u1", "alice"), ("u2", "bob"), ("u3", "carol")] {
            db.upsert_user(&crate::models::UserRecord {
                id: UserId::from(id),
                username: name.to_string(),
                avatar_url: None,
                skills_known: vec![],
                skills_to_learn: vec![],
                created_at: Utc::now(),
            })
            .unwrap();
        }
        (dir, db)
    }

    fn pending(from: &str, to: &str) -> ChatRequest {
        let from_id = UserId::from(from);
        let to_id = UserId::from(to);
        ChatRequest {
            conversation_id: ConversationId::for_pair(&from_id, &to_id),
            from_id,
            to_id,
            status: RequestStatus::Pending,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn insert_and_get_round_trip() {
        let (_dir, db) = test_db();
        let req = pending("u1", "u2");
        db.insert_chat_request(&req).unwrap();

        let fetched = db.get_chat_request(&req.conversation_id).unwrap();
        assert_eq!(fetched.from_id, req.from_id);
        assert_eq!(fetched.status, RequestStatus::Pending);
    }

    #[test]
    fn at_most_one_request_per_pair() {
        let (_dir, db) = test_db();
        db.insert_chat_request(&pending("u1", "u2")).unwrap();

        // Same pair, opposite initiator: still collides on the pair key.
        let err = db.insert_chat_request(&pending("u2", "u1")).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists));
    }

    #[test]
    fn accept_is_idempotent() {
        let (_dir, db) = test_db();
        let req = pending("u1", "u2");
        db.insert_chat_request(&req).unwrap();

        db.mark_request_accepted(&req.conversation_id).unwrap();
        db.mark_request_accepted(&req.conversation_id).unwrap();

        let fetched = db.get_chat_request(&req.conversation_id).unwrap();
        assert_eq!(fetched.status, RequestStatus::Accepted);
    }

    #[test]
    fn accept_missing_request_is_not_found() {
        let (_dir, db) = test_db();
        let id = ConversationId::for_pair(&"u1".into(), &"u2".into());
        assert!(matches!(
            db.mark_request_accepted(&id),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn incoming_lists_only_pending_addressed_to_user() {
        let (_dir, db) = test_db();
        db.insert_chat_request(&pending("u1", "u2")).unwrap();
        db.insert_chat_request(&pending("u3", "u2")).unwrap();

        let accepted = ConversationId::for_pair(&"u3".into(), &"u2".into());
        db.mark_request_accepted(&accepted).unwrap();

        let incoming = db.list_incoming_pending(&UserId::from("u2")).unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].from_id, UserId::from("u1"));
    }
}
