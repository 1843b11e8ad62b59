//! CRUD operations for [`Message`] rows.
//!
//! Appends run inside a transaction that assigns both the per-conversation
//! sequence number and a timestamp strictly greater than any previously
//! assigned timestamp for that conversation, so history order is total even
//! when both participants write within the same clock tick.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension};
use skillswap_shared::{ConversationId, UserId};
use uuid::Uuid;

use crate::database::Database;
use crate::error::Result;
use crate::models::Message;
use crate::users::rfc3339;

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Append a message to a conversation and return the stored record.
    ///
    /// The store assigns `seq = last_seq + 1` and
    /// `timestamp = max(now, last_timestamp + 1ms)` inside one transaction.
    pub fn append_message(
        &mut self,
        conversation_id: &ConversationId,
        sender_id: &UserId,
        text: &str,
    ) -> Result<Message> {
        let tx = self.conn_mut().transaction()?;

        let last: Option<(i64, String)> = tx
            .query_row(
                "SELECT seq, timestamp
                 FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY seq DESC
                 LIMIT 1",
                params![conversation_id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let mut timestamp = Utc::now();
        let seq = match last {
            Some((last_seq, last_ts_str)) => {
                let last_ts: DateTime<Utc> = DateTime::parse_from_rfc3339(&last_ts_str)
                    .map(|dt| dt.with_timezone(&Utc))?;
                let floor = last_ts + Duration::milliseconds(1);
                if timestamp < floor {
                    timestamp = floor;
                }
                last_seq + 1
            }
            None => 1,
        };

        let message = Message {
            id: Uuid::new_v4(),
            conversation_id: conversation_id.clone(),
            sender_id: sender_id.clone(),
            text: text.to_string(),
            timestamp,
            seq,
        };

        tx.execute(
            "INSERT INTO messages (id, conversation_id, sender_id, text, timestamp, seq)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                message.id.to_string(),
                message.conversation_id.as_str(),
                message.sender_id.as_str(),
                message.text,
                rfc3339(&message.timestamp),
                message.seq,
            ],
        )?;

        tx.commit()?;
        Ok(message)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Full history of a conversation, ordered by timestamp ascending with
    /// the sequence number as tiebreak.
    pub fn messages_for_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, conversation_id, sender_id, text, timestamp, seq
             FROM messages
             WHERE conversation_id = ?1
             ORDER BY timestamp ASC, seq ASC",
        )?;

        let rows = stmt.query_map(params![conversation_id.as_str()], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// Latest message of every conversation, in one grouped query.
    ///
    /// This is the materialized "last message" view the peer list renders
    /// from; callers filter the map down to the conversations they care
    /// about instead of polling per peer.
    pub fn latest_messages(&self) -> Result<HashMap<ConversationId, Message>> {
        let mut stmt = self.conn().prepare(
            "SELECT m.id, m.conversation_id, m.sender_id, m.text, m.timestamp, m.seq
             FROM messages m
             JOIN (
                 SELECT conversation_id, MAX(seq) AS max_seq
                 FROM messages
                 GROUP BY conversation_id
             ) latest
               ON m.conversation_id = latest.conversation_id
              AND m.seq = latest.max_seq",
        )?;

        let rows = stmt.query_map([], row_to_message)?;

        let mut latest = HashMap::new();
        for row in rows {
            let message = row?;
            latest.insert(message.conversation_id.clone(), message);
        }
        Ok(latest)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`Message`].
fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let id_str: String = row.get(0)?;
    let conversation_id: String = row.get(1)?;
    let sender_id: String = row.get(2)?;
    let text: String = row.get(3)?;
    let ts_str: String = row.get(4)?;
    let seq: i64 = row.get(5)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let timestamp: DateTime<Utc> = DateTime::parse_from_rfc3339(&ts_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Message {
        id,
        conversation_id: ConversationId::from_raw(conversation_id),
        sender_id: UserId::new(sender_id),
        text,
        timestamp,
        seq,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use skillswap_shared::RequestStatus;

    use crate::models::{ChatRequest, UserRecord};

    fn test_db() -> (tempfile::TempDir, Database) {
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
        (dir, db)
    }

    fn accepted_conversation(db: &Database, a: &str, b: &str) -> ConversationId {
        let from = UserId::from(a);
        let to = UserId::from(b);
        let id = ConversationId::for_pair(&from, &to);
        db.insert_chat_request(&ChatRequest {
            conversation_id: id.clone(),
            from_id: from,
            to_id: to,
            status: RequestStatus::Pending,
            created_at: Utc::now(),
        })
        .unwrap();
        db.mark_request_accepted(&id).unwrap();
        id
    }

    #[test]
    fn append_assigns_strictly_increasing_timestamps() {
        let (_dir, mut db) = test_db();
        let conv = accepted_conversation(&db, "u1", "u2");

        let m1 = db.append_message(&conv, &UserId::from("u1"), "first").unwrap();
        let m2 = db.append_message(&conv, &UserId::from("u2"), "second").unwrap();
        let m3 = db.append_message(&conv, &UserId::from("u1"), "third").unwrap();

        assert!(m2.timestamp > m1.timestamp);
        assert!(m3.timestamp > m2.timestamp);
        assert_eq!((m1.seq, m2.seq, m3.seq), (1, 2, 3));
    }

    #[test]
    fn history_is_ordered_and_complete() {
        let (_dir, mut db) = test_db();
        let conv = accepted_conversation(&db, "u1", "u2");

        for i in 0..5 {
            let sender = if i % 2 == 0 { "u1" } else { "u2" };
            db.append_message(&conv, &UserId::from(sender), &format!("msg {i}"))
                .unwrap();
        }

        let history = db.messages_for_conversation(&conv).unwrap();
        assert_eq!(history.len(), 5);
        for pair in history.windows(2) {
            assert!(pair[0].timestamp < pair[1].timestamp);
            assert!(pair[0].seq < pair[1].seq);
        }
        assert_eq!(history[0].text, "msg 0");
        assert_eq!(history[4].text, "msg 4");
    }

    #[test]
    fn conversations_do_not_share_sequences() {
        let (_dir, mut db) = test_db();
        let conv_a = accepted_conversation(&db, "u1", "u2");
        let conv_b = accepted_conversation(&db, "u1", "u3");

        db.append_message(&conv_a, &UserId::from("u1"), "to bob").unwrap();
        let m = db.append_message(&conv_b, &UserId::from("u1"), "to carol").unwrap();

        assert_eq!(m.seq, 1);
    }

    #[test]
    fn latest_messages_returns_one_row_per_conversation() {
        let (_dir, mut db) = test_db();
        let conv_a = accepted_conversation(&db, "u1", "u2");
        let conv_b = accepted_conversation(&db, "u1", "u3");

        db.append_message(&conv_a, &UserId::from("u1"), "hi bob").unwrap();
        db.append_message(&conv_a, &UserId::from("u2"), "hi alice").unwrap();
        db.append_message(&conv_b, &UserId::from("u3"), "hello").unwrap();

        let latest = db.latest_messages().unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[&conv_a].text, "hi alice");
        assert_eq!(latest[&conv_b].text, "hello");
    }

    #[test]
    fn empty_conversation_has_empty_history() {
        let (_dir, db) = test_db();
        let conv = ConversationId::for_pair(&"u1".into(), &"u2".into());
        assert!(db.messages_for_conversation(&conv).unwrap().is_empty());
    }
}
