//! v001 -- Initial schema creation.
//!
//! Creates the three core tables: `users`, `chat_requests`, and `messages`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users (the directory; read-only for the chat core)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id              TEXT PRIMARY KEY NOT NULL,   -- opaque provider-assigned id
    username        TEXT NOT NULL UNIQUE,        -- lowercase, user-chosen
    avatar_url      TEXT,
    skills_known    TEXT NOT NULL DEFAULT '[]',  -- JSON string array
    skills_to_learn TEXT NOT NULL DEFAULT '[]',  -- JSON string array
    created_at      TEXT NOT NULL                -- ISO-8601 / RFC-3339
);

-- ----------------------------------------------------------------
-- Chat requests
--
-- The primary key is the canonical conversation id of the unordered
-- user pair, so two sides racing to create a request for the same
-- pair collide on the key and exactly one record survives.
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS chat_requests (
    conversation_id TEXT PRIMARY KEY NOT NULL,
    from_id         TEXT NOT NULL,               -- FK -> users(id)
    to_id           TEXT NOT NULL,               -- FK -> users(id)
    status          TEXT NOT NULL CHECK (status IN ('pending', 'accepted')),
    created_at      TEXT NOT NULL,

    FOREIGN KEY (from_id) REFERENCES users(id),
    FOREIGN KEY (to_id)   REFERENCES users(id)
);

CREATE INDEX IF NOT EXISTS idx_chat_requests_to_status
    ON chat_requests(to_id, status);

-- ----------------------------------------------------------------
-- Messages
--
-- `seq` is a per-conversation sequence number assigned inside the
-- append transaction; it is the insertion-order tiebreak for equal
-- timestamps and makes duplicates detectable downstream.
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id              TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    conversation_id TEXT NOT NULL,               -- FK -> chat_requests(conversation_id)
    sender_id       TEXT NOT NULL,               -- FK -> users(id)
    text            TEXT NOT NULL,
    timestamp       TEXT NOT NULL,               -- ISO-8601, store-assigned
    seq             INTEGER NOT NULL,

    UNIQUE (conversation_id, seq),
    FOREIGN KEY (conversation_id) REFERENCES chat_requests(conversation_id)
);

CREATE INDEX IF NOT EXISTS idx_messages_conv_ts
    ON messages(conversation_id, timestamp ASC, seq ASC);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
