//! CRUD operations for [`UserRecord`] rows (the user directory).

use chrono::{DateTime, Utc};
use rusqlite::params;
use skillswap_shared::UserId;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::UserRecord;

impl Database {
    // ------------------------------------------------------------------
    // Create / update
    // ------------------------------------------------------------------

    /// Insert or update a user profile.
    ///
    /// The username carries a UNIQUE constraint; a collision with another
    /// user's handle surfaces as [`StoreError::AlreadyExists`].
    pub fn upsert_user(&self, user: &UserRecord) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO users (id, username, avatar_url, skills_known, skills_to_learn, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                     username        = excluded.username,
                     avatar_url      = excluded.avatar_url,
                     skills_known    = excluded.skills_known,
                     skills_to_learn = excluded.skills_to_learn",
                params![
                    user.id.as_str(),
                    user.username,
                    user.avatar_url,
                    serde_json::to_string(&user.skills_known)?,
                    serde_json::to_string(&user.skills_to_learn)?,
                    rfc3339(&user.created_at),
                ],
            )
            .map_err(StoreError::from_insert)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single user by id.
    pub fn get_user(&self, id: &UserId) -> Result<UserRecord> {
        self.conn()
            .query_row(
                "SELECT id, username, avatar_url, skills_known, skills_to_learn, created_at
                 FROM users
                 WHERE id = ?1",
                params![id.as_str()],
                row_to_user,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Fetch a single user by their unique username.
    pub fn get_user_by_username(&self, username: &str) -> Result<UserRecord> {
        self.conn()
            .query_row(
                "SELECT id, username, avatar_url, skills_known, skills_to_learn, created_at
                 FROM users
                 WHERE username = ?1",
                params![username],
                row_to_user,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// List all users except `exclude`, ordered by username.
    pub fn list_users(&self, exclude: &UserId) -> Result<Vec<UserRecord>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, username, avatar_url, skills_known, skills_to_learn, created_at
             FROM users
             WHERE id != ?1
             ORDER BY username ASC",
        )?;

        let rows = stmt.query_map(params![exclude.as_str()], row_to_user)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }
}

/// Render a timestamp at fixed microsecond precision so the stored strings
/// compare correctly in SQL `ORDER BY`.
pub(crate) fn rfc3339(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`UserRecord`].
fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRecord> {
    let id: String = row.get(0)?;
    let username: String = row.get(1)?;
    let avatar_url: Option<String> = row.get(2)?;
    let skills_known_json: String = row.get(3)?;
    let skills_to_learn_json: String = row.get(4)?;
    let created_str: String = row.get(5)?;

    let skills_known: Vec<String> = serde_json::from_str(&skills_known_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let skills_to_learn: Vec<String> = serde_json::from_str(&skills_to_learn_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(UserRecord {
        id: UserId::new(id),
        username,
        avatar_url,
        skills_known,
        skills_to_learn,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    fn sample_user(id: &str, username: &str) -> UserRecord {
        UserRecord {
            id: UserId::from(id),
            username: username.to_string(),
            avatar_url: None,
            skills_known: vec!["rust".to_string()],
            skills_to_learn: vec!["sailing".to_string()],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn upsert_and_get_round_trip() {
        let (_dir, db) = test_db();
        let user = sample_user("u1", "alice");
        db.upsert_user(&user).unwrap();

        let fetched = db.get_user(&UserId::from("u1")).unwrap();
        assert_eq!(fetched.username, "alice");
        assert_eq!(fetched.skills_known, vec!["rust"]);

        let by_name = db.get_user_by_username("alice").unwrap();
        assert_eq!(by_name.id, user.id);
    }

    #[test]
    fn upsert_updates_existing_profile() {
        let (_dir, db) = test_db();
        db.upsert_user(&sample_user("u1", "alice")).unwrap();

        let mut updated = sample_user("u1", "alice2");
        updated.skills_to_learn.push("pottery".to_string());
        db.upsert_user(&updated).unwrap();

        let fetched = db.get_user(&UserId::from("u1")).unwrap();
        assert_eq!(fetched.username, "alice2");
        assert_eq!(fetched.skills_to_learn.len(), 2);
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let (_dir, db) = test_db();
        db.upsert_user(&sample_user("u1", "alice")).unwrap();

        let err = db.upsert_user(&sample_user("u2", "alice")).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists));
    }

    #[test]
    fn list_users_excludes_caller() {
        let (_dir, db) = test_db();
        db.upsert_user(&sample_user("u1", "alice")).unwrap();
        db.upsert_user(&sample_user("u2", "bob")).unwrap();
        db.upsert_user(&sample_user("u3", "carol")).unwrap();

        let users = db.list_users(&UserId::from("u2")).unwrap();
        let names: Vec<_> = users.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["alice", "carol"]);
    }

    #[test]
    fn missing_user_is_not_found() {
        let (_dir, db) = test_db();
        assert!(matches!(
            db.get_user(&UserId::from("nope")),
            Err(StoreError::NotFound)
        ));
    }
}
