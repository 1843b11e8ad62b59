//! User directory: profile lookup by id or username.
//!
//! The chat core consumes the directory read-only through the
//! [`UserDirectory`] trait; [`StoreDirectory`] is the store-backed
//! implementation used by the application (and by tests).

use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::Serialize;
use skillswap_shared::UserId;
use skillswap_store::{Database, UserRecord};

use crate::error::{lock_database, ChatError, Result};

/// Display identity of a user, as handed to the presentation layer.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    pub avatar_url: Option<String>,
    pub skills_known: Vec<String>,
    pub skills_to_learn: Vec<String>,
}

impl From<UserRecord> for UserProfile {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            username: record.username,
            avatar_url: record.avatar_url,
            skills_known: record.skills_known,
            skills_to_learn: record.skills_to_learn,
        }
    }
}

/// Read-side contract the chat core consumes.
pub trait UserDirectory: Send + Sync {
    /// Resolve a user by their provider-assigned id.
    fn resolve_user(&self, id: &UserId) -> Result<UserProfile>;

    /// Resolve a user by their unique username.
    fn resolve_username(&self, username: &str) -> Result<UserProfile>;

    /// All user summaries excluding the caller, ordered by username.
    fn list_users(&self, exclude: &UserId) -> Result<Vec<UserProfile>>;
}

/// Directory backed by the `users` table of the shared database.
#[derive(Clone)]
pub struct StoreDirectory {
    db: Arc<Mutex<Database>>,
}

impl StoreDirectory {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    /// Create or update a profile.
    ///
    /// The username is trimmed and lowercased before storage; an empty
    /// handle is rejected and a collision with another user's handle
    /// surfaces as [`ChatError::AlreadyExists`].
    pub fn save_profile(&self, profile: &UserProfile) -> Result<()> {
        let username = profile.username.trim().to_lowercase();
        if username.is_empty() {
            return Err(ChatError::InvalidArgument(
                "username must not be empty".to_string(),
            ));
        }

        let record = UserRecord {
            id: profile.id.clone(),
            username,
            avatar_url: profile.avatar_url.clone(),
            skills_known: profile.skills_known.clone(),
            skills_to_learn: profile.skills_to_learn.clone(),
            created_at: Utc::now(),
        };

        let db = lock_database(&self.db)?;
        db.upsert_user(&record)?;

        tracing::debug!(user = %record.id, username = %record.username, "profile saved");
        Ok(())
    }
}

impl UserDirectory for StoreDirectory {
    fn resolve_user(&self, id: &UserId) -> Result<UserProfile> {
        let db = lock_database(&self.db)?;
        Ok(db.get_user(id)?.into())
    }

    fn resolve_username(&self, username: &str) -> Result<UserProfile> {
        let db = lock_database(&self.db)?;
        Ok(db.get_user_by_username(username)?.into())
    }

    fn list_users(&self, exclude: &UserId) -> Result<Vec<UserProfile>> {
        let db = lock_database(&self.db)?;
        let users = db.list_users(exclude)?;
        Ok(users.into_iter().map(UserProfile::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_directory() -> (tempfile::TempDir, StoreDirectory) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        (dir, StoreDirectory::new(Arc::new(Mutex::new(db))))
    }

    fn profile(id: &str, username: &str) -> UserProfile {
        UserProfile {
            id: UserId::from(id),
            username: username.to_string(),
            avatar_url: None,
            skills_known: vec![],
            skills_to_learn: vec![],
        }
    }

    #[test]
    fn usernames_are_normalized() {
        let (_dir, directory) = test_directory();
        directory.save_profile(&profile("u1", "  Alice ")).unwrap();

        let resolved = directory.resolve_username("alice").unwrap();
        assert_eq!(resolved.id, UserId::from("u1"));
        assert_eq!(resolved.username, "alice");
    }

    #[test]
    fn empty_username_is_invalid() {
        let (_dir, directory) = test_directory();
        let err = directory.save_profile(&profile("u1", "   ")).unwrap_err();
        assert!(matches!(err, ChatError::InvalidArgument(_)));
    }

    #[test]
    fn username_collision_is_already_exists() {
        let (_dir, directory) = test_directory();
        directory.save_profile(&profile("u1", "alice")).unwrap();

        let err = directory.save_profile(&profile("u2", "alice")).unwrap_err();
        assert!(matches!(err, ChatError::AlreadyExists));
    }

    #[test]
    fn unknown_user_is_not_found() {
        let (_dir, directory) = test_directory();
        assert!(matches!(
            directory.resolve_user(&UserId::from("ghost")),
            Err(ChatError::NotFound)
        ));
    }
}
