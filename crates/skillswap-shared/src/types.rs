use serde::{Deserialize, Serialize};
use thiserror::Error;

// User identity = opaque, stable id assigned by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First six characters, used as a display fallback when no username
    /// is known.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(6) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Canonical identifier of the conversation between two users.
///
/// Derived from the unordered pair of participant ids: the two ids joined
/// with `_` in lexicographic order, so the same pair always yields the same
/// id no matter which side computes it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ConversationId(String);

impl ConversationId {
    /// Resolve the canonical id for the unordered pair `{a, b}`.
    ///
    /// Symmetric: `for_pair(a, b) == for_pair(b, a)`.  Collision-free for
    /// distinct pairs since `_` never appears inside a provider id segment
    /// boundary that matters here: the full joined string is compared.
    /// Undefined for `a == b`; callers must reject self-pairs first.
    pub fn for_pair(a: &UserId, b: &UserId) -> Self {
        if a.0 <= b.0 {
            Self(format!("{}_{}", a.0, b.0))
        } else {
            Self(format!("{}_{}", b.0, a.0))
        }
    }

    /// Reconstruct from a stored string (store boundary only).
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a chat request.  Stored as a tagged string in SQLite
/// and validated on the way back in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
        }
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "accepted" => Ok(RequestStatus::Accepted),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stored status string was neither `pending` nor `accepted`.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid request status: {0:?}")]
pub struct ParseStatusError(pub String);

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn conversation_id_is_symmetric() {
        let a = UserId::from("uid-alpha");
        let b = UserId::from("uid-beta");
        assert_eq!(
            ConversationId::for_pair(&a, &b),
            ConversationId::for_pair(&b, &a)
        );
    }

    #[test]
    fn conversation_id_orders_lexicographically() {
        let a = UserId::from("bbb");
        let b = UserId::from("aaa");
        assert_eq!(ConversationId::for_pair(&a, &b).as_str(), "aaa_bbb");
    }

    #[test]
    fn distinct_pairs_get_distinct_ids() {
        let ids = ["u1", "u2", "u3", "u4"].map(UserId::from);
        let mut seen = std::collections::HashSet::new();
        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                assert!(seen.insert(ConversationId::for_pair(&ids[i], &ids[j])));
            }
        }
    }

    #[test]
    fn status_round_trips_through_str() {
        assert_eq!(
            RequestStatus::from_str("pending").unwrap(),
            RequestStatus::Pending
        );
        assert_eq!(
            RequestStatus::from_str("accepted").unwrap(),
            RequestStatus::Accepted
        );
        assert!(RequestStatus::from_str("rejected").is_err());
    }

    #[test]
    fn short_id_is_six_chars() {
        assert_eq!(UserId::from("abcdefghij").short(), "abcdef");
        assert_eq!(UserId::from("abc").short(), "abc");
    }
}
