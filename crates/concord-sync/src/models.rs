//! Server-derived read models.

use serde::{Deserialize, Serialize};

use concord_progression::{SessionStatus, StageProgress};
use concord_timeline::ChatItemId;

/// Server-assigned session identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Create an id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Server-assigned party identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyId(pub String);

impl From<&str> for PartyId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// One of the two parties in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub id: PartyId,
    pub display_name: String,
}

/// The session aggregate as seen by one viewer.
///
/// Holds exactly two progress records — the viewer's own and the
/// partner's — plus the viewer's last-seen cursor. Sessions are never
/// deleted; they end as `Resolved` or get soft-removed per party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub status: SessionStatus,
    pub me: Party,
    pub partner: Party,
    pub my_progress: StageProgress,
    pub partner_progress: StageProgress,
    /// Monotonically advancing cursor over the timeline; never moves back.
    pub last_seen_chat_item_id: Option<ChatItemId>,
    /// Soft removal on the viewer's side only.
    pub removed_by_me: bool,
}

/// The invitation read model for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    pub session_id: SessionId,
    pub invited_by: PartyId,
    pub sent_at_ms: u64,
    /// Set locally the moment the viewer confirms; the server response may
    /// omit it, in which case the local value is authoritative.
    pub message_confirmed_at_ms: Option<u64>,
}
