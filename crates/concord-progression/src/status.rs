//! Session-level status machine.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a session as a whole.
///
/// Sessions are never deleted: the terminal transition is `Resolved`, and
/// a party that wants a session gone soft-removes it on their own side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Created but the invitation has not gone out yet.
    Created,
    /// Invitation sent, waiting on the partner's confirmation.
    Invited,
    /// Both parties present; stages are running.
    Active,
    /// Temporarily on hold by either party.
    Paused,
    /// The compact was signed; the session is closed.
    Resolved,
}

impl SessionStatus {
    /// Whether `self -> to` is a legal lifecycle transition.
    #[must_use]
    pub const fn can_transition(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Created, Self::Invited)
                | (Self::Invited, Self::Active)
                | (Self::Active, Self::Paused)
                | (Self::Active, Self::Resolved)
                | (Self::Paused, Self::Active)
                | (Self::Paused, Self::Resolved)
        )
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Invited => write!(f, "Invited"),
            Self::Active => write!(f, "Active"),
            Self::Paused => write!(f, "Paused"),
            Self::Resolved => write!(f, "Resolved"),
        }
    }
}
