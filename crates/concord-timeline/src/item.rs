//! Timeline item types.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Reserved id for the synthetic empty-state item. Never assigned by the
/// server, so it cannot collide with a real item.
pub const EMPTY_STATE_ID: &str = "empty-state";

/// Server-assigned item identifier.
///
/// Ids are opaque strings with a total lexicographic order; the order is
/// only used to break timestamp ties deterministically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatItemId(pub String);

impl ChatItemId {
    /// Create an id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChatItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ChatItemId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ChatItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Author of a message, from the viewer's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The viewing party.
    Me,
    /// The other party in the session.
    Partner,
    /// The guided-flow prompts themselves.
    Guide,
}

/// Delivery status of a message. The one mutable field on an otherwise
/// immutable item, used for optimistic send tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Written locally, not yet acknowledged by the server.
    Queued,
    /// Accepted by the server.
    Sent,
    /// Seen by the partner.
    Delivered,
    /// The send failed; the caller decides whether to retry.
    Failed,
}

impl MessageStatus {
    /// Whether the message is an optimistic, not-yet-confirmed write.
    #[must_use]
    pub const fn is_optimistic(self) -> bool {
        matches!(self, Self::Queued)
    }
}

/// Kind of a system indicator row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    /// A party entered a new stage.
    StageEntered,
    /// The partner confirmed the invitation and joined.
    PartnerJoined,
    /// The session was paused.
    SessionPaused,
    /// The session resumed.
    SessionResumed,
    /// A party signed the compact.
    CompactSigned,
}

/// A single entry in the merged timeline.
///
/// The variants are matched exhaustively at the merge and classification
/// boundaries, so adding a variant fails to compile until every consumer
/// handles it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatItem {
    /// A message authored by one of the parties or the guide.
    Message {
        id: ChatItemId,
        role: Role,
        content: String,
        timestamp_ms: u64,
        status: MessageStatus,
    },
    /// A system indicator row.
    Indicator {
        id: ChatItemId,
        kind: IndicatorKind,
        timestamp_ms: u64,
    },
    /// Synthetic placeholder shown while the timeline has no messages.
    EmptyState { id: ChatItemId },
}

impl ChatItem {
    /// The synthetic empty-state item.
    #[must_use]
    pub fn empty_state() -> Self {
        Self::EmptyState {
            id: ChatItemId::new(EMPTY_STATE_ID),
        }
    }

    /// The item's id.
    #[must_use]
    pub fn id(&self) -> &ChatItemId {
        match self {
            Self::Message { id, .. } | Self::Indicator { id, .. } | Self::EmptyState { id } => id,
        }
    }

    /// The item's timestamp. The empty-state item has none and sorts last.
    #[must_use]
    pub fn timestamp_ms(&self) -> u64 {
        match self {
            Self::Message { timestamp_ms, .. } | Self::Indicator { timestamp_ms, .. } => {
                *timestamp_ms
            }
            Self::EmptyState { .. } => 0,
        }
    }

    /// Whether this is a real message (the empty-state injection rule keys
    /// off this, not off item count).
    #[must_use]
    pub const fn is_message(&self) -> bool {
        matches!(self, Self::Message { .. })
    }

    /// The author role, for messages.
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        match self {
            Self::Message { role, .. } => Some(*role),
            Self::Indicator { .. } | Self::EmptyState { .. } => None,
        }
    }

    /// The delivery status, for messages.
    #[must_use]
    pub fn status(&self) -> Option<MessageStatus> {
        match self {
            Self::Message { status, .. } => Some(*status),
            Self::Indicator { .. } | Self::EmptyState { .. } => None,
        }
    }

    /// Compare two instances ignoring the mutable `status` field.
    ///
    /// Two pages carrying the same id must agree on everything else; a
    /// mismatch is a merge invariant violation.
    #[must_use]
    pub fn immutable_fields_match(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Message {
                    id: a_id,
                    role: a_role,
                    content: a_content,
                    timestamp_ms: a_ts,
                    status: _,
                },
                Self::Message {
                    id: b_id,
                    role: b_role,
                    content: b_content,
                    timestamp_ms: b_ts,
                    status: _,
                },
            ) => a_id == b_id && a_role == b_role && a_content == b_content && a_ts == b_ts,
            (Self::Indicator { .. }, Self::Indicator { .. })
            | (Self::EmptyState { .. }, Self::EmptyState { .. }) => self == other,
            _ => false,
        }
    }

    /// Newest-first ordering: `(timestamp desc, id desc)`.
    #[must_use]
    pub fn cmp_newest_first(&self, other: &Self) -> Ordering {
        other
            .timestamp_ms()
            .cmp(&self.timestamp_ms())
            .then_with(|| other.id().cmp(self.id()))
    }
}

/// Opaque pagination cursor handed back by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageCursor(pub String);

impl PageCursor {
    /// Create a cursor from any string-like value.
    pub fn new(cursor: impl Into<String>) -> Self {
        Self(cursor.into())
    }
}

/// One raw page of timeline items as fetched from the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelinePage {
    /// Items in server order (the merge does not rely on it).
    pub items: Vec<ChatItem>,
    /// Whether older history exists beyond this page.
    pub has_more: bool,
    /// Cursor for the next (older) page, when `has_more`.
    pub next_cursor: Option<PageCursor>,
}
