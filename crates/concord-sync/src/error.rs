//! Error types for concord-sync.

use thiserror::Error;

use crate::cache::CacheKey;
use crate::models::SessionId;
use crate::source::SourceError;

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers of the sync facade.
///
/// By the time a caller observes one of these, any optimistic writes of the
/// failing mutation have already been rolled back; user-facing messaging
/// and retry decisions belong to the caller, never to this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A stage regression, skip, or unsatisfied gate. Rejected, not clamped.
    #[error(transparent)]
    Progression(#[from] concord_progression::Error),

    /// The server rejected an optimistic write because its state diverged.
    #[error("mutation conflict: {reason}")]
    MutationConflict { reason: String },

    /// Transport-level failure. The caller may retry; this crate never does.
    #[error("network failure: {reason}")]
    NetworkFailure { reason: String },

    /// Another optimistic mutation already holds one of the touched entries.
    #[error("another mutation is in flight for {key}")]
    MutationInFlight { key: CacheKey },

    /// The server has no such resource.
    #[error("not found: {reason}")]
    NotFound { reason: String },

    /// The facade has no open view for this session.
    #[error("session {0} is not open")]
    SessionNotOpen(SessionId),

    /// A mutation touched a session the cache has never seen.
    #[error("no cached state for session {0}")]
    UnknownSession(SessionId),
}

impl From<SourceError> for Error {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Network(reason) => Self::NetworkFailure { reason },
            SourceError::Conflict(reason) => Self::MutationConflict { reason },
            SourceError::NotFound(reason) => Self::NotFound { reason },
        }
    }
}
