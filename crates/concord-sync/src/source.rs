//! The external data/transport collaborator.
//!
//! The engine never talks to the network itself; it consumes a
//! [`DataSource`] supplied by the application. Transport failures must
//! arrive as typed [`SourceError`] values, never as stringly-typed panics,
//! so the coordinator can tell a retryable network failure from a server
//! rejection.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use concord_timeline::{ChatItem, PageCursor, TimelinePage};

use crate::models::{Invitation, Session, SessionId};

/// Errors from the data source.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// Transport-level failure; the mutation may be retried by the caller.
    #[error("network failure: {0}")]
    Network(String),

    /// The server rejected the mutation because its state diverged.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The server has no such resource.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Server endpoint a mutation dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    ConfirmInvitation,
    SignCompact,
    AdvanceStage,
    SendMessage,
    MarkSeen,
    PauseSession,
    ResumeSession,
    RemoveSession,
}

impl Endpoint {
    /// The server route for this endpoint.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::ConfirmInvitation => "sessions/confirm-invitation",
            Self::SignCompact => "sessions/sign-compact",
            Self::AdvanceStage => "sessions/advance-stage",
            Self::SendMessage => "sessions/messages",
            Self::MarkSeen => "sessions/mark-seen",
            Self::PauseSession => "sessions/pause",
            Self::ResumeSession => "sessions/resume",
            Self::RemoveSession => "sessions/remove",
        }
    }
}

/// The server's authoritative response to a mutation.
///
/// Every field is optional: the server returns only the read models the
/// mutation affected, and may omit fields the optimistic write already set
/// (reconciliation handles that case explicitly).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MutationResponse {
    pub session: Option<Session>,
    pub invitation: Option<Invitation>,
    pub message: Option<ChatItem>,
}

/// The external collaborator the engine fetches from and dispatches to.
pub trait DataSource {
    /// Fetch one timeline page. `cursor = None` means the newest page.
    fn fetch_timeline_page(
        &mut self,
        session: &SessionId,
        cursor: Option<&PageCursor>,
    ) -> impl std::future::Future<Output = Result<TimelinePage, SourceError>> + Send;

    /// Fetch the session read model.
    fn fetch_session(
        &mut self,
        session: &SessionId,
    ) -> impl std::future::Future<Output = Result<Session, SourceError>> + Send;

    /// Dispatch a mutation to the server.
    fn send_mutation(
        &mut self,
        endpoint: Endpoint,
        payload: serde_json::Value,
    ) -> impl std::future::Future<Output = Result<MutationResponse, SourceError>> + Send;
}
