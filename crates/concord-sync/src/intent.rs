//! Mutation intents: what a mutation touches, how it speculates, and how
//! the server's answer is folded back in.

use serde_json::json;
use tracing::debug;

use concord_progression::{advance, complete, SessionStatus, Stage, StageStatus};
use concord_timeline::{ChatItem, ChatItemId, MessageStatus, Role};

use crate::cache::{CacheKey, CacheStore, CacheValue};
use crate::error::{Error, Result};
use crate::models::{Session, SessionId};
use crate::source::{Endpoint, MutationResponse};

/// A mutation the viewer wants applied to a session.
///
/// Each intent knows the cache entries it touches, the speculative value it
/// writes before the server answers, and how to reconcile the authoritative
/// response. The coordinator drives those pieces in a fixed order; intents
/// themselves never perform I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationIntent {
    /// Confirm the invitation, joining the session.
    ConfirmInvitation { session: SessionId },
    /// Sign the compact in the final stage.
    SignCompact { session: SessionId },
    /// Advance the viewer's own progress to the next stage.
    AdvanceStage { session: SessionId, target: Stage },
    /// Send a message. The id is generated locally so the optimistic item
    /// and the server's echo deduplicate.
    SendMessage {
        session: SessionId,
        id: ChatItemId,
        content: String,
    },
    /// Advance the viewer's last-seen cursor.
    MarkSeen { session: SessionId, item: ChatItemId },
    /// Put the session on hold.
    PauseSession { session: SessionId },
    /// Resume a paused session.
    ResumeSession { session: SessionId },
    /// Soft-remove the session on the viewer's side.
    RemoveSession { session: SessionId },
}

impl MutationIntent {
    /// The session this intent belongs to.
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::ConfirmInvitation { session }
            | Self::SignCompact { session }
            | Self::AdvanceStage { session, .. }
            | Self::SendMessage { session, .. }
            | Self::MarkSeen { session, .. }
            | Self::PauseSession { session }
            | Self::ResumeSession { session }
            | Self::RemoveSession { session } => session,
        }
    }

    /// The endpoint this intent dispatches to.
    #[must_use]
    pub fn endpoint(&self) -> Endpoint {
        match self {
            Self::ConfirmInvitation { .. } => Endpoint::ConfirmInvitation,
            Self::SignCompact { .. } => Endpoint::SignCompact,
            Self::AdvanceStage { .. } => Endpoint::AdvanceStage,
            Self::SendMessage { .. } => Endpoint::SendMessage,
            Self::MarkSeen { .. } => Endpoint::MarkSeen,
            Self::PauseSession { .. } => Endpoint::PauseSession,
            Self::ResumeSession { .. } => Endpoint::ResumeSession,
            Self::RemoveSession { .. } => Endpoint::RemoveSession,
        }
    }

    /// The wire payload for the dispatch.
    #[must_use]
    pub fn payload(&self) -> serde_json::Value {
        match self {
            Self::ConfirmInvitation { session }
            | Self::SignCompact { session }
            | Self::PauseSession { session }
            | Self::ResumeSession { session }
            | Self::RemoveSession { session } => json!({ "session_id": session }),
            Self::AdvanceStage { session, target } => {
                json!({ "session_id": session, "target_stage": target })
            }
            Self::SendMessage {
                session,
                id,
                content,
            } => json!({ "session_id": session, "id": id, "content": content }),
            Self::MarkSeen { session, item } => {
                json!({ "session_id": session, "item_id": item })
            }
        }
    }

    /// Every cache entry the optimistic apply may write.
    ///
    /// The coordinator claims and snapshots exactly this set, so rollback
    /// is complete by construction.
    #[must_use]
    pub fn touched_keys(&self) -> Vec<CacheKey> {
        let session = self.session_id().clone();
        match self {
            Self::ConfirmInvitation { .. } => vec![
                CacheKey::Invitation(session.clone()),
                CacheKey::Session(session),
            ],
            Self::SendMessage { .. } => vec![CacheKey::TimelinePage { session, index: 0 }],
            Self::SignCompact { .. }
            | Self::AdvanceStage { .. }
            | Self::MarkSeen { .. }
            | Self::PauseSession { .. }
            | Self::ResumeSession { .. }
            | Self::RemoveSession { .. } => vec![CacheKey::Session(session)],
        }
    }

    /// Read models to refetch lazily after a successful mutation.
    ///
    /// Only models the mutation is *not* safety-critical for: the entries
    /// reconciled from the response are never in this set, so a blind
    /// refetch can't clobber a just-merged optimistic field.
    #[must_use]
    pub fn stale_keys(&self) -> Vec<CacheKey> {
        let session = self.session_id().clone();
        match self {
            // These produce server-side indicator rows; the head page will
            // pick them up on the next refresh.
            Self::ConfirmInvitation { .. }
            | Self::SignCompact { .. }
            | Self::AdvanceStage { .. }
            | Self::PauseSession { .. }
            | Self::ResumeSession { .. } => {
                vec![CacheKey::TimelinePage { session, index: 0 }]
            }
            Self::SendMessage { .. } | Self::MarkSeen { .. } | Self::RemoveSession { .. } => {
                vec![]
            }
        }
    }

    /// Synchronously write the speculative value into every touched entry.
    ///
    /// Runs before any suspension, so a consumer reading the cache
    /// immediately sees the change. Errors here abort the mutation before
    /// dispatch; the coordinator rolls back whatever was already written.
    pub fn apply_optimistic(&self, cache: &mut CacheStore, now_ms: u64) -> Result<()> {
        match self {
            Self::ConfirmInvitation { session } => {
                let key = CacheKey::Invitation(session.clone());
                let mut invitation = cache
                    .value(&key)
                    .and_then(CacheValue::as_invitation)
                    .cloned()
                    .ok_or_else(|| Error::UnknownSession(session.clone()))?;
                invitation.message_confirmed_at_ms = Some(now_ms);
                cache.insert(key, CacheValue::Invitation(invitation));

                // The session aggregate may not be cached yet when the
                // confirmation happens from the invitation list.
                if let Some(mut s) = cached_session(cache, session) {
                    if s.status.can_transition(SessionStatus::Active) {
                        s.status = SessionStatus::Active;
                    }
                    if s.my_progress.stage == Stage::Opening {
                        s.my_progress = complete(&s.my_progress, now_ms);
                    }
                    put_session(cache, s);
                }
                Ok(())
            }
            Self::SignCompact { session } => {
                let mut s = require_session(cache, session)?;
                if s.my_progress.stage != Stage::Compact {
                    return Err(Error::MutationConflict {
                        reason: format!("cannot sign outside {}, currently {}", Stage::Compact, s.my_progress.stage),
                    });
                }
                s.my_progress = complete(&s.my_progress, now_ms);
                let partner_signed = s.partner_progress.stage == Stage::Compact
                    && s.partner_progress.status == StageStatus::Completed;
                if partner_signed && s.status.can_transition(SessionStatus::Resolved) {
                    s.status = SessionStatus::Resolved;
                }
                put_session(cache, s);
                Ok(())
            }
            Self::AdvanceStage { session, target } => {
                let mut s = require_session(cache, session)?;
                if s.status != SessionStatus::Active {
                    return Err(Error::MutationConflict {
                        reason: format!("session is {}, not Active", s.status),
                    });
                }
                s.my_progress = advance(
                    &s.my_progress,
                    s.partner_progress.status,
                    *target,
                    now_ms,
                )?;
                debug!(session = %s.id, stage = %target, "optimistically entered stage");
                put_session(cache, s);
                Ok(())
            }
            Self::SendMessage {
                session,
                id,
                content,
            } => {
                let key = CacheKey::TimelinePage {
                    session: session.clone(),
                    index: 0,
                };
                let item = ChatItem::Message {
                    id: id.clone(),
                    role: Role::Me,
                    content: content.clone(),
                    timestamp_ms: now_ms,
                    status: MessageStatus::Queued,
                };
                if !cache.update(&key, |value| {
                    if let CacheValue::Timeline(items) = value {
                        items.push(item.clone());
                    }
                }) {
                    cache.insert(key, CacheValue::Timeline(vec![item]));
                }
                Ok(())
            }
            Self::MarkSeen { session, item } => {
                let mut s = require_session(cache, session)?;
                // The cursor only ever advances.
                if s.last_seen_chat_item_id.as_ref() < Some(item) {
                    s.last_seen_chat_item_id = Some(item.clone());
                    put_session(cache, s);
                }
                Ok(())
            }
            Self::PauseSession { session } => {
                transition_session(cache, session, SessionStatus::Paused)
            }
            Self::ResumeSession { session } => {
                transition_session(cache, session, SessionStatus::Active)
            }
            Self::RemoveSession { session } => {
                let mut s = require_session(cache, session)?;
                s.removed_by_me = true;
                put_session(cache, s);
                Ok(())
            }
        }
    }

    /// Fold the server's authoritative response back into the cache.
    ///
    /// Runs after the round-trip, reading current entries rather than
    /// anything captured before the await. Timestamp-like fields the
    /// optimistic apply set locally win over a missing or older server
    /// field — the known case is `message_confirmed_at_ms`, which the
    /// confirm endpoint's response can omit.
    pub fn reconcile(&self, cache: &mut CacheStore, response: &MutationResponse) {
        if let Some(server_invitation) = &response.invitation {
            let key = CacheKey::Invitation(server_invitation.session_id.clone());
            let mut merged = server_invitation.clone();
            if let Some(local) = cache.value(&key).and_then(CacheValue::as_invitation) {
                merged.message_confirmed_at_ms = merged
                    .message_confirmed_at_ms
                    .max(local.message_confirmed_at_ms);
            }
            cache.insert(key, CacheValue::Invitation(merged));
        }

        if let Some(server_session) = &response.session {
            let key = CacheKey::Session(server_session.id.clone());
            let mut merged = server_session.clone();
            if let Some(local) = cache.value(&key).and_then(CacheValue::as_session) {
                merged.last_seen_chat_item_id = merged
                    .last_seen_chat_item_id
                    .clone()
                    .max(local.last_seen_chat_item_id.clone());
                merged.removed_by_me = merged.removed_by_me || local.removed_by_me;
            }
            cache.insert(key, CacheValue::Session(merged));
        }

        if let Self::SendMessage { session, id, .. } = self {
            let key = CacheKey::TimelinePage {
                session: session.clone(),
                index: 0,
            };
            let server_message = response.message.clone();
            cache.update(&key, |value| {
                let CacheValue::Timeline(items) = value else {
                    return;
                };
                match &server_message {
                    Some(confirmed) => {
                        // The server echo replaces the queued copy; ids may
                        // differ if the server reassigned one.
                        items.retain(|i| i.id() != id && i.id() != confirmed.id());
                        items.push(confirmed.clone());
                    }
                    None => {
                        for item in items.iter_mut() {
                            if item.id() == id {
                                if let ChatItem::Message { status, .. } = item {
                                    if *status == MessageStatus::Queued {
                                        *status = MessageStatus::Sent;
                                    }
                                }
                            }
                        }
                    }
                }
            });
        }
    }
}

fn cached_session(cache: &CacheStore, session: &SessionId) -> Option<Session> {
    cache
        .value(&CacheKey::Session(session.clone()))
        .and_then(CacheValue::as_session)
        .cloned()
}

fn require_session(cache: &CacheStore, session: &SessionId) -> Result<Session> {
    cached_session(cache, session).ok_or_else(|| Error::UnknownSession(session.clone()))
}

fn put_session(cache: &mut CacheStore, session: Session) {
    cache.insert(
        CacheKey::Session(session.id.clone()),
        CacheValue::Session(session),
    );
}

fn transition_session(
    cache: &mut CacheStore,
    session: &SessionId,
    to: SessionStatus,
) -> Result<()> {
    let mut s = require_session(cache, session)?;
    if !s.status.can_transition(to) {
        return Err(Error::MutationConflict {
            reason: format!("cannot move session from {} to {}", s.status, to),
        });
    }
    s.status = to;
    put_session(cache, s);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Invitation, Party};
    use concord_progression::StageProgress;

    fn session(id: &str, status: SessionStatus) -> Session {
        Session {
            id: id.into(),
            status,
            me: Party {
                id: "p-me".into(),
                display_name: "Me".into(),
            },
            partner: Party {
                id: "p-partner".into(),
                display_name: "Partner".into(),
            },
            my_progress: StageProgress::opening(0),
            partner_progress: StageProgress::opening(0),
            last_seen_chat_item_id: None,
            removed_by_me: false,
        }
    }

    fn invitation(id: &str) -> Invitation {
        Invitation {
            session_id: id.into(),
            invited_by: "p-partner".into(),
            sent_at_ms: 100,
            message_confirmed_at_ms: None,
        }
    }

    fn seeded_cache(id: &str, status: SessionStatus) -> CacheStore {
        let mut cache = CacheStore::new();
        cache.insert(
            CacheKey::Session(id.into()),
            CacheValue::Session(session(id, status)),
        );
        cache.insert(
            CacheKey::Invitation(id.into()),
            CacheValue::Invitation(invitation(id)),
        );
        cache
    }

    fn get_invitation(cache: &CacheStore, id: &str) -> Invitation {
        cache
            .value(&CacheKey::Invitation(id.into()))
            .and_then(CacheValue::as_invitation)
            .cloned()
            .unwrap()
    }

    fn get_session(cache: &CacheStore, id: &str) -> Session {
        cached_session(cache, &id.into()).unwrap()
    }

    #[test]
    fn confirm_invitation_sets_local_timestamp() {
        let mut cache = seeded_cache("s1", SessionStatus::Invited);
        let intent = MutationIntent::ConfirmInvitation {
            session: "s1".into(),
        };

        intent.apply_optimistic(&mut cache, 5_000).unwrap();

        assert_eq!(
            get_invitation(&cache, "s1").message_confirmed_at_ms,
            Some(5_000)
        );
        assert_eq!(get_session(&cache, "s1").status, SessionStatus::Active);
    }

    #[test]
    fn reconcile_retains_locally_set_timestamp_when_server_omits_it() {
        let mut cache = seeded_cache("s1", SessionStatus::Invited);
        let intent = MutationIntent::ConfirmInvitation {
            session: "s1".into(),
        };
        intent.apply_optimistic(&mut cache, 5_000).unwrap();

        // Server response omits the confirmation timestamp.
        let response = MutationResponse {
            invitation: Some(invitation("s1")),
            ..Default::default()
        };
        intent.reconcile(&mut cache, &response);

        assert_eq!(
            get_invitation(&cache, "s1").message_confirmed_at_ms,
            Some(5_000)
        );
    }

    #[test]
    fn reconcile_keeps_the_newer_timestamp() {
        let mut cache = seeded_cache("s1", SessionStatus::Invited);
        let intent = MutationIntent::ConfirmInvitation {
            session: "s1".into(),
        };
        intent.apply_optimistic(&mut cache, 5_000).unwrap();

        let mut server = invitation("s1");
        server.message_confirmed_at_ms = Some(4_000);
        let response = MutationResponse {
            invitation: Some(server),
            ..Default::default()
        };
        intent.reconcile(&mut cache, &response);

        assert_eq!(
            get_invitation(&cache, "s1").message_confirmed_at_ms,
            Some(5_000)
        );
    }

    #[test]
    fn advance_stage_rejects_skip() {
        let mut cache = seeded_cache("s1", SessionStatus::Active);
        let intent = MutationIntent::AdvanceStage {
            session: "s1".into(),
            target: Stage::PerspectiveStretch,
        };

        let err = intent.apply_optimistic(&mut cache, 0).unwrap_err();
        assert!(matches!(err, Error::Progression(_)));
        // Nothing was written.
        assert_eq!(get_session(&cache, "s1").my_progress.stage, Stage::Opening);
    }

    #[test]
    fn advance_stage_requires_active_session() {
        let mut cache = seeded_cache("s1", SessionStatus::Paused);
        let intent = MutationIntent::AdvanceStage {
            session: "s1".into(),
            target: Stage::Witness,
        };

        let err = intent.apply_optimistic(&mut cache, 0).unwrap_err();
        assert!(matches!(err, Error::MutationConflict { .. }));
    }

    #[test]
    fn send_message_appends_queued_item_to_head_page() {
        let mut cache = CacheStore::new();
        let intent = MutationIntent::SendMessage {
            session: "s1".into(),
            id: "local-1".into(),
            content: "hello".into(),
        };

        intent.apply_optimistic(&mut cache, 7_000).unwrap();

        let key = CacheKey::TimelinePage {
            session: "s1".into(),
            index: 0,
        };
        let items = cache.value(&key).and_then(CacheValue::as_timeline).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].status(), Some(MessageStatus::Queued));
        assert_eq!(items[0].role(), Some(Role::Me));
    }

    #[test]
    fn send_message_reconcile_replaces_queued_copy() {
        let mut cache = CacheStore::new();
        let intent = MutationIntent::SendMessage {
            session: "s1".into(),
            id: "local-1".into(),
            content: "hello".into(),
        };
        intent.apply_optimistic(&mut cache, 7_000).unwrap();

        let confirmed = ChatItem::Message {
            id: "local-1".into(),
            role: Role::Me,
            content: "hello".into(),
            timestamp_ms: 7_321,
            status: MessageStatus::Sent,
        };
        let response = MutationResponse {
            message: Some(confirmed.clone()),
            ..Default::default()
        };
        intent.reconcile(&mut cache, &response);

        let key = CacheKey::TimelinePage {
            session: "s1".into(),
            index: 0,
        };
        let items = cache.value(&key).and_then(CacheValue::as_timeline).unwrap();
        assert_eq!(items, &[confirmed]);
    }

    #[test]
    fn mark_seen_cursor_never_moves_back() {
        let mut cache = seeded_cache("s1", SessionStatus::Active);
        let forward = MutationIntent::MarkSeen {
            session: "s1".into(),
            item: "m5".into(),
        };
        forward.apply_optimistic(&mut cache, 0).unwrap();
        assert_eq!(
            get_session(&cache, "s1").last_seen_chat_item_id,
            Some("m5".into())
        );

        let backward = MutationIntent::MarkSeen {
            session: "s1".into(),
            item: "m3".into(),
        };
        backward.apply_optimistic(&mut cache, 0).unwrap();
        assert_eq!(
            get_session(&cache, "s1").last_seen_chat_item_id,
            Some("m5".into())
        );
    }

    #[test]
    fn pause_requires_a_legal_transition() {
        let mut cache = seeded_cache("s1", SessionStatus::Invited);
        let intent = MutationIntent::PauseSession {
            session: "s1".into(),
        };
        let err = intent.apply_optimistic(&mut cache, 0).unwrap_err();
        assert!(matches!(err, Error::MutationConflict { .. }));
    }

    #[test]
    fn sign_compact_resolves_when_partner_already_signed() {
        let mut cache = CacheStore::new();
        let mut s = session("s1", SessionStatus::Active);
        s.my_progress = StageProgress {
            stage: Stage::Compact,
            status: StageStatus::InProgress,
            started_at_ms: 0,
            completed_at_ms: None,
        };
        s.partner_progress = StageProgress {
            stage: Stage::Compact,
            status: StageStatus::Completed,
            started_at_ms: 0,
            completed_at_ms: Some(1),
        };
        cache.insert(CacheKey::Session("s1".into()), CacheValue::Session(s));

        let intent = MutationIntent::SignCompact {
            session: "s1".into(),
        };
        intent.apply_optimistic(&mut cache, 9_000).unwrap();

        let s = get_session(&cache, "s1");
        assert_eq!(s.status, SessionStatus::Resolved);
        assert_eq!(s.my_progress.status, StageStatus::Completed);
        assert_eq!(s.my_progress.completed_at_ms, Some(9_000));
    }
}
