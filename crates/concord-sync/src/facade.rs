//! The session sync facade.
//!
//! [`SessionSync`] is the single surface presentation code talks to. It
//! owns the cache, the data source, and one view per open session; the view
//! bundles the per-session trackers (reveal classifier, scroll anchor
//! controller, pagination state) so that closing a session drops all of its
//! state at once.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info};

use concord_timeline::{merge_pages, ChatItem, ChatItemId, PageCursor};
use concord_viewport::{
    AnimationState, RevealClassifier, RevealConfig, ScrollAnchorController, ScrollConfig,
    ScrollCorrection, ViewportMetrics,
};

use crate::cache::{CacheKey, CacheStore, CacheValue};
use crate::coordinator::apply_mutation;
use crate::error::{Error, Result};
use crate::intent::MutationIntent;
use crate::models::{Invitation, Session, SessionId};
use crate::source::{DataSource, MutationResponse};

/// Configuration for the facade's per-session trackers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncConfig {
    pub scroll: ScrollConfig,
    pub reveal: RevealConfig,
}

/// One merged timeline item with its reveal decision.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedItem {
    pub item: ChatItem,
    pub animation: AnimationState,
}

/// The merged, classified timeline plus the flags the presentation layer
/// needs to render it.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineView {
    /// Newest first.
    pub items: Vec<ClassifiedItem>,
    /// Whether older history exists beyond the loaded pages.
    pub has_more: bool,
    /// Whether a history fetch is in flight.
    pub loading_older: bool,
    /// Whether auto-scroll-to-latest must be held off right now.
    pub auto_scroll_suppressed: bool,
}

/// Per-session trackers. Created on open, dropped on close.
#[derive(Debug)]
struct SessionView {
    /// Number of contiguous pages loaded, head page included.
    page_count: u32,
    has_more: bool,
    next_cursor: Option<PageCursor>,
    loading_older: bool,
    reveal: RevealClassifier,
    scroll: ScrollAnchorController,
}

impl SessionView {
    fn new(config: SyncConfig) -> Self {
        Self {
            page_count: 0,
            has_more: false,
            next_cursor: None,
            loading_older: false,
            reveal: RevealClassifier::new(config.reveal),
            scroll: ScrollAnchorController::new(config.scroll),
        }
    }
}

/// The read/write surface over one user's sessions.
#[derive(Debug)]
pub struct SessionSync<D: DataSource> {
    source: D,
    cache: CacheStore,
    config: SyncConfig,
    views: HashMap<SessionId, SessionView>,
}

impl<D: DataSource> SessionSync<D> {
    /// Create a facade with default tracker configuration.
    pub fn new(source: D) -> Self {
        Self::with_config(source, SyncConfig::default())
    }

    /// Create a facade with explicit tracker configuration.
    pub fn with_config(source: D, config: SyncConfig) -> Self {
        Self {
            source,
            cache: CacheStore::new(),
            config,
            views: HashMap::new(),
        }
    }

    /// Open a session, creating its trackers if it is not already open.
    ///
    /// Opening is idempotent; reopening an open session keeps its existing
    /// classification and pagination state.
    pub fn open_session(&mut self, session: SessionId) {
        if !self.views.contains_key(&session) {
            info!(session = %session, "opening session view");
            self.views
                .insert(session, SessionView::new(self.config));
        }
    }

    /// Close a session, dropping its trackers and evicting its cache
    /// entries. Reopening starts from a clean first classification pass.
    pub fn close_session(&mut self, session: &SessionId) {
        if self.views.remove(session).is_some() {
            info!(session = %session, "closing session view");
        }
        self.cache.evict_session(session);
    }

    /// The cached session aggregate, if any.
    #[must_use]
    pub fn session(&self, session: &SessionId) -> Option<&Session> {
        self.cache
            .value(&CacheKey::Session(session.clone()))
            .and_then(CacheValue::as_session)
    }

    /// The cached invitation read model, if any.
    #[must_use]
    pub fn invitation(&self, session: &SessionId) -> Option<&Invitation> {
        self.cache
            .value(&CacheKey::Invitation(session.clone()))
            .and_then(CacheValue::as_invitation)
    }

    /// Whether the head timeline page is marked stale and should be
    /// refetched with [`refresh_timeline`](Self::refresh_timeline).
    #[must_use]
    pub fn timeline_stale(&self, session: &SessionId) -> bool {
        self.cache.is_stale(&CacheKey::TimelinePage {
            session: session.clone(),
            index: 0,
        })
    }

    /// Seed the session aggregate from an out-of-band source, such as the
    /// session list the application fetched on its own.
    pub fn seed_session(&mut self, session: Session) {
        self.cache.insert(
            CacheKey::Session(session.id.clone()),
            CacheValue::Session(session),
        );
    }

    /// Seed the invitation read model from an out-of-band source.
    pub fn seed_invitation(&mut self, invitation: Invitation) {
        self.cache.insert(
            CacheKey::Invitation(invitation.session_id.clone()),
            CacheValue::Invitation(invitation),
        );
    }

    /// Fetch the session aggregate from the server and cache it.
    pub async fn refresh_session(&mut self, session: &SessionId) -> Result<Session> {
        let fetched = self.source.fetch_session(session).await?;
        self.cache.insert(
            CacheKey::Session(session.clone()),
            CacheValue::Session(fetched.clone()),
        );
        Ok(fetched)
    }

    /// Fetch the newest timeline page and return the rebuilt view.
    ///
    /// The first fetch of an open session seeds the pagination state; later
    /// refreshes replace the head page in place and leave the loaded
    /// history pages alone.
    pub async fn refresh_timeline(&mut self, session: &SessionId) -> Result<TimelineView> {
        if !self.views.contains_key(session) {
            return Err(Error::SessionNotOpen(session.clone()));
        }
        let page = self.source.fetch_timeline_page(session, None).await?;
        self.cache.insert(
            CacheKey::TimelinePage {
                session: session.clone(),
                index: 0,
            },
            CacheValue::Timeline(page.items),
        );

        let view = self.view_mut(session)?;
        if view.page_count == 0 {
            view.page_count = 1;
            view.has_more = page.has_more;
            view.next_cursor = page.next_cursor;
        }
        self.timeline(session)
    }

    /// Fetch one page of older history, preserving the scroll anchor.
    ///
    /// A no-op (returning the current view) when a history load is already
    /// in progress or no older history exists; at most one history fetch is
    /// in flight per session.
    pub async fn load_older(
        &mut self,
        session: &SessionId,
        metrics: ViewportMetrics,
    ) -> Result<TimelineView> {
        let planned = {
            let view = self.view_mut(session)?;
            if view.loading_older || !view.has_more || !view.scroll.begin_history_load(metrics) {
                debug!(session = %session, "skipping history load");
                None
            } else {
                view.loading_older = true;
                Some((view.next_cursor.clone(), view.page_count))
            }
        };
        let Some((cursor, index)) = planned else {
            return self.timeline(session);
        };

        let fetched = self.source.fetch_timeline_page(session, cursor.as_ref()).await;

        let view = self.view_mut(session)?;
        view.loading_older = false;
        // Arms the restore window in both outcomes; a failed fetch adds no
        // height and the timeout fallback releases the anchor.
        view.scroll.fetch_completed();

        match fetched {
            Ok(page) => {
                view.page_count = index + 1;
                view.has_more = page.has_more;
                view.next_cursor = page.next_cursor;
                self.cache.insert(
                    CacheKey::TimelinePage {
                        session: session.clone(),
                        index,
                    },
                    CacheValue::Timeline(page.items),
                );
                self.timeline(session)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Rebuild the merged, classified timeline from the cached pages.
    pub fn timeline(&mut self, session: &SessionId) -> Result<TimelineView> {
        let view = self
            .views
            .get_mut(session)
            .ok_or_else(|| Error::SessionNotOpen(session.clone()))?;

        // An optimistic send may create the head page before the first
        // fetch; surface it rather than waiting for a refresh.
        let mut loaded = view.page_count;
        if loaded == 0 {
            let head = CacheKey::TimelinePage {
                session: session.clone(),
                index: 0,
            };
            if self.cache.get(&head).is_some() {
                loaded = 1;
            }
        }

        let mut pages = Vec::with_capacity(loaded as usize);
        for index in 0..loaded {
            let key = CacheKey::TimelinePage {
                session: session.clone(),
                index,
            };
            if let Some(items) = self.cache.value(&key).and_then(CacheValue::as_timeline) {
                pages.push(items.to_vec());
            }
        }

        let merged = merge_pages(&pages, Some(ChatItem::empty_state()));
        let history_load_active = view.loading_older || view.scroll.is_restoring();
        // Only a fetched page counts as loaded content: a pass over the
        // placeholder or an optimistic pre-fetch send must leave the
        // classifier's history baseline open for the real first page.
        let page_loaded = view.page_count > 0;
        let states = view.reveal.classify(&merged, page_loaded, history_load_active);

        Ok(TimelineView {
            items: merged
                .into_iter()
                .zip(states)
                .map(|(item, animation)| ClassifiedItem { item, animation })
                .collect(),
            has_more: view.has_more,
            loading_older: view.loading_older,
            auto_scroll_suppressed: view.scroll.auto_scroll_suppressed(),
        })
    }

    /// Apply one mutation through the optimistic coordinator.
    pub async fn apply(&mut self, intent: MutationIntent) -> Result<MutationResponse> {
        apply_mutation(&mut self.source, &mut self.cache, &intent, unix_now_ms()).await
    }

    /// Report that the reveal animation for `id` finished.
    pub fn on_animation_complete(&mut self, session: &SessionId, id: &ChatItemId) -> Result<()> {
        self.view_mut(session)?.reveal.on_animation_complete(id);
        Ok(())
    }

    /// Report a new rendered content height, returning the scroll
    /// correction to apply if a history restore consumed its anchor.
    pub fn observe_content_height(
        &mut self,
        session: &SessionId,
        new_height: f64,
    ) -> Result<Option<ScrollCorrection>> {
        Ok(self
            .view_mut(session)?
            .scroll
            .observe_content_height(new_height))
    }

    /// Whether auto-scroll-to-latest must be held off for this session.
    #[must_use]
    pub fn auto_scroll_suppressed(&self, session: &SessionId) -> bool {
        self.views
            .get(session)
            .is_some_and(|v| v.scroll.auto_scroll_suppressed())
    }

    /// Drive the timeout fallbacks of every open session's trackers.
    ///
    /// Call periodically (or on each frame); both fallbacks are cosmetic
    /// self-heals and the call is cheap when nothing is pending.
    pub fn poll(&mut self) {
        for view in self.views.values_mut() {
            view.scroll.poll();
            view.reveal.poll();
        }
    }

    fn view_mut(&mut self, session: &SessionId) -> Result<&mut SessionView> {
        self.views
            .get_mut(session)
            .ok_or_else(|| Error::SessionNotOpen(session.clone()))
    }
}

fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
