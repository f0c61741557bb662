//! Reveal classification and single-slot animation sequencing.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use concord_timeline::{ChatItem, ChatItemId, Role};

/// Configuration for the reveal classifier.
#[derive(Debug, Clone, Copy)]
pub struct RevealConfig {
    /// How long a revealing item may go without its completion callback
    /// before the queue forces it done. `None` disables the fallback.
    pub stall_timeout: Option<Duration>,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            stall_timeout: Some(Duration::from_secs(10)),
        }
    }
}

impl RevealConfig {
    /// Set the stall timeout.
    #[must_use]
    pub fn with_stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = Some(timeout);
        self
    }

    /// Disable the stall fallback.
    #[must_use]
    pub fn without_stall_timeout(mut self) -> Self {
        self.stall_timeout = None;
        self
    }
}

/// Animation state of a timeline item.
///
/// Transitions are one-way: `History` is terminal, and `Pending` only moves
/// forward through `Animating` to `Done`. An item never regresses, so it
/// cannot re-animate when the list re-sorts or a virtualized row remounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationState {
    /// Shown immediately, never animated.
    History,
    /// New, waiting for the animation slot.
    Pending,
    /// Currently revealing. At most one item globally.
    Animating,
    /// Reveal finished. Permanent.
    Done,
}

/// Classifies timeline items as history or new, and sequences new items
/// through a single global reveal slot.
///
/// One classifier exists per open session and owns all of its trackers;
/// it is created when the session opens and dropped when it closes, so
/// nothing leaks across sessions. A classification decision is made once
/// per item at first sight and never re-evaluated.
#[derive(Debug)]
pub struct RevealClassifier {
    config: RevealConfig,
    /// Decided state per item id. Entries are never removed or regressed.
    states: HashMap<ChatItemId, AnimationState>,
    /// Set after the first pass that carried fetched page content;
    /// everything up to and including that pass is history by definition.
    first_loaded_pass_done: bool,
    /// The item currently holding the animation slot, and when it took it.
    animating: Option<(ChatItemId, Instant)>,
}

impl RevealClassifier {
    /// Create a classifier for a newly opened session.
    #[must_use]
    pub fn new(config: RevealConfig) -> Self {
        Self {
            config,
            states: HashMap::new(),
            first_loaded_pass_done: false,
            animating: None,
        }
    }

    /// The item currently animating, if any.
    #[must_use]
    pub fn animating(&self) -> Option<&ChatItemId> {
        self.animating.as_ref().map(|(id, _)| id)
    }

    /// Classify a merged, newest-first timeline.
    ///
    /// `page_loaded` tells the classifier whether the items include fetched
    /// page content. The history baseline covers everything up to and
    /// including the first such pass — a render before the first fetch
    /// (just the placeholder, or an optimistic send) must not consume it,
    /// or the first page would reveal one item at a time.
    ///
    /// Items seen for the first time are decided here: history while the
    /// baseline is open, if a history load is active, if the item is
    /// authored by the viewer, or if it is an optimistic not-yet-confirmed
    /// write; otherwise pending. The scan then promotes the first pending
    /// item (newest first) into the animation slot when the slot is free.
    ///
    /// Returns one state per input item, in input order.
    pub fn classify(
        &mut self,
        items: &[ChatItem],
        page_loaded: bool,
        history_load_active: bool,
    ) -> Vec<AnimationState> {
        for item in items {
            if self.states.contains_key(item.id()) {
                continue;
            }
            let state = if self.decide_history(item, history_load_active) {
                AnimationState::History
            } else {
                AnimationState::Pending
            };
            self.states.insert(item.id().clone(), state);
        }
        if page_loaded {
            self.first_loaded_pass_done = true;
        }

        if self.animating.is_none() {
            // Newest-first scan: the most recent pending item reveals first.
            for item in items {
                if self.states.get(item.id()) == Some(&AnimationState::Pending) {
                    debug!(id = %item.id(), "promoting item into the reveal slot");
                    self.states
                        .insert(item.id().clone(), AnimationState::Animating);
                    self.animating = Some((item.id().clone(), Instant::now()));
                    break;
                }
            }
        }

        items
            .iter()
            .map(|item| self.states[item.id()])
            .collect()
    }

    fn decide_history(&self, item: &ChatItem, history_load_active: bool) -> bool {
        if !self.first_loaded_pass_done || history_load_active {
            return true;
        }
        match item {
            ChatItem::Message { role, status, .. } => {
                *role == Role::Me || status.is_optimistic()
            }
            ChatItem::Indicator { .. } => false,
            // The placeholder is synthetic; revealing it would be noise.
            ChatItem::EmptyState { .. } => true,
        }
    }

    /// Mark the animating item's reveal as finished.
    ///
    /// The presentation layer must call this exactly once per animating
    /// item; the item becomes `Done` permanently and the slot frees up for
    /// the next classification pass. Completing any other id is a no-op.
    pub fn on_animation_complete(&mut self, id: &ChatItemId) {
        match &self.animating {
            Some((current, _)) if current == id => {
                self.states.insert(id.clone(), AnimationState::Done);
                self.animating = None;
            }
            _ => {
                warn!(id = %id, "completion callback for an item that is not animating");
            }
        }
    }

    /// Drive the stall fallback.
    ///
    /// If the animating item has held the slot longer than the configured
    /// stall timeout, it is forced to `Done` so a lost completion callback
    /// cannot wedge the queue. Returns the forced id when that happens.
    pub fn poll(&mut self) -> Option<ChatItemId> {
        let timeout = self.config.stall_timeout?;
        let (id, since) = self.animating.as_ref()?;
        if since.elapsed() < timeout {
            return None;
        }
        let id = id.clone();
        warn!(id = %id, "reveal stalled without completion, forcing done");
        self.states.insert(id.clone(), AnimationState::Done);
        self.animating = None;
        Some(id)
    }
}

impl Default for RevealClassifier {
    fn default() -> Self {
        Self::new(RevealConfig::default())
    }
}
