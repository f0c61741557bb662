//! Scroll anchor preservation across history prepends.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

/// Configuration for the scroll anchor controller.
#[derive(Debug, Clone, Copy)]
pub struct ScrollConfig {
    /// How long to wait for rendered content to grow after a history fetch
    /// completes before giving up on the correction.
    pub restore_timeout: Duration,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            restore_timeout: Duration::from_millis(500),
        }
    }
}

impl ScrollConfig {
    /// Set the restore timeout.
    #[must_use]
    pub fn with_restore_timeout(mut self, timeout: Duration) -> Self {
        self.restore_timeout = timeout;
        self
    }
}

/// Current viewport measurements supplied by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportMetrics {
    /// Total rendered content height, in pixels.
    pub content_height: f64,
    /// Current scroll offset from the top, in pixels.
    pub scroll_offset: f64,
}

/// Snapshot captured at the moment a history fetch begins. Consumed exactly
/// once when the corresponding content growth is observed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollSnapshot {
    /// Content height at capture time.
    pub content_height: f64,
    /// Scroll offset at capture time.
    pub scroll_offset: f64,
}

/// A single scroll correction the presentation layer must apply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollCorrection {
    /// The offset that restores the reader's visual position.
    pub scroll_offset: f64,
}

#[derive(Debug, Clone, Copy)]
enum State {
    Idle,
    RestoringAfterHistoryLoad {
        snapshot: ScrollSnapshot,
        /// Armed when the fetch completes; unset while it is in flight.
        deadline: Option<Instant>,
    },
}

/// Preserves the reader's scroll anchor while older history is prepended.
///
/// Two states: `Idle` and `RestoringAfterHistoryLoad`. While restoring,
/// auto-scroll-to-latest must be suppressed — otherwise a history load and
/// a live new-message arrival racing together would fight over the scroll
/// position. The controller returns to `Idle` by issuing exactly one
/// correction once content grows, or by the timeout fallback when the page
/// turned out to add no height (a cosmetic self-heal, not an error).
#[derive(Debug)]
pub struct ScrollAnchorController {
    config: ScrollConfig,
    state: State,
}

impl ScrollAnchorController {
    /// Create a controller in `Idle`.
    #[must_use]
    pub fn new(config: ScrollConfig) -> Self {
        Self {
            config,
            state: State::Idle,
        }
    }

    /// Whether a history restore is in progress.
    #[must_use]
    pub const fn is_restoring(&self) -> bool {
        matches!(self.state, State::RestoringAfterHistoryLoad { .. })
    }

    /// Whether auto-scroll-to-latest must be held off right now.
    #[must_use]
    pub const fn auto_scroll_suppressed(&self) -> bool {
        self.is_restoring()
    }

    /// Begin a history load, capturing the anchor snapshot.
    ///
    /// Returns `false` (and changes nothing) if a restore is already in
    /// progress — the caller must not start a second history fetch.
    pub fn begin_history_load(&mut self, metrics: ViewportMetrics) -> bool {
        if self.is_restoring() {
            return false;
        }
        let snapshot = ScrollSnapshot {
            content_height: metrics.content_height,
            scroll_offset: metrics.scroll_offset,
        };
        debug!(
            content_height = snapshot.content_height,
            scroll_offset = snapshot.scroll_offset,
            "captured scroll anchor for history load"
        );
        self.state = State::RestoringAfterHistoryLoad {
            snapshot,
            deadline: None,
        };
        true
    }

    /// Note that the history fetch finished, arming the timeout window.
    ///
    /// The rendered height usually grows shortly after; if it never does
    /// (empty page), [`poll`](Self::poll) resets the controller once the
    /// window elapses.
    pub fn fetch_completed(&mut self) {
        if let State::RestoringAfterHistoryLoad { deadline, .. } = &mut self.state {
            if deadline.is_none() {
                *deadline = Some(Instant::now() + self.config.restore_timeout);
            }
        }
    }

    /// Observe a new rendered content height.
    ///
    /// While restoring, a height greater than the snapshot's consumes the
    /// snapshot and yields exactly one correction of
    /// `snapshot.scroll_offset + (new_height - snapshot.content_height)`.
    /// All other height events yield nothing.
    pub fn observe_content_height(&mut self, new_height: f64) -> Option<ScrollCorrection> {
        let State::RestoringAfterHistoryLoad { snapshot, .. } = self.state else {
            return None;
        };
        if new_height <= snapshot.content_height {
            return None;
        }
        let delta = new_height - snapshot.content_height;
        let correction = ScrollCorrection {
            scroll_offset: snapshot.scroll_offset + delta,
        };
        debug!(
            delta,
            scroll_offset = correction.scroll_offset,
            "issuing scroll correction after history prepend"
        );
        self.state = State::Idle;
        Some(correction)
    }

    /// Drive the timeout fallback.
    ///
    /// Returns `true` when the fallback fired: the restore window elapsed
    /// with no height growth and the controller force-reset to `Idle`
    /// without a correction, so auto-scroll suppression cannot wedge.
    pub fn poll(&mut self) -> bool {
        if let State::RestoringAfterHistoryLoad {
            deadline: Some(deadline),
            ..
        } = self.state
        {
            if Instant::now() >= deadline {
                warn!("history load produced no content growth, releasing scroll anchor");
                self.state = State::Idle;
                return true;
            }
        }
        false
    }
}

impl Default for ScrollAnchorController {
    fn default() -> Self {
        Self::new(ScrollConfig::default())
    }
}
