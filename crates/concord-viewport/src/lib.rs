//! Viewport concerns for the Concord timeline: scroll anchoring across
//! history prepends, and one-at-a-time reveal animation of new items.
//!
//! Both state machines here are poll-driven with explicit timeout states,
//! so their fallbacks are deterministic in tests:
//!
//! - [`ScrollAnchorController`] preserves the reader's visual position while
//!   older history is injected above the viewport, and suppresses
//!   auto-scroll-to-latest while it does so.
//! - [`RevealClassifier`] decides exactly once per item whether it is
//!   history (shown immediately) or new (queued through a single global
//!   reveal animation slot).

mod reveal;
mod scroll;

pub use reveal::{AnimationState, RevealClassifier, RevealConfig};
pub use scroll::{
    ScrollAnchorController, ScrollConfig, ScrollCorrection, ScrollSnapshot, ViewportMetrics,
};
