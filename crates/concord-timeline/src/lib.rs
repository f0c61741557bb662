//! Chat timeline model and ordered page merge.
//!
//! A session's timeline is assembled from raw pages: a live head page that
//! receives new items and zero or more history pages fetched backwards. The
//! same item can arrive through both paths, and pages can arrive in any
//! order, so the merge in [`merge_pages`] is the single place where the
//! timeline's ordering guarantees are enforced:
//!
//! - **Total order** by `(timestamp desc, id desc)` — the id is the
//!   deterministic tie-breaker, so items sharing a timestamp never reorder
//!   across merges.
//! - **Deduplication** by id — the later-merged instance wins.
//! - **Empty-state injection** — the synthetic placeholder appears at the
//!   oldest position only while no real message exists.
//!
//! The merge is a pure function: no timers, no I/O, no clock.

mod item;
mod merge;

pub use item::{
    ChatItem, ChatItemId, IndicatorKind, MessageStatus, PageCursor, Role, TimelinePage,
    EMPTY_STATE_ID,
};
pub use merge::merge_pages;
