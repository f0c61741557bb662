//! Five-stage progression state machine for Concord sessions.
//!
//! A session walks both parties through five ordered stages. Each party owns
//! its **own** `StageProgress`; the two records advance independently and
//! are only compared for display or for gate checks.
//!
//! # Rules
//!
//! - Advancement is monotonic: a party's stage never decreases.
//! - No skipping: a party may only enter `stage + 1`.
//! - Gates are evaluated against the acting party's own progress plus the
//!   partner's *recorded* status — never a derived minimum, so a party is
//!   never blocked by its own stale view of the partner.
//! - Regression and skips are rejected as [`Error::InvalidTransition`],
//!   never silently clamped.
//!
//! Everything in this crate is pure: no clocks, no I/O. Callers supply
//! `now_ms` (Unix milliseconds) wherever a timestamp is recorded.

mod error;
mod progress;
mod stage;
mod status;

pub use error::{Error, Result};
pub use progress::{advance, can_advance, complete, effective_stage, mark_gate_pending, StageProgress};
pub use stage::{Stage, StageStatus};
pub use status::SessionStatus;
