//! Per-party stage progress and advancement rules.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::stage::{Stage, StageStatus};

/// One party's progress through the five stages.
///
/// Values are immutable: [`advance`], [`complete`] and [`mark_gate_pending`]
/// return new records rather than mutating in place, so a caller can keep
/// the previous value around for rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageProgress {
    /// The stage this party is currently in.
    pub stage: Stage,
    /// The party's status within that stage.
    pub status: StageStatus,
    /// When the party entered the stage (Unix ms).
    pub started_at_ms: u64,
    /// When the party completed the stage's sub-action, if it has.
    pub completed_at_ms: Option<u64>,
}

impl StageProgress {
    /// Progress for a party that just entered the session.
    #[must_use]
    pub const fn opening(now_ms: u64) -> Self {
        Self {
            stage: Stage::Opening,
            status: StageStatus::InProgress,
            started_at_ms: now_ms,
            completed_at_ms: None,
        }
    }
}

/// Whether the acting party may advance to `target`.
///
/// True only if `target` is exactly the next stage and the current stage's
/// gate holds: the acting party has completed its sub-action, and for
/// jointly gated stages the partner's recorded status is also `Completed`.
#[must_use]
pub fn can_advance(mine: &StageProgress, partner_status: StageStatus, target: Stage) -> bool {
    mine.stage.next() == Some(target) && gate_satisfied(mine, partner_status)
}

fn gate_satisfied(mine: &StageProgress, partner_status: StageStatus) -> bool {
    if mine.status != StageStatus::Completed {
        return false;
    }
    if mine.stage.jointly_gated() {
        partner_status == StageStatus::Completed
    } else {
        true
    }
}

/// Advance the acting party to `target`.
///
/// Regression and skips are [`Error::InvalidTransition`]; an unsatisfied
/// gate is [`Error::GateNotSatisfied`]. On success the returned record
/// enters `target` as `InProgress` with `started_at_ms = now_ms`.
pub fn advance(
    mine: &StageProgress,
    partner_status: StageStatus,
    target: Stage,
    now_ms: u64,
) -> Result<StageProgress> {
    if mine.stage.next() != Some(target) {
        return Err(Error::InvalidTransition {
            from: mine.stage,
            to: target,
        });
    }
    if !gate_satisfied(mine, partner_status) {
        return Err(Error::GateNotSatisfied { stage: mine.stage });
    }
    Ok(StageProgress {
        stage: target,
        status: StageStatus::InProgress,
        started_at_ms: now_ms,
        completed_at_ms: None,
    })
}

/// Mark the acting party's current stage sub-action as completed.
///
/// Idempotent: completing an already-completed stage keeps the original
/// completion timestamp.
#[must_use]
pub fn complete(mine: &StageProgress, now_ms: u64) -> StageProgress {
    if mine.status == StageStatus::Completed {
        return *mine;
    }
    StageProgress {
        status: StageStatus::Completed,
        completed_at_ms: Some(now_ms),
        ..*mine
    }
}

/// Mark the acting party as waiting on the partner's sub-action.
///
/// Only meaningful from `InProgress`; other statuses are returned unchanged.
#[must_use]
pub fn mark_gate_pending(mine: &StageProgress) -> StageProgress {
    if mine.status == StageStatus::InProgress {
        StageProgress {
            status: StageStatus::GatePending,
            ..*mine
        }
    } else {
        *mine
    }
}

/// The stage to show for the session as a whole. Display only — gating is
/// never evaluated against this.
#[must_use]
pub fn effective_stage(mine: &StageProgress, partner: &StageProgress) -> Stage {
    mine.stage.min(partner.stage)
}
