//! Stage and per-stage status types.

use serde::{Deserialize, Serialize};

/// One of the five ordered stages of a guided session.
///
/// The discriminants are the canonical stage indices (0..=4) and define the
/// total order used for advancement checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Invitation exchange and consent to begin.
    Opening = 0,
    /// Each party tells their account without interruption.
    Witness = 1,
    /// Each party restates the other's account.
    PerspectiveStretch = 2,
    /// Surfacing the needs behind each position.
    NeedMapping = 3,
    /// Drafting and signing the shared compact.
    Compact = 4,
}

impl Stage {
    /// All stages in order.
    pub const ALL: [Stage; 5] = [
        Stage::Opening,
        Stage::Witness,
        Stage::PerspectiveStretch,
        Stage::NeedMapping,
        Stage::Compact,
    ];

    /// The stage index (0..=4).
    #[must_use]
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Look up a stage by index.
    #[must_use]
    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Stage::Opening),
            1 => Some(Stage::Witness),
            2 => Some(Stage::PerspectiveStretch),
            3 => Some(Stage::NeedMapping),
            4 => Some(Stage::Compact),
            _ => None,
        }
    }

    /// The next stage, or `None` at `Compact`.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }

    /// Whether leaving this stage requires BOTH parties to have completed
    /// the stage's sub-action.
    ///
    /// `Opening` gates on both parties confirming the invitation and
    /// `Compact` gates on both signatures. The middle stages gate on the
    /// acting party alone.
    #[must_use]
    pub const fn jointly_gated(self) -> bool {
        matches!(self, Stage::Opening | Stage::Compact)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Opening => write!(f, "Opening"),
            Self::Witness => write!(f, "Witness"),
            Self::PerspectiveStretch => write!(f, "PerspectiveStretch"),
            Self::NeedMapping => write!(f, "NeedMapping"),
            Self::Compact => write!(f, "Compact"),
        }
    }
}

/// A party's status within its current stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// The party has not yet entered the stage.
    NotStarted,
    /// The party is working through the stage.
    InProgress,
    /// The party finished its part and is waiting on the partner's.
    GatePending,
    /// The stage's sub-action is done for this party.
    Completed,
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotStarted => write!(f, "NotStarted"),
            Self::InProgress => write!(f, "InProgress"),
            Self::GatePending => write!(f, "GatePending"),
            Self::Completed => write!(f, "Completed"),
        }
    }
}
