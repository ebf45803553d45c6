//! Pending change data model.
//!
//! A `PendingChange` is created when a commit is deferred or armed with a
//! revert. It is keyed by its commit identifier, the only handle later
//! cancel/confirm calls and timers use to find it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// PendingState
// ---------------------------------------------------------------------------

/// Lifecycle state of a pending change.
///
/// ```text
/// Scheduled ──cancel──────────────────────────────▶ Cancelled
///     │
///     └─timer─▶ Committing ─┬─▶ Committed                (no revert armed)
///                           ├─▶ AwaitingConfirmation
///                           └─▶ Failed
/// AwaitingConfirmation ──confirm──▶ Confirmed
///     └─timer─▶ Reverting ─┬─▶ Reverted
///                          └─▶ Failed
/// ```
///
/// `Committing` and `Reverting` are claimed before the device is touched so
/// a racing confirm or cancel sees a mismatched state and backs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingState {
    Scheduled,
    Committing,
    AwaitingConfirmation,
    Reverting,
    Confirmed,
    Cancelled,
    Reverted,
    Committed,
    Failed,
}

impl PendingState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Committing => "committing",
            Self::AwaitingConfirmation => "awaiting_confirmation",
            Self::Reverting => "reverting",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Reverted => "reverted",
            Self::Committed => "committed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Confirmed | Self::Cancelled | Self::Reverted | Self::Committed | Self::Failed
        )
    }

    /// Claimed by a firing timer while the device is being changed.
    pub fn is_transitional(self) -> bool {
        matches!(self, Self::Committing | Self::Reverting)
    }
}

impl fmt::Display for PendingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PendingChange
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChange {
    pub commit_id: String,
    pub device: String,
    pub state: PendingState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revert_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub replace: bool,
    /// Rendered configuration applied when a deferred commit fires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staged_config: Option<String>,
    /// Running configuration captured just before the commit; a revert
    /// restores it with a full replace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_config: Option<String>,
    #[serde(default)]
    pub diff: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PendingChange {
    /// A commit deferred until `scheduled_at`.
    pub fn scheduled(
        commit_id: impl Into<String>,
        device: impl Into<String>,
        scheduled_at: DateTime<Utc>,
        revert_at: Option<DateTime<Utc>>,
        staged_config: String,
        replace: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            commit_id: commit_id.into(),
            device: device.into(),
            state: PendingState::Scheduled,
            scheduled_at: Some(scheduled_at),
            revert_at,
            replace,
            staged_config: Some(staged_config),
            rollback_config: None,
            diff: String::new(),
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// A commit already applied, waiting for confirmation before `revert_at`.
    pub fn awaiting_confirmation(
        commit_id: impl Into<String>,
        device: impl Into<String>,
        revert_at: DateTime<Utc>,
        rollback_config: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            commit_id: commit_id.into(),
            device: device.into(),
            state: PendingState::AwaitingConfirmation,
            scheduled_at: None,
            revert_at: Some(revert_at),
            replace: true,
            staged_config: None,
            rollback_config: Some(rollback_config),
            diff: String::new(),
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_diff(mut self, diff: impl Into<String>) -> Self {
        self.diff = diff.into();
        self
    }

    /// The instant at which a timer acts on this entry, if any.
    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        match self.state {
            PendingState::Scheduled => self.scheduled_at,
            PendingState::AwaitingConfirmation => self.revert_at,
            _ => None,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due_at().is_some_and(|at| at <= now)
    }
}
