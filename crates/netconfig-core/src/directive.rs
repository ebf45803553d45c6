//! Commit directives: when a change takes effect and whether it reverts.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{NetconfigError, Result};
use crate::options::ResolvedOptions;
use crate::timespec::TimeDirective;

// ---------------------------------------------------------------------------
// ClockZone
// ---------------------------------------------------------------------------

/// Timezone in which clock-time directives (`1am`, `13:20`) are read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockZone {
    #[default]
    Utc,
    Local,
}

impl ClockZone {
    pub fn resolve(self, directive: &TimeDirective, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        match self {
            ClockZone::Utc => directive.resolve(&now),
            ClockZone::Local => directive
                .resolve(&now.with_timezone(&Local))
                .map(|t| t.with_timezone(&Utc)),
        }
    }
}

// ---------------------------------------------------------------------------
// CommitDirective
// ---------------------------------------------------------------------------

/// The four scheduling shapes a change can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommitDirective {
    /// Commit now, no revert.
    Immediate,
    /// Commit at `commit_at`, no revert.
    DeferredCommit { commit_at: DateTime<Utc> },
    /// Commit now, revert at `revert_at` unless confirmed.
    CommitThenRevert { revert_at: DateTime<Utc> },
    /// Commit at `commit_at`, revert at `revert_at` unless confirmed.
    DeferredCommitThenRevert {
        commit_at: DateTime<Utc>,
        revert_at: DateTime<Utc>,
    },
}

impl CommitDirective {
    /// Build a directive from resolved instants.
    ///
    /// A commit instant at or before `now` means "commit now". A revert
    /// instant must be strictly later than the effective commit instant.
    pub fn new(
        commit_at: Option<DateTime<Utc>>,
        revert_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let commit_at = commit_at.filter(|at| *at > now);
        let effective = commit_at.unwrap_or(now);
        if let Some(revert_at) = revert_at {
            if revert_at <= effective {
                return Err(NetconfigError::InvalidDirectiveOrder {
                    commit_at: effective.to_rfc3339(),
                    revert_at: revert_at.to_rfc3339(),
                });
            }
        }
        Ok(match (commit_at, revert_at) {
            (None, None) => Self::Immediate,
            (Some(commit_at), None) => Self::DeferredCommit { commit_at },
            (None, Some(revert_at)) => Self::CommitThenRevert { revert_at },
            (Some(commit_at), Some(revert_at)) => Self::DeferredCommitThenRevert {
                commit_at,
                revert_at,
            },
        })
    }

    /// Build a directive from `commit_in`/`commit_at`/`revert_in`/`revert_at`,
    /// anchoring relative and clock directives at `now`.
    pub fn from_options(opts: &ResolvedOptions, now: DateTime<Utc>, zone: ClockZone) -> Result<Self> {
        let commit = axis(
            ("commit_in", opts.commit_in.as_deref()),
            ("commit_at", opts.commit_at.as_deref()),
            now,
            zone,
        )?;
        let revert = axis(
            ("revert_in", opts.revert_in.as_deref()),
            ("revert_at", opts.revert_at.as_deref()),
            now,
            zone,
        )?;
        Self::new(commit, revert, now)
    }

    pub fn commit_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::DeferredCommit { commit_at } | Self::DeferredCommitThenRevert { commit_at, .. } => {
                Some(*commit_at)
            }
            _ => None,
        }
    }

    pub fn revert_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::CommitThenRevert { revert_at } | Self::DeferredCommitThenRevert { revert_at, .. } => {
                Some(*revert_at)
            }
            _ => None,
        }
    }

    pub fn is_immediate(&self) -> bool {
        matches!(self, Self::Immediate)
    }

    pub fn is_revertible(&self) -> bool {
        self.revert_at().is_some()
    }
}

fn axis(
    relative: (&str, Option<&str>),
    absolute: (&str, Option<&str>),
    now: DateTime<Utc>,
    zone: ClockZone,
) -> Result<Option<DateTime<Utc>>> {
    match (relative.1, absolute.1) {
        (Some(_), Some(_)) => Err(NetconfigError::ConflictingDirective {
            first: relative.0.to_string(),
            second: absolute.0.to_string(),
        }),
        (Some(text), None) => zone.resolve(&TimeDirective::parse_relative(text)?, now).map(Some),
        (None, Some(text)) => zone.resolve(&TimeDirective::parse_absolute(text)?, now).map(Some),
        (None, None) => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
