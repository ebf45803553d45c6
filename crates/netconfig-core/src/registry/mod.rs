//! Durable-enough store of pending changes.
//!
//! Every state change goes through [`PendingRegistry::compare_and_set`], so
//! of two racing transitions out of the same state exactly one wins.

pub mod db;
pub mod memory;
pub mod pending;

use chrono::{DateTime, Utc};

use crate::error::Result;

pub use db::RedbRegistry;
pub use memory::MemoryRegistry;
pub use pending::{PendingChange, PendingState};

pub const RECOVERED_REASON: &str = "recovered from restart";

/// Result of a compare-and-set on a pending entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CasOutcome {
    /// The transition happened; carries the updated entry.
    Applied(PendingChange),
    Missing,
    /// The entry was in another state; nothing changed.
    Conflict(PendingState),
}

pub trait PendingRegistry: Send + Sync {
    /// Add a new entry. Fails if the commit id is already present.
    fn insert(&self, change: &PendingChange) -> Result<()>;

    fn get(&self, commit_id: &str) -> Result<Option<PendingChange>>;

    /// All entries, newest first.
    fn list(&self) -> Result<Vec<PendingChange>>;

    /// Atomically move `commit_id` from `expected` to `next`, applying `edit`
    /// to the entry in the same step. `updated_at` is set to `now`.
    fn compare_and_set(
        &self,
        commit_id: &str,
        expected: PendingState,
        next: PendingState,
        now: DateTime<Utc>,
        edit: &dyn Fn(&mut PendingChange),
    ) -> Result<CasOutcome>;

    fn remove(&self, commit_id: &str) -> Result<bool>;

    fn transition(
        &self,
        commit_id: &str,
        expected: PendingState,
        next: PendingState,
        now: DateTime<Utc>,
    ) -> Result<CasOutcome> {
        self.compare_and_set(commit_id, expected, next, now, &|_| {})
    }

    /// Entries whose timer instant is at or before `now`, earliest first.
    fn due(&self, now: DateTime<Utc>) -> Result<Vec<PendingChange>> {
        let mut due: Vec<_> = self.list()?.into_iter().filter(|c| c.is_due(now)).collect();
        due.sort_by_key(|c| c.due_at());
        Ok(due)
    }

    /// Entries that still need a timer or a human decision.
    fn live(&self) -> Result<Vec<PendingChange>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|c| !c.state.is_terminal())
            .collect())
    }

    /// Drop terminal entries last touched before `older_than`.
    fn purge_terminal(&self, older_than: DateTime<Utc>) -> Result<usize> {
        let mut removed = 0;
        for change in self.list()? {
            if change.state.is_terminal()
                && change.updated_at < older_than
                && self.remove(&change.commit_id)?
            {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Mark entries stuck in `Committing` or `Reverting` for longer than
    /// `max_age` as failed. Returns the number recovered.
    fn recover_interrupted(&self, max_age: chrono::Duration, now: DateTime<Utc>) -> Result<u32> {
        let cutoff = now - max_age;
        let mut count = 0u32;
        for change in self.list()? {
            if !change.state.is_transitional() || change.updated_at >= cutoff {
                continue;
            }
            let outcome = self.compare_and_set(
                &change.commit_id,
                change.state,
                PendingState::Failed,
                now,
                &|c: &mut PendingChange| c.last_error = Some(RECOVERED_REASON.to_string()),
            )?;
            if matches!(outcome, CasOutcome::Applied(_)) {
                count += 1;
            }
        }
        Ok(count)
    }
}

// ---------------------------------------------------------------------------
// Shared contract tests, run against every backend.
// ---------------------------------------------------------------------------
