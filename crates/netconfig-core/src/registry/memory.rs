use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::error::{NetconfigError, Result};

use super::{CasOutcome, PendingChange, PendingRegistry, PendingState};

/// Process-local registry. Entries do not survive a restart.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    entries: RwLock<HashMap<String, PendingChange>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PendingRegistry for MemoryRegistry {
    fn insert(&self, change: &PendingChange) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(&change.commit_id) {
            return Err(NetconfigError::Registry(format!(
                "commit #{} already exists",
                change.commit_id
            )));
        }
        entries.insert(change.commit_id.clone(), change.clone());
        Ok(())
    }

    fn get(&self, commit_id: &str) -> Result<Option<PendingChange>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(commit_id).cloned())
    }

    fn list(&self) -> Result<Vec<PendingChange>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut all: Vec<_> = entries.values().cloned().collect();
        all.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.commit_id.cmp(&a.commit_id))
        });
        Ok(all)
    }

    fn compare_and_set(
        &self,
        commit_id: &str,
        expected: PendingState,
        next: PendingState,
        now: DateTime<Utc>,
        edit: &dyn Fn(&mut PendingChange),
    ) -> Result<CasOutcome> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = entries.get_mut(commit_id) else {
            return Ok(CasOutcome::Missing);
        };
        if entry.state != expected {
            return Ok(CasOutcome::Conflict(entry.state));
        }
        edit(entry);
        entry.state = next;
        entry.updated_at = now;
        Ok(CasOutcome::Applied(entry.clone()))
    }

    fn remove(&self, commit_id: &str) -> Result<bool> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.remove(commit_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::contract;

    #[test]
    fn insert_rejects_duplicates() {
        contract::insert_rejects_duplicates(&MemoryRegistry::new());
    }

    #[test]
    fn cas_applies_once() {
        contract::cas_applies_once(&MemoryRegistry::new());
    }

    #[test]
    fn cas_edit_is_persisted() {
        contract::cas_edit_is_persisted(&MemoryRegistry::new());
    }

    #[test]
    fn due_is_ordered_and_filtered() {
        contract::due_is_ordered_and_filtered(&MemoryRegistry::new());
    }

    #[test]
    fn purge_only_drops_old_terminal() {
        contract::purge_only_drops_old_terminal(&MemoryRegistry::new());
    }

    #[test]
    fn recovery_fails_stale_transitional() {
        contract::recovery_fails_stale_transitional(&MemoryRegistry::new());
    }

    #[test]
    fn concurrent_cas_has_one_winner() {
        use std::sync::Arc;
        let reg = Arc::new(MemoryRegistry::new());
        reg.insert(&contract::scheduled("1", 5)).unwrap();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let reg = reg.clone();
                std::thread::spawn(move || {
                    let next = if i % 2 == 0 {
                        PendingState::Cancelled
                    } else {
                        PendingState::Committing
                    };
                    matches!(
                        reg.transition("1", PendingState::Scheduled, next, contract::now())
                            .unwrap(),
                        CasOutcome::Applied(_)
                    )
                })
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
