//! Persistent pending-change registry using redb.
//!
//! # Table design
//!
//! A single `PENDING` table keyed by commit id. Commit ids are fixed-width
//! timestamps, so key order is creation order. Values are JSON-encoded
//! [`PendingChange`] records.
//!
//! Each compare-and-set runs inside one write transaction; redb serializes
//! writers, so the read-check-write cannot interleave with another one.

use std::fmt::Display;
use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, TableDefinition};

use crate::error::{NetconfigError, Result};

use super::{CasOutcome, PendingChange, PendingRegistry, PendingState};

/// Key: commit id. Value: JSON-encoded PendingChange.
const PENDING: TableDefinition<&str, &[u8]> = TableDefinition::new("pending");

fn db_err(e: impl Display) -> NetconfigError {
    NetconfigError::Registry(e.to_string())
}

fn decode(bytes: &[u8]) -> Result<PendingChange> {
    serde_json::from_slice(bytes).map_err(db_err)
}

pub struct RedbRegistry {
    db: Database,
}

impl RedbRegistry {
    /// Open or create the database at `path`, creating the table if needed.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path).map_err(db_err)?;
        let wt = db.begin_write().map_err(db_err)?;
        wt.open_table(PENDING).map_err(db_err)?;
        wt.commit().map_err(db_err)?;
        Ok(Self { db })
    }
}

impl PendingRegistry for RedbRegistry {
    fn insert(&self, change: &PendingChange) -> Result<()> {
        let value = serde_json::to_vec(change).map_err(db_err)?;
        let wt = self.db.begin_write().map_err(db_err)?;
        let exists = {
            let mut table = wt.open_table(PENDING).map_err(db_err)?;
            let exists = table.get(change.commit_id.as_str()).map_err(db_err)?.is_some();
            if !exists {
                table
                    .insert(change.commit_id.as_str(), value.as_slice())
                    .map_err(db_err)?;
            }
            exists
        };
        if exists {
            wt.abort().map_err(db_err)?;
            return Err(NetconfigError::Registry(format!(
                "commit #{} already exists",
                change.commit_id
            )));
        }
        wt.commit().map_err(db_err)?;
        Ok(())
    }

    fn get(&self, commit_id: &str) -> Result<Option<PendingChange>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(PENDING).map_err(db_err)?;
        let guard = table.get(commit_id).map_err(db_err)?;
        guard.map(|v| decode(v.value())).transpose()
    }

    fn list(&self) -> Result<Vec<PendingChange>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(PENDING).map_err(db_err)?;

        let mut result = Vec::new();
        for entry in table.iter().map_err(db_err)? {
            let (_, v) = entry.map_err(db_err)?;
            result.push(decode(v.value())?);
        }
        result.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.commit_id.cmp(&a.commit_id))
        });
        Ok(result)
    }

    fn compare_and_set(
        &self,
        commit_id: &str,
        expected: PendingState,
        next: PendingState,
        now: DateTime<Utc>,
        edit: &dyn Fn(&mut PendingChange),
    ) -> Result<CasOutcome> {
        let wt = self.db.begin_write().map_err(db_err)?;
        let outcome = {
            let mut table = wt.open_table(PENDING).map_err(db_err)?;
            let current = match table.get(commit_id).map_err(db_err)? {
                Some(v) => Some(decode(v.value())?),
                None => None,
            };
            match current {
                None => CasOutcome::Missing,
                Some(c) if c.state != expected => CasOutcome::Conflict(c.state),
                Some(mut c) => {
                    edit(&mut c);
                    c.state = next;
                    c.updated_at = now;
                    let value = serde_json::to_vec(&c).map_err(db_err)?;
                    table.insert(commit_id, value.as_slice()).map_err(db_err)?;
                    CasOutcome::Applied(c)
                }
            }
        };
        if matches!(outcome, CasOutcome::Applied(_)) {
            wt.commit().map_err(db_err)?;
        } else {
            wt.abort().map_err(db_err)?;
        }
        Ok(outcome)
    }

    fn remove(&self, commit_id: &str) -> Result<bool> {
        let wt = self.db.begin_write().map_err(db_err)?;
        let removed = {
            let mut table = wt.open_table(PENDING).map_err(db_err)?;
            let removed = table.remove(commit_id).map_err(db_err)?.is_some();
            removed
        };
        wt.commit().map_err(db_err)?;
        Ok(removed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
