//! Device contract and the commit policy layered on top of it.
//!
//! A `Device` exposes the primitives most network drivers offer: a running
//! configuration, a single candidate buffer, compare, discard, and commit.
//! `Committer` builds the workflow's operations out of those primitives and
//! keeps the candidate buffer clean when a step fails.

pub mod file;
pub mod memory;

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;

pub use file::FileDevice;
pub use memory::MemoryDevice;

/// A managed network device with a single candidate buffer.
pub trait Device: Send + Sync {
    fn name(&self) -> &str;

    fn running_config(&self) -> Result<String>;

    /// Load `config` into the candidate buffer, merged with the running
    /// configuration or replacing it.
    fn load_candidate(&self, config: &str, replace: bool) -> Result<()>;

    /// Diff between the running configuration and the candidate buffer.
    /// Empty when nothing is loaded or nothing would change.
    fn compare(&self) -> Result<String>;

    fn discard(&self) -> Result<()>;

    /// Make the candidate buffer the running configuration.
    fn commit(&self) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Committer
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct Committer {
    device: Arc<dyn Device>,
}

impl Committer {
    pub fn new(device: Arc<dyn Device>) -> Self {
        Self { device }
    }

    pub fn device_name(&self) -> &str {
        self.device.name()
    }

    /// Load `config` and report the diff. The candidate stays loaded on
    /// success and is discarded if the comparison fails.
    pub fn stage(&self, config: &str, replace: bool) -> Result<String> {
        self.device.load_candidate(config, replace)?;
        match self.device.compare() {
            Ok(diff) => Ok(diff),
            Err(e) => {
                self.discard_quietly();
                Err(e)
            }
        }
    }

    pub fn discard(&self) -> Result<()> {
        self.device.discard()
    }

    /// Commit whatever is loaded. The candidate is discarded on failure.
    pub fn commit(&self) -> Result<()> {
        match self.device.commit() {
            Ok(()) => Ok(()),
            Err(e) => {
                self.discard_quietly();
                Err(e)
            }
        }
    }

    pub fn snapshot(&self) -> Result<String> {
        self.device.running_config()
    }

    /// Stage and commit in one step. Returns the applied diff.
    pub fn apply_now(&self, config: &str, replace: bool) -> Result<String> {
        let diff = self.stage(config, replace)?;
        if diff.is_empty() {
            self.device.discard()?;
            return Ok(diff);
        }
        self.commit()?;
        Ok(diff)
    }

    /// Restore a previously captured running configuration.
    pub fn restore(&self, snapshot: &str) -> Result<String> {
        debug!(device = %self.device.name(), "restoring configuration snapshot");
        self.apply_now(snapshot, true)
    }

    /// Discard the candidate, logging instead of failing.
    pub fn discard_quietly(&self) {
        if let Err(e) = self.device.discard() {
            warn!(device = %self.device.name(), error = %e, "failed to discard candidate");
        }
    }
}

/// Generate a commit identifier shaped like a job id (`YYYYMMDDhhmmssffffff`),
/// strictly increasing within the process.
pub fn next_commit_id(now: DateTime<Utc>) -> String {
    static LAST_MICROS: AtomicI64 = AtomicI64::new(0);
    let wanted = now.timestamp_micros();
    let prev = LAST_MICROS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(wanted.max(last + 1))
        })
        .unwrap_or_else(|v| v);
    let micros = wanted.max(prev + 1);
    DateTime::from_timestamp_micros(micros)
        .unwrap_or(now)
        .format("%Y%m%d%H%M%S%6f")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use chrono::TimeZone;

    fn committer(running: &str) -> (Arc<MemoryDevice>, Committer) {
        let dev = Arc::new(MemoryDevice::new("r1", running));
        (dev.clone(), Committer::new(dev))
    }

    #[test]
    fn commit_ids_are_job_shaped_and_unique() {
        let now = Utc.with_ymd_and_hms(2018, 7, 26, 8, 35, 40).unwrap();
        let a = next_commit_id(now);
        let b = next_commit_id(now);
        assert_eq!(a.len(), 20);
        assert!(a.chars().all(|c| c.is_ascii_digit()));
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn stage_reports_diff_and_keeps_candidate() {
        let (dev, c) = committer("hostname r1\n");
        let diff = c.stage("ntp server 1.1.1.1", false).unwrap();
        assert!(diff.contains("+ ntp server 1.1.1.1"));
        assert!(dev.candidate().is_some());
        assert_eq!(dev.running(), "hostname r1\n");
    }

    #[test]
    fn apply_now_commits_and_restore_rolls_back() {
        let (dev, c) = committer("hostname r1\n");
        let before = c.snapshot().unwrap();
        c.apply_now("ntp server 1.1.1.1", false).unwrap();
        assert!(dev.running().contains("ntp server 1.1.1.1"));
        c.restore(&before).unwrap();
        assert_eq!(dev.running(), "hostname r1\n");
        assert!(dev.candidate().is_none());
    }

    #[test]
    fn unreachable_device_surfaces_device_error() {
        let (dev, c) = committer("hostname r1\n");
        dev.set_reachable(false);
        let err = c.stage("x", false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeviceCommError);
    }
}
