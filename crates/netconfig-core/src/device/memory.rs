use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::diff::{line_diff, merge_lines};
use crate::error::{NetconfigError, Result};

use super::Device;

#[derive(Debug)]
struct MemoryState {
    running: String,
    candidate: Option<String>,
    reachable: bool,
    commits: u32,
}

/// An in-process device. Reachability can be toggled to simulate outages.
#[derive(Debug)]
pub struct MemoryDevice {
    name: String,
    state: Mutex<MemoryState>,
}

impl MemoryDevice {
    pub fn new(name: impl Into<String>, running: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(MemoryState {
                running: running.into(),
                candidate: None,
                reachable: true,
                commits: 0,
            }),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.lock().reachable = reachable;
    }

    pub fn running(&self) -> String {
        self.lock().running.clone()
    }

    pub fn candidate(&self) -> Option<String> {
        self.lock().candidate.clone()
    }

    pub fn commit_count(&self) -> u32 {
        self.lock().commits
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reachable(&self) -> Result<MutexGuard<'_, MemoryState>> {
        let state = self.lock();
        if !state.reachable {
            return Err(NetconfigError::device(&self.name, "device unreachable"));
        }
        Ok(state)
    }
}

impl Device for MemoryDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn running_config(&self) -> Result<String> {
        Ok(self.reachable()?.running.clone())
    }

    fn load_candidate(&self, config: &str, replace: bool) -> Result<()> {
        let mut state = self.reachable()?;
        let candidate = if replace {
            config.to_string()
        } else {
            merge_lines(&state.running, config)
        };
        state.candidate = Some(candidate);
        Ok(())
    }

    fn compare(&self) -> Result<String> {
        let state = self.reachable()?;
        Ok(state
            .candidate
            .as_deref()
            .map(|c| line_diff(&state.running, c))
            .unwrap_or_default())
    }

    fn discard(&self) -> Result<()> {
        self.reachable()?.candidate = None;
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        let mut state = self.reachable()?;
        let candidate = state
            .candidate
            .take()
            .ok_or_else(|| NetconfigError::device(&self.name, "no candidate configuration loaded"))?;
        state.running = candidate;
        state.commits += 1;
        Ok(())
    }
}
