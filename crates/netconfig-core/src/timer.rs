//! One-shot timers keyed by commit id.
//!
//! Each armed timer is a tokio task that sleeps until its instant and then
//! runs the callback on the blocking pool. Disarming aborts the task. A
//! table built without a runtime arms nothing; due work is then picked up
//! by polling (`Workflow::fire_due`).

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

type Armed = Arc<Mutex<HashMap<String, (u64, AbortHandle)>>>;

pub struct TimerTable {
    runtime: Option<Handle>,
    armed: Armed,
    generation: AtomicU64,
}

impl TimerTable {
    pub fn disabled() -> Self {
        Self {
            runtime: None,
            armed: Armed::default(),
            generation: AtomicU64::new(0),
        }
    }

    pub fn with_runtime(handle: Handle) -> Self {
        Self {
            runtime: Some(handle),
            armed: Armed::default(),
            generation: AtomicU64::new(0),
        }
    }

    /// Use the ambient runtime if called from inside one.
    pub fn from_current() -> Self {
        match Handle::try_current() {
            Ok(handle) => Self::with_runtime(handle),
            Err(_) => Self::disabled(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.runtime.is_some()
    }

    /// Arm `task` to run at `at`, replacing any timer already armed for `id`.
    /// Returns false when the table has no runtime.
    pub fn arm<F>(&self, id: &str, at: DateTime<Utc>, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(runtime) = &self.runtime else {
            return false;
        };
        let delay = (at - Utc::now()).to_std().unwrap_or_default();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let armed = self.armed.clone();
        let key = id.to_string();

        // Hold the lock across spawn so a zero-delay timer cannot look up
        // its own entry before it is inserted.
        let mut table = self.armed.lock().unwrap_or_else(PoisonError::into_inner);
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut table = armed.lock().unwrap_or_else(PoisonError::into_inner);
                if table.get(&key).is_some_and(|(g, _)| *g == generation) {
                    table.remove(&key);
                }
            }
            if let Err(e) = tokio::task::spawn_blocking(task).await {
                warn!(commit_id = %key, error = %e, "timer callback panicked");
            }
        });
        if let Some((_, previous)) = table.insert(id.to_string(), (generation, handle.abort_handle())) {
            previous.abort();
        }
        debug!(commit_id = %id, at = %at, "timer armed");
        true
    }

    /// Abort the timer for `id`. Returns whether one was armed.
    pub fn disarm(&self, id: &str) -> bool {
        let removed = self
            .armed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        match removed {
            Some((_, handle)) => {
                handle.abort();
                debug!(commit_id = %id, "timer disarmed");
                true
            }
            None => false,
        }
    }

    pub fn armed_count(&self) -> usize {
        self.armed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_armed(&self, id: &str) -> bool {
        self.armed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }
}

impl Drop for TimerTable {
    fn drop(&mut self) {
        let table = self.armed.lock().unwrap_or_else(PoisonError::into_inner);
        for (_, handle) in table.values() {
            handle.abort();
        }
    }
}
