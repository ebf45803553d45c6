//! The commit/confirm/revert/cancel workflow.
//!
//! `Workflow` owns the device table, the pending registry, and the timer
//! table. Every operation that touches a device holds that device's lock for
//! its whole duration; state changes on registry entries go through
//! compare-and-set so a firing timer and an operator call cannot both win.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

use crate::device::{next_commit_id, Committer, Device};
use crate::directive::{ClockZone, CommitDirective};
use crate::error::{NetconfigError, Result};
use crate::options::{self, OptionLayer, ResolvedOptions};
use crate::registry::{CasOutcome, PendingChange, PendingRegistry, PendingState};
use crate::render::{RenderRequest, TemplateRenderer};
use crate::timer::TimerTable;
use crate::types::{ChangeRequest, OutcomeRecord};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S %Z";

// ---------------------------------------------------------------------------
// FireReport
// ---------------------------------------------------------------------------

/// What a timer did when it fired for one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FireOutcome {
    /// Deferred commit applied; no revert armed.
    Committed,
    /// Deferred commit applied; now awaiting confirmation.
    AwaitingConfirmation { revert_at: DateTime<Utc> },
    Reverted,
    /// Dry run: the deferred commit is due and would be applied.
    WouldCommit { revert_at: Option<DateTime<Utc>> },
    /// Dry run: the revert is due and would be applied.
    WouldRevert,
    Failed { reason: String },
    /// Nothing to do: missing, not yet due, or already handled.
    Skipped { state: Option<PendingState> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FireReport {
    pub commit_id: String,
    pub device: Option<String>,
    #[serde(flatten)]
    pub outcome: FireOutcome,
}

impl FireReport {
    fn new(entry: &PendingChange, outcome: FireOutcome) -> Self {
        Self {
            commit_id: entry.commit_id.clone(),
            device: Some(entry.device.clone()),
            outcome,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, FireOutcome::Skipped { .. })
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

pub struct WorkflowBuilder {
    devices: Vec<Arc<dyn Device>>,
    registry: Arc<dyn PendingRegistry>,
    renderer: Arc<dyn TemplateRenderer>,
    process: OptionLayer,
    zone: ClockZone,
    timers: TimerTable,
}

impl WorkflowBuilder {
    pub fn device(mut self, device: Arc<dyn Device>) -> Self {
        self.devices.push(device);
        self
    }

    /// Process-wide option tier, between per-call values and compiled defaults.
    pub fn process_options(mut self, layer: OptionLayer) -> Self {
        self.process = layer;
        self
    }

    pub fn clock_zone(mut self, zone: ClockZone) -> Self {
        self.zone = zone;
        self
    }

    pub fn timers(mut self, timers: TimerTable) -> Self {
        self.timers = timers;
        self
    }

    pub fn build(self) -> Workflow {
        let devices = self
            .devices
            .into_iter()
            .map(|d| {
                let name = d.name().to_string();
                let slot = DeviceSlot {
                    committer: Committer::new(d),
                    lock: Mutex::new(()),
                };
                (name, slot)
            })
            .collect();
        Workflow {
            inner: Arc::new(Inner {
                devices,
                registry: self.registry,
                renderer: self.renderer,
                process: self.process,
                zone: self.zone,
                timers: self.timers,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

struct DeviceSlot {
    committer: Committer,
    lock: Mutex<()>,
}

impl DeviceSlot {
    fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Inner {
    devices: HashMap<String, DeviceSlot>,
    registry: Arc<dyn PendingRegistry>,
    renderer: Arc<dyn TemplateRenderer>,
    process: OptionLayer,
    zone: ClockZone,
    timers: TimerTable,
}

#[derive(Clone)]
pub struct Workflow {
    inner: Arc<Inner>,
}

impl Workflow {
    pub fn builder(
        registry: Arc<dyn PendingRegistry>,
        renderer: Arc<dyn TemplateRenderer>,
    ) -> WorkflowBuilder {
        WorkflowBuilder {
            devices: Vec::new(),
            registry,
            renderer,
            process: OptionLayer::default(),
            zone: ClockZone::default(),
            timers: TimerTable::disabled(),
        }
    }

    pub fn registry(&self) -> &dyn PendingRegistry {
        self.inner.registry.as_ref()
    }

    pub fn resolve_options(&self, call: &OptionLayer) -> ResolvedOptions {
        options::resolve(call, &self.inner.process, &OptionLayer::compiled())
    }

    /// Whether the process tier asks for a dry run.
    pub fn dry_run(&self) -> bool {
        self.resolve_options(&OptionLayer::default()).test
    }

    fn slot(&self, device: &str) -> Result<&DeviceSlot> {
        self.inner
            .devices
            .get(device)
            .ok_or_else(|| NetconfigError::UnknownDevice(device.to_string()))
    }

    // -----------------------------------------------------------------------
    // apply
    // -----------------------------------------------------------------------

    pub fn apply(&self, device: &str, req: &ChangeRequest) -> Result<OutcomeRecord> {
        self.apply_at(device, req, Utc::now())
    }

    /// Apply `req` to `device`, anchoring time directives at `now`.
    ///
    /// Directive, template, unknown-device, and registry errors are returned
    /// as `Err` before the device is touched. Device errors come back as a
    /// failed outcome.
    pub fn apply_at(
        &self,
        device: &str,
        req: &ChangeRequest,
        now: DateTime<Utc>,
    ) -> Result<OutcomeRecord> {
        let opts = self.resolve_options(&req.options);
        let directive = CommitDirective::from_options(&opts, now, self.inner.zone)?;
        let slot = self.slot(device)?;
        let rendered = self
            .inner
            .renderer
            .render(&RenderRequest::from_change(req, opts.skip_verify))?;
        debug!(device, template = %req.template_ref, ?directive, "rendered change");

        let debug_text = opts.debug.then(|| rendered.clone());
        let _guard = slot.lock();
        let outcome = match self.apply_locked(slot, &rendered, &opts, directive, now) {
            Ok(outcome) => outcome,
            Err(e @ NetconfigError::DeviceComm { .. }) => {
                warn!(device, error = %e, "apply failed");
                OutcomeRecord::failed(&e)
            }
            Err(e) => return Err(e),
        };
        Ok(outcome.with_rendered(debug_text))
    }

    fn apply_locked(
        &self,
        slot: &DeviceSlot,
        rendered: &str,
        opts: &ResolvedOptions,
        directive: CommitDirective,
        now: DateTime<Utc>,
    ) -> Result<OutcomeRecord> {
        let committer = &slot.committer;
        let device = committer.device_name();
        let diff = committer.stage(rendered, opts.replace)?;

        if diff.is_empty() {
            committer.discard()?;
            debug!(device, "already configured");
            return Ok(OutcomeRecord::already_applied());
        }
        if opts.test {
            committer.discard()?;
            debug!(device, "dry run, candidate discarded");
            return Ok(OutcomeRecord::dry_run(diff));
        }
        if !opts.commit {
            info!(device, "configuration staged without commit");
            return Ok(OutcomeRecord::staged(diff));
        }

        match directive {
            CommitDirective::Immediate => {
                committer.commit()?;
                info!(device, "configuration committed");
                Ok(OutcomeRecord::committed(diff))
            }
            CommitDirective::CommitThenRevert { revert_at } => {
                let commit_id = next_commit_id(now);
                let registered = committer.snapshot().and_then(|snapshot| {
                    let entry = PendingChange::awaiting_confirmation(
                        &commit_id, device, revert_at, snapshot, now,
                    )
                    .with_diff(&diff);
                    self.inner.registry.insert(&entry)
                });
                if let Err(e) = registered {
                    committer.discard_quietly();
                    return Err(e);
                }
                if let Err(e) = committer.commit() {
                    self.inner.registry.remove(&commit_id)?;
                    return Err(e);
                }
                self.arm(&commit_id, revert_at);
                info!(commit_id = %commit_id, device, revert_at = %revert_at, "committed, awaiting confirmation");

                let mut outcome =
                    OutcomeRecord::pending(commit_id.clone(), diff, revert_message(&commit_id, revert_at));
                outcome.revert_at = Some(revert_at);
                Ok(outcome)
            }
            CommitDirective::DeferredCommit { commit_at }
            | CommitDirective::DeferredCommitThenRevert { commit_at, .. } => {
                let revert_at = directive.revert_at();
                committer.discard()?;
                let commit_id = next_commit_id(now);
                let entry = PendingChange::scheduled(
                    &commit_id,
                    device,
                    commit_at,
                    revert_at,
                    rendered.to_string(),
                    opts.replace,
                    now,
                )
                .with_diff(&diff);
                self.inner.registry.insert(&entry)?;
                self.arm(&commit_id, commit_at);
                info!(commit_id = %commit_id, device, commit_at = %commit_at, "commit scheduled");

                let mut outcome = OutcomeRecord::pending(
                    commit_id.clone(),
                    diff,
                    scheduled_message(&commit_id, commit_at, revert_at),
                );
                outcome.scheduled_at = Some(commit_at);
                outcome.revert_at = revert_at;
                Ok(outcome)
            }
        }
    }

    // -----------------------------------------------------------------------
    // cancel / confirm
    // -----------------------------------------------------------------------

    pub fn cancel(&self, commit_id: &str, dry_run: bool) -> Result<OutcomeRecord> {
        self.cancel_at(commit_id, dry_run, Utc::now())
    }

    /// Cancel a scheduled commit that has not taken effect yet.
    pub fn cancel_at(
        &self,
        commit_id: &str,
        dry_run: bool,
        now: DateTime<Utc>,
    ) -> Result<OutcomeRecord> {
        if dry_run {
            return Ok(OutcomeRecord::intent(format!(
                "It would cancel commit #{commit_id}"
            )));
        }
        let Some(entry) = self.inner.registry.get(commit_id)? else {
            return Ok(unknown_commit(commit_id));
        };
        if entry.state != PendingState::Scheduled {
            return Ok(cancel_rejected(&entry));
        }

        let slot = self.inner.devices.get(&entry.device);
        let _guard = slot.map(DeviceSlot::lock);
        match self.inner.registry.transition(
            commit_id,
            PendingState::Scheduled,
            PendingState::Cancelled,
            now,
        )? {
            CasOutcome::Applied(_) => {}
            CasOutcome::Missing => return Ok(unknown_commit(commit_id)),
            CasOutcome::Conflict(state) => {
                return Ok(cancel_rejected(&PendingChange { state, ..entry }));
            }
        }
        // The candidate was discarded when the commit was scheduled, so the
        // buffer may now hold someone else's staged change.
        self.inner.timers.disarm(commit_id);
        info!(commit_id, device = %entry.device, "commit cancelled");
        Ok(OutcomeRecord::ok(format!("Commit #{commit_id} cancelled.")))
    }

    pub fn confirm(&self, commit_id: &str, dry_run: bool) -> Result<OutcomeRecord> {
        self.confirm_at(commit_id, dry_run, Utc::now())
    }

    /// Confirm an applied change so its revert never fires.
    pub fn confirm_at(
        &self,
        commit_id: &str,
        dry_run: bool,
        now: DateTime<Utc>,
    ) -> Result<OutcomeRecord> {
        if dry_run {
            return Ok(OutcomeRecord::intent(format!(
                "It would confirm commit #{commit_id}"
            )));
        }
        match self.inner.registry.transition(
            commit_id,
            PendingState::AwaitingConfirmation,
            PendingState::Confirmed,
            now,
        )? {
            CasOutcome::Applied(entry) => {
                self.inner.timers.disarm(commit_id);
                info!(commit_id, device = %entry.device, "commit confirmed");
                Ok(OutcomeRecord::ok(format!("Commit #{commit_id} confirmed.")))
            }
            CasOutcome::Missing | CasOutcome::Conflict(_) => Ok(unknown_commit(commit_id)),
        }
    }

    // -----------------------------------------------------------------------
    // timers
    // -----------------------------------------------------------------------

    /// Fire every entry due at `now`, earliest first.
    pub fn fire_due(&self, now: DateTime<Utc>) -> Result<Vec<FireReport>> {
        let due = self.inner.registry.due(now)?;
        let mut reports = Vec::with_capacity(due.len());
        for entry in due {
            reports.push(self.fire(&entry.commit_id, now)?);
        }
        Ok(reports)
    }

    /// Fire one entry if it is due at `now`. Safe to call repeatedly: an
    /// entry that has already moved on is reported as skipped. In a dry run
    /// the entry is reported and left untouched.
    pub fn fire(&self, commit_id: &str, now: DateTime<Utc>) -> Result<FireReport> {
        let Some(entry) = self.inner.registry.get(commit_id)? else {
            return Ok(FireReport {
                commit_id: commit_id.to_string(),
                device: None,
                outcome: FireOutcome::Skipped { state: None },
            });
        };
        if !entry.is_due(now) {
            return Ok(FireReport::new(
                &entry,
                FireOutcome::Skipped {
                    state: Some(entry.state),
                },
            ));
        }
        if self.dry_run() {
            let outcome = match entry.state {
                PendingState::Scheduled => FireOutcome::WouldCommit {
                    revert_at: entry.revert_at,
                },
                PendingState::AwaitingConfirmation => FireOutcome::WouldRevert,
                state => FireOutcome::Skipped { state: Some(state) },
            };
            debug!(commit_id, ?outcome, "dry run, nothing fired");
            return Ok(FireReport::new(&entry, outcome));
        }
        match entry.state {
            PendingState::Scheduled => self.fire_commit(entry, now),
            PendingState::AwaitingConfirmation => self.fire_revert(entry, now),
            state => Ok(FireReport::new(
                &entry,
                FireOutcome::Skipped { state: Some(state) },
            )),
        }
    }

    fn fire_commit(&self, entry: PendingChange, now: DateTime<Utc>) -> Result<FireReport> {
        let id = entry.commit_id.as_str();
        let Some(slot) = self.inner.devices.get(&entry.device) else {
            let reason = NetconfigError::UnknownDevice(entry.device.clone()).to_string();
            return self.fail_from(&entry, PendingState::Scheduled, reason, now);
        };
        let _guard = slot.lock();
        let claimed = match self.inner.registry.transition(
            id,
            PendingState::Scheduled,
            PendingState::Committing,
            now,
        )? {
            CasOutcome::Applied(claimed) => claimed,
            CasOutcome::Missing => return Ok(skipped(&entry, None)),
            CasOutcome::Conflict(state) => return Ok(skipped(&entry, Some(state))),
        };
        self.inner.timers.disarm(id);

        let staged = claimed.staged_config.clone().unwrap_or_default();
        let applied = claimed
            .revert_at
            .map(|_| slot.committer.snapshot())
            .transpose()
            .and_then(|snapshot| {
                let diff = slot.committer.apply_now(&staged, claimed.replace)?;
                Ok((snapshot, diff))
            });
        let (snapshot, diff) = match applied {
            Ok(done) => done,
            Err(e) => {
                error!(commit_id = %id, device = %entry.device, error = %e, "scheduled commit failed");
                return self.fail_from(&claimed, PendingState::Committing, e.to_string(), now);
            }
        };

        match claimed.revert_at {
            Some(revert_at) => {
                self.inner.registry.compare_and_set(
                    id,
                    PendingState::Committing,
                    PendingState::AwaitingConfirmation,
                    now,
                    &|c: &mut PendingChange| {
                        c.rollback_config = snapshot.clone();
                        c.diff = diff.clone();
                    },
                )?;
                self.arm(id, revert_at);
                info!(commit_id = %id, device = %entry.device, revert_at = %revert_at, "scheduled commit applied, awaiting confirmation");
                Ok(FireReport::new(
                    &entry,
                    FireOutcome::AwaitingConfirmation { revert_at },
                ))
            }
            None => {
                self.inner.registry.compare_and_set(
                    id,
                    PendingState::Committing,
                    PendingState::Committed,
                    now,
                    &|c: &mut PendingChange| c.diff = diff.clone(),
                )?;
                info!(commit_id = %id, device = %entry.device, "scheduled commit applied");
                Ok(FireReport::new(&entry, FireOutcome::Committed))
            }
        }
    }

    fn fire_revert(&self, entry: PendingChange, now: DateTime<Utc>) -> Result<FireReport> {
        let id = entry.commit_id.as_str();
        let Some(slot) = self.inner.devices.get(&entry.device) else {
            let reason = NetconfigError::UnknownDevice(entry.device.clone()).to_string();
            error!(commit_id = %id, device = %entry.device, "revert due for unconfigured device");
            return self.fail_from(&entry, PendingState::AwaitingConfirmation, reason, now);
        };
        let _guard = slot.lock();
        let claimed = match self.inner.registry.transition(
            id,
            PendingState::AwaitingConfirmation,
            PendingState::Reverting,
            now,
        )? {
            CasOutcome::Applied(claimed) => claimed,
            CasOutcome::Missing => return Ok(skipped(&entry, None)),
            CasOutcome::Conflict(state) => return Ok(skipped(&entry, Some(state))),
        };
        self.inner.timers.disarm(id);

        let Some(rollback) = claimed.rollback_config.as_deref() else {
            error!(commit_id = %id, device = %entry.device, "no rollback snapshot recorded");
            return self.fail_from(
                &claimed,
                PendingState::Reverting,
                "no rollback snapshot recorded".to_string(),
                now,
            );
        };
        match slot.committer.restore(rollback) {
            Ok(_) => {
                self.inner.registry.transition(
                    id,
                    PendingState::Reverting,
                    PendingState::Reverted,
                    now,
                )?;
                info!(commit_id = %id, device = %entry.device, "unconfirmed commit reverted");
                Ok(FireReport::new(&entry, FireOutcome::Reverted))
            }
            Err(e) => {
                error!(
                    commit_id = %id,
                    device = %entry.device,
                    error = %e,
                    "revert failed; unconfirmed change is still running"
                );
                self.fail_from(&claimed, PendingState::Reverting, e.to_string(), now)
            }
        }
    }

    fn fail_from(
        &self,
        entry: &PendingChange,
        from: PendingState,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<FireReport> {
        let recorded = reason.clone();
        match self.inner.registry.compare_and_set(
            &entry.commit_id,
            from,
            PendingState::Failed,
            now,
            &|c: &mut PendingChange| c.last_error = Some(recorded.clone()),
        )? {
            CasOutcome::Applied(_) => {
                self.inner.timers.disarm(&entry.commit_id);
                Ok(FireReport::new(entry, FireOutcome::Failed { reason }))
            }
            CasOutcome::Missing => Ok(skipped(entry, None)),
            CasOutcome::Conflict(state) => Ok(skipped(entry, Some(state))),
        }
    }

    /// Arm a timer for every live entry. Used after a restart. Returns the
    /// number of timers armed.
    pub fn rearm(&self) -> Result<usize> {
        if !self.inner.timers.is_enabled() {
            return Ok(0);
        }
        let mut armed = 0;
        for entry in self.inner.registry.live()? {
            if let Some(at) = entry.due_at() {
                self.arm(&entry.commit_id, at);
                armed += 1;
            }
        }
        Ok(armed)
    }

    pub fn armed_timers(&self) -> usize {
        self.inner.timers.armed_count()
    }

    fn arm(&self, commit_id: &str, at: DateTime<Utc>) {
        let weak = Arc::downgrade(&self.inner);
        let id = commit_id.to_string();
        self.inner.timers.arm(commit_id, at, move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let workflow = Workflow { inner };
            match workflow.fire(&id, Utc::now().max(at)) {
                Ok(report) if report.is_skipped() => debug!(commit_id = %id, "timer fired, nothing to do"),
                Ok(report) => debug!(commit_id = %id, outcome = ?report.outcome, "timer fired"),
                Err(e) => error!(commit_id = %id, error = %e, "timer failed"),
            }
        });
    }

    // -----------------------------------------------------------------------
    // registry maintenance
    // -----------------------------------------------------------------------

    /// Fail entries left in a transitional state by a crashed process.
    pub fn recover(&self, max_age: chrono::Duration, now: DateTime<Utc>) -> Result<u32> {
        let recovered = self.inner.registry.recover_interrupted(max_age, now)?;
        if recovered > 0 {
            warn!(recovered, "marked interrupted pending changes as failed");
        }
        Ok(recovered)
    }

    pub fn purge(&self, older_than: DateTime<Utc>) -> Result<usize> {
        self.inner.registry.purge_terminal(older_than)
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

fn scheduled_message(
    commit_id: &str,
    commit_at: DateTime<Utc>,
    revert_at: Option<DateTime<Utc>>,
) -> String {
    let mut msg = format!(
        "Changes discarded for now, and scheduled commit at: {}.\n\
         The commit ID is: {commit_id}.\n\
         To discard this commit, you can execute: \n\n\
         netconfig cancel {commit_id}",
        commit_at.format(TS_FORMAT)
    );
    if let Some(revert_at) = revert_at {
        msg.push_str(&format!(
            "\n\nOnce committed, it will be reverted at: {}, unless confirmed with:\n\n\
             netconfig confirm {commit_id}",
            revert_at.format(TS_FORMAT)
        ));
    }
    msg
}

fn revert_message(commit_id: &str, revert_at: DateTime<Utc>) -> String {
    format!(
        "The commit ID is: {commit_id}.\n\
         This commit will be reverted at: {}, unless confirmed.\n\
         To confirm the commit and avoid reverting, you can execute:\n\n\
         netconfig confirm {commit_id}",
        revert_at.format(TS_FORMAT)
    )
}

fn unknown_commit(commit_id: &str) -> OutcomeRecord {
    OutcomeRecord::failed(&NetconfigError::UnknownOrTerminalCommit(
        commit_id.to_string(),
    ))
}

fn cancel_rejected(entry: &PendingChange) -> OutcomeRecord {
    let reason = match entry.state {
        PendingState::AwaitingConfirmation => {
            "change is already applied; confirm it or let it revert"
        }
        PendingState::Committing => "commit is being applied",
        PendingState::Reverting => "change is being reverted",
        _ => return unknown_commit(&entry.commit_id),
    };
    OutcomeRecord::failed(&NetconfigError::InvalidTransition {
        commit_id: entry.commit_id.clone(),
        from: entry.state,
        reason: reason.to_string(),
    })
}

fn skipped(entry: &PendingChange, state: Option<PendingState>) -> FireReport {
    FireReport::new(entry, FireOutcome::Skipped { state })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MemoryDevice;
    use crate::error::ErrorKind;
    use crate::registry::MemoryRegistry;
    use crate::render::SimpleRenderer;
    use crate::types::{MSG_ALREADY_CONFIGURED, MSG_CHANGED, MSG_STAGED, MSG_TEST_DISCARDED};
    use chrono::{Duration, TimeZone};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const RUNNING: &str = "hostname r1\nntp server 1.1.1.1\n";

    struct Fixture {
        device: Arc<MemoryDevice>,
        workflow: Workflow,
    }

    fn fixture() -> Fixture {
        fixture_with(OptionLayer::default(), TimerTable::disabled())
    }

    fn fixture_with(process: OptionLayer, timers: TimerTable) -> Fixture {
        let device = Arc::new(MemoryDevice::new("r1", RUNNING));
        let workflow = Workflow::builder(
            Arc::new(MemoryRegistry::new()),
            Arc::new(SimpleRenderer::new(".")),
        )
        .device(device.clone())
        .process_options(process)
        .timers(timers)
        .build();
        Fixture { device, workflow }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 10, 0, 0).unwrap()
    }

    fn ntp_change(options: OptionLayer) -> ChangeRequest {
        ChangeRequest::inline("ntp", "ntp server {{ server }}")
            .var("server", "2.2.2.2")
            .with_options(options)
    }

    fn state_of(wf: &Workflow, id: &str) -> PendingState {
        wf.registry().get(id).unwrap().unwrap().state
    }

    // apply ----------------------------------------------------------------

    #[test]
    fn immediate_commit_applies_and_reports_diff() {
        let f = fixture();
        let out = f
            .workflow
            .apply_at("r1", &ntp_change(OptionLayer::default()), now())
            .unwrap();
        assert_eq!(out.succeeded, Some(true));
        assert_eq!(out.message, MSG_CHANGED);
        assert!(out.diff().contains("+ ntp server 2.2.2.2"));
        assert!(out.commit_id.is_none());
        assert!(f.device.running().contains("ntp server 2.2.2.2"));
        assert!(f.workflow.registry().list().unwrap().is_empty());
    }

    #[test]
    fn identical_config_is_already_applied_and_idempotent() {
        let f = fixture();
        let req = ChangeRequest::inline("same", "ntp server 1.1.1.1").with_options(OptionLayer {
            revert_in: Some("5".into()),
            ..Default::default()
        });
        for _ in 0..2 {
            let out = f.workflow.apply_at("r1", &req, now()).unwrap();
            assert!(out.already_applied);
            assert_eq!(out.succeeded, Some(true));
            assert_eq!(out.message, MSG_ALREADY_CONFIGURED);
            assert_eq!(out.diff(), "");
        }
        assert!(f.workflow.registry().list().unwrap().is_empty());
        assert_eq!(f.device.commit_count(), 0);
        assert!(f.device.candidate().is_none());
    }

    #[test]
    fn dry_run_never_mutates_or_registers() {
        for options in [
            OptionLayer::default(),
            OptionLayer {
                commit_in: Some("5".into()),
                ..Default::default()
            },
            OptionLayer {
                revert_in: Some("2m".into()),
                ..Default::default()
            },
        ] {
            let f = fixture();
            let req = ntp_change(OptionLayer {
                test: Some(true),
                ..options
            });
            let out = f.workflow.apply_at("r1", &req, now()).unwrap();
            assert_eq!(out.succeeded, None);
            assert_eq!(out.message, MSG_TEST_DISCARDED);
            assert!(out.diff().contains("+ ntp server 2.2.2.2"));
            assert_eq!(f.device.running(), RUNNING);
            assert!(f.device.candidate().is_none());
            assert!(f.workflow.registry().list().unwrap().is_empty());
        }
    }

    #[test]
    fn process_test_flag_applies_unless_call_overrides() {
        let f = fixture_with(
            OptionLayer {
                test: Some(true),
                ..Default::default()
            },
            TimerTable::disabled(),
        );
        let out = f
            .workflow
            .apply_at("r1", &ntp_change(OptionLayer::default()), now())
            .unwrap();
        assert_eq!(out.succeeded, None);

        let out = f
            .workflow
            .apply_at(
                "r1",
                &ntp_change(OptionLayer {
                    test: Some(false),
                    ..Default::default()
                }),
                now(),
            )
            .unwrap();
        assert_eq!(out.succeeded, Some(true));
    }

    #[test]
    fn commit_false_leaves_candidate_staged() {
        let f = fixture();
        let out = f
            .workflow
            .apply_at(
                "r1",
                &ntp_change(OptionLayer {
                    commit: Some(false),
                    ..Default::default()
                }),
                now(),
            )
            .unwrap();
        assert_eq!(out.succeeded, Some(true));
        assert_eq!(out.message, MSG_STAGED);
        assert!(f.device.candidate().is_some());
        assert_eq!(f.device.running(), RUNNING);
    }

    #[test]
    fn debug_includes_rendered_config() {
        let f = fixture();
        let out = f
            .workflow
            .apply_at(
                "r1",
                &ntp_change(OptionLayer {
                    debug: Some(true),
                    test: Some(true),
                    ..Default::default()
                }),
                now(),
            )
            .unwrap();
        assert_eq!(out.rendered_config.as_deref(), Some("ntp server 2.2.2.2"));
    }

    #[test]
    fn conflicting_directives_abort_before_device_contact() {
        let f = fixture();
        f.device.set_reachable(false);
        let err = f
            .workflow
            .apply_at(
                "r1",
                &ntp_change(OptionLayer {
                    revert_in: Some("5".into()),
                    revert_at: Some("23:00".into()),
                    ..Default::default()
                }),
                now(),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConflictingDirective);
    }

    #[test]
    fn process_default_conflicts_with_call_value() {
        let f = fixture_with(
            OptionLayer {
                commit_in: Some("5".into()),
                ..Default::default()
            },
            TimerTable::disabled(),
        );
        let err = f
            .workflow
            .apply_at(
                "r1",
                &ntp_change(OptionLayer {
                    commit_at: Some("23:00".into()),
                    ..Default::default()
                }),
                now(),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConflictingDirective);
    }

    #[test]
    fn template_and_device_errors_take_different_paths() {
        let f = fixture();
        let err = f
            .workflow
            .apply_at("r1", &ChangeRequest::inline("x", "{{ missing }}"), now())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TemplateError);

        f.device.set_reachable(false);
        let out = f
            .workflow
            .apply_at("r1", &ntp_change(OptionLayer::default()), now())
            .unwrap();
        assert!(out.is_failure());
        assert_eq!(out.error_kind, Some(ErrorKind::DeviceCommError));
    }

    #[test]
    fn unknown_device_is_an_error() {
        let f = fixture();
        let err = f
            .workflow
            .apply_at("nope", &ntp_change(OptionLayer::default()), now())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownDevice);
    }

    // deferred commit ------------------------------------------------------

    #[test]
    fn commit_in_schedules_then_cancel_discards() {
        let f = fixture();
        let out = f
            .workflow
            .apply_at(
                "r1",
                &ntp_change(OptionLayer {
                    commit_in: Some("5".into()),
                    ..Default::default()
                }),
                now(),
            )
            .unwrap();
        assert_eq!(out.succeeded, None);
        let id = out.commit_id.clone().unwrap();
        assert!(out.message.contains(&format!("netconfig cancel {id}")));
        assert_eq!(out.scheduled_at, Some(now() + Duration::minutes(5)));

        let entry = f.workflow.registry().get(&id).unwrap().unwrap();
        assert_eq!(entry.state, PendingState::Scheduled);
        assert_eq!(entry.scheduled_at, Some(now() + Duration::minutes(5)));
        assert_eq!(f.device.running(), RUNNING);

        let out = f
            .workflow
            .cancel_at(&id, false, now() + Duration::minutes(2))
            .unwrap();
        assert_eq!(out.succeeded, Some(true));
        assert_eq!(out.message, format!("Commit #{id} cancelled."));
        assert_eq!(state_of(&f.workflow, &id), PendingState::Cancelled);
        assert!(f.device.candidate().is_none());

        let reports = f.workflow.fire_due(now() + Duration::minutes(10)).unwrap();
        assert!(reports.is_empty());
        assert_eq!(f.device.running(), RUNNING);
    }

    #[test]
    fn scheduled_commit_fires_when_due() {
        let f = fixture();
        let out = f
            .workflow
            .apply_at(
                "r1",
                &ntp_change(OptionLayer {
                    commit_in: Some("5".into()),
                    ..Default::default()
                }),
                now(),
            )
            .unwrap();
        let id = out.commit_id.unwrap();

        assert!(f.workflow.fire_due(now() + Duration::minutes(4)).unwrap().is_empty());
        let reports = f.workflow.fire_due(now() + Duration::minutes(5)).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].outcome, FireOutcome::Committed);
        assert_eq!(state_of(&f.workflow, &id), PendingState::Committed);
        assert!(f.device.running().contains("ntp server 2.2.2.2"));
    }

    #[test]
    fn deferred_commit_then_revert_walks_every_state() {
        let f = fixture();
        let out = f
            .workflow
            .apply_at(
                "r1",
                &ntp_change(OptionLayer {
                    commit_in: Some("5".into()),
                    revert_in: Some("10".into()),
                    ..Default::default()
                }),
                now(),
            )
            .unwrap();
        let id = out.commit_id.unwrap();
        assert_eq!(out.revert_at, Some(now() + Duration::minutes(10)));

        let reports = f.workflow.fire_due(now() + Duration::minutes(5)).unwrap();
        assert_eq!(
            reports[0].outcome,
            FireOutcome::AwaitingConfirmation {
                revert_at: now() + Duration::minutes(10)
            }
        );
        assert_eq!(state_of(&f.workflow, &id), PendingState::AwaitingConfirmation);
        assert!(f.device.running().contains("ntp server 2.2.2.2"));

        let reports = f.workflow.fire_due(now() + Duration::minutes(10)).unwrap();
        assert_eq!(reports[0].outcome, FireOutcome::Reverted);
        assert_eq!(state_of(&f.workflow, &id), PendingState::Reverted);
        assert_eq!(f.device.running(), RUNNING);
    }

    #[test]
    fn revert_not_after_commit_is_rejected() {
        let f = fixture();
        let err = f
            .workflow
            .apply_at(
                "r1",
                &ntp_change(OptionLayer {
                    commit_in: Some("10".into()),
                    revert_in: Some("5".into()),
                    ..Default::default()
                }),
                now(),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDirective);
        assert!(f.device.candidate().is_none());
    }

    // revert / confirm -----------------------------------------------------

    fn revert_in_2m(f: &Fixture) -> String {
        let out = f
            .workflow
            .apply_at(
                "r1",
                &ntp_change(OptionLayer {
                    revert_in: Some("2m".into()),
                    ..Default::default()
                }),
                now(),
            )
            .unwrap();
        assert_eq!(out.succeeded, None);
        let id = out.commit_id.clone().unwrap();
        assert!(out.message.contains(&format!("netconfig confirm {id}")));
        id
    }

    #[test]
    fn confirm_before_revert_makes_timer_a_noop() {
        let f = fixture();
        let id = revert_in_2m(&f);
        let entry = f.workflow.registry().get(&id).unwrap().unwrap();
        assert_eq!(entry.state, PendingState::AwaitingConfirmation);
        assert_eq!(entry.revert_at, Some(now() + Duration::minutes(2)));
        assert!(f.device.running().contains("ntp server 2.2.2.2"));

        let out = f
            .workflow
            .confirm_at(&id, false, now() + Duration::minutes(1))
            .unwrap();
        assert_eq!(out.succeeded, Some(true));
        assert_eq!(out.message, format!("Commit #{id} confirmed."));
        assert_eq!(state_of(&f.workflow, &id), PendingState::Confirmed);

        let report = f.workflow.fire(&id, now() + Duration::minutes(2)).unwrap();
        assert!(report.is_skipped());
        assert_eq!(state_of(&f.workflow, &id), PendingState::Confirmed);
        assert!(f.device.running().contains("ntp server 2.2.2.2"));
    }

    #[test]
    fn unconfirmed_change_reverts_once() {
        let f = fixture();
        let id = revert_in_2m(&f);
        let at = now() + Duration::minutes(2);
        assert_eq!(f.workflow.fire(&id, at).unwrap().outcome, FireOutcome::Reverted);
        assert_eq!(f.device.running(), RUNNING);
        let commits = f.device.commit_count();

        let again = f.workflow.fire(&id, at).unwrap();
        assert_eq!(
            again.outcome,
            FireOutcome::Skipped {
                state: Some(PendingState::Reverted)
            }
        );
        assert_eq!(f.device.commit_count(), commits);
    }

    #[test]
    fn unreachable_device_at_revert_marks_failed() {
        let f = fixture();
        let id = revert_in_2m(&f);
        f.device.set_reachable(false);
        let report = f.workflow.fire(&id, now() + Duration::minutes(2)).unwrap();
        assert!(matches!(report.outcome, FireOutcome::Failed { .. }));
        let entry = f.workflow.registry().get(&id).unwrap().unwrap();
        assert_eq!(entry.state, PendingState::Failed);
        assert!(entry.last_error.unwrap().contains("unreachable"));
    }

    #[test]
    fn confirm_on_scheduled_is_unknown_or_terminal() {
        let f = fixture();
        let out = f
            .workflow
            .apply_at(
                "r1",
                &ntp_change(OptionLayer {
                    commit_in: Some("5".into()),
                    ..Default::default()
                }),
                now(),
            )
            .unwrap();
        let id = out.commit_id.unwrap();
        let out = f.workflow.confirm_at(&id, false, now()).unwrap();
        assert_eq!(out.error_kind, Some(ErrorKind::UnknownOrTerminalCommit));
        assert_eq!(out.message, format!("unable to find commit #{id}"));
        assert_eq!(state_of(&f.workflow, &id), PendingState::Scheduled);
    }

    #[test]
    fn cancel_on_applied_change_is_invalid_transition() {
        let f = fixture();
        let id = revert_in_2m(&f);
        let out = f.workflow.cancel_at(&id, false, now()).unwrap();
        assert!(out.is_failure());
        assert_eq!(out.error_kind, Some(ErrorKind::InvalidTransition));
        assert_eq!(state_of(&f.workflow, &id), PendingState::AwaitingConfirmation);
        assert!(f.device.running().contains("ntp server 2.2.2.2"));
    }

    #[test]
    fn cancel_and_confirm_of_unknown_or_terminal() {
        let f = fixture();
        for out in [
            f.workflow.cancel_at("missing", false, now()).unwrap(),
            f.workflow.confirm_at("missing", false, now()).unwrap(),
        ] {
            assert_eq!(out.error_kind, Some(ErrorKind::UnknownOrTerminalCommit));
        }

        let id = revert_in_2m(&f);
        f.workflow.confirm_at(&id, false, now()).unwrap();
        let out = f.workflow.confirm_at(&id, false, now()).unwrap();
        assert_eq!(out.error_kind, Some(ErrorKind::UnknownOrTerminalCommit));
        let out = f.workflow.cancel_at(&id, false, now()).unwrap();
        assert_eq!(out.error_kind, Some(ErrorKind::UnknownOrTerminalCommit));
    }

    #[test]
    fn dry_run_cancel_and_confirm_report_intent_only() {
        let f = fixture();
        let id = revert_in_2m(&f);
        let out = f.workflow.confirm_at(&id, true, now()).unwrap();
        assert_eq!(out.succeeded, None);
        assert_eq!(out.message, format!("It would confirm commit #{id}"));
        let out = f.workflow.cancel_at(&id, true, now()).unwrap();
        assert_eq!(out.message, format!("It would cancel commit #{id}"));
        assert_eq!(state_of(&f.workflow, &id), PendingState::AwaitingConfirmation);
    }

    #[test]
    fn dry_run_tick_reports_without_firing() {
        let f = fixture();
        let id = revert_in_2m(&f);
        let scheduled = f
            .workflow
            .apply_at(
                "r1",
                &ChangeRequest::inline("banner", "banner motd hi").with_options(OptionLayer {
                    commit_in: Some("5".into()),
                    ..Default::default()
                }),
                now(),
            )
            .unwrap()
            .commit_id
            .unwrap();
        let running = f.device.running();

        let dry = Workflow::builder(
            f.workflow.inner.registry.clone(),
            Arc::new(SimpleRenderer::new(".")),
        )
        .device(f.device.clone())
        .process_options(OptionLayer {
            test: Some(true),
            ..Default::default()
        })
        .build();
        assert!(dry.dry_run());

        let reports = dry.fire_due(now() + Duration::minutes(10)).unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].commit_id, id);
        assert_eq!(reports[0].outcome, FireOutcome::WouldRevert);
        assert_eq!(reports[1].commit_id, scheduled);
        assert_eq!(reports[1].outcome, FireOutcome::WouldCommit { revert_at: None });

        assert_eq!(f.device.running(), running);
        assert_eq!(state_of(&dry, &id), PendingState::AwaitingConfirmation);
        assert_eq!(state_of(&dry, &scheduled), PendingState::Scheduled);
    }

    #[test]
    fn cancel_leaves_unrelated_staged_change_alone() {
        let f = fixture();
        let id = f
            .workflow
            .apply_at(
                "r1",
                &ntp_change(OptionLayer {
                    commit_in: Some("5".into()),
                    ..Default::default()
                }),
                now(),
            )
            .unwrap()
            .commit_id
            .unwrap();
        f.workflow
            .apply_at(
                "r1",
                &ChangeRequest::inline("banner", "banner motd hi").with_options(OptionLayer {
                    commit: Some(false),
                    ..Default::default()
                }),
                now(),
            )
            .unwrap();

        let out = f.workflow.cancel_at(&id, false, now()).unwrap();
        assert_eq!(out.succeeded, Some(true));
        assert!(f.device.candidate().unwrap().contains("banner motd hi"));
    }

    // device contention ----------------------------------------------------

    /// Wraps a `MemoryDevice`, flags any load that lands while another
    /// caller's candidate is still open, and can fail `running_config`.
    struct RecordingDevice {
        inner: MemoryDevice,
        open: AtomicBool,
        overlaps: AtomicUsize,
        fail_running: AtomicBool,
    }

    impl RecordingDevice {
        fn new(running: &str) -> Self {
            Self {
                inner: MemoryDevice::new("r1", running),
                open: AtomicBool::new(false),
                overlaps: AtomicUsize::new(0),
                fail_running: AtomicBool::new(false),
            }
        }
    }

    impl Device for RecordingDevice {
        fn name(&self) -> &str {
            self.inner.name()
        }

        fn running_config(&self) -> Result<String> {
            if self.fail_running.load(Ordering::SeqCst) {
                return Err(NetconfigError::DeviceComm {
                    device: "r1".into(),
                    reason: "read timed out".into(),
                });
            }
            self.inner.running_config()
        }

        fn load_candidate(&self, config: &str, replace: bool) -> Result<()> {
            if self.open.swap(true, Ordering::SeqCst) {
                self.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
            self.inner.load_candidate(config, replace)
        }

        fn compare(&self) -> Result<String> {
            self.inner.compare()
        }

        fn discard(&self) -> Result<()> {
            self.open.store(false, Ordering::SeqCst);
            self.inner.discard()
        }

        fn commit(&self) -> Result<()> {
            std::thread::sleep(std::time::Duration::from_millis(1));
            let result = self.inner.commit();
            self.open.store(false, Ordering::SeqCst);
            result
        }
    }

    fn recording_workflow(device: Arc<RecordingDevice>) -> Workflow {
        Workflow::builder(
            Arc::new(MemoryRegistry::new()),
            Arc::new(SimpleRenderer::new(".")),
        )
        .device(device)
        .build()
    }

    #[test]
    fn failed_snapshot_discards_staged_candidate() {
        let device = Arc::new(RecordingDevice::new(RUNNING));
        let workflow = recording_workflow(device.clone());
        device.fail_running.store(true, Ordering::SeqCst);

        let out = workflow
            .apply_at(
                "r1",
                &ntp_change(OptionLayer {
                    revert_in: Some("2m".into()),
                    ..Default::default()
                }),
                now(),
            )
            .unwrap();
        assert!(out.is_failure());
        assert_eq!(out.error_kind, Some(ErrorKind::DeviceCommError));
        assert!(device.inner.candidate().is_none());
        assert_eq!(device.inner.running(), RUNNING);
        assert!(workflow.registry().list().unwrap().is_empty());
    }

    #[test]
    fn concurrent_operations_on_one_device_do_not_interleave() {
        let device = Arc::new(RecordingDevice::new(RUNNING));
        let workflow = recording_workflow(device.clone());

        let scheduled: Vec<String> = (0..8)
            .map(|i| {
                workflow
                    .apply_at(
                        "r1",
                        &ChangeRequest::inline("later", format!("logging host 10.1.0.{i}"))
                            .with_options(OptionLayer {
                                commit_in: Some("5".into()),
                                ..Default::default()
                            }),
                        now(),
                    )
                    .unwrap()
                    .commit_id
                    .unwrap()
            })
            .collect();

        std::thread::scope(|scope| {
            for t in 0..4 {
                let wf = workflow.clone();
                scope.spawn(move || {
                    for i in 0..10 {
                        let req = ChangeRequest::inline("ntp", format!("ntp server 10.0.{t}.{i}"));
                        let out = wf.apply_at("r1", &req, now()).unwrap();
                        assert_eq!(out.succeeded, Some(true));
                    }
                });
            }
            let wf = workflow.clone();
            scope.spawn(move || {
                for _ in 0..5 {
                    wf.fire_due(now() + Duration::minutes(10)).unwrap();
                }
            });
            let wf = workflow.clone();
            let ids = scheduled.clone();
            scope.spawn(move || {
                for id in ids.iter().step_by(2) {
                    wf.cancel_at(id, false, now()).unwrap();
                }
            });
        });

        assert_eq!(device.overlaps.load(Ordering::SeqCst), 0);
        let running = device.inner.running();
        for t in 0..4 {
            for i in 0..10 {
                assert!(running.contains(&format!("ntp server 10.0.{t}.{i}")));
            }
        }
        for id in &scheduled {
            let state = state_of(&workflow, id);
            assert!(matches!(state, PendingState::Committed | PendingState::Cancelled));
        }
    }

    // maintenance ----------------------------------------------------------

    #[test]
    fn purge_drops_old_terminal_entries() {
        let f = fixture();
        let id = revert_in_2m(&f);
        f.workflow.confirm_at(&id, false, now()).unwrap();
        assert_eq!(f.workflow.purge(now() - Duration::days(1)).unwrap(), 0);
        assert_eq!(f.workflow.purge(now() + Duration::days(1)).unwrap(), 1);
        assert!(f.workflow.registry().get(&id).unwrap().is_none());
    }

    // runtime timers -------------------------------------------------------

    async fn wait_for_state(wf: &Workflow, id: &str, want: PendingState) -> PendingState {
        let mut state = state_of(wf, id);
        for _ in 0..300 {
            if state == want {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            state = state_of(wf, id);
        }
        state
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn armed_revert_fires_on_its_own() {
        let f = fixture_with(OptionLayer::default(), TimerTable::from_current());
        // Anchor so that a one-minute revert lands a moment from now.
        let anchor = Utc::now() - Duration::milliseconds(59_800);
        let out = f
            .workflow
            .apply_at(
                "r1",
                &ntp_change(OptionLayer {
                    revert_in: Some("1".into()),
                    ..Default::default()
                }),
                anchor,
            )
            .unwrap();
        let id = out.commit_id.unwrap();
        assert_eq!(f.workflow.armed_timers(), 1);

        let state = wait_for_state(&f.workflow, &id, PendingState::Reverted).await;
        assert_eq!(state, PendingState::Reverted);
        assert_eq!(f.device.running(), RUNNING);
        assert_eq!(f.workflow.armed_timers(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn confirm_disarms_revert_timer() {
        let f = fixture_with(OptionLayer::default(), TimerTable::from_current());
        let anchor = Utc::now() - Duration::milliseconds(59_700);
        let out = f
            .workflow
            .apply_at(
                "r1",
                &ntp_change(OptionLayer {
                    revert_in: Some("1".into()),
                    ..Default::default()
                }),
                anchor,
            )
            .unwrap();
        let id = out.commit_id.unwrap();
        let out = f.workflow.confirm(&id, false).unwrap();
        assert_eq!(out.succeeded, Some(true));
        assert_eq!(f.workflow.armed_timers(), 0);

        tokio::time::sleep(std::time::Duration::from_millis(600)).await;
        assert_eq!(state_of(&f.workflow, &id), PendingState::Confirmed);
        assert!(f.device.running().contains("ntp server 2.2.2.2"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rearm_restores_timers_for_live_entries() {
        let registry: Arc<dyn PendingRegistry> = Arc::new(MemoryRegistry::new());
        let device = Arc::new(MemoryDevice::new("r1", RUNNING));
        let offline = Workflow::builder(registry.clone(), Arc::new(SimpleRenderer::new(".")))
            .device(device.clone())
            .build();
        let out = offline
            .apply(
                "r1",
                &ntp_change(OptionLayer {
                    commit_in: Some("30".into()),
                    ..Default::default()
                }),
            )
            .unwrap();
        assert_eq!(offline.rearm().unwrap(), 0);

        let online = Workflow::builder(registry, Arc::new(SimpleRenderer::new(".")))
            .device(device)
            .timers(TimerTable::from_current())
            .build();
        assert_eq!(online.rearm().unwrap(), 1);
        let id = out.commit_id.unwrap();
        online.cancel(&id, false).unwrap();
        assert_eq!(online.armed_timers(), 0);
    }
}
