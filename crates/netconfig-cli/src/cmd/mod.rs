pub mod apply;
pub mod cancel;
pub mod config;
pub mod confirm;
pub mod init;
pub mod pending;
pub mod tick;
pub mod time;
pub mod watch;

use anyhow::Context;
use chrono::Utc;
use netconfig_core::config::Config;
use netconfig_core::device::FileDevice;
use netconfig_core::options::OptionLayer;
use netconfig_core::registry::RedbRegistry;
use netconfig_core::render::SimpleRenderer;
use netconfig_core::timer::TimerTable;
use netconfig_core::{io, OutcomeRecord, Workflow};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::output::{print_json, print_outcome};

/// Global flags shared by every subcommand.
pub struct Ctx<'a> {
    pub root: &'a Path,
    pub json: bool,
    pub test: bool,
}

/// An operation ran but reported `result: false`. Exits with status 2.
#[derive(Debug)]
pub struct OutcomeFailed;

impl fmt::Display for OutcomeFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("operation reported result: false")
    }
}

impl std::error::Error for OutcomeFailed {}

impl Ctx<'_> {
    pub fn load_config(&self) -> anyhow::Result<Config> {
        Config::load(self.root).context("failed to load config")
    }

    /// The process tier: config defaults with `--test` layered on top.
    pub fn process_layer(&self, config: &Config) -> OptionLayer {
        let flags = OptionLayer {
            test: self.test.then_some(true),
            ..Default::default()
        };
        flags.over(&config.defaults)
    }

    /// Build a workflow over the configured devices and the on-disk registry.
    /// Entries left mid-commit or mid-revert by a crashed run are failed first.
    pub fn open_workflow(&self, timers: TimerTable) -> anyhow::Result<Workflow> {
        let config = self.load_config()?;
        let registry_path = config.registry_path(self.root);
        if let Some(parent) = registry_path.parent() {
            io::ensure_dir(parent)?;
        }
        let registry = RedbRegistry::open(&registry_path)
            .with_context(|| format!("failed to open registry {}", registry_path.display()))?;

        let mut builder = Workflow::builder(
            Arc::new(registry),
            Arc::new(SimpleRenderer::new(config.templates_path(self.root))),
        )
        .process_options(self.process_layer(&config))
        .clock_zone(config.timezone)
        .timers(timers);
        for (name, device) in &config.devices {
            let dir = config.device_path(self.root, device);
            builder = builder.device(Arc::new(FileDevice::new(name.clone(), dir)));
        }

        let workflow = builder.build();
        workflow
            .recover(config.recovery_max_age(), Utc::now())
            .context("startup recovery failed")?;
        Ok(workflow)
    }

    /// Whether cancel/confirm should only report intent.
    pub fn dry_run(&self, workflow: &Workflow) -> bool {
        workflow.dry_run()
    }
}

/// Print a single outcome and turn `result: false` into an error.
pub fn report(ctx: &Ctx<'_>, outcome: &OutcomeRecord) -> anyhow::Result<()> {
    if ctx.json {
        print_json(outcome)?;
    } else {
        print_outcome(None, outcome);
    }
    if outcome.is_failure() {
        return Err(OutcomeFailed.into());
    }
    Ok(())
}
