use chrono::Utc;
use netconfig_core::timer::TimerTable;
use netconfig_core::FireOutcome;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

use super::tick::describe;
use super::Ctx;

/// The registry file is locked while open, so each tick opens it, fires
/// what is due, and releases it for cancel/confirm calls in between.
pub fn run(ctx: &Ctx<'_>, interval_secs: u64) -> anyhow::Result<()> {
    // Fail fast on a missing or broken project before entering the loop.
    ctx.open_workflow(TimerTable::disabled())?;

    let root: PathBuf = ctx.root.to_path_buf();
    let test = ctx.test;
    let interval = Duration::from_secs(interval_secs.max(1));
    println!(
        "Watching {} every {}s (Ctrl-C to stop)",
        root.display(),
        interval.as_secs()
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let root = root.clone();
                    let result = tokio::task::spawn_blocking(move || tick_once(&root, test)).await;
                    match result {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => warn!(error = %format!("{e:#}"), "tick failed"),
                        Err(e) => error!(error = %e, "tick panicked"),
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("watch stopped");
                    break;
                }
            }
        }
        Ok(())
    })
}

fn tick_once(root: &std::path::Path, test: bool) -> anyhow::Result<()> {
    let ctx = Ctx {
        root,
        json: false,
        test,
    };
    let workflow = ctx.open_workflow(TimerTable::disabled())?;
    for report in workflow.fire_due(Utc::now())? {
        let device = report.device.as_deref().unwrap_or("-");
        match &report.outcome {
            FireOutcome::Failed { reason } => {
                error!(commit_id = %report.commit_id, device, reason = %reason, "pending change failed")
            }
            outcome => info!(
                commit_id = %report.commit_id,
                device,
                outcome = %describe(outcome),
                "pending change fired"
            ),
        }
    }
    Ok(())
}
