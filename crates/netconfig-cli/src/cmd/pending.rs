use anyhow::bail;
use chrono::{DateTime, Duration, Utc};
use clap::Subcommand;
use netconfig_core::registry::{PendingChange, PendingRegistry};
use netconfig_core::timer::TimerTable;

use super::Ctx;
use crate::output::{print_json, print_table};

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum PendingSubcommand {
    /// List pending changes (live ones unless --all)
    List {
        /// Include confirmed, cancelled, reverted, committed, and failed entries
        #[arg(long)]
        all: bool,
    },

    /// Show one pending change in full
    Show { commit_id: String },

    /// Delete finished entries older than N days
    Purge {
        #[arg(long, value_name = "N")]
        older_than_days: u32,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(ctx: &Ctx<'_>, subcmd: PendingSubcommand) -> anyhow::Result<()> {
    let workflow = ctx.open_workflow(TimerTable::disabled())?;
    let registry = workflow.registry();
    match subcmd {
        PendingSubcommand::List { all } => list(ctx, registry, all),
        PendingSubcommand::Show { commit_id } => show(ctx, registry, &commit_id),
        PendingSubcommand::Purge { older_than_days } => {
            let cutoff = Utc::now() - Duration::days(i64::from(older_than_days));
            let removed = workflow.purge(cutoff)?;
            if ctx.json {
                print_json(&serde_json::json!({ "removed": removed }))?;
            } else {
                println!("Purged {removed} finished entries.");
            }
            Ok(())
        }
    }
}

fn list(ctx: &Ctx<'_>, registry: &dyn PendingRegistry, all: bool) -> anyhow::Result<()> {
    let entries = if all { registry.list()? } else { registry.live()? };

    if ctx.json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("No pending changes.");
        return Ok(());
    }

    let rows = entries
        .iter()
        .map(|c| {
            vec![
                c.commit_id.clone(),
                c.device.clone(),
                c.state.to_string(),
                fmt_ts(c.scheduled_at),
                fmt_ts(c.revert_at),
                c.last_error.clone().unwrap_or_default(),
            ]
        })
        .collect();
    print_table(
        &["COMMIT ID", "DEVICE", "STATE", "COMMIT AT", "REVERT AT", "ERROR"],
        rows,
    );
    Ok(())
}

fn show(ctx: &Ctx<'_>, registry: &dyn PendingRegistry, commit_id: &str) -> anyhow::Result<()> {
    let Some(change) = registry.get(commit_id)? else {
        bail!("unable to find commit #{commit_id}");
    };
    if ctx.json {
        return print_json(&change);
    }
    print_change(&change);
    Ok(())
}

fn print_change(c: &PendingChange) {
    println!("Commit:     {}", c.commit_id);
    println!("Device:     {}", c.device);
    println!("State:      {}", c.state);
    println!("Commit at:  {}", fmt_ts(c.scheduled_at));
    println!("Revert at:  {}", fmt_ts(c.revert_at));
    println!("Replace:    {}", c.replace);
    println!("Created:    {}", c.created_at.to_rfc3339());
    println!("Updated:    {}", c.updated_at.to_rfc3339());
    if let Some(err) = &c.last_error {
        println!("Error:      {err}");
    }
    if !c.diff.is_empty() {
        println!("\nDiff:");
        for line in c.diff.lines() {
            println!("    {line}");
        }
    }
}

fn fmt_ts(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}
