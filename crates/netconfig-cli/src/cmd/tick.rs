use anyhow::Context;
use chrono::{DateTime, Utc};
use netconfig_core::timer::TimerTable;
use netconfig_core::{FireOutcome, FireReport};

use super::{Ctx, OutcomeFailed};
use crate::output::{print_json, print_table};

pub fn run(ctx: &Ctx<'_>, at: Option<&str>) -> anyhow::Result<()> {
    let now = match at {
        Some(text) => DateTime::parse_from_rfc3339(text)
            .with_context(|| format!("invalid --at '{text}': expected an RFC 3339 timestamp"))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };
    let workflow = ctx.open_workflow(TimerTable::disabled())?;
    let reports = workflow.fire_due(now)?;

    if ctx.json {
        print_json(&reports)?;
    } else if reports.is_empty() {
        println!("Nothing due.");
    } else {
        print_reports(&reports);
    }

    if reports
        .iter()
        .any(|r| matches!(r.outcome, FireOutcome::Failed { .. }))
    {
        return Err(OutcomeFailed.into());
    }
    Ok(())
}

pub fn describe(outcome: &FireOutcome) -> String {
    match outcome {
        FireOutcome::Committed => "committed".to_string(),
        FireOutcome::AwaitingConfirmation { revert_at } => {
            format!("committed, reverts at {}", revert_at.format("%Y-%m-%d %H:%M:%S"))
        }
        FireOutcome::Reverted => "reverted".to_string(),
        FireOutcome::WouldCommit { revert_at: None } => "would commit".to_string(),
        FireOutcome::WouldCommit {
            revert_at: Some(revert_at),
        } => format!(
            "would commit, then revert at {}",
            revert_at.format("%Y-%m-%d %H:%M:%S")
        ),
        FireOutcome::WouldRevert => "would revert".to_string(),
        FireOutcome::Failed { reason } => format!("FAILED: {reason}"),
        FireOutcome::Skipped { state: Some(state) } => format!("skipped ({state})"),
        FireOutcome::Skipped { state: None } => "skipped (missing)".to_string(),
    }
}

fn print_reports(reports: &[FireReport]) {
    let rows = reports
        .iter()
        .map(|r| {
            vec![
                r.commit_id.clone(),
                r.device.clone().unwrap_or_default(),
                describe(&r.outcome),
            ]
        })
        .collect();
    print_table(&["COMMIT ID", "DEVICE", "OUTCOME"], rows);
}
