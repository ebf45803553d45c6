use netconfig_core::timer::TimerTable;

use super::{report, Ctx};

pub fn run(ctx: &Ctx<'_>, commit_id: &str) -> anyhow::Result<()> {
    let workflow = ctx.open_workflow(TimerTable::disabled())?;
    let outcome = workflow.confirm(commit_id, ctx.dry_run(&workflow))?;
    report(ctx, &outcome)
}
