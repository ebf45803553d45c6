use chrono::{Local, Utc};
use netconfig_core::config::Config;
use netconfig_core::directive::ClockZone;
use netconfig_core::timespec::TimeDirective;

use super::Ctx;
use crate::output::print_json;

/// Resolve `directive` against now, in the project's clock zone when a
/// project is present and in UTC otherwise.
pub fn run(ctx: &Ctx<'_>, directive: &str) -> anyhow::Result<()> {
    let zone = Config::load(ctx.root)
        .map(|c| c.timezone)
        .unwrap_or(ClockZone::Utc);
    let now = Utc::now();
    let parsed = TimeDirective::parse(directive)?;
    let at = zone.resolve(&parsed, now)?;

    if ctx.json {
        return print_json(&serde_json::json!({
            "directive": directive,
            "now": now,
            "at": at,
            "in_seconds": (at - now).num_seconds(),
        }));
    }

    println!("{}", at.to_rfc3339());
    println!("local: {}", at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S %:z"));
    let mins = (at - now).num_minutes();
    println!("in:    {}h{:02}m", mins / 60, mins % 60);
    Ok(())
}
