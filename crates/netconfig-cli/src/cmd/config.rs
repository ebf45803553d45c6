use crate::output::print_json;
use clap::Subcommand;
use netconfig_core::config::WarnLevel;
use netconfig_core::options::{self, OptionLayer};

use super::Ctx;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show the effective process-wide configuration
    Show,

    /// Validate the config for common mistakes
    Validate,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(ctx: &Ctx<'_>, subcmd: ConfigSubcommand) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(ctx),
        ConfigSubcommand::Validate => validate(ctx),
    }
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(ctx: &Ctx<'_>) -> anyhow::Result<()> {
    let config = ctx.load_config()?;
    let process = ctx.process_layer(&config);
    let effective = options::resolve(&OptionLayer::default(), &process, &OptionLayer::compiled());

    if ctx.json {
        let value = serde_json::json!({
            "config": config,
            "process": process,
            "effective": effective,
        });
        return print_json(&value);
    }

    print!("{}", serde_yaml::to_string(&config)?);
    println!("\n# effective options (compiled defaults < config defaults < global flags)");
    print!("{}", serde_yaml::to_string(&effective)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(ctx: &Ctx<'_>) -> anyhow::Result<()> {
    let config = ctx.load_config()?;
    let warnings = config.validate(ctx.root);

    if ctx.json {
        let value = serde_json::json!({
            "warnings": warnings,
        });
        print_json(&value)?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    let has_errors = warnings.iter().any(|w| w.level == WarnLevel::Error);
    if has_errors {
        anyhow::bail!("config validation found errors");
    }

    Ok(())
}
