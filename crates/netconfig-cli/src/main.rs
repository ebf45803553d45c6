mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    apply::ApplyArgs, config::ConfigSubcommand, pending::PendingSubcommand, OutcomeFailed,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "netconfig",
    about = "Apply network device configuration with scheduled commits, confirmations, and automatic reverts",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .netconfig/)
    #[arg(long, global = true, env = "NETCONFIG_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Dry run: compute and report, change nothing
    #[arg(long, global = true)]
    test: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize netconfig in the current project
    Init {
        /// Register a file-backed device under devices/<NAME> (repeatable)
        #[arg(long = "device", value_name = "NAME")]
        devices: Vec<String>,
    },

    /// Render a template and apply it to a device
    Apply(ApplyArgs),

    /// Cancel a scheduled commit that has not taken effect yet
    Cancel { commit_id: String },

    /// Confirm an applied commit so it is not reverted
    Confirm { commit_id: String },

    /// Inspect and maintain pending changes
    Pending {
        #[command(subcommand)]
        subcommand: PendingSubcommand,
    },

    /// Fire every scheduled commit and revert that is due
    Tick {
        /// Evaluate due entries as of this instant (RFC 3339) instead of now
        #[arg(long)]
        at: Option<String>,
    },

    /// Keep firing due commits and reverts until interrupted
    Watch {
        /// Seconds between ticks
        #[arg(long, default_value = "5")]
        interval_secs: u64,
    },

    /// Show or validate the project configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Resolve a time directive (5, 2m, 1h30m, 1am, 13:20) against now
    Time { directive: String },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Watch { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());
    let ctx = cmd::Ctx {
        root: &root,
        json: cli.json,
        test: cli.test,
    };

    let result = match cli.command {
        Commands::Init { devices } => cmd::init::run(&root, &devices),
        Commands::Apply(args) => cmd::apply::run(&ctx, args),
        Commands::Cancel { commit_id } => cmd::cancel::run(&ctx, &commit_id),
        Commands::Confirm { commit_id } => cmd::confirm::run(&ctx, &commit_id),
        Commands::Pending { subcommand } => cmd::pending::run(&ctx, subcommand),
        Commands::Tick { at } => cmd::tick::run(&ctx, at.as_deref()),
        Commands::Watch { interval_secs } => cmd::watch::run(&ctx, interval_secs),
        Commands::Config { subcommand } => cmd::config::run(&ctx, subcommand),
        Commands::Time { directive } => cmd::time::run(&ctx, &directive),
    };

    if let Err(e) = result {
        if e.downcast_ref::<OutcomeFailed>().is_some() {
            std::process::exit(2);
        }
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
