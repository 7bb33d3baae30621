use clap::{Parser, Subcommand};

// Display order for API key option (placed at top of help text)
const API_KEY_DISPLAY_ORDER: usize = 0;
// Display order for log level option (placed at end of help text)
const LOG_LEVEL_DISPLAY_ORDER: usize = 100;

/// CLI arguments
#[derive(Parser)]
#[command(
    name = "ruff-droids",
    version,
    about = "Run ruff auto-fixes and delegate remaining lint issues to parallel fix agents",
    long_about = None
)]
pub struct Cli {
    /// Log level (see https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html)
    /// [env: RUFF_DROIDS_LOG=] [default: info]
    #[arg(
        long,
        env = "RUFF_DROIDS_LOG",
        default_value = "info",
        global = true,
        hide_default_value = true,
        hide_env = true,
        display_order = LOG_LEVEL_DISPLAY_ORDER,
        verbatim_doc_comment
    )]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a default ruff-droids.toml config file
    Init(InitArgs),
    /// Lint a directory and dispatch remaining violations to fix agents
    Fix(FixArgs),
}

/// Arguments for the init command
#[derive(Parser)]
pub struct InitArgs {
    /// Path to config file
    #[arg(long, default_value = "ruff-droids.toml")]
    pub config: String,

    /// Override existing config file
    #[arg(long)]
    pub r#override: bool,
}

/// Arguments for the fix command
#[derive(Parser, Debug)]
pub struct FixArgs {
    /// Target directory
    #[arg(long, default_value = ".")]
    pub path: String,

    /// Path to config file (optional, initialize with `ruff-droids init`)
    #[arg(long, default_value = "ruff-droids.toml")]
    pub config: String,

    /// Override config values using dot notation (e.g. worker.max_attempts=3)
    #[arg(long = "config-override")]
    pub config_overrides: Vec<String>,

    /// Number of work units fixed in parallel [default: worker.concurrency, 4]
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub concurrency: Option<u32>,

    /// Fix agent API key (interactive login when absent)
    #[arg(
        long,
        env = "FACTORY_API_KEY",
        hide_env_values = true,
        display_order = API_KEY_DISPLAY_ORDER
    )]
    pub factory_api_key: Option<String>,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Dry run: only show work units without dispatching
    #[arg(long)]
    pub dry_run: bool,

    /// Report file path for per-unit outcomes (.md or .json)
    #[arg(long)]
    pub output: Option<String>,
}
