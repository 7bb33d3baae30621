mod cli;
mod config;
mod dispatch;
mod lint;
mod orchestrator;
mod partition;
mod scope;
mod types;
mod util;

use clap::Parser;
use cli::{Cli, Commands};
use config::Config;
use orchestrator::{EXIT_FAILURE, FixOptions};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    match &cli.command {
        Commands::Init(args) => {
            if let Err(e) = config::init_config(&args.config, args.r#override) {
                error!("{:#}", e);
                std::process::exit(EXIT_FAILURE);
            }
        }
        Commands::Fix(args) => {
            let config = Config::load(&args.config, &args.config_overrides).unwrap_or_else(|e| {
                error!("Failed to load config: {:#}", e);
                std::process::exit(EXIT_FAILURE);
            });
            debug!("Loaded config: {:?}", config);

            let target_dir = std::path::absolute(&args.path).unwrap_or_else(|e| {
                error!("Invalid target directory {}: {}", args.path, e);
                std::process::exit(EXIT_FAILURE);
            });

            let options = FixOptions {
                target_dir,
                concurrency: args
                    .concurrency
                    .map(|c| c as usize)
                    .unwrap_or(config.worker.concurrency),
                api_key: args.factory_api_key.clone().filter(|k| !k.is_empty()),
                assume_yes: args.yes,
                dry_run: args.dry_run,
                output: args.output.clone(),
            };

            let code = match orchestrator::run_fix(&config, &options).await {
                Ok(code) => code,
                Err(e) => {
                    error!("{:#}", e);
                    EXIT_FAILURE
                }
            };
            std::process::exit(code);
        }
    }
}
