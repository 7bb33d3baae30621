use crate::config::Config;
use crate::dispatch::{self, DispatchReport, DroidAgent, RetryPolicy, render};
use crate::lint::Linter;
use crate::partition;
use crate::scope::PythonIndexer;
use crate::types::WorkUnit;
use crate::util;
use anyhow::Context;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
/// Conventional status for termination by SIGINT
pub const EXIT_INTERRUPTED: i32 = 130;

/// Options of a single fix run, resolved from CLI arguments and config
#[derive(Debug, Clone)]
pub struct FixOptions {
    pub target_dir: PathBuf,
    pub concurrency: usize,
    pub api_key: Option<String>,
    pub assume_yes: bool,
    pub dry_run: bool,
    pub output: Option<String>,
}

/// Lint, partition, confirm and dispatch; returns the process exit code
///
/// Steps:
/// - Runs the linter's auto-fix pass, then collects remaining violations
/// - Partitions violations into per-scope work units
/// - Shows the plan and asks for confirmation (unless `assume_yes`)
/// - Dispatches units to fix agents with bounded concurrency and retries
/// - Optionally writes a per-unit report
pub async fn run_fix(config: &Config, options: &FixOptions) -> anyhow::Result<i32> {
    let target = &options.target_dir;
    let linter = Linter::resolve(&config.lint);
    debug!("Resolved linter: {:?}", linter);

    linter.autofix(target).await?;
    let violations = linter.report(target).await?;

    if violations.is_empty() {
        info!("No remaining violations after auto-fix. Done!");
        return Ok(EXIT_SUCCESS);
    }

    let units = partition::partition_files(&violations, &PythonIndexer);
    print_plan(violations.len(), &units);

    if options.dry_run {
        info!("Dry run - not dispatching");
        return Ok(EXIT_SUCCESS);
    }

    if !options.assume_yes
        && !util::confirm("\nWould you like to continue?").context("Failed to read answer")?
    {
        info!("Aborted.");
        return Ok(EXIT_FAILURE);
    }

    let agent = DroidAgent::new(&config.agent, target.clone(), options.api_key.clone());
    if !agent.has_api_key() {
        agent.login().await?;
    }

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    let policy = RetryPolicy::from(&config.worker);
    debug!("Retry policy: {:?}", policy);
    let report = dispatch::dispatch(&units, options.concurrency, &agent, &policy, &shutdown).await;

    if let Some(path) = &options.output {
        write_output(path, &report)?;
    }

    Ok(summarize(&report))
}

/// The plan goes to stdout next to the prompt, whatever the log level
fn print_plan(violation_count: usize, units: &[WorkUnit]) {
    print!("{}", render::format_plan(violation_count, units));
}

/// Cancel `shutdown` on SIGINT/SIGTERM (Ctrl+C elsewhere)
fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            let (mut sigint, mut sigterm) =
                match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
                    (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
                    (Err(e), _) | (_, Err(e)) => {
                        warn!("Failed to install signal handlers: {}", e);
                        return;
                    }
                };
            tokio::select! {
                _ = sigint.recv() => warn!("Received SIGINT, stopping fix agents..."),
                _ = sigterm.recv() => warn!("Received SIGTERM, stopping fix agents..."),
            }
        }
        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await.ok();
            warn!("Received Ctrl+C, stopping fix agents...");
        }
        shutdown.cancel();
    });
}

/// Log the aggregate result and map it to an exit code
fn summarize(report: &DispatchReport) -> i32 {
    if report.interrupted {
        warn!("Interrupted, {} unit(s) not finished", report.cancelled.len());
        return EXIT_INTERRUPTED;
    }

    let failed: Vec<_> = report.failed().collect();
    if failed.is_empty() {
        info!("All {} work unit(s) fixed", report.outcomes.len());
        return EXIT_SUCCESS;
    }

    error!("{} work unit(s) failed:", failed.len());
    for outcome in failed {
        error!("  - {}", outcome.description);
    }
    EXIT_FAILURE
}

fn write_output(path: &str, report: &DispatchReport) -> anyhow::Result<()> {
    let content = if path.ends_with(".json") {
        let output = serde_json::json!({
            "generated_at": chrono::Utc::now().to_rfc3339(),
            "success": report.is_success(),
            "report": report,
        });
        serde_json::to_string_pretty(&output)?
    } else if path.ends_with(".md") {
        render::format_report(report)
    } else {
        anyhow::bail!("Output file must end with .md or .json");
    };

    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path))?;
    info!("Report written to {}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::worker::{UnitOutcome, UnitStatus};

    fn outcome(index: usize, status: UnitStatus) -> UnitOutcome {
        UnitOutcome {
            index,
            description: format!("unit {}", index),
            status,
            attempts: 1,
            backoff_secs: vec![],
            last_error: None,
            elapsed_secs: 0.1,
        }
    }

    #[test]
    fn test_summarize_exit_codes() {
        assert_eq!(summarize(&DispatchReport::default()), EXIT_SUCCESS);

        let ok = DispatchReport {
            outcomes: vec![outcome(0, UnitStatus::Succeeded)],
            ..Default::default()
        };
        assert_eq!(summarize(&ok), EXIT_SUCCESS);

        let failed = DispatchReport {
            outcomes: vec![
                outcome(0, UnitStatus::Succeeded),
                outcome(1, UnitStatus::ExhaustedRetries),
            ],
            ..Default::default()
        };
        assert_eq!(summarize(&failed), EXIT_FAILURE);

        let interrupted = DispatchReport {
            cancelled: vec!["unit 0".into()],
            interrupted: true,
            ..Default::default()
        };
        assert_eq!(summarize(&interrupted), EXIT_INTERRUPTED);
    }

    #[test]
    fn test_write_output_formats() {
        let dir = tempfile::tempdir().unwrap();
        let report = DispatchReport {
            outcomes: vec![outcome(0, UnitStatus::Succeeded)],
            ..Default::default()
        };

        let json_path = dir.path().join("report.json");
        write_output(json_path.to_str().unwrap(), &report).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["report"]["outcomes"][0]["status"], "succeeded");

        let md_path = dir.path().join("report.md");
        write_output(md_path.to_str().unwrap(), &report).unwrap();
        assert!(std::fs::read_to_string(&md_path).unwrap().starts_with("# Fix report"));

        assert!(write_output(dir.path().join("report.txt").to_str().unwrap(), &report).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_no_violations_is_trivial_success() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.lint.program = "true".into();
        config.lint.args = vec![];
        // Dispatch would need an agent; an empty report must return before that
        config.agent.program = "/nonexistent/droid".into();

        let options = FixOptions {
            target_dir: dir.path().to_path_buf(),
            concurrency: 4,
            api_key: None,
            assume_yes: true,
            dry_run: false,
            output: None,
        };
        assert_eq!(run_fix(&config, &options).await.unwrap(), EXIT_SUCCESS);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dry_run_plans_without_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.py");
        std::fs::write(&source, "def foo():\n    x = 1\n    print(x)\n").unwrap();
        let report = format!(
            r#"[{{"code":"F841","filename":"{0}","location":{{"row":2,"column":5}},"message":"unused"}},{{"code":"T201","filename":"{0}","location":{{"row":3,"column":5}},"message":"print"}}]"#,
            source.display()
        );

        let mut config = Config::default();
        config.lint.program = "sh".into();
        config.lint.args = vec!["-c".into(), format!("echo '{}'", report)];
        config.agent.program = "/nonexistent/droid".into();

        let options = FixOptions {
            target_dir: dir.path().to_path_buf(),
            concurrency: 2,
            api_key: None,
            assume_yes: false,
            dry_run: true,
            output: None,
        };
        assert_eq!(run_fix(&config, &options).await.unwrap(), EXIT_SUCCESS);
    }
}
