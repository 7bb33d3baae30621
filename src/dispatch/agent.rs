use crate::config::AgentConfig;
use crate::types::WorkUnit;
use crate::util;
use anyhow::{Context, bail};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, trace};

/// Environment variable carrying the fix agent credential
pub const API_KEY_ENV: &str = "FACTORY_API_KEY";

/// Lines of agent stderr kept as the failure diagnostic
const DIAGNOSTIC_LINES: usize = 5;

/// Outcome of a single fix agent invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptResult {
    Success,
    Failure { diagnostic: String },
}

impl AttemptResult {
    pub fn failure(diagnostic: impl Into<String>) -> Self {
        Self::Failure {
            diagnostic: diagnostic.into(),
        }
    }
}

/// Something that can try to fix one work unit
///
/// Implementations report failures through [`AttemptResult`] rather than
/// errors; retrying is the caller's job.
#[async_trait]
pub trait FixAgent: Send + Sync {
    async fn attempt(&self, unit: &WorkUnit, prompt: &str) -> AttemptResult;
}

/// Runs `droid exec` as a child process per attempt
#[derive(Debug, Clone)]
pub struct DroidAgent {
    program: PathBuf,
    autonomy: String,
    target_dir: PathBuf,
    api_key: Option<String>,
}

impl DroidAgent {
    pub fn new(config: &AgentConfig, target_dir: PathBuf, api_key: Option<String>) -> Self {
        Self {
            program: util::resolve_program(&config.program),
            autonomy: config.autonomy.clone(),
            target_dir,
            api_key,
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Interactive `droid auth login`, used when no API key was supplied
    pub async fn login(&self) -> anyhow::Result<()> {
        info!("No API key provided, starting interactive login");
        let status = Command::new(&self.program)
            .args(["auth", "login"])
            .status()
            .await
            .with_context(|| format!("Failed to execute {}", self.program.display()))?;
        if !status.success() {
            bail!("{} auth login exited with {}", self.program.display(), status);
        }
        Ok(())
    }

    fn command(&self, prompt: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("exec")
            .args(["--auto", &self.autonomy])
            .arg("--cwd")
            .arg(&self.target_dir)
            .args(["-o", "json"])
            .arg(prompt)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping an in-flight attempt (shutdown) must not leave the agent running
            .kill_on_drop(true);
        if let Some(key) = &self.api_key {
            cmd.env(API_KEY_ENV, key);
        }
        cmd
    }
}

#[async_trait]
impl FixAgent for DroidAgent {
    async fn attempt(&self, unit: &WorkUnit, prompt: &str) -> AttemptResult {
        debug!("Running {} for {}:{}", self.program.display(), unit.file, unit.scope);
        match self.command(prompt).output().await {
            Ok(output) if output.status.success() => {
                trace!("Agent stdout: {}", String::from_utf8_lossy(&output.stdout));
                AttemptResult::Success
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                AttemptResult::failure(format!(
                    "exited with {}: {}",
                    output.status,
                    util::tail_lines(&stderr, DIAGNOSTIC_LINES)
                ))
            }
            Err(e) => AttemptResult::failure(format!(
                "failed to execute {}: {}",
                self.program.display(),
                e
            )),
        }
    }
}
