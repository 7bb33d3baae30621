use anyhow::{Context, bail};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use toml_scaffold::TomlScaffold;
use tracing::{debug, info};

#[derive(Deserialize, Serialize, Debug, Clone, Default, JsonSchema, TomlScaffold)]
pub struct Config {
    /// Linter invocation
    #[serde(default)]
    pub lint: LintConfig,
    /// Fix agent invocation
    #[serde(default)]
    pub agent: AgentConfig,
    /// Dispatch pool and retry policy
    #[serde(default)]
    pub worker: WorkerConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema, TomlScaffold)]
pub struct LintConfig {
    /// Launcher executable, resolved on PATH once per run
    #[serde(default = "default_lint_program")]
    pub program: String,
    /// Arguments selecting the check command (target and output flags are appended)
    #[serde(default = "default_lint_args")]
    pub args: Vec<String>,
    /// Run a `--fix` pass before collecting the remaining violations
    #[serde(default = "default_true")]
    pub autofix: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema, TomlScaffold)]
pub struct AgentConfig {
    /// Fix agent executable
    #[serde(default = "default_agent_program")]
    pub program: String,
    /// Autonomy level passed to `exec --auto`
    #[serde(default = "default_autonomy")]
    pub autonomy: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema, TomlScaffold)]
pub struct WorkerConfig {
    /// Number of work units fixed in parallel
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Attempts per work unit before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay after the first failed attempt in seconds, doubled on every further failure
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: f64,
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            program: default_lint_program(),
            args: default_lint_args(),
            autofix: true,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            program: default_agent_program(),
            autonomy: default_autonomy(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_attempts: default_max_attempts(),
            backoff_base_secs: default_backoff_base_secs(),
        }
    }
}

fn default_lint_program() -> String {
    "uvx".into()
}

fn default_lint_args() -> Vec<String> {
    vec!["ruff".into(), "check".into()]
}

fn default_true() -> bool {
    true
}

fn default_agent_program() -> String {
    "droid".into()
}

fn default_autonomy() -> String {
    "medium".into()
}

pub fn default_concurrency() -> usize {
    4
}

fn default_max_attempts() -> u32 {
    5
}

fn default_backoff_base_secs() -> f64 {
    1.0
}

impl Config {
    /// Load config from `path`, using defaults when the file does not exist
    ///
    /// `overrides` are `dotted.key=value` pairs applied to the TOML document
    /// before deserialization.
    pub fn load(path: &str, overrides: &[String]) -> anyhow::Result<Self> {
        let mut table = if Path::new(path).exists() {
            let content =
                fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
            toml::from_str::<toml::Table>(&content)
                .with_context(|| format!("Failed to parse {}", path))?
        } else {
            debug!("Config file {} not found, using defaults", path);
            toml::Table::new()
        };

        for entry in overrides {
            apply_override(&mut table, entry)?;
        }

        let config: Config = toml::Value::Table(table)
            .try_into()
            .with_context(|| format!("Invalid config in {}", path))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.worker.concurrency == 0 {
            bail!("worker.concurrency must be at least 1");
        }
        if self.worker.max_attempts == 0 {
            bail!("worker.max_attempts must be at least 1");
        }
        // Must convert to a Duration without panicking later
        if let Err(e) = Duration::try_from_secs_f64(self.worker.backoff_base_secs) {
            bail!(
                "worker.backoff_base_secs must be a non-negative number of seconds ({}): {}",
                self.worker.backoff_base_secs,
                e
            );
        }
        Ok(())
    }
}

/// Write a commented default config, refusing to clobber an existing file
pub fn init_config(path: &str, override_existing: bool) -> anyhow::Result<()> {
    if Path::new(path).exists() && !override_existing {
        bail!("{} already exists (use --override to replace it)", path);
    }
    let content = Config::default()
        .to_scaffold()
        .map_err(|e| anyhow::anyhow!("Failed to render default config: {}", e))?;
    fs::write(path, content).with_context(|| format!("Failed to write {}", path))?;
    info!("Config written to {}", path);
    Ok(())
}

/// Apply one `dotted.key=value` override; values parse as TOML, else as strings
fn apply_override(table: &mut toml::Table, entry: &str) -> anyhow::Result<()> {
    let Some((key, raw)) = entry.split_once('=') else {
        bail!("Invalid config override '{}', expected key=value", entry);
    };
    let path: Vec<&str> = key.trim().split('.').collect();
    if path.iter().any(|segment| segment.is_empty()) {
        bail!("Invalid config override key '{}'", key);
    }

    let value = parse_override_value(raw.trim());
    debug!("Config override {} = {:?}", key, value);

    let Some((last, parents)) = path.split_last() else {
        bail!("Invalid config override key '{}'", key);
    };
    let mut current = table;
    for segment in parents {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        current = match entry {
            toml::Value::Table(t) => t,
            _ => bail!("Config override '{}': '{}' is not a table", key, segment),
        };
    }
    current.insert(last.to_string(), value);
    Ok(())
}

fn parse_override_value(raw: &str) -> toml::Value {
    toml::from_str::<toml::Table>(&format!("value = {}", raw))
        .ok()
        .and_then(|mut t| t.remove("value"))
        .unwrap_or_else(|| toml::Value::String(raw.to_string()))
}
