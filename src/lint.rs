use crate::config::LintConfig;
use crate::types::Violation;
use crate::util;
use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, trace, warn};

/// Code used when the linter reports a violation without one (e.g. syntax errors)
const UNKNOWN_CODE: &str = "?";

/// Linter collaborator with its executable resolved for the current run
#[derive(Debug, Clone)]
pub struct Linter {
    program: PathBuf,
    args: Vec<String>,
    autofix: bool,
}

impl Linter {
    pub fn resolve(config: &LintConfig) -> Self {
        Self {
            program: util::resolve_program(&config.program),
            args: config.args.clone(),
            autofix: config.autofix,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    /// Run the linter's own auto-fix pass; its output is discarded
    pub async fn autofix(&self, target: &Path) -> anyhow::Result<()> {
        if !self.autofix {
            debug!("Auto-fix disabled, skipping");
            return Ok(());
        }
        info!("Running ruff --fix on {}", target.display());
        let output = self
            .command()
            .arg("--fix")
            .arg(target)
            .output()
            .await
            .with_context(|| format!("Failed to execute {}", self.program.display()))?;
        trace!("Auto-fix exited with {}", output.status);
        Ok(())
    }

    /// Collect the violations that remain in `target`
    pub async fn report(&self, target: &Path) -> anyhow::Result<Vec<Violation>> {
        debug!("Collecting lint report for {}", target.display());
        let output = self
            .command()
            .args(["--output-format", "json"])
            .arg(target)
            .output()
            .await
            .with_context(|| format!("Failed to execute {}", self.program.display()))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() && !output.status.success() {
            warn!(
                "Linter exited with {} and no report: {}",
                output.status,
                util::tail_lines(&String::from_utf8_lossy(&output.stderr), 5)
            );
        }

        let violations = parse_report(&stdout)?;
        debug!("Linter reported {} violations", violations.len());
        Ok(violations)
    }
}

#[derive(Debug)]
pub enum ReportError {
    Json(serde_json::Error),
    InvalidLocation { file: String, row: u32 },
}

impl std::fmt::Display for ReportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportError::Json(e) => write!(f, "Failed to parse lint report: {}", e),
            ReportError::InvalidLocation { file, row } => {
                write!(f, "Invalid location in lint report: {} row {}", file, row)
            }
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReportError::Json(e) => Some(e),
            ReportError::InvalidLocation { .. } => None,
        }
    }
}

#[derive(Deserialize)]
struct RawViolation {
    filename: String,
    location: RawLocation,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct RawLocation {
    row: u32,
    #[serde(default)]
    column: u32,
}

/// Parse the linter's JSON report; empty output means no violations
pub fn parse_report(stdout: &str) -> Result<Vec<Violation>, ReportError> {
    if stdout.trim().is_empty() {
        return Ok(vec![]);
    }

    let raw: Option<Vec<RawViolation>> = serde_json::from_str(stdout).map_err(ReportError::Json)?;

    raw.unwrap_or_default()
        .into_iter()
        .map(|v| {
            if v.location.row == 0 {
                return Err(ReportError::InvalidLocation {
                    file: v.filename,
                    row: v.location.row,
                });
            }
            Ok(Violation {
                file: v.filename,
                line: v.location.row,
                column: v.location.column,
                code: v.code.unwrap_or_else(|| UNKNOWN_CODE.to_string()),
                message: v.message,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_report() {
        assert!(parse_report("").unwrap().is_empty());
        assert!(parse_report("  \n").unwrap().is_empty());
        assert!(parse_report("[]").unwrap().is_empty());
        assert!(parse_report("null").unwrap().is_empty());
    }

    #[test]
    fn test_parse_ruff_report() {
        let report = r#"[
          {
            "cell": null,
            "code": "F841",
            "end_location": {"column": 11, "row": 5},
            "filename": "/repo/a.py",
            "fix": null,
            "location": {"column": 5, "row": 5},
            "message": "Local variable `x` is assigned to but never used",
            "noqa_row": 5,
            "url": "https://docs.astral.sh/ruff/rules/unused-variable"
          },
          {
            "code": null,
            "filename": "/repo/b.py",
            "location": {"column": 1, "row": 2},
            "message": "SyntaxError: Expected an expression"
          }
        ]"#;

        let violations = parse_report(report).unwrap();
        assert_eq!(
            violations,
            vec![
                Violation {
                    file: "/repo/a.py".into(),
                    line: 5,
                    column: 5,
                    code: "F841".into(),
                    message: "Local variable `x` is assigned to but never used".into(),
                },
                Violation {
                    file: "/repo/b.py".into(),
                    line: 2,
                    column: 1,
                    code: "?".into(),
                    message: "SyntaxError: Expected an expression".into(),
                },
            ]
        );
    }

    #[test]
    fn test_parse_rejects_malformed_report() {
        assert!(matches!(parse_report("{not json"), Err(ReportError::Json(_))));
        assert!(matches!(
            parse_report(r#"[{"filename": "a.py", "message": "m"}]"#),
            Err(ReportError::Json(_))
        ));
        assert!(matches!(
            parse_report(r#"[{"filename": "a.py", "location": {"row": 0, "column": 0}, "code": "E", "message": "m"}]"#),
            Err(ReportError::InvalidLocation { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_report_from_stub_linter() {
        let dir = tempfile::tempdir().unwrap();
        let linter = Linter {
            program: PathBuf::from("sh"),
            args: vec![
                "-c".into(),
                r#"echo '[{"code":"T201","filename":"x.py","location":{"row":3,"column":1},"message":"print found"}]'"#.into(),
            ],
            autofix: true,
        };
        let violations = linter.report(dir.path()).await.unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].code, "T201");
        assert_eq!(violations[0].line, 3);
    }
}
