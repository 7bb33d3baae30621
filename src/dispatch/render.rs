use super::pool::DispatchReport;
use super::worker::UnitStatus;
use crate::types::WorkUnit;

const ELAPSED_TIME_PRECISION: usize = 2;

/// Build the instruction handed to the fix agent for one unit
pub fn build_prompt(unit: &WorkUnit) -> String {
    let mut prompt = String::from(
        "IMPORTANT: You are assigned ONLY the violations listed below. \
        Do NOT fix, modify, or address any other issues in the file. \
        Do NOT add docstrings, type annotations, imports, or any other changes \
        unless they are explicitly listed below. \
        Leave everything else exactly as-is.\n\n",
    );
    prompt.push_str(&format!("File: {}\n", unit.file));
    prompt.push_str(&format!("Scope: {}\n\n", unit.scope));
    prompt.push_str("Violations to fix (and NOTHING else):\n");
    for v in &unit.violations {
        prompt.push_str(&format!("  - {} (line {}): {}\n", v.code, v.line, v.message));
    }
    prompt.push_str(&format!(
        "\nVerify with: `uvx ruff check --select {} {}`",
        unit.codes_csv(","),
        unit.file
    ));
    prompt
}

/// Render the work units awaiting confirmation
pub fn format_plan(violation_count: usize, units: &[WorkUnit]) -> String {
    let mut output = format!(
        "Found {} linter violation(s), will spin up {} fix agent(s) to fix them.\n",
        violation_count,
        units.len()
    );
    for unit in units {
        output.push_str(&format!("  - {}\n", unit.description()));
    }
    output
}

/// Render dispatch outcomes as Markdown
pub fn format_report(report: &DispatchReport) -> String {
    let mut output = String::from("# Fix report\n\n");
    output.push_str(&format!(
        "- Succeeded: {}\n- Failed: {}\n- Cancelled: {}\n",
        report.succeeded().count(),
        report.failed().count(),
        report.cancelled.len()
    ));
    if report.interrupted {
        output.push_str("\n**Run was interrupted.**\n");
    }

    for outcome in &report.outcomes {
        let status = match outcome.status {
            UnitStatus::Succeeded => "succeeded",
            UnitStatus::ExhaustedRetries => "failed",
        };
        output.push_str(&format!("\n## {}\n\n", outcome.description));
        output.push_str(&format!(
            "- Status: {} after {} attempt(s) ({:.prec$}s)\n",
            status,
            outcome.attempts,
            outcome.elapsed_secs,
            prec = ELAPSED_TIME_PRECISION
        ));
        if let Some(error) = &outcome.last_error {
            let error = error.trim();
            if !error.is_empty() {
                output.push_str(&format!("- Last error: {}\n", error));
            }
        }
    }

    if !report.cancelled.is_empty() {
        output.push_str("\n## Cancelled\n\n");
        for description in &report.cancelled {
            output.push_str(&format!("- {}\n", description));
        }
    }
    output.trim_end().to_string()
}
