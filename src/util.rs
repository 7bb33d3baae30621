use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolve an executable name against `PATH`
///
/// Names containing a path separator are returned unchanged. If nothing on
/// `PATH` matches, the bare name is returned and spawning will report the
/// error.
pub fn resolve_program(name: &str) -> PathBuf {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return candidate.to_path_buf();
    }

    let resolved = std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths)
            .map(|dir| dir.join(name))
            .find(|path| path.is_file())
    });

    match resolved {
        Some(path) => {
            debug!("Resolved {} to {}", name, path.display());
            path
        }
        None => {
            debug!("{} not found on PATH", name);
            candidate.to_path_buf()
        }
    }
}

/// Ask a yes/no question on stdin; only `y` or `yes` count as consent
pub fn confirm(question: &str) -> std::io::Result<bool> {
    let mut stdout = std::io::stdout();
    write!(stdout, "{} [y/N] ", question)?;
    stdout.flush()?;

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(is_affirmative(&answer))
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Keep the last `max_lines` non-empty lines of process output
pub fn tail_lines(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}
