use std::collections::BTreeSet;

/// Scope name used for violations outside every named block
pub const MODULE_SCOPE: &str = "<module>";

/// A single lint violation reported by the linter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// File path as reported by the linter
    pub file: String,
    /// Line (1-indexed)
    pub line: u32,
    /// Column (1-indexed)
    pub column: u32,
    /// Rule code, e.g. F841
    pub code: String,
    /// Human-readable message
    pub message: String,
}

/// Line range of a named block (function, method or class)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeRange {
    /// First line (1-indexed)
    pub start_line: u32,
    /// Last line (inclusive)
    pub end_line: u32,
    /// Dot-joined path of enclosing named blocks, e.g. `Outer.inner`
    pub qualified_name: String,
}

impl ScopeRange {
    pub fn contains(&self, line: u32) -> bool {
        self.start_line <= line && line <= self.end_line
    }

    pub fn line_span(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line)
    }
}

/// Violations sharing one file and one scope, fixed by a single agent call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    pub file: String,
    pub scope: String,
    /// Never empty
    pub violations: Vec<Violation>,
    /// Distinct codes, sorted
    pub codes: BTreeSet<String>,
}

impl WorkUnit {
    /// Build a unit from a non-empty group of violations
    pub fn new(file: String, scope: String, violations: Vec<Violation>) -> Self {
        debug_assert!(!violations.is_empty(), "work unit without violations");
        let codes = violations.iter().map(|v| v.code.clone()).collect();
        Self {
            file,
            scope,
            violations,
            codes,
        }
    }

    /// Comma-separated codes in sorted order
    pub fn codes_csv(&self, sep: &str) -> String {
        self.codes.iter().cloned().collect::<Vec<_>>().join(sep)
    }

    pub fn description(&self) -> String {
        format!(
            "Fix {} violation(s) [{}] in {}:{}",
            self.violations.len(),
            self.codes_csv(", "),
            self.file,
            self.scope
        )
    }
}

#[cfg(test)]
pub(crate) fn violation(file: &str, line: u32, code: &str) -> Violation {
    Violation {
        file: file.into(),
        line,
        column: 1,
        code: code.into(),
        message: format!("{} at line {}", code, line),
    }
}
