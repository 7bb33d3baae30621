//! Lexical scope indexing
//!
//! A scope indexer turns a file's text into the line ranges of its named
//! blocks. Violations are later mapped onto the narrowest range containing
//! their line, so indexers must return ranges sorted narrowest-first.

pub mod python;

use crate::types::{MODULE_SCOPE, ScopeRange};
use std::path::Path;
use tracing::{debug, warn};

pub use python::PythonIndexer;

/// Provides the named block ranges of a source file
pub trait ScopeIndexer: Send + Sync {
    /// Index `content`, returning ranges sorted by ascending line span.
    ///
    /// Content that cannot be parsed yields an empty list.
    fn index(&self, content: &str) -> Vec<ScopeRange>;
}

/// Read and index a file, falling back to no scopes if it cannot be read
pub fn index_file(indexer: &dyn ScopeIndexer, path: &Path) -> Vec<ScopeRange> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let scopes = indexer.index(&content);
            debug!("Indexed {} scopes in {}", scopes.len(), path.display());
            scopes
        }
        Err(e) => {
            warn!(
                "Failed to read {}: {}, treating all violations as {}",
                path.display(),
                e,
                MODULE_SCOPE
            );
            vec![]
        }
    }
}

/// Sort ranges narrowest-first, keeping document order among equal spans
pub fn sort_narrowest_first(scopes: &mut [ScopeRange]) {
    scopes.sort_by_key(ScopeRange::line_span);
}

/// Name of the first scope containing `line`, or `<module>`
///
/// `scopes` must be sorted narrowest-first for the result to be the
/// innermost enclosing block.
pub fn scope_for_line(scopes: &[ScopeRange], line: u32) -> &str {
    scopes
        .iter()
        .find(|s| s.contains(line))
        .map(|s| s.qualified_name.as_str())
        .unwrap_or(MODULE_SCOPE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start_line: u32, end_line: u32, name: &str) -> ScopeRange {
        ScopeRange {
            start_line,
            end_line,
            qualified_name: name.into(),
        }
    }

    #[test]
    fn test_scope_for_line_prefers_narrowest() {
        let mut scopes = vec![range(1, 50, "Outer"), range(10, 20, "Outer.inner")];
        sort_narrowest_first(&mut scopes);
        assert_eq!(scope_for_line(&scopes, 15), "Outer.inner");
        assert_eq!(scope_for_line(&scopes, 5), "Outer");
        assert_eq!(scope_for_line(&scopes, 50), "Outer");
    }

    #[test]
    fn test_scope_for_line_unscoped() {
        let scopes = vec![range(3, 8, "foo")];
        assert_eq!(scope_for_line(&scopes, 1), MODULE_SCOPE);
        assert_eq!(scope_for_line(&scopes, 9), MODULE_SCOPE);
        assert_eq!(scope_for_line(&[], 4), MODULE_SCOPE);
    }

    #[test]
    fn test_sort_is_stable_for_equal_spans() {
        let mut scopes = vec![
            range(1, 30, "A"),
            range(5, 6, "A.b"),
            range(8, 9, "A.c"),
        ];
        sort_narrowest_first(&mut scopes);
        let names: Vec<_> = scopes.iter().map(|s| s.qualified_name.as_str()).collect();
        assert_eq!(names, vec!["A.b", "A.c", "A"]);
    }

    #[test]
    fn test_index_file_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let scopes = index_file(&PythonIndexer, &dir.path().join("missing.py"));
        assert!(scopes.is_empty());
    }
}
