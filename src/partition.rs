use crate::scope::{self, ScopeIndexer, scope_for_line};
use crate::types::{ScopeRange, Violation, WorkUnit};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, trace};

/// Split violations into work units, indexing each file from disk
pub fn partition_files(violations: &[Violation], indexer: &dyn ScopeIndexer) -> Vec<WorkUnit> {
    partition(violations, |file| scope::index_file(indexer, Path::new(file)))
}

/// Group violations by file, then by the narrowest scope containing them
///
/// `scopes_for` is called once per distinct file and must return ranges
/// sorted narrowest-first. Files appear in first-seen order, and scopes in
/// first-seen order within a file, so the output is deterministic for a given
/// input.
pub fn partition<F>(violations: &[Violation], mut scopes_for: F) -> Vec<WorkUnit>
where
    F: FnMut(&str) -> Vec<ScopeRange>,
{
    debug!("Partitioning {} violations", violations.len());

    let by_file = group_in_order(violations, |v| v.file.as_str());

    let mut units = Vec::new();
    for (file, file_violations) in by_file {
        let scopes = scopes_for(file);
        trace!("File {} has {} scopes", file, scopes.len());

        let by_scope = group_in_order(file_violations, |v| scope_for_line(&scopes, v.line));
        debug!("File {} split into {} scope(s)", file, by_scope.len());

        for (scope, scope_violations) in by_scope {
            let unit = WorkUnit::new(
                file.to_string(),
                scope.to_string(),
                scope_violations.into_iter().cloned().collect(),
            );
            trace!("Created unit: {}", unit.description());
            units.push(unit);
        }
    }
    units
}

/// Stable group-by preserving the order in which keys are first seen
fn group_in_order<'a, 'k, I, K>(items: I, key: K) -> Vec<(&'k str, Vec<&'a Violation>)>
where
    I: IntoIterator<Item = &'a Violation>,
    K: Fn(&'a Violation) -> &'k str,
{
    let mut groups: Vec<(&'k str, Vec<&'a Violation>)> = Vec::new();
    let mut index: HashMap<&'k str, usize> = HashMap::new();
    for item in items {
        let k = key(item);
        let slot = *index.entry(k).or_insert_with(|| {
            groups.push((k, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(item);
    }
    groups
}
