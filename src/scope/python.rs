//! Tree-sitter based scope indexer for Python sources

use super::{ScopeIndexer, sort_narrowest_first};
use crate::types::ScopeRange;
use std::cell::RefCell;
use tracing::{debug, trace};
use tree_sitter::{Node, Parser};

// Parsers are reused per thread instead of being rebuilt for every file.
thread_local! {
    static PYTHON_PARSER: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        // Ignore error here - parse() returns None if the language is unset
        let _ = p.set_language(&tree_sitter_python::LANGUAGE.into());
        p
    });
}

/// Indexes functions, methods and classes of Python modules
#[derive(Debug, Default, Clone, Copy)]
pub struct PythonIndexer;

impl ScopeIndexer for PythonIndexer {
    fn index(&self, content: &str) -> Vec<ScopeRange> {
        let Some(tree) = PYTHON_PARSER.with(|p| p.borrow_mut().parse(content, None)) else {
            debug!("Python parser produced no tree");
            return vec![];
        };

        let root = tree.root_node();
        if root.has_error() {
            debug!("Source has syntax errors, skipping scope indexing");
            return vec![];
        }

        let mut scopes = Vec::new();
        collect_scopes(&root, content, "", &mut scopes);
        sort_narrowest_first(&mut scopes);
        trace!("Python scopes: {:?}", scopes);
        scopes
    }
}

/// Walk children of `node`, recording named definitions under `prefix`
///
/// Any other node (decorators, if/for/with bodies, blocks) is transparent and
/// does not contribute a name segment.
fn collect_scopes(node: &Node, content: &str, prefix: &str, scopes: &mut Vec<ScopeRange>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        let name = match child.kind() {
            "function_definition" | "class_definition" => child
                .child_by_field_name("name")
                .map(|n| get_node_text(&n, content)),
            _ => None,
        };

        match name {
            Some(name) => {
                let qualified_name = if prefix.is_empty() {
                    name
                } else {
                    format!("{}.{}", prefix, name)
                };
                scopes.push(ScopeRange {
                    start_line: child.start_position().row as u32 + 1,
                    end_line: end_line(&child),
                    qualified_name: qualified_name.clone(),
                });
                collect_scopes(&child, content, &qualified_name, scopes);
            }
            None => collect_scopes(&child, content, prefix, scopes),
        }
    }
}

/// Last line (1-indexed) holding code of `node`
///
/// Comments are skipped, so a comment trailing a body stays outside the scope.
fn end_line(node: &Node) -> u32 {
    let mut cursor = node.walk();
    let code_end = node
        .children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .map(|child| end_line(&child))
        .max();

    code_end.unwrap_or_else(|| {
        let end = node.end_position();
        // A node ending at column 0 ends on the previous line
        if end.column == 0 && end.row > node.start_position().row {
            end.row as u32
        } else {
            end.row as u32 + 1
        }
    })
}

fn get_node_text(node: &Node, content: &str) -> String {
    content[node.start_byte()..node.end_byte()].to_string()
}
