//! Python parser using native tree-sitter.
//!
//! Walks the concrete syntax tree directly instead of compiling queries, so
//! partially broken test files still yield whatever functions and imports
//! parse cleanly.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use sergeant_core::errors::ParseError;
use tree_sitter::{Node, Parser, Tree};

use super::function::FunctionNode;

/// Python parser wrapping a tree-sitter `Parser` configured for Python.
pub struct PythonParser {
    parser: Parser,
}

impl PythonParser {
    pub fn new() -> Result<Self, ParseError> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| ParseError::GrammarNotLoaded {
                message: e.to_string(),
            })?;
        Ok(Self { parser })
    }

    /// Read and parse a file from disk.
    pub fn parse_file(&mut self, path: &Path) -> Result<ParsedModule, ParseError> {
        let source = std::fs::read_to_string(path).map_err(|e| ParseError::ReadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        self.parse_source(source, path)
    }

    /// Parse in-memory source attributed to `path`.
    pub fn parse_source(
        &mut self,
        source: String,
        path: &Path,
    ) -> Result<ParsedModule, ParseError> {
        let tree = self
            .parser
            .parse(&source, None)
            .ok_or_else(|| ParseError::TreeSitterError {
                path: path.to_path_buf(),
                message: "parser returned no tree".to_string(),
            })?;
        Ok(ParsedModule {
            tree,
            source,
            path: path.to_path_buf(),
        })
    }
}

/// A parsed Python module: the syntax tree plus the source it borrows text from.
pub struct ParsedModule {
    tree: Tree,
    source: String,
    path: PathBuf,
}

impl ParsedModule {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Source text covered by `node`. Empty for nodes outside the source.
    pub fn text(&self, node: Node<'_>) -> &str {
        self.source.get(node.byte_range()).unwrap_or("")
    }

    /// True when the tree contains ERROR or MISSING nodes.
    pub fn has_errors(&self) -> bool {
        self.root().has_error()
    }

    /// Every function definition in breadth-first order, nested ones included.
    pub fn functions(&self) -> Vec<FunctionNode<'_>> {
        breadth_first(self.root())
            .into_iter()
            .filter(|n| n.kind() == "function_definition")
            .map(|n| FunctionNode::new(n, self))
            .collect()
    }

    /// Test functions (`test_*`) in breadth-first order.
    pub fn test_functions(&self) -> Vec<FunctionNode<'_>> {
        self.functions()
            .into_iter()
            .filter(|f| f.name().starts_with("test_"))
            .collect()
    }

    /// First function with the given name in breadth-first order.
    pub fn find_function(&self, name: &str) -> Option<FunctionNode<'_>> {
        self.functions().into_iter().find(|f| f.name() == name)
    }

    /// True if the module defines any function whose name does not look
    /// like a test (`test_*`, `Test*`, or containing "test" in any case).
    pub fn defines_non_test_functions(&self) -> bool {
        self.functions().iter().any(|f| !is_test_like_name(f.name()))
    }

    /// Module names referenced by `import x`, `from x import y`, and
    /// `__import__("x")`, deduplicated in first-seen order. Relative imports
    /// contribute their module part with the leading dots removed; a bare
    /// `from . import y` contributes nothing.
    pub fn imported_modules(&self) -> Vec<String> {
        self.imported_modules_in(self.root())
    }

    /// Same as [`ParsedModule::imported_modules`], restricted to `scope`.
    pub fn imported_modules_in(&self, scope: Node<'_>) -> Vec<String> {
        let mut modules: Vec<String> = Vec::new();
        let mut push = |m: &str| {
            let m = m.trim_start_matches('.');
            if !m.is_empty() && !modules.iter().any(|existing| existing == m) {
                modules.push(m.to_string());
            }
        };

        for node in breadth_first(scope) {
            match node.kind() {
                "import_statement" => {
                    let mut cursor = node.walk();
                    for child in node.named_children(&mut cursor) {
                        match child.kind() {
                            "dotted_name" => push(self.text(child)),
                            "aliased_import" => {
                                if let Some(name) = child.child_by_field_name("name") {
                                    push(self.text(name));
                                }
                            }
                            _ => {}
                        }
                    }
                }
                "import_from_statement" => {
                    if let Some(module) = node.child_by_field_name("module_name") {
                        match module.kind() {
                            "dotted_name" => push(self.text(module)),
                            "relative_import" => {
                                let mut cursor = module.walk();
                                let dotted = module
                                    .named_children(&mut cursor)
                                    .find(|c| c.kind() == "dotted_name");
                                if let Some(dotted) = dotted {
                                    push(self.text(dotted));
                                }
                            }
                            _ => {}
                        }
                    }
                }
                "call" => {
                    let is_dunder_import = node
                        .child_by_field_name("function")
                        .is_some_and(|f| f.kind() == "identifier" && self.text(f) == "__import__");
                    if is_dunder_import {
                        if let Some(arg) = first_argument(node) {
                            if arg.kind() == "string" {
                                push(&string_literal_value(self.text(arg)));
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        modules
    }
}

/// Test-like names: `test_*`, `Test*`, or containing "test" in any case.
pub fn is_test_like_name(name: &str) -> bool {
    name.starts_with("test_") || name.starts_with("Test") || name.to_lowercase().contains("test")
}

/// All descendants of `root` (inclusive) in breadth-first order.
pub fn breadth_first(root: Node<'_>) -> Vec<Node<'_>> {
    let mut out = Vec::new();
    let mut queue = VecDeque::from([root]);
    while let Some(node) = queue.pop_front() {
        out.push(node);
        for i in 0..node.child_count() {
            if let Some(child) = node.child(i) {
                queue.push_back(child);
            }
        }
    }
    out
}

/// First named, non-comment argument of a call node.
pub fn first_argument(call: Node<'_>) -> Option<Node<'_>> {
    let args = call.child_by_field_name("arguments")?;
    let mut cursor = args.walk();
    let first = args
        .named_children(&mut cursor)
        .find(|c| c.kind() != "comment");
    first
}

/// Strip prefix letters and quotes from a Python string literal.
fn string_literal_value(raw: &str) -> String {
    let body = raw.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if let Some(inner) = body
            .strip_prefix(quote)
            .and_then(|b| b.strip_suffix(quote))
        {
            return inner.to_string();
        }
    }
    body.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> ParsedModule {
        let mut parser = PythonParser::new().unwrap();
        parser
            .parse_source(src.to_string(), Path::new("tests/test_sample.py"))
            .unwrap()
    }

    #[test]
    fn imports_cover_all_three_forms() {
        let module = parse(
            r#"
import os, mypkg.core as core
from .helpers import build
from . import sibling
from app.models import User
mod = __import__("dynamic_mod")
"#,
        );
        assert_eq!(
            module.imported_modules(),
            vec!["os", "mypkg.core", "helpers", "app.models", "dynamic_mod"]
        );
    }

    #[test]
    fn imports_are_deduplicated() {
        let module = parse("import json\nimport json\nfrom json import loads\n");
        assert_eq!(module.imported_modules(), vec!["json"]);
    }

    #[test]
    fn test_functions_are_breadth_first() {
        let module = parse(
            r#"
class TestGroup:
    def test_inner(self):
        pass

def test_outer():
    pass

def helper():
    pass
"#,
        );
        let names: Vec<&str> = module.test_functions().iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["test_outer", "test_inner"]);
    }

    #[test]
    fn non_test_function_detection() {
        assert!(parse("def compute():\n    return 1\n").defines_non_test_functions());
        assert!(!parse("def test_a():\n    pass\ndef my_testing_helper():\n    pass\n")
            .defines_non_test_functions());
    }

    #[test]
    fn string_literal_prefixes_and_quotes_are_stripped() {
        assert_eq!(string_literal_value("'abc'"), "abc");
        assert_eq!(string_literal_value("r\"abc\""), "abc");
        assert_eq!(string_literal_value("'''abc'''"), "abc");
    }

    #[test]
    fn broken_source_still_parses() {
        let module = parse("def test_ok():\n    assert True\n\ndef broken(:\n");
        assert!(module.has_errors());
        assert!(module.find_function("test_ok").is_some());
    }
}
