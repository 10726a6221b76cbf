//! A function definition inside a parsed module.

use tree_sitter::Node;

use super::python::{breadth_first, ParsedModule};

/// Borrowed view of a `function_definition` node.
#[derive(Clone, Copy)]
pub struct FunctionNode<'m> {
    node: Node<'m>,
    module: &'m ParsedModule,
}

impl<'m> FunctionNode<'m> {
    pub(crate) fn new(node: Node<'m>, module: &'m ParsedModule) -> Self {
        Self { node, module }
    }

    pub fn node(&self) -> Node<'m> {
        self.node
    }

    pub fn module(&self) -> &'m ParsedModule {
        self.module
    }

    pub fn name(&self) -> &'m str {
        self.node
            .child_by_field_name("name")
            .map(|n| self.module.text(n))
            .unwrap_or("")
    }

    /// 1-based line of the `def` keyword.
    pub fn line(&self) -> u32 {
        self.node.start_position().row as u32 + 1
    }

    pub fn text_of(&self, node: Node<'_>) -> &'m str {
        self.module.text(node)
    }

    /// Ordinary positional-or-keyword parameters: those after any `/`
    /// marker and before `*`, `*args` or `**kwargs`.
    pub fn parameter_count(&self) -> usize {
        let Some(params) = self.node.child_by_field_name("parameters") else {
            return 0;
        };
        let mut count = 0;
        let mut cursor = params.walk();
        for child in params.named_children(&mut cursor) {
            match child.kind() {
                "positional_separator" => count = 0,
                "keyword_separator" | "list_splat_pattern" | "dictionary_splat_pattern" => break,
                "typed_parameter" => {
                    let splat = child.named_child(0).is_some_and(|inner| {
                        matches!(
                            inner.kind(),
                            "list_splat_pattern" | "dictionary_splat_pattern"
                        )
                    });
                    if splat {
                        break;
                    }
                    count += 1;
                }
                "identifier" | "default_parameter" | "typed_default_parameter" => count += 1,
                _ => {}
            }
        }
        count
    }

    /// Decorators attached through an enclosing `decorated_definition`.
    pub fn decorator_count(&self) -> usize {
        match self.node.parent() {
            Some(parent) if parent.kind() == "decorated_definition" => {
                let mut cursor = parent.walk();
                let n = parent
                    .named_children(&mut cursor)
                    .filter(|c| c.kind() == "decorator")
                    .count();
                n
            }
            _ => 0,
        }
    }

    pub fn body(&self) -> Option<Node<'m>> {
        self.node.child_by_field_name("body")
    }

    /// Top-level statements in the body; comments are not statements.
    pub fn body_statement_count(&self) -> usize {
        let Some(body) = self.body() else {
            return 0;
        };
        let mut cursor = body.walk();
        let n = body
            .named_children(&mut cursor)
            .filter(|c| c.kind() != "comment")
            .count();
        n
    }

    /// Every node of the function (signature and body), breadth-first.
    pub fn descendants(&self) -> Vec<Node<'m>> {
        breadth_first(self.node)
    }
}
