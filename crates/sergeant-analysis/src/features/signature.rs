//! Static per-test features: mock assertion count, exception pattern and
//! structural signature.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sergeant_core::errors::AnalysisError;
use tree_sitter::Node;

use crate::parsers::FunctionNode;

/// Mock verification methods counted as mock assertions.
pub const MOCK_ASSERTIONS: &[&str] = &[
    "assert_called_once",
    "assert_called_with",
    "assert_has_calls",
    "assert_any_call",
    "assert_called_once_with",
    "assert_not_called",
    "assert_called",
    "assert_called_times",
];

/// Static features of one test function.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestFeatureSignature {
    pub mock_assertion_count: usize,
    /// Sorted, deduplicated, `|`-joined exception tokens.
    pub exception_pattern: String,
    /// `func:NAME|params:N|decorators:N|statements:N|mocks:N[|exceptions:P]`
    pub structural_signature: String,
}

/// Derives a [`TestFeatureSignature`] from a parsed test function.
#[derive(Debug, Default, Clone, Copy)]
pub struct FeatureBuilder;

impl FeatureBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(&self, function: &FunctionNode<'_>) -> Result<TestFeatureSignature, AnalysisError> {
        let mock_assertion_count = count_mock_assertions(function)?;
        let exception_pattern = exception_pattern(function)?;
        let structural_signature =
            structural_signature(function, mock_assertion_count, &exception_pattern);
        Ok(TestFeatureSignature {
            mock_assertion_count,
            exception_pattern,
            structural_signature,
        })
    }
}

fn callee<'m>(function: &FunctionNode<'m>, call: Node<'m>) -> Result<Node<'m>, AnalysisError> {
    call.child_by_field_name("function")
        .ok_or_else(|| AnalysisError::MalformedNode {
            test_name: function.name().to_string(),
            message: format!("call without callee at line {}", call.start_position().row + 1),
        })
}

/// Name a call is made through: the attribute of `x.name(...)` or the
/// identifier of `name(...)`.
fn call_name<'m>(function: &FunctionNode<'m>, callee: Node<'m>) -> Option<&'m str> {
    match callee.kind() {
        "identifier" => Some(function.text_of(callee)),
        "attribute" => callee
            .child_by_field_name("attribute")
            .map(|a| function.text_of(a)),
        _ => None,
    }
}

pub fn count_mock_assertions(function: &FunctionNode<'_>) -> Result<usize, AnalysisError> {
    let mut count = 0;
    for node in function.descendants() {
        if node.kind() != "call" {
            continue;
        }
        let target = callee(function, node)?;
        if call_name(function, target).is_some_and(|name| MOCK_ASSERTIONS.contains(&name)) {
            count += 1;
        }
    }
    Ok(count)
}

/// `raise_X`, `except_X` and `pytest_raises` tokens found anywhere in the
/// function.
pub fn exception_pattern(function: &FunctionNode<'_>) -> Result<String, AnalysisError> {
    let mut tokens: BTreeSet<String> = BTreeSet::new();
    for node in function.descendants() {
        match node.kind() {
            "raise_statement" => {
                if let Some(exc) = raised_type(function, node) {
                    tokens.insert(format!("raise_{exc}"));
                }
            }
            "except_clause" => {
                if let Some(exc) = handled_type(function, node) {
                    tokens.insert(format!("except_{exc}"));
                }
            }
            "call" => {
                let target = callee(function, node)?;
                let is_raises = target.kind() == "attribute"
                    && call_name(function, target) == Some("raises");
                if is_raises {
                    tokens.insert("pytest_raises".to_string());
                }
            }
            _ => {}
        }
    }
    Ok(tokens.into_iter().collect::<Vec<_>>().join("|"))
}

/// `Foo` for `raise Foo` and `raise Foo(...)`. Qualified names are skipped.
fn raised_type<'m>(function: &FunctionNode<'m>, raise: Node<'m>) -> Option<&'m str> {
    let mut cursor = raise.walk();
    let exc = raise
        .named_children(&mut cursor)
        .find(|c| c.kind() != "comment")?;
    match exc.kind() {
        "identifier" => Some(function.text_of(exc)),
        "call" => exc
            .child_by_field_name("function")
            .filter(|f| f.kind() == "identifier")
            .map(|f| function.text_of(f)),
        _ => None,
    }
}

/// `Foo` for `except Foo`, `except mod.Foo` and `except Foo as e`.
fn handled_type<'m>(function: &FunctionNode<'m>, clause: Node<'m>) -> Option<&'m str> {
    let mut cursor = clause.walk();
    let mut exc = clause
        .named_children(&mut cursor)
        .find(|c| !matches!(c.kind(), "comment" | "block"))?;
    if exc.kind() == "as_pattern" {
        exc = exc.named_child(0)?;
    }
    match exc.kind() {
        "identifier" => Some(function.text_of(exc)),
        "attribute" => exc
            .child_by_field_name("attribute")
            .map(|a| function.text_of(a)),
        _ => None,
    }
}

pub fn structural_signature(
    function: &FunctionNode<'_>,
    mock_assertion_count: usize,
    exception_pattern: &str,
) -> String {
    let mut parts = vec![
        format!("func:{}", function.name()),
        format!("params:{}", function.parameter_count()),
        format!("decorators:{}", function.decorator_count()),
        format!("statements:{}", function.body_statement_count()),
        format!("mocks:{mock_assertion_count}"),
    ];
    if !exception_pattern.is_empty() {
        parts.push(format!("exceptions:{exception_pattern}"));
    }
    parts.join("|")
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::parsers::PythonParser;

    fn features(src: &str, name: &str) -> TestFeatureSignature {
        let mut parser = PythonParser::new().unwrap();
        let module = parser
            .parse_source(src.to_string(), Path::new("tests/test_features.py"))
            .unwrap();
        let function = module.find_function(name).unwrap();
        FeatureBuilder::new().build(&function).unwrap()
    }

    #[test]
    fn mock_assertions_by_attribute_and_bare_name() {
        let f = features(
            r#"
def test_mocks(mock_repo):
    service.run()
    mock_repo.save.assert_called_once_with(1)
    mock_repo.load.assert_not_called()
    assert_called(mock_repo)
    mock_repo.assert_something_else()
"#,
            "test_mocks",
        );
        assert_eq!(f.mock_assertion_count, 3);
    }

    #[test]
    fn exception_tokens_are_sorted_and_deduplicated() {
        let f = features(
            r#"
def test_errors():
    with pytest.raises(ValueError):
        raise ValueError("bad")
    try:
        parse()
    except json.JSONDecodeError as exc:
        raise KeyError
    except TypeError:
        pass
    with pytest.raises(KeyError):
        raise ValueError("again")
"#,
            "test_errors",
        );
        assert_eq!(
            f.exception_pattern,
            "except_JSONDecodeError|except_TypeError|pytest_raises|raise_KeyError|raise_ValueError"
        );
    }

    #[test]
    fn structural_signature_layout() {
        let f = features(
            r#"
@pytest.mark.parametrize("x", [1, 2])
def test_shape(x, mock_api):
    mock_api.assert_called()
    assert x
"#,
            "test_shape",
        );
        assert_eq!(
            f.structural_signature,
            "func:test_shape|params:2|decorators:1|statements:2|mocks:1"
        );

        let g = features("def test_raise():\n    raise RuntimeError()\n", "test_raise");
        assert_eq!(
            g.structural_signature,
            "func:test_raise|params:0|decorators:0|statements:1|mocks:0|exceptions:raise_RuntimeError"
        );
    }

    #[test]
    fn qualified_raise_is_not_a_token() {
        let f = features("def test_q():\n    raise errors.Boom()\n", "test_q");
        assert_eq!(f.exception_pattern, "");
    }
}
