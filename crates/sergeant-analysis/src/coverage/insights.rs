//! Static import and call diagnostics for a single test function.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::Serialize;
use sergeant_core::errors::AnalysisError;
use tree_sitter::Node;

use super::resolver::resolve_import;
use crate::parsers::FunctionNode;

/// Source files the test function imports directly.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportAnalysis {
    pub imported_files: Vec<PathBuf>,
    pub import_count: usize,
    pub source_files_available: usize,
    pub coverage_ratio: f64,
}

/// Call counts by category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CallTypes {
    pub direct_calls: usize,
    pub method_calls: usize,
    pub nested_calls: usize,
    pub dynamic_calls: usize,
    pub assertions: usize,
}

impl CallTypes {
    /// Category names with counts, in reporting order.
    pub fn entries(&self) -> [(&'static str, usize); 5] {
        [
            ("direct_calls", self.direct_calls),
            ("method_calls", self.method_calls),
            ("nested_calls", self.nested_calls),
            ("dynamic_calls", self.dynamic_calls),
            ("assertions", self.assertions),
        ]
    }
}

/// Distinct call targets made by the test function.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CallAnalysis {
    pub called_functions: BTreeSet<String>,
    pub call_count: usize,
    pub call_types: CallTypes,
}

/// Import and call diagnostics; each half independently records its error.
#[derive(Debug, Clone)]
pub struct TestDiagnostics {
    pub imports: Result<ImportAnalysis, String>,
    pub calls: Result<CallAnalysis, String>,
}

impl TestDiagnostics {
    pub fn analyze(function: &FunctionNode<'_>, sources: &[PathBuf]) -> Self {
        let imports = analyze_imports(function, sources).map_err(|e| {
            tracing::error!(test_name = function.name(), error = %e, "import analysis failed");
            e.to_string()
        });
        let calls = analyze_calls(function).map_err(|e| {
            tracing::error!(test_name = function.name(), error = %e, "call analysis failed");
            e.to_string()
        });
        Self { imports, calls }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let imports = match &self.imports {
            Ok(a) => serde_json::to_value(a).unwrap_or(serde_json::Value::Null),
            Err(e) => serde_json::json!({"error": e, "imported_files": [], "import_count": 0}),
        };
        let calls = match &self.calls {
            Ok(a) => serde_json::to_value(a).unwrap_or(serde_json::Value::Null),
            Err(e) => serde_json::json!({"error": e, "called_functions": [], "call_count": 0}),
        };
        serde_json::json!({ "imports": imports, "calls": calls })
    }
}

/// Imports written inside the function body, resolved against `sources`.
pub fn analyze_imports(
    function: &FunctionNode<'_>,
    sources: &[PathBuf],
) -> Result<ImportAnalysis, AnalysisError> {
    let module = function.module();
    let mut imported_files: Vec<PathBuf> = Vec::new();
    for name in module.imported_modules_in(function.node()) {
        if let Some(file) = resolve_import(&name, sources) {
            if !imported_files.contains(file) {
                imported_files.push(file.clone());
            }
        }
    }
    let import_count = imported_files.len();
    let coverage_ratio = if sources.is_empty() {
        0.0
    } else {
        import_count as f64 / sources.len() as f64
    };
    Ok(ImportAnalysis {
        imported_files,
        import_count,
        source_files_available: sources.len(),
        coverage_ratio,
    })
}

/// Call targets: `f`, `obj.m`, `a.b.m`, `.m`, `subscript_call`,
/// `callable_result`, plus `assert` for assert statements.
pub fn analyze_calls(function: &FunctionNode<'_>) -> Result<CallAnalysis, AnalysisError> {
    let mut called_functions = BTreeSet::new();
    for node in function.descendants() {
        match node.kind() {
            "call" => {
                if let Some(name) = call_target(function, node)? {
                    called_functions.insert(name);
                }
            }
            "assert_statement" => {
                called_functions.insert("assert".to_string());
            }
            _ => {}
        }
    }
    let call_types = categorize_calls(&called_functions);
    Ok(CallAnalysis {
        call_count: called_functions.len(),
        called_functions,
        call_types,
    })
}

fn call_target(function: &FunctionNode<'_>, call: Node<'_>) -> Result<Option<String>, AnalysisError> {
    let Some(callee) = call.child_by_field_name("function") else {
        return Err(AnalysisError::MalformedNode {
            test_name: function.name().to_string(),
            message: format!("call without callee at line {}", call.start_position().row + 1),
        });
    };
    let name = match callee.kind() {
        "identifier" => Some(function.text_of(callee).to_string()),
        "attribute" => Some(attribute_chain(function, callee)?),
        "subscript" => Some("subscript_call".to_string()),
        "call" => Some("callable_result".to_string()),
        _ => None,
    };
    Ok(name)
}

/// `a.b.c` for attribute chains rooted at a name; `.c` otherwise.
fn attribute_chain(function: &FunctionNode<'_>, node: Node<'_>) -> Result<String, AnalysisError> {
    let attr = node
        .child_by_field_name("attribute")
        .map(|a| function.text_of(a))
        .ok_or_else(|| AnalysisError::MalformedNode {
            test_name: function.name().to_string(),
            message: "attribute without name".to_string(),
        })?;
    match node.child_by_field_name("object") {
        Some(obj) if obj.kind() == "identifier" => Ok(format!("{}.{attr}", function.text_of(obj))),
        Some(obj) if obj.kind() == "attribute" => {
            Ok(format!("{}.{attr}", attribute_chain(function, obj)?))
        }
        _ => Ok(format!(".{attr}")),
    }
}

/// Bucket call names: `assert*` first, then dotted names by depth, then
/// the two dynamic markers; everything else is a direct call.
pub fn categorize_calls(called: &BTreeSet<String>) -> CallTypes {
    let mut types = CallTypes::default();
    for name in called {
        if name.starts_with("assert") {
            types.assertions += 1;
        } else if name.contains('.') && !name.starts_with('.') {
            if name.matches('.').count() == 1 {
                types.method_calls += 1;
            } else {
                types.nested_calls += 1;
            }
        } else if name == "subscript_call" || name == "callable_result" {
            types.dynamic_calls += 1;
        } else {
            types.direct_calls += 1;
        }
    }
    types
}

/// `imports:N|import_coverage:R|calls:N|assertions:N|<category>:N...|source_files:N`.
/// Sections with failed or absent diagnostics are left out.
pub fn analysis_insights(diagnostics: Option<&TestDiagnostics>, source_count: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(d) = diagnostics {
        if let Ok(imports) = &d.imports {
            parts.push(format!("imports:{}", imports.import_count));
            parts.push(format!("import_coverage:{:.2}", imports.coverage_ratio));
        }
        if let Ok(calls) = &d.calls {
            parts.push(format!("calls:{}", calls.call_count));
            parts.push(format!("assertions:{}", calls.call_types.assertions));
            for (category, count) in calls.call_types.entries() {
                if count > 0 {
                    parts.push(format!("{category}:{count}"));
                }
            }
        }
    }
    parts.push(format!("source_files:{source_count}"));
    parts.join("|")
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::parsers::PythonParser;

    const SOURCE: &str = r#"
def test_flow(client):
    from app.models import User
    import app.service
    user = User.create()
    client.session.commit()
    build()
    handlers["x"]()
    factory()()
    get().save()
    mock_db.assert_called_once()
    assert_equal(user, 1)
    assert user
"#;

    fn with_test<F: FnOnce(&FunctionNode<'_>)>(check: F) {
        let mut parser = PythonParser::new().unwrap();
        let module = parser
            .parse_source(SOURCE.to_string(), Path::new("tests/test_flow.py"))
            .unwrap();
        let function = module.find_function("test_flow").unwrap();
        check(&function);
    }

    #[test]
    fn call_names_and_categories() {
        with_test(|f| {
            let calls = analyze_calls(f).unwrap();
            let names: Vec<&str> = calls.called_functions.iter().map(String::as_str).collect();
            assert!(names.contains(&"User.create"));
            assert!(names.contains(&"client.session.commit"));
            assert!(names.contains(&"build"));
            assert!(names.contains(&"subscript_call"));
            assert!(names.contains(&"callable_result"));
            assert!(names.contains(&".save"));
            assert!(names.contains(&"assert"));
            assert!(names.contains(&"assert_equal"));

            let t = calls.call_types;
            assert_eq!(t.assertions, 2);
            assert_eq!(t.nested_calls, 1);
            // User.create, mock_db.assert_called_once
            assert_eq!(t.method_calls, 2);
            assert_eq!(t.dynamic_calls, 2);
            // build, factory, get, .save
            assert_eq!(t.direct_calls, 4);
        });
    }

    #[test]
    fn imports_resolve_against_sources() {
        let sources = vec![
            PathBuf::from("proj/app/models.py"),
            PathBuf::from("proj/app/service.py"),
            PathBuf::from("proj/app/util.py"),
            PathBuf::from("proj/app/extra.py"),
        ];
        with_test(|f| {
            let imports = analyze_imports(f, &sources).unwrap();
            assert_eq!(imports.import_count, 2);
            assert_eq!(imports.source_files_available, 4);
            assert!((imports.coverage_ratio - 0.5).abs() < 1e-9);
        });
    }

    #[test]
    fn insights_string_layout() {
        let mut called = BTreeSet::new();
        called.insert("assert".to_string());
        called.insert("build".to_string());
        let d = TestDiagnostics {
            imports: Ok(ImportAnalysis {
                import_count: 1,
                coverage_ratio: 0.25,
                ..Default::default()
            }),
            calls: Ok(CallAnalysis {
                call_types: categorize_calls(&called),
                call_count: called.len(),
                called_functions: called,
            }),
        };
        assert_eq!(
            analysis_insights(Some(&d), 4),
            "imports:1|import_coverage:0.25|calls:2|assertions:1|direct_calls:1|assertions:1|source_files:4"
        );
    }

    #[test]
    fn failed_sections_are_omitted() {
        let d = TestDiagnostics {
            imports: Err("boom".to_string()),
            calls: Err("boom".to_string()),
        };
        assert_eq!(analysis_insights(Some(&d), 3), "source_files:3");
        assert_eq!(analysis_insights(None, 0), "source_files:0");
        assert_eq!(d.to_json()["imports"]["error"], "boom");
    }
}
