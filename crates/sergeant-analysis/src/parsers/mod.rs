//! Tree-sitter Python parsing for test files.

pub mod function;
pub mod python;

pub use function::FunctionNode;
pub use python::{is_test_like_name, ParsedModule, PythonParser};
