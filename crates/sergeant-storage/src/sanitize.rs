//! Filename sanitization for record keys.

/// Longest sanitized name, in characters.
pub const MAX_FILENAME_CHARS: usize = 100;

const UNSAFE: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Replace path separators and reserved characters with `_`, then truncate.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| if UNSAFE.contains(&c) { '_' } else { c })
        .take(MAX_FILENAME_CHARS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_reserved_characters() {
        assert_eq!(
            sanitize_filename(r#"tests/unit\test_a.py::test_x*?"<>|"#),
            "tests_unit_test_a.py__test_x______"
        );
    }

    #[test]
    fn truncates_by_characters() {
        let long = "é".repeat(150);
        let sanitized = sanitize_filename(&long);
        assert_eq!(sanitized.chars().count(), MAX_FILENAME_CHARS);
    }

    #[test]
    fn plain_names_pass_through() {
        assert_eq!(sanitize_filename("test_checkout"), "test_checkout");
    }
}
