use std::fs;
use std::path::{Path, PathBuf};

use sergeant_analysis::coverage::resolver::import_roots;
use sergeant_analysis::coverage::{ResolverConfig, SourceResolver};

fn write(root: &Path, rel: &str, contents: &str) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, contents).unwrap();
    path
}

/// proj/
///   src/app/{__init__,helpers,models,test_internal}.py
///   mypkg/{__init__,core}.py
///   tests/test_models.py
fn project() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let proj = dir.path().join("proj");
    write(&proj, "src/app/__init__.py", "");
    write(&proj, "src/app/helpers.py", "def helper():\n    return 1\n");
    write(&proj, "src/app/models.py", "class User:\n    pass\n");
    write(&proj, "src/app/test_internal.py", "def test_x():\n    pass\n");
    write(&proj, "mypkg/__init__.py", "");
    write(&proj, "mypkg/core.py", "def run():\n    pass\n");
    (dir, proj)
}

fn names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

#[test]
fn imported_files_come_first_with_their_siblings() {
    let (_dir, proj) = project();
    let test_file = write(
        &proj,
        "tests/test_models.py",
        "import os\nfrom app.models import User\n\ndef test_user():\n    assert User()\n",
    );
    let mut resolver = SourceResolver::new(ResolverConfig::default());
    let selected = resolver.resolve(&test_file);
    assert_eq!(names(&selected), vec!["models.py", "__init__.py", "helpers.py"]);
    assert!(selected[0].ends_with("src/app/models.py"));
}

#[test]
fn discovery_covers_src_and_parent_packages_without_test_files() {
    let (_dir, proj) = project();
    let test_file = write(&proj, "tests/test_plain.py", "def test_a():\n    pass\n");
    let resolver = SourceResolver::new(ResolverConfig::default());
    let candidates = resolver.discover_candidates(&test_file);
    assert_eq!(
        names(&candidates),
        vec!["__init__.py", "helpers.py", "models.py", "__init__.py", "core.py"]
    );
    assert!(candidates.iter().all(|p| !p.ends_with("test_internal.py")));
}

#[test]
fn unresolved_imports_cap_candidates() {
    let (_dir, proj) = project();
    let test_file = write(&proj, "tests/test_plain.py", "import json\n\ndef test_a():\n    pass\n");
    let mut resolver = SourceResolver::new(ResolverConfig {
        max_candidate_files: 2,
        ..ResolverConfig::default()
    });
    assert_eq!(resolver.resolve(&test_file).len(), 2);
}

#[test]
fn test_file_with_helpers_is_measured_itself() {
    let (_dir, proj) = project();
    let test_file = write(
        &proj,
        "tests/test_helpers.py",
        "def build_user():\n    return 1\n\ndef test_build():\n    assert build_user()\n",
    );
    let mut resolver = SourceResolver::new(ResolverConfig::default());
    let selected = resolver.resolve(&test_file);
    assert_eq!(selected[0], test_file);
}

#[test]
fn helper_test_file_counts_toward_the_selection_cap() {
    let (_dir, proj) = project();
    let test_file = write(
        &proj,
        "tests/test_helpers.py",
        "from app.models import User\n\ndef build_user():\n    return User()\n\ndef test_build():\n    assert build_user()\n",
    );
    let mut resolver = SourceResolver::new(ResolverConfig {
        max_selected_files: 2,
        ..ResolverConfig::default()
    });
    let selected = resolver.resolve(&test_file);
    assert_eq!(selected.len(), 2);
    assert_eq!(selected[0], test_file);
    assert!(selected[1].ends_with("src/app/models.py"));
}

#[test]
fn import_roots_are_the_parents_of_top_level_packages() {
    let (_dir, proj) = project();
    let test_file = write(&proj, "tests/test_plain.py", "def test_a():\n    pass\n");
    let roots = import_roots(
        &test_file,
        &[proj.join("mypkg/core.py"), proj.join("src/app/models.py")],
    );
    assert_eq!(roots, vec![proj.join("tests"), proj.clone(), proj.join("src")]);
}

#[test]
fn unreadable_test_file_falls_back_to_discovery() {
    let (_dir, proj) = project();
    fs::create_dir_all(proj.join("tests")).unwrap();
    let missing = proj.join("tests/test_missing.py");
    let mut resolver = SourceResolver::new(ResolverConfig::default());
    assert_eq!(resolver.resolve(&missing).len(), 5);
}

#[test]
fn parent_walk_respects_depth() {
    let (_dir, proj) = project();
    let deep = proj.join("a/b/c/d/e/f");
    fs::create_dir_all(&deep).unwrap();
    let resolver = SourceResolver::new(ResolverConfig {
        max_parent_depth: 2,
        ..ResolverConfig::default()
    });
    let parents = resolver.safe_parents(&deep);
    assert_eq!(parents, vec![proj.join("a/b/c/d/e"), proj.join("a/b/c/d")]);
}
