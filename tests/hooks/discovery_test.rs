/*!
 * Hook Discovery Tests
 * Ordering, phase directories and file filtering
 */

use proptest::prelude::*;
use site_hooks::hooks::{discover, DiscoveryError};
use std::fs;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Hooks come back sorted byte-wise by file name whatever the directory order
    #[test]
    fn prop_hooks_are_sorted_bytewise(names in prop::collection::btree_set("[a-z0-9_-]{1,12}", 0..12)) {
        let root = tempfile::tempdir().unwrap();
        let pre = root.path().join("pre");
        fs::create_dir_all(&pre).unwrap();
        for name in &names {
            fs::write(pre.join(format!("{}.lua", name)), "").unwrap();
        }

        let set = discover(root.path()).unwrap();
        let found: Vec<String> = set.pre.iter().map(|h| h.name().to_string()).collect();

        let mut expected: Vec<String> = names.iter().map(|n| format!("{}.lua", n)).collect();
        expected.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));

        prop_assert_eq!(found, expected);
        prop_assert!(set.post.is_empty());
    }
}

#[test]
fn test_numeric_prefixes_order_hooks() {
    let root = tempfile::tempdir().unwrap();
    let post = root.path().join("post");
    fs::create_dir_all(&post).unwrap();
    for name in ["2-check.lua", "10-late.lua", "1-setup.lua"] {
        fs::write(post.join(name), "").unwrap();
    }

    let set = discover(root.path()).unwrap();
    let names: Vec<_> = set.post.iter().map(|h| h.name()).collect();
    assert_eq!(names, vec!["1-setup.lua", "10-late.lua", "2-check.lua"]);
    assert!(set.pre.is_empty());
}

#[test]
fn test_neither_phase_directory_is_not_configured() {
    let root = tempfile::tempdir().unwrap();
    fs::write(root.path().join("stray.lua"), "").unwrap();

    let err = discover(root.path()).unwrap_err();
    assert!(matches!(err, DiscoveryError::NotConfigured { .. }));
}

#[test]
fn test_missing_hooks_root_is_not_configured() {
    let root = tempfile::tempdir().unwrap();
    let err = discover(&root.path().join("hooks")).unwrap_err();
    assert!(matches!(err, DiscoveryError::NotConfigured { .. }));
}

#[test]
fn test_empty_pre_only_yields_empty_phases() {
    let root = tempfile::tempdir().unwrap();
    fs::create_dir_all(root.path().join("pre")).unwrap();

    let set = discover(root.path()).unwrap();
    assert!(set.pre.is_empty());
    assert!(set.post.is_empty());
    assert!(set.is_empty());
}

#[test]
fn test_subdirectories_are_not_descended() {
    let root = tempfile::tempdir().unwrap();
    let pre = root.path().join("pre");
    fs::create_dir_all(pre.join("lib")).unwrap();
    fs::write(pre.join("lib/helper.lua"), "").unwrap();
    fs::write(pre.join("main.lua"), "").unwrap();

    let set = discover(root.path()).unwrap();
    assert_eq!(set.pre.len(), 1);
    assert_eq!(set.pre[0].name(), "main.lua");
}

#[cfg(unix)]
#[test]
fn test_symlinked_scripts_are_skipped() {
    let root = tempfile::tempdir().unwrap();
    let pre = root.path().join("pre");
    fs::create_dir_all(&pre).unwrap();
    let outside = root.path().join("outside.lua");
    fs::write(&outside, "os.exit(0)").unwrap();
    std::os::unix::fs::symlink(&outside, pre.join("linked.lua")).unwrap();
    fs::write(pre.join("real.lua"), "").unwrap();

    let set = discover(root.path()).unwrap();
    let names: Vec<_> = set.pre.iter().map(|h| h.name()).collect();
    assert_eq!(names, vec!["real.lua"]);
}
