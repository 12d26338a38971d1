/*!
 * Namespace Resolver Tests
 * Prefix parsing, access modes, phase restrictions and containment
 */

use pretty_assertions::assert_eq;
use site_hooks::security::{
    parse_address, Access, HookPhase, Namespace, NamespaceError, NamespaceResolver,
    NamespaceRoots,
};
use std::fs;
use std::path::Path;

fn resolver(root: &Path) -> NamespaceResolver {
    let resolver = NamespaceResolver::new(NamespaceRoots {
        cache: root.join("cache"),
        project: root.join("project"),
        temp: root.join("temp"),
        generated: root.join("generated"),
        built: root.join("built"),
    });
    for namespace in Namespace::ALL {
        fs::create_dir_all(resolver.binding(namespace).root()).unwrap();
    }
    resolver
}

#[test]
fn test_every_namespace_parses() {
    for namespace in Namespace::ALL {
        let address = format!("{}:a/b.txt", namespace.prefix());
        assert_eq!(parse_address(&address).unwrap(), (namespace, "a/b.txt"));
    }
}

#[test]
fn test_unknown_or_missing_prefix_is_invalid() {
    for address in ["index.html", "src:index.html", "CACHE:x", ":x", ""] {
        assert!(
            matches!(parse_address(address), Err(NamespaceError::InvalidPrefix(_))),
            "{}",
            address
        );
    }
}

#[test]
fn test_project_is_read_only_in_both_phases() {
    let root = tempfile::tempdir().unwrap();
    let resolver = resolver(root.path());

    for phase in HookPhase::ALL {
        assert!(resolver
            .resolve_address("project:index.html", Access::Read, phase)
            .is_ok());
        assert_eq!(
            resolver.resolve_address("project:index.html", Access::Write, phase),
            Err(NamespaceError::AccessDenied {
                namespace: Namespace::Project
            })
        );
    }
}

#[test]
fn test_built_is_phase_restricted() {
    let root = tempfile::tempdir().unwrap();
    let resolver = resolver(root.path());

    for access in [Access::Read, Access::Write] {
        assert_eq!(
            resolver.resolve_address("built:x", access, HookPhase::Pre),
            Err(NamespaceError::PhaseRestricted {
                namespace: Namespace::Built,
                phase: HookPhase::Pre,
                allowed: HookPhase::Post,
            })
        );
    }

    let path = resolver
        .resolve_address("built:x", Access::Write, HookPhase::Post)
        .unwrap();
    assert_eq!(path, root.path().join("built").join("x"));
}

#[test]
fn test_lexical_traversal_is_denied() {
    let root = tempfile::tempdir().unwrap();
    let resolver = resolver(root.path());

    for address in [
        "cache:../outside",
        "temp:a/../../outside",
        "project:../site.json",
        "generated:/etc/passwd",
    ] {
        assert!(
            matches!(
                resolver.resolve_address(address, Access::Read, HookPhase::Post),
                Err(NamespaceError::TraversalDenied(_))
            ),
            "{}",
            address
        );
    }
}

#[test]
fn test_current_dir_segments_are_normalised() {
    let root = tempfile::tempdir().unwrap();
    let resolver = resolver(root.path());

    let path = resolver
        .resolve_address("temp:./a/./b.txt", Access::Write, HookPhase::Pre)
        .unwrap();
    assert_eq!(path, root.path().join("temp").join("a").join("b.txt"));
}

#[test]
fn test_namespace_root_itself_resolves() {
    let root = tempfile::tempdir().unwrap();
    let resolver = resolver(root.path());

    let path = resolver
        .resolve_address("cache:", Access::Read, HookPhase::Pre)
        .unwrap();
    assert_eq!(path, root.path().join("cache"));
}

#[cfg(unix)]
#[test]
fn test_symlink_out_of_namespace_is_denied() {
    let root = tempfile::tempdir().unwrap();
    let resolver = resolver(root.path());
    let outside = root.path().join("outside");
    fs::create_dir_all(&outside).unwrap();
    std::os::unix::fs::symlink(&outside, root.path().join("temp").join("link")).unwrap();

    assert!(matches!(
        resolver.resolve_address("temp:link/file.txt", Access::Write, HookPhase::Pre),
        Err(NamespaceError::TraversalDenied(_))
    ));
}

#[test]
fn test_rerooted_namespace_keeps_rules() {
    let root = tempfile::tempdir().unwrap();
    let resolver = resolver(root.path());
    let moved = resolver.with_root(Namespace::Generated, root.path().join("built/_site"));

    let path = moved
        .resolve_address("generated:meta.json", Access::Write, HookPhase::Post)
        .unwrap();
    assert_eq!(path, root.path().join("built/_site/meta.json"));
    assert_eq!(
        resolver.binding(Namespace::Generated).root(),
        root.path().join("generated")
    );
}
