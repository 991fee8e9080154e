// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn default_root_is_under_home() {
    let paths = ControlPaths::resolve(Path::new("/home/u"), None, 1000, None);
    assert_eq!(paths.control_root, PathBuf::from("/home/u/.ralph/control"));
    assert_eq!(
        paths.daemon_registry,
        PathBuf::from("/home/u/.ralph/control/daemon-registry.json")
    );
    assert_eq!(paths.db_path, PathBuf::from("/home/u/.ralph/control/state.db"));
    assert_eq!(paths.lock_dir, PathBuf::from("/home/u/.ralph/control/daemon.lock"));
}

#[test]
fn root_override_wins() {
    let paths =
        ControlPaths::resolve(Path::new("/home/u"), None, 1000, Some(Path::new("/srv/ralph")));
    assert_eq!(paths.control_root, PathBuf::from("/srv/ralph"));
    assert_eq!(paths.sessions_dir, PathBuf::from("/srv/ralph/sessions"));
}

#[test]
fn control_file_candidates_in_search_order() {
    let paths = ControlPaths::resolve(
        Path::new("/home/u"),
        Some(Path::new("/home/u/.state")),
        500,
        None,
    );
    let candidates = paths.control_file_candidates();
    assert_eq!(candidates.len(), 4);
    assert_eq!(candidates[0], PathBuf::from("/home/u/.ralph/control/control.json"));
    assert_eq!(candidates[1], PathBuf::from("/home/u/.state/ralph/control.json"));
    assert_eq!(candidates[2], PathBuf::from("/home/u/.local/state/ralph/control.json"));
    assert_eq!(candidates[3], PathBuf::from("/tmp/ralph/500/control.json"));
}

#[test]
fn control_file_prefers_first_existing_candidate() {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path();
    let paths = ControlPaths::resolve(home, None, 1000, None);

    // Nothing exists: fall back to canonical
    assert_eq!(paths.control_file(), paths.canonical_control_file());

    // Second candidate exists: picked over the canonical location
    let fallback = home.join(".local/state/ralph/control.json");
    std::fs::create_dir_all(fallback.parent().unwrap()).unwrap();
    std::fs::write(&fallback, b"{}").unwrap();
    assert_eq!(paths.control_file(), fallback);

    // Canonical exists: wins again
    let canonical = paths.canonical_control_file().to_path_buf();
    std::fs::create_dir_all(canonical.parent().unwrap()).unwrap();
    std::fs::write(&canonical, b"{}").unwrap();
    assert_eq!(paths.control_file(), canonical);
}

#[test]
fn write_atomic_replaces_content() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("file.json");
    write_atomic(&path, b"one").unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"one");
    write_atomic(&path, b"two").unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"two");
    // No temp files left behind
    let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().contains("tmp"))
        .collect();
    assert!(leftovers.is_empty());
}
