//! Tests for watcher event normalization and subscription lifecycle.

use super::watcher::{ChangeWatcher, FsChange, WatchError, normalize};
use notify_debouncer_full::notify::{
    Event, EventKind,
    event::{AccessKind, CreateKind, DataChange, Flag, MetadataKind, ModifyKind, RemoveKind, RenameMode},
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

const ROOT: &str = "/dir";

fn event(kind: EventKind, paths: &[&str]) -> Event {
    paths
        .iter()
        .fold(Event::new(kind), |event, path| event.add_path(PathBuf::from(path)))
}

/// Probe that treats everything as an existing regular file.
fn files_only(_: &Path) -> Option<bool> {
    Some(false)
}

fn nothing_exists(_: &Path) -> Option<bool> {
    None
}

fn normalize_one(kind: EventKind, paths: &[&str]) -> Vec<FsChange> {
    normalize(Path::new(ROOT), &event(kind, paths), files_only)
}

fn p(path: &str) -> PathBuf {
    PathBuf::from(path)
}

// ============================================================================
// Normalization
// ============================================================================

#[test]
fn test_create_becomes_added() {
    assert_eq!(
        normalize_one(EventKind::Create(CreateKind::File), &["/dir/new.txt"]),
        vec![FsChange::Added(p("/dir/new.txt"))]
    );
    assert_eq!(
        normalize_one(EventKind::Create(CreateKind::Folder), &["/dir/sub"]),
        vec![FsChange::Added(p("/dir/sub"))]
    );
}

#[test]
fn test_create_of_root_is_ignored() {
    assert!(normalize_one(EventKind::Create(CreateKind::Folder), &[ROOT]).is_empty());
}

#[test]
fn test_remove_becomes_removed() {
    assert_eq!(
        normalize_one(EventKind::Remove(RemoveKind::File), &["/dir/gone.txt"]),
        vec![FsChange::Removed(p("/dir/gone.txt"))]
    );
    // Root removal is forwarded so the engine can react to it
    assert_eq!(
        normalize_one(EventKind::Remove(RemoveKind::Folder), &[ROOT]),
        vec![FsChange::Removed(p(ROOT))]
    );
}

#[test]
fn test_rename_both_becomes_moved() {
    assert_eq!(
        normalize_one(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/dir/old.txt", "/other/old.txt"]
        ),
        vec![FsChange::Moved {
            from: p("/dir/old.txt"),
            to: p("/other/old.txt"),
        }]
    );
}

#[test]
fn test_rename_from_without_destination_becomes_removed() {
    assert_eq!(
        normalize_one(EventKind::Modify(ModifyKind::Name(RenameMode::From)), &["/dir/old.txt"]),
        vec![FsChange::Removed(p("/dir/old.txt"))]
    );
}

#[test]
fn test_rename_to_becomes_added() {
    assert_eq!(
        normalize_one(EventKind::Modify(ModifyKind::Name(RenameMode::To)), &["/dir/arrived.txt"]),
        vec![FsChange::Added(p("/dir/arrived.txt"))]
    );
}

#[test]
fn test_rename_with_unknown_direction_asks_the_disk() {
    let kind = EventKind::Modify(ModifyKind::Name(RenameMode::Any));
    let ev = event(kind, &["/dir/x.txt"]);

    assert_eq!(
        normalize(Path::new(ROOT), &ev, files_only),
        vec![FsChange::Added(p("/dir/x.txt"))]
    );
    assert_eq!(
        normalize(Path::new(ROOT), &ev, nothing_exists),
        vec![FsChange::Removed(p("/dir/x.txt"))]
    );
}

#[test]
fn test_file_modification_becomes_modified() {
    assert_eq!(
        normalize_one(EventKind::Modify(ModifyKind::Data(DataChange::Content)), &["/dir/a.txt"]),
        vec![FsChange::Modified(p("/dir/a.txt"))]
    );
    assert_eq!(
        normalize_one(
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)),
            &["/dir/a.txt"]
        ),
        vec![FsChange::Modified(p("/dir/a.txt"))]
    );
}

#[test]
fn test_directory_modifications_are_suppressed() {
    let kind = EventKind::Modify(ModifyKind::Data(DataChange::Any));
    let dirs_only = |_: &Path| Some(true);

    assert!(normalize(Path::new(ROOT), &event(kind, &["/dir/sub"]), dirs_only).is_empty());
    // The root itself, even if the probe can't tell
    assert!(normalize(Path::new(ROOT), &event(kind, &[ROOT]), files_only).is_empty());
}

#[test]
fn test_access_and_unknown_events_are_ignored() {
    assert!(normalize_one(EventKind::Access(AccessKind::Any), &["/dir/a.txt"]).is_empty());
    assert!(normalize_one(EventKind::Any, &["/dir/a.txt"]).is_empty());
    assert!(normalize_one(EventKind::Other, &["/dir/a.txt"]).is_empty());
}

#[test]
fn test_rescan_flag_becomes_rescan() {
    let lost = Event::new(EventKind::Other).set_flag(Flag::Rescan);
    assert_eq!(normalize(Path::new(ROOT), &lost, nothing_exists), vec![FsChange::Rescan]);

    // The flag wins over whatever the event kind says
    let flagged_create = event(EventKind::Create(CreateKind::File), &["/dir/a.txt"]).set_flag(Flag::Rescan);
    assert_eq!(normalize(Path::new(ROOT), &flagged_create, files_only), vec![FsChange::Rescan]);
}

// ============================================================================
// Subscription lifecycle
// ============================================================================

#[test]
fn test_watch_missing_directory_fails() {
    let tmp = TempDir::new().unwrap();
    let mut watcher = ChangeWatcher::new(Duration::from_millis(50));

    let result = watcher.watch(&tmp.path().join("nope"));

    assert!(matches!(result, Err(WatchError::NotADirectory(_))));
    assert!(!watcher.is_watching());
    assert!(watcher.watched_path().is_none());
}

#[test]
fn test_watch_file_fails() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("plain.txt");
    fs::write(&file, "x").unwrap();
    let mut watcher = ChangeWatcher::new(Duration::from_millis(50));

    let err = watcher.watch(&file).unwrap_err();

    assert!(err.to_string().contains("Not a directory"));
    assert!(!watcher.is_watching());
}

#[test]
fn test_stop_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let mut watcher = ChangeWatcher::new(Duration::from_millis(50));
    watcher.stop();

    watcher.watch(tmp.path()).unwrap();
    assert!(watcher.is_watching());
    assert_eq!(watcher.watched_path(), Some(tmp.path()));

    watcher.stop();
    watcher.stop();
    assert!(!watcher.is_watching());
    assert!(watcher.watched_path().is_none());
}

#[test]
fn test_failed_watch_tears_down_previous_one() {
    let tmp = TempDir::new().unwrap();
    let mut watcher = ChangeWatcher::new(Duration::from_millis(50));
    watcher.watch(tmp.path()).unwrap();

    assert!(watcher.watch(&tmp.path().join("missing")).is_err());
    assert!(!watcher.is_watching());
}

#[tokio::test]
async fn test_live_create_is_delivered() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    let mut watcher = ChangeWatcher::new(Duration::from_millis(50));
    watcher.watch(&root).unwrap();

    fs::write(root.join("fresh.txt"), "hello").unwrap();

    let target = FsChange::Added(root.join("fresh.txt"));
    let found = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(change) = watcher.recv().await {
            if change == target {
                return true;
            }
        }
        false
    })
    .await;

    assert!(matches!(found, Ok(true)));
}

#[tokio::test]
async fn test_rewatch_drops_events_from_previous_directory() {
    let old = TempDir::new().unwrap();
    let new = TempDir::new().unwrap();
    let old_root = old.path().canonicalize().unwrap();
    let new_root = new.path().canonicalize().unwrap();
    let mut watcher = ChangeWatcher::new(Duration::from_millis(50));

    watcher.watch(&old_root).unwrap();
    fs::write(old_root.join("before.txt"), "x").unwrap();
    watcher.watch(&new_root).unwrap();
    fs::write(old_root.join("after.txt"), "x").unwrap();
    fs::write(new_root.join("wanted.txt"), "x").unwrap();

    let change = match tokio::time::timeout(Duration::from_secs(5), watcher.recv()).await {
        Ok(Some(change)) => change,
        other => panic!("expected an event from the new directory, got {:?}", other),
    };
    let path = match &change {
        FsChange::Added(path) | FsChange::Modified(path) => path.clone(),
        other => panic!("unexpected change {:?}", other),
    };
    assert!(path.starts_with(&new_root), "stale event leaked: {:?}", change);
}
