//! Integration tests for snapshot creation, listing and restore.

mod util;

use std::fs;

use doplan_migrate::core::{BackupManager, list_backups, resolve_backup};
use util::{LEGACY_CONFIG, legacy_project, snapshot_tree, write};

#[test]
fn restore_is_byte_identical_including_binary()
{
    let tmp = legacy_project();
    let root = tmp.path();
    let blob: Vec<u8> = (0u8..=255).chain([0, 0xff, b'\r', b'\n']).collect();
    fs::write(root.join("doplan/01-phase/diagram.bin"), &blob).unwrap();

    let content_before = snapshot_tree(&root.join("doplan"));
    let config_before = snapshot_tree(&root.join(".cursor/config"));

    let mgr = BackupManager::new(root);
    let backup = mgr.create_backup().unwrap();

    fs::remove_dir_all(root.join("doplan")).unwrap();
    write(root, ".cursor/config/doplan-config.json", "{}");
    write(root, ".cursor/config/stray.json", "{}");

    mgr.restore_backup(&backup).unwrap();

    assert_eq!(snapshot_tree(&root.join("doplan")), content_before);
    assert_eq!(snapshot_tree(&root.join(".cursor/config")), config_before);
    assert_eq!(fs::read(root.join("doplan/01-phase/diagram.bin")).unwrap(), blob);
}

#[test]
fn backup_leaves_live_tree_untouched()
{
    let tmp = legacy_project();
    let root = tmp.path();
    let before = snapshot_tree(&root.join("doplan"));

    BackupManager::new(root).create_backup().unwrap();

    assert_eq!(snapshot_tree(&root.join("doplan")), before);
}

#[test]
fn absent_subtree_is_skipped_and_not_restored()
{
    let tmp = assert_fs::TempDir::new().unwrap();
    let root = tmp.path();
    write(root, ".cursor/config/doplan-config.json", LEGACY_CONFIG);

    let mgr = BackupManager::new(root);
    let backup = mgr.create_backup().unwrap();
    assert!(!backup.join("doplan").exists());

    write(root, "doplan/01-authentication/plan.md", "# Authentication\n");
    mgr.restore_backup(&backup).unwrap();

    // Only subtrees present in the snapshot are replaced
    assert!(root.join("doplan/01-authentication/plan.md").is_file());
    assert_eq!(
        fs::read_to_string(root.join(".cursor/config/doplan-config.json")).unwrap(),
        LEGACY_CONFIG
    );
}

#[test]
fn same_second_backups_get_distinct_dirs()
{
    let tmp = legacy_project();
    let mgr = BackupManager::new(tmp.path());

    let paths: Vec<_> = (0..3).map(|_| mgr.create_backup().unwrap()).collect();

    let mut unique = paths.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 3);
    assert!(paths.iter().all(|p| p.is_dir()));
}

#[test]
fn list_and_resolve_latest()
{
    let tmp = legacy_project();
    let root = tmp.path();
    let mgr = BackupManager::new(root);
    let first = mgr.create_backup().unwrap();
    let second = mgr.create_backup().unwrap();

    // Unrelated entries in the backup root are ignored
    fs::create_dir_all(root.join(".doplan/backup/not-a-backup")).unwrap();

    let list = list_backups(root).unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].path, second);
    assert_eq!(list[1].path, first);
    assert!(list[0].subtrees.iter().any(|p| p.ends_with("doplan")));

    assert_eq!(resolve_backup(root, "latest").unwrap(), second);
    let name = first.file_name().unwrap().to_str().unwrap();
    assert_eq!(resolve_backup(root, name).unwrap(), first);
    assert!(resolve_backup(root, "1999-01-01-00-00-00").is_err());
}

#[test]
fn restore_from_missing_backup_changes_nothing()
{
    let tmp = legacy_project();
    let root = tmp.path();
    let before = snapshot_tree(root);

    let err = BackupManager::new(root)
        .restore_backup(&root.join(".doplan/backup/nope"))
        .unwrap_err();

    assert!(err.to_string().contains("backup not found"));
    assert_eq!(snapshot_tree(root), before);
}
