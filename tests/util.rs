//! Shared fixtures for integration tests
//!
//! Builds legacy DoPlan projects on disk and snapshots trees for
//! byte-level comparisons.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use assert_fs::prelude::*;

pub const LEGACY_CONFIG: &str = r#"{
  "ide": "cursor",
  "installed": true,
  "version": "0.0.17",
  "github": { "enabled": true, "autoBranch": true, "autoPR": false }
}"#;

/// One phase (`Authentication`) holding one feature (`Login Flow`), with
/// cross-references to the old folder names and a valid legacy config.
pub fn legacy_project() -> assert_fs::TempDir
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");

    tmp.child(".cursor/config/doplan-config.json")
        .write_str(LEGACY_CONFIG)
        .expect("write config");

    tmp.child("doplan/01-phase/plan.md")
        .write_str("# Authentication\n\nSee 01-phase/01-Feature.\n")
        .expect("write phase plan");
    tmp.child("doplan/01-phase/notes/links.md")
        .write_str("dashboard: doplan/01-phase/notes\n")
        .expect("write notes");
    tmp.child("doplan/01-phase/01-Feature/plan.md")
        .write_str("# Login Flow\n\nPart of 01-Feature.\n")
        .expect("write feature plan");
    tmp.child("doplan/01-phase/01-Feature/tasks.md")
        .write_str("- [ ] build 01-Feature form\n")
        .expect("write tasks");
    tmp.child("doplan/dashboard.md")
        .write_str("Current: 01-phase\n")
        .expect("write dashboard");

    tmp
}

/// Add a second phase titled `Payments` with one untitled feature.
pub fn add_second_phase(root: &Path)
{
    write(root, "doplan/02-phase/phase-plan.md", "# Payments\n");
    write(root, "doplan/02-phase/01-Feature/plan.md", "no heading here\n");
}

/// Write a file, creating parents.
pub fn write(
    root: &Path,
    rel: &str,
    body: &str,
)
{
    let p = root.join(rel);
    if let Some(parent) = p.parent()
    {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(p, body.as_bytes()).unwrap();
}

/// Read a file as UTF-8 string.
pub fn read(
    root: &Path,
    rel: &str,
) -> String
{
    fs::read_to_string(root.join(rel)).unwrap()
}

/// Every file under `dir`, keyed by path relative to `dir`.
pub fn snapshot_tree(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>>
{
    fn visit(
        base: &Path,
        dir: &Path,
        out: &mut BTreeMap<PathBuf, Vec<u8>>,
    )
    {
        for entry in fs::read_dir(dir).unwrap()
        {
            let path = entry.unwrap().path();
            if path.is_dir()
            {
                visit(base, &path, out);
            }
            else
            {
                let rel = path.strip_prefix(base).unwrap().to_path_buf();
                out.insert(rel, fs::read(&path).unwrap());
            }
        }
    }

    let mut out = BTreeMap::new();
    if dir.exists()
    {
        visit(dir, dir, &mut out);
    }
    out
}
