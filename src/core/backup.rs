//! Timestamped snapshots of the mutable legacy subtrees.
//!
//! Each snapshot lives under `.doplan/backup/<YYYY-MM-DD-HH-MM-SS>` and
//! mirrors `.cursor/config` and `doplan` at their root-relative paths. A
//! snapshot is claimed with a non-recursive `create_dir`, so two attempts in
//! the same second get distinct `-N` suffixed directories instead of sharing
//! one. Snapshots are never pruned here.

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

use crate::core::layout::Layout;
use crate::infra::io;

/// Directory-name format of a snapshot.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";
const TIMESTAMP_LEN: usize = 19;
const MAX_SAME_SECOND: u32 = 1000;

/// Creates and restores snapshots for one project root.
#[derive(Debug, Clone)]
pub struct BackupManager {
    layout: Layout,
}

/// A snapshot found on disk.
#[derive(Debug, Clone, Serialize)]
pub struct BackupInfo {
    pub name: String,
    pub path: PathBuf,
    pub created: NaiveDateTime,
    /// Root-relative subtrees present in the snapshot.
    pub subtrees: Vec<PathBuf>,
}

impl BackupManager {
    pub fn new(root: &Path) -> Self {
        Self {
            layout: Layout::new(root),
        }
    }

    /// Snapshot the legacy config directory and content directory.
    ///
    /// Read-only with respect to the live project. On failure the partially
    /// written snapshot is left in place for inspection.
    #[instrument(skip(self), fields(root = %self.layout.root().display()))]
    pub fn create_backup(&self) -> Result<PathBuf> {
        let backup_root = self.layout.backup_root();
        fs::create_dir_all(&backup_root)
            .with_context(|| format!("create backup root: {}", backup_root.display()))?;

        let stamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        let backup_dir = claim_backup_dir(&backup_root, &stamp)?;

        for (rel, live) in self.layout.mutable_subtrees() {
            if !io::exists(&live)? {
                debug!(subtree = %rel.display(), "absent, skipped");
                continue;
            }
            let dest = backup_dir.join(&rel);
            let files = io::copy_tree(&live, &dest)
                .with_context(|| format!("back up {}", rel.display()))?;
            debug!(subtree = %rel.display(), files, "backed up");
        }

        info!(backup = %backup_dir.display(), "backup created");
        Ok(backup_dir)
    }

    /// Replace each live subtree present in `backup_path` with the
    /// snapshot's copy. Destroys whatever currently occupies those paths and
    /// nothing else.
    ///
    /// `.doplan/config.yaml` is not part of a snapshot and survives a
    /// restore. While it exists the restored legacy config no longer counts
    /// as legacy structure, so a restored config-only project is not picked
    /// up by `migrate` again until that file is removed.
    #[instrument(skip(self), fields(root = %self.layout.root().display()))]
    pub fn restore_backup(&self, backup_path: &Path) -> Result<()> {
        if !backup_path.is_dir() {
            bail!("backup not found: {}", backup_path.display());
        }

        for (rel, live) in self.layout.mutable_subtrees() {
            let saved = backup_path.join(&rel);
            if !saved.is_dir() {
                continue;
            }
            io::remove_tree(&live)
                .with_context(|| format!("remove live {}", rel.display()))?;
            let files = io::copy_tree(&saved, &live)
                .with_context(|| format!("restore {}", rel.display()))?;
            debug!(subtree = %rel.display(), files, "restored");
        }

        info!(backup = %backup_path.display(), "backup restored");
        Ok(())
    }
}

/// Create `<root>/<stamp>` or the first free `<root>/<stamp>-N`.
fn claim_backup_dir(backup_root: &Path, stamp: &str) -> Result<PathBuf> {
    for n in 0..MAX_SAME_SECOND {
        let name = if n == 0 {
            stamp.to_string()
        } else {
            format!("{stamp}-{n}")
        };
        let candidate = backup_root.join(name);
        match fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("create backup dir: {}", candidate.display())));
            }
        }
    }
    bail!("too many backups for {stamp} under {}", backup_root.display())
}

/// Parse a snapshot directory name (`<stamp>` or `<stamp>-N`).
pub fn parse_backup_name(name: &str) -> Option<NaiveDateTime> {
    let stamp = name.get(..TIMESTAMP_LEN)?;
    let rest = &name[TIMESTAMP_LEN..];
    let suffix_ok = rest.is_empty()
        || rest
            .strip_prefix('-')
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()));
    if !suffix_ok {
        return None;
    }
    NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()
}

/// Snapshots under the backup root, newest first. Unrelated entries are
/// ignored; a missing backup root yields an empty list.
pub fn list_backups(root: &Path) -> Result<Vec<BackupInfo>> {
    let layout = Layout::new(root);
    let backup_root = layout.backup_root();
    if !io::exists(&backup_root)? {
        return Ok(Vec::new());
    }

    let mut out = Vec::new();
    for entry in io::sorted_entries(&backup_root)? {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(created) = parse_backup_name(&name) else {
            continue;
        };
        let subtrees = layout
            .mutable_subtrees()
            .into_iter()
            .map(|(rel, _)| rel)
            .filter(|rel| path.join(rel).is_dir())
            .collect();
        out.push(BackupInfo {
            name,
            path,
            created,
            subtrees,
        });
    }

    out.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| suffix_of(b).cmp(&suffix_of(a))));
    Ok(out)
}

fn suffix_of(info: &BackupInfo) -> u32 {
    info.name
        .get(TIMESTAMP_LEN + 1..)
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

/// Resolve `latest`, a snapshot name, or a path to a snapshot directory.
pub fn resolve_backup(root: &Path, query: &str) -> Result<PathBuf> {
    if query == "latest" {
        return list_backups(root)?
            .into_iter()
            .next()
            .map(|b| b.path)
            .context("no backups found");
    }

    let by_name = Layout::new(root).backup_root().join(query);
    if parse_backup_name(query).is_some() && by_name.is_dir() {
        return Ok(by_name);
    }

    let as_path = PathBuf::from(query);
    let as_path = if as_path.is_absolute() {
        as_path
    } else {
        root.join(as_path)
    };
    if as_path.is_dir() {
        return Ok(as_path);
    }

    bail!("no backup matching '{query}'")
}
