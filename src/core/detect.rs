//! Read-only inspection of a project root for the legacy layout.
//!
//! Produces transient [`LegacyFolder`] descriptors. Nothing here writes to
//! disk, and every call re-reads the tree.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

use crate::core::layout::{Layout, NamePatterns};
use crate::infra::io;

/// Which legacy convention a directory follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FolderKind {
    Phase,
    Feature,
}

/// One legacy directory scheduled for migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegacyFolder {
    pub kind: FolderKind,
    pub old_path: PathBuf,
    pub old_name: String,
    pub phase_number: String,
    /// Present only for [`FolderKind::Feature`].
    pub feature_number: Option<String>,
}

impl LegacyFolder {
    /// The number that prefixes the migrated name.
    pub fn number(&self) -> &str {
        match self.kind {
            FolderKind::Phase => &self.phase_number,
            FolderKind::Feature => self.feature_number.as_deref().unwrap_or(&self.phase_number),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StructureDetector {
    layout: Layout,
    patterns: NamePatterns,
}

impl StructureDetector {
    pub fn new(root: &Path) -> Result<Self> {
        Ok(Self {
            layout: Layout::new(root),
            patterns: NamePatterns::new()?,
        })
    }

    /// Whether the root still carries legacy structure.
    ///
    /// The legacy config only counts while no new config exists: once
    /// transcoded it stays on disk as a record, not as pending work.
    #[instrument(skip(self), fields(root = %self.layout.root().display()))]
    pub fn detect_legacy_structure(&self) -> Result<bool> {
        if io::exists(&self.layout.legacy_config_file())?
            && !io::exists(&self.layout.new_config_file())?
        {
            debug!("legacy config present and not yet transcoded");
            return Ok(true);
        }

        let folders = self.detect_legacy_folders()?;
        if let Some(first) = folders.first() {
            debug!(folder = %first.old_name, count = folders.len(), "legacy folders present");
            return Ok(true);
        }

        Ok(false)
    }

    /// Every legacy phase folder and the legacy feature folders directly
    /// inside it. Feature folders left inside an already migrated
    /// `<n>-<slug>` phase are reported too, numbered from that parent. A
    /// missing content directory yields an empty list.
    #[instrument(skip(self), fields(root = %self.layout.root().display()))]
    pub fn detect_legacy_folders(&self) -> Result<Vec<LegacyFolder>> {
        let content = self.layout.content_dir();
        if !io::exists(&content)? {
            return Ok(Vec::new());
        }

        let mut folders = Vec::new();
        for entry in io::sorted_entries(&content)? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !is_dir(&entry)? {
                continue;
            }
            let path = entry.path();

            if let Some(phase_number) = self.patterns.phase_number(name) {
                folders.push(LegacyFolder {
                    kind: FolderKind::Phase,
                    old_path: path.clone(),
                    old_name: name.to_string(),
                    phase_number: phase_number.to_string(),
                    feature_number: None,
                });
                self.collect_features(&path, phase_number, &mut folders)?;
            } else if let Some(phase_number) = self.patterns.numbered_prefix(name) {
                let before = folders.len();
                self.collect_features(&path, phase_number, &mut folders)?;
                if folders.len() > before {
                    debug!(parent = name, "legacy features under a migrated phase");
                }
            }
        }

        debug!(count = folders.len(), "legacy folders detected");
        Ok(folders)
    }

    fn collect_features(
        &self,
        phase_path: &Path,
        phase_number: &str,
        out: &mut Vec<LegacyFolder>,
    ) -> Result<()> {
        for entry in io::sorted_entries(phase_path)? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(feature_number) = self.patterns.feature_number(name) else {
                continue;
            };
            if !is_dir(&entry)? {
                continue;
            }
            out.push(LegacyFolder {
                kind: FolderKind::Feature,
                old_path: entry.path(),
                old_name: name.to_string(),
                phase_number: phase_number.to_string(),
                feature_number: Some(feature_number.to_string()),
            });
        }
        Ok(())
    }
}

fn is_dir(entry: &std::fs::DirEntry) -> Result<bool> {
    let ty = entry
        .file_type()
        .with_context(|| format!("stat: {}", entry.path().display()))?;
    Ok(ty.is_dir())
}
