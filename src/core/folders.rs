//! Legacy phase/feature folders → `<number>-<slug>` folders.
//!
//! Each folder goes through copy → rewrite → remove, in that order, so an
//! interrupted run leaves the old directory plus a partial new one, never
//! neither. Legacy feature folders inside a phase are not copied with the
//! phase; they are moved under the phase's new directory just before the old
//! phase directory is removed, and migrated there as their own descriptors.

use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

use crate::core::detect::{FolderKind, LegacyFolder};
use crate::core::layout::{NamePatterns, PHASE_PLAN_FILE, PLAN_FILE, slugify, strip_numeric_prefix};
use crate::infra::io;

/// Points inside [`FolderMigrator::migrate_one`] where an observer runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// New directory fully populated; nothing handed over or removed yet.
    /// For case-only renames the hook sees the staging directory.
    Copied,
    /// Feature folders handed over; the old directory is about to go.
    BeforeRemoval,
}

type StageHook = Box<dyn FnMut(Stage, &LegacyFolder, &Path) -> Result<()>>;

/// Outcome of one successfully migrated folder.
#[derive(Debug, Clone, Serialize)]
pub struct MigratedFolder {
    pub kind: FolderKind,
    pub from: PathBuf,
    pub to: PathBuf,
    pub files_copied: u64,
    pub files_rewritten: u64,
}

/// One move `migrate_folders` would make, computed without writing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedMove {
    pub kind: FolderKind,
    pub from: PathBuf,
    pub to: PathBuf,
}

pub struct FolderMigrator {
    patterns: NamePatterns,
    /// Original phase path → its migrated directory, for this run.
    relocated: HashMap<PathBuf, PathBuf>,
    completed: Vec<MigratedFolder>,
    hook: Option<StageHook>,
}

impl fmt::Debug for FolderMigrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FolderMigrator")
            .field("relocated", &self.relocated)
            .field("completed", &self.completed.len())
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

impl FolderMigrator {
    pub fn new() -> Result<Self> {
        Ok(Self {
            patterns: NamePatterns::new()?,
            relocated: HashMap::new(),
            completed: Vec::new(),
            hook: None,
        })
    }

    /// Run `hook` at each [`Stage`]; an error from it aborts the folder.
    pub fn with_stage_hook<F>(mut self, hook: F) -> Self
    where
        F: FnMut(Stage, &LegacyFolder, &Path) -> Result<()> + 'static,
    {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Folders fully migrated so far, in order.
    pub fn completed(&self) -> &[MigratedFolder] {
        &self.completed
    }

    /// Migrate every phase, then every feature. Stops at the first failure;
    /// folders already migrated stay migrated.
    #[instrument(skip_all, fields(folders = folders.len()))]
    pub fn migrate_folders(&mut self, folders: &[LegacyFolder]) -> Result<usize> {
        self.relocated.clear();
        self.completed.clear();

        let (phases, features) = partition(folders);
        for folder in phases.into_iter().chain(features) {
            let label = match folder.kind {
                FolderKind::Phase => "phase",
                FolderKind::Feature => "feature",
            };
            self.migrate_one(folder)
                .with_context(|| format!("migrate {label} {}", folder.old_name))?;
        }

        Ok(self.completed.len())
    }

    /// Copy, rewrite references, then remove the old directory.
    #[instrument(skip(self), fields(name = %folder.old_name))]
    pub fn migrate_one(&mut self, folder: &LegacyFolder) -> Result<MigratedFolder> {
        let source = self.current_path(folder);
        let new_name = self.slug_name_at(folder, &source)?;
        self.ensure_new_name(folder, &new_name)?;

        let parent = source
            .parent()
            .with_context(|| format!("no parent directory: {}", source.display()))?;
        let dest = parent.join(&new_name);

        // A case-only rename cannot stat `dest` on case-insensitive
        // filesystems (it resolves to `source`), so look for the exact name
        // and build the new tree under a staging name instead.
        let case_only = new_name.eq_ignore_ascii_case(&folder.old_name);
        let taken = if case_only {
            io::has_entry_named(parent, &new_name)?
        } else {
            io::exists(&dest)?
        };
        if taken {
            bail!("destination already exists: {}", dest.display());
        }
        let work = if case_only {
            parent.join(format!(".{new_name}.migrating"))
        } else {
            dest.clone()
        };
        if io::exists(&work)? {
            bail!("staging directory already exists: {}", work.display());
        }
        fs::create_dir(&work).with_context(|| format!("create dir: {}", work.display()))?;

        let needle = folder.old_name.as_bytes();
        let replacement = new_name.as_bytes();
        let mut files_copied = 0u64;
        let mut files_rewritten = 0u64;
        let mut handover = Vec::new();

        for entry in io::sorted_entries(&source)? {
            let from = entry.path();
            let name = entry.file_name();

            if folder.kind == FolderKind::Phase
                && from.is_dir()
                && name.to_str().is_some_and(|n| self.patterns.is_legacy_feature(n))
            {
                debug!(feature = %name.to_string_lossy(), "left for its own descriptor");
                handover.push(name);
                continue;
            }

            files_copied += io::copy_entry(&from, &work.join(&name), &mut |a, b| {
                if io::copy_file_rewriting(a, b, needle, replacement)? {
                    debug!(file = %b.display(), "references rewritten");
                    files_rewritten += 1;
                }
                Ok(())
            })?;
        }

        let perms = fs::metadata(&source)
            .with_context(|| format!("stat: {}", source.display()))?
            .permissions();
        fs::set_permissions(&work, perms)
            .with_context(|| format!("set permissions: {}", work.display()))?;

        self.run_hook(Stage::Copied, folder, &work)?;

        for name in &handover {
            let from = source.join(name);
            let to = work.join(name);
            fs::rename(&from, &to)
                .with_context(|| format!("move {} → {}", from.display(), to.display()))?;
        }
        if folder.kind == FolderKind::Phase {
            self.relocated.insert(folder.old_path.clone(), dest.clone());
        }

        self.run_hook(Stage::BeforeRemoval, folder, &work)?;

        io::remove_tree(&source)?;

        if work != dest {
            fs::rename(&work, &dest).with_context(|| {
                format!("move {} → {}", work.display(), dest.display())
            })?;
        }

        info!(from = %folder.old_name, to = %new_name, files_copied, files_rewritten, "folder migrated");
        let migrated = MigratedFolder {
            kind: folder.kind,
            from: source,
            to: dest,
            files_copied,
            files_rewritten,
        };
        self.completed.push(migrated.clone());
        Ok(migrated)
    }

    /// `<number>-<slug>` for `folder`, titled from its plan document when it
    /// has an H1, otherwise from its legacy name. Same input, same output.
    pub fn generate_slug_name(&self, folder: &LegacyFolder) -> Result<String> {
        self.slug_name_at(folder, &self.current_path(folder))
    }

    /// Moves `migrate_folders` would perform, phases first, with features
    /// placed under their phase's new directory. Reads plan documents only.
    pub fn plan(&self, folders: &[LegacyFolder]) -> Result<Vec<PlannedMove>> {
        let (phases, features) = partition(folders);
        let mut new_phase_dirs: HashMap<&Path, PathBuf> = HashMap::new();
        let mut moves = Vec::with_capacity(folders.len());

        for folder in phases {
            let to = sibling(&folder.old_path, &self.slug_name_at(folder, &folder.old_path)?)?;
            new_phase_dirs.insert(folder.old_path.as_path(), to.clone());
            moves.push(PlannedMove {
                kind: folder.kind,
                from: folder.old_path.clone(),
                to,
            });
        }

        for folder in features {
            let name = self.slug_name_at(folder, &folder.old_path)?;
            let to = match folder.old_path.parent().and_then(|p| new_phase_dirs.get(p)) {
                Some(new_parent) => new_parent.join(name),
                None => sibling(&folder.old_path, &name)?,
            };
            moves.push(PlannedMove {
                kind: folder.kind,
                from: folder.old_path.clone(),
                to,
            });
        }

        Ok(moves)
    }

    /// Where the folder lives now: under its phase's new directory if that
    /// phase was migrated in this run.
    fn current_path(&self, folder: &LegacyFolder) -> PathBuf {
        if folder.kind == FolderKind::Feature
            && let Some(new_parent) = folder.old_path.parent().and_then(|p| self.relocated.get(p))
        {
            return new_parent.join(&folder.old_name);
        }
        folder.old_path.clone()
    }

    fn slug_name_at(&self, folder: &LegacyFolder, dir: &Path) -> Result<String> {
        let from_title = self.plan_title(folder.kind, dir).map(|t| slugify(&t));
        let slug = match from_title {
            Some(s) if !s.is_empty() => s,
            _ => slugify(strip_numeric_prefix(&folder.old_name)),
        };
        if slug.is_empty() {
            bail!("cannot derive a name for {}", folder.old_name);
        }
        Ok(format!("{}-{}", folder.number(), slug))
    }

    /// H1 text of the folder's plan document; `None` when missing,
    /// unreadable, or without a level-one heading.
    fn plan_title(&self, kind: FolderKind, dir: &Path) -> Option<String> {
        let candidates: &[&str] = match kind {
            FolderKind::Phase => &[PHASE_PLAN_FILE, PLAN_FILE],
            FolderKind::Feature => &[PLAN_FILE],
        };
        candidates.iter().find_map(|file| {
            let bytes = fs::read(dir.join(file)).ok()?;
            let text = String::from_utf8_lossy(&bytes);
            self.patterns.first_heading(&text).map(str::to_string)
        })
    }

    /// Reject names that would not leave the legacy layout behind.
    fn ensure_new_name(&self, folder: &LegacyFolder, new_name: &str) -> Result<()> {
        let still_legacy = match folder.kind {
            FolderKind::Phase => self.patterns.phase_number(new_name).is_some(),
            FolderKind::Feature => self.patterns.feature_number(new_name).is_some(),
        };
        if new_name == folder.old_name || still_legacy {
            let doc = match folder.kind {
                FolderKind::Phase => PHASE_PLAN_FILE,
                FolderKind::Feature => PLAN_FILE,
            };
            warn!(folder = %folder.old_name, new_name, "generated name is still a legacy name");
            bail!(
                "generated name '{new_name}' for {} still follows the legacy naming; \
                 add a '# Title' heading to its {doc}",
                folder.old_name
            );
        }
        Ok(())
    }

    fn run_hook(&mut self, stage: Stage, folder: &LegacyFolder, dest: &Path) -> Result<()> {
        match self.hook.as_mut() {
            Some(hook) => hook(stage, folder, dest),
            None => Ok(()),
        }
    }
}

fn partition(folders: &[LegacyFolder]) -> (Vec<&LegacyFolder>, Vec<&LegacyFolder>) {
    folders.iter().partition(|f| f.kind == FolderKind::Phase)
}

fn sibling(path: &Path, name: &str) -> Result<PathBuf> {
    let parent = path
        .parent()
        .with_context(|| format!("no parent directory: {}", path.display()))?;
    Ok(parent.join(name))
}
