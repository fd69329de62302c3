//! Sequences detection, backup, config transcoding, folder migration and
//! validation, and decides what is fatal.
//!
//! Past the backup step a run always yields a [`MigrationResult`] carrying
//! the backup path; later failures are recorded in it instead of returned.

use serde::{Serialize, Serializer};
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

use crate::core::backup::BackupManager;
use crate::core::detect::{LegacyFolder, StructureDetector};
use crate::core::folders::{FolderMigrator, PlannedMove};
use crate::core::layout::Layout;
use crate::core::transcode::ConfigTranscoder;

/// Fatal outcomes of the orchestrator's operations.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// Not a failure: the root has no legacy structure.
    #[error("nothing to migrate: no legacy structure in {}", .0.display())]
    NothingToMigrate(PathBuf),

    #[error("legacy structure detection failed: {0:#}")]
    Detection(anyhow::Error),

    /// No live content was touched.
    #[error("backup failed, nothing was changed: {0:#}")]
    Backup(anyhow::Error),

    /// The project is in an unknown state and needs manual attention.
    #[error("restore from {} failed, manual recovery required: {cause:#}", .backup.display())]
    Restore {
        backup: PathBuf,
        cause: anyhow::Error,
    },

    #[error("engine setup failed: {0:#}")]
    Setup(anyhow::Error),
}

/// Post-condition failures found by [`Migrator::validate`].
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("new config not found at {}", .0.display())]
    MissingConfig(PathBuf),

    #[error("{} legacy folder(s) remain: {}", .0.len(), .0.join(", "))]
    LegacyFoldersRemain(Vec<String>),

    #[error("could not check for legacy folders: {0:#}")]
    Detection(anyhow::Error),
}

/// Non-fatal failures recorded during a run.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("config transcoding failed: {0:#}")]
    Transcode(anyhow::Error),

    #[error("legacy folder detection failed: {0:#}")]
    Detection(anyhow::Error),

    #[error("folder migration failed: {0:#}")]
    Folders(anyhow::Error),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
}

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MigrationState {
    NotStarted,
    Detecting,
    BackingUp,
    Transforming,
    Validating,
    Succeeded,
    Failed,
}

/// Summary of one `migrate` call. Read-only; never persisted here.
#[derive(Debug, Serialize)]
pub struct MigrationResult {
    pub success: bool,
    pub backup_path: PathBuf,
    pub folders_migrated: usize,
    #[serde(serialize_with = "display_all")]
    pub errors: Vec<StepError>,
}

/// What `migrate` would do, computed without writing.
#[derive(Debug, Serialize)]
pub struct MigrationPlan {
    pub backup_root: PathBuf,
    pub transcode_config: bool,
    pub moves: Vec<PlannedMove>,
}

fn display_all<S: Serializer>(errors: &[StepError], s: S) -> Result<S::Ok, S::Error> {
    s.collect_seq(errors.iter().map(|e| e.to_string()))
}

/// The migration engine for one project root.
#[derive(Debug)]
pub struct Migrator {
    layout: Layout,
    detector: StructureDetector,
    backup: BackupManager,
    transcoder: ConfigTranscoder,
    state: MigrationState,
}

impl Migrator {
    pub fn new(root: &Path) -> Result<Self, MigrationError> {
        Ok(Self {
            layout: Layout::new(root),
            detector: StructureDetector::new(root).map_err(MigrationError::Setup)?,
            backup: BackupManager::new(root),
            transcoder: ConfigTranscoder::new(root),
            state: MigrationState::NotStarted,
        })
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    pub fn state(&self) -> MigrationState {
        self.state
    }

    pub fn detector(&self) -> &StructureDetector {
        &self.detector
    }

    /// Run the whole migration. See the module docs for which failures are
    /// returned and which are recorded.
    #[instrument(skip(self), fields(root = %self.layout.root().display()))]
    pub fn migrate(&mut self) -> Result<MigrationResult, MigrationError> {
        self.enter(MigrationState::Detecting);
        let present = match self.detector.detect_legacy_structure() {
            Ok(p) => p,
            Err(e) => {
                self.enter(MigrationState::Failed);
                return Err(MigrationError::Detection(e));
            }
        };
        if !present {
            self.enter(MigrationState::NotStarted);
            return Err(MigrationError::NothingToMigrate(self.layout.root().to_path_buf()));
        }

        self.enter(MigrationState::BackingUp);
        let backup_path = match self.backup.create_backup() {
            Ok(p) => p,
            Err(e) => {
                self.enter(MigrationState::Failed);
                return Err(MigrationError::Backup(e));
            }
        };

        let mut result = MigrationResult {
            success: false,
            backup_path,
            folders_migrated: 0,
            errors: Vec::new(),
        };

        self.enter(MigrationState::Transforming);
        if let Err(e) = self.transcoder.transcode() {
            warn!(error = %format!("{e:#}"), "config transcoding failed; continuing with folders");
            result.errors.push(StepError::Transcode(e));
        }

        match self.detector.detect_legacy_folders() {
            Ok(folders) => {
                let (migrated, error) = migrate_folders(&folders);
                result.folders_migrated = migrated;
                if let Some(e) = error {
                    warn!(error = %format!("{e:#}"), migrated, "folder migration stopped");
                    result.errors.push(StepError::Folders(e));
                }
            }
            Err(e) => result.errors.push(StepError::Detection(e)),
        }

        self.enter(MigrationState::Validating);
        if let Err(e) = self.validate() {
            warn!(error = %e, "validation failed");
            result.errors.push(e.into());
        }

        result.success = result.errors.is_empty();
        self.enter(if result.success {
            MigrationState::Succeeded
        } else {
            MigrationState::Failed
        });
        info!(
            success = result.success,
            folders = result.folders_migrated,
            errors = result.errors.len(),
            backup = %result.backup_path.display(),
            "migration finished"
        );
        Ok(result)
    }

    /// New config present and no legacy folder left.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let config = self.layout.new_config_file();
        if !config.is_file() {
            return Err(ValidationError::MissingConfig(config));
        }

        let remaining = self
            .detector
            .detect_legacy_folders()
            .map_err(ValidationError::Detection)?;
        if !remaining.is_empty() {
            return Err(ValidationError::LegacyFoldersRemain(
                remaining.into_iter().map(|f| display_rel(self.root(), &f)).collect(),
            ));
        }

        Ok(())
    }

    /// Restore the live subtrees from `backup_path`.
    #[instrument(skip(self), fields(root = %self.layout.root().display()))]
    pub fn rollback(&self, backup_path: &Path) -> Result<(), MigrationError> {
        self.backup
            .restore_backup(backup_path)
            .map_err(|cause| MigrationError::Restore {
                backup: backup_path.to_path_buf(),
                cause,
            })
    }

    /// Dry run: what `migrate` would back up, transcode and move.
    pub fn plan(&self) -> Result<MigrationPlan, MigrationError> {
        let present = self
            .detector
            .detect_legacy_structure()
            .map_err(MigrationError::Detection)?;
        if !present {
            return Err(MigrationError::NothingToMigrate(self.layout.root().to_path_buf()));
        }

        let folders = self
            .detector
            .detect_legacy_folders()
            .map_err(MigrationError::Detection)?;
        let moves = FolderMigrator::new()
            .and_then(|m| m.plan(&folders))
            .map_err(MigrationError::Detection)?;

        Ok(MigrationPlan {
            backup_root: self.layout.backup_root(),
            transcode_config: self.layout.legacy_config_file().is_file(),
            moves,
        })
    }

    fn enter(&mut self, next: MigrationState) {
        tracing::debug!(from = ?self.state, to = ?next, "state");
        self.state = next;
    }
}

/// Count of completed folders, plus the error that stopped the pass.
fn migrate_folders(folders: &[LegacyFolder]) -> (usize, Option<anyhow::Error>) {
    let mut migrator = match FolderMigrator::new() {
        Ok(m) => m,
        Err(e) => return (0, Some(e)),
    };
    match migrator.migrate_folders(folders) {
        Ok(n) => (n, None),
        Err(e) => (migrator.completed().len(), Some(e)),
    }
}

fn display_rel(root: &Path, folder: &LegacyFolder) -> String {
    folder
        .old_path
        .strip_prefix(root)
        .unwrap_or(&folder.old_path)
        .display()
        .to_string()
}
