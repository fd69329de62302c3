//! **doplan-migrate** - Upgrade DoPlan projects from the legacy layout
//!
//! Detects `<n>-phase` / `<n>-Feature` folders and the flat JSON config,
//! snapshots them, transcodes the config to YAML, renames folders to
//! `<n>-<slug>` while rewriting references, and validates the result.
//! Every step takes the project root explicitly; nothing reads the process
//! working directory.

/// Command-line interface with clap integration
pub mod cli;

/// Command handlers that own all user-facing output
pub mod cli_ext {
    /// detect / migrate / validate / rollback / backups
    pub mod migrate_cmd;
}

/// Shell completion generation
pub mod completion;

/// Migration engine - detect, snapshot, transform, verify, roll back
pub mod core {
    /// Fixed legacy and current paths, name patterns, slugs
    pub mod layout;
    pub use layout::{Layout, slugify};

    /// Read-only legacy structure detection
    pub mod detect;
    pub use detect::{FolderKind, LegacyFolder, StructureDetector};

    /// Timestamped snapshots and restore
    pub mod backup;
    pub use backup::{BackupInfo, BackupManager, list_backups, resolve_backup};

    /// Legacy JSON config → nested YAML config
    pub mod transcode;
    pub use transcode::{ConfigTranscoder, LegacyConfig, NewConfig};

    /// Copy → rewrite → remove folder migration
    pub mod folders;
    pub use folders::{FolderMigrator, MigratedFolder, PlannedMove, Stage};

    /// Orchestration and error policy
    pub mod migrate;
    pub use migrate::{
        MigrationError, MigrationPlan, MigrationResult, MigrationState, Migrator, StepError,
        ValidationError,
    };
}

/// Infrastructure - settings, I/O, logging, locking
pub mod infra {
    /// Layered settings (defaults, TOML file, environment)
    pub mod config;
    pub use config::{Settings, load_settings};

    /// Copy, rewrite and atomic-write primitives
    pub mod io;

    /// Tracing subscriber for the binary
    pub mod logging;

    /// Advisory single-run lock
    pub mod lock;
    pub use lock::RunLock;
}

// Strategic re-exports for callers embedding the engine
pub use cli::{AppContext, Cli, Commands};
pub use core::{MigrationError, MigrationResult, Migrator};
pub use infra::{Settings, load_settings};
