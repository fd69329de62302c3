use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shared application context for global flags
#[derive(Clone, Debug)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
}

#[derive(Parser)]
#[command(name = "doplan-migrate")]
#[command(
    about = "Upgrade a DoPlan project from the legacy phase/feature layout, with backup and rollback"
)]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Report whether the project still uses the legacy layout
    Detect(ProjectArgs),

    /// Back up, transcode the config, and rename legacy folders
    Migrate(MigrateArgs),

    /// Check that no legacy folders remain and the new config exists
    Validate(ProjectArgs),

    /// Restore the legacy subtrees from a backup
    Rollback(RollbackArgs),

    /// List backups, newest first
    Backups(BackupsArgs),

    /// Initialize a doplan-migrate.toml settings file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct ProjectArgs {
    /// Project root
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Print machine-readable JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Show the planned renames without touching the project
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the .doplan/migrate.lock single-run guard
    #[arg(long)]
    pub no_lock: bool,
}

#[derive(Debug, Args)]
pub struct RollbackArgs {
    /// Backup to restore: a name under .doplan/backup, a path, or "latest"
    pub backup: String,

    #[command(flatten)]
    pub project: ProjectArgs,

    /// Skip the .doplan/migrate.lock single-run guard
    #[arg(long)]
    pub no_lock: bool,
}

#[derive(Debug, Args)]
pub struct BackupsArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
}

#[derive(Debug, Parser)]
pub struct InitArgs {
    /// Directory to create the settings file in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite an existing settings file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Write to this directory instead of stdout
    #[arg(long)]
    pub out_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell")]
    PowerShell,
    Elvish,
}
