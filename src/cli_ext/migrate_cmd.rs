//! CLI command handlers around the migration engine.
//!
//! All user-facing reporting lives here: the engine returns values and
//! errors, these handlers print them. A failed migration is always printed
//! together with its backup path.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use owo_colors::OwoColorize;
use serde_json::json;
use tabled::{Table, Tabled};
use tracing::{info, instrument};

use crate::cli::{AppContext, MigrateArgs, ProjectArgs, RollbackArgs, BackupsArgs};
use crate::core::backup::{list_backups, resolve_backup};
use crate::core::detect::FolderKind;
use crate::core::layout::Layout;
use crate::core::migrate::{MigrationError, MigrationPlan, MigrationResult, Migrator};
use crate::infra::config::Settings;
use crate::infra::lock::RunLock;

#[derive(Tabled)]
struct BackupRow
{
    #[tabled(rename = "Backup")]
    name: String,
    #[tabled(rename = "Created")]
    created: String,
    #[tabled(rename = "Contents")]
    contents: String,
}

/// `detect`: legacy or not, and which folders.
#[instrument(skip_all)]
pub fn detect(
    args: ProjectArgs,
    settings: &Settings,
    ctx: &AppContext,
) -> Result<()>
{
    let root = project_root(&args.path)?;
    let migrator = Migrator::new(&root)?;
    let legacy = migrator.detector().detect_legacy_structure()?;
    let folders = migrator.detector().detect_legacy_folders()?;

    if args.json || settings.json
    {
        let out = json!({ "root": root, "legacy": legacy, "folders": folders });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if !legacy
    {
        println!("{} No legacy layout in {}", ok_mark(ctx), root.display());
        return Ok(());
    }

    println!("{} Legacy layout found in {}", warn_mark(ctx), root.display());
    for f in &folders
    {
        let kind = match f.kind
        {
            FolderKind::Phase => "phase",
            FolderKind::Feature => "feature",
        };
        println!("  {kind:<8} {}", rel(&root, &f.old_path));
    }
    Ok(())
}

/// `migrate`: run the engine (or its dry-run plan) and report.
#[instrument(skip_all)]
pub fn migrate(
    args: MigrateArgs,
    settings: &Settings,
    ctx: &AppContext,
) -> Result<()>
{
    let json_out = args.project.json || settings.json;
    let root = project_root(&args.project.path)?;
    let mut migrator = Migrator::new(&root)?;

    if args.dry_run
    {
        return match migrator.plan()
        {
            Ok(plan) => print_plan(&root, &plan, json_out, ctx),
            Err(MigrationError::NothingToMigrate(_)) => print_nothing(&root, json_out, ctx),
            Err(e) => Err(e.into()),
        };
    }

    if !migrator.detector().detect_legacy_structure()?
    {
        return print_nothing(&root, json_out, ctx);
    }

    let mut lock = if settings.lock && !args.no_lock
    {
        Some(RunLock::open(&Layout::new(&root).lock_file())?)
    }
    else
    {
        None
    };
    let _guard = match lock.as_mut()
    {
        Some(l) => Some(l.acquire()?),
        None => None,
    };

    let result = match migrator.migrate()
    {
        Ok(r) => r,
        Err(MigrationError::NothingToMigrate(_)) => return print_nothing(&root, json_out, ctx),
        Err(e) => return Err(e.into()),
    };

    print_result(&root, &result, json_out, ctx)?;

    if !result.success
    {
        bail!(
            "migration incomplete ({} error(s)); backup kept at {}",
            result.errors.len(),
            result.backup_path.display()
        );
    }
    Ok(())
}

/// `validate`: post-conditions only, no changes.
#[instrument(skip_all)]
pub fn validate(
    args: ProjectArgs,
    settings: &Settings,
    ctx: &AppContext,
) -> Result<()>
{
    let root = project_root(&args.path)?;
    let outcome = Migrator::new(&root)?.validate();

    if args.json || settings.json
    {
        let out = json!({
            "root": root,
            "valid": outcome.is_ok(),
            "error": outcome.as_ref().err().map(|e| e.to_string()),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    }
    else if outcome.is_ok()
    {
        println!("{} Project layout is current", ok_mark(ctx));
    }

    outcome.context("validation failed")
}

/// `rollback`: restore from a named, path-given, or latest backup.
#[instrument(skip_all)]
pub fn rollback(
    args: RollbackArgs,
    settings: &Settings,
    ctx: &AppContext,
) -> Result<()>
{
    let root = project_root(&args.project.path)?;
    let backup = resolve_backup(&root, &args.backup)?;
    let migrator = Migrator::new(&root)?;

    let mut lock = if settings.lock && !args.no_lock
    {
        Some(RunLock::open(&Layout::new(&root).lock_file())?)
    }
    else
    {
        None
    };
    let _guard = match lock.as_mut()
    {
        Some(l) => Some(l.acquire()?),
        None => None,
    };

    migrator.rollback(&backup)?;
    info!(backup = %backup.display(), "rolled back");

    if args.project.json || settings.json
    {
        let out = json!({ "root": root, "restored_from": backup });
        println!("{}", serde_json::to_string_pretty(&out)?);
    }
    else if !ctx.quiet
    {
        println!("{} Restored from {}", ok_mark(ctx), backup.display());
    }
    Ok(())
}

/// `backups`: what can be rolled back to.
#[instrument(skip_all)]
pub fn backups(
    args: BackupsArgs,
    settings: &Settings,
    ctx: &AppContext,
) -> Result<()>
{
    let root = project_root(&args.project.path)?;
    let list = list_backups(&root)?;

    if args.project.json || settings.json
    {
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }

    if list.is_empty()
    {
        if !ctx.quiet
        {
            println!("No backups in {}", Layout::new(&root).backup_root().display());
        }
        return Ok(());
    }

    let rows: Vec<BackupRow> = list
        .iter()
        .map(|b| BackupRow {
            name: b.name.clone(),
            created: b.created.format("%Y-%m-%d %H:%M:%S").to_string(),
            contents: if b.subtrees.is_empty()
            {
                "(empty)".to_string()
            }
            else
            {
                b.subtrees
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            },
        })
        .collect();
    println!("{}", Table::new(rows));
    Ok(())
}

fn print_result(
    root: &Path,
    result: &MigrationResult,
    json_out: bool,
    ctx: &AppContext,
) -> Result<()>
{
    if json_out
    {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    if result.success
    {
        println!(
            "{} Migrated {} folder(s) in {}",
            ok_mark(ctx),
            result.folders_migrated,
            root.display()
        );
    }
    else
    {
        println!(
            "{} Migration finished with {} error(s); {} folder(s) migrated",
            fail_mark(ctx),
            result.errors.len(),
            result.folders_migrated
        );
        for e in &result.errors
        {
            println!("  - {e}");
        }
    }

    println!("  Backup: {}", result.backup_path.display());
    if !result.success
    {
        let name = result
            .backup_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| result.backup_path.display().to_string());
        println!("  Roll back with: doplan-migrate rollback {name} {}", root.display());
    }
    Ok(())
}

fn print_plan(
    root: &Path,
    plan: &MigrationPlan,
    json_out: bool,
    ctx: &AppContext,
) -> Result<()>
{
    if json_out
    {
        println!("{}", serde_json::to_string_pretty(plan)?);
        return Ok(());
    }

    println!("{} Dry run for {}", warn_mark(ctx), root.display());
    println!("  Backup into: {}", rel(root, &plan.backup_root));
    if plan.transcode_config
    {
        println!("  Config: .cursor/config/doplan-config.json → .doplan/config.yaml");
    }
    for m in &plan.moves
    {
        println!("  {} → {}", rel(root, &m.from), rel(root, &m.to));
    }
    Ok(())
}

fn print_nothing(
    root: &Path,
    json_out: bool,
    ctx: &AppContext,
) -> Result<()>
{
    if json_out
    {
        let out = json!({ "root": root, "nothing_to_migrate": true });
        println!("{}", serde_json::to_string_pretty(&out)?);
    }
    else if !ctx.quiet
    {
        println!("{} Nothing to migrate in {}", ok_mark(ctx), root.display());
    }
    Ok(())
}

fn project_root(path: &Path) -> Result<PathBuf>
{
    dunce::canonicalize(path).with_context(|| format!("project root: {}", path.display()))
}

fn rel(
    root: &Path,
    path: &Path,
) -> String
{
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn ok_mark(ctx: &AppContext) -> String
{
    if ctx.no_color { "✓".to_string() } else { "✓".green().to_string() }
}

fn warn_mark(ctx: &AppContext) -> String
{
    if ctx.no_color { "!".to_string() } else { "!".yellow().to_string() }
}

fn fail_mark(ctx: &AppContext) -> String
{
    if ctx.no_color { "✗".to_string() } else { "✗".red().bold().to_string() }
}
