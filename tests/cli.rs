mod util;

use assert_cmd::Command;
use assert_fs::prelude::*;
use clap::Parser;
use doplan_migrate::cli::{Cli, Commands, MigrateArgs, RollbackArgs};
use predicates::prelude::*;
use util::{legacy_project, write};

fn bin() -> Command
{
    let mut cmd = Command::cargo_bin("doplan-migrate").unwrap();
    cmd.env_remove("RUST_LOG").arg("--no-color");
    cmd
}

#[test]
fn migrate_flag_parsing()
{
    // Given
    let argv = vec!["doplan-migrate", "migrate", "proj", "--dry-run", "--json"];

    // When
    let cli = Cli::parse_from(argv);

    // Then
    match cli.command
    {
        Commands::Migrate(MigrateArgs { project, dry_run, no_lock }) =>
        {
            assert!(dry_run);
            assert!(!no_lock);
            assert!(project.json);
            assert_eq!(project.path, std::path::PathBuf::from("proj"));
        }
        _ => panic!("expected Migrate command"),
    }
}

#[test]
fn rollback_defaults_to_current_dir()
{
    let cli = Cli::parse_from(["doplan-migrate", "rollback", "latest"]);
    match cli.command
    {
        Commands::Rollback(RollbackArgs { backup, project, .. }) =>
        {
            assert_eq!(backup, "latest");
            assert_eq!(project.path, std::path::PathBuf::from("."));
        }
        _ => panic!("expected Rollback command"),
    }
}

#[test]
fn detect_json_on_empty_project()
{
    let tmp = assert_fs::TempDir::new().unwrap();

    bin()
        .args(["detect", "--json"])
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"legacy\": false"))
        .stdout(predicate::str::contains("\"folders\": []"));
}

#[test]
fn migrate_reports_count_and_backup()
{
    let tmp = legacy_project();

    bin()
        .arg("migrate")
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Migrated 2 folder(s)"))
        .stdout(predicate::str::contains("Backup:"));

    tmp.child("doplan/01-authentication/01-login-flow").assert(predicate::path::is_dir());
    tmp.child(".doplan/migrate.lock").assert(predicate::path::is_file());

    bin().arg("validate").arg(tmp.path()).assert().success();
}

#[test]
fn dry_run_leaves_project_alone()
{
    let tmp = legacy_project();

    bin()
        .args(["migrate", "--dry-run"])
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("01-authentication/01-login-flow"));

    tmp.child("doplan/01-phase").assert(predicate::path::is_dir());
    tmp.child(".doplan").assert(predicate::path::missing());
}

#[test]
fn failed_migration_prints_rollback_hint()
{
    let tmp = legacy_project();
    write(tmp.path(), ".cursor/config/doplan-config.json", "not json");

    bin()
        .arg("migrate")
        .arg(tmp.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("config transcoding failed"))
        .stdout(predicate::str::contains("Roll back with: doplan-migrate rollback"))
        .stderr(predicate::str::contains("migration incomplete"));
}

#[test]
fn backups_then_rollback_latest()
{
    let tmp = legacy_project();
    bin().arg("migrate").arg(tmp.path()).assert().success();

    bin()
        .arg("backups")
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Backup"))
        .stdout(predicate::str::contains("doplan"));

    bin()
        .args(["rollback", "latest"])
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Restored from"));

    tmp.child("doplan/01-phase/01-Feature/plan.md").assert("# Login Flow\n\nPart of 01-Feature.\n");
    tmp.child("doplan/01-authentication").assert(predicate::path::missing());
}

#[test]
fn nothing_to_migrate_is_success()
{
    let tmp = assert_fs::TempDir::new().unwrap();

    bin()
        .arg("migrate")
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to migrate"));
}

#[test]
fn validate_fails_on_legacy_project()
{
    let tmp = legacy_project();

    bin()
        .arg("validate")
        .arg(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("validation failed"));
}
