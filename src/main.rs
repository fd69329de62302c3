use std::path::Path;

use anyhow::Result;
use clap::Parser;
use doplan_migrate::cli::{AppContext, Cli, Commands};
use doplan_migrate::cli_ext::migrate_cmd;
use doplan_migrate::infra::{config, logging};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Build a context once, pass everywhere
    let ctx = AppContext {
        quiet: cli.quiet,
        no_color: cli.no_color,
    };

    // Settings are per project, so resolve the root before logging starts
    let root = match &cli.command {
        Commands::Detect(a) | Commands::Validate(a) => a.path.as_path(),
        Commands::Migrate(a) => a.project.path.as_path(),
        Commands::Rollback(a) => a.project.path.as_path(),
        Commands::Backups(a) => a.project.path.as_path(),
        Commands::Init(a) => a.path.as_path(),
        Commands::Completions(_) => Path::new("."),
    };
    let settings = config::load_settings(root)?;
    logging::init(&settings.log_filter, ctx.quiet, ctx.no_color)?;

    match cli.command {
        Commands::Detect(args) => migrate_cmd::detect(args, &settings, &ctx),
        Commands::Migrate(args) => migrate_cmd::migrate(args, &settings, &ctx),
        Commands::Validate(args) => migrate_cmd::validate(args, &settings, &ctx),
        Commands::Rollback(args) => migrate_cmd::rollback(args, &settings, &ctx),
        Commands::Backups(args) => migrate_cmd::backups(args, &settings, &ctx),
        Commands::Init(args) => config::init(args, &ctx),
        Commands::Completions(args) => doplan_migrate::completion::run(args, &ctx),
    }
}
