use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::{AppContext, InitArgs};

/// Per-project settings file, looked up in the project root.
pub const SETTINGS_FILE: &str = "doplan-migrate.toml";
/// Environment prefix, e.g. `DOPLAN_MIGRATE_LOG_FILTER=debug`.
pub const ENV_PREFIX: &str = "DOPLAN_MIGRATE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings
{
    /// Tracing filter directive used when `RUST_LOG` is unset
    pub log_filter: String,

    /// Take `.doplan/migrate.lock` before mutating the project
    pub lock: bool,

    /// Print reports as JSON unless overridden on the command line
    pub json: bool,
}

impl Default for Settings
{
    fn default() -> Self
    {
        Self { log_filter: "info".to_string(), lock: true, json: false }
    }
}

/// Defaults, then `<root>/doplan-migrate.toml`, then `DOPLAN_MIGRATE_*`.
pub fn load_settings(root: &Path) -> Result<Settings>
{
    let defaults = Settings::default();
    let mut builder = config::Config::builder()
        .set_default("log_filter", defaults.log_filter)?
        .set_default("lock", defaults.lock)?
        .set_default("json", defaults.json)?;

    let file = root.join(SETTINGS_FILE);
    if file.is_file()
    {
        builder = builder.add_source(config::File::from(file));
    }

    builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true));

    let cfg = builder
        .build()
        .context("Failed to load settings")?;
    let parsed: Settings = cfg
        .try_deserialize()
        .context("Failed to parse settings")?;

    Ok(parsed)
}

pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let settings_path = args
        .path
        .join(SETTINGS_FILE);

    if settings_path.exists() && !args.force
    {
        anyhow::bail!(
            "Settings file already exists at {}. Use --force to overwrite.",
            settings_path.display()
        );
    }

    let toml_string = toml::to_string_pretty(&Settings::default())
        .context("Failed to serialize default settings")?;

    std::fs::write(&settings_path, toml_string).context("Failed to write settings file")?;

    if !ctx.quiet
    {
        println!("Created settings file at {}", settings_path.display());
    }
    Ok(())
}
