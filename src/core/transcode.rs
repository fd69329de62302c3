//! One-directional conversion of the legacy flat JSON config into the
//! nested YAML config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument};

use crate::core::layout::{Layout, slugify};
use crate::infra::io;

/// Marker files checked in order; first hit decides `project.type`.
pub const PROJECT_MARKERS: &[(&str, &str)] = &[("package.json", "web"), ("go.mod", "api")];
/// `project.type` when no marker is present.
pub const DEFAULT_PROJECT_TYPE: &str = "generic";
/// Fixed `design.tokensPath`.
pub const DESIGN_TOKENS_PATH: &str = "doplan/design/design-tokens.json";

/// `.cursor/config/doplan-config.json`. Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyConfig {
    #[serde(default)]
    pub ide: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub github: LegacyGithub,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyGithub {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, rename = "autoBranch")]
    pub auto_branch: bool,
    #[serde(default, rename = "autoPR")]
    pub auto_pr: bool,
}

/// `.doplan/config.yaml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewConfig {
    pub project: ProjectSection,
    pub github: GithubSection,
    pub design: DesignSection,
    pub security: SecuritySection,
    pub apis: ApisSection,
    pub tui: TuiSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSection {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
    pub ide: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubSection {
    /// Never populated by transcoding; the legacy record has no source for it.
    pub repository: String,
    pub enabled: bool,
    #[serde(rename = "autoBranch")]
    pub auto_branch: bool,
    #[serde(rename = "autoPR")]
    pub auto_pr: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignSection {
    #[serde(rename = "hasPreferences")]
    pub has_preferences: bool,
    #[serde(rename = "tokensPath")]
    pub tokens_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecuritySection {
    #[serde(rename = "lastScan")]
    pub last_scan: Option<String>,
    #[serde(rename = "autoFix")]
    pub auto_fix: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApisSection {
    pub configured: Vec<String>,
    pub required: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuiSection {
    pub theme: String,
    pub animations: bool,
}

impl NewConfig {
    /// Map a legacy record onto the new schema; inferred fields are passed in.
    pub fn from_legacy(legacy: &LegacyConfig, name: String, kind: String) -> Self {
        Self {
            project: ProjectSection {
                name,
                kind,
                version: legacy.version.clone(),
                ide: legacy.ide.clone(),
            },
            github: GithubSection {
                repository: String::new(),
                enabled: legacy.github.enabled,
                auto_branch: legacy.github.auto_branch,
                auto_pr: legacy.github.auto_pr,
            },
            design: DesignSection {
                has_preferences: false,
                tokens_path: DESIGN_TOKENS_PATH.to_string(),
            },
            security: SecuritySection {
                last_scan: None,
                auto_fix: false,
            },
            apis: ApisSection {
                configured: Vec::new(),
                required: Vec::new(),
            },
            tui: TuiSection {
                theme: "default".to_string(),
                animations: true,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigTranscoder {
    layout: Layout,
}

impl ConfigTranscoder {
    pub fn new(root: &Path) -> Self {
        Self {
            layout: Layout::new(root),
        }
    }

    /// Read the legacy record, write the new one. The legacy file is kept.
    #[instrument(skip(self), fields(root = %self.layout.root().display()))]
    pub fn transcode(&self) -> Result<NewConfig> {
        let legacy = self.load_legacy()?;
        let config = NewConfig::from_legacy(&legacy, self.project_name()?, self.project_type()?);

        let yaml = serde_yaml::to_string(&config).context("serialize new config")?;
        let target = self.layout.new_config_file();
        io::write_atomic(&target, yaml.as_bytes())
            .with_context(|| format!("write new config: {}", target.display()))?;

        info!(path = %target.display(), "config transcoded");
        Ok(config)
    }

    pub fn load_legacy(&self) -> Result<LegacyConfig> {
        let path = self.layout.legacy_config_file();
        let text = fs::read_to_string(&path)
            .with_context(|| format!("read legacy config: {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parse legacy config: {}", path.display()))
    }

    /// Slug of the root directory's own name.
    pub fn project_name(&self) -> Result<String> {
        let root = dunce::canonicalize(self.layout.root())
            .with_context(|| format!("canonicalize {}", self.layout.root().display()))?;
        let base = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let slug = slugify(&base);
        Ok(if slug.is_empty() { "project".to_string() } else { slug })
    }

    /// First marker file present in the root decides the type.
    pub fn project_type(&self) -> Result<String> {
        for (marker, kind) in PROJECT_MARKERS {
            if io::exists(&self.layout.root().join(marker))? {
                debug!(marker, kind, "project type inferred");
                return Ok((*kind).to_string());
            }
        }
        Ok(DEFAULT_PROJECT_TYPE.to_string())
    }
}
