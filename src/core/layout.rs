//! Fixed on-disk layout of a DoPlan project, legacy and current.
//!
//! Every path the engine touches is derived from an explicit project root
//! through [`Layout`]; nothing here consults the process working directory.

use anyhow::{Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};

/// Legacy configuration directory, relative to the project root.
pub const LEGACY_CONFIG_DIR: [&str; 2] = [".cursor", "config"];
/// Legacy flat JSON record inside [`LEGACY_CONFIG_DIR`].
pub const LEGACY_CONFIG_FILE: &str = "doplan-config.json";
/// Content directory holding phase and feature folders (both layouts).
pub const CONTENT_DIR: &str = "doplan";
/// Hidden state directory of the current layout.
pub const STATE_DIR: &str = ".doplan";
/// Nested YAML record inside [`STATE_DIR`].
pub const NEW_CONFIG_FILE: &str = "config.yaml";
/// Backup root inside [`STATE_DIR`].
pub const BACKUP_DIR: &str = "backup";
/// Phase-level plan document.
pub const PHASE_PLAN_FILE: &str = "phase-plan.md";
/// Feature-level plan document (also the phase fallback).
pub const PLAN_FILE: &str = "plan.md";

/// Path resolver bound to one project root.
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `.cursor/config`
    pub fn legacy_config_dir(&self) -> PathBuf {
        LEGACY_CONFIG_DIR
            .iter()
            .fold(self.root.clone(), |acc, c| acc.join(c))
    }

    /// `.cursor/config/doplan-config.json`
    pub fn legacy_config_file(&self) -> PathBuf {
        self.legacy_config_dir().join(LEGACY_CONFIG_FILE)
    }

    /// `doplan`
    pub fn content_dir(&self) -> PathBuf {
        self.root.join(CONTENT_DIR)
    }

    /// `.doplan`
    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    /// `.doplan/config.yaml`
    pub fn new_config_file(&self) -> PathBuf {
        self.state_dir().join(NEW_CONFIG_FILE)
    }

    /// `.doplan/backup`
    pub fn backup_root(&self) -> PathBuf {
        self.state_dir().join(BACKUP_DIR)
    }

    /// `.doplan/migrate.lock`, taken by callers that want single-flight runs.
    pub fn lock_file(&self) -> PathBuf {
        self.state_dir().join("migrate.lock")
    }

    /// The two mutable legacy subtrees as (root-relative, absolute) pairs.
    pub fn mutable_subtrees(&self) -> [(PathBuf, PathBuf); 2] {
        let config_rel: PathBuf = LEGACY_CONFIG_DIR.iter().collect();
        [
            (config_rel, self.legacy_config_dir()),
            (PathBuf::from(CONTENT_DIR), self.content_dir()),
        ]
    }
}

/// Compiled directory-name and heading patterns.
#[derive(Debug, Clone)]
pub struct NamePatterns {
    phase: Regex,
    feature: Regex,
    numbered: Regex,
    heading: Regex,
}

impl NamePatterns {
    pub fn new() -> Result<Self> {
        Ok(Self {
            phase: Regex::new(r"^(\d+)-phase$").context("compile phase pattern")?,
            feature: Regex::new(r"^(\d+)-Feature$").context("compile feature pattern")?,
            numbered: Regex::new(r"^(\d+)-.").context("compile numbered pattern")?,
            heading: Regex::new(r"(?m)^#[ \t]+(.+?)[ \t]*\r?$")
                .context("compile heading pattern")?,
        })
    }

    /// Numeric prefix of a legacy phase directory name.
    pub fn phase_number<'a>(&self, name: &'a str) -> Option<&'a str> {
        self.phase
            .captures(name)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }

    /// Numeric prefix of a legacy feature directory name.
    pub fn feature_number<'a>(&self, name: &'a str) -> Option<&'a str> {
        self.feature
            .captures(name)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }

    /// Numeric prefix of any `<digits>-<rest>` name, e.g. a migrated phase.
    pub fn numbered_prefix<'a>(&self, name: &'a str) -> Option<&'a str> {
        self.numbered
            .captures(name)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }

    pub fn is_legacy_feature(&self, name: &str) -> bool {
        self.feature.is_match(name)
    }

    /// Text of the first level-one Markdown heading, trimmed.
    pub fn first_heading<'a>(&self, markdown: &'a str) -> Option<&'a str> {
        self.heading
            .captures(markdown)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim())
            .filter(|t| !t.is_empty())
    }
}

/// Lowercase, collapse runs of non-alphanumerics to one hyphen, trim hyphens.
pub fn slugify(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !out.is_empty() {
                out.push('-');
            }
            pending_hyphen = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    out
}

/// Drop a leading `<digits>-` prefix, if any.
pub fn strip_numeric_prefix(name: &str) -> &str {
    match name.split_once('-') {
        Some((head, rest)) if !head.is_empty() && head.bytes().all(|b| b.is_ascii_digit()) => {
            rest
        }
        _ => name,
    }
}
