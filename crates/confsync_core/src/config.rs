use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use toml::Value;

pub const CONFIG_FILENAME: &str = "confsync.toml";
pub const MIRROR_DIR_NAME: &str = ".confsync_mirror";
pub const DEFAULT_PUBLISH_COMMAND: &str = "markdown-publisher";
pub const DEFAULT_ATTACHMENTS_DIR: &str = "assets";
pub const DEFAULT_PUBLISH_ROOT: &str = ".";

/// Configuration shared with the external publisher, stored at the content
/// tree root. The sync engine reads every key but mutates only
/// `publish_root` (temporarily) and `ignore` (idempotent append).
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct SyncConfig {
    pub base_url: Option<String>,
    pub space_key: Option<String>,
    pub parent_page_id: Option<String>,
    pub username: Option<String>,
    pub api_token: Option<String>,
    pub publish_root: Option<String>,
    pub publish_command: Option<String>,
    #[serde(default)]
    pub ignore: Vec<String>,
    pub attachments_dir: Option<String>,
}

impl SyncConfig {
    /// Required before any mutation occurs.
    pub fn base_url(&self) -> Result<&str> {
        match self.base_url.as_deref() {
            Some(url) if !url.trim().is_empty() => Ok(url),
            _ => bail!("`base_url` is not set in {CONFIG_FILENAME}"),
        }
    }

    /// Required before any mutation occurs.
    pub fn space_key(&self) -> Result<&str> {
        match self.space_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => bail!("`space_key` is not set in {CONFIG_FILENAME}"),
        }
    }

    /// Resolve the publisher username: env CONFSYNC_USERNAME > config.
    pub fn username(&self) -> Option<String> {
        if let Ok(value) = env::var("CONFSYNC_USERNAME") {
            let trimmed = value.trim().to_string();
            if !trimmed.is_empty() {
                return Some(trimmed);
            }
        }
        self.username.clone()
    }

    /// Resolve the publisher API token: env CONFSYNC_API_TOKEN > config.
    pub fn api_token(&self) -> Option<String> {
        if let Ok(value) = env::var("CONFSYNC_API_TOKEN") {
            let trimmed = value.trim().to_string();
            if !trimmed.is_empty() {
                return Some(trimmed);
            }
        }
        self.api_token.clone()
    }

    pub fn publish_root(&self) -> &str {
        self.publish_root.as_deref().unwrap_or(DEFAULT_PUBLISH_ROOT)
    }

    pub fn publish_command(&self) -> &str {
        self.publish_command
            .as_deref()
            .unwrap_or(DEFAULT_PUBLISH_COMMAND)
    }

    pub fn attachments_dir(&self) -> &str {
        self.attachments_dir
            .as_deref()
            .unwrap_or(DEFAULT_ATTACHMENTS_DIR)
    }

    /// The directory the publisher reads documents from, resolved against the
    /// tree root. Avoids a literal `.` component so path comparisons against
    /// the mirror directory stay exact.
    pub fn content_root(&self, tree_root: &Path) -> PathBuf {
        match self.publish_root() {
            DEFAULT_PUBLISH_ROOT => tree_root.to_path_buf(),
            other => tree_root.join(other),
        }
    }
}

/// Load and parse the sync configuration. A missing file is a configuration
/// error: no defaults can stand in for `base_url`/`space_key`.
pub fn load_config(config_path: &Path) -> Result<SyncConfig> {
    if !config_path.exists() {
        bail!(
            "no {CONFIG_FILENAME} found at {} (run `confsync init` first)",
            config_path.display()
        );
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: SyncConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

/// Append each of `entries` to the `ignore` array iff not already present,
/// preserving every other key in the file. Returns `true` when a write
/// occurred.
pub fn ensure_ignores(config_path: &Path, entries: &[&str]) -> Result<bool> {
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let mut root: Value = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    let original = root.clone();

    let root_table = root.as_table_mut().ok_or_else(|| {
        anyhow::anyhow!("top-level TOML must be a table in {}", config_path.display())
    })?;
    let ignore_entry = root_table
        .entry("ignore".to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    let ignore_array = ignore_entry.as_array_mut().ok_or_else(|| {
        anyhow::anyhow!("`ignore` must be an array in {}", config_path.display())
    })?;

    for entry in entries {
        let present = ignore_array
            .iter()
            .any(|value| value.as_str() == Some(entry));
        if !present {
            ignore_array.push(Value::String((*entry).to_string()));
        }
    }

    if root == original {
        return Ok(false);
    }
    write_config_value(config_path, &root)?;
    Ok(true)
}

/// Point the external publisher's content root at `new_root`, preserving
/// every other key in the file. The orchestrator restores the original bytes
/// when the run ends.
pub fn repoint_publish_root(config_path: &Path, new_root: &str) -> Result<()> {
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let mut root: Value = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    let root_table = root.as_table_mut().ok_or_else(|| {
        anyhow::anyhow!("top-level TOML must be a table in {}", config_path.display())
    })?;
    root_table.insert(
        "publish_root".to_string(),
        Value::String(new_root.to_string()),
    );
    write_config_value(config_path, &root)
}

fn write_config_value(config_path: &Path, root: &Value) -> Result<()> {
    let rendered = toml::to_string_pretty(root).context("failed to serialize config TOML")?;
    fs::write(config_path, rendered)
        .with_context(|| format!("failed to write {}", config_path.display()))?;
    Ok(())
}

/// Materialize a commented starter configuration. Returns `false` when the
/// file already exists and `force` is unset.
pub fn write_starter_config(config_path: &Path, force: bool) -> Result<bool> {
    if config_path.exists() && !force {
        return Ok(false);
    }
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(config_path, starter_config_text())
        .with_context(|| format!("failed to write {}", config_path.display()))?;
    Ok(true)
}

fn starter_config_text() -> String {
    format!(
        "# confsync configuration (materialized by `confsync init`)\n\
         # base_url = \"https://your-site.atlassian.net\"\n\
         # space_key = \"DOC\"\n\
         # parent_page_id = \"12345\"\n\
         # username = \"you@example.org\"        # or env CONFSYNC_USERNAME\n\
         # api_token = \"...\"                   # or env CONFSYNC_API_TOKEN\n\
         publish_root = \"{DEFAULT_PUBLISH_ROOT}\"\n\
         publish_command = \"{DEFAULT_PUBLISH_COMMAND}\"\n\
         attachments_dir = \"{DEFAULT_ATTACHMENTS_DIR}\"\n\
         ignore = [\"{MIRROR_DIR_NAME}\", \"{DEFAULT_ATTACHMENTS_DIR}\"]\n"
    )
}
