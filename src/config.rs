use crate::rules::{self, RuleRegistry};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name of the per-project configuration file, looked up in the workspace root.
pub const PROJECT_CONFIG_FILE: &str = ".mixsize.toml";

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Directory, relative to the workspace root, image paths are written against.
    pub images_root: String,
    /// Replace width/height values that are already present.
    pub overwrite_existing: bool,
    /// Search the whole workspace when an image is not under `images_root`.
    pub glob_fallback: bool,
    pub unsupported_extensions: Vec<String>,
    /// Raw rule entries; see [`Config::rules`].
    pub target_rules: Vec<toml::Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            images_root: "app/assets/images".to_string(),
            overwrite_existing: true,
            glob_fallback: true,
            unsupported_extensions: vec!["avif".to_string()],
            target_rules: rules::default_entries(),
        }
    }
}

impl Config {
    /// Normalizes `target_rules`. Done on every call so edits to the file
    /// apply without restarting anything.
    pub fn rules(&self) -> RuleRegistry {
        RuleRegistry::from_entries(&self.target_rules)
    }
}

/// Loads the configuration for a workspace.
///
/// An explicit file wins, then `.mixsize.toml` in `root`, then the user
/// configuration file.
pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        return load_from_path(path);
    }

    let project = root.join(PROJECT_CONFIG_FILE);
    if project.is_file() {
        return load_from_path(&project);
    }

    load_or_create()
}

pub fn load_from_path(path: &Path) -> Result<Config> {
    debug!(path = %path.display(), "loading config");
    let config_string = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    let config: Config = toml::from_str(&config_string)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))?;
    Ok(fill_defaults(config))
}

fn user_config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::new();
    Ok(xdg_dirs.place_config_file("mixsize/config.toml")?)
}

pub fn load_or_create() -> Result<Config> {
    let config_path = user_config_path()?;

    if !config_path.exists() {
        let default_config = Config::default();
        let toml_string = toml::to_string_pretty(&default_config)?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&config_path, toml_string)?;

        info!(path = %config_path.display(), "created default config");
        return Ok(default_config);
    }

    let config_string = fs::read_to_string(&config_path)?;
    let final_config = load_from_path(&config_path)?;

    // Write the completed config back so every option is visible to the user.
    let final_toml_string = toml::to_string_pretty(&final_config)?;
    if final_toml_string != config_string {
        fs::write(&config_path, final_toml_string)?;
    }

    Ok(final_config)
}

/// Fills in missing fields with default values.
fn fill_defaults(config: Config) -> Config {
    let default_config = Config::default();
    Config {
        images_root: if config.images_root.trim().is_empty() {
            default_config.images_root
        } else {
            config.images_root
        },
        target_rules: if config.target_rules.is_empty() {
            default_config.target_rules
        } else {
            config.target_rules
        },
        ..config
    }
}
