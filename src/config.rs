//! TOML configuration.
//!
//! Every section is optional; a missing file section falls back to the
//! defaults below. See `config/gitkb.example.toml` for a full example.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub import: ImportConfig,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Memory,
    Files,
    Remote,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default)]
    pub kind: StoreKind,
    /// Catalog directory for the `files` store.
    #[serde(default)]
    pub root: Option<PathBuf>,
    /// JSON seed for the `memory` store.
    #[serde(default)]
    pub seed: Option<PathBuf>,
    /// API base URL for the `remote` store, e.g. `http://127.0.0.1:8000/api`.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::Memory,
            root: None,
            seed: None,
            url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    #[serde(default = "default_stale_after_days")]
    pub stale_after_days: u32,
    #[serde(default = "default_author")]
    pub default_author: String,
    #[serde(default = "default_owners")]
    pub default_owners: Vec<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            stale_after_days: default_stale_after_days(),
            default_author: default_author(),
            default_owners: default_owners(),
        }
    }
}

fn default_stale_after_days() -> u32 {
    180
}
fn default_author() -> String {
    "Current User".to_string()
}
fn default_owners() -> Vec<String> {
    vec!["current.user@example.com".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImportConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
    #[serde(default = "default_max_summary_chars")]
    pub max_summary_chars: usize,
    /// Files larger than this are imported from their name alone.
    #[serde(default = "default_max_extract_bytes")]
    pub max_extract_bytes: u64,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
            max_summary_chars: default_max_summary_chars(),
            max_extract_bytes: default_max_extract_bytes(),
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*".to_string()]
}
fn default_max_summary_chars() -> usize {
    280
}
fn default_max_extract_bytes() -> u64 {
    50 * 1024 * 1024
}

impl Config {
    /// In-memory store with every default. Used when no config file is
    /// needed (e.g. `gitkb extract`).
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    match config.store.kind {
        StoreKind::Files if config.store.root.is_none() => {
            bail!("store.root must be set when store.kind is 'files'")
        }
        StoreKind::Remote if config.store.url.as_deref().map_or(true, str::is_empty) => {
            bail!("store.url must be set when store.kind is 'remote'")
        }
        _ => {}
    }

    if config.store.timeout_secs == 0 {
        bail!("store.timeout_secs must be > 0");
    }

    if config.catalog.stale_after_days == 0 {
        bail!("catalog.stale_after_days must be > 0");
    }

    if config
        .catalog
        .default_owners
        .iter()
        .all(|o| o.trim().is_empty())
    {
        bail!("catalog.default_owners must contain at least one owner");
    }

    if config.import.max_summary_chars == 0 {
        bail!("import.max_summary_chars must be > 0");
    }

    Ok(())
}
