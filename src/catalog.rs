//! Opens the repository selected by `[store]`.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use gitkb_core::store::memory::InMemoryRepository;
use gitkb_core::store::{Repository, Seed};

use crate::client::HttpRepository;
use crate::config::{Config, StoreKind};
use crate::file_store::FileRepository;

pub async fn open_repository(config: &Config) -> Result<Arc<dyn Repository>> {
    let store = &config.store;
    let repo: Arc<dyn Repository> = match store.kind {
        StoreKind::Memory => {
            let seed = match &store.seed {
                Some(path) => load_seed(path)?,
                None => Seed::default(),
            };
            tracing::debug!(assets = seed.assets.len(), "opening in-memory store");
            Arc::new(InMemoryRepository::new(seed))
        }
        StoreKind::Files => {
            let root = store
                .root
                .as_deref()
                .context("store.root must be set when store.kind is 'files'")?;
            let repo = FileRepository::open(root)?;
            if let Some(seed) = &store.seed {
                if repo
                    .fetch_assets("", &Default::default())
                    .await?
                    .is_empty()
                {
                    repo.import_seed(&load_seed(seed)?)?;
                    tracing::info!(root = %root.display(), "seeded empty catalog");
                }
            }
            Arc::new(repo)
        }
        StoreKind::Remote => {
            let url = store
                .url
                .as_deref()
                .context("store.url must be set when store.kind is 'remote'")?;
            Arc::new(HttpRepository::new(
                url,
                Duration::from_secs(store.timeout_secs),
            )?)
        }
    };
    Ok(repo)
}

/// Reads a JSON [`Seed`] file.
pub fn load_seed(path: &Path) -> Result<Seed> {
    let raw = std::fs::read(path)
        .with_context(|| format!("Failed to read seed file: {}", path.display()))?;
    serde_json::from_slice(&raw)
        .with_context(|| format!("Failed to parse seed file: {}", path.display()))
}
