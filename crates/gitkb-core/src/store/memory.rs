//! In-memory [`Repository`] implementation for tests, demos, and the
//! `memory` store kind.
//!
//! State lives behind a single `std::sync::RwLock`. The seed it was built
//! from is kept so [`InMemoryRepository::reset`] can restore it.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use crate::bucket::Stage;
use crate::error::CatalogError;
use crate::filter::FilterSet;
use crate::models::{Asset, AssetDraft, Comment, InboxItem, Note, Play, PlayDraft};
use crate::plays::{attach_assets, link_asset};
use crate::query::fetch_matching;
use crate::schema::{Schema, SchemaRegistry};

use super::{materialize, materialize_all, new_comment, new_play, Repository, Seed};

struct State {
    /// Newest persisted first.
    assets: Vec<Asset>,
    inbox: Vec<InboxItem>,
    plays: Vec<Play>,
    schemas: SchemaRegistry,
}

impl State {
    fn from_seed(seed: &Seed) -> Self {
        let mut schemas = SchemaRegistry::builtin();
        for schema in &seed.schemas {
            if let Err(e) = schemas.update(schema.clone()) {
                tracing::warn!(schema = %schema.id, error = %e, "ignoring invalid seeded schema");
            }
        }
        Self {
            assets: seed.assets.clone(),
            inbox: seed.inbox.clone(),
            plays: seed.plays.clone(),
            schemas,
        }
    }

    fn asset_mut(&mut self, id: &str) -> Result<&mut Asset> {
        self.assets
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| CatalogError::asset_not_found(id).into())
    }
}

/// Repository holding everything in process memory.
pub struct InMemoryRepository {
    seed: Seed,
    state: RwLock<State>,
}

impl InMemoryRepository {
    pub fn new(seed: Seed) -> Self {
        let state = State::from_seed(&seed);
        Self {
            seed,
            state: RwLock::new(state),
        }
    }

    /// Discards every change since construction.
    pub fn reset(&self) -> Result<()> {
        *self.write()? = State::from_seed(&self.seed);
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| anyhow!("in-memory repository lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| anyhow!("in-memory repository lock poisoned"))
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new(Seed::default())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn fetch_assets(&self, query: &str, filters: &FilterSet) -> Result<Vec<Asset>> {
        let state = self.read()?;
        Ok(fetch_matching(query, filters, &state.assets))
    }

    async fn get_asset(&self, id: &str) -> Result<Option<Asset>> {
        let state = self.read()?;
        Ok(state.assets.iter().find(|a| a.id == id).cloned())
    }

    async fn persist_asset(&self, draft: AssetDraft, content: Option<String>) -> Result<Asset> {
        let mut state = self.write()?;
        let asset = materialize(draft, content, Utc::now(), &state.assets)?;
        tracing::debug!(id = %asset.id, path = %asset.path, "persisted asset");
        state.assets.insert(0, asset.clone());
        Ok(asset)
    }

    async fn persist_many(&self, drafts: Vec<AssetDraft>) -> Result<Vec<Asset>> {
        let mut state = self.write()?;
        let batch = materialize_all(drafts, Utc::now(), &state.assets)?;
        tracing::debug!(count = batch.len(), "persisted asset batch");
        state.assets.splice(0..0, batch.iter().cloned());
        Ok(batch)
    }

    async fn verify_asset(&self, id: &str, date: NaiveDate) -> Result<Asset> {
        let mut state = self.write()?;
        let asset = state.asset_mut(id)?;
        asset.last_verified = Some(date);
        Ok(asset.clone())
    }

    async fn fetch_inbox_items(&self) -> Result<Vec<InboxItem>> {
        Ok(self.read()?.inbox.clone())
    }

    async fn dismiss_inbox_item(&self, id: &str) -> Result<bool> {
        let mut state = self.write()?;
        let before = state.inbox.len();
        state.inbox.retain(|i| i.id != id);
        Ok(state.inbox.len() != before)
    }

    async fn update_note(&self, asset_id: &str, mut note: Note) -> Result<Note> {
        let mut state = self.write()?;
        let asset = state.asset_mut(asset_id)?;
        note.updated_at = Some(Utc::now());
        asset.notes = Some(note.clone());
        Ok(note)
    }

    async fn add_comment(&self, asset_id: &str, author: &str, text: &str) -> Result<Comment> {
        let comment = new_comment(author, text, Utc::now())?;
        let mut state = self.write()?;
        state.asset_mut(asset_id)?.comments.push(comment.clone());
        Ok(comment)
    }

    async fn fetch_plays(&self) -> Result<Vec<Play>> {
        let state = self.read()?;
        let mut plays = state.plays.clone();
        attach_assets(&mut plays, &state.assets);
        Ok(plays)
    }

    async fn create_play(&self, draft: PlayDraft) -> Result<Play> {
        let play = new_play(draft, Utc::now())?;
        self.write()?.plays.insert(0, play.clone());
        Ok(play)
    }

    async fn associate_asset(&self, play_id: &str, asset_id: &str, phase: Stage) -> Result<Play> {
        let mut state = self.write()?;
        if !state.assets.iter().any(|a| a.id == asset_id) {
            return Err(CatalogError::asset_not_found(asset_id).into());
        }
        let play = state
            .plays
            .iter_mut()
            .find(|p| p.id == play_id)
            .ok_or_else(|| CatalogError::play_not_found(play_id))?;
        link_asset(play, asset_id, phase);
        let mut linked = vec![play.clone()];
        attach_assets(&mut linked, &state.assets);
        Ok(linked.remove(0))
    }

    async fn schemas(&self) -> Result<Vec<Schema>> {
        Ok(self.read()?.schemas.all())
    }

    async fn update_schema(&self, schema: Schema) -> Result<Schema> {
        self.write()?.schemas.update(schema.clone())?;
        Ok(schema)
    }
}
