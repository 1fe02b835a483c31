//! Repository abstraction for the catalog.
//!
//! The [`Repository`] trait is the backend collaborator the query engine and
//! the wizards consume. Implementations must be `Send + Sync` so a single
//! instance can be shared by the HTTP server's handlers.
//!
//! The helpers in this module ([`materialize`], [`slugify`],
//! [`commit_marker`]) hold the persistence rules every implementation
//! applies, so that an asset saved through the in-memory store and one
//! saved through the file store look the same.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::bucket::Stage;
use crate::error::CatalogError;
use crate::facets::{compute_facets, Facets};
use crate::filter::FilterSet;
use crate::models::{
    Asset, AssetDraft, Comment, Confidentiality, InboxItem, Note, Play, PlayDraft,
};
use crate::plays::{self, PlayCriteria};
use crate::schema::Schema;
use crate::stats::is_stale;

/// Abstract catalog backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`fetch_assets`](Repository::fetch_assets) | Text + filter-set match, newest persisted first |
/// | [`get_asset`](Repository::get_asset) | One asset by id |
/// | [`persist_asset`](Repository::persist_asset) | Save a draft (and optional markdown body) |
/// | [`persist_many`](Repository::persist_many) | Bulk save, all or nothing |
/// | [`verify_asset`](Repository::verify_asset) | Stamp `last_verified` |
/// | [`fetch_inbox_items`](Repository::fetch_inbox_items) | Triage list |
/// | [`update_note`](Repository::update_note) / [`add_comment`](Repository::add_comment) | Annotations |
/// | [`fetch_plays`](Repository::fetch_plays) / [`create_play`](Repository::create_play) | GTM plays |
/// | [`associate_asset`](Repository::associate_asset) | Link an asset to a play |
/// | [`schemas`](Repository::schemas) / [`update_schema`](Repository::update_schema) | Schema admin |
///
/// Client mistakes are reported as [`CatalogError`] inside the
/// `anyhow::Error` so callers can `downcast_ref` them.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn fetch_assets(&self, query: &str, filters: &FilterSet) -> Result<Vec<Asset>>;

    async fn get_asset(&self, id: &str) -> Result<Option<Asset>>;

    async fn fetch_facets(&self) -> Result<Facets> {
        let all = self.fetch_assets("", &FilterSet::new()).await?;
        Ok(compute_facets(&all))
    }

    async fn persist_asset(&self, draft: AssetDraft, content: Option<String>) -> Result<Asset>;

    /// Persists every draft or none. Results are in input order.
    async fn persist_many(&self, drafts: Vec<AssetDraft>) -> Result<Vec<Asset>>;

    async fn verify_asset(&self, id: &str, date: NaiveDate) -> Result<Asset>;

    async fn stale_assets(&self, today: NaiveDate, stale_after_days: u32) -> Result<Vec<Asset>> {
        let all = self.fetch_assets("", &FilterSet::new()).await?;
        Ok(all
            .into_iter()
            .filter(|a| is_stale(a, today, stale_after_days))
            .collect())
    }

    async fn fetch_inbox_items(&self) -> Result<Vec<InboxItem>>;

    /// Removes an inbox item. Returns whether it existed.
    async fn dismiss_inbox_item(&self, id: &str) -> Result<bool>;

    /// Replaces the asset's note. Last write wins.
    async fn update_note(&self, asset_id: &str, note: Note) -> Result<Note>;

    async fn add_comment(&self, asset_id: &str, author: &str, text: &str) -> Result<Comment>;

    async fn fetch_plays(&self) -> Result<Vec<Play>>;

    async fn create_play(&self, draft: PlayDraft) -> Result<Play>;

    /// Links an existing asset to a play in `phase`, or moves an existing
    /// link to that phase. Returns the play with its linked assets.
    async fn associate_asset(&self, play_id: &str, asset_id: &str, phase: Stage) -> Result<Play>;

    async fn match_plays(&self, criteria: &PlayCriteria) -> Result<Vec<Play>> {
        let all = self.fetch_plays().await?;
        Ok(plays::match_plays(&all, criteria))
    }

    async fn schemas(&self) -> Result<Vec<Schema>>;

    async fn update_schema(&self, schema: Schema) -> Result<Schema>;
}

/// Initial contents for a repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub inbox: Vec<InboxItem>,
    #[serde(default)]
    pub plays: Vec<Play>,
    /// Replacements for the built-in schemas.
    #[serde(default)]
    pub schemas: Vec<Schema>,
}

/// Ids that collide with fixed routes under `/api/assets/`.
pub const RESERVED_IDS: &[&str] = &["stale", "bulk"];

/// Turns a draft into a persisted asset.
///
/// Rejects a blank title, a missing type or category, empty owners, a
/// reserved id, and an id that is already taken in `existing`. A supplied
/// id is kept, otherwise a UUID v4 is assigned. The storage path is
/// `<type>/<year>/<slug>`; see [`unique_path`] for how taken paths are
/// resolved.
pub fn materialize(
    draft: AssetDraft,
    content: Option<String>,
    now: DateTime<Utc>,
    existing: &[Asset],
) -> Result<Asset, CatalogError> {
    let title = draft
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| CatalogError::Invalid("title must not be empty".into()))?
        .to_string();
    let asset_type = draft
        .asset_type
        .ok_or_else(|| CatalogError::Invalid("type is required".into()))?;
    let category = draft
        .category
        .ok_or_else(|| CatalogError::Invalid("category is required".into()))?;
    let owners: Vec<String> = draft
        .owners
        .unwrap_or_default()
        .into_iter()
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect();
    if owners.is_empty() {
        return Err(CatalogError::Invalid("at least one owner is required".into()));
    }

    let id = match draft.id.filter(|id| !id.trim().is_empty()) {
        Some(id) if RESERVED_IDS.contains(&id.as_str()) => {
            return Err(CatalogError::Invalid(format!("id '{}' is reserved", id)));
        }
        Some(id) if existing.iter().any(|a| a.id == id) => {
            return Err(CatalogError::Duplicate(id));
        }
        Some(id) => id,
        None => uuid::Uuid::new_v4().to_string(),
    };

    let base = format!("{}/{}/{}", asset_type, now.year(), slugify(&title));
    let path = unique_path(&base, &id, existing);

    let mut asset = Asset {
        id,
        title,
        asset_type,
        category,
        confidentiality: draft.confidentiality.unwrap_or(Confidentiality::InternalOnly),
        summary: draft.summary.unwrap_or_default(),
        industry: draft.industry,
        region: draft.region,
        offering: draft.offering,
        stage: draft.stage,
        tags: draft.tags.unwrap_or_default(),
        related_technologies: draft.related_technologies.unwrap_or_default(),
        owners,
        author: draft.author.unwrap_or_default(),
        artifacts: draft.artifacts.unwrap_or_default(),
        metrics: draft.metrics.unwrap_or_default(),
        created_at: Some(now),
        updated_at: Some(now),
        path,
        commit_sha: String::new(),
        customer_real: draft.customer_real,
        customer_anonymized: draft.customer_anonymized,
        last_verified: None,
        content,
        notes: None,
        comments: Vec::new(),
        custom: draft.custom,
    };
    asset.commit_sha = commit_marker(&asset);
    Ok(asset)
}

/// `base` if no asset in `existing` uses it. Otherwise `base-<slug of id>`,
/// then `base-<slug of id>-2`, `-3`, and so on until a free path is found.
pub fn unique_path(base: &str, id: &str, existing: &[Asset]) -> String {
    let taken = |path: &str| existing.iter().any(|a| a.path == path);
    if !taken(base) {
        return base.to_string();
    }
    let with_id = format!("{}-{}", base, slugify(id));
    let mut candidate = with_id.clone();
    let mut n = 2;
    while taken(&candidate) {
        candidate = format!("{}-{}", with_id, n);
        n += 1;
    }
    candidate
}

/// [`materialize`] for a batch. Later drafts see earlier ones, so ids and
/// paths stay unique within the batch too.
pub fn materialize_all(
    drafts: Vec<AssetDraft>,
    now: DateTime<Utc>,
    existing: &[Asset],
) -> Result<Vec<Asset>, CatalogError> {
    let mut seen = existing.to_vec();
    let mut out = Vec::with_capacity(drafts.len());
    for draft in drafts {
        let asset = materialize(draft, None, now, &seen)?;
        seen.push(asset.clone());
        out.push(asset);
    }
    Ok(out)
}

/// Seven hex characters of the SHA-256 of the record (with an empty
/// `commit_sha`) followed by its content.
pub fn commit_marker(asset: &Asset) -> String {
    let mut unmarked = asset.clone();
    unmarked.commit_sha.clear();
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(&unmarked).unwrap_or_default());
    if let Some(content) = &asset.content {
        hasher.update(content.as_bytes());
    }
    let digest = format!("{:x}", hasher.finalize());
    digest[..7].to_string()
}

/// Lowercase ASCII slug: alphanumerics kept, every other run collapsed to a
/// single `-`.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}

/// Checks a comment body and builds the comment.
pub fn new_comment(author: &str, text: &str, now: DateTime<Utc>) -> Result<Comment, CatalogError> {
    let content = text.trim();
    if content.is_empty() {
        return Err(CatalogError::Invalid("comment must not be empty".into()));
    }
    let author = author.trim();
    Ok(Comment {
        id: uuid::Uuid::new_v4().to_string(),
        author: if author.is_empty() {
            "Anonymous".to_string()
        } else {
            author.to_string()
        },
        content: content.to_string(),
        timestamp: now,
    })
}

/// Checks a play draft and builds the play.
pub fn new_play(draft: PlayDraft, now: DateTime<Utc>) -> Result<Play, CatalogError> {
    let title = draft.title.trim();
    if title.is_empty() {
        return Err(CatalogError::Invalid("play title must not be empty".into()));
    }
    Ok(Play {
        id: uuid::Uuid::new_v4().to_string(),
        title: title.to_string(),
        summary: draft.summary,
        offering: draft.offering,
        technologies: draft.technologies,
        stage_scope: draft.stage_scope,
        sector: draft.sector,
        geo: draft.geo,
        tags: draft.tags,
        owners: draft.owners,
        updated_at: Some(now),
        match_score: None,
        links: Vec::new(),
        assets: Vec::new(),
    })
}
