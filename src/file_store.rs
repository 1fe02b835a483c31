//! Git-friendly, file-backed [`Repository`].
//!
//! # Layout
//!
//! ```text
//! <root>/
//!   .gitkb/inbox.json       inbox items
//!   .gitkb/plays.json       plays (with their asset links), newest first
//!   .gitkb/schemas.json     admin schema overrides
//!   <type>/<year>/<slug>/
//!     metadata.json         the asset record, without its body
//!     content.md            optional markdown body
//! ```
//!
//! Every file is plain, pretty-printed JSON or markdown so the tree can be
//! committed and reviewed like code. Writes go to a temp file and are
//! renamed into place. A corrupt `metadata.json` is skipped with a warning
//! instead of failing the listing.
//!
//! Filesystem work runs on tokio's blocking pool.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use walkdir::WalkDir;

use gitkb_core::bucket::Stage;
use gitkb_core::filter::FilterSet;
use gitkb_core::models::{Asset, AssetDraft, Comment, InboxItem, Note, Play, PlayDraft};
use gitkb_core::plays::{attach_assets, link_asset};
use gitkb_core::query::fetch_matching;
use gitkb_core::schema::{Schema, SchemaRegistry};
use gitkb_core::store::{
    materialize, materialize_all, new_comment, new_play, Repository, Seed,
};
use gitkb_core::CatalogError;

const CATALOG_DIR: &str = ".gitkb";
const METADATA_FILE: &str = "metadata.json";
const CONTENT_FILE: &str = "content.md";

pub struct FileRepository {
    catalog: Arc<Catalog>,
}

/// The on-disk catalog. Every method is synchronous.
struct Catalog {
    root: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

/// What [`Catalog::write_asset`] put on disk, so a batch can undo it.
struct Written {
    dir: PathBuf,
    created_dir: bool,
}

impl FileRepository {
    /// Opens (and creates, if needed) a catalog rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(root.join(CATALOG_DIR))
            .with_context(|| format!("Failed to create catalog at {}", root.display()))?;
        Ok(Self {
            catalog: Arc::new(Catalog {
                root,
                lock: Mutex::new(()),
            }),
        })
    }

    pub fn root(&self) -> &Path {
        &self.catalog.root
    }

    /// Writes every record of `seed` into an empty catalog.
    pub fn import_seed(&self, seed: &Seed) -> Result<()> {
        let catalog = &self.catalog;
        let _guard = catalog.guard()?;
        if !catalog.load_assets()?.is_empty() {
            bail!("catalog at {} is not empty", catalog.root.display());
        }
        for asset in &seed.assets {
            catalog.write_asset(asset)?;
        }
        catalog.write_catalog("inbox", &seed.inbox)?;
        catalog.write_catalog("plays", &seed.plays)?;
        if !seed.schemas.is_empty() {
            let registry = SchemaRegistry::with_overrides(seed.schemas.clone())?;
            catalog.write_catalog("schemas", &registry.all())?;
        }
        Ok(())
    }

    /// Runs `op` against the catalog on the blocking pool.
    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Catalog) -> Result<T> + Send + 'static,
    {
        let catalog = Arc::clone(&self.catalog);
        tokio::task::spawn_blocking(move || op(&catalog))
            .await
            .context("file repository task panicked")?
    }
}

impl Catalog {
    fn guard(&self) -> Result<MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|_| anyhow!("file repository lock poisoned"))
    }

    /// Every asset, newest first. Undated assets go last, ties by path.
    fn load_assets(&self) -> Result<Vec<Asset>> {
        let mut assets = Vec::new();
        let walker = WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|e| e.file_name() != CATALOG_DIR && e.file_name() != ".git");
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() || entry.file_name() != METADATA_FILE {
                continue;
            }
            match read_asset(entry.path()) {
                Ok(asset) => assets.push(asset),
                Err(e) => {
                    tracing::warn!(path = %entry.path().display(), error = %e, "skipping unreadable asset");
                }
            }
        }
        assets.sort_by(|a, b| {
            b.created_at
                .is_some()
                .cmp(&a.created_at.is_some())
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| a.path.cmp(&b.path))
        });
        Ok(assets)
    }

    fn asset_dir(&self, asset: &Asset) -> PathBuf {
        self.root.join(&asset.path)
    }

    /// Writes `asset` into its directory. A directory that already holds a
    /// different asset (or an unreadable record) is refused. On failure,
    /// anything this call created is removed again.
    fn write_asset(&self, asset: &Asset) -> Result<Written> {
        if asset.path.is_empty() || asset.path.split('/').any(|p| p == ".." || p.is_empty()) {
            bail!("asset {} has an unusable path '{}'", asset.id, asset.path);
        }
        let dir = self.asset_dir(asset);
        let metadata_path = dir.join(METADATA_FILE);
        let fresh = !metadata_path.exists();
        if !fresh {
            let holder = read_asset(&metadata_path).map(|a| a.id).ok();
            if holder.as_deref() != Some(asset.id.as_str()) {
                bail!(
                    "{} already holds {}; refusing to overwrite it with asset {}",
                    dir.display(),
                    holder.as_deref().unwrap_or("an unreadable record"),
                    asset.id
                );
            }
        }

        let written = Written {
            created_dir: !dir.exists(),
            dir,
        };
        let result = std::fs::create_dir_all(&written.dir)
            .with_context(|| format!("Failed to create {}", written.dir.display()))
            .and_then(|()| write_record(&written.dir, asset));
        if let Err(e) = result {
            if fresh {
                written.undo();
            }
            return Err(e);
        }
        Ok(written)
    }

    /// Loads, edits, and rewrites one asset.
    fn modify_asset<T>(&self, id: &str, edit: impl FnOnce(&mut Asset) -> T) -> Result<T> {
        let _guard = self.guard()?;
        let mut asset = self
            .load_assets()?
            .into_iter()
            .find(|a| a.id == id)
            .ok_or_else(|| CatalogError::asset_not_found(id))?;
        let out = edit(&mut asset);
        self.write_asset(&asset)?;
        Ok(out)
    }

    fn catalog_path(&self, name: &str) -> PathBuf {
        self.root.join(CATALOG_DIR).join(format!("{}.json", name))
    }

    fn read_catalog<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T> {
        let path = self.catalog_path(name);
        if !path.exists() {
            return Ok(T::default());
        }
        let raw = std::fs::read(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_slice(&raw).with_context(|| format!("Failed to parse {}", path.display()))
    }

    fn write_catalog<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        write_atomic(&self.catalog_path(name), &serde_json::to_vec_pretty(value)?)
    }

    fn registry(&self) -> Result<SchemaRegistry> {
        let overrides: Vec<Schema> = self.read_catalog("schemas")?;
        Ok(SchemaRegistry::with_overrides(overrides)?)
    }

    fn plays_with_assets(&self) -> Result<Vec<Play>> {
        let mut plays: Vec<Play> = self.read_catalog("plays")?;
        attach_assets(&mut plays, &self.load_assets()?);
        Ok(plays)
    }

    fn persist_many(&self, drafts: Vec<AssetDraft>) -> Result<Vec<Asset>> {
        let _guard = self.guard()?;
        let existing = self.load_assets()?;
        let batch = materialize_all(drafts, now(), &existing)?;
        let mut written: Vec<Written> = Vec::with_capacity(batch.len());
        for asset in &batch {
            match self.write_asset(asset) {
                Ok(w) => written.push(w),
                Err(e) => {
                    for w in &written {
                        w.undo();
                    }
                    return Err(e);
                }
            }
        }
        tracing::info!(count = batch.len(), "persisted asset batch");
        Ok(batch)
    }

    fn associate_asset(&self, play_id: &str, asset_id: &str, phase: Stage) -> Result<Play> {
        let _guard = self.guard()?;
        let assets = self.load_assets()?;
        if !assets.iter().any(|a| a.id == asset_id) {
            return Err(CatalogError::asset_not_found(asset_id).into());
        }
        let mut plays: Vec<Play> = self.read_catalog("plays")?;
        let play = plays
            .iter_mut()
            .find(|p| p.id == play_id)
            .ok_or_else(|| CatalogError::play_not_found(play_id))?;
        link_asset(play, asset_id, phase);
        let mut linked = vec![play.clone()];
        self.write_catalog("plays", &plays)?;
        attach_assets(&mut linked, &assets);
        Ok(linked.remove(0))
    }
}

impl Written {
    /// Removes a freshly written asset: the whole directory if the write
    /// created it, otherwise just the asset's files.
    fn undo(&self) {
        if self.created_dir {
            let _ = std::fs::remove_dir_all(&self.dir);
        } else {
            for name in [METADATA_FILE, CONTENT_FILE] {
                let _ = std::fs::remove_file(self.dir.join(name));
            }
        }
    }
}

fn write_record(dir: &Path, asset: &Asset) -> Result<()> {
    let mut record = asset.clone();
    let content = record.content.take();
    write_atomic(&dir.join(METADATA_FILE), &serde_json::to_vec_pretty(&record)?)?;
    if let Some(content) = content {
        write_atomic(&dir.join(CONTENT_FILE), content.as_bytes())?;
    }
    Ok(())
}

fn read_asset(metadata_path: &Path) -> Result<Asset> {
    let raw = std::fs::read(metadata_path)?;
    let mut asset: Asset = serde_json::from_slice(&raw)?;
    if let Some(dir) = metadata_path.parent() {
        let content_path = dir.join(CONTENT_FILE);
        if content_path.exists() {
            asset.content = Some(std::fs::read_to_string(&content_path)?);
        }
    }
    Ok(asset)
}

/// Records store timestamps at whole seconds, so stamp them that way.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes).with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move {} into place", path.display()))?;
    Ok(())
}

#[async_trait]
impl Repository for FileRepository {
    async fn fetch_assets(&self, query: &str, filters: &FilterSet) -> Result<Vec<Asset>> {
        let assets = self.blocking(|c| c.load_assets()).await?;
        Ok(fetch_matching(query, filters, &assets))
    }

    async fn get_asset(&self, id: &str) -> Result<Option<Asset>> {
        let id = id.to_string();
        self.blocking(move |c| Ok(c.load_assets()?.into_iter().find(|a| a.id == id)))
            .await
    }

    async fn persist_asset(&self, draft: AssetDraft, content: Option<String>) -> Result<Asset> {
        self.blocking(move |c| {
            let _guard = c.guard()?;
            let existing = c.load_assets()?;
            let asset = materialize(draft, content, now(), &existing)?;
            c.write_asset(&asset)?;
            tracing::info!(id = %asset.id, path = %asset.path, "persisted asset");
            Ok(asset)
        })
        .await
    }

    async fn persist_many(&self, drafts: Vec<AssetDraft>) -> Result<Vec<Asset>> {
        self.blocking(move |c| c.persist_many(drafts)).await
    }

    async fn verify_asset(&self, id: &str, date: NaiveDate) -> Result<Asset> {
        let id = id.to_string();
        self.blocking(move |c| {
            c.modify_asset(&id, |asset| {
                asset.last_verified = Some(date);
                asset.clone()
            })
        })
        .await
    }

    async fn fetch_inbox_items(&self) -> Result<Vec<InboxItem>> {
        self.blocking(|c| c.read_catalog("inbox")).await
    }

    async fn dismiss_inbox_item(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        self.blocking(move |c| {
            let _guard = c.guard()?;
            let mut inbox: Vec<InboxItem> = c.read_catalog("inbox")?;
            let before = inbox.len();
            inbox.retain(|i| i.id != id);
            if inbox.len() == before {
                return Ok(false);
            }
            c.write_catalog("inbox", &inbox)?;
            Ok(true)
        })
        .await
    }

    async fn update_note(&self, asset_id: &str, mut note: Note) -> Result<Note> {
        note.updated_at = Some(now());
        let asset_id = asset_id.to_string();
        self.blocking(move |c| {
            c.modify_asset(&asset_id, |asset| {
                asset.notes = Some(note.clone());
            })?;
            Ok(note)
        })
        .await
    }

    async fn add_comment(&self, asset_id: &str, author: &str, text: &str) -> Result<Comment> {
        let comment = new_comment(author, text, now())?;
        let asset_id = asset_id.to_string();
        self.blocking(move |c| {
            c.modify_asset(&asset_id, |asset| asset.comments.push(comment.clone()))?;
            Ok(comment)
        })
        .await
    }

    async fn fetch_plays(&self) -> Result<Vec<Play>> {
        self.blocking(|c| c.plays_with_assets()).await
    }

    async fn create_play(&self, draft: PlayDraft) -> Result<Play> {
        let play = new_play(draft, now())?;
        self.blocking(move |c| {
            let _guard = c.guard()?;
            let mut plays: Vec<Play> = c.read_catalog("plays")?;
            plays.insert(0, play.clone());
            c.write_catalog("plays", &plays)?;
            Ok(play)
        })
        .await
    }

    async fn associate_asset(&self, play_id: &str, asset_id: &str, phase: Stage) -> Result<Play> {
        let (play_id, asset_id) = (play_id.to_string(), asset_id.to_string());
        self.blocking(move |c| c.associate_asset(&play_id, &asset_id, phase))
            .await
    }

    async fn schemas(&self) -> Result<Vec<Schema>> {
        self.blocking(|c| Ok(c.registry()?.all())).await
    }

    async fn update_schema(&self, schema: Schema) -> Result<Schema> {
        self.blocking(move |c| {
            let _guard = c.guard()?;
            let mut registry = c.registry()?;
            registry.update(schema.clone())?;
            c.write_catalog("schemas", &registry.all())?;
            Ok(schema)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitkb_core::filter::FacetKey;
    use gitkb_core::models::{AssetCategory, AssetType};
    use tempfile::TempDir;

    fn draft(title: &str) -> AssetDraft {
        AssetDraft {
            title: Some(title.to_string()),
            asset_type: Some(AssetType::CodeRef),
            category: Some(AssetCategory::Technical),
            owners: Some(vec!["platform@example.com".to_string()]),
            offering: Some("Cloud".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_persisted_asset_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let saved = {
            let repo = FileRepository::open(tmp.path()).unwrap();
            repo.persist_asset(draft("Terraform EKS"), Some("# Usage\n".to_string()))
                .await
                .unwrap()
        };

        let meta = tmp.path().join(&saved.path).join(METADATA_FILE);
        let raw = std::fs::read_to_string(&meta).unwrap();
        assert!(!raw.contains("# Usage"));
        assert!(tmp.path().join(&saved.path).join(CONTENT_FILE).exists());

        let repo = FileRepository::open(tmp.path()).unwrap();
        let loaded = repo.get_asset(&saved.id).await.unwrap().unwrap();
        assert_eq!(loaded, saved);
        assert_eq!(loaded.content.as_deref(), Some("# Usage\n"));
    }

    #[tokio::test]
    async fn test_listing_is_newest_first_and_filtered() {
        let tmp = TempDir::new().unwrap();
        let repo = FileRepository::open(tmp.path()).unwrap();
        let first = repo.persist_asset(draft("Alpha module"), None).await.unwrap();
        std::thread::sleep(std::time::Duration::from_millis(1100));
        let second = repo.persist_asset(draft("Beta module"), None).await.unwrap();

        let all = repo.fetch_assets("", &FilterSet::new()).await.unwrap();
        assert_eq!(all[0].id, second.id);
        assert_eq!(all[1].id, first.id);

        let hits = repo
            .fetch_assets("alpha", &FilterSet::new().with(FacetKey::Offering, "Cloud"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, first.id);
    }

    #[tokio::test]
    async fn test_corrupt_metadata_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let repo = FileRepository::open(tmp.path()).unwrap();
        repo.persist_asset(draft("Good"), None).await.unwrap();
        let bad = tmp.path().join("code_ref/2020/broken");
        std::fs::create_dir_all(&bad).unwrap();
        std::fs::write(bad.join(METADATA_FILE), "{not json").unwrap();

        assert_eq!(repo.fetch_assets("", &FilterSet::new()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_ids_and_batches() {
        let tmp = TempDir::new().unwrap();
        let repo = FileRepository::open(tmp.path()).unwrap();
        let mut d = draft("Fixed id");
        d.id = Some("code-1".to_string());
        repo.persist_asset(d.clone(), None).await.unwrap();
        let err = repo.persist_asset(d, None).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CatalogError>(),
            Some(CatalogError::Duplicate(_))
        ));

        let mut bad = draft("No owners");
        bad.owners = Some(vec![]);
        assert!(repo.persist_many(vec![draft("Ok"), bad]).await.is_err());
        assert_eq!(repo.fetch_assets("", &FilterSet::new()).await.unwrap().len(), 1);

        let batch = repo
            .persist_many(vec![draft("Same"), draft("Same")])
            .await
            .unwrap();
        assert_ne!(batch[0].path, batch[1].path);
        assert_eq!(repo.fetch_assets("", &FilterSet::new()).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_annotations_persist() {
        let tmp = TempDir::new().unwrap();
        let repo = FileRepository::open(tmp.path()).unwrap();
        let saved = repo.persist_asset(draft("Runbook"), None).await.unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();

        repo.verify_asset(&saved.id, today).await.unwrap();
        repo.update_note(
            &saved.id,
            Note {
                content: "check region limits".to_string(),
                is_private: true,
                updated_at: None,
            },
        )
        .await
        .unwrap();
        repo.add_comment(&saved.id, "", "Worked for Acme").await.unwrap();

        let loaded = repo.get_asset(&saved.id).await.unwrap().unwrap();
        assert_eq!(loaded.last_verified, Some(today));
        assert_eq!(loaded.notes.unwrap().content, "check region limits");
        assert_eq!(loaded.comments[0].author, "Anonymous");
        assert_eq!(loaded.commit_sha, saved.commit_sha);

        assert!(repo.verify_asset("missing", today).await.is_err());
    }

    #[tokio::test]
    async fn test_catalog_files() {
        let tmp = TempDir::new().unwrap();
        let repo = FileRepository::open(tmp.path()).unwrap();
        assert!(repo.fetch_inbox_items().await.unwrap().is_empty());
        assert!(!repo.dismiss_inbox_item("1").await.unwrap());

        let play = repo
            .create_play(PlayDraft {
                title: "Day-0 Telco".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(repo.fetch_plays().await.unwrap()[0].id, play.id);

        let mut schema = repo
            .schemas()
            .await
            .unwrap()
            .into_iter()
            .find(|s| s.id == AssetType::Play)
            .unwrap();
        schema.label = "Solution Play".to_string();
        repo.update_schema(schema).await.unwrap();
        let reopened = FileRepository::open(tmp.path()).unwrap();
        assert!(reopened
            .schemas()
            .await
            .unwrap()
            .iter()
            .any(|s| s.label == "Solution Play"));
    }

    fn year_dir(tmp: &TempDir) -> PathBuf {
        use chrono::Datelike;
        tmp.path().join("code_ref").join(Utc::now().year().to_string())
    }

    #[tokio::test]
    async fn test_ids_sharing_a_prefix_keep_their_own_directories() {
        let tmp = TempDir::new().unwrap();
        let repo = FileRepository::open(tmp.path()).unwrap();
        let mut paths = Vec::new();
        for id in ["first", "acme-2025-q1", "acme-2025-q2"] {
            let mut d = draft("Deck");
            d.id = Some(id.to_string());
            paths.push(repo.persist_asset(d, None).await.unwrap().path);
        }
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 3);

        let all = repo.fetch_assets("", &FilterSet::new()).await.unwrap();
        let mut ids: Vec<_> = all.iter().map(|a| a.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, ["acme-2025-q1", "acme-2025-q2", "first"]);
    }

    #[tokio::test]
    async fn test_write_refuses_directory_of_another_asset() {
        let tmp = TempDir::new().unwrap();
        let repo = FileRepository::open(tmp.path()).unwrap();
        let kept = repo.persist_asset(draft("Deck"), None).await.unwrap();

        let mut intruder = kept.clone();
        intruder.id = "someone-else".to_string();
        intruder.title = "Overwritten".to_string();
        assert!(repo.catalog.write_asset(&intruder).is_err());

        let loaded = repo.get_asset(&kept.id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "Deck");
        assert!(repo.get_asset("someone-else").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_batch_removes_only_what_it_created() {
        let tmp = TempDir::new().unwrap();
        let repo = FileRepository::open(tmp.path()).unwrap();
        // A stray directory where the temp file would go makes the second write fail.
        let blocked = year_dir(&tmp).join("beta");
        std::fs::create_dir_all(blocked.join("metadata.tmp")).unwrap();

        let err = repo.persist_many(vec![draft("Alpha"), draft("Beta")]).await;
        assert!(err.is_err());
        assert!(repo.fetch_assets("", &FilterSet::new()).await.unwrap().is_empty());
        assert!(!year_dir(&tmp).join("alpha").exists());
        assert!(blocked.join("metadata.tmp").is_dir());
        assert!(!blocked.join(METADATA_FILE).exists());
    }

    #[tokio::test]
    async fn test_half_written_asset_is_removed() {
        let tmp = TempDir::new().unwrap();
        let repo = FileRepository::open(tmp.path()).unwrap();
        let dir = year_dir(&tmp).join("runbook");
        std::fs::create_dir_all(dir.join("content.tmp")).unwrap();

        let err = repo
            .persist_asset(draft("Runbook"), Some("# Steps\n".to_string()))
            .await;
        assert!(err.is_err());
        assert!(!dir.join(METADATA_FILE).exists());
        assert!(dir.is_dir());
        assert!(repo.fetch_assets("", &FilterSet::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_play_links_persist_and_resolve() {
        let tmp = TempDir::new().unwrap();
        let repo = FileRepository::open(tmp.path()).unwrap();
        let asset = repo.persist_asset(draft("EKS module"), None).await.unwrap();
        let play = repo
            .create_play(PlayDraft {
                title: "Landing Zone".to_string(),
                offering: Some("Cloud".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        let linked = repo
            .associate_asset(&play.id, &asset.id, Stage::Solutioning)
            .await
            .unwrap();
        assert_eq!(linked.assets[0].asset.id, asset.id);

        let raw = std::fs::read_to_string(tmp.path().join(".gitkb/plays.json")).unwrap();
        assert!(raw.contains("\"links\""));
        assert!(!raw.contains("\"assets\""));

        let reopened = FileRepository::open(tmp.path()).unwrap();
        let matched = reopened
            .match_plays(&gitkb_core::plays::PlayCriteria {
                offerings: vec!["cloud".to_string()],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].assets[0].phase, Stage::Solutioning);
        assert_eq!(matched[0].assets[0].asset.title, "EKS module");

        let err = reopened
            .associate_asset("missing", &asset.id, Stage::Closing)
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<CatalogError>(),
            Some(&CatalogError::play_not_found("missing"))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_do_not_collide() {
        let tmp = TempDir::new().unwrap();
        let repo = Arc::new(FileRepository::open(tmp.path()).unwrap());
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let repo = Arc::clone(&repo);
                tokio::spawn(async move { repo.persist_asset(draft("Deck"), None).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let all = repo.fetch_assets("", &FilterSet::new()).await.unwrap();
        assert_eq!(all.len(), 8);
        let mut paths: Vec<_> = all.iter().map(|a| a.path.as_str()).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 8);
    }
}
