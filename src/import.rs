//! Bulk import of a directory of files as catalog assets.
//!
//! The directory is walked with the `[import]` include/exclude globs (VCS
//! and build directories are always excluded). Each file goes through
//! [`extract_metadata`], is stamped with the catalog defaults and any
//! command-line overrides, and the whole batch is saved with a single
//! `persist_many` call.
//!
//! The SHA-256 of each source file is recorded in `custom.source_sha256`.
//! Files whose hash is already in the catalog are skipped, which makes
//! re-running an import over the same directory a no-op.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use gitkb_core::filter::FilterSet;
use gitkb_core::models::{AssetDraft, Confidentiality};
use gitkb_core::store::Repository;

use crate::config::Config;
use crate::extract::extract_metadata;

/// Key in [`AssetDraft::custom`] holding the source file digest.
pub const SOURCE_HASH_KEY: &str = "source_sha256";

const DEFAULT_EXCLUDES: &[&str] = &["**/.git/**", "**/.gitkb/**", "**/target/**", "**/node_modules/**"];

#[derive(Debug, Default)]
pub struct ImportReport {
    pub scanned: usize,
    pub duplicates: Vec<String>,
    /// Drafts in walk order. Saved unless the import was a dry run.
    pub drafts: Vec<AssetDraft>,
    pub saved_ids: Vec<String>,
}

pub async fn import_directory(
    repo: &dyn Repository,
    config: &Config,
    dir: &Path,
    overrides: &AssetDraft,
    dry_run: bool,
) -> Result<ImportReport> {
    if !dir.is_dir() {
        bail!("Import directory does not exist: {}", dir.display());
    }

    let known: HashSet<String> = repo
        .fetch_assets("", &FilterSet::new())
        .await?
        .into_iter()
        .filter_map(|a| a.custom.get(SOURCE_HASH_KEY).cloned())
        .collect();

    let (scan_config, scan_dir, scan_overrides) =
        (config.clone(), dir.to_path_buf(), overrides.clone());
    let mut report = tokio::task::spawn_blocking(move || {
        scan_directory(&scan_config, &scan_dir, &scan_overrides, known)
    })
    .await
    .context("import scan panicked")??;

    if dry_run || report.drafts.is_empty() {
        return Ok(report);
    }

    let saved = repo.persist_many(report.drafts.clone()).await?;
    tracing::info!(count = saved.len(), dir = %dir.display(), "imported files");
    report.saved_ids = saved.into_iter().map(|a| a.id).collect();
    Ok(report)
}

/// Walks `dir`, hashing and extracting every matching file not already in
/// `known`. Blocking.
fn scan_directory(
    config: &Config,
    dir: &Path,
    overrides: &AssetDraft,
    mut known: HashSet<String>,
) -> Result<ImportReport> {
    let include_set = build_globset(&config.import.include_globs)?;
    let mut excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    excludes.extend(config.import.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(config.import.follow_symlinks) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
        let rel_str = relative.to_string_lossy().replace('\\', "/");
        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }
        files.push((entry.into_path(), rel_str));
    }
    files.sort_by(|a, b| a.1.cmp(&b.1));

    let mut report = ImportReport {
        scanned: files.len(),
        ..Default::default()
    };

    for (path, rel) in files {
        let digest = file_digest(&path)?;
        if !known.insert(digest.clone()) {
            tracing::debug!(file = %rel, "skipping already imported file");
            report.duplicates.push(rel);
            continue;
        }

        let size = std::fs::metadata(&path)?.len();
        let bytes = if size > config.import.max_extract_bytes {
            tracing::info!(file = %rel, size, "file too large to extract; using name only");
            Vec::new()
        } else {
            std::fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?
        };

        let mut draft = overrides.clone();
        let mut extracted = extract_metadata(&rel, &bytes, config.import.max_summary_chars);
        if let Some(artifacts) = extracted.artifacts.as_mut() {
            for artifact in artifacts {
                artifact.uri = rel.clone();
            }
        }
        draft.fill_from(&extracted);
        draft.fill_from(&catalog_defaults(config));
        draft.custom.insert(SOURCE_HASH_KEY.to_string(), digest);
        report.drafts.push(draft);
    }
    Ok(report)
}

fn catalog_defaults(config: &Config) -> AssetDraft {
    AssetDraft {
        owners: Some(config.catalog.default_owners.clone()),
        author: Some(config.catalog.default_author.clone()),
        confidentiality: Some(Confidentiality::InternalOnly),
        ..Default::default()
    }
}

fn file_digest(path: &Path) -> Result<String> {
    let mut file =
        std::fs::File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob '{}'", pattern))?);
    }
    Ok(builder.build()?)
}

/// CLI entry point for `gitkb import`.
pub async fn run_import(
    config: &Config,
    dir: &Path,
    overrides: &AssetDraft,
    dry_run: bool,
) -> Result<()> {
    let repo = crate::catalog::open_repository(config).await?;
    let report = import_directory(repo.as_ref(), config, dir, overrides, dry_run).await?;

    for draft in &report.drafts {
        println!(
            "  {} [{}] {}",
            if dry_run { "would import" } else { "imported" },
            draft.asset_type.map(|t| t.to_string()).unwrap_or_default(),
            draft.title.as_deref().unwrap_or_default()
        );
    }
    for rel in &report.duplicates {
        println!("  skipped (already imported) {}", rel);
    }
    println!(
        "{} files scanned, {} {}, {} skipped",
        report.scanned,
        report.drafts.len(),
        if dry_run { "would be imported" } else { "imported" },
        report.duplicates.len()
    );
    Ok(())
}
