//! Catalog query engine: text match, structured filters, client-side
//! refinements, and sorting over an already-fetched collection.
//!
//! # Pipeline
//!
//! 1. Keep assets whose `title` or `summary` contains the query
//!    (case-insensitive substring; an empty query keeps everything).
//! 2. Keep assets matching every entry of the [`FilterSet`].
//! 3. Refinements: date-modified bound, file kinds, briefcase.
//! 4. Stable sort per [`SortBy`].
//!
//! Steps 1–2 are what a backend applies for `fetch_assets`; running them
//! again on the client is harmless because they are idempotent.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::filter::{DateRange, FilterSet};
use crate::models::Asset;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    /// Input order, untouched.
    #[default]
    Relevance,
    Newest,
    Oldest,
    Az,
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortBy::Relevance => "relevance",
            SortBy::Newest => "newest",
            SortBy::Oldest => "oldest",
            SortBy::Az => "az",
        })
    }
}

impl FromStr for SortBy {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "relevance" => Ok(SortBy::Relevance),
            "newest" => Ok(SortBy::Newest),
            "oldest" => Ok(SortBy::Oldest),
            "az" => Ok(SortBy::Az),
            other => Err(CatalogError::Invalid(format!(
                "unknown sort '{}': expected relevance, newest, oldest, or az",
                other
            ))),
        }
    }
}

/// Everything a single search needs besides the candidate assets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub filters: FilterSet,
    #[serde(default)]
    pub date: Option<DateRange>,
    /// Selected artifact kinds (`deck`, `doc`, `code`, `video`, ...).
    #[serde(default)]
    pub kinds: BTreeSet<String>,
    /// When set, only these asset ids are kept.
    #[serde(default)]
    pub briefcase: Option<HashSet<String>>,
    #[serde(default)]
    pub sort: SortBy,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }
}

/// Runs the full pipeline. `now` anchors the date-modified bound.
pub fn search(req: &SearchRequest, assets: &[Asset], now: DateTime<Utc>) -> Vec<Asset> {
    let needle = req.query.to_lowercase();
    let mut results: Vec<Asset> = assets
        .iter()
        .filter(|a| matches_lowered(a, &needle))
        .filter(|a| req.filters.matches(a))
        .filter(|a| req.date.map_or(true, |d| d.contains(a.created_at, now)))
        .filter(|a| matches_kinds(a, &req.kinds))
        .filter(|a| {
            req.briefcase
                .as_ref()
                .map_or(true, |starred| starred.contains(&a.id))
        })
        .cloned()
        .collect();
    sort_assets(&mut results, req.sort);
    results
}

/// Text + filter-set match only (what `fetch_assets` does server-side).
pub fn fetch_matching(query: &str, filters: &FilterSet, assets: &[Asset]) -> Vec<Asset> {
    let needle = query.to_lowercase();
    assets
        .iter()
        .filter(|a| matches_lowered(a, &needle) && filters.matches(a))
        .cloned()
        .collect()
}

/// Case-insensitive substring match on `title` and `summary`.
pub fn matches_text(asset: &Asset, query: &str) -> bool {
    matches_lowered(asset, &query.to_lowercase())
}

fn matches_lowered(asset: &Asset, needle: &str) -> bool {
    needle.is_empty()
        || asset.title.to_lowercase().contains(needle)
        || asset.summary.to_lowercase().contains(needle)
}

/// Keep iff no kinds are selected, the type's nominal kind is selected, or
/// any artifact's kind is selected.
pub fn matches_kinds(asset: &Asset, kinds: &BTreeSet<String>) -> bool {
    kinds.is_empty()
        || kinds.contains(asset.asset_type.nominal_kind())
        || asset.artifacts.iter().any(|art| kinds.contains(&art.kind))
}

/// Stable in-place sort.
pub fn sort_assets(assets: &mut [Asset], sort: SortBy) {
    match sort {
        SortBy::Relevance => {}
        SortBy::Newest => assets.sort_by(|a, b| by_created(a, b, true)),
        SortBy::Oldest => assets.sort_by(|a, b| by_created(a, b, false)),
        SortBy::Az => assets.sort_by(|a, b| {
            a.title
                .to_lowercase()
                .cmp(&b.title.to_lowercase())
                .then_with(|| a.title.cmp(&b.title))
        }),
    }
}

// Undated assets go last in both directions.
fn by_created(a: &Asset, b: &Asset, descending: bool) -> Ordering {
    match (a.created_at, b.created_at) {
        (Some(x), Some(y)) => {
            if descending {
                y.cmp(&x)
            } else {
                x.cmp(&y)
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FacetKey;
    use crate::models::{Artifact, AssetCategory, AssetType};
    use crate::testing::{asset, at};

    fn ids(assets: &[Asset]) -> Vec<&str> {
        assets.iter().map(|a| a.id.as_str()).collect()
    }

    fn catalog() -> Vec<Asset> {
        let mut a = asset("win-1", "RHOV at scale for critical apps");
        a.asset_type = AssetType::WinStory;
        a.summary = "Migrated 420 hosts; zero P1s post-cutover.".to_string();
        a.created_at = Some(at(2025, 11, 12));
        a.artifacts = vec![Artifact {
            name: "Exec Deck".into(),
            kind: "deck".into(),
            uri: "#".into(),
        }];

        let mut b = asset("play-1", "Telco Day-0 Automation Playbook");
        b.asset_type = AssetType::Play;
        b.summary = "Complete guide for Day-0 clusters with ArgoCD.".to_string();
        b.created_at = Some(at(2025, 10, 5));
        b.artifacts = vec![Artifact {
            name: "Deployment Guide".into(),
            kind: "runbook".into(),
            uri: "#".into(),
        }];

        let mut c = asset("tmpl-1", "presales One-Pager Template");
        c.category = AssetCategory::Sales;
        c.summary = "Standard one-pager for initial client meetings.".to_string();
        c.created_at = Some(at(2025, 8, 15));

        let mut d = asset("code-1", "Terraform Module for AWS EKS");
        d.asset_type = AssetType::CodeRef;
        d.summary = "Standardized EKS module with security hardening.".to_string();

        vec![a, b, c, d]
    }

    #[test]
    fn test_empty_request_returns_everything_in_order() {
        let all = catalog();
        let out = search(&SearchRequest::default(), &all, at(2025, 12, 1));
        assert_eq!(out, all);
    }

    #[test]
    fn test_query_matches_title_or_summary_case_insensitive() {
        let all = catalog();
        let out = search(&SearchRequest::new("ARGOCD"), &all, at(2025, 12, 1));
        assert_eq!(ids(&out), vec!["play-1"]);

        let out = search(&SearchRequest::new("one-pager"), &all, at(2025, 12, 1));
        assert_eq!(ids(&out), vec!["tmpl-1"]);

        for q in ["eks", "zero", "xyz", "a"] {
            let out = search(&SearchRequest::new(q), &all, at(2025, 12, 1));
            for a in &all {
                let expected = matches_text(a, q);
                assert_eq!(out.iter().any(|r| r.id == a.id), expected, "query {q}");
            }
        }
    }

    #[test]
    fn test_category_filter_is_exact() {
        let all = catalog();
        let mut req = SearchRequest::default();
        req.filters.set(FacetKey::Category, "sales");
        let out = search(&req, &all, at(2025, 12, 1));
        assert!(out.iter().all(|a| a.category == AssetCategory::Sales));
        assert_eq!(ids(&out), vec!["tmpl-1"]);
    }

    #[test]
    fn test_date_filter_excludes_undated_assets() {
        let all = catalog();
        let req = SearchRequest {
            date: Some(DateRange::Year),
            ..Default::default()
        };
        let out = search(&req, &all, at(2025, 12, 1));
        assert_eq!(ids(&out), vec!["win-1", "play-1", "tmpl-1"]);

        let req = SearchRequest {
            date: Some(DateRange::Month),
            ..Default::default()
        };
        let out = search(&req, &all, at(2025, 12, 1));
        assert_eq!(ids(&out), vec!["win-1"]);
    }

    #[test]
    fn test_kind_filter_uses_nominal_kind_or_artifacts() {
        let all = catalog();
        let req = SearchRequest {
            kinds: ["runbook".to_string()].into_iter().collect(),
            ..Default::default()
        };
        assert_eq!(ids(&search(&req, &all, at(2025, 12, 1))), vec!["play-1"]);

        let req = SearchRequest {
            kinds: ["doc".to_string(), "code".to_string()].into_iter().collect(),
            ..Default::default()
        };
        assert_eq!(
            ids(&search(&req, &all, at(2025, 12, 1))),
            vec!["tmpl-1", "code-1"]
        );
    }

    #[test]
    fn test_briefcase_restricts_to_starred() {
        let all = catalog();
        let starred: HashSet<String> = ["code-1", "win-1", "missing"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let req = SearchRequest {
            briefcase: Some(starred),
            ..Default::default()
        };
        let out = search(&req, &all, at(2025, 12, 1));
        assert_eq!(ids(&out), vec!["win-1", "code-1"]);
    }

    #[test]
    fn test_sorts_are_stable_and_idempotent() {
        let all = catalog();
        for sort in [SortBy::Newest, SortBy::Oldest, SortBy::Az] {
            let req = SearchRequest {
                sort,
                ..Default::default()
            };
            let once = search(&req, &all, at(2025, 12, 1));
            let twice = search(&req, &once, at(2025, 12, 1));
            assert_eq!(once, twice, "{sort} not idempotent");
        }

        let req = SearchRequest {
            sort: SortBy::Newest,
            ..Default::default()
        };
        assert_eq!(
            ids(&search(&req, &all, at(2025, 12, 1))),
            vec!["win-1", "play-1", "tmpl-1", "code-1"]
        );

        let req = SearchRequest {
            sort: SortBy::Oldest,
            ..Default::default()
        };
        assert_eq!(
            ids(&search(&req, &all, at(2025, 12, 1))),
            vec!["tmpl-1", "play-1", "win-1", "code-1"]
        );

        let req = SearchRequest {
            sort: SortBy::Az,
            ..Default::default()
        };
        assert_eq!(
            ids(&search(&req, &all, at(2025, 12, 1))),
            vec!["tmpl-1", "win-1", "play-1", "code-1"]
        );
    }

    #[test]
    fn test_sort_by_parse() {
        assert_eq!("az".parse::<SortBy>().unwrap(), SortBy::Az);
        assert!("alpha".parse::<SortBy>().is_err());
    }
}
