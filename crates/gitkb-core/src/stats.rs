//! Catalog analytics and verification staleness.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::models::Asset;

/// Window used for the "recent contributions" count.
const CONTRIBUTION_WINDOW_DAYS: i64 = 7;

/// Summary numbers for the admin analytics screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub total_assets: usize,
    pub by_type: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
    pub by_confidentiality: BTreeMap<String, usize>,
    /// Assets created within the last seven days.
    pub recent_contributions: usize,
    pub stale_assets: usize,
    pub distinct_authors: usize,
}

impl CatalogStats {
    pub fn compute(assets: &[Asset], now: DateTime<Utc>, stale_after_days: u32) -> Self {
        let mut by_type = BTreeMap::new();
        let mut by_category = BTreeMap::new();
        let mut by_confidentiality = BTreeMap::new();
        let mut authors = std::collections::HashSet::new();
        let window_start = now - Duration::days(CONTRIBUTION_WINDOW_DAYS);
        let today = now.date_naive();

        let mut recent = 0;
        let mut stale = 0;
        for a in assets {
            *by_type.entry(a.asset_type.to_string()).or_insert(0) += 1;
            *by_category.entry(a.category.to_string()).or_insert(0) += 1;
            *by_confidentiality
                .entry(a.confidentiality.to_string())
                .or_insert(0) += 1;
            if !a.author.is_empty() {
                authors.insert(a.author.as_str());
            }
            if a.created_at.is_some_and(|c| c >= window_start) {
                recent += 1;
            }
            if is_stale(a, today, stale_after_days) {
                stale += 1;
            }
        }

        Self {
            total_assets: assets.len(),
            by_type,
            by_category,
            by_confidentiality,
            recent_contributions: recent,
            stale_assets: stale,
            distinct_authors: authors.len(),
        }
    }
}

/// An asset is stale when it was never verified, or last verified more than
/// `stale_after_days` before `today`.
pub fn is_stale(asset: &Asset, today: NaiveDate, stale_after_days: u32) -> bool {
    match asset.last_verified {
        Some(verified) => (today - verified).num_days() > i64::from(stale_after_days),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssetCategory, AssetType};
    use crate::testing::{asset, at};

    #[test]
    fn test_is_stale() {
        let today = NaiveDate::from_ymd_opt(2025, 12, 1).unwrap();
        let mut a = asset("a", "A");
        assert!(is_stale(&a, today, 90));
        a.last_verified = NaiveDate::from_ymd_opt(2025, 10, 1);
        assert!(!is_stale(&a, today, 90));
        a.last_verified = NaiveDate::from_ymd_opt(2025, 8, 1);
        assert!(is_stale(&a, today, 90));
    }

    #[test]
    fn test_compute_counts() {
        let now = at(2025, 12, 1);
        let mut a = asset("a", "A");
        a.asset_type = AssetType::WinStory;
        a.category = AssetCategory::Sales;
        a.created_at = Some(at(2025, 11, 28));
        a.author = "Sarah".into();
        a.last_verified = Some(now.date_naive());
        let mut b = asset("b", "B");
        b.created_at = Some(at(2025, 6, 1));
        b.author = "Sarah".into();
        let c = asset("c", "C");

        let stats = CatalogStats::compute(&[a, b, c], now, 180);
        assert_eq!(stats.total_assets, 3);
        assert_eq!(stats.by_type.get("win_story"), Some(&1));
        assert_eq!(stats.by_type.get("template"), Some(&2));
        assert_eq!(stats.by_category.get("sales"), Some(&1));
        assert_eq!(stats.recent_contributions, 1);
        assert_eq!(stats.stale_assets, 2);
        assert_eq!(stats.distinct_authors, 1);
    }
}
