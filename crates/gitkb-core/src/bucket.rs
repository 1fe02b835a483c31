//! Stage bucketing for the deal guide.
//!
//! Assets are first narrowed by the selected offerings and technologies,
//! then sorted into the four sales-lifecycle stages by type:
//!
//! | Asset type | Stages |
//! |------------|--------|
//! | `win_story` | discovery |
//! | `play` | solutioning |
//! | `code_ref` | solutioning, closing |
//! | `template` | proposal if the title mentions "pricing" or "sow", else discovery |
//!
//! The technology filter is only enforced for `code_ref` assets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::models::{Asset, AssetType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Discovery,
    Solutioning,
    Proposal,
    Closing,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Discovery,
        Stage::Solutioning,
        Stage::Proposal,
        Stage::Closing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Discovery => "discovery",
            Stage::Solutioning => "solutioning",
            Stage::Proposal => "proposal",
            Stage::Closing => "closing",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Stage::Discovery => "Discovery / Qualification",
            Stage::Solutioning => "Solutioning / Validation",
            Stage::Proposal => "Proposal / Negotiation",
            Stage::Closing => "Closing / Delivery",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = CatalogError;

    /// Accepts the key (`proposal`) or the display label.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(s) || st.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                CatalogError::Invalid(format!(
                    "unknown stage '{}': expected discovery, solutioning, proposal, or closing",
                    s
                ))
            })
    }
}

/// Recommended assets per stage. All four stages are always present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationBuckets {
    pub discovery: Vec<Asset>,
    pub solutioning: Vec<Asset>,
    pub proposal: Vec<Asset>,
    pub closing: Vec<Asset>,
}

impl RecommendationBuckets {
    pub fn get(&self, stage: Stage) -> &[Asset] {
        match stage {
            Stage::Discovery => &self.discovery,
            Stage::Solutioning => &self.solutioning,
            Stage::Proposal => &self.proposal,
            Stage::Closing => &self.closing,
        }
    }

    fn push(&mut self, stage: Stage, asset: &Asset) {
        let bucket = match stage {
            Stage::Discovery => &mut self.discovery,
            Stage::Solutioning => &mut self.solutioning,
            Stage::Proposal => &mut self.proposal,
            Stage::Closing => &mut self.closing,
        };
        bucket.push(asset.clone());
    }

    pub fn is_empty(&self) -> bool {
        Stage::ALL.iter().all(|s| self.get(*s).is_empty())
    }
}

/// Filters `assets` by offering/technology and sorts them into stages.
pub fn bucketize(
    assets: &[Asset],
    offerings: &[String],
    technologies: &[String],
) -> RecommendationBuckets {
    let offerings: Vec<String> = offerings.iter().map(|o| o.to_lowercase()).collect();
    let technologies: Vec<String> = technologies.iter().map(|t| t.to_lowercase()).collect();

    let mut buckets = RecommendationBuckets::default();
    for asset in assets
        .iter()
        .filter(|a| is_eligible(a, &offerings, &technologies))
    {
        for stage in stages_for(asset) {
            buckets.push(*stage, asset);
        }
    }
    buckets
}

/// Stages an asset lands in, independent of any filter.
pub fn stages_for(asset: &Asset) -> &'static [Stage] {
    match asset.asset_type {
        AssetType::WinStory => &[Stage::Discovery],
        AssetType::Play => &[Stage::Solutioning],
        AssetType::CodeRef => &[Stage::Solutioning, Stage::Closing],
        AssetType::Template => {
            let title = asset.title.to_lowercase();
            if title.contains("pricing") || title.contains("sow") {
                &[Stage::Proposal]
            } else {
                &[Stage::Discovery]
            }
        }
    }
}

// Selections are already lowercased.
fn is_eligible(asset: &Asset, offerings: &[String], technologies: &[String]) -> bool {
    if !offerings.is_empty() {
        if let Some(offering) = &asset.offering {
            let offering = offering.to_lowercase();
            if !offerings.iter().any(|sel| offering.contains(sel.as_str())) {
                return false;
            }
        }
    }

    if !technologies.is_empty() && asset.asset_type == AssetType::CodeRef {
        let has_match = asset.related_technologies.iter().any(|at| {
            let at = at.to_lowercase();
            technologies.iter().any(|sel| at.contains(sel.as_str()))
        });
        if !has_match {
            return false;
        }
    }

    true
}
