//! Go-to-market play matching and play-asset links.

use serde::{Deserialize, Serialize};

use crate::bucket::Stage;
use crate::models::{Asset, LinkedAsset, Play, PlayLink};

/// Match criteria for [`match_plays`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayCriteria {
    #[serde(default)]
    pub offerings: Vec<String>,
    /// Compared against [`Play::sector`].
    #[serde(default)]
    pub industry: Option<String>,
    /// Compared against [`Play::geo`].
    #[serde(default)]
    pub region: Option<String>,
}

/// Returns matching plays in input order with `match_score` set.
///
/// Industry and region must match exactly when given. A selected offering
/// counts toward the score when it is a case-insensitive substring of any
/// comma-separated entry in the play's `offering`. With offerings selected,
/// plays scoring zero are dropped.
pub fn match_plays(plays: &[Play], criteria: &PlayCriteria) -> Vec<Play> {
    plays
        .iter()
        .filter(|p| {
            criteria
                .industry
                .as_deref()
                .map_or(true, |i| p.sector.as_deref() == Some(i))
        })
        .filter(|p| {
            criteria
                .region
                .as_deref()
                .map_or(true, |r| p.geo.as_deref() == Some(r))
        })
        .filter_map(|p| {
            let score = offering_score(p, &criteria.offerings);
            if criteria.offerings.is_empty() || score > 0 {
                let mut matched = p.clone();
                matched.match_score = Some(score as f64);
                Some(matched)
            } else {
                None
            }
        })
        .collect()
}

/// Links `asset_id` to `play` in `phase`. Re-linking an asset moves it to
/// the new phase.
pub fn link_asset(play: &mut Play, asset_id: &str, phase: Stage) {
    match play.links.iter_mut().find(|l| l.asset_id == asset_id) {
        Some(link) => link.phase = phase,
        None => play.links.push(PlayLink {
            asset_id: asset_id.to_string(),
            phase,
        }),
    }
}

/// Fills each play's `assets` from its links, in link order. Links to
/// assets that no longer exist are left out.
pub fn attach_assets(plays: &mut [Play], assets: &[Asset]) {
    for play in plays {
        play.assets = play
            .links
            .iter()
            .filter_map(|link| {
                assets.iter().find(|a| a.id == link.asset_id).map(|a| LinkedAsset {
                    phase: link.phase,
                    asset: a.clone(),
                })
            })
            .collect();
    }
}

fn offering_score(play: &Play, selected: &[String]) -> usize {
    let Some(offering) = play.offering.as_deref() else {
        return 0;
    };
    let play_offerings: Vec<String> = offering
        .split(',')
        .map(|o| o.trim().to_lowercase())
        .collect();
    selected
        .iter()
        .filter(|sel| {
            let sel = sel.to_lowercase();
            play_offerings.iter().any(|po| po.contains(&sel))
        })
        .count()
}
