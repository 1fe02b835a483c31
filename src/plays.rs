//! `gitkb plays list`, `gitkb plays match`, and `gitkb plays link`.

use anyhow::Result;

use gitkb_core::bucket::Stage;
use gitkb_core::models::Play;
use gitkb_core::plays::PlayCriteria;

use crate::catalog::open_repository;
use crate::config::Config;

pub async fn run_plays_list(config: &Config, json: bool) -> Result<()> {
    let repo = open_repository(config).await?;
    let plays = repo.fetch_plays().await?;
    print_plays(&plays, json)
}

pub async fn run_plays_match(config: &Config, criteria: PlayCriteria, json: bool) -> Result<()> {
    let repo = open_repository(config).await?;
    let plays = repo.match_plays(&criteria).await?;
    print_plays(&plays, json)
}

pub async fn run_plays_link(
    config: &Config,
    play_id: &str,
    asset_id: &str,
    stage: Stage,
    json: bool,
) -> Result<()> {
    let repo = open_repository(config).await?;
    let play = repo.associate_asset(play_id, asset_id, stage).await?;
    print_plays(std::slice::from_ref(&play), json)
}

fn print_plays(plays: &[Play], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(plays)?);
        return Ok(());
    }
    if plays.is_empty() {
        println!("No plays.");
        return Ok(());
    }
    for play in plays {
        match play.match_score {
            Some(score) => println!("{} (score {})", play.title, score),
            None => println!("{}", play.title),
        }
        let scope = [
            play.offering.as_deref(),
            play.sector.as_deref(),
            play.geo.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" | ");
        if !scope.is_empty() {
            println!("    {}", scope);
        }
        if let Some(summary) = &play.summary {
            println!("    {}", summary);
        }
        for linked in &play.assets {
            println!("    [{}] {} ({})", linked.phase, linked.asset.title, linked.asset.id);
        }
    }
    Ok(())
}
