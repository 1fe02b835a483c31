//! `gitkb guide`: runs the deal guide non-interactively.

use anyhow::Result;

use gitkb_core::bucket::Stage;
use gitkb_core::filter::FilterSet;
use gitkb_core::wizard::{DealGuide, DealType};

use crate::catalog::open_repository;
use crate::config::Config;
use crate::search::dedup;

pub struct GuideArgs {
    pub deal_type: DealType,
    pub stage: Stage,
    pub offerings: Vec<String>,
    pub technologies: Vec<String>,
    pub json: bool,
}

pub async fn run_guide(config: &Config, args: GuideArgs) -> Result<()> {
    let mut guide = DealGuide::new();
    guide.deal_type = Some(args.deal_type);
    guide.stage = Some(args.stage);
    guide.advance()?;
    guide.offerings = dedup(args.offerings);
    guide.technologies = dedup(args.technologies);

    let repo = open_repository(config).await?;
    let assets = repo.fetch_assets("", &FilterSet::new()).await?;
    let result = guide.recommend(&assets)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    println!(
        "{} deal in {}, offerings: {}",
        result.deal_type.label(),
        result.stage.label(),
        result.offerings.join(", ")
    );
    if !result.technologies.is_empty() {
        println!("technologies: {}", result.technologies.join(", "));
    }

    for stage in Stage::ALL {
        let bucket = result.buckets.get(stage);
        let marker = if stage == result.stage { " <- current stage" } else { "" };
        println!();
        println!("{} ({}){}", stage.label(), bucket.len(), marker);
        if bucket.is_empty() {
            println!("  no matching assets");
        }
        for asset in bucket {
            println!("  [{}] {}  ({})", asset.asset_type, asset.title, asset.id);
        }
    }
    Ok(())
}
