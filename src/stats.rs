//! `gitkb stats` and `gitkb stale`.

use anyhow::Result;
use chrono::Utc;

use gitkb_core::filter::FilterSet;
use gitkb_core::stats::CatalogStats;

use crate::catalog::open_repository;
use crate::config::Config;

pub async fn run_stats(config: &Config, json: bool) -> Result<()> {
    let repo = open_repository(config).await?;
    let assets = repo.fetch_assets("", &FilterSet::new()).await?;
    let stats = CatalogStats::compute(&assets, Utc::now(), config.catalog.stale_after_days);

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("GitKB catalog stats");
    println!();
    println!("  Assets:        {}", stats.total_assets);
    println!("  Last 7 days:   {}", stats.recent_contributions);
    println!(
        "  Stale:         {} (not verified in {} days)",
        stats.stale_assets, config.catalog.stale_after_days
    );
    println!("  Authors:       {}", stats.distinct_authors);

    for (title, counts) in [
        ("By type", &stats.by_type),
        ("By category", &stats.by_category),
        ("By confidentiality", &stats.by_confidentiality),
    ] {
        if counts.is_empty() {
            continue;
        }
        println!();
        println!("  {}:", title);
        for (key, count) in counts {
            println!("    {:<20} {:>6}", key, count);
        }
    }
    println!();
    Ok(())
}

pub async fn run_stale(config: &Config, days: Option<u32>) -> Result<()> {
    let days = days.unwrap_or(config.catalog.stale_after_days);
    let repo = open_repository(config).await?;
    let stale = repo.stale_assets(Utc::now().date_naive(), days).await?;

    if stale.is_empty() {
        println!("All assets verified within {} days.", days);
        return Ok(());
    }
    println!("{} asset(s) not verified in {} days:", stale.len(), days);
    for asset in &stale {
        let verified = asset
            .last_verified
            .map(|d| d.to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "  {:<38} {:<12} {}",
            asset.id, verified, asset.title
        );
    }
    Ok(())
}
