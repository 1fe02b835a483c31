//! Single-asset commands: `gitkb get` and `gitkb verify`.

use anyhow::{bail, Result};
use chrono::{NaiveDate, Utc};

use gitkb_core::models::Asset;

use crate::catalog::open_repository;
use crate::config::Config;

pub async fn run_get(config: &Config, id: &str, json: bool) -> Result<()> {
    let repo = open_repository(config).await?;
    let Some(asset) = repo.get_asset(id).await? else {
        bail!("asset not found: {}", id);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&asset)?);
        return Ok(());
    }
    print_asset(&asset);
    Ok(())
}

fn print_asset(asset: &Asset) {
    println!("{}", asset.title);
    println!("{}", "=".repeat(asset.title.chars().count().max(8)));
    println!("id:              {}", asset.id);
    println!("type:            {}", asset.asset_type);
    println!("category:        {}", asset.category);
    println!("confidentiality: {}", asset.confidentiality);
    println!("path:            {}", asset.path);
    println!("commit:          {}", asset.commit_sha);
    let optional = [
        ("offering", &asset.offering),
        ("industry", &asset.industry),
        ("region", &asset.region),
        ("stage", &asset.stage),
        ("customer", &asset.customer_anonymized),
    ];
    for (label, value) in optional {
        if let Some(v) = value {
            println!("{:<16} {}", format!("{}:", label), v);
        }
    }
    if !asset.author.is_empty() {
        println!("author:          {}", asset.author);
    }
    println!("owners:          {}", asset.owners.join(", "));
    if !asset.tags.is_empty() {
        println!("tags:            {}", asset.tags.join(", "));
    }
    if !asset.related_technologies.is_empty() {
        println!("technologies:    {}", asset.related_technologies.join(", "));
    }
    match asset.last_verified {
        Some(d) => println!("last verified:   {}", d),
        None => println!("last verified:   never"),
    }

    if !asset.summary.is_empty() {
        println!();
        println!("{}", asset.summary);
    }
    if !asset.metrics.is_empty() {
        println!();
        for m in &asset.metrics {
            println!("  {}: {}", m.name, m.value);
        }
    }
    if !asset.artifacts.is_empty() {
        println!();
        println!("Artifacts:");
        for a in &asset.artifacts {
            println!("  [{}] {} ({})", a.kind, a.name, a.uri);
        }
    }
    if let Some(note) = &asset.notes {
        println!();
        println!(
            "Note{}: {}",
            if note.is_private { " (private)" } else { "" },
            note.content
        );
    }
    if !asset.comments.is_empty() {
        println!();
        println!("Comments:");
        for c in &asset.comments {
            println!("  {} ({}): {}", c.author, c.timestamp.format("%Y-%m-%d"), c.content);
        }
    }
    if let Some(content) = &asset.content {
        println!();
        println!("---");
        println!("{}", content);
    }
}

/// Stamps `last_verified` with `date`, or today.
pub async fn run_verify(config: &Config, id: &str, date: Option<NaiveDate>) -> Result<()> {
    let repo = open_repository(config).await?;
    let date = date.unwrap_or_else(|| Utc::now().date_naive());
    let asset = repo.verify_asset(id, date).await?;
    println!("Verified {} ({}) on {}", asset.title, asset.id, date);
    Ok(())
}
