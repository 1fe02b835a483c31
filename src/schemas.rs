//! `gitkb schema show`.

use anyhow::Result;

use gitkb_core::models::AssetType;

use crate::catalog::open_repository;
use crate::config::Config;

pub async fn run_schema_show(
    config: &Config,
    asset_type: Option<AssetType>,
    json: bool,
) -> Result<()> {
    let repo = open_repository(config).await?;
    let schemas: Vec<_> = repo
        .schemas()
        .await?
        .into_iter()
        .filter(|s| asset_type.map_or(true, |t| s.id == t))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&schemas)?);
        return Ok(());
    }

    for schema in &schemas {
        println!("{} ({})", schema.label, schema.id);
        for field in &schema.fields {
            let kind = serde_json::to_value(field.kind)?;
            println!(
                "  {:<24} {:<18} {}{}",
                field.name,
                kind.as_str().unwrap_or_default(),
                field.label,
                if field.required { " *" } else { "" }
            );
            if !field.options.is_empty() {
                println!("  {:<24} options: {}", "", field.options.join(", "));
            }
        }
        println!();
    }
    Ok(())
}
