//! Catalog search from the command line, and the query-string parser the
//! REST API shares with it.

use std::collections::{BTreeSet, HashSet};

use anyhow::Result;
use chrono::Utc;

use gitkb_core::filter::{FacetKey, FilterSet};
use gitkb_core::models::Asset;
use gitkb_core::query::{search, SearchRequest};
use gitkb_core::CatalogError;

use crate::catalog::open_repository;
use crate::config::Config;

/// Builds a search request from `key=value` pairs. Any key that is not one
/// of `query`, `date`, `kinds`, `sort`, `starred` must be a facet key.
/// Blank values mean "no selection".
pub fn parse_search(pairs: Vec<(String, String)>) -> Result<SearchRequest, CatalogError> {
    let mut req = SearchRequest::default();
    let mut filters = FilterSet::new();
    for (key, value) in pairs {
        match key.as_str() {
            "query" => req.query = value,
            "date" if value.is_empty() => req.date = None,
            "date" => req.date = Some(value.parse()?),
            "sort" => req.sort = value.parse()?,
            "kinds" => req.kinds.extend(split_list(&value)),
            "starred" => req
                .briefcase
                .get_or_insert_with(HashSet::new)
                .extend(split_list(&value)),
            _ if value.is_empty() => {}
            other => filters.set(other.parse::<FacetKey>()?, value),
        }
    }
    req.filters = filters;
    Ok(req)
}

fn split_list(raw: &str) -> impl Iterator<Item = String> + '_ {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parses a `key=value` CLI argument.
pub fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{}'", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

pub struct SearchArgs {
    pub query: String,
    pub filters: Vec<(String, String)>,
    pub date: Option<String>,
    pub kinds: Vec<String>,
    pub sort: Option<String>,
    pub starred: Vec<String>,
    pub json: bool,
}

pub async fn run_search(config: &Config, args: SearchArgs) -> Result<()> {
    let mut pairs = vec![("query".to_string(), args.query)];
    pairs.extend(args.filters);
    pairs.extend(args.date.map(|d| ("date".to_string(), d)));
    pairs.extend(args.sort.map(|s| ("sort".to_string(), s)));
    if !args.kinds.is_empty() {
        pairs.push(("kinds".to_string(), args.kinds.join(",")));
    }
    if !args.starred.is_empty() {
        pairs.push(("starred".to_string(), args.starred.join(",")));
    }
    let req = parse_search(pairs)?;

    let repo = open_repository(config).await?;
    let fetched = repo.fetch_assets(&req.query, &req.filters).await?;
    let results = search(&req, &fetched, Utc::now());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }
    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (i, asset) in results.iter().enumerate() {
        print_row(i + 1, asset);
    }
    Ok(())
}

fn print_row(rank: usize, asset: &Asset) {
    println!("{}. [{}] {}", rank, asset.asset_type, asset.title);
    let created = asset
        .created_at
        .map(|c| c.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "undated".to_string());
    println!(
        "    id: {}  category: {}  {}  created: {}",
        asset.id, asset.category, asset.confidentiality, created
    );
    if let Some(offering) = &asset.offering {
        println!("    offering: {}", offering);
    }
    if !asset.summary.is_empty() {
        println!("    {}", asset.summary);
    }
    println!();
}

/// CLI entry point for `gitkb facets`.
pub async fn run_facets(config: &Config, json: bool) -> Result<()> {
    let repo = open_repository(config).await?;
    let facets = repo.fetch_facets().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&facets)?);
        return Ok(());
    }
    for (key, items) in facets.iter() {
        println!("{}:", key);
        if items.is_empty() {
            println!("  (none)");
        }
        for item in items {
            println!("  {:<32} {:>4}", item.value, item.count);
        }
    }
    Ok(())
}

/// Distinct values in insertion order; used for repeatable CLI flags.
pub fn dedup(values: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    values
        .into_iter()
        .filter(|v| seen.insert(v.clone()))
        .collect()
}
