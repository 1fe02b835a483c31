//! # GitKB Core
//!
//! I/O-free logic for the GitKB catalog: the asset data model, the query
//! engine, deal-guide stage bucketing, facets, schemas, the creation and
//! deal-guide wizards, play matching, analytics, and the [`Repository`]
//! abstraction with an in-memory implementation.
//!
//! This crate does no filesystem or network access. The `gitkb` crate
//! adds the file-backed and HTTP repositories, the REST server, extraction,
//! import, and the CLI on top of it.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | `Asset`, `AssetDraft`, inbox items, plays, notes, comments |
//! | [`filter`] | Facet keys, the single-select `FilterSet`, date bounds |
//! | [`query`] | Text match, filters, refinements, sorting |
//! | [`bucket`] | Sales-stage bucketing for the deal guide |
//! | [`facets`] | Facet counts |
//! | [`schema`] | Per-type schemas and draft validation |
//! | [`wizard`] | Deal guide and asset creation state machines |
//! | [`sequence`] | Stale-response guard |
//! | [`session`] | Search screen state |
//! | [`plays`] | Play matching |
//! | [`stats`] | Analytics and staleness |
//! | [`store`] | `Repository` trait, persistence rules, `InMemoryRepository` |
//!
//! [`Repository`]: store::Repository

pub mod bucket;
pub mod error;
pub mod facets;
pub mod filter;
pub mod models;
pub mod plays;
pub mod query;
pub mod schema;
pub mod sequence;
pub mod session;
pub mod stats;
pub mod store;
pub mod wizard;

pub use error::CatalogError;

#[cfg(test)]
pub(crate) mod testing {
    use chrono::{DateTime, TimeZone, Utc};

    use crate::models::{Asset, AssetCategory, AssetType, Confidentiality};

    /// A minimal technical template owned by one person.
    pub fn asset(id: &str, title: &str) -> Asset {
        Asset {
            id: id.to_string(),
            title: title.to_string(),
            asset_type: AssetType::Template,
            category: AssetCategory::Technical,
            confidentiality: Confidentiality::InternalOnly,
            summary: String::new(),
            industry: None,
            region: None,
            offering: None,
            stage: None,
            tags: Vec::new(),
            related_technologies: Vec::new(),
            owners: vec!["owner@example.com".to_string()],
            author: String::new(),
            artifacts: Vec::new(),
            metrics: Vec::new(),
            created_at: None,
            updated_at: None,
            path: String::new(),
            commit_sha: String::new(),
            customer_real: None,
            customer_anonymized: None,
            last_verified: None,
            content: None,
            notes: None,
            comments: Vec::new(),
            custom: Default::default(),
        }
    }

    /// Midnight UTC on the given day.
    pub fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0)
            .single()
            .expect("valid test date")
    }
}
