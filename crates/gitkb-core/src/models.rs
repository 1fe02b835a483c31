//! Core data models shared by the query engine, the repositories, and the
//! HTTP API.
//!
//! The serialized shape (field names, enum spellings) is the catalog's wire
//! and on-disk format: `type` is one of `win_story`, `play`, `code_ref`,
//! `template`; confidentiality is `internal-only` or `client-safe`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::bucket::Stage;
use crate::error::CatalogError;

/// The four kinds of catalog entry. Each one selects a metadata schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    WinStory,
    Play,
    CodeRef,
    Template,
}

impl AssetType {
    pub const ALL: [AssetType; 4] = [
        AssetType::WinStory,
        AssetType::Play,
        AssetType::CodeRef,
        AssetType::Template,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::WinStory => "win_story",
            AssetType::Play => "play",
            AssetType::CodeRef => "code_ref",
            AssetType::Template => "template",
        }
    }

    /// The artifact kind an asset of this type nominally carries.
    pub fn nominal_kind(&self) -> &'static str {
        match self {
            AssetType::WinStory => "deck",
            AssetType::Play => "video",
            AssetType::CodeRef => "code",
            AssetType::Template => "doc",
        }
    }

    /// Category assumed when an asset type is picked without one.
    pub fn default_category(&self) -> AssetCategory {
        match self {
            AssetType::CodeRef | AssetType::Play => AssetCategory::Technical,
            AssetType::WinStory | AssetType::Template => AssetCategory::Sales,
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetType {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "win_story" => Ok(AssetType::WinStory),
            "play" => Ok(AssetType::Play),
            "code_ref" => Ok(AssetType::CodeRef),
            "template" => Ok(AssetType::Template),
            other => Err(CatalogError::Invalid(format!(
                "unknown asset type '{}': expected win_story, play, code_ref, or template",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetCategory {
    Technical,
    Sales,
}

impl AssetCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetCategory::Technical => "technical",
            AssetCategory::Sales => "sales",
        }
    }
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetCategory {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "technical" => Ok(AssetCategory::Technical),
            "sales" => Ok(AssetCategory::Sales),
            other => Err(CatalogError::Invalid(format!(
                "unknown category '{}': expected technical or sales",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Confidentiality {
    InternalOnly,
    ClientSafe,
}

impl Confidentiality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidentiality::InternalOnly => "internal-only",
            Confidentiality::ClientSafe => "client-safe",
        }
    }
}

impl fmt::Display for Confidentiality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Confidentiality {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "internal-only" => Ok(Confidentiality::InternalOnly),
            "client-safe" => Ok(Confidentiality::ClientSafe),
            other => Err(CatalogError::Invalid(format!(
                "unknown confidentiality '{}': expected internal-only or client-safe",
                other
            ))),
        }
    }
}

/// A file or link attached to an asset (deck, doc, code repo, video...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub kind: String,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub value: String,
}

/// A per-asset note. Writes are last-write-wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub content: String,
    #[serde(default = "default_private")]
    pub is_private: bool,
    #[serde(default, with = "lenient::datetime")]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_private() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub author: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// A persisted catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    pub category: AssetCategory,
    pub confidentiality: Confidentiality,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offering: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub related_technologies: Vec<String>,
    #[serde(default)]
    pub owners: Vec<String>,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub metrics: Vec<Metric>,
    #[serde(default, with = "lenient::datetime")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "lenient::datetime")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub commit_sha: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_real: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_anonymized: Option<String>,
    #[serde(default, with = "lenient::date")]
    pub last_verified: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<Note>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<Comment>,
    /// Attributes for custom facet keys.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom: BTreeMap<String, String>,
}

/// Partial asset metadata: the input for persistence, and the output of
/// extraction and inbox suggestions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub asset_type: Option<AssetType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<AssetCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidentiality: Option<Confidentiality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offering: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_technologies: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owners: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Vec<Artifact>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Vec<Metric>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_real: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_anonymized: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom: BTreeMap<String, String>,
}

impl AssetDraft {
    /// Fills every field that is unset here from `defaults`.
    pub fn fill_from(&mut self, defaults: &AssetDraft) {
        macro_rules! fill {
            ($($field:ident),*) => {
                $(
                    if self.$field.is_none() {
                        self.$field = defaults.$field.clone();
                    }
                )*
            };
        }
        fill!(
            id,
            title,
            asset_type,
            category,
            confidentiality,
            summary,
            industry,
            region,
            offering,
            stage,
            tags,
            related_technologies,
            owners,
            author,
            artifacts,
            metrics,
            customer_real,
            customer_anonymized
        );
        for (k, v) in &defaults.custom {
            self.custom.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InboxSource {
    Slack,
    Email,
}

/// A chat or email message proposed as a new asset, awaiting triage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboxItem {
    pub id: String,
    pub source: InboxSource,
    pub sender: String,
    pub timestamp: String,
    pub content: String,
    #[serde(default)]
    pub suggested_metadata: AssetDraft,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetItem {
    pub value: String,
    pub count: usize,
}

/// A go-to-market play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Play {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Comma-separated list of offerings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offering: Option<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub stage_scope: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub owners: Vec<String>,
    #[serde(default, with = "lenient::datetime")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_score: Option<f64>,
    /// Assets linked to this play, one entry per asset.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<PlayLink>,
    /// The linked assets themselves. Filled in when plays are listed or
    /// matched; never stored.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assets: Vec<LinkedAsset>,
}

/// Link from a play to an asset, with the sales phase it is used in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayLink {
    pub asset_id: String,
    pub phase: Stage,
}

/// A linked asset as returned with its play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedAsset {
    pub phase: Stage,
    pub asset: Asset,
}

/// Input for creating a play.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayDraft {
    pub title: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub offering: Option<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub stage_scope: Vec<String>,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub geo: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub owners: Vec<String>,
}

/// Serde helpers that turn missing or malformed timestamps into `None`
/// instead of rejecting the whole record.
pub mod lenient {
    pub mod datetime {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(dt) => serializer.serialize_str(&dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
            Ok(raw.as_ref().and_then(|v| v.as_str()).and_then(parse))
        }

        pub fn parse(s: &str) -> Option<DateTime<Utc>> {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            // Naive ISO timestamps (no offset) are taken as UTC.
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|n| n.and_utc())
        }
    }

    pub mod date {
        use chrono::NaiveDate;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<NaiveDate>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveDate>, D::Error> {
            let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
            Ok(raw.as_ref().and_then(|v| v.as_str()).and_then(parse))
        }

        /// Accepts `YYYY-MM-DD`, or any string starting with one (full
        /// ISO timestamps).
        pub fn parse(s: &str) -> Option<NaiveDate> {
            let head = s.get(..10)?;
            NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal_json() -> serde_json::Value {
        json!({
            "id": "win-1",
            "title": "RHOV at scale",
            "type": "win_story",
            "category": "technical",
            "confidentiality": "internal-only",
            "owners": ["practice@example.com"]
        })
    }

    #[test]
    fn test_enum_spellings() {
        let v: Asset = serde_json::from_value(minimal_json()).unwrap();
        assert_eq!(v.asset_type, AssetType::WinStory);
        assert_eq!(v.confidentiality, Confidentiality::InternalOnly);

        let out = serde_json::to_value(&v).unwrap();
        assert_eq!(out["type"], "win_story");
        assert_eq!(out["confidentiality"], "internal-only");
        assert_eq!(out["category"], "technical");
    }

    #[test]
    fn test_malformed_created_at_is_absent() {
        let mut raw = minimal_json();
        raw["created_at"] = json!("last tuesday");
        raw["last_verified"] = json!("2025-11-12T10:00:00");
        let asset: Asset = serde_json::from_value(raw).unwrap();
        assert!(asset.created_at.is_none());
        assert_eq!(
            asset.last_verified,
            NaiveDate::from_ymd_opt(2025, 11, 12)
        );
    }

    #[test]
    fn test_naive_timestamp_taken_as_utc() {
        let dt = lenient::datetime::parse("2025-07-01T09:00:00").unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-07-01T09:00:00+00:00");
    }

    #[test]
    fn test_asset_type_from_str() {
        assert_eq!("code_ref".parse::<AssetType>().unwrap(), AssetType::CodeRef);
        assert!("code-ref".parse::<AssetType>().is_err());
    }

    #[test]
    fn test_fill_from_keeps_existing_fields() {
        let mut draft = AssetDraft {
            title: Some("Deck".to_string()),
            ..Default::default()
        };
        let defaults = AssetDraft {
            title: Some("ignored".to_string()),
            owners: Some(vec!["ops@example.com".to_string()]),
            confidentiality: Some(Confidentiality::InternalOnly),
            ..Default::default()
        };
        draft.fill_from(&defaults);
        assert_eq!(draft.title.as_deref(), Some("Deck"));
        assert_eq!(draft.owners.as_ref().map(|o| o.len()), Some(1));
        assert_eq!(draft.confidentiality, Some(Confidentiality::InternalOnly));
    }
}
