//! Structured filters: facet keys, the single-select filter set, and the
//! date-modified bound.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::models::Asset;

/// An attribute that can be filtered on.
///
/// The known keys map onto [`Asset`] fields. `Custom` keys are looked up in
/// [`Asset::custom`] and are spelled `custom.<name>` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FacetKey {
    Category,
    Type,
    Confidentiality,
    Offering,
    Industry,
    Region,
    Stage,
    Tags,
    RelatedTechnologies,
    Author,
    Custom(String),
}

impl FacetKey {
    pub fn as_str(&self) -> &str {
        match self {
            FacetKey::Category => "category",
            FacetKey::Type => "type",
            FacetKey::Confidentiality => "confidentiality",
            FacetKey::Offering => "offering",
            FacetKey::Industry => "industry",
            FacetKey::Region => "region",
            FacetKey::Stage => "stage",
            FacetKey::Tags => "tags",
            FacetKey::RelatedTechnologies => "related_technologies",
            FacetKey::Author => "author",
            FacetKey::Custom(name) => name,
        }
    }

    /// Whether `asset` carries `value` for this key. Absent fields never
    /// match.
    pub fn matches(&self, asset: &Asset, value: &str) -> bool {
        match self {
            FacetKey::Category => asset.category.as_str() == value,
            FacetKey::Type => asset.asset_type.as_str() == value,
            FacetKey::Confidentiality => asset.confidentiality.as_str() == value,
            FacetKey::Offering => asset.offering.as_deref() == Some(value),
            FacetKey::Industry => asset.industry.as_deref() == Some(value),
            FacetKey::Region => asset.region.as_deref() == Some(value),
            FacetKey::Stage => asset.stage.as_deref() == Some(value),
            FacetKey::Tags => asset.tags.iter().any(|t| t == value),
            FacetKey::RelatedTechnologies => {
                asset.related_technologies.iter().any(|t| t == value)
            }
            FacetKey::Author => !asset.author.is_empty() && asset.author == value,
            FacetKey::Custom(name) => asset.custom.get(name).map(String::as_str) == Some(value),
        }
    }
}

impl fmt::Display for FacetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FacetKey::Custom(name) => write!(f, "custom.{}", name),
            other => f.write_str(other.as_str()),
        }
    }
}

impl FromStr for FacetKey {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = match s {
            "category" => FacetKey::Category,
            "type" => FacetKey::Type,
            "confidentiality" => FacetKey::Confidentiality,
            "offering" => FacetKey::Offering,
            "industry" => FacetKey::Industry,
            "region" => FacetKey::Region,
            "stage" => FacetKey::Stage,
            "tags" => FacetKey::Tags,
            "related_technologies" => FacetKey::RelatedTechnologies,
            "author" => FacetKey::Author,
            other => match other.strip_prefix("custom.") {
                Some(name) if !name.is_empty() => FacetKey::Custom(name.to_string()),
                _ => {
                    return Err(CatalogError::Invalid(format!(
                        "unknown filter key '{}' (custom facets are written custom.<name>)",
                        other
                    )))
                }
            },
        };
        Ok(key)
    }
}

/// One selected value per facet key.
///
/// Selecting a second value for a key replaces the first; selecting the
/// current value again clears the key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct FilterSet {
    selected: BTreeMap<FacetKey, String>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`FilterSet::set`].
    pub fn with(mut self, key: FacetKey, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Selects `value` for `key`, replacing any previous selection.
    pub fn set(&mut self, key: FacetKey, value: impl Into<String>) {
        self.selected.insert(key, value.into());
    }

    pub fn clear(&mut self, key: &FacetKey) -> Option<String> {
        self.selected.remove(key)
    }

    /// Checkbox semantics: clears the key when `value` is already selected,
    /// otherwise selects it. Returns whether the key is selected afterwards.
    pub fn toggle(&mut self, key: FacetKey, value: &str) -> bool {
        if self.selected.get(&key).map(String::as_str) == Some(value) {
            self.selected.remove(&key);
            false
        } else {
            self.selected.insert(key, value.to_string());
            true
        }
    }

    pub fn get(&self, key: &FacetKey) -> Option<&str> {
        self.selected.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FacetKey, &str)> {
        self.selected.iter().map(|(k, v)| (k, v.as_str()))
    }

    /// True when `asset` satisfies every selected filter.
    pub fn matches(&self, asset: &Asset) -> bool {
        self.selected.iter().all(|(k, v)| k.matches(asset, v))
    }
}

impl TryFrom<BTreeMap<String, String>> for FilterSet {
    type Error = CatalogError;

    fn try_from(raw: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        let mut set = FilterSet::new();
        for (k, v) in raw {
            set.set(k.parse()?, v);
        }
        Ok(set)
    }
}

impl From<FilterSet> for BTreeMap<String, String> {
    fn from(set: FilterSet) -> Self {
        set.selected
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }
}

/// "Date modified" bound, measured from `created_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateRange {
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "year")]
    Year,
}

impl DateRange {
    pub fn max_days(&self) -> f64 {
        match self {
            DateRange::Day => 1.0,
            DateRange::Week => 7.0,
            DateRange::Month => 30.0,
            DateRange::Year => 365.0,
        }
    }

    /// Whether an asset created at `created_at` falls inside the bound.
    /// Undated assets never do.
    pub fn contains(&self, created_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match created_at {
            Some(created) => {
                let days = (now - created).num_seconds() as f64 / 86_400.0;
                days <= self.max_days()
            }
            None => false,
        }
    }
}

impl FromStr for DateRange {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "24h" => Ok(DateRange::Day),
            "7d" => Ok(DateRange::Week),
            "30d" => Ok(DateRange::Month),
            "year" => Ok(DateRange::Year),
            other => Err(CatalogError::Invalid(format!(
                "unknown date range '{}': expected 24h, 7d, 30d, or year",
                other
            ))),
        }
    }
}
