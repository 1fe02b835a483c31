//! Facet aggregation: `{value, count}` lists for offering, technologies, and
//! tags, in first-seen order.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::filter::FacetKey;
use crate::models::{Asset, FacetItem};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facets {
    #[serde(default)]
    pub offering: Vec<FacetItem>,
    #[serde(default)]
    pub related_technologies: Vec<FacetItem>,
    #[serde(default)]
    pub tags: Vec<FacetItem>,
}

impl Facets {
    /// Facet lists paired with the filter key each one drives.
    pub fn iter(&self) -> impl Iterator<Item = (FacetKey, &[FacetItem])> {
        [
            (FacetKey::Offering, self.offering.as_slice()),
            (FacetKey::RelatedTechnologies, self.related_technologies.as_slice()),
            (FacetKey::Tags, self.tags.as_slice()),
        ]
        .into_iter()
    }

    pub fn values(&self, key: &FacetKey) -> Vec<String> {
        self.iter()
            .find(|(k, _)| k == key)
            .map(|(_, items)| items.iter().map(|i| i.value.clone()).collect())
            .unwrap_or_default()
    }
}

#[derive(Default)]
struct Counter {
    items: Vec<FacetItem>,
    index: HashMap<String, usize>,
}

impl Counter {
    fn add(&mut self, value: &str) {
        match self.index.get(value) {
            Some(&i) => self.items[i].count += 1,
            None => {
                self.index.insert(value.to_string(), self.items.len());
                self.items.push(FacetItem {
                    value: value.to_string(),
                    count: 1,
                });
            }
        }
    }
}

pub fn compute_facets(assets: &[Asset]) -> Facets {
    let mut offering = Counter::default();
    let mut tech = Counter::default();
    let mut tags = Counter::default();

    for a in assets {
        if let Some(o) = a.offering.as_deref().filter(|o| !o.is_empty()) {
            offering.add(o);
        }
        for t in &a.related_technologies {
            tech.add(t);
        }
        for t in &a.tags {
            tags.add(t);
        }
    }

    Facets {
        offering: offering.items,
        related_technologies: tech.items,
        tags: tags.items,
    }
}
