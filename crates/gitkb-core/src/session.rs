//! Library search session: the state behind one search screen.
//!
//! A session owns the query text and every refinement. [`SearchSession::begin`]
//! snapshots them into a [`SearchRequest`] together with a ticket; once the
//! backend answers, [`SearchSession::complete`] runs the client-side
//! pipeline and publishes the result only if no newer search was started.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};

use crate::filter::{DateRange, FacetKey, FilterSet};
use crate::models::Asset;
use crate::query::{search, SearchRequest, SortBy};
use crate::sequence::{LatestResults, Ticket};

#[derive(Debug, Default)]
pub struct SearchSession {
    pub query: String,
    pub filters: FilterSet,
    pub date: Option<DateRange>,
    pub kinds: BTreeSet<String>,
    pub sort: SortBy,
    starred: HashSet<String>,
    briefcase_only: bool,
    results: LatestResults<Vec<Asset>>,
}

impl SearchSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    /// See [`FilterSet::toggle`].
    pub fn toggle_filter(&mut self, key: FacetKey, value: &str) -> bool {
        self.filters.toggle(key, value)
    }

    /// Selecting the active date bound again clears it.
    pub fn toggle_date(&mut self, range: DateRange) {
        self.date = if self.date == Some(range) {
            None
        } else {
            Some(range)
        };
    }

    /// Returns whether `kind` is selected afterwards.
    pub fn toggle_file_kind(&mut self, kind: &str) -> bool {
        if self.kinds.remove(kind) {
            false
        } else {
            self.kinds.insert(kind.to_string());
            true
        }
    }

    /// Stars or unstars an asset. Returns whether it is starred afterwards.
    pub fn toggle_starred(&mut self, asset_id: &str) -> bool {
        if self.starred.remove(asset_id) {
            false
        } else {
            self.starred.insert(asset_id.to_string());
            true
        }
    }

    pub fn is_starred(&self, asset_id: &str) -> bool {
        self.starred.contains(asset_id)
    }

    pub fn starred_count(&self) -> usize {
        self.starred.len()
    }

    pub fn set_briefcase_only(&mut self, on: bool) {
        self.briefcase_only = on;
    }

    pub fn briefcase_only(&self) -> bool {
        self.briefcase_only
    }

    /// Clears the query and every refinement. Stars are kept.
    pub fn clear(&mut self) {
        self.query.clear();
        self.filters = FilterSet::new();
        self.date = None;
        self.kinds.clear();
        self.sort = SortBy::default();
        self.briefcase_only = false;
    }

    pub fn request(&self) -> SearchRequest {
        SearchRequest {
            query: self.query.clone(),
            filters: self.filters.clone(),
            date: self.date,
            kinds: self.kinds.clone(),
            briefcase: self.briefcase_only.then(|| self.starred.clone()),
            sort: self.sort,
        }
    }

    /// Starts a search. The returned request is what the backend fetch and
    /// the later [`complete`](Self::complete) call should use.
    pub fn begin(&self) -> (Ticket, SearchRequest) {
        (self.results.begin(), self.request())
    }

    /// Applies `request` to the fetched assets and publishes the result if
    /// `ticket` is still current. Returns whether it was published.
    pub fn complete(
        &self,
        ticket: Ticket,
        request: &SearchRequest,
        fetched: &[Asset],
        now: DateTime<Utc>,
    ) -> bool {
        self.results.publish(ticket, search(request, fetched, now))
    }

    pub fn results(&self) -> Vec<Asset> {
        self.results.current().unwrap_or_default()
    }
}
