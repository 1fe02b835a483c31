//! [`Repository`] backed by a remote `gitkb serve` instance.
//!
//! Each trait method is one REST call. Error bodies of the form
//! `{"error": {"code", "message"}}` are turned back into [`CatalogError`]
//! values so callers see the same errors as with a local store. Ids are
//! sent as percent-encoded path segments.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use gitkb_core::bucket::Stage;
use gitkb_core::facets::Facets;
use gitkb_core::filter::FilterSet;
use gitkb_core::models::{Asset, AssetDraft, Comment, InboxItem, Note, Play, PlayDraft};
use gitkb_core::plays::PlayCriteria;
use gitkb_core::schema::Schema;
use gitkb_core::store::Repository;
use gitkb_core::CatalogError;

pub struct HttpRepository {
    base: Url,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

#[derive(Serialize)]
struct Association<'a> {
    asset_id: &'a str,
    phase: Stage,
}

#[derive(Deserialize)]
struct Dismissed {
    dismissed: bool,
}

impl HttpRepository {
    /// `base` is the API root, e.g. `http://127.0.0.1:8000/api`.
    pub fn new(base: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        let base = Url::parse(base.trim_end_matches('/'))
            .with_context(|| format!("Invalid catalog server URL: {}", base))?;
        if base.cannot_be_a_base() {
            bail!("Invalid catalog server URL: {}", base);
        }
        Ok(Self { base, client })
    }

    /// The URL of `segments` below the API root. Each segment is
    /// percent-encoded, so ids may contain `/`, `?`, `#` or `%`.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("catalog server URL cannot take a path: {}", self.base))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        Ok(self.client.request(method, self.url(segments)?))
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let resp = req.send().await.context("Request to catalog server failed")?;
        let resp = check(resp).await?;
        resp.json::<T>()
            .await
            .context("Failed to decode catalog server response")
    }
}

/// Passes successful responses through and converts error bodies.
async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    let Ok(body) = serde_json::from_str::<ErrorBody>(&text) else {
        return Err(anyhow!("catalog server returned {}: {}", status, text));
    };
    Err(to_error(status, body.error))
}

fn to_error(status: StatusCode, detail: ErrorDetail) -> anyhow::Error {
    let message = detail.message;
    match detail.code.as_str() {
        "not_found" => {
            if let Some(id) = message.strip_prefix("asset not found: ") {
                CatalogError::asset_not_found(id).into()
            } else if let Some(id) = message.strip_prefix("play not found: ") {
                CatalogError::play_not_found(id).into()
            } else {
                CatalogError::NotFound {
                    kind: "resource",
                    id: message,
                }
                .into()
            }
        }
        "bad_request" => CatalogError::Invalid(
            message
                .strip_prefix("invalid input: ")
                .unwrap_or(&message)
                .to_string(),
        )
        .into(),
        "conflict" => CatalogError::Duplicate(
            message
                .strip_prefix("duplicate id: ")
                .unwrap_or(&message)
                .to_string(),
        )
        .into(),
        code => anyhow!("catalog server returned {} ({}): {}", status, code, message),
    }
}

/// Query-string pairs for a text + filter-set lookup.
pub fn search_pairs(query: &str, filters: &FilterSet) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(filters.len() + 1);
    if !query.is_empty() {
        pairs.push(("query".to_string(), query.to_string()));
    }
    pairs.extend(filters.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    pairs
}

#[async_trait]
impl Repository for HttpRepository {
    async fn fetch_assets(&self, query: &str, filters: &FilterSet) -> Result<Vec<Asset>> {
        let req = self
            .request(Method::GET, &["assets"])?
            .query(&search_pairs(query, filters));
        self.send(req).await
    }

    async fn get_asset(&self, id: &str) -> Result<Option<Asset>> {
        let req = self.request(Method::GET, &["assets", id])?;
        match self.send(req).await {
            Ok(asset) => Ok(Some(asset)),
            Err(e)
                if matches!(
                    e.downcast_ref::<CatalogError>(),
                    Some(CatalogError::NotFound { .. })
                ) =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch_facets(&self) -> Result<Facets> {
        self.send(self.request(Method::GET, &["facets"])?).await
    }

    async fn persist_asset(&self, draft: AssetDraft, content: Option<String>) -> Result<Asset> {
        let req = self
            .request(Method::POST, &["assets"])?
            .json(&json!({ "metadata": draft, "content": content }));
        self.send(req).await
    }

    async fn persist_many(&self, drafts: Vec<AssetDraft>) -> Result<Vec<Asset>> {
        let req = self.request(Method::POST, &["assets", "bulk"])?.json(&drafts);
        self.send(req).await
    }

    async fn verify_asset(&self, id: &str, date: NaiveDate) -> Result<Asset> {
        let req = self
            .request(Method::POST, &["assets", id, "verify"])?
            .query(&[("date", date.to_string())]);
        self.send(req).await
    }

    async fn stale_assets(&self, today: NaiveDate, stale_after_days: u32) -> Result<Vec<Asset>> {
        let req = self
            .request(Method::GET, &["assets", "stale"])?
            .query(&[("today", today.to_string()), ("days", stale_after_days.to_string())]);
        self.send(req).await
    }

    async fn fetch_inbox_items(&self) -> Result<Vec<InboxItem>> {
        self.send(self.request(Method::GET, &["inbox"])?).await
    }

    async fn dismiss_inbox_item(&self, id: &str) -> Result<bool> {
        let req = self.request(Method::DELETE, &["inbox", id])?;
        let out: Dismissed = self.send(req).await?;
        Ok(out.dismissed)
    }

    async fn update_note(&self, asset_id: &str, note: Note) -> Result<Note> {
        let req = self
            .request(Method::PUT, &["assets", asset_id, "note"])?
            .json(&note);
        self.send(req).await
    }

    async fn add_comment(&self, asset_id: &str, author: &str, text: &str) -> Result<Comment> {
        let req = self
            .request(Method::POST, &["assets", asset_id, "comments"])?
            .json(&json!({ "author": author, "text": text }));
        self.send(req).await
    }

    async fn fetch_plays(&self) -> Result<Vec<Play>> {
        self.send(self.request(Method::GET, &["plays"])?).await
    }

    async fn create_play(&self, draft: PlayDraft) -> Result<Play> {
        self.send(self.request(Method::POST, &["plays"])?.json(&draft))
            .await
    }

    async fn associate_asset(&self, play_id: &str, asset_id: &str, phase: Stage) -> Result<Play> {
        let req = self
            .request(Method::POST, &["plays", play_id, "assets"])?
            .json(&Association { asset_id, phase });
        self.send(req).await
    }

    async fn match_plays(&self, criteria: &PlayCriteria) -> Result<Vec<Play>> {
        self.send(self.request(Method::POST, &["plays", "match"])?.json(criteria))
            .await
    }

    async fn schemas(&self) -> Result<Vec<Schema>> {
        self.send(self.request(Method::GET, &["schemas"])?).await
    }

    async fn update_schema(&self, schema: Schema) -> Result<Schema> {
        let id = schema.id.to_string();
        let req = self
            .request(Method::PUT, &["schemas", id.as_str()])?
            .json(&schema);
        self.send(req).await
    }
}
