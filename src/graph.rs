use std::sync::Arc;

use reqwest::{Client, Method, Response};
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::{AuthError, TokenProvider};
use crate::model::{DriveItem, GraphDriveItem, Page};

/// Upper bound on pages fetched by one listing, for runs of empty pages.
pub const MAX_PAGES: usize = 100;

#[derive(thiserror::Error, Debug)]
pub enum GraphError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Graph request failed ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Graph not reachable: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Invalid JSON from Graph: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Items gathered across pages, capped at the requested count.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub truncated: bool,
}

/// Accumulates pages in server order until the collection ends or the cap
/// is reached. Pure; the HTTP loop in [`GraphClient::list_all`] drives it.
#[derive(Debug)]
pub struct PageCollector<T> {
    items: Vec<T>,
    max_items: usize,
    truncated: bool,
}

impl<T> PageCollector<T> {
    pub fn new(max_items: usize) -> Self {
        Self { items: Vec::new(), max_items, truncated: false }
    }

    /// Absorbs one page and returns the link to follow, if any.
    pub fn push_page(&mut self, page: Page<T>) -> Option<String> {
        let room = self.max_items.saturating_sub(self.items.len());
        let mut value = page.value;
        if value.len() > room {
            value.truncate(room);
            self.items.extend(value);
            self.truncated = true;
            return None;
        }
        self.items.extend(value);
        if self.items.len() >= self.max_items {
            self.truncated = page.next_link.is_some();
            return None;
        }
        page.next_link
    }

    /// Stops early with a link still pending; the listing is incomplete.
    pub fn abandon(&mut self) {
        self.truncated = true;
    }

    pub fn finish(self) -> Listing<T> {
        Listing { items: self.items, truncated: self.truncated }
    }
}

/// Result of a capped content download.
#[derive(Debug)]
pub struct Download {
    pub bytes: Vec<u8>,
    /// The body continued past the cap.
    pub more: bool,
}

#[derive(Clone)]
pub struct GraphClient {
    http: Client,
    base_url: String,
    tokens: Arc<TokenProvider>,
}

impl GraphClient {
    pub fn new(http: Client, tokens: Arc<TokenProvider>, base_url: &str) -> Self {
        Self { http, base_url: base_url.trim_end_matches('/').to_string(), tokens }
    }

    pub fn tokens(&self) -> &Arc<TokenProvider> {
        &self.tokens
    }

    fn resolve(&self, url_or_path: &str) -> String {
        if url_or_path.starts_with("http://") || url_or_path.starts_with("https://") {
            url_or_path.to_string()
        } else {
            format!("{}/{}", self.base_url, url_or_path.trim_start_matches('/'))
        }
    }

    async fn send(
        &self,
        method: Method,
        url_or_path: &str,
        query: &[(&str, String)],
    ) -> Result<Response, GraphError> {
        let token = self.tokens.get_token().await?;
        let url = self.resolve(url_or_path);
        debug!(%method, %url, "Graph request");

        let mut req = self.http.request(method, &url).bearer_auth(&token.value);
        if !query.is_empty() {
            req = req.query(query);
        }
        let resp = req.send().await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        let message = graph_error_message(&body).unwrap_or_else(|| status.to_string());
        warn!(status = status.as_u16(), %message, "Graph request failed");
        Err(GraphError::Api { status: status.as_u16(), message })
    }

    pub async fn request(
        &self,
        method: Method,
        url_or_path: &str,
        query: &[(&str, String)],
    ) -> Result<Value, GraphError> {
        let resp = self.send(method, url_or_path, query).await?;
        let text = resp.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn get_item(&self, path: &str) -> Result<DriveItem, GraphError> {
        let value = self.request(Method::GET, path, &[]).await?;
        let item: GraphDriveItem = serde_json::from_value(value)?;
        Ok(item.into())
    }

    /// Follows `@odata.nextLink` from `start_path` until the collection ends
    /// or `max_items` items are held.
    pub async fn list_all(
        &self,
        start_path: &str,
        page_size: usize,
        max_items: usize,
    ) -> Result<Listing<DriveItem>, GraphError> {
        let mut collector = PageCollector::new(max_items);
        let first_query = [("$top", page_size.to_string())];

        let mut next = Some(start_path.to_string());
        let mut pages = 0;
        while let Some(url) = next.take() {
            if pages == MAX_PAGES {
                warn!(pages, "stopping listing at page limit");
                collector.abandon();
                break;
            }
            let query: &[(&str, String)] = if pages == 0 { &first_query } else { &[] };
            let value = self.request(Method::GET, &url, query).await?;
            let page: Page<GraphDriveItem> = serde_json::from_value(value)?;
            pages += 1;
            debug!(page = pages, items = page.value.len(), "received listing page");

            next = collector.push_page(Page {
                value: page.value.into_iter().map(DriveItem::from).collect(),
                next_link: page.next_link,
            });
        }

        let listing = collector.finish();
        if listing.truncated {
            debug!(kept = listing.items.len(), "listing truncated at cap");
        }
        Ok(listing)
    }

    /// Streams the body at `path`, keeping at most `max_bytes`.
    pub async fn download(&self, path: &str, max_bytes: usize) -> Result<Download, GraphError> {
        let mut resp = self.send(Method::GET, path, &[]).await?;
        let mut bytes = Vec::with_capacity(max_bytes.min(64 * 1024));
        let mut more = false;
        while let Some(chunk) = resp.chunk().await? {
            let room = max_bytes - bytes.len();
            if chunk.len() > room {
                bytes.extend_from_slice(&chunk[..room]);
                more = true;
                break;
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(Download { bytes, more })
    }
}

// Graph error envelope: {"error": {"code": "itemNotFound", "message": "..."}}
fn graph_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("message")?
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
