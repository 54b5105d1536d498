use std::sync::Arc;

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::auth::{AuthError, TokenProvider};
use crate::config::Settings;
use crate::content::{self, DecodeError};
use crate::graph::{GraphClient, GraphError, Listing};
use crate::model::DriveItem;

pub const DEFAULT_MAX_FILES: i64 = 50;
pub const MAX_FILES_LIMIT: i64 = 100;
pub const DEFAULT_MAX_SIZE_KB: i64 = 5;
pub const MAX_SIZE_KB_LIMIT: i64 = 50;

// Newest first, so a capped listing keeps the recently changed items
const LISTING_ORDER: &str = "$orderby=lastModifiedDateTime%20desc";

#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("File '{name}' cannot be displayed as text: {source}")]
    Decode {
        name: String,
        #[source]
        source: DecodeError,
    },
}

impl ServiceError {
    /// Stable category reported to tool callers.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "validation",
            ServiceError::Decode { .. } => "decode",
            ServiceError::Graph(e) => graph_kind(e),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ServiceError::Graph(GraphError::Api { status, .. })
            | ServiceError::Graph(GraphError::Auth(AuthError::Rejected { status, .. })) => {
                Some(*status)
            }
            _ => None,
        }
    }
}

fn graph_kind(e: &GraphError) -> &'static str {
    match e {
        GraphError::Auth(auth) => auth_kind(auth),
        GraphError::Api { .. } => "graph",
        GraphError::Network(_) => "network",
        GraphError::InvalidJson(_) => "invalid_response",
    }
}

fn auth_kind(e: &AuthError) -> &'static str {
    match e {
        AuthError::Transport(_) => "network",
        AuthError::Rejected { .. } | AuthError::InvalidResponse(_) => "auth",
    }
}

/// Outcome of a content read. Unsupported types are a normal result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ContentResult {
    Text {
        name: String,
        mime_type: Option<String>,
        size_bytes: u64,
        returned_bytes: usize,
        truncated: bool,
        text: String,
    },
    UnsupportedType {
        name: String,
        mime_type: Option<String>,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorDetail {
    pub kind: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub site_id: String,
    pub tenant_id: String,
    pub client_id: String,
    pub token_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_expires_in_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

pub fn clamp_max_files(requested: Option<i64>) -> usize {
    requested.unwrap_or(DEFAULT_MAX_FILES).clamp(1, MAX_FILES_LIMIT) as usize
}

pub fn clamp_max_size_kb(requested: Option<i64>) -> usize {
    requested.unwrap_or(DEFAULT_MAX_SIZE_KB).clamp(1, MAX_SIZE_KB_LIMIT) as usize
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Read-only SharePoint operations over one site's default drive.
pub struct SharePointService {
    graph: GraphClient,
    tokens: Arc<TokenProvider>,
    site_path: String,
}

impl SharePointService {
    pub fn new(graph: GraphClient) -> Self {
        let tokens = graph.tokens().clone();
        let site_path = format!("sites/{}/drive", tokens.credentials().site_id);
        Self { graph, tokens, site_path }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(settings.http_timeout).build()?;
        let tokens = Arc::new(TokenProvider::new(
            http.clone(),
            settings.credentials.clone(),
            &settings.authority_url,
        ));
        Ok(Self::new(GraphClient::new(http, tokens, &settings.graph_url)))
    }

    fn item_path(&self, id: &str) -> String {
        format!("{}/items/{}", self.site_path, urlencoding::encode(id))
    }

    pub async fn list_items(
        &self,
        folder_id: Option<&str>,
        max_files: Option<i64>,
    ) -> Result<Listing<DriveItem>, ServiceError> {
        let max = clamp_max_files(max_files);
        let path = match non_blank(folder_id) {
            Some(id) => format!("{}/children?{LISTING_ORDER}", self.item_path(id)),
            None => format!("{}/root/children?{LISTING_ORDER}", self.site_path),
        };
        debug!(%path, max, "listing drive items");
        let listing = self.graph.list_all(&path, max, max).await?;
        info!(count = listing.items.len(), truncated = listing.truncated, "listed drive items");
        Ok(listing)
    }

    pub async fn get_folder_contents(
        &self,
        folder_id: &str,
        max_files: Option<i64>,
    ) -> Result<Listing<DriveItem>, ServiceError> {
        let Some(id) = non_blank(Some(folder_id)) else {
            return Err(ServiceError::Validation("folder_id is required".to_string()));
        };
        self.list_items(Some(id), max_files).await
    }

    pub async fn get_file_content(
        &self,
        file_id: &str,
        max_size_kb: Option<i64>,
    ) -> Result<ContentResult, ServiceError> {
        let Some(id) = non_blank(Some(file_id)) else {
            return Err(ServiceError::Validation("file_id is required".to_string()));
        };
        let cap = clamp_max_size_kb(max_size_kb) * 1024;

        let item = self.graph.get_item(&self.item_path(id)).await?;

        if item.is_folder() {
            return Ok(ContentResult::UnsupportedType {
                message: format!("'{}' is a folder. Use get_folder_contents to list it.", item.name),
                name: item.name,
                mime_type: None,
            });
        }
        // Items without a MIME type fall through to decoding
        let mime = item.mime_type.clone().unwrap_or_default();
        if !mime.is_empty() && !content::is_textual(&mime) {
            debug!(%mime, "skipping non-text file");
            return Ok(ContentResult::UnsupportedType {
                message: format!(
                    "File '{}' is a binary file ({mime}). Only text files can be read.",
                    item.name
                ),
                name: item.name,
                mime_type: item.mime_type,
            });
        }

        let download = self
            .graph
            .download(&format!("{}/content", self.item_path(id)), cap)
            .await?;
        let truncated = download.more || item.size_bytes > cap as u64;
        if truncated {
            info!(size = item.size_bytes, cap, "file content truncated to cap");
        }

        let text = content::decode_text(&download.bytes, truncated)
            .map_err(|source| ServiceError::Decode { name: item.name.clone(), source })?;

        Ok(ContentResult::Text {
            returned_bytes: text.len(),
            name: item.name,
            mime_type: item.mime_type,
            size_bytes: item.size_bytes,
            truncated,
            text,
        })
    }

    /// Acquires a token without touching Graph and echoes non-secret config.
    pub async fn test_connection(&self) -> ConnectionStatus {
        let creds = self.tokens.credentials();
        let mut status = ConnectionStatus {
            connected: false,
            site_id: creds.site_id.clone(),
            tenant_id: creds.tenant_id.clone(),
            client_id: creds.client_id.clone(),
            token_available: false,
            token_expires_in_secs: None,
            error: None,
        };
        match self.tokens.get_token().await {
            Ok(token) => {
                status.connected = true;
                status.token_available = true;
                status.token_expires_in_secs =
                    Some(token.expires_at.saturating_duration_since(self.tokens.now()).as_secs());
            }
            Err(e) => {
                warn!(error = %e, "connection test failed");
                status.error = Some(ErrorDetail { kind: auth_kind(&e), message: e.to_string() });
            }
        }
        status
    }
}
