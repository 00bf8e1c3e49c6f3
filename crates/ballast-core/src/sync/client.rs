//! HTTP client for the `/v1/mass` collection.

use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use crate::models::{EntryId, MutationOperation, SyncMutation};
use crate::util::{is_http_url, normalize_text_option};

use super::{SyncError, SyncResult};

const COLLECTION_PATH: &str = "/v1/mass";

// Upper bound on remote text carried into queue errors and reports
const ERROR_DETAIL_CHARS: usize = 180;

#[derive(Clone)]
pub struct MassApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for MassApiClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("MassApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl MassApiClient {
    pub fn new(base_url: impl Into<String>) -> SyncResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        Ok(Self {
            base_url,
            client: reqwest::Client::builder().build()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn collection_url(&self) -> String {
        format!("{}{COLLECTION_PATH}", self.base_url)
    }

    pub fn entry_url(&self, id: &EntryId) -> String {
        format!(
            "{}{COLLECTION_PATH}/{}",
            self.base_url,
            urlencoding::encode(id.as_str())
        )
    }

    /// Method and target URL for an intent.
    pub fn route(&self, operation: MutationOperation, entity_id: &EntryId) -> (Method, String) {
        match operation {
            MutationOperation::Create => (Method::POST, self.collection_url()),
            MutationOperation::Update => (Method::PATCH, self.entry_url(entity_id)),
            MutationOperation::Delete => (Method::DELETE, self.entry_url(entity_id)),
        }
    }

    /// Replay one queued intent. Any non-2xx answer is an error.
    pub async fn send(&self, mutation: &SyncMutation, token: Option<&str>) -> SyncResult<()> {
        let (method, url) = self.route(mutation.operation, &mutation.entity_id);
        let body = mutation.operation.has_body().then_some(&mutation.payload);
        self.execute(method, &url, body, token).await
    }

    /// POST a full entry snapshot to the collection.
    pub async fn create(&self, payload: &Value, token: Option<&str>) -> SyncResult<()> {
        self.execute(Method::POST, &self.collection_url(), Some(payload), token)
            .await
    }

    async fn execute(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        token: Option<&str>,
    ) -> SyncResult<()> {
        tracing::debug!("{} {}", method, url);

        let mut request = self
            .client
            .request(method, url)
            .header("Accept", "application/json");
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(SyncError::Api {
            status: status.as_u16(),
            message: parse_api_error(status, &body),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// Trim remote error text down to something fit for `last_error`.
pub(crate) fn compact_text(value: &str) -> String {
    value.trim().chars().take(ERROR_DETAIL_CHARS).collect()
}

/// Turn a rejected response body into message text.
fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", compact_text(&message), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_base_url(raw: String) -> SyncResult<String> {
    let url = normalize_text_option(Some(raw)).ok_or_else(|| {
        SyncError::InvalidConfiguration("api base URL must not be empty".to_string())
    })?;
    if is_http_url(&url) {
        Ok(url.trim_end_matches('/').to_string())
    } else {
        Err(SyncError::InvalidConfiguration(
            "api base URL must include http:// or https://".to_string(),
        ))
    }
}
