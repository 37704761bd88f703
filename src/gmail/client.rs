//! Remote mail store — trait seam plus the Gmail REST implementation.
//!
//! The engine talks to a [`MailStore`]: a paginated id search plus a
//! full fetch per id (matching needs headers and body, so the metadata
//! formats are never enough). `GmailClient` implements it over the Gmail
//! REST API; tests use an in-memory store that honors `subject:"…"` and
//! `after:` query terms the way the real server does.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::TransportError;
use crate::gmail::body::{Payload, extract_plain_body};

const GMAIL_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1";

/// One fetched message, headers defaulted to empty strings.
#[derive(Debug, Clone, Default)]
pub struct FetchedMessage {
    pub id: String,
    pub from: String,
    pub to: String,
    pub delivered_to: String,
    pub subject: String,
    /// Best-effort plain text.
    pub body: String,
}

/// One search page: message ids plus the continuation token.
#[derive(Debug, Clone, Default)]
pub struct MessagePage {
    pub ids: Vec<String>,
    pub next_page_token: Option<String>,
}

/// Search-and-fetch boundary of the remote store.
#[async_trait]
pub trait MailStore: Send + Sync {
    /// List up to `max_results` message ids matching `query`. An empty
    /// query means no server-side filtering.
    async fn list(
        &self,
        query: &str,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<MessagePage, TransportError>;

    /// Fetch one message in full.
    async fn get(&self, id: &str) -> Result<FetchedMessage, TransportError>;
}

// ── Gmail REST ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GetResponse {
    id: String,
    #[serde(default)]
    payload: Option<Payload>,
}

/// Gmail REST client for one account's mailbox, authenticated with an
/// already-fresh access token.
pub struct GmailClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl GmailClient {
    pub fn new(http: reqwest::Client, access_token: impl Into<String>) -> Self {
        Self {
            http,
            base_url: GMAIL_BASE_URL.to_string(),
            access_token: access_token.into(),
        }
    }

    /// Point the client at a different endpoint (tests, proxies).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
        query: &[(&str, &str)],
    ) -> Result<T, TransportError> {
        let response = self
            .http
            .get(url)
            .query(query)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl MailStore for GmailClient {
    async fn list(
        &self,
        query: &str,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<MessagePage, TransportError> {
        let max = max_results.max(1).to_string();
        let mut params: Vec<(&str, &str)> = vec![("maxResults", max.as_str())];
        if !query.is_empty() {
            params.push(("q", query));
        }
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }

        let url = format!("{}/users/me/messages", self.base_url);
        let list: ListResponse = self.get_json(url, &params).await?;

        Ok(MessagePage {
            ids: list.messages.into_iter().map(|m| m.id).collect(),
            next_page_token: list.next_page_token,
        })
    }

    async fn get(&self, id: &str) -> Result<FetchedMessage, TransportError> {
        let url = format!("{}/users/me/messages/{id}", self.base_url);
        let msg: GetResponse = self.get_json(url, &[("format", "full")]).await?;

        let payload = msg.payload.unwrap_or_default();
        let from = payload.header("From").to_string();
        let to_header = payload.header("To").to_string();
        let delivered_header = payload.header("Delivered-To").to_string();

        // Delivered-To falls back to To and vice versa; matching by
        // recipient should survive either header being absent.
        let delivered_to = if delivered_header.is_empty() {
            to_header.clone()
        } else {
            delivered_header
        };
        let to = if to_header.is_empty() {
            delivered_to.clone()
        } else {
            to_header
        };

        Ok(FetchedMessage {
            id: msg.id,
            from,
            to,
            delivered_to,
            subject: payload.header("Subject").to_string(),
            body: extract_plain_body(&payload),
        })
    }
}

// ── In-memory store for tests ───────────────────────────────────────
