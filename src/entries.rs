//! Entry store boundary.
//!
//! Matched statuses and extra-field values land in an external entry
//! store as one value per `(entry_id, field_id)` pair. The store is a
//! trait so the update coordinator can run against the in-memory
//! implementation in tests and local runs, and against the REST
//! implementation in production.

use std::collections::HashMap;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::TransportError;

/// Writable store of entry field values.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Insert or replace the value for `(entry_id, field_id)`. At most
    /// one value is stored per pair. Returns `true` when the stored
    /// value changed, `false` when it was already identical.
    async fn upsert(
        &self,
        entry_id: i64,
        field_id: i64,
        value: &str,
    ) -> Result<bool, TransportError>;
}

// ── In-memory implementation ────────────────────────────────────────

/// Map-backed store for tests and local dry runs.
#[derive(Default)]
pub struct MemoryEntryStore {
    values: Mutex<HashMap<(i64, i64), String>>,
}

impl MemoryEntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, entry_id: i64, field_id: i64) -> Option<String> {
        self.values.lock().await.get(&(entry_id, field_id)).cloned()
    }

    pub async fn len(&self) -> usize {
        self.values.lock().await.len()
    }
}

#[async_trait]
impl EntryStore for MemoryEntryStore {
    async fn upsert(
        &self,
        entry_id: i64,
        field_id: i64,
        value: &str,
    ) -> Result<bool, TransportError> {
        let mut values = self.values.lock().await;
        match values.insert((entry_id, field_id), value.to_string()) {
            Some(previous) => Ok(previous != value),
            None => Ok(true),
        }
    }
}

// ── REST implementation ─────────────────────────────────────────────

#[derive(Serialize)]
struct UpsertRequest<'a> {
    value: &'a str,
}

/// Entry store behind an HTTP API: `PUT
/// {base}/entries/{entry_id}/fields/{field_id}` with a JSON `value`.
pub struct RestEntryStore {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl RestEntryStore {
    pub fn new(base_url: impl Into<String>, api_key: Option<SecretString>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl EntryStore for RestEntryStore {
    async fn upsert(
        &self,
        entry_id: i64,
        field_id: i64,
        value: &str,
    ) -> Result<bool, TransportError> {
        let url = format!("{}/entries/{entry_id}/fields/{field_id}", self.base_url);
        let mut request = self.http.put(&url).json(&UpsertRequest { value });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Api {
                status: status.as_u16(),
                body,
            });
        }
        debug!(entry_id, field_id, "Stored entry field value");
        Ok(true)
    }
}
