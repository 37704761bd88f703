//! Persisted configuration model — accounts, filters, tokens.
//!
//! The settings document is owned by the external configuration surface;
//! the engine reads it and writes back only `Account::token` and the
//! connected-email fields. The schema is explicitly versioned: older
//! documents (v1: one mask/status string per account, v2: filters without
//! extra fields or stable ids) are lifted into the current shape by
//! [`Settings::from_value`] at load time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ConfigError;

/// Current settings schema version.
pub const SETTINGS_VERSION: u32 = 3;

/// Expiry skew: a token this close to its deadline counts as expired.
const EXPIRY_SKEW_SECS: i64 = 30;

// ── Areas ───────────────────────────────────────────────────────────

/// Header area searched for the order-id mask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderIdArea {
    To,
    From,
    #[default]
    Subject,
}

/// Area searched for statuses and extra-field masks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusArea {
    #[default]
    Subject,
    Body,
}

// ── Token ───────────────────────────────────────────────────────────

/// OAuth token blob. Opaque beyond the presence/expiry checks below —
/// unknown provider fields ride along in `extra` and are written back
/// untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds, as returned by the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    /// Unix timestamp of when the token was issued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Token {
    /// Whether the access token is past (or within 30s of) its deadline.
    /// A token without expiry metadata counts as expired, which forces
    /// the refresh path rather than a doomed API call.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match (self.created, self.expires_in) {
            (Some(created), Some(expires_in)) => {
                created + expires_in - EXPIRY_SKEW_SECS <= now.timestamp()
            }
            _ => true,
        }
    }
}

// ── Filters ─────────────────────────────────────────────────────────

/// A secondary value extracted via a `{value}` mask into its own
/// destination field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraFieldSpec {
    #[serde(default = "new_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub code: String,
    /// Template with a `{value}` placeholder. Empty disables extraction.
    #[serde(default)]
    pub mask: String,
    #[serde(default)]
    pub search_area: StatusArea,
    /// Destination field in the entry store; 0 = unset.
    #[serde(default)]
    pub entry_field_id: i64,
}

/// One filter rule set scoped to a mailbox account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default = "new_id")]
    pub id: String,
    /// Free-form label used to identify the filter in summaries.
    #[serde(default)]
    pub parser_code: String,
    /// Subject substring pre-filter; also re-checked client-side.
    #[serde(default)]
    pub title_filter: String,
    #[serde(default)]
    pub order_id_search_area: OrderIdArea,
    /// Order-id template with an `{entry_id}` placeholder. Empty
    /// disables the order-id gate.
    #[serde(default)]
    pub mask: String,
    /// Non-empty; defaults to `[Subject]` when absent.
    #[serde(default)]
    pub status_search_areas: Vec<StatusArea>,
    /// Ordered, deduplicated case-insensitively. First match wins.
    #[serde(default)]
    pub statuses: Vec<String>,
    /// Destination field for the matched status; 0 = unset.
    #[serde(default)]
    pub status_field_id: i64,
    #[serde(default)]
    pub extra_fields: Vec<ExtraFieldSpec>,
}

impl Filter {
    /// Effective status areas — never empty.
    pub fn status_areas(&self) -> Vec<StatusArea> {
        let mut areas: Vec<StatusArea> = Vec::new();
        for a in &self.status_search_areas {
            if !areas.contains(a) {
                areas.push(*a);
            }
        }
        if areas.is_empty() {
            areas.push(StatusArea::Subject);
        }
        areas
    }

    /// A filter with nothing configured is never persisted.
    pub fn is_blank(&self) -> bool {
        self.parser_code.trim().is_empty()
            && self.title_filter.trim().is_empty()
            && self.mask.trim().is_empty()
            && self.statuses.iter().all(|s| s.trim().is_empty())
            && self.status_field_id == 0
            && self.extra_fields.is_empty()
    }
}

// ── Account ─────────────────────────────────────────────────────────

/// One connected mailbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    #[serde(default = "new_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Provider credentials JSON blob, stored as entered.
    #[serde(default)]
    pub credentials: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<Token>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub filters: Vec<Filter>,
}

// ── Settings root ───────────────────────────────────────────────────

/// Parser-wide options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParserSettings {
    /// Lower bound for the remote date term, `YYYY-MM-DD`.
    #[serde(default)]
    pub start_date: Option<String>,
}

/// Root settings document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub version: u32,
    #[serde(default)]
    pub parser: ParserSettings,
    #[serde(default)]
    pub accounts: Vec<Account>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            parser: ParserSettings::default(),
            accounts: Vec::new(),
        }
    }
}

impl Settings {
    /// Parse a settings document of any historical version into the
    /// current shape. Migration is explicit per version rather than
    /// field sniffing scattered through the readers.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        let Value::Object(mut root) = value else {
            return Err(ConfigError::ParseError(
                "settings root must be a JSON object".into(),
            ));
        };

        let version = root
            .get("version")
            .and_then(Value::as_u64)
            .unwrap_or(1) as u32;
        if version > SETTINGS_VERSION {
            return Err(ConfigError::ParseError(format!(
                "settings version {version} is newer than supported {SETTINGS_VERSION}"
            )));
        }

        let accounts = match root.remove("accounts") {
            Some(Value::Array(rows)) => rows
                .into_iter()
                .map(|row| migrate_account(row, version))
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => {
                return Err(ConfigError::ParseError("accounts must be an array".into()));
            }
            None => Vec::new(),
        };

        let parser = match root.remove("parser") {
            Some(v) => serde_json::from_value(v)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?,
            None => ParserSettings::default(),
        };

        Ok(Self {
            version: SETTINGS_VERSION,
            parser,
            accounts,
        })
    }

    pub fn account(&self, id: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.id == id)
    }

    pub fn account_mut(&mut self, id: &str) -> Option<&mut Account> {
        self.accounts.iter_mut().find(|a| a.id == id)
    }
}

fn migrate_account(row: Value, version: u32) -> Result<Account, ConfigError> {
    let Value::Object(mut obj) = row else {
        return Err(ConfigError::ParseError("account row must be an object".into()));
    };

    // v1 carried one mask + one status string directly on the account;
    // lift them into a single filter.
    if version < 2 && !obj.contains_key("filters") {
        let mask = obj
            .remove("mask")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        let status = obj
            .remove("status")
            .or_else(|| obj.remove("statuses"))
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        let status_field_id = obj
            .remove("status_field_id")
            .and_then(|v| v.as_i64())
            .unwrap_or(0);

        let filter = Filter {
            id: new_id(),
            mask,
            statuses: split_statuses(&status),
            status_field_id,
            ..Filter::default()
        };
        if !filter.is_blank() {
            obj.insert(
                "filters".into(),
                serde_json::to_value(vec![filter])
                    .map_err(|e| ConfigError::ParseError(e.to_string()))?,
            );
        }
    }

    let mut account: Account = serde_json::from_value(Value::Object(obj))
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    // Normalize every filter regardless of source version: statuses
    // configured as one comma/newline string arrive via `statuses` as a
    // single element; split and dedup them, and drop blank filters.
    for filter in &mut account.filters {
        let joined = filter.statuses.join("\n");
        filter.statuses = split_statuses(&joined);
    }
    account.filters.retain(|f| !f.is_blank());

    Ok(account)
}

/// Split a comma/newline-separated status string into an ordered list,
/// trimming entries and deduplicating case-insensitively while
/// preserving first-seen order.
pub fn split_statuses(raw: &str) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    let mut out: Vec<String> = Vec::new();
    for part in raw.split(['\n', ',']) {
        let s = part.trim();
        if s.is_empty() {
            continue;
        }
        let key = s.to_lowercase();
        if !seen.contains(&key) {
            seen.push(key);
            out.push(s.to_string());
        }
    }
    out
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_statuses_preserves_order_and_dedups_case_insensitively() {
        let out = split_statuses("Paid, Refunded\ncancelled, PAID, ");
        assert_eq!(out, vec!["Paid", "Refunded", "cancelled"]);
    }

    #[test]
    fn token_without_expiry_counts_as_expired() {
        let token = Token {
            access_token: "abc".into(),
            refresh_token: None,
            expires_in: None,
            created: None,
            extra: serde_json::Map::new(),
        };
        assert!(token.is_expired(Utc::now()));
    }

    #[test]
    fn token_expiry_respects_skew() {
        let now = Utc::now();
        let fresh = Token {
            access_token: "abc".into(),
            refresh_token: None,
            expires_in: Some(3600),
            created: Some(now.timestamp()),
            extra: serde_json::Map::new(),
        };
        assert!(!fresh.is_expired(now));

        let nearly = Token {
            expires_in: Some(20),
            ..fresh.clone()
        };
        assert!(nearly.is_expired(now));
    }

    #[test]
    fn token_extra_fields_round_trip() {
        let json = serde_json::json!({
            "access_token": "ya29.x",
            "refresh_token": "1//r",
            "expires_in": 3599,
            "created": 1700000000,
            "scope": "https://www.googleapis.com/auth/gmail.readonly",
            "token_type": "Bearer"
        });
        let token: Token = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(token.extra.get("token_type").unwrap(), "Bearer");
        let back = serde_json::to_value(&token).unwrap();
        assert_eq!(back, json);
    }

    #[test]
    fn v1_account_lifts_mask_and_status_into_a_filter() {
        let doc = serde_json::json!({
            "accounts": [{
                "title": "Shop inbox",
                "credentials": "{}",
                "mask": "order-{entry_id}",
                "status": "Paid, Cancelled",
                "status_field_id": 12
            }]
        });
        let settings = Settings::from_value(doc).unwrap();
        assert_eq!(settings.version, SETTINGS_VERSION);
        let filters = &settings.accounts[0].filters;
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].mask, "order-{entry_id}");
        assert_eq!(filters[0].statuses, vec!["Paid", "Cancelled"]);
        assert_eq!(filters[0].status_field_id, 12);
        assert!(!filters[0].id.is_empty());
    }

    #[test]
    fn v2_filters_gain_ids_and_extra_field_defaults() {
        let doc = serde_json::json!({
            "version": 2,
            "accounts": [{
                "title": "Shop",
                "filters": [{
                    "parser_code": "shop-a",
                    "statuses": ["Paid, Refunded"],
                    "status_field_id": 3
                }]
            }]
        });
        let settings = Settings::from_value(doc).unwrap();
        let filter = &settings.accounts[0].filters[0];
        assert!(!filter.id.is_empty());
        assert_eq!(filter.statuses, vec!["Paid", "Refunded"]);
        assert!(filter.extra_fields.is_empty());
        assert_eq!(filter.status_areas(), vec![StatusArea::Subject]);
    }

    #[test]
    fn blank_filters_are_dropped() {
        let doc = serde_json::json!({
            "version": 3,
            "accounts": [{ "filters": [{}] }]
        });
        let settings = Settings::from_value(doc).unwrap();
        assert!(settings.accounts[0].filters.is_empty());
    }

    #[test]
    fn newer_version_is_rejected() {
        let doc = serde_json::json!({ "version": 9, "accounts": [] });
        assert!(Settings::from_value(doc).is_err());
    }

    #[test]
    fn status_areas_default_to_subject() {
        let filter = Filter::default();
        assert_eq!(filter.status_areas(), vec![StatusArea::Subject]);
    }
}
