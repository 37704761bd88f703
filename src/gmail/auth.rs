//! Token lifecycle — expiry checks and refresh-token exchange.
//!
//! A run moves an account from connected-expired back to connected-valid
//! by exchanging the stored refresh token at the provider's token
//! endpoint. When no refresh token exists the run fails with
//! [`AuthError::ReauthRequired`]; that state needs interactive
//! re-authorization and is never retried here.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::error::{AuthError, Error, TransportError};
use crate::gmail::credentials::ClientCredentials;
use crate::settings::model::Token;

const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Wire shape of a refresh response.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

/// Refreshes expired tokens for one provider endpoint.
pub struct TokenLifecycle {
    http: reqwest::Client,
    token_url: String,
}

impl TokenLifecycle {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            token_url: GOOGLE_TOKEN_URL.to_string(),
        }
    }

    /// Point the exchange at a different endpoint (tests, proxies).
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Return a refreshed token when the current one is expired, `None`
    /// when it is still valid. The caller persists the returned token.
    pub async fn ensure_fresh(
        &self,
        credentials: &ClientCredentials,
        token: &Token,
    ) -> Result<Option<Token>, Error> {
        if !token.is_expired(Utc::now()) {
            return Ok(None);
        }

        let Some(refresh_token) = token.refresh_token.as_deref() else {
            return Err(AuthError::ReauthRequired.into());
        };

        debug!(client_id = %credentials.client_id, "Refreshing expired access token");

        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret()),
            ("refresh_token", refresh_token),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(TransportError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::RefreshFailed {
                reason: format!("{status}: {body}"),
            }
            .into());
        }

        let fresh: RefreshResponse = response
            .json()
            .await
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;

        Ok(Some(merge_refreshed(token, fresh, Utc::now())))
    }
}

/// Build the token to persist from a refresh response. The previous
/// refresh token is retained when the provider omits one — dropping it
/// would strand the account in a reauth-required state.
fn merge_refreshed(previous: &Token, fresh: RefreshResponse, now: DateTime<Utc>) -> Token {
    Token {
        access_token: fresh.access_token,
        refresh_token: fresh
            .refresh_token
            .or_else(|| previous.refresh_token.clone()),
        expires_in: fresh.expires_in,
        created: Some(now.timestamp()),
        extra: fresh.extra,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn previous_token() -> Token {
        Token {
            access_token: "old-access".into(),
            refresh_token: Some("old-refresh".into()),
            expires_in: Some(3600),
            created: Some(0),
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn refresh_response_without_refresh_token_keeps_previous() {
        let fresh: RefreshResponse = serde_json::from_value(serde_json::json!({
            "access_token": "new-access",
            "expires_in": 3599,
            "token_type": "Bearer"
        }))
        .unwrap();

        let merged = merge_refreshed(&previous_token(), fresh, Utc::now());
        assert_eq!(merged.access_token, "new-access");
        assert_eq!(merged.refresh_token.as_deref(), Some("old-refresh"));
        assert!(merged.created.is_some());
    }

    #[test]
    fn refresh_response_with_refresh_token_replaces_previous() {
        let fresh: RefreshResponse = serde_json::from_value(serde_json::json!({
            "access_token": "new-access",
            "refresh_token": "new-refresh",
            "expires_in": 3599
        }))
        .unwrap();

        let merged = merge_refreshed(&previous_token(), fresh, Utc::now());
        assert_eq!(merged.refresh_token.as_deref(), Some("new-refresh"));
    }

    #[test]
    fn merged_token_is_fresh() {
        let fresh: RefreshResponse = serde_json::from_value(serde_json::json!({
            "access_token": "new-access",
            "expires_in": 3599
        }))
        .unwrap();
        let now = Utc::now();
        let merged = merge_refreshed(&previous_token(), fresh, now);
        assert!(!merged.is_expired(now));
    }

    #[tokio::test]
    async fn valid_token_needs_no_refresh() {
        let lifecycle = TokenLifecycle::new(reqwest::Client::new());
        let creds = ClientCredentials::parse(r#"{"client_id":"i","client_secret":"s"}"#).unwrap();
        let token = Token {
            created: Some(Utc::now().timestamp()),
            ..previous_token()
        };
        let refreshed = lifecycle.ensure_fresh(&creds, &token).await.unwrap();
        assert!(refreshed.is_none());
    }

    #[tokio::test]
    async fn expired_without_refresh_token_requires_reauth() {
        let lifecycle = TokenLifecycle::new(reqwest::Client::new());
        let creds = ClientCredentials::parse(r#"{"client_id":"i","client_secret":"s"}"#).unwrap();
        let token = Token {
            refresh_token: None,
            ..previous_token()
        };
        let err = lifecycle.ensure_fresh(&creds, &token).await.unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::ReauthRequired)));
    }
}
