//! Per-filter fetch-and-match runs and their roll-ups.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::FetchBounds;
use crate::error::{AuthError, ConfigError, Error, Result};
use crate::fetcher::fetch_all;
use crate::gmail::credentials::ClientCredentials;
use crate::matcher::{FilterMatcher, MatchedItem};
use crate::query::build_query;
use crate::settings::model::{
    Account, Filter, OrderIdArea, StatusArea, Token, split_statuses,
};

use super::Engine;

/// Result of one filter's fetch-and-match run. Transport and auth
/// failures mid-run land in `error` with zero items; configuration
/// problems never get this far.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FetchOutcome {
    pub items: Vec<MatchedItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FetchOutcome {
    fn failed(error: impl ToString) -> Self {
        Self {
            items: Vec::new(),
            error: Some(error.to_string()),
        }
    }
}

/// One filter's outcome inside a per-account roll-up.
#[derive(Debug, Clone, Serialize)]
pub struct FilterMessages {
    pub filter_id: String,
    pub parser_code: String,
    pub outcome: FetchOutcome,
}

/// All filters of one account, run in isolation from each other.
#[derive(Debug, Clone, Serialize)]
pub struct AccountMessages {
    pub account_id: String,
    pub account_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_email: Option<String>,
    pub filters: Vec<FilterMessages>,
}

/// Statuses supplied either as a list or as one comma/newline-separated
/// string; both normalize to the ordered deduplicated list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StatusList {
    List(Vec<String>),
    Text(String),
}

impl StatusList {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            StatusList::List(list) => split_statuses(&list.join("\n")),
            StatusList::Text(text) => split_statuses(&text),
        }
    }
}

/// Ad-hoc filter parameters for interactive fetch/preview calls. Set
/// fields replace the stored filter's values for this run only; nothing
/// is persisted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilterOverrides {
    pub title_filter: Option<String>,
    pub mask: Option<String>,
    pub order_id_search_area: Option<OrderIdArea>,
    pub status_search_areas: Option<Vec<StatusArea>>,
    pub statuses: Option<StatusList>,
}

impl FilterOverrides {
    pub fn apply(&self, base: &Filter) -> Filter {
        let mut filter = base.clone();
        if let Some(v) = &self.title_filter {
            filter.title_filter = v.clone();
        }
        if let Some(v) = &self.mask {
            filter.mask = v.clone();
        }
        if let Some(v) = self.order_id_search_area {
            filter.order_id_search_area = v;
        }
        if let Some(v) = &self.status_search_areas {
            filter.status_search_areas = v.clone();
        }
        if let Some(v) = &self.statuses {
            filter.statuses = v.clone().into_vec();
        }
        filter
    }
}

impl Engine {
    /// Fetch and match one account's messages with the stored first
    /// filter plus `overrides`. This is the interactive "try these
    /// parameters" entrypoint.
    pub async fn fetch(
        &self,
        account_id: &str,
        bounds: FetchBounds,
        overrides: &FilterOverrides,
    ) -> Result<FetchOutcome> {
        let settings = self.settings.load().await?;
        let account = settings
            .account(account_id)
            .ok_or_else(|| ConfigError::AccountNotFound {
                id: account_id.to_string(),
            })?;
        let base = account.filters.first().cloned().unwrap_or_default();
        let filter = overrides.apply(&base);
        self.fetch_filter_items(account, &filter, settings.parser.start_date.as_deref(), bounds)
            .await
    }

    /// Few-page fetch truncated to the first handful of items.
    pub async fn preview(
        &self,
        account_id: &str,
        overrides: &FilterOverrides,
    ) -> Result<FetchOutcome> {
        let mut outcome = self.fetch(account_id, FetchBounds::PREVIEW, overrides).await?;
        outcome.items.truncate(self.config.preview_limit);
        Ok(outcome)
    }

    /// Full run for one stored filter.
    pub async fn messages_by_account_filter(
        &self,
        account_id: &str,
        filter_id: &str,
    ) -> Result<FetchOutcome> {
        let settings = self.settings.load().await?;
        let account = settings
            .account(account_id)
            .ok_or_else(|| ConfigError::AccountNotFound {
                id: account_id.to_string(),
            })?;
        let filter = account
            .filters
            .iter()
            .find(|f| f.id == filter_id)
            .ok_or_else(|| ConfigError::FilterNotFound {
                account_id: account_id.to_string(),
                id: filter_id.to_string(),
            })?;
        self.fetch_filter_items(
            account,
            filter,
            settings.parser.start_date.as_deref(),
            self.config.scan_bounds,
        )
        .await
    }

    /// Full run for every filter of one account. A filter's failure is
    /// recorded on its own row and never stops its siblings.
    pub async fn messages_by_account(&self, account_id: &str) -> Result<AccountMessages> {
        let settings = self.settings.load().await?;
        let account = settings
            .account(account_id)
            .ok_or_else(|| ConfigError::AccountNotFound {
                id: account_id.to_string(),
            })?;

        let mut filters = Vec::with_capacity(account.filters.len());
        for filter in &account.filters {
            let outcome = match self
                .fetch_filter_items(
                    account,
                    filter,
                    settings.parser.start_date.as_deref(),
                    self.config.scan_bounds,
                )
                .await
            {
                Ok(outcome) => outcome,
                Err(e) => FetchOutcome::failed(e),
            };
            filters.push(FilterMessages {
                filter_id: filter.id.clone(),
                parser_code: filter.parser_code.clone(),
                outcome,
            });
        }

        Ok(AccountMessages {
            account_id: account.id.clone(),
            account_title: account.title.clone(),
            connected_email: account.connected_email.clone(),
            filters,
        })
    }

    /// One filter's run: validate, refresh the token, query, fetch,
    /// match. Configuration problems return `Err` before any remote
    /// work; auth/transport failures during the run come back as the
    /// outcome's error string.
    pub(super) async fn fetch_filter_items(
        &self,
        account: &Account,
        filter: &Filter,
        start_date: Option<&str>,
        bounds: FetchBounds,
    ) -> Result<FetchOutcome> {
        if filter.statuses.is_empty() {
            return Err(ConfigError::NoStatuses.into());
        }
        let Some(token) = &account.token else {
            return Err(AuthError::NotConnected {
                id: account.id.clone(),
            }
            .into());
        };

        let access_token = match self.fresh_access_token(account, token).await {
            Ok(access_token) => access_token,
            Err(e @ Error::Config(_)) => return Err(e),
            Err(e) => return Ok(FetchOutcome::failed(e)),
        };

        let query = build_query(
            &filter.statuses,
            &filter.title_filter,
            start_date,
            &filter.status_areas(),
        );
        debug!(account_id = %account.id, filter_id = %filter.id, %query, "Running filter");

        let store = (self.mail_stores)(&access_token);
        let messages = match fetch_all(store.as_ref(), &query, bounds).await {
            Ok(messages) => messages,
            Err(e) => return Ok(FetchOutcome::failed(e)),
        };

        let matcher = FilterMatcher::new(filter);
        let items: Vec<MatchedItem> = messages
            .iter()
            .filter_map(|message| matcher.evaluate(message))
            .collect();

        info!(
            account_id = %account.id,
            filter_id = %filter.id,
            fetched = messages.len(),
            matched = items.len(),
            "Filter run complete"
        );

        Ok(FetchOutcome { items, error: None })
    }

    /// Valid access token for this run; a refreshed token is persisted
    /// before use so a crash mid-run cannot strand the new token.
    async fn fresh_access_token(&self, account: &Account, token: &Token) -> Result<String> {
        let credentials = ClientCredentials::parse(&account.credentials)?;
        match self.tokens.ensure_fresh(&credentials, token).await? {
            Some(fresh) => {
                let access_token = fresh.access_token.clone();
                self.settings.set_token(&account.id, fresh).await?;
                Ok(access_token)
            }
            None => Ok(token.access_token.clone()),
        }
    }
}
