//! Entry updates from matched items, with per-run counters.

use serde::Serialize;
use tracing::{info, warn};

use crate::entries::EntryStore;
use crate::error::{ConfigError, Result};
use crate::matcher::MatchedItem;
use crate::settings::model::{Account, Filter};

use super::Engine;
use super::run::FetchOutcome;

/// Counters for one update run. Each matched item lands in exactly one
/// of `updated` / `skipped_*`; `errors` additionally counts failed
/// upserts and failed fetches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Matched items considered.
    pub items: usize,
    pub updated: usize,
    pub skipped_no_status_field: usize,
    pub skipped_no_entry_id: usize,
    pub skipped_empty_status: usize,
    pub errors: usize,
}

impl RunSummary {
    pub fn absorb(&mut self, other: &RunSummary) {
        self.items += other.items;
        self.updated += other.updated;
        self.skipped_no_status_field += other.skipped_no_status_field;
        self.skipped_no_entry_id += other.skipped_no_entry_id;
        self.skipped_empty_status += other.skipped_empty_status;
        self.errors += other.errors;
    }
}

/// One filter's update run inside a roll-up.
#[derive(Debug, Clone, Serialize)]
pub struct FilterRunSummary {
    pub filter_id: String,
    pub parser_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub summary: RunSummary,
}

/// All filters of one account, with roll-up totals.
#[derive(Debug, Clone, Serialize)]
pub struct AccountRunSummary {
    pub account_id: String,
    pub account_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_email: Option<String>,
    pub filters: Vec<FilterRunSummary>,
    pub totals: RunSummary,
}

/// A full scan across every account.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub accounts: Vec<AccountRunSummary>,
    pub totals: RunSummary,
}

/// Apply one filter's matched items to the entry store.
///
/// Each upsert is keyed `(entry_id, field_id)` and is idempotent, so
/// re-running a scan over already-processed mail changes nothing. A
/// failed upsert only counts an error; the remaining items and fields
/// still run.
pub async fn update_entries_for_filter(
    entries: &dyn EntryStore,
    filter: &Filter,
    items: &[MatchedItem],
) -> RunSummary {
    let mut summary = RunSummary {
        items: items.len(),
        ..RunSummary::default()
    };

    if filter.status_field_id <= 0 {
        summary.skipped_no_status_field = items.len();
        return summary;
    }

    for item in items {
        let entry_id: i64 = item.entry_id.trim().parse().unwrap_or(0);
        if entry_id <= 0 {
            summary.skipped_no_entry_id += 1;
            continue;
        }
        if item.status.is_empty() {
            summary.skipped_empty_status += 1;
            continue;
        }

        match entries
            .upsert(entry_id, filter.status_field_id, &item.status)
            .await
        {
            Ok(_) => summary.updated += 1,
            Err(e) => {
                warn!(entry_id, field_id = filter.status_field_id, error = %e, "Status upsert failed");
                summary.errors += 1;
            }
        }

        for extra in &item.extras {
            if extra.entry_field_id <= 0 || extra.value.is_empty() {
                continue;
            }
            if let Err(e) = entries
                .upsert(entry_id, extra.entry_field_id, &extra.value)
                .await
            {
                warn!(entry_id, field_id = extra.entry_field_id, code = %extra.code, error = %e, "Extra-field upsert failed");
                summary.errors += 1;
            }
        }
    }

    summary
}

impl Engine {
    /// Fetch, match and update entries for one stored filter.
    pub async fn update_entries_by_account_filter(
        &self,
        account_id: &str,
        filter_id: &str,
    ) -> Result<FilterRunSummary> {
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
        Ok(self
            .update_filter(account, filter, settings.parser.start_date.as_deref())
            .await)
    }

    /// Update entries for every filter of one account.
    pub async fn update_entries_by_account(&self, account_id: &str) -> Result<AccountRunSummary> {
        let settings = self.settings.load().await?;
        let account = settings
            .account(account_id)
            .ok_or_else(|| ConfigError::AccountNotFound {
                id: account_id.to_string(),
            })?;
        Ok(self
            .update_account(account, settings.parser.start_date.as_deref())
            .await)
    }

    /// Full scan: every filter of every account. The scheduled entry
    /// point.
    pub async fn update_all_accounts(&self) -> Result<ScanReport> {
        let settings = self.settings.load().await?;
        let start_date = settings.parser.start_date.as_deref();

        let mut accounts = Vec::with_capacity(settings.accounts.len());
        let mut totals = RunSummary::default();
        for account in &settings.accounts {
            let summary = self.update_account(account, start_date).await;
            totals.absorb(&summary.totals);
            accounts.push(summary);
        }

        info!(
            accounts = accounts.len(),
            updated = totals.updated,
            errors = totals.errors,
            "Scan complete"
        );
        Ok(ScanReport { accounts, totals })
    }

    async fn update_account(&self, account: &Account, start_date: Option<&str>) -> AccountRunSummary {
        let mut filters = Vec::with_capacity(account.filters.len());
        let mut totals = RunSummary::default();
        for filter in &account.filters {
            let row = self.update_filter(account, filter, start_date).await;
            totals.absorb(&row.summary);
            filters.push(row);
        }
        AccountRunSummary {
            account_id: account.id.clone(),
            account_title: account.title.clone(),
            connected_email: account.connected_email.clone(),
            filters,
            totals,
        }
    }

    /// One filter's fetch-and-update. Any failure is recorded on the
    /// row; siblings are unaffected.
    async fn update_filter(
        &self,
        account: &Account,
        filter: &Filter,
        start_date: Option<&str>,
    ) -> FilterRunSummary {
        let outcome = match self
            .fetch_filter_items(account, filter, start_date, self.config.scan_bounds)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => FetchOutcome {
                items: Vec::new(),
                error: Some(e.to_string()),
            },
        };

        let mut summary =
            update_entries_for_filter(self.entries.as_ref(), filter, &outcome.items).await;
        if let Some(error) = &outcome.error {
            warn!(account_id = %account.id, filter_id = %filter.id, %error, "Filter run failed");
            summary.errors += 1;
        }

        FilterRunSummary {
            filter_id: filter.id.clone(),
            parser_code: filter.parser_code.clone(),
            error: outcome.error,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::entries::MemoryEntryStore;
    use crate::gmail::client::memory::InMemoryMailStore;
    use crate::matcher::ExtraValue;
    use crate::settings::model::ExtraFieldSpec;

    use super::super::run::tests::{account_with, engine_over, msg, paid_filter, settings_with};
    use super::*;

    fn item(entry_id: &str, status: &str) -> MatchedItem {
        MatchedItem {
            message_id: "m1".into(),
            subject: String::new(),
            from: String::new(),
            delivered_to: String::new(),
            status: status.into(),
            entry_id: entry_id.into(),
            extras: Vec::new(),
            body: String::new(),
        }
    }

    #[tokio::test]
    async fn counters_partition_the_items() {
        let store = MemoryEntryStore::new();
        let filter = paid_filter();
        let items = vec![
            item("7", "Paid"),
            item("", "Paid"),
            item("0", "Paid"),
            item("9", ""),
        ];
        let summary = update_entries_for_filter(&store, &filter, &items).await;
        assert_eq!(summary.items, 4);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.skipped_no_entry_id, 2);
        assert_eq!(summary.skipped_empty_status, 1);
        assert_eq!(summary.errors, 0);
        assert_eq!(store.get(7, 3).await.as_deref(), Some("Paid"));
    }

    #[tokio::test]
    async fn unset_status_field_skips_everything() {
        let store = MemoryEntryStore::new();
        let mut filter = paid_filter();
        filter.status_field_id = 0;
        let summary =
            update_entries_for_filter(&store, &filter, &[item("7", "Paid")]).await;
        assert_eq!(summary.skipped_no_status_field, 1);
        assert_eq!(summary.updated, 0);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn rerun_is_idempotent() {
        let store = MemoryEntryStore::new();
        let filter = paid_filter();
        let items = vec![item("7", "Paid")];
        update_entries_for_filter(&store, &filter, &items).await;
        let summary = update_entries_for_filter(&store, &filter, &items).await;
        assert_eq!(summary.updated, 1);
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get(7, 3).await.as_deref(), Some("Paid"));
    }

    #[tokio::test]
    async fn extras_land_in_their_own_fields() {
        let store = MemoryEntryStore::new();
        let mut filter = paid_filter();
        filter.extra_fields = vec![ExtraFieldSpec {
            id: "x1".into(),
            title: "Tracking".into(),
            code: "tracking".into(),
            mask: "Tracking: {value}".into(),
            search_area: Default::default(),
            entry_field_id: 9,
        }];
        let mut matched = item("7", "Paid");
        matched.extras = vec![
            ExtraValue {
                spec_id: "x1".into(),
                code: "tracking".into(),
                entry_field_id: 9,
                value: "1Z999".into(),
            },
            ExtraValue {
                spec_id: "x2".into(),
                code: "empty".into(),
                entry_field_id: 10,
                value: String::new(),
            },
            ExtraValue {
                spec_id: "x3".into(),
                code: "unmapped".into(),
                entry_field_id: 0,
                value: "ignored".into(),
            },
        ];
        let summary = update_entries_for_filter(&store, &filter, &[matched]).await;
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.errors, 0);
        assert_eq!(store.get(7, 3).await.as_deref(), Some("Paid"));
        assert_eq!(store.get(7, 9).await.as_deref(), Some("1Z999"));
        assert_eq!(store.get(7, 10).await, None);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn scan_rolls_up_accounts_and_isolates_failures() {
        let mut mail = InMemoryMailStore::new();
        mail.push(msg("m1", "Your order-4821 has been Paid"));
        mail.push(msg("m2", "order-4822 was Paid yesterday"));

        let connected = account_with(vec![paid_filter()]);
        let mut disconnected = account_with(vec![paid_filter()]);
        disconnected.id = "a2".into();
        disconnected.token = None;

        let entries = Arc::new(MemoryEntryStore::new());
        let engine = engine_over(
            settings_with(vec![connected, disconnected]),
            mail,
            entries.clone(),
        );

        let report = engine.update_all_accounts().await.unwrap();
        assert_eq!(report.accounts.len(), 2);

        let ok = &report.accounts[0];
        assert_eq!(ok.totals.updated, 2);
        assert_eq!(ok.totals.errors, 0);
        assert_eq!(entries.get(4821, 3).await.as_deref(), Some("Paid"));
        assert_eq!(entries.get(4822, 3).await.as_deref(), Some("Paid"));

        let failed = &report.accounts[1];
        assert!(failed.filters[0].error.is_some());
        assert_eq!(failed.totals.updated, 0);
        assert_eq!(failed.totals.errors, 1);

        assert_eq!(report.totals.updated, 2);
        assert_eq!(report.totals.errors, 1);
    }

    #[tokio::test]
    async fn update_by_filter_reports_one_row() {
        let mut mail = InMemoryMailStore::new();
        mail.push(msg("m1", "Your order-4821 has been Paid"));
        let entries = Arc::new(MemoryEntryStore::new());
        let engine = engine_over(
            settings_with(vec![account_with(vec![paid_filter()])]),
            mail,
            entries.clone(),
        );

        let row = engine
            .update_entries_by_account_filter("a1", "f1")
            .await
            .unwrap();
        assert!(row.error.is_none());
        assert_eq!(row.summary.updated, 1);
        assert_eq!(entries.get(4821, 3).await.as_deref(), Some("Paid"));
    }
}
