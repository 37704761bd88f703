//! Run composition.
//!
//! The engine wires the settings store, the token lifecycle, the remote
//! mail store and the entry store into the two top-level operations:
//! fetch-and-match (`run`) and entry updates (`update`). Every remote
//! surface sits behind a trait, so the whole composition runs unchanged
//! against in-memory doubles.

mod run;
mod update;

pub use run::{AccountMessages, FetchOutcome, FilterMessages, FilterOverrides, StatusList};
pub use update::{
    AccountRunSummary, FilterRunSummary, RunSummary, ScanReport, update_entries_for_filter,
};

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::entries::EntryStore;
use crate::gmail::auth::TokenLifecycle;
use crate::gmail::client::{GmailClient, MailStore};
use crate::settings::store::SettingsStore;

/// Builds the mail store for one run from a fresh access token.
pub type MailStoreFactory = Box<dyn Fn(&str) -> Arc<dyn MailStore> + Send + Sync>;

pub struct Engine {
    settings: Arc<dyn SettingsStore>,
    entries: Arc<dyn EntryStore>,
    tokens: TokenLifecycle,
    mail_stores: MailStoreFactory,
    config: EngineConfig,
}

impl Engine {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        entries: Arc<dyn EntryStore>,
        config: EngineConfig,
    ) -> Self {
        let http = reqwest::Client::new();
        let store_http = http.clone();
        Self {
            settings,
            entries,
            tokens: TokenLifecycle::new(http),
            mail_stores: Box::new(move |access_token| {
                Arc::new(GmailClient::new(store_http.clone(), access_token))
            }),
            config,
        }
    }

    /// Swap the remote mail store (tests, alternative providers).
    pub fn with_mail_store_factory(mut self, factory: MailStoreFactory) -> Self {
        self.mail_stores = factory;
        self
    }

    /// Point token refresh at a different endpoint (tests).
    pub fn with_token_lifecycle(mut self, tokens: TokenLifecycle) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
