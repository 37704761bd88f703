//! Settings persistence — the engine's view of the external
//! configuration store.
//!
//! The engine reads the whole document and writes back only account
//! tokens and connected-email metadata. Writes on the file backend are
//! serialized behind a mutex so a refresh's read-modify-write of the
//! token cannot interleave with another writer on the same handle.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::error::ConfigError;
use crate::settings::model::{Settings, Token};

/// Read side plus the two write-backs the engine performs.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Load the full settings document.
    async fn load(&self) -> Result<Settings, ConfigError>;

    /// Persist a refreshed token for one account.
    async fn set_token(&self, account_id: &str, token: Token) -> Result<(), ConfigError>;

    /// Record the mailbox address and time after a successful
    /// (re)connection. Written by the authorization flow.
    async fn set_connected_email(&self, account_id: &str, email: &str)
        -> Result<(), ConfigError>;
}

/// JSON-file backend. A missing file reads as empty settings.
pub struct JsonSettingsStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonSettingsStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    async fn read_document(&self) -> Result<Settings, ConfigError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => {
                let value: serde_json::Value = serde_json::from_str(&text)
                    .map_err(|e| ConfigError::ParseError(e.to_string()))?;
                Settings::from_value(value)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Settings::default()),
            Err(e) => Err(ConfigError::Io(e)),
        }
    }

    async fn write_document(&self, settings: &Settings) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let text = serde_json::to_string_pretty(settings)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        tokio::fs::write(&self.path, text).await?;
        Ok(())
    }

    /// Replace the whole document (used by the configuration surface,
    /// not by engine runs). Blank filters are never persisted.
    pub async fn save(&self, mut settings: Settings) -> Result<(), ConfigError> {
        let _guard = self.write_lock.lock().await;
        for account in &mut settings.accounts {
            account.filters.retain(|f| !f.is_blank());
        }
        self.write_document(&settings).await
    }
}

#[async_trait]
impl SettingsStore for JsonSettingsStore {
    async fn load(&self) -> Result<Settings, ConfigError> {
        self.read_document().await
    }

    async fn set_token(&self, account_id: &str, token: Token) -> Result<(), ConfigError> {
        let _guard = self.write_lock.lock().await;
        let mut settings = self.read_document().await?;
        let account = settings
            .account_mut(account_id)
            .ok_or_else(|| ConfigError::AccountNotFound {
                id: account_id.to_string(),
            })?;
        account.token = Some(token);
        self.write_document(&settings).await
    }

    async fn set_connected_email(
        &self,
        account_id: &str,
        email: &str,
    ) -> Result<(), ConfigError> {
        let _guard = self.write_lock.lock().await;
        let mut settings = self.read_document().await?;
        let account = settings
            .account_mut(account_id)
            .ok_or_else(|| ConfigError::AccountNotFound {
                id: account_id.to_string(),
            })?;
        if !email.is_empty() {
            account.connected_email = Some(email.to_string());
        }
        account.connected_at = Some(Utc::now());
        self.write_document(&settings).await
    }
}
