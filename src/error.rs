//! Error types for order-sift.

/// Top-level error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),
}

/// Configuration-related errors. Returned immediately, before any
/// remote work is performed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No statuses configured — add at least one status to match")]
    NoStatuses,

    #[error("Account not found: {id}")]
    AccountNotFound { id: String },

    #[error("Filter not found: {id} (account {account_id})")]
    FilterNotFound { account_id: String, id: String },

    #[error("Invalid credentials JSON: {reason}")]
    InvalidCredentials { reason: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse settings: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Authentication/token errors. `ReauthRequired` is fatal for the run
/// and must never be retried automatically.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Account {id} is not connected")]
    NotConnected { id: String },

    #[error("Token expired and no refresh token present — reconnect the account")]
    ReauthRequired,

    #[error("Token refresh failed: {reason}")]
    RefreshFailed { reason: String },
}

/// Remote call failures (search, fetch, refresh exchange, upsert).
/// Captured as a string at the fetch boundary; sibling filters and
/// accounts keep running.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Malformed message payload data. Never fatal — the decoders default
/// to empty strings and matching continues.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Payload is not valid UTF-8")]
    Utf8,
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;
