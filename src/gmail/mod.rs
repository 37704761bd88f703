//! Gmail remote store: credentials, token lifecycle, REST client,
//! payload decoding.

pub mod auth;
pub mod body;
pub mod client;
pub mod credentials;

pub use auth::TokenLifecycle;
pub use client::{FetchedMessage, GmailClient, MailStore, MessagePage};
pub use credentials::ClientCredentials;
