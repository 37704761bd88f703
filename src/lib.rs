//! order-sift — mailbox order-status extraction engine.

pub mod config;
pub mod engine;
pub mod entries;
pub mod error;
pub mod fetcher;
pub mod gmail;
pub mod mask;
pub mod matcher;
pub mod query;
pub mod scheduler;
pub mod settings;
