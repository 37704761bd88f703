//! Persisted configuration: model + store boundary.

pub mod model;
pub mod store;

pub use model::{
    Account, ExtraFieldSpec, Filter, OrderIdArea, ParserSettings, Settings, StatusArea, Token,
};
pub use store::{JsonSettingsStore, SettingsStore};
