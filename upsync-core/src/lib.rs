//! upsync core library: domain types and configuration.
//!
//! - [`types`]: [`ArtifactName`] and the persisted [`Manifest`]
//! - [`config`]: [`SyncConfig`] loading and validation into [`SyncOptions`]
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::{SyncConfig, SyncOptions};
pub use error::ConfigError;
pub use types::{ArtifactName, Manifest, Selection, MANIFEST_FILENAME};
