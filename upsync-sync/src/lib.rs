//! # upsync-sync
//!
//! Incremental artifact sync engine.
//!
//! Build a [`Syncer`] from a [`BuildHost`], an [`ObjectStore`], a
//! [`ManifestFetcher`] and validated [`upsync_core::SyncOptions`], then call
//! [`Syncer::run`]. Only artifacts missing from the last run are uploaded, and
//! stale ones are deleted one generation late (see [`diff`]).

pub mod diff;
pub mod error;
pub mod fetch;
pub mod host;
pub mod manifest;
pub mod pipeline;
pub mod ports;
pub mod runner;
pub mod select;
pub mod store;

pub use diff::{diff, DiffResult};
pub use error::{FetchError, HostError, StoreError, SyncError};
pub use fetch::HttpFetcher;
pub use host::FsBuildHost;
pub use manifest::ManifestStore;
pub use pipeline::{DeletionOutcome, SyncPhase, SyncPlan, SyncReport, Syncer, UploadTask};
pub use ports::{BuildHost, Content, DeleteOutcome, ManifestFetcher, ObjectStore};
pub use runner::run_limited;
pub use select::{select, Selector};
pub use store::{LocalDirStore, MemoryStore};
