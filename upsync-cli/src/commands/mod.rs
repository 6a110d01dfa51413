//! Subcommands and the flags they share.

pub mod plan;
pub mod public_path;
pub mod sync;

use std::future::Future;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use upsync_core::{config, SyncConfig, SyncOptions};

/// Overrides applied on top of `.upsync.yaml`.
#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    /// Config file to read instead of `./.upsync.yaml`.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Public base URL of the bucket.
    #[arg(long, value_name = "URL")]
    pub bucket_domain: Option<String>,

    /// Directory backing the bucket.
    #[arg(long, value_name = "DIR")]
    pub bucket_root: Option<PathBuf>,

    /// Build output directory.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Remote prefix for artifacts and the manifest.
    #[arg(long, value_name = "PATH")]
    pub upload_path: Option<String>,

    /// Maximum concurrent uploads.
    #[arg(long, value_name = "N")]
    pub batch: Option<usize>,

    /// Delete artifacts that left the build two runs ago.
    #[arg(long)]
    pub delete_stale: bool,
}

impl ConfigArgs {
    /// Defaults < config file < flags.
    pub fn load(&self) -> Result<SyncConfig> {
        let mut cfg = match &self.config {
            Some(path) => config::load_file(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => config::load().context("failed to load .upsync.yaml")?,
        };

        if let Some(domain) = &self.bucket_domain {
            cfg.bucket_domain = domain.clone();
        }
        if let Some(root) = &self.bucket_root {
            cfg.bucket_root = Some(root.clone());
        }
        if let Some(dir) = &self.output_dir {
            cfg.output_dir = dir.clone();
        }
        if let Some(path) = &self.upload_path {
            cfg.upload_path = path.clone();
        }
        if let Some(batch) = self.batch {
            cfg.batch = batch;
        }
        if self.delete_stale {
            cfg.delta_update = false;
        }
        Ok(cfg)
    }

    /// Loaded and validated configuration.
    pub fn resolve(&self) -> Result<(SyncConfig, SyncOptions)> {
        let cfg = self.load()?;
        tracing::debug!(config = ?cfg, "resolved configuration");
        let options = cfg.validate()?;
        Ok((cfg, options))
    }
}

/// Drive one async command to completion.
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;
    Ok(runtime.block_on(future))
}
