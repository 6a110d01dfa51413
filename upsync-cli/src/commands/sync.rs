//! `upsync sync`: upload the build output and advance the manifest.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use upsync_sync::{DeletionOutcome, FsBuildHost, HttpFetcher, LocalDirStore, SyncReport, Syncer};

use super::{block_on, plan::print_plan, ConfigArgs};

/// Arguments for `upsync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Show what would be uploaded and deleted without touching the bucket.
    #[arg(long)]
    pub dry_run: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let (cfg, options) = self.config.resolve()?;
        let bucket_root = cfg
            .bucket_root
            .clone()
            .context("bucket_root is required; set it in .upsync.yaml or pass --bucket-root")?;

        let host = FsBuildHost::new(&cfg.output_dir);
        let store = LocalDirStore::new(bucket_root, &cfg.bucket_domain);
        let fetcher = HttpFetcher::default();
        let syncer = Syncer::new(&host, &store, &fetcher, &options);

        if self.dry_run {
            let plan = block_on(syncer.plan())?.context("failed to plan sync")?;
            println!("[dry-run]");
            return print_plan(&plan, &options, false);
        }

        let report = block_on(syncer.run())?.with_context(|| {
            format!("sync of {} failed", cfg.output_dir.display())
        })?;
        print_report(&report);
        Ok(())
    }
}

fn print_report(report: &SyncReport) {
    let deleted = match &report.deletion {
        DeletionOutcome::Deleted(keys) => keys.len(),
        _ => 0,
    };

    if report.uploaded.is_empty() && deleted == 0 {
        println!(
            "{} {} artifacts already up to date",
            "✓".green().bold(),
            report.selected
        );
    } else {
        println!(
            "{} synced {} artifacts ({} uploaded, {} deleted)",
            "✓".green().bold(),
            report.selected,
            report.uploaded.len(),
            deleted
        );
    }

    for key in &report.uploaded {
        println!("  {}  {key}", "↑".green());
    }
    if let DeletionOutcome::Deleted(keys) = &report.deletion {
        for key in keys {
            println!("  {}  {key}", "✗".red());
        }
    }
    if let DeletionOutcome::SkippedDeltaUpdate { stale } = report.deletion {
        println!(
            "  {}  {stale} stale artifact(s) kept (delta update)",
            "·".bright_black()
        );
    }
}
