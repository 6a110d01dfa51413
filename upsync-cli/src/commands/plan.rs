//! `upsync plan`: show the next sync without changing the bucket.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use upsync_core::{Manifest, SyncOptions};
use upsync_sync::{FsBuildHost, HttpFetcher, LocalDirStore, SyncPlan, Syncer};

use super::{block_on, ConfigArgs};

/// Arguments for `upsync plan`.
#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl PlanArgs {
    pub fn run(self) -> Result<()> {
        let (cfg, options) = self.config.resolve()?;
        let host = FsBuildHost::new(&cfg.output_dir);
        // Planning only reads the manifest over HTTP; the root is never touched.
        let store = LocalDirStore::new(
            cfg.bucket_root.clone().unwrap_or_default(),
            &cfg.bucket_domain,
        );
        let fetcher = HttpFetcher::default();

        let plan = block_on(Syncer::new(&host, &store, &fetcher, &options).plan())?
            .context("failed to plan sync")?;
        print_plan(&plan, &options, self.json)
    }
}

#[derive(Serialize)]
struct PlanJson<'a> {
    selected: usize,
    manifest: &'a Manifest,
    upload: Vec<String>,
    delete: Vec<String>,
    delete_enabled: bool,
}

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "action")]
    action: String,
    #[tabled(rename = "artifact")]
    artifact: String,
    #[tabled(rename = "key")]
    key: String,
}

/// Render a plan as a table or JSON. Shared with `sync --dry-run`.
pub fn print_plan(plan: &SyncPlan, options: &SyncOptions, json: bool) -> Result<()> {
    if json {
        let payload = PlanJson {
            selected: plan.selection.len(),
            manifest: &plan.manifest,
            upload: plan.diff.to_upload.iter().map(|n| n.to_string()).collect(),
            delete: plan.diff.to_delete.iter().map(|n| n.to_string()).collect(),
            delete_enabled: options.delete_stale,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&payload).context("failed to serialize plan JSON")?
        );
        return Ok(());
    }

    let last_sync = match plan.manifest.upload_time {
        _ if plan.manifest.is_never_synced() => "never".to_string(),
        Some(ts) => ts.to_rfc3339(),
        None => "unknown".to_string(),
    };
    println!(
        "{} selected | {} to upload | {} stale | last sync {}",
        plan.selection.len(),
        plan.diff.to_upload.len(),
        plan.diff.to_delete.len(),
        last_sync,
    );

    if plan.diff.is_noop() {
        println!("{} nothing to do", "✓".green().bold());
        return Ok(());
    }

    let delete_action = if options.delete_stale {
        "delete"
    } else {
        "keep (delta update)"
    };
    let rows: Vec<PlanRow> = plan
        .diff
        .to_upload
        .iter()
        .map(|name| ("upload", name))
        .chain(plan.diff.to_delete.iter().map(|name| (delete_action, name)))
        .map(|(action, name)| PlanRow {
            action: action.to_string(),
            artifact: name.to_string(),
            key: options.artifact_key(name.as_str()),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}
