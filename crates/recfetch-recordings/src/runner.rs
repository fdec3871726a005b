//! Orchestrator: windows → records → assets

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use recfetch_core::{FetchError, SharedProgress, ShutdownFlag};

use crate::api::RecordingsApi;
use crate::auth::{Credential, CredentialBroker};
use crate::config::Config;
use crate::naming::{FileNamer, cleanup_part_files};
use crate::retrieve::Retriever;
use crate::state::{AssetJob, DateWindow, RecordSummary};
use crate::stats::RunSummary;
use crate::window;
use crate::worker;

/// Drives a full download run.
///
/// Failures are isolated: a record or asset that fails is counted and the
/// run moves on, and a window whose listing fails is counted and skipped.
/// Only startup problems (bad range, identity failure, unusable output
/// directory) end the run with an error.
pub struct Orchestrator {
    config: Config,
    broker: Arc<CredentialBroker>,
    shutdown: ShutdownFlag,
    progress: SharedProgress,
}

/// Per-run collaborators built once from the config
struct RunContext {
    api: RecordingsApi,
    /// Download pool sized to `workers`
    pool: rayon::ThreadPool,
    namer: FileNamer,
    retriever: Retriever,
    summary: RunSummary,
}

impl Orchestrator {
    pub fn new(
        config: Config,
        broker: Arc<CredentialBroker>,
        shutdown: ShutdownFlag,
        progress: SharedProgress,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            broker,
            shutdown,
            progress,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn run(&self) -> Result<RunSummary, FetchError> {
        let start = Instant::now();
        let config = &self.config;
        let windows = window::plan(config.start, config.end)?;
        let summary = RunSummary::new(windows.len());

        if self.shutdown.is_requested() {
            return Ok(RunSummary {
                cancelled: true,
                ..summary
            });
        }
        fs::create_dir_all(&config.output_dir)?;
        self.broker.acquire()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("recfetch-download-{i}"))
            .build()
            .map_err(|e| {
                FetchError::Io(io::Error::other(format!("failed to create thread pool: {e}")))
            })?;

        let mut ctx = RunContext {
            api: RecordingsApi::new(
                &config.api_base,
                &config.user_id,
                config.page_size,
                config.http,
            )?,
            pool,
            namer: FileNamer::new(&config.output_dir, &config.folder_prefix),
            retriever: Retriever::new(
                Arc::clone(&self.broker),
                config.http,
                config.token_placement,
                self.shutdown.clone(),
            ),
            summary,
        };

        log::info!(
            "Fetching recordings {}..{} ({} windows, {} workers) into {}",
            config.start,
            config.end,
            windows.len(),
            config.workers,
            config.output_dir.display()
        );

        for window in &windows {
            if self.shutdown.is_requested() {
                break;
            }
            // a download may have refreshed the cached credential
            match self.broker.acquire() {
                Ok(credential) => self.run_window(window, credential, &mut ctx),
                Err(e) => {
                    log::error!("Window {window}: no credential: {e}");
                    ctx.summary.add_window_failure(&window.to_string(), &e);
                }
            }
        }

        let mut summary = ctx.summary;
        summary.cancelled |= self.shutdown.is_requested();
        summary.elapsed = start.elapsed();
        Ok(summary)
    }

    /// List one window, then download everything it listed.
    ///
    /// Records listed before a listing failure are still downloaded.
    fn run_window(&self, window: &DateWindow, credential: Credential, ctx: &mut RunContext) {
        let stage = self.progress.stage_line("window");
        stage.set_message(format!("{window}: listing..."));

        let mut pages = ctx
            .api
            .list_window(*window, credential, &self.broker, &self.shutdown);
        let mut jobs = Vec::new();
        let mut records = 0usize;
        let mut listing_error = None;
        for item in pages.by_ref() {
            match item {
                Ok(record) => {
                    records += 1;
                    plan_record(&record, &ctx.namer, &mut ctx.summary, &mut jobs);
                }
                Err(e) => {
                    listing_error = Some(e);
                    break;
                }
            }
        }
        ctx.summary.records_listed += records;

        if let Some(e) = listing_error {
            if !e.is_cancelled() {
                log::error!("Window {window}: listing failed: {e}");
            }
            ctx.summary.add_window_failure(&window.to_string(), &e);
        }
        log::info!(
            "{window}: {records} records, {} assets to download",
            jobs.len()
        );

        if !jobs.is_empty() {
            stage.set_message(format!("{window}: downloading {} assets", jobs.len()));
            let outcomes = ctx.pool.install(|| {
                worker::process_assets(
                    jobs,
                    &ctx.retriever,
                    self.config.workers,
                    &self.progress,
                    &self.shutdown,
                )
            });
            for outcome in &outcomes {
                ctx.summary.add_asset(outcome);
            }
        }
        stage.finish_and_clear();
    }
}

/// Resolve the folder and asset paths for one record.
fn plan_record(
    record: &RecordSummary,
    namer: &FileNamer,
    summary: &mut RunSummary,
    jobs: &mut Vec<AssetJob>,
) {
    let label = format!("{} ({})", record.title, record.id);
    let folder = match namer.folder_for(record) {
        Ok(folder) => folder,
        Err(e) => {
            log::warn!("Record {label}: {e}");
            summary.add_record_failure(&label, &e);
            return;
        }
    };
    if let Err(e) = prepare_folder(&folder) {
        log::warn!("Record {label}: cannot prepare {}: {e}", folder.display());
        summary.add_record_failure(&label, &e);
        return;
    }

    let folder_name = folder
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    for asset in &record.assets {
        let Some(url) = asset.url.as_deref().filter(|u| !u.is_empty()) else {
            log::info!(
                "{folder_name}: skipping {} (no download location)",
                asset.file_name()
            );
            summary.assets_skipped += 1;
            continue;
        };
        let dest = namer.reserve_asset_path(&folder, asset);
        let file_name = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        jobs.push(AssetJob {
            label: format!("{folder_name}/{file_name}"),
            url: url.to_string(),
            dest,
            size: asset.size,
        });
    }
}

/// Create a record folder and clear staging files from an interrupted run.
fn prepare_folder(folder: &Path) -> Result<(), FetchError> {
    fs::create_dir_all(folder)?;
    let removed = cleanup_part_files(folder)?;
    if removed > 0 {
        log::debug!("{}: removed {removed} stale partial files", folder.display());
    }
    Ok(())
}
