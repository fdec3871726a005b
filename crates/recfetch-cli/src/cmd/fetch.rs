//! Fetch subcommand - download every recording in a date range

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::Args;
use recfetch_core::{HttpConfig, SharedProgress, ShutdownFlag};
use recfetch_recordings::{Config, CredentialBroker, Orchestrator, RunSummary, TokenPlacement};
use signal_hook::consts::{SIGINT, SIGTERM};

use super::parse_date;
use crate::config::{ENV_ACCOUNT_ID, ENV_CLIENT_ID, ENV_CLIENT_SECRET, FileConfig};

/// Exit status when the run was interrupted
pub const EXIT_CANCELLED: u8 = 130;

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// First day to fetch (YYYY-MM-DD, inclusive)
    #[arg(long, value_parser = parse_date)]
    pub from: NaiveDate,

    /// Last day to fetch (YYYY-MM-DD, inclusive)
    #[arg(long, value_parser = parse_date)]
    pub to: NaiveDate,

    /// User whose recordings are listed (default: owner of the credentials)
    #[arg(short, long)]
    pub user: Option<String>,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Leading component of every recording folder name
    #[arg(long)]
    pub folder_prefix: Option<String>,

    /// Number of parallel downloads
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Records requested per listing page (max 300)
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Where the access token goes on download requests (query, header)
    #[arg(long)]
    pub token_in: Option<TokenPlacement>,

    /// Exit non-zero when any record or file failed
    #[arg(long)]
    pub strict: bool,
}

/// Merge command-line flags over the file configuration
pub fn build_config(args: &FetchArgs, file: &FileConfig, http: HttpConfig) -> Config {
    let mut config = Config::for_range(args.from, args.to);
    config.account_id = file.account.account_id.clone().unwrap_or_default();
    config.client_id = file.account.client_id.clone().unwrap_or_default();
    config.client_secret = file.account.client_secret.clone().unwrap_or_default();
    config.user_id = args
        .user
        .clone()
        .unwrap_or_else(|| file.account.user_id.clone());
    config.output_dir = args
        .output
        .clone()
        .unwrap_or_else(|| file.output.dir.clone());
    config.folder_prefix = args
        .folder_prefix
        .clone()
        .unwrap_or_else(|| file.output.folder_prefix.clone());
    config.api_base = file.api.base_url.clone();
    config.oauth_url = file.api.oauth_url.clone();
    config.page_size = args.page_size.unwrap_or(file.api.page_size);
    config.workers = args.workers.unwrap_or(file.workers);
    config.token_placement = args.token_in.unwrap_or(file.api.token_placement);
    config.http = http;
    config
}

/// Process exit status for a finished run
///
/// - 130: interrupted
/// - 1: a whole window could not be listed, or `strict` and anything failed
/// - 0: otherwise, including individual record or file failures
pub fn exit_status(summary: &RunSummary, strict: bool) -> u8 {
    if summary.cancelled {
        EXIT_CANCELLED
    } else if summary.has_window_failures() || (strict && summary.has_failures()) {
        1
    } else {
        0
    }
}

/// First signal requests a graceful stop; a second one exits immediately.
fn install_signal_handlers(shutdown: &ShutdownFlag) -> std::io::Result<()> {
    for signal in [SIGTERM, SIGINT] {
        let flag = shutdown.clone();
        // SAFETY: the handler only swaps an atomic and calls process::exit
        unsafe {
            signal_hook::low_level::register(signal, move || {
                if flag.request() {
                    std::process::exit(i32::from(EXIT_CANCELLED));
                }
            })?;
        }
    }
    Ok(())
}

pub fn run(
    args: FetchArgs,
    file: &FileConfig,
    http: HttpConfig,
    progress: &SharedProgress,
) -> ExitCode {
    let config = build_config(&args, file, http);
    log::debug!("{config:?}");

    let shutdown = ShutdownFlag::new();
    if let Err(e) = install_signal_handlers(&shutdown) {
        log::error!("Failed to install signal handlers: {e}");
        return ExitCode::from(2);
    }

    let broker = Arc::new(CredentialBroker::new(config.credentials()));
    let missing_credentials = [&config.account_id, &config.client_id, &config.client_secret]
        .iter()
        .any(|v| v.trim().is_empty());
    let orchestrator = match Orchestrator::new(config, broker, shutdown, Arc::clone(progress)) {
        Ok(o) => o,
        Err(e) => {
            log::error!("Invalid configuration: {e:#}");
            if missing_credentials {
                log::error!(
                    "Set [account] in recfetch.toml or {ENV_ACCOUNT_ID}, {ENV_CLIENT_ID}, {ENV_CLIENT_SECRET}"
                );
            }
            return ExitCode::from(2);
        }
    };

    log::debug!("Listing recordings for '{}'", orchestrator.config().user_id);

    let summary = match orchestrator.run() {
        Ok(summary) => summary,
        Err(e) if e.is_cancelled() => {
            log::warn!("Interrupted before any window was processed");
            return ExitCode::from(EXIT_CANCELLED);
        }
        Err(e) => {
            log::error!("Run aborted: {e}");
            return ExitCode::from(2);
        }
    };

    if progress.is_tty() {
        eprintln!("\n{}", summary.format_table());
    } else {
        summary.log();
    }
    if summary.cancelled {
        log::warn!("Interrupted; rerun the same range to pick up remaining files");
    }

    ExitCode::from(exit_status(&summary, args.strict))
}
