//! recfetch - bulk downloader for cloud meeting recordings
//!
//! Lists every recording in a date range month by month and mirrors the
//! files into one folder per meeting.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use recfetch_core::{HttpConfig, ProgressContext};

mod cmd;
mod config;

use config::FileConfig;

#[derive(Parser)]
#[command(name = "recfetch")]
#[command(about = "Bulk downloader for cloud meeting recordings")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file path (default: ./recfetch.toml or ~/.config/recfetch/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Read timeout in seconds for stall detection
    #[arg(long, global = true)]
    read_timeout: Option<u64>,

    /// Maximum retry attempts for transient failures
    #[arg(long, global = true)]
    max_retries: Option<u32>,
}

#[derive(Subcommand)]
enum Command {
    /// Download all recordings in a date range
    Fetch(cmd::fetch::FetchArgs),
    /// Show the monthly listing windows for a date range
    Plan(cmd::plan::PlanArgs),
    /// Show current configuration
    Config,
}

fn print_config(config: &FileConfig, http: &HttpConfig) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Setting").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    let presence = |v: &Option<String>| if v.is_some() { "configured" } else { "not set" };
    table.add_row(vec![
        "Account ID",
        config.account.account_id.as_deref().unwrap_or("not set"),
    ]);
    table.add_row(vec!["Client ID", presence(&config.account.client_id)]);
    table.add_row(vec!["Client secret", presence(&config.account.client_secret)]);
    table.add_row(vec!["User", &config.account.user_id]);
    table.add_row(vec!["API base URL", &config.api.base_url]);
    table.add_row(vec!["OAuth URL", &config.api.oauth_url]);
    table.add_row(vec!["Page size", &config.api.page_size.to_string()]);
    table.add_row(vec![
        "Token placement",
        &config.api.token_placement.to_string(),
    ]);
    table.add_row(vec!["Output directory", &config.output.dir.display().to_string()]);
    table.add_row(vec!["Folder prefix", &config.output.folder_prefix]);
    table.add_row(vec!["Workers", &config.workers.to_string()]);
    table.add_row(vec![
        "Read timeout",
        &format!("{}s", http.read_timeout.as_secs()),
    ]);
    table.add_row(vec!["Max retries", &http.max_retries.to_string()]);
    table.add_row(vec![
        "Backoff base",
        &format!("{}ms", http.backoff_base.as_millis()),
    ]);

    eprintln!("\n{table}");
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(ProgressContext::new());

    // Logging:
    //   TTY:     lines go above the progress bars
    //   non-TTY: plain lines, one per event
    let multi = progress.is_tty().then(|| progress.multi());
    if let Err(e) = recfetch_core::init_logging(cli.quiet, cli.debug, multi) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let file = match FileConfig::load(cli.config.as_deref()) {
        Ok(file) => file,
        Err(e) => {
            log::error!("{e:#}");
            return ExitCode::from(2);
        }
    };

    // Config file defaults, CLI overrides
    let http = HttpConfig {
        read_timeout: Duration::from_secs(cli.read_timeout.unwrap_or(file.http.read_timeout)),
        max_retries: cli.max_retries.unwrap_or(file.http.max_retries),
        backoff_base: Duration::from_millis(file.http.backoff_ms),
    };

    match cli.command {
        Command::Fetch(args) => cmd::fetch::run(args, &file, http, &progress),
        Command::Plan(args) => match cmd::plan::run(args) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                log::error!("{e:#}");
                ExitCode::from(2)
            }
        },
        Command::Config => {
            print_config(&file, &http);
            ExitCode::SUCCESS
        }
    }
}
