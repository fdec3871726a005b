//! Bulk recordings downloader.
//!
//! Lists a cloud recordings library month by month through a
//! cursor-paginated API and downloads every file to
//! `<output>/<prefix> - <title> - <date>/<kind>.<ext>`.
//!
//! Pipeline:
//! 1. [`window::plan`] splits the requested range into calendar months
//! 2. [`api::RecordPages`] walks each month's listing, refreshing the
//!    credential once on 401
//! 3. [`naming::FileNamer`] derives folders and collision-free file names
//! 4. [`retrieve::Retriever`] streams each file through a `.part` file and
//!    renames it into place
//! 5. [`runner::Orchestrator`] ties it together and isolates failures

pub mod api;
pub mod auth;
pub mod config;
pub mod naming;
pub mod retrieve;
pub mod runner;
pub mod state;
pub mod stats;
pub mod window;
pub mod worker;

pub use api::{RecordPages, RecordingsApi};
pub use auth::{AccountCredentials, Credential, CredentialBroker, TokenSource};
pub use config::Config;
pub use naming::{FileNamer, sanitize};
pub use retrieve::{Retriever, TokenPlacement};
pub use runner::Orchestrator;
pub use state::{AssetDescriptor, AssetJob, DateWindow, RecordSummary};
pub use stats::RunSummary;
