#![allow(dead_code)]

pub mod mock_server;

use std::path::{Path, PathBuf};
use std::time::Duration;

use recfetch_core::HttpConfig;

/// Short timeouts, no backoff delay
pub fn fast_http(max_retries: u32) -> HttpConfig {
    HttpConfig {
        read_timeout: Duration::from_secs(5),
        max_retries,
        backoff_base: Duration::from_millis(1),
    }
}

/// All regular files under `root`, relative, sorted
pub fn files_under(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    collect(root, root, &mut out);
    out.sort();
    out
}

fn collect(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect(root, &path, out);
        } else {
            out.push(path.strip_prefix(root).unwrap().to_path_buf());
        }
    }
}
