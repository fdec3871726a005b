//! Filesystem-safe, collision-free destination paths

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use recfetch_core::FetchError;

use crate::state::{AssetDescriptor, RecordSummary};

/// Longest file or folder name produced
pub const MAX_NAME_CHARS: usize = 150;

/// Staging suffix for in-flight transfers
pub const PART_SUFFIX: &str = ".part";

/// Characters rejected by at least one common filesystem
const ILLEGAL: &[char] = &['/', '\\', '?', '%', '*', ':', '|', '"', '<', '>'];

/// Make `name` safe to use as a single path component.
///
/// Illegal characters and control characters become `_`, whitespace runs
/// collapse to one space, and the result is trimmed and capped at
/// [`MAX_NAME_CHARS`] characters.
pub fn sanitize(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if ILLEGAL.contains(&c) || c.is_ascii_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&collapsed, MAX_NAME_CHARS)
}

fn truncate_chars(s: &str, max: usize) -> String {
    let cut: String = s.chars().take(max).collect();
    cut.trim_end().to_string()
}

/// First of `path`, `stem-2.ext`, `stem-3.ext`, ... for which `is_taken` is false.
pub fn next_unique_path(path: &Path, is_taken: impl Fn(&Path) -> bool) -> PathBuf {
    if !is_taken(path) {
        return path.to_path_buf();
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());
    (2u32..)
        .map(|i| {
            let name = match &ext {
                Some(ext) => format!("{stem}-{i}.{ext}"),
                None => format!("{stem}-{i}"),
            };
            path.with_file_name(name)
        })
        .find(|candidate| !is_taken(candidate))
        .unwrap_or_else(|| path.to_path_buf())
}

/// Staging path for a destination: `<dest>.part` in the same directory
pub fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(PART_SUFFIX);
    dest.with_file_name(name)
}

/// Remove `*.part` files left behind by an interrupted run. Returns how many were removed.
pub fn cleanup_part_files(dir: &Path) -> std::io::Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_part = path
            .file_name()
            .is_some_and(|n| n.to_string_lossy().ends_with(PART_SUFFIX));
        if is_part && entry.file_type()?.is_file() {
            log::warn!("Removing stale partial file: {}", path.display());
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Derives record folders and reserves asset paths under one output root.
///
/// A path handed out by [`FileNamer::reserve_asset_path`] counts as taken
/// for the lifetime of the namer, even before its file exists.
#[derive(Debug)]
pub struct FileNamer {
    root: PathBuf,
    prefix: String,
    reserved: Mutex<HashSet<PathBuf>>,
}

impl FileNamer {
    pub fn new(root: impl Into<PathBuf>, prefix: &str) -> Self {
        Self {
            root: root.into(),
            prefix: prefix.to_string(),
            reserved: Mutex::new(HashSet::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `{prefix} - {title} - {YYYY-MM-DD}`, sanitized.
    ///
    /// Long titles are shortened so the date always survives truncation.
    pub fn folder_name(&self, record: &RecordSummary) -> Result<String, FetchError> {
        let date = record.date()?;
        let mut title = sanitize(&record.title);
        if title.is_empty() {
            title = "Untitled".to_string();
        }
        let suffix = format!(" - {date}");
        let head = sanitize(&format!("{} - {title}", self.prefix));
        let head = truncate_chars(&head, MAX_NAME_CHARS - suffix.chars().count());
        Ok(format!("{head}{suffix}"))
    }

    pub fn folder_for(&self, record: &RecordSummary) -> Result<PathBuf, FetchError> {
        Ok(self.root.join(self.folder_name(record)?))
    }

    /// Pick a free path for `asset` inside `folder` and reserve it.
    ///
    /// Does not create the file.
    pub fn reserve_asset_path(&self, folder: &Path, asset: &AssetDescriptor) -> PathBuf {
        let mut name = sanitize(&asset.file_name());
        if name.is_empty() {
            name = "file.dat".to_string();
        }
        let candidate = folder.join(name);
        let mut reserved = self.reserved.lock().unwrap_or_else(PoisonError::into_inner);
        let path = next_unique_path(&candidate, |p| reserved.contains(p) || p.exists());
        reserved.insert(path.clone());
        path
    }
}
