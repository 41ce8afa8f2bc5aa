//! On-disk cache entry inventory
//!
//! Used by the `cache` subcommands to list, age and remove checkouts and
//! built sites. An entry's age is the modification time of its directory,
//! which [`mark_used`] refreshes on every cache hit.

use crate::cache::is_staging_name;
use crate::error::{BookpubError, BookpubResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;
use walkdir::WalkDir;

/// Format bytes as human-readable size (e.g., "1.5 GB")
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Which cache a directory belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    Checkout,
    Site,
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Checkout => write!(f, "checkout"),
            Self::Site => write!(f, "site"),
        }
    }
}

/// One complete keyed directory in a cache root
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntry {
    pub kind: CacheKind,
    pub key: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: DateTime<Utc>,
}

impl CacheEntry {
    /// Check if the entry was last touched more than `days` ago
    pub fn is_older_than_days(&self, days: u32) -> bool {
        let age = Utc::now() - self.modified;
        age.num_days() > i64::from(days)
    }

    pub fn age_days(&self) -> i64 {
        (Utc::now() - self.modified).num_days()
    }
}

/// Complete entries under `root`, sorted by key
///
/// Scratch directories are skipped. A missing root has no entries.
pub fn scan(root: &Path, kind: CacheKind) -> BookpubResult<Vec<CacheEntry>> {
    let read = match fs::read_dir(root) {
        Ok(read) => read,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(BookpubError::io(format!("reading {}", root.display()), e)),
    };

    let mut entries = Vec::new();
    for dirent in read {
        let dirent = dirent.map_err(|e| BookpubError::io(format!("reading {}", root.display()), e))?;
        let key = dirent.file_name().to_string_lossy().into_owned();
        let path = dirent.path();
        if is_staging_name(&key) || !path.is_dir() {
            continue;
        }

        let modified = dirent
            .metadata()
            .and_then(|m| m.modified())
            .map_err(|e| BookpubError::io(format!("reading metadata of {}", path.display()), e))?;

        entries.push(CacheEntry {
            kind,
            key,
            size_bytes: dir_size(&path),
            path,
            modified: DateTime::<Utc>::from(modified),
        });
    }

    entries.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(entries)
}

/// Scratch directories left behind by interrupted fetches or builds
pub fn scan_staging(root: &Path) -> BookpubResult<Vec<PathBuf>> {
    let read = match fs::read_dir(root) {
        Ok(read) => read,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(BookpubError::io(format!("reading {}", root.display()), e)),
    };

    let mut paths = Vec::new();
    for dirent in read {
        let dirent = dirent.map_err(|e| BookpubError::io(format!("reading {}", root.display()), e))?;
        if is_staging_name(&dirent.file_name().to_string_lossy()) && dirent.path().is_dir() {
            paths.push(dirent.path());
        }
    }
    paths.sort();
    Ok(paths)
}

/// Record a cache hit on the entry directory at `path`
///
/// Bumps the directory's modification time so `cache gc` measures age from
/// last use rather than from creation. Best effort.
pub fn mark_used(path: &Path) {
    let touched = fs::File::open(path).and_then(|dir| dir.set_modified(SystemTime::now()));
    if let Err(e) = touched {
        debug!("Could not mark {} as used: {}", path.display(), e);
    }
}

/// Total size of regular files below `path`
pub fn dir_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}
