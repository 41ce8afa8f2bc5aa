//! Keyed store of repository working copies
//!
//! Layout: `<root>/<checkout key>/` is a complete checkout. Fetches land in
//! `<root>/.fetch-<key>-<uuid>/` and are renamed into place only after the
//! fetcher succeeded, so a directory bearing a key is always complete.

use crate::cache::entry::mark_used;
use crate::cache::key::checkout_key;
use crate::cache::{is_staging_name, KeyedLocks};
use crate::error::{BookpubError, BookpubResult};
use crate::fetch::Fetcher;
use crate::repo::Repo;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

/// On-disk checkout store in front of a fetcher
pub struct CheckoutStore {
    root: PathBuf,
    fetcher: Arc<dyn Fetcher>,
    locks: KeyedLocks,
}

impl CheckoutStore {
    pub fn new(root: impl Into<PathBuf>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            root: root.into(),
            fetcher,
            locks: KeyedLocks::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the checkout for `key` lives (whether or not it exists)
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// Existing checkout for `repo`, without fetching
    pub fn lookup(&self, repo: &Repo) -> Option<PathBuf> {
        let path = self.path_for(&checkout_key(repo));
        path.is_dir().then_some(path)
    }

    /// Return the checkout for `repo`, fetching it first if needed
    pub async fn ensure(&self, repo: &Repo) -> BookpubResult<PathBuf> {
        let key = checkout_key(repo);
        let target = self.path_for(&key);
        if target.is_dir() {
            debug!("Checkout cache hit: {}", key);
            mark_used(&target);
            return Ok(target);
        }

        let lock = self.locks.get(&key).await;
        let _guard = lock.lock().await;

        // Another request may have fetched while we waited
        if target.is_dir() {
            debug!("Checkout appeared while waiting: {}", key);
            self.locks.release(&key).await;
            return Ok(target);
        }

        let result = self.fetch_into(repo, &key, &target).await;
        self.locks.release(&key).await;
        result.map(|()| target)
    }

    async fn fetch_into(&self, repo: &Repo, key: &str, target: &Path) -> BookpubResult<()> {
        fs::create_dir_all(&self.root).await.map_err(|e| {
            BookpubError::io(format!("creating checkout root {}", self.root.display()), e)
        })?;

        let staging = self
            .root
            .join(format!(".fetch-{}-{}", key, uuid::Uuid::new_v4()));

        info!("Fetching {} into {}", repo, key);
        if let Err(e) = self.fetcher.fetch(repo, &staging).await {
            remove_dir_best_effort(&staging).await;
            return Err(e);
        }

        if let Err(e) = fs::rename(&staging, target).await {
            remove_dir_best_effort(&staging).await;
            if target.is_dir() {
                return Ok(());
            }
            return Err(BookpubError::io(
                format!("moving checkout into {}", target.display()),
                e,
            ));
        }

        info!("Fetched {}", repo);
        Ok(())
    }

    /// Keys of all complete checkouts
    pub async fn keys(&self) -> BookpubResult<Vec<String>> {
        list_keys(&self.root).await
    }
}

/// Names of complete entries directly under `root`
pub(crate) async fn list_keys(root: &Path) -> BookpubResult<Vec<String>> {
    let mut keys = Vec::new();
    let mut entries = match fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(keys),
        Err(e) => return Err(BookpubError::io(format!("reading {}", root.display()), e)),
    };

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| BookpubError::io(format!("reading {}", root.display()), e))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_staging_name(&name) {
            continue;
        }
        if entry.path().is_dir() {
            keys.push(name);
        }
    }

    keys.sort();
    Ok(keys)
}

pub(crate) async fn remove_dir_best_effort(path: &Path) {
    if let Err(e) = fs::remove_dir_all(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}
