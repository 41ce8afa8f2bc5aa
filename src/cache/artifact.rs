//! Published built sites
//!
//! `<root>/<render key>/` holds a complete static site. Builds write into
//! `<root>/.staging-<key>-<uuid>/` and [`ArtifactStore::publish`] renames the
//! output into place, so readers never observe a partial site.

use crate::cache::checkout::{list_keys, remove_dir_best_effort};
use crate::error::{BookpubError, BookpubResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Keyed store of built sites
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// Published site for `key`, if any
    pub fn lookup(&self, key: &str) -> Option<PathBuf> {
        let path = self.path_for(key);
        path.is_dir().then_some(path)
    }

    /// Fresh scratch directory name for building `key`
    pub fn staging_dir(&self, key: &str) -> PathBuf {
        self.root
            .join(format!(".staging-{}-{}", key, uuid::Uuid::new_v4()))
    }

    /// Atomically move a finished build output into place under `key`
    ///
    /// If another build published the same key first, the new output is
    /// discarded and the existing site is kept.
    pub async fn publish(&self, key: &str, output: &Path) -> BookpubResult<PathBuf> {
        let target = self.path_for(key);
        fs::create_dir_all(&self.root).await.map_err(|e| {
            BookpubError::io(format!("creating built sites root {}", self.root.display()), e)
        })?;

        match fs::rename(output, &target).await {
            Ok(()) => {
                info!("Published site {}", key);
                Ok(target)
            }
            Err(_) if target.is_dir() => {
                debug!("Site {} already published, discarding duplicate", key);
                remove_dir_best_effort(output).await;
                Ok(target)
            }
            Err(e) => Err(BookpubError::io(
                format!("publishing {} to {}", output.display(), target.display()),
                e,
            )),
        }
    }

    /// Keys of all published sites
    pub async fn keys(&self) -> BookpubResult<Vec<String>> {
        list_keys(&self.root).await
    }
}
