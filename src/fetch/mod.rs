//! Materializing repositories on disk

mod git;

pub use git::GitFetcher;

use crate::error::BookpubResult;
use crate::repo::Repo;
use async_trait::async_trait;
use std::path::Path;

/// Abstract fetch interface
///
/// Implementations write the repository's files into `dest`, which does not
/// exist yet. On failure `dest` may be left half-written; callers always
/// fetch into a scratch location.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, repo: &Repo, dest: &Path) -> BookpubResult<()>;

    /// Human-readable fetcher name for logs
    fn name(&self) -> &'static str;
}
