//! Memoized spec resolution
//!
//! Maps the raw spec string to the most specific answer the resolver gave.
//! Entries expire after the configured TTL and the cache holds a bounded
//! number of entries. An empty resolver result is never cached, so a
//! transient resolver problem is retried on the next request.

use crate::config::schema::ResolverConfig;
use crate::error::BookpubResult;
use crate::repo::{Answer, Spec};
use crate::resolver::Resolver;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Resolution cache options
#[derive(Debug, Clone)]
pub struct ResolutionCacheOptions {
    pub ttl: Duration,
    pub max_size: u64,
    /// Cache `DoesNotExist` answers (empty results are never cached)
    pub cache_does_not_exist: bool,
}

impl From<&ResolverConfig> for ResolutionCacheOptions {
    fn from(config: &ResolverConfig) -> Self {
        Self {
            ttl: Duration::from_secs(config.cache_ttl_secs),
            max_size: config.cache_max_size,
            cache_does_not_exist: config.cache_does_not_exist,
        }
    }
}

/// TTL-bounded memo of spec -> answer in front of a resolver
pub struct ResolutionCache {
    resolver: Arc<dyn Resolver>,
    entries: Cache<String, Answer>,
    cache_does_not_exist: bool,
}

impl ResolutionCache {
    pub fn new(resolver: Arc<dyn Resolver>, options: ResolutionCacheOptions) -> Self {
        Self {
            resolver,
            entries: Cache::builder()
                .max_capacity(options.max_size)
                .time_to_live(options.ttl)
                .build(),
            cache_does_not_exist: options.cache_does_not_exist,
        }
    }

    /// Resolve `spec`, consulting the cache first.
    ///
    /// Returns `None` when the resolver produced no candidates.
    pub async fn resolve(&self, spec: &Spec) -> BookpubResult<Option<Answer>> {
        if let Some(answer) = self.entries.get(spec.raw()).await {
            debug!("Found {} in resolution cache", spec.raw());
            return Ok(Some(answer));
        }

        let answers = self.resolver.resolve(spec.question(), true).await?;
        let Some(last) = answers.into_iter().last() else {
            debug!("{} resolved to nothing", spec.question());
            return Ok(None);
        };

        info!("Resolved {} to {}", spec.question(), last);
        if self.cache_does_not_exist || !matches!(last, Answer::DoesNotExist(_)) {
            self.entries.insert(spec.raw().to_string(), last.clone()).await;
        }

        Ok(Some(last))
    }

    #[cfg(test)]
    async fn len(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }
}
