//! Checkout, build and publish for one render key at a time

use crate::cache::checkout::remove_dir_best_effort;
use crate::cache::entry::mark_used;
use crate::cache::{render_key, ArtifactStore, CheckoutStore};
use crate::error::BookpubResult;
use crate::orchestration::build::BuildTool;
use crate::orchestration::inflight::{BuildSubscription, InflightBuild};
use crate::repo::Repo;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, instrument, Instrument};

/// Answer of [`BuildOrchestrator::begin`]
pub enum BuildTicket {
    /// The site is already published
    Ready(PathBuf),
    /// A build is running (possibly started by this call)
    Pending(BuildSubscription),
}

/// A published site and the log of the build that produced it
#[derive(Debug)]
pub struct EnsuredArtifact {
    pub path: PathBuf,
    /// Empty when the site was already published
    pub log: Vec<String>,
}

/// Coordinates builds so each render key is built at most once at a time
pub struct BuildOrchestrator {
    checkouts: CheckoutStore,
    artifacts: ArtifactStore,
    tool: BuildTool,
    inflight: Mutex<HashMap<String, Arc<InflightBuild>>>,
}

impl BuildOrchestrator {
    pub fn new(checkouts: CheckoutStore, artifacts: ArtifactStore, tool: BuildTool) -> Self {
        Self {
            checkouts,
            artifacts,
            tool,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn checkouts(&self) -> &CheckoutStore {
        &self.checkouts
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<String, Arc<InflightBuild>>> {
        self.inflight.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of builds currently running
    pub fn builds_in_flight(&self) -> usize {
        self.registry().len()
    }

    /// Published site for `repo` at `base_url`, or a subscription to the build
    /// producing it.
    ///
    /// Starts a build when none is running. The build runs in its own task and
    /// completes even if every subscriber goes away.
    pub fn begin(self: &Arc<Self>, repo: &Repo, base_url: &str) -> BookpubResult<BuildTicket> {
        let key = render_key(repo, base_url);
        if let Some(path) = self.artifacts.lookup(&key) {
            debug!("Site cache hit: {}", key);
            mark_used(&path);
            return Ok(BuildTicket::Ready(path));
        }

        let mut registry = self.registry();
        if let Some(build) = registry.get(&key) {
            debug!("Joining in-flight build {}", key);
            return Ok(BuildTicket::Pending(build.subscribe()));
        }

        // A build may have published between the lookup and taking the lock
        if let Some(path) = self.artifacts.lookup(&key) {
            return Ok(BuildTicket::Ready(path));
        }

        let build = Arc::new(InflightBuild::new());
        registry.insert(key.clone(), Arc::clone(&build));
        let subscription = build.subscribe();
        drop(registry);

        let this = Arc::clone(self);
        let repo = repo.clone();
        let base_url = base_url.to_string();
        let span = tracing::info_span!("build", render_key = %key, repo = %repo);
        tokio::spawn(
            async move {
                let outcome = this.run(&repo, &base_url, &key, &build).await;
                // Unregister before announcing, so a request arriving after a
                // failure starts a fresh build instead of joining this one.
                this.registry().remove(&key);
                build.finish(outcome.map_err(Arc::new));
            }
            .instrument(span),
        );

        Ok(BuildTicket::Pending(subscription))
    }

    /// Published site for `repo` at `base_url`, building it first if needed
    #[instrument(skip(self), fields(render_key = tracing::field::Empty))]
    pub async fn ensure_artifact(
        self: &Arc<Self>,
        repo: &Repo,
        base_url: &str,
    ) -> BookpubResult<EnsuredArtifact> {
        tracing::Span::current().record("render_key", render_key(repo, base_url).as_str());

        match self.begin(repo, base_url)? {
            BuildTicket::Ready(path) => Ok(EnsuredArtifact {
                path,
                log: Vec::new(),
            }),
            BuildTicket::Pending(subscription) => {
                let (log, outcome) = subscription.collect().await;
                Ok(EnsuredArtifact {
                    path: outcome?,
                    log,
                })
            }
        }
    }

    async fn run(
        &self,
        repo: &Repo,
        base_url: &str,
        key: &str,
        build: &InflightBuild,
    ) -> BookpubResult<PathBuf> {
        let checkout = match self.checkouts.lookup(repo) {
            Some(path) => path,
            None => {
                build.push_line(format!("Fetching {}...", repo));
                let path = self.checkouts.ensure(repo).await?;
                build.push_line(format!("Fetched {}", repo));
                path
            }
        };

        info!("Building {} for {}", repo, base_url);
        let scratch = self.artifacts.staging_dir(key);
        let built = self
            .tool
            .build(&checkout, &scratch, base_url, &|line: String| build.push_line(line))
            .await;

        let published = match built {
            Ok(output) => self.artifacts.publish(key, &output).await,
            Err(e) => Err(e),
        };
        remove_dir_best_effort(&scratch).await;

        if published.is_ok() {
            info!("Built {} for {}", repo, base_url);
        }
        published
    }
}
