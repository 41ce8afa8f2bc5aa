//! Request handlers
//!
//! A request for a site that still has to be built waits for the build and
//! is answered in two phases: the build log as text lines, then the bytes of
//! the requested file. The status reflects the outcome, so a failed fetch or
//! build is a `5xx` whose body is the log followed by the error.

use crate::cache::{ArtifactStore, CheckoutStore, ResolutionCache, ResolutionCacheOptions};
use crate::config::Config;
use crate::error::{BookpubError, BookpubResult};
use crate::fetch::{Fetcher, GitFetcher};
use crate::orchestration::{BuildOrchestrator, BuildSubscription, BuildTicket, BuildTool};
use crate::repo::{Answer, AnswerDocument, Repo, Spec};
use crate::resolver::{create_resolver, Resolver};
use crate::server::files::{
    check_request_path, file_response, file_response_after, resolve_served_file,
};
use axum::body::Bytes;
use axum::extract::{OriginalUri, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything a request handler needs, built once at startup
pub struct AppState {
    pub config: Config,
    pub resolutions: ResolutionCache,
    pub orchestrator: Arc<BuildOrchestrator>,
}

impl AppState {
    /// Wire up caches and the orchestrator around the given collaborators
    pub fn new(config: Config, resolver: Arc<dyn Resolver>, fetcher: Arc<dyn Fetcher>) -> Self {
        let resolutions =
            ResolutionCache::new(resolver, ResolutionCacheOptions::from(&config.resolver));
        let orchestrator = BuildOrchestrator::new(
            CheckoutStore::new(&config.storage.checkout_root, fetcher),
            ArtifactStore::new(&config.storage.built_sites_root),
            BuildTool::new(config.build.clone()),
        );
        Self {
            config,
            resolutions,
            orchestrator: Arc::new(orchestrator),
        }
    }

    /// State with the resolver and fetcher named by the configuration
    pub fn from_config(config: Config) -> BookpubResult<Self> {
        let resolver = create_resolver(&config.resolver, &config.fetch.git)?;
        let fetcher = Arc::new(GitFetcher::new(&config.fetch.git, config.fetch.timeout_secs));
        Ok(Self::new(config, resolver, fetcher))
    }

    /// Resolve `spec` to a repository confirmed to exist
    async fn resolve_existing(&self, spec: &Spec) -> BookpubResult<Repo> {
        match self.resolutions.resolve(spec).await? {
            None => Err(BookpubError::Unresolvable(spec.question().to_string())),
            Some(Answer::Exists(repo)) => Ok(repo),
            Some(Answer::MaybeExists(repo)) => Err(BookpubError::Unconfirmed(repo.to_string())),
            Some(Answer::DoesNotExist(repo)) => Err(BookpubError::DoesNotExist(repo.to_string())),
        }
    }
}

pub type SharedState = Arc<AppState>;

/// `GET /repo/<spec>/<path>`
pub(crate) async fn repo(
    State(state): State<SharedState>,
    OriginalUri(uri): OriginalUri,
) -> BookpubResult<Response> {
    // The raw path keeps `%2F` inside the repository spec intact
    let rest = uri
        .path()
        .strip_prefix("/repo/")
        .ok_or_else(|| BookpubError::NotFound(uri.path().to_string()))?;

    let Some((raw_spec, raw_sub_path)) = rest.split_once('/') else {
        let location = format!("{}/", state.config.server.base_url_for(rest));
        return Ok(Redirect::permanent(&location).into_response());
    };
    if raw_spec.is_empty() {
        return Err(BookpubError::InvalidSpec("empty spec".to_string()));
    }

    let sub_path = percent_decode_str(raw_sub_path)
        .decode_utf8_lossy()
        .into_owned();
    check_request_path(&sub_path)?;

    let spec = Spec::from_path_segment(raw_spec);
    let repo = state.resolve_existing(&spec).await?;
    let base_url = state.config.server.base_url_for(raw_spec);

    match state.orchestrator.begin(&repo, &base_url)? {
        BuildTicket::Ready(site) => {
            let file = resolve_served_file(&site, &sub_path)?;
            file_response(&file).await
        }
        BuildTicket::Pending(subscription) => {
            debug!(
                "Waiting for build of {} for {} ({} in flight)",
                repo,
                base_url,
                state.orchestrator.builds_in_flight()
            );
            Ok(build_response(subscription, &sub_path).await)
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResolveQuery {
    q: Option<String>,
}

/// `GET /api/v1/resolve?q=<spec>`
pub(crate) async fn resolve(
    State(state): State<SharedState>,
    Query(query): Query<ResolveQuery>,
) -> BookpubResult<Json<AnswerDocument>> {
    let question = query
        .q
        .filter(|q| !q.trim().is_empty())
        .ok_or(BookpubError::MissingQuery("q"))?;

    match state.resolutions.resolve(&Spec::from_query(&question)).await? {
        Some(answer) => Ok(Json(answer.to_document())),
        None => Err(BookpubError::Unresolvable(question)),
    }
}

/// Frontend assets from `server.static_dir`
pub(crate) async fn static_files(
    State(state): State<SharedState>,
    OriginalUri(uri): OriginalUri,
) -> BookpubResult<Response> {
    let Some(dir) = &state.config.server.static_dir else {
        return Err(BookpubError::NotFound(uri.path().to_string()));
    };
    let sub_path = percent_decode_str(uri.path())
        .decode_utf8_lossy()
        .into_owned();
    let file = resolve_served_file(dir, &sub_path)?;
    file_response(&file).await
}

/// Response for a request that joined a build
///
/// Success serves the build log followed by the file. A failed build, or a
/// file missing from the finished site, answers with the error's status and
/// the log followed by the error text.
async fn build_response(subscription: BuildSubscription, sub_path: &str) -> Response {
    let (lines, outcome) = subscription.collect().await;
    let mut log = String::new();
    for line in lines {
        log.push_str(&line);
        log.push('\n');
    }

    let served = outcome.and_then(|site| resolve_served_file(&site, sub_path));
    let result = match served {
        Ok(file) => file_response_after(&file, Bytes::from(log.clone())).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(response) => response,
        Err(e) => {
            let status = e.status_code();
            if status.is_server_error() {
                warn!("{}", e);
            } else {
                debug!("{}", e);
            }
            log.push_str(&failure_text(&e));
            (status, log).into_response()
        }
    }
}

fn failure_text(error: &BookpubError) -> String {
    match error.root() {
        BookpubError::BuildFailed { .. } => format!("{}\n", error),
        e if e.is_client_error() => format!("{}\n", error),
        _ => format!("Build failed: {}\n", error),
    }
}
