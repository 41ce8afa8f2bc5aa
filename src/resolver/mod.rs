//! Spec resolution
//!
//! A resolver turns a free-form spec into candidate repository identities,
//! ordered from least to most specific. Two backends are available:
//! - `git`: parses repository URLs and verifies refs with `git ls-remote`
//! - `command`: delegates to an external program printing answer documents

mod command;
mod git;

pub use command::CommandResolver;
pub use git::{parse_repo_url, GitUrlResolver};

use crate::config::schema::{ResolverConfig, ResolverKind};
use crate::error::{BookpubError, BookpubResult};
use crate::repo::Answer;
use async_trait::async_trait;
use std::sync::Arc;

/// Abstract resolver interface
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolve `question` into candidates, least specific first.
    ///
    /// With `confirm` set, ambiguous candidates are checked against the
    /// live remote and followed by a more specific answer.
    async fn resolve(&self, question: &str, confirm: bool) -> BookpubResult<Vec<Answer>>;

    /// Human-readable resolver name for logs and errors
    fn name(&self) -> &'static str;
}

/// Create the resolver selected by configuration
pub fn create_resolver(config: &ResolverConfig, git: &str) -> BookpubResult<Arc<dyn Resolver>> {
    match config.kind {
        ResolverKind::Git => Ok(Arc::new(GitUrlResolver::new(git, config.timeout_secs))),
        ResolverKind::Command => {
            if config.command.is_empty() {
                return Err(BookpubError::User(
                    "resolver.kind = \"command\" requires resolver.command".to_string(),
                ));
            }
            Ok(Arc::new(CommandResolver::new(
                config.command.clone(),
                config.timeout_secs,
            )))
        }
    }
}
