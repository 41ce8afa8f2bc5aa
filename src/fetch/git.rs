//! Shallow git fetches

use crate::error::{BookpubError, BookpubResult};
use crate::fetch::Fetcher;
use crate::orchestration::output_with_timeout;
use crate::repo::{Repo, DEFAULT_REF};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

/// Fetcher using the `git` command line
pub struct GitFetcher {
    git: String,
    timeout_secs: u64,
}

impl GitFetcher {
    pub fn new(git: &str, timeout_secs: u64) -> Self {
        Self {
            git: git.to_string(),
            timeout_secs,
        }
    }

    /// git invocations needed to materialize `repo` at `dest`
    fn plan(&self, repo: &Repo, dest: &Path) -> Vec<Vec<String>> {
        let dest = dest.display().to_string();
        let url = repo.clone_url();

        match repo {
            Repo::ImmutableGit { sha, .. } => vec![
                vec!["init".to_string(), "--quiet".to_string(), dest.clone()],
                vec![
                    "-C".to_string(),
                    dest.clone(),
                    "fetch".to_string(),
                    "--depth".to_string(),
                    "1".to_string(),
                    url,
                    sha.clone(),
                ],
                vec![
                    "-C".to_string(),
                    dest,
                    "checkout".to_string(),
                    "--quiet".to_string(),
                    "--detach".to_string(),
                    "FETCH_HEAD".to_string(),
                ],
            ],
            _ => {
                let mut clone = vec![
                    "clone".to_string(),
                    "--quiet".to_string(),
                    "--depth".to_string(),
                    "1".to_string(),
                ];
                if repo.git_ref() != DEFAULT_REF {
                    clone.push("--branch".to_string());
                    clone.push(repo.git_ref().to_string());
                }
                clone.push("--".to_string());
                clone.push(url);
                clone.push(dest);
                vec![clone]
            }
        }
    }

    async fn git(&self, repo: &Repo, args: &[String]) -> BookpubResult<()> {
        let command_line = format!("{} {}", self.git, args.join(" "));
        debug!("Executing: {}", command_line);

        let mut cmd = Command::new(&self.git);
        cmd.args(args).env("GIT_TERMINAL_PROMPT", "0");

        let output = output_with_timeout(cmd, &command_line, self.timeout_secs)
            .await
            .map_err(|e| BookpubError::FetchFailed {
                repo: repo.to_string(),
                reason: e.to_string(),
            })?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(BookpubError::FetchFailed {
                repo: repo.to_string(),
                reason: format!("{}: {}", command_line, stderr.trim()),
            })
        }
    }
}

#[async_trait]
impl Fetcher for GitFetcher {
    async fn fetch(&self, repo: &Repo, dest: &Path) -> BookpubResult<()> {
        for args in self.plan(repo, dest) {
            self.git(repo, &args).await?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "git"
    }
}
