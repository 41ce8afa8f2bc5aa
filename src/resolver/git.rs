//! Built-in resolver for git repository URLs
//!
//! Recognizes GitHub and GitLab web URLs (including `/tree/<ref>` links)
//! and falls back to treating anything else as a plain git remote.

use crate::error::{BookpubError, BookpubResult};
use crate::orchestration::output_with_timeout;
use crate::repo::{Answer, Repo, DEFAULT_REF};
use crate::resolver::Resolver;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

/// Resolver that understands repository URLs
pub struct GitUrlResolver {
    git: String,
    timeout_secs: u64,
}

impl GitUrlResolver {
    /// Create a resolver using the given git binary
    pub fn new(git: &str, timeout_secs: u64) -> Self {
        Self {
            git: git.to_string(),
            timeout_secs,
        }
    }

    /// Ask the remote which commit `reference` points at
    ///
    /// `None` when the ref is not on the remote or the remote itself does
    /// not exist (or hides behind authentication).
    async fn ls_remote(&self, url: &str, reference: &str) -> BookpubResult<Option<String>> {
        let mut cmd = Command::new(&self.git);
        cmd.args(["ls-remote", "--", url, reference])
            .env("GIT_TERMINAL_PROMPT", "0");

        let command_line = format!("{} ls-remote {} {}", self.git, url, reference);
        let output = output_with_timeout(cmd, &command_line, self.timeout_secs)
            .await
            .map_err(|e| self.failed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if remote_missing(output.status.code(), &stderr) {
                debug!("Remote {} is missing: {}", url, stderr.trim());
                return Ok(None);
            }
            return Err(self.failed(format!("{}: {}", command_line, stderr.trim())));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(pick_ref(&stdout, reference))
    }

    fn failed(&self, reason: String) -> BookpubError {
        BookpubError::ResolverFailed {
            resolver: self.name().to_string(),
            reason,
        }
    }
}

#[async_trait]
impl Resolver for GitUrlResolver {
    async fn resolve(&self, question: &str, confirm: bool) -> BookpubResult<Vec<Answer>> {
        let Some(repo) = parse_repo_url(question) else {
            debug!("Not a repository URL: {}", question);
            return Ok(Vec::new());
        };

        let mut answers = vec![Answer::MaybeExists(repo.clone())];
        if !confirm {
            return Ok(answers);
        }

        let url = repo.clone_url();
        let reference = repo.git_ref().to_string();

        if is_full_sha(&reference) {
            answers.push(Answer::Exists(Repo::ImmutableGit {
                repo: url,
                sha: reference.to_ascii_lowercase(),
            }));
            return Ok(answers);
        }

        match self.ls_remote(&url, &reference).await? {
            Some(sha) => {
                debug!("{} resolved {} to {}", url, reference, sha);
                answers.push(Answer::Exists(Repo::ImmutableGit { repo: url, sha }));
            }
            None => answers.push(Answer::DoesNotExist(repo)),
        }

        Ok(answers)
    }

    fn name(&self) -> &'static str {
        "git"
    }
}

/// Parse a repository URL into an identity
///
/// Scheme-less input is treated as https. Returns `None` for input that
/// cannot name a remote repository.
pub fn parse_repo_url(input: &str) -> Option<Repo> {
    let input = input.trim();
    let (scheme, rest) = match input.split_once("://") {
        Some((scheme, rest)) if matches!(scheme, "http" | "https") => (scheme, rest),
        Some(_) => return None,
        None => ("https", input),
    };

    let rest = rest.split(['?', '#']).next().unwrap_or_default();
    let (host, path) = rest.split_once('/')?;
    if host.is_empty() || !host.contains('.') {
        return None;
    }

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return None;
    }

    let repo = match host.to_ascii_lowercase().as_str() {
        "github.com" | "www.github.com" => parse_github(&segments)?,
        "gitlab.com" | "www.gitlab.com" => parse_gitlab(&segments)?,
        _ => Repo::Git {
            repo: format!("{}://{}/{}", scheme, host, segments.join("/")),
            reference: DEFAULT_REF.to_string(),
        },
    };
    Some(repo)
}

fn parse_github(segments: &[&str]) -> Option<Repo> {
    let [org, repo, rest @ ..] = segments else {
        return None;
    };
    let reference = match rest {
        ["tree", reference @ ..] | ["commit", reference @ ..] if !reference.is_empty() => {
            reference.join("/")
        }
        _ => DEFAULT_REF.to_string(),
    };
    Some(Repo::GitHub {
        host: "github.com".to_string(),
        org: (*org).to_string(),
        repo: strip_git_suffix(repo).to_string(),
        reference,
    })
}

fn parse_gitlab(segments: &[&str]) -> Option<Repo> {
    // Everything before the `-` separator is the (possibly nested) project path
    let split = segments.iter().position(|s| *s == "-");
    let (project, rest) = match split {
        Some(idx) => (&segments[..idx], &segments[idx + 1..]),
        None => (segments, &[][..]),
    };
    if project.len() < 2 {
        return None;
    }
    let reference = match rest {
        ["tree", reference @ ..] | ["commit", reference @ ..] if !reference.is_empty() => {
            reference.join("/")
        }
        _ => DEFAULT_REF.to_string(),
    };
    let mut project: Vec<&str> = project.to_vec();
    if let Some(last) = project.last_mut() {
        *last = strip_git_suffix(*last);
    }
    Some(Repo::GitLab {
        host: "gitlab.com".to_string(),
        project: project.join("/"),
        reference,
    })
}

fn strip_git_suffix(name: &str) -> &str {
    name.strip_suffix(".git").unwrap_or(name)
}

/// git exit code for fatal errors, including unreachable remotes
const GIT_FATAL_EXIT: i32 = 128;

/// stderr fragments git prints when the remote repository is absent
const MISSING_REMOTE_MARKERS: &[&str] = &[
    "repository not found",
    "not found",
    "could not read username",
    "terminal prompts disabled",
    "does not appear to be a git repository",
    "authentication failed",
];

/// Whether a failed `git ls-remote` means the repository does not exist
fn remote_missing(code: Option<i32>, stderr: &str) -> bool {
    let stderr = stderr.to_ascii_lowercase();
    code == Some(GIT_FATAL_EXIT) && MISSING_REMOTE_MARKERS.iter().any(|m| stderr.contains(m))
}

fn is_full_sha(reference: &str) -> bool {
    reference.len() == 40 && reference.chars().all(|c| c.is_ascii_hexdigit())
}

/// Pick the commit for `reference` out of `git ls-remote` output
///
/// Branches win over tags; annotated tags resolve to the peeled commit.
fn pick_ref(ls_remote: &str, reference: &str) -> Option<String> {
    let entries: Vec<(&str, &str)> = ls_remote
        .lines()
        .filter_map(|line| line.split_once('\t'))
        .collect();

    let wanted = if reference == DEFAULT_REF {
        vec![DEFAULT_REF.to_string()]
    } else {
        vec![
            format!("refs/heads/{}", reference),
            format!("refs/tags/{}^{{}}", reference),
            format!("refs/tags/{}", reference),
            reference.to_string(),
        ]
    };

    wanted.iter().find_map(|name| {
        entries
            .iter()
            .find(|(_, r)| r == name)
            .map(|(sha, _)| (*sha).to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_github_urls() {
        let repo = parse_repo_url("https://github.com/org/repo").unwrap();
        assert_eq!(
            repo,
            Repo::GitHub {
                host: "github.com".to_string(),
                org: "org".to_string(),
                repo: "repo".to_string(),
                reference: "HEAD".to_string(),
            }
        );

        let repo = parse_repo_url("github.com/org/repo.git").unwrap();
        assert_eq!(repo.clone_url(), "https://github.com/org/repo");
    }

    #[test]
    fn parses_github_tree_ref() {
        let repo = parse_repo_url("https://github.com/org/repo/tree/release/1.0").unwrap();
        assert_eq!(repo.git_ref(), "release/1.0");
    }

    #[test]
    fn parses_gitlab_nested_projects() {
        let repo = parse_repo_url("https://gitlab.com/group/sub/project/-/tree/dev").unwrap();
        assert_eq!(
            repo,
            Repo::GitLab {
                host: "gitlab.com".to_string(),
                project: "group/sub/project".to_string(),
                reference: "dev".to_string(),
            }
        );
    }

    #[test]
    fn other_hosts_are_plain_git() {
        let repo = parse_repo_url("https://codeberg.org/someone/book.git?x=1").unwrap();
        assert_eq!(
            repo,
            Repo::Git {
                repo: "https://codeberg.org/someone/book.git".to_string(),
                reference: "HEAD".to_string(),
            }
        );
    }

    #[test]
    fn rejects_non_repository_input() {
        assert!(parse_repo_url("bogus/spec").is_none());
        assert!(parse_repo_url("ftp://example.org/x").is_none());
        assert!(parse_repo_url("https://github.com/").is_none());
        assert!(parse_repo_url("https://github.com/org").is_none());
        assert!(parse_repo_url("").is_none());
    }

    #[test]
    fn picks_branch_before_tag() {
        let out = "aaa\trefs/tags/main\nbbb\trefs/heads/main\n";
        assert_eq!(pick_ref(out, "main").as_deref(), Some("bbb"));
    }

    #[test]
    fn picks_peeled_tag() {
        let out = "ccc\trefs/tags/v1\nddd\trefs/tags/v1^{}\n";
        assert_eq!(pick_ref(out, "v1").as_deref(), Some("ddd"));
    }

    #[test]
    fn picks_head() {
        let out = "eee\tHEAD\nfff\trefs/heads/main\n";
        assert_eq!(pick_ref(out, "HEAD").as_deref(), Some("eee"));
        assert_eq!(pick_ref("", "HEAD"), None);
    }

    #[tokio::test]
    async fn unconfirmed_resolution_skips_network() {
        let resolver = GitUrlResolver::new("git-binary-that-does-not-exist", 5);
        let answers = resolver
            .resolve("https://github.com/org/repo", false)
            .await
            .unwrap();
        assert_eq!(answers.len(), 1);
        assert!(matches!(answers[0], Answer::MaybeExists(_)));
    }

    #[tokio::test]
    async fn full_sha_is_confirmed_without_network() {
        let resolver = GitUrlResolver::new("git-binary-that-does-not-exist", 5);
        let sha = "0123456789abcdef0123456789abcdef01234567";
        let answers = resolver
            .resolve(&format!("https://github.com/org/repo/commit/{}", sha), true)
            .await
            .unwrap();

        assert_eq!(
            answers.last(),
            Some(&Answer::Exists(Repo::ImmutableGit {
                repo: "https://github.com/org/repo".to_string(),
                sha: sha.to_string(),
            }))
        );
    }

    #[tokio::test]
    async fn unparseable_spec_has_no_candidates() {
        let resolver = GitUrlResolver::new("git", 5);
        assert!(resolver.resolve("bogus/spec", true).await.unwrap().is_empty());
    }

    #[test]
    fn classifies_missing_remotes() {
        assert!(remote_missing(
            Some(128),
            "remote: Repository not found.\nfatal: repository 'https://github.com/org/nope/' not found"
        ));
        assert!(remote_missing(
            Some(128),
            "fatal: could not read Username for 'https://github.com': terminal prompts disabled"
        ));
        assert!(!remote_missing(
            Some(128),
            "fatal: unable to access 'https://github.com/org/repo/': Could not resolve host: github.com"
        ));
        assert!(!remote_missing(Some(1), "repository not found"));
    }

    #[cfg(unix)]
    fn fake_git(dir: &std::path::Path, script: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("git");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", script)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn missing_remote_does_not_exist() {
        let dir = tempfile::TempDir::new().unwrap();
        let git = fake_git(
            dir.path(),
            "echo 'remote: Repository not found.' >&2\necho \"fatal: repository '$3' not found\" >&2\nexit 128",
        );
        let resolver = GitUrlResolver::new(&git, 5);

        let answers = resolver.resolve("github.com/org/nope", true).await.unwrap();
        assert!(matches!(answers.last(), Some(Answer::DoesNotExist(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unreachable_remote_is_a_resolver_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let git = fake_git(
            dir.path(),
            "echo 'fatal: unable to access: Could not resolve host: github.com' >&2\nexit 128",
        );
        let resolver = GitUrlResolver::new(&git, 5);

        let err = resolver.resolve("github.com/org/repo", true).await.unwrap_err();
        assert!(matches!(err, BookpubError::ResolverFailed { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn matching_ref_is_pinned() {
        let dir = tempfile::TempDir::new().unwrap();
        let sha = "89abcdef0123456789abcdef0123456789abcdef";
        let git = fake_git(dir.path(), &format!("printf '{}\\tHEAD\\n'", sha));
        let resolver = GitUrlResolver::new(&git, 5);

        let answers = resolver.resolve("github.com/org/repo", true).await.unwrap();
        assert_eq!(
            answers.last(),
            Some(&Answer::Exists(Repo::ImmutableGit {
                repo: "https://github.com/org/repo".to_string(),
                sha: sha.to_string(),
            }))
        );
    }

    #[tokio::test]
    async fn missing_git_binary_is_a_resolver_failure() {
        let resolver = GitUrlResolver::new("git-binary-that-does-not-exist", 5);
        let err = resolver
            .resolve("https://github.com/org/repo", true)
            .await
            .unwrap_err();
        assert!(matches!(err, BookpubError::ResolverFailed { .. }));
    }
}
