//! Repository identities and resolver answers
//!
//! A [`Repo`] says where a repository's content lives and at which ref. It is
//! produced only by a resolver, wrapped in an [`Answer`] that records how sure
//! the resolver is that the repository exists.

mod spec;

pub use spec::Spec;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Git ref used when a spec names no branch, tag or commit
pub const DEFAULT_REF: &str = "HEAD";

/// A concrete, addressable repository reference
///
/// Field order is part of the content address (see `cache::key`); reordering
/// fields changes every checkout and render key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum Repo {
    /// Any git remote at a branch, tag or `HEAD`
    Git {
        repo: String,
        #[serde(rename = "ref")]
        reference: String,
    },
    /// A git remote pinned to a full commit SHA
    ImmutableGit { repo: String, sha: String },
    /// A GitHub-hosted repository
    GitHub {
        host: String,
        org: String,
        repo: String,
        #[serde(rename = "ref")]
        reference: String,
    },
    /// A GitLab-hosted project (project may contain nested groups)
    GitLab {
        host: String,
        project: String,
        #[serde(rename = "ref")]
        reference: String,
    },
}

impl Repo {
    /// URL to hand to `git clone` / `git fetch`
    pub fn clone_url(&self) -> String {
        match self {
            Self::Git { repo, .. } | Self::ImmutableGit { repo, .. } => repo.clone(),
            Self::GitHub {
                host, org, repo, ..
            } => format!("https://{}/{}/{}", host, org, repo),
            Self::GitLab { host, project, .. } => format!("https://{}/{}", host, project),
        }
    }

    /// Branch, tag, `HEAD` or commit SHA to check out
    pub fn git_ref(&self) -> &str {
        match self {
            Self::Git { reference, .. }
            | Self::GitHub { reference, .. }
            | Self::GitLab { reference, .. } => reference,
            Self::ImmutableGit { sha, .. } => sha,
        }
    }

    /// Variant name as it appears in the `kind` field of answer documents
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Git { .. } => "Git",
            Self::ImmutableGit { .. } => "ImmutableGit",
            Self::GitHub { .. } => "GitHub",
            Self::GitLab { .. } => "GitLab",
        }
    }
}

impl fmt::Display for Repo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.clone_url(), self.git_ref())
    }
}

/// How certain a resolver is about a repository's existence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Certainty {
    Exists,
    MaybeExists,
    DoesNotExist,
}

impl fmt::Display for Certainty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Exists => "Exists",
            Self::MaybeExists => "MaybeExists",
            Self::DoesNotExist => "DoesNotExist",
        };
        write!(f, "{}", name)
    }
}

/// A resolver's answer for one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// Verified against the live remote
    Exists(Repo),
    /// Plausible but unverified (e.g. branch name not checked)
    MaybeExists(Repo),
    /// Verified absent
    DoesNotExist(Repo),
}

impl Answer {
    /// Build an answer from its certainty and identity
    pub fn new(certainty: Certainty, repo: Repo) -> Self {
        match certainty {
            Certainty::Exists => Self::Exists(repo),
            Certainty::MaybeExists => Self::MaybeExists(repo),
            Certainty::DoesNotExist => Self::DoesNotExist(repo),
        }
    }

    pub fn certainty(&self) -> Certainty {
        match self {
            Self::Exists(_) => Certainty::Exists,
            Self::MaybeExists(_) => Certainty::MaybeExists,
            Self::DoesNotExist(_) => Certainty::DoesNotExist,
        }
    }

    pub fn repo(&self) -> &Repo {
        match self {
            Self::Exists(repo) | Self::MaybeExists(repo) | Self::DoesNotExist(repo) => repo,
        }
    }

    /// Wire form used by resolver commands and `/api/v1/resolve`
    pub fn to_document(&self) -> AnswerDocument {
        AnswerDocument {
            certainity: self.certainty(),
            repo: self.repo().clone(),
        }
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.certainty(), self.repo())
    }
}

/// JSON answer document
///
/// ```json
/// {"certainity": "Exists", "kind": "GitHub", "data": {"host": "github.com", ...}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerDocument {
    /// Spelling matches what the bundled frontend reads
    pub certainity: Certainty,
    #[serde(flatten)]
    pub repo: Repo,
}

impl From<AnswerDocument> for Answer {
    fn from(doc: AnswerDocument) -> Self {
        Answer::new(doc.certainity, doc.repo)
    }
}
