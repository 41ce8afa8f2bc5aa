//! Error types for bookpub
//!
//! All modules use `BookpubResult<T>` as their return type. Errors that reach
//! the HTTP layer are mapped to status codes by [`BookpubError::status_code`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Result type alias for bookpub operations
pub type BookpubResult<T> = Result<T, BookpubError>;

/// All errors that can occur in bookpub
#[derive(Error, Debug)]
pub enum BookpubError {
    // Resolution errors
    #[error("{0} could not be resolved")]
    Unresolvable(String),

    #[error("{0} does not exist")]
    DoesNotExist(String),

    #[error("{0} could not be confirmed to exist")]
    Unconfirmed(String),

    #[error("Resolver {resolver} failed: {reason}")]
    ResolverFailed { resolver: String, reason: String },

    #[error("Invalid spec: {0}")]
    InvalidSpec(String),

    #[error("Missing required query parameter: {0}")]
    MissingQuery(&'static str),

    // Fetch errors
    #[error("Failed to fetch {repo}: {reason}")]
    FetchFailed { repo: String, reason: String },

    // Build errors
    #[error("Build failed (exit code {}):\n{output}", code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    BuildFailed { code: Option<i32>, output: String },

    #[error("Build tool initialization failed:\n{output}")]
    BuildInit { output: String },

    #[error("Build timed out after {secs}s")]
    BuildTimeout { secs: u64 },

    #[error("Build finished but produced no output at {0}")]
    BuildOutputMissing(PathBuf),

    // Serving errors
    #[error("Path escapes the site root: {0}")]
    PathTraversal(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, stderr: {stderr}")]
    CommandExecution { command: String, stderr: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// One failure observed by every request that waited on the same build
    #[error(transparent)]
    Shared(Arc<BookpubError>),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl BookpubError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Follow `Shared` wrappers down to the underlying error
    pub fn root(&self) -> &BookpubError {
        match self {
            Self::Shared(inner) => inner.root(),
            other => other,
        }
    }

    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self.root() {
            Self::Unresolvable(_) | Self::DoesNotExist(_) | Self::Unconfirmed(_) | Self::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Self::MissingQuery(_) | Self::PathTraversal(_) | Self::InvalidSpec(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::ResolverFailed { .. } | Self::FetchFailed { .. } => StatusCode::BAD_GATEWAY,
            Self::BuildTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the error is the client's fault (bad spec, bad path)
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self.root() {
            Self::ConfigInvalid { .. } => Some("Run: bookpub config init --force"),
            Self::ResolverFailed { .. } => Some("Check resolver.kind and resolver.command in the config"),
            Self::BuildInit { .. } | Self::BuildFailed { .. } => {
                Some("Check build.command and build.init_command in the config")
            }
            _ => None,
        }
    }
}

impl IntoResponse for BookpubError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::debug!("{}", self);
        }
        (status, format!("{}\n", self)).into_response()
    }
}
