//! Configuration schema for bookpub
//!
//! Configuration is stored at `~/.config/bookpub/config.toml`

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// HTTP server settings
    pub server: ServerConfig,

    /// On-disk cache locations
    pub storage: StorageConfig,

    /// Spec resolution
    pub resolver: ResolverConfig,

    /// Repository fetching
    pub fetch: FetchConfig,

    /// Static site generator invocation
    pub build: BuildConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Force debug logging
    pub debug: bool,

    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            debug: false,
            log_format: "text".to_string(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,

    pub port: u16,

    /// Prefix prepended to base URLs when mounted under a sub-path
    pub public_prefix: String,

    /// Frontend assets served at every path not handled otherwise
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9200,
            public_prefix: String::new(),
            static_dir: None,
        }
    }
}

impl ServerConfig {
    /// Base URL a site is built for when served under `/repo/<raw_spec>`
    pub fn base_url_for(&self, raw_spec: &str) -> String {
        format!(
            "{}/repo/{}",
            self.public_prefix.trim_end_matches('/'),
            raw_spec
        )
    }
}

/// Checkout and built site locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub checkout_root: PathBuf,

    pub built_sites_root: PathBuf,

    /// `cache gc` removes entries older than N days (0 = disabled)
    pub gc_days: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data = dirs::data_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bookpub");
        Self {
            checkout_root: data.join("repos"),
            built_sites_root: data.join("built_sites"),
            gc_days: 30,
        }
    }
}

/// Which resolver implementation to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolverKind {
    /// Built-in URL parser confirmed with `git ls-remote`
    #[default]
    Git,
    /// External program printing answer documents
    Command,
}

impl fmt::Display for ResolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Git => write!(f, "git"),
            Self::Command => write!(f, "command"),
        }
    }
}

/// Resolver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub kind: ResolverKind,

    /// argv of the command resolver; the repository spec is appended
    pub command: Vec<String>,

    /// How long resolutions stay cached
    pub cache_ttl_secs: u64,

    /// Maximum number of cached resolutions
    pub cache_max_size: u64,

    /// Also cache answers saying the repository does not exist
    pub cache_does_not_exist: bool,

    pub timeout_secs: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            kind: ResolverKind::Git,
            command: Vec::new(),
            cache_ttl_secs: 600,
            cache_max_size: 128,
            cache_does_not_exist: true,
            timeout_secs: 60,
        }
    }
}

/// Fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// git executable
    pub git: String,

    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            git: "git".to_string(),
            timeout_secs: 600,
        }
    }
}

/// Site generator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Build command, run in the build root
    pub command: Vec<String>,

    /// Run when no config file is found, to create one
    pub init_command: Vec<String>,

    /// Files marking a build root
    pub config_files: Vec<String>,

    /// Build output, relative to the build root
    pub output_dir: PathBuf,

    /// Environment variable carrying the base URL
    pub base_url_env: String,

    pub timeout_secs: u64,

    /// Extra environment for build processes
    pub env: BTreeMap<String, String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            command: vec![
                "jupyter".to_string(),
                "book".to_string(),
                "build".to_string(),
                "--html".to_string(),
            ],
            init_command: vec![
                "jupyter".to_string(),
                "book".to_string(),
                "init".to_string(),
                "--write-toc".to_string(),
            ],
            config_files: vec!["myst.yml".to_string()],
            output_dir: PathBuf::from("_build/html"),
            base_url_env: "BASE_URL".to_string(),
            timeout_secs: 1800,
            env: BTreeMap::new(),
        }
    }
}
