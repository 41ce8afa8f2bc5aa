//! bookpub - on-demand builder and server for git-hosted books
//!
//! A request names a repository through a short spec. The spec is resolved
//! to a concrete repository, fetched once, built once per base URL and
//! served from a content-addressed cache.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod orchestration;
pub mod repo;
pub mod resolver;
pub mod server;

pub use error::{BookpubError, BookpubResult};
