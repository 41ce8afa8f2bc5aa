//! CLI command implementations

pub mod cache;
pub mod config;
pub mod resolve;
pub mod serve;

pub use cache::execute as cache;
pub use config::execute as config;
pub use resolve::execute as resolve;
pub use serve::execute as serve;
