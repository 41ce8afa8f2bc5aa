//! Serve command - run the HTTP server

use crate::cli::args::ServeArgs;
use crate::config::Config;
use crate::error::BookpubResult;
use crate::server;
use tracing::info;

/// Execute the serve command
pub async fn execute(args: ServeArgs, mut config: Config) -> BookpubResult<()> {
    apply_overrides(&mut config, &args);

    info!(
        "Checkouts in {}, built sites in {}",
        config.storage.checkout_root.display(),
        config.storage.built_sites_root.display()
    );
    server::serve(config).await
}

/// Command line flags win over the configuration file
pub fn apply_overrides(config: &mut Config, args: &ServeArgs) {
    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(root) = &args.checkout_root {
        config.storage.checkout_root = root.clone();
    }
    if let Some(root) = &args.built_sites_root {
        config.storage.built_sites_root = root.clone();
    }
    if args.debug {
        config.general.debug = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn flags_override_config() {
        let mut config = Config::default();
        let args = ServeArgs {
            host: Some("127.0.0.1".to_string()),
            port: Some(8000),
            checkout_root: None,
            built_sites_root: Some(PathBuf::from("/srv/sites")),
            debug: true,
        };

        apply_overrides(&mut config, &args);

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.storage.built_sites_root, PathBuf::from("/srv/sites"));
        assert_eq!(
            config.storage.checkout_root,
            Config::default().storage.checkout_root
        );
        assert!(config.general.debug);
    }

    #[test]
    fn no_flags_keep_config() {
        let mut config = Config::default();
        config.server.port = 9999;

        apply_overrides(&mut config, &ServeArgs::default());
        assert_eq!(config.server.port, 9999);
        assert!(!config.general.debug);
    }
}
