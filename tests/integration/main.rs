//! Integration tests for bookpub

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn bookpub() -> Command {
        let mut cmd = cargo_bin_cmd!("bookpub");
        cmd.env_remove("BOOKPUB_CONFIG").env_remove("RUST_LOG");
        cmd
    }

    /// Config file pointing both cache roots into `dir`
    fn write_config(dir: &Path, extra: &str) -> PathBuf {
        let path = dir.join("config.toml");
        let text = format!(
            "[storage]\ncheckout_root = {:?}\nbuilt_sites_root = {:?}\n\n{}",
            dir.join("checkouts").to_string_lossy(),
            dir.join("sites").to_string_lossy(),
            extra
        );
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn help_displays() {
        bookpub()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Render git-hosted books on demand"));
    }

    #[test]
    fn version_displays() {
        bookpub()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("bookpub"));
    }

    #[test]
    fn config_path_honors_flag() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("custom.toml");

        bookpub()
            .arg("--config")
            .arg(&path)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("custom.toml"));
    }

    #[test]
    fn config_show() {
        let temp = TempDir::new().unwrap();

        bookpub()
            .arg("--config")
            .arg(temp.path().join("missing.toml"))
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[server]"))
            .stdout(predicate::str::contains("port = 9200"));
    }

    #[test]
    fn config_init_creates_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.toml");

        bookpub()
            .arg("--config")
            .arg(&path)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("initialized"));

        assert!(path.is_file());
    }

    #[test]
    fn config_init_force_replaces_invalid_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "[server\nport = ").unwrap();

        bookpub()
            .arg("--config")
            .arg(&path)
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("config init --force"));

        bookpub()
            .arg("--config")
            .arg(&path)
            .args(["config", "init", "--force"])
            .assert()
            .success();

        assert!(fs::read_to_string(&path).unwrap().contains("[server]"));
    }

    #[test]
    fn cache_list_empty() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "");

        bookpub()
            .arg("--config")
            .arg(&config)
            .args(["cache", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cache entries found"));
    }

    #[test]
    fn cache_list_json() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "");
        let site = temp.path().join("sites").join("abc123");
        fs::create_dir_all(&site).unwrap();
        fs::write(site.join("index.html"), "<h1>book</h1>").unwrap();

        bookpub()
            .arg("--config")
            .arg(&config)
            .args(["cache", "list", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"kind\": \"site\""))
            .stdout(predicate::str::contains("abc123"));
    }

    #[test]
    fn cache_clear_requires_target() {
        bookpub()
            .args(["cache", "clear"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--checkouts"));
    }

    #[test]
    fn cache_clear_sites() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "");
        let site = temp.path().join("sites").join("abc123");
        let checkout = temp.path().join("checkouts").join("def456");
        fs::create_dir_all(&site).unwrap();
        fs::create_dir_all(&checkout).unwrap();

        bookpub()
            .arg("--config")
            .arg(&config)
            .args(["cache", "clear", "--sites", "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("cleared 1"));

        assert!(!site.exists());
        assert!(checkout.exists());
    }

    #[cfg(unix)]
    #[test]
    fn resolve_with_command_resolver() {
        let temp = TempDir::new().unwrap();
        let script = r#"echo '[{"certainity":"Exists","kind":"Git","data":{"repo":"https://example.org/book","ref":"HEAD"}}]'"#;
        let config = write_config(
            temp.path(),
            &format!("[resolver]\nkind = \"command\"\ncommand = [\"sh\", \"-c\", {:?}, \"resolver\"]\n", script),
        );

        bookpub()
            .arg("--config")
            .arg(&config)
            .args(["resolve", "example.org/book"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"certainity\": \"Exists\""))
            .stdout(predicate::str::contains("https://example.org/book"));
    }

    #[cfg(unix)]
    #[test]
    fn resolve_unknown_spec_fails() {
        let temp = TempDir::new().unwrap();
        let config = write_config(
            temp.path(),
            "[resolver]\nkind = \"command\"\ncommand = [\"sh\", \"-c\", \"echo []\", \"resolver\"]\n",
        );

        bookpub()
            .arg("--config")
            .arg(&config)
            .args(["resolve", "bogus/spec"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("bogus/spec could not be resolved"));
    }
}
