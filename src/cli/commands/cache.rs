//! Cache command - inspect and prune checkouts and built sites

use crate::cache::entry::{scan, scan_staging};
use crate::cache::{format_bytes, CacheEntry, CacheKind};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::Config;
use crate::error::{BookpubError, BookpubResult};
use console::style;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> BookpubResult<()> {
    match args.action {
        CacheAction::List { format } => list_entries(config, format),
        CacheAction::Gc { days, dry_run } => gc_entries(config, days, dry_run).await,
        CacheAction::Clear {
            checkouts,
            sites,
            all,
            yes,
        } => clear_entries(config, checkouts || all, sites || all, yes).await,
    }
}

/// Both caches, checkouts first
fn collect_entries(config: &Config) -> BookpubResult<Vec<CacheEntry>> {
    let mut entries = scan(&config.storage.checkout_root, CacheKind::Checkout)?;
    entries.extend(scan(&config.storage.built_sites_root, CacheKind::Site)?);
    Ok(entries)
}

fn list_entries(config: &Config, format: OutputFormat) -> BookpubResult<()> {
    let entries = collect_entries(config)?;

    if entries.is_empty() && format != OutputFormat::Json {
        println!("No cache entries found.");
        return Ok(());
    }

    match format {
        OutputFormat::Table => print_entry_table(&entries),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Plain => {
            for entry in &entries {
                println!("{}", entry.path.display());
            }
        }
    }

    Ok(())
}

fn print_entry_table(entries: &[CacheEntry]) {
    println!("{:<10} {:<18} {:>10} {:<20}", "KIND", "KEY", "SIZE", "MODIFIED");
    println!("{}", "-".repeat(60));

    let mut total = 0;
    for entry in entries {
        let kind = match entry.kind {
            CacheKind::Checkout => style("checkout").cyan().to_string(),
            CacheKind::Site => style("site").green().to_string(),
        };
        let short_key: String = entry.key.chars().take(16).collect();

        println!(
            "{:<10} {:<18} {:>10} {:<20}",
            kind,
            short_key,
            format_bytes(entry.size_bytes),
            entry.modified.format("%Y-%m-%d %H:%M")
        );
        total += entry.size_bytes;
    }

    println!();
    println!("Total: {} entries, {}", entries.len(), format_bytes(total));
}

/// Entries not touched for more than `days` days
fn stale_entries(entries: Vec<CacheEntry>, days: u32) -> Vec<CacheEntry> {
    entries
        .into_iter()
        .filter(|e| e.is_older_than_days(days))
        .collect()
}

async fn gc_entries(config: &Config, days_override: Option<u32>, dry_run: bool) -> BookpubResult<()> {
    let gc_days = days_override.unwrap_or(config.storage.gc_days);

    if gc_days == 0 {
        println!("Cache GC is disabled (gc_days = 0)");
        return Ok(());
    }

    let to_remove = stale_entries(collect_entries(config)?, gc_days);

    if to_remove.is_empty() {
        println!("No cache entries older than {} days.", gc_days);
        return Ok(());
    }

    println!(
        "Found {} entries older than {} days:",
        to_remove.len(),
        gc_days
    );
    for entry in &to_remove {
        println!(
            "  {} {} {} ({} days old, {})",
            style("•").red(),
            entry.kind,
            entry.key,
            entry.age_days(),
            format_bytes(entry.size_bytes)
        );
    }

    if dry_run {
        println!();
        println!("Dry run - nothing removed.");
        return Ok(());
    }

    println!();
    print!("Removing entries... ");
    let _ = io::stdout().flush();

    let paths: Vec<PathBuf> = to_remove.into_iter().map(|e| e.path).collect();
    let removed = remove_all(&paths).await?;

    println!("{} removed {} entries", style("✓").green(), removed);
    Ok(())
}

/// Complete entries plus scratch directories under the selected roots
fn clear_targets(config: &Config, checkouts: bool, sites: bool) -> BookpubResult<Vec<PathBuf>> {
    let mut roots: Vec<(&Path, CacheKind)> = Vec::new();
    if checkouts {
        roots.push((&config.storage.checkout_root, CacheKind::Checkout));
    }
    if sites {
        roots.push((&config.storage.built_sites_root, CacheKind::Site));
    }

    let mut paths = Vec::new();
    for (root, kind) in roots {
        paths.extend(scan(root, kind)?.into_iter().map(|e| e.path));
        paths.extend(scan_staging(root)?);
    }
    Ok(paths)
}

async fn clear_entries(config: &Config, checkouts: bool, sites: bool, skip_confirm: bool) -> BookpubResult<()> {
    let paths = clear_targets(config, checkouts, sites)?;

    if paths.is_empty() {
        println!("No cache entries to clear.");
        return Ok(());
    }

    println!("This will remove {} director(ies):", paths.len());
    for path in &paths {
        println!("  {} {}", style("•").red(), path.display());
    }
    println!();

    if !skip_confirm {
        print!("Are you sure? [y/N] ");
        let _ = io::stdout().flush();

        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() {
            println!("Failed to read input, aborting.");
            return Ok(());
        }

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    print!("Clearing caches... ");
    let _ = io::stdout().flush();

    let removed = remove_all(&paths).await?;
    println!("{} cleared {} director(ies)", style("✓").green(), removed);

    Ok(())
}

async fn remove_all(paths: &[PathBuf]) -> BookpubResult<usize> {
    let mut removed = 0;
    for path in paths {
        debug!("Removing {}", path.display());
        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(BookpubError::io(format!("removing {}", path.display()), e));
            }
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use std::fs;
    use tempfile::TempDir;

    fn config_in(temp: &TempDir) -> Config {
        let mut config = Config::default();
        config.storage.checkout_root = temp.path().join("checkouts");
        config.storage.built_sites_root = temp.path().join("sites");
        config
    }

    fn make_dir(root: &Path, name: &str) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("file"), b"content").unwrap();
        dir
    }

    #[test]
    fn collects_both_roots() {
        let temp = TempDir::new().unwrap();
        let config = config_in(&temp);
        make_dir(&config.storage.checkout_root, "aaa");
        make_dir(&config.storage.built_sites_root, "bbb");
        make_dir(&config.storage.built_sites_root, ".staging-bbb-1");

        let entries = collect_entries(&config).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, CacheKind::Checkout);
        assert_eq!(entries[1].kind, CacheKind::Site);
        assert_eq!(entries[1].key, "bbb");
    }

    #[test]
    fn missing_roots_have_no_entries() {
        let temp = TempDir::new().unwrap();
        assert!(collect_entries(&config_in(&temp)).unwrap().is_empty());
    }

    #[test]
    fn stale_filter_uses_age() {
        let temp = TempDir::new().unwrap();
        let config = config_in(&temp);
        make_dir(&config.storage.checkout_root, "fresh");
        make_dir(&config.storage.checkout_root, "old");

        let mut entries = collect_entries(&config).unwrap();
        entries[1].modified = Utc::now() - Duration::days(45);

        let stale = stale_entries(entries, 30);
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].key, "old");
    }

    #[test]
    fn clear_targets_include_staging() {
        let temp = TempDir::new().unwrap();
        let config = config_in(&temp);
        make_dir(&config.storage.checkout_root, "aaa");
        make_dir(&config.storage.checkout_root, ".fetch-aaa-1");
        make_dir(&config.storage.built_sites_root, "bbb");

        let checkouts_only = clear_targets(&config, true, false).unwrap();
        assert_eq!(checkouts_only.len(), 2);
        assert!(checkouts_only
            .iter()
            .all(|p| p.starts_with(&config.storage.checkout_root)));

        assert_eq!(clear_targets(&config, true, true).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn clear_with_confirmation_skipped_removes_everything() {
        let temp = TempDir::new().unwrap();
        let config = config_in(&temp);
        let site = make_dir(&config.storage.built_sites_root, "bbb");
        let checkout = make_dir(&config.storage.checkout_root, "aaa");

        clear_entries(&config, false, true, true).await.unwrap();
        assert!(!site.exists());
        assert!(checkout.exists());
    }

    #[tokio::test]
    async fn gc_disabled_with_zero_days() {
        let temp = TempDir::new().unwrap();
        let config = config_in(&temp);
        let checkout = make_dir(&config.storage.checkout_root, "aaa");

        gc_entries(&config, Some(0), false).await.unwrap();
        assert!(checkout.exists());
    }
}
