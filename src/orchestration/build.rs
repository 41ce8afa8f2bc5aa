//! Site generator invocation
//!
//! A build never touches the checkout. The checkout is copied into a scratch
//! directory, the generator runs there and the caller publishes the output
//! directory it reports.

use crate::config::schema::BuildConfig;
use crate::error::{BookpubError, BookpubResult};
use crate::orchestration::{build_error_output, stream_child_output};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};
use walkdir::WalkDir;

/// How deep below the checkout root to look for a build config file
const BUILD_ROOT_MAX_DEPTH: usize = 2;

/// Runs the configured site generator
pub struct BuildTool {
    config: BuildConfig,
}

impl BuildTool {
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    /// Build `checkout` for `base_url` inside `scratch`.
    ///
    /// Every output line of the generator is passed to `on_line`. Returns the
    /// output directory, which lives inside `scratch`.
    pub async fn build(
        &self,
        checkout: &Path,
        scratch: &Path,
        base_url: &str,
        on_line: &(dyn Fn(String) + Send + Sync),
    ) -> BookpubResult<PathBuf> {
        copy_tree(checkout, scratch).await?;

        let root = match locate_build_root(scratch, &self.config.config_files) {
            Some(root) => root,
            None => {
                info!("No build config found, initializing");
                let (status, lines) = self
                    .run(&self.config.init_command, "build.init_command", scratch, base_url, on_line)
                    .await?;
                if !status.success() {
                    return Err(BookpubError::BuildInit {
                        output: build_error_output(&lines),
                    });
                }
                scratch.to_path_buf()
            }
        };

        debug!("Building in {}", root.display());
        let (status, lines) = self
            .run(&self.config.command, "build.command", &root, base_url, on_line)
            .await?;
        if !status.success() {
            return Err(BookpubError::BuildFailed {
                code: status.code(),
                output: build_error_output(&lines),
            });
        }

        let output = root.join(&self.config.output_dir);
        if !output.is_dir() {
            return Err(BookpubError::BuildOutputMissing(output));
        }
        Ok(output)
    }

    async fn run(
        &self,
        argv: &[String],
        setting: &str,
        cwd: &Path,
        base_url: &str,
        on_line: &(dyn Fn(String) + Send + Sync),
    ) -> BookpubResult<(ExitStatus, Vec<String>)> {
        let Some((program, args)) = argv.split_first() else {
            return Err(BookpubError::User(format!("{} is empty", setting)));
        };
        let command_line = argv.join(" ");
        debug!("Executing: {}", command_line);

        let mut child = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .envs(&self.config.env)
            .env(&self.config.base_url_env, base_url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BookpubError::command_failed(&command_line, e))?;

        let secs = self.config.timeout_secs;
        let finished = tokio::time::timeout(Duration::from_secs(secs), async {
            let lines = stream_child_output(&mut child, on_line).await?;
            let status = child
                .wait()
                .await
                .map_err(|e| BookpubError::command_failed(&command_line, e))?;
            Ok::<_, BookpubError>((status, lines))
        })
        .await;

        match finished {
            Ok(result) => result,
            Err(_) => {
                let _ = child.kill().await;
                Err(BookpubError::BuildTimeout { secs })
            }
        }
    }
}

/// First directory at or below `dir` holding one of `config_files`
///
/// The root itself wins; otherwise sub-directories up to two levels deep are
/// checked in sorted order. Hidden directories are skipped.
pub fn locate_build_root(dir: &Path, config_files: &[String]) -> Option<PathBuf> {
    let has_config = |candidate: &Path| config_files.iter().any(|f| candidate.join(f).is_file());

    if has_config(dir) {
        return Some(dir.to_path_buf());
    }

    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(BUILD_ROOT_MAX_DEPTH)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !e.file_name().to_string_lossy().starts_with('.'))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.into_path())
        .find(|candidate| has_config(candidate))
}

/// Copy `src` into `dest` (created), leaving out the top-level `.git`
pub(crate) async fn copy_tree(src: &Path, dest: &Path) -> BookpubResult<()> {
    let (src, dest) = (src.to_path_buf(), dest.to_path_buf());
    tokio::task::spawn_blocking(move || copy_tree_blocking(&src, &dest))
        .await
        .map_err(|e| BookpubError::Internal(format!("copy task failed: {}", e)))?
}

fn copy_tree_blocking(src: &Path, dest: &Path) -> BookpubResult<()> {
    let walker = WalkDir::new(src)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !(e.depth() == 1 && e.file_name() == ".git"));

    for entry in walker {
        let entry = entry.map_err(|e| {
            BookpubError::io(format!("walking {}", src.display()), std::io::Error::from(e))
        })?;
        let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dest.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)
                .map_err(|e| BookpubError::io(format!("creating {}", target.display()), e))?;
        } else if file_type.is_file() {
            fs::copy(entry.path(), &target)
                .map_err(|e| BookpubError::io(format!("copying to {}", target.display()), e))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> BookpubResult<()> {
    let points_to = fs::read_link(link)
        .map_err(|e| BookpubError::io(format!("reading link {}", link.display()), e))?;
    std::os::unix::fs::symlink(points_to, target)
        .map_err(|e| BookpubError::io(format!("creating link {}", target.display()), e))
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, _target: &Path) -> BookpubResult<()> {
    debug!("Skipping symlink {}", link.display());
    Ok(())
}
