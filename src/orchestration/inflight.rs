//! Shared state of one running build
//!
//! Every requester of a render key that is being built subscribes to the same
//! [`InflightBuild`]. A subscription replays the log written so far, follows
//! new lines live and finally yields the single outcome of the build.

use crate::error::{BookpubError, BookpubResult};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, watch};
use tracing::warn;

/// Live lines buffered per subscriber before it starts lagging
const LIVE_LOG_CAPACITY: usize = 1024;

/// Result of a build: the published site, or the failure shared by all waiters
pub type BuildOutcome = Result<PathBuf, Arc<BookpubError>>;

pub(crate) struct InflightBuild {
    history: Mutex<Vec<String>>,
    live: broadcast::Sender<String>,
    outcome: watch::Sender<Option<BuildOutcome>>,
}

impl InflightBuild {
    pub(crate) fn new() -> Self {
        let (live, _) = broadcast::channel(LIVE_LOG_CAPACITY);
        let (outcome, _) = watch::channel(None);
        Self {
            history: Mutex::new(Vec::new()),
            live,
            outcome,
        }
    }

    fn history(&self) -> MutexGuard<'_, Vec<String>> {
        self.history.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a log line and send it to current subscribers
    pub(crate) fn push_line(&self, line: String) {
        let mut history = self.history();
        history.push(line.clone());
        // No receivers is fine; later subscribers replay the history
        let _ = self.live.send(line);
    }

    pub(crate) fn subscribe(&self) -> BuildSubscription {
        // Holding the history lock while subscribing means no line is both
        // replayed and received live, and none is missed.
        let history = self.history();
        BuildSubscription {
            backlog: history.iter().cloned().collect(),
            live: self.live.subscribe(),
            outcome: self.outcome.subscribe(),
            finished: false,
        }
    }

    pub(crate) fn finish(&self, outcome: BuildOutcome) {
        self.outcome.send_replace(Some(outcome));
    }
}

/// A requester's view of a running build
pub struct BuildSubscription {
    backlog: VecDeque<String>,
    live: broadcast::Receiver<String>,
    outcome: watch::Receiver<Option<BuildOutcome>>,
    finished: bool,
}

enum Next {
    Line(String),
    Skip,
    End,
    Finished,
}

impl BuildSubscription {
    /// Next build log line, or `None` once the build has finished and every
    /// line was delivered
    pub async fn next_line(&mut self) -> Option<String> {
        if let Some(line) = self.backlog.pop_front() {
            return Some(line);
        }

        loop {
            let next = if self.finished {
                // Lines are always pushed before the outcome is set, so
                // whatever is left is already buffered.
                match self.live.try_recv() {
                    Ok(line) => Next::Line(line),
                    Err(TryRecvError::Lagged(skipped)) => {
                        warn!("Build log subscriber skipped {} lines", skipped);
                        Next::Skip
                    }
                    Err(_) => Next::End,
                }
            } else {
                tokio::select! {
                    biased;
                    received = self.live.recv() => match received {
                        Ok(line) => Next::Line(line),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("Build log subscriber skipped {} lines", skipped);
                            Next::Skip
                        }
                        Err(RecvError::Closed) => Next::End,
                    },
                    _ = self.outcome.wait_for(Option::is_some) => Next::Finished,
                }
            };

            match next {
                Next::Line(line) => return Some(line),
                Next::Skip => continue,
                Next::End => return None,
                Next::Finished => self.finished = true,
            }
        }
    }

    /// Wait for the build to finish
    pub async fn wait(mut self) -> BookpubResult<PathBuf> {
        let outcome = self
            .outcome
            .wait_for(Option::is_some)
            .await
            .map(|current| Option::clone(&current))
            .map_err(|_| BookpubError::Internal("build task ended without an outcome".to_string()))?;

        match outcome {
            Some(Ok(path)) => Ok(path),
            Some(Err(e)) => Err(BookpubError::Shared(e)),
            None => Err(BookpubError::Internal(
                "build task ended without an outcome".to_string(),
            )),
        }
    }

    /// Drain the remaining log, then wait for the outcome
    pub async fn collect(mut self) -> (Vec<String>, BookpubResult<PathBuf>) {
        let mut lines = Vec::new();
        while let Some(line) = self.next_line().await {
            lines.push(line);
        }
        (lines, self.wait().await)
    }
}
