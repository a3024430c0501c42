// Chapterize - Audible audiobook chapter splitter
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Detects when newly deposited files have finished arriving
//!
//! A file counts as stable once two size samples taken one poll interval
//! apart are equal. Files already present at start-up are reported right
//! away.
//!
//! # Start-up order
//! 1. Install the recursive watch
//! 2. Walk the tree and report existing candidates
//! 3. Handle events until cancelled
//!
//! Installing the watch before the walk means a file landing in between is
//! seen at least once. It may be seen twice; downstream state handles that.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::{ChapterizeError, Result};
use crate::file::scanner::{scan_candidates, CandidateFilter};

/// Receives files once they have stopped growing
pub trait StabilityListener: Send + Sync {
    fn file_stabilized(&self, path: PathBuf);
}

pub struct StabilityDetector {
    root: PathBuf,
    filter: CandidateFilter,
    poll_interval: Duration,
    listener: Arc<dyn StabilityListener>,
}

impl StabilityDetector {
    pub fn new(
        root: impl Into<PathBuf>,
        filter: CandidateFilter,
        poll_interval: Duration,
        listener: Arc<dyn StabilityListener>,
    ) -> Self {
        Self {
            root: root.into(),
            filter,
            poll_interval,
            listener,
        }
    }

    /// Watch until `cancel` fires
    ///
    /// # Errors
    /// Fails if the watch cannot be installed, or with `ComponentStopped`
    /// if the event source goes away on its own.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<Event, notify::Error>| match res {
                Ok(event) => {
                    let _ = event_tx.send(event);
                }
                Err(e) => tracing::warn!(error = %e, "Watch error"),
            },
            Config::default(),
        )?;
        watcher.watch(&self.root, RecursiveMode::Recursive)?;
        tracing::info!(root = %self.root.display(), "Watching");

        let existing = {
            let root = self.root.clone();
            let filter = self.filter.clone();
            tokio::task::spawn_blocking(move || scan_candidates(&root, &filter)).await?
        };
        tracing::debug!(count = existing.len(), "Initial scan finished");
        for path in existing {
            self.listener.file_stabilized(path);
        }

        let polling: Arc<Mutex<HashSet<PathBuf>>> = Arc::new(Mutex::new(HashSet::new()));
        let mut polls = JoinSet::new();

        let result = loop {
            tokio::select! {
                _ = cancel.cancelled() => break Ok(()),

                event = event_rx.recv() => {
                    let Some(event) = event else {
                        break Err(ChapterizeError::ComponentStopped("file watcher"));
                    };
                    for path in self.candidates_in(event) {
                        if !mark_polling(&polling, &path) {
                            tracing::trace!(file = %path.display(), "Already polling");
                            continue;
                        }
                        tracing::debug!(file = %path.display(), "New candidate");
                        polls.spawn(poll_until_stable(
                            path,
                            self.poll_interval,
                            self.listener.clone(),
                            polling.clone(),
                        ));
                    }
                }

                Some(_) = polls.join_next(), if !polls.is_empty() => {}
            }
        };

        polls.abort_all();
        drop(watcher);
        tracing::info!(root = %self.root.display(), "Stopped watching");
        result
    }

    /// Candidate paths carried by a create or rename-into event
    fn candidates_in(&self, event: Event) -> Vec<PathBuf> {
        let paths = match event.kind {
            EventKind::Create(_) => event.paths,
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event.paths,
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                event.paths.into_iter().last().into_iter().collect()
            }
            _ => return Vec::new(),
        };

        paths
            .into_iter()
            .filter(|p| self.filter.matches(p) && !p.is_dir())
            .collect()
    }
}

fn mark_polling(polling: &Mutex<HashSet<PathBuf>>, path: &Path) -> bool {
    polling
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .insert(path.to_path_buf())
}

async fn poll_until_stable(
    path: PathBuf,
    interval: Duration,
    listener: Arc<dyn StabilityListener>,
    polling: Arc<Mutex<HashSet<PathBuf>>>,
) {
    let result = wait_for_stable_size(&path, interval).await;

    polling
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .remove(&path);

    match result {
        Ok(size) => {
            tracing::debug!(file = %path.display(), size, "Stable");
            listener.file_stabilized(path);
        }
        Err(e) => {
            tracing::debug!(file = %path.display(), error = %e, "Abandoned");
        }
    }
}

/// Sample the size every `interval` until two samples agree
async fn wait_for_stable_size(path: &Path, interval: Duration) -> std::io::Result<u64> {
    let mut last = tokio::fs::metadata(path).await?.len();
    loop {
        tokio::time::sleep(interval).await;
        let size = tokio::fs::metadata(path).await?.len();
        if size == last {
            return Ok(size);
        }
        tracing::trace!(file = %path.display(), size, "Still growing");
        last = size;
    }
}
