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


//! Worker pool for watch mode
//!
//! # Architecture
//! ```text
//! DispatchQueue ──pull──> worker 1 ─┐
//!               ──pull──> worker 2 ─┼──> FileProcessor ──> StateStore
//!               ──pull──> worker N ─┘          │
//!                                              └──> BookConverter
//! ```
//!
//! # Per-file flow
//! 1. Normalize the path
//! 2. Skip if the state store says `PROCESSED`
//! 3. Skip if another worker of this process already has it
//! 4. Record `DISCOVERED` for unseen paths
//! 5. Claim it (`PROCESSING`), refused if someone else finished it meanwhile
//! 6. Convert
//! 7. Record `PROCESSED` or `ERROR` with `end_date`

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Local;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::convert::options::{BookContext, ConvertOptions};
use crate::convert::pipeline::BookConverter;
use crate::error::{ChapterizeError, Result};
use crate::file::paths::normalize_path;
use crate::queue::dispatch::DispatchQueue;
use crate::storage::models::{FileStatus, StateUpdate};
use crate::storage::state::StateStore;

/// How long a worker waits on the queue before re-checking for shutdown
pub const PULL_TIMEOUT: Duration = Duration::from_millis(250);

/// What happened to one dequeued path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Processed,
    Failed,
    /// Already `PROCESSED`, in flight elsewhere, or claimed by another writer
    Skipped,
}

/// Runs one file through state bookkeeping and conversion
///
/// Shared by every worker of a pool.
pub struct FileProcessor {
    store: StateStore,
    converter: BookConverter,
    options: ConvertOptions,
    inflight: Mutex<HashSet<PathBuf>>,
}

impl FileProcessor {
    pub fn new(store: StateStore, converter: BookConverter, options: ConvertOptions) -> Self {
        Self {
            store,
            converter,
            options,
            inflight: Mutex::new(HashSet::new()),
        }
    }

    /// Process one dequeued path
    ///
    /// # Errors
    /// Only errors that must stop the whole run are returned. Everything else
    /// is logged, recorded in the state store and reported as
    /// [`Outcome::Failed`].
    pub async fn process(&self, path: &Path, cancel: &CancellationToken) -> Result<Outcome> {
        let path = match normalize_path(path) {
            Ok(path) => path,
            Err(e) => {
                tracing::error!(file = %path.display(), error = %e, "Cannot normalize path");
                return Ok(Outcome::Failed);
            }
        };
        let ctx = BookContext::for_path(&path);

        match self.blocking_state(&path, |store, p| store.should_process(p)).await {
            Ok(false) => {
                tracing::debug!(book = %ctx, "Already processed, skipping");
                return Ok(Outcome::Skipped);
            }
            Ok(true) => {}
            Err(e) => {
                tracing::error!(book = %ctx, error = %e, "Cannot read state, skipping");
                return Ok(Outcome::Skipped);
            }
        }

        let Some(_guard) = InflightGuard::acquire(&self.inflight, &path) else {
            tracing::debug!(book = %ctx, "Already in flight, skipping");
            return Ok(Outcome::Skipped);
        };

        if let Err(e) = self.blocking_state(&path, |store, p| store.discover(p)).await {
            tracing::warn!(book = %ctx, error = %e, "Cannot record discovery");
        }

        match self.blocking_state(&path, |store, p| store.claim(p)).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(book = %ctx, "Processed by another writer, skipping");
                return Ok(Outcome::Skipped);
            }
            Err(e) => {
                tracing::error!(book = %ctx, error = %e, "Cannot claim file, skipping");
                return Ok(Outcome::Skipped);
            }
        }

        tracing::info!(book = %ctx, file = %path.display(), "Processing");
        let result = self
            .converter
            .convert(&self.options.for_file(path.clone()), &ctx, cancel)
            .await;

        let (status, outcome, fatal) = match result {
            Ok(_) => (FileStatus::Processed, Outcome::Processed, None),
            Err(e) => {
                tracing::error!(book = %ctx, "{}", e.user_message());
                tracing::debug!(book = %ctx, error = ?e, "Full error");
                let fatal = e.is_fatal_for_run().then_some(e);
                (FileStatus::Error, Outcome::Failed, fatal)
            }
        };

        let update = StateUpdate::new().status(status).end_date(Local::now());
        if let Err(e) = self
            .blocking_state(&path, move |store, p| store.update(p, &update))
            .await
        {
            tracing::error!(book = %ctx, error = %e, %status, "Cannot record final state");
        }

        match fatal {
            Some(e) => Err(e),
            None => Ok(outcome),
        }
    }

    /// Run a state store call on the blocking pool
    async fn blocking_state<T, F>(&self, path: &Path, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&StateStore, &Path) -> Result<T> + Send + 'static,
    {
        let store = self.store.clone();
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || op(&store, &path)).await?
    }
}

/// Removes a path from the in-flight set when dropped
struct InflightGuard<'a> {
    set: &'a Mutex<HashSet<PathBuf>>,
    path: PathBuf,
}

impl<'a> InflightGuard<'a> {
    fn acquire(set: &'a Mutex<HashSet<PathBuf>>, path: &Path) -> Option<Self> {
        let mut inflight = set.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !inflight.insert(path.to_path_buf()) {
            return None;
        }
        Some(Self {
            set,
            path: path.to_path_buf(),
        })
    }
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        let mut inflight = self.set.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        inflight.remove(&self.path);
    }
}

/// Fixed-size pool of long-lived workers
pub struct WorkerPool {
    handles: Vec<JoinHandle<Result<()>>>,
}

impl WorkerPool {
    /// Spawn `size` workers pulling from `queue`
    ///
    /// Workers stop pulling once `cancel` fires. A worker that hits an error
    /// fatal for the run cancels `cancel` itself so its siblings stop too.
    pub fn start(
        size: usize,
        queue: DispatchQueue,
        processor: Arc<FileProcessor>,
        cancel: CancellationToken,
    ) -> Self {
        let size = size.max(1);
        tracing::info!(workers = size, "Starting worker pool");

        let handles = (0..size)
            .map(|id| {
                let queue = queue.clone();
                let processor = processor.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move { worker_loop(id, queue, processor, cancel).await })
            })
            .collect();

        Self { handles }
    }

    /// `true` while at least one worker is still running
    pub fn is_alive(&self) -> bool {
        self.handles.iter().any(|handle| !handle.is_finished())
    }

    /// Wait for every worker, returning the first error any of them hit
    pub async fn join(self) -> Result<()> {
        let mut first_error = None;

        for handle in self.handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(ChapterizeError::from(e)),
            };
            if let Err(e) = result {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

async fn worker_loop(
    id: usize,
    queue: DispatchQueue,
    processor: Arc<FileProcessor>,
    cancel: CancellationToken,
) -> Result<()> {
    tracing::debug!(worker = id, "Worker started");

    while !cancel.is_cancelled() {
        let Some(path) = queue.pull(PULL_TIMEOUT).await else {
            continue;
        };

        if let Err(e) = processor.process(&path, &cancel).await {
            tracing::error!(worker = id, error = %e, "Stopping run");
            cancel.cancel();
            return Err(e);
        }
    }

    tracing::debug!(worker = id, "Worker stopped");
    Ok(())
}
