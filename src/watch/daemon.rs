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


//! Watch-mode supervisor
//!
//! # Lifecycle
//! ```text
//! check root ─> check engine ─> wait for auth ─> start detector ─> start pool
//!                                                       │
//!                          ┌──── every second ──────────┘
//!                          ▼
//!            detector or pool gone? ──yes──> stop with error
//!                          │
//!                  shutdown requested ──> cancel ─> join detector ─> join pool
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::convert::options::ConvertOptions;
use crate::convert::pipeline::BookConverter;
use crate::crypto::auth::AuthFile;
use crate::error::{ChapterizeError, Result};
use crate::file::scanner::CandidateFilter;
use crate::queue::dispatch::DispatchQueue;
use crate::queue::worker::{FileProcessor, WorkerPool};
use crate::storage::state::StateStore;
use crate::watch::detector::StabilityDetector;

/// How often the supervisor checks on its components
pub const LIVENESS_INTERVAL: Duration = Duration::from_secs(1);

/// Poll interval while waiting for the auth file
pub const AUTH_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct WatchSettings {
    pub root: PathBuf,
    pub options: ConvertOptions,
    pub threads: usize,
    /// Quiescence window of the stability detector
    pub interval: Duration,
}

pub struct Daemon {
    settings: WatchSettings,
    converter: BookConverter,
    filter: CandidateFilter,
    queue: DispatchQueue,
}

impl Daemon {
    pub fn new(settings: WatchSettings, converter: BookConverter) -> Result<Self> {
        Ok(Self {
            settings,
            converter,
            filter: CandidateFilter::aax()?,
            queue: DispatchQueue::new(),
        })
    }

    /// The queue between detector and workers
    pub fn queue(&self) -> &DispatchQueue {
        &self.queue
    }

    /// Run until `shutdown` fires or a component stops
    ///
    /// Returns `Ok(())` on a requested shutdown, including one requested
    /// while still waiting for the auth file.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let root = &self.settings.root;
        let options = &self.settings.options;

        if !root.is_dir() {
            return Err(ChapterizeError::NotADirectory(root.clone()));
        }
        if !options.output_dir.is_dir() {
            return Err(ChapterizeError::NotADirectory(options.output_dir.clone()));
        }

        self.converter.check_engine().await?;

        if options.activation_bytes.is_none() {
            let auth = AuthFile::in_dir(&options.output_dir);
            if !auth.wait_until_present(AUTH_POLL_INTERVAL, &shutdown).await {
                tracing::info!("Interrupted while waiting for auth file");
                return Ok(());
            }
        }

        let cancel = shutdown.child_token();

        let detector = StabilityDetector::new(
            root.clone(),
            self.filter.clone(),
            self.settings.interval,
            Arc::new(self.queue.clone()),
        );
        let detector_handle = tokio::spawn(detector.run(cancel.clone()));

        let processor = Arc::new(FileProcessor::new(
            StateStore::in_dir(&options.output_dir),
            self.converter.clone(),
            options.clone(),
        ));
        let pool = WorkerPool::start(
            self.settings.threads,
            self.queue.clone(),
            processor,
            cancel.clone(),
        );

        let mut stopped = None;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(LIVENESS_INTERVAL) => {
                    if detector_handle.is_finished() {
                        tracing::error!("Stability detector stopped unexpectedly");
                        stopped = Some(ChapterizeError::ComponentStopped("stability detector"));
                        break;
                    }
                    if !pool.is_alive() {
                        tracing::error!("Worker pool stopped unexpectedly");
                        stopped = Some(ChapterizeError::ComponentStopped("worker pool"));
                        break;
                    }
                }
            }
        }

        tracing::info!("Shutting down");
        cancel.cancel();

        let detector_result = match detector_handle.await {
            Ok(result) => result,
            Err(e) => Err(ChapterizeError::from(e)),
        };
        let pool_result = pool.join().await;

        tracing::info!(enqueued = self.queue.total_enqueued(), "Stopped");

        // A worker's fatal error explains everything else that stopped
        pool_result?;
        detector_result?;
        match stopped {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
