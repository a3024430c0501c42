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


//! Dispatch queue between the stability detector and the workers
//!
//! Unbounded FIFO, any number of producers and consumers. The same path may
//! be queued more than once; workers consult the state store to skip
//! duplicates.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};

use crate::error::{ChapterizeError, Result};
use crate::watch::detector::StabilityListener;

/// Multi-producer, multi-consumer FIFO of file paths
#[derive(Clone)]
pub struct DispatchQueue {
    tx: mpsc::UnboundedSender<PathBuf>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<PathBuf>>>,
    enqueued: Arc<AtomicU64>,
}

impl DispatchQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            enqueued: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Append a path
    pub fn push(&self, path: PathBuf) -> Result<()> {
        self.tx
            .send(path)
            .map_err(|_| ChapterizeError::internal("dispatch queue is closed"))?;
        self.enqueued.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Take the oldest path, waiting at most `timeout`
    ///
    /// Returns `None` when nothing arrived in time.
    pub async fn pull(&self, timeout: Duration) -> Option<PathBuf> {
        tokio::time::timeout(timeout, async {
            let mut rx = self.rx.lock().await;
            rx.recv().await
        })
        .await
        .ok()
        .flatten()
    }

    /// Number of paths ever pushed
    pub fn total_enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::SeqCst)
    }
}

impl Default for DispatchQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl StabilityListener for DispatchQueue {
    fn file_stabilized(&self, path: PathBuf) {
        tracing::info!(file = %path.display(), "Queued");
        if let Err(e) = self.push(path) {
            tracing::error!(error = %e, "Failed to queue file");
        }
    }
}
