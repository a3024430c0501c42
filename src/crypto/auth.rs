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


//! Cached activation bytes from the auth file
//!
//! The login flow that talks to Audible is not part of this crate. It leaves
//! its result in `<output_dir>/.auth`; the first line holds the activation
//! bytes (optionally a comma separated list).

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{ChapterizeError, Result};

pub const AUTH_FILE_NAME: &str = ".auth";

/// Handle to the auth file of an output directory
#[derive(Debug, Clone)]
pub struct AuthFile {
    path: PathBuf,
}

impl AuthFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The auth file living in `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(AUTH_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// First line of the auth file, trimmed
    ///
    /// Returns `Ok(None)` when the file is missing or the line is blank.
    pub fn read_activation_bytes(&self) -> Result<Option<String>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ChapterizeError::ConfigurationError(format!(
                    "Failed to read auth file {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        Ok(content
            .lines()
            .next()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string))
    }

    /// Block until the auth file exists, polling every `poll`
    ///
    /// Logs a single warning while waiting. Returns `false` if cancelled first.
    pub async fn wait_until_present(&self, poll: Duration, cancel: &CancellationToken) -> bool {
        if self.exists() {
            return true;
        }

        tracing::warn!(path = %self.path.display(), "Waiting for auth file to be created");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(poll) => {
                    if self.exists() {
                        tracing::info!(path = %self.path.display(), "Auth file found");
                        return true;
                    }
                }
            }
        }
    }
}
