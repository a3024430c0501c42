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


//! Finding input files
//!
//! - Watch mode: candidate matching plus a recursive scan for books that
//!   were already sitting in the watch directory at start-up.
//! - Batch mode: shell-style glob expansion of the command-line arguments.

use std::path::{Path, PathBuf};

use regex::{Regex, RegexBuilder};
use walkdir::WalkDir;

use crate::error::{ChapterizeError, Result};

/// Default watch pattern: any file ending in `.aax`, case-insensitive
pub const DEFAULT_WATCH_PATTERN: &str = r"^.*\.aax$";

/// File name filter for watch candidates
#[derive(Debug, Clone)]
pub struct CandidateFilter {
    pattern: Regex,
}

impl CandidateFilter {
    /// Build a case-insensitive filter from a regular expression
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| {
                ChapterizeError::ConfigurationError(format!("Invalid watch pattern: {}", e))
            })?;
        Ok(Self { pattern })
    }

    /// The default `.aax` filter
    pub fn aax() -> Result<Self> {
        Self::new(DEFAULT_WATCH_PATTERN)
    }

    /// Does the file name of `path` match?
    pub fn matches(&self, path: &Path) -> bool {
        path.file_name()
            .map(|name| self.pattern.is_match(&name.to_string_lossy()))
            .unwrap_or(false)
    }
}

/// Recursively list candidate files under `root`, sorted by path
///
/// Unreadable entries are skipped.
pub fn scan_candidates(root: &Path, filter: &CandidateFilter) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| filter.matches(p))
        .collect();
    found.sort();
    found
}

/// Expand command-line patterns into file paths
///
/// Each argument is treated as a glob; matches keep argument order and are
/// sorted within one argument. A pattern matching nothing is logged and
/// skipped.
pub fn expand_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for pattern in patterns {
        let pattern = pattern.as_ref();
        let mut matched: Vec<PathBuf> = glob::glob(pattern)?
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    tracing::warn!(pattern, error = %e, "Skipping unreadable match");
                    None
                }
            })
            .collect();

        if matched.is_empty() {
            tracing::warn!(pattern, "No files match");
            continue;
        }

        matched.sort();
        files.extend(matched);
    }

    Ok(files)
}
