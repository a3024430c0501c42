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


//! Input and output directory checks
//!
//! Input checks run in a fixed order: known extension, exists, is a regular
//! file, readable. The output directory check creates the author and title
//! subdirectories as needed and may be repeated safely.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::audio::format::InputFormat;
use crate::error::{ChapterizeError, Result};
use crate::file::paths::sanitize_dir_name;

static WRITE_PROBE_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Check the input file and return its detected format
pub fn validate_input(input: &Path) -> Result<InputFormat> {
    let format = InputFormat::from_path(input)?;

    if !input.exists() {
        return Err(ChapterizeError::FileNotFound(input.to_path_buf()));
    }
    if !input.is_file() {
        return Err(ChapterizeError::NotAFile(input.to_path_buf()));
    }
    if File::open(input).is_err() {
        return Err(ChapterizeError::FileNotReadable(input.to_path_buf()));
    }

    Ok(format)
}

/// Resolve (and create) the directory a book's files are written to
///
/// `author_dir` / `title_dir` are the raw names to nest under `base`, or
/// `None` when that level is disabled. Names are sanitized so they always
/// form a single path component.
pub fn validate_output_dir(
    base: &Path,
    author_dir: Option<&str>,
    title_dir: Option<&str>,
) -> Result<PathBuf> {
    if !base.is_dir() {
        return Err(ChapterizeError::NotADirectory(base.to_path_buf()));
    }
    ensure_writable(base)?;

    let mut dir = base.to_path_buf();
    for name in [author_dir, title_dir].into_iter().flatten() {
        dir.push(sanitize_dir_name(name));

        if dir.exists() {
            if !dir.is_dir() {
                return Err(ChapterizeError::NotADirectory(dir));
            }
        } else {
            std::fs::create_dir_all(&dir)?;
            tracing::debug!(dir = %dir.display(), "Created output directory");
        }

        ensure_writable(&dir)?;
    }

    Ok(dir)
}

/// Prove `dir` is writable by creating and removing a scratch file
fn ensure_writable(dir: &Path) -> Result<()> {
    let probe = dir.join(format!(
        ".chapterize-write-{}-{}",
        std::process::id(),
        WRITE_PROBE_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    match OpenOptions::new().write(true).create_new(true).open(&probe) {
        Ok(file) => {
            drop(file);
            let _ = std::fs::remove_file(&probe);
            Ok(())
        }
        Err(_) => Err(ChapterizeError::DirectoryNotWritable(dir.to_path_buf())),
    }
}
