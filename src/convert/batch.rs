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


//! One-shot conversion of a list of files
//!
//! Files are converted one after another. A failure ends that file only;
//! the run goes on with the next one unless the failure is fatal for the
//! whole run (engine missing) or the run was cancelled.

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use crate::convert::options::{BookContext, ConvertOptions};
use crate::convert::pipeline::{BookConverter, ConversionReport};
use crate::error::{ChapterizeError, Result};

/// Outcome of a batch run
#[derive(Debug, Default)]
pub struct BatchReport {
    pub converted: Vec<(PathBuf, ConversionReport)>,
    pub failed: Vec<(PathBuf, ChapterizeError)>,
    /// Files never attempted because the run was cancelled
    pub skipped: Vec<PathBuf>,
}

/// Convert `files` in order
///
/// # Errors
/// Only errors that stop the whole run are returned (see
/// [`ChapterizeError::is_fatal_for_run`]); per-file errors are logged and
/// collected in the report.
pub async fn run_batch(
    converter: &BookConverter,
    options: &ConvertOptions,
    files: &[PathBuf],
    cancel: &CancellationToken,
) -> Result<BatchReport> {
    converter.check_engine().await?;

    let mut report = BatchReport::default();

    for (index, file) in files.iter().enumerate() {
        if cancel.is_cancelled() {
            report.skipped.extend(files[index..].iter().cloned());
            break;
        }

        let ctx = BookContext::for_path(file);
        tracing::info!(book = %ctx, file = %file.display(), "Converting");

        match converter.convert(&options.for_file(file), &ctx, cancel).await {
            Ok(result) => report.converted.push((file.clone(), result)),
            Err(e) if e.is_fatal_for_run() => return Err(e),
            Err(e) => {
                tracing::error!(book = %ctx, "{}", e.user_message());
                tracing::debug!(book = %ctx, error = ?e, "Full error");
                report.failed.push((file.clone(), e));
            }
        }
    }

    Ok(report)
}
