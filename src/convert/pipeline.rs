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


//! Single-book conversion
//!
//! # Stages
//! ```text
//! VALIDATE_INPUT → PROBE_METADATA → VALIDATE_OUTPUT_DIR → EXPORT_COVER → EXPORT_CHAPTERS → DONE
//! ```
//! Any stage may fail, which ends the attempt. Tracks already written by
//! `EXPORT_CHAPTERS` are left in place; a later attempt overwrites them.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::audio::engine::{ChapterExport, MediaEngine};
use crate::audio::metadata::MetaData;
use crate::convert::options::{BookContext, ParseConfig};
use crate::convert::validate::{validate_input, validate_output_dir};
use crate::crypto::{AuthFile, KeyResolver};
use crate::error::{ChapterizeError, Result};
use crate::file::paths::{track_file_name, COVER_FILE_NAME};

/// Pipeline stage, used for logging where an attempt stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ValidateInput,
    ProbeMetadata,
    ValidateOutputDir,
    ExportCover,
    ExportChapters,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ValidateInput => "VALIDATE_INPUT",
            Stage::ProbeMetadata => "PROBE_METADATA",
            Stage::ValidateOutputDir => "VALIDATE_OUTPUT_DIR",
            Stage::ExportCover => "EXPORT_COVER",
            Stage::ExportChapters => "EXPORT_CHAPTERS",
            Stage::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// What a successful conversion produced
#[derive(Debug, Clone)]
pub struct ConversionReport {
    pub output_dir: PathBuf,
    pub author: String,
    pub title: String,
    /// `None` when cover export failed under `force`
    pub cover: Option<PathBuf>,
    pub tracks: Vec<PathBuf>,
}

/// Runs the conversion stages for one book at a time
#[derive(Clone)]
pub struct BookConverter {
    engine: Arc<dyn MediaEngine>,
}

impl BookConverter {
    pub fn new(engine: Arc<dyn MediaEngine>) -> Self {
        Self { engine }
    }

    /// Fail with `FfmpegNotFound` before any work if the engine is missing
    pub async fn check_engine(&self) -> Result<()> {
        self.engine.check_available().await
    }

    /// Convert one book
    ///
    /// `cancel` is checked between engine invocations; a running FFmpeg
    /// process is never interrupted.
    pub async fn convert(
        &self,
        config: &ParseConfig,
        ctx: &BookContext,
        cancel: &CancellationToken,
    ) -> Result<ConversionReport> {
        let mut stage = Stage::ValidateInput;
        let result = self.run_stages(config, ctx, cancel, &mut stage).await;

        match &result {
            Ok(report) => {
                tracing::info!(book = %ctx, tracks = report.tracks.len(), "Done");
            }
            Err(e) => {
                tracing::debug!(book = %ctx, %stage, error = ?e, "Conversion stopped");
            }
        }

        result
    }

    async fn run_stages(
        &self,
        config: &ParseConfig,
        ctx: &BookContext,
        cancel: &CancellationToken,
        stage: &mut Stage,
    ) -> Result<ConversionReport> {
        let options = &config.options;
        let input = config.input.as_path();

        // VALIDATE_INPUT
        *stage = Stage::ValidateInput;
        let format = validate_input(input)?;
        tracing::debug!(book = %ctx, %format, "Input validated");

        // PROBE_METADATA
        *stage = Stage::ProbeMetadata;
        check_cancelled(cancel)?;
        let mut meta = if format.is_encrypted() {
            let resolver = KeyResolver::new(
                options.activation_bytes.clone(),
                AuthFile::in_dir(&options.output_dir),
            );
            let resolved = resolver.resolve(self.engine.as_ref(), input).await?;
            tracing::debug!(book = %ctx, key = %resolved.key, attempts = resolved.attempts, "Activation bytes found");
            MetaData::from_probe(input, resolved.probe, Some(resolved.key))
        } else {
            let probe = self.engine.probe(input, None).await?;
            MetaData::from_probe(input, probe, None)
        };
        meta.apply_overrides(options.author.as_deref(), options.title.as_deref());
        tracing::info!(book = %ctx, author = %meta.author, title = %meta.title, chapters = meta.chapters.len(), "Probed");

        // VALIDATE_OUTPUT_DIR
        *stage = Stage::ValidateOutputDir;
        let output_dir = validate_output_dir(
            &options.output_dir,
            options.use_author_dir.then_some(meta.author.as_str()),
            options.use_title_dir.then_some(meta.title.as_str()),
        )?;
        tracing::debug!(book = %ctx, dir = %output_dir.display(), "Output directory ready");

        // EXPORT_COVER
        *stage = Stage::ExportCover;
        check_cancelled(cancel)?;
        let cover_path = output_dir.join(COVER_FILE_NAME);
        let cover = match self
            .engine
            .extract_cover(input, meta.key.as_ref(), &cover_path)
            .await
        {
            Ok(()) => Some(cover_path),
            Err(e) => {
                let err = ChapterizeError::CoverExportFailed {
                    file: input.to_path_buf(),
                    source: Box::new(e),
                };
                if options.force && !err.is_fatal_for_run() {
                    tracing::warn!(book = %ctx, error = %err, "Continuing without cover art");
                    None
                } else {
                    return Err(err);
                }
            }
        };

        // EXPORT_CHAPTERS
        *stage = Stage::ExportChapters;
        if meta.chapters.is_empty() {
            tracing::warn!(book = %ctx, "No chapters found");
        }

        let total = meta.chapters.len();
        let mut tracks = Vec::with_capacity(total);
        for (index, chapter) in meta.chapters.iter().enumerate() {
            check_cancelled(cancel)?;

            let track = index + 1;
            let export = ChapterExport {
                output: output_dir.join(track_file_name(track, total, &chapter.title)),
                start: chapter.start.clone(),
                end: chapter.end.clone(),
                title: chapter.title.clone(),
                track,
                album: meta.title.clone(),
                artist: meta.author.clone(),
            };

            tracing::info!(book = %ctx, "Exporting chapter {}/{}: {}", track, total, chapter.title);
            self.engine
                .export_chapter(input, meta.key.as_ref(), &export)
                .await
                .map_err(|e| ChapterizeError::ChapterExportFailed {
                    track,
                    title: chapter.title.clone(),
                    source: Box::new(e),
                })?;
            tracks.push(export.output);
        }

        *stage = Stage::Done;
        Ok(ConversionReport {
            output_dir,
            author: meta.author,
            title: meta.title,
            cover,
            tracks,
        })
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(ChapterizeError::Cancelled)
    } else {
        Ok(())
    }
}
