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


//! External media engine (FFmpeg / FFprobe)
//!
//! All transcoding work happens in child processes. The [`MediaEngine`] trait
//! is the seam between the pipeline and those processes; [`FfmpegEngine`] is
//! the real implementation.
//!
//! # Error classification
//! - Binary missing (spawn fails with `NotFound`) → `FfmpegNotFound`
//! - Stderr containing `mismatch in checksums` → `ActivationBytesMismatch`
//! - Any other non-zero exit → `FfmpegError` carrying stderr
//!
//! # Commands
//! ```text
//! ffprobe -v error -print_format json -show_format -show_chapters [-activation_bytes K] -i in
//! ffmpeg -y [-activation_bytes K] -i in -an -vcodec copy out/cover.jpg
//! ffmpeg -y [-activation_bytes K] -i in -vn -codec:a libmp3lame -ss S -to E
//!        -map_metadata 0 -map_chapters -1 -id3v2_version 3
//!        -metadata title=.. -metadata track=N -metadata album=.. -metadata artist=.. out.mp3
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use async_trait::async_trait;
use tokio::process::Command;

use crate::audio::metadata::ProbeOutput;
use crate::crypto::ActivationKey;
use crate::error::{ChapterizeError, Result};

/// Stderr marker FFmpeg prints when AAX activation bytes are wrong
const CHECKSUM_MISMATCH: &str = "mismatch in checksums";

/// One chapter export request
#[derive(Debug, Clone)]
pub struct ChapterExport {
    pub output: PathBuf,
    pub start: String,
    pub end: String,
    pub title: String,
    pub track: usize,
    pub album: String,
    pub artist: String,
}

/// Operations the conversion pipeline needs from the media engine
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Fail with `FfmpegNotFound` when the engine binaries are missing
    async fn check_available(&self) -> Result<()>;

    /// Read container tags and chapter list
    async fn probe(&self, input: &Path, key: Option<&ActivationKey>) -> Result<ProbeOutput>;

    /// Export the embedded cover image
    async fn extract_cover(
        &self,
        input: &Path,
        key: Option<&ActivationKey>,
        output: &Path,
    ) -> Result<()>;

    /// Transcode one chapter's time range to a tagged MP3
    async fn export_chapter(
        &self,
        input: &Path,
        key: Option<&ActivationKey>,
        chapter: &ChapterExport,
    ) -> Result<()>;
}

/// FFmpeg-backed engine
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

impl FfmpegEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use explicit binary locations instead of searching PATH
    pub fn with_binaries(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    fn input_args(input: &Path, key: Option<&ActivationKey>) -> Vec<OsString> {
        let mut args = Vec::with_capacity(4);
        if let Some(key) = key {
            args.push("-activation_bytes".into());
            args.push(key.expose().into());
        }
        args.push("-i".into());
        args.push(input.as_os_str().to_os_string());
        args
    }

    fn cover_args(input: &Path, key: Option<&ActivationKey>, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-y".into()];
        args.extend(Self::input_args(input, key));
        args.extend(["-an", "-vcodec", "copy"].map(OsString::from));
        args.push(output.as_os_str().to_os_string());
        args
    }

    fn chapter_args(
        input: &Path,
        key: Option<&ActivationKey>,
        chapter: &ChapterExport,
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-y".into()];
        args.extend(Self::input_args(input, key));
        args.extend(
            [
                "-vn".to_string(),
                "-codec:a".to_string(),
                "libmp3lame".to_string(),
                "-ss".to_string(),
                chapter.start.clone(),
                "-to".to_string(),
                chapter.end.clone(),
                "-map_metadata".to_string(),
                "0".to_string(),
                "-map_chapters".to_string(),
                "-1".to_string(),
                "-id3v2_version".to_string(),
                "3".to_string(),
                "-metadata".to_string(),
                format!("title={}", chapter.title),
                "-metadata".to_string(),
                format!("track={}", chapter.track),
                "-metadata".to_string(),
                format!("album={}", chapter.album),
                "-metadata".to_string(),
                format!("artist={}", chapter.artist),
            ]
            .map(OsString::from),
        );
        args.push(chapter.output.as_os_str().to_os_string());
        args
    }

    /// Run a tool to completion, classifying failures
    async fn execute(
        tool: &'static str,
        program: &Path,
        args: &[OsString],
        input: &Path,
    ) -> Result<Output> {
        tracing::trace!(tool, args = ?redact_key(args), "running");

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ChapterizeError::FfmpegNotFound
                } else {
                    ChapterizeError::ffmpeg(tool, format!("failed to execute: {}", e))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::debug!(tool, status = ?output.status.code(), stderr = %stderr.trim(), "engine failed");

            if is_checksum_mismatch(&stderr) {
                return Err(ChapterizeError::ActivationBytesMismatch(input.to_path_buf()));
            }

            return Err(ChapterizeError::ffmpeg(
                tool,
                format!(
                    "exited with status {}: {}",
                    output.status.code().unwrap_or(-1),
                    last_line(&stderr)
                ),
            ));
        }

        Ok(output)
    }

    async fn check_binary(tool: &'static str, program: &Path) -> Result<()> {
        match Command::new(program)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
        {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => Err(ChapterizeError::ffmpeg(
                tool,
                format!(
                    "`-version` exited with status {}",
                    status.code().unwrap_or(-1)
                ),
            )),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ChapterizeError::FfmpegNotFound)
            }
            Err(e) => Err(ChapterizeError::ffmpeg(
                tool,
                format!("failed to check availability: {}", e),
            )),
        }
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    async fn check_available(&self) -> Result<()> {
        Self::check_binary("ffmpeg", &self.ffmpeg).await?;
        Self::check_binary("ffprobe", &self.ffprobe).await
    }

    async fn probe(&self, input: &Path, key: Option<&ActivationKey>) -> Result<ProbeOutput> {
        let mut args: Vec<OsString> = [
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_chapters",
        ]
        .map(OsString::from)
        .to_vec();
        args.extend(Self::input_args(input, key));

        let output = Self::execute("ffprobe", &self.ffprobe, &args, input).await?;
        ProbeOutput::from_json(input, &String::from_utf8_lossy(&output.stdout))
    }

    async fn extract_cover(
        &self,
        input: &Path,
        key: Option<&ActivationKey>,
        output: &Path,
    ) -> Result<()> {
        let args = Self::cover_args(input, key, output);
        Self::execute("ffmpeg", &self.ffmpeg, &args, input).await?;
        Ok(())
    }

    async fn export_chapter(
        &self,
        input: &Path,
        key: Option<&ActivationKey>,
        chapter: &ChapterExport,
    ) -> Result<()> {
        let args = Self::chapter_args(input, key, chapter);
        Self::execute("ffmpeg", &self.ffmpeg, &args, input).await?;
        Ok(())
    }
}

/// FFmpeg's wording for wrong activation bytes, in any letter case
fn is_checksum_mismatch(stderr: &str) -> bool {
    stderr.to_lowercase().contains(CHECKSUM_MISMATCH)
}

/// Last non-empty stderr line, which is where FFmpeg puts the actual error
fn last_line(stderr: &str) -> &str {
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("no error output")
}

/// Copy of the argument list with the activation bytes masked
fn redact_key(args: &[OsString]) -> Vec<String> {
    let mut redacted = Vec::with_capacity(args.len());
    let mut mask_next = false;
    for arg in args {
        let arg = arg.to_string_lossy();
        if mask_next {
            redacted.push(ActivationKey::new(arg.as_ref()).to_string());
            mask_next = false;
        } else {
            mask_next = arg == "-activation_bytes";
            redacted.push(arg.into_owned());
        }
    }
    redacted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn test_cover_args_with_key() {
        let key = ActivationKey::new("1CEB00DA");
        let args = FfmpegEngine::cover_args(
            Path::new("/in/book.aax"),
            Some(&key),
            Path::new("/out/cover.jpg"),
        );
        assert_eq!(
            strings(&args),
            vec![
                "-y",
                "-activation_bytes",
                "1CEB00DA",
                "-i",
                "/in/book.aax",
                "-an",
                "-vcodec",
                "copy",
                "/out/cover.jpg"
            ]
        );
    }

    #[test]
    fn test_chapter_args_without_key() {
        let chapter = ChapterExport {
            output: PathBuf::from("/out/01 - Intro.mp3"),
            start: "0.000000".to_string(),
            end: "12.500000".to_string(),
            title: "Intro".to_string(),
            track: 1,
            album: "Book".to_string(),
            artist: "Writer".to_string(),
        };
        let args = strings(&FfmpegEngine::chapter_args(
            Path::new("/in/book.m4b"),
            None,
            &chapter,
        ));

        assert!(!args.contains(&"-activation_bytes".to_string()));
        assert_eq!(&args[..3], &["-y", "-i", "/in/book.m4b"]);
        assert!(args.windows(2).any(|w| w == ["-ss", "0.000000"]));
        assert!(args.windows(2).any(|w| w == ["-to", "12.500000"]));
        assert!(args.windows(2).any(|w| w == ["-codec:a", "libmp3lame"]));
        assert!(args.windows(2).any(|w| w == ["-id3v2_version", "3"]));
        assert!(args.contains(&"track=1".to_string()));
        assert!(args.contains(&"album=Book".to_string()));
        assert!(args.contains(&"artist=Writer".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("/out/01 - Intro.mp3"));
    }

    #[test]
    fn test_redact_key() {
        let key = ActivationKey::new("1CEB00DA");
        let args = FfmpegEngine::input_args(Path::new("a.aax"), Some(&key));
        let redacted = redact_key(&args);
        assert!(!redacted.iter().any(|a| a == "1CEB00DA"));
        assert_eq!(redacted[0], "-activation_bytes");
    }

    #[test]
    fn test_checksum_mismatch_ignores_case() {
        assert!(is_checksum_mismatch(
            "[mov,mp4,m4a] Mismatch in checksums, wrong activation bytes?"
        ));
        assert!(is_checksum_mismatch("MISMATCH IN CHECKSUMS"));
        assert!(!is_checksum_mismatch("Invalid data found when processing input"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_version_check_is_not_missing_binary() {
        // `false` exists and exits non-zero whatever its arguments
        let err = FfmpegEngine::check_binary("ffmpeg", Path::new("false"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChapterizeError::FfmpegError { tool: "ffmpeg", .. }));
        assert!(!err.is_fatal_for_run());
    }

    #[test]
    fn test_last_line() {
        assert_eq!(last_line("a\nb\n\n"), "b");
        assert_eq!(last_line(""), "no error output");
    }

    #[tokio::test]
    async fn test_missing_binary_is_ffmpeg_not_found() {
        let engine = FfmpegEngine::with_binaries(
            "/nonexistent/chapterize-ffmpeg",
            "/nonexistent/chapterize-ffprobe",
        );
        let err = engine.check_available().await.unwrap_err();
        assert!(matches!(err, ChapterizeError::FfmpegNotFound));

        let err = engine
            .probe(Path::new("/in/book.aax"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ChapterizeError::FfmpegNotFound));
    }
}
