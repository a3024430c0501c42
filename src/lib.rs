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


//! Split Audible audiobooks into per-chapter MP3 files
//!
//! Two ways in:
//! - [`convert::run_batch`] converts a list of files once
//! - [`watch::Daemon`] watches a directory and converts files as they arrive
//!
//! Transcoding is done by external `ffmpeg` / `ffprobe` processes behind the
//! [`audio::MediaEngine`] trait.

pub mod audio;
pub mod config;
pub mod convert;
pub mod crypto;
pub mod error;
pub mod file;
pub mod queue;
pub mod storage;
pub mod watch;

pub use audio::{FfmpegEngine, MediaEngine};
pub use config::Settings;
pub use convert::{run_batch, BatchReport, BookConverter, ConvertOptions};
pub use error::{ChapterizeError, Result};
pub use storage::{FileStatus, StateStore};
pub use watch::{Daemon, WatchSettings};
