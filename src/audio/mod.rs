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


//! Audio inspection and transcoding
//!
//! # Module Organization
//!
//! ## format
//! - `InputFormat` - Accepted containers (AAX, AAC, M4B)
//!
//! ## metadata
//! - `ProbeOutput` - Raw FFprobe JSON
//! - `MetaData` - Author, title, key and chapters of one book
//! - `Chapter` - Chapter marker structure
//!
//! ## engine
//! - `MediaEngine` - Probe / cover / chapter operations
//! - `FfmpegEngine` - Child-process implementation
//!
//! # FFmpeg Integration
//!
//! FFmpeg and FFprobe must be installed and available in PATH:
//! - FFprobe: tags and chapter list
//! - FFmpeg: cover art export, chapter transcoding to MP3 (libmp3lame)
//!
//! ## Installation
//! - macOS: `brew install ffmpeg`
//! - Linux: `apt-get install ffmpeg` or `yum install ffmpeg`

pub mod engine;
pub mod format;
pub mod metadata;

// Re-export commonly used types for convenience
pub use engine::{ChapterExport, FfmpegEngine, MediaEngine};
pub use format::InputFormat;
pub use metadata::{Chapter, MetaData, ProbeChapter, ProbeFormat, ProbeOutput};
