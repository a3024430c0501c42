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


//! Book conversion: one AAX/AAC/M4B in, a cover and chapter MP3s out
//!
//! # Module Organization
//!
//! ## options
//! - `ConvertOptions` - Run-wide settings (output dir, key, overrides)
//! - `ParseConfig` - Options bound to one input file
//! - `BookContext` - Per-file logging label
//!
//! ## validate
//! - Input checks and output directory creation
//!
//! ## pipeline
//! - `BookConverter` - Stage runner for one book
//!
//! ## batch
//! - `run_batch` - Sequential conversion of a file list

pub mod batch;
pub mod options;
pub mod pipeline;
pub mod validate;

pub use batch::{run_batch, BatchReport};
pub use options::{BookContext, ConvertOptions, ParseConfig};
pub use pipeline::{BookConverter, ConversionReport, Stage};
pub use validate::{validate_input, validate_output_dir};
