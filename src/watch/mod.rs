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


//! Watch mode
//!
//! # Module Organization
//!
//! ## detector
//! - `StabilityDetector` - Reports files once they stop growing
//! - `StabilityListener` - Receiver of stable files
//!
//! ## daemon
//! - `Daemon` - Wires detector, queue and workers together and supervises them

pub mod daemon;
pub mod detector;

pub use daemon::{Daemon, WatchSettings};
pub use detector::{StabilityDetector, StabilityListener};
