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


//! Activation bytes handling
//!
//! AAX files are AES encrypted with a per-account 4-byte key. Decryption
//! itself is done by FFmpeg; this module only decides which key to hand it.
//!
//! # DRM Formats
//! - **AAX**: needs activation bytes
//! - **AAC / M4B**: unencrypted, probed without a key

pub mod activation;
pub mod auth;
pub mod resolver;

pub use activation::{parse_candidates, ActivationKey};
pub use auth::{AuthFile, AUTH_FILE_NAME};
pub use resolver::{probe_candidates, KeyResolver, ResolvedKey};
