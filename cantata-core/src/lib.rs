// Cantata
// Copyright (c) 2026 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cantata's shared structs, traits, and features.
//!
//! This crate provides the byte- and bit-level I/O plumbing, checksumming, error types, audio
//! buffers, and DSP primitives that the format and codec crates are built upon.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod audio;
pub mod checksum;
pub mod dsp;
pub mod errors;
pub mod formats;
pub mod io;
