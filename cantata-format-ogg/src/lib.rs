// Cantata
// Copyright (c) 2026 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! An OGG container demuxer: CRC-validated page deframing and logical-stream packet assembly.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod demuxer;
mod logical;
mod page;
mod physical;

pub use demuxer::OggReader;
pub use page::{write_page_checksum, PageHeader, OGG_PAGE_HEADER_SIZE, OGG_PAGE_MAX_SIZE};
