// Cantata
// Copyright (c) 2026 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `formats` module provides the support structures necessary to implement media demuxers.

use crate::io::BufReader;

/// A `Packet` contains one whole unit of compressed data deframed from a container, along with the
/// framing information a decoder needs to order and time its output.
#[derive(Clone)]
pub struct Packet {
    /// The serial number of the logical stream this packet belongs to.
    serial: u32,
    /// The sequence number of the packet within its logical stream. Sequence numbers increase by
    /// one for every packet emitted. A jump of more than one indicates packets were lost to stream
    /// corruption.
    pub seqno: u64,
    /// Indicates the packet was completed on the first page of the logical stream.
    pub start_of_stream: bool,
    /// Indicates the packet was completed on the last page of the logical stream.
    pub end_of_stream: bool,
    /// The absolute granule position of the page the packet was completed on, if it was the last
    /// packet completed on that page. `None` when the position is undetermined.
    pub absgp: Option<u64>,
    /// The packet buffer.
    pub data: Box<[u8]>,
}

impl Packet {
    /// Create a new `Packet` from a boxed slice.
    pub fn new_from_boxed_slice(serial: u32, seqno: u64, data: Box<[u8]>) -> Self {
        Packet {
            serial,
            seqno,
            start_of_stream: false,
            end_of_stream: false,
            absgp: None,
            data,
        }
    }

    /// The serial number of the logical stream this packet belongs to.
    pub fn serial(&self) -> u32 {
        self.serial
    }

    /// Get an immutable slice to the packet buffer.
    pub fn buf(&self) -> &[u8] {
        &self.data
    }

    /// Get a `BufReader` to read the packet data directly.
    pub fn as_buf_reader(&self) -> BufReader<'_> {
        BufReader::new(&self.data)
    }
}
