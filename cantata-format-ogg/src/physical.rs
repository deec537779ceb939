// Cantata
// Copyright (c) 2026 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::btree_map::{BTreeMap, Entry};

use cantata_core::errors::{Error, Result};
use cantata_core::formats::Packet;
use cantata_core::io::{ReadBytes, SeekBuffered};

use log::{info, warn};

use super::logical::LogicalStream;
use super::page::PageReader;

/// A `PhysicalStream` multiplexes the pages of a physical OGG stream into the logical streams
/// they belong to.
pub struct PhysicalStream {
    pages: PageReader,
    streams: BTreeMap<u32, LogicalStream>,
}

impl PhysicalStream {
    pub fn try_new<B>(reader: &mut B) -> Result<Self>
    where
        B: ReadBytes + SeekBuffered,
    {
        let pages = PageReader::try_new(reader)?;

        let mut stream = PhysicalStream { pages, streams: Default::default() };

        stream.process_page()?;

        Ok(stream)
    }

    /// Routes the current page to the logical stream it belongs to, discovering new logical
    /// streams from their first page.
    fn process_page(&mut self) -> Result<()> {
        let page = self.pages.page();
        let serial = page.header.serial;

        let stream = match self.streams.entry(serial) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                if !page.header.is_first_page {
                    // A page belonging to an unknown logical stream that is not a stream start.
                    // The stream's first page was likely lost. Ignore the page.
                    warn!("page for undiscovered stream: serial={:#x}", serial);
                    return Ok(());
                }

                info!("discovered new stream: serial={:#x}", serial);

                entry.insert(LogicalStream::new(serial))
            }
        };

        stream.read_page(&page)
    }

    /// Gets the next packet of any logical stream, reading further pages as required.
    pub fn next_packet<B>(&mut self, reader: &mut B) -> Result<Option<Packet>>
    where
        B: ReadBytes + SeekBuffered,
    {
        loop {
            // Emit a queued packet from the logical stream of the current page, if any.
            let serial = self.pages.header().serial;

            if let Some(stream) = self.streams.get_mut(&serial) {
                if let Some(packet) = stream.next_packet() {
                    return Ok(Some(packet));
                }
            }

            // No packets are queued, read the next page.
            if let Err(err) = self.pages.next_page(reader) {
                return match err {
                    // The end of the physical stream.
                    Error::IoError(ref io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
                        Ok(None)
                    }
                    _ => Err(err),
                };
            }

            self.process_page()?;
        }
    }

    /// Consumes the packet last returned by `next_packet`.
    pub fn consume_packet(&mut self) {
        let serial = self.pages.header().serial;

        if let Some(stream) = self.streams.get_mut(&serial) {
            stream.consume_packet();
        }
    }
}
