// Cantata
// Copyright (c) 2026 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::VecDeque;

use cantata_core::errors::{limit_error, Result};
use cantata_core::formats::Packet;

use log::{debug, warn};

use super::page::Page;

struct PacketInfo {
    len: usize,
    seqno: u64,
    absgp: Option<u64>,
    start_of_stream: bool,
    end_of_stream: bool,
    /// The packet is a fragment of a packet partially lost to stream corruption and must not be
    /// emitted.
    discard: bool,
}

/// A `LogicalStream` assembles packets for a single logical stream from the pages belonging to
/// that stream.
pub struct LogicalStream {
    serial: u32,
    buf: Vec<u8>,
    read_from: usize,
    write_at: usize,
    /// The number of bytes at the end of the buffer belonging to an incomplete packet.
    part_len: usize,
    packets: VecDeque<PacketInfo>,
    next_seqno: u64,
    prev_page_seq: Option<u32>,
}

impl LogicalStream {
    const MAX_BUFFER_LEN: usize = 256 * 1024 * 1024;

    pub fn new(serial: u32) -> LogicalStream {
        LogicalStream {
            serial,
            buf: Default::default(),
            read_from: 0,
            write_at: 0,
            part_len: 0,
            packets: Default::default(),
            next_seqno: 0,
            prev_page_seq: None,
        }
    }

    fn compact(&mut self) {
        if self.read_from > 0 {
            self.buf.copy_within(self.read_from..self.write_at, 0);
            self.write_at -= self.read_from;
            self.read_from = 0;
        }
    }

    fn write(&mut self, len: usize) -> Result<&mut [u8]> {
        debug_assert!(len <= 64 * 1024, "ogg pages are <= 64kB");

        // Attempt to compact the buffer first.
        self.compact();

        let next_write_at = self.write_at + len;

        if next_write_at >= self.buf.len() {
            let new_buf_size = (next_write_at + (8 * 1024 - 1)) & !(8 * 1024 - 1);
            debug!("grow packet buffer to {} bytes", new_buf_size);

            if new_buf_size > LogicalStream::MAX_BUFFER_LEN {
                return limit_error("ogg: packet buffer would exceed maximum size");
            }

            self.buf.resize(new_buf_size, Default::default());
        }

        let slice = &mut self.buf[self.write_at..next_write_at];

        self.write_at = next_write_at;

        Ok(slice)
    }

    /// Reads a page belonging to this logical stream and enqueues the packets completed on it onto
    /// the stream's packet queue.
    pub fn read_page(&mut self, page: &Page<'_>) -> Result<()> {
        let header = page.header;

        // A page sequence discontinuity indicates one or more pages were lost.
        let is_gap = match self.prev_page_seq {
            Some(prev) => header.sequence != prev.wrapping_add(1),
            None => false,
        };

        self.prev_page_seq = Some(header.sequence);

        let mut discard_first = false;

        if is_gap {
            warn!(
                "page sequence discontinuity for serial={:#x} (got page {})",
                self.serial, header.sequence
            );

            if self.part_len > 0 {
                // The incomplete packet can never be completed.
                self.write_at -= self.part_len;
                self.part_len = 0;
            }

            // One or more whole pages were lost. Skip a sequence number so consumers observe
            // the loss.
            self.next_seqno += 1;

            if header.is_continuation {
                // The head of the packet continued on this page was on a lost page.
                discard_first = true;
            }
        }
        else if self.part_len > 0 && !header.is_continuation {
            // Expected a continuation page to complete an incomplete packet, however this page
            // does not continue a previous page, therefore the incomplete packet must be dropped.
            warn!("expected continuation page");

            self.write_at -= self.part_len;
            self.part_len = 0;
            self.next_seqno += 1;
        }
        else if self.part_len == 0 && header.is_continuation {
            // A continuation page with no incomplete packet pending. The continued data belongs
            // to a packet that can never be whole.
            warn!("unexpected continuation page");

            discard_first = true;
        }

        let n_queued = self.packets.len();

        for data in page.packets() {
            let slice = self.write(data.len())?;
            slice.copy_from_slice(data);

            // The first packet completed on a page includes any bytes of an incomplete packet
            // carried over from previous pages.
            let len = self.part_len + data.len();
            self.part_len = 0;

            let discard = discard_first && self.packets.len() == n_queued;

            self.packets.push_back(PacketInfo {
                len,
                seqno: self.next_seqno,
                absgp: None,
                start_of_stream: header.is_first_page,
                end_of_stream: false,
                discard,
            });

            self.next_seqno += 1;
        }

        // Buffer the bytes of a partial packet at the end of the page. They will be completed by
        // a subsequent continuation page.
        if let Some(partial) = page.packets().partial_packet() {
            let slice = self.write(partial.len())?;
            slice.copy_from_slice(partial);

            self.part_len += partial.len();
        }

        // The granule position of a page is attributed to the last packet completed on the page.
        if self.packets.len() > n_queued {
            if let Some(last) = self.packets.back_mut() {
                last.absgp = header.absgp;
                last.end_of_stream = header.is_last_page;
            }
        }

        Ok(())
    }

    /// Maybe gets the next complete packet that has been read and queued from the stream.
    pub fn next_packet(&mut self) -> Option<Packet> {
        // Skip packets marked for discard.
        while let Some(info) = self.packets.front() {
            if !info.discard {
                break;
            }

            self.read_from += info.len;
            self.packets.pop_front();
        }

        match self.packets.front() {
            Some(info) => {
                let data = Box::from(&self.buf[self.read_from..self.read_from + info.len]);

                let mut packet = Packet::new_from_boxed_slice(self.serial, info.seqno, data);

                packet.absgp = info.absgp;
                packet.start_of_stream = info.start_of_stream;
                packet.end_of_stream = info.end_of_stream;

                Some(packet)
            }
            None => None,
        }
    }

    /// Maybe consumes the next complete packet.
    pub fn consume_packet(&mut self) {
        if let Some(info) = self.packets.pop_front() {
            self.read_from += info.len;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::LogicalStream;
    use crate::page::PageReader;
    use cantata_core::io::BufReader;

    fn feed_page(stream: &mut LogicalStream, page: &[u8]) {
        let mut reader = BufReader::new(page);
        let pages = PageReader::try_new(&mut reader).unwrap();
        stream.read_page(&pages.page()).unwrap();
    }

    fn build_page(flags: u8, absgp: u64, sequence: u32, packets: &[&[u8]]) -> Vec<u8> {
        let mut header = Vec::new();
        header.extend_from_slice(b"OggS");
        header.push(0);
        header.push(flags);
        header.extend_from_slice(&absgp.to_le_bytes());
        header.extend_from_slice(&0x1u32.to_le_bytes());
        header.extend_from_slice(&sequence.to_le_bytes());
        header.extend_from_slice(&[0u8; 4]);

        let mut body = Vec::new();
        let mut lacing = Vec::new();

        for packet in packets {
            assert!(packet.len() < 255);
            lacing.push(packet.len() as u8);
            body.extend_from_slice(packet);
        }

        header.push(lacing.len() as u8);
        header.extend_from_slice(&lacing);

        crate::page::write_page_checksum(&mut header, &body);

        header.extend_from_slice(&body);
        header
    }

    #[test]
    fn verify_packet_sequence_numbers() {
        let mut stream = LogicalStream::new(0x1);

        feed_page(&mut stream, &build_page(0x02, 0, 0, &[b"a", b"b"]));
        feed_page(&mut stream, &build_page(0, 512, 1, &[b"c"]));

        for expected in 0..3u64 {
            let packet = stream.next_packet().unwrap();
            assert_eq!(packet.seqno, expected);
            stream.consume_packet();
        }

        assert!(stream.next_packet().is_none());
    }

    #[test]
    fn verify_absgp_attributed_to_last_packet() {
        let mut stream = LogicalStream::new(0x1);

        feed_page(&mut stream, &build_page(0x02, 1024, 0, &[b"a", b"b"]));

        let first = stream.next_packet().unwrap();
        assert_eq!(first.absgp, None);
        assert!(first.start_of_stream);
        stream.consume_packet();

        let last = stream.next_packet().unwrap();
        assert_eq!(last.absgp, Some(1024));
        stream.consume_packet();
    }

    #[test]
    fn verify_page_gap_skips_sequence_number() {
        let mut stream = LogicalStream::new(0x1);

        feed_page(&mut stream, &build_page(0x02, 0, 0, &[b"a", b"b"]));
        // Page 1 was lost. It carried one whole packet.
        feed_page(&mut stream, &build_page(0, 2048, 2, &[b"d"]));

        let mut seqnos = Vec::new();

        while let Some(packet) = stream.next_packet() {
            seqnos.push(packet.seqno);
            stream.consume_packet();
        }

        // The packets carried by the lost page can never be recovered, so the first packet after
        // the gap skips a sequence number even though no partial packet was pending.
        assert_eq!(seqnos, vec![0, 1, 3]);
    }

    #[test]
    fn verify_lost_continuation_drops_partial() {
        let mut stream = LogicalStream::new(0x1);

        // Page 0 ends with a partial packet: 1 segment of 255 bytes means the packet continues.
        let mut page0 = Vec::new();
        page0.extend_from_slice(b"OggS");
        page0.push(0);
        page0.push(0x02);
        page0.extend_from_slice(&u64::MAX.to_le_bytes());
        page0.extend_from_slice(&0x1u32.to_le_bytes());
        page0.extend_from_slice(&0u32.to_le_bytes());
        page0.extend_from_slice(&[0u8; 4]);
        page0.push(1);
        page0.push(255);

        let body = vec![0xaa; 255];
        crate::page::write_page_checksum(&mut page0, &body);
        page0.extend_from_slice(&body);

        feed_page(&mut stream, &page0);

        // The page completing the packet was lost. Page 2 carries a whole packet.
        feed_page(&mut stream, &build_page(0, 4096, 2, &[b"x"]));

        let packet = stream.next_packet().unwrap();

        // The partial packet was dropped and its sequence number skipped.
        assert_eq!(packet.seqno, 1);
        assert_eq!(packet.buf(), b"x");
    }
}
