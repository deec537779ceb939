// Cantata
// Copyright (c) 2026 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use cantata_core::checksum::Crc32;
use cantata_core::errors::{corrupt_page_error, Error, Result};
use cantata_core::io::{BufReader, Monitor, MonitorStream, ReadBytes, SeekBuffered};

use log::{debug, warn};

const OGG_PAGE_MARKER: [u8; 4] = *b"OggS";

/// The size of an OGG page header, excluding the segment table.
pub const OGG_PAGE_HEADER_SIZE: usize = 27;

/// The maximum size of a whole OGG page.
pub const OGG_PAGE_MAX_SIZE: usize = OGG_PAGE_HEADER_SIZE + 255 + 255 * 255;

/// A granule position of all-ones indicates that no packet is completed on the page.
const OGG_ABSGP_NONE: u64 = u64::MAX;

/// A parsed OGG page header.
#[derive(Copy, Clone, Default)]
pub struct PageHeader {
    /// The absolute granule position of the last packet completed on the page. `None` if no
    /// packet is completed on the page.
    pub absgp: Option<u64>,
    /// The serial number of the logical stream the page belongs to.
    pub serial: u32,
    /// The sequence number of the page within its logical stream. Note that the unsigned image of
    /// a signed -1 (`0xffff_ffff`) is a valid sequence number.
    pub sequence: u32,
    /// The page checksum, as stored in the page.
    pub crc: u32,
    /// The number of entries in the segment table.
    pub n_segments: u8,
    /// The page begins with the continuation of a packet started on the previous page.
    pub is_continuation: bool,
    /// The page is the first page of the logical stream.
    pub is_first_page: bool,
    /// The page is the last page of the logical stream.
    pub is_last_page: bool,
}

/// Reads a `PageHeader` from the the provided reader.
fn read_page_header<B: ReadBytes>(reader: &mut B) -> Result<PageHeader> {
    // The OggS marker should be present.
    let marker = reader.read_quad_bytes()?;

    if marker != OGG_PAGE_MARKER {
        return corrupt_page_error("ogg: missing ogg stream marker");
    }

    let version = reader.read_byte()?;

    // There is only one OGG version, and that is version 0.
    if version != 0 {
        return corrupt_page_error("ogg: invalid ogg version");
    }

    let flags = reader.read_byte()?;

    // Only the first 3 least-significant bits are used for flags.
    if flags & 0xf8 != 0 {
        return corrupt_page_error("ogg: invalid flag bits set");
    }

    let absgp = reader.read_u64()?;
    let serial = reader.read_u32()?;
    let sequence = reader.read_u32()?;
    let crc = reader.read_u32()?;
    let n_segments = reader.read_byte()?;

    Ok(PageHeader {
        absgp: if absgp == OGG_ABSGP_NONE { None } else { Some(absgp) },
        serial,
        sequence,
        crc,
        n_segments,
        is_continuation: (flags & 0x01) != 0,
        is_first_page: (flags & 0x02) != 0,
        is_last_page: (flags & 0x04) != 0,
    })
}

/// Quickly synchronizes the provided reader to the next OGG page capture pattern, but does not
/// perform any further verification.
fn sync_page<B: ReadBytes>(reader: &mut B) -> Result<()> {
    let mut marker = u32::from_be_bytes(reader.read_quad_bytes()?);

    while marker.to_be_bytes() != OGG_PAGE_MARKER {
        marker <<= 8;
        marker |= u32::from(reader.read_u8()?);
    }

    Ok(())
}

/// Computes the page checksum over the header, with its checksum field zeroed, and the page body,
/// then stores the computed checksum little-endian into bytes 22..26 of the header.
///
/// The header buffer must contain the page header and the segment table. The body buffer must
/// contain all the segments the segment table describes.
pub fn write_page_checksum(header: &mut [u8], body: &[u8]) {
    assert!(header.len() >= OGG_PAGE_HEADER_SIZE);

    // Only the computation over a zeroed checksum field is canonical.
    header[22..26].copy_from_slice(&[0u8; 4]);

    let mut crc32 = Crc32::new(0);

    crc32.process_buf_bytes(header);
    crc32.process_buf_bytes(body);

    header[22..26].copy_from_slice(&crc32.crc().to_le_bytes());
}

/// An iterator over packets within a `Page`.
pub struct PagePackets<'a> {
    lens: core::slice::Iter<'a, u16>,
    data: &'a [u8],
}

impl<'a> PagePackets<'a> {
    /// If this page ends with an incomplete (partial) packet, get a slice to the data associated
    /// with the partial packet.
    pub fn partial_packet(self) -> Option<&'a [u8]> {
        // Consume the rest of the packets.
        let discard = usize::from(self.lens.sum::<u16>());

        if self.data.len() > discard {
            Some(&self.data[discard..])
        }
        else {
            None
        }
    }
}

impl<'a> Iterator for PagePackets<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        match self.lens.next() {
            Some(len) => {
                let (packet, rem) = self.data.split_at(usize::from(*len));
                self.data = rem;
                Some(packet)
            }
            _ => None,
        }
    }
}

/// An OGG page.
pub struct Page<'a> {
    /// The page header.
    pub header: PageHeader,
    packet_lens: &'a [u16],
    page_buf: &'a [u8],
}

impl<'a> Page<'a> {
    /// Returns an iterator over all complete packets within the page.
    ///
    /// The iterator borrows from the page buffer, not the `Page` value itself, so it may outlive
    /// the `Page`. If this page contains a partial packet, then the partial packet data may be
    /// retrieved using the `partial_packet` function of the iterator.
    pub fn packets(&self) -> PagePackets<'a> {
        PagePackets { lens: self.packet_lens.iter(), data: self.page_buf }
    }

    /// Gets the number of packets completed on this page.
    pub fn num_packets(&self) -> usize {
        self.packet_lens.len()
    }
}

/// A reader of OGG pages.
pub struct PageReader {
    header: PageHeader,
    packet_lens: Vec<u16>,
    page_buf: Vec<u8>,
    page_buf_len: usize,
}

impl PageReader {
    pub fn try_new<B>(reader: &mut B) -> Result<Self>
    where
        B: ReadBytes + SeekBuffered,
    {
        let mut page_reader = PageReader {
            header: Default::default(),
            packet_lens: Vec::new(),
            page_buf: Vec::new(),
            page_buf_len: 0,
        };

        page_reader.try_next_page(reader)?;

        Ok(page_reader)
    }

    /// Attempts to read the next page. If the page is corrupted or invalid, returns an error.
    pub fn try_next_page<B>(&mut self, reader: &mut B) -> Result<()>
    where
        B: ReadBytes + SeekBuffered,
    {
        let mut header_buf = [0u8; OGG_PAGE_HEADER_SIZE];
        header_buf[..4].copy_from_slice(&OGG_PAGE_MARKER);

        // Synchronize to an OGG page capture pattern.
        sync_page(reader)?;

        // Record the position immediately after synchronization. If the page is found corrupt the
        // reader will need to seek back here to try to regain synchronization.
        let sync_pos = reader.pos();

        // Read the part of the page header after the capture pattern into a buffer.
        reader.read_buf_exact(&mut header_buf[4..])?;

        // Parse the page header buffer.
        let header = read_page_header(&mut BufReader::new(&header_buf))?;

        // The CRC of the OGG page requires the page checksum bytes to be zeroed.
        header_buf[22..26].copy_from_slice(&[0u8; 4]);

        // Instantiate a Crc32, initialize it with 0, and feed it the page header buffer.
        let mut crc32 = Crc32::new(0);

        crc32.process_buf_bytes(&header_buf);

        // The remainder of the page will be checksummed as it is read.
        let mut crc32_reader = MonitorStream::new(reader, crc32);

        // Read segment table.
        let mut page_body_len = 0;
        let mut packet_len = 0;

        self.packet_lens.clear();

        for _ in 0..header.n_segments {
            let seg_len = crc32_reader.read_byte()?;

            page_body_len += usize::from(seg_len);
            packet_len += u16::from(seg_len);

            // A segment with a length < 255 indicates that the segment is the end of a packet.
            // Push the packet length into the packet queue for the stream.
            if seg_len < 255 {
                self.packet_lens.push(packet_len);
                packet_len = 0;
            }
        }

        self.read_page_body(&mut crc32_reader, page_body_len)?;

        let calculated_crc = crc32_reader.monitor().crc();

        // If the CRC for the page is incorrect, then the page is corrupt.
        if header.crc != calculated_crc {
            warn!("crc mismatch: expected {:#x}, got {:#x}", header.crc, calculated_crc);

            // Clear packet buffer.
            self.packet_lens.clear();
            self.page_buf_len = 0;

            // Seek back to immediately after the previous sync position.
            crc32_reader.into_inner().seek_buffered(sync_pos);

            return corrupt_page_error("ogg: crc mismatch");
        }

        self.header = header;

        Ok(())
    }

    /// Reads the next page. If the next page is corrupted or invalid, the page is discarded and
    /// the reader tries again until a valid page is read or end-of-stream.
    pub fn next_page<B>(&mut self, reader: &mut B) -> Result<()>
    where
        B: ReadBytes + SeekBuffered,
    {
        loop {
            match self.try_next_page(reader) {
                Ok(_) => break,
                Err(Error::IoError(e)) => return Err(Error::from(e)),
                _ => (),
            }
        }
        Ok(())
    }

    /// Gets the current page header.
    pub fn header(&self) -> PageHeader {
        self.header
    }

    /// Gets a reference to the current page.
    pub fn page(&self) -> Page<'_> {
        assert!(self.page_buf_len <= 255 * 255, "ogg pages are <= 65025 bytes");

        Page {
            header: self.header,
            packet_lens: &self.packet_lens,
            page_buf: &self.page_buf[..self.page_buf_len],
        }
    }

    fn read_page_body<B: ReadBytes>(&mut self, reader: &mut B, len: usize) -> Result<()> {
        // This is precondition.
        assert!(len <= 255 * 255);

        if len > self.page_buf.len() {
            // New page buffer size, rounded up to the nearest 8K block.
            let new_buf_len = (len + (8 * 1024 - 1)) & !(8 * 1024 - 1);
            debug!("grow page buffer to {} bytes", new_buf_len);

            self.page_buf.resize(new_buf_len, Default::default());
        }

        self.page_buf_len = len;

        reader.read_buf_exact(&mut self.page_buf[..len])?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        read_page_header, write_page_checksum, PageReader, OGG_PAGE_HEADER_SIZE,
    };
    use cantata_core::errors::Error;
    use cantata_core::io::BufReader;

    /// Builds a complete page with a valid checksum from a list of packet bodies.
    fn build_page(flags: u8, absgp: u64, serial: u32, sequence: u32, packets: &[&[u8]]) -> Vec<u8> {
        let mut header = Vec::with_capacity(OGG_PAGE_HEADER_SIZE);
        header.extend_from_slice(b"OggS");
        header.push(0);
        header.push(flags);
        header.extend_from_slice(&absgp.to_le_bytes());
        header.extend_from_slice(&serial.to_le_bytes());
        header.extend_from_slice(&sequence.to_le_bytes());
        header.extend_from_slice(&[0u8; 4]);

        let mut body = Vec::new();
        let mut lacing = Vec::new();

        for packet in packets {
            assert!(packet.len() < 255, "test packets are < 1 segment");
            lacing.push(packet.len() as u8);
            body.extend_from_slice(packet);
        }

        header.push(lacing.len() as u8);
        header.extend_from_slice(&lacing);

        write_page_checksum(&mut header, &body);

        header.extend_from_slice(&body);
        header
    }

    #[test]
    fn verify_read_page_header_fields() {
        let mut header = Vec::new();
        header.extend_from_slice(b"OggS");
        header.push(0);
        header.push(0x02);
        // A granule position of 1.
        header.extend_from_slice(&[1, 0, 0, 0, 0, 0, 0, 0]);
        header.extend_from_slice(&0xdead_beefu32.to_le_bytes());
        // A page sequence of -1 as a signed 32-bit value.
        header.extend_from_slice(&[0xff; 4]);
        header.extend_from_slice(&[0u8; 4]);
        header.push(0);

        let parsed = read_page_header(&mut BufReader::new(&header)).unwrap();

        assert_eq!(parsed.absgp, Some(1));
        assert_eq!(parsed.serial, 0xdead_beef);
        assert_eq!(parsed.sequence, 0xffff_ffff);
        assert!(parsed.is_first_page);
        assert!(!parsed.is_continuation);
        assert!(!parsed.is_last_page);
    }

    #[test]
    fn verify_read_page_header_absgp_none() {
        let mut header = Vec::new();
        header.extend_from_slice(b"OggS");
        header.push(0);
        header.push(0);
        header.extend_from_slice(&[0xff; 8]);
        header.extend_from_slice(&[0u8; 12]);
        header.push(0);

        let parsed = read_page_header(&mut BufReader::new(&header)).unwrap();

        assert_eq!(parsed.absgp, None);
    }

    #[test]
    fn verify_read_page_header_rejects_bad_framing() {
        // Non-zero version.
        let mut header = vec![b'O', b'g', b'g', b'S', 1, 0];
        header.extend_from_slice(&[0u8; 21]);
        assert!(read_page_header(&mut BufReader::new(&header)).is_err());

        // Flag bits above the low 3.
        let mut header = vec![b'O', b'g', b'g', b'S', 0, 0x08];
        header.extend_from_slice(&[0u8; 21]);
        assert!(read_page_header(&mut BufReader::new(&header)).is_err());
    }

    #[test]
    fn verify_page_checksum_roundtrip() {
        let page = build_page(0x02, 0, 0x1234, 0, &[b"hello", b"world"]);

        let mut reader = BufReader::new(&page);
        let pages = PageReader::try_new(&mut reader).unwrap();

        assert_eq!(pages.header().serial, 0x1234);

        let packets: Vec<&[u8]> = pages.page().packets().collect();
        assert_eq!(packets, vec![b"hello".as_slice(), b"world".as_slice()]);
    }

    #[test]
    fn verify_page_packets_outlive_page_view() {
        let page = build_page(0x02, 0, 0x1234, 0, &[b"alpha", b"beta"]);

        let mut reader = BufReader::new(&page);
        let pages = PageReader::try_new(&mut reader).unwrap();

        // The temporary `Page` view is dropped at the end of this statement, but the iterator
        // borrows the reader's page buffer and remains usable.
        let packets = pages.page().packets();

        let collected: Vec<&[u8]> = packets.collect();
        assert_eq!(collected, vec![b"alpha".as_slice(), b"beta".as_slice()]);
    }

    #[test]
    fn verify_page_reader_rejects_bad_crc() {
        let mut page = build_page(0x02, 0, 0x1234, 0, &[b"hello"]);

        // Flip one bit of the body.
        let last = page.len() - 1;
        page[last] ^= 0x80;

        let mut reader = BufReader::new(&page);

        match PageReader::try_new(&mut reader) {
            Err(Error::CorruptPage(_)) => (),
            _ => panic!("expected corrupt page error"),
        }
    }

    #[test]
    fn verify_page_reader_resyncs_after_bad_crc() {
        // A corrupt page followed by a valid page.
        let mut data = build_page(0x02, 0, 0x1234, 0, &[b"bad"]);
        let last = data.len() - 1;
        data[last] ^= 0x80;

        data.extend_from_slice(&build_page(0, 0, 0x1234, 1, &[b"good"]));

        let mut reader = BufReader::new(&data);
        let mut pages = PageReader {
            header: Default::default(),
            packet_lens: Vec::new(),
            page_buf: Vec::new(),
            page_buf_len: 0,
        };

        // Skips the corrupt page and lands on the valid one.
        pages.next_page(&mut reader).unwrap();

        assert_eq!(pages.header().sequence, 1);

        let packets: Vec<&[u8]> = pages.page().packets().collect();
        assert_eq!(packets, vec![b"good".as_slice()]);
    }
}
