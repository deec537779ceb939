// Cantata
// Copyright (c) 2026 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use cantata_core::errors::Result;
use cantata_core::formats::Packet;
use cantata_core::io::{ReadBytes, SeekBuffered};

use super::physical::PhysicalStream;

/// An OGG demuxer.
///
/// `OggReader` deframes CRC-validated pages from a physical OGG stream and reassembles them into
/// the packets of the multiplexed logical streams.
pub struct OggReader<B: ReadBytes + SeekBuffered> {
    reader: B,
    physical: PhysicalStream,
}

impl<B: ReadBytes + SeekBuffered> OggReader<B> {
    /// Attempts to instantiate an `OggReader` for the provided stream. The stream must begin with,
    /// or close to, a valid OGG page.
    pub fn try_new(mut reader: B) -> Result<Self> {
        let physical = PhysicalStream::try_new(&mut reader)?;

        Ok(OggReader { reader, physical })
    }

    /// Gets the next packet of any logical stream, or `None` at the end of the physical stream.
    pub fn next_packet(&mut self) -> Result<Option<Packet>> {
        let packet = self.physical.next_packet(&mut self.reader)?;

        if packet.is_some() {
            self.physical.consume_packet();
        }

        Ok(packet)
    }

    /// Consumes the demuxer and returns the underlying stream.
    pub fn into_inner(self) -> B {
        self.reader
    }
}

#[cfg(test)]
mod tests {
    use super::OggReader;
    use crate::page::write_page_checksum;
    use cantata_core::io::BufReader;

    fn build_page(
        flags: u8,
        absgp: u64,
        serial: u32,
        sequence: u32,
        lacing: &[u8],
        body: &[u8],
    ) -> Vec<u8> {
        let mut header = Vec::new();
        header.extend_from_slice(b"OggS");
        header.push(0);
        header.push(flags);
        header.extend_from_slice(&absgp.to_le_bytes());
        header.extend_from_slice(&serial.to_le_bytes());
        header.extend_from_slice(&sequence.to_le_bytes());
        header.extend_from_slice(&[0u8; 4]);
        header.push(lacing.len() as u8);
        header.extend_from_slice(lacing);

        write_page_checksum(&mut header, body);

        header.extend_from_slice(body);
        header
    }

    #[test]
    fn verify_demux_single_stream() {
        let mut data = build_page(0x02, u64::MAX, 0x1, 0, &[5], b"first");
        data.extend_from_slice(&build_page(0x04, 100, 0x1, 1, &[6], b"second"));

        let mut ogg = OggReader::try_new(BufReader::new(&data)).unwrap();

        let packet = ogg.next_packet().unwrap().unwrap();
        assert_eq!(packet.buf(), b"first");
        assert_eq!(packet.seqno, 0);
        assert!(packet.start_of_stream);

        let packet = ogg.next_packet().unwrap().unwrap();
        assert_eq!(packet.buf(), b"second");
        assert_eq!(packet.seqno, 1);
        assert_eq!(packet.absgp, Some(100));
        assert!(packet.end_of_stream);

        assert!(ogg.next_packet().unwrap().is_none());
    }

    #[test]
    fn verify_demux_packet_spanning_pages() {
        // A 300 byte packet spans two pages: 255 bytes on the first, 45 on the second.
        let body = vec![0x5a; 300];

        let mut data = build_page(0x02, u64::MAX, 0x1, 0, &[255], &body[..255]);
        data.extend_from_slice(&build_page(0x01, 300, 0x1, 1, &[45], &body[255..]));

        let mut ogg = OggReader::try_new(BufReader::new(&data)).unwrap();

        let packet = ogg.next_packet().unwrap().unwrap();
        assert_eq!(packet.buf().len(), 300);
        assert_eq!(packet.absgp, Some(300));

        assert!(ogg.next_packet().unwrap().is_none());
    }

    #[test]
    fn verify_demux_multiplexed_streams() {
        let mut data = build_page(0x02, u64::MAX, 0xa, 0, &[2], b"a0");
        data.extend_from_slice(&build_page(0x02, u64::MAX, 0xb, 0, &[2], b"b0"));
        data.extend_from_slice(&build_page(0x04, 10, 0xa, 1, &[2], b"a1"));
        data.extend_from_slice(&build_page(0x04, 20, 0xb, 1, &[2], b"b1"));

        let mut ogg = OggReader::try_new(BufReader::new(&data)).unwrap();

        let mut packets = Vec::new();

        while let Some(packet) = ogg.next_packet().unwrap() {
            packets.push((packet.serial(), packet.buf().to_vec()));
        }

        assert_eq!(
            packets,
            vec![
                (0xa, b"a0".to_vec()),
                (0xb, b"b0".to_vec()),
                (0xa, b"a1".to_vec()),
                (0xb, b"b1".to_vec()),
            ]
        );
    }
}
