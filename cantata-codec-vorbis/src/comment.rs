// Cantata
// Copyright (c) 2026 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use cantata_core::errors::{limit_error, malformed_setup_error, Result};
use cantata_core::io::{FiniteStream, ReadBytes};

/// The packet type for a comment header.
const VORBIS_PACKET_TYPE_COMMENT: u8 = 3;

/// The common header packet signature.
const VORBIS_HEADER_PACKET_SIGNATURE: &[u8] = b"vorbis";

/// The parsed comment (metadata) header.
#[derive(Debug)]
pub struct CommentHeader {
    /// The vendor string of the encoder.
    pub vendor: String,
    /// The user comments, each nominally a `NAME=value` pair.
    pub comments: Vec<String>,
}

/// Reads the comment header from a packet.
///
/// Comment strings are specified to be UTF-8, but encoders in the wild do write other encodings.
/// Invalid sequences are replaced rather than rejected so that one bad tag does not fail the whole
/// stream.
pub fn read_comment_header<B: ReadBytes + FiniteStream>(reader: &mut B) -> Result<CommentHeader> {
    // The packet type must be a comment header.
    let packet_type = reader.read_u8()?;

    if packet_type != VORBIS_PACKET_TYPE_COMMENT {
        return malformed_setup_error("vorbis: invalid packet type for comment header");
    }

    // Next, the header packet signature must be correct.
    let mut packet_sig_buf = [0; 6];
    reader.read_buf_exact(&mut packet_sig_buf)?;

    if packet_sig_buf != VORBIS_HEADER_PACKET_SIGNATURE {
        return malformed_setup_error("vorbis: invalid header signature");
    }

    let vendor = read_length_prefixed_string(reader)?;

    let num_comments = reader.read_u32()? as usize;

    let mut comments = Vec::with_capacity(num_comments.min(1024));

    for _ in 0..num_comments {
        comments.push(read_length_prefixed_string(reader)?);
    }

    // Framing flag must be set.
    if reader.read_u8()? & 0x1 != 0x1 {
        return malformed_setup_error("vorbis: comment header framing flag unset");
    }

    Ok(CommentHeader { vendor, comments })
}

/// Reads a length-prefixed string with lossy UTF-8 conversion.
///
/// The declared length is untrusted and must be checked against the bytes remaining in the packet
/// before any allocation is made for it.
fn read_length_prefixed_string<B: ReadBytes + FiniteStream>(reader: &mut B) -> Result<String> {
    let len = u64::from(reader.read_u32()?);

    if len > reader.bytes_available() {
        return limit_error("vorbis: comment header string length exceeds packet");
    }

    let bytes = reader.read_boxed_slice_exact(len as usize)?;

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::read_comment_header;
    use cantata_core::io::BufReader;

    fn build_comment_packet(vendor: &str, comments: &[&str]) -> Vec<u8> {
        let mut buf = Vec::new();

        buf.push(3);
        buf.extend_from_slice(b"vorbis");
        buf.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
        buf.extend_from_slice(vendor.as_bytes());
        buf.extend_from_slice(&(comments.len() as u32).to_le_bytes());

        for comment in comments {
            buf.extend_from_slice(&(comment.len() as u32).to_le_bytes());
            buf.extend_from_slice(comment.as_bytes());
        }

        buf.push(1);
        buf
    }

    #[test]
    fn verify_read_comment_header() {
        let buf = build_comment_packet("encoder v1.0", &["TITLE=A Song", "ARTIST=Someone"]);

        let header = read_comment_header(&mut BufReader::new(&buf)).unwrap();

        assert_eq!(header.vendor, "encoder v1.0");
        assert_eq!(header.comments, vec!["TITLE=A Song", "ARTIST=Someone"]);
    }

    #[test]
    fn verify_read_comment_header_replaces_invalid_utf8() {
        let mut buf = build_comment_packet("vendor", &["TITLE=????"]);

        // Corrupt the comment's last four bytes.
        let at = buf.len() - 5;
        buf[at..at + 4].copy_from_slice(&[0xff, 0xfe, 0xff, 0xfe]);

        let header = read_comment_header(&mut BufReader::new(&buf)).unwrap();

        assert!(header.comments[0].starts_with("TITLE="));
        assert!(header.comments[0].contains('\u{fffd}'));
    }

    #[test]
    fn verify_read_comment_header_rejects_oversized_lengths() {
        use cantata_core::errors::Error;

        // A tiny packet declaring a near 4 GB vendor string must be rejected before any
        // allocation is made for it.
        let mut buf = Vec::new();
        buf.push(3);
        buf.extend_from_slice(b"vorbis");
        buf.extend_from_slice(&u32::MAX.to_le_bytes());

        match read_comment_header(&mut BufReader::new(&buf)) {
            Err(Error::LimitError(_)) => (),
            _ => panic!("expected limit error"),
        }

        // Likewise for an individual comment length.
        let mut buf = build_comment_packet("vendor", &["A=B"]);

        // Overwrite the length field of the 3 byte comment.
        let at = buf.len() - 8;
        buf[at..at + 4].copy_from_slice(&0x4000_0000u32.to_le_bytes());

        match read_comment_header(&mut BufReader::new(&buf)) {
            Err(Error::LimitError(_)) => (),
            _ => panic!("expected limit error"),
        }
    }

    #[test]
    fn verify_read_comment_header_rejects_unset_framing() {
        let mut buf = build_comment_packet("vendor", &[]);

        *buf.last_mut().unwrap() = 0;

        assert!(read_comment_header(&mut BufReader::new(&buf)).is_err());
    }
}
