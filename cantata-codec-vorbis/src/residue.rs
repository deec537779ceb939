// Cantata
// Copyright (c) 2026 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cmp::min;
use std::io;

use cantata_core::errors::{decode_error, malformed_setup_error, Error, Result};
use cantata_core::io::{BitReaderRtl, ReadBitsRtl};

use super::codebook::VorbisCodebook;
use super::common::BitSet256;
use super::dsp::DspChannel;

/// A reader function for one residue format variant.
pub type ResidueReader = fn(bs: &mut BitReaderRtl<'_>, max_codebook: usize) -> Result<Residue>;

/// The fixed registry of residue formats, indexed by the residue type read from the setup header.
pub const RESIDUE_FORMATS: [ResidueReader; 3] =
    [Residue::try_read_format0, Residue::try_read_format1, Residue::try_read_format2];

/// Reads the residue with the given type tag. A tag outside the registry fails immediately.
pub fn read_residue_setup(
    bs: &mut BitReaderRtl<'_>,
    residue_type: u32,
    max_codebook: usize,
) -> Result<Residue> {
    match RESIDUE_FORMATS.get(residue_type as usize) {
        Some(reader) => reader(bs, max_codebook),
        None => malformed_setup_error("vorbis: invalid residue type"),
    }
}

/// Drops the channels marked do-not-decode from the set of residue channels, preserving the order
/// of the remainder. Returns the number of channels left.
pub fn compact_channels(
    residue_channels: &BitSet256,
    channels: &[DspChannel],
    out: &mut Vec<u8>,
) -> usize {
    out.clear();

    for ch_idx in residue_channels.iter() {
        if !channels[ch_idx].do_not_decode {
            out.push(ch_idx as u8);
        }
    }

    out.len()
}

#[derive(Debug, Default)]
struct ResidueVqClass {
    books: [u8; 8],
    is_used: u8,
}

impl ResidueVqClass {
    #[inline(always)]
    fn is_used(&self, pass: usize) -> bool {
        debug_assert!(pass < 8);
        self.is_used & (1 << pass) != 0
    }
}

#[derive(Debug)]
struct ResidueSetup {
    /// The residue format.
    residue_type: u16,
    /// The residue's starting offset.
    residue_begin: u32,
    /// The residue's ending offset.
    residue_end: u32,
    /// Residue partition size (max. value 2^24).
    residue_partition_size: u32,
    /// Residue classifications (max. value 64).
    residue_classifications: u8,
    /// Codebook for reading partition classifications.
    residue_classbook: u8,
    /// Codebooks for each partition classification.
    residue_vq_class: Vec<ResidueVqClass>,
}

/// `ResidueScratch` is a working-area that may be reused by many `Residue`s to reduce overall
/// memory consumption.
#[derive(Default)]
pub struct ResidueScratch {
    /// Classifications vector.
    part_classes: Vec<u8>,
    /// Vector to read interleaved format 2 residuals.
    buf: Vec<f32>,
    /// The channels left after dropping those marked do-not-decode.
    decode_channels: Vec<u8>,
}

impl ResidueScratch {
    /// Ensures the scratch pad has enough storage for `len` partition classes.
    #[inline(always)]
    fn reserve_part_classes(&mut self, len: usize) {
        if self.part_classes.len() < len {
            self.part_classes.resize(len, Default::default());
        }
    }

    /// Ensures the scratch buffer can accomodate `len`.
    #[inline(always)]
    fn reserve_buf(&mut self, len: usize) {
        if self.buf.len() < len {
            self.buf.resize(len, Default::default());
        }
    }
}

#[derive(Debug)]
pub struct Residue {
    setup: ResidueSetup,
}

impl Residue {
    pub fn try_read_format0(bs: &mut BitReaderRtl<'_>, max_codebook: usize) -> Result<Self> {
        Self::try_read(bs, 0, max_codebook)
    }

    pub fn try_read_format1(bs: &mut BitReaderRtl<'_>, max_codebook: usize) -> Result<Self> {
        Self::try_read(bs, 1, max_codebook)
    }

    pub fn try_read_format2(bs: &mut BitReaderRtl<'_>, max_codebook: usize) -> Result<Self> {
        Self::try_read(bs, 2, max_codebook)
    }

    fn try_read(bs: &mut BitReaderRtl<'_>, residue_type: u16, max_codebook: usize) -> Result<Self> {
        let setup = Self::read_setup(bs, residue_type, max_codebook)?;

        Ok(Residue { setup })
    }

    fn read_setup(
        bs: &mut BitReaderRtl<'_>,
        residue_type: u16,
        max_codebook: usize,
    ) -> Result<ResidueSetup> {
        let residue_begin = bs.read_bits_leq32(24)?;
        let residue_end = bs.read_bits_leq32(24)?;
        let residue_partition_size = bs.read_bits_leq32(24)? + 1;
        let residue_classifications = bs.read_bits_leq32(6)? as u8 + 1;
        let residue_classbook = bs.read_bits_leq32(8)? as u8;

        if residue_end < residue_begin {
            return malformed_setup_error("vorbis: invalid residue begin and end");
        }

        if usize::from(residue_classbook) >= max_codebook {
            return malformed_setup_error("vorbis: invalid classification codebook for residue");
        }

        let mut residue_vq_books = Vec::<ResidueVqClass>::new();

        for _ in 0..residue_classifications {
            let low_bits = bs.read_bits_leq32(3)? as u8;

            let high_bits = if bs.read_bit()? { bs.read_bits_leq32(5)? as u8 } else { 0 };

            let is_used = (high_bits << 3) | low_bits;

            residue_vq_books.push(ResidueVqClass { is_used, books: [0; 8] });
        }

        for vq_books in &mut residue_vq_books {
            // For each set of residue codebooks, if the codebook is used, read the codebook
            // number.
            for (j, book) in vq_books.books.iter_mut().enumerate() {
                // Is a codebook used?
                let is_codebook_used = vq_books.is_used & (1 << j) != 0;

                if is_codebook_used {
                    // Read the codebook number.
                    *book = bs.read_bits_leq32(8)? as u8;

                    // The codebook number cannot be 0 or exceed the number of codebooks in this
                    // stream.
                    if *book == 0 || usize::from(*book) >= max_codebook {
                        return malformed_setup_error("vorbis: invalid codebook for residue");
                    }
                }
            }
        }

        let residue = ResidueSetup {
            residue_type,
            residue_begin,
            residue_end,
            residue_partition_size,
            residue_classifications,
            residue_classbook,
            residue_vq_class: residue_vq_books,
        };

        Ok(residue)
    }

    pub fn read_residue(
        &self,
        bs: &mut BitReaderRtl<'_>,
        bs_exp: u8,
        codebooks: &[VorbisCodebook],
        residue_channels: &BitSet256,
        scratch: &mut ResidueScratch,
        channels: &mut [DspChannel],
    ) -> Result<()> {
        // Read the residue, and ignore end-of-bitstream errors which are legal.
        match self.read_residue_inner(bs, bs_exp, codebooks, residue_channels, scratch, channels) {
            Ok(_) => (),
            // An end-of-bitstream error is classified under ErrorKind::Other. This condition
            // should not be treated as an error.
            Err(Error::IoError(ref e)) if e.kind() == io::ErrorKind::Other => (),
            Err(e) => return Err(e),
        };

        if self.setup.residue_type == 2 {
            // For format 2, the residue vectors for all channels are interleaved together into one
            // large vector. This vector is in the scratch-pad buffer and can now be de-interleaved
            // into the channel buffers. The interleave stride spans every channel in the set, even
            // those marked do-not-decode.
            let stride = residue_channels.count();

            for (i, channel_idx) in residue_channels.iter().enumerate() {
                let channel = &mut channels[channel_idx];

                let iter = scratch.buf.chunks_exact(stride).map(|c| c[i]);

                for (o, i) in channel.residue.iter_mut().zip(iter) {
                    *o = i;
                }
            }
        }

        Ok(())
    }

    fn read_residue_inner(
        &self,
        bs: &mut BitReaderRtl<'_>,
        bs_exp: u8,
        codebooks: &[VorbisCodebook],
        residue_channels: &BitSet256,
        scratch: &mut ResidueScratch,
        channels: &mut [DspChannel],
    ) -> Result<()> {
        let is_fmt2 = self.setup.residue_type == 2;

        // The actual length of the entire residue vector for a channel (formats 0 and 1), or all
        // interleaved channels (format 2).
        let actual_size = match self.setup.residue_type {
            2 => ((1 << bs_exp) >> 1) * residue_channels.count(),
            _ => (1 << bs_exp) >> 1,
        };

        // The range of the residue vector being encoded.
        let limit_residue_begin = min(self.setup.residue_begin as usize, actual_size);
        let limit_residue_end = min(self.setup.residue_end as usize, actual_size);

        // Length of the coded (non-zero) part of the residue vector.
        let residue_len = limit_residue_end - limit_residue_begin;

        if is_fmt2 {
            // Reserve interleave buffer storage in the scratch-pad and zero it. The de-interleave
            // always runs, so this also zeroes the channel residues when nothing is decoded.
            scratch.reserve_buf(actual_size);
            scratch.buf[..actual_size].fill(0.0);
        }
        else {
            // Zero the residue of every channel in the set.
            for j in residue_channels.iter() {
                channels[j].residue[..actual_size].fill(0.0);
            }
        }

        // Drop the channels that are marked do-not-decode. If none remain, the residue carries no
        // data for this block and is skipped entirely.
        let num_decode_channels =
            compact_channels(residue_channels, channels, &mut scratch.decode_channels);

        if num_decode_channels == 0 {
            return Ok(());
        }

        let class_book = &codebooks[usize::from(self.setup.residue_classbook)];

        // Partitions per classword.
        let parts_per_classword = usize::from(class_book.dimensions());

        if parts_per_classword == 0 {
            return decode_error("vorbis: residue classification codebook has no dimensions");
        }

        // Partitions to read.
        let parts_to_read = residue_len / self.setup.residue_partition_size as usize;

        // Classwords decode in full, so round each channel's classification region up to a whole
        // number of classwords to keep the last classword from spilling into the next region.
        let class_region_len =
            parts_per_classword * ((parts_to_read + parts_per_classword - 1) / parts_per_classword);

        // Setup the scratch-pad. For format 2 there is a single classification list shared by all
        // channels.
        if is_fmt2 {
            scratch.reserve_part_classes(class_region_len);
        }
        else {
            scratch.reserve_part_classes(class_region_len * num_decode_channels);
        }

        let ResidueScratch { part_classes, buf, decode_channels } = scratch;

        // Residues may be encoded in up-to 8 passes. Fewer passes may be encoded by prematurely
        // "ending" the packet. This means that an end-of-bitstream error is actually NOT an error.
        for pass in 0..8 {
            // The number of partitions that can be read at once is limited by the number of
            // partitions per classword. Therefore, read partitions in batches of size
            // parts_per_classword.
            for p_start in (0..parts_to_read).step_by(parts_per_classword) {
                // The classifications for each partition are only encoded in the first pass.
                // Ultimately, this encoding strategy is what forces us to process in batches.
                if pass == 0 {
                    if is_fmt2 {
                        let code = class_book.read_scalar(bs)?;

                        decode_classes(
                            code,
                            parts_per_classword as u16,
                            u32::from(self.setup.residue_classifications),
                            &mut part_classes[p_start..],
                        );
                    }
                    else {
                        for (i, _) in decode_channels.iter().enumerate() {
                            let code = class_book.read_scalar(bs)?;

                            decode_classes(
                                code,
                                parts_per_classword as u16,
                                u32::from(self.setup.residue_classifications),
                                &mut part_classes[p_start + i * class_region_len..],
                            );
                        }
                    }
                }

                // The last partition in this batch of partitions, being careful not to exceed the
                // total number of partitions.
                let p_end = min(parts_to_read, p_start + parts_per_classword);

                let part_size = self.setup.residue_partition_size as usize;

                // Read each partition.
                for p in p_start..p_end {
                    let offset = limit_residue_begin + part_size * p;

                    if is_fmt2 {
                        // Format 2 reads one interleaved vector covering all channels.
                        let vq_class = &self.setup.residue_vq_class[usize::from(part_classes[p])];

                        if vq_class.is_used(pass) {
                            let vq_book = &codebooks[usize::from(vq_class.books[pass])];

                            // Residue format 2 is read like format 1.
                            read_residue_partition_format1(
                                bs,
                                vq_book,
                                &mut buf[offset..offset + part_size],
                            )?;
                        }
                    }
                    else {
                        for (i, &channel_idx) in decode_channels.iter().enumerate() {
                            let class_idx = usize::from(part_classes[p + class_region_len * i]);
                            let vq_class = &self.setup.residue_vq_class[class_idx];

                            if vq_class.is_used(pass) {
                                let vq_book = &codebooks[usize::from(vq_class.books[pass])];

                                let ch = &mut channels[usize::from(channel_idx)];

                                match self.setup.residue_type {
                                    0 => read_residue_partition_format0(
                                        bs,
                                        vq_book,
                                        &mut ch.residue[offset..offset + part_size],
                                    ),
                                    _ => read_residue_partition_format1(
                                        bs,
                                        vq_book,
                                        &mut ch.residue[offset..offset + part_size],
                                    ),
                                }?;
                            }
                        }
                    }
                }
                // End of partition batch iteration.
            }
            // End of pass iteration.
        }

        Ok(())
    }
}

fn decode_classes(mut val: u32, class_words: u16, classifications: u32, out: &mut [u8]) {
    // The classword encodes the classification of the last partition in its least-significant
    // digit, so fill in reverse.
    for (_, out) in (0..usize::from(class_words)).zip(out).rev() {
        *out = (val % classifications) as u8;
        val /= classifications;
    }
}

fn read_residue_partition_format0(
    bs: &mut BitReaderRtl<'_>,
    codebook: &VorbisCodebook,
    out: &mut [f32],
) -> Result<()> {
    let step = out.len() / usize::from(codebook.dimensions());

    for i in 0..step {
        let vq = codebook.read_vq(bs)?;

        for (o, &v) in out[i..].iter_mut().step_by(step).zip(vq) {
            *o += v;
        }
    }

    Ok(())
}

#[inline(always)]
fn read_residue_partition_format1(
    bs: &mut BitReaderRtl<'_>,
    codebook: &VorbisCodebook,
    out: &mut [f32],
) -> Result<()> {
    let dimensions = usize::from(codebook.dimensions());

    for out in out.chunks_exact_mut(dimensions) {
        let vq = codebook.read_vq(bs)?;

        for (o, &v) in out.iter_mut().zip(vq) {
            *o += v;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{compact_channels, decode_classes, read_residue_setup};
    use crate::common::BitSet256;
    use crate::dsp::DspChannel;
    use cantata_core::errors::Error;
    use cantata_core::io::BitReaderRtl;

    #[derive(Default)]
    struct BitWriter {
        buf: Vec<u8>,
        pos: usize,
    }

    impl BitWriter {
        fn write(&mut self, value: u32, count: u32) {
            for i in 0..count {
                let byte = self.pos >> 3;
                if byte == self.buf.len() {
                    self.buf.push(0);
                }
                self.buf[byte] |= (((value >> i) & 1) as u8) << (self.pos & 0x7);
                self.pos += 1;
            }
        }
    }

    fn make_channels(do_not_decode: &[bool]) -> Vec<DspChannel> {
        do_not_decode
            .iter()
            .map(|&dnd| {
                let mut channel = DspChannel::new(4);
                channel.do_not_decode = dnd;
                channel
            })
            .collect()
    }

    #[test]
    fn verify_compact_channels() {
        let channels = make_channels(&[true, false, true, false]);

        let mut residue_channels: BitSet256 = Default::default();
        for i in 0..4 {
            residue_channels.set(i);
        }

        let mut compacted = Vec::new();
        let used = compact_channels(&residue_channels, &channels, &mut compacted);

        assert_eq!(used, 2);
        assert_eq!(compacted, vec![1, 3]);
    }

    #[test]
    fn verify_residue_skipped_when_all_channels_unused() {
        let mut bw = BitWriter::default();
        bw.write(0, 24); // residue begin
        bw.write(16, 24); // residue end
        bw.write(3, 24); // partition size - 1
        bw.write(0, 6); // classifications - 1
        bw.write(0, 8); // classbook
        bw.write(1, 3); // pass 0 is used
        bw.write(0, 1); // no high bits
        bw.write(1, 8); // codebook for pass 0

        let mut bs = BitReaderRtl::new(&bw.buf);
        let residue = read_residue_setup(&mut bs, 0, 2).unwrap();

        let mut channels = make_channels(&[true, true]);

        for channel in channels.iter_mut() {
            channel.residue.fill(1.0);
        }

        let mut residue_channels: BitSet256 = Default::default();
        residue_channels.set(0);
        residue_channels.set(1);

        // With every channel marked do-not-decode the bitstream is not touched at all, so an
        // empty bitstream must succeed.
        let mut bs = BitReaderRtl::new(&[]);
        let mut scratch = Default::default();

        residue
            .read_residue(&mut bs, 4, &[], &residue_channels, &mut scratch, &mut channels)
            .unwrap();

        // The residues are still zeroed.
        for channel in channels.iter() {
            assert!(channel.residue.iter().all(|&s| s == 0.0));
        }
    }

    #[test]
    fn verify_read_residue_setup() {
        let mut bw = BitWriter::default();
        bw.write(8, 24); // residue begin
        bw.write(136, 24); // residue end
        bw.write(15, 24); // partition size - 1
        bw.write(1, 6); // classifications - 1
        bw.write(0, 8); // classbook
        bw.write(1, 3); // class 0: pass 0 is used
        bw.write(0, 1);
        bw.write(0, 3); // class 1: no passes used
        bw.write(0, 1);
        bw.write(1, 8); // class 0, pass 0 codebook

        let mut bs = BitReaderRtl::new(&bw.buf);
        let residue = read_residue_setup(&mut bs, 1, 2).unwrap();

        assert_eq!(residue.setup.residue_type, 1);
        assert_eq!(residue.setup.residue_begin, 8);
        assert_eq!(residue.setup.residue_end, 136);
        assert_eq!(residue.setup.residue_partition_size, 16);
        assert_eq!(residue.setup.residue_classifications, 2);
        assert_eq!(residue.setup.residue_vq_class[0].books[0], 1);
    }

    #[test]
    fn verify_read_residue_setup_rejects_unknown_format() {
        let buf = [0u8; 16];
        let mut bs = BitReaderRtl::new(&buf);

        match read_residue_setup(&mut bs, 3, 1) {
            Err(Error::MalformedSetup(_)) => (),
            _ => panic!("expected malformed setup error"),
        }
    }

    #[test]
    fn verify_decode_classes() {
        let mut out = [0u8; 4];

        // 1234 in base-10 digits, most-significant digit first.
        decode_classes(1234, 4, 10, &mut out);
        assert_eq!(out, [1, 2, 3, 4]);

        // With 2 classifications the classword decodes bit-per-partition.
        let mut out = [0u8; 4];
        decode_classes(0b1101, 4, 2, &mut out);
        assert_eq!(out, [1, 1, 0, 1]);
    }
}
