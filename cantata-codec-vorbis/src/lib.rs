// Cantata
// Copyright (c) 2026 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A Vorbis decoder.
//!
//! The decoder is fed the three mandatory header packets once at construction, then produces one
//! planar audio buffer per audio packet.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]
#![allow(clippy::excessive_precision)]
// Disable to better express the Vorbis I specification.
#![allow(clippy::collapsible_else_if)]

use cantata_core::audio::{AudioBuffer, Channels, SignalSpec};
use cantata_core::dsp::mdct::Imdct;
use cantata_core::errors::{
    decode_error, malformed_setup_error, unsupported_error, Result,
};
use cantata_core::formats::Packet;
use cantata_core::io::{BitReaderRtl, BufReader, FiniteBitStream, ReadBitsRtl, ReadBytes};

use log::{debug, warn};

mod codebook;
mod comment;
mod common;
mod dsp;
mod floor;
mod mapping;
mod residue;
mod time;
mod window;

pub use comment::CommentHeader;

use codebook::VorbisCodebook;
use comment::read_comment_header;
use common::ilog;
use dsp::{Dsp, DspChannel, LappingState};
use floor::{read_floor, Floor};
use mapping::{read_mapping, Mapping};
use residue::{read_residue_setup, Residue};
use time::read_time;
use window::Windows;

/// A Vorbis decoder.
pub struct VorbisDecoder {
    /// Identification header.
    ident: IdentHeader,
    /// Comment header.
    comments: CommentHeader,
    /// Codebooks (max. 256).
    codebooks: Vec<VorbisCodebook>,
    /// Floors (max. 64).
    floors: Vec<Box<dyn Floor>>,
    /// Residues (max. 64).
    residues: Vec<Residue>,
    /// Mappings (max. 64).
    mappings: Vec<Mapping>,
    /// Modes (max. 64).
    modes: Vec<Mode>,
    /// DSP state.
    dsp: Dsp,
    /// Output buffer.
    buf: AudioBuffer,
    /// The sequence number of the last decoded packet.
    prev_seqno: Option<u64>,
}

impl VorbisDecoder {
    /// Instantiates a decoder from the three mandatory header packets: identification, comment,
    /// and setup, in that order.
    pub fn try_new(ident_pkt: &Packet, comment_pkt: &Packet, setup_pkt: &Packet) -> Result<Self> {
        let ident = read_ident_header(&mut ident_pkt.as_buf_reader())?;
        let comments = read_comment_header(&mut comment_pkt.as_buf_reader())?;
        let setup = read_setup(&mut setup_pkt.as_buf_reader(), &ident)?;

        // Static DSP data.
        let windows = Windows::new(1 << ident.bs0_exp, 1 << ident.bs1_exp);

        // Dynamic DSP state for each channel.
        let dsp_channels = (0..ident.n_channels).map(|_| DspChannel::new(ident.bs1_exp)).collect();

        // Map the channels.
        let channels = match vorbis_channels_to_channels(ident.n_channels) {
            Some(channels) => channels,
            _ => return unsupported_error("vorbis: unsupported channel layout"),
        };

        let spec = SignalSpec::new(ident.sample_rate, channels);

        let imdct_short = Imdct::new((1 << ident.bs0_exp) >> 1);
        let imdct_long = Imdct::new((1 << ident.bs1_exp) >> 1);

        // A block yields at most half a long block of frames per channel.
        let duration = 1u64 << ident.bs1_exp;

        let dsp = Dsp {
            channels: dsp_channels,
            residue_scratch: Default::default(),
            imdct_short,
            imdct_long,
            windows,
            lapping_state: None,
        };

        Ok(VorbisDecoder {
            ident,
            comments,
            codebooks: setup.codebooks,
            floors: setup.floors,
            residues: setup.residues,
            mappings: setup.mappings,
            modes: setup.modes,
            dsp,
            buf: AudioBuffer::new(duration, spec),
            prev_seqno: None,
        })
    }

    /// Gets the signal specification of the decoded audio.
    pub fn spec(&self) -> &SignalSpec {
        self.buf.spec()
    }

    /// Gets the comment header.
    pub fn comments(&self) -> &CommentHeader {
        &self.comments
    }

    /// Gets the last decoded audio buffer.
    pub fn last_decoded(&self) -> &AudioBuffer {
        &self.buf
    }

    /// Resets the decoder after a discontinuity such as a seek. The block following a reset yields
    /// no audio since there is no previous block to lap onto.
    pub fn reset(&mut self) {
        self.dsp.reset();
        self.prev_seqno = None;
    }

    /// Decodes one audio packet into an audio buffer.
    ///
    /// A gap in packet sequence numbers indicates data was lost to stream corruption. The lapping
    /// state on either side of a gap is unrelated, so the DSP state is reset and decoding carries
    /// on from the new packet.
    pub fn decode(&mut self, packet: &Packet) -> Result<&AudioBuffer> {
        if let Some(prev_seqno) = self.prev_seqno {
            if is_discontinuity(prev_seqno, packet.seqno) {
                warn!(
                    "vorbis: sequence discontinuity (expected {}, got {})",
                    prev_seqno.wrapping_add(1),
                    packet.seqno
                );
                self.dsp.reset();
            }
        }

        self.prev_seqno = Some(packet.seqno);

        if let Err(e) = self.decode_block(packet) {
            self.buf.clear();
            Err(e)
        }
        else {
            Ok(&self.buf)
        }
    }

    fn decode_block(&mut self, packet: &Packet) -> Result<()> {
        let mut bs = BitReaderRtl::new(packet.buf());

        // Section 4.3.1 - Packet Type, Mode, and Window Decode

        // First bit must be 0 to indicate audio packet.
        if bs.read_bit()? {
            return decode_error("vorbis: not an audio packet");
        }

        let num_modes = self.modes.len() - 1;

        let mode_number = bs.read_bits_leq32(ilog(num_modes as u32))? as usize;

        if mode_number >= self.modes.len() {
            return decode_error("vorbis: invalid packet mode number");
        }

        let mode = &self.modes[mode_number];
        let block_flag = mode.block_flag;
        let mapping = &self.mappings[usize::from(mode.mapping)];

        let bs_exp = if block_flag {
            // This packet (block) uses a long window. Do not use the window flags since they may
            // be wrong.
            let _prev_window_flag = bs.read_bit()?;
            let _next_window_flag = bs.read_bit()?;

            self.ident.bs1_exp
        }
        else {
            // This packet (block) uses a short window.
            self.ident.bs0_exp
        };

        // Block size.
        let n = 1 << bs_exp;

        // Sections 4.3.2 to 4.3.6 - Floor Curve Decode through Dot Product
        mapping.inverse(
            &mut bs,
            bs_exp,
            &self.codebooks,
            &mut self.floors,
            &self.residues,
            &mut self.dsp,
        )?;

        // Combined Section 4.3.7 and 4.3.8 - Inverse MDCT and Overlap-add (Synthesis)
        self.buf.clear();

        // Calculate the output length and reserve space in the output buffer. If there was no
        // previous block, then return an empty audio buffer since the decoder will need another
        // block before being able to produce audio.
        if let Some(lap_state) = &self.dsp.lapping_state {
            let render_len = (lap_state.prev_block_size + n) >> 2;
            self.buf.render_reserved(Some(render_len));
        }

        let Dsp { channels, imdct_short, imdct_long, windows, lapping_state, .. } = &mut self.dsp;

        let imdct = if block_flag { imdct_long } else { imdct_short };

        // Render all the audio channels.
        for (i, channel) in channels.iter_mut().enumerate() {
            let out = self.buf.chan_mut(map_vorbis_channel(self.ident.n_channels, i));

            channel.synth(n, &*lapping_state, windows, imdct, out);
        }

        // Save the new lapping state.
        *lapping_state = Some(LappingState { prev_block_size: n });

        Ok(())
    }
}

/// Returns true if going from sequence number `prev` to `next` skips over any packets.
#[inline]
fn is_discontinuity(prev: u64, next: u64) -> bool {
    next != prev.wrapping_add(1)
}

#[derive(Debug)]
struct IdentHeader {
    n_channels: u8,
    sample_rate: u32,
    bs0_exp: u8,
    bs1_exp: u8,
}

/// The packet type for an identification header.
const VORBIS_PACKET_TYPE_IDENTIFICATION: u8 = 1;
/// The packet type for a setup header.
const VORBIS_PACKET_TYPE_SETUP: u8 = 5;

/// The common header packet signature.
const VORBIS_HEADER_PACKET_SIGNATURE: &[u8] = b"vorbis";

/// The Vorbis version supported by this decoder.
const VORBIS_VERSION: u32 = 0;

/// The minimum block size (64) expressed as a power-of-2 exponent.
const VORBIS_BLOCKSIZE_MIN: u8 = 6;
/// The maximum block size (8192) expressed as a power-of-2 exponent.
const VORBIS_BLOCKSIZE_MAX: u8 = 13;

fn read_ident_header<B: ReadBytes>(reader: &mut B) -> Result<IdentHeader> {
    // The packet type must be an identification header.
    let packet_type = reader.read_u8()?;

    if packet_type != VORBIS_PACKET_TYPE_IDENTIFICATION {
        return malformed_setup_error("vorbis: invalid packet type for identification header");
    }

    // Next, the header packet signature must be correct.
    let mut packet_sig_buf = [0; 6];
    reader.read_buf_exact(&mut packet_sig_buf)?;

    if packet_sig_buf != VORBIS_HEADER_PACKET_SIGNATURE {
        return malformed_setup_error("vorbis: invalid header signature");
    }

    // Next, the Vorbis version must be 0.
    let version = reader.read_u32()?;

    if version != VORBIS_VERSION {
        return unsupported_error("vorbis: only vorbis 1 is supported");
    }

    // Next, the number of channels and sample rate must be non-zero.
    let n_channels = reader.read_u8()?;

    if n_channels == 0 {
        return malformed_setup_error("vorbis: number of channels cannot be 0");
    }

    // The channel map covers at most 8 channels.
    if n_channels > 8 {
        return unsupported_error("vorbis: only a maximum of 8 channels are supported");
    }

    let sample_rate = reader.read_u32()?;

    if sample_rate == 0 {
        return malformed_setup_error("vorbis: sample rate cannot be 0");
    }

    // Read the bitrate range.
    let _bitrate_max = reader.read_u32()?;
    let _bitrate_nom = reader.read_u32()?;
    let _bitrate_min = reader.read_u32()?;

    // Next, blocksize_0 and blocksize_1 are packed into a single byte.
    let block_sizes = reader.read_u8()?;

    let bs0_exp = block_sizes & 0x0f;
    let bs1_exp = (block_sizes & 0xf0) >> 4;

    // The block sizes must not exceed the bounds.
    if bs0_exp < VORBIS_BLOCKSIZE_MIN || bs0_exp > VORBIS_BLOCKSIZE_MAX {
        return malformed_setup_error("vorbis: blocksize_0 out-of-bounds");
    }

    if bs1_exp < VORBIS_BLOCKSIZE_MIN || bs1_exp > VORBIS_BLOCKSIZE_MAX {
        return malformed_setup_error("vorbis: blocksize_1 out-of-bounds");
    }

    // Blocksize_0 must be <= blocksize_1.
    if bs0_exp > bs1_exp {
        return malformed_setup_error("vorbis: blocksize_0 exceeds blocksize_1");
    }

    // Framing flag must be set.
    if reader.read_u8()? != 0x1 {
        return malformed_setup_error("vorbis: ident header framing flag unset");
    }

    Ok(IdentHeader { n_channels, sample_rate, bs0_exp, bs1_exp })
}

struct Setup {
    codebooks: Vec<VorbisCodebook>,
    floors: Vec<Box<dyn Floor>>,
    residues: Vec<Residue>,
    mappings: Vec<Mapping>,
    modes: Vec<Mode>,
}

fn read_setup(reader: &mut BufReader<'_>, ident: &IdentHeader) -> Result<Setup> {
    // The packet type must be a setup header.
    let packet_type = reader.read_u8()?;

    if packet_type != VORBIS_PACKET_TYPE_SETUP {
        return malformed_setup_error("vorbis: invalid packet type for setup header");
    }

    // Next, the setup packet signature must be correct.
    let mut packet_sig_buf = [0; 6];
    reader.read_buf_exact(&mut packet_sig_buf)?;

    if packet_sig_buf != VORBIS_HEADER_PACKET_SIGNATURE {
        return malformed_setup_error("vorbis: invalid setup header signature");
    }

    // The remaining portion of the setup header packet is read bitwise.
    let mut bs = BitReaderRtl::new(reader.read_buf_bytes_available_ref());

    // Read codebooks.
    let codebooks = read_codebooks(&mut bs)?;

    // Read time-domain transforms (placeholders in Vorbis 1).
    read_time_transforms(&mut bs)?;

    // Read floors.
    let floors = read_floors(&mut bs, ident.bs0_exp, ident.bs1_exp, codebooks.len())?;

    // Read residues.
    let residues = read_residues(&mut bs, codebooks.len())?;

    // Read channel mappings.
    let mappings = read_mappings(&mut bs, ident.n_channels, floors.len(), residues.len())?;

    // Read modes.
    let modes = read_modes(&mut bs, mappings.len())?;

    // Framing flag must be set.
    if !bs.read_bit()? {
        return malformed_setup_error("vorbis: setup header framing flag unset");
    }

    if bs.bits_left() > 0 {
        debug!("vorbis: leftover bits in setup header");
    }

    Ok(Setup { codebooks, floors, residues, mappings, modes })
}

fn read_codebooks(bs: &mut BitReaderRtl<'_>) -> Result<Vec<VorbisCodebook>> {
    let count = bs.read_bits_leq32(8)? + 1;
    (0..count).map(|_| VorbisCodebook::read(bs)).collect()
}

fn read_time_transforms(bs: &mut BitReaderRtl<'_>) -> Result<()> {
    let count = bs.read_bits_leq32(6)? + 1;

    for _ in 0..count {
        let time_type = bs.read_bits_leq32(16)?;
        read_time(bs, time_type)?;
    }

    Ok(())
}

fn read_floors(
    bs: &mut BitReaderRtl<'_>,
    bs0_exp: u8,
    bs1_exp: u8,
    max_codebook: usize,
) -> Result<Vec<Box<dyn Floor>>> {
    let count = bs.read_bits_leq32(6)? + 1;

    (0..count)
        .map(|_| {
            let floor_type = bs.read_bits_leq32(16)?;
            read_floor(bs, floor_type, bs0_exp, bs1_exp, max_codebook)
        })
        .collect()
}

fn read_residues(bs: &mut BitReaderRtl<'_>, max_codebook: usize) -> Result<Vec<Residue>> {
    let count = bs.read_bits_leq32(6)? + 1;

    (0..count)
        .map(|_| {
            let residue_type = bs.read_bits_leq32(16)?;
            read_residue_setup(bs, residue_type, max_codebook)
        })
        .collect()
}

fn read_mappings(
    bs: &mut BitReaderRtl<'_>,
    audio_channels: u8,
    max_floor: usize,
    max_residue: usize,
) -> Result<Vec<Mapping>> {
    let count = bs.read_bits_leq32(6)? + 1;

    (0..count)
        .map(|_| {
            let mapping_type = bs.read_bits_leq32(16)?;
            read_mapping(bs, mapping_type, audio_channels, max_floor, max_residue)
        })
        .collect()
}

fn read_modes(bs: &mut BitReaderRtl<'_>, max_mapping: usize) -> Result<Vec<Mode>> {
    let count = bs.read_bits_leq32(6)? + 1;
    (0..count).map(|_| read_mode(bs, max_mapping)).collect()
}

#[derive(Debug)]
struct Mode {
    block_flag: bool,
    mapping: u8,
}

fn read_mode(bs: &mut BitReaderRtl<'_>, max_mapping: usize) -> Result<Mode> {
    let block_flag = bs.read_bit()?;
    let window_type = bs.read_bits_leq32(16)? as u16;
    let transform_type = bs.read_bits_leq32(16)? as u16;
    let mapping = bs.read_bits_leq32(8)? as u8;

    // Only window type 0 is allowed in Vorbis 1 (section 4.2.4).
    if window_type != 0 {
        return malformed_setup_error("vorbis: invalid window type for mode");
    }

    // Only transform type 0 is allowed in Vorbis 1 (section 4.2.4).
    if transform_type != 0 {
        return malformed_setup_error("vorbis: invalid transform type for mode");
    }

    // The mapping number must exist.
    if usize::from(mapping) >= max_mapping {
        return malformed_setup_error("vorbis: invalid mode mapping");
    }

    let mode = Mode { block_flag, mapping };

    Ok(mode)
}

/// Gets the channel mask implied by the total number of channels, as defined in section 4.3.9 of
/// the Vorbis I specification.
fn vorbis_channels_to_channels(num_channels: u8) -> Option<Channels> {
    let channels = match num_channels {
        1 => Channels::FRONT_LEFT,
        2 => Channels::FRONT_LEFT | Channels::FRONT_RIGHT,
        3 => Channels::FRONT_LEFT | Channels::FRONT_CENTRE | Channels::FRONT_RIGHT,
        4 => {
            Channels::FRONT_LEFT
                | Channels::FRONT_RIGHT
                | Channels::REAR_LEFT
                | Channels::REAR_RIGHT
        }
        5 => {
            Channels::FRONT_LEFT
                | Channels::FRONT_CENTRE
                | Channels::FRONT_RIGHT
                | Channels::REAR_LEFT
                | Channels::REAR_RIGHT
        }
        6 => {
            Channels::FRONT_LEFT
                | Channels::FRONT_CENTRE
                | Channels::FRONT_RIGHT
                | Channels::REAR_LEFT
                | Channels::REAR_RIGHT
                | Channels::LFE1
        }
        7 => {
            Channels::FRONT_LEFT
                | Channels::FRONT_CENTRE
                | Channels::FRONT_RIGHT
                | Channels::SIDE_LEFT
                | Channels::SIDE_RIGHT
                | Channels::REAR_CENTRE
                | Channels::LFE1
        }
        8 => {
            Channels::FRONT_LEFT
                | Channels::FRONT_CENTRE
                | Channels::FRONT_RIGHT
                | Channels::SIDE_LEFT
                | Channels::SIDE_RIGHT
                | Channels::REAR_LEFT
                | Channels::REAR_RIGHT
                | Channels::LFE1
        }
        _ => return None,
    };

    Some(channels)
}

/// Maps a Vorbis channel index to an audio buffer plane index given the channel map implied by the
/// total number of channels.
///
/// Planes are stored in ascending channel mask bit order, which differs from the Vorbis channel
/// order defined in section 4.3.9 of the Vorbis I specification.
fn map_vorbis_channel(num_channels: u8, ch: usize) -> usize {
    // This pre-condition should always be true.
    assert!(ch < usize::from(num_channels));

    let mapped_ch: u8 = match num_channels {
        1 => [0][ch],                      // FL
        2 => [0, 1][ch],                   // FL, FR
        3 => [0, 2, 1][ch],                // FL, FC, FR
        4 => [0, 1, 2, 3][ch],             // FL, FR, RL, RR
        5 => [0, 2, 1, 3, 4][ch],          // FL, FC, FR, RL, RR
        6 => [0, 2, 1, 3, 4, 5][ch],       // FL, FC, FR, RL, RR, LFE
        7 => [0, 2, 1, 5, 6, 3, 4][ch],    // FL, FC, FR, SL, SR, RC, LFE
        8 => [0, 2, 1, 6, 7, 3, 4, 5][ch], // FL, FC, FR, SL, SR, RL, RR, LFE
        _ => return ch,
    };

    usize::from(mapped_ch)
}

#[cfg(test)]
mod tests {
    use super::{
        is_discontinuity, map_vorbis_channel, read_ident_header, read_mode,
        vorbis_channels_to_channels, VorbisDecoder,
    };
    use cantata_core::audio::Channels;
    use cantata_core::errors::Error;
    use cantata_core::formats::Packet;
    use cantata_core::io::{BitReaderRtl, BufReader};

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

    fn build_ident_packet(
        version: u32,
        n_channels: u8,
        sample_rate: u32,
        block_sizes: u8,
        framing: u8,
    ) -> Vec<u8> {
        let mut buf = Vec::new();

        buf.push(1);
        buf.extend_from_slice(b"vorbis");
        buf.extend_from_slice(&version.to_le_bytes());
        buf.push(n_channels);
        buf.extend_from_slice(&sample_rate.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes()); // bitrate maximum
        buf.extend_from_slice(&128_000u32.to_le_bytes()); // bitrate nominal
        buf.extend_from_slice(&0u32.to_le_bytes()); // bitrate minimum
        buf.push(block_sizes);
        buf.push(framing);
        buf
    }

    #[test]
    fn verify_read_ident_header() {
        let buf = build_ident_packet(0, 2, 44_100, 0xb8, 1);

        let ident = read_ident_header(&mut BufReader::new(&buf)).unwrap();

        assert_eq!(ident.n_channels, 2);
        assert_eq!(ident.sample_rate, 44_100);
        assert_eq!(ident.bs0_exp, 8);
        assert_eq!(ident.bs1_exp, 11);
    }

    #[test]
    fn verify_read_ident_header_rejects_bad_fields() {
        // Unsupported version.
        let buf = build_ident_packet(1, 2, 44_100, 0xb8, 1);
        assert!(read_ident_header(&mut BufReader::new(&buf)).is_err());

        // Zero channels.
        let buf = build_ident_packet(0, 0, 44_100, 0xb8, 1);
        assert!(read_ident_header(&mut BufReader::new(&buf)).is_err());

        // Zero sample rate.
        let buf = build_ident_packet(0, 2, 0, 0xb8, 1);
        assert!(read_ident_header(&mut BufReader::new(&buf)).is_err());

        // blocksize_0 exceeds blocksize_1.
        let buf = build_ident_packet(0, 2, 44_100, 0x8b, 1);
        assert!(read_ident_header(&mut BufReader::new(&buf)).is_err());

        // blocksize_1 out-of-bounds.
        let buf = build_ident_packet(0, 2, 44_100, 0xe8, 1);
        assert!(read_ident_header(&mut BufReader::new(&buf)).is_err());

        // Framing flag unset.
        let buf = build_ident_packet(0, 2, 44_100, 0xb8, 0);
        assert!(read_ident_header(&mut BufReader::new(&buf)).is_err());
    }

    #[test]
    fn verify_read_mode() {
        // block_flag=1, window_type=0, transform_type=0, mapping=0.
        let mut buf = [0u8; 6];
        buf[0] = 0x1;

        let mode = read_mode(&mut BitReaderRtl::new(&buf), 1).unwrap();

        assert!(mode.block_flag);
        assert_eq!(mode.mapping, 0);
    }

    #[test]
    fn verify_read_mode_rejects_bad_fields() {
        // Non-zero window type.
        let mut buf = [0u8; 6];
        buf[0] = 0x3;

        match read_mode(&mut BitReaderRtl::new(&buf), 1) {
            Err(Error::MalformedSetup(_)) => (),
            _ => panic!("expected malformed setup error"),
        }

        // Mapping number out of range.
        let buf = [0u8; 6];

        match read_mode(&mut BitReaderRtl::new(&buf), 0) {
            Err(Error::MalformedSetup(_)) => (),
            _ => panic!("expected malformed setup error"),
        }
    }

    #[test]
    fn verify_channel_maps() {
        assert_eq!(
            vorbis_channels_to_channels(6).unwrap(),
            Channels::FRONT_LEFT
                | Channels::FRONT_CENTRE
                | Channels::FRONT_RIGHT
                | Channels::REAR_LEFT
                | Channels::REAR_RIGHT
                | Channels::LFE1
        );

        assert!(vorbis_channels_to_channels(9).is_none());

        // 5.1: FL, FC, FR, RL, RR, LFE in Vorbis order.
        let planes: Vec<usize> = (0..6).map(|ch| map_vorbis_channel(6, ch)).collect();
        assert_eq!(planes, vec![0, 2, 1, 3, 4, 5]);

        // Every Vorbis channel maps to a unique plane.
        for n in 1..=8 {
            let mut planes: Vec<usize> =
                (0..usize::from(n)).map(|ch| map_vorbis_channel(n, ch)).collect();
            planes.sort_unstable();
            planes.dedup();
            assert_eq!(planes.len(), usize::from(n));
        }
    }

    /// Builds a decoder for a minimal mono stream: 64 sample blocks, one two entry scalar
    /// codebook, a floor 1 with no partitions, a residue with one unused class, a single submap
    /// mapping, and one short-block mode.
    fn build_test_decoder() -> VorbisDecoder {
        let ident = build_ident_packet(0, 1, 44_100, 0x66, 1);

        let mut comment = vec![3];
        comment.extend_from_slice(b"vorbis");
        comment.extend_from_slice(&0u32.to_le_bytes());
        comment.extend_from_slice(&0u32.to_le_bytes());
        comment.push(1);

        let mut bw = BitWriter::default();

        // One codebook: two entries with 1-bit codewords and no VQ lookup.
        bw.write(0, 8);
        bw.write(0x564342, 24);
        bw.write(1, 16);
        bw.write(2, 24);
        bw.write(0, 1);
        bw.write(0, 1);
        bw.write(0, 5);
        bw.write(0, 5);
        bw.write(0, 4);

        // One placeholder time transform.
        bw.write(0, 6);
        bw.write(0, 16);

        // One floor of type 1 with no partitions.
        bw.write(0, 6);
        bw.write(1, 16);
        bw.write(0, 5);
        bw.write(0, 2);
        bw.write(6, 4);

        // One residue of format 0 with a single pass-less class.
        bw.write(0, 6);
        bw.write(0, 16);
        bw.write(0, 24);
        bw.write(0, 24);
        bw.write(0, 24);
        bw.write(0, 6);
        bw.write(0, 8);
        bw.write(0, 3);
        bw.write(0, 1);

        // One mapping of type 0 with a single submap and no couplings.
        bw.write(0, 6);
        bw.write(0, 16);
        bw.write(0, 1);
        bw.write(0, 1);
        bw.write(0, 2);
        bw.write(0, 8);
        bw.write(0, 8);
        bw.write(0, 8);

        // One short-block mode, then the framing bit.
        bw.write(0, 6);
        bw.write(0, 1);
        bw.write(0, 16);
        bw.write(0, 16);
        bw.write(0, 8);
        bw.write(1, 1);

        let mut setup = vec![5];
        setup.extend_from_slice(b"vorbis");
        setup.extend_from_slice(&bw.buf);

        let as_packet = |data: Vec<u8>| Packet::new_from_boxed_slice(0, 0, data.into_boxed_slice());

        VorbisDecoder::try_new(&as_packet(ident), &as_packet(comment), &as_packet(setup)).unwrap()
    }

    #[test]
    fn verify_decode_sequence_gap_resets_lapping() {
        let mut decoder = build_test_decoder();

        // An audio packet with an unused floor: bit 0 marks an audio packet, bit 1 marks the
        // floor unused, and the residue read is skipped since no channel has a floor.
        let audio = |seqno| Packet::new_from_boxed_slice(0, seqno, vec![0u8].into_boxed_slice());

        // The first block has no previous block to lap onto, so it yields no audio.
        assert_eq!(decoder.decode(&audio(3)).unwrap().frames(), 0);
        assert_eq!(decoder.decode(&audio(4)).unwrap().frames(), 32);

        // Packets 5 and 6 were lost. The lapping state on either side of the gap is unrelated, so
        // the first block after the gap again yields no audio.
        assert_eq!(decoder.decode(&audio(7)).unwrap().frames(), 0);
        assert_eq!(decoder.decode(&audio(8)).unwrap().frames(), 32);
    }

    #[test]
    fn verify_is_discontinuity() {
        assert!(!is_discontinuity(5, 6));
        assert!(is_discontinuity(6, 9));
        assert!(is_discontinuity(5, 5));
        // Sequence numbers may wrap.
        assert!(!is_discontinuity(u64::MAX, 0));
    }
}
