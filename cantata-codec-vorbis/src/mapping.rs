// Cantata
// Copyright (c) 2026 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use cantata_core::errors::{malformed_setup_error, Result};
use cantata_core::io::{BitReaderRtl, ReadBitsRtl};

use super::codebook::VorbisCodebook;
use super::common::{ilog, BitSet256};
use super::dsp::Dsp;
use super::floor::Floor;
use super::residue::Residue;

/// A reader function for one mapping variant.
pub type MappingReader = fn(
    bs: &mut BitReaderRtl<'_>,
    audio_channels: u8,
    max_floor: usize,
    max_residue: usize,
) -> Result<Mapping>;

/// The fixed registry of mapping variants, indexed by the mapping type read from the setup header.
pub const MAPPING_READERS: [MappingReader; 1] = [Mapping::try_read_type0];

/// Reads the mapping with the given type tag. A tag outside the registry fails immediately.
pub fn read_mapping(
    bs: &mut BitReaderRtl<'_>,
    mapping_type: u32,
    audio_channels: u8,
    max_floor: usize,
    max_residue: usize,
) -> Result<Mapping> {
    match MAPPING_READERS.get(mapping_type as usize) {
        Some(reader) => reader(bs, audio_channels, max_floor, max_residue),
        None => malformed_setup_error("vorbis: invalid mapping type"),
    }
}

#[derive(Debug)]
pub struct ChannelCouple {
    pub magnitude_ch: u8,
    pub angle_ch: u8,
}

#[derive(Debug)]
pub struct SubMap {
    pub floor: u8,
    pub residue: u8,
}

#[derive(Debug)]
pub struct Mapping {
    pub couplings: Vec<ChannelCouple>,
    pub multiplex: Vec<u8>,
    pub submaps: Vec<SubMap>,
}

impl Mapping {
    pub fn try_read_type0(
        bs: &mut BitReaderRtl<'_>,
        audio_channels: u8,
        max_floor: usize,
        max_residue: usize,
    ) -> Result<Mapping> {
        let num_submaps = if bs.read_bit()? { bs.read_bits_leq32(4)? as u8 + 1 } else { 1 };

        let mut couplings = Vec::new();

        if bs.read_bit()? {
            // Number of channel couplings (up-to 256).
            let coupling_steps = bs.read_bits_leq32(8)? as u16 + 1;

            // Reserve space.
            couplings.reserve_exact(usize::from(coupling_steps));

            // The maximum channel number.
            let max_ch = audio_channels - 1;

            // The number of bits to read for the magnitude and angle channel numbers. Never
            // exceeds 8.
            let coupling_bits = ilog(u32::from(max_ch));
            debug_assert!(coupling_bits <= 8);

            // Read each channel coupling.
            for _ in 0..coupling_steps {
                let magnitude_ch = bs.read_bits_leq32(coupling_bits)? as u8;
                let angle_ch = bs.read_bits_leq32(coupling_bits)? as u8;

                // Ensure the channels to be coupled are not the same, and that neither channel
                // number exceeds the maximum channel in the stream.
                if magnitude_ch == angle_ch || magnitude_ch > max_ch || angle_ch > max_ch {
                    return malformed_setup_error("vorbis: invalid channel coupling");
                }

                couplings.push(ChannelCouple { magnitude_ch, angle_ch });
            }
        }

        if bs.read_bits_leq32(2)? != 0 {
            return malformed_setup_error("vorbis: reserved mapping bits non-zero");
        }

        let mut multiplex = Vec::with_capacity(usize::from(audio_channels));

        // If the number of submaps is > 1 read the multiplex numbers from the bitstream, otherwise
        // they're all 0.
        if num_submaps > 1 {
            for _ in 0..audio_channels {
                let mux = bs.read_bits_leq32(4)? as u8;

                if mux >= num_submaps {
                    return malformed_setup_error("vorbis: invalid channel multiplex");
                }

                multiplex.push(mux);
            }
        }
        else {
            multiplex.resize(usize::from(audio_channels), 0);
        }

        let mut submaps = Vec::with_capacity(usize::from(num_submaps));

        for _ in 0..num_submaps {
            // Unused.
            let _ = bs.read_bits_leq32(8)?;

            // The floor to use.
            let floor = bs.read_bits_leq32(8)? as u8;

            if usize::from(floor) >= max_floor {
                return malformed_setup_error("vorbis: invalid floor for mapping");
            }

            // The residue to use.
            let residue = bs.read_bits_leq32(8)? as u8;

            if usize::from(residue) >= max_residue {
                return malformed_setup_error("vorbis: invalid residue for mapping");
            }

            submaps.push(SubMap { floor, residue });
        }

        let mapping = Mapping { couplings, multiplex, submaps };

        Ok(mapping)
    }

    /// Runs the inverse mapping for one audio block: floor curve decode, non-zero vector
    /// propagation, residue decode, inverse channel coupling, and finally the floor and residue
    /// dot product. Leaves the spectral samples of each channel in its floor buffer.
    pub fn inverse(
        &self,
        bs: &mut BitReaderRtl<'_>,
        bs_exp: u8,
        codebooks: &[VorbisCodebook],
        floors: &mut [Box<dyn Floor>],
        residues: &[Residue],
        dsp: &mut Dsp,
    ) -> Result<()> {
        // Half-block size.
        let n2 = (1 << bs_exp) >> 1;

        let Dsp { channels, residue_scratch, .. } = dsp;

        // Section 4.3.2 - Floor Curve Decode

        // Read the floors from the packet. There is one floor per audio channel. Each mapping will
        // have one multiplex (submap number) per audio channel. Therefore, iterate over all muxes
        // in the mapping, and read the floor.
        for (&submap_num, ch) in self.multiplex.iter().zip(channels.iter_mut()) {
            let submap = &self.submaps[usize::from(submap_num)];
            let floor = &mut floors[usize::from(submap.floor)];

            // Read the floor from the bitstream.
            floor.read_channel(bs, codebooks)?;

            ch.do_not_decode = floor.is_unused();

            if !ch.do_not_decode {
                // Since the same floor can be used by multiple channels and thus overwrite the
                // data just read from the bitstream, synthesize the floor curve for this channel
                // now and save it for audio synthesis later.
                floor.synthesis(bs_exp, &mut ch.floor)?;
            }
            else {
                // If the channel is unused, zero the floor vector.
                ch.floor[..n2].fill(0.0);
            }
        }

        // Section 4.3.3 - Non-zero Vector Propagate

        // If within a pair of coupled channels, one channel has an unused floor (do_not_decode is
        // true for that channel), but the other channel is used, then both channels must have
        // do_not_decode unset.
        for couple in &self.couplings {
            let magnitude_ch_idx = usize::from(couple.magnitude_ch);
            let angle_ch_idx = usize::from(couple.angle_ch);

            if channels[magnitude_ch_idx].do_not_decode != channels[angle_ch_idx].do_not_decode {
                channels[magnitude_ch_idx].do_not_decode = false;
                channels[angle_ch_idx].do_not_decode = false;
            }
        }

        // Section 4.3.4 - Residue Decode

        for (submap_idx, submap) in self.submaps.iter().enumerate() {
            let mut residue_channels: BitSet256 = Default::default();

            // Find the channels using this submap.
            for (c, &ch_submap_idx) in self.multiplex.iter().enumerate() {
                if submap_idx == usize::from(ch_submap_idx) {
                    residue_channels.set(c)
                }
            }

            let residue = &residues[usize::from(submap.residue)];

            residue.read_residue(
                bs,
                bs_exp,
                codebooks,
                &residue_channels,
                residue_scratch,
                channels,
            )?;
        }

        // Section 4.3.5 - Inverse Coupling

        for coupling in self.couplings.iter() {
            debug_assert!(coupling.magnitude_ch != coupling.angle_ch);

            // Get mutable reference to each channel in the pair.
            let (magnitude_ch, angle_ch) = if coupling.magnitude_ch < coupling.angle_ch {
                // Magnitude channel index < angle channel index.
                let (a, b) = channels.split_at_mut(usize::from(coupling.angle_ch));
                (&mut a[usize::from(coupling.magnitude_ch)], &mut b[0])
            }
            else {
                // Angle channel index < magnitude channel index.
                let (a, b) = channels.split_at_mut(usize::from(coupling.magnitude_ch));
                (&mut b[0], &mut a[usize::from(coupling.angle_ch)])
            };

            for (m, a) in magnitude_ch.residue[..n2].iter_mut().zip(&mut angle_ch.residue[..n2]) {
                let (new_m, new_a) = if *m > 0.0 {
                    if *a > 0.0 {
                        (*m, *m - *a)
                    }
                    else {
                        (*m + *a, *m)
                    }
                }
                else {
                    if *a > 0.0 {
                        (*m, *m + *a)
                    }
                    else {
                        (*m - *a, *m)
                    }
                };

                *m = new_m;
                *a = new_a;
            }
        }

        // Section 4.3.6 - Dot Product

        for channel in channels.iter_mut() {
            // If the channel is marked as do not decode, the floor vector is all 0. Therefore the
            // dot product will be 0.
            if channel.do_not_decode {
                continue;
            }

            for (f, r) in channel.floor[..n2].iter_mut().zip(&channel.residue[..n2]) {
                *f *= *r;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::read_mapping;
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

    #[test]
    fn verify_read_mapping_type0() {
        let mut bw = BitWriter::default();
        bw.write(0, 1); // one submap
        bw.write(1, 1); // couplings present
        bw.write(0, 8); // one coupling step
        bw.write(0, 1); // magnitude channel 0
        bw.write(1, 1); // angle channel 1
        bw.write(0, 2); // reserved
        bw.write(0, 8); // unused
        bw.write(0, 8); // submap 0 floor
        bw.write(0, 8); // submap 0 residue

        let mut bs = BitReaderRtl::new(&bw.buf);
        let mapping = read_mapping(&mut bs, 0, 2, 1, 1).unwrap();

        assert_eq!(mapping.couplings.len(), 1);
        assert_eq!(mapping.couplings[0].magnitude_ch, 0);
        assert_eq!(mapping.couplings[0].angle_ch, 1);
        assert_eq!(mapping.multiplex, vec![0, 0]);
        assert_eq!(mapping.submaps.len(), 1);
        assert_eq!(mapping.submaps[0].floor, 0);
        assert_eq!(mapping.submaps[0].residue, 0);
    }

    #[test]
    fn verify_read_mapping_rejects_self_coupling() {
        let mut bw = BitWriter::default();
        bw.write(0, 1); // one submap
        bw.write(1, 1); // couplings present
        bw.write(0, 8); // one coupling step
        bw.write(0, 1); // magnitude channel 0
        bw.write(0, 1); // angle channel 0
        bw.write(0, 2); // reserved

        let mut bs = BitReaderRtl::new(&bw.buf);

        match read_mapping(&mut bs, 0, 2, 1, 1) {
            Err(Error::MalformedSetup(_)) => (),
            _ => panic!("expected malformed setup error"),
        }
    }

    #[test]
    fn verify_read_mapping_rejects_unknown_type() {
        let buf = [0u8; 8];
        let mut bs = BitReaderRtl::new(&buf);

        match read_mapping(&mut bs, 1, 2, 1, 1) {
            Err(Error::MalformedSetup(_)) => (),
            _ => panic!("expected malformed setup error"),
        }
    }
}
