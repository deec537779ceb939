// Cantata
// Copyright (c) 2026 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cmp::min;

use cantata_core::dsp::mdct::Imdct;

use super::residue::ResidueScratch;
use super::window::Windows;

pub struct LappingState {
    /// The size of the previous block.
    pub prev_block_size: usize,
}

pub struct Dsp {
    /// DSP channels (Vorbis I allows up to 256, but the channel map limits this to 8).
    pub channels: Vec<DspChannel>,
    /// Residue scratch-pad.
    pub residue_scratch: ResidueScratch,
    /// IMDCT for short-blocks.
    pub imdct_short: Imdct,
    /// IMDCT for long-blocks.
    pub imdct_long: Imdct,
    /// Windows for overlap-add.
    pub windows: Windows,
    /// Lapping state.
    pub lapping_state: Option<LappingState>,
}

impl Dsp {
    pub fn reset(&mut self) {
        for channel in &mut self.channels {
            channel.reset();
        }

        self.lapping_state = None;
    }
}

pub struct DspChannel {
    /// The channel floor buffer.
    pub floor: Vec<f32>,
    /// The channel residue buffer.
    pub residue: Vec<f32>,
    /// The channel is fully zero for this block and its residue must not be decoded.
    pub do_not_decode: bool,
    /// Time-domain samples produced by the IMDCT for the current block.
    imdct: Vec<f32>,
    /// The unwindowed right half of the previous block.
    overlap: Vec<f32>,
}

impl DspChannel {
    pub fn new(bs1_exp: u8) -> Self {
        DspChannel {
            floor: vec![0.0; (1 << bs1_exp) >> 1],
            residue: vec![0.0; (1 << bs1_exp) >> 1],
            imdct: vec![0.0; 1 << bs1_exp],
            overlap: vec![0.0; (1 << bs1_exp) >> 1],
            do_not_decode: false,
        }
    }

    /// Synthesizes the output samples of one block for this channel.
    ///
    /// The floor buffer contains the block's audio spectrum. The IMDCT expands it into `blk_size`
    /// time-domain samples which are then crossfaded with the lapped right half of the previous
    /// block. The first block after a reset yields no output since there is nothing to lap onto.
    pub fn synth(
        &mut self,
        blk_size: usize,
        lap_state: &Option<LappingState>,
        windows: &Windows,
        imdct: &mut Imdct,
        buf: &mut [f32],
    ) {
        // The IMDCT produces blk_size samples from blk_size / 2 spectral samples.
        imdct.imdct(&self.floor[..blk_size >> 1], &mut self.imdct[..blk_size]);

        if let Some(lap_state) = lap_state {
            self.overlap_add(blk_size, lap_state.prev_block_size, windows, buf);
        }

        // Save the unwindowed right half of this block for the next block.
        self.overlap[..blk_size >> 1].copy_from_slice(&self.imdct[blk_size >> 1..blk_size]);
    }

    /// Crossfades the previous block's right half with the current block's left half.
    ///
    /// The blocks are centre-aligned: the lapped region is the shorter half-block wide and centred
    /// on the boundary between the two blocks. The previous right half is flat (window of one)
    /// before the lapped region, and the current left half is zero before it.
    fn overlap_add(&mut self, n: usize, prev_n: usize, windows: &Windows, buf: &mut [f32]) {
        let p4 = prev_n >> 2;
        let n4 = n >> 2;

        // The lap (slope) width is half the shorter block.
        let w = min(prev_n, n) >> 1;
        let w2 = w >> 1;

        debug_assert_eq!(buf.len(), p4 + n4);

        let curve = if windows.short.len() == w { &windows.short } else { &windows.long };

        // The flat region of the previous right half precedes the lapped region.
        let flat_len = p4 - w2;

        buf[..flat_len].copy_from_slice(&self.overlap[..flat_len]);

        // Crossfade the lapped region. The down-slope is the reversed up-slope, and the window is
        // power complementary, so the energy across the seam is preserved.
        for k in 0..w {
            let t = flat_len + k;
            buf[t] =
                self.overlap[t] * curve[w - 1 - k] + self.imdct[n4 - w2 + k] * curve[k];
        }

        // The flat region of the current left half follows the lapped region.
        buf[p4 + w2..].copy_from_slice(&self.imdct[n4 + w2..n >> 1]);

        // Clamp the output samples.
        for s in buf.iter_mut() {
            *s = s.clamp(-1.0, 1.0);
        }
    }

    pub fn reset(&mut self) {
        // Clear the overlap buffer. Nothing else is carried across packets.
        self.overlap.fill(0.0);
    }
}
