// Cantata
// Copyright (c) 2026 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `audio` module provides primitives for working with multi-channel audio buffers.

use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Channels is a bit mask of all channels contained in a signal.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Channels: u32 {
        /// Front-left (left) or the Mono channel.
        const FRONT_LEFT         = 0x0000_0001;
        /// Front-right (right) channel.
        const FRONT_RIGHT        = 0x0000_0002;
        /// Front-centre (centre) channel.
        const FRONT_CENTRE       = 0x0000_0004;
        /// Rear-left (surround rear left) channel.
        const REAR_LEFT          = 0x0000_0008;
        /// Rear-centre (surround rear centre) channel.
        const REAR_CENTRE        = 0x0000_0010;
        /// Rear-right (surround rear right) channel.
        const REAR_RIGHT         = 0x0000_0020;
        /// Low frequency channel 1.
        const LFE1               = 0x0000_0040;
        /// Front left-of-centre (left center) channel.
        const FRONT_LEFT_CENTRE  = 0x0000_0080;
        /// Front right-of-centre (right center) channel.
        const FRONT_RIGHT_CENTRE = 0x0000_0100;
        /// Side left (surround left) channel.
        const SIDE_LEFT          = 0x0002_0000;
        /// Side right (surround right) channel.
        const SIDE_RIGHT         = 0x0004_0000;
    }
}

impl Channels {
    /// Gets the number of channels.
    pub fn count(self) -> usize {
        self.bits().count_ones() as usize
    }
}

impl fmt::Display for Channels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#032b}", self.bits())
    }
}

/// `Layout` describes common audio channel configurations.
#[derive(Copy, Clone, Debug)]
pub enum Layout {
    /// Single centre channel.
    Mono,
    /// Left and Right channels.
    Stereo,
    /// Front Left and Right, Rear Left and Right, and a single low-frequency channel.
    FivePointOne,
}

impl Layout {
    /// Converts a channel `Layout` into a `Channels` bit mask.
    pub fn into_channels(self) -> Channels {
        match self {
            Layout::Mono => Channels::FRONT_LEFT,
            Layout::Stereo => Channels::FRONT_LEFT | Channels::FRONT_RIGHT,
            Layout::FivePointOne => {
                Channels::FRONT_LEFT
                    | Channels::FRONT_RIGHT
                    | Channels::FRONT_CENTRE
                    | Channels::REAR_LEFT
                    | Channels::REAR_RIGHT
                    | Channels::LFE1
            }
        }
    }
}

/// `SignalSpec` describes the characteristics of a Signal.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SignalSpec {
    /// The signal sampling rate in hertz (Hz).
    pub rate: u32,

    /// The channel assignments of the signal. The order of the channels in the mask is the order
    /// in which the channel planes are stored in a buffer.
    pub channels: Channels,
}

impl SignalSpec {
    pub fn new(rate: u32, channels: Channels) -> Self {
        SignalSpec { rate, channels }
    }

    pub fn new_with_layout(rate: u32, layout: Layout) -> Self {
        SignalSpec { rate, channels: layout.into_channels() }
    }
}

/// `AudioBuffer` is a planar buffer of single-precision floating-point audio.
///
/// Each audio channel is stored in a contiguous plane of `capacity` samples of which the first
/// `frames` are considered written.
#[derive(Clone)]
pub struct AudioBuffer {
    buf: Vec<f32>,
    spec: SignalSpec,
    n_frames: usize,
    n_capacity: usize,
}

impl AudioBuffer {
    /// Instantiate a new `AudioBuffer` using the specified signal specification and of the given
    /// duration in frames.
    pub fn new(duration: u64, spec: SignalSpec) -> Self {
        let n_sample_capacity = duration * spec.channels.count() as u64;

        // Practically speaking, it is not possible to allocate more than usize samples.
        assert!(n_sample_capacity <= usize::MAX as u64);

        // Allocate memory for the sample data and default initialize the sample to silence.
        let buf = vec![0.0; n_sample_capacity as usize];

        AudioBuffer { buf, spec, n_frames: 0, n_capacity: duration as usize }
    }

    /// Gets the signal specification for the buffer.
    pub fn spec(&self) -> &SignalSpec {
        &self.spec
    }

    /// Gets the total capacity of the buffer. The capacity is the maximum number of frames a
    /// buffer can store.
    pub fn capacity(&self) -> usize {
        self.n_capacity
    }

    /// Gets the number of actual frames written to the buffer. Conversely, this also is the number
    /// of written samples in any one channel.
    pub fn frames(&self) -> usize {
        self.n_frames
    }

    /// Clears all written frames from the buffer. This is a cheap operation and does not zero the
    /// underlying audio data.
    pub fn clear(&mut self) {
        self.n_frames = 0;
    }

    /// Gets an immutable reference to all the written samples in the specified channel.
    pub fn chan(&self, channel: usize) -> &[f32] {
        let start = channel * self.n_capacity;
        let end = start + self.n_frames;

        // Do not exceed the audio buffer.
        assert!(end <= self.buf.len());

        &self.buf[start..end]
    }

    /// Gets a mutable reference to all the written samples in the specified channel.
    pub fn chan_mut(&mut self, channel: usize) -> &mut [f32] {
        let start = channel * self.n_capacity;
        let end = start + self.n_frames;

        // Do not exceed the audio buffer.
        assert!(end <= self.buf.len());

        &mut self.buf[start..end]
    }

    /// Renders a reserved number of frames. This is a cheap operation and simply advances the
    /// frame counter. The underlying audio data is not modified and should be overwritten through
    /// other means.
    ///
    /// If `n_frames` is `None`, the remaining number of frames will be used. If `n_frames` is too
    /// large, this function will assert.
    pub fn render_reserved(&mut self, n_frames: Option<usize>) {
        let n_reserved_frames = n_frames.unwrap_or(self.n_capacity - self.n_frames);
        // Do not render past the end of the audio buffer.
        assert!(self.n_frames + n_reserved_frames <= self.n_capacity);
        self.n_frames += n_reserved_frames;
    }
}

#[cfg(test)]
mod tests {
    use super::{AudioBuffer, Channels, Layout, SignalSpec};

    #[test]
    fn verify_channels_count() {
        assert_eq!(Channels::empty().count(), 0);
        assert_eq!(Layout::Stereo.into_channels().count(), 2);
        assert_eq!(Layout::FivePointOne.into_channels().count(), 6);
    }

    #[test]
    fn verify_audio_buffer_render() {
        let spec = SignalSpec::new_with_layout(44_100, Layout::Stereo);
        let mut buf = AudioBuffer::new(1024, spec);

        assert_eq!(buf.capacity(), 1024);
        assert_eq!(buf.frames(), 0);

        buf.render_reserved(Some(512));
        assert_eq!(buf.frames(), 512);

        buf.chan_mut(1)[0] = 1.0;
        assert_eq!(buf.chan(1)[0], 1.0);
        assert_eq!(buf.chan(0)[0], 0.0);

        buf.clear();
        assert_eq!(buf.frames(), 0);
    }
}
