// Cantata
// Copyright (c) 2026 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use cantata_core::errors::{malformed_setup_error, Result};
use cantata_core::io::BitReaderRtl;

/// A reader function for one time-domain transform variant.
pub type TimeReader = fn(bs: &mut BitReaderRtl<'_>) -> Result<Time0>;

/// The fixed registry of time-domain transforms, indexed by the transform type read from the setup
/// header. Vorbis I defines exactly one, a placeholder carrying no payload.
pub const TIME_READERS: [TimeReader; 1] = [Time0::try_read];

/// Reads the time-domain transform with the given type tag. A tag outside the registry fails
/// immediately.
pub fn read_time(bs: &mut BitReaderRtl<'_>, time_type: u32) -> Result<Time0> {
    match TIME_READERS.get(time_type as usize) {
        Some(reader) => reader(bs),
        None => malformed_setup_error("vorbis: invalid time domain transform"),
    }
}

/// The type 0 time-domain transform. It has no setup payload and takes no part in decode.
#[derive(Debug)]
pub struct Time0;

impl Time0 {
    pub fn try_read(_: &mut BitReaderRtl<'_>) -> Result<Time0> {
        Ok(Time0)
    }
}

#[cfg(test)]
mod tests {
    use super::read_time;
    use cantata_core::errors::Error;
    use cantata_core::io::BitReaderRtl;

    #[test]
    fn verify_read_time() {
        let buf = [0u8; 1];
        let mut bs = BitReaderRtl::new(&buf);

        assert!(read_time(&mut bs, 0).is_ok());
    }

    #[test]
    fn verify_read_time_rejects_unknown_type() {
        let buf = [0u8; 1];
        let mut bs = BitReaderRtl::new(&buf);

        match read_time(&mut bs, 1) {
            Err(Error::MalformedSetup(_)) => (),
            _ => panic!("expected malformed setup error"),
        }
    }
}
