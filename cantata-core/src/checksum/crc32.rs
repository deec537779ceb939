// Cantata
// Copyright (c) 2026 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::io::Monitor;

/// The generator polynomial, in unreflected form.
const POLYNOMIAL: u32 = 0x04c1_1db7;

/// Builds the byte-at-a-time lookup table for the unreflected CRC-32.
const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];

    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u32) << 24;

        let mut j = 0;
        while j < 8 {
            crc = if crc & 0x8000_0000 != 0 { (crc << 1) ^ POLYNOMIAL } else { crc << 1 };
            j += 1;
        }

        table[i] = crc;
        i += 1;
    }

    table
}

const CRC32_TABLE: [u32; 256] = build_table();

/// `Crc32` implements the unreflected CRC-32 error-detecting code used by the Ogg container.
///
/// The register is initialized to 0 and no final inversion is applied.
#[derive(Default)]
pub struct Crc32 {
    crc: u32,
}

impl Crc32 {
    pub fn new(initial: u32) -> Self {
        Crc32 { crc: initial }
    }

    /// Get the checksum of all processed bytes.
    pub fn crc(&self) -> u32 {
        self.crc
    }
}

impl Monitor for Crc32 {
    #[inline(always)]
    fn process_byte(&mut self, byte: u8) {
        self.crc =
            (self.crc << 8) ^ CRC32_TABLE[(((self.crc >> 24) & 0xff) as u8 ^ byte) as usize];
    }

    fn process_buf_bytes(&mut self, buf: &[u8]) {
        for byte in buf {
            self.process_byte(*byte);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Crc32, CRC32_TABLE, POLYNOMIAL};
    use crate::io::Monitor;

    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    /// Bit-at-a-time reference implementation.
    fn crc32_reference(buf: &[u8]) -> u32 {
        let mut crc = 0u32;

        for byte in buf {
            crc ^= u32::from(*byte) << 24;

            for _ in 0..8 {
                crc = if crc & 0x8000_0000 != 0 { (crc << 1) ^ POLYNOMIAL } else { crc << 1 };
            }
        }

        crc
    }

    #[test]
    fn verify_crc32_table() {
        for (i, &entry) in CRC32_TABLE.iter().enumerate() {
            assert_eq!(entry, crc32_reference(&[i as u8]), "table entry {}", i);
        }
    }

    #[test]
    fn verify_crc32() {
        let mut crc32 = Crc32::default();
        crc32.process_buf_bytes(b"123456789");
        assert_eq!(crc32.crc(), 0x89a1_897f);
    }

    #[test]
    fn verify_crc32_random() {
        let mut rng = SmallRng::seed_from_u64(0xc0de);

        for _ in 0..16 {
            let len = rng.random_range(1..512);
            let buf: Vec<u8> = (0..len).map(|_| rng.random()).collect();

            let mut crc32 = Crc32::default();
            crc32.process_buf_bytes(&buf);

            assert_eq!(crc32.crc(), crc32_reference(&buf));
        }
    }
}
