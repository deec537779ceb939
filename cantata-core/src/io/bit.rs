// Cantata
// Copyright (c) 2026 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cmp::min;
use std::io;

use super::vlc::{Codebook, CodebookEntry, Entry32x32};

fn end_of_bitstream_error<T>() -> io::Result<T> {
    Err(io::Error::new(io::ErrorKind::Other, "unexpected end of bitstream"))
}

mod private {
    use std::io;

    pub trait FetchBitsRtl {
        /// Discard any remaining bits in the source and fetch new bits.
        fn fetch_bits(&mut self) -> io::Result<()>;

        /// Fetch new bits, and append them after the remaining bits.
        fn fetch_bits_partial(&mut self) -> io::Result<()>;

        /// Get all the bits in the source.
        fn get_bits(&self) -> u64;

        /// Get the number of bits left in the source.
        fn num_bits_left(&self) -> u32;

        /// Consume `num` bits from the source.
        fn consume_bits(&mut self, num: u32);
    }
}

/// A `FiniteBitStream` is a bit stream that has a known length in bits.
pub trait FiniteBitStream {
    /// Gets the number of bits left unread.
    fn bits_left(&self) -> u64;
}

/// `ReadBitsRtl` reads bits from least-significant to most-significant.
pub trait ReadBitsRtl: private::FetchBitsRtl {
    /// Discards any saved bits and resets the `BitStream` to prepare it for a byte-aligned read.
    #[inline(always)]
    fn realign(&mut self) {
        let skip = self.num_bits_left() & 0x7;
        self.consume_bits(skip);
    }

    /// Ignores the specified number of bits from the stream or returns an error.
    #[inline(always)]
    fn ignore_bits(&mut self, mut num_bits: u32) -> io::Result<()> {
        if num_bits <= self.num_bits_left() {
            self.consume_bits(num_bits);
        }
        else {
            // Consume whole bit caches directly.
            while num_bits > self.num_bits_left() {
                num_bits -= self.num_bits_left();
                self.fetch_bits()?;
            }

            if num_bits > 0 {
                // Shift out in two parts to prevent panicing when num_bits == 64.
                self.consume_bits(num_bits - 1);
                self.consume_bits(1);
            }
        }

        Ok(())
    }

    /// Ignores one bit from the stream or returns an error.
    #[inline(always)]
    fn ignore_bit(&mut self) -> io::Result<()> {
        self.ignore_bits(1)
    }

    /// Read a single bit as a boolean value or returns an error.
    #[inline(always)]
    fn read_bit(&mut self) -> io::Result<bool> {
        if self.num_bits_left() < 1 {
            self.fetch_bits()?;
        }

        let bit = (self.get_bits() & 1) == 1;

        self.consume_bits(1);
        Ok(bit)
    }

    /// Reads up to 32-bits and interprets them as an unsigned integer or returns an error.
    #[inline(always)]
    fn read_bits_leq32(&mut self, bit_width: u32) -> io::Result<u32> {
        debug_assert!(bit_width <= u32::BITS);

        let mut bits = self.get_bits();
        let mut bits_needed = bit_width;

        while bits_needed > self.num_bits_left() {
            bits_needed -= self.num_bits_left();

            self.fetch_bits()?;

            bits |= self.get_bits() << (bit_width - bits_needed);
        }

        self.consume_bits(bits_needed);

        // Since bit_width is <= 32, this shift will never panic.
        let mask = !(!0 << bit_width);

        Ok((bits & mask) as u32)
    }

    /// Reads up to 64-bits and interprets them as an unsigned integer or returns an error.
    #[inline(always)]
    fn read_bits_leq64(&mut self, bit_width: u32) -> io::Result<u64> {
        debug_assert!(bit_width <= u64::BITS);

        // Hard-code the bit_width == 0 case as it's not possible to handle both the bit_width == 0
        // and bit_width == 64 cases branchlessly. This should be optimized out when bit_width is
        // known at compile time. Since it's generally rare to need to read up-to 64-bits at a time
        // (as oppopsed to 32-bits), this is an acceptable solution.
        if bit_width == 0 {
            Ok(0)
        }
        else {
            let mut bits = self.get_bits();
            let mut bits_needed = bit_width;

            while bits_needed > self.num_bits_left() {
                bits_needed -= self.num_bits_left();

                self.fetch_bits()?;

                // Since bits_needed will always be > 0, this will never shift by > 63 bits if
                // bit_width == 64 and therefore will never panic.
                bits |= self.get_bits() << (bit_width - bits_needed);
            }

            // Shift in two parts to prevent panicing when bit_width == 64.
            self.consume_bits(bits_needed - 1);
            self.consume_bits(1);

            // Generate the mask in two parts to prevent panicing when bit_width == 64.
            let mask = !((!0 << bit_width - 1) << 1);

            Ok(bits & mask)
        }
    }

    /// Reads a codeword from the `BitStream` using the provided `Codebook` and returns the decoded
    /// value, and the length of the codeword in bits, or an error.
    fn read_codebook(&mut self, codebook: &Codebook) -> io::Result<(u32, u32)> {
        if codebook.is_empty() {
            return Err(io::Error::new(io::ErrorKind::Other, "codebook is empty"));
        }

        let mut code_len = 0;
        let mut jmp_read_len = 0;

        let mut entry = Entry32x32::root(codebook.init_bits);

        while entry.is_jump() {
            // Consume bits from the last jump.
            self.consume_bits(jmp_read_len);

            // Update decoded code length.
            code_len += jmp_read_len;

            // The length of the next run of bits to read.
            jmp_read_len = entry.next_len();

            let addr = self.get_bits() & ((1 << jmp_read_len) - 1);

            // Jump!
            let jmp_offset = entry.jump_offset();

            entry = codebook.table[jmp_offset + addr as usize];

            // The bit cache cannot fully service the next lookup. Try to use the remaining bits as
            // a prefix. If it points to a value entry that has a code length that's <= the
            // remaining number of bits, then no further reads are necessary.
            if self.num_bits_left() < jmp_read_len {
                if entry.is_value() && entry.code_len() <= self.num_bits_left() {
                    break;
                }

                // Fetch more bits without discarding the unconsumed bits.
                self.fetch_bits_partial()?;

                let addr = self.get_bits() & ((1 << jmp_read_len) - 1);

                entry = codebook.table[jmp_offset + addr as usize];
            }
        }

        // Unpopulated table slots are value entries with a code length of 0. A real codeword is
        // always atleast one bit.
        let entry_code_len = entry.code_len();

        if entry_code_len == 0 {
            return Err(io::Error::new(io::ErrorKind::Other, "invalid codeword"));
        }

        self.consume_bits(entry_code_len);

        Ok((entry.into_value(), code_len + entry_code_len))
    }
}

/// `BitReaderRtl` reads bits from least-significant to most-significant from any `&[u8]`.
///
/// Stated another way, if N-bits are read from a `BitReaderRtl` then bit 0, the first bit read,
/// is the least-significant bit, and bit N-1, the last bit read, is the most-significant.
pub struct BitReaderRtl<'a> {
    buf: &'a [u8],
    bits: u64,
    n_bits_left: u32,
}

impl<'a> BitReaderRtl<'a> {
    /// Instantiate a new `BitReaderRtl` with the given buffer.
    pub fn new(buf: &'a [u8]) -> Self {
        BitReaderRtl { buf, bits: 0, n_bits_left: 0 }
    }
}

impl<'a> private::FetchBitsRtl for BitReaderRtl<'a> {
    fn fetch_bits_partial(&mut self) -> io::Result<()> {
        let mut buf = [0u8; std::mem::size_of::<u64>()];

        let read_len = min(self.buf.len(), (u64::BITS - self.n_bits_left) as usize >> 3);

        if read_len == 0 {
            return end_of_bitstream_error();
        }

        buf[..read_len].copy_from_slice(&self.buf[..read_len]);

        self.buf = &self.buf[read_len..];

        self.bits |= u64::from_le_bytes(buf) << self.n_bits_left;
        self.n_bits_left += (read_len as u32) << 3;

        Ok(())
    }

    fn fetch_bits(&mut self) -> io::Result<()> {
        let mut buf = [0u8; std::mem::size_of::<u64>()];

        let read_len = min(self.buf.len(), std::mem::size_of::<u64>());

        if read_len == 0 {
            return end_of_bitstream_error();
        }

        buf[..read_len].copy_from_slice(&self.buf[..read_len]);

        self.buf = &self.buf[read_len..];

        self.bits = u64::from_le_bytes(buf);
        self.n_bits_left = (read_len as u32) << 3;

        Ok(())
    }

    #[inline(always)]
    fn get_bits(&self) -> u64 {
        self.bits
    }

    #[inline(always)]
    fn num_bits_left(&self) -> u32 {
        self.n_bits_left
    }

    #[inline(always)]
    fn consume_bits(&mut self, num: u32) {
        self.n_bits_left -= num;
        self.bits >>= num;
    }
}

impl<'a> ReadBitsRtl for BitReaderRtl<'a> {}

impl<'a> FiniteBitStream for BitReaderRtl<'a> {
    fn bits_left(&self) -> u64 {
        (8 * self.buf.len() as u64) + u64::from(self.n_bits_left)
    }
}

#[cfg(test)]
mod tests {
    use super::{BitReaderRtl, FiniteBitStream, ReadBitsRtl};
    use crate::io::vlc::{BitOrder, CodebookBuilder};

    #[test]
    fn verify_bitreaderrtl_read_bit() {
        let mut bs = BitReaderRtl::new(&[0b1010_1010]);

        assert!(!bs.read_bit().unwrap());
        assert!(bs.read_bit().unwrap());
        assert!(!bs.read_bit().unwrap());
        assert!(bs.read_bit().unwrap());
        assert!(!bs.read_bit().unwrap());
        assert!(bs.read_bit().unwrap());
        assert!(!bs.read_bit().unwrap());
        assert!(bs.read_bit().unwrap());

        // Error test.
        let mut bs = BitReaderRtl::new(&[]);
        assert!(bs.read_bit().is_err());
    }

    #[test]
    fn verify_bitreaderrtl_read_bits_leq32() {
        let mut bs = BitReaderRtl::new(&[0xab, 0xcd, 0xef, 0x01, 0x23, 0x45, 0x67, 0x89, 0x0a]);

        assert_eq!(bs.read_bits_leq32(4).unwrap(), 0xb);
        assert_eq!(bs.read_bits_leq32(4).unwrap(), 0xa);
        assert_eq!(bs.read_bits_leq32(16).unwrap(), 0xefcd);
        assert_eq!(bs.read_bits_leq32(32).unwrap(), 0x6745_2301);
        assert_eq!(bs.read_bits_leq32(16).unwrap(), 0x0a89);

        // Error test.
        let mut bs = BitReaderRtl::new(&[0xff, 0xff, 0xff, 0xff]);
        assert!(bs.read_bits_leq32(33).is_err());
    }

    #[test]
    fn verify_bitreaderrtl_read_bits_leq64() {
        let mut bs = BitReaderRtl::new(&[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01]);

        assert_eq!(bs.read_bits_leq64(64).unwrap(), u64::MAX);
        assert_eq!(bs.read_bits_leq64(8).unwrap(), 0x01);

        let mut bs = BitReaderRtl::new(&[0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01]);

        assert_eq!(bs.read_bits_leq64(0).unwrap(), 0);
        assert_eq!(bs.read_bits_leq64(4).unwrap(), 0x2);
        assert_eq!(bs.read_bits_leq64(60).unwrap(), 0x1000_0000_0000_0000);

        // Error test.
        let mut bs = BitReaderRtl::new(&[0xff]);
        assert!(bs.read_bits_leq64(9).is_err());
    }

    #[test]
    fn verify_bitreaderrtl_ignore_bits() {
        let mut bs = BitReaderRtl::new(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02]);

        bs.ignore_bits(57).unwrap();
        assert!(bs.read_bit().unwrap());
        assert_eq!(bs.bits_left(), 6);

        // Error test.
        let mut bs = BitReaderRtl::new(&[0x00]);
        assert!(bs.ignore_bits(16).is_err());
    }

    #[test]
    fn verify_bitreaderrtl_read_codebook() {
        // Code lengths of 2, 2, 2, 3, and 3 bits assign the canonical (MSb-first) codewords 00,
        // 01, 10, 110, and 111. The bitstream transmits each codeword starting with its MSb, so a
        // reversed-order codebook decodes them from an LSb-first reader.
        let code_words = [0b00, 0b01, 0b10, 0b110, 0b111];
        let code_lens = [2u8, 2, 2, 3, 3];
        let values = [10u32, 20, 30, 40, 50];

        let mut builder = CodebookBuilder::new_sparse(BitOrder::Reverse);
        let codebook = builder.make(&code_words, &code_lens, &values).unwrap();

        // The codeword sequence 00, 110, 01, 111, 10, each transmitted MSb-first and packed
        // LSb-first into bytes. Stream bits (first to last): 0,0, 1,1,0, 0,1, 1,1,1, 1,0.
        // First byte (bit 0 first): 0b1100_1100 = 0xcc, second byte: 0b0000_0111 = 0x07.
        let mut bs = BitReaderRtl::new(&[0xcc, 0x07]);

        assert_eq!(bs.read_codebook(&codebook).unwrap(), (10, 2));
        assert_eq!(bs.read_codebook(&codebook).unwrap(), (40, 3));
        assert_eq!(bs.read_codebook(&codebook).unwrap(), (20, 2));
        assert_eq!(bs.read_codebook(&codebook).unwrap(), (50, 3));
        assert_eq!(bs.read_codebook(&codebook).unwrap(), (30, 2));
    }
}
