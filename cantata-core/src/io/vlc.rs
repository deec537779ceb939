// Cantata
// Copyright (c) 2026 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `vlc` module provides support for decoding variable-length codes (VLC).

use std::cmp::min;
use std::io;

fn invalid_codebook_error<T>() -> io::Result<T> {
    Err(io::Error::new(io::ErrorKind::InvalidInput, "codebook is not prefix free"))
}

/// `BitOrder` describes the relationship between the order of bits in a codeword, and the order
/// in which those bits are read from a bitstream.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BitOrder {
    /// The provided codewords have bits in the same order as the order in which they're being
    /// read.
    Verbatim,
    /// The provided codeword have bits in the reverse order as the order in which they're being
    /// read.
    Reverse,
}

/// A `CodebookEntry` represents a codeword within a `Codebook`. An entry is either a value entry,
/// mapping a complete codeword to its decoded value, or a jump entry, pointing the decoder at the
/// sub-table where the next portion of the codeword should be looked up.
pub trait CodebookEntry: Copy + Clone + Sized {
    /// The value type stored in the `Codebook`.
    type ValueType: Copy;

    /// Creates the root entry for a table whose initial lookup reads `init_bits` bits.
    fn root(init_bits: u32) -> Self;

    /// Creates a value entry for a codeword (suffix) of `code_len` bits.
    fn new_value(value: Self::ValueType, code_len: u32) -> Self;

    /// Creates a jump entry to the sub-table at `offset`, where the next `next_len` bits of the
    /// codeword are looked up.
    fn new_jump(offset: usize, next_len: u32) -> Self;

    /// Returns true if the entry is a value entry.
    fn is_value(&self) -> bool;

    /// Returns true if the entry is a jump entry.
    fn is_jump(&self) -> bool;

    /// For jump entries only, returns the base offset in the `Codebook` for the jump.
    fn jump_offset(&self) -> usize;

    /// For jump entries only, returns the number of bits the decoder should read to obtain the
    /// next part of the codeword.
    fn next_len(&self) -> u32;

    /// For value entries only, the length of the codeword suffix decoded by this entry.
    fn code_len(&self) -> u32;

    /// For value entries only, consumes the entry and returns the value.
    fn into_value(self) -> Self::ValueType;
}

/// `Entry32x32` is a codebook entry for 32-bit values with codewords up-to 32-bits long.
pub type Entry32x32 = (u32, u32);

const ENTRY32X32_VALUE_FLAG: u32 = 0x8000_0000;

impl CodebookEntry for Entry32x32 {
    type ValueType = u32;

    #[inline(always)]
    fn root(init_bits: u32) -> Self {
        (init_bits, 0)
    }

    #[inline(always)]
    fn new_value(value: u32, code_len: u32) -> Self {
        (ENTRY32X32_VALUE_FLAG | code_len, value)
    }

    #[inline(always)]
    fn new_jump(offset: usize, next_len: u32) -> Self {
        (next_len, offset as u32)
    }

    #[inline(always)]
    fn is_value(&self) -> bool {
        self.0 & ENTRY32X32_VALUE_FLAG != 0
    }

    #[inline(always)]
    fn is_jump(&self) -> bool {
        self.0 & ENTRY32X32_VALUE_FLAG == 0
    }

    #[inline(always)]
    fn jump_offset(&self) -> usize {
        debug_assert!(self.is_jump());
        self.1 as usize
    }

    #[inline(always)]
    fn next_len(&self) -> u32 {
        debug_assert!(self.is_jump());
        self.0
    }

    #[inline(always)]
    fn code_len(&self) -> u32 {
        debug_assert!(self.is_value());
        self.0 & !ENTRY32X32_VALUE_FLAG
    }

    #[inline(always)]
    fn into_value(self) -> Self::ValueType {
        debug_assert!(self.is_value());
        self.1
    }
}

/// `Codebook` is a variable-length code decoding table. It is structured as a flattened
/// table-of-tables: one table partitioned into many sub-tables, each a look-up table for a portion
/// of a complete codeword. Upon look-up, a sub-table either contains the decoded value or
/// indicates how many further bits should be read and the offset of the sub-table to use for the
/// next look-up. In this way a tree of prefixes is formed where the leaf nodes contain decoded
/// values.
#[derive(Clone, Debug, Default)]
pub struct Codebook {
    /// The codebook table.
    pub table: Vec<Entry32x32>,
    /// The number of bits to read for the initial lookup in the table.
    pub init_bits: u32,
    /// The length of the longest codeword in bits.
    pub max_code_len: u32,
}

impl Codebook {
    /// Returns `true` if the codebook contains no codewords.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[derive(Copy, Clone)]
struct CodebookValue {
    word: u32,
    len: u8,
    value: u32,
}

/// `CodebookBuilder` generates a `Codebook` from a set of codewords, their lengths in bits, and
/// their decoded values.
pub struct CodebookBuilder {
    max_bits_per_read: u8,
    bit_order: BitOrder,
    is_sparse: bool,
}

impl CodebookBuilder {
    /// Instantiates a new `CodebookBuilder`.
    ///
    /// The `bit_order` parameter specifies if the codeword bits should be reversed when
    /// constructing the codebook. If the `BitStream` the codebook will be used with reads bits in
    /// an order different from the order of the provided codewords, then this option can be used
    /// to make them compatible.
    pub fn new(bit_order: BitOrder) -> Self {
        CodebookBuilder { max_bits_per_read: 8, bit_order, is_sparse: false }
    }

    /// Instantiates a new `CodebookBuilder` for sparse codebooks.
    ///
    /// A sparse codebook is one in which not all codewords are valid. Unused codewords are
    /// identified by a length of 0 and are excluded from the codebook.
    pub fn new_sparse(bit_order: BitOrder) -> Self {
        CodebookBuilder { max_bits_per_read: 8, bit_order, is_sparse: true }
    }

    /// Specify the maximum number of bits that should be consumed from the source at a time. This
    /// value must be within the range 1 <= `max_bits_per_read` <= 16.
    pub fn bits_per_read(&mut self, max_bits_per_read: u8) {
        assert!(max_bits_per_read > 0);
        assert!(max_bits_per_read <= 16);
        self.max_bits_per_read = max_bits_per_read;
    }

    /// Construct a `Codebook` using the given codewords, their respective lengths, and values.
    ///
    /// This function may fail if the codebook is not prefix free, or if a codeword is longer than
    /// 32 bits.
    pub fn make(
        &mut self,
        code_words: &[u32],
        code_lens: &[u8],
        values: &[u32],
    ) -> io::Result<Codebook> {
        assert!(code_words.len() == code_lens.len());
        assert!(code_words.len() == values.len());

        let mut entries = Vec::with_capacity(code_words.len());

        for ((&word, &len), &value) in code_words.iter().zip(code_lens).zip(values) {
            if len == 0 {
                // Unused codewords are only valid in sparse codebooks.
                if self.is_sparse {
                    continue;
                }

                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "zero length codeword in non-sparse codebook",
                ));
            }

            if len > 32 {
                return Err(io::Error::new(io::ErrorKind::InvalidInput, "codeword too long"));
            }

            let word = match self.bit_order {
                BitOrder::Verbatim => word,
                BitOrder::Reverse => word.reverse_bits() >> (u32::BITS - u32::from(len)),
            };

            entries.push(CodebookValue { word, len, value });
        }

        // All codewords in a sparse codebook may be unused.
        if entries.is_empty() {
            return Ok(Default::default());
        }

        let max_code_len = entries.iter().map(|e| u32::from(e.len)).max().unwrap();
        let init_bits = min(u32::from(self.max_bits_per_read), max_code_len);

        let mut table = vec![(0u32, 0u32); 1 << init_bits];

        populate_table(
            &mut table,
            0,
            init_bits,
            0,
            &entries,
            u32::from(self.max_bits_per_read),
        )?;

        Ok(Codebook { table, init_bits, max_code_len })
    }
}

/// Populates the sub-table beginning at `offset`, and spanning `n_bits` bits of each codeword
/// starting at bit `consumed`, with the given codewords. New sub-tables are appended to the table
/// as required.
fn populate_table(
    table: &mut Vec<Entry32x32>,
    offset: usize,
    n_bits: u32,
    consumed: u32,
    entries: &[CodebookValue],
    bits_per_read: u32,
) -> io::Result<()> {
    let mut groups: Vec<Vec<CodebookValue>> = vec![Vec::new(); 1 << n_bits];

    for entry in entries {
        let rem = u32::from(entry.len) - consumed;

        if rem <= n_bits {
            // The codeword ends within this sub-table. The entry repeats for every address whose
            // low `rem` bits equal the codeword suffix.
            let lo = ((entry.word >> consumed) & ((1 << rem) - 1)) as usize;

            let mut addr = lo;

            while addr < (1 << n_bits) {
                if table[offset + addr] != (0, 0) {
                    return invalid_codebook_error();
                }

                table[offset + addr] = Entry32x32::new_value(entry.value, rem);

                addr += 1 << rem;
            }
        }
        else {
            // The codeword continues past this sub-table. Group it with all other codewords
            // sharing the same `n_bits`-bit prefix.
            let addr = ((entry.word >> consumed) & ((1 << n_bits) - 1)) as usize;
            groups[addr].push(*entry);
        }
    }

    for (addr, group) in groups.iter().enumerate() {
        if group.is_empty() {
            continue;
        }

        if table[offset + addr] != (0, 0) {
            return invalid_codebook_error();
        }

        let max_rem =
            group.iter().map(|e| u32::from(e.len) - consumed - n_bits).max().unwrap();

        let sub_bits = min(bits_per_read, max_rem);
        let sub_offset = table.len();

        table.resize(table.len() + (1 << sub_bits), (0, 0));
        table[offset + addr] = Entry32x32::new_jump(sub_offset, sub_bits);

        populate_table(table, sub_offset, sub_bits, consumed + n_bits, group, bits_per_read)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{BitOrder, CodebookBuilder};

    #[test]
    fn verify_codebook_builder_multi_level() {
        // Codewords longer than bits_per_read force jump entries into sub-tables. The canonical
        // (MSb-first) codewords are reversed for an LSb-first reader.
        let code_words = [0b0, 0b10, 0b110, 0b1110, 0b1111_0, 0b1111_1];
        let code_lens = [1u8, 2, 3, 4, 5, 5];
        let values = [1u32, 2, 3, 4, 5, 6];

        let mut builder = CodebookBuilder::new(BitOrder::Reverse);
        builder.bits_per_read(3);

        let codebook = builder.make(&code_words, &code_lens, &values).unwrap();

        assert_eq!(codebook.init_bits, 3);
        assert_eq!(codebook.max_code_len, 5);
        // One root table of 8 entries plus atleast one sub-table.
        assert!(codebook.table.len() > 8);
    }

    #[test]
    fn verify_codebook_builder_rejects_overspecified() {
        // Read LSb-first, the codeword 0b1 is a prefix of 0b11 making the code ambiguous.
        let code_words = [0b1, 0b11];
        let code_lens = [1u8, 2];
        let values = [1u32, 2];

        let mut builder = CodebookBuilder::new(BitOrder::Verbatim);
        assert!(builder.make(&code_words, &code_lens, &values).is_err());
    }

    #[test]
    fn verify_codebook_builder_empty_sparse() {
        let codebook = CodebookBuilder::new_sparse(BitOrder::Reverse)
            .make(&[0, 0], &[0u8, 0], &[1u32, 2])
            .unwrap();

        assert!(codebook.is_empty());
    }
}
