//! BIT column codec and its value type.
//!
//! A BIT(n) cell arrives as a big-endian byte array of `ceil(n/8)` bytes in
//! both wire modes. Bit 0 of the value is the least significant bit of the
//! last wire byte. Parameters go out as the smallest unsigned integer that
//! preserves the highest set bit, so the bytes on the wire are little-endian
//! like every other integer parameter.

use crate::codec::int::narrow_unsigned;
use crate::codec::{ColumnMeta, Decode, Encode, Parameter, Raw};
use crate::constant::ColumnType;
use crate::context::CodecContext;
use crate::error::{Error, Result};

/// A growable set of bits, indexable from bit 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitSet {
    /// Word 0 carries bits 0..=63. Trailing zero words are trimmed.
    words: Vec<u64>,
}

impl BitSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_words(words: &[u64]) -> Self {
        let mut set = Self {
            words: words.to_vec(),
        };
        set.trim();
        set
    }

    /// Interpret a big-endian byte array, bit 0 = LSB of the last byte.
    pub fn from_be_bytes(bytes: &[u8]) -> Self {
        let mut words = Vec::with_capacity(bytes.len().div_ceil(8));
        for chunk in bytes.rchunks(8) {
            let mut word = 0u64;
            for &b in chunk {
                word = (word << 8) | b as u64;
            }
            words.push(word);
        }
        let mut set = Self { words };
        set.trim();
        set
    }

    fn trim(&mut self) {
        while self.words.last() == Some(&0) {
            self.words.pop();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn get(&self, bit: usize) -> bool {
        self.words
            .get(bit / 64)
            .is_some_and(|word| word & (1 << (bit % 64)) != 0)
    }

    pub fn set(&mut self, bit: usize) {
        let word = bit / 64;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1 << (bit % 64);
    }

    pub fn highest_set_bit(&self) -> Option<usize> {
        let word = self.words.last()?;
        Some((self.words.len() - 1) * 64 + (63 - word.leading_zeros() as usize))
    }

    /// The set as an unsigned integer, when it fits 64 bits.
    pub fn value(&self) -> Option<u64> {
        match self.words.as_slice() {
            [] => Some(0),
            [word] => Some(*word),
            _ => None,
        }
    }
}

impl Decode for BitSet {
    fn can_decode(col: &ColumnMeta, _ctx: &CodecContext) -> bool {
        col.column_type == ColumnType::MYSQL_TYPE_BIT
    }

    fn decode(raw: Raw<'_>, _col: &ColumnMeta, _ctx: &CodecContext) -> Result<Option<Self>> {
        match raw {
            Raw::Binary(buf) | Raw::Text(buf) => Ok(Some(BitSet::from_be_bytes(buf))),
            Raw::Null => Ok(None),
        }
    }
}

impl Encode for BitSet {
    fn encode(&self, _ctx: &CodecContext) -> Result<Parameter> {
        let value = self
            .value()
            .ok_or_else(|| Error::NoCodec(format!("bit set wider than 64 bits: {:?}", self)))?;
        Ok(narrow_unsigned(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode;
    use crate::version::ServerVersion;

    fn ctx() -> CodecContext {
        CodecContext::with_defaults(ServerVersion::new(8, 0, 32))
    }

    #[test]
    fn wide_set_encodes_low_byte_first() {
        let set = BitSet::from_words(&[0x8D56_7C91_3B4F_61A2]);
        let p = set.encode(&ctx()).unwrap();
        assert_eq!(
            p.binary_bytes(),
            [0xA2, 0x61, 0x4F, 0x3B, 0x91, 0x7C, 0x56, 0x8D]
        );
        assert_eq!(p.type_tag(), ColumnType::MYSQL_TYPE_LONGLONG);
        assert!(p.is_unsigned());
        assert_eq!(p.text_literal(), "10184874622288687010");
    }

    #[test]
    fn empty_set_encodes_one_zero_byte() {
        let p = BitSet::new().encode(&ctx()).unwrap();
        assert_eq!(p.binary_bytes(), [0x00]);
        assert_eq!(p.text_literal(), "0");
    }

    #[test]
    fn small_set_shrinks_to_fit() {
        let mut set = BitSet::new();
        set.set(2);
        set.set(9);
        let p = set.encode(&ctx()).unwrap();
        // highest set bit 9 needs two bytes
        assert_eq!(p.binary_bytes(), [0b0000_0100, 0b0000_0010]);
        assert_eq!(p.type_tag(), ColumnType::MYSQL_TYPE_SHORT);
    }

    #[test]
    fn decode_is_big_endian() {
        let col = ColumnMeta::new(ColumnType::MYSQL_TYPE_BIT).with_length(20);
        let v: Option<BitSet> = decode(Raw::Binary(&[0x01, 0x00, 0x04]), &col, &ctx()).unwrap();
        let set = v.unwrap();
        assert!(set.get(2));
        assert!(set.get(16));
        assert!(!set.get(3));
        assert_eq!(set.highest_set_bit(), Some(16));
    }

    #[test]
    fn empty_buffer_is_empty_set() {
        let col = ColumnMeta::new(ColumnType::MYSQL_TYPE_BIT);
        let v: Option<BitSet> = decode(Raw::Binary(&[]), &col, &ctx()).unwrap();
        assert_eq!(v, Some(BitSet::new()));
    }

    #[test]
    fn round_trips_through_bigint_decoder() {
        // the parameter's nominal type is an integer, so the matching
        // decoder for its bytes is the BIGINT one
        let set = BitSet::from_words(&[0x8D56_7C91_3B4F_61A2]);
        let p = set.encode(&ctx()).unwrap();
        let col = ColumnMeta::new(ColumnType::MYSQL_TYPE_LONGLONG).unsigned();
        let v: Option<u64> = decode(Raw::Binary(p.binary_bytes()), &col, &ctx()).unwrap();
        assert_eq!(v, Some(0x8D56_7C91_3B4F_61A2));
    }

    #[test]
    fn wider_than_64_bits_has_no_codec() {
        let set = BitSet::from_words(&[1, 1]);
        assert!(matches!(set.encode(&ctx()), Err(Error::NoCodec(_))));
    }
}
