//! Typed value codecs over the two MySQL wire encodings.
//!
//! A codec is an impl of [`Decode`] (column payload to native value) or
//! [`Encode`] (native value to [`Parameter`]). The registry of the two
//! directions is the impl table itself: target types are stated at the call
//! site as generic parameters, and each impl carries a `can_decode` predicate
//! that the dispatch function consults before handing over the payload.
//! Within an impl, exact column types are matched before widening ones.

pub mod bits;
pub mod decimal;
pub mod float;
pub mod int;
pub mod param;
pub mod string;
pub mod temporal;

pub use bits::BitSet;
pub use param::{Binding, Parameter};

use crate::constant::{ColumnFlags, ColumnType};
use crate::context::{Charset, CodecContext};
use crate::error::{Error, Result, eyre};

/// Per-column metadata, alive for the duration of a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMeta {
    pub column_type: ColumnType,
    pub flags: ColumnFlags,
    pub collation: u16,
    /// Declared display length; for BIT this bounds the payload width.
    pub length: u32,
    pub decimals: u8,
}

impl ColumnMeta {
    pub fn new(column_type: ColumnType) -> Self {
        Self {
            column_type,
            flags: ColumnFlags::empty(),
            collation: 45, // utf8mb4_general_ci
            length: 0,
            decimals: 0,
        }
    }

    pub fn unsigned(mut self) -> Self {
        self.flags |= ColumnFlags::UNSIGNED_FLAG;
        self
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.length = length;
        self
    }

    pub fn with_collation(mut self, collation: u16) -> Self {
        self.collation = collation;
        self
    }

    pub fn is_unsigned(&self) -> bool {
        self.flags.contains(ColumnFlags::UNSIGNED_FLAG)
    }

    pub fn is_nullable(&self) -> bool {
        !self.flags.contains(ColumnFlags::NOT_NULL_FLAG)
    }

    pub fn charset(&self) -> Charset {
        Charset::from_collation(self.collation)
    }
}

/// One cell payload as the row layer hands it over, positioned at the value
/// start. `Null` means the upstream NULL bitmap (binary rows) or the 0xFB
/// marker (text rows) already signalled SQL NULL.
#[derive(Debug, Clone, Copy)]
pub enum Raw<'a> {
    Null,
    Text(&'a [u8]),
    Binary(&'a [u8]),
}

/// Decode half of a codec.
pub trait Decode: Sized {
    /// Does this target claim the `(column, target)` pair?
    fn can_decode(col: &ColumnMeta, ctx: &CodecContext) -> bool;

    /// Decode a non-null cell.
    ///
    /// Returns `Ok(None)` when the payload maps to the null marker under the
    /// context's policy (zero dates).
    fn decode(raw: Raw<'_>, col: &ColumnMeta, ctx: &CodecContext) -> Result<Option<Self>>;
}

/// Encode half of a codec: produce a one-shot [`Parameter`].
pub trait Encode {
    fn encode(&self, ctx: &CodecContext) -> Result<Parameter>;
}

impl<T: Encode> Encode for &T {
    fn encode(&self, ctx: &CodecContext) -> Result<Parameter> {
        (*self).encode(ctx)
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode(&self, ctx: &CodecContext) -> Result<Parameter> {
        match self {
            Some(value) => value.encode(ctx),
            None => Ok(Parameter::null()),
        }
    }
}

/// Registry entry point, decode direction.
pub fn decode<T: Decode>(raw: Raw<'_>, col: &ColumnMeta, ctx: &CodecContext) -> Result<Option<T>> {
    if matches!(raw, Raw::Null) {
        return Ok(None);
    }
    if !T::can_decode(col, ctx) {
        return Err(unsupported::<T>(col));
    }
    T::decode(raw, col, ctx)
}

/// Registry entry point, encode direction.
pub fn encode<T: Encode + ?Sized>(value: &T, ctx: &CodecContext) -> Result<Parameter> {
    value.encode(ctx)
}

pub(crate) fn unsupported<T>(col: &ColumnMeta) -> Error {
    Error::UnsupportedConversion {
        column: col.column_type.name(),
        target: core::any::type_name::<T>(),
    }
}

/// Take the first `N` bytes of a cell payload.
///
/// Never reads past the declared cell; a short payload is protocol
/// corruption, not a decode error.
pub(crate) fn take<const N: usize>(data: &[u8]) -> Result<[u8; N]> {
    if data.len() < N {
        return Err(Error::ProtocolCorrupt(eyre!(
            "cell payload under-run: need {} bytes, have {}",
            N,
            data.len()
        )));
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&data[..N]);
    Ok(out)
}

/// View a text-protocol payload as UTF-8.
pub(crate) fn text_str<'a>(data: &'a [u8], target: &'static str) -> Result<&'a str> {
    simdutf8::basic::from_utf8(data).map_err(|_| Error::DecodeSyntax {
        target,
        input: String::from_utf8_lossy(data).into_owned(),
    })
}
