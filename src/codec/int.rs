//! Integer codecs.
//!
//! Binary payloads are little-endian fixed width keyed by the column type;
//! MEDIUMINT travels as 32-bit two's complement. Text payloads are ASCII
//! decimal with an optional sign. Widening reads the column's native width
//! and converts; overflow of the requested target is a decode error. The
//! encode side picks the smallest wire type that holds the value losslessly,
//! which keeps bind packets short.

use crate::codec::{ColumnMeta, Decode, Encode, Parameter, Raw, take, text_str, unsupported};
use crate::constant::ColumnType;
use crate::context::CodecContext;
use crate::error::{Error, Result};

/// Read any integer-family cell into a wide intermediate.
pub(crate) fn decode_wide(raw: Raw<'_>, col: &ColumnMeta) -> Result<i128> {
    match raw {
        Raw::Null => Err(Error::LibraryBug(crate::error::eyre!(
            "null cell reached an integer codec"
        ))),
        Raw::Binary(buf) => {
            let unsigned = col.is_unsigned();
            match col.column_type {
                ColumnType::MYSQL_TYPE_TINY => {
                    let [b] = take::<1>(buf)?;
                    Ok(if unsigned { b as i128 } else { b as i8 as i128 })
                }
                ColumnType::MYSQL_TYPE_SHORT | ColumnType::MYSQL_TYPE_YEAR => {
                    let raw = u16::from_le_bytes(take::<2>(buf)?);
                    Ok(if unsigned {
                        raw as i128
                    } else {
                        raw as i16 as i128
                    })
                }
                ColumnType::MYSQL_TYPE_INT24 | ColumnType::MYSQL_TYPE_LONG => {
                    let raw = u32::from_le_bytes(take::<4>(buf)?);
                    Ok(if unsigned {
                        raw as i128
                    } else {
                        raw as i32 as i128
                    })
                }
                ColumnType::MYSQL_TYPE_LONGLONG => {
                    let raw = u64::from_le_bytes(take::<8>(buf)?);
                    Ok(if unsigned {
                        raw as i128
                    } else {
                        raw as i64 as i128
                    })
                }
                // DECIMAL is ASCII in both wire modes
                ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => {
                    parse_decimal_truncating(buf)
                }
                _ => Err(unsupported::<i128>(col)),
            }
        }
        Raw::Text(buf) => match col.column_type {
            ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => {
                parse_decimal_truncating(buf)
            }
            _ => parse_ascii_int(buf),
        },
    }
}

/// ASCII decimal with optional sign. Empty input is a decode error.
fn parse_ascii_int(buf: &[u8]) -> Result<i128> {
    let text = text_str(buf, "integer")?;
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::DecodeSyntax {
            target: "integer",
            input: text.to_owned(),
        });
    }
    let mut value: i128 = 0;
    for b in digits.bytes() {
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add((b - b'0') as i128))
            .ok_or_else(|| Error::DecodeSyntax {
                target: "integer",
                input: text.to_owned(),
            })?;
    }
    Ok(if negative { -value } else { value })
}

/// Integer-typed reads of a DECIMAL payload truncate toward zero.
fn parse_decimal_truncating(buf: &[u8]) -> Result<i128> {
    let text = text_str(buf, "decimal")?;
    let integral = text.split_once('.').map_or(text, |(head, _)| head);
    match integral {
        "" | "-" | "+" => Ok(0),
        _ => parse_ascii_int(integral.as_bytes()),
    }
}

fn can_decode_integer(col: &ColumnMeta) -> bool {
    col.column_type.is_integer()
        || matches!(
            col.column_type,
            ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL
        )
}

macro_rules! impl_int_decode {
    ($($t:ty),+) => {$(
        impl Decode for $t {
            fn can_decode(col: &ColumnMeta, _ctx: &CodecContext) -> bool {
                can_decode_integer(col)
            }

            fn decode(raw: Raw<'_>, col: &ColumnMeta, _ctx: &CodecContext) -> Result<Option<Self>> {
                let wide = decode_wide(raw, col)?;
                let value = <$t>::try_from(wide).map_err(|_| unsupported::<$t>(col))?;
                Ok(Some(value))
            }
        }
    )+};
}

impl_int_decode!(i8, i16, i32, i64, u8, u16, u32, u64);

impl Decode for bool {
    fn can_decode(col: &ColumnMeta, ctx: &CodecContext) -> bool {
        match col.column_type {
            ColumnType::MYSQL_TYPE_TINY => ctx.tiny_as_boolean && col.length <= 1,
            ColumnType::MYSQL_TYPE_BIT => col.length <= 1,
            _ => false,
        }
    }

    fn decode(raw: Raw<'_>, col: &ColumnMeta, _ctx: &CodecContext) -> Result<Option<Self>> {
        match (raw, col.column_type) {
            (Raw::Binary(buf), ColumnType::MYSQL_TYPE_BIT) => {
                Ok(Some(buf.iter().any(|&b| b != 0)))
            }
            (Raw::Text(buf), ColumnType::MYSQL_TYPE_BIT) => {
                Ok(Some(buf.iter().any(|&b| b != b'0')))
            }
            _ => Ok(Some(decode_wide(raw, col)? != 0)),
        }
    }
}

/// Smallest lossless wire form for a signed value.
pub(crate) fn narrow_signed(value: i64) -> Parameter {
    let (tag, unsigned, bytes) = if i8::try_from(value).is_ok() {
        (ColumnType::MYSQL_TYPE_TINY, false, vec![value as u8])
    } else if u8::try_from(value).is_ok() {
        (ColumnType::MYSQL_TYPE_TINY, true, vec![value as u8])
    } else if i16::try_from(value).is_ok() {
        (
            ColumnType::MYSQL_TYPE_SHORT,
            false,
            (value as i16).to_le_bytes().to_vec(),
        )
    } else if u16::try_from(value).is_ok() {
        (
            ColumnType::MYSQL_TYPE_SHORT,
            true,
            (value as u16).to_le_bytes().to_vec(),
        )
    } else if i32::try_from(value).is_ok() {
        (
            ColumnType::MYSQL_TYPE_LONG,
            false,
            (value as i32).to_le_bytes().to_vec(),
        )
    } else if u32::try_from(value).is_ok() {
        (
            ColumnType::MYSQL_TYPE_LONG,
            true,
            (value as u32).to_le_bytes().to_vec(),
        )
    } else {
        (
            ColumnType::MYSQL_TYPE_LONGLONG,
            false,
            value.to_le_bytes().to_vec(),
        )
    };
    Parameter::new(tag, unsigned, bytes, value.to_string())
}

pub(crate) fn narrow_unsigned(value: u64) -> Parameter {
    match i64::try_from(value) {
        Ok(signed) => narrow_signed(signed),
        Err(_) => Parameter::new(
            ColumnType::MYSQL_TYPE_LONGLONG,
            true,
            value.to_le_bytes().to_vec(),
            value.to_string(),
        ),
    }
}

macro_rules! impl_int_encode_signed {
    ($($t:ty),+) => {$(
        impl Encode for $t {
            fn encode(&self, _ctx: &CodecContext) -> Result<Parameter> {
                Ok(narrow_signed(*self as i64))
            }
        }
    )+};
}

macro_rules! impl_int_encode_unsigned {
    ($($t:ty),+) => {$(
        impl Encode for $t {
            fn encode(&self, _ctx: &CodecContext) -> Result<Parameter> {
                Ok(narrow_unsigned(*self as u64))
            }
        }
    )+};
}

impl_int_encode_signed!(i8, i16, i32, i64);
impl_int_encode_unsigned!(u8, u16, u32, u64);

impl Encode for bool {
    fn encode(&self, _ctx: &CodecContext) -> Result<Parameter> {
        Ok(Parameter::new(
            ColumnType::MYSQL_TYPE_TINY,
            false,
            vec![*self as u8],
            if *self { "1" } else { "0" }.to_string(),
        ))
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
    fn narrowing_picks_smallest_wire_type() {
        let p = 200i64.encode(&ctx()).unwrap();
        assert_eq!(p.type_tag(), ColumnType::MYSQL_TYPE_TINY);
        assert!(p.is_unsigned());
        assert_eq!(p.binary_bytes(), [0xC8]);

        let p = 40_000i64.encode(&ctx()).unwrap();
        assert_eq!(p.type_tag(), ColumnType::MYSQL_TYPE_SHORT);
        assert!(p.is_unsigned());
        assert_eq!(p.binary_bytes(), [0x40, 0x9C]);

        let p = 1_000_000_000i64.encode(&ctx()).unwrap();
        assert_eq!(p.type_tag(), ColumnType::MYSQL_TYPE_LONG);
        assert!(!p.is_unsigned());
        assert_eq!(p.binary_bytes(), 1_000_000_000i32.to_le_bytes());
    }

    #[test]
    fn negative_and_wide_values() {
        let p = (-42i32).encode(&ctx()).unwrap();
        assert_eq!(p.type_tag(), ColumnType::MYSQL_TYPE_TINY);
        assert_eq!(p.binary_bytes(), [0xD6]);

        let p = i64::MIN.encode(&ctx()).unwrap();
        assert_eq!(p.type_tag(), ColumnType::MYSQL_TYPE_LONGLONG);
        assert!(!p.is_unsigned());

        let p = u64::MAX.encode(&ctx()).unwrap();
        assert_eq!(p.type_tag(), ColumnType::MYSQL_TYPE_LONGLONG);
        assert!(p.is_unsigned());
        assert_eq!(p.binary_bytes(), [0xFF; 8]);
    }

    #[test]
    fn binary_decode_by_column_width() {
        let col = ColumnMeta::new(ColumnType::MYSQL_TYPE_LONG);
        let bytes = (-7i32).to_le_bytes();
        let v: Option<i32> = decode(Raw::Binary(&bytes), &col, &ctx()).unwrap();
        assert_eq!(v, Some(-7));

        // MEDIUMINT travels as 32-bit two's complement
        let col = ColumnMeta::new(ColumnType::MYSQL_TYPE_INT24);
        let bytes = (-5_000_000i32).to_le_bytes();
        let v: Option<i32> = decode(Raw::Binary(&bytes), &col, &ctx()).unwrap();
        assert_eq!(v, Some(-5_000_000));
    }

    #[test]
    fn widening_and_overflow() {
        let col = ColumnMeta::new(ColumnType::MYSQL_TYPE_LONGLONG);
        let bytes = 40_000i64.to_le_bytes();
        let v: Option<i32> = decode(Raw::Binary(&bytes), &col, &ctx()).unwrap();
        assert_eq!(v, Some(40_000));

        let err = decode::<i16>(Raw::Binary(&bytes), &col, &ctx()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedConversion { .. }));
    }

    #[test]
    fn text_decode_accepts_signs_rejects_empty() {
        let col = ColumnMeta::new(ColumnType::MYSQL_TYPE_LONG);
        let v: Option<i32> = decode(Raw::Text(b"+123"), &col, &ctx()).unwrap();
        assert_eq!(v, Some(123));
        let v: Option<i32> = decode(Raw::Text(b"-123"), &col, &ctx()).unwrap();
        assert_eq!(v, Some(-123));

        let err = decode::<i32>(Raw::Text(b""), &col, &ctx()).unwrap_err();
        assert!(matches!(err, Error::DecodeSyntax { .. }));
        let err = decode::<i32>(Raw::Text(b"12x"), &col, &ctx()).unwrap_err();
        assert!(matches!(err, Error::DecodeSyntax { .. }));
    }

    #[test]
    fn decimal_column_truncates_toward_zero() {
        let col = ColumnMeta::new(ColumnType::MYSQL_TYPE_NEWDECIMAL);
        let v: Option<i64> = decode(Raw::Text(b"-3.7"), &col, &ctx()).unwrap();
        assert_eq!(v, Some(-3));
        let v: Option<i64> = decode(Raw::Binary(b"123.999"), &col, &ctx()).unwrap();
        assert_eq!(v, Some(123));
    }

    #[test]
    fn unsigned_bigint_decode() {
        let col = ColumnMeta::new(ColumnType::MYSQL_TYPE_LONGLONG).unsigned();
        let bytes = u64::MAX.to_le_bytes();
        let v: Option<u64> = decode(Raw::Binary(&bytes), &col, &ctx()).unwrap();
        assert_eq!(v, Some(u64::MAX));

        let err = decode::<i64>(Raw::Binary(&bytes), &col, &ctx()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedConversion { .. }));
    }

    #[test]
    fn tiny_as_boolean() {
        let col = ColumnMeta::new(ColumnType::MYSQL_TYPE_TINY).with_length(1);
        let v: Option<bool> = decode(Raw::Binary(&[1]), &col, &ctx()).unwrap();
        assert_eq!(v, Some(true));
        let v: Option<bool> = decode(Raw::Text(b"0"), &col, &ctx()).unwrap();
        assert_eq!(v, Some(false));

        let mut no_bool = ctx();
        no_bool.tiny_as_boolean = false;
        let err = decode::<bool>(Raw::Binary(&[1]), &col, &no_bool).unwrap_err();
        assert!(matches!(err, Error::UnsupportedConversion { .. }));
    }

    #[test]
    fn year_column_decodes_as_integer() {
        let col = ColumnMeta::new(ColumnType::MYSQL_TYPE_YEAR).unsigned();
        let bytes = 2021u16.to_le_bytes();
        let v: Option<u16> = decode(Raw::Binary(&bytes), &col, &ctx()).unwrap();
        assert_eq!(v, Some(2021));
        let v: Option<i32> = decode(Raw::Text(b"2021"), &col, &ctx()).unwrap();
        assert_eq!(v, Some(2021));
    }
}
