//! FLOAT and DOUBLE codecs: IEEE-754 little-endian on the binary wire,
//! printed ASCII on the text wire.

use crate::codec::{ColumnMeta, Decode, Encode, Parameter, Raw, take, text_str, unsupported};
use crate::constant::ColumnType;
use crate::context::CodecContext;
use crate::error::{Error, Result};

fn parse_ascii_float<T: core::str::FromStr>(buf: &[u8], target: &'static str) -> Result<T> {
    let text = text_str(buf, target)?;
    text.parse().map_err(|_| Error::DecodeSyntax {
        target,
        input: text.to_owned(),
    })
}

impl Decode for f32 {
    fn can_decode(col: &ColumnMeta, _ctx: &CodecContext) -> bool {
        col.column_type == ColumnType::MYSQL_TYPE_FLOAT
    }

    fn decode(raw: Raw<'_>, _col: &ColumnMeta, _ctx: &CodecContext) -> Result<Option<Self>> {
        match raw {
            Raw::Binary(buf) => Ok(Some(f32::from_le_bytes(take::<4>(buf)?))),
            Raw::Text(buf) => Ok(Some(parse_ascii_float(buf, "f32")?)),
            Raw::Null => Ok(None),
        }
    }
}

impl Decode for f64 {
    fn can_decode(col: &ColumnMeta, _ctx: &CodecContext) -> bool {
        matches!(
            col.column_type,
            ColumnType::MYSQL_TYPE_FLOAT
                | ColumnType::MYSQL_TYPE_DOUBLE
                | ColumnType::MYSQL_TYPE_DECIMAL
                | ColumnType::MYSQL_TYPE_NEWDECIMAL
        )
    }

    fn decode(raw: Raw<'_>, col: &ColumnMeta, _ctx: &CodecContext) -> Result<Option<Self>> {
        match raw {
            Raw::Binary(buf) => match col.column_type {
                ColumnType::MYSQL_TYPE_DOUBLE => Ok(Some(f64::from_le_bytes(take::<8>(buf)?))),
                // widening read of the column's native 4 bytes
                ColumnType::MYSQL_TYPE_FLOAT => {
                    Ok(Some(f32::from_le_bytes(take::<4>(buf)?) as f64))
                }
                // DECIMAL is ASCII in both wire modes
                ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => {
                    Ok(Some(parse_ascii_float(buf, "f64")?))
                }
                _ => Err(unsupported::<f64>(col)),
            },
            Raw::Text(buf) => Ok(Some(parse_ascii_float(buf, "f64")?)),
            Raw::Null => Ok(None),
        }
    }
}

impl Encode for f32 {
    fn encode(&self, _ctx: &CodecContext) -> Result<Parameter> {
        if !self.is_finite() {
            return Err(Error::NoCodec(format!("non-finite FLOAT {}", self)));
        }
        Ok(Parameter::new(
            ColumnType::MYSQL_TYPE_FLOAT,
            false,
            self.to_le_bytes().to_vec(),
            self.to_string(),
        ))
    }
}

impl Encode for f64 {
    fn encode(&self, _ctx: &CodecContext) -> Result<Parameter> {
        if !self.is_finite() {
            return Err(Error::NoCodec(format!("non-finite DOUBLE {}", self)));
        }
        Ok(Parameter::new(
            ColumnType::MYSQL_TYPE_DOUBLE,
            false,
            self.to_le_bytes().to_vec(),
            self.to_string(),
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
    fn binary_forms_are_ieee_le() {
        let p = 3.5f32.encode(&ctx()).unwrap();
        assert_eq!(p.type_tag(), ColumnType::MYSQL_TYPE_FLOAT);
        assert_eq!(p.binary_bytes(), 3.5f32.to_le_bytes());

        let p = (-0.25f64).encode(&ctx()).unwrap();
        assert_eq!(p.type_tag(), ColumnType::MYSQL_TYPE_DOUBLE);
        assert_eq!(p.binary_bytes(), (-0.25f64).to_le_bytes());
    }

    #[test]
    fn double_widens_from_float_column() {
        let col = ColumnMeta::new(ColumnType::MYSQL_TYPE_FLOAT);
        let bytes = 1.5f32.to_le_bytes();
        let v: Option<f64> = decode(Raw::Binary(&bytes), &col, &ctx()).unwrap();
        assert_eq!(v, Some(1.5));
    }

    #[test]
    fn text_form_round_trips() {
        let col = ColumnMeta::new(ColumnType::MYSQL_TYPE_DOUBLE);
        let p = 1.0e-3f64.encode(&ctx()).unwrap();
        let mut text = String::new();
        p.write_text(&mut text).unwrap();
        let v: Option<f64> = decode(Raw::Text(text.as_bytes()), &col, &ctx()).unwrap();
        assert_eq!(v, Some(1.0e-3));
    }

    #[test]
    fn non_finite_is_rejected() {
        assert!(matches!(
            f64::NAN.encode(&ctx()),
            Err(Error::NoCodec(_))
        ));
        assert!(matches!(
            f32::INFINITY.encode(&ctx()),
            Err(Error::NoCodec(_))
        ));
    }

    #[test]
    fn malformed_text_is_syntax_error() {
        let col = ColumnMeta::new(ColumnType::MYSQL_TYPE_DOUBLE);
        let err = decode::<f64>(Raw::Text(b"1.2.3"), &col, &ctx()).unwrap_err();
        assert!(matches!(err, Error::DecodeSyntax { .. }));
    }
}
