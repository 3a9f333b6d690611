//! DECIMAL codec.
//!
//! MySQL transmits DECIMAL as ASCII in both wire modes, so the binary and
//! text paths share one parser. Values decode through arbitrary-precision
//! [`BigDecimal`]; the integer codecs handle truncating reads of the same
//! columns.

use std::str::FromStr;

use bigdecimal::BigDecimal;

use crate::codec::param::write_bytes_lenenc;
use crate::codec::{ColumnMeta, Decode, Encode, Parameter, Raw, int, text_str};
use crate::constant::ColumnType;
use crate::context::CodecContext;
use crate::error::{Error, Result};

fn parse_decimal(buf: &[u8]) -> Result<BigDecimal> {
    let text = text_str(buf, "decimal")?;
    BigDecimal::from_str(text).map_err(|_| Error::DecodeSyntax {
        target: "decimal",
        input: text.to_owned(),
    })
}

impl Decode for BigDecimal {
    fn can_decode(col: &ColumnMeta, _ctx: &CodecContext) -> bool {
        col.column_type.is_numeric()
            && !matches!(
                col.column_type,
                ColumnType::MYSQL_TYPE_FLOAT | ColumnType::MYSQL_TYPE_DOUBLE
            )
    }

    fn decode(raw: Raw<'_>, col: &ColumnMeta, _ctx: &CodecContext) -> Result<Option<Self>> {
        match (raw, col.column_type) {
            (
                Raw::Binary(buf) | Raw::Text(buf),
                ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL,
            ) => Ok(Some(parse_decimal(buf)?)),
            // integer columns widen losslessly
            _ => Ok(Some(BigDecimal::from(int::decode_wide(raw, col)?))),
        }
    }
}

impl Encode for BigDecimal {
    fn encode(&self, _ctx: &CodecContext) -> Result<Parameter> {
        let text = self.to_string();
        let mut binary = Vec::with_capacity(text.len() + 1);
        write_bytes_lenenc(&mut binary, text.as_bytes());
        Ok(Parameter::new(
            ColumnType::MYSQL_TYPE_NEWDECIMAL,
            false,
            binary,
            text,
        ))
    }
}
