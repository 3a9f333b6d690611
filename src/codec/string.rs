//! String and byte-string codecs.
//!
//! The column's collation decides the family: CHARACTER columns decode into
//! `String` honoring the repertoire, BINARY columns carry raw bytes and
//! decode into `Vec<u8>`. Outbound strings are UTF-8 unless the context's
//! default charset says otherwise; the text channel uses the
//! backslash-and-quote escape dialect.

use crate::codec::param::write_bytes_lenenc;
use crate::codec::{ColumnMeta, Decode, Encode, Parameter, Raw};
use crate::constant::ColumnType;
use crate::context::{Charset, CodecContext};
use crate::error::{Error, Result};

fn is_string_family(col: &ColumnMeta) -> bool {
    matches!(
        col.column_type,
        ColumnType::MYSQL_TYPE_VARCHAR
            | ColumnType::MYSQL_TYPE_VAR_STRING
            | ColumnType::MYSQL_TYPE_STRING
            | ColumnType::MYSQL_TYPE_ENUM
            | ColumnType::MYSQL_TYPE_SET
            | ColumnType::MYSQL_TYPE_JSON
    )
}

fn decode_characters(buf: &[u8], charset: Charset) -> Result<String> {
    match charset {
        Charset::Utf8 => match simdutf8::basic::from_utf8(buf) {
            Ok(text) => Ok(text.to_owned()),
            Err(_) => Err(Error::DecodeSyntax {
                target: "string",
                input: String::from_utf8_lossy(buf).into_owned(),
            }),
        },
        // latin1 maps 1:1 onto the first 256 code points
        Charset::Latin1 => Ok(buf.iter().map(|&b| b as char).collect()),
        Charset::Binary => Err(Error::DecodeSyntax {
            target: "string",
            input: "binary collation".to_owned(),
        }),
    }
}

impl Decode for String {
    fn can_decode(col: &ColumnMeta, _ctx: &CodecContext) -> bool {
        is_string_family(col) && col.charset() != Charset::Binary
    }

    fn decode(raw: Raw<'_>, col: &ColumnMeta, _ctx: &CodecContext) -> Result<Option<Self>> {
        match raw {
            Raw::Binary(buf) | Raw::Text(buf) => decode_characters(buf, col.charset()).map(Some),
            Raw::Null => Ok(None),
        }
    }
}

impl Decode for Vec<u8> {
    fn can_decode(col: &ColumnMeta, _ctx: &CodecContext) -> bool {
        col.column_type.is_binary_nature() || is_string_family(col)
    }

    fn decode(raw: Raw<'_>, _col: &ColumnMeta, _ctx: &CodecContext) -> Result<Option<Self>> {
        match raw {
            Raw::Binary(buf) | Raw::Text(buf) => Ok(Some(buf.to_vec())),
            Raw::Null => Ok(None),
        }
    }
}

/// Append `text` as a quoted SQL literal, escaping the backslash-and-quote
/// MySQL dialect.
pub(crate) fn escape_into(text: &str, out: &mut String) {
    out.push('\'');
    for ch in text.chars() {
        match ch {
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{1a}' => out.push_str("\\Z"),
            '"' => out.push_str("\\\""),
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            other => out.push(other),
        }
    }
    out.push('\'');
}

fn encode_str(text: &str, ctx: &CodecContext) -> Result<Parameter> {
    let bytes: Vec<u8> = match ctx.default_charset {
        Charset::Utf8 | Charset::Binary => text.as_bytes().to_vec(),
        Charset::Latin1 => {
            let mut out = Vec::with_capacity(text.len());
            for ch in text.chars() {
                let code = ch as u32;
                if code > 0xFF {
                    return Err(Error::NoCodec(format!(
                        "character {:?} outside the latin1 repertoire",
                        ch
                    )));
                }
                out.push(code as u8);
            }
            out
        }
    };

    let mut binary = Vec::with_capacity(bytes.len() + 9);
    write_bytes_lenenc(&mut binary, &bytes);

    let mut literal = String::with_capacity(text.len() + 2);
    escape_into(text, &mut literal);

    Ok(Parameter::new(
        ColumnType::MYSQL_TYPE_VAR_STRING,
        false,
        binary,
        literal,
    ))
}

impl Encode for &str {
    fn encode(&self, ctx: &CodecContext) -> Result<Parameter> {
        encode_str(self, ctx)
    }
}

impl Encode for String {
    fn encode(&self, ctx: &CodecContext) -> Result<Parameter> {
        encode_str(self, ctx)
    }
}

fn encode_bytes(bytes: &[u8]) -> Parameter {
    let mut binary = Vec::with_capacity(bytes.len() + 9);
    write_bytes_lenenc(&mut binary, bytes);

    // hex literal, immune to escaping concerns
    let mut literal = String::with_capacity(bytes.len() * 2 + 3);
    literal.push_str("X'");
    for b in bytes {
        literal.push_str(&format!("{:02X}", b));
    }
    literal.push('\'');

    Parameter::new(ColumnType::MYSQL_TYPE_BLOB, false, binary, literal)
}

impl Encode for &[u8] {
    fn encode(&self, _ctx: &CodecContext) -> Result<Parameter> {
        Ok(encode_bytes(self))
    }
}

impl Encode for Vec<u8> {
    fn encode(&self, _ctx: &CodecContext) -> Result<Parameter> {
        Ok(encode_bytes(self))
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
    fn escaping_covers_the_dialect() {
        let p = "a'b\"c\\d\ne\rf\0g\u{1a}h".encode(&ctx()).unwrap();
        assert_eq!(p.text_literal(), "'a\\'b\\\"c\\\\d\\ne\\rf\\0g\\Zh'");
    }

    #[test]
    fn binary_channel_is_length_encoded_utf8() {
        let p = "héllo".encode(&ctx()).unwrap();
        let payload = "héllo".as_bytes();
        let mut expected = vec![payload.len() as u8];
        expected.extend_from_slice(payload);
        assert_eq!(p.binary_bytes(), expected);
        assert_eq!(p.type_tag(), ColumnType::MYSQL_TYPE_VAR_STRING);
    }

    #[test]
    fn latin1_column_decodes() {
        // latin1_swedish_ci
        let col = ColumnMeta::new(ColumnType::MYSQL_TYPE_VAR_STRING).with_collation(8);
        let v: Option<String> = decode(Raw::Text(&[b'h', 0xE9_u8]), &col, &ctx()).unwrap();
        assert_eq!(v.as_deref(), Some("hé"));
    }

    #[test]
    fn binary_collation_needs_byte_target() {
        let col = ColumnMeta::new(ColumnType::MYSQL_TYPE_VAR_STRING).with_collation(63);
        assert!(decode::<String>(Raw::Binary(b"abc"), &col, &ctx()).is_err());

        let v: Option<Vec<u8>> = decode(Raw::Binary(b"abc"), &col, &ctx()).unwrap();
        assert_eq!(v.as_deref(), Some(&b"abc"[..]));
    }

    #[test]
    fn invalid_utf8_is_syntax_error() {
        let col = ColumnMeta::new(ColumnType::MYSQL_TYPE_VAR_STRING);
        let err = decode::<String>(Raw::Text(&[0xFF, 0xFE]), &col, &ctx()).unwrap_err();
        assert!(matches!(err, Error::DecodeSyntax { .. }));
    }

    #[test]
    fn blob_text_form_is_hex() {
        let p = (&[0xDE_u8, 0xAD, 0xBE, 0xEF][..]).encode(&ctx()).unwrap();
        assert_eq!(p.text_literal(), "X'DEADBEEF'");
        assert_eq!(p.binary_bytes(), [4, 0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(p.type_tag(), ColumnType::MYSQL_TYPE_BLOB);
    }

    #[test]
    fn latin1_session_charset_transcodes_outbound() {
        let mut latin = ctx();
        latin.default_charset = Charset::Latin1;
        let p = "hé".encode(&latin).unwrap();
        assert_eq!(p.binary_bytes(), [2, b'h', 0xE9]);

        assert!(matches!("漢".encode(&latin), Err(Error::NoCodec(_))));
    }
}
