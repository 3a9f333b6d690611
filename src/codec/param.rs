//! Encoded parameters and bindings.
//!
//! A [`Parameter`] is the output of the encode half of a codec: a nominal
//! column type plus the value pre-rendered for both emission channels. It is
//! immutable once created and each channel may be consumed at most once.

use std::cell::Cell;

use crate::constant::{ColumnType, CommandByte};
use crate::error::{Error, Result};

/// An encoder-backed value bound to one parameter slot.
pub struct Parameter {
    type_tag: ColumnType,
    unsigned: bool,
    null: bool,
    binary: Vec<u8>,
    text: String,
    binary_taken: Cell<bool>,
    text_taken: Cell<bool>,
}

impl Parameter {
    pub fn new(type_tag: ColumnType, unsigned: bool, binary: Vec<u8>, text: String) -> Self {
        Self {
            type_tag,
            unsigned,
            null: false,
            binary,
            text,
            binary_taken: Cell::new(false),
            text_taken: Cell::new(false),
        }
    }

    /// The SQL NULL parameter.
    pub fn null() -> Self {
        Self {
            type_tag: ColumnType::MYSQL_TYPE_NULL,
            unsigned: false,
            null: true,
            binary: Vec::new(),
            text: String::new(),
            binary_taken: Cell::new(false),
            text_taken: Cell::new(false),
        }
    }

    pub fn type_tag(&self) -> ColumnType {
        self.type_tag
    }

    pub fn is_unsigned(&self) -> bool {
        self.unsigned
    }

    pub fn is_null(&self) -> bool {
        self.null
    }

    /// The binary-channel bytes without consuming the channel.
    pub fn binary_bytes(&self) -> &[u8] {
        &self.binary
    }

    /// The text-channel literal without consuming the channel.
    pub fn text_literal(&self) -> &str {
        if self.null { "NULL" } else { &self.text }
    }

    /// Write the 2-byte parameter type: MySQL type + unsigned flag.
    pub fn write_type(&self, out: &mut Vec<u8>) {
        out.push(self.type_tag as u8);
        out.push(if self.unsigned { 0x80 } else { 0x00 });
    }

    /// Emit the binary-protocol value. NULL parameters write nothing (they
    /// live in the NULL bitmap).
    pub fn write_binary(&self, out: &mut Vec<u8>) -> Result<()> {
        if self.binary_taken.replace(true) {
            return Err(Error::ParameterReused("binary"));
        }
        out.extend_from_slice(&self.binary);
        Ok(())
    }

    /// Emit the text-protocol literal.
    pub fn write_text(&self, out: &mut String) -> Result<()> {
        if self.text_taken.replace(true) {
            return Err(Error::ParameterReused("text"));
        }
        out.push_str(self.text_literal());
        Ok(())
    }
}

impl std::fmt::Debug for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parameter")
            .field("type_tag", &self.type_tag)
            .field("unsigned", &self.unsigned)
            .field("null", &self.null)
            .field("binary", &self.binary)
            .finish()
    }
}

/// Value equality by (type, bytes).
impl PartialEq for Parameter {
    fn eq(&self, other: &Self) -> bool {
        self.type_tag == other.type_tag
            && self.unsigned == other.unsigned
            && self.null == other.null
            && self.binary == other.binary
    }
}

impl Eq for Parameter {}

/// Ordered tuple of parameters, one per marker, used once per execute.
#[derive(Debug, Default)]
pub struct Binding {
    params: Vec<Parameter>,
}

impl Binding {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            params: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, param: Parameter) {
        self.params.push(param);
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Parameter> {
        self.params.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    /// NULL bitmap for the bind packet: bit i set when parameter i is NULL.
    pub fn write_null_bitmap(&self, out: &mut Vec<u8>) {
        let num_bytes = self.params.len().div_ceil(8);
        let start = out.len();
        out.resize(start + num_bytes, 0);

        for (i, param) in self.params.iter().enumerate() {
            if param.is_null() {
                out[start + (i / 8)] |= 1 << (i % 8);
            }
        }
    }

    pub fn write_types(&self, out: &mut Vec<u8>) {
        for param in &self.params {
            param.write_type(out);
        }
    }

    pub fn write_values(&self, out: &mut Vec<u8>) -> Result<()> {
        for param in &self.params {
            if !param.is_null() {
                param.write_binary(out)?;
            }
        }
        Ok(())
    }

    /// Build the full COM_STMT_EXECUTE payload for this binding.
    ///
    /// Packet framing (headers, 16 MiB splitting) is the transport's job.
    pub fn write_execute(&self, statement_id: u32, out: &mut Vec<u8>) -> Result<()> {
        out.push(CommandByte::StmtExecute as u8);
        out.extend_from_slice(&statement_id.to_le_bytes());

        // flags (1 byte) - CURSOR_TYPE_NO_CURSOR
        out.push(0x00);

        // iteration count (4 bytes) - always 1
        out.extend_from_slice(&1u32.to_le_bytes());

        if !self.params.is_empty() {
            self.write_null_bitmap(out);

            // new-params-bound-flag: types follow
            out.push(0x01);
            self.write_types(out);

            self.write_values(out)?;
        }
        Ok(())
    }
}

impl From<Vec<Parameter>> for Binding {
    fn from(params: Vec<Parameter>) -> Self {
        Self { params }
    }
}

/// Write a length-encoded byte string (used by string/blob parameters).
pub(crate) fn write_bytes_lenenc(out: &mut Vec<u8>, data: &[u8]) {
    let len = data.len() as u64;
    if len < 251 {
        out.push(len as u8);
    } else if len <= 0xFFFF {
        out.push(0xFC);
        out.extend_from_slice(&(len as u16).to_le_bytes());
    } else if len <= 0xFF_FFFF {
        out.push(0xFD);
        out.extend_from_slice(&(len as u32).to_le_bytes()[..3]);
    } else {
        out.push(0xFE);
        out.extend_from_slice(&len.to_le_bytes());
    }
    out.extend_from_slice(data);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_param(value: i32) -> Parameter {
        Parameter::new(
            ColumnType::MYSQL_TYPE_LONG,
            false,
            value.to_le_bytes().to_vec(),
            value.to_string(),
        )
    }

    #[test]
    fn equality_is_by_type_and_bytes() {
        assert_eq!(int_param(42), int_param(42));
        assert_ne!(int_param(42), int_param(43));

        let same_bytes_other_type = Parameter::new(
            ColumnType::MYSQL_TYPE_FLOAT,
            false,
            42i32.to_le_bytes().to_vec(),
            "42".to_string(),
        );
        assert_ne!(int_param(42), same_bytes_other_type);
    }

    #[test]
    fn binary_channel_is_one_shot() {
        let param = int_param(7);
        let mut out = Vec::new();
        param.write_binary(&mut out).unwrap();
        assert_eq!(out, 7i32.to_le_bytes());

        let err = param.write_binary(&mut out).unwrap_err();
        assert!(matches!(err, Error::ParameterReused("binary")));

        // The text channel is independent.
        let mut text = String::new();
        param.write_text(&mut text).unwrap();
        assert_eq!(text, "7");
    }

    #[test]
    fn null_parameter_text_literal() {
        let param = Parameter::null();
        assert!(param.is_null());
        let mut text = String::new();
        param.write_text(&mut text).unwrap();
        assert_eq!(text, "NULL");
    }

    #[test]
    fn null_bitmap_layout() {
        let mut binding = Binding::default();
        for i in 0..10 {
            if i == 1 || i == 8 {
                binding.push(Parameter::null());
            } else {
                binding.push(int_param(i));
            }
        }
        let mut bitmap = Vec::new();
        binding.write_null_bitmap(&mut bitmap);
        assert_eq!(bitmap, vec![0b0000_0010, 0b0000_0001]);
    }

    #[test]
    fn execute_payload_layout() {
        let mut binding = Binding::default();
        binding.push(int_param(5));
        binding.push(Parameter::null());

        let mut out = Vec::new();
        binding.write_execute(0x0000_0203, &mut out).unwrap();

        let expected = [
            0x17, // COM_STMT_EXECUTE
            0x03, 0x02, 0x00, 0x00, // statement id
            0x00, // no cursor
            0x01, 0x00, 0x00, 0x00, // iteration count
            0b0000_0010, // null bitmap
            0x01, // new-params-bound
            0x03, 0x00, // MYSQL_TYPE_LONG, signed
            0x06, 0x00, // MYSQL_TYPE_NULL
            0x05, 0x00, 0x00, 0x00, // value 5
        ];
        assert_eq!(out, expected);
    }

    #[test]
    fn lenenc_thresholds() {
        let mut out = Vec::new();
        write_bytes_lenenc(&mut out, &[0xAA; 3]);
        assert_eq!(out, vec![3, 0xAA, 0xAA, 0xAA]);

        out.clear();
        write_bytes_lenenc(&mut out, &[0u8; 251]);
        assert_eq!(&out[..3], &[0xFC, 251, 0]);
        assert_eq!(out.len(), 3 + 251);
    }
}
