//! The immutable view the codecs consume.
//!
//! Produced once by the connection after init and passed by reference into
//! every encode/decode call; codecs never reach back into the connection.

use crate::version::ServerVersion;
use crate::zone::ServerZone;

/// How to surface MySQL's literal zero dates (`0000-00-00 ...`).
///
/// Callers never receive a value with out-of-range components: the zero date
/// either becomes a null marker or the configured sentinel
/// (`0001-01-01 00:00:00`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroDate {
    AsNull,
    Sentinel,
}

/// Character repertoire a string column or literal uses.
///
/// The session charset is negotiated by the handshake layer; the codecs only
/// need to distinguish the repertoires they can transcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Utf8,
    Latin1,
    Binary,
}

impl Charset {
    /// Classify a collation id from column metadata.
    pub fn from_collation(collation: u16) -> Self {
        match collation {
            63 => Self::Binary,
            5 | 8 | 15 | 31 | 47 | 48 | 49 | 94 => Self::Latin1,
            _ => Self::Utf8,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CodecContext {
    /// The server's effective zone, used to interpret naive DATETIME/TIMESTAMP.
    pub server_zone: ServerZone,
    /// The application-side zone, used as the fallback interpretation when
    /// instants are not preserved.
    pub client_zone: ServerZone,
    /// Interpret naive server times in the server zone when materialising
    /// instants, so the same point in time survives a zone mismatch.
    pub preserve_instants: bool,
    /// Decode TINYINT(1) as boolean.
    pub tiny_as_boolean: bool,
    pub zero_date: ZeroDate,
    pub default_charset: Charset,
    pub server_version: ServerVersion,
}

impl CodecContext {
    /// A context with driver defaults, handy before init completes and in
    /// codec unit tests.
    pub fn with_defaults(server_version: ServerVersion) -> Self {
        Self {
            server_zone: ServerZone::UTC,
            client_zone: ServerZone::UTC,
            preserve_instants: true,
            tiny_as_boolean: true,
            zero_date: ZeroDate::AsNull,
            default_charset: Charset::Utf8,
            server_version,
        }
    }
}
