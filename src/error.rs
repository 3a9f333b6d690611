use thiserror::Error;

pub use color_eyre::eyre::eyre;

pub type Result<T> = core::result::Result<T, Error>;

/// An ERR packet surfaced as a domain error.
///
/// The connection remains usable after a server error unless the error is
/// state-fatal (the transport layer reports that separately).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Server error {code} ({sql_state}): {message}")]
pub struct ServerError {
    /// MySQL error code, e.g. 1049 for ER_BAD_DB_ERROR
    pub code: u16,
    pub sql_state: String,
    pub message: String,
}

impl ServerError {
    /// ER_BAD_DB_ERROR - the named database does not exist
    pub const UNKNOWN_DATABASE: u16 = 1049;
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Server Error: {0}")]
    ServerError(#[from] ServerError),

    /// Transport failure. Unrecoverable: further operations on the same
    /// connection surface the same condition.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Unexpected packet shape or buffer under-run. Unrecoverable per
    /// connection and triggers close.
    #[error("Protocol corrupt: {0}")]
    ProtocolCorrupt(color_eyre::Report),

    /// The requested target type cannot represent the column value
    /// (wrong column family, or widening overflow).
    #[error("Cannot decode {column} as {target}")]
    UnsupportedConversion {
        column: &'static str,
        target: &'static str,
    },

    /// A text-protocol payload failed to parse.
    #[error("Malformed {target} text payload: {input}")]
    DecodeSyntax { target: &'static str, input: String },

    /// The value is outside the domain any codec claims, e.g. a date beyond
    /// what MySQL can transmit.
    #[error("No codec accepts this value: {0}")]
    NoCodec(String),

    /// A parameter was asked to serialise twice on the same channel.
    #[error("Parameter already consumed for the {0} channel")]
    ParameterReused(&'static str),

    #[error("Bad config error: {0}")]
    BadConfig(String),

    /// Bad argument detected before any wire traffic.
    #[error("Usage error: {0}")]
    Usage(String),

    #[error("A bug in ripple-mysql: {0}")]
    LibraryBug(color_eyre::Report),
}

impl From<core::convert::Infallible> for Error {
    fn from(err: core::convert::Infallible) -> Self {
        match err {}
    }
}

impl Error {
    pub fn from_debug(err: impl std::fmt::Debug) -> Self {
        Self::LibraryBug(eyre!(format!("{:#?}", err)))
    }

    /// True for taxonomy classes 1 and 2: the connection must be closed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::IoError(_) | Error::ProtocolCorrupt(_))
    }
}

impl<Src, Dst: ?Sized> From<zerocopy::CastError<Src, Dst>> for Error {
    fn from(err: zerocopy::CastError<Src, Dst>) -> Self {
        Self::ProtocolCorrupt(eyre!("{:#?}", err))
    }
}
