//! The exchange seam.
//!
//! Everything below the session core - packet framing, TCP/TLS, the auth
//! handshake, row streaming - lives behind [`Pipeline`]: one async method
//! per network exchange, each suspending until the server's complete
//! response. Requests on one pipeline are strictly serialised in submission
//! order; MySQL offers no multiplexing on a single connection.

use crate::codec::ColumnMeta;
use crate::constant::{CapabilityFlags, ServerStatusFlags};
use crate::error::Result;
use crate::version::ServerVersion;

/// The OK/EOF frame fields of a finished exchange.
#[derive(Debug, Clone, Copy)]
pub struct Completion {
    /// Server status word; the connection mirrors this after every exchange.
    pub status: ServerStatusFlags,
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub warnings: u16,
}

impl Completion {
    pub fn new(status: ServerStatusFlags) -> Self {
        Self {
            status,
            affected_rows: 0,
            last_insert_id: 0,
            warnings: 0,
        }
    }
}

/// One decoded text-protocol row keyed by column alias; used by the init
/// discovery query.
#[derive(Debug, Clone, Default)]
pub struct TextRow {
    columns: Vec<(String, Option<String>)>,
}

impl TextRow {
    pub fn new(columns: Vec<(String, Option<String>)>) -> Self {
        Self { columns }
    }

    /// The non-null value of the aliased column, if both exist.
    pub fn get(&self, alias: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(name, _)| name == alias)
            .and_then(|(_, value)| value.as_deref())
    }
}

/// Server-side prepared statement: opaque id plus result shape.
#[derive(Debug, Clone)]
pub struct StatementHandle {
    pub statement_id: u32,
    pub num_params: u16,
    pub columns: Vec<ColumnMeta>,
}

/// One connection's serialised request/response pipeline.
///
/// Implementations own the transport; the session core never sees bytes
/// below the payload level. Rows of user statements flow through the
/// implementation's own back-pressured streams and are out of scope here -
/// the core only consumes completions and the single-row discovery query.
#[allow(async_fn_in_trait)]
pub trait Pipeline {
    /// Transport liveness without wire traffic.
    fn is_open(&self) -> bool;

    /// Capabilities negotiated during the handshake.
    fn capabilities(&self) -> CapabilityFlags;

    /// Version reported in the server greeting.
    fn server_version(&self) -> ServerVersion;

    /// COM_QUERY, discarding any rows.
    async fn exec(&mut self, sql: &str) -> Result<Completion>;

    /// One multi-statement COM_QUERY exchange. Callers must have checked
    /// `CLIENT_MULTI_STATEMENTS`.
    async fn exec_batch(&mut self, statements: &[String]) -> Result<Completion>;

    /// COM_QUERY expected to produce exactly one row.
    async fn query_row(&mut self, sql: &str) -> Result<(TextRow, Completion)>;

    /// COM_STMT_PREPARE.
    async fn prepare(&mut self, sql: &str) -> Result<StatementHandle>;

    /// COM_STMT_EXECUTE with a pre-built payload, discarding any rows.
    async fn execute(&mut self, payload: &[u8]) -> Result<Completion>;

    /// COM_STMT_CLOSE (fire-and-forget on the wire, errors still surface).
    async fn close_statement(&mut self, statement_id: u32) -> Result<()>;

    /// COM_INIT_DB.
    async fn init_db(&mut self, database: &str) -> Result<Completion>;

    /// COM_PING.
    async fn ping(&mut self) -> Result<Completion>;

    /// COM_QUIT followed by transport teardown.
    async fn quit(&mut self) -> Result<()>;
}
