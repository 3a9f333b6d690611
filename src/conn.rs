//! The connection state machine.
//!
//! Lifecycle: a freshly authenticated pipeline enters [`Connection::init`],
//! which runs the discovery exchange and the optional database selection,
//! then hands back an idle session. From there the session toggles between
//! idle and in-transaction as the server status word dictates, until
//! [`Connection::close`] consumes it.
//!
//! The status word arrives on every completion frame and is mirrored into an
//! atomic; isolation level and lock-wait timeout are tracked client-side
//! because MySQL exposes no query to read the current transaction's values
//! (the inference is advisory: SQL sent by other means is invisible here).

use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::cache::PreparedStatementCache;
use crate::codec::{Encode, Parameter};
use crate::constant::{CapabilityFlags, ServerStatusFlags};
use crate::context::CodecContext;
use crate::error::{Error, Result, ServerError};
use crate::opts::{Opts, PreparePredicate};
use crate::pipeline::{Completion, Pipeline};
use crate::query::{QueryCache, quote_identifier};
use crate::statement::{Statement, StatementKind, select_kind};
use crate::version::ServerVersion;
use crate::zone::resolve_server_zone;

/// MySQL's default for `innodb_lock_wait_timeout`, used when discovery
/// returns NULL.
const DEFAULT_LOCK_WAIT_TIMEOUT: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }

    /// Parse the server's spelling (`READ-COMMITTED`); SQL spelling with
    /// spaces is accepted too.
    pub fn from_server(value: &str) -> Option<Self> {
        match value.replace(' ', "-").to_ascii_uppercase().as_str() {
            "READ-UNCOMMITTED" => Some(Self::ReadUncommitted),
            "READ-COMMITTED" => Some(Self::ReadCommitted),
            "REPEATABLE-READ" => Some(Self::RepeatableRead),
            "SERIALIZABLE" => Some(Self::Serializable),
            _ => None,
        }
    }
}

/// Attributes of a `START TRANSACTION` issued through
/// [`Connection::begin_transaction_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionDefinition {
    pub isolation: Option<IsolationLevel>,
    pub read_only: Option<bool>,
    pub with_consistent_snapshot: bool,
    pub lock_wait_timeout: Option<u64>,
}

/// How deep [`Connection::validate`] probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationDepth {
    /// Transport liveness only.
    Local,
    /// Server round trip (PING).
    Remote,
}

pub struct Connection<P: Pipeline> {
    pipeline: P,
    /// Mirror of the latest server status word. Written by the request path,
    /// loadable from anywhere without synchronisation beyond the atomic.
    status: AtomicU16,
    version: ServerVersion,
    context: CodecContext,

    session_isolation: IsolationLevel,
    current_isolation: IsolationLevel,
    session_lock_wait_timeout: u64,
    current_lock_wait_timeout: u64,
    /// Declared but not yet wired to the server; kept as the extension
    /// point for a future `max_execution_time` emission.
    statement_timeout: Option<Duration>,

    statements: PreparedStatementCache,
    queries: Arc<QueryCache>,
    prefer_prepare: Option<PreparePredicate>,
}

impl<P: Pipeline> Connection<P> {
    /// Drive a freshly authenticated pipeline to the idle state.
    ///
    /// Init steps: (1) build the discovery query from the server version and
    /// configuration, (2) run it and absorb isolation, lock timeout and the
    /// server zone, (3) freeze the codec context, (4) select the configured
    /// database, creating it on demand, (5) hand off to idle.
    #[instrument(skip_all, fields(db = opts.db.as_deref()))]
    pub async fn init(mut pipeline: P, opts: &Opts, queries: Arc<QueryCache>) -> Result<Self> {
        let version = pipeline.server_version();

        // step 1: discovery query
        let mut discovery = format!(
            "SELECT {} AS i, @@innodb_lock_wait_timeout AS l, @@version_comment AS v",
            version.isolation_variable()
        );
        if opts.discover_server_zone {
            discovery.push_str(", @@system_time_zone AS s, @@time_zone AS t");
        }

        // step 2: run it and absorb the session variables
        let (row, completion) = pipeline.query_row(&discovery).await?;

        let session_isolation = row
            .get("i")
            .and_then(IsolationLevel::from_server)
            .unwrap_or_else(|| {
                warn!(
                    value = row.get("i"),
                    "unrecognized isolation level, assuming REPEATABLE READ"
                );
                IsolationLevel::RepeatableRead
            });

        let lock_wait_timeout = row
            .get("l")
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_LOCK_WAIT_TIMEOUT);

        if let Some(comment) = row.get("v") {
            debug!(version = %version, comment, "connected");
        }

        let server_zone = if opts.discover_server_zone {
            resolve_server_zone(
                row.get("t").unwrap_or(""),
                row.get("s").unwrap_or(""),
                opts.client_zone,
            )
        } else {
            opts.client_zone
        };

        // step 3: freeze the codec context
        let context = CodecContext {
            server_zone,
            client_zone: opts.client_zone,
            preserve_instants: opts.preserve_instants,
            tiny_as_boolean: opts.tiny_as_boolean,
            zero_date: opts.zero_date,
            default_charset: crate::context::Charset::Utf8,
            server_version: version,
        };

        let mut conn = Self {
            pipeline,
            status: AtomicU16::new(completion.status.bits()),
            version,
            context,
            session_isolation,
            current_isolation: session_isolation,
            session_lock_wait_timeout: lock_wait_timeout,
            current_lock_wait_timeout: lock_wait_timeout,
            statement_timeout: None,
            statements: PreparedStatementCache::new(opts.statement_cache_size),
            queries,
            prefer_prepare: opts.prefer_prepare.clone(),
        };

        // step 4: database selection, creating the schema on demand
        if let Some(db) = &opts.db {
            conn.select_database(db).await?;
        }

        // step 5: idle
        Ok(conn)
    }

    async fn select_database(&mut self, db: &str) -> Result<()> {
        match self.pipeline.init_db(db).await {
            Ok(completion) => {
                self.observe(completion);
                Ok(())
            }
            Err(Error::ServerError(err)) if err.code == ServerError::UNKNOWN_DATABASE => {
                debug!(db, "database missing, creating it");
                let create = format!("CREATE DATABASE IF NOT EXISTS {}", quote_identifier(db));
                let completion = self.pipeline.exec(&create).await?;
                self.observe(completion);

                // a second failure is fatal for init
                let completion = self.pipeline.init_db(db).await?;
                self.observe(completion);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn observe(&self, completion: Completion) {
        self.status
            .store(completion.status.bits(), Ordering::Release);
    }

    pub fn server_status(&self) -> ServerStatusFlags {
        ServerStatusFlags::from_bits_truncate(self.status.load(Ordering::Acquire))
    }

    pub fn in_transaction(&self) -> bool {
        self.server_status()
            .contains(ServerStatusFlags::SERVER_STATUS_IN_TRANS)
    }

    /// Effective autocommit: forced off while a transaction is open.
    pub fn is_auto_commit(&self) -> bool {
        let status = self.server_status();
        !status.contains(ServerStatusFlags::SERVER_STATUS_IN_TRANS)
            && status.contains(ServerStatusFlags::SERVER_STATUS_AUTOCOMMIT)
    }

    pub fn server_version(&self) -> ServerVersion {
        self.version
    }

    pub fn codec_context(&self) -> &CodecContext {
        &self.context
    }

    pub fn session_isolation(&self) -> IsolationLevel {
        self.session_isolation
    }

    /// The inferred isolation of the current transaction. Advisory: server
    /// side changes made by other sessions or out-of-band SQL are invisible.
    pub fn current_isolation(&self) -> IsolationLevel {
        self.current_isolation
    }

    pub fn lock_wait_timeout(&self) -> u64 {
        self.current_lock_wait_timeout
    }

    pub fn statement_timeout(&self) -> Option<Duration> {
        self.statement_timeout
    }

    /// Encode a native value against this session's codec context.
    pub fn encode<T: Encode>(&self, value: &T) -> Result<Parameter> {
        value.encode(&self.context)
    }

    /// Parse (or fetch) the SQL and pick the statement flavor.
    pub fn statement(&self, sql: &str) -> Statement {
        let query = self.queries.get(sql);
        let preference = self.prefer_prepare.as_ref().map(|predicate| predicate(sql));
        let kind = select_kind(&query, preference);
        Statement::new(query, kind)
    }

    /// Run the statements of one logical step, batched into a single
    /// exchange when the server speaks multi-statements.
    async fn run_step(&mut self, statements: Vec<String>) -> Result<()> {
        if statements.len() > 1
            && self
                .pipeline
                .capabilities()
                .contains(CapabilityFlags::CLIENT_MULTI_STATEMENTS)
        {
            let completion = self.pipeline.exec_batch(&statements).await?;
            self.observe(completion);
        } else {
            for sql in &statements {
                let completion = self.pipeline.exec(sql).await?;
                self.observe(completion);
            }
        }
        Ok(())
    }

    /// `BEGIN` with session defaults.
    #[instrument(skip_all)]
    pub async fn begin_transaction(&mut self) -> Result<()> {
        self.begin_transaction_with(&TransactionDefinition::default())
            .await
    }

    /// Start a transaction with explicit attributes.
    #[instrument(skip_all)]
    pub async fn begin_transaction_with(&mut self, def: &TransactionDefinition) -> Result<()> {
        if self.in_transaction() {
            return Err(Error::Usage(
                "cannot begin: a transaction is already active".into(),
            ));
        }

        let mut statements = Vec::with_capacity(3);
        if let Some(timeout) = def.lock_wait_timeout {
            statements.push(format!("SET innodb_lock_wait_timeout={}", timeout));
        }
        if let Some(level) = def.isolation {
            // pre-begin form: applies to the next transaction only
            statements.push(format!("SET TRANSACTION ISOLATION LEVEL {}", level.as_sql()));
        }
        statements.push(begin_sql(def));

        self.run_step(statements).await?;

        if let Some(level) = def.isolation {
            self.current_isolation = level;
        }
        if let Some(timeout) = def.lock_wait_timeout {
            self.current_lock_wait_timeout = timeout;
        }
        Ok(())
    }

    #[instrument(skip_all)]
    pub async fn commit_transaction(&mut self) -> Result<()> {
        self.end_transaction("COMMIT").await
    }

    #[instrument(skip_all)]
    pub async fn rollback_transaction(&mut self) -> Result<()> {
        self.end_transaction("ROLLBACK").await
    }

    async fn end_transaction(&mut self, terminator: &str) -> Result<()> {
        if !self.in_transaction() {
            debug!(terminator, "no active transaction, skipping");
            return Ok(());
        }

        let mut statements = vec![terminator.to_owned()];
        if self.current_lock_wait_timeout != self.session_lock_wait_timeout {
            statements.push(format!(
                "SET innodb_lock_wait_timeout={}",
                self.session_lock_wait_timeout
            ));
        }

        self.run_step(statements).await?;

        self.current_isolation = self.session_isolation;
        self.current_lock_wait_timeout = self.session_lock_wait_timeout;
        Ok(())
    }

    /// Change the session isolation level.
    ///
    /// Inside a transaction only the inferred current level moves; the
    /// session-scope value the server applies to later transactions is
    /// restored into the tracker on COMMIT/ROLLBACK.
    #[instrument(skip_all)]
    pub async fn set_transaction_isolation_level(&mut self, level: IsolationLevel) -> Result<()> {
        let sql = format!("SET SESSION TRANSACTION ISOLATION LEVEL {}", level.as_sql());
        let completion = self.pipeline.exec(&sql).await?;
        self.observe(completion);

        self.current_isolation = level;
        if !self.in_transaction() {
            self.session_isolation = level;
        }
        Ok(())
    }

    #[instrument(skip_all)]
    pub async fn set_lock_wait_timeout(&mut self, seconds: u64) -> Result<()> {
        let sql = format!("SET innodb_lock_wait_timeout={}", seconds);
        let completion = self.pipeline.exec(&sql).await?;
        self.observe(completion);

        self.current_lock_wait_timeout = seconds;
        if !self.in_transaction() {
            self.session_lock_wait_timeout = seconds;
        }
        Ok(())
    }

    /// Toggle autocommit. A request matching the current effective state is
    /// a no-op without wire traffic.
    #[instrument(skip_all)]
    pub async fn set_auto_commit(&mut self, enabled: bool) -> Result<()> {
        if enabled == self.is_auto_commit() {
            return Ok(());
        }
        let sql = format!("SET autocommit={}", if enabled { 1 } else { 0 });
        let completion = self.pipeline.exec(&sql).await?;
        self.observe(completion);
        Ok(())
    }

    /// Declared per the session contract; currently records the value and
    /// emits nothing.
    pub fn set_statement_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.statement_timeout = Some(timeout);
        Ok(())
    }

    pub async fn create_savepoint(&mut self, name: &str) -> Result<()> {
        self.savepoint_op("SAVEPOINT", name).await
    }

    pub async fn release_savepoint(&mut self, name: &str) -> Result<()> {
        self.savepoint_op("RELEASE SAVEPOINT", name).await
    }

    pub async fn rollback_to_savepoint(&mut self, name: &str) -> Result<()> {
        self.savepoint_op("ROLLBACK TO SAVEPOINT", name).await
    }

    async fn savepoint_op(&mut self, verb: &str, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::Usage("savepoint name must not be empty".into()));
        }
        let sql = format!("{} {}", verb, quote_identifier(name));
        let completion = self.pipeline.exec(&sql).await?;
        self.observe(completion);
        Ok(())
    }

    /// Liveness probe. Never errors: a REMOTE probe that fails in any way
    /// reports `false`.
    #[instrument(skip_all)]
    pub async fn validate(&mut self, depth: ValidationDepth) -> bool {
        if !self.pipeline.is_open() {
            return false;
        }
        match depth {
            ValidationDepth::Local => true,
            ValidationDepth::Remote => match self.pipeline.ping().await {
                Ok(completion) => {
                    self.observe(completion);
                    true
                }
                Err(err) => {
                    warn!(error = %err, "ping failed during validation");
                    false
                }
            },
        }
    }

    /// Execute a statement built by [`Connection::statement`].
    #[instrument(skip_all, fields(kind = ?statement.kind()))]
    pub async fn execute(&mut self, statement: Statement) -> Result<Completion> {
        let completion = match statement.kind() {
            StatementKind::TextSimple => self.pipeline.exec(statement.sql()).await?,
            StatementKind::TextParametrized => {
                let sql = statement.interpolated_sql()?;
                self.pipeline.exec(&sql).await?
            }
            StatementKind::PrepareSimple | StatementKind::PrepareParametrized => {
                self.execute_prepared(&statement).await?
            }
        };
        self.observe(completion);
        self.sweep_evicted().await;
        Ok(completion)
    }

    async fn execute_prepared(&mut self, statement: &Statement) -> Result<Completion> {
        let handle = match self.statements.borrow(statement.sql()) {
            Some(handle) => handle,
            None => {
                let handle = self.pipeline.prepare(statement.sql()).await?;
                self.statements.insert(statement.sql(), handle)
            }
        };

        let payload = match statement.execute_payload(handle.statement_id) {
            Ok(payload) => payload,
            Err(err) => {
                self.statements.release(handle.statement_id);
                return Err(err);
            }
        };

        let result = self.pipeline.execute(&payload).await;
        self.statements.release(handle.statement_id);
        result
    }

    /// Close evicted statements whose last borrower has released. Background
    /// work: failures are logged, never surfaced.
    async fn sweep_evicted(&mut self) {
        for id in self.statements.take_pending_closes() {
            if let Err(err) = self.pipeline.close_statement(id).await {
                warn!(statement_id = id, error = %err, "failed to close evicted statement");
            }
        }
    }

    /// Pool hook, before the connection returns to the pool: roll back any
    /// transaction the borrower left open.
    #[instrument(skip_all)]
    pub async fn pre_release(&mut self) -> Result<()> {
        if self.in_transaction() {
            self.rollback_transaction().await?;
        }
        Ok(())
    }

    /// Pool hook, after allocation: restore autocommit if the previous
    /// borrower disabled it.
    #[instrument(skip_all)]
    pub async fn post_allocate(&mut self) -> Result<()> {
        if !self.in_transaction()
            && !self
                .server_status()
                .contains(ServerStatusFlags::SERVER_STATUS_AUTOCOMMIT)
        {
            self.set_auto_commit(true).await?;
        }
        Ok(())
    }

    /// Graceful teardown: close cached statements, send quit, drop the
    /// transport. Consuming `self` makes further use impossible.
    #[instrument(skip_all)]
    pub async fn close(mut self) -> Result<()> {
        for id in self.statements.drain_for_close() {
            if let Err(err) = self.pipeline.close_statement(id).await {
                warn!(statement_id = id, error = %err, "failed to close statement during shutdown");
            }
        }
        self.pipeline.quit().await
    }
}

fn begin_sql(def: &TransactionDefinition) -> String {
    let mut modifiers: Vec<&str> = Vec::with_capacity(2);
    match def.read_only {
        Some(true) => modifiers.push("READ ONLY"),
        Some(false) => modifiers.push("READ WRITE"),
        None => {}
    }
    if def.with_consistent_snapshot {
        modifiers.push("WITH CONSISTENT SNAPSHOT");
    }

    if modifiers.is_empty() {
        "BEGIN".to_owned()
    } else {
        format!("START TRANSACTION {}", modifiers.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_sql_forms() {
        assert_eq!(begin_sql(&TransactionDefinition::default()), "BEGIN");
        assert_eq!(
            begin_sql(&TransactionDefinition {
                read_only: Some(true),
                ..TransactionDefinition::default()
            }),
            "START TRANSACTION READ ONLY"
        );
        assert_eq!(
            begin_sql(&TransactionDefinition {
                read_only: Some(false),
                with_consistent_snapshot: true,
                ..TransactionDefinition::default()
            }),
            "START TRANSACTION READ WRITE, WITH CONSISTENT SNAPSHOT"
        );
        assert_eq!(
            begin_sql(&TransactionDefinition {
                with_consistent_snapshot: true,
                ..TransactionDefinition::default()
            }),
            "START TRANSACTION WITH CONSISTENT SNAPSHOT"
        );
    }

    #[test]
    fn isolation_parse_accepts_both_spellings() {
        assert_eq!(
            IsolationLevel::from_server("READ-COMMITTED"),
            Some(IsolationLevel::ReadCommitted)
        );
        assert_eq!(
            IsolationLevel::from_server("repeatable read"),
            Some(IsolationLevel::RepeatableRead)
        );
        assert_eq!(IsolationLevel::from_server("SNAPSHOT"), None);
    }
}
