//! Statement selection and binding.
//!
//! Four statement flavors cover the query-shape x protocol matrix. The
//! factory picks one from the parsed query and the user's prepare
//! preference; parametrized SQL always prepares when the user voiced any
//! preference at all, because a predicate author expects it to govern both
//! shapes.

use std::sync::Arc;

use crate::codec::{Binding, Encode, Parameter};
use crate::context::CodecContext;
use crate::error::{Error, Result};
use crate::query::Query;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Marker-free SQL over the text protocol.
    TextSimple,
    /// Marker-free SQL, server-prepared on user request.
    PrepareSimple,
    /// Markers substituted client-side, text protocol.
    TextParametrized,
    /// Markers bound server-side.
    PrepareParametrized,
}

impl StatementKind {
    pub fn is_prepared(self) -> bool {
        matches!(self, Self::PrepareSimple | Self::PrepareParametrized)
    }
}

/// Pick the statement flavor for a query.
///
/// `prefer_prepare` is the user predicate already applied to this SQL;
/// `None` means no predicate was configured.
pub fn select_kind(query: &Query, prefer_prepare: Option<bool>) -> StatementKind {
    match (query.is_simple(), prefer_prepare) {
        (true, Some(true)) => StatementKind::PrepareSimple,
        (true, _) => StatementKind::TextSimple,
        (false, None) => StatementKind::TextParametrized,
        (false, Some(_)) => StatementKind::PrepareParametrized,
    }
}

/// A statement ready to collect its binding and execute once.
#[derive(Debug)]
pub struct Statement {
    query: Arc<Query>,
    kind: StatementKind,
    binding: Binding,
}

impl Statement {
    pub fn new(query: Arc<Query>, kind: StatementKind) -> Self {
        let binding = Binding::with_capacity(query.parameter_count());
        Self {
            query,
            kind,
            binding,
        }
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn sql(&self) -> &str {
        self.query.sql()
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    /// Append the next positional parameter.
    pub fn bind(&mut self, param: Parameter) -> Result<()> {
        if self.binding.len() >= self.query.parameter_count() {
            return Err(Error::Usage(format!(
                "statement takes {} parameters, got more",
                self.query.parameter_count()
            )));
        }
        self.binding.push(param);
        Ok(())
    }

    /// Encode and append a native value.
    pub fn bind_value<T: Encode>(&mut self, value: &T, ctx: &CodecContext) -> Result<()> {
        self.bind(value.encode(ctx)?)
    }

    fn check_complete(&self) -> Result<()> {
        if self.binding.len() != self.query.parameter_count() {
            return Err(Error::Usage(format!(
                "statement takes {} parameters, {} bound",
                self.query.parameter_count(),
                self.binding.len()
            )));
        }
        Ok(())
    }

    /// Render text-protocol SQL with every marker replaced by its
    /// parameter's literal. Consumes the parameters' text channels.
    pub fn interpolated_sql(&self) -> Result<String> {
        self.check_complete()?;
        let Query::Parametrized(parsed) = self.query.as_ref() else {
            return Ok(self.query.sql().to_owned());
        };

        let segments = parsed.segments();
        let mut sql = String::with_capacity(self.query.sql().len() + 16 * self.binding.len());
        for (i, segment) in segments.iter().enumerate() {
            sql.push_str(segment);
            if let Some(param) = self.binding.get(i) {
                param.write_text(&mut sql)?;
            }
        }
        Ok(sql)
    }

    /// Build the COM_STMT_EXECUTE payload for a prepared execution.
    /// Consumes the parameters' binary channels.
    pub fn execute_payload(&self, statement_id: u32) -> Result<Vec<u8>> {
        self.check_complete()?;
        let mut payload = Vec::with_capacity(16 + 16 * self.binding.len());
        self.binding.write_execute(statement_id, &mut payload)?;
        Ok(payload)
    }
}
