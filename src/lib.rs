mod cache;
pub mod codec;
pub mod conn;
pub mod constant;
pub mod context;
pub mod error;
mod opts;
pub mod pipeline;
pub mod query;
pub mod statement;
mod version;
pub mod zone;

pub use cache::PreparedStatementCache;
pub use codec::{Binding, BitSet, ColumnMeta, Parameter};
pub use conn::{Connection, IsolationLevel, TransactionDefinition, ValidationDepth};
pub use context::{Charset, CodecContext, ZeroDate};
pub use error::{Error, Result, ServerError};
pub use opts::{Opts, PreparePredicate};
pub use pipeline::{Completion, Pipeline, StatementHandle, TextRow};
pub use query::{Query, QueryCache};
pub use statement::{Statement, StatementKind};
pub use version::ServerVersion;
pub use zone::ServerZone;
