//! SQL queries, parsed once and cached.
//!
//! Parsing only needs to find parameter markers, so the scanner understands
//! just enough MySQL lexical structure to know where a `?` is literal text:
//! quoted strings, quoted identifiers and comments.

use std::sync::{Arc, Mutex, PoisonError};

use lru::LruCache;
use std::num::NonZeroUsize;

/// Parsed SQL: either marker-free, or split into literal segments around the
/// ordered parameter markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Simple { sql: String },
    Parametrized(ParametrizedQuery),
}

impl Query {
    pub fn parse(sql: &str) -> Self {
        let markers = find_markers(sql);
        if markers.is_empty() {
            return Query::Simple {
                sql: sql.to_owned(),
            };
        }

        let mut segments = Vec::with_capacity(markers.len() + 1);
        let mut start = 0;
        for &pos in &markers {
            segments.push(sql[start..pos].to_owned());
            start = pos + 1;
        }
        segments.push(sql[start..].to_owned());

        Query::Parametrized(ParametrizedQuery {
            sql: sql.to_owned(),
            markers,
            segments,
        })
    }

    pub fn sql(&self) -> &str {
        match self {
            Query::Simple { sql } => sql,
            Query::Parametrized(query) => &query.sql,
        }
    }

    pub fn is_simple(&self) -> bool {
        matches!(self, Query::Simple { .. })
    }

    pub fn parameter_count(&self) -> usize {
        match self {
            Query::Simple { .. } => 0,
            Query::Parametrized(query) => query.markers.len(),
        }
    }
}

/// A query with `?` markers: the formatted template interleaves the literal
/// segments with numbered slots (segment 0, slot 0, segment 1, slot 1, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParametrizedQuery {
    sql: String,
    /// Byte offsets of the markers in `sql`, in order.
    markers: Vec<usize>,
    /// `markers.len() + 1` literal segments.
    segments: Vec<String>,
}

impl ParametrizedQuery {
    pub fn marker_positions(&self) -> &[usize] {
        &self.markers
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

/// Byte positions of `?` outside strings, quoted identifiers and comments.
fn find_markers(sql: &str) -> Vec<usize> {
    let bytes = sql.as_bytes();
    let mut markers = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'?' => {
                markers.push(i);
                i += 1;
            }
            quote @ (b'\'' | b'"' | b'`') => {
                i += 1;
                while i < bytes.len() {
                    if bytes[i] == b'\\' && quote != b'`' {
                        i += 2;
                    } else if bytes[i] == quote {
                        // doubled quote stays inside the literal
                        if bytes.get(i + 1) == Some(&quote) {
                            i += 2;
                        } else {
                            i += 1;
                            break;
                        }
                    } else {
                        i += 1;
                    }
                }
            }
            b'#' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'-' if bytes.get(i + 1) == Some(&b'-')
                && matches!(bytes.get(i + 2), None | Some(b' ' | b'\t' | b'\n')) =>
            {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i < bytes.len() {
                    if bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/') {
                        i += 2;
                        break;
                    }
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    markers
}

/// Quote an identifier: wrap in backticks, double any internal backtick.
pub fn quote_identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('`');
    for ch in name.chars() {
        if ch == '`' {
            out.push('`');
        }
        out.push(ch);
    }
    out.push('`');
    out
}

/// Inverse of [`quote_identifier`] for well-formed input.
#[cfg(test)]
fn unquote_identifier(quoted: &str) -> String {
    quoted
        .strip_prefix('`')
        .and_then(|s| s.strip_suffix('`'))
        .map(|inner| inner.replace("``", "`"))
        .unwrap_or_else(|| quoted.to_owned())
}

/// Bounded SQL-to-Query mapping, idempotent and shareable across
/// connections.
#[derive(Debug)]
pub struct QueryCache {
    inner: Mutex<LruCache<String, Arc<Query>>>,
}

impl QueryCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Parse-or-fetch. Parsing is side-effect-free, so races only cost a
    /// duplicate parse.
    pub fn get(&self, sql: &str) -> Arc<Query> {
        let mut cache = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(query) = cache.get(sql) {
            return Arc::clone(query);
        }
        let query = Arc::new(Query::parse(sql));
        cache.put(sql.to_owned(), Arc::clone(&query));
        query
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
