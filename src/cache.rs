//! Prepared-statement cache.
//!
//! Bounded SQL-to-handle mapping with LRU eviction. An evicted handle must
//! be closed on the server, but never while an execute is in flight on it:
//! such handles are marked closing and the close is deferred until the last
//! borrower releases. The connection drains the deferred ids after each
//! statement dispatch.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;

use lru::LruCache;
use tracing::debug;

use crate::pipeline::StatementHandle;

#[derive(Debug)]
pub struct PreparedStatementCache {
    cache: LruCache<String, StatementHandle>,
    /// statement id -> active borrow count
    borrows: HashMap<u32, usize>,
    /// evicted while borrowed; closed on last release
    closing: HashSet<u32>,
    /// ready for server-side close
    pending_close: Vec<u32>,
}

impl PreparedStatementCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
            borrows: HashMap::new(),
            closing: HashSet::new(),
            pending_close: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Look up a cached handle and take a borrow on it.
    pub fn borrow(&mut self, sql: &str) -> Option<StatementHandle> {
        let handle = self.cache.get(sql)?.clone();
        *self.borrows.entry(handle.statement_id).or_insert(0) += 1;
        Some(handle)
    }

    /// Insert a freshly prepared handle and take a borrow on it. The
    /// displaced LRU entry, if any, is scheduled for close.
    pub fn insert(&mut self, sql: &str, handle: StatementHandle) -> StatementHandle {
        let id = handle.statement_id;
        if let Some((evicted_sql, evicted)) = self.cache.push(sql.to_owned(), handle.clone()) {
            if evicted.statement_id != id {
                debug!(sql = %evicted_sql, id = evicted.statement_id, "evicting prepared statement");
                self.schedule_close(evicted.statement_id);
            }
        }
        *self.borrows.entry(id).or_insert(0) += 1;
        handle
    }

    /// Release a borrow taken by [`borrow`](Self::borrow) or
    /// [`insert`](Self::insert).
    pub fn release(&mut self, statement_id: u32) {
        let Some(count) = self.borrows.get_mut(&statement_id) else {
            return;
        };
        *count -= 1;
        if *count == 0 {
            self.borrows.remove(&statement_id);
            if self.closing.remove(&statement_id) {
                self.pending_close.push(statement_id);
            }
        }
    }

    fn schedule_close(&mut self, statement_id: u32) {
        if self.borrows.get(&statement_id).copied().unwrap_or(0) > 0 {
            self.closing.insert(statement_id);
        } else {
            self.pending_close.push(statement_id);
        }
    }

    /// Ids whose server-side close is now safe. Callers issue the closes and
    /// swallow failures.
    pub fn take_pending_closes(&mut self) -> Vec<u32> {
        std::mem::take(&mut self.pending_close)
    }

    /// Empty the cache for connection shutdown; every id (cached, closing or
    /// already pending) is returned for one final close sweep.
    pub fn drain_for_close(&mut self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.pending_close.drain(..).collect();
        ids.extend(self.closing.drain());
        while let Some((_, handle)) = self.cache.pop_lru() {
            ids.push(handle.statement_id);
        }
        self.borrows.clear();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(id: u32) -> StatementHandle {
        StatementHandle {
            statement_id: id,
            num_params: 0,
            columns: Vec::new(),
        }
    }

    #[test]
    fn hit_reuses_the_handle() {
        let mut cache = PreparedStatementCache::new(4);
        cache.insert("SELECT 1", handle(10));
        cache.release(10);

        let hit = cache.borrow("SELECT 1").unwrap();
        assert_eq!(hit.statement_id, 10);
        cache.release(10);
        assert!(cache.take_pending_closes().is_empty());
    }

    #[test]
    fn eviction_schedules_close() {
        let mut cache = PreparedStatementCache::new(2);
        for (i, sql) in ["a", "b", "c"].iter().enumerate() {
            cache.insert(sql, handle(i as u32));
            cache.release(i as u32);
        }
        // "a" fell off the LRU end
        assert_eq!(cache.take_pending_closes(), vec![0]);
        assert!(cache.borrow("a").is_none());
        assert!(cache.borrow("b").is_some());
    }

    #[test]
    fn borrowed_eviction_defers_close() {
        let mut cache = PreparedStatementCache::new(1);
        cache.insert("a", handle(1));
        // still borrowed when "b" evicts it
        cache.insert("b", handle(2));
        cache.release(2);

        assert!(cache.take_pending_closes().is_empty());

        cache.release(1);
        assert_eq!(cache.take_pending_closes(), vec![1]);
    }

    #[test]
    fn drain_collects_everything() {
        let mut cache = PreparedStatementCache::new(4);
        cache.insert("a", handle(1));
        cache.release(1);
        cache.insert("b", handle(2));
        cache.release(2);

        let mut ids = cache.drain_for_close();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2]);
        assert!(cache.is_empty());
    }
}
