//! Owner of the canonical chain-state stack.
//!
//! Older designs kept the committed coins view and its guarding lock in
//! process-wide globals. Here the orchestrator creates exactly one
//! [`ChainState`] at node startup, hands references down to whoever
//! validates, and drops it at shutdown.

use crate::cache::CoinsViewCache;
use crate::store::{CoinsDb, KeyValueStore};
use crate::Result;
use parking_lot::Mutex;

/// The single owner of the committed coins database.
///
/// All mutation of the committed state goes through [`Self::with_cache`],
/// whose lock also serializes sibling flushes: two caches over the same
/// backing view must never flush concurrently.
pub struct ChainState<S> {
    db: Mutex<CoinsDb<S>>,
}

impl<S: KeyValueStore> ChainState<S> {
    pub fn new(store: S) -> Self {
        Self {
            db: Mutex::new(CoinsDb::new(store)),
        }
    }

    /// Run `f` with a fresh cache layer over the committed view, then
    /// flush the accumulated changes.
    ///
    /// If `f` fails nothing is flushed and the committed state is
    /// untouched.
    pub fn with_cache<T>(&self, f: impl FnOnce(&mut CoinsViewCache<'_>) -> Result<T>) -> Result<T> {
        let mut db = self.db.lock();
        let mut cache = CoinsViewCache::new(&mut *db);
        let value = f(&mut cache)?;
        cache.flush()?;
        Ok(value)
    }

    /// Run `f` against the committed database view directly, without an
    /// overlay.
    pub fn with_db<T>(&self, f: impl FnOnce(&mut CoinsDb<S>) -> T) -> T {
        f(&mut self.db.lock())
    }

    /// Tear down and recover the underlying store.
    pub fn into_store(self) -> S {
        self.db.into_inner().into_store()
    }
}
