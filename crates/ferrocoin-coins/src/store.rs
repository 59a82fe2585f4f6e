//! The backing-store boundary.
//!
//! The cache stack bottoms out in a [`CoinsDb`], which speaks the coin
//! codec over any [`KeyValueStore`]. The store contract is deliberately
//! small so a real disk engine can sit behind it; [`MemoryStore`] is the
//! reference implementation and the test backing.

use crate::entry::CacheEntry;
use crate::view::{CoinsCursor, CoinsMap, CoinsView};
use crate::{Error, Result};
use bitcoin::hashes::Hash;
use bitcoin::{BlockHash, OutPoint};
use ferrocoin_codec::{deserialize_coin, serialize_coin};
use ferrocoin_primitives::{Coin, StorageKey, key_to_outpoint, outpoint_to_key};
use std::cell::Cell;
use std::collections::HashMap;

/// Contract required from a persistent key-value engine.
///
/// `write_batch` must be all-or-nothing: either every entry and the
/// metadata land, or nothing does. A `None` value deletes the key.
pub trait KeyValueStore {
    fn get(&self, key: &StorageKey) -> Result<Option<Vec<u8>>>;

    fn exists(&self, key: &StorageKey) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    fn write_batch(
        &mut self,
        entries: Vec<(StorageKey, Option<Vec<u8>>)>,
        best_block: BlockHash,
        height: i32,
    ) -> Result<()>;

    fn best_block(&self) -> Result<BlockHash>;

    /// Full scan in unspecified order; `None` if the engine cannot scan.
    fn scan(&self) -> Option<Box<dyn Iterator<Item = Result<(StorageKey, Vec<u8>)>> + '_>> {
        None
    }
}

/// In-memory reference store.
///
/// Tracks read and entry-write counters so tests can assert I/O shapes,
/// e.g. that a fresh-insert flush performs exactly one write and no
/// reads.
#[derive(Debug)]
pub struct MemoryStore {
    map: HashMap<StorageKey, Vec<u8>>,
    best_block: BlockHash,
    height: i32,
    reads: Cell<u64>,
    entry_writes: u64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
            best_block: BlockHash::all_zeros(),
            height: -1,
            reads: Cell::new(0),
            entry_writes: 0,
        }
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Height written by the last batch, `-1` before the first.
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Point reads served so far (including existence checks).
    pub fn reads(&self) -> u64 {
        self.reads.get()
    }

    /// Individual entry writes and deletes applied so far.
    pub fn entry_writes(&self) -> u64 {
        self.entry_writes
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &StorageKey) -> Result<Option<Vec<u8>>> {
        self.reads.set(self.reads.get() + 1);
        Ok(self.map.get(key).cloned())
    }

    fn exists(&self, key: &StorageKey) -> Result<bool> {
        self.reads.set(self.reads.get() + 1);
        Ok(self.map.contains_key(key))
    }

    fn write_batch(
        &mut self,
        entries: Vec<(StorageKey, Option<Vec<u8>>)>,
        best_block: BlockHash,
        height: i32,
    ) -> Result<()> {
        for (key, value) in entries {
            match value {
                Some(value) => {
                    self.map.insert(key, value);
                }
                None => {
                    self.map.remove(&key);
                }
            }
            self.entry_writes += 1;
        }
        self.best_block = best_block;
        self.height = height;
        Ok(())
    }

    fn best_block(&self) -> Result<BlockHash> {
        Ok(self.best_block)
    }

    fn scan(&self) -> Option<Box<dyn Iterator<Item = Result<(StorageKey, Vec<u8>)>> + '_>> {
        Some(Box::new(
            self.map.iter().map(|(key, value)| Ok((*key, value.clone()))),
        ))
    }
}

/// Codec-backed coins view over a [`KeyValueStore`].
///
/// One record per outpoint. Pruned coins are deleted outright rather
/// than written as empty records, so nothing economically dead survives
/// a flush to durable storage.
pub struct CoinsDb<S> {
    store: S,
}

impl<S: KeyValueStore> CoinsDb<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

impl<S: KeyValueStore> CoinsView for CoinsDb<S> {
    fn get_coin(&mut self, outpoint: &OutPoint) -> Result<Option<Coin>> {
        let key = outpoint_to_key(outpoint);
        match self.store.get(&key)? {
            Some(bytes) => {
                let coin = deserialize_coin(&bytes).map_err(|source| Error::Corrupted {
                    outpoint: *outpoint,
                    source,
                })?;
                Ok(Some(coin))
            }
            None => Ok(None),
        }
    }

    fn have_coin(&mut self, outpoint: &OutPoint) -> Result<bool> {
        self.store.exists(&outpoint_to_key(outpoint))
    }

    fn best_block(&mut self) -> Result<BlockHash> {
        self.store.best_block()
    }

    fn batch_write(
        &mut self,
        changes: &mut CoinsMap,
        best_block: BlockHash,
        height: i32,
    ) -> Result<()> {
        let mut entries = Vec::with_capacity(changes.len());
        for (outpoint, entry) in changes.iter() {
            if !entry.state.is_dirty() {
                continue;
            }
            let key = outpoint_to_key(outpoint);
            let value = entry.coin.as_ref().map(serialize_coin);
            entries.push((key, value));
        }
        let dirty = entries.len();
        self.store.write_batch(entries, best_block, height)?;
        // Drained only once the store confirmed the whole batch.
        changes.clear();
        tracing::debug!("Committed {dirty} coin records at height {height}");
        Ok(())
    }

    fn cursor(&self) -> Option<CoinsCursor<'_>> {
        let iter = self.store.scan()?;
        Some(Box::new(iter.map(|item| {
            let (key, bytes) = item?;
            let outpoint = key_to_outpoint(&key);
            let coin = deserialize_coin(&bytes)
                .map_err(|source| Error::Corrupted { outpoint, source })?;
            Ok((outpoint, coin))
        })))
    }
}
