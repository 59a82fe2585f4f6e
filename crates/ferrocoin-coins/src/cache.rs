//! The in-memory overlay cache.

use crate::entry::{CacheEntry, EntryState};
use crate::memusage;
use crate::view::{CoinsMap, CoinsView, CoinsViewBacked};
use crate::Result;
use bitcoin::hashes::Hash;
use bitcoin::{BlockHash, OutPoint, Transaction, TxIn, TxOut};
use ferrocoin_primitives::Coin;
use std::collections::hash_map::Entry;

/// Write-back overlay cache over a backing [`CoinsView`].
///
/// Reads fall through to the backing view on a miss and are memoized;
/// writes touch only this layer until [`Self::flush`] merges the
/// accumulated entries down in one atomic batch. The caller retains
/// ownership of the backing view and must keep it alive for the cache's
/// lifetime.
///
/// Each instance assumes exclusive, single-threaded mutation. Sibling
/// caches over the same backing view must not flush concurrently; the
/// surrounding system serializes that externally.
pub struct CoinsViewCache<'a> {
    backed: CoinsViewBacked<'a>,
    cache: CoinsMap,
    /// Best block memoized from the backing view; `None` until first
    /// queried or explicitly set.
    best_block: Option<BlockHash>,
    height: i32,
    /// Running sum of the cached entries' estimated heap footprint.
    cached_coins_usage: usize,
}

impl<'a> CoinsViewCache<'a> {
    pub fn new(base: &'a mut dyn CoinsView) -> Self {
        Self {
            backed: CoinsViewBacked::new(base),
            cache: CoinsMap::default(),
            best_block: None,
            height: -1,
            cached_coins_usage: 0,
        }
    }

    /// Pull `outpoint` into this layer if it is not already present.
    ///
    /// A backing miss is cached too, as a pruned placeholder marked
    /// fresh: the confirmed absence short-circuits repeat backing
    /// queries, and it lets a later insert of the same key take the
    /// non-merging flush path.
    fn fetch(&mut self, outpoint: &OutPoint) -> Result<()> {
        if self.cache.contains_key(outpoint) {
            return Ok(());
        }
        let entry = match self.backed.get_coin(outpoint)? {
            Some(coin) => CacheEntry::new(Some(coin), EntryState::Clean),
            None => CacheEntry::new(None, EntryState::Fresh),
        };
        self.cached_coins_usage += entry.dynamic_memory_usage();
        self.cache.insert(*outpoint, entry);
        Ok(())
    }

    /// Borrow the coin without cloning, pulling it into the cache first
    /// if needed.
    pub fn access_coin(&mut self, outpoint: &OutPoint) -> Result<Option<&Coin>> {
        self.fetch(outpoint)?;
        Ok(self.cache.get(outpoint).and_then(|entry| entry.coin.as_ref()))
    }

    /// Whether an entry for `outpoint` already resides in this layer.
    ///
    /// Unlike [`CoinsView::have_coin`] this never falls through to the
    /// backing view, so callers can tell "unknown" from "known absent"
    /// without forcing a backing fetch.
    pub fn have_coin_in_cache(&self, outpoint: &OutPoint) -> bool {
        self.cache.contains_key(outpoint)
    }

    /// Insert or replace an unspent coin.
    ///
    /// This is a pure write path: the backing view is never consulted.
    /// `possible_overwrite` is the caller asserting that a previous
    /// value may legitimately exist; when `false` the entry is
    /// additionally marked fresh, which lets a flush use the direct
    /// write path instead of a destructive merge.
    pub fn add_coin(&mut self, outpoint: OutPoint, coin: Coin, possible_overwrite: bool) {
        let entry = match self.cache.entry(outpoint) {
            Entry::Occupied(slot) => {
                let entry = slot.into_mut();
                self.cached_coins_usage -= entry.dynamic_memory_usage();
                entry
            }
            Entry::Vacant(slot) => slot.insert(CacheEntry::new(None, EntryState::Clean)),
        };
        entry.coin = Some(coin);
        entry.state = if possible_overwrite {
            entry.state.mark_dirty()
        } else {
            entry.state.mark_dirty().mark_fresh()
        };
        self.cached_coins_usage += entry.dynamic_memory_usage();
    }

    /// Insert every output of `tx` created at `height`.
    ///
    /// Coinbase outputs pass `possible_overwrite`: under historical
    /// rules they are the one case allowed to collide with an earlier,
    /// fully spent record.
    pub fn add_coins_for_tx(&mut self, tx: &Transaction, height: u32) {
        let is_coinbase = tx.is_coinbase();
        let txid = tx.compute_txid();
        for (vout, output) in tx.output.iter().enumerate() {
            let outpoint = OutPoint::new(txid, vout as u32);
            let coin = Coin::from_txout(output, height, is_coinbase);
            self.add_coin(outpoint, coin, is_coinbase);
        }
    }

    /// Remove a coin, returning the old value for undo logging.
    ///
    /// Spending a coin this view does not have is a caller contract
    /// violation (existence must have been validated first); debug
    /// builds fail loudly, release builds return `Ok(None)`.
    pub fn spend_coin(&mut self, outpoint: &OutPoint) -> Result<Option<Coin>> {
        self.fetch(outpoint)?;
        let entry = self
            .cache
            .get_mut(outpoint)
            .expect("entry was fetched above; qed");
        debug_assert!(entry.coin.is_some(), "spend of missing coin {outpoint}");

        let usage = entry.dynamic_memory_usage();
        let moved = entry.coin.take();
        if entry.state.is_fresh() {
            // The backing view never saw this coin; dropping the entry
            // leaves nothing to propagate.
            self.cache.remove(outpoint);
        } else {
            entry.state = entry.state.mark_dirty();
        }
        self.cached_coins_usage -= usage;
        Ok(moved)
    }

    /// Record the block this view's state now corresponds to.
    pub fn set_best_block(&mut self, hash: BlockHash, height: i32) {
        self.best_block = Some(hash);
        self.height = height;
    }

    /// Height recorded by [`Self::set_best_block`], `-1` if never set.
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Merge every accumulated entry into the backing view in one
    /// atomic batch and empty this layer.
    ///
    /// The memoized best-block marker is written as-is, so callers must
    /// have called [`Self::set_best_block`] with the block the
    /// accumulated changes represent. On error the cache is left intact
    /// and the flush can be retried; on success the cache is empty and
    /// must be treated as consumed.
    pub fn flush(&mut self) -> Result<()> {
        let best_block = self.best_block.unwrap_or_else(BlockHash::all_zeros);
        let entries = self.cache.len();
        self.backed.batch_write(&mut self.cache, best_block, self.height)?;
        self.cached_coins_usage = 0;
        tracing::debug!("Flushed {entries} cache entries at height {}", self.height);
        Ok(())
    }

    /// Evict a single unmodified entry to bound memory.
    ///
    /// Entries carrying any dirty or fresh state are left alone:
    /// removing them would silently discard a pending write or a
    /// memoized miss.
    pub fn uncache(&mut self, outpoint: &OutPoint) {
        if let Some(entry) = self.cache.get(outpoint) {
            if entry.state == EntryState::Clean {
                let usage = entry.dynamic_memory_usage();
                self.cache.remove(outpoint);
                self.cached_coins_usage -= usage;
            }
        }
    }

    /// Number of entries currently cached.
    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }

    /// Estimated total heap footprint of this layer, consulted by the
    /// eviction policy upstream.
    pub fn dynamic_memory_usage(&self) -> usize {
        memusage::hash_map_usage::<OutPoint, CacheEntry>(self.cache.capacity())
            + self.cached_coins_usage
    }

    /// Verify the incremental accounting: the running footprint counter
    /// must equal the sum over all entries. Intended for tests.
    pub fn sanity_check(&self) {
        let recomputed: usize = self
            .cache
            .values()
            .map(CacheEntry::dynamic_memory_usage)
            .sum();
        assert_eq!(
            recomputed, self.cached_coins_usage,
            "cache usage accounting drifted"
        );
    }

    /// Transaction output claimed by `input`.
    ///
    /// # Panics
    ///
    /// Panics if the coin does not exist. Existence must have been
    /// checked earlier in validation; absence here is an ordering bug,
    /// not a recoverable condition.
    pub fn output_for(&mut self, input: &TxIn) -> Result<TxOut> {
        match self.access_coin(&input.previous_output)? {
            Some(coin) => Ok(coin.to_txout()),
            None => panic!(
                "no coin for input {}; existence was not validated first",
                input.previous_output
            ),
        }
    }

    /// Sum of the input coin values of `tx`; zero for a coinbase.
    ///
    /// # Panics
    ///
    /// Panics if any input coin does not exist, like
    /// [`Self::output_for`].
    pub fn value_in(&mut self, tx: &Transaction) -> Result<u64> {
        if tx.is_coinbase() {
            return Ok(0);
        }
        let mut total: u64 = 0;
        for input in &tx.input {
            total += self.output_for(input)?.value.to_sat();
        }
        Ok(total)
    }

    /// Whether every input of `tx` refers to a coin this view has.
    pub fn have_inputs(&mut self, tx: &Transaction) -> Result<bool> {
        if tx.is_coinbase() {
            return Ok(true);
        }
        for input in &tx.input {
            if !self.have_coin(&input.previous_output)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Historical fee-priority heuristic evaluated at `height`: each
    /// confirmed input contributes its value weighted by age. Returns
    /// the weighted sum and the confirmed input value; unconfirmed
    /// inputs contribute nothing.
    pub fn priority(&mut self, tx: &Transaction, height: u32) -> Result<(f64, u64)> {
        if tx.is_coinbase() {
            return Ok((0.0, 0));
        }
        let mut weighted: f64 = 0.0;
        let mut in_chain_value: u64 = 0;
        for input in &tx.input {
            let Some(coin) = self.access_coin(&input.previous_output)? else {
                continue;
            };
            if coin.height <= height {
                weighted += coin.amount as f64 * f64::from(height - coin.height);
                in_chain_value += coin.amount;
            }
        }
        Ok((weighted, in_chain_value))
    }
}

impl CoinsView for CoinsViewCache<'_> {
    fn get_coin(&mut self, outpoint: &OutPoint) -> Result<Option<Coin>> {
        self.fetch(outpoint)?;
        Ok(self.cache.get(outpoint).and_then(|entry| entry.coin.clone()))
    }

    fn have_coin(&mut self, outpoint: &OutPoint) -> Result<bool> {
        self.fetch(outpoint)?;
        Ok(self
            .cache
            .get(outpoint)
            .is_some_and(|entry| entry.coin.is_some()))
    }

    fn best_block(&mut self) -> Result<BlockHash> {
        if let Some(hash) = self.best_block {
            return Ok(hash);
        }
        let hash = self.backed.best_block()?;
        self.best_block = Some(hash);
        Ok(hash)
    }

    /// The layered merge: this cache acts as the backing view for a
    /// child cache being flushed into it.
    fn batch_write(
        &mut self,
        changes: &mut CoinsMap,
        best_block: BlockHash,
        height: i32,
    ) -> Result<()> {
        for (outpoint, incoming) in changes.drain() {
            if !incoming.state.is_dirty() {
                continue;
            }
            match self.cache.entry(outpoint) {
                Entry::Vacant(slot) => {
                    if incoming.state.is_fresh() && incoming.coin.is_none() {
                        // Both layers agree the key never needs
                        // persisting. A conforming child erases such
                        // entries on spend instead of flushing them.
                        debug_assert!(false, "fresh pruned entry for {outpoint} in batch");
                        continue;
                    }
                    // Freshness compounds: only if the child proved the
                    // grandparent lacks the key may this layer claim the
                    // same. A non-fresh child entry may have been
                    // flushed out of this cache earlier and still exist
                    // below.
                    let state = if incoming.state.is_fresh() {
                        EntryState::DirtyFresh
                    } else {
                        EntryState::Dirty
                    };
                    let entry = CacheEntry::new(incoming.coin, state);
                    self.cached_coins_usage += entry.dynamic_memory_usage();
                    slot.insert(entry);
                }
                Entry::Occupied(mut slot) => {
                    if slot.get().state.is_fresh() && incoming.coin.is_none() {
                        // The grandparent never had this key and the
                        // child is deleting it: the create+delete pair
                        // collapses instead of leaving a tombstone.
                        self.cached_coins_usage -= slot.get().dynamic_memory_usage();
                        slot.remove();
                    } else {
                        let entry = slot.get_mut();
                        self.cached_coins_usage -= entry.dynamic_memory_usage();
                        entry.coin = incoming.coin;
                        entry.state = entry.state.mark_dirty();
                        self.cached_coins_usage += entry.dynamic_memory_usage();
                    }
                }
            }
        }
        // The caller is the sole source of truth for what block this
        // view now represents.
        self.best_block = Some(best_block);
        self.height = height;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CoinsDb, MemoryStore};
    use bitcoin::{Amount, ScriptBuf, Sequence, Witness};

    fn outpoint(n: u8) -> OutPoint {
        OutPoint {
            txid: bitcoin::Txid::from_byte_array([n; 32]),
            vout: u32::from(n),
        }
    }

    fn coin(amount: u64) -> Coin {
        Coin::new(false, amount, 100, vec![0x51])
    }

    fn empty_db() -> CoinsDb<MemoryStore> {
        CoinsDb::new(MemoryStore::new())
    }

    fn db_with(coins: &[(OutPoint, Coin)]) -> CoinsDb<MemoryStore> {
        let mut db = empty_db();
        let mut cache = CoinsViewCache::new(&mut db);
        for (outpoint, coin) in coins {
            cache.add_coin(*outpoint, coin.clone(), false);
        }
        cache.flush().unwrap();
        db
    }

    fn spending_tx(inputs: &[OutPoint], value_out: u64) -> Transaction {
        Transaction {
            version: bitcoin::transaction::Version::TWO,
            lock_time: bitcoin::absolute::LockTime::ZERO,
            input: inputs
                .iter()
                .map(|outpoint| TxIn {
                    previous_output: *outpoint,
                    script_sig: ScriptBuf::new(),
                    sequence: Sequence::MAX,
                    witness: Witness::new(),
                })
                .collect(),
            output: vec![TxOut {
                value: Amount::from_sat(value_out),
                script_pubkey: ScriptBuf::from_bytes(vec![0x51]),
            }],
        }
    }

    #[test]
    fn test_miss_is_cached_as_fresh_placeholder() {
        let mut db = empty_db();
        let mut cache = CoinsViewCache::new(&mut db);

        assert!(!cache.have_coin(&outpoint(1)).unwrap());
        assert!(cache.have_coin_in_cache(&outpoint(1)));
        assert_eq!(cache.cache_size(), 1);

        assert!(cache.get_coin(&outpoint(1)).unwrap().is_none());
        cache.sanity_check();
    }

    #[test]
    fn test_spend_of_fresh_coin_erases_entry() {
        let mut db = empty_db();
        let mut cache = CoinsViewCache::new(&mut db);

        cache.add_coin(outpoint(1), coin(1_000), false);
        let moved = cache.spend_coin(&outpoint(1)).unwrap();
        assert_eq!(moved, Some(coin(1_000)));
        assert_eq!(cache.cache_size(), 0);
        cache.sanity_check();

        cache.flush().unwrap();
        assert!(db.store().is_empty());
    }

    #[test]
    fn test_spend_of_backed_coin_leaves_tombstone() {
        let mut db = db_with(&[(outpoint(1), coin(1_000))]);
        let mut cache = CoinsViewCache::new(&mut db);

        let moved = cache.spend_coin(&outpoint(1)).unwrap();
        assert_eq!(moved, Some(coin(1_000)));
        // The entry stays as a pending deletion.
        assert_eq!(cache.cache_size(), 1);
        assert!(!cache.have_coin(&outpoint(1)).unwrap());
        cache.sanity_check();

        cache.flush().unwrap();
        assert!(db.store().is_empty());
    }

    #[test]
    fn test_add_coin_replaces_and_accounts() {
        let mut db = empty_db();
        let mut cache = CoinsViewCache::new(&mut db);

        cache.add_coin(outpoint(1), coin(1_000), false);
        cache.add_coin(outpoint(1), Coin::new(false, 2_000, 101, vec![0x52; 40]), true);
        assert_eq!(
            cache.get_coin(&outpoint(1)).unwrap().unwrap().amount,
            2_000
        );
        cache.sanity_check();
    }

    #[test]
    fn test_uncache_only_evicts_clean_entries() {
        let mut db = db_with(&[(outpoint(1), coin(1_000))]);
        let mut cache = CoinsViewCache::new(&mut db);

        // Dirty entry: uncache is a no-op.
        cache.add_coin(outpoint(2), coin(2_000), false);
        cache.uncache(&outpoint(2));
        assert!(cache.have_coin_in_cache(&outpoint(2)));

        // Fresh placeholder: uncache is a no-op.
        assert!(!cache.have_coin(&outpoint(3)).unwrap());
        cache.uncache(&outpoint(3));
        assert!(cache.have_coin_in_cache(&outpoint(3)));

        // Clean read-through entry: evicted.
        assert!(cache.have_coin(&outpoint(1)).unwrap());
        cache.uncache(&outpoint(1));
        assert!(!cache.have_coin_in_cache(&outpoint(1)));
        cache.sanity_check();
    }

    #[test]
    fn test_best_block_is_memoized_from_backing() {
        let block = BlockHash::from_byte_array([0x22; 32]);
        let mut db = empty_db();
        {
            let mut cache = CoinsViewCache::new(&mut db);
            cache.set_best_block(block, 5);
            cache.flush().unwrap();
        }

        let mut cache = CoinsViewCache::new(&mut db);
        assert_eq!(cache.best_block().unwrap(), block);

        // A memoized value sticks even if the backing moves on.
        let other = BlockHash::from_byte_array([0x33; 32]);
        let mut changes = CoinsMap::default();
        cache.backed.batch_write(&mut changes, other, 6).unwrap();
        assert_eq!(cache.best_block().unwrap(), block);
    }

    #[test]
    fn test_merge_collapses_create_delete_pair() {
        let mut db = empty_db();
        let mut parent = CoinsViewCache::new(&mut db);

        // Child creates a coin the grandparent never sees, then a second
        // child generation deletes it.
        {
            let mut child = CoinsViewCache::new(&mut parent);
            child.add_coin(outpoint(1), coin(1_000), false);
            child.flush().unwrap();
        }
        assert!(parent.have_coin(&outpoint(1)).unwrap());

        {
            let mut child = CoinsViewCache::new(&mut parent);
            child.spend_coin(&outpoint(1)).unwrap();
            child.flush().unwrap();
        }
        // No tombstone survives in the parent.
        assert_eq!(parent.cache_size(), 0);
        parent.sanity_check();

        parent.flush().unwrap();
        assert!(db.store().is_empty());
    }

    #[test]
    fn test_merge_preserves_parent_freshness() {
        let mut db = empty_db();
        let mut parent = CoinsViewCache::new(&mut db);
        parent.add_coin(outpoint(1), coin(1_000), false);

        // A child overwrite must not launder away the parent's knowledge
        // that the database lacks this key.
        let mut child = CoinsViewCache::new(&mut parent);
        child.add_coin(outpoint(1), coin(5_000), true);
        child.flush().unwrap();

        let mut child = CoinsViewCache::new(&mut parent);
        child.spend_coin(&outpoint(1)).unwrap();
        child.flush().unwrap();

        assert_eq!(parent.cache_size(), 0);
        parent.flush().unwrap();
        assert_eq!(db.store().entry_writes(), 0);
    }

    #[test]
    #[should_panic(expected = "no coin for input")]
    fn test_output_for_missing_coin_panics() {
        let mut db = empty_db();
        let mut cache = CoinsViewCache::new(&mut db);
        let tx = spending_tx(&[outpoint(9)], 1);
        let _ = cache.output_for(&tx.input[0]);
    }

    #[test]
    fn test_value_in_and_have_inputs() {
        let mut db = db_with(&[(outpoint(1), coin(600)), (outpoint(2), coin(400))]);
        let mut cache = CoinsViewCache::new(&mut db);

        let tx = spending_tx(&[outpoint(1), outpoint(2)], 900);
        assert!(cache.have_inputs(&tx).unwrap());
        assert_eq!(cache.value_in(&tx).unwrap(), 1_000);

        let missing = spending_tx(&[outpoint(1), outpoint(7)], 1);
        assert!(!cache.have_inputs(&missing).unwrap());
    }

    #[test]
    fn test_priority_weights_by_age() {
        let mut db = db_with(&[(outpoint(1), coin(1_000))]);
        let mut cache = CoinsViewCache::new(&mut db);

        let tx = spending_tx(&[outpoint(1)], 900);
        // The fixture coin was created at height 100.
        let (weighted, in_chain) = cache.priority(&tx, 110).unwrap();
        assert_eq!(in_chain, 1_000);
        assert_eq!(weighted, 10_000.0);
    }

    #[test]
    fn test_add_coins_for_tx_inserts_outputs() {
        let mut db = empty_db();
        let mut cache = CoinsViewCache::new(&mut db);

        let tx = spending_tx(&[outpoint(1)], 700);
        cache.add_coins_for_tx(&tx, 200);

        let created = OutPoint::new(tx.compute_txid(), 0);
        let stored = cache.get_coin(&created).unwrap().unwrap();
        assert_eq!(stored.amount, 700);
        assert_eq!(stored.height, 200);
        assert!(!stored.is_coinbase);
        cache.sanity_check();
    }
}
