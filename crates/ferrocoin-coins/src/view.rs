//! The abstract coins view contract and the pass-through decorator.

use crate::entry::CacheEntry;
use crate::Result;
use bitcoin::{BlockHash, OutPoint};
use ferrocoin_primitives::Coin;
use std::collections::HashMap;

/// Keyed container of cache entries.
///
/// The std hash map's default hasher is randomly keyed SipHash, which
/// keeps outpoint keys safe against hash-flooding from adversarial
/// peers; insertion order carries no meaning.
pub type CoinsMap = HashMap<OutPoint, CacheEntry>;

/// Full-scan iterator over a view's coins, for maintenance and
/// verification tools.
pub type CoinsCursor<'a> = Box<dyn Iterator<Item = Result<(OutPoint, Coin)>> + 'a>;

/// Read/write contract over a keyed coin store.
///
/// Concrete implementations: the codec-backed database view
/// ([`crate::CoinsDb`]), the overlay cache ([`crate::CoinsViewCache`])
/// and the pass-through decorator ([`CoinsViewBacked`]). Absence of a
/// coin is `Ok(None)`, never an error; `Err` means the backing layer
/// itself failed.
pub trait CoinsView {
    /// Return the coin for `outpoint` if it exists and is unspent from
    /// this view's perspective.
    fn get_coin(&mut self, outpoint: &OutPoint) -> Result<Option<Coin>>;

    /// Existence check. The default goes through [`Self::get_coin`];
    /// concrete stores can answer without materializing the value.
    fn have_coin(&mut self, outpoint: &OutPoint) -> Result<bool> {
        Ok(self.get_coin(outpoint)?.is_some())
    }

    /// Hash of the block whose application produced this view's state.
    /// The all-zero hash means unknown/empty.
    fn best_block(&mut self) -> Result<BlockHash>;

    /// Atomically apply a batch of dirty entries and move the best-block
    /// marker. On success `changes` is left drained; on error it is
    /// untouched and the caller may retry. The marker and height are
    /// adopted even if no entry in the batch was dirty.
    fn batch_write(
        &mut self,
        changes: &mut CoinsMap,
        best_block: BlockHash,
        height: i32,
    ) -> Result<()>;

    /// Full-scan cursor. Cache layers return `None`.
    fn cursor(&self) -> Option<CoinsCursor<'_>> {
        None
    }
}

/// Pass-through decorator over another view.
///
/// Building block for layered stacks: it carries no state besides the
/// backing reference, which the caller owns and must keep alive, and
/// which can be re-pointed with [`Self::set_backend`] when the backing
/// store is swapped out underneath.
pub struct CoinsViewBacked<'a> {
    base: &'a mut dyn CoinsView,
}

impl<'a> CoinsViewBacked<'a> {
    pub fn new(base: &'a mut dyn CoinsView) -> Self {
        Self { base }
    }

    /// Re-point this view at a different backing view.
    pub fn set_backend(&mut self, base: &'a mut dyn CoinsView) {
        self.base = base;
    }
}

impl CoinsView for CoinsViewBacked<'_> {
    fn get_coin(&mut self, outpoint: &OutPoint) -> Result<Option<Coin>> {
        self.base.get_coin(outpoint)
    }

    fn have_coin(&mut self, outpoint: &OutPoint) -> Result<bool> {
        self.base.have_coin(outpoint)
    }

    fn best_block(&mut self) -> Result<BlockHash> {
        self.base.best_block()
    }

    fn batch_write(
        &mut self,
        changes: &mut CoinsMap,
        best_block: BlockHash,
        height: i32,
    ) -> Result<()> {
        self.base.batch_write(changes, best_block, height)
    }

    fn cursor(&self) -> Option<CoinsCursor<'_>> {
        self.base.cursor()
    }
}
