//! Layered coins views over the ferrocoin UTXO set.
//!
//! This crate gives the rest of the node the illusion of one flat
//! outpoint→coin store while actually running a chain of overlay caches
//! over a slow backing store. Validation wraps the database view in a
//! long-lived cache for the committed chain state plus a short-lived
//! layer per block candidate or mempool check; reads fall through and
//! memoize upward, writes stay in the topmost layer, and a flush merges
//! one layer into its parent as a single atomic batch.
//!
//! Every cache instance assumes single-writer access. Sibling caches
//! over the same backing view may coexist, but their flushes must be
//! serialized externally; [`ChainState`] does exactly that for the
//! canonical stack.

mod cache;
mod chainstate;
mod entry;
mod error;
pub mod memusage;
mod store;
mod undo;
mod view;

pub use cache::CoinsViewCache;
pub use chainstate::ChainState;
pub use entry::{CacheEntry, EntryState};
pub use error::Error;
pub use store::{CoinsDb, KeyValueStore, MemoryStore};
pub use undo::{BlockUndo, TxUndo};
pub use view::{CoinsCursor, CoinsMap, CoinsView, CoinsViewBacked};

/// Result type for coins view operations.
pub type Result<T> = std::result::Result<T, Error>;
