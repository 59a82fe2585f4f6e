//! Primitive types shared across the ferrocoin crates.

mod coin;
mod key;

pub use coin::Coin;
pub use key::{StorageKey, key_to_outpoint, outpoint_to_key};

/// 1 coin in satoshis.
pub const COIN: u64 = 100_000_000;

/// Absolute upper bound on the money supply, in satoshis.
pub const MAX_MONEY: u64 = 21_000_000 * COIN;

/// Consensus limit on the size of an output script.
pub const MAX_SCRIPT_SIZE: usize = 10_000;
