//! Cache entry bookkeeping.
//!
//! The merge step in a layered flush must handle every combination of
//! the dirty and fresh flags exhaustively, so the flags are modeled as a
//! four-state machine with explicit transitions instead of independent
//! booleans.

use crate::memusage;
use ferrocoin_primitives::Coin;

/// Propagation state of a cache entry.
///
/// `Fresh` on its own is transient: it marks a read-through of a key the
/// backing view is known not to contain, and becomes `DirtyFresh` on the
/// first write to the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Unmodified copy of the backing view's value.
    Clean,
    /// Unmodified, and the backing view is known not to contain the key.
    Fresh,
    /// Modified; the backing view may hold an older version.
    Dirty,
    /// Modified, and the backing view is known not to contain the key.
    DirtyFresh,
}

impl EntryState {
    /// Whether the entry must be propagated on flush.
    pub fn is_dirty(self) -> bool {
        matches!(self, Self::Dirty | Self::DirtyFresh)
    }

    /// Whether the backing view is known not to contain the key.
    pub fn is_fresh(self) -> bool {
        matches!(self, Self::Fresh | Self::DirtyFresh)
    }

    /// Transition taken by any mutation of the entry's value.
    #[must_use]
    pub fn mark_dirty(self) -> Self {
        match self {
            Self::Clean | Self::Dirty => Self::Dirty,
            Self::Fresh | Self::DirtyFresh => Self::DirtyFresh,
        }
    }

    /// Transition taken when the caller vouches that the backing view
    /// holds no version of the key.
    #[must_use]
    pub fn mark_fresh(self) -> Self {
        match self {
            Self::Clean | Self::Fresh => Self::Fresh,
            Self::Dirty | Self::DirtyFresh => Self::DirtyFresh,
        }
    }
}

/// A cached coin plus its propagation state.
///
/// A `None` coin is a pruned placeholder: from this layer's perspective
/// the key is spent or absent. Placeholders are kept (rather than simply
/// dropping the map entry) because a dirty one is a pending deletion and
/// a fresh one is a memoized miss.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub coin: Option<Coin>,
    pub state: EntryState,
}

impl CacheEntry {
    pub fn new(coin: Option<Coin>, state: EntryState) -> Self {
        Self { coin, state }
    }

    /// Estimated heap footprint, used for incremental cache accounting.
    pub fn dynamic_memory_usage(&self) -> usize {
        self.coin
            .as_ref()
            .map_or(0, |coin| memusage::malloc_usage(coin.script_pubkey.capacity()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_dirty_preserves_freshness() {
        assert_eq!(EntryState::Clean.mark_dirty(), EntryState::Dirty);
        assert_eq!(EntryState::Fresh.mark_dirty(), EntryState::DirtyFresh);
        assert_eq!(EntryState::Dirty.mark_dirty(), EntryState::Dirty);
        assert_eq!(EntryState::DirtyFresh.mark_dirty(), EntryState::DirtyFresh);
    }

    #[test]
    fn test_mark_fresh_preserves_dirtiness() {
        assert_eq!(EntryState::Clean.mark_fresh(), EntryState::Fresh);
        assert_eq!(EntryState::Fresh.mark_fresh(), EntryState::Fresh);
        assert_eq!(EntryState::Dirty.mark_fresh(), EntryState::DirtyFresh);
        assert_eq!(EntryState::DirtyFresh.mark_fresh(), EntryState::DirtyFresh);
    }

    #[test]
    fn test_pruned_entry_has_no_footprint() {
        let entry = CacheEntry::new(None, EntryState::Fresh);
        assert_eq!(entry.dynamic_memory_usage(), 0);
    }
}
