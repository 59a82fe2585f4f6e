//! Heap-footprint estimation for cache accounting.
//!
//! The cache bounds its growth by bytes, not entry counts, so every
//! entry is charged at the size class the allocator would actually hand
//! out for its allocations.

use std::mem;

/// Round an allocation request up to the allocator size class (64-bit
/// glibc/jemalloc behavior: 16-byte granularity, 16-byte minimum).
pub fn malloc_usage(alloc: usize) -> usize {
    if alloc == 0 {
        0
    } else {
        ((alloc + 31) >> 4) << 4
    }
}

/// Approximate dynamic footprint of a hash map with `capacity` buckets.
pub fn hash_map_usage<K, V>(capacity: usize) -> usize {
    // One slot plus control byte per bucket.
    malloc_usage(capacity * (mem::size_of::<K>() + mem::size_of::<V>() + 1))
}
