//! Error types for the coins view stack.

use bitcoin::OutPoint;
use ferrocoin_codec::DecodeError;

/// Errors surfaced by coins views and the backing-store boundary.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The backing key-value store failed. The failed operation had no
    /// partial effect and may be retried.
    #[error("backing store error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A stored coin record failed to decode: on-disk corruption.
    #[error("corrupted coin record for {outpoint}: {source}")]
    Corrupted {
        outpoint: OutPoint,
        #[source]
        source: DecodeError,
    },
}

impl Error {
    /// Wrap a store-specific failure.
    pub fn backend<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Self::Backend(Box::new(error))
    }
}
