//! Decode failure taxonomy.

/// Errors raised while decoding a serialized coin record.
///
/// Every variant indicates corrupted or malformed data, never an I/O
/// failure of the underlying store; callers that read from disk are
/// expected to keep the two apart.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The input ended before the record was complete.
    #[error("unexpected end of coin record")]
    UnexpectedEof,

    /// A varint ran past the 64-bit range.
    #[error("varint overflows u64")]
    VarIntOverflow,

    /// A compact size used a longer encoding than necessary.
    #[error("non-canonical compact size")]
    NonCanonicalCompactSize,

    /// A compressed amount decoded outside the monetary range.
    #[error("amount {0} out of range")]
    AmountOutOfRange(u64),

    /// A record height does not fit in 32 bits.
    #[error("height {0} out of range")]
    HeightOutOfRange(u64),

    /// An uncompressed-pubkey script tag carried an invalid curve point.
    #[error("invalid public key in compressed script")]
    InvalidPubKey,

    /// Bytes remained after the record was fully decoded.
    #[error("trailing bytes after record")]
    TrailingBytes,
}
