//! Compact serialization of coin records.
//!
//! A stored coin is squeezed hard: the height and coinbase flag share one
//! varint, the amount goes through a lossless re-encoding that favors
//! round denominations, and standard script templates collapse to a tag
//! plus the hash or key they commit to. The same building blocks also
//! serve the legacy per-transaction record, which tracks the surviving
//! outputs of one transaction behind a sparse availability bitmask.

mod coin;
mod compressor;
mod error;
mod script;
mod tx_record;
mod varint;

pub use coin::{decode_coin, deserialize_coin, encode_coin, serialize_coin};
pub use compressor::{compress_amount, decompress_amount};
pub use error::DecodeError;
pub use tx_record::TxRecord;
pub use varint::{VarInt, read_compact_size, write_compact_size};
