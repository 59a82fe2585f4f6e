//! Storage keys for coin records.

use bitcoin::OutPoint;
use bitcoin::hashes::Hash;

/// Fixed-size storage key for one coin record.
///
/// Format: txid (32 bytes, raw) || vout (4 bytes, little-endian). The raw
/// txid byte order keeps records from the same transaction adjacent under
/// the store's key ordering.
pub type StorageKey = [u8; 36];

/// Convert an outpoint to its storage key.
pub fn outpoint_to_key(outpoint: &OutPoint) -> StorageKey {
    let mut key = [0u8; 36];
    key[..32].copy_from_slice(outpoint.txid.as_ref());
    key[32..].copy_from_slice(&outpoint.vout.to_le_bytes());
    key
}

/// Parse a storage key back to an outpoint.
pub fn key_to_outpoint(key: &StorageKey) -> OutPoint {
    let mut txid_bytes = [0u8; 32];
    txid_bytes.copy_from_slice(&key[..32]);
    let txid = bitcoin::Txid::from_byte_array(txid_bytes);
    let vout = u32::from_le_bytes(key[32..].try_into().expect("key is 36 bytes; qed"));
    OutPoint { txid, vout }
}
