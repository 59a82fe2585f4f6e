//! Per-block undo records.
//!
//! Disconnecting a block must restore every coin it spent, so each
//! connect captures the pre-spend coins (the values moved out by
//! [`crate::CoinsViewCache::spend_coin`]) in input order. The records
//! share the coin wire codec so undo data and the coin database stay in
//! one format.

use ferrocoin_codec::{
    DecodeError, decode_coin, encode_coin, read_compact_size, write_compact_size,
};
use ferrocoin_primitives::Coin;
use std::io::{self, Write};

/// Undo information for one transaction: the coins its inputs consumed,
/// in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TxUndo {
    pub prevouts: Vec<Coin>,
}

impl TxUndo {
    fn encode_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write_compact_size(writer, self.prevouts.len() as u64)?;
        for coin in &self.prevouts {
            encode_coin(coin, writer)?;
        }
        Ok(())
    }

    fn decode_from(bytes: &mut &[u8]) -> Result<Self, DecodeError> {
        let count = read_compact_size(bytes)?;
        let mut prevouts = Vec::with_capacity(count.min(1024) as usize);
        for _ in 0..count {
            prevouts.push(decode_coin(bytes)?);
        }
        Ok(Self { prevouts })
    }
}

/// Undo information for a block: one record per transaction after the
/// coinbase, in block order.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BlockUndo {
    pub tx_undos: Vec<TxUndo>,
}

impl BlockUndo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the undo record of the next non-coinbase transaction.
    pub fn record_tx(&mut self, undo: TxUndo) {
        self.tx_undos.push(undo);
    }

    /// Total number of spent coins captured.
    pub fn spent_count(&self) -> usize {
        self.tx_undos.iter().map(|undo| undo.prevouts.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tx_undos.is_empty()
    }

    /// Serialize to bytes for storage.
    pub fn encode(&self) -> Vec<u8> {
        let mut data = Vec::new();
        write_compact_size(&mut data, self.tx_undos.len() as u64)
            .expect("writing to a Vec cannot fail; qed");
        for undo in &self.tx_undos {
            undo.encode_to(&mut data)
                .expect("writing to a Vec cannot fail; qed");
        }
        data
    }

    /// Deserialize from bytes, rejecting partial or padded input.
    pub fn decode(mut bytes: &[u8]) -> Result<Self, DecodeError> {
        let count = read_compact_size(&mut bytes)?;
        let mut tx_undos = Vec::with_capacity(count.min(1024) as usize);
        for _ in 0..count {
            tx_undos.push(TxUndo::decode_from(&mut bytes)?);
        }
        if !bytes.is_empty() {
            return Err(DecodeError::TrailingBytes);
        }
        Ok(Self { tx_undos })
    }
}
