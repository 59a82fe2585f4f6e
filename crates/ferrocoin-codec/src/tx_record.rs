//! Legacy per-transaction coin record.
//!
//! The first database generation stored one record per transaction,
//! holding every not-yet-spent output at its original position. The
//! header varint packs the coinbase flag and the availability of the
//! first two outputs; remaining outputs are covered by a sparse bitmask
//! with trailing all-zero bytes suppressed.

use crate::compressor::{compress_amount, decompress_amount};
use crate::script::{decode_script, encode_script};
use crate::varint::{VarInt, read_u8};
use crate::DecodeError;
use bitcoin::{Amount, ScriptBuf, TxOut};
use ferrocoin_primitives::MAX_MONEY;
use std::io::{self, Write};

/// Retained outputs of one transaction, keyed by position.
///
/// A spent output is a `None` placeholder so later outputs keep their
/// index. A record whose every output is `None` is pruned and has no
/// serialized form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxRecord {
    /// Whether the transaction was a coinbase.
    pub is_coinbase: bool,
    /// Block height of the containing transaction.
    pub height: u32,
    /// Unspent outputs, position-preserving.
    pub outputs: Vec<Option<TxOut>>,
}

impl TxRecord {
    /// Whether every output has been spent.
    pub fn is_pruned(&self) -> bool {
        self.outputs.iter().all(Option::is_none)
    }

    /// Drop trailing spent placeholders, the canonical in-memory shape.
    pub fn trim(&mut self) {
        while self.outputs.last().is_some_and(Option::is_none) {
            self.outputs.pop();
        }
    }

    /// Sizes of the availability bitmask for outputs past the first two:
    /// bytes up to and including the last nonzero one, and the count of
    /// nonzero bytes among them.
    fn mask_sizes(&self) -> (usize, usize) {
        let mut bytes = 0;
        let mut nonzero = 0;
        let mut b = 0;
        while 2 + b * 8 < self.outputs.len() {
            if self.mask_byte(b) != 0 {
                bytes = b + 1;
                nonzero += 1;
            }
            b += 1;
        }
        (bytes, nonzero)
    }

    fn mask_byte(&self, b: usize) -> u8 {
        let mut byte = 0u8;
        for i in 0..8 {
            let index = 2 + b * 8 + i;
            if self
                .outputs
                .get(index)
                .is_some_and(Option::is_some)
            {
                byte |= 1 << i;
            }
        }
        byte
    }

    /// Serialize the record.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if the record is pruned; pruned records are
    /// deleted from storage, never written.
    pub fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let first = self.outputs.first().is_some_and(Option::is_some);
        let second = self.outputs.get(1).is_some_and(Option::is_some);
        let (mask_bytes, nonzero) = self.mask_sizes();
        debug_assert!(first || second || nonzero > 0, "pruned record is not encodable");

        // When neither of the first two outputs survives, at least one
        // mask byte must be nonzero, so its count is stored offset by one.
        let code = 8 * (nonzero as u64 - u64::from(!(first || second)))
            + u64::from(self.is_coinbase)
            + 2 * u64::from(first)
            + 4 * u64::from(second);
        VarInt(code).encode(writer)?;

        for b in 0..mask_bytes {
            writer.write_all(&[self.mask_byte(b)])?;
        }
        for output in self.outputs.iter().flatten() {
            encode_txout(output, writer)?;
        }
        VarInt(u64::from(self.height)).encode(writer)
    }

    /// Deserialize a record, consuming it from the front of `bytes`.
    pub fn decode(bytes: &mut &[u8]) -> Result<Self, DecodeError> {
        let code = VarInt::decode(bytes)?;
        let is_coinbase = code & 1 != 0;
        let first = code & 2 != 0;
        let second = code & 4 != 0;

        let mut avail = vec![first, second];
        let mut remaining_nonzero = (code >> 3) + u64::from(!(first || second));
        while remaining_nonzero > 0 {
            let byte = read_u8(bytes)?;
            for p in 0..8 {
                avail.push(byte & (1 << p) != 0);
            }
            if byte != 0 {
                remaining_nonzero -= 1;
            }
        }

        let mut outputs = Vec::with_capacity(avail.len());
        for available in avail {
            outputs.push(if available {
                Some(decode_txout(bytes)?)
            } else {
                None
            });
        }

        let height_code = VarInt::decode(bytes)?;
        let height =
            u32::try_from(height_code).map_err(|_| DecodeError::HeightOutOfRange(height_code))?;

        let mut record = Self {
            is_coinbase,
            height,
            outputs,
        };
        record.trim();
        Ok(record)
    }
}

fn encode_txout<W: Write>(output: &TxOut, writer: &mut W) -> io::Result<()> {
    VarInt(compress_amount(output.value.to_sat())).encode(writer)?;
    encode_script(output.script_pubkey.as_bytes(), writer)
}

fn decode_txout(bytes: &mut &[u8]) -> Result<TxOut, DecodeError> {
    let amount = decompress_amount(VarInt::decode(bytes)?);
    if amount > MAX_MONEY {
        return Err(DecodeError::AmountOutOfRange(amount));
    }
    let script = decode_script(bytes)?;
    Ok(TxOut {
        value: Amount::from_sat(amount),
        script_pubkey: ScriptBuf::from_bytes(script),
    })
}
