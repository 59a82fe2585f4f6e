//! The per-output coin record.

use bitcoin::{Amount, ScriptBuf, TxOut};

/// Unspent transaction output.
///
/// One record per outpoint. A coin that has been spent does not exist as
/// a `Coin` at all; layers that need to remember a pending deletion track
/// that in their own bookkeeping, not in the record itself.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Coin {
    /// Whether the coin is from a coinbase transaction.
    pub is_coinbase: bool,
    /// Transfer value in satoshis.
    pub amount: u64,
    /// Block height at which the containing transaction was included.
    pub height: u32,
    /// Spending condition of the output.
    pub script_pubkey: Vec<u8>,
}

impl Coin {
    /// Create a coin from its parts.
    pub fn new(is_coinbase: bool, amount: u64, height: u32, script_pubkey: Vec<u8>) -> Self {
        Self {
            is_coinbase,
            amount,
            height,
            script_pubkey,
        }
    }

    /// Capture a transaction output created at `height`.
    pub fn from_txout(output: &TxOut, height: u32, is_coinbase: bool) -> Self {
        Self {
            is_coinbase,
            amount: output.value.to_sat(),
            height,
            script_pubkey: output.script_pubkey.to_bytes(),
        }
    }

    /// Reconstruct the transaction output this coin represents.
    pub fn to_txout(&self) -> TxOut {
        TxOut {
            value: Amount::from_sat(self.amount),
            script_pubkey: ScriptBuf::from_bytes(self.script_pubkey.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_txout_roundtrip() {
        let coin = Coin::new(false, 12_345, 700_000, vec![0x51]);

        let txout = coin.to_txout();
        assert_eq!(txout.value.to_sat(), 12_345);

        let back = Coin::from_txout(&txout, 700_000, false);
        assert_eq!(coin, back);
    }
}
