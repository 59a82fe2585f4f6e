//! The per-outpoint coin record codec.
//!
//! Layout: `varint(height << 1 | coinbase)`, `varint(compressed amount)`,
//! compressed script. One record per storage key; a spent coin has no
//! record at all.

use crate::compressor::{compress_amount, decompress_amount};
use crate::script::{decode_script, encode_script};
use crate::varint::VarInt;
use crate::DecodeError;
use ferrocoin_primitives::{Coin, MAX_MONEY};
use std::io::{self, Write};

/// Serialize a coin to a writer.
pub fn encode_coin<W: Write>(coin: &Coin, writer: &mut W) -> io::Result<()> {
    let code = (u64::from(coin.height) << 1) | u64::from(coin.is_coinbase);
    VarInt(code).encode(writer)?;
    VarInt(compress_amount(coin.amount)).encode(writer)?;
    encode_script(&coin.script_pubkey, writer)
}

/// Deserialize a coin, consuming the record from the front of `bytes`.
pub fn decode_coin(bytes: &mut &[u8]) -> Result<Coin, DecodeError> {
    let code = VarInt::decode(bytes)?;
    let is_coinbase = code & 1 != 0;
    let height =
        u32::try_from(code >> 1).map_err(|_| DecodeError::HeightOutOfRange(code >> 1))?;

    let amount = decompress_amount(VarInt::decode(bytes)?);
    if amount > MAX_MONEY {
        return Err(DecodeError::AmountOutOfRange(amount));
    }

    let script_pubkey = decode_script(bytes)?;

    Ok(Coin {
        is_coinbase,
        amount,
        height,
        script_pubkey,
    })
}

/// Serialize a coin to an owned buffer.
pub fn serialize_coin(coin: &Coin) -> Vec<u8> {
    let mut data = Vec::with_capacity(coin.script_pubkey.len() + 8);
    encode_coin(coin, &mut data).expect("writing to a Vec cannot fail; qed");
    data
}

/// Deserialize a coin from a buffer holding exactly one record.
pub fn deserialize_coin(mut bytes: &[u8]) -> Result<Coin, DecodeError> {
    let coin = decode_coin(&mut bytes)?;
    if !bytes.is_empty() {
        return Err(DecodeError::TrailingBytes);
    }
    Ok(coin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block1_coinbase_vector() {
        // First two bytes checked against a Bitcoin Core txoutset dump:
        // code = (1 << 1) | 1 = 0x03, compressed 50 BTC = 0x32.
        let script = hex::decode(
            "410496b538e853519c726a2c91e61ec11600ae1390813a627c66fb8be7947be63c52\
             da7589379515d4e0a604f8141781e62294721166bf621e73a82cbf2342c858ee\
             ac",
        )
        .unwrap();
        let coin = Coin::new(true, 50_0000_0000, 1, script);

        let data = serialize_coin(&coin);
        assert_eq!(data[0], 0x03);
        assert_eq!(data[1], 0x32);
        assert_eq!(data.len(), 2 + 33);

        assert_eq!(deserialize_coin(&data).unwrap(), coin);
    }

    #[test]
    fn test_coin_roundtrip() {
        let coin = Coin::new(false, 12_345_678, 840_000, vec![0x51]);
        assert_eq!(deserialize_coin(&serialize_coin(&coin)).unwrap(), coin);
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut data = serialize_coin(&Coin::new(false, 1, 1, vec![0x51]));
        data.push(0x00);
        assert!(matches!(
            deserialize_coin(&data),
            Err(DecodeError::TrailingBytes)
        ));
    }

    #[test]
    fn test_truncated_record_rejected() {
        let data = serialize_coin(&Coin::new(true, 50_0000_0000, 1, vec![0x51]));
        for cut in 0..data.len() {
            assert!(
                deserialize_coin(&data[..cut]).is_err(),
                "truncation at {cut} decoded"
            );
        }
    }
}
