//! Output script compression.
//!
//! Standard script templates are stored as a fixed tag plus the hash or
//! key they commit to; anything else is stored raw behind a length field
//! offset by the number of special tags.

use crate::varint::{VarInt, read_bytes};
use crate::DecodeError;
use bitcoin::opcodes::all::{
    OP_CHECKSIG, OP_DUP, OP_EQUAL, OP_EQUALVERIFY, OP_HASH160, OP_PUSHBYTES_20, OP_PUSHBYTES_33,
    OP_PUSHBYTES_65, OP_RETURN,
};
use ferrocoin_primitives::MAX_SCRIPT_SIZE;
use std::io::{self, Write};

/// Script tags 0x00..=0x05 stand for templates; raw lengths start above.
const NUM_SPECIAL_SCRIPTS: u64 = 6;

/// Extract the pubkey hash of a pay-to-pubkey-hash script.
fn to_pubkey_hash(script: &[u8]) -> Option<[u8; 20]> {
    if script.len() == 25
        && script[0] == OP_DUP.to_u8()
        && script[1] == OP_HASH160.to_u8()
        && script[2] == OP_PUSHBYTES_20.to_u8()
        && script[23] == OP_EQUALVERIFY.to_u8()
        && script[24] == OP_CHECKSIG.to_u8()
    {
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&script[3..23]);
        Some(hash)
    } else {
        None
    }
}

/// Extract the script hash of a pay-to-script-hash script.
fn to_script_hash(script: &[u8]) -> Option<[u8; 20]> {
    if script.len() == 23
        && script[0] == OP_HASH160.to_u8()
        && script[1] == OP_PUSHBYTES_20.to_u8()
        && script[22] == OP_EQUAL.to_u8()
    {
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&script[2..22]);
        Some(hash)
    } else {
        None
    }
}

enum PubKey {
    Compressed([u8; 33]),
    Uncompressed([u8; 65]),
}

/// Extract the key of a pay-to-pubkey script.
fn to_pubkey(script: &[u8]) -> Option<PubKey> {
    if script.len() == 35
        && script[0] == OP_PUSHBYTES_33.to_u8()
        && script[34] == OP_CHECKSIG.to_u8()
        && (script[1] == 0x02 || script[1] == 0x03)
    {
        let mut pubkey = [0u8; 33];
        pubkey.copy_from_slice(&script[1..34]);
        Some(PubKey::Compressed(pubkey))
    } else if script.len() == 67
        && script[0] == OP_PUSHBYTES_65.to_u8()
        && script[66] == OP_CHECKSIG.to_u8()
        && script[1] == 0x04
    {
        // If not fully valid, it would not be compressible.
        let is_fully_valid = bitcoin::Script::from_bytes(script)
            .p2pk_public_key()
            .is_some();
        if is_fully_valid {
            let mut pubkey = [0u8; 65];
            pubkey.copy_from_slice(&script[1..66]);
            Some(PubKey::Uncompressed(pubkey))
        } else {
            None
        }
    } else {
        None
    }
}

/// Compress `script` if it matches a known template.
fn compress_script(script: &[u8]) -> Option<Vec<u8>> {
    if let Some(hash) = to_pubkey_hash(script) {
        let mut out = Vec::with_capacity(21);
        out.push(0x00);
        out.extend(hash);
        Some(out)
    } else if let Some(hash) = to_script_hash(script) {
        let mut out = Vec::with_capacity(21);
        out.push(0x01);
        out.extend(hash);
        Some(out)
    } else if let Some(pubkey) = to_pubkey(script) {
        let mut out = Vec::with_capacity(33);
        match pubkey {
            PubKey::Compressed(compressed) => {
                out.push(compressed[0]);
                out.extend_from_slice(&compressed[1..33]);
            }
            PubKey::Uncompressed(uncompressed) => {
                out.push(0x04 | (uncompressed[64] & 0x01));
                out.extend_from_slice(&uncompressed[1..33]);
            }
        }
        Some(out)
    } else {
        None
    }
}

/// Serialize a script in compressed form.
pub(crate) fn encode_script<W: Write>(script: &[u8], writer: &mut W) -> io::Result<()> {
    if let Some(compressed) = compress_script(script) {
        writer.write_all(&compressed)?;
    } else {
        VarInt(script.len() as u64 + NUM_SPECIAL_SCRIPTS).encode(writer)?;
        writer.write_all(script)?;
    }
    Ok(())
}

/// Deserialize a script serialized by [`encode_script`].
///
/// Oversized raw scripts are consumed and replaced by a bare `OP_RETURN`,
/// matching the encoder-side consensus limit.
pub(crate) fn decode_script(bytes: &mut &[u8]) -> Result<Vec<u8>, DecodeError> {
    let size = VarInt::decode(bytes)?;

    match size {
        0x00 => {
            // P2PKH
            let hash = read_bytes(bytes, 20)?;
            let mut script = Vec::with_capacity(25);
            script.push(OP_DUP.to_u8());
            script.push(OP_HASH160.to_u8());
            script.push(OP_PUSHBYTES_20.to_u8());
            script.extend_from_slice(hash);
            script.push(OP_EQUALVERIFY.to_u8());
            script.push(OP_CHECKSIG.to_u8());
            Ok(script)
        }
        0x01 => {
            // P2SH
            let hash = read_bytes(bytes, 20)?;
            let mut script = Vec::with_capacity(23);
            script.push(OP_HASH160.to_u8());
            script.push(OP_PUSHBYTES_20.to_u8());
            script.extend_from_slice(hash);
            script.push(OP_EQUAL.to_u8());
            Ok(script)
        }
        0x02 | 0x03 => {
            // P2PK (compressed key)
            let key = read_bytes(bytes, 32)?;
            let mut script = Vec::with_capacity(35);
            script.push(OP_PUSHBYTES_33.to_u8());
            script.push(size as u8);
            script.extend_from_slice(key);
            script.push(OP_CHECKSIG.to_u8());
            Ok(script)
        }
        0x04 | 0x05 => {
            // P2PK (uncompressed key); recover the full point from the
            // stored x coordinate and parity tag.
            let key = read_bytes(bytes, 32)?;
            let mut compressed = Vec::with_capacity(33);
            compressed.push((size - 2) as u8);
            compressed.extend_from_slice(key);

            let pubkey = bitcoin::PublicKey::from_slice(&compressed)
                .map_err(|_| DecodeError::InvalidPubKey)?;
            let uncompressed = pubkey.inner.serialize_uncompressed();

            let mut script = Vec::with_capacity(67);
            script.push(OP_PUSHBYTES_65.to_u8());
            script.extend_from_slice(&uncompressed);
            script.push(OP_CHECKSIG.to_u8());
            Ok(script)
        }
        _ => {
            let size = (size - NUM_SPECIAL_SCRIPTS) as usize;
            let raw = read_bytes(bytes, size)?;
            if size > MAX_SCRIPT_SIZE {
                Ok(vec![OP_RETURN.to_u8()])
            } else {
                Ok(raw.to_vec())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(script: &[u8]) -> Vec<u8> {
        let mut data = Vec::new();
        encode_script(script, &mut data).unwrap();
        let mut slice = data.as_slice();
        let decoded = decode_script(&mut slice).unwrap();
        assert!(slice.is_empty());
        decoded
    }

    #[test]
    fn test_p2pkh_compresses_to_21_bytes() {
        let mut script = vec![
            OP_DUP.to_u8(),
            OP_HASH160.to_u8(),
            OP_PUSHBYTES_20.to_u8(),
        ];
        script.extend_from_slice(&[0xab; 20]);
        script.push(OP_EQUALVERIFY.to_u8());
        script.push(OP_CHECKSIG.to_u8());

        let mut data = Vec::new();
        encode_script(&script, &mut data).unwrap();
        assert_eq!(data.len(), 21);
        assert_eq!(data[0], 0x00);

        assert_eq!(roundtrip(&script), script);
    }

    #[test]
    fn test_p2sh_roundtrip() {
        let mut script = vec![OP_HASH160.to_u8(), OP_PUSHBYTES_20.to_u8()];
        script.extend_from_slice(&[0xcd; 20]);
        script.push(OP_EQUAL.to_u8());

        assert_eq!(roundtrip(&script), script);
    }

    #[test]
    fn test_p2pk_uncompressed_roundtrip() {
        // Block 1 coinbase key, a valid curve point.
        let script = hex::decode(
            "410496b538e853519c726a2c91e61ec11600ae1390813a627c66fb8be7947be63c52\
             da7589379515d4e0a604f8141781e62294721166bf621e73a82cbf2342c858ee\
             ac",
        )
        .unwrap();

        let mut data = Vec::new();
        encode_script(&script, &mut data).unwrap();
        assert_eq!(data.len(), 33);
        assert_eq!(data[0], 0x04);

        assert_eq!(roundtrip(&script), script);
    }

    #[test]
    fn test_nonstandard_script_stored_raw() {
        let script = vec![OP_RETURN.to_u8(), 0x04, 0xde, 0xad, 0xbe, 0xef];

        let mut data = Vec::new();
        encode_script(&script, &mut data).unwrap();
        // One length byte plus the raw script.
        assert_eq!(data.len(), script.len() + 1);

        assert_eq!(roundtrip(&script), script);
    }

    #[test]
    fn test_invalid_point_is_not_compressed() {
        // Right shape for P2PK but x is not on the curve.
        let mut script = vec![OP_PUSHBYTES_65.to_u8(), 0x04];
        script.extend_from_slice(&[0x00; 64]);
        script.push(OP_CHECKSIG.to_u8());

        let mut data = Vec::new();
        encode_script(&script, &mut data).unwrap();
        assert_eq!(data.len(), script.len() + 1);

        assert_eq!(roundtrip(&script), script);
    }
}
