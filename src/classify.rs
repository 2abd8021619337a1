// SPDX-License-Identifier: CC0-1.0

//! Locking script classification.
//!
//! Recognizes the standard output templates a PSBT Finalizer needs to know about by their exact
//! byte layout. Classification never fails, anything not matching a template is
//! [`ScriptTemplate::NonStandard`].

use core::fmt;

use bitcoin::opcodes::all::{
    OP_CHECKMULTISIG, OP_CHECKSIG, OP_DUP, OP_EQUALVERIFY, OP_HASH160, OP_PUSHBYTES_0,
    OP_PUSHBYTES_20, OP_PUSHBYTES_33, OP_PUSHBYTES_65, OP_PUSHNUM_1, OP_PUSHNUM_16,
};
use bitcoin::{PublicKey, Script};

/// The output templates recognized by [`classify`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScriptTemplate {
    /// `<pubkey> OP_CHECKSIG` (P2PK).
    Pubkey,
    /// `OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG` (P2PKH).
    PubkeyHash,
    /// `OP_m <pubkey>... OP_n OP_CHECKMULTISIG` (bare multisig).
    Multisig {
        /// The threshold `m`.
        required: u8,
        /// The number of keys `n`.
        total: u8,
    },
    /// `OP_0 <20 bytes>` (P2WPKH).
    WitnessPubkeyHash,
    /// Anything else.
    NonStandard,
}

impl ScriptTemplate {
    /// Returns the number of signatures required to satisfy a script of this template.
    ///
    /// Returns `None` for [`ScriptTemplate::NonStandard`] since we cannot know.
    pub fn required_signatures(&self) -> Option<usize> {
        use ScriptTemplate::*;

        match *self {
            Pubkey | PubkeyHash | WitnessPubkeyHash => Some(1),
            Multisig { required, .. } => Some(required as usize),
            NonStandard => None,
        }
    }
}

impl fmt::Display for ScriptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ScriptTemplate::*;

        match *self {
            Pubkey => f.write_str("pubkey"),
            PubkeyHash => f.write_str("pubkeyhash"),
            Multisig { required, total } => write!(f, "multisig({} of {})", required, total),
            WitnessPubkeyHash => f.write_str("witnesspubkeyhash"),
            NonStandard => f.write_str("nonstandard"),
        }
    }
}

/// Classifies `script` as one of the standard templates.
pub fn classify(script: &Script) -> ScriptTemplate {
    let bytes = script.as_bytes();

    if is_witness_pubkey_hash(bytes) {
        return ScriptTemplate::WitnessPubkeyHash;
    }
    if is_pubkey_hash(bytes) {
        return ScriptTemplate::PubkeyHash;
    }
    if let Some((required, total)) = multisig_threshold(bytes) {
        return ScriptTemplate::Multisig { required, total };
    }
    if is_pubkey(bytes) {
        return ScriptTemplate::Pubkey;
    }
    ScriptTemplate::NonStandard
}

/// Returns the 20 byte key hash if `script` is a P2WPKH script.
pub(crate) fn witness_pubkey_hash(script: &Script) -> Option<&[u8]> {
    let bytes = script.as_bytes();
    if is_witness_pubkey_hash(bytes) {
        Some(&bytes[2..])
    } else {
        None
    }
}

fn is_witness_pubkey_hash(bytes: &[u8]) -> bool {
    bytes.len() == 22
        && bytes[0] == OP_PUSHBYTES_0.to_u8()
        && bytes[1] == OP_PUSHBYTES_20.to_u8()
}

fn is_pubkey_hash(bytes: &[u8]) -> bool {
    bytes.len() == 25
        && bytes[0] == OP_DUP.to_u8()
        && bytes[1] == OP_HASH160.to_u8()
        && bytes[2] == OP_PUSHBYTES_20.to_u8()
        && bytes[23] == OP_EQUALVERIFY.to_u8()
        && bytes[24] == OP_CHECKSIG.to_u8()
}

fn is_pubkey(bytes: &[u8]) -> bool {
    match bytes.split_last() {
        Some((last, rest)) if *last == OP_CHECKSIG.to_u8() =>
            key_push_len(rest) == Some(rest.len()),
        _ => false,
    }
}

/// Returns `(m, n)` if `bytes` is a bare multisig script.
fn multisig_threshold(bytes: &[u8]) -> Option<(u8, u8)> {
    let (last, rest) = bytes.split_last()?;
    if *last != OP_CHECKMULTISIG.to_u8() {
        return None;
    }
    let (n_op, rest) = rest.split_last()?;
    let (m_op, mut keys) = rest.split_first()?;

    let required = small_int(*m_op)?;
    let total = small_int(*n_op)?;
    if required > total {
        return None;
    }

    let mut count = 0u8;
    while !keys.is_empty() {
        let len = key_push_len(keys)?;
        keys = &keys[len..];
        count += 1;
        if count > total {
            return None;
        }
    }

    if count == total {
        Some((required, total))
    } else {
        None
    }
}

/// Decodes `OP_1` through `OP_16`.
fn small_int(op: u8) -> Option<u8> {
    if (OP_PUSHNUM_1.to_u8()..=OP_PUSHNUM_16.to_u8()).contains(&op) {
        Some(op - OP_PUSHNUM_1.to_u8() + 1)
    } else {
        None
    }
}

/// Returns the length (push opcode included) of the public key push at the start of `bytes`.
///
/// Only the canonical layouts are accepted: 33 bytes starting with 0x02/0x03 or 65 bytes
/// starting with 0x04. The pushed key must be a point on the curve.
fn key_push_len(bytes: &[u8]) -> Option<usize> {
    let (op, data) = bytes.split_first()?;
    let len = if *op == OP_PUSHBYTES_33.to_u8()
        && data.len() >= 33
        && (data[0] == 0x02 || data[0] == 0x03)
    {
        33
    } else if *op == OP_PUSHBYTES_65.to_u8() && data.len() >= 65 && data[0] == 0x04 {
        65
    } else {
        return None;
    };
    PublicKey::from_slice(&data[..len]).ok()?;
    Some(len + 1)
}

#[cfg(test)]
mod tests {
    use bitcoin::hashes::Hash;
    use bitcoin::opcodes::all::OP_RETURN;
    use bitcoin::script::Builder;
    use bitcoin::{PubkeyHash, ScriptBuf, WPubkeyHash};

    use super::*;
    use crate::prelude::*;

    fn pk(byte: u8) -> PublicKey {
        let sk = bitcoin::secp256k1::SecretKey::from_slice(&[byte; 32]).unwrap();
        let secp = bitcoin::secp256k1::Secp256k1::signing_only();
        PublicKey::new(bitcoin::secp256k1::PublicKey::from_secret_key(&secp, &sk))
    }

    fn multisig(m: i64, keys: &[PublicKey]) -> ScriptBuf {
        let mut builder = Builder::new().push_int(m);
        for key in keys {
            builder = builder.push_key(key);
        }
        builder.push_int(keys.len() as i64).push_opcode(OP_CHECKMULTISIG).into_script()
    }

    #[test]
    fn classify_p2wpkh() {
        let script = ScriptBuf::new_p2wpkh(&WPubkeyHash::from_byte_array([7; 20]));
        assert_eq!(classify(&script), ScriptTemplate::WitnessPubkeyHash);
        assert_eq!(witness_pubkey_hash(&script), Some(&[7u8; 20][..]));
    }

    #[test]
    fn classify_p2pkh() {
        let script = ScriptBuf::new_p2pkh(&PubkeyHash::from_byte_array([9; 20]));
        assert_eq!(classify(&script), ScriptTemplate::PubkeyHash);
        assert_eq!(witness_pubkey_hash(&script), None);
    }

    #[test]
    fn classify_p2pk() {
        let compressed = ScriptBuf::new_p2pk(&pk(1));
        assert_eq!(classify(&compressed), ScriptTemplate::Pubkey);

        let mut uncompressed = pk(1);
        uncompressed.compressed = false;
        let script = ScriptBuf::new_p2pk(&uncompressed);
        assert_eq!(script.len(), 67);
        assert_eq!(classify(&script), ScriptTemplate::Pubkey);
    }

    #[test]
    fn classify_one_of_one_multisig() {
        let script = multisig(1, &[pk(1)]);
        let template = classify(&script);
        assert_eq!(template, ScriptTemplate::Multisig { required: 1, total: 1 });
        assert_eq!(template.required_signatures(), Some(1));
    }

    #[test]
    fn classify_two_of_three_multisig() {
        let script = multisig(2, &[pk(1), pk(2), pk(3)]);
        assert_eq!(classify(&script), ScriptTemplate::Multisig { required: 2, total: 3 });
    }

    #[test]
    fn multisig_threshold_above_key_count_is_nonstandard() {
        let script = Builder::new()
            .push_int(3)
            .push_key(&pk(1))
            .push_key(&pk(2))
            .push_int(2)
            .push_opcode(OP_CHECKMULTISIG)
            .into_script();
        assert_eq!(classify(&script), ScriptTemplate::NonStandard);
    }

    #[test]
    fn multisig_key_count_mismatch_is_nonstandard() {
        let script = Builder::new()
            .push_int(1)
            .push_key(&pk(1))
            .push_key(&pk(2))
            .push_int(3)
            .push_opcode(OP_CHECKMULTISIG)
            .into_script();
        assert_eq!(classify(&script), ScriptTemplate::NonStandard);
    }

    #[test]
    fn multisig_with_bad_key_prefix_is_nonstandard() {
        let mut bytes = multisig(1, &[pk(1)]).into_bytes();
        bytes[2] = 0x05;
        assert_eq!(classify(&ScriptBuf::from_bytes(bytes)), ScriptTemplate::NonStandard);
    }

    #[test]
    fn off_curve_key_is_nonstandard() {
        // Correct prefix and length but x = 2^256 - 1 is not a field element.
        let mut off_curve = [0xff; 33];
        off_curve[0] = 0x02;

        let p2pk = Builder::new()
            .push_slice(off_curve)
            .push_opcode(OP_CHECKSIG)
            .into_script();
        assert_eq!(classify(&p2pk), ScriptTemplate::NonStandard);

        let bare = Builder::new()
            .push_int(1)
            .push_slice(off_curve)
            .push_int(1)
            .push_opcode(OP_CHECKMULTISIG)
            .into_script();
        assert_eq!(classify(&bare), ScriptTemplate::NonStandard);

        // One bad key among valid ones.
        let mut bytes = multisig(1, &[pk(1), pk(2)]).into_bytes();
        bytes[36..69].copy_from_slice(&off_curve);
        assert_eq!(classify(&ScriptBuf::from_bytes(bytes)), ScriptTemplate::NonStandard);
    }

    #[test]
    fn classify_nonstandard() {
        let op_return = Builder::new().push_opcode(OP_RETURN).push_slice([0xab; 4]).into_script();
        assert_eq!(classify(&op_return), ScriptTemplate::NonStandard);
        assert_eq!(classify(&ScriptBuf::new()), ScriptTemplate::NonStandard);
        assert_eq!(ScriptTemplate::NonStandard.required_signatures(), None);

        // A P2WSH program has a 32 byte payload.
        let p2wsh = ScriptBuf::new_p2wsh(&op_return.wscript_hash());
        assert_eq!(classify(&p2wsh), ScriptTemplate::NonStandard);

        // Truncated P2PKH.
        let mut bytes: Vec<u8> = ScriptBuf::new_p2pkh(&PubkeyHash::all_zeros()).into_bytes();
        bytes.pop();
        assert_eq!(classify(&ScriptBuf::from_bytes(bytes)), ScriptTemplate::NonStandard);
    }

    #[test]
    fn display() {
        let multisig = ScriptTemplate::Multisig { required: 2, total: 3 };
        assert_eq!(multisig.to_string(), "multisig(2 of 3)");
        assert_eq!(ScriptTemplate::WitnessPubkeyHash.to_string(), "witnesspubkeyhash");
    }
}
