// SPDX-License-Identifier: CC0-1.0

//! Signature hash computation for PSBT inputs.
//!
//! Selects the signing algorithm and the script code for an input then computes the digest that
//! is signed. Inputs carrying a non-witness UTXO are signed using the legacy algorithm, inputs
//! carrying only a witness UTXO are signed using BIP-143. Every script supplied with the input is
//! checked against the output it claims to spend before any hashing is done.

use core::borrow::Borrow;

use bitcoin::hashes::Hash;
use bitcoin::secp256k1::Message;
use bitcoin::sighash::{EcdsaSighashType, LegacySighash, SegwitV0Sighash, SighashCache};
use bitcoin::{PubkeyHash, Script, ScriptBuf, Transaction};

use crate::binding;
use crate::classify;
use crate::error::IndexOutOfBoundsError;
use crate::input::Input;
use crate::sign::SignError;

/// A signature hash, tagged with the algorithm used to compute it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Sighash {
    /// Computed using the pre-segwit algorithm.
    Legacy(LegacySighash),
    /// Computed using the BIP-143 algorithm.
    SegwitV0(SegwitV0Sighash),
}

impl Sighash {
    /// Returns the digest as a byte array.
    pub fn to_byte_array(self) -> [u8; 32] {
        match self {
            Sighash::Legacy(sighash) => sighash.to_byte_array(),
            Sighash::SegwitV0(sighash) => sighash.to_byte_array(),
        }
    }

    /// Returns the message to sign.
    pub fn message(self) -> Message { Message::from_digest(self.to_byte_array()) }

    /// Returns true if this sighash was computed with the BIP-143 algorithm.
    pub fn is_segwit_v0(&self) -> bool { matches!(*self, Sighash::SegwitV0(_)) }
}

/// Everything needed to sign an input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SigningData {
    /// The script the signature commits to, also used to check which keys may sign.
    pub script_code: ScriptBuf,
    /// The digest to sign.
    pub sighash: Sighash,
    /// The sighash type committed to by `sighash`.
    pub sighash_type: EcdsaSighashType,
}

/// Returns the signing data for input `input_index` of `unsigned_tx`.
///
/// Uses the sighash type of `input` or [`EcdsaSighashType::All`] if none is set.
///
/// # Errors
///
/// - [`SignError::InvalidSighashType`] if the input sighash type is not a standard ECDSA type.
/// - [`SignError::Binding`] if a script or the non-witness UTXO is not bound to the spent output.
/// - [`SignError::MissingUtxo`] if the input has neither a non-witness nor a witness UTXO.
/// - [`SignError::MissingWitnessScript`] if a witness script is needed and not present.
/// - [`SignError::SighashSingleBug`] for a legacy `SIGHASH_SINGLE` input with no matching output.
pub fn signing_data(
    input_index: usize,
    input: &Input,
    unsigned_tx: &Transaction,
) -> Result<SigningData, SignError> {
    let mut cache = SighashCache::new(unsigned_tx);
    signing_data_with_cache(input_index, input, &mut cache)
}

/// Returns the signing data for input `input_index` of the transaction in `cache`.
///
/// Use this when signing many inputs of the same transaction, the BIP-143 intermediate hashes
/// are only computed once.
pub fn signing_data_with_cache<T: Borrow<Transaction>>(
    input_index: usize,
    input: &Input,
    cache: &mut SighashCache<T>,
) -> Result<SigningData, SignError> {
    let sighash_type = input.ecdsa_hash_ty().map_err(|_| SignError::InvalidSighashType)?;
    signing_data_for_type(input_index, input, cache, sighash_type)
}

/// As [`signing_data_with_cache`] but ignores the input sighash type and uses `sighash_type`.
pub(crate) fn signing_data_for_type<T: Borrow<Transaction>>(
    input_index: usize,
    input: &Input,
    cache: &mut SighashCache<T>,
    sighash_type: EcdsaSighashType,
) -> Result<SigningData, SignError> {
    let prevout = cache
        .transaction()
        .input
        .get(input_index)
        .map(|txin| txin.previous_output)
        .ok_or(IndexOutOfBoundsError::TxInput {
            index: input_index,
            length: cache.transaction().input.len(),
        })?;

    if let Some(ref tx) = input.non_witness_utxo {
        binding::check_non_witness_utxo(prevout.txid, tx)?;
        let utxo = input.funding_utxo(prevout.vout)?;
        let script_code = match input.redeem_script {
            Some(ref redeem_script) => {
                binding::check_redeem_script(&utxo.script_pubkey, redeem_script)?;
                redeem_script.clone()
            }
            None => utxo.script_pubkey.clone(),
        };
        log::trace!("input {}: legacy signing with script code {}", input_index, script_code);

        // The legacy algorithm commits to the constant 1 here, a signature over it is valid for
        // any transaction spending this output.
        let outputs = cache.transaction().output.len();
        if is_single(sighash_type) && input_index >= outputs {
            log::warn!("input {}: SIGHASH_SINGLE with only {} outputs", input_index, outputs);
            return Err(SignError::SighashSingleBug { input_index, outputs });
        }

        let sighash =
            cache.legacy_signature_hash(input_index, &script_code, sighash_type.to_u32())?;
        return Ok(SigningData { script_code, sighash: Sighash::Legacy(sighash), sighash_type });
    }

    let utxo = input.witness_utxo.as_ref().ok_or(SignError::MissingUtxo)?;
    let parent: &Script = match input.redeem_script {
        Some(ref redeem_script) => {
            binding::check_redeem_script(&utxo.script_pubkey, redeem_script)?;
            redeem_script
        }
        None => &utxo.script_pubkey,
    };

    let script_code = match p2wpkh_script_code(parent) {
        Some(script_code) => script_code,
        None => {
            let witness_script =
                input.witness_script.as_ref().ok_or(SignError::MissingWitnessScript)?;
            binding::check_witness_script(parent, witness_script)?;
            witness_script.clone()
        }
    };
    log::trace!("input {}: segwit v0 signing with script code {}", input_index, script_code);

    let sighash =
        cache.p2wsh_signature_hash(input_index, &script_code, utxo.value, sighash_type)?;
    Ok(SigningData { script_code, sighash: Sighash::SegwitV0(sighash), sighash_type })
}

fn is_single(sighash_type: EcdsaSighashType) -> bool {
    matches!(sighash_type, EcdsaSighashType::Single | EcdsaSighashType::SinglePlusAnyoneCanPay)
}

/// Returns the P2PKH script used as script code to spend the P2WPKH `script`.
///
/// Returns `None` if `script` is not a P2WPKH script.
pub fn p2wpkh_script_code(script: &Script) -> Option<ScriptBuf> {
    let hash = classify::witness_pubkey_hash(script)?;
    let hash = PubkeyHash::from_slice(hash).ok()?;
    Some(ScriptBuf::new_p2pkh(&hash))
}
