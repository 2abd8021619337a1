// SPDX-License-Identifier: CC0-1.0

//! Binding checks between the data a PSBT input carries and the output it spends.
//!
//! From BIP-174, for a Signer to only produce valid signatures for what it expects to sign:
//!
//! - If a non-witness UTXO is provided, its hash must match the hash specified in the prevout.
//! - If a redeemScript is provided, the scriptPubKey must be for that redeemScript.
//! - If a witnessScript is provided, the scriptPubKey or the redeemScript must be for that
//!   witnessScript.

use core::fmt;

use bitcoin::{Script, ScriptBuf, Transaction, Txid};

use crate::prelude::*;

/// The scheme used to commit to a nested script in its parent script.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScriptHashScheme {
    /// Pay-to-script-hash, commits to HASH160 of a redeem script.
    P2sh,
    /// Pay-to-witness-script-hash, commits to SHA256 of a witness script.
    P2wsh,
}

impl ScriptHashScheme {
    /// Returns the parent script that commits to `nested` under this scheme.
    pub fn script_pubkey(self, nested: &Script) -> ScriptBuf {
        match self {
            ScriptHashScheme::P2sh => ScriptBuf::new_p2sh(&nested.script_hash()),
            ScriptHashScheme::P2wsh => ScriptBuf::new_p2wsh(&nested.wscript_hash()),
        }
    }
}

/// Checks that `tx` is the transaction with id `expected`.
pub fn check_non_witness_utxo(expected: Txid, tx: &Transaction) -> Result<(), BindingError> {
    let got = tx.txid();
    if got != expected {
        return Err(BindingError::NonWitnessUtxoTxid { expected, got });
    }
    Ok(())
}

/// Checks that `parent` commits to `nested` using `scheme`.
pub fn check_nested_script(
    scheme: ScriptHashScheme,
    parent: &Script,
    nested: &Script,
) -> Result<(), BindingError> {
    let expected = scheme.script_pubkey(nested);
    if expected.as_script() == parent {
        return Ok(());
    }

    let got = parent.to_owned();
    Err(match scheme {
        ScriptHashScheme::P2sh => BindingError::RedeemScript { expected, got },
        ScriptHashScheme::P2wsh => BindingError::WitnessScript { expected, got },
    })
}

/// Checks that the P2SH `parent` commits to `redeem_script`.
pub fn check_redeem_script(parent: &Script, redeem_script: &Script) -> Result<(), BindingError> {
    check_nested_script(ScriptHashScheme::P2sh, parent, redeem_script)
}

/// Checks that the P2WSH `parent` commits to `witness_script`.
pub fn check_witness_script(parent: &Script, witness_script: &Script) -> Result<(), BindingError> {
    check_nested_script(ScriptHashScheme::P2wsh, parent, witness_script)
}

/// Data supplied with an input is not bound to the output being spent.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BindingError {
    /// The non-witness UTXO is not the transaction referenced by the input's prevout.
    NonWitnessUtxoTxid {
        /// The txid referenced by the unsigned transaction.
        expected: Txid,
        /// The txid of the supplied non-witness UTXO.
        got: Txid,
    },
    /// The redeem script hash does not match the hash in the scriptPubkey.
    RedeemScript {
        /// P2SH script built from the redeem script.
        expected: ScriptBuf,
        /// The script the redeem script was checked against.
        got: ScriptBuf,
    },
    /// The witness script hash does not match the hash in the scriptPubkey or redeem script.
    WitnessScript {
        /// P2WSH script built from the witness script.
        expected: ScriptBuf,
        /// The script the witness script was checked against.
        got: ScriptBuf,
    },
}

impl fmt::Display for BindingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use BindingError::*;

        match *self {
            NonWitnessUtxoTxid { ref expected, ref got } => write!(
                f,
                "non-witness utxo txid {} does not match the prevout txid {}",
                got, expected
            ),
            RedeemScript { ref expected, ref got } => write!(
                f,
                "redeem script does not match the scriptPubkey, expected {} got {}",
                expected, got
            ),
            WitnessScript { ref expected, ref got } => write!(
                f,
                "witness script does not match the scriptPubkey, expected {} got {}",
                expected, got
            ),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BindingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        use BindingError::*;

        match *self {
            NonWitnessUtxoTxid { .. } | RedeemScript { .. } | WitnessScript { .. } => None,
        }
    }
}
