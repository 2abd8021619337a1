// SPDX-License-Identifier: CC0-1.0

//! BIP-174 signer checks.
//!
//! For a Signer to only produce valid signatures for what it expects to sign, it must check that
//! the following conditions are true:
//!
//! - If a non-witness UTXO is provided, its hash must match the hash specified in the prevout.
//! - If a witness UTXO is provided, no non-witness signature may be created.
//! - If a redeemScript is provided, the scriptPubKey must be for that redeemScript.
//! - If a witnessScript is provided, the scriptPubKey or the redeemScript must be for that
//!   witnessScript.
//!
//! Signing an input runs the checks for that input, [`Psbt::signer_checks`] runs them for every
//! input without needing a key.

use core::fmt;

use bitcoin::{Script, Transaction, TxOut};

use crate::binding::{self, BindingError};
use crate::error::{write_err, FundingUtxoError, IndexOutOfBoundsError};
use crate::input::Input;
use crate::psbt::Psbt;

impl Psbt {
    /// Returns `Ok` if every input passes the BIP-174 signer checks.
    ///
    /// The sighash type is not checked here, signing fails if it is not a standard ECDSA type.
    pub fn signer_checks(&self) -> Result<(), SignerChecksError> {
        for (input_index, input) in self.inputs.iter().enumerate() {
            input_signer_checks(&self.unsigned_tx, input_index, input)?;
        }
        Ok(())
    }
}

fn input_signer_checks(
    unsigned_tx: &Transaction,
    input_index: usize,
    input: &Input,
) -> Result<(), SignerChecksError> {
    use SignerChecksError::*;

    let prevout = unsigned_tx
        .input
        .get(input_index)
        .map(|txin| txin.previous_output)
        .ok_or(IndexOutOfBoundsError::TxInput {
            index: input_index,
            length: unsigned_tx.input.len(),
        })?;

    let spent: Option<&TxOut> = match input.non_witness_utxo {
        Some(ref tx) => {
            binding::check_non_witness_utxo(prevout.txid, tx)
                .map_err(|error| Binding { input_index, error })?;
            let utxo = input
                .funding_utxo(prevout.vout)
                .map_err(|error| FundingUtxo { input_index, error })?;
            if let Some(ref witness_utxo) = input.witness_utxo {
                if witness_utxo != utxo {
                    return Err(WitnessUtxoMismatch { input_index });
                }
            }
            Some(utxo)
        }
        None => input.witness_utxo.as_ref(),
    };

    if let Some(ref redeem_script) = input.redeem_script {
        let utxo = spent.ok_or(MissingTxOut { input_index })?;
        binding::check_redeem_script(&utxo.script_pubkey, redeem_script)
            .map_err(|error| Binding { input_index, error })?;
    }

    if let Some(ref witness_script) = input.witness_script {
        let utxo = spent.ok_or(MissingTxOut { input_index })?;
        binding::check_witness_script(parent_script(input, utxo), witness_script)
            .map_err(|error| Binding { input_index, error })?;
    }

    // A non-witness UTXO means signing uses the legacy algorithm.
    if input.non_witness_utxo.is_some() {
        if let Some(utxo) = spent {
            if parent_script(input, utxo).is_witness_program() {
                return Err(NonWitnessSig { input_index });
            }
        }
    }

    Ok(())
}

/// Returns the redeem script if present, otherwise the spent output script.
fn parent_script<'a>(input: &'a Input, utxo: &'a TxOut) -> &'a Script {
    match input.redeem_script {
        Some(ref redeem_script) => redeem_script,
        None => &utxo.script_pubkey,
    }
}

/// Errors encountered while doing the signer checks.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SignerChecksError {
    /// There are more PSBT input records than unsigned transaction inputs.
    IndexOutOfBounds(IndexOutOfBoundsError),
    /// The spent output is not in the non-witness UTXO.
    FundingUtxo {
        /// The input being checked.
        input_index: usize,
        /// The underlying error.
        error: FundingUtxoError,
    },
    /// Input data is not bound to the output being spent.
    Binding {
        /// The input being checked.
        input_index: usize,
        /// The underlying error.
        error: BindingError,
    },
    /// Input has a redeem or witness script but no utxo to check it against.
    MissingTxOut {
        /// The input being checked.
        input_index: usize,
    },
    /// Input has both witness and non-witness utxos and they disagree on the spent output.
    WitnessUtxoMismatch {
        /// The input being checked.
        input_index: usize,
    },
    /// Witness input will produce a non-witness signature.
    NonWitnessSig {
        /// The input being checked.
        input_index: usize,
    },
}

impl SignerChecksError {
    /// Returns the index of the input that failed the checks, if known.
    pub fn input_index(&self) -> Option<usize> {
        use SignerChecksError::*;

        match *self {
            IndexOutOfBounds(_) => None,
            FundingUtxo { input_index, .. }
            | Binding { input_index, .. }
            | MissingTxOut { input_index }
            | WitnessUtxoMismatch { input_index }
            | NonWitnessSig { input_index } => Some(input_index),
        }
    }
}

impl fmt::Display for SignerChecksError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use SignerChecksError::*;

        match *self {
            IndexOutOfBounds(ref e) => write_err!(f, "index out of bounds"; e),
            FundingUtxo { input_index, ref error } =>
                write_err!(f, "input {} funding utxo error", input_index; error),
            Binding { input_index, ref error } =>
                write_err!(f, "input {} data does not match the spent output", input_index; error),
            MissingTxOut { input_index } => write!(f, "input {} is missing its utxo", input_index),
            WitnessUtxoMismatch { input_index } => write!(
                f,
                "input {} witness utxo does not match the non-witness utxo output",
                input_index
            ),
            NonWitnessSig { input_index } =>
                write!(f, "witness input {} will produce a non-witness signature", input_index),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SignerChecksError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        use SignerChecksError::*;

        match *self {
            IndexOutOfBounds(ref e) => Some(e),
            FundingUtxo { ref error, .. } => Some(error),
            Binding { ref error, .. } => Some(error),
            MissingTxOut { .. } | WitnessUtxoMismatch { .. } | NonWitnessSig { .. } => None,
        }
    }
}

impl From<IndexOutOfBoundsError> for SignerChecksError {
    fn from(e: IndexOutOfBoundsError) -> Self { Self::IndexOutOfBounds(e) }
}

#[cfg(test)]
mod tests {
    use bitcoin::absolute::LockTime;
    use bitcoin::hashes::Hash;
    use bitcoin::opcodes::all::OP_PUSHNUM_1;
    use bitcoin::script::Builder;
    use bitcoin::transaction::Version;
    use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, TxIn, Txid, WPubkeyHash, Witness};

    use super::*;

    fn prev_tx(script_pubkey: ScriptBuf) -> Transaction {
        Transaction {
            version: Version::ONE,
            lock_time: LockTime::ZERO,
            input: vec![],
            output: vec![TxOut { value: Amount::from_sat(20_000), script_pubkey }],
        }
    }

    fn psbt(prev_txid: Txid, input: Input) -> Psbt {
        let tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint { txid: prev_txid, vout: 0 },
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::default(),
            }],
            output: vec![],
        };
        let mut psbt = Psbt::from_unsigned_tx(tx).unwrap();
        psbt.inputs[0] = input;
        psbt
    }

    fn op_true() -> ScriptBuf { Builder::new().push_opcode(OP_PUSHNUM_1).into_script() }

    #[test]
    fn valid_p2sh_input() {
        let redeem_script = op_true();
        let prev = prev_tx(ScriptBuf::new_p2sh(&redeem_script.script_hash()));
        let psbt = psbt(
            prev.txid(),
            Input {
                non_witness_utxo: Some(prev),
                redeem_script: Some(redeem_script),
                ..Default::default()
            },
        );
        assert_eq!(psbt.signer_checks(), Ok(()));
    }

    #[test]
    fn non_witness_utxo_txid_mismatch() {
        let prev = prev_tx(op_true());
        let input = Input { non_witness_utxo: Some(prev), ..Default::default() };
        let psbt = psbt(Txid::all_zeros(), input);

        let err = psbt.signer_checks().unwrap_err();
        assert_eq!(err.input_index(), Some(0));
        assert!(matches!(
            err,
            SignerChecksError::Binding { error: BindingError::NonWitnessUtxoTxid { .. }, .. }
        ));
    }

    #[test]
    fn redeem_script_mismatch() {
        let prev = prev_tx(ScriptBuf::new_p2sh(&ScriptBuf::new().script_hash()));
        let psbt = psbt(
            prev.txid(),
            Input {
                non_witness_utxo: Some(prev),
                redeem_script: Some(op_true()),
                ..Default::default()
            },
        );
        assert!(matches!(
            psbt.signer_checks(),
            Err(SignerChecksError::Binding { error: BindingError::RedeemScript { .. }, .. })
        ));
    }

    #[test]
    fn witness_script_mismatch() {
        let utxo = TxOut {
            value: Amount::from_sat(20_000),
            script_pubkey: ScriptBuf::new_p2wsh(&ScriptBuf::new().wscript_hash()),
        };
        let psbt = psbt(
            Txid::all_zeros(),
            Input {
                witness_utxo: Some(utxo),
                witness_script: Some(op_true()),
                ..Default::default()
            },
        );
        assert!(matches!(
            psbt.signer_checks(),
            Err(SignerChecksError::Binding { error: BindingError::WitnessScript { .. }, .. })
        ));
    }

    #[test]
    fn witness_script_without_utxo() {
        let input = Input { witness_script: Some(op_true()), ..Default::default() };
        let psbt = psbt(Txid::all_zeros(), input);
        assert_eq!(psbt.signer_checks(), Err(SignerChecksError::MissingTxOut { input_index: 0 }));
    }

    #[test]
    fn witness_utxo_mismatch() {
        let prev = prev_tx(op_true());
        let witness_utxo = TxOut { value: Amount::from_sat(1), script_pubkey: op_true() };
        let psbt = psbt(
            prev.txid(),
            Input {
                non_witness_utxo: Some(prev),
                witness_utxo: Some(witness_utxo),
                ..Default::default()
            },
        );
        assert_eq!(
            psbt.signer_checks(),
            Err(SignerChecksError::WitnessUtxoMismatch { input_index: 0 })
        );
    }

    #[test]
    fn legacy_signature_for_witness_program() {
        let prev = prev_tx(ScriptBuf::new_p2wpkh(&WPubkeyHash::all_zeros()));
        let psbt = psbt(prev.txid(), Input { non_witness_utxo: Some(prev), ..Default::default() });
        assert_eq!(
            psbt.signer_checks(),
            Err(SignerChecksError::NonWitnessSig { input_index: 0 })
        );
    }
}
