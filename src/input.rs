// SPDX-License-Identifier: CC0-1.0

use bitcoin::key::PublicKey;
use bitcoin::sighash::{EcdsaSighashType, NonStandardSighashTypeError};
use bitcoin::{ecdsa, ScriptBuf, Transaction, TxOut};

use crate::error::FundingUtxoError;
use crate::prelude::*;
use crate::sighash_type::PsbtSighashType;

/// The signing record for an input of the corresponding index in the unsigned transaction.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(crate = "actual_serde"))]
pub struct Input {
    /// The non-witness transaction this input spends from. Should only be
    /// `Option::Some` for inputs which spend non-segwit outputs or
    /// if it is unknown whether an input spends a segwit output.
    pub non_witness_utxo: Option<Transaction>,
    /// The transaction output this input spends from. Should only be
    /// `Option::Some` for inputs which spend segwit outputs,
    /// including P2SH embedded ones.
    pub witness_utxo: Option<TxOut>,
    /// A map from public keys to their corresponding signature as would be
    /// pushed to the stack from a scriptSig or witness.
    pub partial_sigs: BTreeMap<PublicKey, ecdsa::Signature>,
    /// The sighash type to be used for this input. Signatures for this input
    /// must use the sighash type.
    pub sighash_type: Option<PsbtSighashType>,
    /// The redeem script for this input.
    pub redeem_script: Option<ScriptBuf>,
    /// The witness script for this input.
    pub witness_script: Option<ScriptBuf>,
}

impl Input {
    /// Obtains the [`EcdsaSighashType`] for this input if one is specified. If no sighash type is
    /// specified, returns [`EcdsaSighashType::All`].
    ///
    /// # Errors
    ///
    /// If the `sighash_type` field is set to a non-standard ECDSA sighash value.
    pub fn ecdsa_hash_ty(&self) -> Result<EcdsaSighashType, NonStandardSighashTypeError> {
        self.sighash_type
            .map(|sighash_type| sighash_type.ecdsa_hash_ty())
            .unwrap_or(Ok(EcdsaSighashType::All))
    }

    /// Returns the output spent by this input.
    ///
    /// `vout` is the output index from the prevout of the unsigned transaction input, it is only
    /// used if this input carries a non-witness UTXO. As when signing, the non-witness UTXO takes
    /// precedence over the witness UTXO.
    pub fn funding_utxo(&self, vout: u32) -> Result<&TxOut, FundingUtxoError> {
        if let Some(ref tx) = self.non_witness_utxo {
            let vout = vout as usize;
            tx.output.get(vout).ok_or(FundingUtxoError::OutOfBounds { vout, len: tx.output.len() })
        } else if let Some(ref utxo) = self.witness_utxo {
            Ok(utxo)
        } else {
            Err(FundingUtxoError::MissingUtxo)
        }
    }

    /// Returns true if this input has signature data.
    pub fn has_sig_data(&self) -> bool { !self.partial_sigs.is_empty() }
}
