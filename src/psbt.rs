// SPDX-License-Identifier: CC0-1.0

use core::fmt;

use bitcoin::key::PublicKey;
use bitcoin::secp256k1::{Secp256k1, Signing, Verification};
use bitcoin::{ecdsa, PrivateKey, Transaction};

use crate::error::IndexOutOfBoundsError;
use crate::finalize::{self, FinalizeError};
use crate::input::Input;
use crate::prelude::*;
use crate::sighash::{self, SigningData};
use crate::sign::{self, GetKey, SignError, SigningErrors, SigningKeys, VerifyError};

/// Access to the data a Signer and a Finalizer need.
///
/// Implement this for your PSBT container to use the functions in [`crate::sign`] and
/// [`crate::finalize`]. Apart from [`InputProvider::insert_partial_sig`] the data is treated as
/// read only.
pub trait InputProvider {
    /// Returns the unsigned transaction.
    fn unsigned_tx(&self) -> &Transaction;

    /// Returns the signing record for input `index`.
    ///
    /// Implementations must ensure `index` is valid for both the input records and the inputs of
    /// the unsigned transaction.
    fn input(&self, index: usize) -> Result<&Input, IndexOutOfBoundsError>;

    /// Adds a partial signature to input `index`, returns the signature previously stored for
    /// `pubkey` if there was one.
    fn insert_partial_sig(
        &mut self,
        index: usize,
        pubkey: PublicKey,
        sig: ecdsa::Signature,
    ) -> Result<Option<ecdsa::Signature>, IndexOutOfBoundsError>;

    /// Returns the number of inputs.
    fn input_count(&self) -> usize { self.unsigned_tx().input.len() }
}

/// A Partially Signed Transaction, the parts of it needed to sign ECDSA inputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(crate = "actual_serde"))]
pub struct Psbt {
    /// The unsigned transaction, scriptSigs and witnesses for each input must be empty.
    pub unsigned_tx: Transaction,
    /// The corresponding signing record for each input in the unsigned transaction.
    pub inputs: Vec<Input>,
}

impl Psbt {
    /// Creates a PSBT from an unsigned transaction, with an empty record for each input.
    ///
    /// # Errors
    ///
    /// If transactions is not unsigned.
    pub fn from_unsigned_tx(tx: Transaction) -> Result<Self, UnsignedTxChecksError> {
        let psbt = Psbt { inputs: vec![Default::default(); tx.input.len()], unsigned_tx: tx };
        psbt.unsigned_tx_checks()?;
        Ok(psbt)
    }

    /// Checks that unsigned transaction does not have scriptSig's or witness data.
    pub fn unsigned_tx_checks(&self) -> Result<(), UnsignedTxChecksError> {
        use UnsignedTxChecksError::*;

        for txin in &self.unsigned_tx.input {
            if !txin.script_sig.is_empty() {
                return Err(HasScriptSigs);
            }

            if !txin.witness.is_empty() {
                return Err(HasScriptWitnesses);
            }
        }

        Ok(())
    }

    /// Returns the script code, sighash and sighash type used to sign input `input_index`.
    ///
    /// See [`sighash::signing_data`].
    pub fn signing_data(&self, input_index: usize) -> Result<SigningData, SignError> {
        let input = self.input(input_index)?;
        sighash::signing_data(input_index, input, &self.unsigned_tx)
    }

    /// Signs input `input_index` with `key`, see [`sign::sign_input`].
    pub fn sign_input<C: Signing>(
        &mut self,
        input_index: usize,
        key: &PrivateKey,
        secp: &Secp256k1<C>,
    ) -> Result<PublicKey, SignError> {
        sign::sign_input(self, input_index, key, secp)
    }

    /// Attempts to sign every input with keys from `k`, see [`sign::sign_with`].
    pub fn sign<C, K>(
        &mut self,
        k: &K,
        secp: &Secp256k1<C>,
    ) -> Result<SigningKeys, (SigningKeys, SigningErrors)>
    where
        C: Signing,
        K: GetKey,
    {
        sign::sign_with(self, k, secp)
    }

    /// Verifies the partial signatures of input `input_index`, see [`sign::verify_partial_sigs`].
    pub fn verify_partial_sigs<C: Verification>(
        &self,
        input_index: usize,
        secp: &Secp256k1<C>,
    ) -> Result<(), VerifyError> {
        sign::verify_partial_sigs(self, input_index, secp)
    }

    /// Returns true if input `input_index` has exactly the required number of partial signatures,
    /// see [`finalize::can_finalize`].
    pub fn can_finalize(&self, input_index: usize) -> Result<bool, FinalizeError> {
        finalize::can_finalize(self, input_index)
    }

    /// Returns true if every input can be finalized.
    pub fn is_ready_to_finalize(&self) -> Result<bool, FinalizeError> {
        for index in 0..self.input_count() {
            if !self.can_finalize(index)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Checks that `index` is valid for this PSBT.
    fn check_input_index(&self, index: usize) -> Result<(), IndexOutOfBoundsError> {
        if index >= self.inputs.len() {
            return Err(IndexOutOfBoundsError::Inputs { index, length: self.inputs.len() });
        }
        if index >= self.unsigned_tx.input.len() {
            return Err(IndexOutOfBoundsError::TxInput {
                index,
                length: self.unsigned_tx.input.len(),
            });
        }
        Ok(())
    }
}

impl InputProvider for Psbt {
    fn unsigned_tx(&self) -> &Transaction { &self.unsigned_tx }

    fn input(&self, index: usize) -> Result<&Input, IndexOutOfBoundsError> {
        self.check_input_index(index)?;
        Ok(&self.inputs[index])
    }

    fn insert_partial_sig(
        &mut self,
        index: usize,
        pubkey: PublicKey,
        sig: ecdsa::Signature,
    ) -> Result<Option<ecdsa::Signature>, IndexOutOfBoundsError> {
        self.check_input_index(index)?;
        Ok(self.inputs[index].partial_sigs.insert(pubkey, sig))
    }
}

/// Error checking the unsigned transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UnsignedTxChecksError {
    /// The unsigned transaction has script sigs.
    HasScriptSigs,
    /// The unsigned transaction has script witnesses.
    HasScriptWitnesses,
}

impl fmt::Display for UnsignedTxChecksError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use UnsignedTxChecksError::*;

        match *self {
            HasScriptSigs => f.write_str("the unsigned transaction has script sigs"),
            HasScriptWitnesses => f.write_str("the unsigned transaction has script witnesses"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for UnsignedTxChecksError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> { None }
}
