// SPDX-License-Identifier: CC0-1.0

//! Checks if an input has collected the signatures needed to be finalized.
//!
//! Nothing here hashes, verifies or binds scripts, these checks are done when signing. The
//! Finalizer only counts the partial signatures against what the script of the input requires.

use core::fmt;

use bitcoin::ScriptBuf;

use crate::classify::classify;
use crate::error::{write_err, FundingUtxoError, IndexOutOfBoundsError};
use crate::input::Input;
use crate::psbt::InputProvider;
use crate::sighash::p2wpkh_script_code;

/// Returns true if input `input_index` has exactly the number of partial signatures required by
/// its script.
///
/// Returns `false` if the input has no script to satisfy (missing UTXO data, a witness program
/// other than P2WPKH without a witness script) or if the script is non-standard.
///
/// # Errors
///
/// [`FinalizeError::OverSigned`] if the input has more partial signatures than required.
pub fn can_finalize<P>(provider: &P, input_index: usize) -> Result<bool, FinalizeError>
where
    P: InputProvider + ?Sized,
{
    let input = provider.input(input_index)?;
    let script = match effective_script(provider, input_index)? {
        Some(script) => script,
        None => return Ok(false),
    };

    let template = classify(&script);
    let required = match template.required_signatures() {
        Some(required) => required,
        None => return Ok(false),
    };
    log::trace!("input {}: {} script requires {} signatures", input_index, template, required);

    let got = input.partial_sigs.len();
    if got > required {
        return Err(FinalizeError::OverSigned { required, got });
    }
    Ok(got == required)
}

/// Returns the script whose template determines how many signatures input `input_index` needs.
///
/// - Non-witness UTXO: the redeem script, otherwise the spent output script.
/// - Witness UTXO: the witness script, otherwise the P2PKH script for a P2WPKH redeem script or
///   witness UTXO script.
pub fn effective_script<P>(
    provider: &P,
    input_index: usize,
) -> Result<Option<ScriptBuf>, FinalizeError>
where
    P: InputProvider + ?Sized,
{
    let input = provider.input(input_index)?;

    if input.non_witness_utxo.is_some() {
        if let Some(ref redeem_script) = input.redeem_script {
            return Ok(Some(redeem_script.clone()));
        }
        let vout = spent_vout(provider, input_index)?;
        let utxo = input.funding_utxo(vout)?;
        return Ok(Some(utxo.script_pubkey.clone()));
    }

    Ok(witness_effective_script(input))
}

fn witness_effective_script(input: &Input) -> Option<ScriptBuf> {
    let utxo = input.witness_utxo.as_ref()?;
    if let Some(ref witness_script) = input.witness_script {
        return Some(witness_script.clone());
    }
    let parent = input.redeem_script.as_ref().unwrap_or(&utxo.script_pubkey);
    p2wpkh_script_code(parent)
}

fn spent_vout<P>(provider: &P, input_index: usize) -> Result<u32, IndexOutOfBoundsError>
where
    P: InputProvider + ?Sized,
{
    let tx = provider.unsigned_tx();
    tx.input
        .get(input_index)
        .map(|txin| txin.previous_output.vout)
        .ok_or(IndexOutOfBoundsError::TxInput { index: input_index, length: tx.input.len() })
}

/// Error checking if an input can be finalized.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FinalizeError {
    /// Input index out of bounds.
    IndexOutOfBounds(IndexOutOfBoundsError),
    /// The spent output is not in the non-witness UTXO.
    FundingUtxo(FundingUtxoError),
    /// The input has more partial signatures than its script can use.
    OverSigned {
        /// Number of signatures required by the script.
        required: usize,
        /// Number of partial signatures present.
        got: usize,
    },
}

impl fmt::Display for FinalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use FinalizeError::*;

        match *self {
            IndexOutOfBounds(ref e) => write_err!(f, "index out of bounds"; e),
            FundingUtxo(ref e) => write_err!(f, "input funding utxo error"; e),
            OverSigned { required, got } =>
                write!(f, "too many signatures, script requires {} got {}", required, got),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FinalizeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        use FinalizeError::*;

        match *self {
            IndexOutOfBounds(ref e) => Some(e),
            FundingUtxo(ref e) => Some(e),
            OverSigned { .. } => None,
        }
    }
}

impl From<IndexOutOfBoundsError> for FinalizeError {
    fn from(e: IndexOutOfBoundsError) -> Self { Self::IndexOutOfBounds(e) }
}

impl From<FundingUtxoError> for FinalizeError {
    fn from(e: FundingUtxoError) -> Self { Self::FundingUtxo(e) }
}
