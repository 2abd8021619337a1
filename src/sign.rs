// SPDX-License-Identifier: CC0-1.0

//! The PSBT Signer role for ECDSA inputs.
//!
//! A key may only sign an input if the script being signed references it, either by the
//! serialized public key or by its HASH160. Signing never touches an input unless every check
//! passed, the only mutation is inserting the new signature into `partial_sigs`.

use core::convert::Infallible;
use core::fmt;

use bitcoin::hashes::Hash;
use bitcoin::key::PublicKey;
use bitcoin::script::Instruction;
use bitcoin::secp256k1::{Secp256k1, Signing, Verification};
use bitcoin::sighash::{self, SighashCache};
use bitcoin::{ecdsa, script, PrivateKey, PubkeyHash, Script};
#[cfg(feature = "std")]
use std::collections::HashMap;

use crate::binding::BindingError;
use crate::error::{write_err, FundingUtxoError, IndexOutOfBoundsError};
use crate::prelude::*;
use crate::psbt::InputProvider;
use crate::sighash::{self as psbt_sighash, SigningData};

/// Map of input index -> pubkey associated with secret key used to create signature for that input.
pub type SigningKeys = BTreeMap<usize, Vec<PublicKey>>;

/// Map of input index -> the error encountered while attempting to sign that input.
pub type SigningErrors = BTreeMap<usize, SignError>;

/// Signs input `input_index` with `key`, adding the signature to the input's `partial_sigs`.
///
/// # Returns
///
/// The public key of `key`, which is the key the signature is stored under.
///
/// # Errors
///
/// Any error from [`psbt_sighash::signing_data`], [`SignError::MalformedScript`] if the script
/// code cannot be decoded and [`SignError::UnauthorizedKey`] if the script code does not
/// reference `key`. The input is left untouched if an error is returned.
pub fn sign_input<P, C>(
    provider: &mut P,
    input_index: usize,
    key: &PrivateKey,
    secp: &Secp256k1<C>,
) -> Result<PublicKey, SignError>
where
    P: InputProvider + ?Sized,
    C: Signing,
{
    let data = {
        let input = provider.input(input_index)?;
        psbt_sighash::signing_data(input_index, input, provider.unsigned_tx())?
    };
    sign_with_data(provider, input_index, &data, key, secp)
}

/// Attempts to sign every input of `provider` with keys from `k`.
///
/// Keys are requested using the public keys and public key hashes pushed by the script code of
/// each input. Inputs without any UTXO data are skipped.
///
/// # Returns
///
/// Either Ok(SigningKeys) or Err((SigningKeys, SigningErrors)), where
/// - SigningKeys: A map of input index -> pubkey associated with secret key used to sign.
/// - SigningErrors: A map of input index -> the error encountered while attempting to sign.
///
/// If an error is returned some signatures may already have been added to the PSBT. Since
/// `partial_sigs` is a [`BTreeMap`] it is safe to retry, previous sigs will be overwritten.
pub fn sign_with<P, C, K>(
    provider: &mut P,
    k: &K,
    secp: &Secp256k1<C>,
) -> Result<SigningKeys, (SigningKeys, SigningErrors)>
where
    P: InputProvider + ?Sized,
    C: Signing,
    K: GetKey,
{
    let tx = provider.unsigned_tx().clone();
    let mut cache = SighashCache::new(&tx);

    let mut used = BTreeMap::new();
    let mut errors = BTreeMap::new();

    for i in 0..provider.input_count() {
        match sign_input_with_keys(provider, i, k, &mut cache, secp) {
            Ok(Some(v)) => {
                used.insert(i, v);
            }
            Ok(None) => {}
            Err(e) => {
                errors.insert(i, e);
            }
        }
    }
    if errors.is_empty() {
        Ok(used)
    } else {
        Err((used, errors))
    }
}

/// Signs input `input_index` with every key `k` has for it.
///
/// Returns `None` if the input has no UTXO data.
fn sign_input_with_keys<P, C, K>(
    provider: &mut P,
    input_index: usize,
    k: &K,
    cache: &mut SighashCache<&bitcoin::Transaction>,
    secp: &Secp256k1<C>,
) -> Result<Option<Vec<PublicKey>>, SignError>
where
    P: InputProvider + ?Sized,
    C: Signing,
    K: GetKey,
{
    let data = {
        let input = provider.input(input_index)?;
        match psbt_sighash::signing_data_with_cache(input_index, input, cache) {
            Ok(data) => data,
            Err(SignError::MissingUtxo) => return Ok(None),
            Err(e) => return Err(e),
        }
    };

    let mut used = vec![]; // List of pubkeys used to sign the input.
    for request in key_requests(&data.script_code)? {
        let sk = match k.get_key(request, secp) {
            Ok(Some(sk)) => sk,
            _ => continue,
        };
        let pk = sk.public_key(secp);
        if used.contains(&pk) {
            continue;
        }
        sign_with_data(provider, input_index, &data, &sk, secp)?;
        used.push(pk);
    }
    Ok(Some(used))
}

/// Checks `key` may sign `data`, signs and stores the signature.
fn sign_with_data<P, C>(
    provider: &mut P,
    input_index: usize,
    data: &SigningData,
    key: &PrivateKey,
    secp: &Secp256k1<C>,
) -> Result<PublicKey, SignError>
where
    P: InputProvider + ?Sized,
    C: Signing,
{
    let pk = key.public_key(secp);
    check_authorized(&data.script_code, &pk)?;

    let sig = ecdsa::Signature {
        sig: secp.sign_ecdsa(&data.sighash.message(), &key.inner),
        hash_ty: data.sighash_type,
    };

    if provider.insert_partial_sig(input_index, pk, sig)?.is_some() {
        log::warn!("input {}: replaced existing signature for {}", input_index, pk);
    }
    log::debug!("input {}: signed with {} ({})", input_index, pk, data.sighash_type);

    Ok(pk)
}

/// Checks that `script` pushes either the serialized `pubkey` or its HASH160.
///
/// # Errors
///
/// [`SignError::MalformedScript`] if `script` cannot be decoded, [`SignError::UnauthorizedKey`]
/// if no push matches.
pub fn check_authorized(script: &Script, pubkey: &PublicKey) -> Result<(), SignError> {
    let serialized = pubkey.to_bytes();
    let hash = pubkey.pubkey_hash();

    let mut authorized = false;
    for instruction in script.instructions() {
        if let Instruction::PushBytes(push) = instruction? {
            let bytes = push.as_bytes();
            if bytes == &serialized[..] || bytes == &hash.as_byte_array()[..] {
                authorized = true;
            }
        }
    }

    if authorized {
        Ok(())
    } else {
        Err(SignError::UnauthorizedKey(*pubkey))
    }
}

/// Returns a key request for every public key and public key hash pushed by `script`.
///
/// # Errors
///
/// [`SignError::MalformedScript`] if `script` cannot be decoded.
pub fn key_requests(script: &Script) -> Result<Vec<KeyRequest>, SignError> {
    let mut requests = vec![];
    for instruction in script.instructions() {
        if let Instruction::PushBytes(push) = instruction? {
            let bytes = push.as_bytes();
            let request = match bytes.len() {
                20 => PubkeyHash::from_slice(bytes).ok().map(KeyRequest::PubkeyHash),
                33 | 65 => PublicKey::from_slice(bytes).ok().map(KeyRequest::Pubkey),
                _ => None,
            };
            if let Some(request) = request {
                if !requests.contains(&request) {
                    requests.push(request);
                }
            }
        }
    }
    Ok(requests)
}

/// Verifies every partial signature of input `input_index`.
///
/// The digest is recomputed for each signature using the sighash type the signature commits to.
pub fn verify_partial_sigs<P, C>(
    provider: &P,
    input_index: usize,
    secp: &Secp256k1<C>,
) -> Result<(), VerifyError>
where
    P: InputProvider + ?Sized,
    C: Verification,
{
    let input = provider.input(input_index)?;
    let mut cache = SighashCache::new(provider.unsigned_tx());

    for (pubkey, sig) in &input.partial_sigs {
        let data = psbt_sighash::signing_data_for_type(input_index, input, &mut cache, sig.hash_ty)
            .map_err(VerifyError::SigningData)?;
        secp.verify_ecdsa(&data.sighash.message(), &sig.sig, &pubkey.inner)
            .map_err(|_| VerifyError::InvalidSignature { pubkey: *pubkey })?;
    }
    Ok(())
}

/// Data required to call [`GetKey`] to get the private key to sign an input.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum KeyRequest {
    /// Request a private key using the associated public key.
    Pubkey(PublicKey),
    /// Request a private key using the HASH160 of the associated public key.
    PubkeyHash(PubkeyHash),
}

impl KeyRequest {
    /// Returns true if `pk` is the key requested.
    pub fn matches(&self, pk: &PublicKey) -> bool {
        match *self {
            KeyRequest::Pubkey(ref want) => want == pk,
            KeyRequest::PubkeyHash(ref hash) => pk.pubkey_hash() == *hash,
        }
    }
}

/// Trait to get a private key from a key request, key is then used to sign an input.
pub trait GetKey {
    /// An error occurred while getting the key.
    type Error: core::fmt::Debug;

    /// Attempts to get the private key for `key_request`.
    ///
    /// # Returns
    /// - `Some(key)` if the key is found.
    /// - `None` if the key was not found but no error was encountered.
    /// - `Err` if an error was encountered while looking for the key.
    fn get_key<C: Signing>(
        &self,
        key_request: KeyRequest,
        secp: &Secp256k1<C>,
    ) -> Result<Option<PrivateKey>, Self::Error>;
}

impl GetKey for PrivateKey {
    type Error = Infallible;

    fn get_key<C: Signing>(
        &self,
        key_request: KeyRequest,
        secp: &Secp256k1<C>,
    ) -> Result<Option<PrivateKey>, Self::Error> {
        let pk = self.public_key(secp);
        Ok(if key_request.matches(&pk) { Some(*self) } else { None })
    }
}

#[rustfmt::skip]
macro_rules! impl_get_key_for_map {
    ($map:ident) => {

impl GetKey for $map<PublicKey, PrivateKey> {
    type Error = Infallible;

    fn get_key<C: Signing>(
        &self,
        key_request: KeyRequest,
        _: &Secp256k1<C>,
    ) -> Result<Option<PrivateKey>, Self::Error> {
        match key_request {
            KeyRequest::Pubkey(pk) => Ok(self.get(&pk).cloned()),
            KeyRequest::PubkeyHash(_) => Ok(self
                .iter()
                .find(|(pk, _)| key_request.matches(pk))
                .map(|(_, sk)| *sk)),
        }
    }
}}}
impl_get_key_for_map!(BTreeMap);
#[cfg(feature = "std")]
impl_get_key_for_map!(HashMap);

/// Errors encountered while signing an input.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SignError {
    /// Input index out of bounds.
    IndexOutOfBounds(IndexOutOfBoundsError),
    /// Invalid Sighash type.
    InvalidSighashType,
    /// The input has neither a non-witness nor a witness utxo.
    MissingUtxo,
    /// Missing witness script.
    MissingWitnessScript,
    /// Missing spending utxo.
    FundingUtxo(FundingUtxoError),
    /// Input data is not bound to the output being spent.
    Binding(BindingError),
    /// The script code could not be decoded.
    MalformedScript(script::Error),
    /// The script code does not reference the signing key.
    UnauthorizedKey(PublicKey),
    /// Legacy `SIGHASH_SINGLE` signing of an input without a matching output.
    SighashSingleBug {
        /// The input being signed.
        input_index: usize,
        /// Number of outputs in the unsigned transaction.
        outputs: usize,
    },
    /// Sighash computation error.
    SighashComputation(sighash::Error),
}

impl fmt::Display for SignError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use SignError::*;

        match *self {
            IndexOutOfBounds(ref e) => write_err!(f, "index out of bounds"; e),
            InvalidSighashType => write!(f, "invalid sighash type"),
            MissingUtxo => write!(f, "missing input utxo in PSBT"),
            MissingWitnessScript => write!(f, "missing witness script"),
            FundingUtxo(ref e) => write_err!(f, "input funding utxo error"; e),
            Binding(ref e) => write_err!(f, "input data does not match the spent output"; e),
            MalformedScript(ref e) => write_err!(f, "failed to decode script code"; e),
            UnauthorizedKey(ref pk) =>
                write!(f, "script code does not reference key {}, refusing to sign", pk),
            SighashSingleBug { input_index, outputs } => write!(
                f,
                "refusing legacy SIGHASH_SINGLE signature for input {} with {} outputs",
                input_index, outputs
            ),
            SighashComputation(ref e) => write!(f, "sighash: {}", e),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SignError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        use SignError::*;

        match *self {
            IndexOutOfBounds(ref e) => Some(e),
            FundingUtxo(ref e) => Some(e),
            Binding(ref e) => Some(e),
            MalformedScript(ref e) => Some(e),
            SighashComputation(ref e) => Some(e),
            InvalidSighashType
            | MissingUtxo
            | MissingWitnessScript
            | UnauthorizedKey(_)
            | SighashSingleBug { .. } => None,
        }
    }
}

impl From<sighash::Error> for SignError {
    fn from(e: sighash::Error) -> Self { Self::SighashComputation(e) }
}

impl From<IndexOutOfBoundsError> for SignError {
    fn from(e: IndexOutOfBoundsError) -> Self { Self::IndexOutOfBounds(e) }
}

impl From<FundingUtxoError> for SignError {
    fn from(e: FundingUtxoError) -> Self { Self::FundingUtxo(e) }
}

impl From<BindingError> for SignError {
    fn from(e: BindingError) -> Self { Self::Binding(e) }
}

impl From<script::Error> for SignError {
    fn from(e: script::Error) -> Self { Self::MalformedScript(e) }
}

/// Errors encountered while verifying partial signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum VerifyError {
    /// Input index out of bounds.
    IndexOutOfBounds(IndexOutOfBoundsError),
    /// Failed to compute the data a signature commits to.
    SigningData(SignError),
    /// Signature does not verify.
    InvalidSignature {
        /// The key the signature is stored under.
        pubkey: PublicKey,
    },
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use VerifyError::*;

        match *self {
            IndexOutOfBounds(ref e) => write_err!(f, "index out of bounds"; e),
            SigningData(ref e) => write_err!(f, "failed to compute signing data"; e),
            InvalidSignature { ref pubkey } => write!(f, "invalid signature for key {}", pubkey),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for VerifyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        use VerifyError::*;

        match *self {
            IndexOutOfBounds(ref e) => Some(e),
            SigningData(ref e) => Some(e),
            InvalidSignature { .. } => None,
        }
    }
}

impl From<IndexOutOfBoundsError> for VerifyError {
    fn from(e: IndexOutOfBoundsError) -> Self { Self::IndexOutOfBounds(e) }
}
