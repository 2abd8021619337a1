// SPDX-License-Identifier: CC0-1.0

//! Partially Signed Bitcoin Transaction signer.
//!
//! Implements the Signer role of [BIP-174] for ECDSA inputs (legacy, nested and native segwit v0)
//! and the check a Finalizer does before building the final scriptSig/witness: does this input
//! carry enough partial signatures?
//!
//! Signing an input is guarded by the BIP-174 signer checks:
//!
//! - If a non-witness UTXO is provided, its hash must match the hash specified in the prevout.
//! - If a redeemScript is provided, the scriptPubKey must be for that redeemScript.
//! - If a witnessScript is provided, the scriptPubKey or the redeemScript must be for that
//!   witnessScript.
//!
//! and additionally we refuse to sign with a key that the signing script does not reference.
//!
//! The signing logic is written against the [`InputProvider`] trait so it can be used with any
//! PSBT container, [`Psbt`] is a minimal one.
//!
//! [BIP-174]: <https://github.com/bitcoin/bips/blob/master/bip-0174.mediawiki>

#![cfg_attr(all(not(feature = "std"), not(test)), no_std)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
// Coding conventions
#![warn(missing_docs)]
// Exclude clippy lints we don't think are valuable
#![allow(clippy::needless_question_mark)] // https://github.com/rust-bitcoin/rust-bitcoin/pull/2134

#[cfg(not(any(feature = "std", feature = "no-std")))]
compile_error!("at least one of the `std` or `no-std` features must be enabled");

#[macro_use]
extern crate alloc;

#[cfg(feature = "serde")]
#[macro_use]
extern crate actual_serde as serde;

/// Re-export of the `rust-bitcoin` crate.
pub extern crate bitcoin;

mod error;
mod input;
mod psbt;
mod sighash_type;

pub mod binding;
pub mod checks;
pub mod classify;
pub mod finalize;
pub mod sighash;
pub mod sign;

#[rustfmt::skip]                // Keep pubic re-exports separate
pub use crate::{
    binding::{BindingError, ScriptHashScheme},
    checks::SignerChecksError,
    classify::{classify, ScriptTemplate},
    error::{FundingUtxoError, IndexOutOfBoundsError},
    finalize::FinalizeError,
    input::Input,
    psbt::{InputProvider, Psbt, UnsignedTxChecksError},
    sighash::{Sighash, SigningData},
    sighash_type::{ParseSighashTypeError, PsbtSighashType},
    sign::{GetKey, KeyRequest, SignError, VerifyError},
};

#[rustfmt::skip]
mod prelude {
    #[cfg(all(not(feature = "std"), not(test)))]
    pub use alloc::{string::{String, ToString}, vec::Vec, boxed::Box, borrow::{Borrow, BorrowMut, ToOwned}};

    #[cfg(any(feature = "std", test))]
    pub use std::{string::{String, ToString}, vec::Vec, boxed::Box, borrow::{Borrow, BorrowMut, ToOwned}};

    #[cfg(all(not(feature = "std"), not(test)))]
    pub use alloc::collections::{BTreeMap, btree_map};

    #[cfg(any(feature = "std", test))]
    pub use std::collections::{BTreeMap, btree_map};
}
