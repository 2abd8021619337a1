//! Serde round trip of a partially signed PSBT.

#![cfg(all(feature = "std", feature = "serde"))]

mod util;

use psbt_signer::bitcoin::secp256k1::SECP256K1;
use psbt_signer::bitcoin::sighash::EcdsaSighashType;
use psbt_signer::Psbt;

use crate::util::{key, p2sh_multisig_psbt, pubkey};

#[test]
fn json_round_trip() -> anyhow::Result<()> {
    let mut psbt = p2sh_multisig_psbt(2, &[pubkey(1), pubkey(2), pubkey(3)]);
    psbt.inputs[0].sighash_type = Some(EcdsaSighashType::AllPlusAnyoneCanPay.into());
    psbt.sign_input(0, &key(1), SECP256K1)?;

    let json = serde_json::to_string(&psbt)?;
    let decoded: Psbt = serde_json::from_str(&json)?;
    assert_eq!(decoded, psbt);

    // Signing continues where it left off.
    let mut decoded = decoded;
    decoded.sign_input(0, &key(3), SECP256K1)?;
    assert!(decoded.can_finalize(0)?);
    decoded.verify_partial_sigs(0, SECP256K1)?;
    Ok(())
}
