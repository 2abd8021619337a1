//! P2SH 2-of-3 multisig signing example.
//!
//! Three parties lock funds to a bare 2-of-3 multisig redeem script wrapped in P2SH. Two of them
//! sign the spend, the signing record is checked for finalization readiness after each step.

use psbt_signer::bitcoin::hashes::Hash as _;
use psbt_signer::bitcoin::locktime::absolute;
use psbt_signer::bitcoin::opcodes::all::OP_CHECKMULTISIG;
use psbt_signer::bitcoin::secp256k1::{rand, SECP256K1};
use psbt_signer::bitcoin::{
    script, transaction, Amount, Network, OutPoint, PrivateKey, PublicKey, ScriptBuf, Sequence,
    Transaction, TxIn, TxOut, Txid, Witness,
};
use psbt_signer::{Psbt, SignError};

const UTXO_AMOUNT: Amount = Amount::from_sat(20_000_000);
const FEE: Amount = Amount::from_sat(1_000); // Usually this would be calculated.

fn main() -> anyhow::Result<()> {
    let keys: Vec<PrivateKey> = (0..3).map(|_| random_key()).collect();
    let pks: Vec<PublicKey> = keys.iter().map(|sk| sk.public_key(SECP256K1)).collect();

    let redeem_script = multisig_redeem_script(2, &pks);

    // The transaction that funded the multisig, usually this would come from the chain.
    let funding = Transaction {
        version: transaction::Version::TWO,
        lock_time: absolute::LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint { txid: Txid::all_zeros(), vout: 0 },
            script_sig: ScriptBuf::default(),
            sequence: Sequence::MAX,
            witness: Witness::default(),
        }],
        output: vec![TxOut {
            value: UTXO_AMOUNT,
            script_pubkey: ScriptBuf::new_p2sh(&redeem_script.script_hash()),
        }],
    };

    let spend = Transaction {
        version: transaction::Version::TWO,  // Post BIP-68.
        lock_time: absolute::LockTime::ZERO, // Ignore the locktime.
        input: vec![TxIn {
            previous_output: OutPoint { txid: funding.txid(), vout: 0 },
            script_sig: ScriptBuf::default(),
            sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
            witness: Witness::default(),
        }],
        output: vec![TxOut {
            value: UTXO_AMOUNT - FEE,
            script_pubkey: ScriptBuf::new_p2pkh(&pks[0].pubkey_hash()),
        }],
    };

    let mut psbt = Psbt::from_unsigned_tx(spend)?;
    psbt.inputs[0].non_witness_utxo = Some(funding);
    psbt.inputs[0].redeem_script = Some(redeem_script);
    psbt.signer_checks()?;

    println!("ready to finalize with no signatures: {}", psbt.can_finalize(0)?);

    psbt.sign_input(0, &keys[0], SECP256K1)?;
    println!("ready to finalize with one signature: {}", psbt.can_finalize(0)?);

    psbt.sign_input(0, &keys[1], SECP256K1)?;
    println!("ready to finalize with two signatures: {}", psbt.can_finalize(0)?);

    psbt.verify_partial_sigs(0, SECP256K1)?;

    // A key that is not part of the multisig is refused.
    match psbt.sign_input(0, &random_key(), SECP256K1) {
        Err(SignError::UnauthorizedKey(pk)) => println!("refused to sign with {}", pk),
        other => anyhow::bail!("unexpected signing result: {:?}", other),
    }

    for (pk, sig) in &psbt.inputs[0].partial_sigs {
        println!("{}: {}", pk, sig);
    }
    Ok(())
}

// The m-of-n multisig redeem script locking to `pks`.
fn multisig_redeem_script(m: i64, pks: &[PublicKey]) -> ScriptBuf {
    let mut builder = script::Builder::new().push_int(m);
    for pk in pks {
        builder = builder.push_key(pk);
    }
    builder.push_int(pks.len() as i64).push_opcode(OP_CHECKMULTISIG).into_script()
}

fn random_key() -> PrivateKey {
    let (sk, _) = SECP256K1.generate_keypair(&mut rand::thread_rng());
    PrivateKey::new(sk, Network::Bitcoin)
}
