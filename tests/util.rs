//! Common utilities used by the integration tests.

// Functions in this file are all used but clippy complains still.
#![allow(dead_code)]

use psbt_signer::bitcoin::consensus::encode::deserialize;
use psbt_signer::bitcoin::hashes::Hash as _;
use psbt_signer::bitcoin::hex::FromHex;
use psbt_signer::bitcoin::locktime::absolute;
use psbt_signer::bitcoin::opcodes::all::OP_CHECKMULTISIG;
use psbt_signer::bitcoin::secp256k1::{SecretKey, SECP256K1};
use psbt_signer::bitcoin::{
    script, transaction, Amount, Network, OutPoint, PrivateKey, PublicKey, ScriptBuf, Sequence,
    Transaction, TxIn, TxOut, Txid, Witness,
};
use psbt_signer::{Input, Psbt};

pub const UTXO_AMOUNT: Amount = Amount::from_sat(50_000);

/// Returns a private key with every secret byte set to `byte`.
pub fn key(byte: u8) -> PrivateKey {
    let sk = SecretKey::from_slice(&[byte; 32]).expect("valid secret key");
    PrivateKey::new(sk, Network::Regtest)
}

/// Returns the compressed public key of [`key`].
pub fn pubkey(byte: u8) -> PublicKey { key(byte).public_key(SECP256K1) }

#[track_caller]
pub fn hex_tx(s: &str) -> Transaction {
    let bytes = Vec::<u8>::from_hex(s).expect("valid hex");
    deserialize(&bytes).expect("valid transaction")
}

/// The m-of-n multisig script locking to `pks`.
pub fn multisig_script(m: i64, pks: &[PublicKey]) -> ScriptBuf {
    let mut builder = script::Builder::new().push_int(m);
    for pk in pks {
        builder = builder.push_key(pk);
    }
    builder.push_int(pks.len() as i64).push_opcode(OP_CHECKMULTISIG).into_script()
}

/// A transaction with a single output locked by `script_pubkey`.
pub fn funding_tx(script_pubkey: ScriptBuf) -> Transaction {
    Transaction {
        version: transaction::Version::TWO,
        lock_time: absolute::LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint { txid: Txid::all_zeros(), vout: 0 },
            script_sig: ScriptBuf::default(),
            sequence: Sequence::MAX,
            witness: Witness::default(),
        }],
        output: vec![TxOut { value: UTXO_AMOUNT, script_pubkey }],
    }
}

/// An unsigned transaction spending `prevouts`.
pub fn spending_tx(prevouts: &[OutPoint]) -> Transaction {
    let input = prevouts
        .iter()
        .map(|previous_output| TxIn {
            previous_output: *previous_output,
            script_sig: ScriptBuf::default(),
            sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
            witness: Witness::default(),
        })
        .collect();
    let output = vec![TxOut {
        value: Amount::from_sat(40_000),
        script_pubkey: ScriptBuf::new_p2pkh(&pubkey(99).pubkey_hash()),
    }];

    Transaction {
        version: transaction::Version::TWO,
        lock_time: absolute::LockTime::ZERO,
        input,
        output,
    }
}

/// A PSBT with a single input spending the only output of `funding`, with `input` as the
/// signing record.
pub fn single_input_psbt(funding: &Transaction, input: Input) -> Psbt {
    let tx = spending_tx(&[OutPoint { txid: funding.txid(), vout: 0 }]);
    let mut psbt = Psbt::from_unsigned_tx(tx).expect("unsigned transaction");
    psbt.inputs[0] = input;
    psbt
}

/// A PSBT spending a P2SH output locked to an m-of-n multisig redeem script.
pub fn p2sh_multisig_psbt(m: i64, pks: &[PublicKey]) -> Psbt {
    let redeem_script = multisig_script(m, pks);
    let funding = funding_tx(ScriptBuf::new_p2sh(&redeem_script.script_hash()));
    let input = Input {
        non_witness_utxo: Some(funding.clone()),
        redeem_script: Some(redeem_script),
        ..Default::default()
    };
    single_input_psbt(&funding, input)
}
