//! Shared fixtures for unit tests

use bitcoin::absolute::LockTime;
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::SecretKey;
use bitcoin::transaction::Version;
use bitcoin::{
    Address, Amount, Network, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid,
    Witness,
};

use crate::crypto::StakerKey;

/// Deterministic key derived from a repeated byte
pub fn key_from_byte(byte: u8) -> StakerKey {
    StakerKey::from_secret_key(SecretKey::from_slice(&[byte; 32]).unwrap(), Network::Testnet)
}

/// The staker used across builder and signer tests
pub fn staker_key() -> StakerKey {
    key_from_byte(0x31)
}

/// A transaction paying each of `values` to `to`
pub fn funding_tx(to: &Address, values: &[u64]) -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::new(Txid::all_zeros(), values.len() as u32),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output: values
            .iter()
            .map(|value| TxOut {
                value: Amount::from_sat(*value),
                script_pubkey: to.script_pubkey(),
            })
            .collect(),
    }
}
