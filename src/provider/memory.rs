//! In-memory chain data snapshot
//!
//! Serves UTXOs, transactions and fee estimates captured ahead of time. Used
//! for offline building and in tests.

use std::collections::HashMap;

use async_trait::async_trait;
use bitcoin::consensus::encode::serialize;
use bitcoin::{Address, ScriptBuf, Transaction, Txid};
use serde::{Deserialize, Serialize};

use super::{ChainDataProvider, ProviderError};
use crate::core::{FeeEstimates, FeeRate, FeeSpeed, Utxo};

/// A fixed view of the chain
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotProvider {
    utxos: HashMap<ScriptBuf, Vec<Utxo>>,
    transactions: HashMap<Txid, Transaction>,
    fees: Option<FeeEstimates>,
}

impl SnapshotProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot from JSON
    pub fn from_json_str(json: &str) -> Result<Self, ProviderError> {
        serde_json::from_str(json).map_err(|e| ProviderError::InvalidData(e.to_string()))
    }

    /// Add an unspent output
    pub fn with_utxo(mut self, utxo: Utxo) -> Self {
        self.utxos
            .entry(utxo.script_pubkey.clone())
            .or_default()
            .push(utxo);
        self
    }

    /// Add a transaction, and every output of it paying to `owner` as a UTXO
    pub fn with_funding(mut self, tx: Transaction, owner: &Address) -> Self {
        let txid = tx.compute_txid();
        let owner_script = owner.script_pubkey();
        for (vout, output) in tx.output.iter().enumerate() {
            if output.script_pubkey == owner_script {
                self = self.with_utxo(Utxo {
                    txid,
                    vout: vout as u32,
                    value: output.value,
                    script_pubkey: output.script_pubkey.clone(),
                });
            }
        }
        self.with_transaction(tx)
    }

    /// Add a transaction retrievable by id
    pub fn with_transaction(mut self, tx: Transaction) -> Self {
        self.transactions.insert(tx.compute_txid(), tx);
        self
    }

    /// Set the fee estimates
    pub fn with_fees(mut self, fees: FeeEstimates) -> Self {
        self.fees = Some(fees);
        self
    }
}

#[async_trait]
impl ChainDataProvider for SnapshotProvider {
    async fn utxos(&self, address: &Address) -> Result<Vec<Utxo>, ProviderError> {
        Ok(self
            .utxos
            .get(&address.script_pubkey())
            .cloned()
            .unwrap_or_default())
    }

    async fn raw_transaction(&self, txid: &Txid) -> Result<Vec<u8>, ProviderError> {
        self.transactions
            .get(txid)
            .map(serialize)
            .ok_or(ProviderError::TransactionNotFound(*txid))
    }

    async fn fee_rate(&self, speed: FeeSpeed) -> Result<FeeRate, ProviderError> {
        if let FeeSpeed::Custom(rate) = speed {
            return Ok(rate);
        }
        self.fees
            .map(|fees| fees.for_speed(speed))
            .ok_or_else(|| ProviderError::Request("no fee estimates in snapshot".to_string()))
    }
}
