//! Chain data access
//!
//! Builders read UTXOs, parent transactions and fee rates through the
//! [`ChainDataProvider`] trait. Transport to an actual data source lives
//! outside this crate; [`SnapshotProvider`] serves a fixed in-memory view.

use async_trait::async_trait;
use bitcoin::{Address, Txid};
use thiserror::Error;

use crate::core::{FeeRate, FeeSpeed, Utxo};

pub mod memory;

pub use memory::SnapshotProvider;

/// Chain data provider errors
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Request failed: {0}")]
    Request(String),
    #[error("Transaction not found: {0}")]
    TransactionNotFound(Txid),
    #[error("Invalid data from provider: {0}")]
    InvalidData(String),
    #[error("Broadcasting is not supported by this provider")]
    BroadcastUnsupported,
}

/// Read access to Bitcoin chain data.
///
/// Implementations must be shareable across tasks; builders hold them in an
/// `Arc` and may issue several requests concurrently.
#[async_trait]
pub trait ChainDataProvider: Send + Sync {
    /// Unspent outputs paying to `address`.
    async fn utxos(&self, address: &Address) -> Result<Vec<Utxo>, ProviderError>;

    /// Consensus-serialized transaction with the given id.
    async fn raw_transaction(&self, txid: &Txid) -> Result<Vec<u8>, ProviderError>;

    /// Current fee rate for a confirmation speed. Custom speeds carry their own rate.
    async fn fee_rate(&self, speed: FeeSpeed) -> Result<FeeRate, ProviderError>;

    /// Broadcast a signed transaction, returning its id.
    async fn broadcast(&self, _tx_hex: &str) -> Result<Txid, ProviderError> {
        Err(ProviderError::BroadcastUnsupported)
    }
}
