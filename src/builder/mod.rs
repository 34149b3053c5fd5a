//! Transaction builders
//!
//! - [`StakeTransactionBuilder`]: locks funds under a CLTV script
//! - [`RedeemTransactionBuilder`]: spends a matured lock back to an address
//! - [`coin_select`]: the funding strategy both builders use

use std::collections::{BTreeSet, HashMap};

use bitcoin::consensus::deserialize;
use bitcoin::{Transaction, Txid};
use futures::future::try_join_all;

use crate::core::fee::{FeeRate, FeeSpeed, MAX_FEE_RATE, MIN_FEE_RATE};
use crate::core::transaction::Utxo;
use crate::error::{Result, StakingError};
use crate::provider::{ChainDataProvider, ProviderError};

pub mod coin_select;
pub mod redeem;
pub mod stake;

pub use coin_select::{
    AccumulativeSelector, Candidate, CoinSelector, Selection, SelectionError, SelectionTarget,
    Sweep, DUST_LIMIT,
};
pub use redeem::{RedeemRequest, RedeemTransaction, RedeemTransactionBuilder};
pub use stake::{StakeRequest, StakeTransaction, StakeTransactionBuilder};

/// Resolve a fee speed and check the rate is within bounds
async fn resolve_fee_rate<P: ChainDataProvider>(provider: &P, speed: FeeSpeed) -> Result<FeeRate> {
    let rate = provider.fee_rate(speed).await?;
    if !(MIN_FEE_RATE..=MAX_FEE_RATE).contains(&rate.as_sat_per_vb()) {
        return Err(StakingError::InputValidation(format!(
            "fee rate {rate} outside [{MIN_FEE_RATE}, {MAX_FEE_RATE}] sat/vB"
        )));
    }
    Ok(rate)
}

/// Fetch the parent transaction of every UTXO concurrently, checking each hashes to its id
async fn fetch_parents<P: ChainDataProvider>(
    provider: &P,
    utxos: &[Utxo],
) -> Result<HashMap<Txid, Transaction>> {
    let txids: BTreeSet<Txid> = utxos.iter().map(|utxo| utxo.txid).collect();
    let parents = try_join_all(txids.into_iter().map(|txid| async move {
        let raw = provider.raw_transaction(&txid).await?;
        let tx: Transaction =
            deserialize(&raw).map_err(|e| ProviderError::InvalidData(e.to_string()))?;
        if tx.compute_txid() != txid {
            return Err(ProviderError::InvalidData(format!(
                "transaction returned for {txid} has id {}",
                tx.compute_txid()
            )));
        }
        Ok::<_, ProviderError>((txid, tx))
    }))
    .await?;
    Ok(parents.into_iter().collect())
}
