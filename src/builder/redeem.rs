//! Redeem transaction construction
//!
//! Spends every UTXO at a matured lock address to one destination. The
//! transaction lock time is set to the script's lock time so that
//! OP_CHECKLOCKTIMEVERIFY passes.
//!
//! The fee has two parts. The baseline covers the transaction skeleton,
//! each input's outpoint and sequence, and the revealed redeem script. The
//! signature correction covers the signature material the unlocking data
//! will add, which the selector does not see.

use std::collections::HashMap;
use std::sync::Arc;

use bitcoin::transaction::Version;
use bitcoin::{Address, Amount, NetworkKind, ScriptBuf, Transaction, TxIn, TxOut, Witness};
use log::{debug, info};

use super::coin_select::{AccumulativeSelector, Candidate, CoinSelector};
use super::{fetch_parents, resolve_fee_rate};
use crate::config::NetworkConfig;
use crate::core::address;
use crate::core::fee::{
    estimate_weight, p2sh_script_input_weight, p2wsh_script_input_weight, FeeRate, FeeSpeed,
    PUBKEY_ALLOWANCE, SIGNATURE_ALLOWANCE, WITNESS_SCALE_FACTOR,
};
use crate::core::script::{CltvScript, LockCondition};
use crate::core::transaction::{
    SpendInput, StakeLockTime, UnsignedTransaction, Utxo, SEQUENCE_LOCKTIME_ENABLED,
};
use crate::error::{Result, StakingError};
use crate::provider::{ChainDataProvider, ProviderError};

/// Everything needed to redeem a stake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemRequest {
    /// The lock address (P2SH or P2WSH)
    pub account: Address,
    /// The redeem script the lock address commits to
    pub redeem_script: ScriptBuf,
    pub destination: Address,
    pub fee: FeeSpeed,
}

/// A built redeem, ready for signing
#[derive(Debug, Clone)]
pub struct RedeemTransaction {
    pub unsigned: UnsignedTransaction,
    /// Total fee: baseline plus signature correction
    pub fee: Amount,
    pub lock_time: StakeLockTime,
}

/// Signature bytes one input of `script` will add when unlocked
pub fn signature_allowance(script: &CltvScript) -> u64 {
    match &script.condition {
        LockCondition::MultiSig { threshold, .. } => SIGNATURE_ALLOWANCE * *threshold as u64,
        LockCondition::PublicKeyHash(_) => SIGNATURE_ALLOWANCE + PUBKEY_ALLOWANCE,
        LockCondition::PublicKey(_) => SIGNATURE_ALLOWANCE,
    }
}

/// Fee for the signature material of `inputs` inputs
///
/// Legacy signatures live in the scriptSig and count at full weight; witness
/// signatures count one weight unit per byte.
pub fn signature_correction(
    script: &CltvScript,
    inputs: usize,
    witness: bool,
    fee_rate: FeeRate,
) -> Amount {
    let scale = if witness { 1 } else { WITNESS_SCALE_FACTOR };
    fee_rate.fee_for_weight_exact(signature_allowance(script) * scale * inputs as u64)
}

/// Builds redeem transactions against a chain data provider
pub struct RedeemTransactionBuilder<P, S = AccumulativeSelector> {
    config: NetworkConfig,
    provider: Arc<P>,
    selector: S,
}

impl<P: ChainDataProvider> RedeemTransactionBuilder<P> {
    pub fn new(config: NetworkConfig, provider: Arc<P>) -> Self {
        Self {
            config,
            provider,
            selector: AccumulativeSelector::default(),
        }
    }
}

impl<P: ChainDataProvider, S: CoinSelector> RedeemTransactionBuilder<P, S> {
    /// Use a different coin selection strategy
    pub fn with_selector<T: CoinSelector>(self, selector: T) -> RedeemTransactionBuilder<P, T> {
        RedeemTransactionBuilder {
            config: self.config,
            provider: self.provider,
            selector,
        }
    }

    /// Build the unsigned redeem transaction
    pub async fn build(&self, request: &RedeemRequest) -> Result<RedeemTransaction> {
        let network = self.config.bitcoin_network;
        let decoded = address::decode(&request.account.to_string())?;
        if decoded.network_kind()? != NetworkKind::from(network) {
            return Err(StakingError::InputValidation(format!(
                "account {} is not a {network} address",
                request.account
            )));
        }
        let witness = decoded.is_witness();

        let script = CltvScript::parse(&request.redeem_script, witness)?;
        let lock_script = script.lock_script(witness);
        if request.account.script_pubkey() != lock_script {
            return Err(StakingError::InputValidation(format!(
                "account {} does not commit to the redeem script",
                request.account
            )));
        }

        let utxos: Vec<Utxo> = self
            .provider
            .utxos(&request.account)
            .await?
            .into_iter()
            .filter(|utxo| utxo.script_pubkey == lock_script)
            .collect();
        debug!("Found {} locked UTXOs at {}", utxos.len(), request.account);

        let parents = if witness {
            HashMap::new()
        } else {
            fetch_parents(self.provider.as_ref(), &utxos).await?
        };

        let fee_rate = resolve_fee_rate(self.provider.as_ref(), request.fee).await?;

        let redeem_script = script.to_script();
        let input_weight = if witness {
            p2wsh_script_input_weight(&redeem_script)
        } else {
            p2sh_script_input_weight(&redeem_script)
        };
        let candidates: Vec<Candidate> = utxos
            .iter()
            .map(|utxo| Candidate {
                value: utxo.value,
                input_weight,
            })
            .collect();
        let destination_script = request.destination.script_pubkey();
        let base_weight = estimate_weight(
            std::iter::empty(),
            [destination_script.as_script()],
            witness,
        );
        let correction = signature_correction(&script, utxos.len(), witness, fee_rate);
        if utxos.is_empty() {
            return Err(StakingError::InsufficientFunds {
                needed: fee_rate.fee_for_weight(base_weight) + correction,
                available: Amount::ZERO,
            });
        }
        // Locked value at or below the baseline fee leaves nothing for signatures
        let sweep = self
            .selector
            .split(&candidates, base_weight, fee_rate)
            .map_err(|_| StakingError::InsufficientOutputValue {
                value: Amount::ZERO,
                fee: correction,
            })?;
        if sweep.value <= correction {
            return Err(StakingError::InsufficientOutputValue {
                value: sweep.value,
                fee: correction,
            });
        }
        let output_value = sweep.value - correction;

        let mut inputs = Vec::with_capacity(utxos.len());
        let mut spends = Vec::with_capacity(utxos.len());
        for utxo in &utxos {
            inputs.push(TxIn {
                previous_output: utxo.outpoint(),
                script_sig: ScriptBuf::new(),
                sequence: SEQUENCE_LOCKTIME_ENABLED,
                witness: Witness::new(),
            });
            let spend = if witness {
                SpendInput::LockedSegwit {
                    prev_script: utxo.script_pubkey.clone(),
                    value: utxo.value,
                    witness_script: redeem_script.clone(),
                }
            } else {
                SpendInput::LockedLegacy {
                    parent_tx: parents
                        .get(&utxo.txid)
                        .cloned()
                        .ok_or(ProviderError::TransactionNotFound(utxo.txid))?,
                    redeem_script: redeem_script.clone(),
                }
            };
            spends.push(spend);
        }

        let tx = Transaction {
            version: Version::TWO,
            lock_time: script.lock_time.to_absolute(),
            input: inputs,
            output: vec![TxOut {
                value: output_value,
                script_pubkey: destination_script,
            }],
        };
        let unsigned = UnsignedTransaction::new(tx, spends)?;
        let fee = sweep.fee + correction;

        info!(
            "Built redeem of {} from {} to {} (baseline fee {}, signature fee {})",
            output_value, request.account, request.destination, sweep.fee, correction
        );

        Ok(RedeemTransaction {
            unsigned,
            fee,
            lock_time: script.lock_time,
        })
    }
}
