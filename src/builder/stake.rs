//! Stake transaction construction
//!
//! Builds the unsigned transaction that locks BTC under a CLTV script and
//! announces the stake in an OP_RETURN output:
//!
//! - output 0: the lock output (P2WSH or P2SH of the redeem script)
//! - output 1: the stake metadata, value zero
//! - output 2: change back to the staker, when above dust

use std::collections::HashMap;
use std::sync::Arc;

use bitcoin::absolute::LockTime;
use bitcoin::key::CompressedPublicKey;
use bitcoin::transaction::Version;
use bitcoin::{Address, Amount, PublicKey, ScriptBuf, Transaction, TxIn, TxOut, Txid, Witness};
use log::{debug, info, warn};

use super::coin_select::{AccumulativeSelector, Candidate, CoinSelector, SelectionTarget};
use super::{fetch_parents, resolve_fee_rate};
use crate::config::NetworkConfig;
use crate::core::address::{AddressError, AddressKind};
use crate::core::fee::{estimate_weight, output_weight, FeeSpeed};
use crate::core::metadata::{DestinationAddress, StakeMetadata};
use crate::core::script::{CltvScript, RedeemScriptType};
use crate::core::transaction::{
    SpendInput, StakeLockTime, UnsignedTransaction, Utxo, SEQUENCE_LOCKTIME_ENABLED,
};
use crate::error::{Result, StakingError};
use crate::provider::{ChainDataProvider, ProviderError};

/// Everything needed to build a stake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakeRequest {
    /// Staker's public key; funds come from, and change returns to, its address
    pub public_key: PublicKey,
    pub amount: Amount,
    pub lock_time: StakeLockTime,
    pub validator: DestinationAddress,
    pub reward: DestinationAddress,
    /// Lock under P2WSH instead of P2SH
    pub witness: bool,
    /// Which of the staker's addresses funds the stake
    pub address_kind: AddressKind,
    pub script_type: RedeemScriptType,
    pub fee: FeeSpeed,
}

/// A built stake, ready for signing
#[derive(Debug, Clone)]
pub struct StakeTransaction {
    pub unsigned: UnsignedTransaction,
    /// Address the stake is locked at
    pub lock_address: Address,
    /// Redeem script needed to spend the lock output later
    pub redeem_script: ScriptBuf,
    pub fee: Amount,
}

impl StakeTransaction {
    pub fn redeem_script_hex(&self) -> String {
        hex::encode(self.redeem_script.as_bytes())
    }
}

/// Builds stake transactions against a chain data provider
pub struct StakeTransactionBuilder<P, S = AccumulativeSelector> {
    config: NetworkConfig,
    provider: Arc<P>,
    selector: S,
}

impl<P: ChainDataProvider> StakeTransactionBuilder<P> {
    pub fn new(config: NetworkConfig, provider: Arc<P>) -> Self {
        Self {
            config,
            provider,
            selector: AccumulativeSelector::default(),
        }
    }
}

impl<P: ChainDataProvider, S: CoinSelector> StakeTransactionBuilder<P, S> {
    /// Use a different coin selection strategy
    pub fn with_selector<T: CoinSelector>(self, selector: T) -> StakeTransactionBuilder<P, T> {
        StakeTransactionBuilder {
            config: self.config,
            provider: self.provider,
            selector,
        }
    }

    /// Build the unsigned stake transaction
    pub async fn build(&self, request: &StakeRequest) -> Result<StakeTransaction> {
        let network = self.config.bitcoin_network;
        if request.amount == Amount::ZERO {
            return Err(StakingError::InputValidation(
                "stake amount must be positive".to_string(),
            ));
        }
        if request.amount > Amount::MAX_MONEY {
            return Err(StakingError::InputValidation(format!(
                "stake amount {} exceeds the money supply",
                request.amount
            )));
        }

        let staker = request.address_kind.derive(&request.public_key, network)?;
        let script = match request.script_type {
            RedeemScriptType::PublicKeyHash => {
                CltvScript::public_key_hash(request.lock_time, &request.public_key)
            }
            RedeemScriptType::PublicKey => {
                CltvScript::public_key(request.lock_time, request.public_key)
            }
            RedeemScriptType::MultiSig => {
                return Err(StakingError::InputValidation(
                    "multisig stakes are not built from a single key".to_string(),
                ))
            }
        };
        if request.witness {
            script.ensure_witness_compatible()?;
        }

        let lock_script = script.lock_script(request.witness);
        let lock_address = script.lock_address(request.witness, network)?;
        let metadata = StakeMetadata::for_script(
            &script,
            self.config.chain_id(),
            request.validator,
            request.reward,
            0,
        );
        let op_return = metadata.encode_script()?;

        let fee_rate = resolve_fee_rate(self.provider.as_ref(), request.fee).await?;

        let staker_script = staker.script_pubkey();
        let utxos: Vec<Utxo> = self
            .provider
            .utxos(&staker)
            .await?
            .into_iter()
            .filter(|utxo| {
                let owned = utxo.script_pubkey == staker_script;
                if !owned {
                    warn!("Ignoring UTXO {} not paying to {}", utxo.outpoint(), staker);
                }
                owned
            })
            .collect();
        debug!("Found {} UTXOs for {}", utxos.len(), staker);

        let parents = if request.address_kind == AddressKind::P2pkh {
            fetch_parents(self.provider.as_ref(), &utxos).await?
        } else {
            HashMap::new()
        };

        let candidates: Vec<Candidate> = utxos
            .iter()
            .map(|utxo| Candidate {
                value: utxo.value,
                input_weight: request.address_kind.input_weight(),
            })
            .collect();
        let target = SelectionTarget {
            value: request.amount,
            base_weight: estimate_weight(
                std::iter::empty(),
                [lock_script.as_script(), op_return.as_script()],
                request.address_kind.is_witness(),
            ),
            change_weight: output_weight(&staker_script),
            fee_rate,
        };
        let selection = self.selector.select(&candidates, &target)?;

        let mut inputs = Vec::with_capacity(selection.selected.len());
        let mut spends = Vec::with_capacity(selection.selected.len());
        for &index in &selection.selected {
            let utxo = &utxos[index];
            inputs.push(TxIn {
                previous_output: utxo.outpoint(),
                script_sig: ScriptBuf::new(),
                sequence: SEQUENCE_LOCKTIME_ENABLED,
                witness: Witness::new(),
            });
            spends.push(spend_for(request.address_kind, &request.public_key, utxo, &parents)?);
        }

        let mut outputs = vec![
            TxOut {
                value: request.amount,
                script_pubkey: lock_script,
            },
            TxOut {
                value: Amount::ZERO,
                script_pubkey: op_return,
            },
        ];
        if let Some(change) = selection.change {
            outputs.push(TxOut {
                value: change,
                script_pubkey: staker_script,
            });
        }

        let tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: inputs,
            output: outputs,
        };
        let unsigned = UnsignedTransaction::new(tx, spends)?;

        info!(
            "Built stake of {} from {} locked at {} until {} (fee {})",
            request.amount, staker, lock_address, request.lock_time, selection.fee
        );

        Ok(StakeTransaction {
            unsigned,
            lock_address,
            redeem_script: script.to_script(),
            fee: selection.fee,
        })
    }
}

/// Spend data for a UTXO held at the staker's address of `kind`
fn spend_for(
    kind: AddressKind,
    public_key: &PublicKey,
    utxo: &Utxo,
    parents: &HashMap<Txid, Transaction>,
) -> Result<SpendInput> {
    let prev_script = utxo.script_pubkey.clone();
    let value = utxo.value;
    let spend = match kind {
        AddressKind::P2pkh => SpendInput::Legacy {
            parent_tx: parents
                .get(&utxo.txid)
                .cloned()
                .ok_or(ProviderError::TransactionNotFound(utxo.txid))?,
        },
        AddressKind::P2wpkh => SpendInput::Segwit { prev_script, value },
        AddressKind::P2shP2wpkh => {
            let compressed = CompressedPublicKey::try_from(*public_key)
                .map_err(|_| AddressError::UncompressedKey)?;
            SpendInput::WrappedSegwit {
                prev_script,
                value,
                redeem_script: ScriptBuf::new_p2wpkh(&compressed.wpubkey_hash()),
            }
        }
        AddressKind::P2tr => SpendInput::Taproot {
            prev_script,
            value,
            internal_key: public_key.inner.x_only_public_key().0,
        },
    };
    Ok(spend)
}
