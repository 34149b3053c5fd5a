//! Unsigned staking transactions
//!
//! An [`UnsignedTransaction`] pairs a Bitcoin transaction (with empty script
//! sigs and witnesses) with one [`SpendInput`] per input describing exactly
//! what the signer needs to spend it. It converts to and from a PSBT so the
//! build and sign steps can run on different machines.

use std::fmt;
use std::str::FromStr;

use bitcoin::consensus::encode::serialize_hex;
use bitcoin::psbt::{self, Psbt};
use bitcoin::secp256k1::XOnlyPublicKey;
use bitcoin::{absolute, Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Locktime threshold: values below are block heights, above are timestamps
pub const LOCKTIME_THRESHOLD: u32 = 500_000_000;

/// Sequence used on every input: enables lock time checks, does not signal RBF
pub const SEQUENCE_LOCKTIME_ENABLED: Sequence = Sequence::ENABLE_LOCKTIME_NO_RBF;

// =============================================================================
// Error Types
// =============================================================================

/// Transaction-related errors
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Lock time {0} must be a unix timestamp greater than {LOCKTIME_THRESHOLD}")]
    LockTimeTooLow(u32),
    #[error("Invalid lock time: {0}")]
    InvalidLockTime(String),
    #[error("Input {0}: spend data does not describe the spent output")]
    MissingPrevout(usize),
    #[error("Input {0}: parent transaction {1} does not match the outpoint")]
    ParentMismatch(usize, Txid),
    #[error("Input {0}: transaction is not unsigned")]
    AlreadySigned(usize),
    #[error("Input count {inputs} does not match spend data count {spends}")]
    InputCountMismatch { inputs: usize, spends: usize },
    #[error("Input {0}: PSBT input carries no recognizable spend data")]
    UnrecognizedInput(usize),
    #[error("PSBT error: {0}")]
    Psbt(#[from] psbt::Error),
    #[error("Invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

// =============================================================================
// Lock Time
// =============================================================================

/// An absolute, timestamp-based lock time for a stake
///
/// Always strictly greater than [`LOCKTIME_THRESHOLD`], so it can never be
/// mistaken for a block height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct StakeLockTime(u32);

impl StakeLockTime {
    /// Create from unix seconds
    pub fn from_unix(seconds: u32) -> Result<Self, TransactionError> {
        if seconds <= LOCKTIME_THRESHOLD {
            return Err(TransactionError::LockTimeTooLow(seconds));
        }
        Ok(Self(seconds))
    }

    /// Unix seconds
    pub fn to_unix(&self) -> u32 {
        self.0
    }

    /// The consensus lock time a spending transaction must carry
    pub fn to_absolute(&self) -> absolute::LockTime {
        absolute::LockTime::from_consensus(self.0)
    }

    /// Calendar time at which the stake unlocks
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(i64::from(self.0), 0)
    }
}

impl TryFrom<u32> for StakeLockTime {
    type Error = TransactionError;

    fn try_from(seconds: u32) -> Result<Self, Self::Error> {
        Self::from_unix(seconds)
    }
}

impl From<StakeLockTime> for u32 {
    fn from(lock_time: StakeLockTime) -> Self {
        lock_time.0
    }
}

impl FromStr for StakeLockTime {
    type Err = TransactionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let seconds: u32 = s
            .trim()
            .parse()
            .map_err(|_| TransactionError::InvalidLockTime(s.to_string()))?;
        Self::from_unix(seconds)
    }
}

impl fmt::Display for StakeLockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(at) => write!(f, "{} ({})", self.0, at.to_rfc3339()),
            None => write!(f, "{}", self.0),
        }
    }
}

// =============================================================================
// UTXO
// =============================================================================

/// Unspent Transaction Output as reported by a chain data provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub txid: Txid,
    pub vout: u32,
    pub value: Amount,
    pub script_pubkey: ScriptBuf,
}

impl Utxo {
    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.txid, self.vout)
    }

    pub fn tx_out(&self) -> TxOut {
        TxOut {
            value: self.value,
            script_pubkey: self.script_pubkey.clone(),
        }
    }
}

// =============================================================================
// Spend Data
// =============================================================================

/// What the signer needs to spend one input, by input type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpendInput {
    /// P2PKH: legacy signing commits to the full parent transaction
    Legacy { parent_tx: Transaction },
    /// P2WPKH
    Segwit { prev_script: ScriptBuf, value: Amount },
    /// P2SH-P2WPKH: `redeem_script` is the wrapped witness program
    WrappedSegwit {
        prev_script: ScriptBuf,
        value: Amount,
        redeem_script: ScriptBuf,
    },
    /// P2TR key path, committed to the untweaked `internal_key`
    Taproot {
        prev_script: ScriptBuf,
        value: Amount,
        internal_key: XOnlyPublicKey,
    },
    /// P2SH output locked by a CLTV redeem script
    LockedLegacy {
        parent_tx: Transaction,
        redeem_script: ScriptBuf,
    },
    /// P2WSH output locked by a CLTV witness script
    LockedSegwit {
        prev_script: ScriptBuf,
        value: Amount,
        witness_script: ScriptBuf,
    },
}

impl SpendInput {
    /// The output being spent, given the outpoint's index
    pub fn spent_output(&self, vout: u32) -> Option<TxOut> {
        match self {
            SpendInput::Legacy { parent_tx } | SpendInput::LockedLegacy { parent_tx, .. } => {
                parent_tx.output.get(vout as usize).cloned()
            }
            SpendInput::Segwit { prev_script, value }
            | SpendInput::WrappedSegwit {
                prev_script, value, ..
            }
            | SpendInput::Taproot {
                prev_script, value, ..
            }
            | SpendInput::LockedSegwit {
                prev_script, value, ..
            } => Some(TxOut {
                value: *value,
                script_pubkey: prev_script.clone(),
            }),
        }
    }

    /// The CLTV script guarding this input, if it spends a lock output
    pub fn cltv_script(&self) -> Option<&ScriptBuf> {
        match self {
            SpendInput::LockedLegacy { redeem_script, .. } => Some(redeem_script),
            SpendInput::LockedSegwit { witness_script, .. } => Some(witness_script),
            _ => None,
        }
    }

    pub fn is_taproot(&self) -> bool {
        matches!(self, SpendInput::Taproot { .. })
    }

    pub fn is_witness(&self) -> bool {
        !matches!(
            self,
            SpendInput::Legacy { .. } | SpendInput::LockedLegacy { .. }
        )
    }

    fn to_psbt_input(&self, vout: u32) -> psbt::Input {
        let mut input = psbt::Input::default();
        match self {
            SpendInput::Legacy { parent_tx } => {
                input.non_witness_utxo = Some(parent_tx.clone());
            }
            SpendInput::LockedLegacy {
                parent_tx,
                redeem_script,
            } => {
                input.non_witness_utxo = Some(parent_tx.clone());
                input.redeem_script = Some(redeem_script.clone());
            }
            SpendInput::Segwit { .. } => {
                input.witness_utxo = self.spent_output(vout);
            }
            SpendInput::WrappedSegwit { redeem_script, .. } => {
                input.witness_utxo = self.spent_output(vout);
                input.redeem_script = Some(redeem_script.clone());
            }
            SpendInput::Taproot { internal_key, .. } => {
                input.witness_utxo = self.spent_output(vout);
                input.tap_internal_key = Some(*internal_key);
            }
            SpendInput::LockedSegwit { witness_script, .. } => {
                input.witness_utxo = self.spent_output(vout);
                input.witness_script = Some(witness_script.clone());
            }
        }
        input
    }

    fn from_psbt_input(index: usize, input: &psbt::Input) -> Result<Self, TransactionError> {
        if let Some(prev) = &input.witness_utxo {
            let prev_script = prev.script_pubkey.clone();
            let value = prev.value;
            if let Some(witness_script) = &input.witness_script {
                return Ok(SpendInput::LockedSegwit {
                    prev_script,
                    value,
                    witness_script: witness_script.clone(),
                });
            }
            if let Some(internal_key) = input.tap_internal_key {
                return Ok(SpendInput::Taproot {
                    prev_script,
                    value,
                    internal_key,
                });
            }
            if let Some(redeem_script) = &input.redeem_script {
                return Ok(SpendInput::WrappedSegwit {
                    prev_script,
                    value,
                    redeem_script: redeem_script.clone(),
                });
            }
            return Ok(SpendInput::Segwit { prev_script, value });
        }

        match (&input.non_witness_utxo, &input.redeem_script) {
            (Some(parent_tx), Some(redeem_script)) => Ok(SpendInput::LockedLegacy {
                parent_tx: parent_tx.clone(),
                redeem_script: redeem_script.clone(),
            }),
            (Some(parent_tx), None) => Ok(SpendInput::Legacy {
                parent_tx: parent_tx.clone(),
            }),
            _ => Err(TransactionError::UnrecognizedInput(index)),
        }
    }
}

// =============================================================================
// Unsigned Transaction
// =============================================================================

/// A fully built, not yet signed transaction with per-input spend data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    tx: Transaction,
    spends: Vec<SpendInput>,
}

impl UnsignedTransaction {
    /// Pair a transaction with its spend data, checking they agree
    pub fn new(tx: Transaction, spends: Vec<SpendInput>) -> Result<Self, TransactionError> {
        if tx.input.len() != spends.len() {
            return Err(TransactionError::InputCountMismatch {
                inputs: tx.input.len(),
                spends: spends.len(),
            });
        }

        for (index, (txin, spend)) in tx.input.iter().zip(&spends).enumerate() {
            if !txin.script_sig.is_empty() || !txin.witness.is_empty() {
                return Err(TransactionError::AlreadySigned(index));
            }
            if let SpendInput::Legacy { parent_tx } | SpendInput::LockedLegacy { parent_tx, .. } =
                spend
            {
                let parent_txid = parent_tx.compute_txid();
                if parent_txid != txin.previous_output.txid {
                    return Err(TransactionError::ParentMismatch(index, parent_txid));
                }
            }
            if spend.spent_output(txin.previous_output.vout).is_none() {
                return Err(TransactionError::MissingPrevout(index));
            }
        }

        Ok(Self { tx, spends })
    }

    /// The unsigned transaction
    pub fn transaction(&self) -> &Transaction {
        &self.tx
    }

    /// Spend data, one entry per input
    pub fn spends(&self) -> &[SpendInput] {
        &self.spends
    }

    /// Inputs paired with their spend data
    pub fn inputs(&self) -> impl Iterator<Item = (&TxIn, &SpendInput)> {
        self.tx.input.iter().zip(self.spends.iter())
    }

    /// The outputs spent by each input, in input order
    pub fn spent_outputs(&self) -> Vec<TxOut> {
        // Checked in `new`: every spend describes its outpoint
        self.inputs()
            .filter_map(|(txin, spend)| spend.spent_output(txin.previous_output.vout))
            .collect()
    }

    /// Total value of the inputs
    pub fn input_value(&self) -> Amount {
        self.spent_outputs().iter().map(|out| out.value).sum()
    }

    /// Total value of the outputs
    pub fn output_value(&self) -> Amount {
        self.tx.output.iter().map(|out| out.value).sum()
    }

    /// Fee paid: inputs minus outputs
    pub fn fee(&self) -> Amount {
        self.input_value()
            .checked_sub(self.output_value())
            .unwrap_or(Amount::ZERO)
    }

    /// Consensus-serialized unsigned transaction as hex
    pub fn unsigned_hex(&self) -> String {
        serialize_hex(&self.tx)
    }

    /// Convert into a PSBT carrying the spend data of every input
    pub fn to_psbt(&self) -> Result<Psbt, TransactionError> {
        let mut psbt = Psbt::from_unsigned_tx(self.tx.clone())?;
        for ((txin, spend), input) in self.inputs().zip(psbt.inputs.iter_mut()) {
            *input = spend.to_psbt_input(txin.previous_output.vout);
        }
        Ok(psbt)
    }

    /// PSBT serialized as hex
    pub fn psbt_hex(&self) -> Result<String, TransactionError> {
        Ok(self.to_psbt()?.serialize_hex())
    }

    /// Rebuild from a PSBT produced by [`UnsignedTransaction::to_psbt`] or a compatible tool
    pub fn from_psbt(psbt: &Psbt) -> Result<Self, TransactionError> {
        let spends = psbt
            .inputs
            .iter()
            .enumerate()
            .map(|(index, input)| SpendInput::from_psbt_input(index, input))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(psbt.unsigned_tx.clone(), spends)
    }

    /// Rebuild from PSBT hex
    pub fn from_psbt_hex(psbt_hex: &str) -> Result<Self, TransactionError> {
        let bytes = hex::decode(psbt_hex.trim())?;
        let psbt = Psbt::deserialize(&bytes)?;
        Self::from_psbt(&psbt)
    }
}

// =============================================================================
// Tests
// =============================================================================
