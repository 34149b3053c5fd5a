//! Crate error type
//!
//! Module errors fold into [`StakingError`] so callers see one taxonomy:
//! bad input, unsupported addresses, malformed scripts or payloads, funding
//! shortfalls, bad signatures and provider failures.

use bitcoin::Amount;
use thiserror::Error;

use crate::builder::coin_select::SelectionError;
use crate::config::ConfigError;
use crate::core::{AddressError, FeeError, PayloadError, ScriptError, TransactionError};
use crate::crypto::KeyError;
use crate::provider::ProviderError;

/// Errors returned by the staking builders and signer
#[derive(Error, Debug)]
pub enum StakingError {
    #[error("Invalid input: {0}")]
    InputValidation(String),
    #[error("Unsupported address: {0}")]
    UnsupportedAddress(#[from] AddressError),
    #[error("Malformed script: {0}")]
    MalformedScript(#[from] ScriptError),
    #[error("Invalid stake metadata: {0}")]
    Payload(#[from] PayloadError),
    #[error("Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Amount, available: Amount },
    #[error("Output value {value} does not cover the signature fee {fee}")]
    InsufficientOutputValue { value: Amount, fee: Amount },
    #[error("Invalid or missing signature on input {0}")]
    InvalidSignature(usize),
    #[error("Chain data provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("Key error: {0}")]
    Key(#[from] KeyError),
    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Signing failed: {0}")]
    Signing(String),
}

impl From<SelectionError> for StakingError {
    fn from(err: SelectionError) -> Self {
        match err {
            SelectionError::InsufficientFunds { needed, available } => {
                StakingError::InsufficientFunds { needed, available }
            }
        }
    }
}

impl From<FeeError> for StakingError {
    fn from(err: FeeError) -> Self {
        StakingError::InputValidation(err.to_string())
    }
}

/// Result alias for staking operations
pub type Result<T> = std::result::Result<T, StakingError>;
