//! Text parameters for the stake, redeem and sign operations
//!
//! Each `*Args` struct holds the raw strings a command line or JSON caller
//! supplies. Conversion checks required fields and network membership before
//! anything reaches a builder.

use bitcoin::{Address, Amount, ScriptBuf};
use serde::Deserialize;

use crate::builder::{RedeemRequest, StakeRequest};
use crate::config::NetworkConfig;
use crate::core::address::{parse_address, AddressKind};
use crate::core::fee::FeeSpeed;
use crate::core::metadata::DestinationAddress;
use crate::core::script::RedeemScriptType;
use crate::core::transaction::{StakeLockTime, TransactionError, UnsignedTransaction};
use crate::crypto::keys::{public_key_from_hex, StakerKey};
use crate::error::{Result, StakingError};

fn required<'a>(name: &str, value: &'a str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(StakingError::InputValidation(format!(
            "{name} should not be empty"
        )));
    }
    Ok(value)
}

fn optional(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn fee_speed(fee: &Option<String>) -> Result<FeeSpeed> {
    Ok(optional(fee)
        .map(str::parse::<FeeSpeed>)
        .transpose()?
        .unwrap_or_default())
}

fn destination(name: &str, value: &str) -> Result<DestinationAddress> {
    required(name, value)?.parse().map_err(|_| {
        StakingError::InputValidation(format!("{name} should be 0x followed by 40 hex digits"))
    })
}

// =============================================================================
// Stake
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StakeArgs {
    /// Hex public key that will redeem the stake
    pub public_key: String,
    /// Amount in satoshis
    pub amount: String,
    /// Unix timestamp in seconds
    pub lock_time: String,
    pub validator_address: String,
    pub reward_address: String,
    #[serde(default)]
    pub witness: bool,
    /// Funding address type; defaults to native segwit
    #[serde(default)]
    pub address_kind: Option<String>,
    #[serde(default)]
    pub script_type: Option<String>,
    /// `s`, `a`, `f` or a rate in sat/vB; defaults to average
    #[serde(default)]
    pub fee: Option<String>,
}

impl StakeArgs {
    pub fn into_request(self, config: &NetworkConfig) -> Result<StakeRequest> {
        let lock_time: StakeLockTime = required("lockTime", &self.lock_time)?
            .parse()
            .map_err(|e: TransactionError| StakingError::InputValidation(e.to_string()))?;
        let public_key = public_key_from_hex(required("publicKey", &self.public_key)?)?;

        let amount = required("amount", &self.amount)?
            .parse()
            .map(Amount::from_sat)
            .map_err(|_| {
                StakingError::InputValidation(format!("invalid amount {}", self.amount))
            })?;
        if amount == Amount::ZERO {
            return Err(StakingError::InputValidation(
                "amount should be greater than 0".to_string(),
            ));
        }
        if amount > Amount::MAX_MONEY {
            return Err(StakingError::InputValidation(format!(
                "amount should not exceed {}",
                Amount::MAX_MONEY.to_sat()
            )));
        }

        let validator = destination("validatorAddress", &self.validator_address)?;
        let reward = destination("rewardAddress", &self.reward_address)?;

        let address_kind = optional(&self.address_kind)
            .map(str::parse::<AddressKind>)
            .transpose()?
            .unwrap_or_default();
        // The funding address must be derivable on this network
        address_kind.derive(&public_key, config.bitcoin_network)?;
        let script_type = optional(&self.script_type)
            .map(str::parse::<RedeemScriptType>)
            .transpose()?
            .unwrap_or_default();

        Ok(StakeRequest {
            public_key,
            amount,
            lock_time,
            validator,
            reward,
            witness: self.witness,
            address_kind,
            script_type,
            fee: fee_speed(&self.fee)?,
        })
    }
}

// =============================================================================
// Redeem
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedeemArgs {
    /// The P2SH or P2WSH lock address
    pub account: String,
    /// Hex redeem script returned by the stake
    pub redeem_script: String,
    pub destination_address: String,
    #[serde(default)]
    pub fee: Option<String>,
}

impl RedeemArgs {
    pub fn into_request(self, config: &NetworkConfig) -> Result<RedeemRequest> {
        let network = config.bitcoin_network;
        let account = parse_address(required("account", &self.account)?, network)?;
        let script_hex = required("redeemScript", &self.redeem_script)?;
        let redeem_script = ScriptBuf::from_hex(script_hex).map_err(|_| {
            StakingError::InputValidation(format!("redeemScript is not valid hex: {script_hex}"))
        })?;
        let destination = parse_address(
            required("destAddress", &self.destination_address)?,
            network,
        )?;

        Ok(RedeemRequest {
            account,
            redeem_script,
            destination,
            fee: fee_speed(&self.fee)?,
        })
    }
}

// =============================================================================
// Sign
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignArgs {
    /// PSBT hex produced by a builder
    pub transaction: String,
    /// Address whose inputs are signed: a wallet address or a lock address
    pub account: String,
    /// WIF private key
    pub private_key: String,
}

/// Everything the signer needs, decoded
#[derive(Debug, Clone)]
pub struct SignRequest {
    pub unsigned: UnsignedTransaction,
    pub key: StakerKey,
    pub account: Address,
}

impl SignArgs {
    pub fn into_request(self, config: &NetworkConfig) -> Result<SignRequest> {
        let network = config.bitcoin_network;
        let unsigned =
            UnsignedTransaction::from_psbt_hex(required("transaction", &self.transaction)?)?;
        let account = parse_address(required("account", &self.account)?, network)?;
        let key = StakerKey::from_wif(required("privateKey", &self.private_key)?, network)?;
        Ok(SignRequest {
            unsigned,
            key,
            account,
        })
    }
}
