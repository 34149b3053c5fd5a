//! btc-staking: self-custody BTC staking transactions in Rust
//!
//! This crate builds, signs and finalizes the Bitcoin transactions used to
//! stake BTC to a destination chain validator:
//! - Stake transactions locking funds under a CLTV script (P2SH or P2WSH)
//!   with an OP_RETURN output carrying the stake metadata
//! - Redeem transactions sweeping a matured lock back to any address
//! - Pubkey hash, pubkey and multisig lock scripts
//! - Funding from P2PKH, P2WPKH, P2SH-P2WPKH and P2TR addresses
//! - Weight-based fee estimation with coin selection
//! - PSBT interchange between the build and sign steps
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use btc_staking::{
//!     NetworkConfig, SnapshotProvider, StakeArgs, StakeTransactionBuilder, StakerKey,
//!     TransactionSigner,
//! };
//!
//! let config = NetworkConfig::testnet();
//! let key = StakerKey::from_wif(wif, config.bitcoin_network)?;
//! let request = StakeArgs {
//!     public_key: key.public_key_hex(),
//!     amount: "100000".into(),
//!     lock_time: "1711983981".into(),
//!     validator_address: validator.into(),
//!     reward_address: reward.into(),
//!     ..Default::default()
//! }
//! .into_request(&config)?;
//!
//! let provider = Arc::new(SnapshotProvider::from_json_str(&snapshot)?);
//! let stake = StakeTransactionBuilder::new(config.clone(), provider)
//!     .build(&request)
//!     .await?;
//! println!("Lock address: {}", stake.lock_address);
//! println!("Redeem script: {}", stake.redeem_script_hex());
//!
//! let account = key.address(request.address_kind, config.bitcoin_network)?;
//! let signer = TransactionSigner::new();
//! let signed = signer.sign(stake.unsigned, &key, &account)?;
//! let finalized = signer.finalize(signed, &key.public_key())?;
//! println!("{}", finalized.to_hex());
//! ```

pub mod builder;
pub mod config;
pub mod core;
pub mod crypto;
pub mod error;
pub mod params;
pub mod provider;
pub mod signer;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-export commonly used types
pub use builder::{
    AccumulativeSelector, CoinSelector, RedeemRequest, RedeemTransaction,
    RedeemTransactionBuilder, StakeRequest, StakeTransaction, StakeTransactionBuilder,
};
pub use config::{DestinationChain, NetworkConfig};
pub use core::{
    AddressKind, CltvScript, DestinationAddress, FeeRate, FeeSpeed, RedeemScriptType,
    StakeLockTime, StakeMetadata, UnsignedTransaction, Utxo,
};
pub use crypto::StakerKey;
pub use error::{Result, StakingError};
pub use params::{RedeemArgs, SignArgs, SignRequest, StakeArgs};
pub use provider::{ChainDataProvider, ProviderError, SnapshotProvider};
pub use signer::{FinalizedTransaction, SignedTransaction, TransactionSigner};
