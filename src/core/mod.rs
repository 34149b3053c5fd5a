//! Core staking components
//!
//! This module contains the building blocks the builders and signer share:
//! - Address classification and raw decoding
//! - CLTV lock scripts (pubkey hash, pubkey, multisig)
//! - Stake metadata carried in the OP_RETURN output
//! - Fee rates and weight estimation
//! - Unsigned transactions with per-input spend data and PSBT interchange

pub mod address;
pub mod fee;
pub mod metadata;
pub mod script;
pub mod transaction;

pub use address::{
    classify, decode as decode_address, parse_address, AddressEncoding, AddressError,
    AddressKind, AddressPrefix, DecodedAddress,
};
pub use fee::{FeeError, FeeEstimates, FeeRate, FeeSpeed, MAX_FEE_RATE, MIN_FEE_RATE};
pub use metadata::{
    DestinationAddress, MetadataFlags, PayloadError, StakeMetadata, METADATA_LEN, METADATA_MAGIC,
    METADATA_VERSION,
};
pub use script::{
    CltvScript, LockCondition, RedeemScriptType, ScriptError, UnlockingData, MAX_MULTISIG_KEYS,
};
pub use transaction::{
    SpendInput, StakeLockTime, TransactionError, UnsignedTransaction, Utxo, LOCKTIME_THRESHOLD,
    SEQUENCE_LOCKTIME_ENABLED,
};
