//! Address classification
//!
//! Maps address strings onto the four wallet address families the staking
//! tool can spend from, and exposes the raw decoding used to tell legacy
//! (base58check) from witness (bech32) encodings.

use std::fmt;
use std::str::FromStr;

use bitcoin::bech32::segwit;
use bitcoin::key::CompressedPublicKey;
use bitcoin::secp256k1::Secp256k1;
use bitcoin::{Address, AddressType, Network, NetworkKind, PublicKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::fee::{
    P2PKH_INPUT_WEIGHT, P2SH_P2WPKH_INPUT_WEIGHT, P2TR_INPUT_WEIGHT, P2WPKH_INPUT_WEIGHT,
};

// =============================================================================
// Address Errors
// =============================================================================

/// Address-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid address {0}: {1}")]
    Invalid(String, String),
    #[error("Unsupported address type: {0}")]
    Unsupported(String),
    #[error("Address {address} is not valid for network {network}")]
    WrongNetwork { address: String, network: Network },
    #[error("Witness address requires a compressed public key")]
    UncompressedKey,
}

// =============================================================================
// Address Kinds
// =============================================================================

/// The wallet address families a staker can fund a stake from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressKind {
    /// Pay to Public Key Hash (legacy, base58)
    P2pkh,
    /// Pay to Witness Public Key Hash (native segwit v0)
    P2wpkh,
    /// P2WPKH wrapped in P2SH
    P2shP2wpkh,
    /// Pay to Taproot, key path only
    P2tr,
}

impl Default for AddressKind {
    fn default() -> Self {
        AddressKind::P2wpkh
    }
}

impl AddressKind {
    /// Whether inputs of this kind carry a witness
    pub fn is_witness(&self) -> bool {
        !matches!(self, AddressKind::P2pkh)
    }

    /// Estimated weight of one signed input of this kind, in weight units
    pub fn input_weight(&self) -> u64 {
        match self {
            AddressKind::P2pkh => P2PKH_INPUT_WEIGHT,
            AddressKind::P2wpkh => P2WPKH_INPUT_WEIGHT,
            AddressKind::P2shP2wpkh => P2SH_P2WPKH_INPUT_WEIGHT,
            AddressKind::P2tr => P2TR_INPUT_WEIGHT,
        }
    }

    /// Derive the address of this kind controlled by `public_key`
    ///
    /// Taproot addresses commit to the x-only key with no script tree.
    pub fn derive(
        &self,
        public_key: &PublicKey,
        network: Network,
    ) -> Result<Address, AddressError> {
        let address = match self {
            AddressKind::P2pkh => Address::p2pkh(public_key.pubkey_hash(), network),
            AddressKind::P2wpkh => Address::p2wpkh(&compressed(public_key)?, network),
            AddressKind::P2shP2wpkh => Address::p2shwpkh(&compressed(public_key)?, network),
            AddressKind::P2tr => {
                let secp = Secp256k1::verification_only();
                let internal_key = compressed(public_key)?.0.x_only_public_key().0;
                Address::p2tr(&secp, internal_key, None, network)
            }
        };
        Ok(address)
    }
}

impl fmt::Display for AddressKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AddressKind::P2pkh => "p2pkh",
            AddressKind::P2wpkh => "p2wpkh",
            AddressKind::P2shP2wpkh => "p2sh-p2wpkh",
            AddressKind::P2tr => "p2tr",
        };
        f.write_str(name)
    }
}

impl FromStr for AddressKind {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "p2pkh" | "legacy" => Ok(AddressKind::P2pkh),
            "p2wpkh" | "segwit" => Ok(AddressKind::P2wpkh),
            "p2sh-p2wpkh" | "p2shp2wpkh" | "wrapped-segwit" => Ok(AddressKind::P2shP2wpkh),
            "p2tr" | "taproot" => Ok(AddressKind::P2tr),
            other => Err(AddressError::Unsupported(other.to_string())),
        }
    }
}

fn compressed(public_key: &PublicKey) -> Result<CompressedPublicKey, AddressError> {
    CompressedPublicKey::try_from(*public_key).map_err(|_| AddressError::UncompressedKey)
}

/// Classify `address` into one of the four wallet address families
///
/// P2SH addresses are assumed to wrap a P2WPKH program, the only P2SH form a
/// staker wallet address takes here.
pub fn classify(address: &str, network: Network) -> Result<AddressKind, AddressError> {
    let address = parse_address(address, network)?;
    match address.address_type() {
        Some(AddressType::P2pkh) => Ok(AddressKind::P2pkh),
        Some(AddressType::P2wpkh) => Ok(AddressKind::P2wpkh),
        Some(AddressType::P2sh) => Ok(AddressKind::P2shP2wpkh),
        Some(AddressType::P2tr) => Ok(AddressKind::P2tr),
        Some(other) => Err(AddressError::Unsupported(other.to_string())),
        None => Err(AddressError::Unsupported(address.to_string())),
    }
}

/// Parse an address string and check it belongs to `network`
pub fn parse_address(address: &str, network: Network) -> Result<Address, AddressError> {
    let unchecked = Address::from_str(address)
        .map_err(|e| AddressError::Invalid(address.to_string(), e.to_string()))?;
    unchecked
        .require_network(network)
        .map_err(|_| AddressError::WrongNetwork {
            address: address.to_string(),
            network,
        })
}

// =============================================================================
// Raw Decoding
// =============================================================================

/// How an address string is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressEncoding {
    /// Legacy base58 with a 4-byte double-SHA256 checksum
    Base58Check,
    /// Segwit bech32 / bech32m
    Bech32,
}

/// The network-identifying part of an address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressPrefix {
    /// Base58 version byte
    Version(u8),
    /// Bech32 human readable part and witness version
    Hrp { hrp: String, witness_version: u8 },
}

/// A decoded address: encoding, prefix and raw payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAddress {
    pub encoding: AddressEncoding,
    pub prefix: AddressPrefix,
    pub payload: Vec<u8>,
}

impl DecodedAddress {
    /// Whether the address is a witness (bech32) address
    pub fn is_witness(&self) -> bool {
        self.encoding == AddressEncoding::Bech32
    }

    /// Infer mainnet vs testnet from the prefix
    pub fn network_kind(&self) -> Result<NetworkKind, AddressError> {
        match &self.prefix {
            AddressPrefix::Version(0x00) | AddressPrefix::Version(0x05) => Ok(NetworkKind::Main),
            AddressPrefix::Version(0x6f) | AddressPrefix::Version(0xc4) => Ok(NetworkKind::Test),
            AddressPrefix::Hrp { hrp, .. } => match hrp.as_str() {
                "bc" => Ok(NetworkKind::Main),
                "tb" | "bcrt" => Ok(NetworkKind::Test),
                other => Err(AddressError::Unsupported(format!("hrp {other}"))),
            },
            AddressPrefix::Version(v) => {
                Err(AddressError::Unsupported(format!("version byte {v:#04x}")))
            }
        }
    }
}

/// Decode an address into its encoding, prefix and payload
pub fn decode(address: &str) -> Result<DecodedAddress, AddressError> {
    if let Ok((hrp, version, program)) = segwit::decode(address) {
        return Ok(DecodedAddress {
            encoding: AddressEncoding::Bech32,
            prefix: AddressPrefix::Hrp {
                hrp: hrp.to_lowercase(),
                witness_version: version.to_u8(),
            },
            payload: program,
        });
    }

    let bytes = bs58::decode(address)
        .with_check(None)
        .into_vec()
        .map_err(|e| AddressError::Invalid(address.to_string(), e.to_string()))?;
    match bytes.split_first() {
        Some((version, payload)) if payload.len() == 20 => Ok(DecodedAddress {
            encoding: AddressEncoding::Base58Check,
            prefix: AddressPrefix::Version(*version),
            payload: payload.to_vec(),
        }),
        _ => Err(AddressError::Invalid(
            address.to_string(),
            "unexpected payload length".to_string(),
        )),
    }
}

// =============================================================================
// Tests
// =============================================================================
