//! Network configuration
//!
//! One [`NetworkConfig`] value names the Bitcoin network stakes are built on
//! and the destination chain that consumes the stake metadata. It is resolved
//! once and handed to both builders.

use std::fs;
use std::path::Path;

use bitcoin::Network;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// The chain credited with the stake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationChain {
    Mainnet,
    Testnet,
    Devnet,
    Custom { chain_id: u16 },
}

impl DestinationChain {
    /// Chain id written into the stake metadata
    pub fn chain_id(&self) -> u16 {
        match self {
            DestinationChain::Mainnet => 1116,
            DestinationChain::Testnet => 1115,
            DestinationChain::Devnet => 1112,
            DestinationChain::Custom { chain_id } => *chain_id,
        }
    }
}

/// Networks a stake is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Bitcoin network addresses and keys must belong to
    pub bitcoin_network: Network,
    pub destination: DestinationChain,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self::testnet()
    }
}

impl NetworkConfig {
    /// Bitcoin mainnet staking to the destination mainnet
    pub fn mainnet() -> Self {
        Self {
            bitcoin_network: Network::Bitcoin,
            destination: DestinationChain::Mainnet,
        }
    }

    /// Bitcoin testnet staking to the destination testnet
    pub fn testnet() -> Self {
        Self {
            bitcoin_network: Network::Testnet,
            destination: DestinationChain::Testnet,
        }
    }

    pub fn chain_id(&self) -> u16 {
        self.destination.chain_id()
    }

    /// Parse from a JSON document
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Save to a JSON file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
