//! Staker key handling
//!
//! Decodes the private key a caller supplies (WIF or raw hex), derives the
//! staker's wallet and lock addresses, and produces the tweaked key used for
//! taproot key path signing.

use bitcoin::{Address, Network, NetworkKind, PrivateKey, PublicKey};
use secp256k1::{Keypair, Scalar, Secp256k1, SecretKey, Signing, Verification, XOnlyPublicKey};
use thiserror::Error;

use super::hash::tagged_hash;
use crate::core::address::{AddressError, AddressKind};
use crate::core::script::{CltvScript, ScriptError};
use crate::core::transaction::StakeLockTime;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Key is for {found:?} but {expected:?} was requested")]
    WrongNetwork {
        expected: NetworkKind,
        found: NetworkKind,
    },
    #[error("Taproot tweak failed")]
    Tweak,
    #[error("Address derivation failed: {0}")]
    Address(#[from] AddressError),
    #[error("Lock script derivation failed: {0}")]
    Script(#[from] ScriptError),
}

/// A staker's private key and its public key
#[derive(Clone)]
pub struct StakerKey {
    private: PrivateKey,
    public: PublicKey,
}

impl StakerKey {
    /// Generate a new random compressed key
    pub fn generate(network: Network) -> Self {
        let secp = Secp256k1::new();
        let (secret_key, _) = secp.generate_keypair(&mut secp256k1::rand::thread_rng());
        Self::from_secret_key(secret_key, network)
    }

    /// Create from an existing secret key (compressed public key)
    pub fn from_secret_key(secret_key: SecretKey, network: Network) -> Self {
        Self::from_private_key(PrivateKey::new(secret_key, network))
    }

    fn from_private_key(private: PrivateKey) -> Self {
        let secp = Secp256k1::signing_only();
        let public = private.public_key(&secp);
        Self { private, public }
    }

    /// Decode a WIF private key, checking it belongs to `network`
    pub fn from_wif(wif: &str, network: Network) -> Result<Self, KeyError> {
        let private = PrivateKey::from_wif(wif.trim()).map_err(|_| KeyError::InvalidPrivateKey)?;
        let expected = NetworkKind::from(network);
        if private.network != expected {
            return Err(KeyError::WrongNetwork {
                expected,
                found: private.network,
            });
        }
        Ok(Self::from_private_key(private))
    }

    /// Create from a hex-encoded 32-byte secret
    pub fn from_private_key_hex(hex_key: &str, network: Network) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key.trim()).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key =
            SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key, network))
    }

    /// Encode as WIF
    pub fn to_wif(&self) -> String {
        self.private.to_wif()
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.private.inner
    }

    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    /// Get the public key as a hex string (compressed unless the WIF said otherwise)
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public.to_bytes())
    }

    /// Untweaked x-only key, the taproot internal key
    pub fn x_only_public_key(&self) -> XOnlyPublicKey {
        self.public.inner.x_only_public_key().0
    }

    /// Wallet address of the given kind
    pub fn address(&self, kind: AddressKind, network: Network) -> Result<Address, KeyError> {
        Ok(kind.derive(&self.public, network)?)
    }

    /// The lock address and pubkey-hash CLTV script for a stake until `lock_time`
    pub fn stake_account(
        &self,
        lock_time: StakeLockTime,
        witness: bool,
        network: Network,
    ) -> Result<(Address, CltvScript), KeyError> {
        let script = CltvScript::public_key_hash(lock_time, &self.public);
        if witness && !self.public.compressed {
            return Err(ScriptError::UncompressedKey.into());
        }
        let address = script.lock_address(witness, network)?;
        Ok((address, script))
    }

    /// Keypair tweaked by `TaggedHash("TapTweak", internal_key)` with no script tree
    pub fn tweaked_keypair<C: Signing + Verification>(
        &self,
        secp: &Secp256k1<C>,
    ) -> Result<Keypair, KeyError> {
        let keypair = Keypair::from_secret_key(secp, &self.private.inner);
        let (internal_key, _) = keypair.x_only_public_key();
        let tweak = tagged_hash("TapTweak", &internal_key.serialize());
        let scalar = Scalar::from_be_bytes(tweak).map_err(|_| KeyError::Tweak)?;
        keypair
            .add_xonly_tweak(secp, &scalar)
            .map_err(|_| KeyError::Tweak)
    }
}

impl std::fmt::Debug for StakerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StakerKey")
            .field("public", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

/// Parse a public key from hex string
pub fn public_key_from_hex(hex_key: &str) -> Result<PublicKey, KeyError> {
    let bytes = hex::decode(hex_key.trim()).map_err(|_| KeyError::InvalidPublicKey)?;
    PublicKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPublicKey)
}
