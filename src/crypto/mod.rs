//! Cryptographic utilities
//!
//! This module provides:
//! - SHA-256, HASH160 and BIP-340 tagged hashes
//! - Staker key decoding, address derivation and the taproot tweak

pub mod hash;
pub mod keys;

pub use hash::{hash160, sha256, tagged_hash};
pub use keys::{public_key_from_hex, KeyError, StakerKey};
