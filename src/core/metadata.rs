//! Stake metadata carried in the OP_RETURN output
//!
//! The payload tells the destination chain who staked, which validator to
//! delegate to, where rewards go and how to rebuild the lock script:
//!
//! ```text
//! offset size field
//!      0    4 magic "SAT+"
//!      4    1 version
//!      5    2 destination chain id (big-endian)
//!      7   20 reward address
//!     27   20 validator address
//!     47    1 fee hint
//!     48    1 flags
//!     49    4 lock time (little-endian)
//!     53   20 script reference
//! ```

use std::fmt;
use std::str::FromStr;

use bitcoin::opcodes::all::OP_RETURN;
use bitcoin::script::{Instruction, PushBytesBuf};
use bitcoin::{Script, ScriptBuf};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::script::{CltvScript, RedeemScriptType};

// =============================================================================
// Constants
// =============================================================================

/// Payload magic
pub const METADATA_MAGIC: [u8; 4] = *b"SAT+";

/// Current payload version
pub const METADATA_VERSION: u8 = 1;

/// Encoded payload length
pub const METADATA_LEN: usize = 73;

/// Standardness limit on OP_RETURN data
pub const MAX_OP_RETURN_DATA: usize = 80;

// =============================================================================
// Errors
// =============================================================================

/// Metadata encoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("Truncated payload: need {need} bytes, got {got}")]
    Truncated { need: usize, got: usize },
    #[error("Bad payload magic: {0}")]
    BadMagic(String),
    #[error("Unsupported payload version: {0}")]
    UnsupportedVersion(u8),
    #[error("Unknown flag bits: {0:#04x}")]
    UnknownFlags(u8),
    #[error("Payload too large: {0} bytes")]
    TooLarge(usize),
    #[error("Script is not an OP_RETURN output")]
    NotOpReturn,
    #[error("Invalid destination address: {0}")]
    InvalidAddress(String),
}

// =============================================================================
// Flags
// =============================================================================

bitflags! {
    /// Flags byte: bit 0 marks a multisig stake, bits 1-2 the script type
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MetadataFlags: u8 {
        const MULTISIG = 0x01;
        const TYPE_PUBKEY = 0x02;
        const TYPE_MULTISIG = 0x04;
    }
}

impl MetadataFlags {
    fn for_stake(script_type: RedeemScriptType, multisig: bool) -> Self {
        let mut flags = match script_type {
            RedeemScriptType::PublicKeyHash => MetadataFlags::empty(),
            RedeemScriptType::PublicKey => MetadataFlags::TYPE_PUBKEY,
            RedeemScriptType::MultiSig => MetadataFlags::TYPE_MULTISIG,
        };
        flags.set(MetadataFlags::MULTISIG, multisig);
        flags
    }

    fn script_type(&self) -> Result<RedeemScriptType, PayloadError> {
        let pubkey = self.contains(MetadataFlags::TYPE_PUBKEY);
        let multisig = self.contains(MetadataFlags::TYPE_MULTISIG);
        match (pubkey, multisig) {
            (false, false) => Ok(RedeemScriptType::PublicKeyHash),
            (true, false) => Ok(RedeemScriptType::PublicKey),
            (false, true) => Ok(RedeemScriptType::MultiSig),
            (true, true) => Err(PayloadError::UnknownFlags(self.bits())),
        }
    }
}

// =============================================================================
// Destination Chain Addresses
// =============================================================================

/// A 20-byte account on the destination chain, written `0x` + 40 hex digits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DestinationAddress(pub [u8; 20]);

impl FromStr for DestinationAddress {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .filter(|digits| digits.len() == 40)
            .ok_or_else(|| PayloadError::InvalidAddress(s.to_string()))?;
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|_| PayloadError::InvalidAddress(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for DestinationAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for DestinationAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DestinationAddress {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Stake Metadata
// =============================================================================

/// Decoded stake metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeMetadata {
    pub chain_id: u16,
    pub reward: DestinationAddress,
    pub validator: DestinationAddress,
    pub fee: u8,
    pub multisig: bool,
    pub script_type: RedeemScriptType,
    pub lock_time: u32,
    pub script_ref: [u8; 20],
}

impl StakeMetadata {
    /// Metadata describing a stake locked under `script`
    pub fn for_script(
        script: &CltvScript,
        chain_id: u16,
        validator: DestinationAddress,
        reward: DestinationAddress,
        fee: u8,
    ) -> Self {
        Self {
            chain_id,
            reward,
            validator,
            fee,
            multisig: script.variant() == RedeemScriptType::MultiSig,
            script_type: script.variant(),
            lock_time: script.lock_time.to_unix(),
            script_ref: script.reference(),
        }
    }

    /// Encode into the fixed 73-byte layout
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(METADATA_LEN);
        out.extend_from_slice(&METADATA_MAGIC);
        out.push(METADATA_VERSION);
        out.extend_from_slice(&self.chain_id.to_be_bytes());
        out.extend_from_slice(&self.reward.0);
        out.extend_from_slice(&self.validator.0);
        out.push(self.fee);
        out.push(MetadataFlags::for_stake(self.script_type, self.multisig).bits());
        out.extend_from_slice(&self.lock_time.to_le_bytes());
        out.extend_from_slice(&self.script_ref);
        out
    }

    /// Decode a payload produced by [`StakeMetadata::encode`]
    pub fn decode(payload: &[u8]) -> Result<Self, PayloadError> {
        if payload.len() < METADATA_LEN {
            return Err(PayloadError::Truncated {
                need: METADATA_LEN,
                got: payload.len(),
            });
        }
        if payload.len() > METADATA_LEN {
            return Err(PayloadError::TooLarge(payload.len()));
        }

        let mut reader = Reader(payload);
        let magic: [u8; 4] = reader.take()?;
        if magic != METADATA_MAGIC {
            return Err(PayloadError::BadMagic(hex::encode(magic)));
        }
        let [version] = reader.take::<1>()?;
        if version != METADATA_VERSION {
            return Err(PayloadError::UnsupportedVersion(version));
        }
        let chain_id = u16::from_be_bytes(reader.take()?);
        let reward = DestinationAddress(reader.take()?);
        let validator = DestinationAddress(reader.take()?);
        let [fee] = reader.take::<1>()?;
        let [flag_bits] = reader.take::<1>()?;
        let flags =
            MetadataFlags::from_bits(flag_bits).ok_or(PayloadError::UnknownFlags(flag_bits))?;
        let lock_time = u32::from_le_bytes(reader.take()?);
        let script_ref = reader.take()?;

        Ok(Self {
            chain_id,
            reward,
            validator,
            fee,
            multisig: flags.contains(MetadataFlags::MULTISIG),
            script_type: flags.script_type()?,
            lock_time,
            script_ref,
        })
    }

    /// Wrap the payload in an `OP_RETURN` output script
    pub fn encode_script(&self) -> Result<ScriptBuf, PayloadError> {
        let payload = self.encode();
        if payload.len() > MAX_OP_RETURN_DATA {
            return Err(PayloadError::TooLarge(payload.len()));
        }
        let push =
            PushBytesBuf::try_from(payload).map_err(|_| PayloadError::TooLarge(METADATA_LEN))?;
        Ok(ScriptBuf::new_op_return(push))
    }

    /// Extract and decode the payload of an `OP_RETURN` output script
    pub fn decode_script(script: &Script) -> Result<Self, PayloadError> {
        let mut instructions = script.instructions();
        match instructions.next() {
            Some(Ok(Instruction::Op(op))) if op == OP_RETURN => {}
            _ => return Err(PayloadError::NotOpReturn),
        }
        match (instructions.next(), instructions.next()) {
            (Some(Ok(Instruction::PushBytes(data))), None) => Self::decode(data.as_bytes()),
            (None, None) => Self::decode(&[]),
            _ => Err(PayloadError::NotOpReturn),
        }
    }
}

/// Cursor over a payload whose total length has already been checked
struct Reader<'a>(&'a [u8]);

impl Reader<'_> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N], PayloadError> {
        if self.0.len() < N {
            return Err(PayloadError::Truncated {
                need: N,
                got: self.0.len(),
            });
        }
        let (head, rest) = self.0.split_at(N);
        self.0 = rest;
        let mut out = [0u8; N];
        out.copy_from_slice(head);
        Ok(out)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::StakeLockTime;
    use bitcoin::secp256k1::{Secp256k1, SecretKey};
    use bitcoin::PublicKey;

    fn sample(script_type: RedeemScriptType) -> StakeMetadata {
        StakeMetadata {
            chain_id: 1115,
            reward: DestinationAddress([0x11; 20]),
            validator: DestinationAddress([0x22; 20]),
            fee: 3,
            multisig: script_type == RedeemScriptType::MultiSig,
            script_type,
            lock_time: 1_700_000_000,
            script_ref: [0x33; 20],
        }
    }

    #[test]
    fn test_layout() {
        let bytes = sample(RedeemScriptType::PublicKey).encode();
        assert_eq!(bytes.len(), METADATA_LEN);
        assert_eq!(&bytes[0..4], b"SAT+");
        assert_eq!(bytes[4], 1);
        assert_eq!(&bytes[5..7], &1115u16.to_be_bytes());
        assert_eq!(&bytes[7..27], &[0x11; 20]);
        assert_eq!(&bytes[27..47], &[0x22; 20]);
        assert_eq!(bytes[47], 3);
        assert_eq!(bytes[48], 0x02);
        assert_eq!(&bytes[49..53], &1_700_000_000u32.to_le_bytes());
        assert_eq!(&bytes[53..73], &[0x33; 20]);
    }

    #[test]
    fn test_round_trip_each_variant() {
        for script_type in [
            RedeemScriptType::PublicKeyHash,
            RedeemScriptType::PublicKey,
            RedeemScriptType::MultiSig,
        ] {
            let metadata = sample(script_type);
            assert_eq!(StakeMetadata::decode(&metadata.encode()).unwrap(), metadata);
        }
    }

    #[test]
    fn test_round_trip_extreme_fields() {
        let zeros = StakeMetadata {
            chain_id: 0,
            reward: DestinationAddress([0; 20]),
            validator: DestinationAddress([0; 20]),
            fee: 0,
            multisig: false,
            script_type: RedeemScriptType::PublicKeyHash,
            lock_time: 0,
            script_ref: [0; 20],
        };
        assert_eq!(StakeMetadata::decode(&zeros.encode()).unwrap(), zeros);

        let ones = StakeMetadata {
            chain_id: u16::MAX,
            reward: DestinationAddress([0xff; 20]),
            validator: DestinationAddress([0xff; 20]),
            fee: u8::MAX,
            multisig: true,
            script_type: RedeemScriptType::MultiSig,
            lock_time: u32::MAX,
            script_ref: [0xff; 20],
        };
        assert_eq!(StakeMetadata::decode(&ones.encode()).unwrap(), ones);
    }

    #[test]
    fn test_truncated_payload() {
        let bytes = sample(RedeemScriptType::PublicKeyHash).encode();
        assert_eq!(
            StakeMetadata::decode(&bytes[..72]),
            Err(PayloadError::Truncated { need: 73, got: 72 })
        );
        assert_eq!(
            StakeMetadata::decode(&[]),
            Err(PayloadError::Truncated { need: 73, got: 0 })
        );
    }

    #[test]
    fn test_rejects_bad_header_and_flags() {
        let mut bytes = sample(RedeemScriptType::PublicKeyHash).encode();
        bytes[0] = b'X';
        assert!(matches!(
            StakeMetadata::decode(&bytes),
            Err(PayloadError::BadMagic(_))
        ));

        let mut bytes = sample(RedeemScriptType::PublicKeyHash).encode();
        bytes[4] = 2;
        assert_eq!(
            StakeMetadata::decode(&bytes),
            Err(PayloadError::UnsupportedVersion(2))
        );

        let mut bytes = sample(RedeemScriptType::PublicKeyHash).encode();
        bytes[48] = 0x80;
        assert_eq!(
            StakeMetadata::decode(&bytes),
            Err(PayloadError::UnknownFlags(0x80))
        );
        bytes[48] = 0x06;
        assert_eq!(
            StakeMetadata::decode(&bytes),
            Err(PayloadError::UnknownFlags(0x06))
        );
    }

    #[test]
    fn test_op_return_script() {
        let metadata = sample(RedeemScriptType::PublicKeyHash);
        let script = metadata.encode_script().unwrap();
        assert!(script.is_op_return());
        assert_eq!(StakeMetadata::decode_script(&script).unwrap(), metadata);
        assert_eq!(
            StakeMetadata::decode_script(&ScriptBuf::new()),
            Err(PayloadError::NotOpReturn)
        );
    }

    #[test]
    fn test_for_script() {
        let secp = Secp256k1::new();
        let secret = SecretKey::from_slice(&[9; 32]).unwrap();
        let pk = PublicKey::new(secret.public_key(&secp));
        let lock_time = StakeLockTime::from_unix(1_700_000_000).unwrap();
        let script = CltvScript::public_key_hash(lock_time, &pk);

        let metadata = StakeMetadata::for_script(
            &script,
            1116,
            DestinationAddress([1; 20]),
            DestinationAddress([2; 20]),
            0,
        );
        assert_eq!(metadata.script_type, RedeemScriptType::PublicKeyHash);
        assert!(!metadata.multisig);
        assert_eq!(metadata.lock_time, 1_700_000_000);
        assert_eq!(metadata.script_ref, script.reference());
    }

    #[test]
    fn test_destination_address() {
        let address: DestinationAddress = "0x000102030405060708090a0b0c0d0e0f10111213"
            .parse()
            .unwrap();
        assert_eq!(address.0[19], 0x13);
        assert_eq!(
            address.to_string(),
            "0x000102030405060708090a0b0c0d0e0f10111213"
        );
        assert!("000102030405060708090a0b0c0d0e0f10111213"
            .parse::<DestinationAddress>()
            .is_err());
        assert!("0x0001".parse::<DestinationAddress>().is_err());
        assert!("0xzz0102030405060708090a0b0c0d0e0f10111213"
            .parse::<DestinationAddress>()
            .is_err());
    }
}
