//! CLTV lock scripts
//!
//! A stake is locked under one of three fixed redeem script templates, each
//! starting with `<lock_time> OP_CHECKLOCKTIMEVERIFY OP_DROP`:
//!
//! - pubkey hash: `OP_DUP OP_HASH160 <hash160(pk)> OP_EQUALVERIFY OP_CHECKSIG`
//! - pubkey: `<pk> OP_CHECKSIG`
//! - multisig: `OP_m <pk>... OP_n OP_CHECKMULTISIG`
//!
//! The script is wrapped in P2SH for legacy stakes and P2WSH for witness stakes.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use bitcoin::hashes::Hash;
use bitcoin::opcodes::all::{
    OP_CHECKMULTISIG, OP_CHECKSIG, OP_CLTV, OP_DROP, OP_DUP, OP_EQUALVERIFY, OP_HASH160,
    OP_PUSHNUM_1, OP_PUSHNUM_16,
};
use bitcoin::opcodes::Opcode;
use bitcoin::script::{Builder, Instruction, PushBytesBuf};
use bitcoin::{ecdsa, Address, Network, PubkeyHash, PublicKey, Script, ScriptBuf, Witness};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::transaction::{StakeLockTime, LOCKTIME_THRESHOLD};
use crate::crypto::hash::hash160;

// =============================================================================
// Script Constants
// =============================================================================

/// Maximum number of keys in a multisig lock
pub const MAX_MULTISIG_KEYS: usize = 15;

/// Longest script number accepted for a lock time
const MAX_LOCK_TIME_NUM_LEN: usize = 5;

// =============================================================================
// Script Errors
// =============================================================================

/// Script-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("Script does not start with <locktime> OP_CHECKLOCKTIMEVERIFY OP_DROP")]
    MissingCltv,
    #[error("Unrecognized lock script template")]
    UnrecognizedTemplate,
    #[error("Lock time {0} is not a timestamp")]
    LockTime(i64),
    #[error("Non-minimal encoding in lock script")]
    NonMinimal,
    #[error("Invalid public key: {0}")]
    InvalidKey(String),
    #[error("Witness scripts require compressed public keys")]
    UncompressedKey,
    #[error("Invalid multisig threshold: {threshold} of {keys}")]
    Threshold { threshold: usize, keys: usize },
    #[error("Duplicate public key in multisig script")]
    DuplicateKey,
    #[error("Not enough signatures: need {need}, have {have}")]
    MissingSignatures { need: usize, have: usize },
    #[error("Script too large: {0} bytes")]
    TooLarge(usize),
    #[error("Script decoding failed: {0}")]
    Decode(String),
}

// =============================================================================
// Script Types
// =============================================================================

/// The three redeem script templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RedeemScriptType {
    PublicKeyHash,
    PublicKey,
    MultiSig,
}

impl Default for RedeemScriptType {
    fn default() -> Self {
        RedeemScriptType::PublicKeyHash
    }
}

impl fmt::Display for RedeemScriptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RedeemScriptType::PublicKeyHash => "pkh",
            RedeemScriptType::PublicKey => "pk",
            RedeemScriptType::MultiSig => "multisig",
        };
        f.write_str(name)
    }
}

impl FromStr for RedeemScriptType {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pkh" | "public-key-hash" => Ok(RedeemScriptType::PublicKeyHash),
            "pk" | "public-key" => Ok(RedeemScriptType::PublicKey),
            "multisig" | "multi-sig" => Ok(RedeemScriptType::MultiSig),
            _ => Err(ScriptError::UnrecognizedTemplate),
        }
    }
}

/// What must be satisfied once the lock time has passed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockCondition {
    PublicKeyHash(PubkeyHash),
    PublicKey(PublicKey),
    MultiSig { threshold: usize, keys: Vec<PublicKey> },
}

/// Unlocking data for a CLTV input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlockingData {
    /// Legacy scriptSig: the signature pushes followed by the redeem script
    ScriptSig(ScriptBuf),
    /// Witness stack: the signature items followed by the witness script
    Witness(Witness),
}

// =============================================================================
// CLTV Script
// =============================================================================

/// A parsed or constructed CLTV redeem script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CltvScript {
    pub lock_time: StakeLockTime,
    pub condition: LockCondition,
}

impl CltvScript {
    /// Lock to the hash of `public_key`
    pub fn public_key_hash(lock_time: StakeLockTime, public_key: &PublicKey) -> Self {
        Self {
            lock_time,
            condition: LockCondition::PublicKeyHash(public_key.pubkey_hash()),
        }
    }

    /// Lock to `public_key` directly
    pub fn public_key(lock_time: StakeLockTime, public_key: PublicKey) -> Self {
        Self {
            lock_time,
            condition: LockCondition::PublicKey(public_key),
        }
    }

    /// Lock to `threshold` of `keys`; keys are sorted by their serialization
    pub fn multisig(
        lock_time: StakeLockTime,
        threshold: usize,
        mut keys: Vec<PublicKey>,
    ) -> Result<Self, ScriptError> {
        keys.sort_by_key(|key| key.to_bytes());
        check_multisig(threshold, &keys)?;
        Ok(Self {
            lock_time,
            condition: LockCondition::MultiSig { threshold, keys },
        })
    }

    /// Which template this script uses
    pub fn variant(&self) -> RedeemScriptType {
        match self.condition {
            LockCondition::PublicKeyHash(_) => RedeemScriptType::PublicKeyHash,
            LockCondition::PublicKey(_) => RedeemScriptType::PublicKey,
            LockCondition::MultiSig { .. } => RedeemScriptType::MultiSig,
        }
    }

    /// Number of signatures needed to unlock
    pub fn threshold(&self) -> usize {
        match &self.condition {
            LockCondition::MultiSig { threshold, .. } => *threshold,
            _ => 1,
        }
    }

    /// Whether a signature by `public_key` counts towards unlocking
    pub fn accepts_signer(&self, public_key: &PublicKey) -> bool {
        match &self.condition {
            LockCondition::PublicKeyHash(hash) => public_key.pubkey_hash() == *hash,
            LockCondition::PublicKey(key) => key == public_key,
            LockCondition::MultiSig { keys, .. } => keys.contains(public_key),
        }
    }

    /// Serialize the redeem script
    pub fn to_script(&self) -> ScriptBuf {
        let builder = Builder::new()
            .push_lock_time(self.lock_time.to_absolute())
            .push_opcode(OP_CLTV)
            .push_opcode(OP_DROP);

        match &self.condition {
            LockCondition::PublicKeyHash(hash) => builder
                .push_opcode(OP_DUP)
                .push_opcode(OP_HASH160)
                .push_slice(hash.to_byte_array())
                .push_opcode(OP_EQUALVERIFY)
                .push_opcode(OP_CHECKSIG),
            LockCondition::PublicKey(key) => builder.push_key(key).push_opcode(OP_CHECKSIG),
            LockCondition::MultiSig { threshold, keys } => keys
                .iter()
                .fold(builder.push_int(*threshold as i64), |builder, key| {
                    builder.push_key(key)
                })
                .push_int(keys.len() as i64)
                .push_opcode(OP_CHECKMULTISIG),
        }
        .into_script()
    }

    /// Parse a redeem script
    ///
    /// The script must re-serialize to exactly the same bytes. Witness
    /// scripts may only contain compressed keys.
    pub fn parse(script: &Script, is_witness: bool) -> Result<Self, ScriptError> {
        let instructions = script
            .instructions()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ScriptError::Decode(e.to_string()))?;

        let (lock_push, tail) = match instructions.as_slice() {
            [Instruction::PushBytes(lock), cltv, drop, tail @ ..]
                if is_op(cltv, OP_CLTV) && is_op(drop, OP_DROP) =>
            {
                (lock.as_bytes(), tail)
            }
            _ => return Err(ScriptError::MissingCltv),
        };

        let lock_value = decode_script_num(lock_push)?;
        let lock_time = u32::try_from(lock_value)
            .ok()
            .filter(|value| *value > LOCKTIME_THRESHOLD)
            .and_then(|value| StakeLockTime::from_unix(value).ok())
            .ok_or(ScriptError::LockTime(lock_value))?;

        let condition = parse_condition(tail)?;
        let parsed = Self {
            lock_time,
            condition,
        };

        if parsed.to_script().as_bytes() != script.as_bytes() {
            return Err(ScriptError::NonMinimal);
        }
        if is_witness {
            parsed.ensure_witness_compatible()?;
        }
        Ok(parsed)
    }

    /// Reject keys that cannot appear in a witness script
    pub fn ensure_witness_compatible(&self) -> Result<(), ScriptError> {
        let compressed = match &self.condition {
            LockCondition::PublicKeyHash(_) => true,
            LockCondition::PublicKey(key) => key.compressed,
            LockCondition::MultiSig { keys, .. } => keys.iter().all(|key| key.compressed),
        };
        if compressed {
            Ok(())
        } else {
            Err(ScriptError::UncompressedKey)
        }
    }

    /// 20-byte reference to this script carried in stake metadata
    ///
    /// The pubkey hash for pubkey-hash scripts, HASH160 of the script otherwise.
    pub fn reference(&self) -> [u8; 20] {
        match &self.condition {
            LockCondition::PublicKeyHash(hash) => hash.to_byte_array(),
            _ => hash160(self.to_script().as_bytes()),
        }
    }

    /// Output script of the lock: P2WSH when `witness`, P2SH otherwise
    pub fn lock_script(&self, witness: bool) -> ScriptBuf {
        let script = self.to_script();
        if witness {
            ScriptBuf::new_p2wsh(&script.wscript_hash())
        } else {
            ScriptBuf::new_p2sh(&script.script_hash())
        }
    }

    /// Address of the lock output
    pub fn lock_address(&self, witness: bool, network: Network) -> Result<Address, ScriptError> {
        let script = self.to_script();
        if witness {
            Ok(Address::p2wsh(&script, network))
        } else {
            Address::p2sh(&script, network).map_err(|_| ScriptError::TooLarge(script.len()))
        }
    }

    /// Build the unlocking data from collected signatures
    ///
    /// Multisig signatures are placed in script key order after the leading
    /// empty element consumed by OP_CHECKMULTISIG.
    pub fn unlocking_data(
        &self,
        signatures: &BTreeMap<PublicKey, ecdsa::Signature>,
        witness: bool,
    ) -> Result<UnlockingData, ScriptError> {
        let items: Vec<Vec<u8>> = match &self.condition {
            LockCondition::PublicKeyHash(hash) => {
                let (key, sig) = signatures
                    .iter()
                    .find(|(key, _)| key.pubkey_hash() == *hash)
                    .ok_or(ScriptError::MissingSignatures { need: 1, have: 0 })?;
                vec![sig.to_vec(), key.to_bytes()]
            }
            LockCondition::PublicKey(key) => {
                let sig = signatures
                    .get(key)
                    .ok_or(ScriptError::MissingSignatures { need: 1, have: 0 })?;
                vec![sig.to_vec()]
            }
            LockCondition::MultiSig { threshold, keys } => {
                let sigs: Vec<Vec<u8>> = keys
                    .iter()
                    .filter_map(|key| signatures.get(key))
                    .take(*threshold)
                    .map(|sig| sig.to_vec())
                    .collect();
                if sigs.len() < *threshold {
                    return Err(ScriptError::MissingSignatures {
                        need: *threshold,
                        have: sigs.len(),
                    });
                }
                std::iter::once(Vec::new()).chain(sigs).collect()
            }
        };

        let script = self.to_script();
        if witness {
            let mut stack = Witness::new();
            for item in &items {
                stack.push(item);
            }
            stack.push(script.as_bytes());
            return Ok(UnlockingData::Witness(stack));
        }

        let mut builder = Builder::new();
        for item in items.into_iter().chain(std::iter::once(script.into_bytes())) {
            let push =
                PushBytesBuf::try_from(item).map_err(|e| ScriptError::Decode(e.to_string()))?;
            builder = builder.push_slice(push);
        }
        Ok(UnlockingData::ScriptSig(builder.into_script()))
    }
}

fn check_multisig(threshold: usize, keys: &[PublicKey]) -> Result<(), ScriptError> {
    if threshold == 0 || threshold > keys.len() || keys.len() > MAX_MULTISIG_KEYS {
        return Err(ScriptError::Threshold {
            threshold,
            keys: keys.len(),
        });
    }
    for (i, key) in keys.iter().enumerate() {
        if keys[i + 1..].contains(key) {
            return Err(ScriptError::DuplicateKey);
        }
    }
    Ok(())
}

fn is_op(instruction: &Instruction<'_>, op: Opcode) -> bool {
    matches!(instruction, Instruction::Op(found) if *found == op)
}

/// Small integer encoded by OP_1..OP_16
fn small_int(instruction: &Instruction<'_>) -> Option<usize> {
    match instruction {
        Instruction::Op(op)
            if (OP_PUSHNUM_1.to_u8()..=OP_PUSHNUM_16.to_u8()).contains(&op.to_u8()) =>
        {
            Some(usize::from(op.to_u8() - OP_PUSHNUM_1.to_u8()) + 1)
        }
        _ => None,
    }
}

fn parse_key(bytes: &[u8]) -> Result<PublicKey, ScriptError> {
    PublicKey::from_slice(bytes).map_err(|e| ScriptError::InvalidKey(e.to_string()))
}

fn parse_condition(tail: &[Instruction<'_>]) -> Result<LockCondition, ScriptError> {
    match tail {
        [dup, hash160_op, Instruction::PushBytes(hash), equal_verify, checksig]
            if is_op(dup, OP_DUP)
                && is_op(hash160_op, OP_HASH160)
                && is_op(equal_verify, OP_EQUALVERIFY)
                && is_op(checksig, OP_CHECKSIG) =>
        {
            let hash = PubkeyHash::from_slice(hash.as_bytes())
                .map_err(|_| ScriptError::UnrecognizedTemplate)?;
            Ok(LockCondition::PublicKeyHash(hash))
        }
        [Instruction::PushBytes(key), checksig] if is_op(checksig, OP_CHECKSIG) => {
            Ok(LockCondition::PublicKey(parse_key(key.as_bytes())?))
        }
        [m, middle @ .., n, checkmultisig] if is_op(checkmultisig, OP_CHECKMULTISIG) => {
            let (threshold, total) = small_int(m)
                .zip(small_int(n))
                .ok_or(ScriptError::UnrecognizedTemplate)?;
            let keys = middle
                .iter()
                .map(|instruction| match instruction {
                    Instruction::PushBytes(key) => parse_key(key.as_bytes()),
                    Instruction::Op(_) => Err(ScriptError::UnrecognizedTemplate),
                })
                .collect::<Result<Vec<_>, _>>()?;
            if keys.len() != total {
                return Err(ScriptError::Threshold {
                    threshold: total,
                    keys: keys.len(),
                });
            }
            check_multisig(threshold, &keys)?;
            Ok(LockCondition::MultiSig { threshold, keys })
        }
        _ => Err(ScriptError::UnrecognizedTemplate),
    }
}

/// Decode a minimally encoded script number of up to five bytes
fn decode_script_num(bytes: &[u8]) -> Result<i64, ScriptError> {
    let Some((last, rest)) = bytes.split_last() else {
        return Ok(0);
    };
    if bytes.len() > MAX_LOCK_TIME_NUM_LEN {
        return Err(ScriptError::LockTime(i64::MAX));
    }
    // A zero top byte is only allowed when it carries the sign bit of the byte below
    if last & 0x7f == 0 && rest.last().map_or(true, |byte| byte & 0x80 == 0) {
        return Err(ScriptError::NonMinimal);
    }

    let magnitude = bytes.iter().enumerate().fold(0i64, |acc, (i, byte)| {
        let byte = if i == bytes.len() - 1 { byte & 0x7f } else { *byte };
        acc | (i64::from(byte) << (8 * i))
    });
    Ok(if last & 0x80 != 0 { -magnitude } else { magnitude })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::secp256k1::{Message, Secp256k1, SecretKey};

    const LOCK: u32 = 1_700_000_000;

    fn key(n: u8) -> (SecretKey, PublicKey) {
        let secp = Secp256k1::new();
        let secret = SecretKey::from_slice(&[n; 32]).unwrap();
        (secret, PublicKey::new(secret.public_key(&secp)))
    }

    fn lock_time() -> StakeLockTime {
        StakeLockTime::from_unix(LOCK).unwrap()
    }

    fn sign(secret: &SecretKey) -> ecdsa::Signature {
        let secp = Secp256k1::new();
        let msg = Message::from_digest([7; 32]);
        ecdsa::Signature::sighash_all(secp.sign_ecdsa(&msg, secret))
    }

    #[test]
    fn test_public_key_hash_layout() {
        let (_, pk) = key(1);
        let script = CltvScript::public_key_hash(lock_time(), &pk).to_script();
        let bytes = script.as_bytes();
        // push4 <locktime LE> CLTV DROP DUP HASH160 push20 <hash> EQUALVERIFY CHECKSIG
        assert_eq!(bytes.len(), 1 + 4 + 2 + 2 + 1 + 20 + 2);
        assert_eq!(bytes[0], 4);
        assert_eq!(&bytes[1..5], &LOCK.to_le_bytes());
        assert_eq!(bytes[5], OP_CLTV.to_u8());
        assert_eq!(bytes[6], OP_DROP.to_u8());
        assert_eq!(&bytes[10..30], &pk.pubkey_hash().to_byte_array());
    }

    #[test]
    fn test_round_trip_all_templates() {
        let (_, a) = key(1);
        let (_, b) = key(2);
        let (_, c) = key(3);
        let scripts = [
            CltvScript::public_key_hash(lock_time(), &a),
            CltvScript::public_key(lock_time(), a),
            CltvScript::multisig(lock_time(), 2, vec![c, a, b]).unwrap(),
        ];
        for script in scripts {
            for witness in [false, true] {
                let parsed = CltvScript::parse(&script.to_script(), witness).unwrap();
                assert_eq!(parsed, script);
                assert_eq!(parsed.to_script(), script.to_script());
            }
        }
    }

    #[test]
    fn test_multisig_keys_sorted_and_checked() {
        let (_, a) = key(1);
        let (_, b) = key(2);
        let script = CltvScript::multisig(lock_time(), 1, vec![b, a]).unwrap();
        let LockCondition::MultiSig { keys, .. } = &script.condition else {
            panic!("expected multisig");
        };
        assert!(keys[0].to_bytes() < keys[1].to_bytes());
        assert_eq!(script.threshold(), 1);

        assert!(matches!(
            CltvScript::multisig(lock_time(), 3, vec![a, b]),
            Err(ScriptError::Threshold { .. })
        ));
        assert!(matches!(
            CltvScript::multisig(lock_time(), 0, vec![a]),
            Err(ScriptError::Threshold { .. })
        ));
        assert_eq!(
            CltvScript::multisig(lock_time(), 1, vec![a, a]),
            Err(ScriptError::DuplicateKey)
        );
    }

    #[test]
    fn test_parse_lock_time_boundary() {
        let (_, pk) = key(1);
        let script = |value: i64| {
            Builder::new()
                .push_int(value)
                .push_opcode(OP_CLTV)
                .push_opcode(OP_DROP)
                .push_key(&pk)
                .push_opcode(OP_CHECKSIG)
                .into_script()
        };
        assert_eq!(
            CltvScript::parse(&script(500_000_000), false),
            Err(ScriptError::LockTime(500_000_000))
        );
        let parsed = CltvScript::parse(&script(500_000_001), false).unwrap();
        assert_eq!(parsed.lock_time.to_unix(), 500_000_001);
        // Above i32::MAX the script number needs a fifth byte
        let parsed = CltvScript::parse(&script(0xffff_fffe), false).unwrap();
        assert_eq!(parsed.lock_time.to_unix(), 0xffff_fffe);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        let (_, pk) = key(1);
        assert_eq!(
            CltvScript::parse(&ScriptBuf::new(), false),
            Err(ScriptError::MissingCltv)
        );

        let no_drop = Builder::new()
            .push_int(LOCK as i64)
            .push_opcode(OP_CLTV)
            .push_key(&pk)
            .push_opcode(OP_CHECKSIG)
            .into_script();
        assert_eq!(CltvScript::parse(&no_drop, false), Err(ScriptError::MissingCltv));

        let bad_tail = Builder::new()
            .push_int(LOCK as i64)
            .push_opcode(OP_CLTV)
            .push_opcode(OP_DROP)
            .push_opcode(OP_CHECKSIG)
            .into_script();
        assert_eq!(
            CltvScript::parse(&bad_tail, false),
            Err(ScriptError::UnrecognizedTemplate)
        );

        // Lock time padded with a redundant zero byte
        let mut padded = LOCK.to_le_bytes().to_vec();
        padded.push(0);
        let non_minimal = Builder::new()
            .push_slice(PushBytesBuf::try_from(padded).unwrap())
            .push_opcode(OP_CLTV)
            .push_opcode(OP_DROP)
            .push_key(&pk)
            .push_opcode(OP_CHECKSIG)
            .into_script();
        assert_eq!(
            CltvScript::parse(&non_minimal, false),
            Err(ScriptError::NonMinimal)
        );
    }

    #[test]
    fn test_uncompressed_key_rejected_in_witness() {
        let secp = Secp256k1::new();
        let secret = SecretKey::from_slice(&[5; 32]).unwrap();
        let uncompressed = PublicKey::new_uncompressed(secret.public_key(&secp));
        let script = CltvScript::public_key(lock_time(), uncompressed).to_script();
        assert!(CltvScript::parse(&script, false).is_ok());
        assert_eq!(
            CltvScript::parse(&script, true),
            Err(ScriptError::UncompressedKey)
        );
    }

    #[test]
    fn test_reference() {
        let (_, pk) = key(1);
        let pkh = CltvScript::public_key_hash(lock_time(), &pk);
        assert_eq!(pkh.reference(), pk.pubkey_hash().to_byte_array());
        let pk_script = CltvScript::public_key(lock_time(), pk);
        assert_eq!(
            pk_script.reference(),
            hash160(pk_script.to_script().as_bytes())
        );
    }

    #[test]
    fn test_lock_address_matches_lock_script() {
        let (_, pk) = key(1);
        let script = CltvScript::public_key_hash(lock_time(), &pk);
        for witness in [false, true] {
            let address = script.lock_address(witness, Network::Testnet).unwrap();
            assert_eq!(address.script_pubkey(), script.lock_script(witness));
        }
    }

    #[test]
    fn test_unlocking_data_public_key_hash() {
        let (secret, pk) = key(1);
        let script = CltvScript::public_key_hash(lock_time(), &pk);
        let sig = sign(&secret);
        let sigs = BTreeMap::from([(pk, sig)]);

        let UnlockingData::Witness(witness) = script.unlocking_data(&sigs, true).unwrap() else {
            panic!("expected witness");
        };
        let items: Vec<&[u8]> = witness.iter().collect();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0], sig.to_vec().as_slice());
        assert_eq!(items[1], pk.to_bytes().as_slice());
        assert_eq!(items[2], script.to_script().as_bytes());

        let UnlockingData::ScriptSig(script_sig) = script.unlocking_data(&sigs, false).unwrap()
        else {
            panic!("expected script sig");
        };
        let pushes: Vec<_> = script_sig.instructions().map(|i| i.unwrap()).collect();
        assert_eq!(pushes.len(), 3);
    }

    #[test]
    fn test_unlocking_data_multisig_orders_signatures() {
        let (sa, a) = key(1);
        let (sb, b) = key(2);
        let (_, c) = key(3);
        let script = CltvScript::multisig(lock_time(), 2, vec![a, b, c]).unwrap();

        let only_one = BTreeMap::from([(a, sign(&sa))]);
        assert_eq!(
            script.unlocking_data(&only_one, true),
            Err(ScriptError::MissingSignatures { need: 2, have: 1 })
        );

        let sigs = BTreeMap::from([(a, sign(&sa)), (b, sign(&sb))]);
        let UnlockingData::Witness(witness) = script.unlocking_data(&sigs, true).unwrap() else {
            panic!("expected witness");
        };
        let items: Vec<&[u8]> = witness.iter().collect();
        assert_eq!(items.len(), 4);
        assert!(items[0].is_empty());

        let LockCondition::MultiSig { keys, .. } = &script.condition else {
            panic!("expected multisig");
        };
        assert_eq!(items[1], sigs[&keys[0]].to_vec().as_slice());
        assert_eq!(items[2], sigs[&keys[1]].to_vec().as_slice());
    }

    #[test]
    fn test_decode_script_num() {
        assert_eq!(decode_script_num(&[]), Ok(0));
        assert_eq!(decode_script_num(&[0x81]), Ok(-1));
        assert_eq!(decode_script_num(&[0xff, 0x00]), Ok(255));
        assert_eq!(decode_script_num(&[0x01, 0x00]), Err(ScriptError::NonMinimal));
        assert_eq!(
            decode_script_num(&[0xfe, 0xff, 0xff, 0xff, 0x00]),
            Ok(0xffff_fffe)
        );
    }
}
