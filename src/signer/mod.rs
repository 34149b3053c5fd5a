//! Signing and finalization
//!
//! A transaction moves through three stages, each consuming the previous:
//! [`UnsignedTransaction`] → [`SignedTransaction`] → [`FinalizedTransaction`].
//! Signatures are collected per input; finalization validates them and
//! builds the script sigs and witnesses.

use std::collections::BTreeMap;

use bitcoin::consensus::encode::serialize_hex;
use bitcoin::hashes::Hash;
use bitcoin::script::{Builder, PushBytesBuf};
use bitcoin::sighash::{EcdsaSighashType, Prevouts, SighashCache, TapSighashType};
use bitcoin::{ecdsa, taproot, Address, PublicKey, Transaction, TxOut, Txid, Witness};
use log::{debug, info};
use secp256k1::{All, Message, Secp256k1};

use crate::core::script::{CltvScript, ScriptError, UnlockingData};
use crate::core::transaction::{SpendInput, UnsignedTransaction};
use crate::crypto::StakerKey;
use crate::error::{Result, StakingError};

// =============================================================================
// Signed Transaction
// =============================================================================

/// Signatures collected for one input
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputSignatures {
    pub ecdsa: BTreeMap<PublicKey, ecdsa::Signature>,
    pub schnorr: Option<taproot::Signature>,
}

impl InputSignatures {
    pub fn is_empty(&self) -> bool {
        self.ecdsa.is_empty() && self.schnorr.is_none()
    }
}

/// An unsigned transaction with the signatures collected so far
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    unsigned: UnsignedTransaction,
    signatures: Vec<InputSignatures>,
}

impl SignedTransaction {
    pub fn unsigned(&self) -> &UnsignedTransaction {
        &self.unsigned
    }

    /// Signatures for input `index`
    pub fn signatures(&self, index: usize) -> Option<&InputSignatures> {
        self.signatures.get(index)
    }
}

impl From<UnsignedTransaction> for SignedTransaction {
    fn from(unsigned: UnsignedTransaction) -> Self {
        let signatures = vec![InputSignatures::default(); unsigned.spends().len()];
        Self {
            unsigned,
            signatures,
        }
    }
}

// =============================================================================
// Finalized Transaction
// =============================================================================

/// A transaction with complete unlocking data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedTransaction {
    tx: Transaction,
}

impl FinalizedTransaction {
    pub fn txid(&self) -> Txid {
        self.tx.compute_txid()
    }

    /// Consensus-serialized transaction as hex
    pub fn to_hex(&self) -> String {
        serialize_hex(&self.tx)
    }

    /// Take the final transaction
    pub fn extract(self) -> Transaction {
        self.tx
    }
}

// =============================================================================
// Signer
// =============================================================================

/// Signs, validates and finalizes staking transactions
pub struct TransactionSigner {
    secp: Secp256k1<All>,
}

impl Default for TransactionSigner {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionSigner {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::new(),
        }
    }

    /// Sign every input spending from `account` with `key`
    pub fn sign(
        &self,
        unsigned: UnsignedTransaction,
        key: &StakerKey,
        account: &Address,
    ) -> Result<SignedTransaction> {
        self.cosign(SignedTransaction::from(unsigned), key, account)
    }

    /// Add signatures from `key` to an already signed transaction
    ///
    /// Used for multisig locks and for transactions spending from several
    /// accounts.
    pub fn cosign(
        &self,
        mut signed: SignedTransaction,
        key: &StakerKey,
        account: &Address,
    ) -> Result<SignedTransaction> {
        let account_script = account.script_pubkey();
        let prevouts = signed.unsigned.spent_outputs();
        let public_key = key.public_key();
        let mut cache = SighashCache::new(signed.unsigned.transaction());
        let mut count = 0;

        for (index, spend) in signed.unsigned.spends().iter().enumerate() {
            if prevouts[index].script_pubkey != account_script {
                continue;
            }

            if let SpendInput::Taproot { internal_key, .. } = spend {
                if *internal_key != key.x_only_public_key() {
                    return Err(StakingError::Signing(format!(
                        "input {index} is not controlled by this key"
                    )));
                }
                let keypair = key.tweaked_keypair(&self.secp)?;
                let sighash = cache
                    .taproot_key_spend_signature_hash(
                        index,
                        &Prevouts::All(&prevouts),
                        TapSighashType::Default,
                    )
                    .map_err(|e| StakingError::Signing(e.to_string()))?;
                let msg = Message::from_digest(sighash.to_byte_array());
                signed.signatures[index].schnorr = Some(taproot::Signature {
                    signature: self.secp.sign_schnorr_no_aux_rand(&msg, &keypair),
                    sighash_type: TapSighashType::Default,
                });
            } else {
                if let Some(script) = spend.cltv_script() {
                    let script = CltvScript::parse(script, spend.is_witness())?;
                    if !script.accepts_signer(&public_key) {
                        return Err(StakingError::Signing(format!(
                            "key is not a signer of the lock script on input {index}"
                        )));
                    }
                }
                let msg = ecdsa_message(&mut cache, index, spend, &prevouts[index])?;
                let signature = ecdsa::Signature {
                    signature: self.secp.sign_ecdsa(&msg, key.secret_key()),
                    sighash_type: EcdsaSighashType::All,
                };
                signed.signatures[index].ecdsa.insert(public_key, signature);
            }
            count += 1;
        }

        if count == 0 {
            return Err(StakingError::InputValidation(format!(
                "no input spends from {account}"
            )));
        }
        debug!("Signed {count} inputs spending from {account}");
        Ok(signed)
    }

    /// Check the collected signatures
    ///
    /// Every non-taproot input must carry a valid signature by
    /// `expected_signer`, and every collected ECDSA signature must verify.
    /// Taproot key path signatures are left to script execution.
    pub fn validate(&self, signed: &SignedTransaction, expected_signer: &PublicKey) -> Result<()> {
        let prevouts = signed.unsigned.spent_outputs();
        let mut cache = SighashCache::new(signed.unsigned.transaction());

        for (index, spend) in signed.unsigned.spends().iter().enumerate() {
            if spend.is_taproot() {
                continue;
            }
            let signatures = &signed.signatures[index].ecdsa;
            if !signatures.contains_key(expected_signer) {
                return Err(StakingError::InvalidSignature(index));
            }
            let msg = ecdsa_message(&mut cache, index, spend, &prevouts[index])?;
            for (public_key, signature) in signatures {
                if signature.sighash_type != EcdsaSighashType::All {
                    return Err(StakingError::InvalidSignature(index));
                }
                self.secp
                    .verify_ecdsa(&msg, &signature.signature, &public_key.inner)
                    .map_err(|_| StakingError::InvalidSignature(index))?;
            }
        }
        Ok(())
    }

    /// Validate, then build the unlocking data of every input
    pub fn finalize(
        &self,
        signed: SignedTransaction,
        expected_signer: &PublicKey,
    ) -> Result<FinalizedTransaction> {
        self.validate(&signed, expected_signer)?;

        let SignedTransaction {
            unsigned,
            signatures,
        } = signed;
        let spends = unsigned.spends().to_vec();
        let mut tx = unsigned.transaction().clone();

        for (index, (txin, spend)) in tx.input.iter_mut().zip(&spends).enumerate() {
            let collected = &signatures[index];
            let missing = || StakingError::InvalidSignature(index);
            match spend {
                SpendInput::Taproot { .. } => {
                    let signature = collected.schnorr.as_ref().ok_or_else(missing)?;
                    txin.witness = Witness::p2tr_key_spend(signature);
                }
                SpendInput::Legacy { .. } => {
                    let signature = collected.ecdsa.get(expected_signer).ok_or_else(missing)?;
                    txin.script_sig = Builder::new()
                        .push_slice(push_bytes(signature.to_vec())?)
                        .push_key(expected_signer)
                        .into_script();
                }
                SpendInput::Segwit { .. } => {
                    let signature = collected.ecdsa.get(expected_signer).ok_or_else(missing)?;
                    txin.witness = Witness::p2wpkh(signature, &expected_signer.inner);
                }
                SpendInput::WrappedSegwit { redeem_script, .. } => {
                    let signature = collected.ecdsa.get(expected_signer).ok_or_else(missing)?;
                    txin.script_sig = Builder::new()
                        .push_slice(push_bytes(redeem_script.to_bytes())?)
                        .into_script();
                    txin.witness = Witness::p2wpkh(signature, &expected_signer.inner);
                }
                SpendInput::LockedLegacy { redeem_script, .. }
                | SpendInput::LockedSegwit {
                    witness_script: redeem_script,
                    ..
                } => {
                    let witness = spend.is_witness();
                    let script = CltvScript::parse(redeem_script, witness)?;
                    match script.unlocking_data(&collected.ecdsa, witness) {
                        Ok(UnlockingData::ScriptSig(script_sig)) => txin.script_sig = script_sig,
                        Ok(UnlockingData::Witness(stack)) => txin.witness = stack,
                        Err(ScriptError::MissingSignatures { .. }) => return Err(missing()),
                        Err(e) => return Err(e.into()),
                    }
                }
            }
        }

        info!("Finalized transaction {}", tx.compute_txid());
        Ok(FinalizedTransaction { tx })
    }
}

/// ECDSA SIGHASH_ALL message for a non-taproot input
fn ecdsa_message(
    cache: &mut SighashCache<&Transaction>,
    index: usize,
    spend: &SpendInput,
    prevout: &TxOut,
) -> Result<Message> {
    let signing_error = |e: &dyn std::fmt::Display| StakingError::Signing(e.to_string());
    let digest = match spend {
        SpendInput::Legacy { .. } => cache
            .legacy_signature_hash(index, &prevout.script_pubkey, EcdsaSighashType::All.to_u32())
            .map_err(|e| signing_error(&e))?
            .to_byte_array(),
        SpendInput::LockedLegacy { redeem_script, .. } => cache
            .legacy_signature_hash(index, redeem_script, EcdsaSighashType::All.to_u32())
            .map_err(|e| signing_error(&e))?
            .to_byte_array(),
        SpendInput::Segwit { .. } => cache
            .p2wpkh_signature_hash(
                index,
                &prevout.script_pubkey,
                prevout.value,
                EcdsaSighashType::All,
            )
            .map_err(|e| signing_error(&e))?
            .to_byte_array(),
        SpendInput::WrappedSegwit { redeem_script, .. } => cache
            .p2wpkh_signature_hash(index, redeem_script, prevout.value, EcdsaSighashType::All)
            .map_err(|e| signing_error(&e))?
            .to_byte_array(),
        SpendInput::LockedSegwit { witness_script, .. } => cache
            .p2wsh_signature_hash(index, witness_script, prevout.value, EcdsaSighashType::All)
            .map_err(|e| signing_error(&e))?
            .to_byte_array(),
        SpendInput::Taproot { .. } => {
            return Err(StakingError::Signing(format!(
                "input {index} is a taproot input"
            )))
        }
    };
    Ok(Message::from_digest(digest))
}

fn push_bytes(bytes: Vec<u8>) -> Result<PushBytesBuf> {
    PushBytesBuf::try_from(bytes).map_err(|e| StakingError::Signing(e.to_string()))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use bitcoin::absolute::LockTime;
    use bitcoin::key::CompressedPublicKey;
    use bitcoin::script::Instruction;
    use bitcoin::transaction::Version;
    use bitcoin::{Amount, Network, OutPoint, ScriptBuf, TxIn};

    use crate::builder::{
        RedeemRequest, RedeemTransactionBuilder, StakeRequest, StakeTransactionBuilder,
    };
    use crate::config::NetworkConfig;
    use crate::core::{
        AddressKind, DestinationAddress, FeeRate, FeeSpeed, RedeemScriptType, StakeLockTime,
        SEQUENCE_LOCKTIME_ENABLED,
    };
    use crate::provider::SnapshotProvider;
    use crate::test_utils::{funding_tx, key_from_byte, staker_key};

    fn lock_time() -> StakeLockTime {
        StakeLockTime::from_unix(1_700_000_000).unwrap()
    }

    async fn stake(kind: AddressKind, witness: bool) -> (UnsignedTransaction, Address) {
        let key = staker_key();
        let staker = key.address(kind, Network::Testnet).unwrap();
        let provider = SnapshotProvider::new()
            .with_funding(funding_tx(&staker, &[60_000, 90_000]), &staker);
        let builder = StakeTransactionBuilder::new(NetworkConfig::testnet(), Arc::new(provider));
        let stake = builder
            .build(&StakeRequest {
                public_key: key.public_key(),
                amount: Amount::from_sat(100_000),
                lock_time: lock_time(),
                validator: DestinationAddress([1; 20]),
                reward: DestinationAddress([2; 20]),
                witness,
                address_kind: kind,
                script_type: RedeemScriptType::PublicKeyHash,
                fee: FeeSpeed::Custom(FeeRate(2)),
            })
            .await
            .unwrap();
        (stake.unsigned, staker)
    }

    async fn redeem(script: &CltvScript, witness: bool) -> (UnsignedTransaction, Address, Amount) {
        let account = script.lock_address(witness, Network::Testnet).unwrap();
        let provider =
            SnapshotProvider::new().with_funding(funding_tx(&account, &[50_000]), &account);
        let builder = RedeemTransactionBuilder::new(NetworkConfig::testnet(), Arc::new(provider));
        let redeem = builder
            .build(&RedeemRequest {
                account: account.clone(),
                redeem_script: script.to_script(),
                destination: staker_key().address(AddressKind::P2wpkh, Network::Testnet).unwrap(),
                fee: FeeSpeed::Custom(FeeRate(5)),
            })
            .await
            .unwrap();
        (redeem.unsigned, account, redeem.fee)
    }

    /// Data pushes of the first input's scriptSig; `OP_0` reads as an empty push
    fn script_sig_pushes(tx: &Transaction) -> Vec<Vec<u8>> {
        tx.input[0]
            .script_sig
            .instructions()
            .map(|instruction| match instruction.unwrap() {
                Instruction::PushBytes(bytes) => bytes.as_bytes().to_vec(),
                Instruction::Op(op) => panic!("unexpected opcode {op}"),
            })
            .collect()
    }

    fn assert_legacy_signature(
        tx: &Transaction,
        script: &CltvScript,
        signature: &[u8],
        signer: &PublicKey,
    ) {
        let sighash = SighashCache::new(tx)
            .legacy_signature_hash(0, &script.to_script(), EcdsaSighashType::All.to_u32())
            .unwrap();
        let msg = Message::from_digest(sighash.to_byte_array());
        let signature = ecdsa::Signature::from_slice(signature).unwrap();
        assert_eq!(signature.sighash_type, EcdsaSighashType::All);
        assert!(Secp256k1::verification_only()
            .verify_ecdsa(&msg, &signature.signature, &signer.inner)
            .is_ok());
    }

    #[tokio::test]
    async fn test_segwit_stake_sign_and_finalize() {
        let key = staker_key();
        let signer = TransactionSigner::new();
        let (unsigned, staker) = stake(AddressKind::P2wpkh, true).await;

        let signed = signer.sign(unsigned, &key, &staker).unwrap();
        signer.validate(&signed, &key.public_key()).unwrap();
        let finalized = signer.finalize(signed, &key.public_key()).unwrap();
        let hex = finalized.to_hex();
        let tx = finalized.extract();

        assert!(!hex.is_empty());
        for txin in &tx.input {
            assert!(txin.script_sig.is_empty());
            assert_eq!(txin.witness.len(), 2);
            assert_eq!(txin.witness.nth(1).unwrap(), key.public_key().to_bytes().as_slice());
        }
    }

    #[tokio::test]
    async fn test_legacy_and_wrapped_stake_finalize() {
        let key = staker_key();
        let signer = TransactionSigner::new();

        let (unsigned, staker) = stake(AddressKind::P2pkh, false).await;
        let signed = signer.sign(unsigned, &key, &staker).unwrap();
        let tx = signer.finalize(signed, &key.public_key()).unwrap().extract();
        for txin in &tx.input {
            assert_eq!(txin.script_sig.instructions().count(), 2);
            assert!(txin.witness.is_empty());
        }

        let (unsigned, staker) = stake(AddressKind::P2shP2wpkh, true).await;
        let signed = signer.sign(unsigned, &key, &staker).unwrap();
        let tx = signer.finalize(signed, &key.public_key()).unwrap().extract();
        let compressed = CompressedPublicKey::try_from(key.public_key()).unwrap();
        let program = ScriptBuf::new_p2wpkh(&compressed.wpubkey_hash());
        for txin in &tx.input {
            assert_eq!(txin.script_sig.as_bytes()[1..], *program.as_bytes());
            assert_eq!(txin.witness.len(), 2);
        }
    }

    #[tokio::test]
    async fn test_wrong_signer_rejected() {
        let key = staker_key();
        let signer = TransactionSigner::new();
        let (unsigned, staker) = stake(AddressKind::P2wpkh, true).await;
        let signed = signer.sign(unsigned, &key, &staker).unwrap();

        let other = key_from_byte(0x77).public_key();
        assert!(matches!(
            signer.validate(&signed, &other),
            Err(StakingError::InvalidSignature(0))
        ));
        assert!(signer.finalize(signed, &other).is_err());
    }

    #[tokio::test]
    async fn test_sign_requires_matching_account() {
        let key = staker_key();
        let signer = TransactionSigner::new();
        let (unsigned, _) = stake(AddressKind::P2wpkh, true).await;
        let elsewhere = key.address(AddressKind::P2pkh, Network::Testnet).unwrap();
        assert!(matches!(
            signer.sign(unsigned, &key, &elsewhere),
            Err(StakingError::InputValidation(_))
        ));
    }

    #[tokio::test]
    async fn test_sign_from_psbt() {
        let key = staker_key();
        let signer = TransactionSigner::new();
        let (unsigned, staker) = stake(AddressKind::P2pkh, false).await;
        let restored = UnsignedTransaction::from_psbt_hex(&unsigned.psbt_hex().unwrap()).unwrap();
        let signed = signer.sign(restored, &key, &staker).unwrap();
        assert!(signer.finalize(signed, &key.public_key()).is_ok());
    }

    #[test]
    fn test_taproot_input_tweaked_and_exempt() {
        let key = staker_key();
        let signer = TransactionSigner::new();
        let secp = Secp256k1::new();
        let taproot = key.address(AddressKind::P2tr, Network::Testnet).unwrap();
        let segwit = key.address(AddressKind::P2wpkh, Network::Testnet).unwrap();

        let outpoint = |n: u8| OutPoint::new(Txid::from_byte_array([n; 32]), 0);
        let tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: [outpoint(1), outpoint(2)]
                .into_iter()
                .map(|previous_output| TxIn {
                    previous_output,
                    script_sig: ScriptBuf::new(),
                    sequence: SEQUENCE_LOCKTIME_ENABLED,
                    witness: Witness::new(),
                })
                .collect(),
            output: vec![TxOut {
                value: Amount::from_sat(15_000),
                script_pubkey: segwit.script_pubkey(),
            }],
        };
        let spends = vec![
            SpendInput::Taproot {
                prev_script: taproot.script_pubkey(),
                value: Amount::from_sat(10_000),
                internal_key: key.x_only_public_key(),
            },
            SpendInput::Segwit {
                prev_script: segwit.script_pubkey(),
                value: Amount::from_sat(10_000),
            },
        ];
        let unsigned = UnsignedTransaction::new(tx, spends).unwrap();

        let signed = signer.sign(unsigned, &key, &taproot).unwrap();
        // Taproot input is exempt; the unsigned segwit input is not
        assert!(matches!(
            signer.validate(&signed, &key.public_key()),
            Err(StakingError::InvalidSignature(1))
        ));

        let schnorr = *signed.signatures(0).unwrap().schnorr.as_ref().unwrap();
        let prevouts = signed.unsigned().spent_outputs();
        let sighash = SighashCache::new(signed.unsigned().transaction())
            .taproot_key_spend_signature_hash(0, &Prevouts::All(&prevouts), TapSighashType::Default)
            .unwrap();
        let msg = Message::from_digest(sighash.to_byte_array());
        let output_key = key.tweaked_keypair(&secp).unwrap().x_only_public_key().0;
        assert!(secp.verify_schnorr(&schnorr.signature, &msg, &output_key).is_ok());
        assert!(secp
            .verify_schnorr(&schnorr.signature, &msg, &key.x_only_public_key())
            .is_err());

        let signed = signer.cosign(signed, &key, &segwit).unwrap();
        assert!(signed.signatures(1).unwrap().schnorr.is_none());
        signer.validate(&signed, &key.public_key()).unwrap();

        let tx = signer.finalize(signed, &key.public_key()).unwrap().extract();
        assert_eq!(tx.input[0].witness.len(), 1);
        assert_eq!(tx.input[0].witness.nth(0).unwrap().len(), 64);
        assert_eq!(tx.input[1].witness.len(), 2);
    }

    #[tokio::test]
    async fn test_redeem_finalize_within_fee() {
        let key = staker_key();
        let signer = TransactionSigner::new();
        for witness in [false, true] {
            let script = CltvScript::public_key_hash(lock_time(), &key.public_key());
            let (unsigned, account, fee) = redeem(&script, witness).await;
            let signed = signer.sign(unsigned, &key, &account).unwrap();
            let tx = signer.finalize(signed, &key.public_key()).unwrap().extract();

            assert_eq!(tx.lock_time.to_consensus_u32(), 1_700_000_000);
            assert!(fee >= FeeRate(5).fee_for_weight(tx.weight().to_wu()));
            let script_bytes = script.to_script().to_bytes();
            if witness {
                assert_eq!(tx.input[0].witness.len(), 3);
                assert_eq!(tx.input[0].witness.last().unwrap(), script_bytes.as_slice());
            } else {
                assert_eq!(tx.input[0].script_sig.instructions().count(), 3);
            }
        }
    }

    #[tokio::test]
    async fn test_multisig_redeem_needs_threshold() {
        let signer = TransactionSigner::new();
        let keys = [key_from_byte(1), key_from_byte(2), key_from_byte(3)];
        let script = CltvScript::multisig(
            lock_time(),
            2,
            keys.iter().map(|k| k.public_key()).collect(),
        )
        .unwrap();
        let (unsigned, account, fee) = redeem(&script, true).await;

        let signed = signer.sign(unsigned, &keys[0], &account).unwrap();
        assert!(matches!(
            signer.finalize(signed.clone(), &keys[0].public_key()),
            Err(StakingError::InvalidSignature(0))
        ));

        let signed = signer.cosign(signed, &keys[2], &account).unwrap();
        let tx = signer.finalize(signed, &keys[0].public_key()).unwrap().extract();
        assert_eq!(tx.input[0].witness.len(), 4);
        assert!(tx.input[0].witness.nth(0).unwrap().is_empty());
        assert!(fee > Amount::ZERO);

        let outsider = key_from_byte(9);
        let (unsigned, account, _) = redeem(&script, true).await;
        assert!(matches!(
            signer.sign(unsigned, &outsider, &account),
            Err(StakingError::Signing(_))
        ));
    }

    #[tokio::test]
    async fn test_legacy_multisig_redeem_script_sig() {
        let signer = TransactionSigner::new();
        let keys = [key_from_byte(1), key_from_byte(2), key_from_byte(3)];
        let script = CltvScript::multisig(
            lock_time(),
            2,
            keys.iter().map(|k| k.public_key()).collect(),
        )
        .unwrap();
        let (unsigned, account, _) = redeem(&script, false).await;

        let signed = signer.sign(unsigned, &keys[2], &account).unwrap();
        let signed = signer.cosign(signed, &keys[0], &account).unwrap();
        let tx = signer.finalize(signed, &keys[2].public_key()).unwrap().extract();

        assert!(tx.input[0].witness.is_empty());
        assert_eq!(tx.input[0].script_sig.as_bytes()[0], 0x00);
        let pushes = script_sig_pushes(&tx);
        assert_eq!(pushes.len(), 4);
        assert!(pushes[0].is_empty());
        assert_eq!(pushes[3], script.to_script().to_bytes());

        // Signatures follow the key order of the script
        let mut signers = vec![keys[0].public_key(), keys[2].public_key()];
        signers.sort_by_key(|key| key.to_bytes());
        for (signature, signer_key) in pushes[1..3].iter().zip(&signers) {
            assert_legacy_signature(&tx, &script, signature, signer_key);
        }
    }

    #[tokio::test]
    async fn test_public_key_redeem_unlocking_data() {
        let key = staker_key();
        let signer = TransactionSigner::new();
        let script = CltvScript::public_key(lock_time(), key.public_key());

        let (unsigned, account, _) = redeem(&script, false).await;
        let signed = signer.sign(unsigned, &key, &account).unwrap();
        let tx = signer.finalize(signed, &key.public_key()).unwrap().extract();
        let pushes = script_sig_pushes(&tx);
        assert_eq!(pushes.len(), 2);
        assert_eq!(pushes[1], script.to_script().to_bytes());
        assert_legacy_signature(&tx, &script, &pushes[0], &key.public_key());

        let (unsigned, account, _) = redeem(&script, true).await;
        let signed = signer.sign(unsigned, &key, &account).unwrap();
        let tx = signer.finalize(signed, &key.public_key()).unwrap().extract();
        assert!(tx.input[0].script_sig.is_empty());
        assert_eq!(tx.input[0].witness.len(), 2);
        assert_eq!(
            tx.input[0].witness.last().unwrap(),
            script.to_script().as_bytes()
        );

        let sighash = SighashCache::new(&tx)
            .p2wsh_signature_hash(
                0,
                &script.to_script(),
                Amount::from_sat(50_000),
                EcdsaSighashType::All,
            )
            .unwrap();
        let msg = Message::from_digest(sighash.to_byte_array());
        let signature = ecdsa::Signature::from_slice(tx.input[0].witness.nth(0).unwrap()).unwrap();
        assert!(Secp256k1::verification_only()
            .verify_ecdsa(&msg, &signature.signature, &key.public_key().inner)
            .is_ok());
    }
}
