//! Fee rates and transaction weight estimation
//!
//! Fee rates are expressed in satoshis per virtual byte. Sizes are tracked in
//! weight units so that legacy and witness inputs can be mixed and charged
//! exactly; a virtual byte is four weight units, rounded up.

use std::fmt;
use std::str::FromStr;

use bitcoin::{Amount, Script};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Default minimum fee rate (sat/vbyte)
pub const MIN_FEE_RATE: u64 = 1;

/// Default maximum fee rate (sat/vbyte)
pub const MAX_FEE_RATE: u64 = 10_000;

/// Weight units per virtual byte
pub const WITNESS_SCALE_FACTOR: u64 = 4;

/// version (4) + input count (1) + output count (1) + lock time (4)
pub const TX_OVERHEAD_WEIGHT: u64 = 10 * WITNESS_SCALE_FACTOR;

/// Segwit marker and flag bytes, witness-discounted
pub const SEGWIT_MARKER_WEIGHT: u64 = 2;

/// outpoint (36) + script sig length (1) + sequence (4)
pub const INPUT_BASE_SIZE: u64 = 41;

/// Signed P2PKH input: 148 bytes
pub const P2PKH_INPUT_WEIGHT: u64 = 148 * WITNESS_SCALE_FACTOR;

/// Signed P2WPKH input: 41 bytes plus a 108 byte witness
pub const P2WPKH_INPUT_WEIGHT: u64 = INPUT_BASE_SIZE * WITNESS_SCALE_FACTOR + 108;

/// Signed P2SH-P2WPKH input: 64 bytes plus a 108 byte witness
pub const P2SH_P2WPKH_INPUT_WEIGHT: u64 = (INPUT_BASE_SIZE + 23) * WITNESS_SCALE_FACTOR + 108;

/// Taproot key path input: 41 bytes plus a 66 byte witness
pub const P2TR_INPUT_WEIGHT: u64 = INPUT_BASE_SIZE * WITNESS_SCALE_FACTOR + 66;

/// Allowance for one DER-encoded ECDSA signature
pub const SIGNATURE_ALLOWANCE: u64 = 72;

/// Allowance for the public key revealed by a pubkey-hash spend
pub const PUBKEY_ALLOWANCE: u64 = 66;

// =============================================================================
// Fee Rate
// =============================================================================

/// Fee rate in satoshis per virtual byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeeRate(pub u64);

impl FeeRate {
    /// Create from satoshis per virtual byte
    pub fn from_sat_per_vb(rate: u64) -> Self {
        Self(rate)
    }

    /// Get rate as satoshis per virtual byte
    pub fn as_sat_per_vb(&self) -> u64 {
        self.0
    }

    /// Calculate the fee for a given virtual size
    pub fn fee_for_vsize(&self, vsize: u64) -> Amount {
        Amount::from_sat(self.0 * vsize)
    }

    /// Calculate the fee for a given weight, rounding the size up to whole vbytes
    pub fn fee_for_weight(&self, weight: u64) -> Amount {
        self.fee_for_vsize(weight.div_ceil(WITNESS_SCALE_FACTOR))
    }

    /// Calculate the fee for a weight, rounding the fee (not the size) up to whole satoshis
    ///
    /// Used for the signature correction, where witness bytes cost a quarter
    /// of a vbyte each.
    pub fn fee_for_weight_exact(&self, weight: u64) -> Amount {
        Amount::from_sat((self.0 * weight).div_ceil(WITNESS_SCALE_FACTOR))
    }
}

impl Default for FeeRate {
    fn default() -> Self {
        Self(MIN_FEE_RATE)
    }
}

impl fmt::Display for FeeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} sat/vB", self.0)
    }
}

// =============================================================================
// Fee Speed
// =============================================================================

/// Fee-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeeError {
    #[error("Invalid fee speed: {0}")]
    InvalidSpeed(String),
    #[error("Fee rate {0} sat/vB outside [{MIN_FEE_RATE}, {MAX_FEE_RATE}]")]
    OutOfRange(u64),
}

/// How quickly the caller wants the transaction confirmed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeeSpeed {
    Slow,
    Average,
    Fast,
    /// An explicit rate chosen by the caller
    Custom(FeeRate),
}

impl Default for FeeSpeed {
    fn default() -> Self {
        FeeSpeed::Average
    }
}

impl FromStr for FeeSpeed {
    type Err = FeeError;

    /// Accepts `s`/`slow`, `a`/`avg`/`average`, `f`/`fast`, or a rate in sat/vB
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s" | "slow" => Ok(FeeSpeed::Slow),
            "a" | "avg" | "average" => Ok(FeeSpeed::Average),
            "f" | "fast" => Ok(FeeSpeed::Fast),
            other => {
                let rate: u64 = other
                    .parse()
                    .map_err(|_| FeeError::InvalidSpeed(s.to_string()))?;
                if !(MIN_FEE_RATE..=MAX_FEE_RATE).contains(&rate) {
                    return Err(FeeError::OutOfRange(rate));
                }
                Ok(FeeSpeed::Custom(FeeRate(rate)))
            }
        }
    }
}

/// Fee rates for each confirmation speed, as reported by a data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeEstimates {
    pub slow: FeeRate,
    pub average: FeeRate,
    pub fast: FeeRate,
}

impl FeeEstimates {
    /// Get the fee rate for a given speed
    pub fn for_speed(&self, speed: FeeSpeed) -> FeeRate {
        match speed {
            FeeSpeed::Slow => self.slow,
            FeeSpeed::Average => self.average,
            FeeSpeed::Fast => self.fast,
            FeeSpeed::Custom(rate) => rate,
        }
    }
}

// =============================================================================
// Weight Estimation
// =============================================================================

/// Length in bytes of a Bitcoin compact size prefix for `n`
pub fn compact_size_len(n: u64) -> u64 {
    match n {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

/// Length of the script opcodes needed to push `len` bytes of data
pub fn push_data_len(len: u64) -> u64 {
    match len {
        0..=75 => 1 + len,
        76..=0xff => 2 + len,
        0x100..=0xffff => 3 + len,
        _ => 5 + len,
    }
}

/// Weight of an output paying to `script_pubkey`
pub fn output_weight(script_pubkey: &Script) -> u64 {
    let len = script_pubkey.len() as u64;
    (8 + compact_size_len(len) + len) * WITNESS_SCALE_FACTOR
}

/// Weight of a P2SH input revealing `redeem_script`, excluding signature material
pub fn p2sh_script_input_weight(redeem_script: &Script) -> u64 {
    let script_sig_len = push_data_len(redeem_script.len() as u64);
    (INPUT_BASE_SIZE - 1 + compact_size_len(script_sig_len) + script_sig_len) * WITNESS_SCALE_FACTOR
}

/// Weight of a P2WSH input revealing `witness_script`, excluding signature material
pub fn p2wsh_script_input_weight(witness_script: &Script) -> u64 {
    let len = witness_script.len() as u64;
    INPUT_BASE_SIZE * WITNESS_SCALE_FACTOR + 1 + compact_size_len(len) + len
}

/// Estimated transaction weight from per-input weights and output scripts
pub fn estimate_weight<'a>(
    input_weights: impl IntoIterator<Item = u64>,
    outputs: impl IntoIterator<Item = &'a Script>,
    has_witness: bool,
) -> u64 {
    let inputs: u64 = input_weights.into_iter().sum();
    let outputs: u64 = outputs.into_iter().map(output_weight).sum();
    let marker = if has_witness { SEGWIT_MARKER_WEIGHT } else { 0 };
    TX_OVERHEAD_WEIGHT + marker + inputs + outputs
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::ScriptBuf;

    #[test]
    fn test_fee_rate() {
        let rate = FeeRate::from_sat_per_vb(10);
        assert_eq!(rate.fee_for_vsize(250), Amount::from_sat(2500));
        // 561 WU rounds up to 141 vbytes
        assert_eq!(rate.fee_for_weight(561), Amount::from_sat(1410));
        // 138 witness bytes at 5 sat/vB = 172.5 sat, charged as 173
        assert_eq!(
            FeeRate(5).fee_for_weight_exact(138),
            Amount::from_sat(173)
        );
    }

    #[test]
    fn test_input_weights() {
        assert_eq!(P2PKH_INPUT_WEIGHT, 592);
        assert_eq!(P2WPKH_INPUT_WEIGHT, 272);
        assert_eq!(P2SH_P2WPKH_INPUT_WEIGHT, 364);
        assert_eq!(P2TR_INPUT_WEIGHT, 230);
    }

    #[test]
    fn test_fee_speed_parsing() {
        assert_eq!("s".parse::<FeeSpeed>().unwrap(), FeeSpeed::Slow);
        assert_eq!("avg".parse::<FeeSpeed>().unwrap(), FeeSpeed::Average);
        assert_eq!("F".parse::<FeeSpeed>().unwrap(), FeeSpeed::Fast);
        assert_eq!(
            "12".parse::<FeeSpeed>().unwrap(),
            FeeSpeed::Custom(FeeRate(12))
        );
        assert!("0".parse::<FeeSpeed>().is_err());
        assert!("turbo".parse::<FeeSpeed>().is_err());
    }

    #[test]
    fn test_fee_estimates() {
        let estimates = FeeEstimates {
            slow: FeeRate(2),
            average: FeeRate(5),
            fast: FeeRate(20),
        };
        assert_eq!(estimates.for_speed(FeeSpeed::Slow), FeeRate(2));
        assert_eq!(estimates.for_speed(FeeSpeed::Fast), FeeRate(20));
        assert_eq!(estimates.for_speed(FeeSpeed::Custom(FeeRate(7))), FeeRate(7));
    }

    #[test]
    fn test_output_weight() {
        let p2wpkh = ScriptBuf::from_bytes(vec![0x00, 0x14].into_iter().chain([0u8; 20]).collect());
        assert_eq!(output_weight(&p2wpkh), 31 * 4);
    }

    #[test]
    fn test_script_input_weights() {
        let script = ScriptBuf::from_bytes(vec![0x51; 32]);
        // 36 + 1 + (1 + 32) + 4 = 74 bytes
        assert_eq!(p2sh_script_input_weight(&script), 74 * 4);
        // 41 bytes + witness (1 + 1 + 32)
        assert_eq!(p2wsh_script_input_weight(&script), 164 + 34);
    }

    #[test]
    fn test_estimate_weight() {
        let out = ScriptBuf::from_bytes(vec![0x6a]);
        let weight = estimate_weight([P2WPKH_INPUT_WEIGHT], [out.as_script()], true);
        assert_eq!(weight, 40 + 2 + 272 + (8 + 1 + 1) * 4);
    }
}
