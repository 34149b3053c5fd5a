//! Coin selection
//!
//! Chooses which UTXOs fund a stake and how much change comes back. Weights
//! are in weight units; fees are charged on the rounded-up virtual size.

use bitcoin::Amount;
use thiserror::Error;

use crate::core::fee::FeeRate;

/// Outputs below this value are not created; the amount goes to fees instead
pub const DUST_LIMIT: Amount = Amount::from_sat(546);

/// Coin selection errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Amount, available: Amount },
}

/// A spendable output offered to the selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub value: Amount,
    /// Weight the input adds once signed
    pub input_weight: u64,
}

/// What the transaction must pay for besides its inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionTarget {
    /// Value paid to the fixed outputs
    pub value: Amount,
    /// Weight of the transaction without inputs or change: overhead and fixed outputs
    pub base_weight: u64,
    /// Weight a change output would add
    pub change_weight: u64,
    pub fee_rate: FeeRate,
}

impl SelectionTarget {
    fn fee(&self, input_weight: u64, with_change: bool) -> Amount {
        let change = if with_change { self.change_weight } else { 0 };
        self.fee_rate
            .fee_for_weight(self.base_weight + input_weight + change)
    }

    /// Target value plus fee, or `None` when the sum leaves the amount range
    fn needed(&self, input_weight: u64, with_change: bool) -> Option<Amount> {
        self.value.checked_add(self.fee(input_weight, with_change))
    }
}

/// Result of funding a target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Indices into the candidate slice, in spending order
    pub selected: Vec<usize>,
    pub fee: Amount,
    pub change: Option<Amount>,
}

/// Result of sweeping every candidate into one output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sweep {
    pub fee: Amount,
    pub value: Amount,
}

/// Strategy for funding transactions
pub trait CoinSelector {
    /// Pick candidates covering `target` plus fees, with change when worthwhile
    fn select(
        &self,
        candidates: &[Candidate],
        target: &SelectionTarget,
    ) -> Result<Selection, SelectionError>;

    /// Spend every candidate to a single output of `base_weight`
    fn split(&self, candidates: &[Candidate], base_weight: u64, fee_rate: FeeRate)
        -> Result<Sweep, SelectionError>;
}

/// Largest-first accumulation until inputs cover the target and fee
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccumulativeSelector {
    pub dust_limit: Amount,
}

impl Default for AccumulativeSelector {
    fn default() -> Self {
        Self {
            dust_limit: DUST_LIMIT,
        }
    }
}

impl CoinSelector for AccumulativeSelector {
    fn select(
        &self,
        candidates: &[Candidate],
        target: &SelectionTarget,
    ) -> Result<Selection, SelectionError> {
        let mut order: Vec<usize> = (0..candidates.len()).collect();
        order.sort_by(|a, b| candidates[*b].value.cmp(&candidates[*a].value));

        let mut selected = Vec::new();
        let mut total = Amount::ZERO;
        let mut input_weight = 0;
        let mut needed = target.needed(0, false).unwrap_or(Amount::MAX);

        for index in order {
            let candidate = &candidates[index];
            selected.push(index);
            total = total.checked_add(candidate.value).unwrap_or(Amount::MAX);
            input_weight += candidate.input_weight;

            let Some(required) = target.needed(input_weight, false) else {
                needed = Amount::MAX;
                continue;
            };
            needed = required;
            if total < needed {
                continue;
            }

            let fee_with_change = target.fee(input_weight, true);
            let change = target
                .needed(input_weight, true)
                .and_then(|spent| total.checked_sub(spent))
                .filter(|change| *change >= self.dust_limit);

            return Ok(match change {
                Some(change) => Selection {
                    selected,
                    fee: fee_with_change,
                    change: Some(change),
                },
                // Excess too small for a change output goes to the fee
                None => Selection {
                    selected,
                    fee: total - target.value,
                    change: None,
                },
            });
        }

        Err(SelectionError::InsufficientFunds {
            needed,
            available: total,
        })
    }

    fn split(
        &self,
        candidates: &[Candidate],
        base_weight: u64,
        fee_rate: FeeRate,
    ) -> Result<Sweep, SelectionError> {
        let total = candidates
            .iter()
            .try_fold(Amount::ZERO, |sum, c| sum.checked_add(c.value))
            .unwrap_or(Amount::MAX);
        let input_weight: u64 = candidates.iter().map(|c| c.input_weight).sum();
        let fee = fee_rate.fee_for_weight(base_weight + input_weight);

        match total.checked_sub(fee) {
            Some(value) if value > Amount::ZERO => Ok(Sweep { fee, value }),
            _ => Err(SelectionError::InsufficientFunds {
                needed: fee + Amount::ONE_SAT,
                available: total,
            }),
        }
    }
}
