//! Entry-fee prize formula.
//!
//! `prize = 0.70 * fees * score / sum_scores + 0.25 * fees * weight(rank)`
//!
//! The remaining 5% is the operator share and is never paid to players.
//! Amounts are exact decimals; conversion to token base units truncates toward
//! zero, so the sum of paid units never exceeds the pool.

use arcadepay_shared::{BONUS_POOL_BPS, PLAYER_POOL_BPS};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::DistributionError;

/// Only the top three ranks earn a high-score bonus.
pub const BONUS_RANKS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrizeInput {
    pub entry_fees: Decimal,
    pub player_score: Decimal,
    pub sum_total_scores: Decimal,
    /// 1-based.
    pub rank: u32,
    /// Size of the high-score pool.
    pub top_count: u32,
}

fn bps(value: u32) -> Decimal {
    Decimal::new(value as i64, 4)
}

/// Bonus share for `rank` given how many players are in the bonus pool.
pub fn high_score_weight(rank: u32, top_count: u32) -> Decimal {
    if rank == 0 || rank > top_count || rank > BONUS_RANKS {
        return Decimal::ZERO;
    }

    match (top_count, rank) {
        (1, 1) => Decimal::ONE,
        (2, 1) => Decimal::new(70, 2),
        (2, 2) => Decimal::new(30, 2),
        (_, 1) => Decimal::new(60, 2),
        (_, 2) => Decimal::new(25, 2),
        (_, 3) => Decimal::new(15, 2),
        _ => Decimal::ZERO,
    }
}

pub fn compute_prize(input: &PrizeInput) -> Result<Decimal, DistributionError> {
    if input.entry_fees <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }

    let pool_total = input
        .entry_fees
        .checked_mul(bps(PLAYER_POOL_BPS))
        .ok_or(DistributionError::Overflow)?;
    let pool_high = input
        .entry_fees
        .checked_mul(bps(BONUS_POOL_BPS))
        .ok_or(DistributionError::Overflow)?;

    let total_share = if input.sum_total_scores > Decimal::ZERO {
        input
            .player_score
            .checked_mul(pool_total)
            .and_then(|v| v.checked_div(input.sum_total_scores))
            .ok_or(DistributionError::Overflow)?
    } else {
        Decimal::ZERO
    };

    let high_share = pool_high
        .checked_mul(high_score_weight(input.rank, input.top_count))
        .ok_or(DistributionError::Overflow)?;

    total_share
        .checked_add(high_share)
        .ok_or(DistributionError::Overflow)
}

/// Convert a decimal amount to base units with `decimals` places, truncating.
pub fn to_base_units(amount: Decimal, decimals: u32) -> Result<i128, DistributionError> {
    let scale = 10i64
        .checked_pow(decimals)
        .map(Decimal::from)
        .ok_or(DistributionError::Overflow)?;
    amount
        .checked_mul(scale)
        .map(|units| units.round_dp_with_strategy(0, RoundingStrategy::ToZero))
        .and_then(|units| units.to_i128())
        .ok_or(DistributionError::Overflow)
}
