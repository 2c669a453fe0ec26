//! Turning a leaderboard snapshot and a pool amount into winners and rewards.

use arcadepay_shared::{calculate_fee, BASIS_POINTS_DIVISOR};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

use crate::error::DistributionError;
use crate::leaderboard::LeaderboardData;
use crate::prize::{compute_prize, to_base_units, PrizeInput, BONUS_RANKS};

/// `rewards[i]` is owed to `addresses[i]`, in token base units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PayoutDistribution {
    addresses: Vec<String>,
    #[serde(serialize_with = "amounts_as_strings")]
    rewards: Vec<i128>,
}

fn amounts_as_strings<S: Serializer>(amounts: &[i128], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(amounts.iter().map(i128::to_string))
}

impl PayoutDistribution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, address: impl Into<String>, reward: i128) {
        self.addresses.push(address.into());
        self.rewards.push(reward);
    }

    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }

    pub fn rewards(&self) -> &[i128] {
        &self.rewards
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn total(&self) -> Option<i128> {
        self.rewards.iter().try_fold(0i128, |acc, r| acc.checked_add(*r))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i128)> {
        self.addresses
            .iter()
            .map(String::as_str)
            .zip(self.rewards.iter().copied())
    }
}

pub trait PayoutStrategy: Send + Sync {
    fn calculate_distribution(
        &self,
        leaderboard: &LeaderboardData,
        prize_pool_amount: i128,
    ) -> Result<PayoutDistribution, DistributionError>;
}

/// Fixed tiers over the top of the leaderboard. The default pays
/// 50% / 30% / 20% to the top three.
///
/// With fewer entries than tiers, only the leading tiers are paid and the
/// rest of the pool stays undistributed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TieredSplit {
    tiers_bps: Vec<u32>,
}

impl TieredSplit {
    pub fn new(tiers_bps: Vec<u32>) -> Result<Self, DistributionError> {
        let total = tiers_bps
            .iter()
            .try_fold(0u32, |acc, bps| acc.checked_add(*bps))
            .ok_or(DistributionError::InvalidSplit)?;
        if total > BASIS_POINTS_DIVISOR {
            return Err(DistributionError::InvalidSplit);
        }
        Ok(Self { tiers_bps })
    }

    pub fn tiers_bps(&self) -> &[u32] {
        &self.tiers_bps
    }
}

impl Default for TieredSplit {
    fn default() -> Self {
        Self {
            tiers_bps: vec![5_000, 3_000, 2_000],
        }
    }
}

impl PayoutStrategy for TieredSplit {
    fn calculate_distribution(
        &self,
        leaderboard: &LeaderboardData,
        prize_pool_amount: i128,
    ) -> Result<PayoutDistribution, DistributionError> {
        if prize_pool_amount < 0 {
            return Err(DistributionError::NegativePool);
        }

        let mut distribution = PayoutDistribution::new();
        for (entry, bps) in leaderboard.entries.iter().zip(&self.tiers_bps) {
            let reward = calculate_fee(prize_pool_amount, *bps).map_err(|_| DistributionError::Overflow)?;
            distribution.push(entry.wallet.clone(), reward);
        }
        Ok(distribution)
    }
}

/// Splits the pool with the entry-fee prize formula: 70% pro rata by score
/// across the snapshot, 25% as a 60/25/15 bonus to the top three.
///
/// Entries whose share truncates to zero are left out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrizeFormulaSplit;

impl PayoutStrategy for PrizeFormulaSplit {
    fn calculate_distribution(
        &self,
        leaderboard: &LeaderboardData,
        prize_pool_amount: i128,
    ) -> Result<PayoutDistribution, DistributionError> {
        if prize_pool_amount < 0 {
            return Err(DistributionError::NegativePool);
        }

        let entries = &leaderboard.entries;
        let sum_total_scores = entries
            .iter()
            .try_fold(Decimal::ZERO, |acc, e| acc.checked_add(Decimal::from(e.score)))
            .ok_or(DistributionError::Overflow)?;
        let top_count = (entries.len() as u32).min(BONUS_RANKS);
        let entry_fees = Decimal::try_from_i128_with_scale(prize_pool_amount, 0)
            .map_err(|_| DistributionError::Overflow)?;

        let mut distribution = PayoutDistribution::new();
        for (entry, rank) in entries.iter().zip(1u32..) {
            let prize = compute_prize(&PrizeInput {
                entry_fees,
                player_score: Decimal::from(entry.score),
                sum_total_scores,
                rank,
                top_count,
            })?;
            let reward = to_base_units(prize, 0)?;
            if reward > 0 {
                distribution.push(entry.wallet.clone(), reward);
            }
        }
        Ok(distribution)
    }
}
