//! Shared utilities and constants for the arcadepay contracts and engine.
//!
//! The entry-fee split lives here so the prize-pool contract and the
//! off-ledger prize calculator agree on it.
#![no_std]
#![allow(unexpected_cfgs)]

use soroban_sdk::contracterror;

/// Common error codes used across all contracts.
#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    NotAuthorized = 1,
    InsufficientBalance = 2,
    InvalidAmount = 3,
    Overflow = 4,
}

/// Constant for basis points divisor.
pub const BASIS_POINTS_DIVISOR: u32 = 10_000;

/// Share of entry fees split pro rata by cumulative score.
pub const PLAYER_POOL_BPS: u32 = 7_000;

/// Share of entry fees reserved for the top-3 high-score bonus.
pub const BONUS_POOL_BPS: u32 = 2_500;

/// Operator share. Never distributed to players.
pub const TREASURY_FEE_BPS: u32 = BASIS_POINTS_DIVISOR - PLAYER_POOL_BPS - BONUS_POOL_BPS;

/// Helper to calculate a basis-point share of `amount`, truncating.
pub fn calculate_fee(amount: i128, fee_bps: u32) -> Result<i128, Error> {
    if amount < 0 {
        return Err(Error::InvalidAmount);
    }
    if fee_bps > BASIS_POINTS_DIVISOR {
        return Err(Error::InvalidAmount);
    }
    amount
        .checked_mul(fee_bps as i128)
        .and_then(|v| v.checked_div(BASIS_POINTS_DIVISOR as i128))
        .ok_or(Error::Overflow)
}
