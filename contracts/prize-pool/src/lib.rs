//! Arcadepay Prize Pool Contract
//!
//! Collects entry fees, accrues the operator share for the treasury and
//! settles each payout cycle by paying the winners picked off-ledger.
//!
//! ## Storage Strategy
//! - `instance()`: Owner, Token, Treasury. Small, fixed-size contract config;
//!   all instance keys share one ledger entry and TTL.
//! - `persistent()`: Available, TreasuryAccrued, CyclesCompleted. Each is a
//!   separate ledger entry with its own TTL, bumped on every write.
//!
//! ## Invariant
//! `available + treasury_accrued == token.balance(contract_address)` at all
//! times, assuming all token inflows go through `deposit`.
#![no_std]
#![allow(unexpected_cfgs)]

use arcadepay_shared::{calculate_fee, TREASURY_FEE_BPS};
use soroban_sdk::{
    contract, contracterror, contractevent, contractimpl, contracttype, token::TokenClient,
    Address, Env, Vec,
};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Persistent storage TTL in ledgers (~30 days at 5 s/ledger).
pub const PERSISTENT_BUMP_LEDGERS: u32 = 518_400;

/// Upper bound on winners per cycle; keeps `end_cycle` within resource limits.
pub const MAX_WINNERS_PER_CYCLE: u32 = 50;

// ---------------------------------------------------------------------------
// Error Types
// ---------------------------------------------------------------------------

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    AlreadyInitialized = 1,
    NotInitialized     = 2,
    NotAuthorized      = 3,
    InvalidAmount      = 4,
    InsufficientFunds  = 5,
    LengthMismatch     = 6,
    EmptyDistribution  = 7,
    TooManyWinners     = 8,
    Overflow           = 9,
}

impl From<arcadepay_shared::Error> for Error {
    fn from(err: arcadepay_shared::Error) -> Self {
        match err {
            arcadepay_shared::Error::NotAuthorized => Error::NotAuthorized,
            arcadepay_shared::Error::InsufficientBalance => Error::InsufficientFunds,
            arcadepay_shared::Error::InvalidAmount => Error::InvalidAmount,
            arcadepay_shared::Error::Overflow => Error::Overflow,
        }
    }
}

// ---------------------------------------------------------------------------
// Storage Types
// ---------------------------------------------------------------------------

#[contracttype]
pub enum DataKey {
    // --- instance() ---
    Owner,
    Token,
    Treasury,
    // --- persistent() ---
    /// Tokens available to winners.
    Available,
    /// Operator share not yet withdrawn to the treasury.
    TreasuryAccrued,
    /// Number of settled payout cycles.
    CyclesCompleted,
}

/// Snapshot of the pool's accounting state returned by `get_pool_state`.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PoolState {
    pub available: i128,
    pub treasury_accrued: i128,
    pub cycles_completed: u64,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[contractevent]
pub struct Deposit {
    #[topic]
    pub from: Address,
    pub amount: i128,
    pub treasury_share: i128,
}

#[contractevent]
pub struct Payout {
    #[topic]
    pub to: Address,
    #[topic]
    pub cycle: u64,
    pub amount: i128,
}

#[contractevent]
pub struct CycleEnded {
    #[topic]
    pub cycle: u64,
    pub winners: u32,
    pub total: i128,
}

#[contractevent]
pub struct TreasuryChanged {
    #[topic]
    pub previous: Address,
    #[topic]
    pub new_treasury: Address,
}

#[contractevent]
pub struct TreasuryWithdraw {
    #[topic]
    pub to: Address,
    pub amount: i128,
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

#[contract]
pub struct PrizePool;

#[contractimpl]
impl PrizePool {
    /// Initialize the prize pool. May only be called once.
    ///
    /// `token` must be a deployed SEP-41 contract address (e.g. the USDC
    /// Stellar Asset Contract). `owner` is the only address allowed to settle
    /// cycles, and is the identity the off-ledger payout service must sign as.
    pub fn init(env: Env, owner: Address, token: Address, treasury: Address) -> Result<(), Error> {
        if env.storage().instance().has(&DataKey::Owner) {
            return Err(Error::AlreadyInitialized);
        }

        owner.require_auth();

        env.storage().instance().set(&DataKey::Owner, &owner);
        env.storage().instance().set(&DataKey::Token, &token);
        env.storage().instance().set(&DataKey::Treasury, &treasury);

        set_persistent_i128(&env, DataKey::Available, 0);
        set_persistent_i128(&env, DataKey::TreasuryAccrued, 0);
        set_cycles(&env, 0);

        Ok(())
    }

    /// Transfer `amount` tokens from `from` into the pool.
    ///
    /// The treasury share is carved off on the way in; the rest is available
    /// to the next `end_cycle`.
    pub fn deposit(env: Env, from: Address, amount: i128) -> Result<(), Error> {
        require_initialized(&env)?;

        if amount <= 0 {
            return Err(Error::InvalidAmount);
        }

        from.require_auth();

        let treasury_share = calculate_fee(amount, TREASURY_FEE_BPS)?;
        let player_share = amount.checked_sub(treasury_share).ok_or(Error::Overflow)?;

        let token = get_token(&env)?;
        TokenClient::new(&env, &token).transfer(&from, env.current_contract_address(), &amount);

        let new_available = get_i128(&env, DataKey::Available)
            .checked_add(player_share)
            .ok_or(Error::Overflow)?;
        let new_accrued = get_i128(&env, DataKey::TreasuryAccrued)
            .checked_add(treasury_share)
            .ok_or(Error::Overflow)?;
        set_persistent_i128(&env, DataKey::Available, new_available);
        set_persistent_i128(&env, DataKey::TreasuryAccrued, new_accrued);

        Deposit { from, amount, treasury_share }.publish(&env);

        Ok(())
    }

    /// Settle one payout cycle. Owner only.
    ///
    /// `rewards[i]` is paid to `winners[i]`. The whole batch is validated
    /// before any transfer, and accounting is updated before the first
    /// outbound transfer.
    pub fn end_cycle(
        env: Env,
        owner: Address,
        winners: Vec<Address>,
        rewards: Vec<i128>,
    ) -> Result<(), Error> {
        require_initialized(&env)?;
        require_owner(&env, &owner)?;

        if winners.len() != rewards.len() {
            return Err(Error::LengthMismatch);
        }
        if winners.is_empty() {
            return Err(Error::EmptyDistribution);
        }
        if winners.len() > MAX_WINNERS_PER_CYCLE {
            return Err(Error::TooManyWinners);
        }

        let mut total: i128 = 0;
        for reward in rewards.iter() {
            if reward <= 0 {
                return Err(Error::InvalidAmount);
            }
            total = total.checked_add(reward).ok_or(Error::Overflow)?;
        }

        let available = get_i128(&env, DataKey::Available);
        if total > available {
            return Err(Error::InsufficientFunds);
        }

        let cycle = get_cycles(&env).checked_add(1).ok_or(Error::Overflow)?;
        set_persistent_i128(&env, DataKey::Available, available - total);
        set_cycles(&env, cycle);

        let token = TokenClient::new(&env, &get_token(&env)?);
        let pool = env.current_contract_address();
        for (to, amount) in winners.iter().zip(rewards.iter()) {
            token.transfer(&pool, &to, &amount);
            Payout { to, cycle, amount }.publish(&env);
        }

        CycleEnded {
            cycle,
            winners: winners.len(),
            total,
        }
        .publish(&env);

        Ok(())
    }

    /// Replace the treasury address. Owner only.
    pub fn set_treasury(env: Env, owner: Address, new_treasury: Address) -> Result<(), Error> {
        require_initialized(&env)?;
        require_owner(&env, &owner)?;

        let previous = get_treasury(&env)?;
        env.storage().instance().set(&DataKey::Treasury, &new_treasury);

        TreasuryChanged { previous, new_treasury }.publish(&env);

        Ok(())
    }

    /// Move `amount` of the accrued operator share to the treasury. Owner only.
    pub fn withdraw_treasury(env: Env, owner: Address, amount: i128) -> Result<(), Error> {
        require_initialized(&env)?;
        require_owner(&env, &owner)?;

        if amount <= 0 {
            return Err(Error::InvalidAmount);
        }

        let accrued = get_i128(&env, DataKey::TreasuryAccrued);
        if amount > accrued {
            return Err(Error::InsufficientFunds);
        }
        set_persistent_i128(&env, DataKey::TreasuryAccrued, accrued - amount);

        let to = get_treasury(&env)?;
        TokenClient::new(&env, &get_token(&env)?).transfer(
            &env.current_contract_address(),
            &to,
            &amount,
        );

        TreasuryWithdraw { to, amount }.publish(&env);

        Ok(())
    }

    /// Withdraw `amount` of the player pool to an arbitrary recipient. Owner only.
    pub fn withdraw_to(
        env: Env,
        owner: Address,
        recipient: Address,
        amount: i128,
    ) -> Result<(), Error> {
        require_initialized(&env)?;
        require_owner(&env, &owner)?;

        if amount <= 0 {
            return Err(Error::InvalidAmount);
        }

        let available = get_i128(&env, DataKey::Available);
        if amount > available {
            return Err(Error::InsufficientFunds);
        }
        set_persistent_i128(&env, DataKey::Available, available - amount);

        TokenClient::new(&env, &get_token(&env)?).transfer(
            &env.current_contract_address(),
            &recipient,
            &amount,
        );

        Ok(())
    }

    pub fn owner(env: Env) -> Result<Address, Error> {
        env.storage()
            .instance()
            .get(&DataKey::Owner)
            .ok_or(Error::NotInitialized)
    }

    pub fn token(env: Env) -> Result<Address, Error> {
        get_token(&env)
    }

    pub fn treasury(env: Env) -> Result<Address, Error> {
        get_treasury(&env)
    }

    /// Returns a point-in-time snapshot of the pool's accounting state.
    pub fn get_pool_state(env: Env) -> Result<PoolState, Error> {
        require_initialized(&env)?;
        Ok(PoolState {
            available: get_i128(&env, DataKey::Available),
            treasury_accrued: get_i128(&env, DataKey::TreasuryAccrued),
            cycles_completed: get_cycles(&env),
        })
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn require_initialized(env: &Env) -> Result<(), Error> {
    if !env.storage().instance().has(&DataKey::Owner) {
        return Err(Error::NotInitialized);
    }
    Ok(())
}

/// Verify that `caller` is the stored owner and has signed the invocation.
fn require_owner(env: &Env, caller: &Address) -> Result<(), Error> {
    let owner: Address = env
        .storage()
        .instance()
        .get(&DataKey::Owner)
        .ok_or(Error::NotInitialized)?;
    caller.require_auth();
    if caller != &owner {
        return Err(Error::NotAuthorized);
    }
    Ok(())
}

fn get_token(env: &Env) -> Result<Address, Error> {
    env.storage()
        .instance()
        .get(&DataKey::Token)
        .ok_or(Error::NotInitialized)
}

fn get_treasury(env: &Env) -> Result<Address, Error> {
    env.storage()
        .instance()
        .get(&DataKey::Treasury)
        .ok_or(Error::NotInitialized)
}

fn get_i128(env: &Env, key: DataKey) -> i128 {
    env.storage().persistent().get(&key).unwrap_or(0)
}

fn get_cycles(env: &Env) -> u64 {
    env.storage()
        .persistent()
        .get(&DataKey::CyclesCompleted)
        .unwrap_or(0)
}

fn set_cycles(env: &Env, value: u64) {
    let key = DataKey::CyclesCompleted;
    env.storage().persistent().set(&key, &value);
    env.storage()
        .persistent()
        .extend_ttl(&key, PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);
}

/// Write an i128 to persistent storage and extend its TTL in one step.
fn set_persistent_i128(env: &Env, key: DataKey, value: i128) {
    env.storage().persistent().set(&key, &value);
    env.storage()
        .persistent()
        .extend_ttl(&key, PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);
}

#[cfg(test)]
mod test;
