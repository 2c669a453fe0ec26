#![cfg(test)]

use super::*;
use soroban_sdk::{
    testutils::Address as _,
    token::{StellarAssetClient, TokenClient},
    vec, Address, Env,
};

// ------------------------------------------------------------------
// Test helpers
// ------------------------------------------------------------------

fn create_token<'a>(env: &'a Env, token_admin: &Address) -> (Address, StellarAssetClient<'a>) {
    let token_contract = env.register_stellar_asset_contract_v2(token_admin.clone());
    let token_client = StellarAssetClient::new(env, &token_contract.address());
    (token_contract.address(), token_client)
}

struct Setup<'a> {
    client: PrizePoolClient<'a>,
    owner: Address,
    treasury: Address,
    player: Address,
    token: Address,
}

/// Register and initialize a pool; the player starts with 10_000 tokens.
fn setup(env: &Env) -> Setup<'_> {
    let owner = Address::generate(env);
    let treasury = Address::generate(env);
    let player = Address::generate(env);
    let token_admin = Address::generate(env);

    let (token, token_sac) = create_token(env, &token_admin);

    let contract_id = env.register(PrizePool, ());
    let client = PrizePoolClient::new(env, &contract_id);

    env.mock_all_auths();
    client.init(&owner, &token, &treasury);
    token_sac.mint(&player, &10_000i128);

    Setup {
        client,
        owner,
        treasury,
        player,
        token,
    }
}

// ------------------------------------------------------------------
// init
// ------------------------------------------------------------------

#[test]
fn test_init_rejects_reinit() {
    let env = Env::default();
    let s = setup(&env);

    let result = s.client.try_init(&s.owner, &s.token, &s.treasury);
    assert_eq!(result, Err(Ok(Error::AlreadyInitialized)));
}

#[test]
fn test_accessors_report_configuration() {
    let env = Env::default();
    let s = setup(&env);

    assert_eq!(s.client.owner(), s.owner);
    assert_eq!(s.client.token(), s.token);
    assert_eq!(s.client.treasury(), s.treasury);
}

#[test]
fn test_owner_before_init_rejected() {
    let env = Env::default();
    let contract_id = env.register(PrizePool, ());
    let client = PrizePoolClient::new(&env, &contract_id);

    assert_eq!(client.try_owner(), Err(Ok(Error::NotInitialized)));
    assert_eq!(client.try_get_pool_state(), Err(Ok(Error::NotInitialized)));
}

// ------------------------------------------------------------------
// deposit
// ------------------------------------------------------------------

#[test]
fn test_deposit_splits_treasury_share() {
    let env = Env::default();
    let s = setup(&env);

    s.client.deposit(&s.player, &1_000i128);

    let state = s.client.get_pool_state();
    assert_eq!(state.available, 950);
    assert_eq!(state.treasury_accrued, 50);
    assert_eq!(state.cycles_completed, 0);
    assert_eq!(TokenClient::new(&env, &s.token).balance(&s.client.address), 1_000);
}

#[test]
fn test_deposit_non_positive_rejected() {
    let env = Env::default();
    let s = setup(&env);

    assert_eq!(
        s.client.try_deposit(&s.player, &0i128),
        Err(Ok(Error::InvalidAmount))
    );
    assert_eq!(
        s.client.try_deposit(&s.player, &-5i128),
        Err(Ok(Error::InvalidAmount))
    );
}

// ------------------------------------------------------------------
// end_cycle
// ------------------------------------------------------------------

#[test]
fn test_end_cycle_pays_winners() {
    let env = Env::default();
    let s = setup(&env);
    let tc = TokenClient::new(&env, &s.token);

    let first = Address::generate(&env);
    let second = Address::generate(&env);
    let third = Address::generate(&env);

    s.client.deposit(&s.player, &2_000i128);
    s.client.end_cycle(
        &s.owner,
        &vec![&env, first.clone(), second.clone(), third.clone()],
        &vec![&env, 500i128, 300i128, 200i128],
    );

    assert_eq!(tc.balance(&first), 500);
    assert_eq!(tc.balance(&second), 300);
    assert_eq!(tc.balance(&third), 200);

    let state = s.client.get_pool_state();
    assert_eq!(state.available, 1_900 - 1_000);
    assert_eq!(state.treasury_accrued, 100);
    assert_eq!(state.cycles_completed, 1);
}

#[test]
fn test_end_cycle_by_non_owner_rejected() {
    let env = Env::default();
    let s = setup(&env);
    let winner = Address::generate(&env);

    s.client.deposit(&s.player, &1_000i128);
    let result = s
        .client
        .try_end_cycle(&s.player, &vec![&env, winner], &vec![&env, 100i128]);
    assert_eq!(result, Err(Ok(Error::NotAuthorized)));
}

#[test]
fn test_end_cycle_length_mismatch_rejected() {
    let env = Env::default();
    let s = setup(&env);
    let winner = Address::generate(&env);

    s.client.deposit(&s.player, &1_000i128);
    let result = s.client.try_end_cycle(
        &s.owner,
        &vec![&env, winner],
        &vec![&env, 100i128, 50i128],
    );
    assert_eq!(result, Err(Ok(Error::LengthMismatch)));
}

#[test]
fn test_end_cycle_empty_rejected() {
    let env = Env::default();
    let s = setup(&env);

    let result = s
        .client
        .try_end_cycle(&s.owner, &Vec::new(&env), &Vec::new(&env));
    assert_eq!(result, Err(Ok(Error::EmptyDistribution)));
}

#[test]
fn test_end_cycle_zero_reward_rejected() {
    let env = Env::default();
    let s = setup(&env);
    let winner = Address::generate(&env);

    s.client.deposit(&s.player, &1_000i128);
    let result = s
        .client
        .try_end_cycle(&s.owner, &vec![&env, winner], &vec![&env, 0i128]);
    assert_eq!(result, Err(Ok(Error::InvalidAmount)));
}

#[test]
fn test_end_cycle_exceeding_pool_rejected() {
    let env = Env::default();
    let s = setup(&env);
    let winner = Address::generate(&env);

    s.client.deposit(&s.player, &1_000i128);
    let result = s
        .client
        .try_end_cycle(&s.owner, &vec![&env, winner], &vec![&env, 951i128]);
    assert_eq!(result, Err(Ok(Error::InsufficientFunds)));

    // Nothing moved.
    let state = s.client.get_pool_state();
    assert_eq!(state.available, 950);
    assert_eq!(state.cycles_completed, 0);
}

// ------------------------------------------------------------------
// treasury
// ------------------------------------------------------------------

#[test]
fn test_withdraw_treasury_moves_accrued_share() {
    let env = Env::default();
    let s = setup(&env);
    let tc = TokenClient::new(&env, &s.token);

    s.client.deposit(&s.player, &2_000i128);
    s.client.withdraw_treasury(&s.owner, &60i128);

    assert_eq!(tc.balance(&s.treasury), 60);
    assert_eq!(s.client.get_pool_state().treasury_accrued, 40);

    let result = s.client.try_withdraw_treasury(&s.owner, &41i128);
    assert_eq!(result, Err(Ok(Error::InsufficientFunds)));
}

#[test]
fn test_set_treasury_redirects_withdrawals() {
    let env = Env::default();
    let s = setup(&env);
    let tc = TokenClient::new(&env, &s.token);
    let new_treasury = Address::generate(&env);

    s.client.deposit(&s.player, &1_000i128);
    s.client.set_treasury(&s.owner, &new_treasury);
    s.client.withdraw_treasury(&s.owner, &50i128);

    assert_eq!(s.client.treasury(), new_treasury);
    assert_eq!(tc.balance(&new_treasury), 50);
    assert_eq!(tc.balance(&s.treasury), 0);
}

#[test]
fn test_set_treasury_by_non_owner_rejected() {
    let env = Env::default();
    let s = setup(&env);
    let intruder = Address::generate(&env);

    let result = s.client.try_set_treasury(&intruder, &intruder);
    assert_eq!(result, Err(Ok(Error::NotAuthorized)));
}

#[test]
fn test_withdraw_to_limited_to_available() {
    let env = Env::default();
    let s = setup(&env);
    let tc = TokenClient::new(&env, &s.token);
    let rescue = Address::generate(&env);

    s.client.deposit(&s.player, &1_000i128);
    s.client.withdraw_to(&s.owner, &rescue, &900i128);

    assert_eq!(tc.balance(&rescue), 900);
    assert_eq!(s.client.get_pool_state().available, 50);
    assert_eq!(
        s.client.try_withdraw_to(&s.owner, &rescue, &51i128),
        Err(Ok(Error::InsufficientFunds))
    );
}

// ------------------------------------------------------------------
// Full lifecycle: deposits → two cycles → treasury sweep
// ------------------------------------------------------------------

#[test]
fn test_full_lifecycle() {
    let env = Env::default();
    let s = setup(&env);
    let tc = TokenClient::new(&env, &s.token);
    let winner = Address::generate(&env);

    s.client.deposit(&s.player, &1_000i128);
    s.client.deposit(&s.player, &1_000i128);

    s.client
        .end_cycle(&s.owner, &vec![&env, winner.clone()], &vec![&env, 700i128]);
    s.client
        .end_cycle(&s.owner, &vec![&env, winner.clone()], &vec![&env, 500i128]);
    s.client.withdraw_treasury(&s.owner, &100i128);

    assert_eq!(tc.balance(&winner), 1_200);
    assert_eq!(tc.balance(&s.treasury), 100);

    let state = s.client.get_pool_state();
    assert_eq!(state.available, 700);
    assert_eq!(state.treasury_accrued, 0);
    assert_eq!(state.cycles_completed, 2);
    assert_eq!(tc.balance(&s.client.address), 700);
}
