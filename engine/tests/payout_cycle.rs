use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Notify;

use arcadepay_engine::leaderboard::rank_players;
use arcadepay_engine::{
    ConfigError, CycleOutcome, LeaderboardData, LeaderboardKind, LeaderboardStore, LedgerClient,
    LedgerError, PayoutDistribution, PayoutService, PayoutSettings, PlayerStats, Receipt, Secret,
    SettlementError, SigningKey, StoreError,
};

const KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
const CONTRACT: &str = "CPRIZEPOOL";
const SIGNER: &str = "0xAbCdEf";

struct FixedBoard {
    players: Vec<PlayerStats>,
    reads: AtomicUsize,
}

impl FixedBoard {
    fn new(totals: &[(&str, u64)]) -> Arc<Self> {
        let players = totals
            .iter()
            .enumerate()
            .map(|(i, (wallet, total))| PlayerStats {
                wallet: wallet.to_string(),
                total_score: *total,
                high_score: *total,
                games_played: 1,
                last_played: i as i64,
            })
            .collect();
        Arc::new(Self {
            players,
            reads: AtomicUsize::new(0),
        })
    }

    fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LeaderboardStore for FixedBoard {
    async fn get_daily_leaderboard(
        &self,
        kind: LeaderboardKind,
        limit: Option<usize>,
    ) -> Result<LeaderboardData, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(rank_players(
            self.players.clone(),
            kind,
            limit.unwrap_or(100),
            Utc::now(),
        ))
    }

    async fn get_player_stats(&self, wallet: &str) -> Result<Option<PlayerStats>, StoreError> {
        Ok(self.players.iter().find(|p| p.wallet == wallet).cloned())
    }

    async fn get_daily_player_stats(&self, wallet: &str) -> Result<Option<PlayerStats>, StoreError> {
        self.get_player_stats(wallet).await
    }
}

enum Confirm {
    Ok,
    Fail,
    Hang,
    Wait(Arc<Notify>),
}

struct FakeLedger {
    owner: String,
    estimate_fails: bool,
    confirm: Confirm,
    calls: Mutex<Vec<&'static str>>,
    submitted: Mutex<Vec<PayoutDistribution>>,
}

impl FakeLedger {
    fn new(owner: &str) -> Self {
        Self {
            owner: owner.to_string(),
            estimate_fails: false,
            confirm: Confirm::Ok,
            calls: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl LedgerClient for FakeLedger {
    fn signer_address(&self, _key: &SigningKey) -> Result<String, LedgerError> {
        Ok(SIGNER.to_string())
    }

    async fn contract_owner(&self, contract: &str) -> Result<String, LedgerError> {
        assert_eq!(contract, CONTRACT);
        self.record("owner");
        Ok(self.owner.clone())
    }

    async fn estimate_end_cycle(
        &self,
        _contract: &str,
        signer: &str,
        _distribution: &PayoutDistribution,
    ) -> Result<u64, LedgerError> {
        assert_eq!(signer, SIGNER);
        self.record("estimate");
        if self.estimate_fails {
            Err(LedgerError::Reverted("insufficient pool balance".into()))
        } else {
            Ok(21_000)
        }
    }

    async fn submit_end_cycle(
        &self,
        _contract: &str,
        _key: &SigningKey,
        distribution: &PayoutDistribution,
    ) -> Result<String, LedgerError> {
        self.record("submit");
        self.submitted.lock().unwrap().push(distribution.clone());
        Ok("0xtx".into())
    }

    async fn wait_for_confirmation(&self, tx_hash: &str) -> Result<Receipt, LedgerError> {
        self.record("confirm");
        match &self.confirm {
            Confirm::Ok => {}
            Confirm::Fail => return Err(LedgerError::Rpc("connection reset".into())),
            Confirm::Hang => std::future::pending::<()>().await,
            Confirm::Wait(notify) => notify.notified().await,
        }
        Ok(Receipt {
            tx_hash: tx_hash.to_string(),
            block_number: 42,
        })
    }
}

fn settings() -> PayoutSettings {
    PayoutSettings {
        enabled: true,
        prize_pool_contract: Some(CONTRACT.into()),
        signing_key: Some(Secret::new(KEY)),
        pool_amount: 1_000,
        top_n: 10,
        interval: Duration::from_secs(60),
        confirmation_timeout: Duration::from_secs(120),
    }
}

fn three_players() -> Arc<FixedBoard> {
    FixedBoard::new(&[("0xcarol", 200), ("0xalice", 500), ("0xbob", 300)])
}

fn service(settings: PayoutSettings, board: Arc<FixedBoard>, ledger: Arc<FakeLedger>) -> PayoutService {
    PayoutService::new(settings, board, ledger).unwrap()
}

#[tokio::test]
async fn test_settles_top_three_with_default_split() {
    let ledger = Arc::new(FakeLedger::new("0xabcdef"));
    let payout = service(settings(), three_players(), ledger.clone());

    let outcome = payout.trigger().await.unwrap();

    let CycleOutcome::Settled {
        tx_hash,
        block_number,
        distribution,
    } = outcome
    else {
        panic!("expected a settled cycle, got {outcome:?}");
    };
    assert_eq!(tx_hash, "0xtx");
    assert_eq!(block_number, 42);
    assert_eq!(distribution.addresses(), ["0xalice", "0xbob", "0xcarol"]);
    assert_eq!(distribution.rewards(), [500, 300, 200]);

    assert_eq!(ledger.calls(), ["owner", "estimate", "submit", "confirm"]);
    assert_eq!(ledger.submitted.lock().unwrap().as_slice(), [distribution]);
    assert!(!payout.is_processing());
}

#[tokio::test]
async fn test_empty_leaderboard_makes_no_ledger_calls() {
    let ledger = Arc::new(FakeLedger::new(SIGNER));
    let payout = service(settings(), FixedBoard::new(&[]), ledger.clone());

    assert_eq!(payout.trigger().await, Ok(CycleOutcome::NoPlayers));
    assert!(ledger.calls().is_empty());
}

#[tokio::test]
async fn test_owner_mismatch_never_submits() {
    let ledger = Arc::new(FakeLedger::new("0xsomeoneelse"));
    let payout = service(settings(), three_players(), ledger.clone());

    let err = payout.trigger().await.unwrap_err();
    assert_eq!(
        err,
        SettlementError::OwnershipMismatch {
            owner: "0xsomeoneelse".into(),
            signer: SIGNER.into(),
        }
    );
    assert_eq!(ledger.calls(), ["owner"]);
    assert!(ledger.submitted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_or_malformed_key_fails_before_ledger() {
    let ledger = Arc::new(FakeLedger::new(SIGNER));

    let mut no_key = settings();
    no_key.signing_key = None;
    let payout = service(no_key, three_players(), ledger.clone());
    assert!(matches!(
        payout.trigger().await,
        Err(SettlementError::MissingCredentials(_))
    ));

    let mut bad_key = settings();
    bad_key.signing_key = Some(Secret::new("0xnothex"));
    let payout = service(bad_key, three_players(), ledger.clone());
    assert!(matches!(
        payout.trigger().await,
        Err(SettlementError::MissingCredentials(_))
    ));

    assert!(ledger.calls().is_empty());
}

#[tokio::test]
async fn test_estimation_failure_aborts_before_submit() {
    let mut ledger = FakeLedger::new(SIGNER);
    ledger.estimate_fails = true;
    let ledger = Arc::new(ledger);
    let payout = service(settings(), three_players(), ledger.clone());

    let err = payout.trigger().await.unwrap_err();
    assert!(matches!(err, SettlementError::EstimationFailure(LedgerError::Reverted(_))));
    assert!(!err.may_have_settled());
    assert_eq!(ledger.calls(), ["owner", "estimate"]);
}

#[tokio::test]
async fn test_confirmation_failure_is_reported_as_possibly_settled() {
    let mut ledger = FakeLedger::new(SIGNER);
    ledger.confirm = Confirm::Fail;
    let ledger = Arc::new(ledger);
    let payout = service(settings(), three_players(), ledger.clone());

    let err = payout.trigger().await.unwrap_err();
    assert!(matches!(
        &err,
        SettlementError::ConfirmationFailure { tx_hash, .. } if tx_hash == "0xtx"
    ));
    assert!(err.may_have_settled());
    assert!(!payout.is_processing());
}

#[tokio::test(start_paused = true)]
async fn test_confirmation_wait_is_bounded() {
    let mut ledger = FakeLedger::new(SIGNER);
    ledger.confirm = Confirm::Hang;
    let ledger = Arc::new(ledger);
    let payout = service(settings(), three_players(), ledger.clone());

    let err = payout.trigger().await.unwrap_err();
    assert_eq!(
        err,
        SettlementError::ConfirmationTimeout {
            tx_hash: "0xtx".into(),
            timeout_ms: 120_000,
        }
    );
    assert!(!payout.is_processing());
}

#[tokio::test]
async fn test_disabled_payouts_compute_without_settling() {
    let ledger = Arc::new(FakeLedger::new(SIGNER));
    let mut disabled = settings();
    disabled.enabled = false;
    disabled.prize_pool_contract = None;
    disabled.signing_key = None;
    let payout = service(disabled, three_players(), ledger.clone());

    let outcome = payout.trigger().await.unwrap();
    let CycleOutcome::DryRun { distribution } = outcome else {
        panic!("expected a dry run, got {outcome:?}");
    };
    assert_eq!(distribution.rewards(), [500, 300, 200]);
    assert!(ledger.calls().is_empty());
}

#[test]
fn test_enabled_without_contract_is_rejected() {
    let mut missing = settings();
    missing.prize_pool_contract = None;

    let result = PayoutService::new(missing, three_players(), Arc::new(FakeLedger::new(SIGNER)));
    assert!(matches!(result, Err(ConfigError::MissingPrizePoolContract)));
}

#[test]
fn test_zero_interval_is_rejected() {
    let mut zero = settings();
    zero.interval = Duration::ZERO;

    let result = PayoutService::new(zero, three_players(), Arc::new(FakeLedger::new(SIGNER)));
    assert!(matches!(
        result,
        Err(ConfigError::InvalidValue { key: "PAYOUT_INTERVAL_MS", .. })
    ));
}

#[tokio::test]
async fn test_overlapping_trigger_is_skipped() {
    let release = Arc::new(Notify::new());
    let mut ledger = FakeLedger::new(SIGNER);
    ledger.confirm = Confirm::Wait(release.clone());
    let ledger = Arc::new(ledger);
    let payout = service(settings(), three_players(), ledger.clone());

    let first = tokio::spawn({
        let payout = payout.clone();
        async move { payout.trigger().await }
    });
    while !payout.is_processing() {
        tokio::task::yield_now().await;
    }

    assert_eq!(payout.trigger().await, Ok(CycleOutcome::Skipped));

    release.notify_one();
    let outcome = first.await.unwrap().unwrap();
    assert!(matches!(outcome, CycleOutcome::Settled { .. }));
    assert_eq!(ledger.calls().iter().filter(|c| **c == "submit").count(), 1);
    assert!(!payout.is_processing());
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_runs_each_interval_until_stopped() {
    let board = three_players();
    let ledger = Arc::new(FakeLedger::new(SIGNER));
    let mut disabled = settings();
    disabled.enabled = false;
    let payout = service(disabled, board.clone(), ledger);

    payout.start();
    payout.start();
    assert!(payout.is_running());

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(board.reads(), 0);

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(board.reads(), 1);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(board.reads(), 2);

    payout.stop();
    assert!(!payout.is_running());

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(board.reads(), 2);
}
