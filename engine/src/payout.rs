//! Scheduled settlement of the daily prize pool.
//!
//! One cycle reads the top of today's `total` leaderboard, asks the strategy
//! for a distribution and settles it through the prize-pool contract. At most
//! one cycle runs per service; overlapping triggers are skipped.
//!
//! A cycle whose transaction was submitted but not observed as confirmed is
//! reported as failed. The next cycle does not check whether that transaction
//! landed, so it can pay the same snapshot a second time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use log::{debug, error, info, warn};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};

use crate::config::{SdkConfig, Secret};
use crate::error::{ConfigError, SettlementError};
use crate::leaderboard::{LeaderboardKind, LeaderboardStore};
use crate::ledger::{same_identity, LedgerClient, SigningKey};
use crate::strategy::{PayoutDistribution, PayoutStrategy, TieredSplit};

/// Leaderboard depth read for each cycle.
pub const PAYOUT_TOP_N: usize = 10;

#[derive(Debug, Clone)]
pub struct PayoutSettings {
    /// When false, cycles compute the distribution but never touch the ledger.
    pub enabled: bool,
    pub prize_pool_contract: Option<String>,
    pub signing_key: Option<Secret>,
    /// Amount distributed per cycle, in token base units.
    pub pool_amount: i128,
    pub top_n: usize,
    pub interval: Duration,
    pub confirmation_timeout: Duration,
}

impl PayoutSettings {
    pub fn from_config(config: &SdkConfig) -> Self {
        Self {
            enabled: config.enable_onchain_payouts,
            prize_pool_contract: config.prize_pool_contract.clone(),
            signing_key: config.signing_key.clone(),
            pool_amount: config.payout_pool_amount,
            top_n: PAYOUT_TOP_N,
            interval: config.payout_interval,
            confirmation_timeout: config.confirmation_timeout,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CycleOutcome {
    /// Another cycle was already running.
    Skipped,
    /// Nobody played today.
    NoPlayers,
    /// The strategy picked no winners.
    NoWinners,
    /// On-chain payouts are disabled; nothing was submitted.
    DryRun { distribution: PayoutDistribution },
    Settled {
        tx_hash: String,
        block_number: u64,
        distribution: PayoutDistribution,
    },
}

/// Holds the single-flight flag; clears it on every exit path.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct Inner {
    settings: PayoutSettings,
    store: Arc<dyn LeaderboardStore>,
    ledger: Arc<dyn LedgerClient>,
    strategy: Arc<dyn PayoutStrategy>,
    in_flight: AtomicBool,
    scheduler: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let slot = self.scheduler.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }
}

/// Cheap to clone; clones share the schedule and the single-flight flag.
#[derive(Clone)]
pub struct PayoutService {
    inner: Arc<Inner>,
}

impl PayoutService {
    /// Service using the default 50/30/20 split.
    pub fn new(
        settings: PayoutSettings,
        store: Arc<dyn LeaderboardStore>,
        ledger: Arc<dyn LedgerClient>,
    ) -> Result<Self, ConfigError> {
        Self::with_strategy(settings, store, ledger, Arc::new(TieredSplit::default()))
    }

    pub fn with_strategy(
        settings: PayoutSettings,
        store: Arc<dyn LeaderboardStore>,
        ledger: Arc<dyn LedgerClient>,
        strategy: Arc<dyn PayoutStrategy>,
    ) -> Result<Self, ConfigError> {
        if settings.enabled && settings.prize_pool_contract.is_none() {
            return Err(ConfigError::MissingPrizePoolContract);
        }
        if settings.interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "PAYOUT_INTERVAL_MS",
                value: "0".into(),
            });
        }
        if settings.pool_amount < 0 {
            return Err(ConfigError::InvalidValue {
                key: "PAYOUT_POOL_AMOUNT",
                value: settings.pool_amount.to_string(),
            });
        }

        Ok(Self {
            inner: Arc::new(Inner {
                settings,
                store,
                ledger,
                strategy,
                in_flight: AtomicBool::new(false),
                scheduler: Mutex::new(None),
            }),
        })
    }

    pub fn settings(&self) -> &PayoutSettings {
        &self.inner.settings
    }

    /// True while a cycle is executing.
    pub fn is_processing(&self) -> bool {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Start running a cycle every `interval`, first one after one interval.
    /// Must be called from within a tokio runtime. No-op when already running.
    pub fn start(&self) {
        let mut slot = self.scheduler_slot();
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let period = self.inner.settings.interval;
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        *slot = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                // Failures are logged by `trigger`; the next tick is the retry.
                let _ = PayoutService { inner }.trigger().await;
            }
        }));

        info!("Payout scheduler started, interval {} ms", period.as_millis());
    }

    pub fn stop(&self) {
        if let Some(handle) = self.scheduler_slot().take() {
            handle.abort();
            info!("Payout scheduler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.scheduler_slot()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Run one cycle now, sharing the scheduler's single-flight guard.
    pub async fn trigger(&self) -> Result<CycleOutcome, SettlementError> {
        let Some(_guard) = InFlight::acquire(&self.inner.in_flight) else {
            debug!("Payout cycle already in progress; skipping trigger");
            return Ok(CycleOutcome::Skipped);
        };

        let result = self.inner.run_cycle().await;
        match &result {
            Ok(outcome) => info!("Payout cycle finished: {}", outcome_label(outcome)),
            Err(err) if err.may_have_settled() => {
                error!("Payout cycle failed: {err}");
                warn!("The submitted transaction may still settle; the next cycle will not detect it and can pay out again");
            }
            Err(err) => error!("Payout cycle failed: {err}"),
        }
        result
    }

    fn scheduler_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.inner
            .scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn outcome_label(outcome: &CycleOutcome) -> &'static str {
    match outcome {
        CycleOutcome::Skipped => "skipped",
        CycleOutcome::NoPlayers => "no players",
        CycleOutcome::NoWinners => "no winners",
        CycleOutcome::DryRun { .. } => "dry run",
        CycleOutcome::Settled { .. } => "settled",
    }
}

impl Inner {
    async fn run_cycle(&self) -> Result<CycleOutcome, SettlementError> {
        let settings = &self.settings;

        let leaderboard = self
            .store
            .get_daily_leaderboard(LeaderboardKind::Total, Some(settings.top_n))
            .await?;
        if leaderboard.is_empty() {
            info!("No players to pay out");
            return Ok(CycleOutcome::NoPlayers);
        }

        if !settings.enabled {
            let distribution = self
                .strategy
                .calculate_distribution(&leaderboard, settings.pool_amount)?;
            info!(
                "On-chain payouts disabled; computed {} rewards without settling",
                distribution.len()
            );
            return Ok(CycleOutcome::DryRun { distribution });
        }

        let raw_key = settings
            .signing_key
            .as_ref()
            .ok_or_else(|| SettlementError::MissingCredentials("PRIVATE_KEY is not set".into()))?;
        let key = SigningKey::parse(raw_key.expose())
            .map_err(|e| SettlementError::MissingCredentials(e.to_string()))?;
        let signer = self
            .ledger
            .signer_address(&key)
            .map_err(|e| SettlementError::MissingCredentials(e.to_string()))?;
        let contract = settings.prize_pool_contract.as_deref().ok_or_else(|| {
            SettlementError::MissingCredentials("PRIZE_POOL_CONTRACT is not set".into())
        })?;

        let distribution = self
            .strategy
            .calculate_distribution(&leaderboard, settings.pool_amount)?;
        if distribution.is_empty() {
            info!("Strategy selected no winners");
            return Ok(CycleOutcome::NoWinners);
        }

        info!(
            "Paying out {} to {} winners from {contract} as {signer}",
            distribution.total().unwrap_or_default(),
            distribution.len()
        );
        debug!("Signing with {}", key.redacted());

        let owner = self
            .ledger
            .contract_owner(contract)
            .await
            .map_err(SettlementError::OwnerLookup)?;
        if !same_identity(&owner, &signer) {
            return Err(SettlementError::OwnershipMismatch { owner, signer });
        }

        let cost = self
            .ledger
            .estimate_end_cycle(contract, &signer, &distribution)
            .await
            .map_err(SettlementError::EstimationFailure)?;
        debug!("end_cycle estimate: {cost}");

        let tx_hash = self
            .ledger
            .submit_end_cycle(contract, &key, &distribution)
            .await
            .map_err(SettlementError::SubmissionFailure)?;
        info!("Payout transaction sent: {tx_hash}");

        let receipt = match timeout(
            settings.confirmation_timeout,
            self.ledger.wait_for_confirmation(&tx_hash),
        )
        .await
        {
            Ok(Ok(receipt)) => receipt,
            Ok(Err(source)) => return Err(SettlementError::ConfirmationFailure { tx_hash, source }),
            Err(_) => {
                return Err(SettlementError::ConfirmationTimeout {
                    tx_hash,
                    timeout_ms: settings.confirmation_timeout.as_millis(),
                })
            }
        };
        info!("Payout confirmed in block {}", receipt.block_number);

        Ok(CycleOutcome::Settled {
            tx_hash,
            block_number: receipt.block_number,
            distribution,
        })
    }
}
