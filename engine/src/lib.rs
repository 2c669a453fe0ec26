//! Off-ledger engine for pay-to-play arcade sessions.
//!
//! Players pay an entry fee through an x402-style handshake, receive a
//! single-use session, and submit one score per session. Scores feed daily
//! leaderboards; a scheduled payout cycle settles the top of the daily
//! leaderboard through the prize-pool contract.
//!
//! The payment verifier and the ledger client are traits; the host process
//! supplies implementations, installs a `log` backend and serves the router.

pub mod config;
pub mod error;
pub mod http;
pub mod leaderboard;
pub mod ledger;
pub mod payment;
pub mod payout;
pub mod prize;
pub mod rate_limit;
pub mod session;
pub mod strategy;

pub use config::{Network, SdkConfig, Secret};
pub use error::{
    ConfigError, DistributionError, GateError, JoinError, LedgerError, PaymentError, SessionError,
    SettlementError, StoreError, ValidationError,
};
pub use http::{router, AppState};
pub use leaderboard::{
    LeaderboardData, LeaderboardEntry, LeaderboardKind, LeaderboardStore, MemoryLeaderboardStore,
    PlayerStats, ScoreRecorder,
};
pub use ledger::{LedgerClient, Receipt, SigningKey};
pub use payment::{PaymentGate, PaymentRequirements, PaymentVerifier, VerifiedPayment};
pub use payout::{CycleOutcome, PayoutService, PayoutSettings};
pub use rate_limit::FixedWindowLimiter;
pub use session::{GameSession, MemorySessionStore, SessionGate, SessionState, SessionStore};
pub use strategy::{PayoutDistribution, PayoutStrategy, PrizeFormulaSplit, TieredSplit};
