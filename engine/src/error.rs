//! Error taxonomy shared by the gates, stores and the payout service.
//!
//! Gates translate these into status codes and generic messages; the payout
//! service logs them in full and only reports success or failure outward.

use thiserror::Error;

use crate::session::SessionState;

/// Raised while building a component. Fatal for that component.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("neither CDP_RECIPIENT_ADDRESS nor PRIZE_POOL_CONTRACT is set")]
    MissingRecipient,
    #[error("mainnet payments require CDP_API_KEY_ID and CDP_API_KEY_SECRET")]
    MissingFacilitatorCredentials,
    #[error("on-chain payouts are enabled but PRIZE_POOL_CONTRACT is not set")]
    MissingPrizePoolContract,
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Session lifecycle violations seen by the session gate.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("session not found")]
    NotFound,
    #[error("session not paid")]
    Unpaid,
    #[error("score already submitted for this session")]
    DuplicateSubmission,
}

/// Malformed request input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing sessionId")]
    MissingSessionId,
    #[error("invalid request body: {0}")]
    InvalidBody(String),
}

/// Failures reported by session or leaderboard store implementations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("session {0} already exists")]
    DuplicateSession(String),
    #[error("session {0} does not exist")]
    SessionMissing(String),
    #[error("session {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: SessionState,
        to: SessionState,
    },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of a rejected session-gate check.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures from the ledger collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("rpc error: {0}")]
    Rpc(String),
    #[error("transaction reverted: {0}")]
    Reverted(String),
    #[error("invalid signing key: {0}")]
    InvalidKey(String),
}

/// Failures computing a payout distribution.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DistributionError {
    #[error("split weights exceed the whole pool")]
    InvalidSplit,
    #[error("prize pool amount must not be negative")]
    NegativePool,
    #[error("arithmetic overflow while splitting the pool")]
    Overflow,
}

/// Aborts the current settlement cycle. The next scheduled cycle is the retry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SettlementError {
    #[error("signing credentials unavailable: {0}")]
    MissingCredentials(String),
    #[error("permission denied: signer {signer} is not the prize pool owner {owner}")]
    OwnershipMismatch { owner: String, signer: String },
    #[error("could not read prize pool owner: {0}")]
    OwnerLookup(LedgerError),
    #[error("settlement estimate failed: {0}")]
    EstimationFailure(LedgerError),
    #[error("settlement submission failed: {0}")]
    SubmissionFailure(LedgerError),
    #[error("settlement {tx_hash} not confirmed: {source}")]
    ConfirmationFailure { tx_hash: String, source: LedgerError },
    #[error("settlement {tx_hash} not confirmed within {timeout_ms} ms")]
    ConfirmationTimeout { tx_hash: String, timeout_ms: u128 },
    #[error("distribution failed: {0}")]
    Distribution(#[from] DistributionError),
    #[error("leaderboard read failed: {0}")]
    Store(#[from] StoreError),
}

impl SettlementError {
    /// True when a transaction was submitted but its fate is unknown.
    pub fn may_have_settled(&self) -> bool {
        matches!(
            self,
            SettlementError::ConfirmationFailure { .. } | SettlementError::ConfirmationTimeout { .. }
        )
    }
}

/// Failures from the payment handshake collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaymentError {
    #[error("payment required")]
    Required,
    #[error("payment rejected: {0}")]
    Rejected(String),
    #[error("facilitator error: {0}")]
    Facilitator(String),
}

/// Failures while admitting a paid join request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JoinError {
    #[error(transparent)]
    Payment(#[from] PaymentError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
