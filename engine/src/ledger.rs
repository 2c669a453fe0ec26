//! Contract for the ledger client that settles payout cycles.
//!
//! The engine never talks to a chain directly; it drives an implementation of
//! `LedgerClient` against the prize-pool contract's `owner` and `end_cycle`
//! entry points.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::strategy::PayoutDistribution;

/// Raw 32-byte signing secret, parsed from hex.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKey([u8; 32]);

impl SigningKey {
    /// Accepts 64 hex characters with or without a `0x` prefix.
    pub fn parse(raw: &str) -> Result<Self, LedgerError> {
        let trimmed = raw.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        let bytes = hex::decode(digits)
            .map_err(|e| LedgerError::InvalidKey(format!("not hex: {e}")))?;
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| LedgerError::InvalidKey(format!("expected 32 bytes, got {}", b.len())))?;

        if key.iter().all(|b| *b == 0) {
            return Err(LedgerError::InvalidKey("key is all zeroes".into()));
        }
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First and last two bytes only, for logs.
    pub fn redacted(&self) -> String {
        format!("0x{}...{}", hex::encode(&self.0[..2]), hex::encode(&self.0[30..]))
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKey({})", self.redacted())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub tx_hash: String,
    pub block_number: u64,
}

/// Ledger identities compare case-insensitively (checksummed hex addresses).
pub fn same_identity(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Address that `key` signs as.
    fn signer_address(&self, key: &SigningKey) -> Result<String, LedgerError>;

    /// Owner recorded by the prize-pool contract.
    async fn contract_owner(&self, contract: &str) -> Result<String, LedgerError>;

    /// Resource cost of `end_cycle`. Fails if the call would revert.
    async fn estimate_end_cycle(
        &self,
        contract: &str,
        signer: &str,
        distribution: &PayoutDistribution,
    ) -> Result<u64, LedgerError>;

    /// Sign and submit `end_cycle`, returning the transaction hash.
    async fn submit_end_cycle(
        &self,
        contract: &str,
        key: &SigningKey,
        distribution: &PayoutDistribution,
    ) -> Result<String, LedgerError>;

    /// Resolves once the transaction is included. May wait indefinitely;
    /// callers bound it.
    async fn wait_for_confirmation(&self, tx_hash: &str) -> Result<Receipt, LedgerError>;
}
