//! Process configuration.
//!
//! Loaded once from environment variables and shared read-only afterwards.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use log::warn;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// USDC carries six decimals on every supported network.
pub const USDC_DECIMALS: u32 = 6;

pub const DEFAULT_ENTRY_FEE_USDC: &str = "0.001";
pub const DEFAULT_FACILITATOR_URL: &str = "https://x402.org/facilitator";
pub const DEFAULT_PAYOUT_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
/// 0.001 USDC in base units.
pub const DEFAULT_PAYOUT_POOL_AMOUNT: i128 = 1_000;
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_RATE_LIMIT_WINDOW: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_RATE_LIMIT_MAX: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Network {
    Base,
    BaseSepolia,
}

impl Network {
    pub fn as_str(self) -> &'static str {
        match self {
            Network::Base => "base",
            Network::BaseSepolia => "base-sepolia",
        }
    }

    pub fn is_mainnet(self) -> bool {
        self == Network::Base
    }
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "base" => Ok(Network::Base),
            "base-sepolia" => Ok(Network::BaseSepolia),
            other => Err(ConfigError::InvalidValue {
                key: "CDP_NETWORK",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A credential that must never reach logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[derive(Debug, Clone)]
pub struct SdkConfig {
    /// Decimal USDC amount, e.g. `0.001`.
    pub entry_fee_usdc: Decimal,
    pub network: Network,
    pub recipient_address: Option<String>,
    pub facilitator_url: String,
    pub cors_origins: Vec<String>,
    pub payout_interval: Duration,
    pub prize_pool_contract: Option<String>,
    pub treasury_address: Option<String>,
    pub enable_onchain_payouts: bool,
    pub facilitator_api_key_id: Option<String>,
    pub facilitator_api_key_secret: Option<Secret>,
    pub rpc_url: Option<String>,
    pub signing_key: Option<Secret>,
    /// Amount distributed per cycle, in token base units.
    pub payout_pool_amount: i128,
    pub confirmation_timeout: Duration,
    pub rate_limit_window: Duration,
    pub rate_limit_max: u32,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            entry_fee_usdc: Decimal::new(1, 3),
            network: Network::BaseSepolia,
            recipient_address: None,
            facilitator_url: DEFAULT_FACILITATOR_URL.to_string(),
            cors_origins: Vec::new(),
            payout_interval: DEFAULT_PAYOUT_INTERVAL,
            prize_pool_contract: None,
            treasury_address: None,
            enable_onchain_payouts: false,
            facilitator_api_key_id: None,
            facilitator_api_key_secret: None,
            rpc_url: None,
            signing_key: None,
            payout_pool_amount: DEFAULT_PAYOUT_POOL_AMOUNT,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            rate_limit_window: DEFAULT_RATE_LIMIT_WINDOW,
            rate_limit_max: DEFAULT_RATE_LIMIT_MAX,
        }
    }
}

impl SdkConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// Load from an explicit variable set. Empty values count as unset.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(_, v)| !v.trim().is_empty())
            .collect();
        let get = |key: &str| vars.get(key).map(|v| v.trim().to_string());

        let entry_fee_raw = get("ENTRY_FEE_USDC").unwrap_or_else(|| DEFAULT_ENTRY_FEE_USDC.into());
        let entry_fee_usdc = Decimal::from_str(&entry_fee_raw)
            .ok()
            .filter(|fee| *fee > Decimal::ZERO)
            .ok_or(ConfigError::InvalidValue {
                key: "ENTRY_FEE_USDC",
                value: entry_fee_raw.clone(),
            })?;

        let network = match get("CDP_NETWORK") {
            Some(raw) => raw.parse()?,
            None => Network::BaseSepolia,
        };

        let cors_origins = get("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let config = Self {
            entry_fee_usdc,
            network,
            recipient_address: get("CDP_RECIPIENT_ADDRESS"),
            facilitator_url: get("FACILITATOR_URL")
                .unwrap_or_else(|| DEFAULT_FACILITATOR_URL.into()),
            cors_origins,
            payout_interval: parse_millis(&vars, "PAYOUT_INTERVAL_MS", DEFAULT_PAYOUT_INTERVAL)?,
            prize_pool_contract: get("PRIZE_POOL_CONTRACT"),
            treasury_address: get("TREASURY_ADDRESS"),
            enable_onchain_payouts: get("ENABLE_ONCHAIN_PAYOUTS").as_deref() == Some("true"),
            facilitator_api_key_id: get("CDP_API_KEY_ID"),
            facilitator_api_key_secret: get("CDP_API_KEY_SECRET").map(Secret),
            rpc_url: get("BASE_RPC_URL"),
            signing_key: get("PRIVATE_KEY").map(Secret),
            payout_pool_amount: parse_number(
                &vars,
                "PAYOUT_POOL_AMOUNT",
                DEFAULT_PAYOUT_POOL_AMOUNT,
            )?,
            confirmation_timeout: parse_millis(
                &vars,
                "PAYOUT_CONFIRMATION_TIMEOUT_MS",
                DEFAULT_CONFIRMATION_TIMEOUT,
            )?,
            rate_limit_window: parse_millis(&vars, "RATE_LIMIT_WINDOW_MS", DEFAULT_RATE_LIMIT_WINDOW)?,
            rate_limit_max: parse_number(&vars, "RATE_LIMIT_MAX", DEFAULT_RATE_LIMIT_MAX)?,
        };

        if config.payout_pool_amount < 0 {
            return Err(ConfigError::InvalidValue {
                key: "PAYOUT_POOL_AMOUNT",
                value: config.payout_pool_amount.to_string(),
            });
        }

        if config.recipient_address.is_none() && config.prize_pool_contract.is_none() {
            warn!("Neither CDP_RECIPIENT_ADDRESS nor PRIZE_POOL_CONTRACT is set; payments will fail");
        }

        Ok(config)
    }

    /// Where entry fees are paid. The prize-pool contract wins over a plain
    /// recipient address.
    pub fn payment_recipient(&self) -> Result<&str, ConfigError> {
        self.prize_pool_contract
            .as_deref()
            .or(self.recipient_address.as_deref())
            .ok_or(ConfigError::MissingRecipient)
    }

    /// Entry fee in USDC base units, truncated.
    pub fn entry_fee_units(&self) -> Result<i128, ConfigError> {
        let scale = Decimal::from(10u64.pow(USDC_DECIMALS));
        self.entry_fee_usdc
            .checked_mul(scale)
            .map(|units| units.trunc())
            .and_then(|units| units.to_i128())
            .ok_or(ConfigError::InvalidValue {
                key: "ENTRY_FEE_USDC",
                value: self.entry_fee_usdc.to_string(),
            })
    }
}

fn parse_number<T: FromStr>(
    vars: &HashMap<String, String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match vars.get(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key,
            value: raw.clone(),
        }),
    }
}

fn parse_millis(
    vars: &HashMap<String, String>,
    key: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let millis: u64 = parse_number(vars, key, default.as_millis() as u64)?;
    if millis == 0 {
        return Err(ConfigError::InvalidValue {
            key,
            value: millis.to_string(),
        });
    }
    Ok(Duration::from_millis(millis))
}
