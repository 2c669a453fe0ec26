//! Paid entry.
//!
//! Proving that the entry fee was paid is the handshake collaborator's job
//! (`PaymentVerifier`); this gate only states what must be paid, and once the
//! collaborator accepts, opens a new session already marked paid.

use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{Network, SdkConfig};
use crate::error::{ConfigError, JoinError, PaymentError};
use crate::session::SessionStore;

/// Handshake protocol version advertised in 402 responses.
pub const X402_VERSION: u32 = 1;
/// Header carrying the client's payment payload.
pub const PAYMENT_HEADER: &str = "x-payment";
/// Header carrying the collaborator's settlement response.
pub const PAYMENT_RESPONSE_HEADER: &str = "x-payment-response";
pub const JOIN_RESOURCE: &str = "/join";

const PAYMENT_TIMEOUT_SECONDS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    pub scheme: String,
    pub network: Network,
    /// USDC base units, as a decimal string.
    pub max_amount_required: String,
    pub resource: String,
    pub description: String,
    pub mime_type: String,
    pub pay_to: String,
    pub max_timeout_seconds: u64,
}

/// Body of a 402 response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    pub x402_version: u32,
    pub error: String,
    pub accepts: Vec<PaymentRequirements>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifiedPayment {
    /// Wallet that paid, when the protocol reports it.
    pub payer: Option<String>,
    /// Opaque settlement proof to echo back to the client.
    pub settlement: Option<String>,
}

#[async_trait]
pub trait PaymentVerifier: Send + Sync {
    /// Verify and settle `payment` against `requirements`.
    ///
    /// `None` means the client sent no payment; implementations answer
    /// `PaymentError::Required`.
    async fn verify(
        &self,
        payment: Option<&str>,
        requirements: &PaymentRequirements,
    ) -> Result<VerifiedPayment, PaymentError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub success: bool,
    pub message: String,
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub response: JoinResponse,
    pub settlement: Option<String>,
}

pub struct PaymentGate {
    requirements: PaymentRequirements,
    verifier: Arc<dyn PaymentVerifier>,
    sessions: Arc<dyn SessionStore>,
}

impl PaymentGate {
    /// Fails fast when there is nowhere to pay, or when mainnet is selected
    /// without facilitator credentials.
    pub fn new(
        config: &SdkConfig,
        verifier: Arc<dyn PaymentVerifier>,
        sessions: Arc<dyn SessionStore>,
    ) -> Result<Self, ConfigError> {
        let pay_to = config.payment_recipient()?.to_string();

        if config.network.is_mainnet()
            && (config.facilitator_api_key_id.is_none() || config.facilitator_api_key_secret.is_none())
        {
            return Err(ConfigError::MissingFacilitatorCredentials);
        }

        let label = if config.network.is_mainnet() { "MAINNET" } else { "TESTNET" };
        let requirements = PaymentRequirements {
            scheme: "exact".into(),
            network: config.network,
            max_amount_required: config.entry_fee_units()?.to_string(),
            resource: JOIN_RESOURCE.into(),
            description: format!("Entry fee ({label})"),
            mime_type: "application/json".into(),
            pay_to,
            max_timeout_seconds: PAYMENT_TIMEOUT_SECONDS,
        };

        info!(
            "Payment gate: {} USDC on {} to {}",
            config.entry_fee_usdc, config.network, requirements.pay_to
        );

        Ok(Self {
            requirements,
            verifier,
            sessions,
        })
    }

    pub fn requirements(&self) -> &PaymentRequirements {
        &self.requirements
    }

    pub fn payment_required(&self, err: &PaymentError) -> PaymentRequired {
        let error = match err {
            PaymentError::Required => "X-PAYMENT header is required".to_string(),
            other => other.to_string(),
        };
        PaymentRequired {
            x402_version: X402_VERSION,
            error,
            accepts: vec![self.requirements.clone()],
        }
    }

    /// Verify the payment and open a paid session.
    pub async fn join(&self, payment: Option<&str>) -> Result<Admission, JoinError> {
        let verified = self.verifier.verify(payment, &self.requirements).await?;

        let session_id = Uuid::new_v4().to_string();
        self.sessions.create_session(&session_id).await?;
        if let Err(err) = self
            .sessions
            .mark_as_paid(&session_id, verified.payer.as_deref())
            .await
        {
            warn!("Payment verified but session {session_id} could not be marked paid: {err}");
            return Err(err.into());
        }

        info!(
            "Session {session_id} opened for {}",
            verified.payer.as_deref().unwrap_or("unknown payer")
        );

        Ok(Admission {
            response: JoinResponse {
                success: true,
                message: "Payment verified".into(),
                session_id,
            },
            settlement: verified.settlement,
        })
    }
}
