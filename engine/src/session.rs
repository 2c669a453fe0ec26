//! Game sessions and the gate in front of score submission.
//!
//! A session moves `Created -> Paid -> ScoreSubmitted` and never backwards.
//! The store contract exposes a compare-and-set `transition` so that the gate
//! can check and consume a session in one step.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{GateError, SessionError, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Created,
    Paid,
    ScoreSubmitted,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Created => "created",
            SessionState::Paid => "paid",
            SessionState::ScoreSubmitted => "scoreSubmitted",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSession {
    pub id: String,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub wallet: Option<String>,
}

impl GameSession {
    pub fn new(id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            state: SessionState::Created,
            created_at,
            paid_at: None,
            wallet: None,
        }
    }

    pub fn is_paid(&self) -> bool {
        self.state != SessionState::Created
    }

    pub fn score_submitted(&self) -> bool {
        self.state == SessionState::ScoreSubmitted
    }
}

/// Result of a compare-and-set on a session's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The session was in the expected state and now holds the new one.
    Applied(GameSession),
    /// No session with that id.
    Missing,
    /// The session was in some other state; nothing changed.
    Conflict(GameSession),
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a new session in `Created`. Ids must be unique.
    async fn create_session(&self, id: &str) -> Result<GameSession, StoreError>;

    /// Move `Created -> Paid`, recording the paying wallet.
    ///
    /// Re-marking an already paid session is a no-op returning it unchanged,
    /// so duplicate handshake callbacks are harmless. A session that already
    /// has a score is rejected with `InvalidTransition`.
    async fn mark_as_paid(&self, id: &str, wallet: Option<&str>) -> Result<GameSession, StoreError>;

    async fn get_session(&self, id: &str) -> Result<Option<GameSession>, StoreError>;

    /// Atomically move `id` from `expected` to `next`.
    ///
    /// Implementations must make the read and the write indivisible per id;
    /// backwards moves are rejected with `InvalidTransition`.
    async fn transition(
        &self,
        id: &str,
        expected: SessionState,
        next: SessionState,
    ) -> Result<Transition, StoreError>;

    /// Move `Paid -> ScoreSubmitted`.
    async fn mark_score_submitted(&self, id: &str) -> Result<GameSession, StoreError> {
        match self
            .transition(id, SessionState::Paid, SessionState::ScoreSubmitted)
            .await?
        {
            Transition::Applied(session) => Ok(session),
            Transition::Missing => Err(StoreError::SessionMissing(id.to_string())),
            Transition::Conflict(session) => Err(StoreError::InvalidTransition {
                id: id.to_string(),
                from: session.state,
                to: SessionState::ScoreSubmitted,
            }),
        }
    }
}

fn is_forward(from: SessionState, to: SessionState) -> bool {
    matches!(
        (from, to),
        (SessionState::Created, SessionState::Paid) | (SessionState::Paid, SessionState::ScoreSubmitted)
    )
}

/// Session store backed by a map behind an async lock.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, GameSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create_session(&self, id: &str) -> Result<GameSession, StoreError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(id) {
            return Err(StoreError::DuplicateSession(id.to_string()));
        }
        let session = GameSession::new(id, Utc::now());
        sessions.insert(id.to_string(), session.clone());
        Ok(session)
    }

    async fn mark_as_paid(&self, id: &str, wallet: Option<&str>) -> Result<GameSession, StoreError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| StoreError::SessionMissing(id.to_string()))?;

        match session.state {
            SessionState::Created => {
                session.state = SessionState::Paid;
                session.paid_at = Some(Utc::now());
                session.wallet = wallet.map(String::from);
                Ok(session.clone())
            }
            SessionState::Paid => {
                debug!("Session {id} already paid; ignoring repeated confirmation");
                Ok(session.clone())
            }
            SessionState::ScoreSubmitted => Err(StoreError::InvalidTransition {
                id: id.to_string(),
                from: session.state,
                to: SessionState::Paid,
            }),
        }
    }

    async fn get_session(&self, id: &str) -> Result<Option<GameSession>, StoreError> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn transition(
        &self,
        id: &str,
        expected: SessionState,
        next: SessionState,
    ) -> Result<Transition, StoreError> {
        if !is_forward(expected, next) {
            return Err(StoreError::InvalidTransition {
                id: id.to_string(),
                from: expected,
                to: next,
            });
        }

        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get_mut(id) else {
            return Ok(Transition::Missing);
        };
        if session.state != expected {
            return Ok(Transition::Conflict(session.clone()));
        }

        session.state = next;
        if next == SessionState::Paid && session.paid_at.is_none() {
            session.paid_at = Some(Utc::now());
        }
        Ok(Transition::Applied(session.clone()))
    }
}

/// Validates sessions before a score is accepted.
#[derive(Clone)]
pub struct SessionGate {
    store: Arc<dyn SessionStore>,
}

impl SessionGate {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Read-only check, in order: not found, unpaid, already submitted.
    pub async fn check(&self, session_id: &str) -> Result<GameSession, GateError> {
        let session = self
            .store
            .get_session(session_id)
            .await?
            .ok_or(SessionError::NotFound)?;
        classify(&session)?;
        Ok(session)
    }

    /// Check the session and mark its score submitted in one atomic step.
    ///
    /// Of several concurrent calls for the same paid session exactly one
    /// succeeds; the others see `DuplicateSubmission`.
    pub async fn admit(&self, session_id: &str) -> Result<GameSession, GateError> {
        let outcome = self
            .store
            .transition(session_id, SessionState::Paid, SessionState::ScoreSubmitted)
            .await?;

        match outcome {
            Transition::Applied(session) => {
                info!("Session {session_id} admitted for score submission");
                Ok(session)
            }
            Transition::Missing => Err(SessionError::NotFound.into()),
            Transition::Conflict(current) => {
                classify(&current)?;
                // Paid yet conflicting means the store moved it under us.
                Err(StoreError::Unavailable(format!(
                    "session {session_id} changed during admission"
                ))
                .into())
            }
        }
    }
}

fn classify(session: &GameSession) -> Result<(), SessionError> {
    if !session.is_paid() {
        return Err(SessionError::Unpaid);
    }
    if session.score_submitted() {
        return Err(SessionError::DuplicateSubmission);
    }
    Ok(())
}
