//! Per-player aggregates and the daily leaderboards derived from them.
//!
//! Leaderboards are never stored; they are ranked on read from `PlayerStats`.
//! Ties are broken by earliest `last_played` (whoever reached the score
//! first), then by wallet in lexical order, so a snapshot is deterministic.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::StoreError;

/// Default number of entries returned when no limit is given.
pub const DEFAULT_LEADERBOARD_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaderboardKind {
    /// Ranked by cumulative score.
    Total,
    /// Ranked by best single-session score.
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStats {
    pub wallet: String,
    pub total_score: u64,
    pub high_score: u64,
    pub games_played: u64,
    /// Milliseconds since the Unix epoch; 0 when never played.
    pub last_played: i64,
}

impl PlayerStats {
    /// Zeroed stats, also served for wallets that never played.
    pub fn empty(wallet: impl Into<String>) -> Self {
        Self {
            wallet: wallet.into(),
            total_score: 0,
            high_score: 0,
            games_played: 0,
            last_played: 0,
        }
    }

    pub fn record(&mut self, score: u64, played_at: DateTime<Utc>) {
        self.total_score = self.total_score.saturating_add(score);
        self.high_score = self.high_score.max(score);
        self.games_played = self.games_played.saturating_add(1);
        self.last_played = played_at.timestamp_millis();
    }

    pub fn score_for(&self, kind: LeaderboardKind) -> u64 {
        match kind {
            LeaderboardKind::Total => self.total_score,
            LeaderboardKind::High => self.high_score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    /// 1-based, dense.
    pub rank: u32,
    pub wallet: String,
    pub score: u64,
    pub games_played: u64,
    pub last_played: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardData {
    pub entries: Vec<LeaderboardEntry>,
    pub total_players: usize,
    pub last_updated: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: LeaderboardKind,
}

impl LeaderboardData {
    pub fn empty(kind: LeaderboardKind, now: DateTime<Utc>) -> Self {
        Self {
            entries: Vec::new(),
            total_players: 0,
            last_updated: now,
            kind,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Rank `players` for `kind` and keep the first `limit` entries.
///
/// Any ordering or rank carried by the input is ignored.
pub fn rank_players(
    players: impl IntoIterator<Item = PlayerStats>,
    kind: LeaderboardKind,
    limit: usize,
    now: DateTime<Utc>,
) -> LeaderboardData {
    let mut players: Vec<PlayerStats> = players.into_iter().collect();
    let total_players = players.len();

    players.sort_by(|a, b| compare_for(kind, a, b));

    let entries = players
        .into_iter()
        .take(limit)
        .zip(1u32..)
        .map(|(stats, rank)| LeaderboardEntry {
            rank,
            score: stats.score_for(kind),
            wallet: stats.wallet,
            games_played: stats.games_played,
            last_played: stats.last_played,
        })
        .collect();

    LeaderboardData {
        entries,
        total_players,
        last_updated: now,
        kind,
    }
}

fn compare_for(kind: LeaderboardKind, a: &PlayerStats, b: &PlayerStats) -> Ordering {
    b.score_for(kind)
        .cmp(&a.score_for(kind))
        .then_with(|| a.last_played.cmp(&b.last_played))
        .then_with(|| a.wallet.cmp(&b.wallet))
}

/// Read side of the leaderboard aggregation.
#[async_trait]
pub trait LeaderboardStore: Send + Sync {
    /// Today's (UTC) leaderboard of the given kind.
    async fn get_daily_leaderboard(
        &self,
        kind: LeaderboardKind,
        limit: Option<usize>,
    ) -> Result<LeaderboardData, StoreError>;

    /// All-time stats for one wallet.
    async fn get_player_stats(&self, wallet: &str) -> Result<Option<PlayerStats>, StoreError>;

    /// Today's (UTC) stats for one wallet.
    async fn get_daily_player_stats(&self, wallet: &str) -> Result<Option<PlayerStats>, StoreError>;
}

/// Write side: folds one session's score into the aggregates.
#[async_trait]
pub trait ScoreRecorder: Send + Sync {
    /// Returns the wallet's updated stats for the current day.
    async fn record_score(&self, wallet: &str, score: u64) -> Result<PlayerStats, StoreError>;
}

#[derive(Default)]
struct Aggregates {
    all_time: HashMap<String, PlayerStats>,
    daily: BTreeMap<NaiveDate, HashMap<String, PlayerStats>>,
}

/// Leaderboard store kept in process memory.
///
/// Daily aggregates are kept for the current and previous UTC day only.
#[derive(Default)]
pub struct MemoryLeaderboardStore {
    inner: RwLock<Aggregates>,
}

impl MemoryLeaderboardStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_score_at(&self, wallet: &str, score: u64, at: DateTime<Utc>) -> PlayerStats {
        let day = at.date_naive();
        let mut inner = self.inner.write().await;

        inner
            .all_time
            .entry(wallet.to_string())
            .or_insert_with(|| PlayerStats::empty(wallet))
            .record(score, at);

        let keep_from = day.pred_opt().unwrap_or(day);
        inner.daily.retain(|d, _| *d >= keep_from);

        let daily = inner
            .daily
            .entry(day)
            .or_default()
            .entry(wallet.to_string())
            .or_insert_with(|| PlayerStats::empty(wallet));
        daily.record(score, at);
        daily.clone()
    }

    pub async fn leaderboard_for_day(
        &self,
        day: NaiveDate,
        kind: LeaderboardKind,
        limit: Option<usize>,
        now: DateTime<Utc>,
    ) -> LeaderboardData {
        let inner = self.inner.read().await;
        let players = inner
            .daily
            .get(&day)
            .map(|players| players.values().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        rank_players(players, kind, limit.unwrap_or(DEFAULT_LEADERBOARD_LIMIT), now)
    }

    pub async fn stats_for_day(&self, day: NaiveDate, wallet: &str) -> Option<PlayerStats> {
        let inner = self.inner.read().await;
        inner.daily.get(&day).and_then(|players| players.get(wallet)).cloned()
    }
}

#[async_trait]
impl LeaderboardStore for MemoryLeaderboardStore {
    async fn get_daily_leaderboard(
        &self,
        kind: LeaderboardKind,
        limit: Option<usize>,
    ) -> Result<LeaderboardData, StoreError> {
        let now = Utc::now();
        Ok(self.leaderboard_for_day(now.date_naive(), kind, limit, now).await)
    }

    async fn get_player_stats(&self, wallet: &str) -> Result<Option<PlayerStats>, StoreError> {
        Ok(self.inner.read().await.all_time.get(wallet).cloned())
    }

    async fn get_daily_player_stats(&self, wallet: &str) -> Result<Option<PlayerStats>, StoreError> {
        Ok(self.stats_for_day(Utc::now().date_naive(), wallet).await)
    }
}

#[async_trait]
impl ScoreRecorder for MemoryLeaderboardStore {
    async fn record_score(&self, wallet: &str, score: u64) -> Result<PlayerStats, StoreError> {
        Ok(self.record_score_at(wallet, score, Utc::now()).await)
    }
}
