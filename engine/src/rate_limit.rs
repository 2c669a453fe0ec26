//! Fixed-window request limiter keyed by client identity.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::debug;
use serde_json::json;

use crate::config::SdkConfig;

/// Expired windows are swept once the table grows past this.
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_after: Duration,
}

#[derive(Debug)]
pub struct FixedWindowLimiter {
    window: Duration,
    max: u32,
    counters: Mutex<HashMap<String, Window>>,
}

impl FixedWindowLimiter {
    pub fn new(window: Duration, max: u32) -> Self {
        Self {
            window,
            max,
            counters: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &SdkConfig) -> Self {
        Self::new(config.rate_limit_window, config.rate_limit_max)
    }

    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);

        if counters.len() > SWEEP_THRESHOLD {
            let window = self.window;
            counters.retain(|_, w| now.saturating_duration_since(w.started) < window);
        }

        let entry = counters.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.saturating_duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }

        let allowed = entry.count < self.max;
        if allowed {
            entry.count += 1;
        }

        RateDecision {
            allowed,
            limit: self.max,
            remaining: self.max.saturating_sub(entry.count),
            reset_after: self
                .window
                .saturating_sub(now.saturating_duration_since(entry.started)),
        }
    }
}

/// Identity used for limiting: first `X-Forwarded-For` hop, else the peer
/// address, else one shared bucket.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "anonymous".to_string())
}

/// axum middleware; mount with `middleware::from_fn_with_state`.
pub async fn rate_limit(
    State(limiter): State<Arc<FixedWindowLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let key = client_key(request.headers(), peer);
    let decision = limiter.check(&key);

    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        debug!("Rate limit exceeded for {key}");
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": "Too many requests, please try again later." })),
        )
            .into_response();
        response
            .headers_mut()
            .insert("retry-after", HeaderValue::from(reset_secs(&decision)));
        response
    };

    let headers = response.headers_mut();
    headers.insert("ratelimit-limit", HeaderValue::from(decision.limit));
    headers.insert("ratelimit-remaining", HeaderValue::from(decision.remaining));
    headers.insert("ratelimit-reset", HeaderValue::from(reset_secs(&decision)));
    response
}

fn reset_secs(decision: &RateDecision) -> u64 {
    // Round up so clients never retry early.
    let secs = decision.reset_after.as_secs();
    if decision.reset_after.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}
