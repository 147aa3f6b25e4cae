//! In-memory per-caller rate limiting.
//!
//! Each bucket keeps a sliding window of request instants per caller key.
//! The general bucket wraps every API route as middleware; the auth and
//! contact buckets are checked by the handlers that accept credentials or
//! submissions.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::{config::RateLimitConfig, error::AppError, state::AppState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    General,
    Auth,
    Contact,
}

#[derive(Debug, thiserror::Error)]
#[error("Too many requests, please try again later")]
pub struct RateLimitError {
    pub limit: usize,
    pub window_secs: u64,
    retry_after: Duration,
}

impl RateLimitError {
    pub fn retry_after_secs(&self) -> u64 {
        self.retry_after.as_secs().max(1)
    }
}

struct Windows {
    hits: HashMap<(Bucket, String), VecDeque<Instant>>,
    last_sweep: Option<Instant>,
}

#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<Windows>>,
    config: RateLimitConfig,
}

fn prune_window(deque: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while deque
        .front()
        .is_some_and(|t| now.saturating_duration_since(*t) >= window)
    {
        deque.pop_front();
    }
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Windows {
                hits: HashMap::new(),
                last_sweep: None,
            })),
            config,
        }
    }

    fn limit_for(&self, bucket: Bucket) -> usize {
        match bucket {
            Bucket::General => self.config.general,
            Bucket::Auth => self.config.auth,
            Bucket::Contact => self.config.contact,
        }
    }

    /// Records one request for `key`, failing once the bucket is full.
    pub fn check(&self, bucket: Bucket, key: &str) -> Result<(), RateLimitError> {
        self.check_at(bucket, key, Instant::now())
    }

    fn check_at(&self, bucket: Bucket, key: &str, now: Instant) -> Result<(), RateLimitError> {
        let window = Duration::from_secs(self.config.window_secs);
        let limit = self.limit_for(bucket);
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        // Callers that went quiet would otherwise stay in the map forever.
        let sweep_due = inner
            .last_sweep
            .map_or(true, |at| now.saturating_duration_since(at) >= window);
        if sweep_due {
            inner.hits.retain(|_, q| {
                prune_window(q, now, window);
                !q.is_empty()
            });
            inner.last_sweep = Some(now);
        }

        let entry_key = (bucket, key.to_owned());
        let hits = inner.hits.entry(entry_key.clone()).or_default();
        prune_window(hits, now, window);

        if hits.len() >= limit {
            let retry_after = hits
                .front()
                .map(|oldest| window.saturating_sub(now.saturating_duration_since(*oldest)))
                .unwrap_or(window);
            if hits.is_empty() {
                inner.hits.remove(&entry_key);
            }
            warn!(?bucket, key, limit, "rate limit exceeded");
            return Err(RateLimitError {
                limit,
                window_secs: self.config.window_secs,
                retry_after,
            });
        }

        hits.push_back(now);
        Ok(())
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .hits
            .len()
    }
}

/// Identity used to count requests: the peer address, or the first
/// `X-Forwarded-For` hop when running behind a trusted proxy.
#[derive(Debug, Clone)]
pub struct ClientKey(pub String);

fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match (trust_proxy, forwarded, peer) {
        (true, Some(ip), _) => ip.to_owned(),
        (_, _, Some(addr)) => addr.ip().to_string(),
        _ => "unknown".to_owned(),
    }
}

#[async_trait]
impl FromRequestParts<AppState> for ClientKey {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0);
        Ok(ClientKey(client_key(
            &parts.headers,
            peer,
            state.config.trust_proxy,
        )))
    }
}

/// Middleware applying the general cap to every API request.
pub async fn limit_general(
    State(state): State<AppState>,
    key: ClientKey,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    state.limiter.check(Bucket::General, &key.0)?;
    Ok(next.run(req).await)
}
