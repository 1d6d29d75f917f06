//! Fixed-window rate limiting per client key.
//!
//! Each key moves between two states:
//! - **Fresh**: no entry, or the entry's window ended (`reset_at < now`).
//!   The next request replaces the entry with `count = 1` and a new window.
//! - **Active**: `reset_at >= now`. Each request increments `count`; once it
//!   exceeds the quota the request is rejected with 429.
//!
//! Storage sits behind [`RateLimitStore`] so a shared or stricter backend can
//! replace the in-process map. Each store reports its [`Consistency`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use dashmap::{mapref::entry::Entry, DashMap};
use serde_json::json;
use tokio::task::JoinHandle;

use crate::config::RateLimitConfig;
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;

pub const RATE_LIMIT_MESSAGE: &str = "Too many requests, please try again later";

pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";

/// Source of wall-clock time in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// A clock that only moves when told to.
///
/// Public so integration tests and handler crates built on the gate can
/// drive window expiry deterministically through [`RateLimiter::with_parts`].
/// Nothing in the server path constructs one.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Counter state for one client key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub count: u64,
    /// End of the current window (epoch ms).
    pub reset_at_ms: u64,
}

impl RateLimitEntry {
    fn fresh(now_ms: u64, window_ms: u64) -> Self {
        Self {
            count: 1,
            reset_at_ms: now_ms.saturating_add(window_ms),
        }
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.reset_at_ms < now_ms
    }
}

/// How faithfully a store counts concurrent requests for the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consistency {
    /// Concurrent hits on one key may lose increments or reset twice.
    /// The limiter is then best-effort and may admit slightly more than the quota.
    AtLeastOnceCounted,
    /// The read-modify-write of a key is a critical section.
    Exact,
}

/// Keyed storage for rate-limit counters.
pub trait RateLimitStore: Send + Sync {
    /// Record a request: reset the entry if it is missing or expired,
    /// otherwise increment it. Returns the post-update entry.
    fn hit(&self, key: &str, now_ms: u64, window_ms: u64) -> RateLimitEntry;

    /// Current entry for a key, expired or not.
    fn peek(&self, key: &str) -> Option<RateLimitEntry>;

    /// Remove entries whose window has ended. Returns how many were removed.
    fn sweep_expired(&self, now_ms: u64) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn consistency(&self) -> Consistency;
}

/// In-process store backed by a sharded concurrent map.
///
/// The shard write lock is held for the whole reset-or-increment of a key,
/// so concurrent requests from one client are counted exactly. Entries are
/// only removed by [`RateLimitStore::sweep_expired`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, RateLimitEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateLimitStore for MemoryStore {
    fn hit(&self, key: &str, now_ms: u64, window_ms: u64) -> RateLimitEntry {
        match self.entries.entry(key.to_owned()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if entry.is_expired(now_ms) {
                    *entry = RateLimitEntry::fresh(now_ms, window_ms);
                } else {
                    entry.count = entry.count.saturating_add(1);
                }
                *entry
            }
            Entry::Vacant(vacant) => *vacant.insert(RateLimitEntry::fresh(now_ms, window_ms)),
        }
    }

    fn peek(&self, key: &str) -> Option<RateLimitEntry> {
        self.entries.get(key).map(|r| *r.value())
    }

    fn sweep_expired(&self, now_ms: u64) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = !entry.is_expired(now_ms);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn consistency(&self) -> Consistency {
        Consistency::Exact
    }
}

/// Quota state reported to the caller after a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub limit: u64,
    /// `limit - count`, clamped at zero.
    pub remaining: u64,
    pub reset_at_ms: u64,
    /// Whole seconds until the window resets, rounded up.
    pub retry_after_secs: u64,
}

impl RateLimitStatus {
    fn from_entry(entry: RateLimitEntry, limit: u64, now_ms: u64) -> Self {
        Self {
            limit,
            remaining: limit.saturating_sub(entry.count),
            reset_at_ms: entry.reset_at_ms,
            retry_after_secs: entry.reset_at_ms.saturating_sub(now_ms).div_ceil(1000),
        }
    }

    /// Set the informational `X-RateLimit-*` headers.
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(self.limit));
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(self.remaining));
        headers.insert(X_RATELIMIT_RESET, HeaderValue::from(self.reset_at_ms));
    }

    /// Terminal 429 response for a rejected request.
    pub fn rejection_response(&self) -> Response {
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": RATE_LIMIT_MESSAGE })),
        )
            .into_response();
        let headers = response.headers_mut();
        headers.insert(header::RETRY_AFTER, HeaderValue::from(self.retry_after_secs));
        self.apply_headers(headers);
        response
    }
}

/// Outcome of [`RateLimiter::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed(RateLimitStatus),
    Rejected(RateLimitStatus),
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed(_))
    }

    pub fn status(&self) -> RateLimitStatus {
        match self {
            RateLimitDecision::Allowed(s) | RateLimitDecision::Rejected(s) => *s,
        }
    }
}

/// Per-client fixed-window limiter.
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
    window_ms: u64,
    max_requests: u64,
}

impl RateLimiter {
    /// In-memory limiter on the system clock.
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_parts(
            config.window_ms,
            config.max_requests,
            Arc::new(MemoryStore::new()),
            Arc::new(SystemClock),
        )
    }

    pub fn with_parts(
        window_ms: u64,
        max_requests: u64,
        store: Arc<dyn RateLimitStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            clock,
            window_ms,
            max_requests,
        }
    }

    pub fn max_requests(&self) -> u64 {
        self.max_requests
    }

    pub fn consistency(&self) -> Consistency {
        self.store.consistency()
    }

    /// Count a request from `key` and decide whether it may proceed.
    pub fn check(&self, key: &str) -> RateLimitDecision {
        let now = self.clock.now_ms();
        let entry = self.store.hit(key, now, self.window_ms);
        let status = RateLimitStatus::from_entry(entry, self.max_requests, now);

        if entry.count > self.max_requests {
            tracing::warn!(
                client = %key,
                count = entry.count,
                limit = self.max_requests,
                retry_after_secs = status.retry_after_secs,
                "Rate limit exceeded"
            );
            metrics::record_rate_limited();
            RateLimitDecision::Rejected(status)
        } else {
            RateLimitDecision::Allowed(status)
        }
    }

    /// Current quota state for `key` without counting a request.
    ///
    /// An entry whose window has ended reports the full quota and the window
    /// the next request would open, since that request resets the counter.
    pub fn snapshot(&self, key: &str) -> Option<RateLimitStatus> {
        let now = self.clock.now_ms();
        self.store.peek(key).map(|entry| {
            if entry.is_expired(now) {
                let next = RateLimitEntry {
                    count: 0,
                    reset_at_ms: now.saturating_add(self.window_ms),
                };
                RateLimitStatus::from_entry(next, self.max_requests, now)
            } else {
                RateLimitStatus::from_entry(entry, self.max_requests, now)
            }
        })
    }

    /// Evict expired entries.
    pub fn sweep(&self) -> usize {
        let removed = self.store.sweep_expired(self.clock.now_ms());
        let remaining = self.store.len();
        metrics::record_rate_limit_entries(remaining);
        if removed > 0 {
            tracing::debug!(removed, remaining, "Swept expired rate limit entries");
        }
        removed
    }

    pub fn entry_count(&self) -> usize {
        self.store.len()
    }
}

/// Periodically evict expired entries until shutdown is signalled.
pub fn spawn_sweeper(
    limiter: Arc<RateLimiter>,
    every: Duration,
    mut shutdown: ShutdownSignal,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    limiter.sweep();
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Rate limit sweeper stopped");
                    break;
                }
            }
        }
    })
}
