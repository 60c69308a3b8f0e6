// ARCHITECTURE: Rate Limiter - Per-Client Admission Control
//
// Three interchangeable strategies, resolved once at construction time:
// 1. TOKEN BUCKET: continuous refill with a capped burst allowance (default)
// 2. SLIDING WINDOW: exact request timestamps over the trailing 60 seconds
// 3. FIXED WINDOW: discrete 60-second counting buckets
//
// Every strategy keeps one self-describing record per client identifier.
// Records are created lazily on first observation and can be evicted at any
// time without correctness loss: a re-observed client simply starts fresh
// (bucket full, window empty).

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::{RateLimitConfig, RateLimitStrategy};

/// All window-based strategies count over a trailing/tumbling minute.
const WINDOW: Duration = Duration::from_secs(60);

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    /// Seconds until the caller should retry. Always >= 1 when denying.
    pub retry_after: Option<u64>,
}

impl RateDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            retry_after: None,
        }
    }

    fn deny(retry_after: u64) -> Self {
        Self {
            allowed: false,
            retry_after: Some(retry_after.max(1)),
        }
    }
}

/// Admission control for a single class of clients.
///
/// Implementations never fail: an unseen client starts with its full
/// allowance, and the decision for one client is independent of every other
/// client's state.
#[async_trait]
pub trait AdmissionControl: Send + Sync {
    /// Check whether `client_id` may proceed, consuming one unit of its
    /// allowance if so.
    async fn is_allowed(&self, client_id: &str) -> RateDecision;

    /// Drop a client's record unconditionally (administrative override,
    /// test isolation).
    async fn reset(&self, client_id: &str);

    /// Evict records idle for longer than `max_idle`. Returns the number of
    /// evicted records.
    async fn sweep(&self, max_idle: Duration) -> usize;

    /// Number of client records currently tracked.
    async fn tracked_clients(&self) -> usize;
}

/// Build the configured strategy. The choice is made exactly once here;
/// per-call code only sees the trait object.
pub fn build(config: &RateLimitConfig) -> Arc<dyn AdmissionControl> {
    let limiter: Arc<dyn AdmissionControl> = match config.strategy {
        RateLimitStrategy::TokenBucket => Arc::new(TokenBucketLimiter::new(
            config.requests_per_minute,
            config.burst_size,
        )),
        RateLimitStrategy::SlidingWindow => {
            Arc::new(SlidingWindowLimiter::new(config.requests_per_minute))
        }
        RateLimitStrategy::FixedWindow => {
            Arc::new(FixedWindowLimiter::new(config.requests_per_minute))
        }
    };
    info!(
        strategy = ?config.strategy,
        requests_per_minute = config.requests_per_minute,
        burst_size = config.burst_size,
        "rate limiter configured"
    );
    limiter
}

// Shared idle-eviction plumbing. Each record remembers when it was last
// touched; sweeping retains only recently-seen records.
trait Tracked {
    fn last_seen(&self) -> Instant;
}

async fn sweep_idle<R: Tracked>(
    clients: &RwLock<HashMap<String, R>>,
    max_idle: Duration,
) -> usize {
    let now = Instant::now();
    let mut clients = clients.write().await;
    let before = clients.len();
    clients.retain(|_, record| now.saturating_duration_since(record.last_seen()) <= max_idle);
    let evicted = before - clients.len();
    if evicted > 0 {
        debug!(evicted, tracked = clients.len(), "evicted idle client records");
    }
    evicted
}

// ---------------------------------------------------------------------------
// Token bucket
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct BucketRecord {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
}

impl BucketRecord {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
            last_seen: now,
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64, now: Instant) -> RateDecision {
        self.last_seen = now;

        // Continuous refill from elapsed time, capped at capacity.
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            RateDecision::allow()
        } else {
            let deficit = 1.0 - self.tokens;
            RateDecision::deny((deficit / refill_rate).ceil() as u64)
        }
    }
}

impl Tracked for BucketRecord {
    fn last_seen(&self) -> Instant {
        self.last_seen
    }
}

/// Token-bucket admission: bursts up to `burst_size` are admitted as long as
/// the long-run average stays at `requests_per_minute`.
pub struct TokenBucketLimiter {
    capacity: f64,
    refill_rate: f64,
    clients: RwLock<HashMap<String, BucketRecord>>,
}

impl TokenBucketLimiter {
    pub fn new(requests_per_minute: u32, burst_size: u32) -> Self {
        Self {
            capacity: f64::from(burst_size),
            refill_rate: f64::from(requests_per_minute) / 60.0,
            clients: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl AdmissionControl for TokenBucketLimiter {
    async fn is_allowed(&self, client_id: &str) -> RateDecision {
        let now = Instant::now();
        // Single write guard for the whole read-modify-write: two concurrent
        // checks for the same client can never spend the same token. No
        // await point while the guard is held.
        let mut clients = self.clients.write().await;
        let record = clients
            .entry(client_id.to_owned())
            .or_insert_with(|| BucketRecord::new(self.capacity, now));
        record.try_acquire(self.capacity, self.refill_rate, now)
    }

    async fn reset(&self, client_id: &str) {
        self.clients.write().await.remove(client_id);
    }

    async fn sweep(&self, max_idle: Duration) -> usize {
        sweep_idle(&self.clients, max_idle).await
    }

    async fn tracked_clients(&self) -> usize {
        self.clients.read().await.len()
    }
}

// ---------------------------------------------------------------------------
// Sliding window
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct WindowRecord {
    hits: VecDeque<Instant>,
    last_seen: Instant,
}

impl WindowRecord {
    fn new(now: Instant) -> Self {
        Self {
            hits: VecDeque::new(),
            last_seen: now,
        }
    }

    fn try_acquire(&mut self, max_requests: u32, now: Instant) -> RateDecision {
        self.last_seen = now;

        // Prune timestamps that have aged out of the trailing window.
        while let Some(&oldest) = self.hits.front() {
            if now.saturating_duration_since(oldest) >= WINDOW {
                self.hits.pop_front();
            } else {
                break;
            }
        }

        if (self.hits.len() as u32) < max_requests {
            self.hits.push_back(now);
            RateDecision::allow()
        } else {
            // Denied until the oldest admitted request ages out.
            let oldest = self.hits[0];
            let wait = (oldest + WINDOW).saturating_duration_since(now);
            RateDecision::deny(wait.as_secs() + 1)
        }
    }
}

impl Tracked for WindowRecord {
    fn last_seen(&self) -> Instant {
        self.last_seen
    }
}

/// Exact trailing-window admission. Memory grows with per-client traffic
/// (one timestamp per admitted request in the window).
pub struct SlidingWindowLimiter {
    max_requests: u32,
    clients: RwLock<HashMap<String, WindowRecord>>,
}

impl SlidingWindowLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            max_requests: requests_per_minute,
            clients: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl AdmissionControl for SlidingWindowLimiter {
    async fn is_allowed(&self, client_id: &str) -> RateDecision {
        let now = Instant::now();
        let mut clients = self.clients.write().await;
        let record = clients
            .entry(client_id.to_owned())
            .or_insert_with(|| WindowRecord::new(now));
        record.try_acquire(self.max_requests, now)
    }

    async fn reset(&self, client_id: &str) {
        self.clients.write().await.remove(client_id);
    }

    async fn sweep(&self, max_idle: Duration) -> usize {
        sweep_idle(&self.clients, max_idle).await
    }

    async fn tracked_clients(&self) -> usize {
        self.clients.read().await.len()
    }
}

// ---------------------------------------------------------------------------
// Fixed window
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct CounterRecord {
    window_start: Instant,
    count: u32,
    last_seen: Instant,
}

impl CounterRecord {
    fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            count: 0,
            last_seen: now,
        }
    }

    fn try_acquire(&mut self, max_requests: u32, now: Instant) -> RateDecision {
        self.last_seen = now;

        if now.saturating_duration_since(self.window_start) >= WINDOW {
            // Window rolled over; the triggering request opens the new one.
            self.window_start = now;
            self.count = 1;
            return RateDecision::allow();
        }

        if self.count < max_requests {
            self.count += 1;
            RateDecision::allow()
        } else {
            let wait = (self.window_start + WINDOW).saturating_duration_since(now);
            RateDecision::deny(wait.as_secs() + 1)
        }
    }
}

impl Tracked for CounterRecord {
    fn last_seen(&self) -> Instant {
        self.last_seen
    }
}

/// Tumbling-window admission: cheapest bookkeeping, but a burst straddling a
/// window boundary can pass up to twice the configured rate. That is inherent
/// to the strategy, not a defect.
pub struct FixedWindowLimiter {
    max_requests: u32,
    clients: RwLock<HashMap<String, CounterRecord>>,
}

impl FixedWindowLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            max_requests: requests_per_minute,
            clients: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl AdmissionControl for FixedWindowLimiter {
    async fn is_allowed(&self, client_id: &str) -> RateDecision {
        let now = Instant::now();
        let mut clients = self.clients.write().await;
        let record = clients
            .entry(client_id.to_owned())
            .or_insert_with(|| CounterRecord::new(now));
        record.try_acquire(self.max_requests, now)
    }

    async fn reset(&self, client_id: &str) {
        self.clients.write().await.remove(client_id);
    }

    async fn sweep(&self, max_idle: Duration) -> usize {
        sweep_idle(&self.clients, max_idle).await
    }

    async fn tracked_clients(&self) -> usize {
        self.clients.read().await.len()
    }
}
