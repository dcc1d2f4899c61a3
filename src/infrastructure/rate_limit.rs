use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Buckets idle this long are full again and get dropped. A returning client
/// starts over with a full bucket.
const IDLE_EVICTION: Duration = Duration::from_secs(60);

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    last: Instant,
}

/// Per-client token bucket. Each client starts with `rate` tokens, refills at
/// `rate` tokens per second up to `rate`, and spends one token per request.
pub struct RateLimiter {
    rate: f64,
    clock: Arc<dyn Clock>,
    buckets: Mutex<Buckets>,
}

struct Buckets {
    by_client: HashMap<String, Bucket>,
    last_sweep: Instant,
}

impl Buckets {
    fn sweep(&mut self, now: Instant) {
        if now.saturating_duration_since(self.last_sweep) < IDLE_EVICTION {
            return;
        }
        self.by_client
            .retain(|_, b| now.saturating_duration_since(b.last) < IDLE_EVICTION);
        self.last_sweep = now;
    }
}

impl RateLimiter {
    pub fn new(rate: f64, clock: Arc<dyn Clock>) -> Self {
        let buckets = Buckets {
            by_client: HashMap::new(),
            last_sweep: clock.now(),
        };
        Self {
            rate,
            clock,
            buckets: Mutex::new(buckets),
        }
    }

    pub fn with_system_clock(rate: f64) -> Self {
        Self::new(rate, Arc::new(SystemClock))
    }

    pub fn allow(&self, client_id: &str) -> bool {
        let now = self.clock.now();
        // A poisoned map only means another request panicked mid-update; the
        // buckets are still usable.
        let mut buckets = self
            .buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        buckets.sweep(now);

        let bucket = buckets
            .by_client
            .entry(client_id.to_string())
            .or_insert(Bucket {
                tokens: self.rate,
                last: now,
            });

        let elapsed = now.saturating_duration_since(bucket.last).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate).min(self.rate);
        bucket.last = now;

        if bucket.tokens < 1.0 {
            return false;
        }
        bucket.tokens -= 1.0;
        true
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets
            .lock()
            .map(|b| b.by_client.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().by_client.len())
    }
}
