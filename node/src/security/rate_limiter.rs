//! Per-IP token bucket throttling inbound messages. Ping/Pong always bypass
//! the limiter so liveness checks never starve under load.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use crate::protocol::messages::tag;
use crate::security::{SecurityMetrics, SecurityModule};
use crate::types::NodeAddress;

struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

pub struct RateLimiter {
    max_tokens: f64,
    refill_rate: f64,
    buckets: Mutex<HashMap<String, TokenBucket>>,
    allowed: AtomicU64,
    throttled: AtomicU64,
}

impl RateLimiter {
    pub fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            max_tokens,
            refill_rate,
            buckets: Mutex::new(HashMap::new()),
            allowed: AtomicU64::new(0),
            throttled: AtomicU64::new(0),
        }
    }

    fn consume(&self, ip: &str) -> bool {
        let mut buckets = self.buckets.lock().unwrap();
        let now = Instant::now();
        let bucket = buckets.entry(ip.to_string()).or_insert_with(|| TokenBucket {
            tokens: self.max_tokens,
            last_refill: now,
        });
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        bucket.last_refill = now;
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

impl SecurityModule for RateLimiter {
    fn name(&self) -> &str {
        "rate_limiter"
    }

    fn allow_message(&self, from: &NodeAddress, msg_tag: u8) -> bool {
        if msg_tag == tag::PING || msg_tag == tag::PONG {
            return true;
        }
        if self.consume(&from.host) {
            self.allowed.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            self.throttled.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    fn tick(&self) {
        let mut buckets = self.buckets.lock().unwrap();
        let now = Instant::now();
        buckets.retain(|_, b| now.duration_since(b.last_refill).as_secs_f64() < 60.0);
    }

    fn metrics(&self) -> SecurityMetrics {
        let mut m = SecurityMetrics::empty(self.name());
        m.counters.push(("allowed".into(), self.allowed.load(Ordering::Relaxed)));
        m.counters.push(("throttled".into(), self.throttled.load(Ordering::Relaxed)));
        let tracked = self.buckets.lock().unwrap().len() as f64;
        m.gauges.push(("tracked_ips".into(), tracked));
        m
    }

    fn reset_metrics(&self) {
        self.allowed.store(0, Ordering::Relaxed);
        self.throttled.store(0, Ordering::Relaxed);
    }
}
