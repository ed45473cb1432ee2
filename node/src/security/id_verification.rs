//! Denies any peer whose advertised id does not match `hash(address)`.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::ids::Identifier;
use crate::security::{SecurityMetrics, SecurityModule};
use crate::types::NodeInfo;

pub struct IdVerification {
    accepted: AtomicU64,
    rejected: AtomicU64,
    lookup_rejections: AtomicU64,
}

impl IdVerification {
    pub fn new() -> Self {
        Self {
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            lookup_rejections: AtomicU64::new(0),
        }
    }
}

impl Default for IdVerification {
    fn default() -> Self {
        Self::new()
    }
}

impl SecurityModule for IdVerification {
    fn name(&self) -> &str {
        "id_verification"
    }

    fn allow_node(&self, info: &NodeInfo) -> bool {
        if info.is_self_consistent() {
            self.accepted.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    fn validate_lookup(&self, _target: Identifier, result: &NodeInfo) -> bool {
        if result.is_self_consistent() {
            true
        } else {
            self.lookup_rejections.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    fn metrics(&self) -> SecurityMetrics {
        let mut m = SecurityMetrics::empty(self.name());
        m.counters.push(("accepted".into(), self.accepted.load(Ordering::Relaxed)));
        m.counters.push(("rejected".into(), self.rejected.load(Ordering::Relaxed)));
        m.counters
            .push(("lookup_rejections".into(), self.lookup_rejections.load(Ordering::Relaxed)));
        m
    }

    fn reset_metrics(&self) {
        self.accepted.store(0, Ordering::Relaxed);
        self.rejected.store(0, Ordering::Relaxed);
        self.lookup_rejections.store(0, Ordering::Relaxed);
    }
}
