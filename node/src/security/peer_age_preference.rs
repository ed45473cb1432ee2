//! Tracks how long each peer has been known, without ever denying admission.
//! Callers can consult [`PeerAgePreference::is_mature`] to prefer older peers
//! when a choice exists (e.g. picking among lookup-validation alternatives).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use crate::ids::Identifier;
use crate::security::{SecurityMetrics, SecurityModule};
use crate::types::NodeInfo;

const PRUNE_AFTER_SECONDS: f64 = 600.0;

pub struct PeerAgePreference {
    min_age_seconds: f64,
    first_seen: Mutex<HashMap<Identifier, Instant>>,
    new_nodes_seen: AtomicU64,
    young_rejections: AtomicU64,
    mature_accepts: AtomicU64,
}

impl PeerAgePreference {
    pub fn new(min_age_seconds: f64) -> Self {
        Self {
            min_age_seconds,
            first_seen: Mutex::new(HashMap::new()),
            new_nodes_seen: AtomicU64::new(0),
            young_rejections: AtomicU64::new(0),
            mature_accepts: AtomicU64::new(0),
        }
    }

    pub fn age_of(&self, id: Identifier) -> Option<f64> {
        self.first_seen.lock().unwrap().get(&id).map(|t| t.elapsed().as_secs_f64())
    }

    pub fn is_mature(&self, id: Identifier) -> bool {
        self.age_of(id).map(|age| age >= self.min_age_seconds).unwrap_or(false)
    }
}

impl SecurityModule for PeerAgePreference {
    fn name(&self) -> &str {
        "peer_age_preference"
    }

    fn allow_node(&self, info: &NodeInfo) -> bool {
        let mut seen = self.first_seen.lock().unwrap();
        match seen.get(&info.id) {
            Some(first) => {
                if first.elapsed().as_secs_f64() >= self.min_age_seconds {
                    self.mature_accepts.fetch_add(1, Ordering::Relaxed);
                } else {
                    self.young_rejections.fetch_add(1, Ordering::Relaxed);
                }
            }
            None => {
                seen.insert(info.id, Instant::now());
                self.new_nodes_seen.fetch_add(1, Ordering::Relaxed);
            }
        }
        true
    }

    fn tick(&self) {
        let mut seen = self.first_seen.lock().unwrap();
        seen.retain(|_, t| t.elapsed().as_secs_f64() < PRUNE_AFTER_SECONDS);
    }

    fn metrics(&self) -> SecurityMetrics {
        let mut m = SecurityMetrics::empty(self.name());
        m.counters.push(("new_nodes_seen".into(), self.new_nodes_seen.load(Ordering::Relaxed)));
        m.counters
            .push(("young_rejections".into(), self.young_rejections.load(Ordering::Relaxed)));
        m.counters.push(("mature_accepts".into(), self.mature_accepts.load(Ordering::Relaxed)));
        let tracked = self.first_seen.lock().unwrap().len() as f64;
        m.gauges.push(("tracked_nodes".into(), tracked));
        m
    }

    fn reset_metrics(&self) {
        self.new_nodes_seen.store(0, Ordering::Relaxed);
        self.young_rejections.store(0, Ordering::Relaxed);
        self.mature_accepts.store(0, Ordering::Relaxed);
    }
}
