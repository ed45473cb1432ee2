//! Plants decoy key/value pairs in the local store and periodically checks
//! they haven't been tampered with or gone missing.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::security::{SecurityMetrics, SecurityModule};

type GetFn = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;
type PutFn = Box<dyn Fn(String, String) + Send + Sync>;

pub struct HoneypotMonitor {
    sentinels: Vec<(String, String)>,
    get_fn: GetFn,
    put_fn: PutFn,
    placed: AtomicBool,
    placed_count: AtomicU64,
    checks: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    tampered: AtomicU64,
}

impl HoneypotMonitor {
    pub fn new(get_fn: GetFn, put_fn: PutFn, num_sentinels: usize) -> Self {
        let sentinels = (0..num_sentinels)
            .map(|n| (format!("__honeypot_{n}"), format!("sentinel_value_{n}")))
            .collect();
        Self {
            sentinels,
            get_fn,
            put_fn,
            placed: AtomicBool::new(false),
            placed_count: AtomicU64::new(0),
            checks: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            tampered: AtomicU64::new(0),
        }
    }

    pub fn place_sentinels(&self) {
        for (k, v) in &self.sentinels {
            (self.put_fn)(k.clone(), v.clone());
        }
        self.placed_count.store(self.sentinels.len() as u64, Ordering::Relaxed);
        self.placed.store(true, Ordering::Relaxed);
    }

    fn verify_sentinels(&self) {
        for (k, expected) in &self.sentinels {
            self.checks.fetch_add(1, Ordering::Relaxed);
            match (self.get_fn)(k) {
                Some(actual) if &actual == expected => {
                    self.successes.fetch_add(1, Ordering::Relaxed);
                }
                Some(_) => {
                    self.tampered.fetch_add(1, Ordering::Relaxed);
                }
                None => {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }
}

impl SecurityModule for HoneypotMonitor {
    fn name(&self) -> &str {
        "honeypot_monitor"
    }

    fn tick(&self) {
        if !self.placed.load(Ordering::Relaxed) {
            self.place_sentinels();
        }
        self.verify_sentinels();
    }

    fn metrics(&self) -> SecurityMetrics {
        let mut m = SecurityMetrics::empty(self.name());
        let checks = self.checks.load(Ordering::Relaxed);
        let successes = self.successes.load(Ordering::Relaxed);
        m.counters.push(("placed".into(), self.placed_count.load(Ordering::Relaxed)));
        m.counters.push(("checks".into(), checks));
        m.counters.push(("successes".into(), successes));
        m.counters.push(("failures".into(), self.failures.load(Ordering::Relaxed)));
        m.counters.push(("tampered".into(), self.tampered.load(Ordering::Relaxed)));
        let ratio = if checks == 0 { 1.0 } else { successes as f64 / checks as f64 };
        m.gauges.push(("integrity_ratio".into(), ratio));
        m
    }

    fn reset_metrics(&self) {
        self.checks.store(0, Ordering::Relaxed);
        self.successes.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
        self.tampered.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::collections::HashMap;

    fn wired(store: Arc<Mutex<HashMap<String, String>>>, n: usize) -> HoneypotMonitor {
        let get_store = store.clone();
        let put_store = store;
        HoneypotMonitor::new(
            Box::new(move |k| get_store.lock().unwrap().get(k).cloned()),
            Box::new(move |k, v| {
                put_store.lock().unwrap().insert(k, v);
            }),
            n,
        )
    }

    #[test]
    fn first_tick_places_sentinels_and_all_succeed() {
        let store = Arc::new(Mutex::new(HashMap::new()));
        let monitor = wired(store, 3);
        monitor.tick();
        let m = monitor.metrics();
        assert_eq!(m.counters[0].1, 3);
        assert_eq!(m.counters[2].1, 3);
    }

    #[test]
    fn tampered_sentinel_is_detected() {
        let store = Arc::new(Mutex::new(HashMap::new()));
        let monitor = wired(store.clone(), 1);
        monitor.place_sentinels();
        store.lock().unwrap().insert("__honeypot_0".to_string(), "evil".to_string());
        monitor.tick();
        assert_eq!(monitor.metrics().counters[4].1, 1);
    }

    #[test]
    fn missing_sentinel_is_a_failure() {
        let store = Arc::new(Mutex::new(HashMap::new()));
        let monitor = wired(store.clone(), 1);
        monitor.place_sentinels();
        store.lock().unwrap().clear();
        monitor.tick();
        assert_eq!(monitor.metrics().counters[3].1, 1);
    }
}
