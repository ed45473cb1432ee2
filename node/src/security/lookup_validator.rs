//! Cross-checks a `find_successor` answer against a handful of alternative
//! peers before the caller trusts it.
//!
//! The two closures are supplied by the node at construction time so this
//! module never holds a reference to the node itself: `alternatives_fn`
//! lists other candidates for a target id (drawn from the finger table),
//! and `query_fn` asks one specific alternative what *it* thinks the
//! successor of `target` is.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::ids::Identifier;
use crate::security::{SecurityMetrics, SecurityModule};
use crate::types::{NodeAddress, NodeInfo};

type AlternativesFn = Box<dyn Fn(Identifier, Identifier) -> Vec<NodeInfo> + Send + Sync>;
type QueryFn = Box<dyn Fn(&NodeAddress, Identifier) -> Option<NodeInfo> + Send + Sync>;

pub struct LookupValidator {
    alternatives_fn: AlternativesFn,
    query_fn: QueryFn,
    num_checks: usize,
    total_validations: AtomicU64,
    confirmed: AtomicU64,
    conflicts: AtomicU64,
}

impl LookupValidator {
    pub fn new(alternatives_fn: AlternativesFn, query_fn: QueryFn, num_checks: usize) -> Self {
        Self {
            alternatives_fn,
            query_fn,
            num_checks,
            total_validations: AtomicU64::new(0),
            confirmed: AtomicU64::new(0),
            conflicts: AtomicU64::new(0),
        }
    }
}

impl SecurityModule for LookupValidator {
    fn name(&self) -> &str {
        "lookup_validator"
    }

    fn validate_lookup(&self, target: Identifier, result: &NodeInfo) -> bool {
        self.total_validations.fetch_add(1, Ordering::Relaxed);
        let alternatives = (self.alternatives_fn)(target, result.id);
        let mut queries_made = 0usize;
        let mut confirmations = 0usize;
        for alt in alternatives.iter().filter(|a| a.id != result.id).take(self.num_checks) {
            queries_made += 1;
            if let Some(answer) = (self.query_fn)(&alt.address, target) {
                if answer.id == result.id {
                    confirmations += 1;
                }
            }
        }

        if queries_made == 0 {
            return true;
        }

        if confirmations > 0 {
            self.confirmed.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            self.conflicts.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    fn metrics(&self) -> SecurityMetrics {
        let mut m = SecurityMetrics::empty(self.name());
        m.counters
            .push(("total_validations".into(), self.total_validations.load(Ordering::Relaxed)));
        m.counters.push(("confirmed".into(), self.confirmed.load(Ordering::Relaxed)));
        m.counters.push(("conflicts".into(), self.conflicts.load(Ordering::Relaxed)));
        m
    }

    fn reset_metrics(&self) {
        self.total_validations.store(0, Ordering::Relaxed);
        self.confirmed.store(0, Ordering::Relaxed);
        self.conflicts.store(0, Ordering::Relaxed);
    }
}
