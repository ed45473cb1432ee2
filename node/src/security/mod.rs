//! The pluggable admission / message / lookup-validation pipeline.
//!
//! Every module implements a fixed set of hooks, each defaulted to "allow" or
//! a no-op, so a module needs only override what it actually polices.

pub mod honeypot_monitor;
pub mod id_verification;
pub mod lookup_validator;
pub mod peer_age_preference;
pub mod rate_limiter;
pub mod subnet_diversity;

use crate::ids::Identifier;
use crate::types::{NodeAddress, NodeInfo};

#[derive(Debug, Clone)]
pub struct SecurityMetrics {
    pub module_name: String,
    pub counters: Vec<(String, u64)>,
    pub gauges: Vec<(String, f64)>,
}

impl SecurityMetrics {
    pub fn empty(module_name: &str) -> Self {
        Self { module_name: module_name.to_string(), counters: Vec::new(), gauges: Vec::new() }
    }

    fn to_json(&self) -> String {
        let counters: Vec<String> =
            self.counters.iter().map(|(k, v)| format!("\"{}\":{}", k, v)).collect();
        let gauges: Vec<String> =
            self.gauges.iter().map(|(k, v)| format!("\"{}\":{}", k, v)).collect();
        format!(
            "{{\"module\":\"{}\",\"counters\":{{{}}},\"gauges\":{{{}}}}}",
            self.module_name,
            counters.join(","),
            gauges.join(",")
        )
    }
}

/// A hook in the admission/message/lookup pipeline.
///
/// All hooks default to "allow"/no-op so a module overrides only what it
/// actually enforces.
pub trait SecurityModule: Send + Sync {
    fn name(&self) -> &str;

    fn allow_node(&self, _info: &NodeInfo) -> bool {
        true
    }

    fn allow_message(&self, _from: &NodeAddress, _tag: u8) -> bool {
        true
    }

    fn validate_lookup(&self, _target: Identifier, _result: &NodeInfo) -> bool {
        true
    }

    /// Called once per maintenance cycle for periodic housekeeping.
    fn tick(&self) {}

    /// Called when a previously admitted peer is known to be gone, so
    /// per-peer accounting (like subnet counts) can be released.
    fn node_removed(&self, _info: &NodeInfo) {}

    fn metrics(&self) -> SecurityMetrics {
        SecurityMetrics::empty(self.name())
    }

    fn reset_metrics(&self) {}
}

/// The ordered pipeline. Any module denying a hook short-circuits the rest.
pub struct SecurityPolicy {
    modules: Vec<Box<dyn SecurityModule>>,
}

impl SecurityPolicy {
    pub fn new(modules: Vec<Box<dyn SecurityModule>>) -> Self {
        Self { modules }
    }

    pub fn allow_node(&self, info: &NodeInfo) -> bool {
        self.modules.iter().all(|m| m.allow_node(info))
    }

    pub fn allow_message(&self, from: &NodeAddress, tag: u8) -> bool {
        self.modules.iter().all(|m| m.allow_message(from, tag))
    }

    pub fn validate_lookup(&self, target: Identifier, result: &NodeInfo) -> bool {
        self.modules.iter().all(|m| m.validate_lookup(target, result))
    }

    pub fn tick(&self) {
        for m in &self.modules {
            m.tick();
        }
    }

    pub fn node_removed(&self, info: &NodeInfo) {
        for m in &self.modules {
            m.node_removed(info);
        }
    }

    pub fn metrics(&self) -> Vec<SecurityMetrics> {
        self.modules.iter().map(|m| m.metrics()).collect()
    }

    pub fn metrics_json(&self) -> String {
        let parts: Vec<String> = self.metrics().iter().map(SecurityMetrics::to_json).collect();
        format!("[{}]", parts.join(","))
    }

    pub fn reset_metrics(&self) {
        for m in &self.modules {
            m.reset_metrics();
        }
    }

    pub fn module_named(&self, name: &str) -> Option<&dyn SecurityModule> {
        self.modules.iter().find(|m| m.name() == name).map(|b| b.as_ref())
    }
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeAddress;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct AlwaysDeny {
        calls: AtomicU64,
    }

    impl SecurityModule for AlwaysDeny {
        fn name(&self) -> &str {
            "always_deny"
        }
        fn allow_message(&self, _from: &NodeAddress, _tag: u8) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            false
        }
    }

    struct NeverCalled;
    impl SecurityModule for NeverCalled {
        fn name(&self) -> &str {
            "never_called"
        }
        fn allow_message(&self, _from: &NodeAddress, _tag: u8) -> bool {
            panic!("short-circuit should have prevented this call");
        }
    }

    #[test]
    fn deny_short_circuits_remaining_modules() {
        let policy = SecurityPolicy::new(vec![
            Box::new(AlwaysDeny { calls: AtomicU64::new(0) }),
            Box::new(NeverCalled),
        ]);
        let addr = NodeAddress::new("127.0.0.1", 9000);
        assert!(!policy.allow_message(&addr, 0x07));
    }

    #[test]
    fn empty_policy_allows_everything() {
        let policy = SecurityPolicy::default();
        let addr = NodeAddress::new("127.0.0.1", 9000);
        assert!(policy.allow_message(&addr, 0x07));
    }
}
