//! Caps how many admitted peers may share the same `/24`-equivalent subnet.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::security::{SecurityMetrics, SecurityModule};
use crate::types::NodeInfo;

fn subnet_of(ip: &str) -> String {
    match ip.rfind('.') {
        Some(pos) => ip[..pos].to_string(),
        None => ip.to_string(),
    }
}

pub struct SubnetDiversity {
    max_per_subnet: u32,
    counts: Mutex<HashMap<String, u32>>,
    accepted: AtomicU64,
    rejected: AtomicU64,
}

impl SubnetDiversity {
    pub fn new(max_per_subnet: u32) -> Self {
        Self {
            max_per_subnet,
            counts: Mutex::new(HashMap::new()),
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }
}

impl SecurityModule for SubnetDiversity {
    fn name(&self) -> &str {
        "subnet_diversity"
    }

    fn allow_node(&self, info: &NodeInfo) -> bool {
        let subnet = subnet_of(&info.address.host);
        let mut counts = self.counts.lock().unwrap();
        let count = counts.entry(subnet).or_insert(0);
        if *count >= self.max_per_subnet {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            false
        } else {
            *count += 1;
            self.accepted.fetch_add(1, Ordering::Relaxed);
            true
        }
    }

    fn node_removed(&self, info: &NodeInfo) {
        let subnet = subnet_of(&info.address.host);
        let mut counts = self.counts.lock().unwrap();
        if let Some(count) = counts.get_mut(&subnet) {
            if *count > 0 {
                *count -= 1;
            }
        }
    }

    fn metrics(&self) -> SecurityMetrics {
        let mut m = SecurityMetrics::empty(self.name());
        m.counters.push(("accepted".into(), self.accepted.load(Ordering::Relaxed)));
        m.counters.push(("rejected".into(), self.rejected.load(Ordering::Relaxed)));
        let unique = self.counts.lock().unwrap().len() as f64;
        m.gauges.push(("unique_subnets".into(), unique));
        m
    }

    fn reset_metrics(&self) {
        self.accepted.store(0, Ordering::Relaxed);
        self.rejected.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeAddress;

    fn node(host: &str) -> NodeInfo {
        NodeInfo::new(NodeAddress::new(host, 9000))
    }

    #[test]
    fn allows_up_to_the_configured_maximum_per_subnet() {
        let module = SubnetDiversity::new(2);
        assert!(module.allow_node(&node("10.0.0.1")));
        assert!(module.allow_node(&node("10.0.0.2")));
        assert!(!module.allow_node(&node("10.0.0.3")));
    }

    #[test]
    fn node_removed_frees_a_subnet_slot() {
        let module = SubnetDiversity::new(1);
        let a = node("10.0.0.1");
        assert!(module.allow_node(&a));
        assert!(!module.allow_node(&node("10.0.0.9")));
        module.node_removed(&a);
        assert!(module.allow_node(&node("10.0.0.9")));
    }

    #[test]
    fn removing_an_unknown_subnet_does_not_panic() {
        let module = SubnetDiversity::new(1);
        module.node_removed(&node("192.168.1.1"));
    }
}
