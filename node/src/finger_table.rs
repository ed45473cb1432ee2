//! The per-node lookup accelerator: 32 cached successor pointers at
//! exponentially spaced offsets.

use std::sync::Mutex;

use crate::ids::{in_open, start, Identifier, M};
use crate::types::NodeInfo;

pub struct FingerTable {
    owner_id: Identifier,
    slots: Mutex<Vec<Option<NodeInfo>>>,
}

impl FingerTable {
    pub fn new(owner_id: Identifier) -> Self {
        Self { owner_id, slots: Mutex::new(vec![None; M as usize]) }
    }

    /// `start(i)` for this table's owner.
    pub fn start(&self, i: u32) -> Identifier {
        start(self.owner_id, i)
    }

    pub fn get(&self, i: u32) -> Option<NodeInfo> {
        self.slots.lock().unwrap()[i as usize].clone()
    }

    pub fn set(&self, i: u32, node: NodeInfo) {
        self.slots.lock().unwrap()[i as usize] = Some(node);
    }

    pub fn clear(&self, i: u32) {
        self.slots.lock().unwrap()[i as usize] = None;
    }

    /// A snapshot of every slot, for diagnostics (`fingers` shell command).
    pub fn snapshot(&self) -> Vec<Option<NodeInfo>> {
        self.slots.lock().unwrap().clone()
    }

    /// Point every slot at `node`, as a fresh ring-of-one or fresh joiner does.
    pub fn initialize_all(&self, node: NodeInfo) {
        let mut slots = self.slots.lock().unwrap();
        for slot in slots.iter_mut() {
            *slot = Some(node.clone());
        }
    }

    /// Every distinct cached entry other than `exclude_id`, for the lookup
    /// validator to cross-check a result against.
    pub fn alternatives(&self, exclude_id: Identifier) -> Vec<NodeInfo> {
        let slots = self.slots.lock().unwrap();
        let mut seen = std::collections::HashSet::new();
        slots
            .iter()
            .flatten()
            .filter(|n| n.id != exclude_id && seen.insert(n.id))
            .cloned()
            .collect()
    }

    /// Scan slots from the widest reach down to the narrowest, returning the
    /// first entry strictly between this node and `target`.
    pub fn closest_preceding(&self, target: Identifier) -> Option<NodeInfo> {
        let slots = self.slots.lock().unwrap();
        for i in (0..M).rev() {
            if let Some(node) = &slots[i as usize] {
                if in_open(self.owner_id, node.id, target) {
                    return Some(node.clone());
                }
            }
        }
        None
    }
}
