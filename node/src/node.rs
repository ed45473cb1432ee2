//! The Chord ring participant: membership, routing, and the maintenance
//! loops that keep a ring converged after joins and departures.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::finger_table::FingerTable;
use crate::hash::hash_key;
use crate::ids::{in_open, in_open_closed, Identifier, M};
use crate::protocol::Message;
use crate::security::honeypot_monitor::HoneypotMonitor;
use crate::security::id_verification::IdVerification;
use crate::security::lookup_validator::LookupValidator;
use crate::security::peer_age_preference::PeerAgePreference;
use crate::security::rate_limiter::RateLimiter;
use crate::security::subnet_diversity::SubnetDiversity;
use crate::security::{SecurityModule, SecurityPolicy};
use crate::store::Store;
use crate::transport::blocking_client;
use crate::transport::client;
use crate::transport::server::{BoxFuture, Server};
use crate::types::{NodeAddress, NodeInfo};

struct RingState {
    predecessor: Option<NodeInfo>,
    successor: NodeInfo,
}

pub struct Node {
    pub self_info: NodeInfo,
    ring: RwLock<RingState>,
    finger_table: Arc<FingerTable>,
    store: Store,
    security: Arc<SecurityPolicy>,
    config: NodeConfig,
    running: AtomicBool,
    next_finger_cursor: AtomicUsize,
    // The accept loop has no way to observe `running` while parked in
    // `accept()`, so it is force-aborted on shutdown. The maintenance loops
    // poll `running` between ticks and are awaited to a graceful stop.
    server_task: StdMutex<Option<JoinHandle<()>>>,
    maintenance_tasks: StdMutex<Vec<JoinHandle<()>>>,
}

fn build_security_policy(
    config: &NodeConfig,
    store: Store,
    finger_table: Arc<FingerTable>,
) -> SecurityPolicy {
    let mut modules: Vec<Box<dyn SecurityModule>> = Vec::new();

    if config.enable_id_verification {
        modules.push(Box::new(IdVerification::new()));
    }
    if config.enable_subnet_diversity {
        modules.push(Box::new(SubnetDiversity::new(config.subnet_max_per_subnet)));
    }
    if config.enable_rate_limiting {
        modules.push(Box::new(RateLimiter::new(
            config.rate_limit_max_tokens,
            config.rate_limit_refill_rate,
        )));
    }
    if config.enable_lookup_validation {
        let alt_finger_table = finger_table.clone();
        let rpc_timeout = config.rpc_timeout;
        modules.push(Box::new(LookupValidator::new(
            Box::new(move |_target, exclude_id| alt_finger_table.alternatives(exclude_id)),
            Box::new(move |addr, target| {
                blocking_client::blocking_find_successor(addr, target, rpc_timeout)
            }),
            config.lookup_validation_checks,
        )));
    }
    if config.enable_peer_age_preference {
        modules.push(Box::new(PeerAgePreference::new(config.peer_age_min_seconds)));
    }
    if config.enable_honeypot {
        let get_store = store.clone();
        let put_store = store;
        modules.push(Box::new(HoneypotMonitor::new(
            Box::new(move |k| get_store.get(k)),
            Box::new(move |k, v| put_store.put(k, v)),
            config.honeypot_sentinel_count,
        )));
    }

    SecurityPolicy::new(modules)
}

impl Node {
    pub fn new(config: NodeConfig) -> Arc<Node> {
        let address = NodeAddress::new(config.ip.clone(), config.port);
        let self_info = NodeInfo::new(address);
        let finger_table = Arc::new(FingerTable::new(self_info.id));
        let store = Store::new();
        let security = Arc::new(build_security_policy(&config, store.clone(), finger_table.clone()));

        Arc::new(Node {
            ring: RwLock::new(RingState {
                predecessor: None,
                successor: self_info.clone(),
            }),
            self_info,
            finger_table,
            store,
            security,
            config,
            running: AtomicBool::new(false),
            next_finger_cursor: AtomicUsize::new(0),
            server_task: StdMutex::new(None),
            maintenance_tasks: StdMutex::new(Vec::new()),
        })
    }

    pub fn id(&self) -> Identifier {
        self.self_info.id
    }

    pub fn security_policy(&self) -> &SecurityPolicy {
        &self.security
    }

    /// Start a fresh ring of one.
    pub async fn create(self: &Arc<Self>) -> Result<(), NodeError> {
        self.finger_table.initialize_all(self.self_info.clone());
        {
            let mut ring = self.ring.write().await;
            ring.predecessor = None;
            ring.successor = self.self_info.clone();
        }
        self.start_server().await?;
        self.start_maintenance();
        info!("node {:#010x} created ring at {}", self.self_info.id, self.self_info.address);
        Ok(())
    }

    /// Join the ring reachable through `seed`.
    pub async fn join(self: &Arc<Self>, seed: NodeAddress) -> Result<(), NodeError> {
        self.start_server().await?;

        let successor = client::find_successor(&seed, self.self_info.id, self.config.rpc_timeout)
            .await
            .ok_or(NodeError::JoinLookupFailed)?;

        if !self.security.allow_node(&successor) {
            warn!(
                "node {:#010x} rejected successor {:#010x} returned by seed {seed}",
                self.self_info.id, successor.id
            );
            return Err(NodeError::Denied);
        }

        {
            let mut ring = self.ring.write().await;
            ring.predecessor = None;
            ring.successor = successor.clone();
        }
        self.finger_table.initialize_all(successor.clone());
        self.start_maintenance();
        info!(
            "node {:#010x} joined ring via {} (successor {:#010x})",
            self.self_info.id, seed, successor.id
        );
        Ok(())
    }

    async fn start_server(self: &Arc<Self>) -> Result<(), NodeError> {
        let server = Server::bind(&self.config.ip, self.config.port).await?;

        let security = self.security.clone();
        let allow_message = Arc::new(move |from: &NodeAddress, tag: u8| security.allow_message(from, tag));

        let node = self.clone();
        let process: Arc<dyn Fn(NodeAddress, Message) -> BoxFuture<Message> + Send + Sync> =
            Arc::new(move |from, msg| {
                let node = node.clone();
                Box::pin(async move { node.process_message(from, msg).await })
            });

        let handle = server.spawn(allow_message, process, self.config.rpc_timeout);
        *self.server_task.lock().unwrap() = Some(handle);
        Ok(())
    }

    fn start_maintenance(self: &Arc<Self>) {
        self.running.store(true, Ordering::SeqCst);

        let mut tasks = self.maintenance_tasks.lock().unwrap();
        tasks.push(tokio::spawn(run_periodically(
            self.clone(),
            self.config.stabilize_interval,
            |n| Box::pin(async move { n.stabilize_once().await }),
        )));
        tasks.push(tokio::spawn(run_periodically(
            self.clone(),
            self.config.fix_fingers_interval,
            |n| Box::pin(async move { n.fix_fingers_once().await }),
        )));
        tasks.push(tokio::spawn(run_periodically(
            self.clone(),
            self.config.check_predecessor_interval,
            |n| Box::pin(async move { n.check_predecessor_once().await }),
        )));
    }

    /// Iterative/recursive lookup for the node responsible for `target`.
    pub async fn find_successor(&self, target: Identifier) -> Option<NodeInfo> {
        let successor = { self.ring.read().await.successor.clone() };
        if in_open_closed(self.self_info.id, target, successor.id) {
            return Some(successor);
        }

        let candidate = self.closest_preceding(target).await;
        match candidate {
            None => Some(successor),
            Some(c) if c.id == self.self_info.id => Some(successor),
            Some(c) => match client::find_successor(&c.address, target, self.config.rpc_timeout).await {
                Some(answer) => {
                    if self.run_validate_lookup(target, answer.clone()).await {
                        Some(answer)
                    } else {
                        warn!("lookup validator rejected answer for target {target:#010x}");
                        Some(successor)
                    }
                }
                None => None,
            },
        }
    }

    /// `SecurityModule::validate_lookup` is a plain synchronous hook, but the
    /// lookup validator's confirmatory query opens a blocking `TcpStream`.
    /// Run the whole pipeline call on the blocking thread pool rather than
    /// occupying this task's async worker thread for the query's duration.
    async fn run_validate_lookup(&self, target: Identifier, answer: NodeInfo) -> bool {
        let security = self.security.clone();
        tokio::task::spawn_blocking(move || security.validate_lookup(target, &answer))
            .await
            .unwrap_or(false)
    }

    async fn closest_preceding(&self, target: Identifier) -> Option<NodeInfo> {
        if let Some(n) = self.finger_table.closest_preceding(target) {
            return Some(n);
        }
        let successor = self.ring.read().await.successor.clone();
        if in_open(self.self_info.id, successor.id, target) {
            Some(successor)
        } else {
            None
        }
    }

    pub async fn get_predecessor(&self) -> Option<NodeInfo> {
        self.ring.read().await.predecessor.clone()
    }

    pub async fn successor(&self) -> NodeInfo {
        self.ring.read().await.successor.clone()
    }

    pub async fn notify(&self, candidate: NodeInfo) -> bool {
        if !self.security.allow_node(&candidate) {
            return false;
        }
        let mut ring = self.ring.write().await;
        let should_update = match &ring.predecessor {
            None => true,
            Some(p) => in_open(p.id, candidate.id, self.self_info.id),
        };
        if should_update {
            debug!("node {:#010x} accepted new predecessor {:#010x}", self.self_info.id, candidate.id);
            ring.predecessor = Some(candidate);
        }
        true
    }

    pub async fn put(&self, key: String, value: String) -> bool {
        let id = hash_key(&key);
        match self.find_successor(id).await {
            Some(owner) if owner.id == self.self_info.id => {
                self.store.put(key, value);
                true
            }
            Some(owner) => client::put(&owner.address, key, value, self.config.rpc_timeout).await,
            None => false,
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let id = hash_key(key);
        match self.find_successor(id).await {
            Some(owner) if owner.id == self.self_info.id => self.store.get(key),
            Some(owner) => client::get(&owner.address, key.to_string(), self.config.rpc_timeout).await,
            None => None,
        }
    }

    pub fn local_get(&self, key: &str) -> Option<String> {
        self.store.get(key)
    }

    pub fn local_put(&self, key: String, value: String) {
        self.store.put(key, value);
    }

    /// Every key currently held in this node's local store, for diagnostics
    /// and testing; the ring-wide view is the union of every node's keys.
    pub fn local_keys(&self) -> Vec<String> {
        self.store.keys()
    }

    pub fn alternative_nodes(&self, exclude_id: Identifier) -> Vec<NodeInfo> {
        self.finger_table.alternatives(exclude_id)
    }

    /// A snapshot of every finger table slot, for testing and diagnostics.
    pub fn finger_snapshot(&self) -> Vec<Option<NodeInfo>> {
        self.finger_table.snapshot()
    }

    async fn stabilize_once(&self) {
        let successor = { self.ring.read().await.successor.clone() };

        if let Some(x) = client::get_predecessor(&successor.address, self.config.rpc_timeout).await {
            let current_successor = self.ring.read().await.successor.clone();
            if in_open(self.self_info.id, x.id, current_successor.id) && self.security.allow_node(&x) {
                let mut ring = self.ring.write().await;
                ring.successor = x.clone();
                self.finger_table.set(0, x);
            }
        }

        let successor_now = self.ring.read().await.successor.clone();
        if successor_now.id != self.self_info.id {
            client::notify(&successor_now.address, self.self_info.clone(), self.config.rpc_timeout).await;
        }
    }

    async fn fix_fingers_once(&self) {
        let prev = self.next_finger_cursor.load(Ordering::SeqCst);
        let i = (prev + 1) % M as usize;
        self.next_finger_cursor.store(i, Ordering::SeqCst);

        let target = self.finger_table.start(i as u32);
        if let Some(s) = self.find_successor(target).await {
            self.finger_table.set(i as u32, s);
        }
    }

    async fn check_predecessor_once(&self) {
        let predecessor = { self.ring.read().await.predecessor.clone() };
        if let Some(p) = predecessor {
            if !client::ping(&p.address, self.config.ping_timeout).await {
                let mut ring = self.ring.write().await;
                if ring.predecessor.as_ref().map(|cur| cur.id) == Some(p.id) {
                    ring.predecessor = None;
                }
                drop(ring);
                self.security.node_removed(&p);
                warn!("node {:#010x} lost its predecessor {:#010x}", self.self_info.id, p.id);
            }
        }
    }

    /// Hand held keys off to the successor, then stop.
    pub async fn leave(self: &Arc<Self>) {
        let successor = { self.ring.read().await.successor.clone() };
        if successor.id != self.self_info.id {
            let items = self.store.range_remove(0, 0);
            for (k, v) in items {
                client::put(&successor.address, k, v, self.config.rpc_timeout).await;
            }
        }
        info!("node {:#010x} leaving", self.self_info.id);
        self.shutdown().await;
    }

    /// Stop without handing off keys.
    pub async fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);

        let maintenance: Vec<JoinHandle<()>> = self.maintenance_tasks.lock().unwrap().drain(..).collect();
        for task in maintenance {
            let _ = task.await;
        }

        let server = self.server_task.lock().unwrap().take();
        if let Some(task) = server {
            task.abort();
        }
    }

    async fn process_message(&self, _from: NodeAddress, msg: Message) -> Message {
        match msg {
            Message::FindSuccessorRequest { id } => {
                Message::FindSuccessorResponse { found: self.find_successor(id).await }
            }
            Message::GetPredecessorRequest => {
                Message::GetPredecessorResponse { predecessor: self.get_predecessor().await }
            }
            Message::Notify { candidate } => Message::NotifyAck { accepted: self.notify(candidate).await },
            Message::Ping => Message::Pong,
            Message::GetRequest { key } => Message::GetResponse { value: self.local_get(&key) },
            Message::PutRequest { key, value } => {
                self.local_put(key, value);
                Message::PutResponse { success: true }
            }
            Message::TransferKeysRequest { start, end } => {
                Message::TransferKeysResponse { items: self.store.range_get(start, end) }
            }
            other => Message::ErrorResponse {
                message: format!("unexpected request tag {:#04x}", other.tag()),
            },
        }
    }

    pub fn print_state(&self) -> String {
        format!("self: {:#010x} ({})", self.self_info.id, self.self_info.address)
    }

    pub fn print_finger_table(&self) -> String {
        self.finger_table
            .snapshot()
            .into_iter()
            .enumerate()
            .map(|(i, entry)| match entry {
                Some(n) => format!("[{i:>2}] start={:#010x} -> {:#010x} ({})", self.finger_table.start(i as u32), n.id, n.address),
                None => format!("[{i:>2}] start={:#010x} -> (empty)", self.finger_table.start(i as u32)),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

async fn run_periodically<F>(node: Arc<Node>, interval: Duration, tick: F)
where
    F: Fn(Arc<Node>) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>,
{
    while node.running.load(Ordering::SeqCst) {
        tokio::time::sleep(interval).await;
        if !node.running.load(Ordering::SeqCst) {
            break;
        }
        tick(node.clone()).await;
        node.security.tick();
    }
}

// Scenario integration tests (S1-S5, plus a hostile-seed join test) live in
// `node/tests/scenarios.rs` and exercise only the public API above.
