//! Node configuration: CLI-constructible defaults, optionally overridden by a
//! TOML file on disk.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

fn duration_ms<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let ms = u64::deserialize(deserializer)?;
    Ok(Duration::from_millis(ms))
}

fn duration_ms_ser<S>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(d.as_millis() as u64)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub ip: String,
    pub port: u16,

    #[serde(with = "duration_ms_mod", rename = "stabilize_interval_ms")]
    pub stabilize_interval: Duration,
    #[serde(with = "duration_ms_mod", rename = "fix_fingers_interval_ms")]
    pub fix_fingers_interval: Duration,
    #[serde(with = "duration_ms_mod", rename = "check_predecessor_interval_ms")]
    pub check_predecessor_interval: Duration,
    #[serde(with = "duration_ms_mod", rename = "rpc_timeout_ms")]
    pub rpc_timeout: Duration,
    #[serde(with = "duration_ms_mod", rename = "ping_timeout_ms")]
    pub ping_timeout: Duration,

    pub enable_id_verification: bool,

    pub enable_subnet_diversity: bool,
    pub subnet_max_per_subnet: u32,

    pub enable_rate_limiting: bool,
    pub rate_limit_max_tokens: f64,
    pub rate_limit_refill_rate: f64,

    pub enable_lookup_validation: bool,
    pub lookup_validation_checks: usize,

    pub enable_peer_age_preference: bool,
    pub peer_age_min_seconds: f64,

    pub enable_honeypot: bool,
    pub honeypot_sentinel_count: usize,
}

/// Every field optional, mirroring `NodeConfig` one-for-one; what a TOML file
/// is actually allowed to omit. Deserialized, then layered over
/// `NodeConfig::default()` field by field so an omitted field keeps its
/// default instead of `toml::from_str` erroring on the whole document.
#[derive(Debug, Deserialize)]
struct NodeConfigPartial {
    ip: Option<String>,
    port: Option<u16>,
    #[serde(default, with = "duration_ms_mod_opt", rename = "stabilize_interval_ms")]
    stabilize_interval: Option<Duration>,
    #[serde(default, with = "duration_ms_mod_opt", rename = "fix_fingers_interval_ms")]
    fix_fingers_interval: Option<Duration>,
    #[serde(default, with = "duration_ms_mod_opt", rename = "check_predecessor_interval_ms")]
    check_predecessor_interval: Option<Duration>,
    #[serde(default, with = "duration_ms_mod_opt", rename = "rpc_timeout_ms")]
    rpc_timeout: Option<Duration>,
    #[serde(default, with = "duration_ms_mod_opt", rename = "ping_timeout_ms")]
    ping_timeout: Option<Duration>,
    enable_id_verification: Option<bool>,
    enable_subnet_diversity: Option<bool>,
    subnet_max_per_subnet: Option<u32>,
    enable_rate_limiting: Option<bool>,
    rate_limit_max_tokens: Option<f64>,
    rate_limit_refill_rate: Option<f64>,
    enable_lookup_validation: Option<bool>,
    lookup_validation_checks: Option<usize>,
    enable_peer_age_preference: Option<bool>,
    peer_age_min_seconds: Option<f64>,
    enable_honeypot: Option<bool>,
    honeypot_sentinel_count: Option<usize>,
}

impl NodeConfigPartial {
    fn merge_over(self, mut base: NodeConfig) -> NodeConfig {
        if let Some(v) = self.ip {
            base.ip = v;
        }
        if let Some(v) = self.port {
            base.port = v;
        }
        if let Some(v) = self.stabilize_interval {
            base.stabilize_interval = v;
        }
        if let Some(v) = self.fix_fingers_interval {
            base.fix_fingers_interval = v;
        }
        if let Some(v) = self.check_predecessor_interval {
            base.check_predecessor_interval = v;
        }
        if let Some(v) = self.rpc_timeout {
            base.rpc_timeout = v;
        }
        if let Some(v) = self.ping_timeout {
            base.ping_timeout = v;
        }
        if let Some(v) = self.enable_id_verification {
            base.enable_id_verification = v;
        }
        if let Some(v) = self.enable_subnet_diversity {
            base.enable_subnet_diversity = v;
        }
        if let Some(v) = self.subnet_max_per_subnet {
            base.subnet_max_per_subnet = v;
        }
        if let Some(v) = self.enable_rate_limiting {
            base.enable_rate_limiting = v;
        }
        if let Some(v) = self.rate_limit_max_tokens {
            base.rate_limit_max_tokens = v;
        }
        if let Some(v) = self.rate_limit_refill_rate {
            base.rate_limit_refill_rate = v;
        }
        if let Some(v) = self.enable_lookup_validation {
            base.enable_lookup_validation = v;
        }
        if let Some(v) = self.lookup_validation_checks {
            base.lookup_validation_checks = v;
        }
        if let Some(v) = self.enable_peer_age_preference {
            base.enable_peer_age_preference = v;
        }
        if let Some(v) = self.peer_age_min_seconds {
            base.peer_age_min_seconds = v;
        }
        if let Some(v) = self.enable_honeypot {
            base.enable_honeypot = v;
        }
        if let Some(v) = self.honeypot_sentinel_count {
            base.honeypot_sentinel_count = v;
        }
        base
    }
}

mod duration_ms_mod {
    use std::time::Duration;

    pub fn serialize<S>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        super::duration_ms_ser(d, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        super::duration_ms(deserializer)
    }
}

/// Like `duration_ms_mod`, but for the all-`Option` shadow struct: only
/// called when the field is actually present, so it never has to represent
/// "absent" itself.
mod duration_ms_mod_opt {
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        super::duration_ms(deserializer).map(Some)
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            ip: "0.0.0.0".to_string(),
            port: 0,
            stabilize_interval: Duration::from_millis(1000),
            fix_fingers_interval: Duration::from_millis(500),
            check_predecessor_interval: Duration::from_millis(2000),
            rpc_timeout: Duration::from_millis(5000),
            ping_timeout: Duration::from_millis(2000),
            enable_id_verification: true,
            enable_subnet_diversity: true,
            subnet_max_per_subnet: 2,
            enable_rate_limiting: true,
            rate_limit_max_tokens: 2.0,
            rate_limit_refill_rate: 10.0,
            enable_lookup_validation: true,
            lookup_validation_checks: 1,
            enable_peer_age_preference: true,
            peer_age_min_seconds: 30.0,
            enable_honeypot: true,
            honeypot_sentinel_count: 10,
        }
    }
}

impl NodeConfig {
    /// Load a TOML file and layer it over the reference defaults. Fields the
    /// file omits keep their default value.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let partial: NodeConfigPartial = toml::from_str(text)?;
        Ok(partial.merge_over(Self::default()))
    }

    /// CLI overrides always win over whatever `self` currently holds.
    pub fn with_address(mut self, ip: String, port: u16) -> Self {
        self.ip = ip;
        self.port = port;
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}
