use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub tan: TanConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// HS256 secret shared with the external identity provider.
    pub jwt_secret: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

/// TAN challenge settings.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TanConfig {
    /// Number of digits in a generated code.
    pub length: usize,
    /// Challenge lifetime in seconds.
    pub ttl_secs: i64,
    /// Verification attempts before a challenge locks.
    pub max_attempts: u32,
    /// Return the raw code in initiate responses. Development only; delivery
    /// is an external channel in production.
    pub expose_raw_code: bool,
}

impl Default for TanConfig {
    fn default() -> Self {
        Self {
            length: 6,
            ttl_secs: 300,
            max_attempts: 3,
            expose_raw_code: false,
        }
    }
}

/// Transactional store settings.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoreConfig {
    /// Commit retries before a unit fails with ConflictExceeded.
    pub max_retries: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { max_retries: 5 }
    }
}

/// Standing-order scheduler settings.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SchedulerConfig {
    /// Seconds between due-order scans.
    pub interval_secs: u64,
    /// Suspend an order after this many consecutive failed runs.
    /// `None` retries forever.
    pub suspend_after_failures: Option<u32>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            suspend_after_failures: None,
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Self {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .unwrap_or_else(|_| panic!("Failed to read config file: {}", config_path));
        serde_yaml::from_str(&content).expect("Failed to parse config yaml")
    }
}
