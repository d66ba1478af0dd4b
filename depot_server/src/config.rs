use std::env;

use chrono::Duration;
use log::*;

const DEFAULT_WORKER_INTERVAL_SECS: u64 = 60;
const DEFAULT_WORKER_JITTER_SECS: u64 = 15;
const DEFAULT_LOCK_TTL_SECS: i64 = 300;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub database_url: String,
    /// The base period between reconciliation cycles.
    pub worker_interval: std::time::Duration,
    /// Up to this much random delay is added before each cycle, so that a fleet of instances
    /// restarted together does not tick in lockstep forever.
    pub worker_jitter: std::time::Duration,
    /// How long the advisory lock outlives its holder. Must comfortably exceed the longest
    /// plausible cycle.
    pub lock_ttl: Duration,
    pub max_connections: u32,
    /// Identifies this instance in the advisory lock table.
    pub instance_id: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_url: String::default(),
            worker_interval: std::time::Duration::from_secs(DEFAULT_WORKER_INTERVAL_SECS),
            worker_jitter: std::time::Duration::from_secs(DEFAULT_WORKER_JITTER_SECS),
            lock_ttl: Duration::seconds(DEFAULT_LOCK_TTL_SECS),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            instance_id: default_instance_id(),
        }
    }
}

fn default_instance_id() -> String {
    format!("depot-server-{:08x}", rand::random::<u32>())
}

fn env_u64(name: &str, default: u64) -> u64 {
    match env::var(name) {
        Ok(s) => s.parse::<u64>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => default,
    }
}

impl ServerConfig {
    pub fn from_env_or_default() -> Self {
        let database_url = env::var("DEPOT_DATABASE_URL").unwrap_or_else(|e| {
            error!("🪛️ DEPOT_DATABASE_URL is not set. {e} Using a default SQLite database.");
            String::default()
        });
        let worker_interval =
            std::time::Duration::from_secs(env_u64("DEPOT_WORKER_INTERVAL_SECS", DEFAULT_WORKER_INTERVAL_SECS));
        let worker_jitter =
            std::time::Duration::from_secs(env_u64("DEPOT_WORKER_JITTER_SECS", DEFAULT_WORKER_JITTER_SECS));
        let lock_ttl = Duration::seconds(env_u64("DEPOT_LOCK_TTL_SECS", DEFAULT_LOCK_TTL_SECS as u64) as i64);
        let max_connections = env_u64("DEPOT_MAX_CONNECTIONS", u64::from(DEFAULT_MAX_CONNECTIONS)) as u32;
        let instance_id = env::var("DEPOT_INSTANCE_ID").unwrap_or_else(|_| default_instance_id());
        Self { database_url, worker_interval, worker_jitter, lock_ttl, max_connections, instance_id }
    }
}
