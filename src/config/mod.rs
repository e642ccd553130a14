//! Server configuration.
//!
//! Configuration lives in a TOML file with three sections: the listen
//! address, the world (snapshot location, snapshot cadence, where new
//! logins land), and logging. Every field has a default, so a partial
//! file is fine and `init` can write a complete starter file.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the TCP listener binds to.
    #[serde(default = "default_bind")]
    pub bind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Path of the world snapshot file.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,
    /// Seconds between automatic snapshots.
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval_secs: u64,
    /// FQN of the room users are placed in on their first login.
    #[serde(default = "default_room_fqn")]
    pub default_room_fqn: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// One of: error, warn, info, debug, trace.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_bind() -> String {
    "127.0.0.1:4000".to_string()
}

fn default_snapshot_path() -> String {
    "data/world.json".to_string()
}

fn default_snapshot_interval() -> u64 {
    60
}

fn default_room_fqn() -> String {
    "world/Welcome".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
            snapshot_interval_secs: default_snapshot_interval(),
            default_room_fqn: default_room_fqn(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            world: WorldConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        if config.world.snapshot_interval_secs == 0 {
            return Err(anyhow!("world.snapshot_interval_secs must be at least 1"));
        }
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }
}
