//! Configuration file handling for the hangar build-farm master.
//!
//! A single `hangar.toml` is loaded once at startup, then layered with
//! environment variable overrides and finally CLI flags (CLI wins). One
//! struct per master component: database DSN, output path, every socket
//! address, render debounce, transfer pipelining, per-operation-class
//! timeouts, and a development-mode toggle.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "hangar.toml";

/// Complete hangar master configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub sockets: SocketsConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub arch: ArchConfig,
    #[serde(default)]
    pub bigbro: BigBroConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub dev_mode: bool,
    /// Per-task debug-logging toggles, keyed by task name (`"gazer"`,
    /// `"driver"`, ...). Absent entries default to the global log level.
    #[serde(default)]
    pub task_debug: BTreeMap<String, bool>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database: DatabaseConfig::default(),
            output: OutputConfig::default(),
            sockets: SocketsConfig::default(),
            render: RenderConfig::default(),
            transfer: TransferConfig::default(),
            timeouts: TimeoutsConfig::default(),
            arch: ArchConfig::default(),
            bigbro: BigBroConfig::default(),
            upstream: UpstreamConfig::default(),
            dev_mode: false,
            task_debug: BTreeMap::new(),
        }
    }
}

/// The upstream package index: GAZER's event/catalogue feeds, and the base
/// URL DRIVER hands builders at `ACK` so they can resolve dependencies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub base_url: String,
    #[serde(default = "default_events_url")]
    pub events_url: String,
    #[serde(default = "default_catalogue_url")]
    pub catalogue_url: String,
}

fn default_events_url() -> String {
    "https://upstream.example/events".to_string()
}

fn default_catalogue_url() -> String {
    "https://upstream.example/catalogue".to_string()
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        UpstreamConfig {
            base_url: "https://upstream.example".to_string(),
            events_url: default_events_url(),
            catalogue_url: default_catalogue_url(),
        }
    }
}

impl Config {
    pub fn task_debug(&self, task: &str) -> bool {
        self.task_debug.get(task).copied().unwrap_or(false)
    }

    /// Apply environment variable overrides. Only variables that are set are
    /// consulted; everything else keeps the file-loaded (or default) value.
    pub fn apply_env_overrides(mut self) -> Result<Self> {
        if let Ok(dsn) = std::env::var("HANGAR_DATABASE_DSN") {
            self.database.dsn = dsn;
        }
        if let Ok(path) = std::env::var("HANGAR_OUTPUT_PATH") {
            self.output.path = PathBuf::from(path);
        }
        if let Ok(flag) = std::env::var("HANGAR_DEV_MODE") {
            self.dev_mode = parse_bool(&flag)
                .with_context(|| format!("invalid HANGAR_DEV_MODE value: {flag:?}"))?;
        }
        Ok(self)
    }

    /// Merge CLI-supplied overrides on top of this config. `overrides` wins
    /// wherever it carries `Some`.
    pub fn merge_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(dsn) = overrides.database_dsn {
            self.database.dsn = dsn;
        }
        if let Some(path) = overrides.output_path {
            self.output.path = path;
        }
        if let Some(addr) = overrides.builder_addr {
            self.sockets.builder = addr;
        }
        if let Some(dev_mode) = overrides.dev_mode {
            self.dev_mode = dev_mode;
        }
        self
    }
}

/// CLI-supplied overrides, all optional; the binary's `clap` argument struct
/// converts into this before calling [`Config::merge_overrides`].
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub database_dsn: Option<String>,
    pub output_path: Option<PathBuf>,
    pub builder_addr: Option<SocketAddr>,
    pub dev_mode: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub dsn: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

fn default_pool_size() -> u32 {
    8
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            dsn: "postgres://hangar@localhost/hangar".to_string(),
            pool_size: default_pool_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            path: PathBuf::from("/var/www/hangar"),
        }
    }
}

/// Every TCP socket the master binds or connects to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketsConfig {
    pub builder: SocketAddr,
    pub file: SocketAddr,
    pub admin: SocketAddr,
    pub log_ingest: SocketAddr,
    pub status: SocketAddr,
    pub control: SocketAddr,
}

impl Default for SocketsConfig {
    fn default() -> Self {
        SocketsConfig {
            builder: "0.0.0.0:5432".parse().unwrap(),
            file: "0.0.0.0:5433".parse().unwrap(),
            admin: "127.0.0.1:5434".parse().unwrap(),
            log_ingest: "127.0.0.1:5435".parse().unwrap(),
            status: "127.0.0.1:5436".parse().unwrap(),
            control: "127.0.0.1:5437".parse().unwrap(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(
        deserialize_with = "hangar_duration::deserialize_duration",
        serialize_with = "hangar_duration::serialize_duration",
        default = "default_render_debounce"
    )]
    pub debounce: Duration,
}

fn default_render_debounce() -> Duration {
    Duration::from_secs(30)
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            debounce: default_render_debounce(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    #[serde(default = "default_pipeline_depth")]
    pub pipeline_depth: u32,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,
}

fn default_pipeline_depth() -> u32 {
    4
}

fn default_chunk_size() -> u32 {
    65_536
}

impl Default for TransferConfig {
    fn default() -> Self {
        TransferConfig {
            pipeline_depth: default_pipeline_depth(),
            chunk_size: default_chunk_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(
        deserialize_with = "hangar_duration::deserialize_duration",
        serialize_with = "hangar_duration::serialize_duration",
        default = "default_master_timeout"
    )]
    pub master_timeout: Duration,
    #[serde(
        deserialize_with = "hangar_duration::deserialize_duration",
        serialize_with = "hangar_duration::serialize_duration",
        default = "default_db_timeout"
    )]
    pub db_timeout: Duration,
    #[serde(
        deserialize_with = "hangar_duration::deserialize_duration",
        serialize_with = "hangar_duration::serialize_duration",
        default = "default_recv_timeout"
    )]
    pub recv_timeout: Duration,
    #[serde(
        deserialize_with = "hangar_duration::deserialize_duration",
        serialize_with = "hangar_duration::serialize_duration",
        default = "default_shutdown_grace"
    )]
    pub shutdown_grace: Duration,
}

fn default_master_timeout() -> Duration {
    Duration::from_secs(600)
}
fn default_db_timeout() -> Duration {
    Duration::from_secs(5)
}
fn default_recv_timeout() -> Duration {
    Duration::from_secs(60)
}
fn default_shutdown_grace() -> Duration {
    Duration::from_secs(30)
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        TimeoutsConfig {
            master_timeout: default_master_timeout(),
            db_timeout: default_db_timeout(),
            recv_timeout: default_recv_timeout(),
            shutdown_grace: default_shutdown_grace(),
        }
    }
}

/// Queue-planner (ARCH) scheduling and the per-ABI cap it fetches under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchConfig {
    #[serde(
        deserialize_with = "hangar_duration::deserialize_duration",
        serialize_with = "hangar_duration::serialize_duration",
        default = "default_tick_interval"
    )]
    pub tick_interval: Duration,
    #[serde(
        deserialize_with = "hangar_duration::deserialize_duration",
        serialize_with = "hangar_duration::serialize_duration",
        default = "default_idle_interval"
    )]
    pub idle_interval: Duration,
    #[serde(default = "default_queue_top_k")]
    pub queue_top_k: usize,
}

fn default_tick_interval() -> Duration {
    Duration::from_secs(5)
}
fn default_idle_interval() -> Duration {
    Duration::from_secs(60)
}
fn default_queue_top_k() -> usize {
    10_000
}

impl Default for ArchConfig {
    fn default() -> Self {
        ArchConfig {
            tick_interval: default_tick_interval(),
            idle_interval: default_idle_interval(),
            queue_top_k: default_queue_top_k(),
        }
    }
}

/// BIG_BRO's statistics-collection cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BigBroConfig {
    #[serde(
        deserialize_with = "hangar_duration::deserialize_duration",
        serialize_with = "hangar_duration::serialize_duration",
        default = "default_stats_interval"
    )]
    pub stats_interval: Duration,
}

fn default_stats_interval() -> Duration {
    Duration::from_secs(5 * 60)
}

impl Default for BigBroConfig {
    fn default() -> Self {
        BigBroConfig { stats_interval: default_stats_interval() }
    }
}

fn parse_bool(s: &str) -> Result<bool, std::str::ParseBoolError> {
    s.parse()
}

/// Load configuration from `<dir>/hangar.toml`, falling back to defaults if
/// the file does not exist.
pub fn load_config(dir: &Path) -> Result<Config> {
    load_config_from_file(&dir.join(CONFIG_FILE))
}

pub fn load_config_from_file(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    let config: Config = toml::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_config_has_sane_socket_addresses() {
        let config = Config::default();
        assert_eq!(config.sockets.admin.ip().to_string(), "127.0.0.1");
        assert_eq!(config.transfer.pipeline_depth, 4);
        assert_eq!(config.render.debounce, Duration::from_secs(30));
        assert_eq!(config.arch.tick_interval, Duration::from_secs(5));
        assert_eq!(config.arch.idle_interval, Duration::from_secs(60));
        assert_eq!(config.arch.queue_top_k, 10_000);
        assert_eq!(config.transfer.chunk_size, 65_536);
    }

    #[test]
    fn load_missing_config_returns_default() {
        let td = tempdir().expect("tempdir");
        let config = load_config(td.path()).expect("load");
        assert!(!config.dev_mode);
    }

    #[test]
    fn load_config_from_toml() {
        let td = tempdir().expect("tempdir");
        let path = td.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            r#"
dev_mode = true

[database]
dsn = "postgres://hangar@db/hangar"

[output]
path = "/srv/hangar"

[sockets]
builder = "0.0.0.0:5555"
file = "0.0.0.0:5556"
admin = "127.0.0.1:5557"
log_ingest = "127.0.0.1:5558"
status = "127.0.0.1:5559"
control = "127.0.0.1:5560"

[render]
debounce = "1m"

[transfer]
pipeline_depth = 8
"#,
        )
        .expect("write");

        let config = load_config(td.path()).expect("load");
        assert!(config.dev_mode);
        assert_eq!(config.database.dsn, "postgres://hangar@db/hangar");
        assert_eq!(config.output.path, PathBuf::from("/srv/hangar"));
        assert_eq!(config.transfer.pipeline_depth, 8);
        assert_eq!(config.render.debounce, Duration::from_secs(60));
    }

    #[test]
    fn env_override_wins_over_file_default() {
        let config = Config::default();
        temp_env::with_var("HANGAR_DEV_MODE", Some("true"), || {
            let config = config.clone().apply_env_overrides().expect("env");
            assert!(config.dev_mode);
        });
    }

    #[test]
    fn cli_override_wins_over_everything() {
        let config = Config::default().merge_overrides(ConfigOverrides {
            dev_mode: Some(true),
            ..Default::default()
        });
        assert!(config.dev_mode);
    }

    #[test]
    fn task_debug_defaults_to_false_for_unknown_task() {
        let config = Config::default();
        assert!(!config.task_debug("gazer"));
    }
}
