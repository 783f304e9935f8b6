//! Configuration loading for taghub.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at ~/.config/taghub/config.toml.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::HubError;

/// Ingestion limits and whitelists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSettings {
    /// Minimum gap between two posts by the same author (ms).
    #[serde(default = "default_min_post_interval_ms")]
    pub min_post_interval_ms: u64,

    /// Maximum length of a client-assigned article id.
    #[serde(default = "default_max_original_id_len")]
    pub max_original_id_len: usize,

    /// Maximum title length in characters, after sanitization.
    #[serde(default = "default_max_title_len")]
    pub max_title_len: usize,

    /// Maximum number of tags kept per article.
    #[serde(default = "default_max_tag_count")]
    pub max_tag_count: usize,

    /// Maximum characters in a single tag title.
    #[serde(default = "default_max_tag_title_len")]
    pub max_tag_title_len: usize,

    /// Accepted blog software names. Empty accepts any.
    #[serde(default)]
    pub allowed_sources: Vec<String>,

    /// Accepted blog software versions. Empty accepts any.
    #[serde(default)]
    pub allowed_versions: Vec<String>,
}

fn default_min_post_interval_ms() -> u64 {
    60_000
}

fn default_max_original_id_len() -> usize {
    64
}

fn default_max_title_len() -> usize {
    256
}

fn default_max_tag_count() -> usize {
    4
}

fn default_max_tag_title_len() -> usize {
    9
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            min_post_interval_ms: default_min_post_interval_ms(),
            max_original_id_len: default_max_original_id_len(),
            max_title_len: default_max_title_len(),
            max_tag_count: default_max_tag_count(),
            max_tag_title_len: default_max_tag_title_len(),
            allowed_sources: Vec::new(),
            allowed_versions: Vec::new(),
        }
    }
}

impl IngestSettings {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_original_id_len == 0 {
            return Err("ingest.max_original_id_len must be > 0".to_string());
        }
        if self.max_title_len == 0 {
            return Err("ingest.max_title_len must be > 0".to_string());
        }
        if self.max_tag_count == 0 {
            return Err("ingest.max_tag_count must be > 0".to_string());
        }
        if self.max_tag_title_len == 0 {
            return Err("ingest.max_tag_title_len must be > 0".to_string());
        }
        Ok(())
    }
}

/// Downstream event relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaySettings {
    /// Relay is off unless explicitly enabled.
    #[serde(default)]
    pub enabled: bool,

    /// URL that receives the POSTed events.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Key sent with every event (loaded from env var, not stored in config file)
    #[serde(default)]
    pub shared_secret: Option<String>,

    /// Pending events held before new ones are dropped.
    #[serde(default = "default_relay_queue_capacity")]
    pub queue_capacity: usize,

    /// Per-request timeout (ms).
    #[serde(default = "default_relay_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_relay_queue_capacity() -> usize {
    256
}

fn default_relay_timeout_ms() -> u64 {
    5_000
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            shared_secret: None,
            queue_capacity: default_relay_queue_capacity(),
            timeout_ms: default_relay_timeout_ms(),
        }
    }
}

impl RelaySettings {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.enabled && self.endpoint.as_deref().map_or(true, str::is_empty) {
            return Err("relay.endpoint is required when relay.enabled is true".to_string());
        }
        if self.queue_capacity == 0 {
            return Err("relay.queue_capacity must be > 0".to_string());
        }
        if self.timeout_ms == 0 {
            return Err("relay.timeout_ms must be > 0".to_string());
        }
        Ok(())
    }
}

/// Accessibility prober and sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeSettings {
    /// Articles sampled per run.
    #[serde(default = "default_probe_batch_size")]
    pub batch_size: usize,

    /// Concurrent probe workers.
    #[serde(default = "default_probe_pool_size")]
    pub pool_size: usize,

    /// Tasks admitted per run before new ones fail fast.
    #[serde(default = "default_probe_queue_capacity")]
    pub queue_capacity: usize,

    /// Per-probe timeout (ms).
    #[serde(default = "default_probe_timeout_ms")]
    pub timeout_ms: u64,

    /// Articles with more failures than this are removed by the sweep.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

fn default_probe_batch_size() -> usize {
    200
}

fn default_probe_pool_size() -> usize {
    16
}

fn default_probe_queue_capacity() -> usize {
    256
}

fn default_probe_timeout_ms() -> u64 {
    10_000
}

fn default_failure_threshold() -> u32 {
    5
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            batch_size: default_probe_batch_size(),
            pool_size: default_probe_pool_size(),
            queue_capacity: default_probe_queue_capacity(),
            timeout_ms: default_probe_timeout_ms(),
            failure_threshold: default_failure_threshold(),
        }
    }
}

impl ProbeSettings {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.pool_size == 0 {
            return Err("probe.pool_size must be > 0".to_string());
        }
        if self.queue_capacity == 0 {
            return Err("probe.queue_capacity must be > 0".to_string());
        }
        if self.timeout_ms == 0 {
            return Err("probe.timeout_ms must be > 0".to_string());
        }
        Ok(())
    }
}

/// Cron schedules for background jobs (6-field, seconds first).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSettings {
    /// IANA timezone for every job
    #[serde(default = "default_job_timezone")]
    pub timezone: String,

    #[serde(default = "default_probe_cron")]
    pub probe_cron: String,

    #[serde(default = "default_sweep_cron")]
    pub sweep_cron: String,

    #[serde(default = "default_author_probe_cron")]
    pub author_probe_cron: String,

    #[serde(default = "default_prune_cron")]
    pub rate_limit_prune_cron: String,

    #[serde(default = "default_compaction_cron")]
    pub compaction_cron: String,
}

fn default_job_timezone() -> String {
    "UTC".to_string()
}

fn default_probe_cron() -> String {
    // Every six hours
    "0 0 */6 * * *".to_string()
}

fn default_sweep_cron() -> String {
    "0 30 3 * * *".to_string()
}

fn default_author_probe_cron() -> String {
    "0 0 5 * * *".to_string()
}

fn default_prune_cron() -> String {
    "0 */10 * * * *".to_string()
}

fn default_compaction_cron() -> String {
    "0 0 4 * * 0".to_string()
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            timezone: default_job_timezone(),
            probe_cron: default_probe_cron(),
            sweep_cron: default_sweep_cron(),
            author_probe_cron: default_author_probe_cron(),
            rate_limit_prune_cron: default_prune_cron(),
            compaction_cron: default_compaction_cron(),
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Path to RocksDB storage directory
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub ingest: IngestSettings,

    #[serde(default)]
    pub relay: RelaySettings,

    #[serde(default)]
    pub probe: ProbeSettings,

    #[serde(default)]
    pub jobs: JobSettings,
}

fn default_db_path() -> String {
    ProjectDirs::from("", "", "taghub")
        .map(|p| p.data_local_dir().join("db"))
        .unwrap_or_else(|| PathBuf::from("./data"))
        .to_string_lossy()
        .to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            log_level: default_log_level(),
            ingest: IngestSettings::default(),
            relay: RelaySettings::default(),
            probe: ProbeSettings::default(),
            jobs: JobSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/taghub/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (TAGHUB_*, sections split by `__`)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, HubError> {
        let config_dir = ProjectDirs::from("", "", "taghub")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("db_path", default_db_path())
            .map_err(|e| HubError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| HubError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Format: TAGHUB_DB_PATH, TAGHUB_PROBE__POOL_SIZE, TAGHUB_RELAY__SHARED_SECRET, etc.
        builder = builder.add_source(
            Environment::with_prefix("TAGHUB")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("ingest.allowed_sources")
                .with_list_parse_key("ingest.allowed_versions"),
        );

        let config = builder
            .build()
            .map_err(|e| HubError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| HubError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), HubError> {
        self.ingest.validate().map_err(HubError::Config)?;
        self.relay.validate().map_err(HubError::Config)?;
        self.probe.validate().map_err(HubError::Config)?;
        Ok(())
    }

    /// Expand ~ in db_path to actual home directory
    pub fn expanded_db_path(&self) -> PathBuf {
        if let Some(rest) = self.db_path.strip_prefix("~/") {
            if let Some(home) = directories::BaseDirs::new().map(|b| b.home_dir().to_path_buf()) {
                return home.join(rest);
            }
        }
        PathBuf::from(&self.db_path)
    }
}
