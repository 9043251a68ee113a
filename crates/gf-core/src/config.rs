//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! store, queue and converter sections. Every section defaults sensibly so a
//! completely empty `{}` file is valid. A handful of environment variables
//! override the store connection and the converter location after loading.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::Error;

/// Environment variable overriding [`StoreConfig::db_path`].
pub const ENV_DB_PATH: &str = "GLBFORGE_DB_PATH";
/// Environment variable overriding [`StoreConfig::pool_size`].
pub const ENV_DB_POOL_SIZE: &str = "GLBFORGE_DB_POOL_SIZE";
/// Environment variable overriding [`ConverterConfig::executable`].
pub const ENV_CONVERTER: &str = "GLBFORGE_CONVERTER";
/// Environment variable overriding [`ConverterConfig::install_root`].
pub const ENV_INSTALL_ROOT: &str = "GLBFORGE_INSTALL_ROOT";
/// Environment variable overriding [`ConverterConfig::projects_dir`].
pub const ENV_PROJECTS_DIR: &str = "GLBFORGE_PROJECTS_DIR";

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub queue: QueueConfig,
    pub converter: ConverterConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Apply overrides using `lookup` to resolve variable names. Empty values
    /// are ignored.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = get(ENV_DB_PATH) {
            self.store.db_path = PathBuf::from(path);
        }
        if let Some(size) = get(ENV_DB_POOL_SIZE) {
            match size.trim().parse::<u32>() {
                Ok(n) => self.store.pool_size = n,
                Err(_) => tracing::warn!("Ignoring non-numeric {ENV_DB_POOL_SIZE}={size}"),
            }
        }
        if let Some(exe) = get(ENV_CONVERTER) {
            self.converter.executable = exe;
        }
        if let Some(root) = get(ENV_INSTALL_ROOT) {
            self.converter.install_root = Some(PathBuf::from(root));
        }
        if let Some(dir) = get(ENV_PROJECTS_DIR) {
            self.converter.projects_dir = PathBuf::from(dir);
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.store.pool_size == 0 {
            warnings.push("store.pool_size is 0; a single connection will be used".into());
        }

        let q = &self.queue;
        if q.watchdog_interval_secs == 0 {
            warnings.push("queue.watchdog_interval_secs is 0; stuck jobs will not be reclaimed".into());
        }
        if q.heartbeat_interval_secs == 0 {
            warnings.push("queue.heartbeat_interval_secs is 0; it will be raised to 1 second".into());
        }
        if q.stale_after_secs <= q.heartbeat_interval_secs {
            warnings.push(format!(
                "queue.stale_after_secs ({}) should exceed heartbeat_interval_secs ({}); \
                 healthy jobs may be reclaimed",
                q.stale_after_secs, q.heartbeat_interval_secs
            ));
        }
        if q.backoff_base_ms > q.backoff_max_secs.saturating_mul(1000) {
            warnings.push("queue.backoff_base_ms exceeds backoff_max_secs".into());
        }

        let c = &self.converter;
        if c.concurrency == 0 {
            warnings.push("converter.concurrency is 0; no conversion will ever run".into());
        }
        if c.executable.trim().is_empty() {
            warnings.push("converter.executable is empty".into());
        }
        if c.source_extension.starts_with('.') || c.target_extension.starts_with('.') {
            warnings.push("converter extensions should not include the leading dot".into());
        }
        if c.source_extension.eq_ignore_ascii_case(&c.target_extension) {
            warnings.push("converter.source_extension equals target_extension".into());
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Job record store (SQLite) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub db_path: PathBuf,
    pub pool_size: u32,
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/glbforge.db"),
            pool_size: 8,
            busy_timeout_ms: 5000,
        }
    }
}

impl StoreConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Queue engine timings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub watchdog_interval_secs: u64,
    pub stale_after_secs: u64,
    pub heartbeat_interval_secs: u64,
    pub shutdown_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub backoff_base_ms: u64,
    pub backoff_max_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            watchdog_interval_secs: 10,
            stale_after_secs: 60,
            heartbeat_interval_secs: 10,
            shutdown_timeout_secs: 5,
            poll_interval_ms: 1000,
            backoff_base_ms: 1000,
            backoff_max_secs: 300,
        }
    }
}

impl QueueConfig {
    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_secs(self.watchdog_interval_secs)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_secs(self.backoff_max_secs)
    }
}

/// External converter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Program name or path of the converter binary.
    pub executable: String,
    /// Directory the converter is installed in; used as its working
    /// directory and searched first when resolving `executable`.
    pub install_root: Option<PathBuf>,
    /// Parent directory of every job-scoped project directory.
    pub projects_dir: PathBuf,
    /// Where submitted archives wait for extraction. The pipeline deletes
    /// them once the asset is found.
    pub uploads_dir: PathBuf,
    pub source_extension: String,
    pub target_extension: String,
    pub concurrency: usize,
    /// Hard limit on a single converter run. `None` means unbounded.
    pub timeout_secs: Option<u64>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            executable: "FBX2glTF-linux-x64".into(),
            install_root: None,
            projects_dir: PathBuf::from("./projects"),
            uploads_dir: PathBuf::from("./uploads"),
            source_extension: "fbx".into(),
            target_extension: "glb".into(),
            concurrency: 1,
            timeout_secs: None,
        }
    }
}

impl ConverterConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
