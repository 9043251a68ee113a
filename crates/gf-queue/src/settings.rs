//! Runtime settings of the queue engine.

use std::time::Duration;

use gf_core::config::QueueConfig;

use crate::backoff::Backoff;

/// Engine timings, resolved from [`QueueConfig`].
#[derive(Debug, Clone)]
pub struct QueueSettings {
    /// Period of the stuck-job scan. `None` disables the watchdog.
    pub watchdog_interval: Option<Duration>,
    /// An active job without a heartbeat for this long is stale.
    pub stale_after: Duration,
    pub heartbeat_interval: Duration,
    /// Fallback wake-up of idle dispatchers, so delayed retries are picked
    /// up once they become due.
    pub poll_interval: Duration,
    pub shutdown_timeout: Duration,
    pub backoff: Backoff,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self::from(&QueueConfig::default())
    }
}

impl From<&QueueConfig> for QueueSettings {
    fn from(config: &QueueConfig) -> Self {
        let min = Duration::from_millis(10);
        Self {
            watchdog_interval: (config.watchdog_interval_secs > 0)
                .then(|| config.watchdog_interval()),
            stale_after: config.stale_after(),
            heartbeat_interval: config.heartbeat_interval().max(Duration::from_secs(1)),
            poll_interval: config.poll_interval().max(min),
            shutdown_timeout: config.shutdown_timeout(),
            backoff: Backoff::new(config.backoff_base(), config.backoff_max()),
        }
    }
}
