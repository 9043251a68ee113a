//! Application wiring: configuration, store, queue and converter.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gf_convert::{create_converter_job, register_converter, Submission};
use gf_core::config::Config;
use gf_core::{Error, Result, UniqueId};
use gf_db::{init_pool, Job, JobStore, SqliteJobStore};
use gf_queue::{Queue, QueueSettings, ShutdownReport};

/// A configured queue over the persistent store.
pub struct App {
    config: Config,
    queue: Queue,
}

impl App {
    /// Load configuration from `config_path` (defaults when absent) and apply
    /// environment overrides.
    pub fn load_config(config_path: Option<&Path>) -> Config {
        let mut config = Config::load_or_default(config_path);
        config.apply_env();
        for warning in config.validate() {
            tracing::warn!("Config: {}", warning);
        }
        config
    }

    /// Open the store and build a queue. No handler is registered, which is
    /// enough for submission and administration.
    pub fn open(config: Config) -> Result<Self> {
        tracing::debug!(db_path = %config.store.db_path.display(), "Opening job store");
        let pool = init_pool(&config.store)?;
        let store: Arc<dyn JobStore> = Arc::new(SqliteJobStore::new(pool));
        let queue = Queue::new(store, QueueSettings::from(&config.queue));
        Ok(Self { config, queue })
    }

    /// Like [`open`](App::open), with the converter job registered.
    pub fn with_converter(config: Config) -> Result<Self> {
        let app = Self::open(config)?;
        register_converter(&app.queue, &app.config.converter)?;
        Ok(app)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    /// Copy `archive` into the uploads directory and enqueue a converter
    /// job for it. The caller's file is left in place.
    pub fn submit(
        &self,
        archive: &Path,
        original_filename: Option<String>,
        unique_id: Option<String>,
    ) -> Result<Job> {
        if !archive.is_file() {
            return Err(Error::Validation(format!(
                "archive does not exist: {}",
                archive.display()
            )));
        }

        let original_filename = original_filename.unwrap_or_else(|| {
            archive
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default()
        });
        let unique_id = unique_id.unwrap_or_else(|| UniqueId::generate().to_string());
        gf_convert::validate_unique_id(&unique_id)?;

        let uploads = &self.config.converter.uploads_dir;
        std::fs::create_dir_all(uploads)?;
        let stored = absolute(&uploads.join(format!("{unique_id}.zip")))?;
        std::fs::copy(archive, &stored)?;

        let submission = Submission::new(original_filename, stored.clone()).unique_id(unique_id);
        match create_converter_job(&self.queue, submission) {
            Ok(job) => Ok(job),
            Err(e) => {
                if let Err(cleanup) = std::fs::remove_file(&stored) {
                    tracing::warn!(
                        path = %stored.display(),
                        error = %cleanup,
                        "Failed to remove stored upload"
                    );
                }
                Err(e)
            }
        }
    }

    /// Start the engine, run until `shutdown` resolves, then drain.
    pub async fn run<F>(&self, shutdown: F) -> Result<ShutdownReport>
    where
        F: Future<Output = ()>,
    {
        self.queue.start()?;
        tracing::info!("Conversion engine running");

        shutdown.await;

        let timeout = self.config.queue.shutdown_timeout();
        tracing::info!(timeout_ms = timeout.as_millis() as u64, "Shutting down...");
        let report = self.queue.shutdown(timeout).await;
        if report.drained {
            tracing::info!("All in-flight jobs finished");
        } else {
            tracing::warn!(forced = report.forced.len(), "Forced in-flight jobs to fail");
        }
        Ok(report)
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}
