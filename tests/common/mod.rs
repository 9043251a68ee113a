//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which creates a file-backed store in a scratch
//! directory and a [`Queue`] with fast timings. Helpers build zip uploads
//! and shell-script converters standing in for FBX2glTF.

#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use gf_core::config::StoreConfig;
use gf_core::{JobId, JobState};
use gf_db::{init_pool, Job, JobStore, SqliteJobStore};
use gf_queue::{Backoff, Queue, QueueSettings};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

/// Scratch directory plus a queue over a SQLite file inside it.
pub struct TestHarness {
    pub dir: TempDir,
    pub store: Arc<dyn JobStore>,
    pub queue: Queue,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_settings(fast_settings())
    }

    pub fn with_settings(settings: QueueSettings) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let store = open_store(dir.path());
        let queue = Queue::new(Arc::clone(&store), settings);
        Self { dir, store, queue }
    }

    /// A second queue over the same database, as a restarted process would see it.
    pub fn reopen(&self, settings: QueueSettings) -> Queue {
        Queue::new(open_store(self.dir.path()), settings)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn job(&self, id: JobId) -> Job {
        self.store.get(id).expect("job should exist")
    }

    pub fn log_messages(&self, id: JobId) -> Vec<String> {
        self.store
            .logs(id)
            .expect("logs should be readable")
            .into_iter()
            .map(|l| l.message)
            .collect()
    }

    /// Poll until the job reaches `state` or `timeout` elapses.
    pub async fn wait_for_state(&self, id: JobId, state: JobState, timeout: Duration) -> Job {
        self.wait_for(id, timeout, |job| job.state == state).await
    }

    /// Poll until `done` holds for the job or `timeout` elapses.
    pub async fn wait_for(
        &self,
        id: JobId,
        timeout: Duration,
        done: impl Fn(&Job) -> bool,
    ) -> Job {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let job = self.job(id);
            if done(&job) {
                return job;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!(
                    "job {id} did not settle within {timeout:?}; last state {} after {} attempts (error {:?})",
                    job.state, job.attempts_made, job.error
                );
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

fn open_store(dir: &Path) -> Arc<dyn JobStore> {
    let config = StoreConfig {
        db_path: dir.join("jobs.db"),
        pool_size: 4,
        ..StoreConfig::default()
    };
    Arc::new(SqliteJobStore::new(
        init_pool(&config).expect("failed to open store"),
    ))
}

/// Millisecond-scale timings; the watchdog is off unless a test enables it.
pub fn fast_settings() -> QueueSettings {
    QueueSettings {
        watchdog_interval: None,
        stale_after: Duration::from_secs(60),
        heartbeat_interval: Duration::from_secs(1),
        poll_interval: Duration::from_millis(20),
        shutdown_timeout: Duration::from_secs(5),
        backoff: Backoff::new(Duration::from_millis(50), Duration::from_secs(1)),
    }
}

/// Write a zip archive with the given entry names (each with a small body).
pub fn write_archive(path: &Path, entries: &[&str]) -> PathBuf {
    let mut zip = zip::ZipWriter::new(File::create(path).expect("create archive"));
    for name in entries {
        zip.start_file(*name, SimpleFileOptions::default())
            .expect("start entry");
        zip.write_all(b"fbx-bytes").expect("write entry");
    }
    zip.finish().expect("finish archive");
    path.to_path_buf()
}

/// Install an executable shell script named `name` in `dir`.
#[cfg(unix)]
pub fn fake_converter(dir: &Path, name: &str, script: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let exe = dir.join(name);
    std::fs::write(&exe, format!("#!/bin/sh\n{script}\n")).expect("write script");
    std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755))
        .expect("chmod script");
    exe
}

/// Script that behaves like a successful FBX2glTF run: a progress line on
/// stdout and `<output>.glb` written.
pub const CONVERTER_OK: &str = r#"out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "--output" ]; then out="$2"; fi
  shift
done
echo "Wrote $out.glb"
printf 'glTF' > "$out.glb""#;
