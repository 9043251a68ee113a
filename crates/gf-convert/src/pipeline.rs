//! The converter job: extract, discover and convert.
//!
//! Each stage writes its start, completion and errors to the job log so a
//! client can reconstruct the whole run from the store alone. Stages run
//! strictly in sequence; the first error fails the attempt.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use gf_core::config::ConverterConfig;
use gf_core::{Error, JobData, Result};
use gf_queue::{JobContext, JobHandler, Queue};
use serde_json::Value;

use crate::command::{Stream, ToolCommand};
use crate::discover::find_asset;
use crate::extract::extract_archive;
use crate::keys;
use crate::paths::{project_dir, target_paths};
use crate::submit::JOB_TYPE;
use crate::tools::resolve_converter;

/// Everything the converter job needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct ConverterSettings {
    pub executable: PathBuf,
    /// Working directory of the converter process.
    pub install_root: PathBuf,
    pub projects_dir: PathBuf,
    pub source_extension: String,
    pub target_extension: String,
    pub timeout: Option<Duration>,
}

impl ConverterSettings {
    /// Resolve the executable and fill in defaults from `config`.
    ///
    /// Without an explicit install root the converter runs from the
    /// directory that contains it.
    pub fn from_config(config: &ConverterConfig) -> Result<Self> {
        let executable = resolve_converter(config)?;
        let install_root = match &config.install_root {
            Some(root) => root.clone(),
            None => executable
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        };

        Ok(Self {
            executable,
            install_root,
            projects_dir: config.projects_dir.clone(),
            source_extension: config.source_extension.trim_start_matches('.').to_string(),
            target_extension: config.target_extension.trim_start_matches('.').to_string(),
            timeout: config.timeout(),
        })
    }
}

/// [`JobHandler`] for `converter-job`.
pub struct ConverterJob {
    settings: ConverterSettings,
}

impl ConverterJob {
    pub fn new(settings: ConverterSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ConverterSettings {
        &self.settings
    }

    /// Extract the uploaded archive, locate the source asset, record it and
    /// delete the archive. Returns the asset path.
    async fn unzip_stage(&self, ctx: &mut JobContext, unique_id: &str) -> Result<PathBuf> {
        let archive = PathBuf::from(
            ctx.data_str(keys::FILEPATH)
                .ok_or_else(|| Error::Validation(format!("job data has no {:?}", keys::FILEPATH)))?,
        );
        let dest = project_dir(&self.settings.projects_dir, unique_id)?;

        if ctx.attempt() <= 1 && !dir_is_empty_or_absent(&dest).await? {
            return Err(Error::Validation(format!(
                "project directory {} already exists and is not empty",
                dest.display()
            )));
        }

        ctx.log(format!(
            "Starting unzipping of job #{unique_id} to \"{}\".",
            dest.display()
        ));
        if let Err(e) = extract_archive(&archive, &dest).await {
            ctx.log(format!("An error occured when unzipping job #{unique_id}: {e}"));
            return Err(e);
        }
        ctx.log(format!("Completed unzipping of job #{unique_id}."));

        let asset = match find_asset(&dest, &self.settings.source_extension).await {
            Ok(asset) => asset,
            Err(e) => {
                ctx.log(format!("{e}"));
                return Err(e);
            }
        };
        merge(ctx, keys::FBX_FILE_PATH, path_value(&asset))?;

        if let Err(e) = tokio::fs::remove_file(&archive).await {
            ctx.log(format!(
                "An error occured when deleting ZIP for job #{unique_id}: {e}"
            ));
            return Err(e.into());
        }
        ctx.log(format!("Deleted ZIP for job #{unique_id}."));

        Ok(asset)
    }

    /// Run the converter on `asset`, streaming its output into the job log.
    async fn convert_stage(&self, ctx: &mut JobContext, unique_id: &str, asset: &Path) -> Result<()> {
        let target = target_paths(asset, &self.settings.target_extension)?;
        let mut partial = JobData::new();
        partial.insert(keys::GLB_FILE_NAME.into(), Value::String(target.file_name.clone()));
        partial.insert(keys::GLB_FILE_PATH.into(), path_value(&target.file_path));
        ctx.merge_data(partial)?;

        let mut cmd = ToolCommand::new(self.settings.executable.clone());
        cmd.arg("--binary")
            .arg("--input")
            .arg(asset.to_string_lossy())
            .arg("--output")
            .arg(target.output_base.to_string_lossy())
            .current_dir(self.settings.install_root.clone());
        if let Some(t) = self.settings.timeout {
            cmd.timeout(t);
        }

        ctx.log(format!("Starting FBX2glTF for job #{unique_id}."));
        let output = {
            let ctx = &*ctx;
            let result = cmd
                .execute_streaming(ctx.cancellation(), |stream, line| match stream {
                    Stream::Stdout => ctx.log(format!("PROCESS: {line}")),
                    Stream::Stderr => ctx.log(format!("ERROR: {line}")),
                })
                .await;
            match result {
                Ok(output) => output,
                Err(e) => {
                    ctx.log(format!("An error occured when running FBX2glTF for job #{unique_id}: {e}"));
                    return Err(e);
                }
            }
        };

        if output.succeeded() {
            ctx.log(format!("Completing FBX2glTF for job #{unique_id}."));
            return Ok(());
        }

        let message = match output.exit_code {
            Some(0) => "An error occured during the conversion: the converter wrote to stderr".to_string(),
            Some(code) => format!("An error occured during the conversion: exit status {code}"),
            None => "An error occured during the conversion: terminated by signal".to_string(),
        };
        ctx.log(&message);
        Err(Error::conversion(message, output.exit_code, output.stderr_lines))
    }
}

#[async_trait]
impl JobHandler for ConverterJob {
    async fn process(&self, mut ctx: JobContext) -> Result<()> {
        let unique_id = ctx
            .data_str(keys::UNIQUE_ID)
            .ok_or_else(|| Error::Validation(format!("job data has no {:?}", keys::UNIQUE_ID)))?
            .to_string();
        ctx.log(format!("Starting conversion of job #{unique_id}."));

        tracing::info!(
            job_id = %ctx.id(),
            unique_id = %unique_id,
            attempt = ctx.attempt(),
            "Starting conversion"
        );

        let reused = reusable_asset(&ctx).await;
        let asset = match reused {
            Some(asset) => {
                ctx.log(format!(
                    "Reusing extracted asset {} for job #{unique_id}.",
                    asset.display()
                ));
                asset
            }
            None => self.unzip_stage(&mut ctx, &unique_id).await?,
        };

        self.convert_stage(&mut ctx, &unique_id, &asset).await
    }
}

/// On a retry, the asset recorded by a previous attempt, if it is still on disk.
async fn reusable_asset(ctx: &JobContext) -> Option<PathBuf> {
    if ctx.attempt() <= 1 {
        return None;
    }
    let asset = PathBuf::from(ctx.data_str(keys::FBX_FILE_PATH)?);
    match tokio::fs::metadata(&asset).await {
        Ok(meta) if meta.is_file() => Some(asset),
        _ => None,
    }
}

async fn dir_is_empty_or_absent(dir: &Path) -> Result<bool> {
    match tokio::fs::read_dir(dir).await {
        Ok(mut rd) => Ok(rd.next_entry().await?.is_none()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(e.into()),
    }
}

fn path_value(path: &Path) -> Value {
    Value::String(path.to_string_lossy().to_string())
}

fn merge(ctx: &mut JobContext, key: &str, value: Value) -> Result<()> {
    let mut partial = JobData::new();
    partial.insert(key.to_string(), value);
    ctx.merge_data(partial)
}

/// Register the converter job on `queue` with the configured concurrency.
pub fn register_converter(queue: &Queue, config: &ConverterConfig) -> Result<()> {
    let settings = ConverterSettings::from_config(config)?;
    tracing::info!(
        executable = %settings.executable.display(),
        install_root = %settings.install_root.display(),
        projects_dir = %settings.projects_dir.display(),
        concurrency = config.concurrency,
        "Registering converter job"
    );
    queue.process(JOB_TYPE, config.concurrency, ConverterJob::new(settings))
}
