//! Builder for executing external tool commands with line streaming.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use gf_core::{Error, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Which output stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Output captured from a tool execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, or `None` if the process was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Lines written to standard output (lossy UTF-8, line ending removed).
    pub stdout_lines: Vec<String>,
    /// Lines written to standard error (lossy UTF-8, line ending removed).
    pub stderr_lines: Vec<String>,
}

impl ToolOutput {
    /// Zero exit status and nothing at all on standard error.
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0) && self.stderr_lines.is_empty()
    }
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use gf_convert::{Stream, ToolCommand};
/// use std::path::PathBuf;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> gf_core::Result<()> {
/// let cancel = CancellationToken::new();
/// let output = ToolCommand::new(PathBuf::from("FBX2glTF-linux-x64"))
///     .arg("--binary")
///     .arg("--input").arg("/projects/abc/model.fbx")
///     .arg("--output").arg("/projects/abc/model")
///     .execute_streaming(&cancel, |stream, line| {
///         if stream == Stream::Stderr {
///             eprintln!("{line}");
///         }
///     })
///     .await?;
/// assert!(output.succeeded());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            current_dir: None,
            timeout: None,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the working directory of the child.
    pub fn current_dir(&mut self, dir: PathBuf) -> &mut Self {
        self.current_dir = Some(dir);
        self
    }

    /// Set the maximum execution time. Unbounded by default.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = Some(d);
        self
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Execute the command and collect its output.
    pub async fn execute(&self) -> Result<ToolOutput> {
        self.execute_streaming(&CancellationToken::new(), |_, _| {})
            .await
    }

    /// Execute the command, handing each output line to `on_line` as soon
    /// as it is read.
    ///
    /// A non-zero exit is not an error here; inspect
    /// [`ToolOutput::succeeded`]. The child is killed when `cancel` fires,
    /// when the timeout expires, or when the returned future is dropped.
    ///
    /// # Errors
    ///
    /// - [`Error::Conversion`] if spawning fails, the timeout expires or
    ///   `cancel` fires.
    /// - [`Error::Io`] if waiting for the child fails.
    pub async fn execute_streaming<F>(
        &self,
        cancel: &CancellationToken,
        mut on_line: F,
    ) -> Result<ToolOutput>
    where
        F: FnMut(Stream, &str),
    {
        let program_name = self.program_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref dir) = self.current_dir {
            cmd.current_dir(dir);
        }

        tracing::debug!(program = %self.program.display(), args = ?self.args, "Spawning tool");

        let mut child = cmd.spawn().map_err(|e| {
            Error::conversion(format!("failed to spawn {program_name}: {e}"), None, Vec::new())
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Internal("child stdout was not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Internal("child stderr was not captured".into()))?;
        let mut stdout = BufReader::new(stdout);
        let mut stderr = BufReader::new(stderr);

        // Partially read lines survive across select iterations in these.
        let mut out_buf = Vec::new();
        let mut err_buf = Vec::new();
        let mut out_open = true;
        let mut err_open = true;

        let mut output = ToolOutput::default();

        let deadline = async {
            match self.timeout {
                Some(t) => tokio::time::sleep(t).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        let status = loop {
            tokio::select! {
                read = stdout.read_until(b'\n', &mut out_buf), if out_open => match read {
                    Ok(0) => out_open = false,
                    Ok(_) => {
                        let line = take_line(&mut out_buf);
                        on_line(Stream::Stdout, &line);
                        output.stdout_lines.push(line);
                    }
                    Err(e) => {
                        tracing::warn!(program = %program_name, error = %e, "Failed to read stdout");
                        out_open = false;
                    }
                },
                read = stderr.read_until(b'\n', &mut err_buf), if err_open => match read {
                    Ok(0) => err_open = false,
                    Ok(_) => {
                        let line = take_line(&mut err_buf);
                        on_line(Stream::Stderr, &line);
                        output.stderr_lines.push(line);
                    }
                    Err(e) => {
                        tracing::warn!(program = %program_name, error = %e, "Failed to read stderr");
                        err_open = false;
                    }
                },
                status = child.wait(), if !out_open && !err_open => break status?,
                _ = cancel.cancelled() => {
                    kill(&mut child, &program_name).await;
                    return Err(Error::conversion(
                        format!("{program_name} was cancelled"),
                        None,
                        output.stderr_lines,
                    ));
                }
                _ = &mut deadline => {
                    kill(&mut child, &program_name).await;
                    return Err(Error::conversion(
                        format!("{program_name} timed out after {:?}", self.timeout.unwrap_or_default()),
                        None,
                        output.stderr_lines,
                    ));
                }
            }
        };

        output.exit_code = status.code();
        tracing::debug!(
            program = %program_name,
            exit_code = ?output.exit_code,
            stdout_lines = output.stdout_lines.len(),
            stderr_lines = output.stderr_lines.len(),
            "Tool exited"
        );
        Ok(output)
    }
}

fn take_line(buf: &mut Vec<u8>) -> String {
    let line = String::from_utf8_lossy(buf)
        .trim_end_matches(['\n', '\r'])
        .to_string();
    buf.clear();
    line
}

async fn kill(child: &mut tokio::process::Child, program_name: &str) {
    if let Err(e) = child.kill().await {
        tracing::debug!(program = %program_name, error = %e, "Failed to kill child");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> ToolCommand {
        let mut cmd = ToolCommand::new(PathBuf::from("sh"));
        cmd.arg("-c").arg(script);
        cmd
    }

    #[tokio::test]
    async fn streams_lines_in_order() {
        let mut seen = Vec::new();
        let output = sh("echo one; echo two; echo oops >&2")
            .execute_streaming(&CancellationToken::new(), |stream, line| {
                seen.push((stream, line.to_string()));
            })
            .await
            .unwrap();

        assert_eq!(output.exit_code, Some(0));
        assert_eq!(output.stdout_lines, vec!["one", "two"]);
        assert_eq!(output.stderr_lines, vec!["oops"]);
        assert!(!output.succeeded());
        assert!(seen.contains(&(Stream::Stdout, "one".to_string())));
        assert!(seen.contains(&(Stream::Stderr, "oops".to_string())));
    }

    #[tokio::test]
    async fn clean_exit_succeeds() {
        let output = sh("printf 'no newline'").execute().await.unwrap();
        assert!(output.succeeded());
        assert_eq!(output.stdout_lines, vec!["no newline"]);
    }

    #[tokio::test]
    async fn non_zero_exit_is_reported() {
        let output = sh("exit 3").execute().await.unwrap();
        assert_eq!(output.exit_code, Some(3));
        assert!(!output.succeeded());
    }

    #[tokio::test]
    async fn current_dir_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        let mut cmd = sh("pwd");
        cmd.current_dir(dir.path().to_path_buf());
        let output = cmd.execute().await.unwrap();
        let reported = std::fs::canonicalize(&output.stdout_lines[0]).unwrap();
        assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
    }

    #[tokio::test]
    async fn nonexistent_tool_fails_to_spawn() {
        let err = ToolCommand::new(PathBuf::from("nonexistent_tool_xyz_12345"))
            .execute()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "conversion");
    }

    #[tokio::test]
    async fn timeout_fires() {
        let err = sh("sleep 10")
            .timeout(Duration::from_millis(100))
            .execute()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn cancellation_kills_child() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = sh("sleep 10")
            .execute_streaming(&cancel, |_, _| {})
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cancelled"));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
