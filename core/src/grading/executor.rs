use std::{io, path::Path, process::Stdio, time::Duration};

use anyhow::Context;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    process::{Child, Command},
};

use super::{input::TestInput, outcome::ExecutionOutcome};

/// Runs a compiled program on one input under a wall-clock limit.
#[derive(Debug, Clone)]
pub struct Executor {
    timeout: Duration,
    kill_grace: Duration,
    output_limit: u64,
}

#[derive(Debug, thiserror::Error)]
#[error("Output limit exceeded ({limit} bytes)")]
struct OutputLimitExceeded {
    limit: u64,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);
    const DEFAULT_KILL_GRACE: Duration = Duration::from_millis(200);
    const DEFAULT_OUTPUT_LIMIT: u64 = 8 * 1024 * 1024;

    pub fn new() -> Self {
        Self {
            timeout: Self::DEFAULT_TIMEOUT,
            kill_grace: Self::DEFAULT_KILL_GRACE,
            output_limit: Self::DEFAULT_OUTPUT_LIMIT,
        }
    }

    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = limit;
        self
    }

    /// How long each termination stage waits before escalating to the next.
    pub fn kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    /// Bytes kept per stream; a program writing more is stopped early.
    pub fn output_limit(mut self, bytes: u64) -> Self {
        self.output_limit = bytes;
        self
    }

    /// Never fails: anything that goes wrong is folded into the outcome.
    pub async fn run(&self, executable: &Path, input: &TestInput) -> ExecutionOutcome {
        match self.try_run(executable, input).await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("Error running {}: {:#}", executable.to_string_lossy(), e);
                ExecutionOutcome::RuntimeError(format!("Error: {:#}", e))
            }
        }
    }

    async fn try_run(
        &self,
        executable: &Path,
        input: &TestInput,
    ) -> anyhow::Result<ExecutionOutcome> {
        let mut cmd = Command::new(executable);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so that signals also reach anything the program forks.
        #[cfg(unix)]
        cmd.process_group(0);

        let mut proc = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn '{}'", executable.to_string_lossy()))?;
        let mut stdin = proc.stdin.take().context("Failed to open stdin")?;
        let mut stdout = proc.stdout.take().context("Failed to open stdout")?;
        let mut stderr = proc.stderr.take().context("Failed to open stderr")?;

        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();
        let stdin_data = format!("{}\n", input);

        let res = {
            let fut_stdin = async move {
                // A program may exit without reading its input.
                match stdin.write_all(stdin_data.as_bytes()).await {
                    Err(e) if e.kind() != io::ErrorKind::BrokenPipe => Err(e),
                    _ => Ok(()),
                }
            };
            let fut_stdout = capture(&mut stdout, &mut stdout_buf, self.output_limit);
            let fut_stderr = capture(&mut stderr, &mut stderr_buf, self.output_limit);
            let fut_exit_status = proc.wait();

            tokio::time::timeout(self.timeout, async {
                tokio::try_join!(fut_stdin, fut_stdout, fut_stderr, fut_exit_status)
            })
            .await
        };

        match res {
            Err(_) => {
                log::warn!(
                    "Timeout after {}ms for input '{}' ({})",
                    self.timeout.as_millis(),
                    input,
                    executable.to_string_lossy()
                );
                terminate(&mut proc, self.kill_grace).await;
                Ok(ExecutionOutcome::Timeout)
            }

            Ok(Err(e)) => {
                terminate(&mut proc, self.kill_grace).await;
                match e.get_ref().and_then(|e| e.downcast_ref::<OutputLimitExceeded>()) {
                    Some(exceeded) => {
                        log::warn!(
                            "{} for input '{}' ({})",
                            exceeded,
                            input,
                            executable.to_string_lossy()
                        );
                        Ok(ExecutionOutcome::RuntimeError(exceeded.to_string()))
                    }
                    None => Err(e).context("Failed to communicate with subprocess"),
                }
            }

            Ok(Ok((_, _, _, exit_status))) => {
                if exit_status.success() {
                    let stdout = String::from_utf8_lossy(&stdout_buf);
                    return Ok(ExecutionOutcome::Output(stdout.trim().to_owned()));
                }
                let stderr = String::from_utf8_lossy(&stderr_buf);
                let msg = match stderr.trim() {
                    "" => exit_status.to_string(),
                    s => s.to_owned(),
                };
                Ok(ExecutionOutcome::RuntimeError(msg))
            }
        }
    }
}

/// Reads the whole stream into `buf`, failing once it grows past `limit` bytes.
async fn capture<R>(reader: R, buf: &mut Vec<u8>, limit: u64) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    reader.take(limit.saturating_add(1)).read_to_end(buf).await?;
    if buf.len() as u64 > limit {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            OutputLimitExceeded { limit },
        ));
    }
    Ok(())
}

/// Interrupt, then terminate, then kill; always reaps. Safe to call on a process
/// that has already exited.
async fn terminate(proc: &mut Child, grace: Duration) {
    #[cfg(unix)]
    {
        use nix::sys::signal::Signal;

        let group = proc.id();
        for sig in [Signal::SIGINT, Signal::SIGTERM] {
            if proc.id().is_none() {
                break;
            }
            signal_group(group, sig);
            if let Ok(Ok(_)) = tokio::time::timeout(grace, proc.wait()).await {
                break;
            }
        }
        // Also reaches descendants that outlived the program itself.
        signal_group(group, Signal::SIGKILL);
    }

    if proc.id().is_none() {
        return;
    }
    if let Err(e) = proc.start_kill() {
        log::debug!("Failed to kill process: {:#}", e);
    }
    match tokio::time::timeout(grace, proc.wait()).await {
        Ok(Ok(_)) => (),
        Ok(Err(e)) => log::warn!("Failed to reap killed process: {:#}", e),
        Err(_) => log::error!(
            "Process {:?} still alive {}ms after SIGKILL",
            proc.id(),
            grace.as_millis()
        ),
    }
}

#[cfg(unix)]
fn signal_group(group: Option<u32>, sig: nix::sys::signal::Signal) {
    use nix::{errno::Errno, sys::signal::killpg, unistd::Pid};

    let Some(pgid) = group else {
        return;
    };
    match killpg(Pid::from_raw(pgid as i32), sig) {
        Ok(()) | Err(Errno::ESRCH) => (),
        Err(e) => log::debug!("Failed to send {:?} to process group {}: {}", sig, pgid, e),
    }
}
