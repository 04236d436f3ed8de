use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::ExecConfig;
use crate::error::ExecError;
use crate::util::RingBytes;

use super::capture::pump;
use super::channel::{spawn_channel, ChannelKind};
use super::types::{CommandResult, CommandSpec, ExecuteOpts};

/// How long to keep draining output pumps after the child is gone. A killed
/// child's pipe can stay open if it leaked the write end to a grandchild;
/// the captured tail is in the ring either way.
const DRAIN_MS: u64 = 500;

/// Raw observation of one spawned process.
struct RawOutcome {
    output: String,
    exit_code: i32,
    timed_out: bool,
    timeout_ms: u64,
}

/// Spawns external processes and reduces every outcome to a
/// [`CommandResult`].
#[derive(Clone)]
pub struct CommandExecutor {
    cfg: Arc<ExecConfig>,
}

impl CommandExecutor {
    pub fn new(cfg: Arc<ExecConfig>) -> Self {
        Self { cfg }
    }

    /// Raw mode: spawn and return `(output, exit_code)` with no logging.
    ///
    /// Exit code -1 means the process did not exit normally (killed on
    /// deadline, or terminated by signal).
    pub async fn run_raw(&self, spec: &CommandSpec) -> Result<(String, i32), ExecError> {
        let out = self
            .observe(spec, &ChannelKind::Pipe, self.cfg.command_timeout_ms)
            .await?;
        Ok((out.output, out.exit_code))
    }

    /// Normal mode: raw plus wall-clock duration and a log record for every
    /// attempt. Spawn failure comes back as a `CommandResult`, not an error.
    ///
    /// With `opts.halt` set, an exit code that is neither 0 nor 1 logs an
    /// error and terminates the host process.
    pub async fn run(
        &self,
        spec: &CommandSpec,
        opts: &ExecuteOpts,
    ) -> Result<CommandResult, ExecError> {
        let timeout_ms = opts.timeout_ms.unwrap_or(self.cfg.command_timeout_ms);
        let result = self.execute(spec, &ChannelKind::Pipe, timeout_ms).await?;

        if opts.halt && result.exit_code != 0 && result.exit_code != 1 {
            tracing::error!(
                command = %result.command,
                exit_code = result.exit_code,
                "halting after command failure"
            );
            std::process::exit(if result.exit_code > 0 {
                result.exit_code
            } else {
                1
            });
        }

        Ok(result)
    }

    /// Silent mode: normal with the captured output discarded; only the exit
    /// code is returned.
    pub async fn run_silent(&self, spec: &CommandSpec) -> Result<i32, ExecError> {
        let result = self.run(spec, &ExecuteOpts::default()).await?;
        Ok(result.exit_code)
    }

    /// Interactive mode: pty-helper-backed channel when the helper binary is
    /// on PATH, plain pipes otherwise. Streams accumulate until exit or the
    /// command timeout, at which point the channel is forcibly closed.
    pub async fn run_interactive(&self, spec: &CommandSpec) -> Result<CommandResult, ExecError> {
        self.execute(spec, &ChannelKind::interactive(), self.cfg.command_timeout_ms)
            .await
    }

    /// Sudo mode: interactive via the privilege-elevation helper. A missing
    /// `sudo` binary yields exit code 127 without spawning anything.
    pub async fn run_sudo(&self, spec: &CommandSpec) -> Result<CommandResult, ExecError> {
        self.run_elevated(spec, which::which("sudo").ok()).await
    }

    async fn run_elevated(
        &self,
        spec: &CommandSpec,
        sudo: Option<PathBuf>,
    ) -> Result<CommandResult, ExecError> {
        let Some(sudo) = sudo else {
            let result = CommandResult::failure(
                spec,
                String::new(),
                127,
                0,
                "sudo binary not found; cannot run elevated command",
            );
            log_result(&result);
            return Ok(result);
        };

        tracing::warn!(
            command = %spec.to_command_line(),
            "executing command with elevated privileges"
        );

        let mut argv = vec![sudo.to_string_lossy().into_owned()];
        match spec {
            CommandSpec::Shell(line) => {
                argv.push(self.cfg.shell.clone());
                argv.push("-c".into());
                argv.push(line.clone());
            }
            CommandSpec::Argv(v) => argv.extend(v.iter().cloned()),
        }
        let elevated = CommandSpec::Argv(argv);

        self.execute(&elevated, &ChannelKind::interactive(), self.cfg.command_timeout_ms)
            .await
    }

    /// Shared spawn-observe-log path behind the public modes.
    async fn execute(
        &self,
        spec: &CommandSpec,
        kind: &ChannelKind,
        timeout_ms: u64,
    ) -> Result<CommandResult, ExecError> {
        let started = Instant::now();

        let result = match self.observe(spec, kind, timeout_ms).await {
            Ok(out) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                if out.timed_out {
                    CommandResult::failure(
                        spec,
                        out.output,
                        -1,
                        duration_ms,
                        format!("Command timed out after {}ms", out.timeout_ms),
                    )
                } else {
                    CommandResult::from_exit(spec, out.output, out.exit_code, duration_ms)
                }
            }
            Err(ExecError::Io(e)) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                CommandResult::failure(
                    spec,
                    String::new(),
                    -1,
                    duration_ms,
                    format!("spawn failed: {e}"),
                )
            }
            Err(e) => return Err(e),
        };

        log_result(&result);
        Ok(result)
    }

    /// Spawn and watch one process: both streams are pumped incrementally
    /// into a bounded ring while a monotonic deadline (measured from spawn
    /// start, not first byte) runs against the child.
    async fn observe(
        &self,
        spec: &CommandSpec,
        kind: &ChannelKind,
        timeout_ms: u64,
    ) -> Result<RawOutcome, ExecError> {
        let mut channel = spawn_channel(&self.cfg, spec, kind)?;
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);

        let ring = RingBytes::new(self.cfg.capture_bytes);
        let out_pump = pump(channel.stdout, ring.clone());
        let err_pump = pump(channel.stderr, ring.clone());

        let mut timed_out = false;
        let exit_code = tokio::select! {
            status = channel.child.wait() => match status {
                Ok(s) => s.code().unwrap_or(-1),
                Err(_) => -1,
            },
            _ = tokio::time::sleep_until(deadline) => {
                timed_out = true;
                let _ = channel.child.start_kill();
                -1
            }
        };

        let _ = tokio::time::timeout(Duration::from_millis(DRAIN_MS), async {
            let _ = out_pump.await;
            let _ = err_pump.await;
        })
        .await;

        Ok(RawOutcome {
            output: ring.to_string_lossy(),
            exit_code,
            timed_out,
            timeout_ms,
        })
    }
}

/// The logging collaborator: every attempt is reported with command text,
/// exit code, duration and success flag. With no subscriber installed these
/// calls are no-ops.
fn log_result(result: &CommandResult) {
    tracing::info!(
        command = %result.command,
        exit_code = result.exit_code,
        duration_ms = result.duration_ms,
        success = result.success,
        error = result.error.as_deref().unwrap_or(""),
        "command executed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executor() -> CommandExecutor {
        CommandExecutor::new(Arc::new(ExecConfig::default()))
    }

    fn executor_with_timeout(ms: u64) -> CommandExecutor {
        let cfg = ExecConfig {
            command_timeout_ms: ms,
            ..ExecConfig::default()
        };
        CommandExecutor::new(Arc::new(cfg))
    }

    #[tokio::test]
    async fn shell_line_captures_output_and_exit_zero() {
        let r = executor()
            .run(&CommandSpec::shell("echo hello"), &ExecuteOpts::default())
            .await
            .unwrap();
        assert!(r.success);
        assert_eq!(r.exit_code, 0);
        assert!(r.output.contains("hello"));
        assert!(r.error.is_none());
    }

    #[tokio::test]
    async fn nonzero_exit_is_failure() {
        let r = executor()
            .run(&CommandSpec::shell("false"), &ExecuteOpts::default())
            .await
            .unwrap();
        assert!(!r.success);
        assert_ne!(r.exit_code, 0);
    }

    #[tokio::test]
    async fn stderr_is_part_of_combined_output() {
        let r = executor()
            .run(
                &CommandSpec::shell("echo oops 1>&2"),
                &ExecuteOpts::default(),
            )
            .await
            .unwrap();
        assert!(r.success);
        assert!(r.output.contains("oops"));
    }

    #[tokio::test]
    async fn empty_command_line_still_spawns_the_shell() {
        let r = executor()
            .run(&CommandSpec::shell(""), &ExecuteOpts::default())
            .await
            .unwrap();
        assert!(r.success);
        assert_eq!(r.exit_code, 0);
    }

    #[tokio::test]
    async fn argv_form_bypasses_the_shell() {
        let (out, code) = executor()
            .run_raw(&CommandSpec::argv(["echo", "$HOME"]))
            .await
            .unwrap();
        assert_eq!(code, 0);
        // No shell, no expansion.
        assert!(out.contains("$HOME"));
    }

    #[tokio::test]
    async fn deadline_kills_the_child_and_reports_timeout() {
        let started = std::time::Instant::now();
        let r = executor_with_timeout(100)
            .run(&CommandSpec::shell("sleep 5"), &ExecuteOpts::default())
            .await
            .unwrap();
        assert!(!r.success);
        assert_eq!(r.exit_code, -1);
        assert!(r.error.as_deref().unwrap().contains("timed out"));
        assert!(started.elapsed() < std::time::Duration::from_secs(3));
    }

    #[tokio::test]
    async fn spawn_failure_becomes_a_result_not_an_error() {
        let r = executor()
            .run(
                &CommandSpec::argv(["/definitely/not/a/binary"]),
                &ExecuteOpts::default(),
            )
            .await
            .unwrap();
        assert!(!r.success);
        assert_eq!(r.exit_code, -1);
        assert!(r.error.as_deref().unwrap().contains("spawn failed"));
    }

    #[tokio::test]
    async fn silent_mode_returns_only_the_exit_code() {
        let code = executor()
            .run_silent(&CommandSpec::shell("exit 3"))
            .await
            .unwrap();
        assert_eq!(code, 3);
    }

    #[tokio::test]
    async fn missing_sudo_reports_127_without_spawning() {
        let r = executor()
            .run_elevated(&CommandSpec::shell("id"), None)
            .await
            .unwrap();
        assert!(!r.success);
        assert_eq!(r.exit_code, 127);
        assert!(r.error.as_deref().unwrap().contains("sudo"));
    }

    #[tokio::test]
    async fn output_capture_is_tail_bounded() {
        let cfg = ExecConfig {
            capture_bytes: 32,
            ..ExecConfig::default()
        };
        let exec = CommandExecutor::new(Arc::new(cfg));
        let r = exec
            .run(
                &CommandSpec::shell("yes x | head -c 4096; echo END"),
                &ExecuteOpts::default(),
            )
            .await
            .unwrap();
        assert!(r.output.len() <= 32);
        assert!(r.output.contains("END"));
    }
}
