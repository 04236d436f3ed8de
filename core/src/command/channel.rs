use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::{Child, ChildStderr, ChildStdout, Command};

use crate::config::ExecConfig;
use crate::error::ExecError;

use super::types::CommandSpec;

/// Name of the terminal-emulation helper used for pty-backed channels.
const PTY_HELPER: &str = "script";

/// How the child's terminal side is provided.
///
/// Platform differences stay behind this one seam: callers pick a kind and
/// get the same `ProcessChannel` back either way.
#[derive(Debug, Clone)]
pub(crate) enum ChannelKind {
    /// Plain piped stdout/stderr.
    Pipe,
    /// Run under the pty helper binary so the child sees a terminal.
    PtyHelper(PathBuf),
}

impl ChannelKind {
    /// Pty-backed when the helper is on PATH, plain pipe otherwise.
    pub(crate) fn interactive() -> Self {
        match which::which(PTY_HELPER) {
            Ok(path) => Self::PtyHelper(path),
            Err(_) => Self::Pipe,
        }
    }
}

/// A spawned child with both output streams taken and ready to pump.
pub(crate) struct ProcessChannel {
    pub child: Child,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
}

/// Spawn `spec` over the given channel kind.
///
/// Spawn failure surfaces as `ExecError::Io` (the executor turns it into a
/// `CommandResult`); a child without usable output pipes is
/// `ExecError::Channel`, the one unrecoverable case.
pub(crate) fn spawn_channel(
    cfg: &ExecConfig,
    spec: &CommandSpec,
    kind: &ChannelKind,
) -> Result<ProcessChannel, ExecError> {
    let mut cmd = match kind {
        ChannelKind::Pipe => match spec {
            CommandSpec::Shell(line) => {
                // An empty line still spawns the shell with an empty
                // instruction.
                let mut c = Command::new(&cfg.shell);
                c.arg("-c").arg(line);
                c
            }
            CommandSpec::Argv(argv) => match argv.first() {
                Some(program) => {
                    let mut c = Command::new(program);
                    c.args(&argv[1..]);
                    c
                }
                None => {
                    let mut c = Command::new(&cfg.shell);
                    c.arg("-c").arg("");
                    c
                }
            },
        },
        ChannelKind::PtyHelper(helper) => {
            // script -qec "<line>" /dev/null: quiet, pty-backed, no typescript
            // file left behind.
            let mut c = Command::new(helper);
            c.arg("-qec").arg(spec.to_command_line()).arg("/dev/null");
            c
        }
    };

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn()?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ExecError::Channel("child stdout pipe missing".into()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| ExecError::Channel("child stderr pipe missing".into()))?;

    Ok(ProcessChannel {
        child,
        stdout,
        stderr,
    })
}
