use serde::{Deserialize, Serialize};

/// How a command is given to the executor.
///
/// `Shell` lines are interpreted by the configured shell; `Argv` spawns the
/// first element directly and bypasses the shell entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSpec {
    Shell(String),
    Argv(Vec<String>),
}

impl CommandSpec {
    pub fn shell(line: impl Into<String>) -> Self {
        Self::Shell(line.into())
    }

    pub fn argv(args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::Argv(args.into_iter().map(Into::into).collect())
    }

    /// The `command` field reported in results.
    pub fn command(&self) -> String {
        match self {
            Self::Shell(line) => line.clone(),
            Self::Argv(v) => v.first().cloned().unwrap_or_default(),
        }
    }

    /// The `args` field reported in results.
    pub fn args(&self) -> Vec<String> {
        match self {
            Self::Shell(_) => Vec::new(),
            Self::Argv(v) => v.iter().skip(1).cloned().collect(),
        }
    }

    /// Flatten to a single shell-safe command line. Used by the pty-helper
    /// and privilege-elevation paths, which take one command string.
    pub fn to_command_line(&self) -> String {
        match self {
            Self::Shell(line) => line.clone(),
            Self::Argv(v) => v
                .iter()
                .map(|a| shell_quote(a))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ':' | '='));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Per-call execution options.
#[derive(Debug, Clone, Default)]
pub struct ExecuteOpts {
    /// Terminate the host process when the exit code is neither 0 nor 1.
    pub halt: bool,

    /// Override for the configured command timeout.
    pub timeout_ms: Option<u64>,
}

/// Outcome of one external process invocation. Constructed once at the end
/// of an execution attempt; immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    pub command: String,
    pub args: Vec<String>,
    /// Combined captured stream (stdout + stderr, tail-bounded).
    pub output: String,
    pub exit_code: i32,
    pub duration_ms: u64,
    /// Invariant: `success == (exit_code == 0)`.
    pub success: bool,
    /// Set only when a distinguishable diagnostic exists (validation
    /// failure, timeout, spawn failure). A plain nonzero exit leaves it
    /// unset.
    pub error: Option<String>,
}

impl CommandResult {
    pub fn from_exit(
        spec: &CommandSpec,
        output: String,
        exit_code: i32,
        duration_ms: u64,
    ) -> Self {
        Self {
            command: spec.command(),
            args: spec.args(),
            output,
            exit_code,
            duration_ms,
            success: exit_code == 0,
            error: None,
        }
    }

    pub fn failure(
        spec: &CommandSpec,
        output: String,
        exit_code: i32,
        duration_ms: u64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            command: spec.command(),
            args: spec.args(),
            output,
            exit_code,
            duration_ms,
            success: false,
            error: Some(error.into()),
        }
    }
}
