use serde::{Deserialize, Serialize};

/// Engine configuration. Every field has a serde default so a partial TOML
/// file (or no file at all) yields a working config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecConfig {
    /// Shell used to interpret string command lines. The argv form of a
    /// command bypasses it entirely.
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Hard deadline for a single command, measured from spawn start.
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,

    /// Per-task upper bound inside a batch.
    #[serde(default = "default_task_timeout_ms")]
    pub task_timeout_ms: u64,

    /// Timeout for the one-task `run_single` path.
    #[serde(default = "default_single_task_timeout_ms")]
    pub single_task_timeout_ms: u64,

    /// Wait between the graceful and the forceful termination signal.
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,

    /// Concurrency ceiling for batch execution.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Bytes of command output kept (tail) per execution.
    #[serde(default = "default_capture_bytes")]
    pub capture_bytes: usize,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_shell() -> String {
    "/bin/sh".to_string()
}

fn default_command_timeout_ms() -> u64 {
    30_000
}

fn default_task_timeout_ms() -> u64 {
    300_000
}

fn default_single_task_timeout_ms() -> u64 {
    30_000
}

fn default_kill_grace_ms() -> u64 {
    2_000
}

fn default_max_concurrency() -> usize {
    num_cpus::get().max(1)
}

fn default_capture_bytes() -> usize {
    64 * 1024
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            command_timeout_ms: default_command_timeout_ms(),
            task_timeout_ms: default_task_timeout_ms(),
            single_task_timeout_ms: default_single_task_timeout_ms(),
            kill_grace_ms: default_kill_grace_ms(),
            max_concurrency: default_max_concurrency(),
            capture_bytes: default_capture_bytes(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// EnvFilter string, e.g. "info" or "taskfan_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_logging_level(),
        }
    }
}
