//! Escalating process termination by name.
//!
//! The protocol is deliberately sequential per name: graceful TERM, a fixed
//! grace period, a re-query, then KILL only for survivors. Lookups and
//! signals go through `pkill`/`pgrep` in argv form; the one shell-based path
//! validates the name first.

use std::sync::Arc;
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;

use crate::command::{CommandExecutor, CommandResult, CommandSpec, ExecuteOpts};
use crate::config::ExecConfig;
use crate::error::ExecError;

lazy_static! {
    /// Permitted process-name characters. Anything else is rejected before
    /// any shell invocation is constructed; the single-name path
    /// interpolates into a shell line, and this is the injection gate.
    static ref PROCESS_NAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_.-]+$").unwrap();
}

/// Outcome of the escalation protocol for one process name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KillStatus {
    Killed,
    NotFound,
    Error(String),
}

/// Kills processes by name with signal escalation.
#[derive(Clone)]
pub struct ProcessTerminator {
    cfg: Arc<ExecConfig>,
    executor: CommandExecutor,
}

impl ProcessTerminator {
    pub fn new(cfg: Arc<ExecConfig>) -> Self {
        let executor = CommandExecutor::new(cfg.clone());
        Self { cfg, executor }
    }

    /// Run the escalation protocol for each name, strictly sequentially.
    pub async fn kill_by_name(&self, names: &[String]) -> Vec<(String, KillStatus)> {
        let mut results = Vec::with_capacity(names.len());
        for name in names {
            let status = self.kill_one(name).await;
            tracing::info!(process = %name, status = ?status, "kill protocol finished");
            results.push((name.clone(), status));
        }
        results
    }

    async fn kill_one(&self, name: &str) -> KillStatus {
        // Step 1: graceful TERM to every exact match.
        let term = self.signal(name, None).await;
        match term {
            Ok(1) => return KillStatus::NotFound,
            Ok(0) => {}
            Ok(_) | Err(_) => return KillStatus::Error("kill_term_failed".into()),
        }

        // Step 2: grace period for orderly shutdown.
        tokio::time::sleep(Duration::from_millis(self.cfg.kill_grace_ms)).await;

        // Step 3: anything left?
        match survivors_after_grace(self.query(name).await) {
            Ok(true) => {}
            Ok(false) => return KillStatus::Killed,
            Err(status) => return status,
        }

        // Step 4: forceful KILL for survivors.
        match self.signal(name, Some("-9")).await {
            Ok(0) => KillStatus::Killed,
            _ => KillStatus::Error("forceful_kill_failed".into()),
        }
    }

    /// Single-name convenience that reports as a `CommandResult`.
    ///
    /// The name is validated against the restricted character set before any
    /// shell line is built; invalid names never reach a spawn.
    pub async fn kill_process(&self, name: &str) -> Result<CommandResult, ExecError> {
        if !PROCESS_NAME_RE.is_match(name) {
            let spec = CommandSpec::shell(String::new());
            return Ok(CommandResult::failure(
                &spec,
                String::new(),
                -1,
                0,
                "Invalid process name",
            ));
        }

        let spec = CommandSpec::shell(format!("pkill -9 -x {name}"));
        self.executor.run(&spec, &ExecuteOpts::default()).await
    }

    async fn signal(&self, name: &str, sig: Option<&str>) -> Result<i32, ExecError> {
        let mut argv = vec!["pkill".to_string()];
        if let Some(sig) = sig {
            argv.push(sig.to_string());
        }
        argv.push("-x".to_string());
        argv.push(name.to_string());
        let (_, code) = self.executor.run_raw(&CommandSpec::Argv(argv)).await?;
        Ok(code)
    }

    async fn query(&self, name: &str) -> Result<i32, ExecError> {
        let spec = CommandSpec::argv(["pgrep", "-x", name]);
        let (_, code) = self.executor.run_raw(&spec).await?;
        Ok(code)
    }
}

/// Interpret the post-grace `pgrep` outcome. Only exit 1 positively means
/// the process is gone; a broken re-query must not be mistaken for a kill.
fn survivors_after_grace(query: Result<i32, ExecError>) -> Result<bool, KillStatus> {
    match query {
        Ok(0) => Ok(true),
        Ok(1) => Ok(false),
        Ok(_) | Err(_) => Err(KillStatus::Error("requery_failed".into())),
    }
}
