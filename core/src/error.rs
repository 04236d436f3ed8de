use thiserror::Error;

/// Errors that cross the crate boundary.
///
/// Command failures, timeouts and callable faults never show up here: they
/// are carried as data inside `CommandResult` / `TaskResult`. What remains is
/// the genuinely unrecoverable surface: configuration problems and the
/// inability to allocate a process channel at all.
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("config error: {0}")]
    Config(String),

    #[error("process channel unavailable: {0}")]
    Channel(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
