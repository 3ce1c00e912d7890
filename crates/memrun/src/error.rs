//! Error types for memrun.

use std::process::ExitStatus;

/// Errors that can occur while resolving, loading or running a binary.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The configuration names no binary source.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Fetching the binary over HTTP failed.
    #[error("failed to retrieve binary from {url}: {source}")]
    Retrieval {
        /// The URL that was requested.
        url: String,
        /// The transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The bytes could not be turned into a runnable image.
    #[error("failed to load binary image: {0}")]
    Load(String),

    /// The child process could not be launched or exited unsuccessfully.
    #[error("execution failed: {message}")]
    Execution {
        /// Human readable description of the failure.
        message: String,
        /// Exit status, if the process got as far as running.
        status: Option<ExitStatus>,
        /// Whatever the process wrote to stdout before failing.
        stdout: Vec<u8>,
        /// Whatever the process wrote to stderr before failing.
        stderr: Vec<u8>,
    },

    /// The session was closed and its image released.
    #[error("session already closed")]
    AlreadyClosed,
}

impl Error {
    /// Build an execution error for an I/O failure while starting or
    /// waiting on the child process.
    pub(crate) fn process(action: &str, err: &std::io::Error) -> Self {
        Self::Execution {
            message: format!("failed to {action} process: {err}"),
            status: None,
            stdout: Vec::new(),
            stderr: Vec::new(),
        }
    }

    /// Build an execution error for a process that exited unsuccessfully.
    pub(crate) fn exit(status: ExitStatus, stdout: Vec<u8>, stderr: Vec<u8>) -> Self {
        Self::Execution {
            message: format!("process exited with {status}"),
            status: Some(status),
            stdout,
            stderr,
        }
    }

    /// Stdout collected before the failure, if any.
    ///
    /// Only [`Error::Execution`] carries output; every other variant
    /// returns an empty slice.
    #[must_use]
    pub fn stdout(&self) -> &[u8] {
        match self {
            Self::Execution { stdout, .. } => stdout,
            _ => &[],
        }
    }

    /// Returns `true` if this error came from a closed session.
    #[must_use]
    pub fn is_already_closed(&self) -> bool {
        matches!(self, Self::AlreadyClosed)
    }
}
