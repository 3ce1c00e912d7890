//! Execution sessions.
//!
//! A [`Session`] binds one loaded executable image to the ability to launch
//! it any number of times. Sessions move through three states:
//!
//! - **Uninitialized**: the configuration is being resolved and loaded.
//!   Failures here are returned from the constructor and no session exists.
//! - **Ready**: runs may be started, concurrently if desired.
//! - **Closed**: the image has been released. Every later run fails with
//!   [`Error::AlreadyClosed`].
//!
//! # Example
//!
//! ```rust,no_run
//! use memrun::{Config, Session};
//!
//! # fn main() -> Result<(), memrun::Error> {
//! let binary = std::fs::read("/usr/bin/env").expect("binary exists");
//! let session = Session::new(
//!     Config::builder()
//!         .binary(binary)
//!         .on_start(|| eprintln!("starting"))
//!         .build(),
//! )?;
//!
//! let output = session.run(["--version"])?;
//! println!("{}", String::from_utf8_lossy(&output.stdout));
//!
//! session.close()?;
//! # Ok(())
//! # }
//! ```

mod run;

use std::ffi::OsString;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::error::Error;
use crate::hooks::Hooks;
use crate::image::{ExecutableImage, ImageLoader, default_loader};
use crate::source;

pub use run::RunOutput;

/// Statistics about a session's activity.
#[derive(Debug, Clone)]
pub struct SessionStats {
    /// When the session was created.
    pub created_at: Instant,

    /// When the last run finished (None if never run).
    pub last_activity: Option<Instant>,

    /// Number of runs that launched or tried to launch a process.
    pub run_count: u64,

    /// Number of those runs that failed.
    pub failed_runs: u64,

    /// Total wall-clock time spent in runs.
    pub total_run_time: Duration,
}

impl Default for SessionStats {
    fn default() -> Self {
        Self {
            created_at: Instant::now(),
            last_activity: None,
            run_count: 0,
            failed_runs: 0,
            total_run_time: Duration::ZERO,
        }
    }
}

impl SessionStats {
    /// Reset all counters, preserving the original creation time.
    pub fn reset(&mut self) {
        let created_at = self.created_at;
        *self = Self::default();
        self.created_at = created_at;
    }

    fn record(&mut self, elapsed: Duration, succeeded: bool) {
        self.run_count += 1;
        if !succeeded {
            self.failed_runs += 1;
        }
        self.total_run_time += elapsed;
        self.last_activity = Some(Instant::now());
    }
}

/// A loaded binary that can be run repeatedly.
///
/// Cloning a session is cheap and every clone shares the same image:
/// closing one clone closes them all. The image is also released when the
/// last clone is dropped and no background run still uses it.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("closed", &self.is_closed())
            .field("hooks", &self.inner.hooks)
            .field("arg0", &self.inner.arg0)
            .finish_non_exhaustive()
    }
}

struct Inner {
    /// `None` once the session is closed.
    image: RwLock<Option<Box<dyn ExecutableImage>>>,
    hooks: Hooks,
    arg0: Option<String>,
    stats: Mutex<SessionStats>,
}

impl Session {
    /// Resolve the configured binary and load it with the platform's
    /// default loader.
    ///
    /// Downloads block the calling thread. Inside an async runtime this
    /// still works but stalls the worker; prefer [`Session::new_async`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if no binary source is set,
    /// [`Error::Retrieval`] if the download fails and [`Error::Load`] if the
    /// bytes are not an executable for this host.
    pub fn new(config: Config) -> Result<Self, Error> {
        Self::with_loader(config, default_loader().as_ref())
    }

    /// Like [`Session::new`], but downloads without blocking the runtime.
    ///
    /// # Errors
    ///
    /// See [`Session::new`].
    pub async fn new_async(config: Config) -> Result<Self, Error> {
        let bytes = source::resolve_async(&config).await?;
        Self::load(config, &bytes, default_loader().as_ref())
    }

    /// Resolve the configured binary and load it with a custom loader.
    ///
    /// # Errors
    ///
    /// See [`Session::new`].
    pub fn with_loader(config: Config, loader: &dyn ImageLoader) -> Result<Self, Error> {
        let bytes = source::resolve(&config)?;
        Self::load(config, &bytes, loader)
    }

    fn load(config: Config, bytes: &[u8], loader: &dyn ImageLoader) -> Result<Self, Error> {
        let image = loader.load(bytes)?;
        tracing::debug!(size = bytes.len(), hooks = ?config.hooks, "session ready");

        Ok(Self {
            inner: Arc::new(Inner {
                image: RwLock::new(Some(image)),
                arg0: config.arg0().map(str::to_string),
                hooks: config.hooks,
                stats: Mutex::new(SessionStats::default()),
            }),
        })
    }

    /// Release the loaded image.
    ///
    /// Waits for runs that are in the middle of launching their process;
    /// processes that are already running are not affected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyClosed`] if the session was already closed.
    pub fn close(&self) -> Result<(), Error> {
        let mut guard = self
            .inner
            .image
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut image = guard.take().ok_or(Error::AlreadyClosed)?;
        image.release()?;
        tracing::debug!("session closed");
        Ok(())
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// A snapshot of the session's statistics.
    #[must_use]
    pub fn stats(&self) -> SessionStats {
        self.inner
            .stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Inner {
    fn is_closed(&self) -> bool {
        self.image
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.is_closed() {
            Err(Error::AlreadyClosed)
        } else {
            Ok(())
        }
    }

    /// Build a command for `args` with the session's stdio and `argv[0]`
    /// settings, then hand it to `spawn` while the image is pinned.
    ///
    /// The read lock is held only until `spawn` returns, so a concurrent
    /// `close` waits for the launch but not for the process to exit.
    fn with_command<T>(
        &self,
        args: &[OsString],
        spawn: impl FnOnce(Command) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let guard = self.image.read().unwrap_or_else(PoisonError::into_inner);
        let image = guard.as_ref().ok_or(Error::AlreadyClosed)?;
        let mut command = image.command(args)?;

        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            if let Some(arg0) = &self.arg0 {
                command.arg0(arg0);
            }
        }

        spawn(command)
    }

    fn record<T>(&self, elapsed: Duration, result: &Result<T, Error>) {
        // Runs rejected before launching are not counted.
        if matches!(result, Err(Error::AlreadyClosed)) {
            return;
        }
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(elapsed, result.is_ok());
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let slot = self.image.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(mut image) = slot.take()
            && let Err(error) = image.release()
        {
            tracing::warn!(%error, "failed to release image on drop");
        }
    }
}
