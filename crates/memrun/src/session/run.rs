//! Run operations.
//!
//! Every flavor goes through the same steps: check the session is open,
//! call `on_start`, launch `on_background`, spawn the child and collect its
//! output, deliver the result, call `on_stop`. They differ only in where
//! the work happens and where errors go:
//!
//! | Flavor                        | Runs on          | Error goes to        | `on_stop` after error |
//! |-------------------------------|------------------|----------------------|-----------------------|
//! | [`Session::run`]              | caller's thread  | return value         | no                    |
//! | [`Session::run_with_handler`] | caller's thread  | handler, then return | yes                   |
//! | [`Session::run_async`]        | detached task    | handler              | yes                   |
//! | [`Session::spawn`]            | detached task    | dropped (logged)     | yes                   |
//! | [`Session::execute`]          | caller's future  | return value         | no                    |

use std::ffi::{OsStr, OsString};
use std::process::{ExitStatus, Output};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{Inner, Session};
use crate::error::Error;
use crate::hooks::spawn_detached;

/// Advisory error callback for [`Session::run_with_handler`].
type ErrorHandler<'a> = Box<dyn FnOnce(&Error) + 'a>;

/// Result callback for [`Session::run_async`].
type ResultHandler = Box<dyn FnOnce(Result<RunOutput, Error>) + Send>;

/// Output of a successful run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Everything the process wrote to stdout.
    pub stdout: Vec<u8>,
    /// Everything the process wrote to stderr.
    pub stderr: Vec<u8>,
    /// The exit status (always successful).
    pub status: ExitStatus,
    /// Wall-clock time from launch to exit.
    pub duration: Duration,
}

impl RunOutput {
    /// Stdout decoded as UTF-8, with invalid sequences replaced.
    #[must_use]
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

fn collect_args<I, S>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    args.into_iter().map(|a| a.as_ref().to_os_string()).collect()
}

/// Turn a finished process into the run's result.
fn finish(output: Output, duration: Duration) -> Result<RunOutput, Error> {
    if output.status.success() {
        Ok(RunOutput {
            stdout: output.stdout,
            stderr: output.stderr,
            status: output.status,
            duration,
        })
    } else {
        Err(Error::exit(output.status, output.stdout, output.stderr))
    }
}

impl Session {
    /// Run the binary with `args` and wait for it to exit.
    ///
    /// On failure the error is returned immediately and `on_stop` is not
    /// called. A non-zero exit status is an [`Error::Execution`] carrying
    /// whatever the process printed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyClosed`] after [`close`](Session::close) and
    /// [`Error::Execution`] if the process cannot be launched or fails.
    pub fn run<I, S>(&self, args: I) -> Result<RunOutput, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.inner.run_blocking(&collect_args(args), None)
    }

    /// Run the binary with `args`, reporting failures to `on_error`.
    ///
    /// The handler is advisory: it sees the error, `on_stop` is then
    /// called, and the original error is still returned.
    ///
    /// # Errors
    ///
    /// Same as [`Session::run`].
    pub fn run_with_handler<I, S, F>(&self, args: I, on_error: F) -> Result<RunOutput, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
        F: FnOnce(&Error),
    {
        self.inner
            .run_blocking(&collect_args(args), Some(Box::new(on_error)))
    }

    /// Run the binary with `args` in the background.
    ///
    /// Returns immediately. The outcome, including [`Error::AlreadyClosed`],
    /// is delivered to `handler` from another thread, after which `on_stop`
    /// is called. If the background task cannot be started at all, the
    /// failure is logged and `handler` is never called.
    pub fn run_async<F, I, S>(&self, args: I, handler: F)
    where
        F: FnOnce(Result<RunOutput, Error>) + Send + 'static,
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.inner.run_detached(collect_args(args), Some(Box::new(handler)));
    }

    /// Run the binary with `args` in the background and ignore the result.
    ///
    /// Errors are logged at debug level and otherwise dropped.
    pub fn spawn<I, S>(&self, args: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.inner.run_detached(collect_args(args), None);
    }

    /// Run the binary with `args` without blocking the async runtime.
    ///
    /// Hooks behave as in [`Session::run`]. `on_start` and `on_stop` are
    /// still called synchronously from the polling task.
    ///
    /// # Cancellation
    ///
    /// Dropping the future before it completes kills the child process.
    /// `on_stop` is not called and the run is not counted in
    /// [`Session::stats`].
    ///
    /// # Errors
    ///
    /// Same as [`Session::run`].
    pub async fn execute<I, S>(&self, args: I) -> Result<RunOutput, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args = collect_args(args);
        let inner = &self.inner;
        inner.ensure_open()?;

        inner.hooks.start();
        inner.hooks.launch_background();

        let start = Instant::now();
        let result = match inner.spawn_tokio_child(&args) {
            Ok(child) => match child.wait_with_output().await {
                Ok(output) => finish(output, start.elapsed()),
                Err(e) => Err(Error::process("wait for", &e)),
            },
            Err(error) => Err(error),
        };
        inner.record(start.elapsed(), &result);

        let output = result?;
        inner.hooks.stop();
        Ok(output)
    }
}

impl Inner {
    /// Spawn the child and block until it exits.
    fn launch(&self, args: &[OsString]) -> Result<RunOutput, Error> {
        let start = Instant::now();
        let result = self
            .with_command(args, |mut command| {
                command.spawn().map_err(|e| Error::process("launch", &e))
            })
            .and_then(|child| {
                tracing::debug!(pid = child.id(), args = ?args, "process launched");
                child
                    .wait_with_output()
                    .map_err(|e| Error::process("wait for", &e))
            })
            .and_then(|output| finish(output, start.elapsed()));
        self.record(start.elapsed(), &result);
        result
    }

    fn spawn_tokio_child(&self, args: &[OsString]) -> Result<tokio::process::Child, Error> {
        self.with_command(args, |command| {
            let child = tokio::process::Command::from(command)
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| Error::process("launch", &e))?;
            tracing::debug!(pid = ?child.id(), args = ?args, "process launched");
            Ok(child)
        })
    }

    fn run_blocking(
        &self,
        args: &[OsString],
        on_error: Option<ErrorHandler<'_>>,
    ) -> Result<RunOutput, Error> {
        if let Err(error) = self.ensure_open() {
            if let Some(handler) = on_error {
                handler(&error);
            }
            return Err(error);
        }

        self.hooks.start();
        self.hooks.launch_background();

        match self.launch(args) {
            Ok(output) => {
                self.hooks.stop();
                Ok(output)
            }
            Err(error) => match on_error {
                Some(handler) => {
                    handler(&error);
                    self.hooks.stop();
                    Err(error)
                }
                // No handler: straight back to the caller, stop hook skipped.
                None => Err(error),
            },
        }
    }

    fn run_detached(self: &Arc<Self>, args: Vec<OsString>, handler: Option<ResultHandler>) {
        if !self.is_closed() {
            self.hooks.launch_background();
        }

        let inner = Arc::clone(self);
        spawn_detached("memrun-run", move || {
            if let Err(error) = inner.ensure_open() {
                deliver(handler, Err(error));
                return;
            }

            inner.hooks.start();
            let result = inner.launch(&args);
            deliver(handler, result);
            inner.hooks.stop();
        });
    }
}

/// Hand a detached run's result to its handler, or log and drop it.
fn deliver(handler: Option<ResultHandler>, result: Result<RunOutput, Error>) {
    match (handler, result) {
        (Some(handler), result) => handler(result),
        (None, Err(error)) => {
            tracing::debug!(%error, "detached run failed with no handler attached");
        }
        (None, Ok(_)) => {}
    }
}
