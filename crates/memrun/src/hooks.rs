//! Lifecycle hooks and detached task launching.
//!
//! Hooks are optional zero-argument callbacks invoked at fixed points of a
//! run:
//!
//! - `on_start` runs synchronously before the child process is launched.
//! - `on_stop` runs synchronously after the run has finished.
//! - `on_background` is launched as a detached task on every run and never
//!   joined. Its outcome, panics included, does not reach the run's result.

use std::sync::Arc;

/// A lifecycle hook.
pub type Hook = Arc<dyn Fn() + Send + Sync>;

/// The set of optional lifecycle hooks for a session.
#[derive(Clone, Default)]
pub(crate) struct Hooks {
    pub(crate) on_start: Option<Hook>,
    pub(crate) on_stop: Option<Hook>,
    pub(crate) on_background: Option<Hook>,
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("has_on_start", &self.on_start.is_some())
            .field("has_on_stop", &self.on_stop.is_some())
            .field("has_on_background", &self.on_background.is_some())
            .finish()
    }
}

impl Hooks {
    pub(crate) fn start(&self) {
        if let Some(hook) = &self.on_start {
            hook();
        }
    }

    pub(crate) fn stop(&self) {
        if let Some(hook) = &self.on_stop {
            hook();
        }
    }

    /// Launch the background hook, if any, without waiting for it.
    pub(crate) fn launch_background(&self) {
        if let Some(hook) = &self.on_background {
            let hook = Arc::clone(hook);
            spawn_detached("memrun-background", move || hook());
        }
    }
}

/// Run `task` without keeping a handle to it.
///
/// Inside a tokio runtime the task goes to the blocking pool, otherwise it
/// gets its own OS thread. A spawn failure is logged and otherwise ignored;
/// the caller is never affected.
pub(crate) fn spawn_detached<F>(name: &str, task: F)
where
    F: FnOnce() + Send + 'static,
{
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        drop(handle.spawn_blocking(task));
        return;
    }

    if let Err(error) = std::thread::Builder::new()
        .name(name.to_string())
        .spawn(task)
    {
        tracing::error!(task = name, %error, "failed to spawn detached task");
    }
}
