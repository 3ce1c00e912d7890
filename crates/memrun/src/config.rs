//! Session configuration.
//!
//! A [`Config`] names where the binary comes from (embedded bytes or a URL)
//! and which lifecycle hooks to call around each run.
//!
//! # Example
//!
//! ```rust
//! use memrun::Config;
//!
//! let config = Config::builder()
//!     .source_url("https://example.com/tool")
//!     .on_start(|| println!("starting"))
//!     .on_stop(|| println!("stopped"))
//!     .build();
//!
//! assert!(config.binary().is_none());
//! assert_eq!(config.source_url(), Some("https://example.com/tool"));
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::hooks::{Hook, Hooks};

/// Configuration for a [`Session`](crate::Session).
///
/// At least one of the binary bytes or the source URL must be set. When
/// both are present the bytes win and the URL is never contacted.
#[derive(Clone, Default)]
pub struct Config {
    binary: Option<Vec<u8>>,
    source_url: Option<String>,
    fetch_timeout: Option<Duration>,
    arg0: Option<String>,
    pub(crate) hooks: Hooks,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("binary_len", &self.binary.as_ref().map(Vec::len))
            .field("source_url", &self.source_url)
            .field("fetch_timeout", &self.fetch_timeout)
            .field("arg0", &self.arg0)
            .field("hooks", &self.hooks)
            .finish()
    }
}

impl Config {
    /// Create a new builder for `Config`.
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Shorthand for a configuration that runs the given bytes.
    #[must_use]
    pub fn from_bytes(binary: impl Into<Vec<u8>>) -> Self {
        Self::builder().binary(binary).build()
    }

    /// Shorthand for a configuration that downloads the binary from `url`.
    #[must_use]
    pub fn from_url(url: impl Into<String>) -> Self {
        Self::builder().source_url(url).build()
    }

    /// The embedded binary, if any.
    #[must_use]
    pub fn binary(&self) -> Option<&[u8]> {
        self.binary.as_deref()
    }

    /// The URL the binary is downloaded from, if any.
    #[must_use]
    pub fn source_url(&self) -> Option<&str> {
        self.source_url.as_deref()
    }

    /// Timeout for the download, if any.
    #[must_use]
    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout
    }

    /// The program name presented to the child as `argv[0]`.
    #[must_use]
    pub fn arg0(&self) -> Option<&str> {
        self.arg0.as_deref()
    }
}

/// Builder for [`Config`].
#[derive(Clone, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl std::fmt::Debug for ConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ConfigBuilder {
    /// Run these bytes.
    #[must_use]
    pub fn binary(mut self, binary: impl Into<Vec<u8>>) -> Self {
        self.config.binary = Some(binary.into());
        self
    }

    /// Download the binary from this URL when the session is created.
    #[must_use]
    pub fn source_url(mut self, url: impl Into<String>) -> Self {
        self.config.source_url = Some(url.into());
        self
    }

    /// Limit how long the download may take.
    #[must_use]
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetch_timeout = Some(timeout);
        self
    }

    /// Set the program name the child sees as `argv[0]`.
    ///
    /// By default `argv[0]` is the path of the in-memory image. Multi-call
    /// binaries such as busybox dispatch on this name. Ignored on platforms
    /// without `argv[0]` control.
    #[must_use]
    pub fn arg0(mut self, name: impl Into<String>) -> Self {
        self.config.arg0 = Some(name.into());
        self
    }

    /// Called before each child process is launched.
    #[must_use]
    pub fn on_start(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.config.hooks.on_start = Some(Arc::new(hook));
        self
    }

    /// Called after each run has finished.
    #[must_use]
    pub fn on_stop(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.config.hooks.on_stop = Some(Arc::new(hook));
        self
    }

    /// Launched in the background on every run, never awaited.
    #[must_use]
    pub fn on_background(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.config.hooks.on_background = Some(Arc::new(hook));
        self
    }

    /// Use an already shared hook for `on_start`.
    #[must_use]
    pub fn on_start_hook(mut self, hook: Hook) -> Self {
        self.config.hooks.on_start = Some(hook);
        self
    }

    /// Use an already shared hook for `on_stop`.
    #[must_use]
    pub fn on_stop_hook(mut self, hook: Hook) -> Self {
        self.config.hooks.on_stop = Some(hook);
        self
    }

    /// Use an already shared hook for `on_background`.
    #[must_use]
    pub fn on_background_hook(mut self, hook: Hook) -> Self {
        self.config.hooks.on_background = Some(hook);
        self
    }

    /// Build the `Config`.
    #[must_use]
    pub fn build(self) -> Config {
        self.config
    }
}
