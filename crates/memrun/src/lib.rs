//! # memrun
//!
//! Run an executable image straight from memory, as if it were an ordinary
//! child process, without writing it to persistent storage.
//!
//! ## Safety
//!
//! This crate uses `#![deny(unsafe_code)]`. The only exceptions are the two
//! `libc` calls that create and seal the anonymous memory file on Linux.
//!
//! memrun provides:
//!
//! - **Binary sources** - embed the bytes, or download them once over HTTP
//! - **Lifecycle hooks** - optional `on_start`, `on_stop` and `on_background` callbacks
//! - **Blocking runs** - with or without an advisory error handler
//! - **Background runs** - fire-and-forget with a result callback
//! - **Async runs** - `await` the child with tokio
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use memrun::{Config, Session};
//!
//! fn main() -> Result<(), memrun::Error> {
//!     let session = Session::new(Config::from_url("https://example.com/tool"))?;
//!
//!     let output = session.run(["--version"])?;
//!     println!("Output: {}", output.stdout_lossy());
//!
//!     session.close()
//! }
//! ```

#![deny(unsafe_code)]

mod config;
mod error;
mod hooks;
pub mod image;
pub mod session;
pub mod source;

pub use config::{Config, ConfigBuilder};
pub use error::Error;
pub use hooks::Hook;
pub use image::{ExecutableImage, ImageFormat, ImageLoader, default_loader};
pub use session::{RunOutput, Session, SessionStats};
pub use source::{resolve, resolve_async};
