//! Executable images held outside the filesystem.
//!
//! The memory-execution primitive is split into two traits:
//!
//! - [`ImageLoader`] turns raw bytes into an [`ExecutableImage`].
//! - [`ExecutableImage`] builds [`std::process::Command`]s that run the
//!   image, until it is released.
//!
//! Two loaders ship with the crate:
//!
//! - [`MemfdLoader`] (Linux): the image lives in an anonymous, sealed
//!   `memfd` and is executed through `/proc/self/fd/<n>`. Nothing touches
//!   persistent storage.
//! - [`TempFileLoader`] (all platforms): the image is written to a private
//!   temporary file that is deleted on release. This is the fallback where
//!   anonymous executable memory is not available.
//!
//! [`default_loader`] picks the best loader for the host.

mod format;
#[cfg(target_os = "linux")]
mod memfd;
mod temp_file;

use std::ffi::OsString;
use std::process::Command;

use crate::error::Error;

pub use format::ImageFormat;
#[cfg(target_os = "linux")]
pub use memfd::MemfdLoader;
pub use temp_file::TempFileLoader;

/// Creates runnable images from raw executable bytes.
pub trait ImageLoader: Send + Sync + std::fmt::Debug {
    /// Materialize `bytes` as a runnable image.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Load`] if the bytes are not a valid executable for
    /// the host or the image cannot be created.
    fn load(&self, bytes: &[u8]) -> Result<Box<dyn ExecutableImage>, Error>;
}

/// A loaded executable image that can be launched repeatedly.
///
/// Implementations must allow concurrent calls to [`command`](Self::command)
/// from multiple threads.
pub trait ExecutableImage: Send + Sync + std::fmt::Debug {
    /// Build a command that runs the image with `args`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyClosed`] if the image has been released.
    fn command(&self, args: &[OsString]) -> Result<Command, Error>;

    /// Release the resources backing the image.
    ///
    /// Commands built before the release must not be spawned afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyClosed`] if the image was already released.
    fn release(&mut self) -> Result<(), Error>;
}

/// The preferred loader for the host platform.
#[must_use]
pub fn default_loader() -> Box<dyn ImageLoader> {
    #[cfg(target_os = "linux")]
    {
        Box::new(MemfdLoader::new())
    }

    #[cfg(not(target_os = "linux"))]
    {
        Box::new(TempFileLoader::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traits_are_object_safe() {
        fn _assert_loader(_: &dyn ImageLoader) {}
        fn _assert_image(_: Box<dyn ExecutableImage>) {}
    }

    #[test]
    fn default_loader_rejects_garbage() {
        let err = default_loader().load(b"not an executable").unwrap_err();
        assert!(matches!(err, Error::Load(_)));
    }
}
