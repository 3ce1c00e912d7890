//! Anonymous-memory images backed by `memfd_create(2)`.

use std::ffi::{CStr, OsString};
use std::fs::File;
use std::io::{self, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::path::PathBuf;
use std::process::Command;

use super::{ExecutableImage, ImageFormat, ImageLoader};
use crate::error::Error;

/// Name shown for the descriptor in `/proc/<pid>/fd`.
const MEMFD_NAME: &CStr = c"memrun";

/// Loads images into sealed anonymous memory files.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemfdLoader;

impl MemfdLoader {
    /// Create a new memfd loader.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ImageLoader for MemfdLoader {
    fn load(&self, bytes: &[u8]) -> Result<Box<dyn ExecutableImage>, Error> {
        let format = ImageFormat::check_host(bytes)?;

        let fd = memfd_create(MEMFD_NAME, libc::MFD_CLOEXEC | libc::MFD_ALLOW_SEALING)
            .map_err(|e| Error::Load(format!("memfd_create failed: {e}")))?;
        let mut file = File::from(fd);
        file.write_all(bytes)
            .map_err(|e| Error::Load(format!("failed to write image to memfd: {e}")))?;

        if let Err(error) = seal(&file) {
            tracing::warn!(%error, "could not seal memfd, image stays writable");
        }

        let path = PathBuf::from(format!("/proc/self/fd/{}", file.as_raw_fd()));
        tracing::debug!(
            %format,
            size = bytes.len(),
            path = %path.display(),
            "image loaded into memfd"
        );

        Ok(Box::new(MemfdImage {
            file: Some(file),
            path,
        }))
    }
}

/// An image living in a memfd.
#[derive(Debug)]
struct MemfdImage {
    /// `None` once released.
    file: Option<File>,
    path: PathBuf,
}

impl ExecutableImage for MemfdImage {
    fn command(&self, args: &[OsString]) -> Result<Command, Error> {
        if self.file.is_none() {
            return Err(Error::AlreadyClosed);
        }
        let mut command = Command::new(&self.path);
        command.args(args);
        Ok(command)
    }

    fn release(&mut self) -> Result<(), Error> {
        match self.file.take() {
            Some(file) => {
                drop(file);
                tracing::debug!(path = %self.path.display(), "memfd image released");
                Ok(())
            }
            None => Err(Error::AlreadyClosed),
        }
    }
}

#[allow(unsafe_code)]
fn memfd_create(name: &CStr, flags: libc::c_uint) -> io::Result<OwnedFd> {
    // SAFETY: `name` is NUL-terminated and outlives the call.
    let fd = unsafe { libc::memfd_create(name.as_ptr(), flags) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: `fd` was just returned by the kernel and is owned by nobody else.
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// Forbid any further change to the image contents or size.
#[allow(unsafe_code)]
fn seal(file: &File) -> io::Result<()> {
    let seals = libc::F_SEAL_SHRINK | libc::F_SEAL_GROW | libc::F_SEAL_WRITE | libc::F_SEAL_SEAL;
    // SAFETY: the descriptor is valid for the lifetime of `file`.
    let rc = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_ADD_SEALS, seals) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
