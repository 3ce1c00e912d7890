//! Temporary-file images, the fallback where anonymous memory cannot be
//! executed.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempPath;

use super::{ExecutableImage, ImageFormat, ImageLoader};
use crate::error::Error;

/// Loads images into private temporary files that are deleted on release.
#[derive(Debug, Clone, Default)]
pub struct TempFileLoader {
    dir: Option<PathBuf>,
}

impl TempFileLoader {
    /// Create a loader that uses the system temporary directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a loader that places its files in `dir`.
    ///
    /// Useful when the system temporary directory is mounted `noexec`.
    #[must_use]
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }
}

impl ImageLoader for TempFileLoader {
    fn load(&self, bytes: &[u8]) -> Result<Box<dyn ExecutableImage>, Error> {
        let format = ImageFormat::check_host(bytes)?;

        let mut builder = tempfile::Builder::new();
        builder.prefix("memrun-");
        if cfg!(windows) {
            builder.suffix(".exe");
        }

        let mut file = match &self.dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| Error::Load(format!("failed to create temporary image file: {e}")))?;

        file.write_all(bytes)
            .and_then(|()| file.flush())
            .map_err(|e| Error::Load(format!("failed to write temporary image file: {e}")))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o700))
                .map_err(|e| Error::Load(format!("failed to mark image executable: {e}")))?;
        }

        // Closing the write handle avoids ETXTBSY when the image is executed.
        let path = file.into_temp_path();
        tracing::debug!(
            %format,
            size = bytes.len(),
            path = %path.display(),
            "image written to temporary file"
        );

        Ok(Box::new(TempFileImage { path: Some(path) }))
    }
}

/// An image living in a temporary file.
#[derive(Debug)]
struct TempFileImage {
    /// `None` once released. Dropping the path deletes the file.
    path: Option<TempPath>,
}

impl ExecutableImage for TempFileImage {
    fn command(&self, args: &[OsString]) -> Result<Command, Error> {
        let path: &Path = self.path.as_ref().ok_or(Error::AlreadyClosed)?;
        let mut command = Command::new(path);
        command.args(args);
        Ok(command)
    }

    fn release(&mut self) -> Result<(), Error> {
        let path = self.path.take().ok_or(Error::AlreadyClosed)?;
        let shown = path.display().to_string();
        if let Err(error) = path.close() {
            tracing::warn!(path = %shown, %error, "failed to remove temporary image file");
        } else {
            tracing::debug!(path = %shown, "temporary image released");
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn garbage_is_rejected_before_touching_disk() {
        let dir = tempfile::tempdir().unwrap();
        let loader = TempFileLoader::in_dir(dir.path());

        assert!(matches!(loader.load(b"garbage bytes here"), Err(Error::Load(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn runs_and_cleans_up() {
        use std::os::unix::process::CommandExt;

        let dir = tempfile::tempdir().unwrap();
        let bytes = std::fs::read("/bin/sh").unwrap();
        let mut image = TempFileLoader::in_dir(dir.path()).load(&bytes).unwrap();

        let output = image
            .command(&[OsString::from("-c"), OsString::from("printf tmp")])
            .unwrap()
            .arg0("sh")
            .output()
            .unwrap();
        assert_eq!(output.stdout, b"tmp");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

        image.release().unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert!(image.release().unwrap_err().is_already_closed());
        assert!(image.command(&[]).unwrap_err().is_already_closed());
    }
}
