//! Executable format detection.

use goblin::Object;

use crate::error::Error;

/// Executable container formats memrun knows how to recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    /// ELF (Linux and most other Unix systems).
    Elf,
    /// Mach-O, thin or fat (macOS).
    MachO,
    /// Portable Executable (Windows).
    Pe,
}

impl ImageFormat {
    /// The native executable format of the host platform, if it has one.
    #[must_use]
    pub const fn host() -> Option<Self> {
        if cfg!(target_os = "macos") || cfg!(target_os = "ios") {
            Some(Self::MachO)
        } else if cfg!(windows) {
            Some(Self::Pe)
        } else if cfg!(unix) {
            Some(Self::Elf)
        } else {
            None
        }
    }

    /// Detect the format of an executable image.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Load`] if the bytes are empty, cannot be parsed, or
    /// are not an executable image (e.g. an object file or archive).
    pub fn detect(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.is_empty() {
            return Err(Error::Load("image is empty".to_string()));
        }

        let object = Object::parse(bytes)
            .map_err(|e| Error::Load(format!("unrecognized executable image: {e}")))?;

        match object {
            Object::Elf(elf) => match elf.header.e_type {
                goblin::elf::header::ET_EXEC | goblin::elf::header::ET_DYN => Ok(Self::Elf),
                other => Err(Error::Load(format!(
                    "ELF image is not executable (type {})",
                    goblin::elf::header::et_to_str(other)
                ))),
            },
            Object::Mach(_) => Ok(Self::MachO),
            Object::PE(_) => Ok(Self::Pe),
            Object::Archive(_) => Err(Error::Load(
                "image is a static archive, not an executable".to_string(),
            )),
            _ => Err(Error::Load("unrecognized executable image".to_string())),
        }
    }

    /// Detect the format and check that the host can run it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Load`] if detection fails or the image belongs to a
    /// different platform.
    pub fn check_host(bytes: &[u8]) -> Result<Self, Error> {
        let format = Self::detect(bytes)?;
        match Self::host() {
            Some(host) if host != format => Err(Error::Load(format!(
                "{format} image cannot run on this host (expected {host})"
            ))),
            _ => Ok(format),
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageFormat::Elf => write!(f, "ELF"),
            ImageFormat::MachO => write!(f, "Mach-O"),
            ImageFormat::Pe => write!(f, "PE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A minimal 64-bit little-endian ELF header with the given `e_type`.
    fn elf_header(e_type: u16) -> Vec<u8> {
        let mut header = vec![0u8; 64];
        header[..4].copy_from_slice(b"\x7fELF");
        header[4] = 2; // ELFCLASS64
        header[5] = 1; // little endian
        header[6] = 1; // EV_CURRENT
        header[16..18].copy_from_slice(&e_type.to_le_bytes());
        header[18..20].copy_from_slice(&62u16.to_le_bytes()); // EM_X86_64
        header[20..24].copy_from_slice(&1u32.to_le_bytes());
        header[52..54].copy_from_slice(&64u16.to_le_bytes()); // e_ehsize
        header
    }

    #[test]
    fn empty_image_is_rejected() {
        assert!(matches!(ImageFormat::detect(&[]), Err(Error::Load(_))));
    }

    #[test]
    fn garbage_is_rejected() {
        let err = ImageFormat::detect(b"definitely not a binary").unwrap_err();
        assert!(matches!(err, Error::Load(_)));
    }

    #[test]
    fn elf_executables_are_detected() {
        let exec = elf_header(goblin::elf::header::ET_EXEC);
        assert_eq!(ImageFormat::detect(&exec).unwrap(), ImageFormat::Elf);

        let pie = elf_header(goblin::elf::header::ET_DYN);
        assert_eq!(ImageFormat::detect(&pie).unwrap(), ImageFormat::Elf);
    }

    #[test]
    fn relocatable_elf_is_rejected() {
        let object = elf_header(goblin::elf::header::ET_REL);
        let err = ImageFormat::detect(&object).unwrap_err();
        assert!(err.to_string().contains("not executable"), "{err}");
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn host_binary_passes_host_check() {
        let sh = std::fs::read("/bin/sh").unwrap();
        assert_eq!(ImageFormat::check_host(&sh).unwrap(), ImageFormat::Elf);
    }

    #[test]
    fn display_names() {
        assert_eq!(ImageFormat::Elf.to_string(), "ELF");
        assert_eq!(ImageFormat::MachO.to_string(), "Mach-O");
        assert_eq!(ImageFormat::Pe.to_string(), "PE");
    }
}
