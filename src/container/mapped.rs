//! The backing buffer of an opened file.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use memmap2::Mmap;
use tracing::debug;

use super::detect::{Detector, FileKind};
use crate::error::{Error, Result};

enum Backing {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Backing {
    fn bytes(&self) -> &[u8] {
        match self {
            Backing::Mapped(mmap) => mmap,
            Backing::Owned(data) => data,
        }
    }
}

/// A file (or in-memory buffer) and its top-level classification.
///
/// The container is the only owner of the bytes; slices, archives, members
/// and objects are views that borrow from it. [`Container::unmap`] consumes
/// the container, so no view can outlive the mapping.
pub struct Container {
    name: String,
    path: Option<PathBuf>,
    backing: Backing,
    mtime: Option<SystemTime>,
    kind: FileKind,
}

impl Container {
    /// Opens and maps `path`, classifying its contents with `detector`.
    pub fn open<P: AsRef<Path>>(path: P, detector: &Detector<'_>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = File::open(&path).map_err(|e| Error::FileOpen {
            path: path.clone(),
            source: e,
        })?;
        let metadata = file.metadata().map_err(|e| Error::FileStat {
            path: path.clone(),
            source: e,
        })?;

        // Mapping a zero-length file fails on some platforms
        let backing = if metadata.len() == 0 {
            Backing::Owned(Vec::new())
        } else {
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::MemoryMap {
                path: path.clone(),
                source: e,
            })?;
            Backing::Mapped(mmap)
        };

        let kind = detector.classify(backing.bytes());
        debug!("{}: {} bytes, {}", path.display(), backing.bytes().len(), kind);

        Ok(Self {
            name: path.display().to_string(),
            path: Some(path),
            backing,
            mtime: metadata.modified().ok(),
            kind,
        })
    }

    /// Wraps an in-memory buffer.
    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>, detector: &Detector<'_>) -> Self {
        let kind = detector.classify(&data);
        Self {
            name: name.into(),
            path: None,
            backing: Backing::Owned(data),
            mtime: None,
            kind,
        }
    }

    /// Name used in diagnostics.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path the container was opened from, if any.
    #[inline]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The whole file.
    #[inline]
    pub fn data(&self) -> &[u8] {
        self.backing.bytes()
    }

    /// Length of the backing buffer.
    #[inline]
    pub fn len(&self) -> usize {
        self.data().len()
    }

    /// Returns true if the file is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data().is_empty()
    }

    /// Modification time of the file when it was opened.
    #[inline]
    pub fn mtime(&self) -> Option<SystemTime> {
        self.mtime
    }

    /// Top-level classification.
    #[inline]
    pub fn kind(&self) -> FileKind {
        self.kind
    }

    /// Releases the backing memory.
    pub fn unmap(self) {
        debug!("{}: unmapped", self.name);
        drop(self.backing);
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("name", &self.name)
            .field("len", &self.len())
            .field("kind", &self.kind)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io::Write;

    #[test]
    fn test_open_maps_and_classifies() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"!<arch>\n").unwrap();
        file.flush().unwrap();

        let container = Container::open(file.path(), &Detector::default()).unwrap();
        assert_eq!(container.kind(), FileKind::Archive);
        assert_eq!(container.len(), 8);
        assert!(container.mtime().is_some());
        container.unmap();
    }

    #[test]
    fn test_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let container = Container::open(file.path(), &Detector::default()).unwrap();
        assert!(container.is_empty());
        assert_eq!(container.kind(), FileKind::Unknown);
    }

    #[test]
    fn test_missing_file_is_io() {
        let dir = tempfile::tempdir().unwrap();
        let err = Container::open(dir.path().join("absent"), &Detector::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().contains("absent"));
    }
}
