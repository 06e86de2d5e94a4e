//! Error types for the container engine.
//!
//! Errors are grouped by the layer that raises them: file access, fat slice
//! tables, archives, Mach-O images, lookups and the write path. Validation
//! failures carry enough location information (architecture and/or member)
//! for a caller iterating many entities to report and skip just the bad one.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// The main error type for container operations.
#[derive(Error, Debug)]
pub enum Error {
    // ==================== I/O Errors ====================
    /// Any other I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The input could not be opened.
    #[error("can't open file '{path}': {source}")]
    FileOpen {
        /// File that failed
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },

    /// The input's metadata could not be read.
    #[error("can't stat file '{path}': {source}")]
    FileStat {
        /// File that failed
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },

    /// The input could not be memory mapped.
    #[error("can't map file '{path}': {source}")]
    MemoryMap {
        /// File that failed
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },

    /// The output could not be written or committed.
    #[error("can't write output file '{path}': {source}")]
    FileWrite {
        /// File that failed
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },

    // ==================== Fat Errors ====================
    /// A fat header or slice table rule was violated.
    #[error("truncated or malformed fat file ({reason})")]
    MalformedFat {
        /// Rule that failed
        reason: String,
    },

    // ==================== Archive Errors ====================
    /// An archive layout rule was violated.
    #[error("truncated or malformed archive ({reason})")]
    MalformedArchive {
        /// Rule that failed
        reason: String,
    },

    // ==================== Mach-O Errors ====================
    /// A Mach-O header or cross-command rule was violated.
    #[error("truncated or malformed object ({reason})")]
    MalformedObject {
        /// Rule that failed
        reason: String,
    },

    /// A rule of one load command was violated.
    #[error("truncated or malformed object (load command {index} {reason})")]
    MalformedLoadCommand {
        /// Position of the command in the command table
        index: u32,
        /// Rule that failed
        reason: String,
    },

    /// Two declared file regions of one image intersect.
    #[error("overlapping regions in object: {first} at {first_offset} (size {first_size}) overlaps {second} at {second_offset} (size {second_size})")]
    Overlap {
        /// Region being recorded
        first: &'static str,
        /// Its offset
        first_offset: u64,
        /// Its size
        first_size: u64,
        /// Region already recorded
        second: &'static str,
        /// Its offset
        second_offset: u64,
        /// Its size
        second_size: u64,
    },

    // ==================== Lookup Errors ====================
    /// No slice matches the requested architecture.
    #[error("file: {file} does not contain architecture: {arch}")]
    ArchNotFound {
        /// File searched
        file: String,
        /// Requested architecture
        arch: String,
    },

    /// No member has the requested name.
    #[error("file: {file} does not contain member: {member}")]
    MemberNotFound {
        /// Archive searched
        file: String,
        /// Requested member
        member: String,
    },

    /// A member was requested from something that is not an archive.
    #[error("file: {file} is not an archive (can't select member: {member})")]
    NotAnArchive {
        /// File searched
        file: String,
        /// Requested member
        member: String,
    },

    /// The architecture name is not in the flag table.
    #[error("unknown architecture specification flag: {0}")]
    UnknownArchFlag(String),

    // ==================== Write Errors ====================
    /// A member name does not fit the header.
    #[error("member name '{name}' is too long to encode")]
    NameTooLong {
        /// Offending name
        name: String,
    },

    /// A value does not fit the on-disk field it is written to.
    #[error("{what} too large for a {width}-bit field ({value:#x})")]
    TooLarge {
        /// Field being written
        what: &'static str,
        /// Field width in bits
        width: u32,
        /// Value that overflowed
        value: u64,
    },

    /// Duplicate TOC symbols while duplicates are fatal.
    #[error("same symbol defined in more than one member: {names:?}")]
    DuplicateSymbols {
        /// Symbols defined more than once
        names: Vec<String>,
    },

    /// Two inputs of a fat file share an architecture.
    #[error("duplicate architecture: {arch}")]
    DuplicateArch {
        /// Repeated architecture
        arch: String,
    },

    // ==================== Parse Errors ====================
    /// A structure could not be decoded.
    #[error("parse error at offset {offset:#x}: {reason}")]
    Parse {
        /// Where decoding failed
        offset: usize,
        /// What went wrong
        reason: String,
    },

    /// Fewer bytes than a structure needs.
    #[error("buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall {
        /// Bytes required
        needed: usize,
        /// Bytes present
        available: usize,
    },

    // ==================== Context ====================
    /// An error prefixed with the file, member or architecture it concerns.
    #[error("{location}: {source}")]
    Located {
        /// e.g. `libx.a(a.o) (for architecture arm64)`
        location: String,
        /// The wrapped error
        #[source]
        source: Box<Error>,
    },

    // ==================== Internal Errors ====================
    /// A precondition of the engine itself was broken.
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for container operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input could not be opened, stat'ed, mapped or written.
    Io,
    /// An offset or size is inconsistent with the container.
    Malformed,
    /// A requested architecture or member does not exist.
    NotFound,
    /// A precondition the engine is responsible for was violated.
    Internal,
}

impl Error {
    /// Returns the broad class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_)
            | Error::FileOpen { .. }
            | Error::FileStat { .. }
            | Error::MemoryMap { .. }
            | Error::FileWrite { .. } => ErrorKind::Io,
            Error::ArchNotFound { .. }
            | Error::MemberNotFound { .. }
            | Error::NotAnArchive { .. }
            | Error::UnknownArchFlag(_) => ErrorKind::NotFound,
            Error::Internal(_) => ErrorKind::Internal,
            Error::Located { source, .. } => source.kind(),
            _ => ErrorKind::Malformed,
        }
    }

    /// Returns true if the caller may skip the offending entity and continue.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Malformed | ErrorKind::NotFound)
    }

    /// Creates a parse error with a formatted message.
    #[inline]
    pub fn parse(offset: usize, reason: impl Into<String>) -> Self {
        Error::Parse {
            offset,
            reason: reason.into(),
        }
    }

    /// Creates a buffer too small error.
    #[inline]
    pub fn buffer_too_small(needed: usize, available: usize) -> Self {
        Error::BufferTooSmall { needed, available }
    }

    /// Creates a malformed fat file error.
    #[inline]
    pub fn fat(reason: impl Into<String>) -> Self {
        Error::MalformedFat {
            reason: reason.into(),
        }
    }

    /// Creates a malformed archive error.
    #[inline]
    pub fn archive(reason: impl Into<String>) -> Self {
        Error::MalformedArchive {
            reason: reason.into(),
        }
    }

    /// Creates a malformed object error.
    #[inline]
    pub fn object(reason: impl Into<String>) -> Self {
        Error::MalformedObject {
            reason: reason.into(),
        }
    }

    /// Creates a malformed load command error for command `index`.
    #[inline]
    pub fn load_command(index: u32, reason: impl Into<String>) -> Self {
        Error::MalformedLoadCommand {
            index,
            reason: reason.into(),
        }
    }

    /// Creates an internal error.
    #[inline]
    pub fn internal(reason: impl Into<String>) -> Self {
        Error::Internal(reason.into())
    }

    /// Prefixes this error with the entity it was found in, e.g.
    /// `libfoo.a(bar.o) (for architecture arm64)`.
    pub fn located(self, location: impl Into<String>) -> Self {
        let location = location.into();
        if location.is_empty() {
            return self;
        }
        Error::Located {
            location,
            source: Box::new(self),
        }
    }

    /// Strips any location wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Error::Located { source, .. } => source.root(),
            other => other,
        }
    }
}

/// A non-fatal diagnostic that was handled by a documented fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advisory {
    /// Entity the advisory applies to (file, member or architecture).
    pub location: String,
    /// Human readable message.
    pub message: String,
}

impl Advisory {
    /// Creates an advisory and emits it through `tracing`.
    pub fn raise(location: impl Into<String>, message: impl Into<String>) -> Self {
        let advisory = Advisory {
            location: location.into(),
            message: message.into(),
        };
        tracing::warn!("{}", advisory);
        advisory
    }
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.location.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.location, self.message)
        }
    }
}
