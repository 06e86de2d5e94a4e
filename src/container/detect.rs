//! File type detection.

use std::fmt;

use super::bitcode::{BitcodeCapability, NoBitcode};
use crate::fat::fat_magic;
use crate::macho::{object_magic, ARMAG};
use crate::ValidationConfig;

/// What a byte range holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// Fat (universal) file.
    Fat,
    /// Mach-O image.
    MachObject,
    /// `ar` archive.
    Archive,
    /// Module recognized by the bitcode capability.
    ForeignBitcode,
    /// None of the above.
    Unknown,
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileKind::Fat => "fat file",
            FileKind::MachObject => "Mach-O object",
            FileKind::Archive => "archive",
            FileKind::ForeignBitcode => "LLVM bitcode",
            FileKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

static NO_BITCODE: NoBitcode = NoBitcode;

/// Classifies byte ranges and carries the settings every check needs.
///
/// Cheap to copy; the bitcode capability is borrowed from the caller.
#[derive(Clone, Copy)]
pub struct Detector<'b> {
    config: ValidationConfig,
    bitcode: &'b dyn BitcodeCapability,
}

impl Detector<'static> {
    /// A detector without a bitcode reader.
    pub fn new(config: ValidationConfig) -> Self {
        Self {
            config,
            bitcode: &NO_BITCODE,
        }
    }
}

impl Default for Detector<'static> {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}

impl<'b> Detector<'b> {
    /// Replaces the bitcode capability.
    pub fn with_bitcode<'c>(self, bitcode: &'c dyn BitcodeCapability) -> Detector<'c> {
        Detector {
            config: self.config,
            bitcode,
        }
    }

    /// Validation settings.
    #[inline]
    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// The bitcode capability.
    #[inline]
    pub fn bitcode(&self) -> &'b dyn BitcodeCapability {
        self.bitcode
    }

    /// Classifies `data` by its leading magic.
    pub fn classify(&self, data: &[u8]) -> FileKind {
        if fat_magic(data).is_some() {
            FileKind::Fat
        } else if object_magic(data).is_some() {
            FileKind::MachObject
        } else if data.starts_with(ARMAG) {
            FileKind::Archive
        } else if self.bitcode.is_bitcode(data) {
            FileKind::ForeignBitcode
        } else {
            FileKind::Unknown
        }
    }
}

impl fmt::Debug for Detector<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Detector").field("config", &self.config).finish_non_exhaustive()
    }
}
