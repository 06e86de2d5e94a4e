//! machpack - A Mach-O, fat (universal) binary and `ar` archive engine.
//!
//! This library maps a file, tells apart fat files, Mach-O images, static
//! libraries and bitcode modules, and walks their nesting (fat file, archive,
//! member, object) while validating every offset and size against the bytes
//! actually present. A write path rebuilds archives with a fresh table of
//! contents and lays out fat files.
//!
//! # Features
//!
//! - Memory-mapped, read-only input
//! - Fat and archive cursors with family-aware architecture lookup
//! - Structural validation of fat tables, archive members and load commands
//! - Recoverable, located errors: one bad member never hides its siblings
//! - Table of contents reconstruction (`ranlib`) and fat file creation
//!
//! # Example
//!
//! ```no_run
//! use machpack::{Container, Detector, Ofile, ValidationConfig};
//!
//! fn main() -> machpack::Result<()> {
//!     let detector = Detector::new(ValidationConfig::default());
//!     let container = Container::open("libfoo.a", &detector)?;
//!     let mut ofile = Ofile::new(&container, detector)?;
//!
//!     let mut next = ofile.first_member()?;
//!     while let Some(member) = next {
//!         println!("{} ({})", member.name(), member.kind);
//!         next = ofile.next_member()?;
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod arch;
pub mod archive;
pub mod container;
pub mod error;
pub mod fat;
pub mod macho;
pub mod util;
pub mod validate;
pub mod writer;

// Re-export main types
pub use arch::ArchFlag;
pub use archive::{Archive, Member, TocStatus};
pub use container::{BitcodeCapability, Container, Detector, FileKind, Ofile};
pub use error::{Advisory, Error, ErrorKind, Result};
pub use validate::{validate_container, Report, Verdict};
pub use writer::{breakout, OutputFile, WriteOptions, Writer};

use std::path::Path;

/// Validation strictness, threaded explicitly through the detector.
///
/// Every switch is off by default, which matches what the traditional
/// tools accept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationConfig {
    /// Reject (rather than warn about) object members that are not aligned
    /// to their pointer size inside an archive
    pub require_pointer_alignment: bool,
    /// Allow fat files as members of archives that are not themselves in a
    /// fat file
    pub permit_fat_objects_in_archives: bool,
    /// List tentative (common) definitions in a rebuilt table of contents
    pub include_tentative_defs_in_toc: bool,
    /// Always build a 64-bit table of contents
    pub force_64bit_toc: bool,
}

/// Opens `path` and validates every entity in it.
///
/// Only failing to open the file is an error; problems inside the file are
/// reported per entity in the returned [`Report`].
pub fn validate_file<P: AsRef<Path>>(path: P, config: ValidationConfig) -> Result<Report> {
    let detector = Detector::new(config);
    let container = Container::open(path, &detector)?;
    let report = validate_container(&container, &detector);
    container.unmap();
    Ok(report)
}

/// Opens `path` and copies everything in it into an editable tree.
///
/// The file is unmapped before returning, so the tree may be written back
/// over it.
pub fn read_tree<P: AsRef<Path>>(path: P, detector: Detector<'_>) -> Result<OutputFile> {
    let container = Container::open(path, &detector)?;
    let tree = {
        let mut ofile = Ofile::new(&container, detector)?;
        breakout(&mut ofile)?
    };
    container.unmap();
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macho::*;
    use crate::util::ByteSex;
    use crate::writer::{OutputArch, OutputContent, OutputMember};

    #[test]
    fn test_rebuild_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("libx.a");
        let data = build_object(ByteSex::Little, true, CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL, &[("_x", N_SECT | N_EXT, 1, 0)]);
        let file = OutputFile {
            name: "libx.a".into(),
            fat: false,
            fat_64: false,
            archs: vec![OutputArch {
                cputype: CPU_TYPE_X86_64,
                cpusubtype: CPU_SUBTYPE_X86_64_ALL,
                align: 12,
                content: OutputContent::Archive(vec![OutputMember::new("x.o", FileKind::MachObject, data)]),
            }],
        };
        let writer = Writer::new(Detector::default(), WriteOptions::default());
        writer.write(&file, &path).unwrap();

        let tree = read_tree(&path, Detector::default()).unwrap();
        writer.write(&tree, &path).unwrap();

        let report = validate_file(&path, ValidationConfig::default()).unwrap();
        assert!(report.is_good());
        assert_eq!(report.entities.len(), 2);
        assert!(report.advisories.is_empty());
    }
}
