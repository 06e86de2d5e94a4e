//! Serializing an output tree into one contiguous buffer.
//!
//! The complete layout is planned before anything is written: every archive
//! gets its table of contents and member offsets, every fat slice its
//! aligned offset. Only then is a zero-filled buffer of the final size
//! allocated and filled, so a failure never leaves partial output behind.

use std::io::Write;
use std::path::Path;

use tracing::{debug, info};
use zerocopy::IntoBytes;

use super::toc::Toc;
use super::tree::{OutputContent, OutputFile, OutputMember, OutputObject};
use crate::archive::ArHeader;
use crate::container::Detector;
use crate::error::{Advisory, Error, Result};
use crate::fat::{FatSlice, FatTable};
use crate::macho::{ARMAG, MAXSECTALIGN, SARMAG};
use crate::util::align_up;

/// Bytes an extended-format (`#1/<n>`) name occupies after its header:
/// the name padded to 8, plus 4, so content after the 60-byte header
/// starts on an 8-byte boundary.
#[inline]
pub fn name_area(name: &str) -> u64 {
    align_up(name.len() as u64, 8) + 4
}

/// Settings for the write path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Sort the table of contents by symbol name
    pub sort_toc: bool,
    /// Fail instead of falling back to link order on duplicate symbols
    pub strict_duplicates: bool,
    /// Modification time stamped on the table of contents member
    pub toc_time: u64,
    /// Owner user id of the TOC member
    pub toc_uid: u32,
    /// Owner group id of the TOC member
    pub toc_gid: u32,
    /// File mode of the TOC member
    pub toc_mode: u32,
    /// Permission bits of files created by [`Writer::write`]
    pub file_mode: u32,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            sort_toc: true,
            strict_duplicates: false,
            toc_time: 0,
            toc_uid: 0,
            toc_gid: 0,
            toc_mode: 0o100644,
            file_mode: 0o644,
        }
    }
}

/// A serialized file and the advisories raised while building it.
#[derive(Debug)]
pub struct Output {
    /// The complete file
    pub bytes: Vec<u8>,
    /// Advisories raised while building TOCs
    pub advisories: Vec<Advisory>,
}

/// Serializes [`OutputFile`]s.
#[derive(Debug, Clone, Copy)]
pub struct Writer<'d> {
    detector: Detector<'d>,
    options: WriteOptions,
}

impl<'d> Writer<'d> {
    /// `detector` supplies the TOC settings and the bitcode reader used
    /// to list symbols of bitcode members.
    pub fn new(detector: Detector<'d>, options: WriteOptions) -> Self {
        Self { detector, options }
    }

    /// Options in effect.
    #[inline]
    pub fn options(&self) -> &WriteOptions {
        &self.options
    }

    /// Lays out and serializes `file`.
    ///
    /// A fat header is emitted when the file is marked fat or holds more
    /// than one architecture.
    pub fn to_bytes(&self, file: &OutputFile) -> Result<Output> {
        if file.archs.is_empty() {
            return Err(Error::internal(format!("{}: no architectures to write", file.name)));
        }
        let fat = file.fat || file.archs.len() > 1;

        let mut plans = Vec::with_capacity(file.archs.len());
        let mut advisories = Vec::new();
        for arch in &file.archs {
            let location = if fat {
                format!("{} (for architecture {})", file.name, arch.arch_name())
            } else {
                file.name.clone()
            };
            let plan = match &arch.content {
                OutputContent::Object(object) => SlicePlan::Object(object),
                OutputContent::Archive(members) => {
                    let plan = ArchivePlan::new(members, &self.detector, &self.options, &location)?;
                    advisories.extend_from_slice(&plan.toc.advisories);
                    SlicePlan::Archive(plan)
                }
                OutputContent::Raw(bytes) => SlicePlan::Raw(bytes),
            };
            plans.push(plan);
        }

        if !fat {
            let plan = &plans[0];
            let mut bytes = vec![0u8; plan.size() as usize];
            plan.write_into(&self.options, &mut bytes)?;
            return Ok(Output { bytes, advisories });
        }

        let mut table = FatTable {
            is_64: file.fat_64,
            slices: file
                .archs
                .iter()
                .zip(&plans)
                .map(|(arch, plan)| FatSlice {
                    cputype: arch.cputype,
                    cpusubtype: arch.cpusubtype,
                    offset: 0,
                    size: plan.size(),
                    align: arch.align,
                })
                .collect(),
        };
        let mut offset = table.header_size() as u64;
        for slice in &mut table.slices {
            if slice.align > MAXSECTALIGN {
                return Err(Error::fat(format!(
                    "align (2^{}) too large for {} (maximum 2^{})",
                    slice.align,
                    slice.arch_name(),
                    MAXSECTALIGN
                )));
            }
            offset = align_up(offset, 1 << slice.align);
            slice.offset = offset;
            offset += slice.size;
        }

        // Encoding the table first rejects offsets a 32-bit header cannot
        // hold before the output buffer is allocated.
        let mut header = vec![0u8; table.header_size()];
        table.encode_into(&mut header)?;

        let mut bytes = vec![0u8; offset as usize];
        bytes[..header.len()].copy_from_slice(&header);
        for (slice, plan) in table.slices.iter().zip(&plans) {
            debug!("{}: writing {}", file.name, slice);
            plan.write_into(&self.options, &mut bytes[slice.range()])?;
        }
        Ok(Output { bytes, advisories })
    }

    /// Serializes `file` and commits it to `path` through a temporary file
    /// in the same directory. Returns the advisories raised on the way.
    pub fn write<P: AsRef<Path>>(&self, file: &OutputFile, path: P) -> Result<Vec<Advisory>> {
        let path = path.as_ref();
        let output = self.to_bytes(file)?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let fail = |source: std::io::Error| Error::FileWrite {
            path: path.to_path_buf(),
            source,
        };

        let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(fail)?;
        temp.write_all(&output.bytes).map_err(fail)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(self.options.file_mode);
            temp.as_file().set_permissions(permissions).map_err(fail)?;
        }
        temp.persist(path).map_err(|e| fail(e.error))?;

        info!("Wrote {} ({} bytes)", path.display(), output.bytes.len());
        Ok(output.advisories)
    }
}

// =============================================================================
// Layout
// =============================================================================

enum SlicePlan<'f> {
    Object(&'f OutputObject),
    Archive(ArchivePlan<'f>),
    Raw(&'f [u8]),
}

impl SlicePlan<'_> {
    fn size(&self) -> u64 {
        match self {
            SlicePlan::Object(object) => object.data.len() as u64,
            SlicePlan::Archive(plan) => plan.size(),
            SlicePlan::Raw(bytes) => bytes.len() as u64,
        }
    }

    /// `out` is exactly [`SlicePlan::size`] zeroed bytes.
    fn write_into(&self, options: &WriteOptions, out: &mut [u8]) -> Result<()> {
        match self {
            SlicePlan::Object(object) => {
                out.copy_from_slice(&object.data);
                object.header.encode_into(object.byte_sex, out)
            }
            SlicePlan::Archive(plan) => plan.write_into(options, out),
            SlicePlan::Raw(bytes) => {
                out.copy_from_slice(bytes);
                Ok(())
            }
        }
    }
}

struct ArchivePlan<'f> {
    members: &'f [OutputMember],
    toc: Toc,
    member_sizes: Vec<u64>,
    /// Header offset of each member from the archive start
    offsets: Vec<u64>,
}

impl<'f> ArchivePlan<'f> {
    fn new(
        members: &'f [OutputMember],
        detector: &Detector<'_>,
        options: &WriteOptions,
        location: &str,
    ) -> Result<Self> {
        let mut toc = Toc::build(members, detector, options, location)?;
        let member_sizes: Vec<u64> = members.iter().map(member_size).collect();
        let offsets = toc.assign_offsets(&member_sizes);
        Ok(Self {
            members,
            toc,
            member_sizes,
            offsets,
        })
    }

    fn size(&self) -> u64 {
        SARMAG as u64 + self.toc.size() + self.member_sizes.iter().sum::<u64>()
    }

    fn write_into(&self, options: &WriteOptions, out: &mut [u8]) -> Result<()> {
        out[..SARMAG].copy_from_slice(ARMAG);
        let toc_end = SARMAG + self.toc.size() as usize;
        self.toc.write_into(&self.offsets, options, &mut out[SARMAG..toc_end])?;

        for ((member, &offset), &size) in self.members.iter().zip(&self.offsets).zip(&self.member_sizes) {
            let start = offset as usize;
            write_member(member, &mut out[start..start + size as usize])?;
        }
        Ok(())
    }
}

/// Header, long name and content padded to 8.
fn member_size(member: &OutputMember) -> u64 {
    ArHeader::SIZE as u64 + name_area(&member.name) + align_up(member.data.len() as u64, 8)
}

fn write_member(member: &OutputMember, out: &mut [u8]) -> Result<()> {
    let area = name_area(&member.name);
    let header = ArHeader::new(
        &format!("#1/{area}"),
        member.date,
        member.uid,
        member.gid,
        member.mode,
        (out.len() - ArHeader::SIZE) as u64,
    )
    .map_err(|e| match e {
        Error::NameTooLong { .. } => Error::NameTooLong {
            name: member.name.clone(),
        },
        other => other,
    })?;
    out[..ArHeader::SIZE].copy_from_slice(header.as_bytes());

    let name_at = ArHeader::SIZE;
    out[name_at..name_at + member.name.len()].copy_from_slice(member.name.as_bytes());
    let content_at = name_at + area as usize;
    let padding_at = content_at + member.data.len();
    out[content_at..padding_at].copy_from_slice(&member.data);
    out[padding_at..].fill(b'\n');
    Ok(())
}
