//! Positioned views over a container: the fat and archive navigators.
//!
//! An [`Ofile`] borrows a [`Container`] and remembers which architecture
//! slice and which archive member are active. Moving the cursor classifies
//! the newly active entity and re-runs the structural validator on it; a
//! validation failure is returned as an error, but the cursor has already
//! moved, so the caller may report it and keep iterating.

use tracing::debug;

use super::detect::{Detector, FileKind};
use super::mapped::Container;
use crate::arch::{ArchFlag, ArchMatch};
use crate::archive::{Archive, Member};
use crate::error::{Advisory, Error, Result};
use crate::fat::{FatSlice, FatTable};
use crate::macho::{MachObject, ObjectHeader};
use crate::validate::Validator;

/// The active architecture slice (or the whole file when it is thin).
#[derive(Debug, Clone, Copy)]
pub struct SliceView<'a> {
    /// Position in the fat table, `None` for a thin file
    pub index: Option<usize>,
    /// The fat table entry, `None` for a thin file
    pub slice: Option<FatSlice>,
    /// Offset of `data` in the container
    pub offset: u64,
    /// Bytes of the slice
    pub data: &'a [u8],
    /// Kind of the slice content
    pub kind: FileKind,
}

impl<'a> SliceView<'a> {
    /// Name of the slice's architecture, when known.
    pub fn arch_name(&self) -> Option<String> {
        if let Some(slice) = &self.slice {
            return Some(slice.arch_name());
        }
        match self.kind {
            FileKind::MachObject => ObjectHeader::parse(self.data).ok().map(|(h, _)| h.arch_name()),
            _ => None,
        }
    }

    /// The slice as a Mach-O image.
    pub fn object(&self) -> Result<MachObject<'a>> {
        MachObject::parse(self.data)
    }
}

/// The active archive member.
#[derive(Debug, Clone)]
pub struct MemberView<'a> {
    /// Arena entry of the member
    pub member: Member,
    /// Member content, after any long name
    pub data: &'a [u8],
    /// Kind of the member content
    pub kind: FileKind,
}

impl<'a> MemberView<'a> {
    /// Name of the member.
    #[inline]
    pub fn name(&self) -> &str {
        &self.member.name
    }

    /// The member as a Mach-O image.
    pub fn object(&self) -> Result<MachObject<'a>> {
        MachObject::parse(self.data)
    }
}

/// A cursor over one container.
#[derive(Debug)]
pub struct Ofile<'a> {
    container: &'a Container,
    validator: Validator<'a>,
    fat: Option<FatTable>,
    slice: SliceView<'a>,
    archive: Option<Archive<'a>>,
    member: Option<usize>,
}

impl<'a> Ofile<'a> {
    /// Positions a cursor at the top of `container`.
    ///
    /// A fat slice table is validated before anything else; a thin object
    /// or archive is validated as a whole.
    pub fn new(container: &'a Container, detector: Detector<'a>) -> Result<Self> {
        let data = container.data();
        let mut ofile = Self {
            container,
            validator: Validator::new(detector),
            fat: None,
            slice: SliceView {
                index: None,
                slice: None,
                offset: 0,
                data,
                kind: container.kind(),
            },
            archive: None,
            member: None,
        };

        match container.kind() {
            FileKind::Fat => {
                let location = ofile.location();
                ofile.validator.check_fat(data, &location).into_result()?;
                let table = FatTable::parse(data).map_err(|e| e.located(&location))?;
                ofile.fat = Some(table);
            }
            FileKind::Archive => ofile.open_archive()?,
            FileKind::MachObject => {
                let location = ofile.location();
                ofile.validator.check_object(data, None, &location).into_result()?;
            }
            FileKind::ForeignBitcode | FileKind::Unknown => {}
        }
        Ok(ofile)
    }

    /// Opens a cursor and narrows it to `arch` and/or `member`.
    ///
    /// On a fat file without `arch`, a member request is resolved in the
    /// first slice.
    pub fn select(
        container: &'a Container,
        detector: Detector<'a>,
        arch: Option<&ArchFlag>,
        member: Option<&str>,
    ) -> Result<Self> {
        let mut ofile = Self::new(container, detector)?;

        match (arch, ofile.fat.as_ref()) {
            (Some(flag), Some(table)) => {
                let index = table.find(flag).ok_or_else(|| Error::ArchNotFound {
                    file: container.name().to_string(),
                    arch: flag.name.to_string(),
                })?;
                ofile.seek_arch(index)?;
            }
            (Some(flag), None) => {
                let matched = ofile
                    .cputype()
                    .is_some_and(|(cputype, sub)| flag.matches(cputype, sub) != ArchMatch::None);
                if !matched {
                    return Err(Error::ArchNotFound {
                        file: container.name().to_string(),
                        arch: flag.name.to_string(),
                    });
                }
            }
            (None, Some(_)) if member.is_some() => {
                ofile.first_arch()?;
            }
            (None, _) => {}
        }

        if let Some(name) = member {
            if ofile.archive.is_none() {
                return Err(Error::NotAnArchive {
                    file: ofile.location(),
                    member: name.to_string(),
                });
            }
            ofile.seek_member(name)?;
        }
        Ok(ofile)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The container this view borrows.
    #[inline]
    pub fn container(&self) -> &'a Container {
        self.container
    }

    /// The fat table, if the container is fat.
    #[inline]
    pub fn fat(&self) -> Option<&FatTable> {
        self.fat.as_ref()
    }

    /// The active slice.
    #[inline]
    pub fn slice(&self) -> &SliceView<'a> {
        &self.slice
    }

    /// The archive of the active slice, if it is one.
    #[inline]
    pub fn archive(&self) -> Option<&Archive<'a>> {
        self.archive.as_ref()
    }

    /// The active member.
    pub fn member(&self) -> Option<MemberView<'a>> {
        let archive = self.archive.as_ref()?;
        let index = self.member?;
        Some(member_view(archive, index))
    }

    /// Advisories raised by every validation this cursor has run.
    #[inline]
    pub fn advisories(&self) -> &[Advisory] {
        self.validator.advisories()
    }

    /// The detector the cursor classifies with.
    #[inline]
    pub fn detector(&self) -> &Detector<'a> {
        self.validator.detector()
    }

    /// (cputype, cpusubtype) of the active slice: the fat entry, the object
    /// header, or the archive's first object.
    pub fn cputype(&self) -> Option<(u32, u32)> {
        if let Some(slice) = &self.slice.slice {
            return Some((slice.cputype, slice.cpusubtype));
        }
        match self.slice.kind {
            FileKind::MachObject => ObjectHeader::parse(self.slice.data)
                .ok()
                .map(|(h, _)| (h.cputype, h.cpusubtype)),
            FileKind::Archive => self.archive.as_ref().and_then(|a| a.cputype()),
            _ => None,
        }
    }

    /// Describes the cursor position, e.g. `libx.a(a.o) (for architecture arm64)`.
    pub fn location(&self) -> String {
        let mut location = self.container.name().to_string();
        if let Some(member) = self.member.and_then(|i| self.archive.as_ref()?.member(i)) {
            location.push('(');
            location.push_str(&member.name);
            location.push(')');
        }
        if let Some(slice) = &self.slice.slice {
            location.push_str(&format!(" (for architecture {})", slice.arch_name()));
        }
        location
    }

    // =========================================================================
    // Fat Navigator
    // =========================================================================

    /// Number of slices in the fat table.
    pub fn arch_count(&self) -> Result<usize> {
        Ok(self.fat_table()?.len())
    }

    /// Activates the first slice.
    pub fn first_arch(&mut self) -> Result<Option<SliceView<'a>>> {
        self.seek_arch(0)
    }

    /// Activates the slice after the current one; `Ok(None)` past the end.
    pub fn next_arch(&mut self) -> Result<Option<SliceView<'a>>> {
        let next = self.slice.index.map_or(0, |i| i + 1);
        self.seek_arch(next)
    }

    /// Activates slice `index`; `Ok(None)` when out of range.
    pub fn seek_arch(&mut self, index: usize) -> Result<Option<SliceView<'a>>> {
        let Some(slice) = self.fat_table()?.slices.get(index).copied() else {
            return Ok(None);
        };
        let data = self
            .container
            .data()
            .get(slice.range())
            .ok_or_else(|| Error::internal("fat slice outside the validated container"))?;

        self.archive = None;
        self.member = None;
        self.slice = SliceView {
            index: Some(index),
            slice: Some(slice),
            offset: slice.offset,
            data,
            kind: self.validator.detector().classify(data),
        };
        debug!("{}: {}", self.location(), self.slice.kind);

        match self.slice.kind {
            FileKind::Archive => self.open_archive()?,
            FileKind::MachObject => {
                let location = self.location();
                self.validator
                    .check_object(data, Some(&slice), &location)
                    .into_result()?;
            }
            _ => {}
        }
        Ok(Some(self.slice))
    }

    fn fat_table(&self) -> Result<&FatTable> {
        self.fat
            .as_ref()
            .ok_or_else(|| Error::internal("architecture navigator used on a file that is not fat"))
    }

    fn open_archive(&mut self) -> Result<()> {
        let location = self.location();
        let SliceView { data, offset, slice, .. } = self.slice;
        self.validator
            .check_archive(data, offset, slice.as_ref(), &location)
            .into_result()?;
        let archive = Archive::parse(data, self.validator.detector(), &location)
            .map_err(|e| e.located(&location))?;
        self.archive = Some(archive);
        Ok(())
    }

    // =========================================================================
    // Archive Navigator
    // =========================================================================

    /// Activates the first regular member.
    pub fn first_member(&mut self) -> Result<Option<MemberView<'a>>> {
        let first = self.archive_ref()?.first();
        self.activate_member(first)
    }

    /// Activates the member after the current one; `Ok(None)` past the end.
    pub fn next_member(&mut self) -> Result<Option<MemberView<'a>>> {
        let next = self.archive_ref()?.next_after(self.member);
        self.activate_member(next)
    }

    /// Activates the member called `name`.
    pub fn seek_member(&mut self, name: &str) -> Result<Option<MemberView<'a>>> {
        let Some(index) = self.archive_ref()?.find(name) else {
            return Err(Error::MemberNotFound {
                file: self.location(),
                member: name.to_string(),
            });
        };
        self.activate_member(Some(index))
    }

    fn archive_ref(&self) -> Result<&Archive<'a>> {
        self.archive
            .as_ref()
            .ok_or_else(|| Error::internal("member navigator used on a slice that is not an archive"))
    }

    fn activate_member(&mut self, index: Option<usize>) -> Result<Option<MemberView<'a>>> {
        let Some(index) = index else {
            return Ok(None);
        };
        let view = member_view(self.archive_ref()?, index);
        self.member = Some(index);

        let location = self.location();
        match view.kind {
            FileKind::MachObject => {
                self.validator
                    .check_object(view.data, self.slice.slice.as_ref(), &location)
                    .into_result()?;
            }
            FileKind::Fat if self.validator.detector().config().permit_fat_objects_in_archives => {
                let base = self.slice.offset + view.member.content_offset;
                self.validator
                    .check_fat_in_archive(view.data, base, &location)
                    .into_result()?;
            }
            _ => {}
        }
        Ok(Some(view))
    }
}

fn member_view<'a>(archive: &Archive<'a>, index: usize) -> MemberView<'a> {
    let member = archive.members()[index].clone();
    let kind = member.kind;
    MemberView {
        member,
        data: archive.content(index),
        kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{build_archive, RawMember};
    use crate::error::ErrorKind;
    use crate::fat::build_fat;
    use crate::macho::*;
    use crate::util::ByteSex;

    fn object(cputype: u32, cpusubtype: u32) -> Vec<u8> {
        build_object(ByteSex::Little, true, cputype, cpusubtype, &[("_f", N_SECT | N_EXT, 1, 0)])
    }

    #[test]
    fn test_fat_first_next_visits_all() {
        let a = object(CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL);
        let b = object(CPU_TYPE_ARM64, CPU_SUBTYPE_ARM64_ALL);
        let data = build_fat(false, &[(CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL, 12, &a), (CPU_TYPE_ARM64, CPU_SUBTYPE_ARM64_ALL, 14, &b)]);
        let container = Container::from_bytes("fat", data, &Detector::default());
        let mut ofile = Ofile::new(&container, Detector::default()).unwrap();
        assert_eq!(ofile.arch_count().unwrap(), 2);

        let first = ofile.first_arch().unwrap().unwrap();
        assert_eq!(first.index, Some(0));
        assert_eq!(first.kind, FileKind::MachObject);
        let second = ofile.next_arch().unwrap().unwrap();
        assert_eq!(second.arch_name().as_deref(), Some("arm64"));
        assert_eq!(ofile.location(), "fat (for architecture arm64)");
        assert!(ofile.next_arch().unwrap().is_none());
    }

    #[test]
    fn test_family_lookup_selects_generic_slice() {
        let arm = build_object(ByteSex::Little, false, CPU_TYPE_ARM, CPU_SUBTYPE_ARM_ALL, &[]);
        let x86 = object(CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL);
        let data = build_fat(false, &[(CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL, 12, &x86), (CPU_TYPE_ARM, CPU_SUBTYPE_ARM_ALL, 14, &arm)]);
        let container = Container::from_bytes("u", data, &Detector::default());
        let armv7s = ArchFlag::parse("armv7s").unwrap();
        let ofile = Ofile::select(&container, Detector::default(), Some(&armv7s), None).unwrap();
        assert_eq!(ofile.slice().index, Some(1));

        let arm64 = ArchFlag::parse("arm64").unwrap();
        let err = Ofile::select(&container, Detector::default(), Some(&arm64), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_member_navigation() {
        let a = object(CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL);
        let data = build_archive(&[
            RawMember::plain("a.o", &a),
            RawMember::extended("long_member_name_b.o", &a),
        ]);
        let container = Container::from_bytes("libm.a", data, &Detector::default());
        let mut ofile = Ofile::new(&container, Detector::default()).unwrap();
        assert_eq!(ofile.first_member().unwrap().unwrap().name(), "a.o");
        let second = ofile.next_member().unwrap().unwrap();
        assert_eq!(second.name(), "long_member_name_b.o");
        assert_eq!(second.data, &a[..]);
        assert_eq!(ofile.location(), "libm.a(long_member_name_b.o)");
        assert!(ofile.next_member().unwrap().is_none());

        let err = ofile.seek_member("missing.o").unwrap_err();
        assert!(matches!(err, Error::MemberNotFound { .. }));
        assert_eq!(ofile.seek_member("a.o").unwrap().unwrap().member.index, 0);
    }

    #[test]
    fn test_navigator_misuse_is_internal() {
        let data = object(CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL);
        let container = Container::from_bytes("t.o", data, &Detector::default());
        let mut ofile = Ofile::new(&container, Detector::default()).unwrap();
        assert_eq!(ofile.first_arch().unwrap_err().kind(), ErrorKind::Internal);
        assert_eq!(ofile.first_member().unwrap_err().kind(), ErrorKind::Internal);

        let err = Ofile::select(&container, Detector::default(), None, Some("x.o")).unwrap_err();
        assert!(matches!(err, Error::NotAnArchive { .. }));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_bad_slice_does_not_stop_iteration() {
        let good = object(CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL);
        let mut bad = object(CPU_TYPE_ARM64, CPU_SUBTYPE_ARM64_ALL);
        bad.truncate(bad.len() - 1);
        let data = build_fat(false, &[(CPU_TYPE_ARM64, CPU_SUBTYPE_ARM64_ALL, 14, &bad), (CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL, 12, &good)]);
        let container = Container::from_bytes("mixed", data, &Detector::default());
        let mut ofile = Ofile::new(&container, Detector::default()).unwrap();
        let err = ofile.first_arch().unwrap_err();
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("for architecture arm64"));
        assert_eq!(ofile.next_arch().unwrap().unwrap().index, Some(1));
    }
}
