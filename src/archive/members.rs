//! Member arena of an `ar` archive.
//!
//! [`Archive::parse`] walks the member headers once, decoding names and
//! classifying contents, and keeps every member in a `Vec` addressed by
//! index. The walk is forgiving: a header or long name that runs past the
//! end of the archive is clamped and reported as an [`Advisory`] so readers
//! can still list what is there. The strict rules live in the validator.

use std::collections::HashMap;

use tracing::debug;

use super::header::*;
use super::toc::*;
use crate::container::{Detector, FileKind};
use crate::error::{Advisory, Error, Result};
use crate::macho::{ObjectHeader, ARMAG, SARMAG, SYSV_STRING_TABLE};
use crate::util::{align_up, ByteSex};

/// What a member is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberRole {
    /// An ordinary member (object, bitcode, anything else).
    Regular,
    /// A `__.SYMDEF*` table of contents.
    TableOfContents,
    /// The System V `// ` long-name string table.
    StringTable,
}

/// One member of an archive. Offsets are relative to the archive start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Position in the arena
    pub index: usize,
    /// Logical name, after resolving any long-name convention
    pub name: String,
    /// Offset of the member header from the archive start
    pub header_offset: u64,
    /// Bytes of extended-format name consumed from the declared size
    pub name_len: u64,
    /// Offset of the content, past any extended name
    pub content_offset: u64,
    /// Content size, excluding any extended name
    pub content_size: u64,
    /// Modification time
    pub date: u64,
    /// Owner user id
    pub uid: u32,
    /// Owner group id
    pub gid: u32,
    /// File mode
    pub mode: u32,
    /// Kind of the content
    pub kind: FileKind,
    /// Whether this is a TOC, string table or regular member
    pub role: MemberRole,
    /// The declared size or name length was clamped to the archive end
    pub truncated: bool,
}

impl Member {
    /// Returns true for members a caller would list (not TOC or string table).
    #[inline]
    pub fn is_regular(&self) -> bool {
        self.role == MemberRole::Regular
    }
}

/// A parsed archive borrowing its bytes from the container.
#[derive(Debug, Clone)]
pub struct Archive<'a> {
    data: &'a [u8],
    members: Vec<Member>,
    toc_member: Option<usize>,
    toc: TocStatus,
    cputype: Option<(u32, u32)>,
    byte_sex: Option<ByteSex>,
    diagnostics: Vec<Advisory>,
}

impl<'a> Archive<'a> {
    /// Walks the members of the archive in `data`.
    ///
    /// `location` prefixes any advisories raised during the walk.
    pub fn parse(data: &'a [u8], detector: &Detector<'_>, location: &str) -> Result<Self> {
        if !data.starts_with(ARMAG) {
            return Err(Error::archive("bad archive magic"));
        }

        let mut archive = Self {
            data,
            members: Vec::new(),
            toc_member: None,
            toc: TocStatus::Absent,
            cputype: None,
            byte_sex: None,
            diagnostics: Vec::new(),
        };

        let size = data.len() as u64;
        let mut string_table: Option<(u64, u64)> = None;
        let mut toc_candidates = Vec::new();
        let mut offset = SARMAG as u64;

        while offset < size {
            let Some(header) = ArHeader::read_at(data, offset as usize) else {
                archive.advise(location, format!("archive member header at offset {offset} extends past the end of the archive"));
                break;
            };
            if !header.has_valid_fmag() {
                archive.advise(location, format!("archive member header at offset {offset} has a bad trailer"));
            }

            let content_start = offset + ArHeader::SIZE as u64;
            let declared = header.size();
            let mut member_size = declared;
            let mut truncated = false;
            if content_start.checked_add(member_size).map_or(true, |end| end > size) {
                archive.advise(
                    location,
                    format!("size of archive member at offset {offset} ({declared}) extends past the end of the archive, truncated"),
                );
                member_size = size - content_start;
                truncated = true;
            }

            let mut name_len = 0u64;
            let name = match header.name_encoding() {
                NameEncoding::Extended { name_len: len } => {
                    name_len = len;
                    if name_len > member_size {
                        archive.advise(
                            location,
                            format!("long name of archive member at offset {offset} extends past the end of the member, truncated"),
                        );
                        name_len = member_size;
                        truncated = true;
                    }
                    let start = content_start as usize;
                    extended_name(&data[start..start + name_len as usize])
                }
                NameEncoding::SysV { offset: name_offset } => {
                    let resolved = string_table.and_then(|(start, len)| {
                        let table = &data[start as usize..(start + len) as usize];
                        sysv_name(table, name_offset)
                    });
                    match resolved {
                        Some(name) => name,
                        None => {
                            archive.advise(
                                location,
                                format!("long name offset {name_offset} of archive member at offset {offset} is not in the string table"),
                            );
                            plain_name(&header.ar_name)
                        }
                    }
                }
                NameEncoding::Plain(name) => name,
            };

            let content_offset = content_start + name_len;
            let content_size = member_size - name_len;
            let role = if header.ar_name.starts_with(SYSV_STRING_TABLE.as_bytes()) {
                string_table = Some((content_offset, content_size));
                MemberRole::StringTable
            } else if is_toc_name(&name) {
                toc_candidates.push(archive.members.len());
                MemberRole::TableOfContents
            } else {
                MemberRole::Regular
            };
            let content = &data[content_offset as usize..(content_offset + content_size) as usize];
            let kind = match role {
                MemberRole::Regular => detector.classify(content),
                _ => FileKind::Unknown,
            };

            debug!("{}: member {} '{}' at {} size {} ({})", location, archive.members.len(), name, offset, content_size, kind);

            archive.members.push(Member {
                index: archive.members.len(),
                name,
                header_offset: offset,
                name_len,
                content_offset,
                content_size,
                date: header.date(),
                uid: header.uid(),
                gid: header.gid(),
                mode: header.mode(),
                kind,
                role,
                truncated,
            });

            offset = content_start + align_up(member_size, 2);
        }

        archive.resolve_identity();

        match toc_candidates.as_slice() {
            [] => {}
            [index] => {
                archive.toc_member = Some(*index);
                archive.load_toc(location);
            }
            _ => {
                archive.advise(location, "archive contains more than one table of contents member, ignoring them");
            }
        }

        Ok(archive)
    }

    fn advise(&mut self, location: &str, message: impl Into<String>) {
        self.diagnostics.push(Advisory::raise(location, message));
    }

    /// The first Mach-O member fixes the archive's CPU identity and the byte
    /// sex of its table of contents.
    fn resolve_identity(&mut self) {
        for member in self.members.iter().filter(|m| m.is_regular()) {
            if member.kind != FileKind::MachObject {
                continue;
            }
            let start = member.content_offset as usize;
            let end = start + member.content_size as usize;
            if let Ok((header, sex)) = ObjectHeader::parse(&self.data[start..end]) {
                self.cputype = Some((header.cputype, header.cpusubtype));
                self.byte_sex = Some(sex);
                return;
            }
        }
    }

    fn load_toc(&mut self, location: &str) {
        let Some(index) = self.toc_member else {
            return;
        };
        let member = &self.members[index];
        let content = self.content(index);
        let sex = self.byte_sex.unwrap_or(ByteSex::host());
        self.toc = match read_toc(content, &member.name, sex, self.data.len() as u64) {
            Ok(mut toc) => {
                let by_offset: HashMap<u64, usize> = self
                    .members
                    .iter()
                    .map(|m| (m.header_offset, m.index))
                    .collect();
                for entry in &mut toc.entries {
                    entry.member = by_offset.get(&entry.member_offset).copied();
                }
                TocStatus::Usable(toc)
            }
            Err(reason) => {
                let message = format!("table of contents is unusable ({reason})");
                self.advise(location, message);
                TocStatus::Unusable(reason)
            }
        };
    }

    /// The archive bytes.
    #[inline]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Every member, including the TOC and string table.
    #[inline]
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// A member by arena index.
    #[inline]
    pub fn member(&self, index: usize) -> Option<&Member> {
        self.members.get(index)
    }

    /// Content bytes of a member (after any long name).
    pub fn content(&self, index: usize) -> &'a [u8] {
        match self.members.get(index) {
            Some(m) => &self.data[m.content_offset as usize..(m.content_offset + m.content_size) as usize],
            None => &[],
        }
    }

    /// Indices of the regular members in order.
    pub fn regular(&self) -> impl Iterator<Item = usize> + '_ {
        self.members.iter().filter(|m| m.is_regular()).map(|m| m.index)
    }

    /// First regular member.
    pub fn first(&self) -> Option<usize> {
        self.next_after(None)
    }

    /// The regular member following `current` (or the first one).
    pub fn next_after(&self, current: Option<usize>) -> Option<usize> {
        let start = current.map_or(0, |i| i + 1);
        self.members
            .get(start..)?
            .iter()
            .find(|m| m.is_regular())
            .map(|m| m.index)
    }

    /// Finds a regular member by name.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.members
            .iter()
            .find(|m| m.is_regular() && m.name == name)
            .map(|m| m.index)
    }

    /// The TOC member, when exactly one exists.
    pub fn toc_member(&self) -> Option<&Member> {
        self.toc_member.and_then(|i| self.members.get(i))
    }

    /// The TOC reading outcome.
    #[inline]
    pub fn toc(&self) -> &TocStatus {
        &self.toc
    }

    /// (cputype, cpusubtype) of the first Mach-O member.
    #[inline]
    pub fn cputype(&self) -> Option<(u32, u32)> {
        self.cputype
    }

    /// Byte sex of the first Mach-O member.
    #[inline]
    pub fn byte_sex(&self) -> Option<ByteSex> {
        self.byte_sex
    }

    /// Advisories raised while walking the archive.
    #[inline]
    pub fn diagnostics(&self) -> &[Advisory] {
        &self.diagnostics
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::macho::*;
    use zerocopy::IntoBytes;

    /// A raw member for [`build_archive`]: header name field, extended
    /// name (if any) and content.
    pub(crate) struct RawMember<'m> {
        pub field: String,
        pub long_name: Option<&'m str>,
        pub content: &'m [u8],
    }

    impl<'m> RawMember<'m> {
        pub(crate) fn plain(name: &str, content: &'m [u8]) -> Self {
            Self { field: name.to_string(), long_name: None, content }
        }

        pub(crate) fn extended(name: &'m str, content: &'m [u8]) -> Self {
            let padded = align_up(name.len() as u64, 8) as usize + 4;
            Self { field: format!("#1/{padded}"), long_name: Some(name), content }
        }
    }

    /// Serializes members the way a traditional `ar` does (2-byte padding).
    pub(crate) fn build_archive(members: &[RawMember<'_>]) -> Vec<u8> {
        let mut out = ARMAG.to_vec();
        for m in members {
            let mut name_bytes = Vec::new();
            if let Some(name) = m.long_name {
                let padded = align_up(name.len() as u64, 8) as usize + 4;
                name_bytes = name.as_bytes().to_vec();
                name_bytes.resize(padded, 0);
            }
            let size = (name_bytes.len() + m.content.len()) as u64;
            let header = ArHeader::new(&m.field, 0, 0, 0, 0o100644, size).unwrap();
            out.extend_from_slice(header.as_bytes());
            out.extend_from_slice(&name_bytes);
            out.extend_from_slice(m.content);
            if out.len() % 2 != 0 {
                out.push(b'\n');
            }
        }
        out
    }

    #[test]
    fn test_walk_plain_and_extended() {
        let a = build_object(ByteSex::Little, true, CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL, &[]);
        let data = build_archive(&[
            RawMember::plain("short.o", &a),
            RawMember::extended("a_rather_long_member_name.o", &a),
            RawMember::plain("notes.txt", b"odd"),
        ]);
        let archive = Archive::parse(&data, &Detector::default(), "libt.a").unwrap();
        let members = archive.members();
        assert_eq!(members.len(), 3);
        assert_eq!(members[0].name, "short.o");
        assert_eq!(members[0].kind, FileKind::MachObject);
        assert_eq!(members[1].name, "a_rather_long_member_name.o");
        assert_eq!(members[1].name_len, 36);
        assert_eq!(members[1].content_size, a.len() as u64);
        assert_eq!(archive.content(1), &a[..]);
        assert_eq!(members[2].kind, FileKind::Unknown);
        assert_eq!(archive.content(2), b"odd");
        assert_eq!(archive.cputype(), Some((CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL)));
        assert!(archive.diagnostics().is_empty());
        assert_eq!(archive.toc(), &TocStatus::Absent);
    }

    #[test]
    fn test_sysv_string_table() {
        let table = b"first_long_name.o/\nsecond_long_name.o/\n";
        let data = build_archive(&[
            RawMember::plain("// ", table),
            RawMember::plain("/0", b"aa"),
            RawMember::plain("/19", b"bb"),
        ]);
        let archive = Archive::parse(&data, &Detector::default(), "libs.a").unwrap();
        assert_eq!(archive.members()[0].role, MemberRole::StringTable);
        assert_eq!(archive.members()[1].name, "first_long_name.o");
        assert_eq!(archive.members()[2].name, "second_long_name.o");
        assert_eq!(archive.first(), Some(1));
        assert_eq!(archive.next_after(Some(1)), Some(2));
        assert_eq!(archive.next_after(Some(2)), None);
        assert_eq!(archive.find("second_long_name.o"), Some(2));
    }

    #[test]
    fn test_truncated_member_is_clamped() {
        let mut data = build_archive(&[RawMember::plain("big.o", &[7u8; 100])]);
        data.truncate(data.len() - 40);
        let archive = Archive::parse(&data, &Detector::default(), "libt.a").unwrap();
        let member = &archive.members()[0];
        assert!(member.truncated);
        assert_eq!(member.content_size, 60);
        assert_eq!(archive.diagnostics().len(), 1);
    }

    #[test]
    fn test_duplicate_toc_is_absent() {
        let data = build_archive(&[
            RawMember::plain("__.SYMDEF", &[0u8; 8]),
            RawMember::plain("__.SYMDEF", &[0u8; 8]),
            RawMember::plain("x.o", b"xx"),
        ]);
        let archive = Archive::parse(&data, &Detector::default(), "libd.a").unwrap();
        assert_eq!(archive.toc(), &TocStatus::Absent);
        assert!(archive.toc_member().is_none());
        assert_eq!(archive.regular().collect::<Vec<_>>(), vec![2]);
        assert_eq!(archive.diagnostics().len(), 1);
    }

    #[test]
    fn test_bad_toc_is_unusable_not_fatal() {
        let mut toc = Vec::new();
        toc.extend_from_slice(&8u32.to_le_bytes());
        toc.extend_from_slice(&99u32.to_le_bytes()); // strx past the pool
        toc.extend_from_slice(&8u32.to_le_bytes());
        toc.extend_from_slice(&4u32.to_le_bytes());
        toc.extend_from_slice(b"_f\0\0");
        let data = build_archive(&[RawMember::plain("__.SYMDEF", &toc), RawMember::plain("x.o", b"xx")]);
        let archive = Archive::parse(&data, &Detector::default(), "libb.a").unwrap();
        assert!(matches!(archive.toc(), TocStatus::Unusable(_)));
        assert_eq!(archive.first(), Some(1));
    }

    #[test]
    fn test_not_an_archive() {
        assert!(Archive::parse(b"!<arch>", &Detector::default(), "x").is_err());
    }
}
