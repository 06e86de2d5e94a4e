//! Editable output tree built from a positioned container.
//!
//! The tree owns copies of every slice and member it holds, so it outlives
//! the containers it was broken out of and can be rearranged (thinned,
//! joined) before being handed to the [`Writer`](super::Writer).

use tracing::debug;

use crate::arch::{ArchFlag, ArchMatch};
use crate::container::{FileKind, Ofile};
use crate::error::{Error, Result};
use crate::macho::{ObjectHeader, CPU_SUBTYPE_MASK};
use crate::util::ByteSex;

/// A Mach-O image with its header decoded to host byte order.
///
/// The header is re-encoded in `byte_sex` when written, so edits to it take
/// effect without touching `data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputObject {
    /// Decoded header, re-encoded on write
    pub header: ObjectHeader,
    /// Byte sex of the image
    pub byte_sex: ByteSex,
    /// Image bytes
    pub data: Vec<u8>,
}

impl OutputObject {
    /// Decodes the header of `data`.
    pub fn parse(data: Vec<u8>) -> Result<Self> {
        let (header, byte_sex) = ObjectHeader::parse(&data)?;
        Ok(Self { header, byte_sex, data })
    }
}

/// One archive member of the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputMember {
    /// Member name
    pub name: String,
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
    /// Member content, unpadded
    pub data: Vec<u8>,
}

impl OutputMember {
    /// A member with default ownership and mode.
    pub fn new(name: impl Into<String>, kind: FileKind, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            date: 0,
            uid: 0,
            gid: 0,
            mode: 0o100644,
            kind,
            data,
        }
    }
}

/// What a slice of the output holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputContent {
    /// A single Mach-O image.
    Object(OutputObject),
    /// Members in link order; the table of contents is always rebuilt.
    Archive(Vec<OutputMember>),
    /// Bytes copied through unchanged.
    Raw(Vec<u8>),
}

/// One architecture of the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArch {
    /// CPU type
    pub cputype: u32,
    /// CPU subtype
    pub cpusubtype: u32,
    /// Alignment of the slice in a fat file, as a power of two
    pub align: u32,
    /// What the slice holds
    pub content: OutputContent,
}

impl OutputArch {
    /// Name of this architecture.
    pub fn arch_name(&self) -> String {
        ArchFlag::display_name(self.cputype, self.cpusubtype)
    }

    /// (cputype, cpusubtype-without-capability-bits), as in a fat table.
    fn identity(&self) -> (u32, u32) {
        (self.cputype, self.cpusubtype & !CPU_SUBTYPE_MASK)
    }
}

/// A file to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    /// Name used in messages
    pub name: String,
    /// Emit a fat header even for a single architecture
    pub fat: bool,
    /// Use 64-bit fat slice entries
    pub fat_64: bool,
    /// Architectures in output order
    pub archs: Vec<OutputArch>,
}

impl OutputFile {
    /// Keeps only the architecture matching `flag`, as a thin file.
    pub fn thin(mut self, flag: &ArchFlag) -> Result<Self> {
        let position = |wanted: ArchMatch| {
            self.archs
                .iter()
                .position(|a| flag.matches(a.cputype, a.cpusubtype) == wanted)
        };
        let index = position(ArchMatch::Exact)
            .or_else(|| position(ArchMatch::Family))
            .ok_or_else(|| Error::ArchNotFound {
                file: self.name.clone(),
                arch: flag.name.to_string(),
            })?;
        let arch = self.archs.swap_remove(index);
        Ok(Self {
            name: self.name,
            fat: false,
            fat_64: false,
            archs: vec![arch],
        })
    }

    /// Combines the architectures of `files` into one fat file.
    pub fn join(name: impl Into<String>, files: Vec<OutputFile>) -> Result<Self> {
        let mut archs: Vec<OutputArch> = Vec::new();
        let mut fat_64 = false;
        for file in files {
            fat_64 |= file.fat_64;
            for arch in file.archs {
                if archs.iter().any(|a| a.identity() == arch.identity()) {
                    return Err(Error::DuplicateArch {
                        arch: arch.arch_name(),
                    });
                }
                archs.push(arch);
            }
        }
        Ok(Self {
            name: name.into(),
            fat: true,
            fat_64,
            archs,
        })
    }
}

/// Copies every slice and archive member reachable from `ofile` into an
/// output tree. The cursor is left past its last position.
pub fn breakout(ofile: &mut Ofile<'_>) -> Result<OutputFile> {
    let name = ofile.container().name().to_string();
    let mut file = OutputFile {
        name,
        fat: false,
        fat_64: false,
        archs: Vec::new(),
    };

    if let Some(is_64) = ofile.fat().map(|table| table.is_64) {
        file.fat = true;
        file.fat_64 = is_64;
        let mut next = ofile.first_arch()?;
        while let Some(view) = next {
            let Some(slice) = view.slice else {
                return Err(Error::internal("fat navigator returned a slice without a table entry"));
            };
            let content = breakout_content(ofile, view.data, view.kind)?;
            file.archs.push(OutputArch {
                cputype: slice.cputype,
                cpusubtype: slice.cpusubtype,
                align: slice.align,
                content,
            });
            next = ofile.next_arch()?;
        }
    } else {
        let view = *ofile.slice();
        let (cputype, cpusubtype) = ofile.cputype().unwrap_or((0, 0));
        let content = breakout_content(ofile, view.data, view.kind)?;
        file.archs.push(OutputArch {
            cputype,
            cpusubtype,
            align: ArchFlag::segalign_of(cputype),
            content,
        });
    }

    debug!("{}: broke out {} architecture(s)", file.name, file.archs.len());
    Ok(file)
}

fn breakout_content(ofile: &mut Ofile<'_>, data: &[u8], kind: FileKind) -> Result<OutputContent> {
    match kind {
        FileKind::Archive => {
            let mut members = Vec::new();
            let mut next = ofile.first_member()?;
            while let Some(view) = next {
                let member = &view.member;
                members.push(OutputMember {
                    name: member.name.clone(),
                    date: member.date,
                    uid: member.uid,
                    gid: member.gid,
                    mode: member.mode,
                    kind: view.kind,
                    data: view.data.to_vec(),
                });
                next = ofile.next_member()?;
            }
            Ok(OutputContent::Archive(members))
        }
        FileKind::MachObject => Ok(OutputContent::Object(OutputObject::parse(data.to_vec())?)),
        _ => Ok(OutputContent::Raw(data.to_vec())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{build_archive, RawMember};
    use crate::container::{Container, Detector};
    use crate::fat::build_fat;
    use crate::macho::*;

    fn object(cputype: u32, cpusubtype: u32) -> Vec<u8> {
        build_object(ByteSex::Little, true, cputype, cpusubtype, &[("_f", N_SECT | N_EXT, 1, 0)])
    }

    #[test]
    fn test_breakout_fat_of_archive_and_object() {
        let x = object(CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL);
        let lib = build_archive(&[RawMember::extended("x.o", &x), RawMember::plain("y.o", &x)]);
        let a = object(CPU_TYPE_ARM64, CPU_SUBTYPE_ARM64_ALL);
        let data = build_fat(false, &[(CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL, 12, &lib), (CPU_TYPE_ARM64, CPU_SUBTYPE_ARM64_ALL, 14, &a)]);
        let container = Container::from_bytes("u", data, &Detector::default());
        let mut ofile = Ofile::new(&container, Detector::default()).unwrap();
        let file = breakout(&mut ofile).unwrap();

        assert!(file.fat);
        assert_eq!(file.archs.len(), 2);
        match &file.archs[0].content {
            OutputContent::Archive(members) => {
                let names: Vec<_> = members.iter().map(|m| m.name.as_str()).collect();
                assert_eq!(names, ["x.o", "y.o"]);
                assert_eq!(members[0].data, x);
                assert_eq!(members[1].mode, 0o100644);
            }
            other => panic!("unexpected content {other:?}"),
        }
        match &file.archs[1].content {
            OutputContent::Object(obj) => assert_eq!(obj.header.cputype, CPU_TYPE_ARM64),
            other => panic!("unexpected content {other:?}"),
        }
    }

    #[test]
    fn test_thin_and_join() {
        let x = object(CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL);
        let a = object(CPU_TYPE_ARM64, CPU_SUBTYPE_ARM64_ALL);
        let data = build_fat(false, &[(CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL, 12, &x), (CPU_TYPE_ARM64, CPU_SUBTYPE_ARM64_ALL, 14, &a)]);
        let container = Container::from_bytes("u", data, &Detector::default());
        let mut ofile = Ofile::new(&container, Detector::default()).unwrap();
        let file = breakout(&mut ofile).unwrap();

        let arm64 = ArchFlag::parse("arm64").unwrap();
        let thin = file.clone().thin(&arm64).unwrap();
        assert!(!thin.fat);
        assert_eq!(thin.archs.len(), 1);
        assert_eq!(thin.archs[0].cputype, CPU_TYPE_ARM64);

        let i386 = ArchFlag::parse("i386").unwrap();
        assert!(matches!(file.clone().thin(&i386), Err(Error::ArchNotFound { .. })));

        let x86 = file.clone().thin(&ArchFlag::parse("x86_64").unwrap()).unwrap();
        let joined = OutputFile::join("j", vec![x86.clone(), thin]).unwrap();
        assert!(joined.fat);
        assert_eq!(joined.archs.len(), 2);

        let err = OutputFile::join("j", vec![x86.clone(), x86]).unwrap_err();
        assert!(matches!(err, Error::DuplicateArch { .. }));
    }
}
