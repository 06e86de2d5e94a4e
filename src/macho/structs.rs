//! Mach-O binary structures.
//!
//! These structures match the on-disk format of Mach-O files. They are
//! declared with native-endian integer fields; use [`crate::util::decode`]
//! with the image's byte sex to obtain host-endian values.

use std::fmt;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::util::{fixed_name, impl_swap};

// =============================================================================
// Header Structures
// =============================================================================

/// 32-bit Mach-O header.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct MachHeader {
    /// Magic number (MH_MAGIC)
    pub magic: u32,
    /// CPU type
    pub cputype: u32,
    /// CPU subtype
    pub cpusubtype: u32,
    /// File type
    pub filetype: u32,
    /// Number of load commands
    pub ncmds: u32,
    /// Size of load commands
    pub sizeofcmds: u32,
    /// Flags
    pub flags: u32,
}

impl MachHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = 28;
}

/// 64-bit Mach-O header.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct MachHeader64 {
    /// Magic number (MH_MAGIC_64)
    pub magic: u32,
    /// CPU type
    pub cputype: u32,
    /// CPU subtype
    pub cpusubtype: u32,
    /// File type
    pub filetype: u32,
    /// Number of load commands
    pub ncmds: u32,
    /// Size of load commands
    pub sizeofcmds: u32,
    /// Flags
    pub flags: u32,
    /// Reserved
    pub reserved: u32,
}

impl MachHeader64 {
    /// Size of the header in bytes.
    pub const SIZE: usize = 32;
}

impl_swap!(MachHeader { magic, cputype, cpusubtype, filetype, ncmds, sizeofcmds, flags });
impl_swap!(MachHeader64 { magic, cputype, cpusubtype, filetype, ncmds, sizeofcmds, flags, reserved });

// =============================================================================
// Load Command Header
// =============================================================================

/// Generic load command header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct LoadCommand {
    /// Type of load command
    pub cmd: u32,
    /// Size of load command
    pub cmdsize: u32,
}

impl LoadCommand {
    /// Size of the load command header.
    pub const SIZE: usize = 8;
}

impl_swap!(LoadCommand { cmd, cmdsize });

// =============================================================================
// Segments and Sections
// =============================================================================

/// 32-bit segment command.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct SegmentCommand {
    /// Load command type
    pub cmd: u32,
    /// Size of the command in bytes
    pub cmdsize: u32,
    /// Segment name
    pub segname: [u8; 16],
    /// Virtual memory address
    pub vmaddr: u32,
    /// Virtual memory size
    pub vmsize: u32,
    /// File offset of the segment
    pub fileoff: u32,
    /// Bytes mapped from the file
    pub filesize: u32,
    /// Maximum VM protection
    pub maxprot: u32,
    /// Initial VM protection
    pub initprot: u32,
    /// Number of sections
    pub nsects: u32,
    /// Segment flags
    pub flags: u32,
}

impl SegmentCommand {
    /// Size of the command without its sections.
    pub const SIZE: usize = 56;
}

/// 64-bit segment command.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct SegmentCommand64 {
    /// Load command type
    pub cmd: u32,
    /// Size of the command in bytes
    pub cmdsize: u32,
    /// Segment name
    pub segname: [u8; 16],
    /// Virtual memory address
    pub vmaddr: u64,
    /// Virtual memory size
    pub vmsize: u64,
    /// File offset of the segment
    pub fileoff: u64,
    /// Bytes mapped from the file
    pub filesize: u64,
    /// Maximum VM protection
    pub maxprot: u32,
    /// Initial VM protection
    pub initprot: u32,
    /// Number of sections
    pub nsects: u32,
    /// Segment flags
    pub flags: u32,
}

impl SegmentCommand64 {
    /// Size of the command without its sections.
    pub const SIZE: usize = 72;
}

/// 32-bit section.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct Section {
    /// Section name
    pub sectname: [u8; 16],
    /// Segment name
    pub segname: [u8; 16],
    /// Memory address of the section
    pub addr: u32,
    /// Size of the section in bytes
    pub size: u32,
    /// File offset of the section contents
    pub offset: u32,
    /// Alignment as a power of two
    pub align: u32,
    /// File offset of the relocation entries
    pub reloff: u32,
    /// Number of relocation entries
    pub nreloc: u32,
    /// Section type and attributes
    pub flags: u32,
    /// Reserved (for offset or index)
    pub reserved1: u32,
    /// Reserved (for count or sizeof)
    pub reserved2: u32,
}

impl Section {
    /// Size of the structure in bytes.
    pub const SIZE: usize = 68;
}

/// 64-bit section.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct Section64 {
    /// Section name
    pub sectname: [u8; 16],
    /// Segment name
    pub segname: [u8; 16],
    /// Memory address of the section
    pub addr: u64,
    /// Size of the section in bytes
    pub size: u64,
    /// File offset of the section contents
    pub offset: u32,
    /// Alignment as a power of two
    pub align: u32,
    /// File offset of the relocation entries
    pub reloff: u32,
    /// Number of relocation entries
    pub nreloc: u32,
    /// Section type and attributes
    pub flags: u32,
    /// Reserved (for offset or index)
    pub reserved1: u32,
    /// Reserved (for count or sizeof)
    pub reserved2: u32,
    /// Reserved
    pub reserved3: u32,
}

impl Section64 {
    /// Size of the structure in bytes.
    pub const SIZE: usize = 80;
}

impl_swap!(SegmentCommand { cmd, cmdsize, vmaddr, vmsize, fileoff, filesize, maxprot, initprot, nsects, flags });
impl_swap!(SegmentCommand64 { cmd, cmdsize, vmaddr, vmsize, fileoff, filesize, maxprot, initprot, nsects, flags });
impl_swap!(Section { addr, size, offset, align, reloff, nreloc, flags, reserved1, reserved2 });
impl_swap!(Section64 { addr, size, offset, align, reloff, nreloc, flags, reserved1, reserved2, reserved3 });

/// Width-independent view of a segment command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Segment name, NUL padding removed
    pub name: String,
    /// Virtual memory address
    pub vmaddr: u64,
    /// Virtual memory size
    pub vmsize: u64,
    /// File offset of the segment
    pub fileoff: u64,
    /// Bytes mapped from the file
    pub filesize: u64,
    /// Number of sections
    pub nsects: u32,
    /// Segment flags
    pub flags: u32,
}

impl From<&SegmentCommand> for Segment {
    fn from(seg: &SegmentCommand) -> Self {
        Self {
            name: fixed_name(&seg.segname),
            vmaddr: seg.vmaddr.into(),
            vmsize: seg.vmsize.into(),
            fileoff: seg.fileoff.into(),
            filesize: seg.filesize.into(),
            nsects: seg.nsects,
            flags: seg.flags,
        }
    }
}

impl From<&SegmentCommand64> for Segment {
    fn from(seg: &SegmentCommand64) -> Self {
        Self {
            name: fixed_name(&seg.segname),
            vmaddr: seg.vmaddr,
            vmsize: seg.vmsize,
            fileoff: seg.fileoff,
            filesize: seg.filesize,
            nsects: seg.nsects,
            flags: seg.flags,
        }
    }
}

/// Width-independent view of a section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionInfo {
    /// Section name, NUL padding removed
    pub sectname: String,
    /// Segment name, NUL padding removed
    pub segname: String,
    /// Memory address of the section
    pub addr: u64,
    /// Size of the section in bytes
    pub size: u64,
    /// File offset of the section contents
    pub offset: u32,
    /// Alignment as a power of two
    pub align: u32,
    /// File offset of the relocation entries
    pub reloff: u32,
    /// Number of relocation entries
    pub nreloc: u32,
    /// Section type and attributes
    pub flags: u32,
}

impl From<&Section> for SectionInfo {
    fn from(sect: &Section) -> Self {
        Self {
            sectname: fixed_name(&sect.sectname),
            segname: fixed_name(&sect.segname),
            addr: sect.addr.into(),
            size: sect.size.into(),
            offset: sect.offset,
            align: sect.align,
            reloff: sect.reloff,
            nreloc: sect.nreloc,
            flags: sect.flags,
        }
    }
}

impl From<&Section64> for SectionInfo {
    fn from(sect: &Section64) -> Self {
        Self {
            sectname: fixed_name(&sect.sectname),
            segname: fixed_name(&sect.segname),
            addr: sect.addr,
            size: sect.size,
            offset: sect.offset,
            align: sect.align,
            reloff: sect.reloff,
            nreloc: sect.nreloc,
            flags: sect.flags,
        }
    }
}

impl fmt::Display for SectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.segname, self.sectname)
    }
}

// =============================================================================
// Symbol Tables
// =============================================================================

/// Symbol table command.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct SymtabCommand {
    /// LC_SYMTAB
    pub cmd: u32,
    /// Size of the command in bytes
    pub cmdsize: u32,
    /// Symbol table offset
    pub symoff: u32,
    /// Number of symbols
    pub nsyms: u32,
    /// String table offset
    pub stroff: u32,
    /// String table size
    pub strsize: u32,
}

impl SymtabCommand {
    /// Size of the structure in bytes.
    pub const SIZE: usize = 24;
}

/// Dynamic symbol table command.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct DysymtabCommand {
    /// LC_DYSYMTAB
    pub cmd: u32,
    /// Size of the command in bytes
    pub cmdsize: u32,
    /// Index of the first local symbol
    pub ilocalsym: u32,
    /// Number of local symbols
    pub nlocalsym: u32,
    /// Index of the first externally defined symbol
    pub iextdefsym: u32,
    /// Number of externally defined symbols
    pub nextdefsym: u32,
    /// Index of the first undefined symbol
    pub iundefsym: u32,
    /// Number of undefined symbols
    pub nundefsym: u32,
    /// File offset of the table of contents
    pub tocoff: u32,
    /// Number of table of contents entries
    pub ntoc: u32,
    /// File offset of the module table
    pub modtaboff: u32,
    /// Number of module table entries
    pub nmodtab: u32,
    /// File offset of the referenced symbol table
    pub extrefsymoff: u32,
    /// Number of referenced symbol table entries
    pub nextrefsyms: u32,
    /// File offset of the indirect symbol table
    pub indirectsymoff: u32,
    /// Number of indirect symbol table entries
    pub nindirectsyms: u32,
    /// File offset of the external relocation entries
    pub extreloff: u32,
    /// Number of external relocation entries
    pub nextrel: u32,
    /// File offset of the local relocation entries
    pub locreloff: u32,
    /// Number of local relocation entries
    pub nlocrel: u32,
}

impl DysymtabCommand {
    /// Size of the structure in bytes.
    pub const SIZE: usize = 80;
}

/// 32-bit symbol table entry.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct Nlist {
    /// Index into the string table
    pub n_strx: u32,
    /// Type flag (N_STAB, N_PEXT, N_TYPE, N_EXT bits)
    pub n_type: u8,
    /// Section number or NO_SECT
    pub n_sect: u8,
    /// Descriptor flags
    pub n_desc: u16,
    /// Value of the symbol (or stab offset)
    pub n_value: u32,
}

impl Nlist {
    /// Size of the structure in bytes.
    pub const SIZE: usize = 12;
}

/// 64-bit symbol table entry.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct Nlist64 {
    /// Index into the string table
    pub n_strx: u32,
    /// Type flag (N_STAB, N_PEXT, N_TYPE, N_EXT bits)
    pub n_type: u8,
    /// Section number or NO_SECT
    pub n_sect: u8,
    /// Descriptor flags
    pub n_desc: u16,
    /// Value of the symbol (or stab offset)
    pub n_value: u64,
}

impl Nlist64 {
    /// Size of the structure in bytes.
    pub const SIZE: usize = 16;
}

impl_swap!(SymtabCommand { cmd, cmdsize, symoff, nsyms, stroff, strsize });
impl_swap!(DysymtabCommand {
    cmd, cmdsize, ilocalsym, nlocalsym, iextdefsym, nextdefsym, iundefsym, nundefsym,
    tocoff, ntoc, modtaboff, nmodtab, extrefsymoff, nextrefsyms, indirectsymoff,
    nindirectsyms, extreloff, nextrel, locreloff, nlocrel,
});
impl_swap!(Nlist { n_strx, n_desc, n_value });
impl_swap!(Nlist64 { n_strx, n_desc, n_value });

/// Width-independent symbol table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    /// Index into the string table
    pub n_strx: u32,
    /// Type flag (N_STAB, N_PEXT, N_TYPE, N_EXT bits)
    pub n_type: u8,
    /// Section number or NO_SECT
    pub n_sect: u8,
    /// Descriptor flags
    pub n_desc: u16,
    /// Value of the symbol (or stab offset)
    pub n_value: u64,
}

impl From<Nlist> for Symbol {
    fn from(n: Nlist) -> Self {
        Self {
            n_strx: n.n_strx,
            n_type: n.n_type,
            n_sect: n.n_sect,
            n_desc: n.n_desc,
            n_value: n.n_value.into(),
        }
    }
}

impl From<Nlist64> for Symbol {
    fn from(n: Nlist64) -> Self {
        Self {
            n_strx: n.n_strx,
            n_type: n.n_type,
            n_sect: n.n_sect,
            n_desc: n.n_desc,
            n_value: n.n_value,
        }
    }
}

// Sizes of dysymtab-referenced records.
/// Size of a dylib table of contents entry.
pub const DYLIB_TABLE_OF_CONTENTS_SIZE: u64 = 8;
/// Size of a 32-bit module table entry.
pub const DYLIB_MODULE_SIZE: u64 = 52;
/// Size of a 64-bit module table entry.
pub const DYLIB_MODULE_64_SIZE: u64 = 56;
/// Size of a referenced symbol entry.
pub const DYLIB_REFERENCE_SIZE: u64 = 4;
/// Size of an indirect symbol table entry.
pub const INDIRECT_SYMBOL_SIZE: u64 = 4;
/// Size of a relocation entry.
pub const RELOCATION_INFO_SIZE: u64 = 8;
/// Size of a two-level namespace hint.
pub const TWOLEVEL_HINT_SIZE: u64 = 4;

// =============================================================================
// Linkedit Commands
// =============================================================================

/// Command pointing at a blob in __LINKEDIT (code signature, function starts, ...).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct LinkeditDataCommand {
    /// Load command type
    pub cmd: u32,
    /// Size of the command in bytes
    pub cmdsize: u32,
    /// File offset of the data in __LINKEDIT
    pub dataoff: u32,
    /// Size of the data in __LINKEDIT
    pub datasize: u32,
}

impl LinkeditDataCommand {
    /// Size of the structure in bytes.
    pub const SIZE: usize = 16;
}

/// Compressed dyld information.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct DyldInfoCommand {
    /// Load command type
    pub cmd: u32,
    /// Size of the command in bytes
    pub cmdsize: u32,
    /// File offset of the rebase info
    pub rebase_off: u32,
    /// Size of the rebase info
    pub rebase_size: u32,
    /// File offset of the binding info
    pub bind_off: u32,
    /// Size of the binding info
    pub bind_size: u32,
    /// File offset of the weak binding info
    pub weak_bind_off: u32,
    /// Size of the weak binding info
    pub weak_bind_size: u32,
    /// File offset of the lazy binding info
    pub lazy_bind_off: u32,
    /// Size of the lazy binding info
    pub lazy_bind_size: u32,
    /// File offset of the export trie
    pub export_off: u32,
    /// Size of the export trie
    pub export_size: u32,
}

impl DyldInfoCommand {
    /// Size of the structure in bytes.
    pub const SIZE: usize = 48;
}

/// Two-level namespace hints.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct TwolevelHintsCommand {
    /// Load command type
    pub cmd: u32,
    /// Size of the command in bytes
    pub cmdsize: u32,
    /// File offset of the hint table
    pub offset: u32,
    /// Number of hints
    pub nhints: u32,
}

impl TwolevelHintsCommand {
    /// Size of the structure in bytes.
    pub const SIZE: usize = 16;
}

/// 32-bit encryption info.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct EncryptionInfoCommand {
    /// Load command type
    pub cmd: u32,
    /// Size of the command in bytes
    pub cmdsize: u32,
    /// File offset of the encrypted range
    pub cryptoff: u32,
    /// Size of the encrypted range
    pub cryptsize: u32,
    /// Encryption system, 0 when not encrypted
    pub cryptid: u32,
}

impl EncryptionInfoCommand {
    /// Size of the structure in bytes.
    pub const SIZE: usize = 20;
}

/// 64-bit encryption info.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct EncryptionInfoCommand64 {
    /// Load command type
    pub cmd: u32,
    /// Size of the command in bytes
    pub cmdsize: u32,
    /// File offset of the encrypted range
    pub cryptoff: u32,
    /// Size of the encrypted range
    pub cryptsize: u32,
    /// Encryption system, 0 when not encrypted
    pub cryptid: u32,
    /// Padding to a multiple of 8
    pub pad: u32,
}

impl EncryptionInfoCommand64 {
    /// Size of the structure in bytes.
    pub const SIZE: usize = 24;
}

impl_swap!(LinkeditDataCommand { cmd, cmdsize, dataoff, datasize });
impl_swap!(DyldInfoCommand {
    cmd, cmdsize, rebase_off, rebase_size, bind_off, bind_size, weak_bind_off,
    weak_bind_size, lazy_bind_off, lazy_bind_size, export_off, export_size,
});
impl_swap!(TwolevelHintsCommand { cmd, cmdsize, offset, nhints });
impl_swap!(EncryptionInfoCommand { cmd, cmdsize, cryptoff, cryptsize, cryptid });
impl_swap!(EncryptionInfoCommand64 { cmd, cmdsize, cryptoff, cryptsize, cryptid, pad });

// =============================================================================
// String-Carrying Commands
// =============================================================================

/// Dylib load/id command.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct DylibCommand {
    /// Load command type
    pub cmd: u32,
    /// Size of the command in bytes
    pub cmdsize: u32,
    /// Offset of the install name from the start of the command
    pub name_offset: u32,
    /// Library build time stamp
    pub timestamp: u32,
    /// Library current version
    pub current_version: u32,
    /// Library compatibility version
    pub compatibility_version: u32,
}

impl DylibCommand {
    /// Size of the structure in bytes.
    pub const SIZE: usize = 24;
}

/// Any command whose body is a single string offset: dylinker, sub_framework,
/// sub_umbrella, sub_client, sub_library, rpath, dyld environment.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct StrCommand {
    /// Load command type
    pub cmd: u32,
    /// Size of the command in bytes
    pub cmdsize: u32,
    /// Offset of the string from the start of the command
    pub offset: u32,
}

impl StrCommand {
    /// Size of the structure in bytes.
    pub const SIZE: usize = 12;
}

/// Prebound dylib.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct PreboundDylibCommand {
    /// Load command type
    pub cmd: u32,
    /// Size of the command in bytes
    pub cmdsize: u32,
    /// Offset of the library name from the start of the command
    pub name: u32,
    /// Number of modules in the library
    pub nmodules: u32,
    /// Bit vector of linked modules (string offset)
    pub linked_modules: u32,
}

impl PreboundDylibCommand {
    /// Size of the structure in bytes.
    pub const SIZE: usize = 20;
}

/// Fileset entry.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct FilesetEntryCommand {
    /// Load command type
    pub cmd: u32,
    /// Size of the command in bytes
    pub cmdsize: u32,
    /// Memory address of the entry
    pub vmaddr: u64,
    /// File offset of the entry
    pub fileoff: u64,
    /// Offset of the entry id string
    pub entry_id: u32,
    /// Reserved
    pub reserved: u32,
}

impl FilesetEntryCommand {
    /// Size of the structure in bytes.
    pub const SIZE: usize = 32;
}

/// Linker option strings.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct LinkerOptionCommand {
    /// Load command type
    pub cmd: u32,
    /// Size of the command in bytes
    pub cmdsize: u32,
    /// Number of strings following the command
    pub count: u32,
}

impl LinkerOptionCommand {
    /// Size of the structure in bytes.
    pub const SIZE: usize = 12;
}

impl_swap!(DylibCommand { cmd, cmdsize, name_offset, timestamp, current_version, compatibility_version });
impl_swap!(StrCommand { cmd, cmdsize, offset });
impl_swap!(PreboundDylibCommand { cmd, cmdsize, name, nmodules, linked_modules });
impl_swap!(FilesetEntryCommand { cmd, cmdsize, vmaddr, fileoff, entry_id, reserved });
impl_swap!(LinkerOptionCommand { cmd, cmdsize, count });

// =============================================================================
// Fixed-Size Commands
// =============================================================================

/// 32-bit initialization routine.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct RoutinesCommand {
    /// Load command type
    pub cmd: u32,
    /// Size of the command in bytes
    pub cmdsize: u32,
    /// Address of the initialization routine
    pub init_address: u32,
    /// Index of the module holding the routine
    pub init_module: u32,
    /// Reserved
    pub reserved: [u32; 6],
}

impl RoutinesCommand {
    /// Size of the structure in bytes.
    pub const SIZE: usize = 40;
}

/// 64-bit initialization routine.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct RoutinesCommand64 {
    /// Load command type
    pub cmd: u32,
    /// Size of the command in bytes
    pub cmdsize: u32,
    /// Address of the initialization routine
    pub init_address: u64,
    /// Index of the module holding the routine
    pub init_module: u64,
    /// Reserved
    pub reserved: [u64; 6],
}

impl RoutinesCommand64 {
    /// Size of the structure in bytes.
    pub const SIZE: usize = 72;
}

/// Prebind checksum.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct PrebindCksumCommand {
    /// Load command type
    pub cmd: u32,
    /// Size of the command in bytes
    pub cmdsize: u32,
    /// Checksum or zero
    pub cksum: u32,
}

impl PrebindCksumCommand {
    /// Size of the structure in bytes.
    pub const SIZE: usize = 12;
}

/// UUID command.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct UuidCommand {
    /// Load command type
    pub cmd: u32,
    /// Size of the command in bytes
    pub cmdsize: u32,
    /// 128-bit UUID
    pub uuid: [u8; 16],
}

impl UuidCommand {
    /// Size of the structure in bytes.
    pub const SIZE: usize = 24;
}

/// Minimum OS version (macOS, iOS, tvOS, watchOS variants).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct VersionMinCommand {
    /// Load command type
    pub cmd: u32,
    /// Size of the command in bytes
    pub cmdsize: u32,
    /// Minimum OS version (X.Y.Z packed in nibbles)
    pub version: u32,
    /// SDK version (X.Y.Z packed in nibbles)
    pub sdk: u32,
}

impl VersionMinCommand {
    /// Size of the structure in bytes.
    pub const SIZE: usize = 16;
}

/// Build version; followed by `ntools` tool entries of 8 bytes each.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct BuildVersionCommand {
    /// Load command type
    pub cmd: u32,
    /// Size of the command in bytes
    pub cmdsize: u32,
    /// Platform identifier
    pub platform: u32,
    /// Minimum OS version (X.Y.Z packed in nibbles)
    pub minos: u32,
    /// SDK version (X.Y.Z packed in nibbles)
    pub sdk: u32,
    /// Number of tool entries following the command
    pub ntools: u32,
}

impl BuildVersionCommand {
    /// Size of the structure in bytes.
    pub const SIZE: usize = 24;
    /// Size of one trailing tool entry.
    pub const TOOL_SIZE: usize = 8;
}

/// Source version.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct SourceVersionCommand {
    /// Load command type
    pub cmd: u32,
    /// Size of the command in bytes
    pub cmdsize: u32,
    /// A.B.C.D.E packed as a24.b10.c10.d10.e10
    pub version: u64,
}

impl SourceVersionCommand {
    /// Size of the structure in bytes.
    pub const SIZE: usize = 16;
}

/// Main entry point.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct EntryPointCommand {
    /// Load command type
    pub cmd: u32,
    /// Size of the command in bytes
    pub cmdsize: u32,
    /// File offset of main()
    pub entryoff: u64,
    /// Initial stack size, if not zero
    pub stacksize: u64,
}

impl EntryPointCommand {
    /// Size of the structure in bytes.
    pub const SIZE: usize = 24;
}

/// Arbitrary data region.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct NoteCommand {
    /// Load command type
    pub cmd: u32,
    /// Size of the command in bytes
    pub cmdsize: u32,
    /// Owner name of the note
    pub data_owner: [u8; 16],
    /// File offset of the note data
    pub offset: u64,
    /// Size of the note data
    pub size: u64,
}

impl NoteCommand {
    /// Size of the structure in bytes.
    pub const SIZE: usize = 40;
}

impl_swap!(RoutinesCommand { cmd, cmdsize, init_address, init_module });
impl_swap!(RoutinesCommand64 { cmd, cmdsize, init_address, init_module });
impl_swap!(PrebindCksumCommand { cmd, cmdsize, cksum });
impl_swap!(UuidCommand { cmd, cmdsize });
impl_swap!(VersionMinCommand { cmd, cmdsize, version, sdk });
impl_swap!(BuildVersionCommand { cmd, cmdsize, platform, minos, sdk, ntools });
impl_swap!(SourceVersionCommand { cmd, cmdsize, version });
impl_swap!(EntryPointCommand { cmd, cmdsize, entryoff, stacksize });
impl_swap!(NoteCommand { cmd, cmdsize, offset, size });

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_struct_sizes() {
        assert_eq!(std::mem::size_of::<MachHeader>(), MachHeader::SIZE);
        assert_eq!(std::mem::size_of::<MachHeader64>(), MachHeader64::SIZE);
        assert_eq!(std::mem::size_of::<SegmentCommand>(), SegmentCommand::SIZE);
        assert_eq!(std::mem::size_of::<SegmentCommand64>(), SegmentCommand64::SIZE);
        assert_eq!(std::mem::size_of::<Section>(), Section::SIZE);
        assert_eq!(std::mem::size_of::<Section64>(), Section64::SIZE);
        assert_eq!(std::mem::size_of::<SymtabCommand>(), SymtabCommand::SIZE);
        assert_eq!(std::mem::size_of::<DysymtabCommand>(), DysymtabCommand::SIZE);
        assert_eq!(std::mem::size_of::<Nlist>(), Nlist::SIZE);
        assert_eq!(std::mem::size_of::<Nlist64>(), Nlist64::SIZE);
        assert_eq!(std::mem::size_of::<DyldInfoCommand>(), DyldInfoCommand::SIZE);
        assert_eq!(std::mem::size_of::<RoutinesCommand>(), RoutinesCommand::SIZE);
        assert_eq!(std::mem::size_of::<RoutinesCommand64>(), RoutinesCommand64::SIZE);
        assert_eq!(std::mem::size_of::<NoteCommand>(), NoteCommand::SIZE);
        assert_eq!(std::mem::size_of::<FilesetEntryCommand>(), FilesetEntryCommand::SIZE);
        assert_eq!(std::mem::size_of::<EncryptionInfoCommand64>(), EncryptionInfoCommand64::SIZE);
    }

    #[test]
    fn test_nlist_swap_leaves_single_bytes() {
        use crate::util::Swap;
        let n = Nlist { n_strx: 1, n_type: 0x0f, n_sect: 2, n_desc: 0x0100, n_value: 0x10 };
        let s = n.swap_bytes();
        assert_eq!(s.n_strx, 0x0100_0000);
        assert_eq!(s.n_type, 0x0f);
        assert_eq!(s.n_sect, 2);
        assert_eq!(s.n_desc, 0x0001);
    }
}
