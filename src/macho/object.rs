//! Read-only, host-endian view of a single Mach-O image.
//!
//! [`MachObject`] borrows the image bytes from the container that owns them
//! and decodes header and load command fields on demand through the image's
//! declared byte sex. Nothing here checks that offsets are sensible; run the
//! validator first when the input is untrusted.

use std::fmt;

use super::constants::*;
use super::structs::*;
use crate::arch::ArchFlag;
use crate::error::{Error, Result};
use crate::util::{c_str_at, decode, encode_into, ByteSex};

// =============================================================================
// Header
// =============================================================================

/// A Mach-O header decoded to host byte order, for either word width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectHeader {
    /// Canonical magic (`MH_MAGIC` or `MH_MAGIC_64`)
    pub magic: u32,
    /// CPU type
    pub cputype: u32,
    /// CPU subtype
    pub cpusubtype: u32,
    /// File type (MH_OBJECT, MH_EXECUTE, ...)
    pub filetype: u32,
    /// Number of load commands
    pub ncmds: u32,
    /// Size of all load commands
    pub sizeofcmds: u32,
    /// Header flags, see [`MachOFlags`]
    pub flags: u32,
    /// Only present in 64-bit headers
    pub reserved: u32,
}

/// Recognizes a Mach-O magic number and returns (is_64, byte sex).
pub fn object_magic(data: &[u8]) -> Option<(bool, ByteSex)> {
    let magic = ByteSex::Big.read_u32_at(data, 0)?;
    match magic {
        MH_MAGIC => Some((false, ByteSex::Big)),
        MH_CIGAM => Some((false, ByteSex::Little)),
        MH_MAGIC_64 => Some((true, ByteSex::Big)),
        MH_CIGAM_64 => Some((true, ByteSex::Little)),
        _ => None,
    }
}

impl ObjectHeader {
    /// Decodes the header at the start of `data`.
    pub fn parse(data: &[u8]) -> Result<(Self, ByteSex)> {
        let (is_64, sex) =
            object_magic(data).ok_or_else(|| Error::object("bad magic number"))?;
        let header = if is_64 {
            if data.len() < MachHeader64::SIZE {
                return Err(Error::object("file size too small for mach_header_64"));
            }
            let h: MachHeader64 = decode(data, 0, sex)?;
            Self {
                magic: h.magic,
                cputype: h.cputype,
                cpusubtype: h.cpusubtype,
                filetype: h.filetype,
                ncmds: h.ncmds,
                sizeofcmds: h.sizeofcmds,
                flags: h.flags,
                reserved: h.reserved,
            }
        } else {
            if data.len() < MachHeader::SIZE {
                return Err(Error::object("file size too small for mach_header"));
            }
            let h: MachHeader = decode(data, 0, sex)?;
            Self {
                magic: h.magic,
                cputype: h.cputype,
                cpusubtype: h.cpusubtype,
                filetype: h.filetype,
                ncmds: h.ncmds,
                sizeofcmds: h.sizeofcmds,
                flags: h.flags,
                reserved: 0,
            }
        };
        Ok((header, sex))
    }

    /// Returns true for a 64-bit header.
    #[inline]
    pub fn is_64(&self) -> bool {
        self.magic == MH_MAGIC_64
    }

    /// Size of the header itself.
    #[inline]
    pub fn size(&self) -> usize {
        if self.is_64() {
            MachHeader64::SIZE
        } else {
            MachHeader::SIZE
        }
    }

    /// Load command sizes must be a multiple of this.
    #[inline]
    pub fn pointer_align(&self) -> u32 {
        if self.is_64() {
            8
        } else {
            4
        }
    }

    /// Header flags.
    pub fn flags(&self) -> MachOFlags {
        MachOFlags::from_bits_retain(self.flags)
    }

    /// Writes this header into the start of `out` in byte sex `sex`.
    pub fn encode_into(&self, sex: ByteSex, out: &mut [u8]) -> Result<()> {
        if self.is_64() {
            let h = MachHeader64 {
                magic: self.magic,
                cputype: self.cputype,
                cpusubtype: self.cpusubtype,
                filetype: self.filetype,
                ncmds: self.ncmds,
                sizeofcmds: self.sizeofcmds,
                flags: self.flags,
                reserved: self.reserved,
            };
            encode_into(&h, sex, out)
        } else {
            let h = MachHeader {
                magic: self.magic,
                cputype: self.cputype,
                cpusubtype: self.cpusubtype,
                filetype: self.filetype,
                ncmds: self.ncmds,
                sizeofcmds: self.sizeofcmds,
                flags: self.flags,
            };
            encode_into(&h, sex, out)
        }
    }

    /// Name of the architecture this header declares.
    pub fn arch_name(&self) -> String {
        ArchFlag::display_name(self.cputype, self.cpusubtype)
    }
}

impl fmt::Display for ObjectHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ncmds {} sizeofcmds {} flags {:#x}",
            self.arch_name(),
            filetype_name(self.filetype),
            self.ncmds,
            self.sizeofcmds,
            self.flags
        )
    }
}

// =============================================================================
// Load Commands
// =============================================================================

/// Location and tag of one load command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawLoadCommand {
    /// Position in the command table
    pub index: u32,
    /// Offset from the start of the image
    pub offset: usize,
    /// Load command type
    pub cmd: u32,
    /// Declared size in bytes
    pub cmdsize: u32,
}

/// Iterator over the load commands of an image.
///
/// Yields an error and stops when a command does not fit in `sizeofcmds`
/// or has a zero size.
pub struct LoadCommands<'a> {
    data: &'a [u8],
    sex: ByteSex,
    offset: usize,
    end: usize,
    index: u32,
    ncmds: u32,
    failed: bool,
}

impl Iterator for LoadCommands<'_> {
    type Item = Result<RawLoadCommand>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.index >= self.ncmds {
            return None;
        }
        let index = self.index;
        let offset = self.offset;
        if offset + LoadCommand::SIZE > self.end {
            self.failed = true;
            return Some(Err(Error::load_command(
                index,
                "extends past the end all load commands in the file",
            )));
        }
        let lc: LoadCommand = match decode(self.data, offset, self.sex) {
            Ok(lc) => lc,
            Err(e) => {
                self.failed = true;
                return Some(Err(e));
            }
        };
        if lc.cmdsize == 0 || offset + lc.cmdsize as usize > self.end {
            self.failed = true;
            return Some(Err(Error::load_command(index, "cmdsize invalid")));
        }
        self.offset += lc.cmdsize as usize;
        self.index += 1;
        Some(Ok(RawLoadCommand {
            index,
            offset,
            cmd: lc.cmd,
            cmdsize: lc.cmdsize,
        }))
    }
}

// =============================================================================
// Object View
// =============================================================================

/// A Mach-O image borrowed from its container.
#[derive(Debug, Clone, Copy)]
pub struct MachObject<'a> {
    data: &'a [u8],
    header: ObjectHeader,
    byte_sex: ByteSex,
}

impl<'a> MachObject<'a> {
    /// Decodes the header of the image in `data`.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let (header, byte_sex) = ObjectHeader::parse(data)?;
        Ok(Self {
            data,
            header,
            byte_sex,
        })
    }

    /// The image bytes.
    #[inline]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// The decoded header.
    #[inline]
    pub fn header(&self) -> &ObjectHeader {
        &self.header
    }

    /// Byte sex the image was written in.
    #[inline]
    pub fn byte_sex(&self) -> ByteSex {
        self.byte_sex
    }

    /// Returns true for a 64-bit image.
    #[inline]
    pub fn is_64(&self) -> bool {
        self.header.is_64()
    }

    /// Decodes a `T` at `offset` within the image.
    #[inline]
    pub fn read<T: zerocopy::FromBytes + crate::util::Swap>(&self, offset: usize) -> Result<T> {
        decode(self.data, offset, self.byte_sex)
    }

    /// Iterates the load commands.
    pub fn load_commands(&self) -> LoadCommands<'a> {
        let start = self.header.size();
        let end = (start + self.header.sizeofcmds as usize).min(self.data.len());
        LoadCommands {
            data: self.data,
            sex: self.byte_sex,
            offset: start,
            end,
            index: 0,
            ncmds: self.header.ncmds,
            failed: false,
        }
    }

    /// Decodes the body of a load command.
    pub fn command<T: zerocopy::FromBytes + crate::util::Swap>(&self, lc: &RawLoadCommand) -> Result<T> {
        if (lc.cmdsize as usize) < std::mem::size_of::<T>() {
            return Err(Error::load_command(lc.index, "cmdsize too small"));
        }
        self.read(lc.offset)
    }

    /// Returns the NUL-terminated string at `str_offset` inside a command.
    pub fn command_string(&self, lc: &RawLoadCommand, str_offset: u32) -> String {
        let end = (lc.offset + lc.cmdsize as usize).min(self.data.len());
        let body = &self.data[lc.offset.min(end)..end];
        String::from_utf8_lossy(c_str_at(body, str_offset as usize)).into_owned()
    }

    /// Returns every segment with its sections, in command order.
    pub fn segments(&self) -> Result<Vec<(Segment, Vec<SectionInfo>)>> {
        let mut segments = Vec::new();
        for lc in self.load_commands() {
            let lc = lc?;
            match lc.cmd {
                LC_SEGMENT => {
                    let seg: SegmentCommand = self.command(&lc)?;
                    let mut sections = Vec::with_capacity(seg.nsects as usize);
                    for i in 0..seg.nsects as usize {
                        let sect: Section =
                            self.read(lc.offset + SegmentCommand::SIZE + i * Section::SIZE)?;
                        sections.push(SectionInfo::from(&sect));
                    }
                    segments.push((Segment::from(&seg), sections));
                }
                LC_SEGMENT_64 => {
                    let seg: SegmentCommand64 = self.command(&lc)?;
                    let mut sections = Vec::with_capacity(seg.nsects as usize);
                    for i in 0..seg.nsects as usize {
                        let sect: Section64 =
                            self.read(lc.offset + SegmentCommand64::SIZE + i * Section64::SIZE)?;
                        sections.push(SectionInfo::from(&sect));
                    }
                    segments.push((Segment::from(&seg), sections));
                }
                _ => {}
            }
        }
        Ok(segments)
    }

    /// All sections in command order; `n_sect` of a symbol is a 1-based
    /// index into this list.
    pub fn sections(&self) -> Result<Vec<SectionInfo>> {
        Ok(self
            .segments()?
            .into_iter()
            .flat_map(|(_, sections)| sections)
            .collect())
    }

    /// The first LC_SYMTAB command, if any.
    pub fn symtab(&self) -> Result<Option<SymtabCommand>> {
        for lc in self.load_commands() {
            let lc = lc?;
            if lc.cmd == LC_SYMTAB {
                return self.command(&lc).map(Some);
            }
        }
        Ok(None)
    }

    /// The string table described by `symtab`.
    pub fn string_table(&self, symtab: &SymtabCommand) -> Result<&'a [u8]> {
        let start = symtab.stroff as usize;
        let end = start
            .checked_add(symtab.strsize as usize)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| Error::object("string table extends past the end of the file"))?;
        Ok(&self.data[start..end])
    }

    /// Decodes the symbol table described by `symtab`.
    pub fn symbols(&self, symtab: &SymtabCommand) -> Result<Vec<Symbol>> {
        let entry = if self.is_64() { Nlist64::SIZE } else { Nlist::SIZE };
        let total = (symtab.nsyms as usize)
            .checked_mul(entry)
            .and_then(|n| n.checked_add(symtab.symoff as usize))
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| Error::object("symbol table extends past the end of the file"))?;
        debug_assert!(total <= self.data.len());

        let mut symbols = Vec::with_capacity(symtab.nsyms as usize);
        for i in 0..symtab.nsyms as usize {
            let offset = symtab.symoff as usize + i * entry;
            let symbol = if self.is_64() {
                Symbol::from(self.read::<Nlist64>(offset)?)
            } else {
                Symbol::from(self.read::<Nlist>(offset)?)
            };
            symbols.push(symbol);
        }
        Ok(symbols)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::util::encode;

    /// Builds a small relocatable object with one `__TEXT,__text` section
    /// and a symbol table containing `symbols` (name, n_type, n_sect, n_value).
    pub(crate) fn build_object(
        sex: ByteSex,
        is_64: bool,
        cputype: u32,
        cpusubtype: u32,
        symbols: &[(&str, u8, u8, u64)],
    ) -> Vec<u8> {
        let header_size = if is_64 { MachHeader64::SIZE } else { MachHeader::SIZE };
        let seg_size = if is_64 {
            SegmentCommand64::SIZE + Section64::SIZE
        } else {
            SegmentCommand::SIZE + Section::SIZE
        };
        let sizeofcmds = seg_size + SymtabCommand::SIZE;
        let text_off = header_size + sizeofcmds;
        let text_size = 8usize;
        let symoff = text_off + text_size;
        let nlist_size = if is_64 { Nlist64::SIZE } else { Nlist::SIZE };

        let mut strtab = vec![0u8];
        let mut strx = Vec::new();
        for (name, ..) in symbols {
            strx.push(strtab.len() as u32);
            strtab.extend_from_slice(name.as_bytes());
            strtab.push(0);
        }
        while strtab.len() % 4 != 0 {
            strtab.push(0);
        }
        let stroff = symoff + symbols.len() * nlist_size;

        let mut out = Vec::new();
        let magic = if is_64 { MH_MAGIC_64 } else { MH_MAGIC };
        let header = ObjectHeader {
            magic,
            cputype,
            cpusubtype,
            filetype: MH_OBJECT,
            ncmds: 2,
            sizeofcmds: sizeofcmds as u32,
            flags: 0,
            reserved: 0,
        };
        let mut head = vec![0u8; header_size];
        header.encode_into(sex, &mut head).unwrap();
        out.extend_from_slice(&head);

        let mut name16 = [0u8; 16];
        name16[..6].copy_from_slice(b"__TEXT");
        let mut sect16 = [0u8; 16];
        sect16[..6].copy_from_slice(b"__text");
        if is_64 {
            out.extend(encode(
                &SegmentCommand64 {
                    cmd: LC_SEGMENT_64,
                    cmdsize: seg_size as u32,
                    segname: [0; 16],
                    vmaddr: 0,
                    vmsize: text_size as u64,
                    fileoff: text_off as u64,
                    filesize: text_size as u64,
                    maxprot: 7,
                    initprot: 7,
                    nsects: 1,
                    flags: 0,
                },
                sex,
            ));
            out.extend(encode(
                &Section64 {
                    sectname: sect16,
                    segname: name16,
                    addr: 0,
                    size: text_size as u64,
                    offset: text_off as u32,
                    align: 2,
                    reloff: 0,
                    nreloc: 0,
                    flags: 0x8000_0400,
                    reserved1: 0,
                    reserved2: 0,
                    reserved3: 0,
                },
                sex,
            ));
        } else {
            out.extend(encode(
                &SegmentCommand {
                    cmd: LC_SEGMENT,
                    cmdsize: seg_size as u32,
                    segname: [0; 16],
                    vmaddr: 0,
                    vmsize: text_size as u32,
                    fileoff: text_off as u32,
                    filesize: text_size as u32,
                    maxprot: 7,
                    initprot: 7,
                    nsects: 1,
                    flags: 0,
                },
                sex,
            ));
            out.extend(encode(
                &Section {
                    sectname: sect16,
                    segname: name16,
                    addr: 0,
                    size: text_size as u32,
                    offset: text_off as u32,
                    align: 2,
                    reloff: 0,
                    nreloc: 0,
                    flags: 0x8000_0400,
                    reserved1: 0,
                    reserved2: 0,
                },
                sex,
            ));
        }
        out.extend(encode(
            &SymtabCommand {
                cmd: LC_SYMTAB,
                cmdsize: SymtabCommand::SIZE as u32,
                symoff: symoff as u32,
                nsyms: symbols.len() as u32,
                stroff: stroff as u32,
                strsize: strtab.len() as u32,
            },
            sex,
        ));
        out.extend_from_slice(&[0x90; 8]);
        for (i, (_, n_type, n_sect, n_value)) in symbols.iter().enumerate() {
            if is_64 {
                out.extend(encode(
                    &Nlist64 { n_strx: strx[i], n_type: *n_type, n_sect: *n_sect, n_desc: 0, n_value: *n_value },
                    sex,
                ));
            } else {
                out.extend(encode(
                    &Nlist { n_strx: strx[i], n_type: *n_type, n_sect: *n_sect, n_desc: 0, n_value: *n_value as u32 },
                    sex,
                ));
            }
        }
        out.extend_from_slice(&strtab);
        out
    }

    #[test]
    fn test_parse_both_byte_sexes() {
        for sex in [ByteSex::Big, ByteSex::Little] {
            for is_64 in [false, true] {
                let data = build_object(sex, is_64, CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL, &[("_a", N_SECT | N_EXT, 1, 0)]);
                let obj = MachObject::parse(&data).unwrap();
                assert_eq!(obj.byte_sex(), sex);
                assert_eq!(obj.is_64(), is_64);
                assert_eq!(obj.header().cputype, CPU_TYPE_X86_64);
                assert_eq!(obj.header().ncmds, 2);
            }
        }
    }

    #[test]
    fn test_load_commands_and_symbols() {
        let data = build_object(
            ByteSex::Little,
            true,
            CPU_TYPE_ARM64,
            CPU_SUBTYPE_ARM64_ALL,
            &[("_main", N_SECT | N_EXT, 1, 0), ("_puts", N_UNDF | N_EXT, 0, 0)],
        );
        let obj = MachObject::parse(&data).unwrap();
        let cmds: Vec<_> = obj.load_commands().collect::<Result<_>>().unwrap();
        assert_eq!(cmds.len(), 2);
        assert_eq!(cmds[0].cmd, LC_SEGMENT_64);
        assert_eq!(cmds[1].cmd, LC_SYMTAB);

        let sections = obj.sections().unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].sectname, "__text");

        let symtab = obj.symtab().unwrap().unwrap();
        let symbols = obj.symbols(&symtab).unwrap();
        let strtab = obj.string_table(&symtab).unwrap();
        assert_eq!(symbols.len(), 2);
        assert_eq!(c_str_at(strtab, symbols[0].n_strx as usize), b"_main");
        assert_eq!(c_str_at(strtab, symbols[1].n_strx as usize), b"_puts");
    }

    #[test]
    fn test_header_reencode_roundtrip() {
        let data = build_object(ByteSex::Big, false, CPU_TYPE_POWERPC, CPU_SUBTYPE_POWERPC_ALL, &[]);
        let (header, sex) = ObjectHeader::parse(&data).unwrap();
        assert_eq!(sex, ByteSex::Big);
        let mut out = vec![0u8; header.size()];
        header.encode_into(sex, &mut out).unwrap();
        assert_eq!(&out[..], &data[..header.size()]);
    }

    #[test]
    fn test_bad_magic_and_short() {
        assert!(MachObject::parse(b"\0\0\0\0").is_err());
        assert!(MachObject::parse(&MH_MAGIC_64.to_be_bytes()).is_err());
    }
}
