//! Mach-O header, load command and file region rules.

use std::collections::HashSet;

use tracing::debug;

use super::overlap::OverlapTracker;
use super::{Validator, Verdict};
use crate::error::{Error, Result};
use crate::fat::FatSlice;
use crate::macho::*;

/// Size of one relocation entry.
const RELOCATION_SIZE: u64 = 8;
/// Size of a `dylib_table_of_contents` entry.
const DYLIB_TOC_SIZE: u64 = 8;
/// Size of a `dylib_module` entry.
const DYLIB_MODULE_SIZE: u64 = 52;
/// Size of a `dylib_module_64` entry.
const DYLIB_MODULE_64_SIZE: u64 = 56;
/// Size of a two-level hint and of an indirect or reference table entry.
const TABLE_ENTRY_SIZE: u64 = 4;
/// Size of a `build_tool_version` entry.
const BUILD_TOOL_SIZE: u64 = 8;

impl Validator<'_> {
    /// Checks a Mach-O image: header, every load command and every file
    /// region those commands declare.
    ///
    /// `slice` is the fat entry the image came from; its CPU type must agree
    /// with the image header.
    pub fn check_object(&mut self, data: &[u8], slice: Option<&FatSlice>, location: &str) -> Verdict {
        if object_magic(data).is_none() {
            return Verdict::NotApplicable;
        }
        let result = MachObject::parse(data).and_then(|object| ObjectCheck::new(object).run(slice));
        Verdict::located(result, location)
    }
}

/// State for one pass over an image's load commands.
struct ObjectCheck<'a> {
    object: MachObject<'a>,
    header: ObjectHeader,
    size: u64,
    sizeofhdrs: u64,
    tracker: OverlapTracker,
    seen: HashSet<u32>,
    symtab: Option<SymtabCommand>,
    dysymtab: Option<DysymtabCommand>,
    init_module: Option<u64>,
    nhints: Option<u32>,
}

impl<'a> ObjectCheck<'a> {
    fn new(object: MachObject<'a>) -> Self {
        let header = *object.header();
        let size = object.data().len() as u64;
        let sizeofhdrs = header.size() as u64 + u64::from(header.sizeofcmds);
        Self {
            object,
            header,
            size,
            sizeofhdrs,
            tracker: OverlapTracker::new(),
            seen: HashSet::new(),
            symtab: None,
            dysymtab: None,
            init_module: None,
            nhints: None,
        }
    }

    fn run(mut self, slice: Option<&FatSlice>) -> Result<()> {
        if self.sizeofhdrs > self.size {
            return Err(Error::object("load commands extend past the end of the file"));
        }
        self.tracker.register(0, self.sizeofhdrs, "Mach-O headers")?;

        if let Some(slice) = slice {
            if slice.cputype != self.header.cputype {
                return Err(Error::object(format!(
                    "fat header architecture {}'s cputype does not match object file's mach header",
                    slice.arch_name()
                )));
            }
        }

        let sizeofcmds = u64::from(self.header.sizeofcmds);
        let multiple = self.header.pointer_align();
        let mut offset = self.header.size();
        let mut load_end = 0u64;

        for index in 0..self.header.ncmds {
            if load_end + LoadCommand::SIZE as u64 > sizeofcmds {
                return Err(Error::load_command(index, "extends past the end all load commands in the file"));
            }
            let lc: LoadCommand = self.object.read(offset)?;

            let core_thread = self.header.is_64()
                && self.header.filetype == MH_CORE
                && lc.cmd == LC_THREAD
                && lc.cmdsize % 4 == 0;
            if lc.cmdsize % multiple != 0 && !core_thread {
                return Err(Error::load_command(index, format!("cmdsize not a multiple of {multiple}")));
            }
            load_end += u64::from(lc.cmdsize);
            if load_end > sizeofcmds {
                return Err(Error::load_command(index, "extends past the end of the file"));
            }
            if lc.cmdsize == 0 {
                return Err(Error::load_command(index, "cmdsize is zero"));
            }

            let raw = RawLoadCommand {
                index,
                offset,
                cmd: lc.cmd,
                cmdsize: lc.cmdsize,
            };
            self.command(&raw)?;
            offset += lc.cmdsize as usize;
        }

        self.cross_checks()?;
        if load_end != sizeofcmds {
            return Err(Error::object("inconsistent sizeofcmds field in mach header"));
        }
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Fails unless the command is at least `min` bytes.
    fn at_least(&self, lc: &RawLoadCommand, min: usize) -> Result<()> {
        if (lc.cmdsize as usize) < min {
            return Err(Error::load_command(
                lc.index,
                format!("{} cmdsize too small", load_command_name(lc.cmd)),
            ));
        }
        Ok(())
    }

    /// Fails unless the command is exactly `size` bytes.
    fn exactly(&self, lc: &RawLoadCommand, size: usize) -> Result<()> {
        self.at_least(lc, size)?;
        if lc.cmdsize as usize != size {
            return Err(Error::load_command(
                lc.index,
                format!("{} has incorrect cmdsize", load_command_name(lc.cmd)),
            ));
        }
        Ok(())
    }

    /// Fails if a command of `group` was already seen.
    fn unique(&mut self, lc: &RawLoadCommand, group: u32) -> Result<()> {
        if !self.seen.insert(group) {
            return Err(Error::load_command(
                lc.index,
                format!("more than one {} command", load_command_name(lc.cmd)),
            ));
        }
        Ok(())
    }

    /// Checks that `[offset, offset + size)` lies in the image.
    fn within(&self, lc: &RawLoadCommand, field: &str, offset: u64, size: u64) -> Result<()> {
        let name = load_command_name(lc.cmd);
        if offset > self.size {
            return Err(Error::load_command(
                lc.index,
                format!("{name} {field} offset field extends past the end of the file"),
            ));
        }
        if offset.checked_add(size).map_or(true, |end| end > self.size) {
            return Err(Error::load_command(
                lc.index,
                format!("{name} {field} offset field plus size extends past the end of the file"),
            ));
        }
        Ok(())
    }

    /// Checks that a region lies in the image and does not alias another.
    fn region(&mut self, lc: &RawLoadCommand, offset: u64, size: u64, label: &'static str) -> Result<()> {
        self.within(lc, label, offset, size)?;
        self.tracker.register(offset, size, label)
    }

    /// Checks a table of `count` fixed-size entries.
    fn table(&mut self, lc: &RawLoadCommand, offset: u32, count: u32, entry: u64, label: &'static str) -> Result<()> {
        self.region(lc, offset.into(), u64::from(count) * entry, label)
    }

    /// Checks that a string offset inside the command is in range.
    fn string_offset(&self, lc: &RawLoadCommand, field: &str, offset: u32) -> Result<()> {
        if offset >= lc.cmdsize {
            return Err(Error::load_command(
                lc.index,
                format!("{} {field} field extends past the end of the load command", load_command_name(lc.cmd)),
            ));
        }
        Ok(())
    }

    // =========================================================================
    // Commands
    // =========================================================================

    fn command(&mut self, lc: &RawLoadCommand) -> Result<()> {
        match lc.cmd {
            LC_SEGMENT => self.segment_32(lc),
            LC_SEGMENT_64 => self.segment_64(lc),
            LC_SYMTAB => self.symtab(lc),
            LC_DYSYMTAB => self.dysymtab(lc),
            LC_ROUTINES => {
                self.unique(lc, LC_ROUTINES)?;
                self.exactly(lc, RoutinesCommand::SIZE)?;
                let cmd: RoutinesCommand = self.object.command(lc)?;
                self.init_module = Some(cmd.init_module.into());
                Ok(())
            }
            LC_ROUTINES_64 => {
                self.unique(lc, LC_ROUTINES)?;
                self.exactly(lc, RoutinesCommand64::SIZE)?;
                let cmd: RoutinesCommand64 = self.object.command(lc)?;
                self.init_module = Some(cmd.init_module);
                Ok(())
            }
            LC_TWOLEVEL_HINTS => {
                self.unique(lc, lc.cmd)?;
                self.exactly(lc, TwolevelHintsCommand::SIZE)?;
                let cmd: TwolevelHintsCommand = self.object.command(lc)?;
                self.table(lc, cmd.offset, cmd.nhints, TABLE_ENTRY_SIZE, "two level hints")?;
                self.nhints = Some(cmd.nhints);
                Ok(())
            }
            LC_CODE_SIGNATURE
            | LC_SEGMENT_SPLIT_INFO
            | LC_FUNCTION_STARTS
            | LC_DATA_IN_CODE
            | LC_DYLIB_CODE_SIGN_DRS
            | LC_LINKER_OPTIMIZATION_HINT
            | LC_DYLD_EXPORTS_TRIE
            | LC_DYLD_CHAINED_FIXUPS => self.linkedit_data(lc),
            LC_DYLD_INFO | LC_DYLD_INFO_ONLY => self.dyld_info(lc),
            LC_SYMSEG => {
                self.exactly(lc, LinkeditDataCommand::SIZE)?;
                let cmd: LinkeditDataCommand = self.object.command(lc)?;
                self.region(lc, cmd.dataoff.into(), cmd.datasize.into(), "symseg info")
            }
            LC_PREBIND_CKSUM => {
                self.unique(lc, lc.cmd)?;
                self.exactly(lc, PrebindCksumCommand::SIZE)
            }
            LC_UUID => {
                self.unique(lc, lc.cmd)?;
                self.exactly(lc, UuidCommand::SIZE)
            }
            LC_ENCRYPTION_INFO => {
                self.unique(lc, LC_ENCRYPTION_INFO)?;
                self.exactly(lc, EncryptionInfoCommand::SIZE)?;
                let cmd: EncryptionInfoCommand = self.object.command(lc)?;
                self.within(lc, "cryptoff", cmd.cryptoff.into(), cmd.cryptsize.into())
            }
            LC_ENCRYPTION_INFO_64 => {
                self.unique(lc, LC_ENCRYPTION_INFO)?;
                self.exactly(lc, EncryptionInfoCommand64::SIZE)?;
                let cmd: EncryptionInfoCommand64 = self.object.command(lc)?;
                self.within(lc, "cryptoff", cmd.cryptoff.into(), cmd.cryptsize.into())
            }
            LC_VERSION_MIN_MACOSX | LC_VERSION_MIN_IPHONEOS | LC_VERSION_MIN_TVOS | LC_VERSION_MIN_WATCHOS => {
                self.unique(lc, LC_VERSION_MIN_MACOSX)?;
                self.exactly(lc, VersionMinCommand::SIZE)
            }
            LC_BUILD_VERSION => {
                self.at_least(lc, BuildVersionCommand::SIZE)?;
                let cmd: BuildVersionCommand = self.object.command(lc)?;
                let expected = BuildVersionCommand::SIZE as u64 + u64::from(cmd.ntools) * BUILD_TOOL_SIZE;
                if u64::from(lc.cmdsize) != expected {
                    return Err(Error::load_command(lc.index, "LC_BUILD_VERSION has incorrect cmdsize"));
                }
                Ok(())
            }
            LC_ID_DYLIB | LC_LOAD_DYLIB | LC_LOAD_WEAK_DYLIB | LC_REEXPORT_DYLIB | LC_LOAD_UPWARD_DYLIB
            | LC_LAZY_LOAD_DYLIB => {
                if lc.cmd == LC_ID_DYLIB {
                    self.unique(lc, lc.cmd)?;
                }
                self.at_least(lc, DylibCommand::SIZE)?;
                let cmd: DylibCommand = self.object.command(lc)?;
                self.string_offset(lc, "name.offset", cmd.name_offset)
            }
            LC_ID_DYLINKER | LC_LOAD_DYLINKER | LC_SUB_FRAMEWORK | LC_SUB_UMBRELLA | LC_SUB_LIBRARY
            | LC_SUB_CLIENT | LC_DYLD_ENVIRONMENT | LC_RPATH | LC_IDFVMLIB | LC_LOADFVMLIB => {
                if matches!(lc.cmd, LC_ID_DYLINKER | LC_SUB_FRAMEWORK) {
                    self.unique(lc, lc.cmd)?;
                }
                self.at_least(lc, StrCommand::SIZE)?;
                let cmd: StrCommand = self.object.command(lc)?;
                self.string_offset(lc, "offset", cmd.offset)
            }
            LC_PREBOUND_DYLIB => {
                self.at_least(lc, PreboundDylibCommand::SIZE)?;
                let cmd: PreboundDylibCommand = self.object.command(lc)?;
                self.string_offset(lc, "name.offset", cmd.name)?;
                self.string_offset(lc, "linked_modules.offset", cmd.linked_modules)?;
                let bitmap = u64::from(cmd.nmodules).div_ceil(8);
                if u64::from(cmd.linked_modules) + bitmap > u64::from(lc.cmdsize) {
                    return Err(Error::load_command(
                        lc.index,
                        "LC_PREBOUND_DYLIB linked_modules field plus nmodules extends past the end of the load command",
                    ));
                }
                Ok(())
            }
            LC_THREAD | LC_UNIXTHREAD => self.thread(lc),
            LC_MAIN => {
                self.unique(lc, lc.cmd)?;
                self.exactly(lc, EntryPointCommand::SIZE)
            }
            LC_SOURCE_VERSION => {
                self.unique(lc, lc.cmd)?;
                self.exactly(lc, SourceVersionCommand::SIZE)
            }
            LC_LINKER_OPTION => self.linker_option(lc),
            LC_NOTE => {
                self.exactly(lc, NoteCommand::SIZE)?;
                let cmd: NoteCommand = self.object.command(lc)?;
                self.within(lc, "note", cmd.offset, cmd.size)
            }
            LC_FILESET_ENTRY => {
                self.at_least(lc, FilesetEntryCommand::SIZE)?;
                let cmd: FilesetEntryCommand = self.object.command(lc)?;
                self.string_offset(lc, "entry_id.offset", cmd.entry_id)
            }
            LC_IDENT | LC_FVMFILE | LC_PREPAGE => Ok(()),
            other => {
                debug!("load command {}: unrecognized command {:#x} accepted", lc.index, other);
                Ok(())
            }
        }
    }

    fn segment_32(&mut self, lc: &RawLoadCommand) -> Result<()> {
        self.at_least(lc, SegmentCommand::SIZE)?;
        let seg: SegmentCommand = self.object.command(lc)?;
        let segment = Segment::from(&seg);
        self.segment_layout(lc, &segment, SegmentCommand::SIZE, Section::SIZE)?;
        for j in 0..seg.nsects as usize {
            let sect: Section = self.object.read(lc.offset + SegmentCommand::SIZE + j * Section::SIZE)?;
            self.section(lc, &segment, j, &SectionInfo::from(&sect))?;
        }
        Ok(())
    }

    fn segment_64(&mut self, lc: &RawLoadCommand) -> Result<()> {
        self.at_least(lc, SegmentCommand64::SIZE)?;
        let seg: SegmentCommand64 = self.object.command(lc)?;
        let segment = Segment::from(&seg);
        self.segment_layout(lc, &segment, SegmentCommand64::SIZE, Section64::SIZE)?;
        for j in 0..seg.nsects as usize {
            let sect: Section64 = self.object.read(lc.offset + SegmentCommand64::SIZE + j * Section64::SIZE)?;
            self.section(lc, &segment, j, &SectionInfo::from(&sect))?;
        }
        Ok(())
    }

    fn segment_layout(&self, lc: &RawLoadCommand, seg: &Segment, header: usize, section: usize) -> Result<()> {
        let name = load_command_name(lc.cmd);
        let expected = header as u64 + u64::from(seg.nsects) * section as u64;
        if u64::from(lc.cmdsize) != expected {
            return Err(Error::load_command(
                lc.index,
                format!("inconsistent cmdsize in {name} for the number of sections"),
            ));
        }
        if seg.fileoff > self.size {
            return Err(Error::load_command(
                lc.index,
                format!("fileoff field of {name} extends past the end of the file"),
            ));
        }
        if seg.fileoff.checked_add(seg.filesize).map_or(true, |end| end > self.size) {
            return Err(Error::load_command(
                lc.index,
                format!("fileoff field plus filesize field of {name} extends past the end of the file"),
            ));
        }
        if seg.vmsize != 0 && seg.filesize > seg.vmsize {
            return Err(Error::load_command(
                lc.index,
                format!("filesize field of {name} greater than vmsize field"),
            ));
        }
        Ok(())
    }

    fn section(&mut self, lc: &RawLoadCommand, seg: &Segment, j: usize, s: &SectionInfo) -> Result<()> {
        let fail = |what: &str| {
            Error::load_command(lc.index, format!("{what} of section {j} in {}", load_command_name(lc.cmd)))
        };
        let no_contents = matches!(self.header.filetype, MH_DYLIB_STUB | MH_DSYM);
        let file_backed = !no_contents && !is_zerofill(s.flags);
        let offset = u64::from(s.offset);

        if file_backed {
            if offset > self.size {
                return Err(fail("offset field extends past the end of the file"));
            }
            if seg.fileoff == 0 && offset < self.sizeofhdrs && s.size != 0 {
                return Err(fail("offset field not past the headers of the file"));
            }
            if offset.checked_add(s.size).map_or(true, |end| end > self.size) {
                return Err(fail("offset field plus size field extends past the end of the file"));
            }
            if s.size > seg.filesize {
                return Err(fail("size field greater than the segment"));
            }
        }
        if !no_contents && s.size != 0 {
            if s.addr < seg.vmaddr {
                return Err(fail("addr field less than the segment's vmaddr"));
            }
            let end = s.addr.checked_add(s.size);
            let seg_end = seg.vmaddr.saturating_add(seg.vmsize);
            if seg.vmsize != 0 && end.map_or(true, |end| end > seg_end) {
                return Err(fail("addr field plus size field greater than the segment's vmaddr plus vmsize"));
            }
        }
        if file_backed {
            self.tracker.register(offset, s.size, "section contents")?;
        }

        let reloff = u64::from(s.reloff);
        let relsize = u64::from(s.nreloc) * RELOCATION_SIZE;
        if reloff > self.size {
            return Err(fail("reloff field extends past the end of the file"));
        }
        if reloff + relsize > self.size {
            return Err(fail("reloff field plus nreloc field times sizeof(struct relocation_info) extends past the end of the file"));
        }
        self.tracker.register(reloff, relsize, "section relocation entries")
    }

    fn symtab(&mut self, lc: &RawLoadCommand) -> Result<()> {
        self.unique(lc, lc.cmd)?;
        self.exactly(lc, SymtabCommand::SIZE)?;
        let cmd: SymtabCommand = self.object.command(lc)?;
        let entry = (if self.header.is_64() { Nlist64::SIZE } else { Nlist::SIZE }) as u64;
        self.table(lc, cmd.symoff, cmd.nsyms, entry, "symbol table")?;
        self.region(lc, cmd.stroff.into(), cmd.strsize.into(), "string table")?;
        self.symtab = Some(cmd);
        Ok(())
    }

    fn dysymtab(&mut self, lc: &RawLoadCommand) -> Result<()> {
        self.unique(lc, lc.cmd)?;
        self.exactly(lc, DysymtabCommand::SIZE)?;
        let cmd: DysymtabCommand = self.object.command(lc)?;
        let module = if self.header.is_64() { DYLIB_MODULE_64_SIZE } else { DYLIB_MODULE_SIZE };
        self.table(lc, cmd.tocoff, cmd.ntoc, DYLIB_TOC_SIZE, "table of contents")?;
        self.table(lc, cmd.modtaboff, cmd.nmodtab, module, "module table")?;
        self.table(lc, cmd.extrefsymoff, cmd.nextrefsyms, TABLE_ENTRY_SIZE, "reference table")?;
        self.table(lc, cmd.indirectsymoff, cmd.nindirectsyms, TABLE_ENTRY_SIZE, "indirect table")?;
        self.table(lc, cmd.extreloff, cmd.nextrel, RELOCATION_SIZE, "external relocation table")?;
        self.table(lc, cmd.locreloff, cmd.nlocrel, RELOCATION_SIZE, "local relocation table")?;
        self.dysymtab = Some(cmd);
        Ok(())
    }

    fn linkedit_data(&mut self, lc: &RawLoadCommand) -> Result<()> {
        self.unique(lc, lc.cmd)?;
        self.exactly(lc, LinkeditDataCommand::SIZE)?;
        let cmd: LinkeditDataCommand = self.object.command(lc)?;
        let label = match lc.cmd {
            LC_CODE_SIGNATURE => "code signature data",
            LC_SEGMENT_SPLIT_INFO => "split info data",
            LC_FUNCTION_STARTS => "function starts data",
            LC_DATA_IN_CODE => "data in code info",
            LC_DYLIB_CODE_SIGN_DRS => "dylib codesign designated requirements data",
            LC_LINKER_OPTIMIZATION_HINT => "linker optimization hint",
            LC_DYLD_EXPORTS_TRIE => "exports trie",
            _ => "chained fixups",
        };
        self.region(lc, cmd.dataoff.into(), cmd.datasize.into(), label)
    }

    fn dyld_info(&mut self, lc: &RawLoadCommand) -> Result<()> {
        self.unique(lc, LC_DYLD_INFO)?;
        self.exactly(lc, DyldInfoCommand::SIZE)?;
        let cmd: DyldInfoCommand = self.object.command(lc)?;
        self.region(lc, cmd.rebase_off.into(), cmd.rebase_size.into(), "dyld rebase info")?;
        self.region(lc, cmd.bind_off.into(), cmd.bind_size.into(), "dyld bind info")?;
        self.region(lc, cmd.weak_bind_off.into(), cmd.weak_bind_size.into(), "dyld weak bind info")?;
        self.region(lc, cmd.lazy_bind_off.into(), cmd.lazy_bind_size.into(), "dyld lazy bind info")?;
        self.region(lc, cmd.export_off.into(), cmd.export_size.into(), "dyld export info")
    }

    /// Walks the (flavor, count, state) triples of a thread command.
    fn thread(&mut self, lc: &RawLoadCommand) -> Result<()> {
        if lc.cmd == LC_UNIXTHREAD {
            self.unique(lc, lc.cmd)?;
        }
        self.at_least(lc, LoadCommand::SIZE)?;
        let name = load_command_name(lc.cmd);
        let sex = self.object.byte_sex();
        let data = self.object.data();
        let end = lc.offset + lc.cmdsize as usize;
        let mut state = lc.offset + LoadCommand::SIZE;
        while state < end {
            if state + 4 > end {
                return Err(Error::load_command(lc.index, format!("{name} flavor in {name} extends past end of command")));
            }
            if state + 8 > end {
                return Err(Error::load_command(lc.index, format!("{name} count in {name} extends past end of command")));
            }
            let count = sex
                .read_u32_at(data, state + 4)
                .ok_or_else(|| Error::load_command(lc.index, format!("{name} extends past the end of the file")))?;
            state += 8;
            let words = (count as usize).saturating_mul(4);
            if state.saturating_add(words) > end {
                return Err(Error::load_command(
                    lc.index,
                    format!("{name} thread state in {name} extends past end of command"),
                ));
            }
            state += words;
        }
        Ok(())
    }

    fn linker_option(&self, lc: &RawLoadCommand) -> Result<()> {
        self.at_least(lc, LinkerOptionCommand::SIZE)?;
        let cmd: LinkerOptionCommand = self.object.command(lc)?;
        let start = lc.offset + LinkerOptionCommand::SIZE;
        let end = lc.offset + lc.cmdsize as usize;
        let body = &self.object.data()[start..end];
        let strings = body.split(|&b| b == 0).filter(|s| !s.is_empty()).count();
        if (strings as u64) < u64::from(cmd.count) {
            return Err(Error::load_command(
                lc.index,
                "LC_LINKER_OPTION string count extends past the end of the load command",
            ));
        }
        Ok(())
    }

    // =========================================================================
    // Cross Checks
    // =========================================================================

    fn cross_checks(&self) -> Result<()> {
        let Some(dysymtab) = &self.dysymtab else {
            return Ok(());
        };
        let Some(symtab) = &self.symtab else {
            return Err(Error::object(
                "contains LC_DYSYMTAB load command without a LC_SYMTAB load command",
            ));
        };

        let nsyms = u64::from(symtab.nsyms);
        let ranges = [
            ("ilocalsym", "nlocalsym", dysymtab.ilocalsym, dysymtab.nlocalsym),
            ("iextdefsym", "nextdefsym", dysymtab.iextdefsym, dysymtab.nextdefsym),
            ("iundefsym", "nundefsym", dysymtab.iundefsym, dysymtab.nundefsym),
        ];
        for (index_field, count_field, first, count) in ranges {
            if count == 0 {
                continue;
            }
            if u64::from(first) > nsyms {
                return Err(Error::object(format!(
                    "{index_field} in LC_DYSYMTAB load command extends past the end of the symbol table"
                )));
            }
            if u64::from(first) + u64::from(count) > nsyms {
                return Err(Error::object(format!(
                    "{index_field} plus {count_field} in LC_DYSYMTAB load command extends past the end of the symbol table"
                )));
            }
        }

        if let Some(init_module) = self.init_module {
            if init_module > u64::from(dysymtab.nmodtab) {
                return Err(Error::object(
                    "init_module in LC_ROUTINES load command extends past the end of the module table",
                ));
            }
        }
        if let Some(nhints) = self.nhints {
            if nhints != dysymtab.nundefsym {
                return Err(Error::object(
                    "nhints in LC_TWOLEVEL_HINTS load command not the same as nundefsym in LC_DYSYMTAB load command",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Detector;
    use crate::util::{encode_into, ByteSex};

    fn object() -> Vec<u8> {
        build_object(
            ByteSex::Little,
            true,
            CPU_TYPE_X86_64,
            CPU_SUBTYPE_X86_64_ALL,
            &[("_main", N_SECT | N_EXT, 1, 0), ("_puts", N_UNDF | N_EXT, 0, 0)],
        )
    }

    fn check(data: &[u8]) -> Verdict {
        Validator::new(Detector::default()).check_object(data, None, "t.o")
    }

    fn symtab_of(data: &[u8]) -> (usize, SymtabCommand) {
        let offset = MachHeader64::SIZE + SegmentCommand64::SIZE + Section64::SIZE;
        (offset, crate::util::decode(data, offset, ByteSex::Little).unwrap())
    }

    #[test]
    fn test_wellformed_object() {
        let data = object();
        assert!(check(&data).is_good());
        for sex in [ByteSex::Big, ByteSex::Little] {
            let data = build_object(sex, false, CPU_TYPE_I386, CPU_SUBTYPE_I386_ALL, &[("_a", N_SECT | N_EXT, 1, 0)]);
            assert!(check(&data).is_good());
        }
        assert!(matches!(check(b"!<arch>\n"), Verdict::NotApplicable));
    }

    #[test]
    fn test_truncated_string_table_names_load_command() {
        let mut data = object();
        data.truncate(data.len() - 1);
        let err = check(&data).into_result().unwrap_err();
        let text = err.to_string();
        assert!(text.starts_with("t.o: "));
        assert!(text.contains("load command 1"), "{text}");
        assert!(text.contains("string table"), "{text}");
    }

    #[test]
    fn test_overlapping_symbol_and_string_tables() {
        let mut data = object();
        let (offset, mut symtab) = symtab_of(&data);
        symtab.stroff = symtab.symoff + 4;
        encode_into(&symtab, ByteSex::Little, &mut data[offset..]).unwrap();
        let err = check(&data).into_result().unwrap_err();
        match err.root() {
            Error::Overlap { first, second, .. } => {
                assert_eq!(*first, "string table");
                assert_eq!(*second, "symbol table");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_symbol_table_overlapping_section_contents() {
        let mut data = object();
        let (offset, mut symtab) = symtab_of(&data);
        // Section64::offset follows two names and two u64 fields
        let sect_off = MachHeader64::SIZE + SegmentCommand64::SIZE + 48;
        let text_off = u32::from_le_bytes(data[sect_off..sect_off + 4].try_into().unwrap());
        symtab.symoff = text_off + 4;
        encode_into(&symtab, ByteSex::Little, &mut data[offset..]).unwrap();
        let err = check(&data).into_result().unwrap_err();
        assert!(matches!(err.root(), Error::Overlap { second: "section contents", .. }), "{err}");
    }

    /// Two `LC_SEGMENT_64` commands, each with one section, both sections
    /// placed at the same file offset.
    fn two_segments_sharing_contents() -> Vec<u8> {
        let sex = ByteSex::Little;
        let seg_size = SegmentCommand64::SIZE + Section64::SIZE;
        let contents_off = MachHeader64::SIZE + 2 * seg_size;
        let header = ObjectHeader {
            magic: MH_MAGIC_64,
            cputype: CPU_TYPE_X86_64,
            cpusubtype: CPU_SUBTYPE_X86_64_ALL,
            filetype: MH_OBJECT,
            ncmds: 2,
            sizeofcmds: (2 * seg_size) as u32,
            flags: 0,
            reserved: 0,
        };
        let mut out = vec![0u8; MachHeader64::SIZE];
        header.encode_into(sex, &mut out).unwrap();

        for (segname, sectname, vmaddr) in [(&b"__TEXT"[..], &b"__text"[..], 0u64), (b"__DATA", b"__data", 0x1000)] {
            let mut seg16 = [0u8; 16];
            seg16[..segname.len()].copy_from_slice(segname);
            let mut sect16 = [0u8; 16];
            sect16[..sectname.len()].copy_from_slice(sectname);
            out.extend(crate::util::encode(
                &SegmentCommand64 {
                    cmd: LC_SEGMENT_64,
                    cmdsize: seg_size as u32,
                    segname: seg16,
                    vmaddr,
                    vmsize: 8,
                    fileoff: contents_off as u64,
                    filesize: 8,
                    maxprot: 7,
                    initprot: 7,
                    nsects: 1,
                    flags: 0,
                },
                sex,
            ));
            out.extend(crate::util::encode(
                &Section64 {
                    sectname: sect16,
                    segname: seg16,
                    addr: vmaddr,
                    size: 8,
                    offset: contents_off as u32,
                    align: 2,
                    reloff: 0,
                    nreloc: 0,
                    flags: 0,
                    reserved1: 0,
                    reserved2: 0,
                    reserved3: 0,
                },
                sex,
            ));
        }
        out.extend_from_slice(&[0x90; 8]);
        out
    }

    #[test]
    fn test_sections_of_two_segments_overlap() {
        let data = two_segments_sharing_contents();
        let err = check(&data).into_result().unwrap_err();
        match err.root() {
            Error::Overlap { first, second, .. } => {
                assert_eq!(*first, "section contents");
                assert_eq!(*second, "section contents");
            }
            other => panic!("unexpected error {other}"),
        }
        let text = err.to_string();
        assert_eq!(text.matches("section contents").count(), 2, "{text}");

        // Moving the second section's contents past the first clears the overlap.
        let mut data = data;
        let contents_off = MachHeader64::SIZE + 2 * (SegmentCommand64::SIZE + Section64::SIZE);
        data.extend_from_slice(&[0; 8]);
        let seg_off = MachHeader64::SIZE + SegmentCommand64::SIZE + Section64::SIZE;
        let mut seg: SegmentCommand64 = crate::util::decode(&data, seg_off, ByteSex::Little).unwrap();
        seg.fileoff = (contents_off + 8) as u64;
        encode_into(&seg, ByteSex::Little, &mut data[seg_off..]).unwrap();
        let sect_off = seg_off + SegmentCommand64::SIZE;
        let mut sect: Section64 = crate::util::decode(&data, sect_off, ByteSex::Little).unwrap();
        sect.offset = (contents_off + 8) as u32;
        encode_into(&sect, ByteSex::Little, &mut data[sect_off..]).unwrap();
        assert!(check(&data).is_good(), "{:?}", check(&data).error());
    }

    #[test]
    fn test_sizeofcmds_and_cmdsize_rules() {
        let data = object();

        let mut bad = data.clone();
        let (mut header, sex) = ObjectHeader::parse(&bad).unwrap();
        header.ncmds = 1;
        header.encode_into(sex, &mut bad).unwrap();
        let err = check(&bad).into_result().unwrap_err();
        assert!(err.to_string().contains("inconsistent sizeofcmds"), "{err}");

        let mut bad = data.clone();
        let (offset, mut symtab) = symtab_of(&bad);
        symtab.cmdsize = 0;
        encode_into(&symtab, ByteSex::Little, &mut bad[offset..]).unwrap();
        let err = check(&bad).into_result().unwrap_err();
        assert!(err.to_string().contains("load command 1 cmdsize is zero"), "{err}");

        let mut bad = data;
        let (offset, mut symtab) = symtab_of(&bad);
        symtab.cmdsize = 28;
        encode_into(&symtab, ByteSex::Little, &mut bad[offset..]).unwrap();
        let err = check(&bad).into_result().unwrap_err();
        assert!(err.to_string().contains("not a multiple of 8"), "{err}");
    }

    #[test]
    fn test_fat_cputype_must_match_header() {
        let data = object();
        let slice = FatSlice {
            cputype: CPU_TYPE_ARM64,
            cpusubtype: CPU_SUBTYPE_ARM64_ALL,
            offset: 0,
            size: data.len() as u64,
            align: 14,
        };
        let err = Validator::new(Detector::default())
            .check_object(&data, Some(&slice), "u")
            .into_result()
            .unwrap_err();
        assert!(err.to_string().contains("does not match object file's mach header"));
    }

    #[test]
    fn test_check_is_idempotent() {
        let mut data = object();
        data.truncate(data.len() - 3);
        let mut validator = Validator::new(Detector::default());
        let first = validator.check_object(&data, None, "t.o");
        let second = validator.check_object(&data, None, "t.o");
        assert_eq!(first.error().map(|e| e.to_string()), second.error().map(|e| e.to_string()));
        assert!(first.is_bad());

        let data = object();
        assert!(validator.check_object(&data, None, "t.o").is_good());
        assert!(validator.check_object(&data, None, "t.o").is_good());
    }
}
