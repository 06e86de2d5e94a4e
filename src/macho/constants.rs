//! Mach-O, fat and archive constants.

use bitflags::bitflags;

// =============================================================================
// Magic Numbers
// =============================================================================

/// 32-bit Mach-O magic in the file's own byte sex
pub const MH_MAGIC: u32 = 0xFEED_FACE;
/// 32-bit Mach-O magic as read from a file of the opposite byte sex
pub const MH_CIGAM: u32 = 0xCEFA_EDFE;
/// 64-bit Mach-O magic
pub const MH_MAGIC_64: u32 = 0xFEED_FACF;
/// 64-bit Mach-O magic, opposite byte sex
pub const MH_CIGAM_64: u32 = 0xCFFA_EDFE;

/// Fat header magic (always stored big-endian)
pub const FAT_MAGIC: u32 = 0xCAFE_BABE;
/// Fat header magic, as read on a little-endian host
pub const FAT_CIGAM: u32 = 0xBEBA_FECA;
/// Fat header magic with 64-bit slice table entries
pub const FAT_MAGIC_64: u32 = 0xCAFE_BABF;
/// 64-bit fat magic, as read on a little-endian host
pub const FAT_CIGAM_64: u32 = 0xBFBA_FECA;

/// Archive magic string
pub const ARMAG: &[u8; 8] = b"!<arch>\n";
/// Length of [`ARMAG`]
pub const SARMAG: usize = 8;
/// Archive header trailer
pub const ARFMAG: &[u8; 2] = b"`\n";
/// Extended format #1 long-name marker
pub const AR_EFMT1: &[u8; 3] = b"#1/";

/// 32-bit table of contents, unsorted
pub const SYMDEF: &str = "__.SYMDEF";
/// 32-bit table of contents, sorted
pub const SYMDEF_SORTED: &str = "__.SYMDEF SORTED";
/// 64-bit table of contents, unsorted
pub const SYMDEF_64: &str = "__.SYMDEF_64";
/// 64-bit table of contents, sorted
pub const SYMDEF_64_SORTED: &str = "__.SYMDEF_64 SORTED";
/// Name of the System V long-name string table member
pub const SYSV_STRING_TABLE: &str = "// ";

/// LLVM bitcode wrapper magic
pub const BITCODE_WRAPPER_MAGIC: u32 = 0x0B17_C0DE;
/// Raw LLVM bitcode magic ('BC' 0xC0DE)
pub const BITCODE_MAGIC: &[u8; 4] = b"BC\xC0\xDE";

/// Largest fat slice alignment exponent
pub const MAXSECTALIGN: u32 = 15;

// =============================================================================
// File Types
// =============================================================================

/// Relocatable object file
pub const MH_OBJECT: u32 = 0x1;
/// Demand paged executable
pub const MH_EXECUTE: u32 = 0x2;
/// Fixed VM shared library
pub const MH_FVMLIB: u32 = 0x3;
/// Core file
pub const MH_CORE: u32 = 0x4;
/// Preloaded executable
pub const MH_PRELOAD: u32 = 0x5;
/// Dynamic shared library
pub const MH_DYLIB: u32 = 0x6;
/// Dynamic linker
pub const MH_DYLINKER: u32 = 0x7;
/// Bundle
pub const MH_BUNDLE: u32 = 0x8;
/// Shared library stub (no section contents)
pub const MH_DYLIB_STUB: u32 = 0x9;
/// Companion debug symbols file
pub const MH_DSYM: u32 = 0xA;
/// Kernel extension
pub const MH_KEXT_BUNDLE: u32 = 0xB;
/// Set of Mach-O files
pub const MH_FILESET: u32 = 0xC;

/// Returns a short name for a file type.
pub fn filetype_name(filetype: u32) -> &'static str {
    match filetype {
        MH_OBJECT => "OBJECT",
        MH_EXECUTE => "EXECUTE",
        MH_FVMLIB => "FVMLIB",
        MH_CORE => "CORE",
        MH_PRELOAD => "PRELOAD",
        MH_DYLIB => "DYLIB",
        MH_DYLINKER => "DYLINKER",
        MH_BUNDLE => "BUNDLE",
        MH_DYLIB_STUB => "DYLIB_STUB",
        MH_DSYM => "DSYM",
        MH_KEXT_BUNDLE => "KEXT_BUNDLE",
        MH_FILESET => "FILESET",
        _ => "UNKNOWN",
    }
}

// =============================================================================
// CPU Types
// =============================================================================

/// 64-bit ABI bit
pub const CPU_ARCH_ABI64: u32 = 0x0100_0000;
/// ILP32 on a 64-bit CPU
pub const CPU_ARCH_ABI64_32: u32 = 0x0200_0000;

/// Wildcard CPU type
pub const CPU_TYPE_ANY: u32 = u32::MAX;
/// Motorola 680x0
pub const CPU_TYPE_MC680X0: u32 = 6;
/// Intel x86
pub const CPU_TYPE_X86: u32 = 7;
/// Alias of [`CPU_TYPE_X86`]
pub const CPU_TYPE_I386: u32 = CPU_TYPE_X86;
/// x86_64
pub const CPU_TYPE_X86_64: u32 = CPU_TYPE_X86 | CPU_ARCH_ABI64;
/// Motorola 98000
pub const CPU_TYPE_MC98000: u32 = 10;
/// HP PA-RISC
pub const CPU_TYPE_HPPA: u32 = 11;
/// 32-bit ARM
pub const CPU_TYPE_ARM: u32 = 12;
/// ARM64
pub const CPU_TYPE_ARM64: u32 = CPU_TYPE_ARM | CPU_ARCH_ABI64;
/// ARM64 with 32-bit pointers
pub const CPU_TYPE_ARM64_32: u32 = CPU_TYPE_ARM | CPU_ARCH_ABI64_32;
/// Motorola 88000
pub const CPU_TYPE_MC88000: u32 = 13;
/// SPARC
pub const CPU_TYPE_SPARC: u32 = 14;
/// Intel i860
pub const CPU_TYPE_I860: u32 = 15;
/// PowerPC
pub const CPU_TYPE_POWERPC: u32 = 18;
/// 64-bit PowerPC
pub const CPU_TYPE_POWERPC64: u32 = CPU_TYPE_POWERPC | CPU_ARCH_ABI64;
/// VEO
pub const CPU_TYPE_VEO: u32 = 255;

// =============================================================================
// CPU Subtypes
// =============================================================================

/// Capability bits of a CPU subtype
pub const CPU_SUBTYPE_MASK: u32 = 0xFF00_0000;
/// 64-bit libraries capability bit
pub const CPU_SUBTYPE_LIB64: u32 = 0x8000_0000;

/// Little-endian wildcard
pub const CPU_SUBTYPE_LITTLE_ENDIAN: u32 = 0;
/// Big-endian wildcard
pub const CPU_SUBTYPE_BIG_ENDIAN: u32 = 1;

/// Builds an Intel subtype from family and model.
pub const fn cpu_subtype_intel(family: u32, model: u32) -> u32 {
    family + (model << 4)
}

/// i386 all
pub const CPU_SUBTYPE_I386_ALL: u32 = cpu_subtype_intel(3, 0);
/// i486
pub const CPU_SUBTYPE_486: u32 = cpu_subtype_intel(4, 0);
/// i486SX
pub const CPU_SUBTYPE_486SX: u32 = cpu_subtype_intel(4, 8);
/// Pentium
pub const CPU_SUBTYPE_PENT: u32 = cpu_subtype_intel(5, 0);
/// Pentium Pro
pub const CPU_SUBTYPE_PENTPRO: u32 = cpu_subtype_intel(6, 1);
/// Pentium II model 3
pub const CPU_SUBTYPE_PENTII_M3: u32 = cpu_subtype_intel(6, 3);
/// Pentium II model 5
pub const CPU_SUBTYPE_PENTII_M5: u32 = cpu_subtype_intel(6, 5);
/// Pentium 4
pub const CPU_SUBTYPE_PENTIUM_4: u32 = cpu_subtype_intel(10, 0);

/// x86_64 all
pub const CPU_SUBTYPE_X86_64_ALL: u32 = 3;
/// x86_64 Haswell
pub const CPU_SUBTYPE_X86_64_H: u32 = 8;

/// ARM all
pub const CPU_SUBTYPE_ARM_ALL: u32 = 0;
/// ARM v4t
pub const CPU_SUBTYPE_ARM_V4T: u32 = 5;
/// ARM v6
pub const CPU_SUBTYPE_ARM_V6: u32 = 6;
/// ARM v5tej
pub const CPU_SUBTYPE_ARM_V5TEJ: u32 = 7;
/// ARM XScale
pub const CPU_SUBTYPE_ARM_XSCALE: u32 = 8;
/// ARM v7
pub const CPU_SUBTYPE_ARM_V7: u32 = 9;
/// ARM v7f
pub const CPU_SUBTYPE_ARM_V7F: u32 = 10;
/// ARM v7s
pub const CPU_SUBTYPE_ARM_V7S: u32 = 11;
/// ARM v7k
pub const CPU_SUBTYPE_ARM_V7K: u32 = 12;
/// ARM v8
pub const CPU_SUBTYPE_ARM_V8: u32 = 13;
/// ARM v6m
pub const CPU_SUBTYPE_ARM_V6M: u32 = 14;
/// ARM v7m
pub const CPU_SUBTYPE_ARM_V7M: u32 = 15;
/// ARM v7em
pub const CPU_SUBTYPE_ARM_V7EM: u32 = 16;

/// ARM64 all
pub const CPU_SUBTYPE_ARM64_ALL: u32 = 0;
/// ARM64 v8
pub const CPU_SUBTYPE_ARM64_V8: u32 = 1;
/// ARM64e (pointer authentication)
pub const CPU_SUBTYPE_ARM64E: u32 = 2;
/// ARM64_32 v8
pub const CPU_SUBTYPE_ARM64_32_V8: u32 = 1;

/// PowerPC all
pub const CPU_SUBTYPE_POWERPC_ALL: u32 = 0;
/// PowerPC 601
pub const CPU_SUBTYPE_POWERPC_601: u32 = 1;
/// PowerPC 603
pub const CPU_SUBTYPE_POWERPC_603: u32 = 3;
/// PowerPC 603E
pub const CPU_SUBTYPE_POWERPC_603E: u32 = 4;
/// PowerPC 603EV
pub const CPU_SUBTYPE_POWERPC_603EV: u32 = 5;
/// PowerPC 604
pub const CPU_SUBTYPE_POWERPC_604: u32 = 6;
/// PowerPC 604E
pub const CPU_SUBTYPE_POWERPC_604E: u32 = 7;
/// PowerPC 750
pub const CPU_SUBTYPE_POWERPC_750: u32 = 9;
/// PowerPC 7400
pub const CPU_SUBTYPE_POWERPC_7400: u32 = 10;
/// PowerPC 7450
pub const CPU_SUBTYPE_POWERPC_7450: u32 = 11;
/// PowerPC 970
pub const CPU_SUBTYPE_POWERPC_970: u32 = 100;

/// m68k all
pub const CPU_SUBTYPE_MC680X0_ALL: u32 = 1;
/// MC68030 only
pub const CPU_SUBTYPE_MC68030_ONLY: u32 = 3;
/// MC68040
pub const CPU_SUBTYPE_MC68040: u32 = 2;
/// HPPA all
pub const CPU_SUBTYPE_HPPA_ALL: u32 = 0;
/// HPPA 7100LC
pub const CPU_SUBTYPE_HPPA_7100LC: u32 = 1;
/// m88k all
pub const CPU_SUBTYPE_MC88000_ALL: u32 = 0;
/// SPARC all
pub const CPU_SUBTYPE_SPARC_ALL: u32 = 0;
/// i860 all
pub const CPU_SUBTYPE_I860_ALL: u32 = 0;

// =============================================================================
// Load Commands
// =============================================================================

/// Set on load commands dyld must understand
pub const LC_REQ_DYLD: u32 = 0x8000_0000;

/// 32-bit segment of this file
pub const LC_SEGMENT: u32 = 0x1;
/// Link-edit stab symbol table info
pub const LC_SYMTAB: u32 = 0x2;
/// Link-edit gdb symbol table info (obsolete)
pub const LC_SYMSEG: u32 = 0x3;
/// Thread
pub const LC_THREAD: u32 = 0x4;
/// Unix thread (includes a stack)
pub const LC_UNIXTHREAD: u32 = 0x5;
/// Load a fixed VM shared library
pub const LC_LOADFVMLIB: u32 = 0x6;
/// Fixed VM shared library identification
pub const LC_IDFVMLIB: u32 = 0x7;
/// Object identification info (obsolete)
pub const LC_IDENT: u32 = 0x8;
/// Fixed VM file inclusion
pub const LC_FVMFILE: u32 = 0x9;
/// Prepage command
pub const LC_PREPAGE: u32 = 0xA;
/// Dynamic link-edit symbol table info
pub const LC_DYSYMTAB: u32 = 0xB;
/// Load a dynamically linked shared library
pub const LC_LOAD_DYLIB: u32 = 0xC;
/// Dynamically linked shared library identification
pub const LC_ID_DYLIB: u32 = 0xD;
/// Load a dynamic linker
pub const LC_LOAD_DYLINKER: u32 = 0xE;
/// Dynamic linker identification
pub const LC_ID_DYLINKER: u32 = 0xF;
/// Modules prebound for a dynamic library
pub const LC_PREBOUND_DYLIB: u32 = 0x10;
/// Image routines
pub const LC_ROUTINES: u32 = 0x11;
/// Sub framework
pub const LC_SUB_FRAMEWORK: u32 = 0x12;
/// Sub umbrella
pub const LC_SUB_UMBRELLA: u32 = 0x13;
/// Sub client
pub const LC_SUB_CLIENT: u32 = 0x14;
/// Sub library
pub const LC_SUB_LIBRARY: u32 = 0x15;
/// Two-level namespace lookup hints
pub const LC_TWOLEVEL_HINTS: u32 = 0x16;
/// Prebind checksum
pub const LC_PREBIND_CKSUM: u32 = 0x17;
/// Load a dylib allowed to be missing
pub const LC_LOAD_WEAK_DYLIB: u32 = 0x18 | LC_REQ_DYLD;
/// 64-bit segment of this file
pub const LC_SEGMENT_64: u32 = 0x19;
/// 64-bit image routines
pub const LC_ROUTINES_64: u32 = 0x1A;
/// The UUID
pub const LC_UUID: u32 = 0x1B;
/// Runpath additions
pub const LC_RPATH: u32 = 0x1C | LC_REQ_DYLD;
/// Location of the code signature
pub const LC_CODE_SIGNATURE: u32 = 0x1D;
/// Location of the split segment info
pub const LC_SEGMENT_SPLIT_INFO: u32 = 0x1E;
/// Load and re-export a dylib
pub const LC_REEXPORT_DYLIB: u32 = 0x1F | LC_REQ_DYLD;
/// Delay load of a dylib until first use
pub const LC_LAZY_LOAD_DYLIB: u32 = 0x20;
/// Encrypted segment information
pub const LC_ENCRYPTION_INFO: u32 = 0x21;
/// Compressed dyld information
pub const LC_DYLD_INFO: u32 = 0x22;
/// Compressed dyld information only
pub const LC_DYLD_INFO_ONLY: u32 = 0x22 | LC_REQ_DYLD;
/// Load an upward dylib
pub const LC_LOAD_UPWARD_DYLIB: u32 = 0x23 | LC_REQ_DYLD;
/// Minimum macOS version
pub const LC_VERSION_MIN_MACOSX: u32 = 0x24;
/// Minimum iOS version
pub const LC_VERSION_MIN_IPHONEOS: u32 = 0x25;
/// Compressed table of function start addresses
pub const LC_FUNCTION_STARTS: u32 = 0x26;
/// Environment variable for dyld
pub const LC_DYLD_ENVIRONMENT: u32 = 0x27;
/// Replacement for LC_UNIXTHREAD
pub const LC_MAIN: u32 = 0x28 | LC_REQ_DYLD;
/// Table of non-instructions in __text
pub const LC_DATA_IN_CODE: u32 = 0x29;
/// Source version used to build the binary
pub const LC_SOURCE_VERSION: u32 = 0x2A;
/// Code signing DRs copied from linked dylibs
pub const LC_DYLIB_CODE_SIGN_DRS: u32 = 0x2B;
/// 64-bit encrypted segment information
pub const LC_ENCRYPTION_INFO_64: u32 = 0x2C;
/// Linker options in MH_OBJECT files
pub const LC_LINKER_OPTION: u32 = 0x2D;
/// Optimization hints in MH_OBJECT files
pub const LC_LINKER_OPTIMIZATION_HINT: u32 = 0x2E;
/// Minimum tvOS version
pub const LC_VERSION_MIN_TVOS: u32 = 0x2F;
/// Minimum watchOS version
pub const LC_VERSION_MIN_WATCHOS: u32 = 0x30;
/// Arbitrary data in the file
pub const LC_NOTE: u32 = 0x31;
/// Platform, minimum OS and SDK versions
pub const LC_BUILD_VERSION: u32 = 0x32;
/// Exports trie in __LINKEDIT
pub const LC_DYLD_EXPORTS_TRIE: u32 = 0x33 | LC_REQ_DYLD;
/// Chained fixups in __LINKEDIT
pub const LC_DYLD_CHAINED_FIXUPS: u32 = 0x34 | LC_REQ_DYLD;
/// Mach-O contained in a fileset
pub const LC_FILESET_ENTRY: u32 = 0x35 | LC_REQ_DYLD;

/// Returns the conventional name of a load command.
pub fn load_command_name(cmd: u32) -> &'static str {
    match cmd {
        LC_SEGMENT => "LC_SEGMENT",
        LC_SYMTAB => "LC_SYMTAB",
        LC_SYMSEG => "LC_SYMSEG",
        LC_THREAD => "LC_THREAD",
        LC_UNIXTHREAD => "LC_UNIXTHREAD",
        LC_LOADFVMLIB => "LC_LOADFVMLIB",
        LC_IDFVMLIB => "LC_IDFVMLIB",
        LC_IDENT => "LC_IDENT",
        LC_FVMFILE => "LC_FVMFILE",
        LC_PREPAGE => "LC_PREPAGE",
        LC_DYSYMTAB => "LC_DYSYMTAB",
        LC_LOAD_DYLIB => "LC_LOAD_DYLIB",
        LC_ID_DYLIB => "LC_ID_DYLIB",
        LC_LOAD_DYLINKER => "LC_LOAD_DYLINKER",
        LC_ID_DYLINKER => "LC_ID_DYLINKER",
        LC_PREBOUND_DYLIB => "LC_PREBOUND_DYLIB",
        LC_ROUTINES => "LC_ROUTINES",
        LC_SUB_FRAMEWORK => "LC_SUB_FRAMEWORK",
        LC_SUB_UMBRELLA => "LC_SUB_UMBRELLA",
        LC_SUB_CLIENT => "LC_SUB_CLIENT",
        LC_SUB_LIBRARY => "LC_SUB_LIBRARY",
        LC_TWOLEVEL_HINTS => "LC_TWOLEVEL_HINTS",
        LC_PREBIND_CKSUM => "LC_PREBIND_CKSUM",
        LC_LOAD_WEAK_DYLIB => "LC_LOAD_WEAK_DYLIB",
        LC_SEGMENT_64 => "LC_SEGMENT_64",
        LC_ROUTINES_64 => "LC_ROUTINES_64",
        LC_UUID => "LC_UUID",
        LC_RPATH => "LC_RPATH",
        LC_CODE_SIGNATURE => "LC_CODE_SIGNATURE",
        LC_SEGMENT_SPLIT_INFO => "LC_SEGMENT_SPLIT_INFO",
        LC_REEXPORT_DYLIB => "LC_REEXPORT_DYLIB",
        LC_LAZY_LOAD_DYLIB => "LC_LAZY_LOAD_DYLIB",
        LC_ENCRYPTION_INFO => "LC_ENCRYPTION_INFO",
        LC_DYLD_INFO => "LC_DYLD_INFO",
        LC_DYLD_INFO_ONLY => "LC_DYLD_INFO_ONLY",
        LC_LOAD_UPWARD_DYLIB => "LC_LOAD_UPWARD_DYLIB",
        LC_VERSION_MIN_MACOSX => "LC_VERSION_MIN_MACOSX",
        LC_VERSION_MIN_IPHONEOS => "LC_VERSION_MIN_IPHONEOS",
        LC_FUNCTION_STARTS => "LC_FUNCTION_STARTS",
        LC_DYLD_ENVIRONMENT => "LC_DYLD_ENVIRONMENT",
        LC_MAIN => "LC_MAIN",
        LC_DATA_IN_CODE => "LC_DATA_IN_CODE",
        LC_SOURCE_VERSION => "LC_SOURCE_VERSION",
        LC_DYLIB_CODE_SIGN_DRS => "LC_DYLIB_CODE_SIGN_DRS",
        LC_ENCRYPTION_INFO_64 => "LC_ENCRYPTION_INFO_64",
        LC_LINKER_OPTION => "LC_LINKER_OPTION",
        LC_LINKER_OPTIMIZATION_HINT => "LC_LINKER_OPTIMIZATION_HINT",
        LC_VERSION_MIN_TVOS => "LC_VERSION_MIN_TVOS",
        LC_VERSION_MIN_WATCHOS => "LC_VERSION_MIN_WATCHOS",
        LC_NOTE => "LC_NOTE",
        LC_BUILD_VERSION => "LC_BUILD_VERSION",
        LC_DYLD_EXPORTS_TRIE => "LC_DYLD_EXPORTS_TRIE",
        LC_DYLD_CHAINED_FIXUPS => "LC_DYLD_CHAINED_FIXUPS",
        LC_FILESET_ENTRY => "LC_FILESET_ENTRY",
        _ => "LC_???",
    }
}

// =============================================================================
// Sections
// =============================================================================

/// Section type mask
pub const SECTION_TYPE: u32 = 0x0000_00FF;
/// Zero fill on demand
pub const S_ZEROFILL: u32 = 0x1;
/// Zero fill on demand, may exceed 4GB
pub const S_GB_ZEROFILL: u32 = 0xC;
/// Thread local zerofill
pub const S_THREAD_LOCAL_ZEROFILL: u32 = 0x12;

/// Symbols in this section are never put in an archive table of contents
pub const S_ATTR_NO_TOC: u32 = 0x4000_0000;

/// Returns true for section types that occupy no file space.
#[inline]
pub fn is_zerofill(flags: u32) -> bool {
    matches!(
        flags & SECTION_TYPE,
        S_ZEROFILL | S_GB_ZEROFILL | S_THREAD_LOCAL_ZEROFILL
    )
}

// =============================================================================
// Symbols
// =============================================================================

/// Debugging entry bits
pub const N_STAB: u8 = 0xE0;
/// Private external bit
pub const N_PEXT: u8 = 0x10;
/// Type bits
pub const N_TYPE: u8 = 0x0E;
/// External bit
pub const N_EXT: u8 = 0x01;

/// Undefined (or common when n_value != 0)
pub const N_UNDF: u8 = 0x0;
/// Absolute
pub const N_ABS: u8 = 0x2;
/// Defined in section n_sect
pub const N_SECT: u8 = 0xE;
/// Prebound undefined
pub const N_PBUD: u8 = 0xC;
/// Indirect
pub const N_INDR: u8 = 0xA;

/// Section number meaning "no section"
pub const NO_SECT: u8 = 0;

// =============================================================================
// Header Flags
// =============================================================================

bitflags! {
    /// Mach-O header flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MachOFlags: u32 {
        /// No undefined references
        const NOUNDEFS = 0x1;
        /// Output of an incremental link
        const INCRLINK = 0x2;
        /// Input for the dynamic linker
        const DYLDLINK = 0x4;
        /// Undefined references bound at load
        const BINDATLOAD = 0x8;
        /// Prebound
        const PREBOUND = 0x10;
        /// Split read-only and read-write segments
        const SPLIT_SEGS = 0x20;
        /// Two-level namespace bindings
        const TWOLEVEL = 0x80;
        /// Forced flat namespace
        const FORCE_FLAT = 0x100;
        /// Sections may be divided via symbols
        const SUBSECTIONS_VIA_SYMBOLS = 0x2000;
        /// Contains external weak symbols
        const WEAK_DEFINES = 0x8000;
        /// Uses weak symbols
        const BINDS_TO_WEAK = 0x10000;
        /// Loaded at a random address
        const PIE = 0x200000;
        /// Contains thread local variable descriptors
        const HAS_TLV_DESCRIPTORS = 0x800000;
        /// Safe for application extensions
        const APP_EXTENSION_SAFE = 0x2000000;
        /// Part of the dyld shared cache
        const DYLIB_IN_CACHE = 0x80000000;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_pairs_are_swapped() {
        assert_eq!(MH_MAGIC.swap_bytes(), MH_CIGAM);
        assert_eq!(MH_MAGIC_64.swap_bytes(), MH_CIGAM_64);
        assert_eq!(FAT_MAGIC.swap_bytes(), FAT_CIGAM);
        assert_eq!(FAT_MAGIC_64.swap_bytes(), FAT_CIGAM_64);
    }

    #[test]
    fn test_zerofill_and_names() {
        assert!(is_zerofill(S_ZEROFILL | S_ATTR_NO_TOC));
        assert!(is_zerofill(S_THREAD_LOCAL_ZEROFILL));
        assert!(!is_zerofill(0));
        assert_eq!(load_command_name(LC_DYLD_CHAINED_FIXUPS), "LC_DYLD_CHAINED_FIXUPS");
        assert_eq!(load_command_name(0x7777), "LC_???");
        assert_eq!(filetype_name(MH_DSYM), "DSYM");
        assert_eq!(CPU_SUBTYPE_PENTII_M5, 0x56);
    }
}
