//! Architecture names and per-CPU properties.
//!
//! The table is ordered so that the first entry for each CPU type is that
//! type's generic ("all") flag, which doubles as its family. `arm64` is the
//! exception: it has no family, so an arm64 request only matches by subtype.

use std::fmt;

use crate::error::{Error, Result};
use crate::macho::*;
use crate::util::ByteSex;

/// A named (cputype, cpusubtype) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArchFlag {
    /// Name used on command lines
    pub name: &'static str,
    /// CPU type
    pub cputype: u32,
    /// CPU subtype
    pub cpusubtype: u32,
}

const fn flag(name: &'static str, cputype: u32, cpusubtype: u32) -> ArchFlag {
    ArchFlag {
        name,
        cputype,
        cpusubtype,
    }
}

/// All known architecture flags.
pub static ARCH_FLAGS: &[ArchFlag] = &[
    flag("any", CPU_TYPE_ANY, u32::MAX),
    flag("little", CPU_TYPE_ANY, CPU_SUBTYPE_LITTLE_ENDIAN),
    flag("big", CPU_TYPE_ANY, CPU_SUBTYPE_BIG_ENDIAN),
    // 64-bit families
    flag("ppc64", CPU_TYPE_POWERPC64, CPU_SUBTYPE_POWERPC_ALL),
    flag("x86_64", CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL),
    flag("x86_64h", CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_H),
    flag("arm64", CPU_TYPE_ARM64, CPU_SUBTYPE_ARM64_ALL),
    // 64-bit implementations
    flag("ppc970-64", CPU_TYPE_POWERPC64, CPU_SUBTYPE_POWERPC_970),
    flag("arm64_32", CPU_TYPE_ARM64_32, CPU_SUBTYPE_ARM64_32_V8),
    flag("arm64e", CPU_TYPE_ARM64, CPU_SUBTYPE_ARM64E),
    // 32-bit families
    flag("ppc", CPU_TYPE_POWERPC, CPU_SUBTYPE_POWERPC_ALL),
    flag("i386", CPU_TYPE_I386, CPU_SUBTYPE_I386_ALL),
    flag("m68k", CPU_TYPE_MC680X0, CPU_SUBTYPE_MC680X0_ALL),
    flag("hppa", CPU_TYPE_HPPA, CPU_SUBTYPE_HPPA_ALL),
    flag("sparc", CPU_TYPE_SPARC, CPU_SUBTYPE_SPARC_ALL),
    flag("m88k", CPU_TYPE_MC88000, CPU_SUBTYPE_MC88000_ALL),
    flag("i860", CPU_TYPE_I860, CPU_SUBTYPE_I860_ALL),
    flag("arm", CPU_TYPE_ARM, CPU_SUBTYPE_ARM_ALL),
    // 32-bit implementations
    flag("ppc601", CPU_TYPE_POWERPC, CPU_SUBTYPE_POWERPC_601),
    flag("ppc603", CPU_TYPE_POWERPC, CPU_SUBTYPE_POWERPC_603),
    flag("ppc603e", CPU_TYPE_POWERPC, CPU_SUBTYPE_POWERPC_603E),
    flag("ppc603ev", CPU_TYPE_POWERPC, CPU_SUBTYPE_POWERPC_603EV),
    flag("ppc604", CPU_TYPE_POWERPC, CPU_SUBTYPE_POWERPC_604),
    flag("ppc604e", CPU_TYPE_POWERPC, CPU_SUBTYPE_POWERPC_604E),
    flag("ppc750", CPU_TYPE_POWERPC, CPU_SUBTYPE_POWERPC_750),
    flag("ppc7400", CPU_TYPE_POWERPC, CPU_SUBTYPE_POWERPC_7400),
    flag("ppc7450", CPU_TYPE_POWERPC, CPU_SUBTYPE_POWERPC_7450),
    flag("ppc970", CPU_TYPE_POWERPC, CPU_SUBTYPE_POWERPC_970),
    flag("i486", CPU_TYPE_I386, CPU_SUBTYPE_486),
    flag("i486SX", CPU_TYPE_I386, CPU_SUBTYPE_486SX),
    flag("pentium", CPU_TYPE_I386, CPU_SUBTYPE_PENT),
    flag("i586", CPU_TYPE_I386, CPU_SUBTYPE_PENT),
    flag("pentpro", CPU_TYPE_I386, CPU_SUBTYPE_PENTPRO),
    flag("i686", CPU_TYPE_I386, CPU_SUBTYPE_PENTPRO),
    flag("pentIIm3", CPU_TYPE_I386, CPU_SUBTYPE_PENTII_M3),
    flag("pentIIm5", CPU_TYPE_I386, CPU_SUBTYPE_PENTII_M5),
    flag("pentium4", CPU_TYPE_I386, CPU_SUBTYPE_PENTIUM_4),
    flag("m68030", CPU_TYPE_MC680X0, CPU_SUBTYPE_MC68030_ONLY),
    flag("m68040", CPU_TYPE_MC680X0, CPU_SUBTYPE_MC68040),
    flag("hppa7100LC", CPU_TYPE_HPPA, CPU_SUBTYPE_HPPA_7100LC),
    flag("armv4t", CPU_TYPE_ARM, CPU_SUBTYPE_ARM_V4T),
    flag("armv5", CPU_TYPE_ARM, CPU_SUBTYPE_ARM_V5TEJ),
    flag("xscale", CPU_TYPE_ARM, CPU_SUBTYPE_ARM_XSCALE),
    flag("armv6", CPU_TYPE_ARM, CPU_SUBTYPE_ARM_V6),
    flag("armv6m", CPU_TYPE_ARM, CPU_SUBTYPE_ARM_V6M),
    flag("armv7", CPU_TYPE_ARM, CPU_SUBTYPE_ARM_V7),
    flag("armv7f", CPU_TYPE_ARM, CPU_SUBTYPE_ARM_V7F),
    flag("armv7s", CPU_TYPE_ARM, CPU_SUBTYPE_ARM_V7S),
    flag("armv7k", CPU_TYPE_ARM, CPU_SUBTYPE_ARM_V7K),
    flag("armv7m", CPU_TYPE_ARM, CPU_SUBTYPE_ARM_V7M),
    flag("armv7em", CPU_TYPE_ARM, CPU_SUBTYPE_ARM_V7EM),
    flag("arm64v8", CPU_TYPE_ARM64, CPU_SUBTYPE_ARM64_V8),
];

/// Per-CPU byte sex and default segment alignment.
struct CpuEntry {
    cputype: u32,
    byte_sex: ByteSex,
    segalign: u32,
}

static CPU_ENTRIES: &[CpuEntry] = &[
    CpuEntry { cputype: CPU_TYPE_ARM64, byte_sex: ByteSex::Little, segalign: 0x4000 },
    CpuEntry { cputype: CPU_TYPE_ARM64_32, byte_sex: ByteSex::Little, segalign: 0x4000 },
    CpuEntry { cputype: CPU_TYPE_ARM, byte_sex: ByteSex::Little, segalign: 0x4000 },
    CpuEntry { cputype: CPU_TYPE_X86_64, byte_sex: ByteSex::Little, segalign: 0x1000 },
    CpuEntry { cputype: CPU_TYPE_I386, byte_sex: ByteSex::Little, segalign: 0x1000 },
    CpuEntry { cputype: CPU_TYPE_POWERPC, byte_sex: ByteSex::Big, segalign: 0x1000 },
    CpuEntry { cputype: CPU_TYPE_POWERPC64, byte_sex: ByteSex::Big, segalign: 0x1000 },
    CpuEntry { cputype: CPU_TYPE_MC680X0, byte_sex: ByteSex::Big, segalign: 0x2000 },
    CpuEntry { cputype: CPU_TYPE_MC88000, byte_sex: ByteSex::Big, segalign: 0x2000 },
    CpuEntry { cputype: CPU_TYPE_SPARC, byte_sex: ByteSex::Big, segalign: 0x2000 },
    CpuEntry { cputype: CPU_TYPE_I860, byte_sex: ByteSex::Big, segalign: 0x2000 },
    CpuEntry { cputype: CPU_TYPE_HPPA, byte_sex: ByteSex::Big, segalign: 0x2000 },
];

/// How a requested architecture matched a slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchMatch {
    /// Same CPU type and subtype (capability bits ignored).
    Exact,
    /// Same CPU type, related through the type's family flag.
    Family,
    /// Unrelated.
    None,
}

impl ArchFlag {
    /// Looks up a flag by name.
    pub fn by_name(name: &str) -> Option<&'static ArchFlag> {
        ARCH_FLAGS.iter().find(|f| f.name == name)
    }

    /// Looks up a flag by name, failing with `UnknownArchFlag`.
    pub fn parse(name: &str) -> Result<ArchFlag> {
        Self::by_name(name)
            .copied()
            .ok_or_else(|| Error::UnknownArchFlag(name.to_string()))
    }

    /// Looks up a flag by CPU type and subtype, ignoring capability bits.
    pub fn by_types(cputype: u32, cpusubtype: u32) -> Option<&'static ArchFlag> {
        ARCH_FLAGS.iter().find(|f| {
            f.cputype != CPU_TYPE_ANY
                && f.cputype == cputype
                && (f.cpusubtype & !CPU_SUBTYPE_MASK) == (cpusubtype & !CPU_SUBTYPE_MASK)
        })
    }

    /// Printable name for a CPU pair, known or not.
    pub fn display_name(cputype: u32, cpusubtype: u32) -> String {
        match Self::by_types(cputype, cpusubtype) {
            Some(f) => f.name.to_string(),
            None => format!(
                "cputype ({}) cpusubtype ({})",
                cputype as i32,
                (cpusubtype & !CPU_SUBTYPE_MASK) as i32
            ),
        }
    }

    /// The family flag of a CPU type: the first table entry for that type.
    /// arm64 has no family.
    pub fn family(cputype: u32) -> Option<&'static ArchFlag> {
        if cputype == CPU_TYPE_ARM64 || cputype == CPU_TYPE_ANY {
            return None;
        }
        ARCH_FLAGS.iter().find(|f| f.cputype == cputype)
    }

    /// Byte sex natively used by a CPU type.
    pub fn byte_sex_of(cputype: u32) -> Option<ByteSex> {
        CPU_ENTRIES
            .iter()
            .find(|e| e.cputype == cputype)
            .map(|e| e.byte_sex)
    }

    /// Default fat slice alignment (log2 of the segment alignment).
    pub fn segalign_of(cputype: u32) -> u32 {
        CPU_ENTRIES
            .iter()
            .find(|e| e.cputype == cputype)
            .map_or(0x1000u32, |e| e.segalign)
            .trailing_zeros()
    }

    /// CPU types whose archives must agree on subtype as well as type.
    pub fn subtype_sensitive(cputype: u32) -> bool {
        cputype == CPU_TYPE_ARM
    }

    /// Returns true if this flag is the family flag of its CPU type.
    pub fn is_family(&self) -> bool {
        Self::family(self.cputype).is_some_and(|f| {
            (f.cpusubtype & !CPU_SUBTYPE_MASK) == (self.cpusubtype & !CPU_SUBTYPE_MASK)
        })
    }

    /// Compares this requested flag against a slice's CPU pair.
    pub fn matches(&self, cputype: u32, cpusubtype: u32) -> ArchMatch {
        if self.cputype != cputype {
            return ArchMatch::None;
        }
        let wanted = self.cpusubtype & !CPU_SUBTYPE_MASK;
        let have = cpusubtype & !CPU_SUBTYPE_MASK;
        if wanted == have {
            return ArchMatch::Exact;
        }
        match Self::family(cputype) {
            Some(_) if self.is_family() => ArchMatch::Family,
            Some(family) if (family.cpusubtype & !CPU_SUBTYPE_MASK) == have => ArchMatch::Family,
            _ => ArchMatch::None,
        }
    }
}

impl fmt::Display for ArchFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
