//! Decoded fat slice table.

use std::fmt;

use super::structs::*;
use crate::arch::{ArchFlag, ArchMatch};
use crate::error::{Error, Result};
use crate::macho::{CPU_SUBTYPE_MASK, FAT_MAGIC, FAT_MAGIC_64};
use crate::util::{decode, encode_into, ByteSex};

/// Returns `Some(is_64)` if `data` starts with a fat magic.
pub fn fat_magic(data: &[u8]) -> Option<bool> {
    match ByteSex::Big.read_u32_at(data, 0)? {
        FAT_MAGIC => Some(false),
        FAT_MAGIC_64 => Some(true),
        _ => None,
    }
}

/// One architecture slice of a fat container, in host byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatSlice {
    /// CPU type
    pub cputype: u32,
    /// CPU subtype
    pub cpusubtype: u32,
    /// File offset of the slice
    pub offset: u64,
    /// Size of the slice
    pub size: u64,
    /// Alignment as a power of two
    pub align: u32,
}

impl FatSlice {
    /// Name of this slice's architecture.
    pub fn arch_name(&self) -> String {
        ArchFlag::display_name(self.cputype, self.cpusubtype)
    }

    /// The (cputype, cpusubtype-without-capability-bits) identity.
    pub fn identity(&self) -> (u32, u32) {
        (self.cputype, self.cpusubtype & !CPU_SUBTYPE_MASK)
    }

    /// Byte range of the slice; callers must have validated it.
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset as usize..(self.offset + self.size) as usize
    }
}

impl fmt::Display for FatSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} offset {} size {} align 2^{} ({})",
            self.arch_name(),
            self.offset,
            self.size,
            self.align,
            1u64 << self.align.min(63)
        )
    }
}

/// A fat header with its slice table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FatTable {
    /// True for FAT_MAGIC_64 tables
    pub is_64: bool,
    /// Slices in table order
    pub slices: Vec<FatSlice>,
}

impl FatTable {
    /// Decodes the fat header and slice table at the start of `data`.
    ///
    /// Only checks that the table itself fits; slice ranges are checked by
    /// the validator.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let is_64 = fat_magic(data).ok_or_else(|| Error::fat("bad fat magic"))?;
        let header: FatHeader = decode(data, 0, ByteSex::Big)
            .map_err(|_| Error::fat("file size too small for fat header"))?;
        let entry = if is_64 { FatArch64::SIZE } else { FatArch::SIZE };
        let table_end = (header.nfat_arch as u64) * entry as u64 + FatHeader::SIZE as u64;
        if table_end > data.len() as u64 {
            return Err(Error::fat(
                "fat_arch structs would extend past the end of the file",
            ));
        }

        let mut slices = Vec::with_capacity(header.nfat_arch as usize);
        for i in 0..header.nfat_arch as usize {
            let offset = FatHeader::SIZE + i * entry;
            let slice = if is_64 {
                let arch: FatArch64 = decode(data, offset, ByteSex::Big)?;
                FatSlice {
                    cputype: arch.cputype,
                    cpusubtype: arch.cpusubtype,
                    offset: arch.offset,
                    size: arch.size,
                    align: arch.align,
                }
            } else {
                let arch: FatArch = decode(data, offset, ByteSex::Big)?;
                FatSlice {
                    cputype: arch.cputype,
                    cpusubtype: arch.cpusubtype,
                    offset: arch.offset.into(),
                    size: arch.size.into(),
                    align: arch.align,
                }
            };
            slices.push(slice);
        }
        Ok(Self { is_64, slices })
    }

    /// Number of slices.
    #[inline]
    pub fn len(&self) -> usize {
        self.slices.len()
    }

    /// Returns true if the table has no slices.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// Size of the header plus slice table.
    pub fn header_size(&self) -> usize {
        let entry = if self.is_64 { FatArch64::SIZE } else { FatArch::SIZE };
        FatHeader::SIZE + self.slices.len() * entry
    }

    /// Finds the slice for `flag`, preferring an exact subtype match over a
    /// family match.
    pub fn find(&self, flag: &ArchFlag) -> Option<usize> {
        self.slices
            .iter()
            .position(|s| flag.matches(s.cputype, s.cpusubtype) == ArchMatch::Exact)
            .or_else(|| {
                self.slices
                    .iter()
                    .position(|s| flag.matches(s.cputype, s.cpusubtype) == ArchMatch::Family)
            })
    }

    /// Encodes the header and slice table (big-endian).
    pub fn encode_into(&self, out: &mut [u8]) -> Result<()> {
        let magic = if self.is_64 { FAT_MAGIC_64 } else { FAT_MAGIC };
        let header = FatHeader {
            magic,
            nfat_arch: self.slices.len() as u32,
        };
        encode_into(&header, ByteSex::Big, out)?;
        let mut offset = FatHeader::SIZE;
        for slice in &self.slices {
            let target = out
                .get_mut(offset..)
                .ok_or_else(|| Error::internal("fat header buffer too small"))?;
            if self.is_64 {
                let arch = FatArch64 {
                    cputype: slice.cputype,
                    cpusubtype: slice.cpusubtype,
                    offset: slice.offset,
                    size: slice.size,
                    align: slice.align,
                    reserved: 0,
                };
                encode_into(&arch, ByteSex::Big, target)?;
                offset += FatArch64::SIZE;
            } else {
                let too_large = |what, value: u64| Error::TooLarge { what, width: 32, value };
                let arch = FatArch {
                    cputype: slice.cputype,
                    cpusubtype: slice.cpusubtype,
                    offset: u32::try_from(slice.offset)
                        .map_err(|_| too_large("fat slice offset", slice.offset))?,
                    size: u32::try_from(slice.size)
                        .map_err(|_| too_large("fat slice size", slice.size))?,
                    align: slice.align,
                };
                encode_into(&arch, ByteSex::Big, target)?;
                offset += FatArch::SIZE;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::macho::*;

    /// Lays out `slices` (cputype, cpusubtype, align, content) into a fat file.
    pub(crate) fn build_fat(is_64: bool, slices: &[(u32, u32, u32, &[u8])]) -> Vec<u8> {
        let mut table = FatTable {
            is_64,
            slices: Vec::new(),
        };
        for &(cputype, cpusubtype, align, content) in slices {
            table.slices.push(FatSlice {
                cputype,
                cpusubtype,
                offset: 0,
                size: content.len() as u64,
                align,
            });
        }
        let mut offset = table.header_size() as u64;
        for slice in &mut table.slices {
            offset = crate::util::align_up(offset, 1 << slice.align);
            slice.offset = offset;
            offset += slice.size;
        }
        let mut out = vec![0u8; offset as usize];
        table.encode_into(&mut out).unwrap();
        for (slice, &(.., content)) in table.slices.iter().zip(slices) {
            out[slice.range()].copy_from_slice(content);
        }
        out
    }

    #[test]
    fn test_parse_roundtrip_and_find() {
        let a = [1u8; 16];
        let b = [2u8; 16];
        let data = build_fat(
            false,
            &[(CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL, 12, &a), (CPU_TYPE_ARM, CPU_SUBTYPE_ARM_ALL, 14, &b)],
        );
        assert_eq!(fat_magic(&data), Some(false));
        let table = FatTable::parse(&data).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.slices[0].offset, 0x1000);
        assert_eq!(table.slices[1].offset, 0x4000);
        assert_eq!(&data[table.slices[1].range()], &b);

        let armv7s = ArchFlag::by_name("armv7s").unwrap();
        assert_eq!(table.find(armv7s), Some(1));
        let arm64 = ArchFlag::by_name("arm64").unwrap();
        assert_eq!(table.find(arm64), None);
    }

    #[test]
    fn test_exact_preferred_over_family() {
        let x = [0u8; 4];
        let data = build_fat(
            false,
            &[(CPU_TYPE_ARM, CPU_SUBTYPE_ARM_ALL, 2, &x), (CPU_TYPE_ARM, CPU_SUBTYPE_ARM_V7S, 2, &x)],
        );
        let table = FatTable::parse(&data).unwrap();
        assert_eq!(table.find(ArchFlag::by_name("armv7s").unwrap()), Some(1));
    }

    #[test]
    fn test_truncated_table() {
        let mut data = build_fat(true, &[(CPU_TYPE_ARM64, 0, 3, &[0u8; 8])]);
        assert_eq!(fat_magic(&data), Some(true));
        data.truncate(FatHeader::SIZE + 4);
        assert!(matches!(FatTable::parse(&data), Err(Error::MalformedFat { .. })));
    }

    #[test]
    fn test_32bit_encode_rejects_large() {
        let table = FatTable {
            is_64: false,
            slices: vec![FatSlice { cputype: 7, cpusubtype: 3, offset: 1 << 33, size: 1, align: 12 }],
        };
        let mut out = vec![0u8; table.header_size()];
        assert!(matches!(table.encode_into(&mut out), Err(Error::TooLarge { .. })));
    }
}
