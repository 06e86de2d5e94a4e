//! Fat slice table rules.

use tracing::debug;

use super::{Validator, Verdict};
use crate::error::{Error, Result};
use crate::fat::{fat_magic, FatTable};
use crate::macho::{object_magic, MachHeader, MAXSECTALIGN};
use crate::util::{is_aligned, range_within};

impl Validator<'_> {
    /// Checks the fat header and slice table of a top-level fat file.
    pub fn check_fat(&mut self, data: &[u8], location: &str) -> Verdict {
        if fat_magic(data).is_none() {
            return Verdict::NotApplicable;
        }
        let result = self.fat_rules(data, None);
        Verdict::located(result, location)
    }

    /// Checks a fat file stored as an archive member whose content starts
    /// at `base_offset` in the container. Each slice must also hold an
    /// object file that is suitably aligned in the container.
    pub fn check_fat_in_archive(&mut self, data: &[u8], base_offset: u64, location: &str) -> Verdict {
        if fat_magic(data).is_none() {
            return Verdict::NotApplicable;
        }
        let result = self.fat_rules(data, Some((base_offset, location)));
        Verdict::located(result, location)
    }

    pub(super) fn fat_rules(&mut self, data: &[u8], in_archive: Option<(u64, &str)>) -> Result<()> {
        let table = FatTable::parse(data)?;
        if table.is_empty() {
            return Err(Error::fat("contains zero architecture types"));
        }

        let size = data.len() as u64;
        let mut warned = false;
        for (i, slice) in table.slices.iter().enumerate() {
            let arch = slice.arch_name();
            if !range_within(slice.offset, slice.size, size) {
                return Err(Error::fat(format!(
                    "offset plus size of cputype ({}) cpusubtype ({}) extends past the end of the file",
                    slice.cputype as i32,
                    slice.cpusubtype & !crate::macho::CPU_SUBTYPE_MASK
                )));
            }
            if slice.align > MAXSECTALIGN {
                return Err(Error::fat(format!(
                    "align (2^{}) too large for {} (maximum 2^{})",
                    slice.align, arch, MAXSECTALIGN
                )));
            }
            if !is_aligned(slice.offset, 1u64 << slice.align) {
                return Err(Error::fat(format!(
                    "offset: {} for {} not aligned on its alignment (2^{})",
                    slice.offset, arch, slice.align
                )));
            }
            if let Some((base, location)) = in_archive {
                self.slice_in_archive(&data[slice.range()], base + slice.offset, &arch, location, &mut warned)?;
            }
            if table.slices[..i].iter().any(|other| other.identity() == slice.identity()) {
                return Err(Error::fat(format!("contains two of the same architecture ({arch})")));
            }
            debug!("fat slice {}: {}", i, slice);
        }
        Ok(())
    }

    fn slice_in_archive(
        &mut self,
        content: &[u8],
        absolute: u64,
        arch: &str,
        location: &str,
        warned: &mut bool,
    ) -> Result<()> {
        if content.len() < MachHeader::SIZE {
            return Err(Error::fat(format!(
                "fat file for {arch} is not an object file (size too small to be an object file)"
            )));
        }
        match object_magic(content) {
            Some((true, _)) => {
                if !is_aligned(absolute, 8) {
                    self.misaligned_64(warned, location)?;
                }
            }
            Some((false, _)) => {
                if self.config().require_pointer_alignment && !is_aligned(absolute, 4) {
                    return Err(Error::fat(format!(
                        "fat file for {arch} offset in archive not a multiple of 4 (must be since member is a 32-bit object file)"
                    )));
                }
            }
            None if self.detector().bitcode().is_bitcode(content) => {
                if !is_aligned(absolute, 8) {
                    self.misaligned_64(warned, location)?;
                }
            }
            None => {
                return Err(Error::fat(format!(
                    "fat file for {arch} is not an object file (bad magic number)"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Detector;
    use crate::fat::build_fat;
    use crate::macho::*;
    use crate::util::ByteSex;
    use crate::ValidationConfig;

    fn object(cputype: u32, cpusubtype: u32) -> Vec<u8> {
        build_object(ByteSex::Little, true, cputype, cpusubtype, &[])
    }

    fn check(data: &[u8]) -> Verdict {
        Validator::new(Detector::default()).check_fat(data, "u")
    }

    #[test]
    fn test_good_fat() {
        let a = object(CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL);
        let b = object(CPU_TYPE_ARM64, CPU_SUBTYPE_ARM64_ALL);
        let data = build_fat(false, &[(CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL, 12, &a), (CPU_TYPE_ARM64, CPU_SUBTYPE_ARM64_ALL, 14, &b)]);
        assert!(check(&data).is_good());
        assert!(matches!(check(b"!<arch>\n"), Verdict::NotApplicable));
    }

    #[test]
    fn test_zero_architectures() {
        let data = build_fat(false, &[]);
        let err = check(&data).into_result().unwrap_err();
        assert!(err.to_string().contains("contains zero architecture types"));
    }

    #[test]
    fn test_slice_past_end() {
        let a = object(CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL);
        let mut data = build_fat(false, &[(CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL, 12, &a)]);
        data.truncate(data.len() - 1);
        let err = check(&data).into_result().unwrap_err();
        assert!(err.to_string().contains("extends past the end of the file"));
    }

    #[test]
    fn test_alignment_rules() {
        let a = object(CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL);
        let mut table = FatTable::parse(&build_fat(false, &[(CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL, 12, &a)])).unwrap();
        let mut data = vec![0u8; 0x2000 + a.len()];
        data[0x1000..0x1000 + a.len()].copy_from_slice(&a);

        table.slices[0].offset = 0x1000;
        table.slices[0].align = 16;
        table.encode_into(&mut data).unwrap();
        let err = check(&data).into_result().unwrap_err();
        assert!(err.to_string().contains("too large"));

        table.slices[0].align = 13;
        table.encode_into(&mut data).unwrap();
        let err = check(&data).into_result().unwrap_err();
        assert!(err.to_string().contains("not aligned"));

        table.slices[0].align = 12;
        table.encode_into(&mut data).unwrap();
        assert!(check(&data).is_good());
    }

    #[test]
    fn test_duplicate_architecture() {
        let a = object(CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL);
        let data = build_fat(
            false,
            &[
                (CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL, 12, &a),
                (CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL | CPU_SUBTYPE_LIB64, 12, &a),
            ],
        );
        let err = check(&data).into_result().unwrap_err();
        assert!(err.to_string().contains("two of the same architecture"));
    }

    #[test]
    fn test_fat_in_archive_rules() {
        let a = object(CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL);
        let data = build_fat(false, &[(CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL, 3, &a)]);

        let mut validator = Validator::new(Detector::default());
        assert!(validator.check_fat_in_archive(&data, 64, "lib.a(f.o)").is_good());
        assert!(validator.advisories().is_empty());

        assert!(validator.check_fat_in_archive(&data, 64 + 4, "lib.a(f.o)").is_good());
        assert_eq!(validator.advisories().len(), 1);

        let strict = ValidationConfig {
            require_pointer_alignment: true,
            ..Default::default()
        };
        let mut validator = Validator::new(Detector::new(strict));
        assert!(validator.check_fat_in_archive(&data, 64 + 4, "lib.a(f.o)").is_bad());

        let junk = vec![0x55u8; 64];
        let data = build_fat(false, &[(CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL, 3, &junk)]);
        let err = Validator::new(Detector::default())
            .check_fat_in_archive(&data, 0, "lib.a(f.o)")
            .into_result()
            .unwrap_err();
        assert!(err.to_string().contains("bad magic number"));
    }
}
