//! Archive member layout rules.

use tracing::debug;

use super::{Validator, Verdict};
use crate::arch::ArchFlag;
use crate::archive::{extended_name, is_valid_extended_field, plain_name, sysv_name, ArHeader, NameEncoding};
use crate::container::FileKind;
use crate::error::{Error, Result};
use crate::fat::FatSlice;
use crate::macho::{ObjectHeader, ARMAG, CPU_SUBTYPE_MASK, SARMAG, SYSV_STRING_TABLE};
use crate::util::{align_up, is_aligned};

impl Validator<'_> {
    /// Walks every member header of the archive in `data`.
    ///
    /// `base_offset` is the archive's offset in its container and `slice`
    /// the fat entry it lives in, if any; the entry's CPU type is then the
    /// one every object member must match.
    pub fn check_archive(
        &mut self,
        data: &[u8],
        base_offset: u64,
        slice: Option<&FatSlice>,
        location: &str,
    ) -> Verdict {
        if !data.starts_with(ARMAG) {
            return Verdict::NotApplicable;
        }
        match self.archive_rules(data, base_offset, slice, location) {
            Ok(()) => Verdict::Good,
            Err(err) => Verdict::Bad(err),
        }
    }

    /// Errors come back already located, at the member when one is known.
    fn archive_rules(
        &mut self,
        data: &[u8],
        base_offset: u64,
        slice: Option<&FatSlice>,
        location: &str,
    ) -> Result<()> {
        let size = data.len() as u64;
        let mut offset = SARMAG as u64;
        if offset == size {
            return Ok(());
        }
        if offset + ArHeader::SIZE as u64 > size {
            return Err(Error::archive("archive header of first member extends past the end of the file")
                .located(location));
        }

        let mut expected = slice.map(|s| (s.cputype, s.cpusubtype));
        let mut string_table: Option<&[u8]> = None;
        let mut warned = false;

        while offset < size {
            let header = ArHeader::read_at(data, offset as usize).ok_or_else(|| {
                Error::archive(format!("archive header of member at offset {offset} extends past the end of the file"))
                    .located(location)
            })?;
            let content_start = offset + ArHeader::SIZE as u64;
            let remaining = size - content_start;

            let (name, name_len) = match header.name_encoding() {
                NameEncoding::Extended { name_len } => {
                    if !is_valid_extended_field(&header.ar_name) {
                        return Err(Error::archive(format!(
                            "archive member at offset {offset} has a malformed extended format #1 name field ({})",
                            plain_name(&header.ar_name)
                        ))
                        .located(location));
                    }
                    if name_len > remaining {
                        return Err(Error::archive("archive name of member extends past the end of the file")
                            .located(location));
                    }
                    let start = content_start as usize;
                    (extended_name(&data[start..start + name_len as usize]), name_len)
                }
                NameEncoding::SysV { offset: name_offset } => {
                    let name = string_table
                        .and_then(|table| sysv_name(table, name_offset))
                        .unwrap_or_else(|| plain_name(&header.ar_name));
                    (name, 0)
                }
                NameEncoding::Plain(name) => (name, 0),
            };
            let member_location = format!("{location}({name})");

            let declared = header.size();
            if declared < name_len {
                return Err(Error::archive("size of archive member smaller than its long name")
                    .located(member_location));
            }
            if align_up(declared, 2) > remaining {
                return Err(Error::archive("size too large (archive member extends past the end of the file)")
                    .located(member_location));
            }

            let content_offset = content_start + name_len;
            let content_size = declared - name_len;
            let content = &data[content_offset as usize..(content_offset + content_size) as usize];
            let absolute = base_offset + content_offset;

            if header.ar_name.starts_with(SYSV_STRING_TABLE.as_bytes()) {
                string_table = Some(content);
            } else {
                self.member_rules(content, absolute, slice.is_none(), &mut expected, &member_location, &mut warned)
                    .map_err(|e| e.located(&member_location))?;
            }
            debug!("{}: member at {} size {} checked", member_location, offset, content_size);

            offset = content_start + align_up(declared, 2);
        }
        Ok(())
    }

    fn member_rules(
        &mut self,
        content: &[u8],
        absolute: u64,
        thin_archive: bool,
        expected: &mut Option<(u32, u32)>,
        location: &str,
        warned: &mut bool,
    ) -> Result<()> {
        match self.detector().classify(content) {
            FileKind::Fat => {
                if !(thin_archive && self.config().permit_fat_objects_in_archives) {
                    return Err(Error::archive("is a fat file (not allowed in an archive)"));
                }
                self.fat_rules(content, Some((absolute, location)))
            }
            FileKind::MachObject => {
                let (header, _) = ObjectHeader::parse(content)?;
                match *expected {
                    None => *expected = Some((header.cputype, header.cpusubtype)),
                    Some((cputype, cpusubtype)) => {
                        if header.cputype != cputype {
                            return Err(Error::archive(format!(
                                "cputype ({}) does not match previous archive members cputype ({}) (all members must match)",
                                header.cputype as i32, cputype as i32
                            )));
                        }
                        let have = header.cpusubtype & !CPU_SUBTYPE_MASK;
                        let want = cpusubtype & !CPU_SUBTYPE_MASK;
                        if ArchFlag::subtype_sensitive(cputype) && have != want {
                            return Err(Error::archive(format!(
                                "cpusubtype ({have}) does not match previous archive members cpusubtype ({want}) (all members must match)"
                            )));
                        }
                    }
                }
                if header.is_64() {
                    if !is_aligned(absolute, 8) {
                        self.misaligned_64(warned, location)?;
                    }
                } else if self.config().require_pointer_alignment && !is_aligned(absolute, 4) {
                    return Err(Error::archive(
                        "offset in archive not a multiple of 4 (must be since member is a 32-bit object file)",
                    ));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{build_archive, RawMember};
    use crate::container::Detector;
    use crate::fat::build_fat;
    use crate::macho::*;
    use crate::util::ByteSex;
    use crate::ValidationConfig;

    /// An object padded to a multiple of 8 so extended-name members stay aligned.
    fn object(cputype: u32, cpusubtype: u32) -> Vec<u8> {
        let mut data = build_object(ByteSex::Little, true, cputype, cpusubtype, &[("_f", N_SECT | N_EXT, 1, 0)]);
        data.resize(align_up(data.len() as u64, 8) as usize, 0);
        data
    }

    fn strict() -> Detector<'static> {
        Detector::new(ValidationConfig {
            require_pointer_alignment: true,
            ..Default::default()
        })
    }

    #[test]
    fn test_empty_and_wellformed() {
        let mut validator = Validator::new(Detector::default());
        assert!(validator.check_archive(ARMAG, 0, None, "e.a").is_good());

        let a = object(CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL);
        let data = build_archive(&[RawMember::extended("a.o", &a), RawMember::extended("long_name.o", &a)]);
        assert!(validator.check_archive(&data, 0, None, "lib.a").is_good());
        assert!(validator.advisories().is_empty());
        assert!(matches!(validator.check_archive(&a, 0, None, "a.o"), Verdict::NotApplicable));
    }

    #[test]
    fn test_cputype_mismatch_rejected() {
        let a = object(CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL);
        let b = object(CPU_TYPE_ARM64, CPU_SUBTYPE_ARM64_ALL);
        let data = build_archive(&[RawMember::plain("a.o", &a), RawMember::plain("b.o", &b)]);
        let err = Validator::new(Detector::default())
            .check_archive(&data, 0, None, "lib.a")
            .into_result()
            .unwrap_err();
        let text = err.to_string();
        assert!(text.starts_with("lib.a(b.o): "));
        assert!(text.contains("all members must match"));
    }

    #[test]
    fn test_member_past_end() {
        let a = object(CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL);
        let mut data = build_archive(&[RawMember::plain("a.o", &a)]);
        data.truncate(data.len() - 2);
        let err = Validator::new(Detector::default())
            .check_archive(&data, 0, None, "lib.a")
            .into_result()
            .unwrap_err();
        assert!(err.to_string().contains("size too large"));
    }

    #[test]
    fn test_fat_member_needs_permission() {
        let a = object(CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL);
        let fat = build_fat(false, &[(CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL, 3, &a)]);
        let data = build_archive(&[RawMember::plain("f.o", &fat)]);
        let err = Validator::new(Detector::default())
            .check_archive(&data, 0, None, "lib.a")
            .into_result()
            .unwrap_err();
        assert!(err.to_string().contains("not allowed in an archive"));

        let permissive = Detector::new(ValidationConfig {
            permit_fat_objects_in_archives: true,
            ..Default::default()
        });
        assert!(Validator::new(permissive).check_archive(&data, 0, None, "lib.a").is_good());
    }

    #[test]
    fn test_misaligned_64bit_member() {
        // a 4-byte extended name padded to 8 keeps contents aligned; a base
        // offset of 4 throws every member off by four
        let a = object(CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL);
        let data = build_archive(&[RawMember::extended("a.o", &a), RawMember::extended("b.o", &a)]);

        let mut validator = Validator::new(Detector::default());
        assert!(validator.check_archive(&data, 0, None, "lib.a").is_good());
        assert!(validator.advisories().is_empty());

        assert!(validator.check_archive(&data, 4, None, "lib.a").is_good());
        assert_eq!(validator.advisories().len(), 1);
        assert!(validator.advisories()[0].message.contains("not a multiple of 8"));

        let err = Validator::new(strict())
            .check_archive(&data, 4, None, "lib.a")
            .into_result()
            .unwrap_err();
        assert!(err.to_string().contains("lib.a(a.o)"));
    }
}
