//! Building the `__.SYMDEF*` member of a rebuilt archive.

use std::collections::{HashMap, HashSet};

use tracing::debug;
use zerocopy::IntoBytes;

use super::tree::OutputMember;
use super::writeout::{name_area, WriteOptions};
use crate::archive::{ArHeader, Ranlib, Ranlib64};
use crate::container::{Detector, FileKind};
use crate::error::{Advisory, Error, Result};
use crate::macho::{
    MachObject, SectionInfo, Symbol, N_EXT, N_SECT, N_STAB, N_TYPE, N_UNDF, SARMAG, SYMDEF, SYMDEF_64,
    SYMDEF_64_SORTED, SYMDEF_SORTED, S_ATTR_NO_TOC,
};
use crate::util::{align_up, c_str_at, encode_into, ByteSex};

/// One entry of a table of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocSymbol {
    /// Symbol name
    pub name: String,
    /// Index of the defining member in the output archive
    pub member: usize,
}

/// A table of contents ready to be laid out in front of its members.
#[derive(Debug, Clone)]
pub struct Toc {
    /// Entries in on-disk order: by name when `sorted`, else link order.
    pub symbols: Vec<TocSymbol>,
    /// Entries are in name order
    pub sorted: bool,
    /// Uses the 64-bit layout
    pub is_64: bool,
    /// Byte sex of the entry table, that of the first object member
    pub byte_sex: ByteSex,
    /// Advisories raised while building
    pub advisories: Vec<Advisory>,
    strings: Vec<u8>,
    /// Pool offset of each entry's name
    string_index: Vec<u64>,
}

impl Toc {
    /// Collects the exported symbols of `members` and orders them.
    ///
    /// A sorted table is only produced when no name is defined by two
    /// different members; otherwise an advisory is raised and the table
    /// stays in link order, unless `strict_duplicates` turns that into an
    /// error.
    pub fn build(
        members: &[OutputMember],
        detector: &Detector<'_>,
        options: &WriteOptions,
        location: &str,
    ) -> Result<Self> {
        let config = detector.config();
        let mut symbols = Vec::new();
        let mut byte_sex = None;

        for (index, member) in members.iter().enumerate() {
            let member_location = format!("{location}({})", member.name);
            let names = match member.kind {
                FileKind::MachObject => {
                    let object = MachObject::parse(&member.data).map_err(|e| e.located(&member_location))?;
                    byte_sex.get_or_insert(object.byte_sex());
                    object_symbols(&object, config.include_tentative_defs_in_toc)
                        .map_err(|e| e.located(&member_location))?
                }
                FileKind::ForeignBitcode => bitcode_symbols(detector, &member.data, config.include_tentative_defs_in_toc, &member_location),
                kind => {
                    debug!("{}: {} member contributes no symbols", member_location, kind);
                    continue;
                }
            };
            let mut seen = HashSet::new();
            for name in names {
                if seen.insert(name.clone()) {
                    symbols.push(TocSymbol { name, member: index });
                }
            }
        }

        let mut advisories = Vec::new();
        let mut sorted = false;
        if options.sort_toc {
            let mut by_name = symbols.clone();
            by_name.sort_by(|a, b| a.name.cmp(&b.name));
            let duplicates = duplicate_names(&by_name);
            if duplicates.is_empty() {
                symbols = by_name;
                sorted = true;
            } else if options.strict_duplicates {
                return Err(Error::DuplicateSymbols { names: duplicates }.located(location));
            } else {
                advisories.push(Advisory::raise(
                    location,
                    format!(
                        "same symbol defined in more than one member ({}), table of contents left in link order",
                        duplicates.join(", ")
                    ),
                ));
            }
        }
        if symbols.is_empty() {
            advisories.push(Advisory::raise(
                location,
                "table of contents is empty (no object file members in the library define global symbols)",
            ));
        }

        let mut strings = Vec::new();
        let string_index = {
            let mut offsets: HashMap<&str, u64> = HashMap::new();
            symbols
                .iter()
                .map(|symbol| {
                    *offsets.entry(symbol.name.as_str()).or_insert_with(|| {
                        let at = strings.len() as u64;
                        strings.extend_from_slice(symbol.name.as_bytes());
                        strings.push(0);
                        at
                    })
                })
                .collect()
        };
        strings.resize(align_up(strings.len() as u64, 8) as usize, 0);

        debug!(
            "{}: {} table of contents entries, {} bytes of strings",
            location,
            symbols.len(),
            strings.len()
        );
        Ok(Self {
            symbols,
            sorted,
            is_64: config.force_64bit_toc,
            byte_sex: byte_sex.unwrap_or(ByteSex::host()),
            advisories,
            strings,
            string_index,
        })
    }

    /// The reserved member name for this table's width and order.
    pub fn member_name(&self) -> &'static str {
        match (self.is_64, self.sorted) {
            (false, false) => SYMDEF,
            (false, true) => SYMDEF_SORTED,
            (true, false) => SYMDEF_64,
            (true, true) => SYMDEF_64_SORTED,
        }
    }

    /// Size of the whole member: header, long name, entries and strings.
    pub fn size(&self) -> u64 {
        let (word, entry) = self.widths();
        ArHeader::SIZE as u64
            + name_area(self.member_name())
            + word
            + self.symbols.len() as u64 * entry
            + word
            + self.strings.len() as u64
    }

    /// Size of the string pool, padded to 8.
    pub fn string_pool_size(&self) -> u64 {
        self.strings.len() as u64
    }

    /// Computes the header offset of every member placed after this table,
    /// switching to 64-bit entries when a 32-bit field cannot hold them.
    pub fn assign_offsets(&mut self, member_sizes: &[u64]) -> Vec<u64> {
        let offsets = self.offsets(member_sizes);
        let too_wide = offsets.iter().any(|&offset| offset > u64::from(u32::MAX))
            || self.string_pool_size() > u64::from(u32::MAX);
        if !self.is_64 && too_wide {
            debug!("member offsets exceed 32 bits, using a 64-bit table of contents");
            self.is_64 = true;
            return self.offsets(member_sizes);
        }
        offsets
    }

    fn offsets(&self, member_sizes: &[u64]) -> Vec<u64> {
        let mut next = SARMAG as u64 + self.size();
        member_sizes
            .iter()
            .map(|size| {
                let at = next;
                next += size;
                at
            })
            .collect()
    }

    fn widths(&self) -> (u64, u64) {
        if self.is_64 {
            (8, Ranlib64::SIZE as u64)
        } else {
            (4, Ranlib::SIZE as u64)
        }
    }

    /// Writes the member into `out`, which must be exactly [`Toc::size`]
    /// bytes of zeroes. `member_offsets` comes from [`Toc::assign_offsets`].
    pub fn write_into(&self, member_offsets: &[u64], options: &WriteOptions, out: &mut [u8]) -> Result<()> {
        let name = self.member_name();
        let area = name_area(name);
        let header = ArHeader::new(
            &format!("#1/{area}"),
            options.toc_time,
            options.toc_uid,
            options.toc_gid,
            options.toc_mode,
            self.size() - ArHeader::SIZE as u64,
        )?;
        out[..ArHeader::SIZE].copy_from_slice(header.as_bytes());
        let mut at = ArHeader::SIZE;
        out[at..at + name.len()].copy_from_slice(name.as_bytes());
        at += area as usize;

        let (word, entry) = self.widths();
        self.write_word(&mut out[at..], self.symbols.len() as u64 * entry)?;
        at += word as usize;

        for (symbol, &strx) in self.symbols.iter().zip(&self.string_index) {
            let offset = *member_offsets
                .get(symbol.member)
                .ok_or_else(|| Error::internal("table of contents names a member without an offset"))?;
            if self.is_64 {
                let ranlib = Ranlib64 {
                    ran_strx: strx,
                    ran_off: offset,
                };
                encode_into(&ranlib, self.byte_sex, &mut out[at..])?;
            } else {
                let ranlib = Ranlib {
                    ran_strx: narrow("table of contents string index", strx)?,
                    ran_off: narrow("table of contents member offset", offset)?,
                };
                encode_into(&ranlib, self.byte_sex, &mut out[at..])?;
            }
            at += entry as usize;
        }

        self.write_word(&mut out[at..], self.string_pool_size())?;
        at += word as usize;
        out[at..at + self.strings.len()].copy_from_slice(&self.strings);
        Ok(())
    }

    fn write_word(&self, out: &mut [u8], value: u64) -> Result<()> {
        if self.is_64 {
            self.byte_sex.write_u64(out, value);
        } else {
            self.byte_sex.write_u32(out, narrow("table of contents size field", value)?);
        }
        Ok(())
    }
}

fn narrow(what: &'static str, value: u64) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::TooLarge { what, width: 32, value })
}

/// Names defined by more than one member, in a table sorted by name.
fn duplicate_names(sorted: &[TocSymbol]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for pair in sorted.windows(2) {
        if pair[0].name == pair[1].name
            && pair[0].member != pair[1].member
            && names.last() != Some(&pair[0].name)
        {
            names.push(pair[0].name.clone());
        }
    }
    names
}

fn object_symbols(object: &MachObject<'_>, include_commons: bool) -> Result<Vec<String>> {
    let Some(symtab) = object.symtab()? else {
        return Ok(Vec::new());
    };
    let strings = object.string_table(&symtab)?;
    let sections = object.sections()?;

    let mut names = Vec::new();
    for (i, symbol) in object.symbols(&symtab)?.iter().enumerate() {
        if symbol.n_type & N_STAB != 0 {
            continue;
        }
        if symbol.n_strx as usize > strings.len() {
            return Err(Error::object(format!(
                "symbol {i} n_strx field extends past the end of the string table"
            )));
        }
        if symbol.n_type & N_TYPE == N_SECT {
            if symbol.n_sect == 0 {
                return Err(Error::object(format!(
                    "symbol {i} must not have NO_SECT for its n_sect field given its type (N_SECT)"
                )));
            }
            if symbol.n_sect as usize > sections.len() {
                return Err(Error::object(format!(
                    "symbol {i} n_sect field greater than the number of sections in the file"
                )));
            }
        }
        if !exported(symbol, &sections, include_commons) {
            continue;
        }
        let name = c_str_at(strings, symbol.n_strx as usize);
        if !name.is_empty() {
            names.push(String::from_utf8_lossy(name).into_owned());
        }
    }
    Ok(names)
}

/// External, defined (or common when allowed), and not in a section that
/// opts out of the table of contents.
fn exported(symbol: &Symbol, sections: &[SectionInfo], include_commons: bool) -> bool {
    if symbol.n_strx == 0 || symbol.n_type & N_EXT == 0 {
        return false;
    }
    match symbol.n_type & N_TYPE {
        N_UNDF => symbol.n_value != 0 && include_commons,
        N_SECT => (symbol.n_sect as usize)
            .checked_sub(1)
            .and_then(|i| sections.get(i))
            .is_some_and(|section| section.flags & S_ATTR_NO_TOC == 0),
        _ => true,
    }
}

fn bitcode_symbols(detector: &Detector<'_>, data: &[u8], include_commons: bool, location: &str) -> Vec<String> {
    let Some(module) = detector.bitcode().module(data) else {
        debug!("{}: bitcode module could not be read", location);
        return Vec::new();
    };
    module
        .symbols
        .into_iter()
        .filter(|s| s.defined && s.external && (include_commons || !s.common))
        .map(|s| s.name)
        .filter(|name| !name.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::FakeBitcode;
    use crate::macho::*;
    use crate::ValidationConfig;

    fn member(name: &str, symbols: &[(&str, u8, u8, u64)]) -> OutputMember {
        let data = build_object(ByteSex::Little, true, CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL, symbols);
        OutputMember::new(name, FileKind::MachObject, data)
    }

    fn names(toc: &Toc) -> Vec<(&str, usize)> {
        toc.symbols.iter().map(|s| (s.name.as_str(), s.member)).collect()
    }

    #[test]
    fn test_qualifying_symbols() {
        let members = [member(
            "a.o",
            &[
                ("_global", N_SECT | N_EXT, 1, 0),
                ("_local", N_SECT, 1, 0),
                ("_undefined", N_UNDF | N_EXT, 0, 0),
                ("_common", N_UNDF | N_EXT, 0, 16),
                ("_absolute", N_ABS | N_EXT, 0, 4),
            ],
        )];
        let options = WriteOptions::default();
        let toc = Toc::build(&members, &Detector::default(), &options, "lib.a").unwrap();
        assert_eq!(names(&toc), [("_absolute", 0), ("_global", 0)]);
        assert!(toc.sorted);
        assert_eq!(toc.member_name(), SYMDEF_SORTED);

        let commons = Detector::new(ValidationConfig {
            include_tentative_defs_in_toc: true,
            ..Default::default()
        });
        let toc = Toc::build(&members, &commons, &options, "lib.a").unwrap();
        assert_eq!(names(&toc), [("_absolute", 0), ("_common", 0), ("_global", 0)]);
    }

    #[test]
    fn test_no_toc_section_excluded() {
        let mut m = member("a.o", &[("_hidden", N_SECT | N_EXT, 1, 0)]);
        let flags_at = MachHeader64::SIZE + SegmentCommand64::SIZE + 64;
        let flags = u32::from_le_bytes(m.data[flags_at..flags_at + 4].try_into().unwrap());
        m.data[flags_at..flags_at + 4].copy_from_slice(&(flags | S_ATTR_NO_TOC).to_le_bytes());

        let toc = Toc::build(&[m], &Detector::default(), &WriteOptions::default(), "lib.a").unwrap();
        assert!(toc.symbols.is_empty());
        assert_eq!(toc.advisories.len(), 1);
        assert!(toc.advisories[0].message.contains("table of contents is empty"));
    }

    #[test]
    fn test_duplicates_fall_back_to_link_order() {
        let members = [
            member("a.o", &[("_z", N_SECT | N_EXT, 1, 0), ("_dup", N_SECT | N_EXT, 1, 0)]),
            member("b.o", &[("_dup", N_SECT | N_EXT, 1, 0), ("_a", N_SECT | N_EXT, 1, 0)]),
        ];
        let toc = Toc::build(&members, &Detector::default(), &WriteOptions::default(), "lib.a").unwrap();
        assert!(!toc.sorted);
        assert_eq!(toc.member_name(), SYMDEF);
        assert_eq!(names(&toc), [("_z", 0), ("_dup", 0), ("_dup", 1), ("_a", 1)]);
        assert_eq!(toc.advisories.len(), 1);
        assert!(toc.advisories[0].message.contains("_dup"));
        // "_z\0_dup\0_a\0" padded to 16
        assert_eq!(toc.string_pool_size(), 16);

        let strict = WriteOptions {
            strict_duplicates: true,
            ..Default::default()
        };
        let err = Toc::build(&members, &Detector::default(), &strict, "lib.a").unwrap_err();
        assert!(matches!(err.root(), Error::DuplicateSymbols { names } if names == &["_dup".to_string()]));
    }

    #[test]
    fn test_bitcode_members() {
        let fake = FakeBitcode;
        let detector = Detector::default().with_bitcode(&fake);
        let module = OutputMember::new("m.bc", FileKind::ForeignBitcode, b"BC\xC0\xDED _def\nU _ref\nC _tent\n".to_vec());
        let toc = Toc::build(&[module], &detector, &WriteOptions::default(), "lib.a").unwrap();
        assert_eq!(names(&toc), [("_def", 0)]);
        assert_eq!(toc.byte_sex, ByteSex::host());
    }

    #[test]
    fn test_layout_sizes() {
        let members = [member("a.o", &[("_f", N_SECT | N_EXT, 1, 0)])];
        let mut toc = Toc::build(&members, &Detector::default(), &WriteOptions::default(), "lib.a").unwrap();
        // header, "#1/20" name area, count, one entry, pool size, "_f\0" padded
        assert_eq!(toc.size(), 60 + 20 + 4 + 8 + 4 + 8);
        assert_eq!(toc.assign_offsets(&[100, 200]), [8 + 104, 8 + 104 + 100]);
        assert!(!toc.is_64);

        let forced = Detector::new(ValidationConfig {
            force_64bit_toc: true,
            ..Default::default()
        });
        let toc = Toc::build(&members, &forced, &WriteOptions::default(), "lib.a").unwrap();
        assert_eq!(toc.member_name(), SYMDEF_64_SORTED);
        assert_eq!(toc.size(), 60 + 28 + 8 + 16 + 8 + 8);
    }

    #[test]
    fn test_malformed_symbol_rejected() {
        let members = [member("bad.o", &[("_f", N_SECT | N_EXT, 7, 0)])];
        let err = Toc::build(&members, &Detector::default(), &WriteOptions::default(), "lib.a").unwrap_err();
        let text = err.to_string();
        assert!(text.starts_with("lib.a(bad.o): "), "{text}");
        assert!(text.contains("greater than the number of sections"));
    }
}
