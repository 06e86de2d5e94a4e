//! Reading the symbol table-of-contents (`__.SYMDEF*`) member.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::macho::{SYMDEF, SYMDEF_64, SYMDEF_64_SORTED, SYMDEF_SORTED};
use crate::util::{c_str_at, decode, impl_swap, ByteSex};

/// 32-bit TOC entry.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct Ranlib {
    /// Index into the string pool
    pub ran_strx: u32,
    /// Offset of the defining member's header from the archive start
    pub ran_off: u32,
}

impl Ranlib {
    /// Size of the structure in bytes.
    pub const SIZE: usize = 8;
}

/// 64-bit TOC entry.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct Ranlib64 {
    /// String table index of the symbol name
    pub ran_strx: u64,
    /// Header offset of the defining member
    pub ran_off: u64,
}

impl Ranlib64 {
    /// Size of the structure in bytes.
    pub const SIZE: usize = 16;
}

impl_swap!(Ranlib { ran_strx, ran_off });
impl_swap!(Ranlib64 { ran_strx, ran_off });

/// Returns true for the four reserved TOC member names.
pub fn is_toc_name(name: &str) -> bool {
    matches!(name, SYMDEF | SYMDEF_SORTED | SYMDEF_64 | SYMDEF_64_SORTED)
}

/// One decoded TOC entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    /// Symbol name
    pub name: String,
    /// Header offset of the defining member, from the archive start
    pub member_offset: u64,
    /// Index of that member in the archive arena, when it resolves
    pub member: Option<usize>,
}

/// A structurally sound table of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableOfContents {
    /// Entries use 64-bit words
    pub is_64: bool,
    /// Name is one of the sorted `__.SYMDEF` variants
    pub sorted: bool,
    /// Entries in table order
    pub entries: Vec<TocEntry>,
}

/// Outcome of reading an archive's TOC.
///
/// `Unusable` does not make the archive invalid: the members remain
/// addressable, only the index cannot be trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TocStatus {
    /// No TOC member, or more than one.
    Absent,
    /// Every sub-check held.
    Usable(TableOfContents),
    /// Present but failed a sub-check; holds the reason.
    Unusable(String),
}

impl TocStatus {
    /// The table, if usable.
    pub fn table(&self) -> Option<&TableOfContents> {
        match self {
            TocStatus::Usable(toc) => Some(toc),
            _ => None,
        }
    }
}

/// Decodes and checks a TOC member's content.
///
/// `archive_size` bounds the member offsets the entries may name.
pub fn read_toc(
    content: &[u8],
    name: &str,
    sex: ByteSex,
    archive_size: u64,
) -> std::result::Result<TableOfContents, String> {
    let is_64 = name.starts_with(SYMDEF_64);
    let sorted = name.ends_with("SORTED");
    let len = content.len() as u64;
    let (word, entry_size, align) = if is_64 { (8u64, Ranlib64::SIZE as u64, 8u64) } else { (4, Ranlib::SIZE as u64, 4) };

    if len < word * 2 {
        return Err(format!("size of table of contents ({len}) too small"));
    }
    let read_word = |offset: u64| -> Option<u64> {
        if is_64 {
            sex.read_u64_at(content, offset as usize)
        } else {
            sex.read_u32_at(content, offset as usize).map(u64::from)
        }
    };

    let table_bytes = read_word(0).ok_or("table of contents truncated")?;
    let nranlibs = table_bytes / entry_size;
    let strsize_at = word
        .checked_add(table_bytes)
        .filter(|&end| end <= len)
        .ok_or("ranlib structures extend past the end of the table of contents")?;
    let strsize = read_word(strsize_at).ok_or("string pool size extends past the end of the table of contents")?;
    let strings_at = strsize_at + word;
    if strings_at.checked_add(strsize).map_or(true, |end| end > len) {
        return Err("ranlib string pool extends past the end of the table of contents".into());
    }
    let strings = &content[strings_at as usize..(strings_at + strsize) as usize];

    let mut entries = Vec::with_capacity(nranlibs as usize);
    for i in 0..nranlibs {
        let at = (word + i * entry_size) as usize;
        let (strx, offset) = if is_64 {
            let r: Ranlib64 = decode(content, at, sex).map_err(|e| e.to_string())?;
            (r.ran_strx, r.ran_off)
        } else {
            let r: Ranlib = decode(content, at, sex).map_err(|e| e.to_string())?;
            (u64::from(r.ran_strx), u64::from(r.ran_off))
        };
        if strx >= strsize {
            return Err(format!("ranlib entry {i} string index ({strx}) past the end of the string pool"));
        }
        if offset >= archive_size {
            return Err(format!("ranlib entry {i} member offset ({offset}) past the end of the archive"));
        }
        if offset % align != 0 {
            return Err(format!("ranlib entry {i} member offset ({offset}) not a multiple of {align}"));
        }
        entries.push(TocEntry {
            name: String::from_utf8_lossy(c_str_at(strings, strx as usize)).into_owned(),
            member_offset: offset,
            member: None,
        });
    }

    Ok(TableOfContents {
        is_64,
        sorted,
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::encode;

    fn build(sex: ByteSex, entries: &[(u32, u32)], strings: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut word = [0u8; 4];
        sex.write_u32(&mut word, (entries.len() * Ranlib::SIZE) as u32);
        out.extend_from_slice(&word);
        for &(ran_strx, ran_off) in entries {
            out.extend(encode(&Ranlib { ran_strx, ran_off }, sex));
        }
        sex.write_u32(&mut word, strings.len() as u32);
        out.extend_from_slice(&word);
        out.extend_from_slice(strings);
        out
    }

    #[test]
    fn test_read_valid() {
        let content = build(ByteSex::Big, &[(0, 8), (5, 136)], b"_foo\0_bar\0\0\0");
        let toc = read_toc(&content, SYMDEF_SORTED, ByteSex::Big, 1000).unwrap();
        assert!(toc.sorted);
        assert!(!toc.is_64);
        assert_eq!(toc.entries.len(), 2);
        assert_eq!(toc.entries[1].name, "_bar");
        assert_eq!(toc.entries[1].member_offset, 136);
    }

    #[test]
    fn test_bad_string_index() {
        let content = build(ByteSex::Little, &[(12, 8)], b"_foo\0\0\0\0");
        let err = read_toc(&content, SYMDEF, ByteSex::Little, 1000).unwrap_err();
        assert!(err.contains("string index"));
    }

    #[test]
    fn test_bad_offsets() {
        let content = build(ByteSex::Little, &[(0, 2000)], b"_foo\0\0\0\0");
        assert!(read_toc(&content, SYMDEF, ByteSex::Little, 1000).is_err());
        let content = build(ByteSex::Little, &[(0, 10)], b"_foo\0\0\0\0");
        assert!(read_toc(&content, SYMDEF, ByteSex::Little, 1000).unwrap_err().contains("multiple of 4"));
    }

    #[test]
    fn test_truncated() {
        assert!(read_toc(&[0u8; 4], SYMDEF, ByteSex::Little, 10).is_err());
        let mut content = build(ByteSex::Little, &[(0, 8)], b"_foo\0\0\0\0");
        content.truncate(10);
        assert!(read_toc(&content, SYMDEF, ByteSex::Little, 1000).is_err());
        assert!(is_toc_name("__.SYMDEF_64 SORTED"));
        assert!(!is_toc_name("__.SYMDEF_X"));
    }
}
