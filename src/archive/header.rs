//! `ar` member header codec and member-name conventions.

use std::fmt;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::{Error, Result};
use crate::macho::{AR_EFMT1, ARFMAG};
use crate::util::{is_decimal_field, parse_ascii_number, write_ascii_field};

/// Fixed 60-byte member header; every field is space padded ASCII.
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct ArHeader {
    /// Member name, blank padded
    pub ar_name: [u8; 16],
    /// Modification time in decimal
    pub ar_date: [u8; 12],
    /// User id in decimal
    pub ar_uid: [u8; 6],
    /// Group id in decimal
    pub ar_gid: [u8; 6],
    /// File mode in octal
    pub ar_mode: [u8; 8],
    /// Member size in decimal
    pub ar_size: [u8; 10],
    /// Trailer, always "`\n"
    pub ar_fmag: [u8; 2],
}

impl ArHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = 60;

    /// Reads the header at `offset`, or `None` if it does not fit.
    pub fn read_at(data: &[u8], offset: usize) -> Option<Self> {
        let source = data.get(offset..)?;
        Self::read_from_prefix(source).ok().map(|(header, _)| header)
    }

    /// Builds a header from field values.
    pub fn new(name: &str, date: u64, uid: u32, gid: u32, mode: u32, size: u64) -> Result<Self> {
        let mut header = Self {
            ar_name: [b' '; 16],
            ar_date: [b' '; 12],
            ar_uid: [b' '; 6],
            ar_gid: [b' '; 6],
            ar_mode: [b' '; 8],
            ar_size: [b' '; 10],
            ar_fmag: *ARFMAG,
        };
        write_ascii_field(&mut header.ar_name, name)
            .map_err(|_| Error::NameTooLong { name: name.to_string() })?;
        write_ascii_field(&mut header.ar_date, &date.to_string())?;
        write_ascii_field(&mut header.ar_uid, &uid.to_string())?;
        write_ascii_field(&mut header.ar_gid, &gid.to_string())?;
        write_ascii_field(&mut header.ar_mode, &format!("{mode:o}"))?;
        write_ascii_field(&mut header.ar_size, &size.to_string())?;
        Ok(header)
    }

    /// Declared size, including any extended-format name.
    pub fn size(&self) -> u64 {
        parse_ascii_number(&self.ar_size, 10)
    }

    /// Decoded modification time.
    pub fn date(&self) -> u64 {
        parse_ascii_number(&self.ar_date, 10)
    }

    /// Decoded user id.
    pub fn uid(&self) -> u32 {
        parse_ascii_number(&self.ar_uid, 10).min(u32::MAX as u64) as u32
    }

    /// Decoded group id.
    pub fn gid(&self) -> u32 {
        parse_ascii_number(&self.ar_gid, 10).min(u32::MAX as u64) as u32
    }

    /// Decoded file mode (octal field).
    pub fn mode(&self) -> u32 {
        parse_ascii_number(&self.ar_mode, 8).min(u32::MAX as u64) as u32
    }

    /// Returns true if the header ends with the "`\n" trailer.
    pub fn has_valid_fmag(&self) -> bool {
        &self.ar_fmag == ARFMAG
    }

    /// How the name field should be interpreted.
    pub fn name_encoding(&self) -> NameEncoding {
        NameEncoding::of(&self.ar_name)
    }
}

impl fmt::Debug for ArHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArHeader")
            .field("name", &String::from_utf8_lossy(&self.ar_name))
            .field("date", &self.date())
            .field("uid", &self.uid())
            .field("gid", &self.gid())
            .field("mode", &format_args!("{:o}", self.mode()))
            .field("size", &self.size())
            .finish()
    }
}

// =============================================================================
// Name Conventions
// =============================================================================

/// The three competing member-name conventions, in priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameEncoding {
    /// `#1/<len>`: the name follows the header and is counted in the size.
    Extended { name_len: u64 },
    /// `/<offset>`: the name lives in the `// ` string table member.
    SysV { offset: u64 },
    /// The field itself, blanks (and a System V trailing `/`) trimmed.
    Plain(String),
}

impl NameEncoding {
    /// Classifies a raw 16-byte name field.
    pub fn of(field: &[u8; 16]) -> Self {
        if field.starts_with(AR_EFMT1) {
            return NameEncoding::Extended {
                name_len: parse_ascii_number(&field[AR_EFMT1.len()..], 10),
            };
        }
        if field[0] == b'/' && field[1].is_ascii_digit() {
            return NameEncoding::SysV {
                offset: parse_ascii_number(&field[1..], 10),
            };
        }
        NameEncoding::Plain(plain_name(field))
    }
}

/// Trims trailing blanks, then a trailing `/` unless the name is made only
/// of slashes ("/" and "//" are reserved member names).
pub fn plain_name(field: &[u8]) -> String {
    let mut len = field.iter().rposition(|&b| b != b' ').map_or(0, |p| p + 1);
    if len > 1 && field[len - 1] == b'/' && field[..len].iter().any(|&b| b != b'/') {
        len -= 1;
    }
    String::from_utf8_lossy(&field[..len]).into_owned()
}

/// Trims the NUL padding that follows an extended-format name.
pub fn extended_name(bytes: &[u8]) -> String {
    let len = bytes.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
    String::from_utf8_lossy(&bytes[..len]).into_owned()
}

/// Reads a System V long name: from `offset` in the string table up to `/`.
pub fn sysv_name(string_table: &[u8], offset: u64) -> Option<String> {
    let rest = string_table.get(usize::try_from(offset).ok()?..)?;
    let end = memchr::memchr(b'/', rest).unwrap_or(rest.len());
    Some(String::from_utf8_lossy(&rest[..end]).into_owned())
}

/// Strict form of the extended-format check: a digit right after the
/// marker, then only digits and blanks.
pub fn is_valid_extended_field(field: &[u8; 16]) -> bool {
    field.starts_with(AR_EFMT1) && is_decimal_field(&field[AR_EFMT1.len()..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(s: &str) -> [u8; 16] {
        let mut f = [b' '; 16];
        f[..s.len()].copy_from_slice(s.as_bytes());
        f
    }

    #[test]
    fn test_header_roundtrip() {
        let header = ArHeader::new("#1/20", 1234, 501, 20, 0o100644, 4096).unwrap();
        assert_eq!(header.as_bytes().len(), ArHeader::SIZE);
        assert_eq!(&header.ar_name, b"#1/20           ");
        assert_eq!(header.date(), 1234);
        assert_eq!(header.uid(), 501);
        assert_eq!(header.gid(), 20);
        assert_eq!(header.mode(), 0o100644);
        assert_eq!(header.size(), 4096);
        assert!(header.has_valid_fmag());

        let parsed = ArHeader::read_at(header.as_bytes(), 0).unwrap();
        assert_eq!(parsed.as_bytes(), header.as_bytes());
        assert!(ArHeader::read_at(header.as_bytes(), 1).is_none());
    }

    #[test]
    fn test_name_too_long() {
        let name = "a_very_long_member_name.o";
        assert!(matches!(ArHeader::new(name, 0, 0, 0, 0, 0), Err(Error::NameTooLong { .. })));
    }

    #[test]
    fn test_name_conventions() {
        assert_eq!(NameEncoding::of(&field("#1/28")), NameEncoding::Extended { name_len: 28 });
        assert_eq!(NameEncoding::of(&field("/42")), NameEncoding::SysV { offset: 42 });
        assert_eq!(NameEncoding::of(&field("foo.o/")), NameEncoding::Plain("foo.o".into()));
        assert_eq!(NameEncoding::of(&field("bar.o")), NameEncoding::Plain("bar.o".into()));
        assert_eq!(NameEncoding::of(&field("/")), NameEncoding::Plain("/".into()));
        assert_eq!(NameEncoding::of(&field("// ")), NameEncoding::Plain("//".into()));
    }

    #[test]
    fn test_long_name_helpers() {
        assert_eq!(extended_name(b"longname.o\0\0\0\0"), "longname.o");
        assert_eq!(sysv_name(b"first.o/\nsecond_long.o/\n", 9).as_deref(), Some("second_long.o"));
        assert_eq!(sysv_name(b"x/", 10), None);
        assert!(is_valid_extended_field(&field("#1/20")));
        assert!(!is_valid_extended_field(&field("#1/ 20")));
        assert!(!is_valid_extended_field(&field("#1/2x")));
    }
}
