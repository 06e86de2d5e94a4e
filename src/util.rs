//! Byte-sex aware primitives for reading and writing fixed-layout data.
//!
//! Every on-disk structure in this crate is declared once as a native-endian
//! `zerocopy` struct. [`decode`] copies such a struct out of a byte buffer and
//! byte-swaps it when the file was written in the opposite byte sex, so the
//! backing buffer is never mutated. [`encode_into`] performs the inverse step
//! on the write path.
//!
//! The remaining helpers cover what archive headers and string tables need:
//! NUL-terminated string lookup (via `memchr`), strtoul-style parsing of
//! space padded ASCII fields, and power-of-two alignment.

use std::fmt;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use zerocopy::{FromBytes, Immutable, IntoBytes};

use crate::error::{Error, Result};

// =============================================================================
// Byte Sex
// =============================================================================

/// The byte order a file's multi-byte fields were written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteSex {
    /// Most significant byte first.
    Big,
    /// Least significant byte first.
    Little,
}

impl ByteSex {
    /// Returns the byte sex of the running host.
    #[inline]
    pub const fn host() -> Self {
        if cfg!(target_endian = "big") {
            ByteSex::Big
        } else {
            ByteSex::Little
        }
    }

    /// Returns true if this is the host byte sex.
    #[inline]
    pub fn is_host(self) -> bool {
        self == Self::host()
    }

    /// Returns the other byte sex.
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            ByteSex::Big => ByteSex::Little,
            ByteSex::Little => ByteSex::Big,
        }
    }

    /// Reads a u16 at the start of `data`.
    ///
    /// # Panics
    ///
    /// Panics if `data.len() < 2`.
    #[inline(always)]
    pub fn read_u16(self, data: &[u8]) -> u16 {
        match self {
            ByteSex::Big => BigEndian::read_u16(data),
            ByteSex::Little => LittleEndian::read_u16(data),
        }
    }

    /// Reads a u32 at the start of `data`.
    ///
    /// # Panics
    ///
    /// Panics if `data.len() < 4`.
    #[inline(always)]
    pub fn read_u32(self, data: &[u8]) -> u32 {
        match self {
            ByteSex::Big => BigEndian::read_u32(data),
            ByteSex::Little => LittleEndian::read_u32(data),
        }
    }

    /// Reads a u64 at the start of `data`.
    ///
    /// # Panics
    ///
    /// Panics if `data.len() < 8`.
    #[inline(always)]
    pub fn read_u64(self, data: &[u8]) -> u64 {
        match self {
            ByteSex::Big => BigEndian::read_u64(data),
            ByteSex::Little => LittleEndian::read_u64(data),
        }
    }

    /// Reads a u32 at `offset`, or `None` if it does not fit.
    #[inline]
    pub fn read_u32_at(self, data: &[u8], offset: usize) -> Option<u32> {
        let end = offset.checked_add(4)?;
        data.get(offset..end).map(|bytes| self.read_u32(bytes))
    }

    /// Reads a u64 at `offset`, or `None` if it does not fit.
    #[inline]
    pub fn read_u64_at(self, data: &[u8], offset: usize) -> Option<u64> {
        let end = offset.checked_add(8)?;
        data.get(offset..end).map(|bytes| self.read_u64(bytes))
    }

    /// Writes a u32 at the start of `out`.
    #[inline(always)]
    pub fn write_u32(self, out: &mut [u8], value: u32) {
        match self {
            ByteSex::Big => BigEndian::write_u32(out, value),
            ByteSex::Little => LittleEndian::write_u32(out, value),
        }
    }

    /// Writes a u64 at the start of `out`.
    #[inline(always)]
    pub fn write_u64(self, out: &mut [u8], value: u64) {
        match self {
            ByteSex::Big => BigEndian::write_u64(out, value),
            ByteSex::Little => LittleEndian::write_u64(out, value),
        }
    }
}

impl fmt::Display for ByteSex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ByteSex::Big => write!(f, "big-endian"),
            ByteSex::Little => write!(f, "little-endian"),
        }
    }
}

// =============================================================================
// Struct Decode / Encode
// =============================================================================

/// Reverses the byte order of every multi-byte field of a struct.
pub trait Swap: Sized {
    /// Returns a copy with every integer field byte-swapped.
    fn swap_bytes(self) -> Self;
}

/// Implements [`Swap`] for a struct by swapping the listed integer fields.
/// Byte arrays and single-byte fields are left out of the list.
macro_rules! impl_swap {
    ($ty:ty { $($field:ident),* $(,)? }) => {
        impl $crate::util::Swap for $ty {
            #[inline]
            fn swap_bytes(mut self) -> Self {
                $( self.$field = self.$field.swap_bytes(); )*
                self
            }
        }
    };
}
pub(crate) use impl_swap;

/// Decodes a `T` at `offset`, converting from `sex` to host byte order.
///
/// The source buffer is only read; unaligned offsets are fine.
#[inline]
pub fn decode<T: FromBytes + Swap>(data: &[u8], offset: usize, sex: ByteSex) -> Result<T> {
    let available = data.len().saturating_sub(offset);
    let source = data
        .get(offset..)
        .ok_or_else(|| Error::buffer_too_small(offset.saturating_add(std::mem::size_of::<T>()), data.len()))?;
    let (value, _) = T::read_from_prefix(source)
        .map_err(|_| Error::buffer_too_small(std::mem::size_of::<T>(), available))?;
    Ok(if sex.is_host() { value } else { value.swap_bytes() })
}

/// Encodes `value` (host byte order) into `out` using byte sex `sex`.
#[inline]
pub fn encode_into<T: IntoBytes + Immutable + Swap + Copy>(
    value: &T,
    sex: ByteSex,
    out: &mut [u8],
) -> Result<()> {
    let size = std::mem::size_of::<T>();
    let available = out.len();
    let target = out
        .get_mut(..size)
        .ok_or_else(|| Error::buffer_too_small(size, available))?;
    if sex.is_host() {
        target.copy_from_slice(value.as_bytes());
    } else {
        target.copy_from_slice(value.swap_bytes().as_bytes());
    }
    Ok(())
}

/// Encodes `value` into a fresh buffer using byte sex `sex`.
pub fn encode<T: IntoBytes + Immutable + Swap + Copy>(value: &T, sex: ByteSex) -> Vec<u8> {
    let value = if sex.is_host() { *value } else { value.swap_bytes() };
    value.as_bytes().to_vec()
}

// =============================================================================
// Strings
// =============================================================================

/// Finds the position of the first null byte in a slice.
#[inline(always)]
pub fn memchr_null(data: &[u8]) -> usize {
    memchr::memchr(0, data).unwrap_or(data.len())
}

/// Returns the NUL-terminated byte string starting at `offset`, or an empty
/// slice when `offset` is out of range.
#[inline]
pub fn c_str_at(data: &[u8], offset: usize) -> &[u8] {
    match data.get(offset..) {
        Some(rest) => &rest[..memchr_null(rest)],
        None => &[],
    }
}

/// Interprets a fixed-size name field (e.g. `segname`) as a string.
pub fn fixed_name(field: &[u8]) -> String {
    String::from_utf8_lossy(&field[..memchr_null(field)]).into_owned()
}

// =============================================================================
// ASCII Fields
// =============================================================================

/// Parses a space padded ASCII number the way `strtoul` does: leading blanks
/// are skipped and parsing stops at the first non-digit. Returns 0 when no
/// digit is present and saturates on overflow.
pub fn parse_ascii_number(field: &[u8], radix: u32) -> u64 {
    let mut value: u64 = 0;
    let digits = field.iter().skip_while(|&&b| b == b' ');
    for &byte in digits {
        let Some(digit) = (byte as char).to_digit(radix) else {
            break;
        };
        value = value
            .saturating_mul(u64::from(radix))
            .saturating_add(u64::from(digit));
    }
    value
}

/// Returns true if `field` is one or more decimal digits followed only by
/// blanks.
pub fn is_decimal_field(field: &[u8]) -> bool {
    let digits = field.iter().take_while(|b| b.is_ascii_digit()).count();
    digits > 0 && field[digits..].iter().all(|&b| b == b' ')
}

/// Writes `text` left justified into `out`, padding with blanks.
pub fn write_ascii_field(out: &mut [u8], text: &str) -> Result<()> {
    let bytes = text.as_bytes();
    if bytes.len() > out.len() {
        return Err(Error::TooLarge {
            what: "archive header field",
            width: (out.len() * 8) as u32,
            value: bytes.len() as u64,
        });
    }
    out[..bytes.len()].copy_from_slice(bytes);
    out[bytes.len()..].fill(b' ');
    Ok(())
}

// =============================================================================
// Alignment Utilities
// =============================================================================

/// Aligns a value up to the given power-of-two alignment.
///
/// # Panics
///
/// Debug assertion fails if `alignment` is not a power of 2.
#[inline(always)]
pub const fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

/// Checks if a value is aligned to the given power-of-two alignment.
#[inline(always)]
pub const fn is_aligned(value: u64, alignment: u64) -> bool {
    debug_assert!(alignment.is_power_of_two());
    (value & (alignment - 1)) == 0
}

/// Returns true if `[offset, offset + size)` lies within `[0, limit)`,
/// treating arithmetic overflow as out of range.
#[inline]
pub fn range_within(offset: u64, size: u64, limit: u64) -> bool {
    offset.checked_add(size).is_some_and(|end| end <= limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

    #[derive(Debug, Clone, Copy, PartialEq, FromBytes, IntoBytes, KnownLayout, Immutable)]
    #[repr(C)]
    struct Pair {
        a: u32,
        b: u16,
        c: u16,
    }
    impl_swap!(Pair { a, b, c });

    #[test]
    fn test_byte_sex_reads() {
        let data = [0x01, 0x02, 0x03, 0x04];
        assert_eq!(ByteSex::Big.read_u32(&data), 0x01020304);
        assert_eq!(ByteSex::Little.read_u32(&data), 0x04030201);
        assert_eq!(ByteSex::Big.read_u32_at(&data, 1), None);
        assert_eq!(ByteSex::Big.opposite(), ByteSex::Little);
    }

    #[test]
    fn test_decode_both_sexes() {
        let data = [0x00, 0x00, 0x00, 0x2a, 0x00, 0x07, 0x01, 0x00];
        let big: Pair = decode(&data, 0, ByteSex::Big).unwrap();
        assert_eq!(big, Pair { a: 42, b: 7, c: 256 });
        let little: Pair = decode(&data, 0, ByteSex::Little).unwrap();
        assert_eq!(little.a, 0x2a000000);
        assert!(decode::<Pair>(&data, 1, ByteSex::Big).is_err());
        assert!(decode::<Pair>(&data, 100, ByteSex::Big).is_err());
    }

    #[test]
    fn test_encode_inverts_decode() {
        let value = Pair { a: 0xdeadbeef, b: 1, c: 2 };
        for sex in [ByteSex::Big, ByteSex::Little] {
            let bytes = encode(&value, sex);
            assert_eq!(decode::<Pair>(&bytes, 0, sex).unwrap(), value);
            let mut out = [0u8; 8];
            encode_into(&value, sex, &mut out).unwrap();
            assert_eq!(&out[..], &bytes[..]);
        }
        assert_eq!(encode(&value, ByteSex::Big)[..4], [0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn test_memchr_null() {
        assert_eq!(memchr_null(b"hello\0world"), 5);
        assert_eq!(memchr_null(b"\0"), 0);
        assert_eq!(memchr_null(b"hello"), 5);
        assert_eq!(c_str_at(b"ab\0cd\0", 3), b"cd");
        assert_eq!(c_str_at(b"ab", 9), b"");
    }

    #[test]
    fn test_ascii_fields() {
        assert_eq!(parse_ascii_number(b"1234      ", 10), 1234);
        assert_eq!(parse_ascii_number(b"  17x", 10), 17);
        assert_eq!(parse_ascii_number(b"100644  ", 8), 0o100644);
        assert_eq!(parse_ascii_number(b"abc", 10), 0);
        assert!(is_decimal_field(b"20   "));
        assert!(!is_decimal_field(b"   20"));
        assert!(!is_decimal_field(b"2x   "));

        let mut field = [0u8; 6];
        write_ascii_field(&mut field, "501").unwrap();
        assert_eq!(&field, b"501   ");
        assert!(write_ascii_field(&mut field, "1234567").is_err());
    }

    #[test]
    fn test_alignment() {
        assert_eq!(align_up(0, 8), 0);
        assert_eq!(align_up(9, 8), 16);
        assert_eq!(align_up(0x1000, 0x4000), 0x4000);
        assert!(is_aligned(0x4000, 0x1000));
        assert!(range_within(4, 4, 8));
        assert!(!range_within(4, 5, 8));
        assert!(!range_within(u64::MAX, 2, u64::MAX));
    }
}
