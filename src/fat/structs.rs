//! Fat header structures (always big-endian on disk).

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::util::impl_swap;

/// Fat file header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct FatHeader {
    /// FAT_MAGIC or FAT_MAGIC_64
    pub magic: u32,
    /// Number of slice table entries that follow
    pub nfat_arch: u32,
}

impl FatHeader {
    /// Size of the structure in bytes.
    pub const SIZE: usize = 8;
}

/// 32-bit slice table entry.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct FatArch {
    /// CPU type
    pub cputype: u32,
    /// CPU subtype
    pub cpusubtype: u32,
    /// File offset of the slice
    pub offset: u32,
    /// Size of the slice
    pub size: u32,
    /// Alignment as a power of two
    pub align: u32,
}

impl FatArch {
    /// Size of the structure in bytes.
    pub const SIZE: usize = 20;
}

/// 64-bit slice table entry.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct FatArch64 {
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
    /// Reserved
    pub reserved: u32,
}

impl FatArch64 {
    /// Size of the structure in bytes.
    pub const SIZE: usize = 32;
}

impl_swap!(FatHeader { magic, nfat_arch });
impl_swap!(FatArch { cputype, cpusubtype, offset, size, align });
impl_swap!(FatArch64 { cputype, cpusubtype, offset, size, align, reserved });
