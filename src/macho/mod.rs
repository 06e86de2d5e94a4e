//! Mach-O image parsing.
//!
//! This module provides the on-disk structures of Mach-O images and a
//! host-endian, read-only view over an image inside a larger buffer.

mod constants;
mod object;
mod structs;

pub use constants::*;
pub use object::*;
pub use structs::*;

#[cfg(test)]
pub(crate) use object::tests::build_object;
