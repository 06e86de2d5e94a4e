//! Fat (universal) container header and slice table.

mod structs;
mod table;

pub use structs::*;
pub use table::*;

#[cfg(test)]
pub(crate) use table::tests::build_fat;
