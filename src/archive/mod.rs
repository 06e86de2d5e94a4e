//! `ar` archives: member headers, the member arena and the symbol TOC.

mod header;
mod members;
mod toc;

pub use header::*;
pub use members::*;
pub use toc::*;

#[cfg(test)]
pub(crate) use members::tests::{build_archive, RawMember};
