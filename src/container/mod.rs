//! Opening, classifying and navigating files.
//!
//! - [`Container`] owns the mapped bytes of one file
//! - [`Detector`] classifies byte ranges and carries the validation settings
//! - [`Ofile`] is a cursor over a container's slices and archive members

mod bitcode;
mod cursor;
mod detect;
mod mapped;

pub use bitcode::*;
pub use cursor::*;
pub use detect::*;
pub use mapped::*;

#[cfg(test)]
pub(crate) use bitcode::tests::FakeBitcode;
