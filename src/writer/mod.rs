//! The write path: editable output trees, TOC construction and serialization.
//!
//! ```text
//! Ofile --breakout--> OutputFile --thin/join--> OutputFile --Writer--> bytes
//! ```

mod toc;
mod tree;
mod writeout;

pub use toc::*;
pub use tree::*;
pub use writeout::*;
