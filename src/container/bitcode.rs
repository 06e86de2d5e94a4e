//! Foreign (LLVM bitcode) module capability.
//!
//! The engine never loads a bitcode reader itself. Callers that can read
//! bitcode implement [`BitcodeCapability`] and hand it to the
//! [`Detector`](super::Detector); everyone else gets [`NoBitcode`].

use crate::macho::{BITCODE_MAGIC, BITCODE_WRAPPER_MAGIC};
use crate::util::ByteSex;

/// A symbol reported by a bitcode reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitcodeSymbol {
    /// Symbol name
    pub name: String,
    /// Defined in this module (as opposed to referenced)
    pub defined: bool,
    /// Visible outside the module
    pub external: bool,
    /// A tentative (common) definition
    pub common: bool,
}

/// What a bitcode reader knows about one module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitcodeModule {
    /// Target (cputype, cpusubtype), when the reader can tell
    pub target: Option<(u32, u32)>,
    /// Symbols in module order
    pub symbols: Vec<BitcodeSymbol>,
}

/// Recognizes bitcode modules and describes their symbols.
pub trait BitcodeCapability: Send + Sync {
    /// Returns true if `data` is a bitcode module.
    fn is_bitcode(&self, data: &[u8]) -> bool;

    /// Describes the module in `data`, or `None` if it cannot be read.
    fn module(&self, data: &[u8]) -> Option<BitcodeModule>;
}

/// The capability used when no bitcode reader is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBitcode;

impl BitcodeCapability for NoBitcode {
    fn is_bitcode(&self, _data: &[u8]) -> bool {
        false
    }

    fn module(&self, _data: &[u8]) -> Option<BitcodeModule> {
        None
    }
}

/// Recognizes bitcode by its magic numbers but cannot list symbols.
#[derive(Debug, Clone, Copy, Default)]
pub struct BitcodeMagic;

impl BitcodeCapability for BitcodeMagic {
    fn is_bitcode(&self, data: &[u8]) -> bool {
        has_bitcode_magic(data)
    }

    fn module(&self, data: &[u8]) -> Option<BitcodeModule> {
        has_bitcode_magic(data).then(BitcodeModule::default)
    }
}

/// Returns true for raw (`BC\xC0\xDE`) or wrapped bitcode.
pub fn has_bitcode_magic(data: &[u8]) -> bool {
    data.starts_with(BITCODE_MAGIC)
        || ByteSex::Little.read_u32_at(data, 0) == Some(BITCODE_WRAPPER_MAGIC)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Test reader: modules are `BC\xC0\xDE` followed by lines of
    /// `<D|U|C> <name>`, all external.
    pub(crate) struct FakeBitcode;

    impl BitcodeCapability for FakeBitcode {
        fn is_bitcode(&self, data: &[u8]) -> bool {
            data.starts_with(BITCODE_MAGIC)
        }

        fn module(&self, data: &[u8]) -> Option<BitcodeModule> {
            let body = std::str::from_utf8(data.strip_prefix(BITCODE_MAGIC)?).ok()?;
            let symbols = body
                .lines()
                .filter_map(|line| line.split_once(' '))
                .map(|(kind, name)| BitcodeSymbol {
                    name: name.to_string(),
                    defined: kind != "U",
                    external: true,
                    common: kind == "C",
                })
                .collect();
            Some(BitcodeModule { target: None, symbols })
        }
    }

    #[test]
    fn test_magic_detection() {
        assert!(has_bitcode_magic(b"BC\xC0\xDE rest"));
        assert!(has_bitcode_magic(&0x0B17_C0DEu32.to_le_bytes()));
        assert!(!has_bitcode_magic(b"!<arch>\n"));
        assert!(!NoBitcode.is_bitcode(b"BC\xC0\xDE"));
        assert_eq!(BitcodeMagic.module(b"BC\xC0\xDE").unwrap().symbols.len(), 0);
    }

    #[test]
    fn test_fake_reader() {
        let module = FakeBitcode.module(b"BC\xC0\xDED _f\nU _g\n").unwrap();
        assert_eq!(module.symbols.len(), 2);
        assert!(module.symbols[0].defined);
        assert!(!module.symbols[1].defined);
    }
}
