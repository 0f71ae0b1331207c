// hic/mod.rs

mod block;
mod file;
mod footer;
mod header;
mod selector;
mod writer;

pub use block::BlockIndexEntry;
pub use file::File;
pub use footer::{Footer, FooterKey};
pub use header::Header;
pub use selector::{AllIter, AllSelector, Selector, SelectorIter};
pub use writer::{merge_hics, Writer, WriterOptions};

use crate::error::{HicdexError, Result};

/// Magic C-string opening every .hic file.
pub const MAGIC: &str = "HIC";

/// Versions this crate reads. Files are always written as version 8.
pub const SUPPORTED_VERSIONS: [i32; 2] = [8, 9];
pub const WRITE_VERSION: i32 = 8;

/// Decoded-block cache budget.
pub const DEFAULT_BLOCK_CACHE_BYTES: usize = 500 * 1024 * 1024;

/// Matrix unit. Fragment-based matrices are out of scope: parsing
/// recognizes the tag, but queries only accept `Bp`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Unit {
    Bp,
    Frag,
}

impl Unit {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "BP" => Ok(Unit::Bp),
            "FRAG" => Ok(Unit::Frag),
            _ => Err(HicdexError::FormatError(format!("unknown unit \"{s}\""))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Bp => "BP",
            Unit::Frag => "FRAG",
        }
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Matrix flavor. Footer cache keys carry the tag so observed and
/// derived matrices can never alias; only `Observed` selectors are
/// constructible (statistical transforms are out of scope).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MatrixType {
    #[default]
    Observed,
    Expected,
    Oe,
}

impl std::fmt::Display for MatrixType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MatrixType::Observed => "observed",
            MatrixType::Expected => "expected",
            MatrixType::Oe => "oe",
        };
        f.write_str(s)
    }
}

/// Normalization name accepted by the fetch family. "NONE" means raw.
pub const NORM_NONE: &str = "NONE";
