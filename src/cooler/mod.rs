// cooler/mod.rs

mod attributes;
mod dataset;
mod file;
mod multires;
mod selector;
mod uri;

pub use attributes::{Attributes, SumValue};
pub use dataset::{Dataset, DatasetIter};
pub use file::{CountKind, File, FileOptions};
pub use multires::{merge_coolers, zoomify, MultiResFile, SingleCellFile};
pub use selector::{Selector, SelectorIter};
pub use uri::CoolerUri;

/// `format` attribute sentinels.
pub const COOL_FORMAT: &str = "HDF5::Cooler";
pub const MCOOL_FORMAT: &str = "HDF5::MCOOL";
pub const SCOOL_FORMAT: &str = "HDF5::SCOOL";

/// Cooler schema version written by this crate.
pub const FORMAT_VERSION: u32 = 3;

/// gzip level applied to every dataset.
pub const COMPRESSION_LEVEL: u8 = 6;

/// Target chunk size in bytes for chunked datasets.
pub const CHUNK_BYTES: usize = 64 * 1024;

/// Smallest prefetch window used by dataset iterators.
pub const MIN_PREFETCH_BYTES: usize = 32 * 1024;

/// Per-dataset read-buffer budgets.
#[derive(Clone, Copy, Debug)]
pub struct CacheSizes {
    /// Budget for ordinary datasets.
    pub generic_bytes: usize,
    /// Budget for each of the three pixel columns.
    pub pixel_bytes: usize,
}

impl Default for CacheSizes {
    fn default() -> Self {
        Self {
            generic_bytes: 1024 * 1024,
            pixel_bytes: 4 * 1024 * 1024,
        }
    }
}

/// True when `path` starts with the HDF5 superblock signature.
pub fn is_hdf5_file(path: &std::path::Path) -> bool {
    const SIGNATURE: [u8; 8] = [0x89, b'H', b'D', b'F', b'\r', b'\n', 0x1a, b'\n'];
    std::fs::File::open(path)
        .and_then(|mut f| {
            use std::io::Read;
            let mut buf = [0u8; 8];
            f.read_exact(&mut buf)?;
            Ok(buf == SIGNATURE)
        })
        .unwrap_or(false)
}
