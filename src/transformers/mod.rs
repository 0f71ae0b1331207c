// transformers/mod.rs

mod coarsen;
mod join;
mod merge;

pub use coarsen::CoarsenPixels;
pub use join::JoinGenomicCoords;
pub use merge::{check_bin_tables, PixelMerger};
