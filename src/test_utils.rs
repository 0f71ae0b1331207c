// test_utils.rs

use std::env;
use std::path::{Path, PathBuf};

use crate::bin_table::BinTable;
use crate::pixel::ThinPixel;
use crate::reference::Reference;

pub struct TestDir {
    dir: PathBuf,
    _temp_dir: Option<tempfile::TempDir>, // Some if temporary, None if persistent
}

impl TestDir {
    pub fn new(prefix: &str) -> std::io::Result<Self> {
        // Check if KEEP_TEST_OUTPUT environment variable is set
        let keep_output = env::var("KEEP_TEST_OUTPUT").is_ok();

        if keep_output {
            let output_dir = env::current_dir()?.join("test_output").join(prefix);
            std::fs::create_dir_all(&output_dir)?;
            Ok(TestDir {
                dir: output_dir,
                _temp_dir: None,
            })
        } else {
            let temp_dir = tempfile::tempdir()?;
            let dir = temp_dir.path().to_path_buf();
            Ok(TestDir {
                dir,
                _temp_dir: Some(temp_dir),
            })
        }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }
}

/// Two chromosomes, 100 bp bins: chr1 owns bins 0..10, chr2 bins 10..16.
pub fn test_bin_table() -> BinTable {
    let chroms = Reference::from_chrom_sizes([("chr1", 1000u32), ("chr2", 600)]).unwrap();
    BinTable::new(chroms, 100).unwrap()
}

/// A deterministic, sorted, upper-triangular pixel set over
/// [`test_bin_table`], mixing cis and trans entries.
pub fn test_pixels() -> Vec<ThinPixel<i32>> {
    let mut pixels = Vec::new();
    for i in 0..16u64 {
        for j in i..16u64 {
            if (i + j) % 3 == 0 {
                continue;
            }
            pixels.push(ThinPixel::new(i, j, (i * 16 + j) as i32 + 1));
        }
    }
    pixels
}
