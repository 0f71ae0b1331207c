// index.rs

use std::ops::Range;

use crate::bin_table::BinTable;
use crate::error::{HicdexError, Result};
use crate::pixel::{Count, ThinPixel};

/// CSR-style genomic index over a sorted pixel table.
///
/// `bin1_offset[i]..bin1_offset[i + 1]` is the row of pixels whose
/// bin1_id is `i`; `chrom_offset` partitions the bin axis by chromosome,
/// so chromosome-level pixel spans compose from the two arrays.
#[derive(Clone, Debug, PartialEq)]
pub struct CsrIndex {
    bin1_offset: Vec<u64>,
    chrom_offset: Vec<u64>,
}

impl CsrIndex {
    pub fn new(bin1_offset: Vec<u64>, chrom_offset: Vec<u64>) -> Result<Self> {
        if bin1_offset.is_empty() {
            return Err(HicdexError::IndexCorrupt("bin1_offset is empty".into()));
        }
        if chrom_offset.is_empty() {
            return Err(HicdexError::IndexCorrupt("chrom_offset is empty".into()));
        }
        if let Some(i) = first_decrease(&bin1_offset) {
            return Err(HicdexError::IndexCorrupt(format!(
                "bin1_offset decreases at index {i} ({} -> {})",
                bin1_offset[i - 1],
                bin1_offset[i]
            )));
        }
        if let Some(i) = first_decrease(&chrom_offset) {
            return Err(HicdexError::IndexCorrupt(format!(
                "chrom_offset decreases at index {i} ({} -> {})",
                chrom_offset[i - 1],
                chrom_offset[i]
            )));
        }
        let num_bins = bin1_offset.len() as u64 - 1;
        if *chrom_offset.last().unwrap() != num_bins {
            return Err(HicdexError::IndexCorrupt(format!(
                "chrom_offset ends at {} but the table has {num_bins} bins",
                chrom_offset.last().unwrap()
            )));
        }
        Ok(Self {
            bin1_offset,
            chrom_offset,
        })
    }

    #[inline]
    pub fn num_bins(&self) -> u64 {
        self.bin1_offset.len() as u64 - 1
    }

    #[inline]
    pub fn num_chroms(&self) -> u32 {
        self.chrom_offset.len() as u32 - 1
    }

    /// Number of stored pixels.
    #[inline]
    pub fn nnz(&self) -> u64 {
        *self.bin1_offset.last().unwrap()
    }

    #[inline]
    pub fn bin1_offset(&self) -> &[u64] {
        &self.bin1_offset
    }

    #[inline]
    pub fn chrom_offset(&self) -> &[u64] {
        &self.chrom_offset
    }

    /// Half-open range of pixel rows whose bin1_id equals `bin1_id`.
    pub fn row_slice(&self, bin1_id: u64) -> Result<Range<u64>> {
        let i = bin1_id as usize;
        if i + 1 >= self.bin1_offset.len() {
            return Err(HicdexError::OutOfRange(format!(
                "bin id {bin1_id} exceeds the number of bins ({})",
                self.num_bins()
            )));
        }
        Ok(self.bin1_offset[i]..self.bin1_offset[i + 1])
    }

    /// Half-open range of pixel rows whose bin1 lies on chromosome
    /// `chrom_id`.
    pub fn chrom_slice(&self, chrom_id: u32) -> Result<Range<u64>> {
        let i = chrom_id as usize;
        if i + 1 >= self.chrom_offset.len() {
            return Err(HicdexError::OutOfRange(format!(
                "chromosome id {chrom_id} exceeds the number of chromosomes ({})",
                self.num_chroms()
            )));
        }
        let first_bin = self.chrom_offset[i] as usize;
        let last_bin = self.chrom_offset[i + 1] as usize;
        Ok(self.bin1_offset[first_bin]..self.bin1_offset[last_bin])
    }

    /// Stream `pixels` and verify they agree with this index: every pixel
    /// sits inside the row slice owning it, bin2 ids never decrease
    /// within a row, and the total matches `nnz`.
    pub fn validate_against<N, I>(&self, pixels: I) -> Result<()>
    where
        N: Count,
        I: IntoIterator<Item = Result<ThinPixel<N>>>,
    {
        let mut row = 0usize;
        let mut last_bin2 = 0u64;
        let mut k = 0u64;

        for pixel in pixels {
            let pixel = pixel?;
            while row + 1 < self.bin1_offset.len() && k >= self.bin1_offset[row + 1] {
                row += 1;
                last_bin2 = 0;
            }
            if row as u64 >= self.num_bins() {
                return Err(HicdexError::IndexCorrupt(format!(
                    "pixel #{k} lies past the last indexed row"
                )));
            }
            if pixel.bin1_id != row as u64 {
                return Err(HicdexError::IndexCorrupt(format!(
                    "pixel #{k} has bin1_id {} but lies in the slice of bin {row}",
                    pixel.bin1_id
                )));
            }
            if k > self.bin1_offset[row] && pixel.bin2_id < last_bin2 {
                return Err(HicdexError::IndexCorrupt(format!(
                    "bin2_id decreases within the row of bin {row} ({last_bin2} -> {})",
                    pixel.bin2_id
                )));
            }
            last_bin2 = pixel.bin2_id;
            k += 1;
        }

        if k != self.nnz() {
            return Err(HicdexError::IndexCorrupt(format!(
                "index records {} pixels but {k} were streamed",
                self.nnz()
            )));
        }
        Ok(())
    }
}

/// Accumulates per-row pixel counts during an append run and produces the
/// final prefix-sum arrays on close.
#[derive(Debug)]
pub struct IndexBuilder {
    row_counts: Vec<u64>,
    chrom_offset: Vec<u64>,
}

impl IndexBuilder {
    pub fn new(bins: &BinTable) -> Self {
        let nchroms = bins.reference().len() as u32;
        let chrom_offset = (0..=nchroms)
            .map(|id| {
                if id == nchroms {
                    bins.size()
                } else {
                    bins.chrom_bin_offset(id).expect("id within reference")
                }
            })
            .collect();
        Self {
            row_counts: vec![0; bins.size() as usize],
            chrom_offset,
        }
    }

    /// Record `n` more pixels in the row of `bin1_id`.
    pub fn record(&mut self, bin1_id: u64, n: u64) -> Result<()> {
        let slot = self
            .row_counts
            .get_mut(bin1_id as usize)
            .ok_or_else(|| HicdexError::OutOfRange(format!("bin id {bin1_id}")))?;
        *slot += n;
        Ok(())
    }

    pub fn nnz(&self) -> u64 {
        self.row_counts.iter().sum()
    }

    pub fn finalize(&self) -> Result<CsrIndex> {
        let mut bin1_offset = Vec::with_capacity(self.row_counts.len() + 1);
        let mut total = 0u64;
        bin1_offset.push(0);
        for &n in &self.row_counts {
            total += n;
            bin1_offset.push(total);
        }
        CsrIndex::new(bin1_offset, self.chrom_offset.clone())
    }
}

fn first_decrease(values: &[u64]) -> Option<usize> {
    values.windows(2).position(|w| w[1] < w[0]).map(|i| i + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::Reference;

    fn make_bins() -> BinTable {
        let chroms = Reference::from_chrom_sizes([("chr1", 300u32), ("chr2", 200)]).unwrap();
        BinTable::new(chroms, 100).unwrap()
    }

    fn make_pixels() -> Vec<ThinPixel<i32>> {
        vec![
            ThinPixel::new(0, 0, 1),
            ThinPixel::new(0, 2, 2),
            ThinPixel::new(1, 1, 3),
            ThinPixel::new(3, 4, 4),
            ThinPixel::new(4, 4, 5),
        ]
    }

    fn build_index() -> CsrIndex {
        let bins = make_bins();
        let mut builder = IndexBuilder::new(&bins);
        for p in make_pixels() {
            builder.record(p.bin1_id, 1).unwrap();
        }
        builder.finalize().unwrap()
    }

    #[test]
    fn test_builder_and_slices() {
        let index = build_index();
        assert_eq!(index.nnz(), 5);
        assert_eq!(index.num_bins(), 5);
        assert_eq!(index.bin1_offset(), &[0, 2, 3, 3, 4, 5]);

        assert_eq!(index.row_slice(0).unwrap(), 0..2);
        assert_eq!(index.row_slice(2).unwrap(), 3..3);
        assert_eq!(index.row_slice(4).unwrap(), 4..5);

        // chr1 owns bins 0..3, chr2 bins 3..5
        assert_eq!(index.chrom_slice(0).unwrap(), 0..3);
        assert_eq!(index.chrom_slice(1).unwrap(), 3..5);

        assert!(index.row_slice(5).is_err());
        assert!(index.chrom_slice(2).is_err());
    }

    #[test]
    fn test_validation_accepts_consistent_pixels() {
        let index = build_index();
        index
            .validate_against(make_pixels().into_iter().map(Ok))
            .unwrap();
    }

    #[test]
    fn test_validation_rejects_wrong_bin1() {
        let index = build_index();
        let mut pixels = make_pixels();
        pixels[2].bin1_id = 2;
        assert!(matches!(
            index.validate_against(pixels.into_iter().map(Ok)),
            Err(HicdexError::IndexCorrupt(_))
        ));
    }

    #[test]
    fn test_validation_rejects_unsorted_bin2() {
        let index = build_index();
        let mut pixels = make_pixels();
        pixels.swap(0, 1);
        assert!(matches!(
            index.validate_against(pixels.into_iter().map(Ok)),
            Err(HicdexError::IndexCorrupt(_))
        ));
    }

    #[test]
    fn test_validation_rejects_wrong_nnz() {
        let index = build_index();
        let mut pixels = make_pixels();
        pixels.pop();
        assert!(matches!(
            index.validate_against(pixels.into_iter().map(Ok)),
            Err(HicdexError::IndexCorrupt(_))
        ));
    }

    #[test]
    fn test_monotonicity_enforced() {
        assert!(matches!(
            CsrIndex::new(vec![0, 2, 1], vec![0, 2]),
            Err(HicdexError::IndexCorrupt(_))
        ));
        assert!(matches!(
            CsrIndex::new(vec![0, 1, 2], vec![0, 3]),
            Err(HicdexError::IndexCorrupt(_))
        ));
    }
}
