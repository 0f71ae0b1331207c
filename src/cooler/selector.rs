// cooler/selector.rs

use std::ops::Range;
use std::sync::Arc;

use super::file::{CountDataset, PixelDatasets};
use crate::balancing::Weights;
use crate::bin_table::BinTable;
use crate::error::{HicdexError, Result};
use crate::genomic_interval::GenomicInterval;
use crate::index::CsrIndex;
use crate::pixel::{Count, ThinPixel};

// Elements per read when scanning the pixel table front to back.
const SCAN_SLAB: usize = 64 * 1024;

/// A query bound to a cooler's pixel table. Iterating yields pixels in
/// (bin1_id, bin2_id) order; the storage itself is sorted, so no
/// reordering ever happens here.
#[derive(Clone, Debug)]
pub struct Selector {
    bins: Arc<BinTable>,
    index: Arc<CsrIndex>,
    pixels: PixelDatasets,
    coord1: Option<GenomicInterval>,
    coord2: Option<GenomicInterval>,
    row_range: Range<u64>,
    col_range: Range<u64>,
    weights: Option<Arc<Weights>>,
}

impl Selector {
    pub(super) fn genome_wide(
        bins: Arc<BinTable>,
        index: Arc<CsrIndex>,
        pixels: PixelDatasets,
    ) -> Self {
        let nbins = bins.size();
        Self {
            bins,
            index,
            pixels,
            coord1: None,
            coord2: None,
            row_range: 0..nbins,
            col_range: 0..nbins,
            weights: None,
        }
    }

    pub(super) fn rectangle(
        bins: Arc<BinTable>,
        index: Arc<CsrIndex>,
        pixels: PixelDatasets,
        coord1: GenomicInterval,
        coord2: GenomicInterval,
        weights: Option<Arc<Weights>>,
    ) -> Result<Self> {
        let row_range = bins.find_overlap(&coord1)?;
        let col_range = bins.find_overlap(&coord2)?;
        Ok(Self {
            bins,
            index,
            pixels,
            coord1: Some(coord1),
            coord2: Some(coord2),
            row_range,
            col_range,
            weights,
        })
    }

    pub fn coord1(&self) -> Option<&GenomicInterval> {
        self.coord1.as_ref()
    }

    pub fn coord2(&self) -> Option<&GenomicInterval> {
        self.coord2.as_ref()
    }

    pub fn bins(&self) -> Arc<BinTable> {
        Arc::clone(&self.bins)
    }

    pub fn weights(&self) -> Option<&Arc<Weights>> {
        self.weights.as_ref()
    }

    fn is_genome_wide(&self) -> bool {
        self.coord1.is_none()
            && self.coord2.is_none()
            && self.row_range == (0..self.bins.size())
            && self.col_range == (0..self.bins.size())
    }

    /// Iterate the selected pixels. Balanced selectors require a
    /// floating-point count type.
    pub fn iter<N: Count>(&self) -> Result<SelectorIter<'_, N>> {
        if self.weights.is_some() && !N::IS_FLOAT {
            return Err(HicdexError::PrecisionLoss(
                "balanced pixel counts require a floating-point type".into(),
            ));
        }
        let mode = if self.is_genome_wide() {
            IterMode::FullScan {
                pos: 0,
                end: self.index.nnz(),
            }
        } else {
            IterMode::RowWalk {
                next_row: self.row_range.start,
            }
        };
        Ok(SelectorIter {
            sel: self,
            mode,
            buf: Vec::new(),
            buf_pos: 0,
            failed: false,
        })
    }

    pub fn read_all<N: Count>(&self) -> Result<Vec<ThinPixel<N>>> {
        self.iter::<N>()?.collect()
    }
}

#[derive(Debug)]
enum IterMode {
    /// Genome-wide: stream the whole pixel table in slabs.
    FullScan { pos: u64, end: u64 },
    /// Rectangle: walk rows, binary-searching the bin2 window per row.
    RowWalk { next_row: u64 },
}

/// Forward iterator produced by [`Selector::iter`].
#[derive(Debug)]
pub struct SelectorIter<'a, N: Count> {
    sel: &'a Selector,
    mode: IterMode,
    buf: Vec<ThinPixel<N>>,
    buf_pos: usize,
    failed: bool,
}

impl<N: Count> SelectorIter<'_, N> {
    fn refill(&mut self) -> Result<bool> {
        self.buf.clear();
        self.buf_pos = 0;
        match &mut self.mode {
            IterMode::FullScan { pos, end } => {
                if *pos >= *end {
                    return Ok(false);
                }
                let lo = *pos as usize;
                let hi = (*pos + SCAN_SLAB as u64).min(*end) as usize;
                *pos = hi as u64;

                let bin1 = self.sel.pixels.bin1.read_slice(lo..hi)?;
                let bin2 = self.sel.pixels.bin2.read_slice(lo..hi)?;
                let counts = read_counts::<N>(&self.sel.pixels, lo..hi, &self.sel.weights, &bin1, &bin2)?;
                self.buf = bin1
                    .into_iter()
                    .zip(bin2)
                    .zip(counts)
                    .map(|((b1, b2), c)| ThinPixel::new(b1, b2, c))
                    .collect();
                Ok(true)
            }
            IterMode::RowWalk { next_row } => {
                while *next_row < self.sel.row_range.end {
                    let row = *next_row;
                    *next_row += 1;

                    let slice = self.sel.index.row_slice(row)?;
                    if slice.is_empty() {
                        continue;
                    }
                    let lo = slice.start as usize;
                    let hi = slice.end as usize;
                    let bin2 = self.sel.pixels.bin2.read_slice(lo..hi)?;

                    // bin2 is sorted within a row: binary-search the window
                    let first = bin2.partition_point(|&b| b < self.sel.col_range.start);
                    let last = bin2.partition_point(|&b| b < self.sel.col_range.end);
                    if first == last {
                        continue;
                    }

                    let bin1 = vec![row; last - first];
                    let bin2 = bin2[first..last].to_vec();
                    let counts = read_counts::<N>(
                        &self.sel.pixels,
                        lo + first..lo + last,
                        &self.sel.weights,
                        &bin1,
                        &bin2,
                    )?;
                    self.buf = bin1
                        .into_iter()
                        .zip(bin2)
                        .zip(counts)
                        .map(|((b1, b2), c)| ThinPixel::new(b1, b2, c))
                        .collect();
                    return Ok(true);
                }
                Ok(false)
            }
        }
    }
}

impl<N: Count> Iterator for SelectorIter<'_, N> {
    type Item = Result<ThinPixel<N>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        while self.buf_pos >= self.buf.len() {
            match self.refill() {
                Ok(true) => {}
                Ok(false) => return None,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
        let p = self.buf[self.buf_pos];
        self.buf_pos += 1;
        Some(Ok(p))
    }
}

fn read_counts<N: Count>(
    pixels: &PixelDatasets,
    range: Range<usize>,
    weights: &Option<Arc<Weights>>,
    bin1: &[u64],
    bin2: &[u64],
) -> Result<Vec<N>> {
    let raw: Vec<f64> = match &pixels.count {
        CountDataset::Int(ds) => {
            if weights.is_none() && !N::IS_FLOAT {
                // fast path: no balancing, integer in and integer out
                return ds
                    .read_slice(range)?
                    .into_iter()
                    .map(N::from_i32)
                    .collect();
            }
            ds.read_slice(range)?.into_iter().map(f64::from).collect()
        }
        CountDataset::Float(ds) => ds.read_slice(range)?,
    };

    match weights {
        Some(w) => raw
            .into_iter()
            .zip(bin1.iter().zip(bin2))
            .map(|(c, (&b1, &b2))| N::from_f64(w.balance_count(b1, b2, c)))
            .collect(),
        None => raw.into_iter().map(N::from_f64).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cooler::{File, FileOptions};
    use crate::test_utils::{test_bin_table, test_pixels, TestDir};

    fn make_cooler(dir: &TestDir) -> File {
        let uri = dir.path().join("selector.cool").display().to_string();
        let mut file =
            File::create::<i32>(&uri, test_bin_table(), FileOptions::default()).unwrap();
        file.append_pixels(test_pixels(), true).unwrap();
        file.finalize().unwrap();
        file
    }

    // Ground truth by filtering the in-memory pixel list.
    fn expected(rows: Range<u64>, cols: Range<u64>) -> Vec<ThinPixel<i32>> {
        test_pixels()
            .into_iter()
            .filter(|p| rows.contains(&p.bin1_id) && cols.contains(&p.bin2_id))
            .collect()
    }

    #[test]
    fn test_genome_wide() {
        let dir = TestDir::new("selector_genome_wide").unwrap();
        let file = make_cooler(&dir);

        let sel = file.fetch().unwrap();
        let all = sel.read_all::<i32>().unwrap();
        assert_eq!(all, test_pixels());

        // emission order is strictly increasing
        for w in all.windows(2) {
            assert!(w[0].coords() < w[1].coords());
        }
    }

    #[test]
    fn test_cis_query() {
        let dir = TestDir::new("selector_cis").unwrap();
        let file = make_cooler(&dir);

        // chr1:200-500 covers bins 2..5
        let sel = file.fetch_query("chr1:200-500").unwrap();
        let got = sel.read_all::<i32>().unwrap();
        assert_eq!(got, expected(2..5, 2..5));
        assert_eq!(sel.coord1().unwrap().to_string(), "chr1:200-500");
    }

    #[test]
    fn test_rectangle_query() {
        let dir = TestDir::new("selector_rectangle").unwrap();
        let file = make_cooler(&dir);

        // chr1 rows vs chr2 columns: bins 0..10 x 10..16
        let sel = file.fetch2("chr1", "chr2").unwrap();
        let got = sel.read_all::<i32>().unwrap();
        assert_eq!(got, expected(0..10, 10..16));
        assert!(!got.is_empty());
    }

    #[test]
    fn test_query_clamps_to_chromosome_end() {
        let dir = TestDir::new("selector_clamp").unwrap();
        let file = make_cooler(&dir);

        let sel = file.fetch_query("chr2:0-999999").unwrap();
        let got = sel.read_all::<i32>().unwrap();
        assert_eq!(got, expected(10..16, 10..16));
    }

    #[test]
    fn test_empty_query() {
        let dir = TestDir::new("selector_empty").unwrap();
        let file = make_cooler(&dir);

        let sel = file.fetch_query("chr1:500-500").unwrap();
        let mut it = sel.iter::<i32>().unwrap();
        assert!(it.next().is_none());
    }

    #[test]
    fn test_balanced_iteration() {
        let dir = TestDir::new("selector_balanced").unwrap();
        let file = make_cooler(&dir);
        let nbins = file.bins().size() as usize;

        let weights = crate::balancing::Weights::new(
            vec![0.5; nbins],
            crate::balancing::WeightKind::Multiplicative,
        );
        file.write_weights("weight", &weights, false).unwrap();

        let sel = file
            .fetch_normalized("chr1", "chr1", "weight")
            .unwrap();

        // integer iteration over a balanced selector is refused
        assert!(sel.iter::<i32>().is_err());

        let raw = expected(0..10, 0..10);
        let balanced = sel.read_all::<f64>().unwrap();
        assert_eq!(balanced.len(), raw.len());
        for (b, r) in balanced.iter().zip(&raw) {
            assert_eq!(b.coords(), r.coords());
            assert!((b.count - f64::from(r.count) * 0.25).abs() < 1e-12);
        }
    }

    #[test]
    fn test_counts_convert_to_requested_type() {
        let dir = TestDir::new("selector_convert").unwrap();
        let file = make_cooler(&dir);

        let as_f32 = file.fetch().unwrap().read_all::<f32>().unwrap();
        let as_i64 = file.fetch().unwrap().read_all::<i64>().unwrap();
        let raw = test_pixels();
        for ((a, b), r) in as_f32.iter().zip(&as_i64).zip(&raw) {
            assert_eq!(a.count, r.count as f32);
            assert_eq!(b.count, i64::from(r.count));
        }
    }
}
