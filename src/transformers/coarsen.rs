// transformers/coarsen.rs

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use crate::bin_table::BinTable;
use crate::error::{HicdexError, Result};
use crate::pixel::{Count, ThinPixel};

/// Aggregate a sorted pixel stream into a coarser bin table whose bin
/// size is the source's multiplied by an integer factor.
///
/// Bin-id mapping is monotone, so once the source stream moves past the
/// last fine row feeding a coarse row that row can never grow again:
/// the window buffers only the destination rows still fed by upcoming
/// input, then flushes them in ascending (bin1, bin2) order. Peak memory
/// is bounded by the widest buffered destination row times the factor.
#[derive(Debug)]
pub struct CoarsenPixels<N, I>
where
    N: Count,
    I: Iterator<Item = Result<ThinPixel<N>>>,
{
    src: I,
    src_bins: Arc<BinTable>,
    dst_bins: Arc<BinTable>,
    factor: u32,
    window: BTreeMap<u64, BTreeMap<u64, N>>,
    out: VecDeque<ThinPixel<N>>,
    exhausted: bool,
    failed: bool,
}

impl<N, I> CoarsenPixels<N, I>
where
    N: Count,
    I: Iterator<Item = Result<ThinPixel<N>>>,
{
    pub fn new(src: I, src_bins: Arc<BinTable>, factor: u32) -> Result<Self> {
        if factor == 0 {
            return Err(HicdexError::OutOfRange(
                "coarsening factor cannot be 0".into(),
            ));
        }
        let dst_size = src_bins.bin_size().checked_mul(factor).ok_or_else(|| {
            HicdexError::OutOfRange(format!(
                "coarsening {} bp bins by {factor} overflows the bin size",
                src_bins.bin_size()
            ))
        })?;
        let dst_bins = Arc::new(BinTable::from_shared(
            src_bins.shared_reference(),
            dst_size,
        )?);
        Ok(Self {
            src,
            src_bins,
            dst_bins,
            factor,
            window: BTreeMap::new(),
            out: VecDeque::new(),
            exhausted: false,
            failed: false,
        })
    }

    /// The destination bin table pixels are emitted against.
    pub fn dest_bins(&self) -> Arc<BinTable> {
        Arc::clone(&self.dst_bins)
    }

    pub fn factor(&self) -> u32 {
        self.factor
    }

    // Source id -> destination id, by chromosome-relative arithmetic.
    fn map_bin(&self, src_id: u64) -> Result<u64> {
        let chrom_id = self.src_bins.chrom_id(src_id)?;
        let rel = src_id - self.src_bins.chrom_bin_offset(chrom_id)?;
        Ok(self.dst_bins.chrom_bin_offset(chrom_id)? + rel / u64::from(self.factor))
    }

    fn flush_rows_below(&mut self, cutoff: u64) {
        while let Some((&row, _)) = self.window.first_key_value() {
            if row >= cutoff {
                break;
            }
            let cols = self.window.remove(&row).unwrap();
            for (col, count) in cols {
                self.out.push_back(ThinPixel::new(row, col, count));
            }
        }
    }

    fn flush_all(&mut self) {
        self.flush_rows_below(u64::MAX);
    }

    fn refill(&mut self) -> Result<()> {
        while self.out.is_empty() {
            let Some(item) = self.src.next() else {
                self.exhausted = true;
                self.flush_all();
                return Ok(());
            };
            let p = item?;
            let row = self.map_bin(p.bin1_id)?;
            let col = self.map_bin(p.bin2_id)?;

            // the source is sorted, so rows before `row` are complete
            self.flush_rows_below(row);

            let slot = self
                .window
                .entry(row)
                .or_default()
                .entry(col)
                .or_insert_with(N::zero);
            *slot = slot.checked_add(p.count).ok_or_else(|| {
                HicdexError::PrecisionLoss(format!(
                    "accumulating counts into ({row}, {col}) overflows"
                ))
            })?;
        }
        Ok(())
    }
}

impl<N, I> Iterator for CoarsenPixels<N, I>
where
    N: Count,
    I: Iterator<Item = Result<ThinPixel<N>>>,
{
    type Item = Result<ThinPixel<N>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if self.out.is_empty() && !self.exhausted {
            if let Err(e) = self.refill() {
                self.failed = true;
                return Some(Err(e));
            }
        }
        self.out.pop_front().map(Ok)
    }
}
