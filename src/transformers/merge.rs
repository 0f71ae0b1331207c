// transformers/merge.rs

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;

use crate::bin_table::BinTable;
use crate::error::{HicdexError, Result};
use crate::pixel::{Count, ThinPixel};

/// K-way merge of sorted `ThinPixel` streams. Pixels sharing the same
/// (bin1_id, bin2_id) are emitted once with their counts summed; the
/// output is sorted and duplicate-free whenever every input is.
///
/// All sources must be defined over the same bin table; callers holding
/// the tables should run [`check_bin_tables`] first.
#[derive(Debug)]
pub struct PixelMerger<N, I>
where
    N: Count,
    I: Iterator<Item = Result<ThinPixel<N>>>,
{
    heap: BinaryHeap<Reverse<HeapEntry<N>>>,
    sources: Vec<I>,
    failed: bool,
}

#[derive(Debug)]
struct HeapEntry<N> {
    bin1_id: u64,
    bin2_id: u64,
    source: usize,
    count: N,
}

impl<N> HeapEntry<N> {
    fn key(&self) -> (u64, u64, usize) {
        (self.bin1_id, self.bin2_id, self.source)
    }
}

impl<N> PartialEq for HeapEntry<N> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<N> Eq for HeapEntry<N> {}

impl<N> PartialOrd for HeapEntry<N> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<N> Ord for HeapEntry<N> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key().cmp(&other.key())
    }
}

/// Error with `BinTableMismatch` unless all tables are identical.
pub fn check_bin_tables(tables: &[Arc<BinTable>]) -> Result<()> {
    if let Some(first) = tables.first() {
        if tables.iter().any(|t| t.as_ref() != first.as_ref()) {
            return Err(HicdexError::BinTableMismatch);
        }
    }
    Ok(())
}

impl<N, I> PixelMerger<N, I>
where
    N: Count,
    I: Iterator<Item = Result<ThinPixel<N>>>,
{
    pub fn new(sources: Vec<I>) -> Result<Self> {
        let mut merger = Self {
            heap: BinaryHeap::with_capacity(sources.len()),
            sources,
            failed: false,
        };
        for i in 0..merger.sources.len() {
            merger.pull(i)?;
        }
        Ok(merger)
    }

    fn pull(&mut self, source: usize) -> Result<()> {
        if let Some(item) = self.sources[source].next() {
            let p = item?;
            self.heap.push(Reverse(HeapEntry {
                bin1_id: p.bin1_id,
                bin2_id: p.bin2_id,
                source,
                count: p.count,
            }));
        }
        Ok(())
    }

    fn next_pixel(&mut self) -> Result<Option<ThinPixel<N>>> {
        let Some(Reverse(top)) = self.heap.pop() else {
            return Ok(None);
        };
        let (bin1_id, bin2_id) = (top.bin1_id, top.bin2_id);
        let mut count = top.count;
        self.pull(top.source)?;

        while let Some(Reverse(peek)) = self.heap.peek() {
            if (peek.bin1_id, peek.bin2_id) != (bin1_id, bin2_id) {
                break;
            }
            let Reverse(dup) = self.heap.pop().unwrap();
            count = count.checked_add(dup.count).ok_or_else(|| {
                HicdexError::PrecisionLoss(format!(
                    "summing counts at ({bin1_id}, {bin2_id}) overflows"
                ))
            })?;
            self.pull(dup.source)?;
        }

        Ok(Some(ThinPixel::new(bin1_id, bin2_id, count)))
    }
}

impl<N, I> Iterator for PixelMerger<N, I>
where
    N: Count,
    I: Iterator<Item = Result<ThinPixel<N>>>,
{
    type Item = Result<ThinPixel<N>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_pixel() {
            Ok(Some(p)) => Some(Ok(p)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
