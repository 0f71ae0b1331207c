// hic/selector.rs

use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};
use std::marker::PhantomData;
use std::ops::Range;
use std::sync::Arc;

use super::block;
use super::file::File;
use super::footer::Footer;
use super::{MatrixType, NORM_NONE};
use crate::bin_table::BinTable;
use crate::error::{HicdexError, Result};
use crate::genomic_interval::GenomicInterval;
use crate::pixel::{Count, ThinPixel};

/// A query over one chromosome pair of a .hic file.
#[derive(Clone, Debug)]
pub struct Selector {
    file: File,
    bins: Arc<BinTable>,
    footer: Option<Arc<Footer>>,
    coord1: GenomicInterval,
    coord2: GenomicInterval,
    abs1: Range<u64>,
    abs2: Range<u64>,
    local1: (u64, u64),
    local2: (u64, u64),
    norm: Option<NormPair>,
    intra: bool,
}

#[derive(Clone, Debug)]
struct NormPair {
    v1: Arc<Vec<f64>>,
    v2: Arc<Vec<f64>>,
    offset1: u64,
    offset2: u64,
}

impl Selector {
    pub(super) fn new(
        file: File,
        bins: Arc<BinTable>,
        coord1: GenomicInterval,
        coord2: GenomicInterval,
        normalization: Option<String>,
    ) -> Result<Self> {
        // canonical orientation: chrom1 id <= chrom2 id
        let (coord1, coord2) = if coord1.chrom().id() > coord2.chrom().id() {
            (coord2, coord1)
        } else {
            (coord1, coord2)
        };
        let resolution = bins.bin_size();
        let intra = coord1.chrom() == coord2.chrom();

        let fid1 = file.header().file_id(coord1.chrom().name())?;
        let fid2 = file.header().file_id(coord2.chrom().name())?;
        let footer = file.footer(
            fid1,
            fid2,
            resolution,
            normalization.as_deref().unwrap_or(NORM_NONE),
        )?;

        let abs1 = bins.find_overlap(&coord1)?;
        let abs2 = bins.find_overlap(&coord2)?;
        let offset1 = bins.chrom_bin_offset(coord1.chrom().id())?;
        let offset2 = bins.chrom_bin_offset(coord2.chrom().id())?;

        let norm = match normalization {
            Some(name) => Some(NormPair {
                v1: file.norm_vector(&name, fid1, resolution)?,
                v2: file.norm_vector(&name, fid2, resolution)?,
                offset1,
                offset2,
            }),
            None => None,
        };

        Ok(Self {
            local1: (abs1.start - offset1, abs1.end - offset1),
            local2: (abs2.start - offset2, abs2.end - offset2),
            file,
            bins,
            footer,
            coord1,
            coord2,
            abs1,
            abs2,
            norm,
            intra,
        })
    }

    pub fn coord1(&self) -> &GenomicInterval {
        &self.coord1
    }

    pub fn coord2(&self) -> &GenomicInterval {
        &self.coord2
    }

    pub fn bins(&self) -> Arc<BinTable> {
        Arc::clone(&self.bins)
    }

    pub fn matrix_type(&self) -> MatrixType {
        MatrixType::Observed
    }

    /// Sum recorded in the footer for this chromosome pair.
    pub fn sum_counts(&self) -> f64 {
        self.footer.as_ref().map(|f| f.sum_counts).unwrap_or(0.0)
    }

    fn candidate_blocks(&self) -> Vec<i32> {
        let Some(footer) = &self.footer else {
            return Vec::new();
        };
        if self.file.version() > 8 && self.intra {
            block::diagonal_blocks(
                self.local1,
                self.local2,
                footer.block_bin_count,
                footer.block_column_count,
            )
        } else {
            block::grid_blocks(
                self.local1,
                self.local2,
                footer.block_bin_count,
                footer.block_column_count,
                self.intra,
            )
        }
    }

    fn filter(&self) -> PixelFilter {
        PixelFilter {
            abs1: self.abs1.clone(),
            abs2: self.abs2.clone(),
            norm: self.norm.clone(),
        }
    }

    /// Iterate the selected pixels; `sorted` merges blocks into strict
    /// (bin1_id, bin2_id) order, otherwise blocks stream as decoded.
    pub fn iter<N: Count>(&self, sorted: bool) -> Result<SelectorIter<N>> {
        if self.norm.is_some() && !N::IS_FLOAT {
            return Err(HicdexError::PrecisionLoss(
                "balanced pixel counts require a floating-point type".into(),
            ));
        }
        let filter = self.filter();
        let blocks = self.candidate_blocks();
        let Some(footer) = self.footer.clone() else {
            return Ok(SelectorIter::empty(filter));
        };

        let state = if sorted {
            let mut cursors = Vec::new();
            let mut heap = BinaryHeap::new();
            for id in blocks {
                let pixels = self.file.block_pixels(&footer, id, &self.bins)?;
                let mut cursor = BlockCursor { pixels, pos: 0 };
                cursor.skip_to_match(&filter);
                if let Some(p) = cursor.peek() {
                    heap.push(Reverse((p.bin1_id, p.bin2_id, cursors.len())));
                    cursors.push(cursor);
                }
            }
            IterState::Sorted { cursors, heap }
        } else {
            IterState::Unsorted {
                file: self.file.clone(),
                footer,
                bins: Arc::clone(&self.bins),
                block_ids: blocks.into(),
                current: Arc::new(Vec::new()),
                pos: 0,
            }
        };
        Ok(SelectorIter {
            state,
            filter,
            failed: false,
            _marker: PhantomData,
        })
    }

    pub fn read_all<N: Count>(&self) -> Result<Vec<ThinPixel<N>>> {
        self.iter::<N>(true)?.collect()
    }
}

#[derive(Clone, Debug)]
struct PixelFilter {
    abs1: Range<u64>,
    abs2: Range<u64>,
    norm: Option<NormPair>,
}

impl PixelFilter {
    fn matches(&self, p: &ThinPixel<f64>) -> bool {
        self.abs1.contains(&p.bin1_id) && self.abs2.contains(&p.bin2_id)
    }

    fn apply<N: Count>(&self, p: &ThinPixel<f64>) -> Result<ThinPixel<N>> {
        let count = match &self.norm {
            Some(norm) => {
                let i = (p.bin1_id - norm.offset1) as usize;
                let j = (p.bin2_id - norm.offset2) as usize;
                let w1 = norm.v1.get(i).copied().unwrap_or(f64::NAN);
                let w2 = norm.v2.get(j).copied().unwrap_or(f64::NAN);
                p.count / (w1 * w2)
            }
            None => p.count,
        };
        Ok(ThinPixel::new(p.bin1_id, p.bin2_id, N::from_f64(count)?))
    }
}

#[derive(Debug)]
struct BlockCursor {
    pixels: Arc<Vec<ThinPixel<f64>>>,
    pos: usize,
}

impl BlockCursor {
    fn peek(&self) -> Option<&ThinPixel<f64>> {
        self.pixels.get(self.pos)
    }

    fn skip_to_match(&mut self, filter: &PixelFilter) {
        while let Some(p) = self.pixels.get(self.pos) {
            if filter.matches(p) {
                break;
            }
            self.pos += 1;
        }
    }
}

#[derive(Debug)]
enum IterState {
    Empty,
    Sorted {
        cursors: Vec<BlockCursor>,
        heap: BinaryHeap<Reverse<(u64, u64, usize)>>,
    },
    Unsorted {
        file: File,
        footer: Arc<Footer>,
        bins: Arc<BinTable>,
        block_ids: VecDeque<i32>,
        current: Arc<Vec<ThinPixel<f64>>>,
        pos: usize,
    },
}

/// Iterator over one .hic selector.
#[derive(Debug)]
pub struct SelectorIter<N: Count> {
    state: IterState,
    filter: PixelFilter,
    failed: bool,
    _marker: PhantomData<N>,
}

impl<N: Count> SelectorIter<N> {
    fn empty(filter: PixelFilter) -> Self {
        Self {
            state: IterState::Empty,
            filter,
            failed: false,
            _marker: PhantomData,
        }
    }

    fn next_raw(&mut self) -> Result<Option<ThinPixel<f64>>> {
        match &mut self.state {
            IterState::Empty => Ok(None),
            IterState::Sorted { cursors, heap } => {
                let Some(Reverse((_, _, idx))) = heap.pop() else {
                    return Ok(None);
                };
                let cursor = &mut cursors[idx];
                let pixel = *cursor.peek().expect("cursor on heap has a current pixel");
                cursor.pos += 1;
                cursor.skip_to_match(&self.filter);
                if let Some(next) = cursor.peek() {
                    heap.push(Reverse((next.bin1_id, next.bin2_id, idx)));
                }
                Ok(Some(pixel))
            }
            IterState::Unsorted {
                file,
                footer,
                bins,
                block_ids,
                current,
                pos,
            } => loop {
                while let Some(p) = current.get(*pos) {
                    *pos += 1;
                    if self.filter.matches(p) {
                        return Ok(Some(*p));
                    }
                }
                let Some(id) = block_ids.pop_front() else {
                    return Ok(None);
                };
                *current = file.block_pixels(footer, id, bins)?;
                *pos = 0;
            },
        }
    }
}

impl<N: Count> Iterator for SelectorIter<N> {
    type Item = Result<ThinPixel<N>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_raw() {
            Ok(Some(p)) => Some(self.filter.apply(&p)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Genome-wide selector: one [`Selector`] per chromosome pair, visited
/// in (chrom1_id, chrom2_id) order.
#[derive(Clone, Debug)]
pub struct AllSelector {
    selectors: Vec<Selector>,
    bins: Arc<BinTable>,
}

impl AllSelector {
    pub(super) fn new(selectors: Vec<Selector>, bins: Arc<BinTable>) -> Self {
        Self { selectors, bins }
    }

    pub fn bins(&self) -> Arc<BinTable> {
        Arc::clone(&self.bins)
    }

    /// Per-pair selectors, in visit order.
    pub fn selectors(&self) -> &[Selector] {
        &self.selectors
    }

    /// Iterate the whole genome. With `sorted`, pairs sharing chrom1 are
    /// merged on the fly so the emission is strictly (bin1_id, bin2_id)
    /// ascending across the whole stream; otherwise pairs stream one
    /// after another in (chrom1_id, chrom2_id) order.
    pub fn iter<N: Count>(&self, sorted: bool) -> AllIter<N> {
        if sorted {
            // group the pair selectors by chrom1: every pixel whose bin1
            // lies on chrom1 comes from one of these, so merging a group
            // yields the globally sorted order
            let mut groups: Vec<Vec<Selector>> = Vec::new();
            for selector in &self.selectors {
                let chrom1 = selector.coord1().chrom().id();
                match groups.last_mut() {
                    Some(group)
                        if group[0].coord1().chrom().id() == chrom1 =>
                    {
                        group.push(selector.clone())
                    }
                    _ => groups.push(vec![selector.clone()]),
                }
            }
            AllIter {
                groups: groups.into(),
                selectors: VecDeque::new(),
                merged: None,
                current: None,
                sorted,
                failed: false,
            }
        } else {
            AllIter {
                groups: VecDeque::new(),
                selectors: self.selectors.clone().into(),
                merged: None,
                current: None,
                sorted,
                failed: false,
            }
        }
    }

    pub fn read_all<N: Count>(&self) -> Result<Vec<ThinPixel<N>>> {
        self.iter::<N>(true).collect()
    }
}

/// Iterator over an [`AllSelector`].
#[derive(Debug)]
pub struct AllIter<N: Count> {
    groups: VecDeque<Vec<Selector>>,
    selectors: VecDeque<Selector>,
    merged: Option<crate::transformers::PixelMerger<N, SelectorIter<N>>>,
    current: Option<SelectorIter<N>>,
    sorted: bool,
    failed: bool,
}

impl<N: Count> AllIter<N> {
    fn next_item(&mut self) -> Option<Result<ThinPixel<N>>> {
        loop {
            if let Some(merger) = &mut self.merged {
                match merger.next() {
                    Some(item) => return Some(item),
                    None => self.merged = None,
                }
            }
            if let Some(iter) = &mut self.current {
                match iter.next() {
                    Some(item) => return Some(item),
                    None => self.current = None,
                }
            }
            if self.sorted {
                let group = self.groups.pop_front()?;
                let iters: Result<Vec<_>> =
                    group.iter().map(|s| s.iter::<N>(true)).collect();
                match iters.and_then(crate::transformers::PixelMerger::new) {
                    Ok(merger) => self.merged = Some(merger),
                    Err(e) => return Some(Err(e)),
                }
            } else {
                let selector = self.selectors.pop_front()?;
                match selector.iter::<N>(false) {
                    Ok(iter) => self.current = Some(iter),
                    Err(e) => return Some(Err(e)),
                }
            }
        }
    }
}

impl<N: Count> Iterator for AllIter<N> {
    type Item = Result<ThinPixel<N>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_item() {
            Some(Err(e)) => {
                self.failed = true;
                Some(Err(e))
            }
            other => other,
        }
    }
}
