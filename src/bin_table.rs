// bin_table.rs

use std::ops::Range;
use std::sync::Arc;

use crate::error::{HicdexError, Result};
use crate::genomic_interval::GenomicInterval;
use crate::reference::{Chromosome, Reference};

/// A bin: a genomic interval together with its genome-wide id and its
/// chromosome-relative id. Ids may be null (`NULL_ID` / `REL_NULL_ID`)
/// for bins constructed from a bare interval.
#[derive(Clone, Debug, Eq)]
pub struct Bin {
    id: u64,
    rel_id: u32,
    interval: GenomicInterval,
}

impl Bin {
    pub const NULL_ID: u64 = u64::MAX;
    pub const REL_NULL_ID: u32 = u32::MAX;

    pub fn new(id: u64, rel_id: u32, interval: GenomicInterval) -> Self {
        Self {
            id,
            rel_id,
            interval,
        }
    }

    pub fn from_interval(interval: GenomicInterval) -> Self {
        Self {
            id: Self::NULL_ID,
            rel_id: Self::REL_NULL_ID,
            interval,
        }
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn rel_id(&self) -> u32 {
        self.rel_id
    }

    #[inline]
    pub fn interval(&self) -> &GenomicInterval {
        &self.interval
    }

    #[inline]
    pub fn chrom(&self) -> &Chromosome {
        self.interval.chrom()
    }

    #[inline]
    pub fn start(&self) -> u32 {
        self.interval.start()
    }

    #[inline]
    pub fn end(&self) -> u32 {
        self.interval.end()
    }

    #[inline]
    pub fn has_null_id(&self) -> bool {
        self.id == Self::NULL_ID
    }
}

impl PartialEq for Bin {
    fn eq(&self, other: &Self) -> bool {
        if self.has_null_id() || other.has_null_id() {
            self.interval == other.interval
        } else {
            self.id == other.id
        }
    }
}

impl PartialOrd for Bin {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Bin {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        if self.has_null_id() || other.has_null_id() {
            self.interval.cmp(&other.interval)
        } else {
            self.id.cmp(&other.id)
        }
    }
}

impl std::fmt::Display for Bin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.interval)
    }
}

/// Partitions a [`Reference`] into fixed-size bins. Mapping between
/// genome-wide bin ids and (chromosome, position) pairs is O(1) in the
/// forward direction and O(log nchroms) in the reverse one.
#[derive(Clone, Debug)]
pub struct BinTable {
    chroms: Arc<Reference>,
    bin_size: u32,
    // Number of bins preceding each chromosome, length nchroms + 1.
    prefix_sum: Vec<u64>,
}

impl PartialEq for BinTable {
    fn eq(&self, other: &Self) -> bool {
        self.bin_size == other.bin_size && self.chroms == other.chroms
    }
}

impl Eq for BinTable {}

impl BinTable {
    pub fn new(chroms: Reference, bin_size: u32) -> Result<Self> {
        Self::from_shared(Arc::new(chroms), bin_size)
    }

    pub fn from_shared(chroms: Arc<Reference>, bin_size: u32) -> Result<Self> {
        if bin_size == 0 {
            return Err(HicdexError::OutOfRange("bin size cannot be 0".into()));
        }
        let mut prefix_sum = Vec::with_capacity(chroms.len() + 1);
        prefix_sum.push(0u64);
        for chrom in chroms.iter() {
            let nbins = u64::from(chrom.size()).div_ceil(u64::from(bin_size));
            prefix_sum.push(prefix_sum.last().unwrap() + nbins);
        }
        Ok(Self {
            chroms,
            bin_size,
            prefix_sum,
        })
    }

    #[inline]
    pub fn bin_size(&self) -> u32 {
        self.bin_size
    }

    #[inline]
    pub fn reference(&self) -> &Reference {
        &self.chroms
    }

    pub fn shared_reference(&self) -> Arc<Reference> {
        Arc::clone(&self.chroms)
    }

    /// Total number of bins across all chromosomes.
    #[inline]
    pub fn size(&self) -> u64 {
        *self.prefix_sum.last().unwrap()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Number of bins on one chromosome.
    pub fn num_bins(&self, chrom: &Chromosome) -> u64 {
        u64::from(chrom.size()).div_ceil(u64::from(self.bin_size))
    }

    /// Number of bins preceding chromosome `chrom_id`.
    pub fn chrom_bin_offset(&self, chrom_id: u32) -> Result<u64> {
        self.prefix_sum
            .get(chrom_id as usize)
            .copied()
            .ok_or_else(|| HicdexError::OutOfRange(format!("chromosome id {chrom_id}")))
    }

    /// Genome-wide id of the bin containing `pos` on `chrom`.
    pub fn bin_id(&self, chrom: &Chromosome, pos: u32) -> Result<u64> {
        if pos >= chrom.size() {
            return Err(HicdexError::OutOfRange(format!(
                "position {}:{pos} exceeds chromosome size ({})",
                chrom.name(),
                chrom.size()
            )));
        }
        let offset = self.chrom_bin_offset(chrom.id())?;
        Ok(offset + u64::from(pos / self.bin_size))
    }

    pub fn bin_id_by_name(&self, chrom_name: &str, pos: u32) -> Result<u64> {
        let chrom = self.chroms.try_get(chrom_name)?.clone();
        self.bin_id(&chrom, pos)
    }

    /// The bin containing `pos` on `chrom`.
    pub fn bin(&self, chrom: &Chromosome, pos: u32) -> Result<Bin> {
        let id = self.bin_id(chrom, pos)?;
        self.bin_at(id)
    }

    /// Id of the chromosome owning `bin_id`. O(log nchroms), no clones.
    pub fn chrom_id(&self, bin_id: u64) -> Result<u32> {
        if bin_id >= self.size() {
            return Err(HicdexError::OutOfRange(format!(
                "bin id {bin_id} exceeds the number of bins ({})",
                self.size()
            )));
        }
        Ok(self.prefix_sum.partition_point(|&offset| offset <= bin_id) as u32 - 1)
    }

    /// Invert a genome-wide bin id. O(log nchroms).
    pub fn bin_at(&self, bin_id: u64) -> Result<Bin> {
        if bin_id >= self.size() {
            return Err(HicdexError::OutOfRange(format!(
                "bin id {bin_id} exceeds the number of bins ({})",
                self.size()
            )));
        }
        let chrom_idx = self.prefix_sum.partition_point(|&offset| offset <= bin_id) - 1;
        let chrom = self.chroms.at(chrom_idx as u32)?;
        let rel_id = (bin_id - self.prefix_sum[chrom_idx]) as u32;
        let start = rel_id * self.bin_size;
        let end = start.saturating_add(self.bin_size).min(chrom.size());
        let interval = GenomicInterval::new(chrom.clone(), start, end)?;
        Ok(Bin::new(bin_id, rel_id, interval))
    }

    /// Half-open range of genome-wide bin ids whose bins overlap
    /// `interval`. Empty intervals produce an empty range.
    pub fn find_overlap(&self, interval: &GenomicInterval) -> Result<Range<u64>> {
        let offset = self.chrom_bin_offset(interval.chrom().id())?;
        if interval.is_empty() {
            let first = offset + u64::from(interval.start() / self.bin_size);
            return Ok(first..first);
        }
        let first = offset + u64::from(interval.start() / self.bin_size);
        let last = offset + u64::from((interval.end() - 1) / self.bin_size);
        Ok(first..last + 1)
    }

    /// Half-open range of genome-wide bin ids owned by one chromosome.
    pub fn bin_range(&self, chrom: &Chromosome) -> Result<Range<u64>> {
        let first = self.chrom_bin_offset(chrom.id())?;
        Ok(first..first + self.num_bins(chrom))
    }

    /// Iterate every bin in the table in id order.
    pub fn iter(&self) -> impl Iterator<Item = Bin> + '_ {
        (0..self.size()).map(|id| self.bin_at(id).expect("bin id within table bounds"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_table() -> BinTable {
        let chroms =
            Reference::from_chrom_sizes([("chr1", 1000u32), ("chr2", 550), ("chr3", 99)]).unwrap();
        BinTable::new(chroms, 100).unwrap()
    }

    #[test]
    fn test_bin_counts() {
        let table = make_table();
        // 10 + 6 + 1 bins (ceil division)
        assert_eq!(table.size(), 17);
        assert_eq!(table.chrom_bin_offset(0).unwrap(), 0);
        assert_eq!(table.chrom_bin_offset(1).unwrap(), 10);
        assert_eq!(table.chrom_bin_offset(2).unwrap(), 16);
    }

    #[test]
    fn test_bin_id_round_trip() {
        let table = make_table();
        for id in 0..table.size() {
            let bin = table.bin_at(id).unwrap();
            assert_eq!(bin.id(), id);
            assert_eq!(table.bin_id(bin.chrom(), bin.start()).unwrap(), id);
        }
    }

    #[test]
    fn test_last_bin_is_shorter() {
        let table = make_table();
        // chr2 is 550 bp: its last bin covers [500, 550)
        let bin = table.bin_at(15).unwrap();
        assert_eq!(bin.chrom().name(), "chr2");
        assert_eq!((bin.start(), bin.end()), (500, 550));
        assert_eq!(bin.rel_id(), 5);

        // chr3 is shorter than one bin
        let bin = table.bin_at(16).unwrap();
        assert_eq!((bin.start(), bin.end()), (0, 99));
    }

    #[test]
    fn test_find_overlap() {
        let table = make_table();
        let chroms = table.shared_reference();

        let gi = GenomicInterval::parse_ucsc(&chroms, "chr1:150-250").unwrap();
        assert_eq!(table.find_overlap(&gi).unwrap(), 1..3);

        // Bin-aligned end does not spill into the next bin
        let gi = GenomicInterval::parse_ucsc(&chroms, "chr1:100-200").unwrap();
        assert_eq!(table.find_overlap(&gi).unwrap(), 1..2);

        // Whole chromosome
        let gi = GenomicInterval::parse_ucsc(&chroms, "chr2").unwrap();
        assert_eq!(table.find_overlap(&gi).unwrap(), 10..16);

        // Empty interval -> empty range
        let gi = GenomicInterval::parse_ucsc(&chroms, "chr1:500-500").unwrap();
        let r = table.find_overlap(&gi).unwrap();
        assert!(r.is_empty());
    }

    #[test]
    fn test_bin_range() {
        let table = make_table();
        let chr2 = table.reference().at(1).unwrap().clone();
        assert_eq!(table.bin_range(&chr2).unwrap(), 10..16);
    }

    #[test]
    fn test_out_of_range() {
        let table = make_table();
        assert!(matches!(
            table.bin_at(17),
            Err(HicdexError::OutOfRange(_))
        ));
        let chr1 = table.reference().at(0).unwrap().clone();
        assert!(matches!(
            table.bin_id(&chr1, 1000),
            Err(HicdexError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_zero_bin_size_rejected() {
        let chroms = Reference::from_chrom_sizes([("chr1", 100u32)]).unwrap();
        assert!(BinTable::new(chroms, 0).is_err());
    }
}
