// genomic_interval.rs

use crate::error::{HicdexError, Result};
use crate::reference::{Chromosome, Reference};

/// A half-open interval `[start, end)` on one chromosome.
/// Coordinates are 0-based, like the underlying storage.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GenomicInterval {
    chrom: Chromosome,
    start: u32,
    end: u32,
}

impl GenomicInterval {
    pub fn new(chrom: Chromosome, start: u32, end: u32) -> Result<Self> {
        if start > end {
            return Err(HicdexError::OutOfRange(format!(
                "interval {}:{start}-{end} has start > end",
                chrom.name()
            )));
        }
        if end > chrom.size() {
            return Err(HicdexError::OutOfRange(format!(
                "interval {}:{start}-{end} exceeds chromosome size ({})",
                chrom.name(),
                chrom.size()
            )));
        }
        Ok(Self { chrom, start, end })
    }

    /// The whole of `chrom`.
    pub fn whole_chrom(chrom: Chromosome) -> Self {
        let end = chrom.size();
        Self {
            chrom,
            start: 0,
            end,
        }
    }

    /// Parse a UCSC-style query (`chr`, `chr:start-end`). Coordinates are
    /// interpreted as 0-based half-open; commas inside numbers are
    /// permitted; an end past the chromosome is clamped to its size.
    pub fn parse_ucsc(chroms: &Reference, query: &str) -> Result<Self> {
        if query.is_empty() {
            return Err(malformed(query, "query is empty"));
        }

        let (name, range) = match query.rsplit_once(':') {
            Some((name, range)) => (name, Some(range)),
            None => (query, None),
        };

        // A bare chromosome name may itself contain ':'
        let (chrom, range) = if range.is_some() && chroms.contains(query) {
            (chroms.try_get(query)?, None)
        } else {
            (chroms.try_get(name)?, range)
        };

        let Some(range) = range else {
            return Ok(Self::whole_chrom(chrom.clone()));
        };

        let (start, end) = range
            .split_once('-')
            .ok_or_else(|| malformed(query, "expected chrom:start-end"))?;
        let start = parse_coord(start).ok_or_else(|| malformed(query, "invalid start position"))?;
        let end = parse_coord(end).ok_or_else(|| malformed(query, "invalid end position"))?;

        if start > end {
            return Err(malformed(query, "start position is greater than end position"));
        }
        if start >= u64::from(chrom.size()) {
            return Err(HicdexError::OutOfRange(format!(
                "query {query} starts past the end of {} ({})",
                chrom.name(),
                chrom.size()
            )));
        }

        let start = start as u32;
        let end = end.min(u64::from(chrom.size())) as u32;
        Self::new(chrom.clone(), start, end)
    }

    /// Parse a BED triplet (`chrom\tstart\tend`).
    pub fn parse_bed(chroms: &Reference, line: &str) -> Result<Self> {
        let mut fields = line.split('\t');
        let (Some(name), Some(start), Some(end)) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(malformed(line, "expected 3 tab-separated fields"));
        };

        let chrom = chroms.try_get(name)?;
        let start = parse_coord(start).ok_or_else(|| malformed(line, "invalid start position"))?;
        let end = parse_coord(end).ok_or_else(|| malformed(line, "invalid end position"))?;
        if start > end {
            return Err(malformed(line, "start position is greater than end position"));
        }
        if start >= u64::from(chrom.size()) {
            return Err(HicdexError::OutOfRange(format!(
                "interval {name}:{start}-{end} starts past the end of {} ({})",
                chrom.name(),
                chrom.size()
            )));
        }
        Self::new(
            chrom.clone(),
            start as u32,
            end.min(u64::from(chrom.size())) as u32,
        )
    }

    #[inline]
    pub fn chrom(&self) -> &Chromosome {
        &self.chrom
    }

    #[inline]
    pub fn start(&self) -> u32 {
        self.start
    }

    #[inline]
    pub fn end(&self) -> u32 {
        self.end
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn overlaps(&self, other: &GenomicInterval) -> bool {
        self.chrom == other.chrom && self.start < other.end && other.start < self.end
    }
}

impl PartialOrd for GenomicInterval {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GenomicInterval {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.chrom.id(), self.start, self.end).cmp(&(other.chrom.id(), other.start, other.end))
    }
}

impl std::fmt::Display for GenomicInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}-{}", self.chrom.name(), self.start, self.end)
    }
}

fn malformed(query: &str, reason: &str) -> HicdexError {
    HicdexError::MalformedQuery {
        query: query.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_coord(field: &str) -> Option<u64> {
    if field.is_empty() {
        return None;
    }
    if field.contains(',') {
        field.replace(',', "").parse().ok()
    } else {
        field.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_reference() -> Reference {
        Reference::from_chrom_sizes([("chr1", 10_000u32), ("chr2", 5_000)]).unwrap()
    }

    #[test]
    fn test_parse_ucsc() {
        let chroms = make_reference();

        let gi = GenomicInterval::parse_ucsc(&chroms, "chr1:100-2000").unwrap();
        assert_eq!(gi.chrom().name(), "chr1");
        assert_eq!((gi.start(), gi.end()), (100, 2000));

        // Bare chromosome means the whole chromosome
        let gi = GenomicInterval::parse_ucsc(&chroms, "chr2").unwrap();
        assert_eq!((gi.start(), gi.end()), (0, 5_000));

        // Thousands separators are tolerated
        let gi = GenomicInterval::parse_ucsc(&chroms, "chr1:1,000-2,500").unwrap();
        assert_eq!((gi.start(), gi.end()), (1000, 2500));

        // Ends straddling the chromosome clamp to its size
        let gi = GenomicInterval::parse_ucsc(&chroms, "chr2:4000-99999").unwrap();
        assert_eq!((gi.start(), gi.end()), (4000, 5000));

        // Empty intervals are allowed
        let gi = GenomicInterval::parse_ucsc(&chroms, "chr1:500-500").unwrap();
        assert!(gi.is_empty());
    }

    #[test]
    fn test_parse_ucsc_errors() {
        let chroms = make_reference();
        assert!(matches!(
            GenomicInterval::parse_ucsc(&chroms, "chrX:0-10"),
            Err(HicdexError::NotFound(_))
        ));
        assert!(matches!(
            GenomicInterval::parse_ucsc(&chroms, "chr1:10"),
            Err(HicdexError::MalformedQuery { .. })
        ));
        assert!(matches!(
            GenomicInterval::parse_ucsc(&chroms, "chr1:200-100"),
            Err(HicdexError::MalformedQuery { .. })
        ));
        assert!(matches!(
            GenomicInterval::parse_ucsc(&chroms, "chr1:abc-100"),
            Err(HicdexError::MalformedQuery { .. })
        ));
        assert!(matches!(
            GenomicInterval::parse_ucsc(&chroms, ""),
            Err(HicdexError::MalformedQuery { .. })
        ));
        // Start past the chromosome end is an error, not a clamp
        assert!(matches!(
            GenomicInterval::parse_ucsc(&chroms, "chr1:20000-30000"),
            Err(HicdexError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_parse_bed() {
        let chroms = make_reference();
        let gi = GenomicInterval::parse_bed(&chroms, "chr1\t0\t1000").unwrap();
        assert_eq!((gi.start(), gi.end()), (0, 1000));

        assert!(matches!(
            GenomicInterval::parse_bed(&chroms, "chr1 0 1000"),
            Err(HicdexError::MalformedQuery { .. })
        ));
        assert!(matches!(
            GenomicInterval::parse_bed(&chroms, "chr1\t1000"),
            Err(HicdexError::MalformedQuery { .. })
        ));
    }

    #[test]
    fn test_ordering() {
        let chroms = make_reference();
        let a = GenomicInterval::parse_ucsc(&chroms, "chr1:0-100").unwrap();
        let b = GenomicInterval::parse_ucsc(&chroms, "chr1:50-100").unwrap();
        let c = GenomicInterval::parse_ucsc(&chroms, "chr2:0-10").unwrap();
        assert!(a < b && b < c);
        assert!(a.overlaps(&b));
        assert!(!b.overlaps(&c));
    }
}
