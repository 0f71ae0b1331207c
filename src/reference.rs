// reference.rs

use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;

use crate::error::{HicdexError, Result};

/// Name reserved for the synthetic whole-genome chromosome.
pub const ALL_CHROM_NAME: &str = "All";

/// A chromosome handle. Cheap to clone: the name is interned behind an
/// `Arc`, so copies share storage with the owning [`Reference`].
#[derive(Clone, Debug)]
pub struct Chromosome {
    id: u32,
    name: Arc<str>,
    size: u32,
}

impl Chromosome {
    pub fn new(id: u32, name: impl Into<Arc<str>>, size: u32) -> Self {
        Self {
            id,
            name: name.into(),
            size,
        }
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// True for the synthetic whole-genome chromosome.
    pub fn is_all(&self) -> bool {
        self.name.eq_ignore_ascii_case(ALL_CHROM_NAME)
    }
}

impl PartialEq for Chromosome {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.name == other.name && self.size == other.size
    }
}

impl Eq for Chromosome {}

impl std::hash::Hash for Chromosome {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.name.hash(state);
    }
}

impl PartialOrd for Chromosome {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Chromosome {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl std::fmt::Display for Chromosome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// An ordered, immutable set of chromosomes. Ids are assigned 0..n-1 in
/// insertion order; names are unique.
#[derive(Debug, Default)]
pub struct Reference {
    chroms: IndexMap<String, Chromosome>,
    // Cumulative genome size in bp, length nchroms + 1.
    prefix_sum: Vec<u64>,
    longest_chrom: OnceLock<u32>,
    longest_name: OnceLock<u32>,
}

impl Clone for Reference {
    fn clone(&self) -> Self {
        Self {
            chroms: self.chroms.clone(),
            prefix_sum: self.prefix_sum.clone(),
            longest_chrom: OnceLock::new(),
            longest_name: OnceLock::new(),
        }
    }
}

impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        self.chroms.len() == other.chroms.len()
            && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

impl Eq for Reference {}

impl Reference {
    /// Build a reference from `(name, size)` pairs. Duplicate or empty
    /// names and zero sizes are rejected.
    pub fn from_chrom_sizes<S, I>(chrom_sizes: I) -> Result<Self>
    where
        S: AsRef<str>,
        I: IntoIterator<Item = (S, u32)>,
    {
        let mut chroms = IndexMap::new();
        let mut prefix_sum = vec![0u64];

        for (name, size) in chrom_sizes {
            let name = name.as_ref();
            if name.is_empty() {
                return Err(HicdexError::StringError(
                    "chromosome names cannot be empty".into(),
                ));
            }
            if size == 0 {
                return Err(HicdexError::StringError(format!(
                    "chromosome \"{name}\" cannot have size 0"
                )));
            }
            let id = chroms.len() as u32;
            let last = *prefix_sum.last().unwrap();
            let previous = chroms.insert(name.to_string(), Chromosome::new(id, name, size));
            if previous.is_some() {
                return Err(HicdexError::StringError(format!(
                    "duplicate chromosome \"{name}\""
                )));
            }
            prefix_sum.push(last + u64::from(size));
        }

        Ok(Self {
            chroms,
            prefix_sum,
            longest_chrom: OnceLock::new(),
            longest_name: OnceLock::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.chroms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chroms.is_empty()
    }

    /// Total genome size in bp (the "All" chromosome, when present, is
    /// excluded from the sum).
    pub fn genome_size(&self) -> u64 {
        self.iter()
            .filter(|c| !c.is_all())
            .map(|c| u64::from(c.size()))
            .sum()
    }

    /// Genome-wide bp offset of the first base of chromosome `id`.
    pub fn chrom_offset(&self, id: u32) -> Result<u64> {
        self.prefix_sum
            .get(id as usize)
            .copied()
            .ok_or_else(|| HicdexError::OutOfRange(format!("chromosome id {id}")))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.chroms.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Chromosome> {
        self.chroms.get(name)
    }

    pub fn try_get(&self, name: &str) -> Result<&Chromosome> {
        self.get(name)
            .ok_or_else(|| HicdexError::NotFound(format!("chromosome \"{name}\"")))
    }

    pub fn get_id(&self, name: &str) -> Result<u32> {
        self.try_get(name).map(Chromosome::id)
    }

    pub fn at(&self, id: u32) -> Result<&Chromosome> {
        self.chroms
            .get_index(id as usize)
            .map(|(_, c)| c)
            .ok_or_else(|| HicdexError::OutOfRange(format!("chromosome id {id}")))
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Chromosome> {
        self.chroms.values()
    }

    /// The chromosome with the largest size. Computed once, then cached.
    pub fn longest_chromosome(&self) -> Result<&Chromosome> {
        if self.is_empty() {
            return Err(HicdexError::StringError(
                "longest_chromosome() called on an empty reference".into(),
            ));
        }
        let id = *self.longest_chrom.get_or_init(|| {
            self.iter()
                .max_by_key(|c| c.size())
                .map(Chromosome::id)
                .unwrap()
        });
        self.at(id)
    }

    /// The chromosome with the longest name. Computed once, then cached.
    pub fn chromosome_with_longest_name(&self) -> Result<&Chromosome> {
        if self.is_empty() {
            return Err(HicdexError::StringError(
                "chromosome_with_longest_name() called on an empty reference".into(),
            ));
        }
        let id = *self.longest_name.get_or_init(|| {
            self.iter()
                .max_by_key(|c| c.name().len())
                .map(Chromosome::id)
                .unwrap()
        });
        self.at(id)
    }

    pub fn has_all(&self) -> bool {
        self.iter().any(Chromosome::is_all)
    }

    /// Return a copy with the synthetic whole-genome chromosome appended.
    /// Its size is genome_size / 1000, the convention used by .hic files.
    pub fn with_all(&self) -> Result<Self> {
        if self.has_all() {
            return Ok(self.clone());
        }
        let all_size = (self.genome_size() / 1000).max(1).min(u64::from(u32::MAX)) as u32;
        let sizes = self
            .iter()
            .map(|c| (c.name().to_string(), c.size()))
            .chain(std::iter::once((ALL_CHROM_NAME.to_string(), all_size)));
        Self::from_chrom_sizes(sizes)
    }

    /// Return a copy with the synthetic whole-genome chromosome removed.
    pub fn without_all(&self) -> Result<Self> {
        Self::from_chrom_sizes(
            self.iter()
                .filter(|c| !c.is_all())
                .map(|c| (c.name().to_string(), c.size())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_reference() -> Reference {
        Reference::from_chrom_sizes([("chr1", 1000u32), ("chr2", 500), ("chr3", 250)]).unwrap()
    }

    #[test]
    fn test_lookup() {
        let chroms = make_reference();
        assert_eq!(chroms.len(), 3);
        assert_eq!(chroms.get_id("chr2").unwrap(), 1);
        assert_eq!(chroms.at(2).unwrap().name(), "chr3");
        assert_eq!(chroms.try_get("chr1").unwrap().size(), 1000);

        assert!(matches!(
            chroms.try_get("chrX"),
            Err(HicdexError::NotFound(_))
        ));
        assert!(matches!(chroms.at(99), Err(HicdexError::OutOfRange(_))));
    }

    #[test]
    fn test_prefix_sum() {
        let chroms = make_reference();
        assert_eq!(chroms.genome_size(), 1750);
        assert_eq!(chroms.chrom_offset(0).unwrap(), 0);
        assert_eq!(chroms.chrom_offset(1).unwrap(), 1000);
        assert_eq!(chroms.chrom_offset(2).unwrap(), 1500);
    }

    #[test]
    fn test_longest() {
        let chroms =
            Reference::from_chrom_sizes([("chr1", 100u32), ("chr22_KI270876v1", 50), ("chrX", 900)])
                .unwrap();
        assert_eq!(chroms.longest_chromosome().unwrap().name(), "chrX");
        assert_eq!(
            chroms.chromosome_with_longest_name().unwrap().name(),
            "chr22_KI270876v1"
        );
    }

    #[test]
    fn test_all_chromosome() {
        let chroms = make_reference();
        assert!(!chroms.has_all());

        let with_all = chroms.with_all().unwrap();
        assert!(with_all.has_all());
        assert_eq!(with_all.len(), 4);
        assert_eq!(with_all.at(3).unwrap().id(), with_all.len() as u32 - 1);
        // genome_size ignores the synthetic chromosome
        assert_eq!(with_all.genome_size(), chroms.genome_size());

        let stripped = with_all.without_all().unwrap();
        assert_eq!(stripped, chroms);
    }

    #[test]
    fn test_invalid_construction() {
        assert!(Reference::from_chrom_sizes([("chr1", 100u32), ("chr1", 200)]).is_err());
        assert!(Reference::from_chrom_sizes([("", 100u32)]).is_err());
        assert!(Reference::from_chrom_sizes([("chr1", 0u32)]).is_err());
    }
}
