// transformers/join.rs

use std::sync::Arc;

use crate::bin_table::BinTable;
use crate::error::Result;
use crate::pixel::{Count, Pixel, ThinPixel};

/// Lift a `ThinPixel` stream into a `Pixel` stream by looking both bin
/// ids up in a shared bin table.
#[derive(Debug)]
pub struct JoinGenomicCoords<N, I>
where
    N: Count,
    I: Iterator<Item = Result<ThinPixel<N>>>,
{
    src: I,
    bins: Arc<BinTable>,
}

impl<N, I> JoinGenomicCoords<N, I>
where
    N: Count,
    I: Iterator<Item = Result<ThinPixel<N>>>,
{
    pub fn new(src: I, bins: Arc<BinTable>) -> Self {
        Self { src, bins }
    }

    pub fn bins(&self) -> Arc<BinTable> {
        Arc::clone(&self.bins)
    }

    pub fn read_all(self) -> Result<Vec<Pixel<N>>> {
        self.collect()
    }
}

impl<N, I> Iterator for JoinGenomicCoords<N, I>
where
    N: Count,
    I: Iterator<Item = Result<ThinPixel<N>>>,
{
    type Item = Result<Pixel<N>>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.src.next()?;
        Some(item.and_then(|p| Pixel::from_thin(p, &self.bins)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_bin_table;

    #[test]
    fn test_join_looks_up_both_bins() {
        let bins = Arc::new(test_bin_table());
        let thin = vec![
            ThinPixel::new(0u64, 11u64, 5i32),
            ThinPixel::new(9, 15, 7),
        ];

        let joined: Vec<_> = JoinGenomicCoords::new(thin.iter().copied().map(Ok), bins)
            .collect::<Result<Vec<_>>>()
            .unwrap();

        assert_eq!(joined[0].coords.bin1.chrom().name(), "chr1");
        assert_eq!(joined[0].coords.bin2.chrom().name(), "chr2");
        assert_eq!(joined[0].coords.bin2.start(), 100);
        assert_eq!(joined[0].to_bg2(), "chr1\t0\t100\tchr2\t100\t200\t5");

        // chr2 is 600 bp: bin 15 is the short tail bin [500, 600)
        assert_eq!(joined[1].coords.bin2.interval().to_string(), "chr2:500-600");
        assert_eq!(joined[1].to_thin(), thin[1]);
    }

    #[test]
    fn test_join_rejects_out_of_table_ids() {
        let bins = Arc::new(test_bin_table());
        let thin = vec![ThinPixel::new(0u64, 99u64, 1i32)];
        let result: Result<Vec<_>> =
            JoinGenomicCoords::new(thin.into_iter().map(Ok), bins).collect();
        assert!(result.is_err());
    }
}
