// Algebraic laws of the pixel transformers, checked on generated data.

use std::collections::BTreeMap;
use std::sync::Arc;

use proptest::prelude::*;

use hicdex::transformers::{CoarsenPixels, PixelMerger};
use hicdex::{BinTable, Reference, Result, ThinPixel};

fn bin_table() -> Arc<BinTable> {
    let chroms =
        Reference::from_chrom_sizes([("chr1", 2_000u32), ("chr2", 1_250)]).unwrap();
    Arc::new(BinTable::new(chroms, 50).unwrap())
}

// Canonicalize raw (bin1, bin2, count) triples into a sorted, unique,
// upper-triangular pixel list.
fn canonicalize(raw: Vec<(u64, u64, i32)>, nbins: u64) -> Vec<ThinPixel<i64>> {
    let mut acc: BTreeMap<(u64, u64), i64> = BTreeMap::new();
    for (a, b, count) in raw {
        let (b1, b2) = (a.min(b) % nbins, a.max(b) % nbins);
        let (b1, b2) = (b1.min(b2), b1.max(b2));
        *acc.entry((b1, b2)).or_insert(0) += i64::from(count);
    }
    acc.into_iter()
        .filter(|&(_, c)| c != 0)
        .map(|((b1, b2), c)| ThinPixel::new(b1, b2, c))
        .collect()
}

fn pixels() -> impl Strategy<Value = Vec<ThinPixel<i64>>> {
    proptest::collection::vec((0u64..200, 0u64..200, 1i32..50), 0..150)
        .prop_map(|raw| canonicalize(raw, bin_table().size()))
}

fn merge(sources: Vec<Vec<ThinPixel<i64>>>) -> Vec<ThinPixel<i64>> {
    let iters: Vec<_> = sources
        .into_iter()
        .map(|v| v.into_iter().map(Ok))
        .collect();
    PixelMerger::new(iters)
        .unwrap()
        .collect::<Result<Vec<_>>>()
        .unwrap()
}

fn coarsen(pixels: Vec<ThinPixel<i64>>, factor: u32) -> Vec<ThinPixel<i64>> {
    CoarsenPixels::new(pixels.into_iter().map(Ok), bin_table(), factor)
        .unwrap()
        .collect::<Result<Vec<_>>>()
        .unwrap()
}

proptest! {
    #[test]
    fn merge_is_associative(a in pixels(), b in pixels(), c in pixels()) {
        let left = merge(vec![merge(vec![a.clone(), b.clone()]), c.clone()]);
        let right = merge(vec![a, merge(vec![b, c])]);
        prop_assert_eq!(left, right);
    }

    #[test]
    fn merge_output_is_sorted_and_unique(a in pixels(), b in pixels()) {
        let merged = merge(vec![a, b]);
        for w in merged.windows(2) {
            prop_assert!(w[0].coords() < w[1].coords());
        }
    }

    #[test]
    fn merge_conserves_mass(a in pixels(), b in pixels()) {
        let before: i64 = a.iter().chain(&b).map(|p| p.count).sum();
        let after: i64 = merge(vec![a, b]).iter().map(|p| p.count).sum();
        prop_assert_eq!(before, after);
    }

    #[test]
    fn coarsen_twice_by_two_equals_once_by_four(input in pixels()) {
        let via_two = {
            let first = CoarsenPixels::new(
                input.clone().into_iter().map(Ok),
                bin_table(),
                2,
            ).unwrap();
            let dst = first.dest_bins();
            CoarsenPixels::new(first, dst, 2)
                .unwrap()
                .collect::<Result<Vec<_>>>()
                .unwrap()
        };
        prop_assert_eq!(via_two, coarsen(input, 4));
    }

    #[test]
    fn coarsen_conserves_mass_and_order(input in pixels(), factor in 1u32..6) {
        let out = coarsen(input.clone(), factor);
        let before: i64 = input.iter().map(|p| p.count).sum();
        let after: i64 = out.iter().map(|p| p.count).sum();
        prop_assert_eq!(before, after);
        for w in out.windows(2) {
            prop_assert!(w[0].coords() < w[1].coords());
        }
    }
}
