// balancing.rs

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::bin_table::BinTable;
use crate::error::{HicdexError, Result};
use crate::pixel::{Count, Pixel, ThinPixel};

/// How a weight vector is applied to raw counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WeightKind {
    /// `count * w1 * w2`
    Multiplicative,
    /// `count / (w1 * w2)`
    Divisive,
}

/// A per-bin balancing vector. The vector itself is precomputed by an
/// external tool; hicdex only stores and applies it.
#[derive(Clone, Debug, PartialEq)]
pub struct Weights {
    values: Vec<f64>,
    kind: WeightKind,
}

/// Weight vectors shared by the selectors of one file.
pub type WeightMap = FxHashMap<String, Arc<Weights>>;

impl Weights {
    pub fn new(values: Vec<f64>, kind: WeightKind) -> Self {
        Self { values, kind }
    }

    /// Construct a vector whose kind is inferred from its legacy name.
    pub fn with_inferred_kind(values: Vec<f64>, name: &str) -> Result<Self> {
        Ok(Self::new(values, Self::infer_kind(name)?))
    }

    /// Map legacy normalization names onto a [`WeightKind`].
    pub fn infer_kind(name: &str) -> Result<WeightKind> {
        match name {
            "VC" | "INTER_VC" | "GW_VC" | "VC_SQRT" | "KR" | "INTER_KR" | "GW_KR" | "SCALE"
            | "INTER_SCALE" | "GW_SCALE" => Ok(WeightKind::Divisive),
            "ICE" | "INTER_ICE" | "GW_ICE" | "weight" | "weights" => {
                Ok(WeightKind::Multiplicative)
            }
            _ => Err(HicdexError::UnknownWeightType(name.to_string())),
        }
    }

    #[inline]
    pub fn kind(&self) -> WeightKind {
        self.kind
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn at(&self, i: usize) -> Result<f64> {
        self.values
            .get(i)
            .copied()
            .ok_or_else(|| HicdexError::OutOfRange(format!("weight index {i}")))
    }

    /// Error unless the vector length matches the bin table exactly.
    pub fn check_shape(&self, bins: &BinTable) -> Result<()> {
        if self.len() as u64 != bins.size() {
            return Err(HicdexError::ShapeMismatch {
                expected: bins.size() as usize,
                found: self.len(),
            });
        }
        Ok(())
    }

    /// Balance a raw count keyed by two bin ids. Always computed in f64.
    #[inline]
    pub fn balance_count(&self, bin1_id: u64, bin2_id: u64, count: f64) -> f64 {
        let w1 = self.values[bin1_id as usize];
        let w2 = self.values[bin2_id as usize];
        match self.kind {
            WeightKind::Multiplicative => count * w1 * w2,
            WeightKind::Divisive => count / (w1 * w2),
        }
    }

    pub fn balance_thin<N: Count>(&self, p: ThinPixel<N>) -> Result<ThinPixel<N>> {
        let count = self.balance_count(p.bin1_id, p.bin2_id, p.count.to_f64());
        Ok(ThinPixel::new(p.bin1_id, p.bin2_id, N::from_f64(count)?))
    }

    pub fn balance<N: Count>(&self, p: Pixel<N>) -> Result<Pixel<N>> {
        let count = self.balance_count(
            p.coords.bin1.id(),
            p.coords.bin2.id(),
            p.count.to_f64(),
        );
        Ok(Pixel {
            coords: p.coords,
            count: N::from_f64(count)?,
        })
    }

    /// Scale every weight by a single factor.
    pub fn rescale(&mut self, factor: f64) {
        for w in &mut self.values {
            *w *= factor;
        }
    }

    /// Scale per-chromosome chunks: `offsets` has one more entry than
    /// `factors` and partitions the vector.
    pub fn rescale_chunks(&mut self, factors: &[f64], offsets: &[u64]) -> Result<()> {
        if offsets.len() != factors.len() + 1 {
            return Err(HicdexError::ShapeMismatch {
                expected: factors.len() + 1,
                found: offsets.len(),
            });
        }
        for (i, &factor) in factors.iter().enumerate() {
            let lo = offsets[i] as usize;
            let hi = offsets[i + 1] as usize;
            for w in &mut self.values[lo..hi] {
                *w *= factor;
            }
        }
        Ok(())
    }
}
