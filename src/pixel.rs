// pixel.rs

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::bin_table::{Bin, BinTable};
use crate::error::{HicdexError, Result};

/// Arithmetic types usable as pixel counts.
///
/// Conversions follow the selector contract: float-to-float and
/// int-widening conversions are silent, float-to-int truncates the
/// fractional part, and anything that cannot be represented at all
/// (overflow, NaN, infinities) fails with `PrecisionLoss`.
pub trait Count:
    Copy
    + Default
    + PartialEq
    + PartialOrd
    + std::fmt::Debug
    + std::fmt::Display
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    const IS_FLOAT: bool;

    fn zero() -> Self;
    fn is_zero(&self) -> bool;
    /// Addition used when merging/coarsening; `None` on integer overflow.
    fn checked_add(self, rhs: Self) -> Option<Self>;
    fn from_i32(v: i32) -> Result<Self>;
    fn from_f64(v: f64) -> Result<Self>;
    fn to_f64(self) -> f64;
    /// Conversion used when persisting to an integer-count store.
    fn to_i32(self) -> Result<i32>;
}

macro_rules! impl_count_int {
    ($($t:ty),*) => {$(
        impl Count for $t {
            const IS_FLOAT: bool = false;

            #[inline]
            fn zero() -> Self {
                0
            }

            #[inline]
            fn is_zero(&self) -> bool {
                *self == 0
            }

            #[inline]
            fn checked_add(self, rhs: Self) -> Option<Self> {
                <$t>::checked_add(self, rhs)
            }

            fn from_i32(v: i32) -> Result<Self> {
                <$t>::try_from(v)
                    .map_err(|_| HicdexError::PrecisionLoss(format!(
                        "{v} does not fit in {}", stringify!($t))))
            }

            fn from_f64(v: f64) -> Result<Self> {
                if !v.is_finite() || v < <$t>::MIN as f64 || v > <$t>::MAX as f64 {
                    return Err(HicdexError::PrecisionLoss(format!(
                        "{v} does not fit in {}", stringify!($t))));
                }
                Ok(v as $t)
            }

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            fn to_i32(self) -> Result<i32> {
                i32::try_from(self).map_err(|_| HicdexError::PrecisionLoss(format!(
                    "{self} does not fit in i32")))
            }
        }
    )*};
}

macro_rules! impl_count_float {
    ($($t:ty),*) => {$(
        impl Count for $t {
            const IS_FLOAT: bool = true;

            #[inline]
            fn zero() -> Self {
                0.0
            }

            #[inline]
            fn is_zero(&self) -> bool {
                *self == 0.0
            }

            #[inline]
            fn checked_add(self, rhs: Self) -> Option<Self> {
                Some(self + rhs)
            }

            #[inline]
            fn from_i32(v: i32) -> Result<Self> {
                Ok(v as $t)
            }

            #[inline]
            fn from_f64(v: f64) -> Result<Self> {
                Ok(v as $t)
            }

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            fn to_i32(self) -> Result<i32> {
                let v = self as f64;
                if !v.is_finite() || v < i32::MIN as f64 || v > i32::MAX as f64 {
                    return Err(HicdexError::PrecisionLoss(format!(
                        "{self} does not fit in i32")));
                }
                Ok(v as i32)
            }
        }
    )*};
}

impl_count_int!(i32, i64, u32, u64);
impl_count_float!(f32, f64);

/// A matrix entry addressed by genome-wide bin ids. Symmetric-upper
/// storage: `bin1_id <= bin2_id` always holds for persisted pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ThinPixel<N> {
    pub bin1_id: u64,
    pub bin2_id: u64,
    pub count: N,
}

impl<N: Count> ThinPixel<N> {
    pub fn new(bin1_id: u64, bin2_id: u64, count: N) -> Self {
        Self {
            bin1_id,
            bin2_id,
            count,
        }
    }

    #[inline]
    pub fn coords(&self) -> (u64, u64) {
        (self.bin1_id, self.bin2_id)
    }

    /// Ordering over coordinates only; counts never participate.
    #[inline]
    pub fn cmp_coords(&self, other: &Self) -> std::cmp::Ordering {
        self.coords().cmp(&other.coords())
    }

    /// `bin1_id\tbin2_id\tcount`
    pub fn to_coo(&self) -> String {
        format!("{}\t{}\t{}", self.bin1_id, self.bin2_id, self.count)
    }

    /// Convert the count to another arithmetic type.
    pub fn cast<M: Count>(self) -> Result<ThinPixel<M>> {
        let count = if N::IS_FLOAT {
            M::from_f64(self.count.to_f64())?
        } else {
            // integer source: go through i32 when it fits, f64 otherwise
            match self.count.to_i32() {
                Ok(v) => M::from_i32(v)?,
                Err(_) => M::from_f64(self.count.to_f64())?,
            }
        };
        Ok(ThinPixel {
            bin1_id: self.bin1_id,
            bin2_id: self.bin2_id,
            count,
        })
    }
}

/// A canonical (never swapped) pair of bins.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct PixelCoordinates {
    pub bin1: Bin,
    pub bin2: Bin,
}

impl PixelCoordinates {
    pub fn new(bin1: Bin, bin2: Bin) -> Self {
        Self { bin1, bin2 }
    }
}

/// A matrix entry with materialized bin coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct Pixel<N> {
    pub coords: PixelCoordinates,
    pub count: N,
}

impl<N: Count> Pixel<N> {
    pub fn new(bin1: Bin, bin2: Bin, count: N) -> Self {
        Self {
            coords: PixelCoordinates::new(bin1, bin2),
            count,
        }
    }

    /// Look both bin ids up in `bins`.
    pub fn from_thin(p: ThinPixel<N>, bins: &BinTable) -> Result<Self> {
        Ok(Self::new(
            bins.bin_at(p.bin1_id)?,
            bins.bin_at(p.bin2_id)?,
            p.count,
        ))
    }

    pub fn to_thin(&self) -> ThinPixel<N> {
        ThinPixel::new(self.coords.bin1.id(), self.coords.bin2.id(), self.count)
    }

    /// `chrom1\tstart1\tend1\tchrom2\tstart2\tend2\tcount`
    pub fn to_bg2(&self) -> String {
        let b1 = &self.coords.bin1;
        let b2 = &self.coords.bin2;
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            b1.chrom().name(),
            b1.start(),
            b1.end(),
            b2.chrom().name(),
            b2.start(),
            b2.end(),
            self.count
        )
    }
}

impl<N: Count> PartialOrd for Pixel<N> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.coords.cmp(&other.coords))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::Reference;

    #[test]
    fn test_count_conversions() {
        assert_eq!(i32::from_f64(10.0).unwrap(), 10);
        // float-to-int truncates
        assert_eq!(i32::from_f64(10.7).unwrap(), 10);
        assert_eq!(u32::from_i32(5).unwrap(), 5);
        assert_eq!(f64::from_i32(-3).unwrap(), -3.0);

        assert!(matches!(
            u32::from_i32(-1),
            Err(HicdexError::PrecisionLoss(_))
        ));
        assert!(matches!(
            i32::from_f64(1e300),
            Err(HicdexError::PrecisionLoss(_))
        ));
        assert!(matches!(
            i64::from_f64(f64::NAN),
            Err(HicdexError::PrecisionLoss(_))
        ));
    }

    #[test]
    fn test_checked_add() {
        assert_eq!(1i32.checked_add(2), Some(3));
        assert_eq!(i32::MAX.checked_add(1), None);
        assert_eq!(Count::checked_add(1.5f64, 2.5), Some(4.0));
    }

    #[test]
    fn test_thin_pixel_ordering_and_cast() {
        let a = ThinPixel::new(0, 1, 10i32);
        let b = ThinPixel::new(0, 2, 1i32);
        let c = ThinPixel::new(1, 0, 1i32);
        assert_eq!(a.cmp_coords(&b), std::cmp::Ordering::Less);
        assert_eq!(b.cmp_coords(&c), std::cmp::Ordering::Less);

        let f: ThinPixel<f64> = a.cast().unwrap();
        assert_eq!(f.count, 10.0);
        let back: ThinPixel<i32> = f.cast().unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn test_text_formats() {
        let chroms = Reference::from_chrom_sizes([("chr1", 1000u32)]).unwrap();
        let bins = BinTable::new(chroms, 100).unwrap();

        let thin = ThinPixel::new(1u64, 3u64, 42i32);
        assert_eq!(thin.to_coo(), "1\t3\t42");

        let joined = Pixel::from_thin(thin, &bins).unwrap();
        assert_eq!(joined.to_bg2(), "chr1\t100\t200\tchr1\t300\t400\t42");
        assert_eq!(joined.to_thin(), thin);
    }
}
