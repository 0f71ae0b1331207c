// hic/footer.rs

use std::collections::BTreeMap;
use std::io::{Read, Seek, SeekFrom};

use rustc_hash::FxHashMap;

use super::block::BlockIndexEntry;
use super::{MatrixType, Unit};
use crate::binary_buffer::ReadLeExt;
use crate::error::{HicdexError, Result};

/// One expected-value vector from the footer section.
#[derive(Clone, Debug)]
pub struct ExpectedValueVector {
    /// `None` for raw expected values, the normalization name otherwise.
    pub normalization: Option<String>,
    pub unit: Unit,
    pub bin_size: u32,
    pub values: Vec<f64>,
    pub scale_factors: Vec<(u32, f64)>,
}

/// Location of one normalization vector in the file body.
#[derive(Clone, Debug)]
pub struct NormVectorEntry {
    pub normalization: String,
    pub chrom_id: u32,
    pub unit: Unit,
    pub bin_size: u32,
    pub position: i64,
    pub n_bytes: i64,
}

/// The master index: chromosome-pair matrix locations plus the expected
/// and normalization vector directories.
#[derive(Clone, Debug, Default)]
pub struct MasterIndex {
    entries: FxHashMap<(u32, u32), (i64, i32)>,
    expected_values: Vec<ExpectedValueVector>,
    norm_vectors: Vec<NormVectorEntry>,
}

impl MasterIndex {
    pub fn read(reader: &mut (impl Read + Seek), offset: i64, version: i32) -> Result<Self> {
        reader.seek(SeekFrom::Start(offset as u64))?;
        // total footer size, unused when reading
        if version > 8 {
            let _ = reader.read_i64_le()?;
        } else {
            let _ = reader.read_i32_le()?;
        }

        let n_entries = reader.read_i32_le()?;
        let mut entries = FxHashMap::default();
        for _ in 0..n_entries {
            let key = reader.read_cstring_le()?;
            let position = reader.read_i64_le()?;
            let size = reader.read_i32_le()?;
            let (c1, c2) = parse_pair_key(&key)?;
            entries.insert((c1, c2), (position, size));
        }

        let mut expected_values = Vec::new();
        let n_expected = reader.read_i32_le()?;
        for _ in 0..n_expected {
            expected_values.push(read_expected_values(reader, version, None)?);
        }
        let n_norm_expected = reader.read_i32_le()?;
        for _ in 0..n_norm_expected {
            let normalization = reader.read_cstring_le()?;
            expected_values.push(read_expected_values(reader, version, Some(normalization))?);
        }

        let mut norm_vectors = Vec::new();
        let n_norm = reader.read_i32_le()?;
        for _ in 0..n_norm {
            let normalization = reader.read_cstring_le()?;
            let chrom_id = reader.read_i32_le()? as u32;
            let unit = Unit::parse(&reader.read_cstring_le()?)?;
            let bin_size = reader.read_i32_le()? as u32;
            let position = reader.read_i64_le()?;
            let n_bytes = if version > 8 {
                reader.read_i64_le()?
            } else {
                i64::from(reader.read_i32_le()?)
            };
            norm_vectors.push(NormVectorEntry {
                normalization,
                chrom_id,
                unit,
                bin_size,
                position,
                n_bytes,
            });
        }

        Ok(Self {
            entries,
            expected_values,
            norm_vectors,
        })
    }

    /// Position and size of the matrix record for a chromosome pair
    /// (file ids, lower id first).
    pub fn matrix_position(&self, chrom1_id: u32, chrom2_id: u32) -> Option<(i64, i32)> {
        let key = if chrom1_id <= chrom2_id {
            (chrom1_id, chrom2_id)
        } else {
            (chrom2_id, chrom1_id)
        };
        self.entries.get(&key).copied()
    }

    pub fn expected_values(&self) -> &[ExpectedValueVector] {
        &self.expected_values
    }

    pub fn norm_vector_entry(
        &self,
        normalization: &str,
        chrom_id: u32,
        unit: Unit,
        bin_size: u32,
    ) -> Option<&NormVectorEntry> {
        self.norm_vectors.iter().find(|e| {
            e.normalization == normalization
                && e.chrom_id == chrom_id
                && e.unit == unit
                && e.bin_size == bin_size
        })
    }

    /// Distinct normalization names present in the file.
    pub fn normalizations(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .norm_vectors
            .iter()
            .map(|e| e.normalization.clone())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

fn parse_pair_key(key: &str) -> Result<(u32, u32)> {
    let (a, b) = key
        .split_once('_')
        .ok_or_else(|| HicdexError::FormatError(format!("malformed master-index key \"{key}\"")))?;
    let c1 = a
        .parse()
        .map_err(|_| HicdexError::FormatError(format!("malformed master-index key \"{key}\"")))?;
    let c2 = b
        .parse()
        .map_err(|_| HicdexError::FormatError(format!("malformed master-index key \"{key}\"")))?;
    Ok((c1, c2))
}

fn read_expected_values(
    reader: &mut impl Read,
    version: i32,
    normalization: Option<String>,
) -> Result<ExpectedValueVector> {
    let unit = Unit::parse(&reader.read_cstring_le()?)?;
    let bin_size = reader.read_i32_le()? as u32;
    let n_values = if version > 8 {
        reader.read_i64_le()?
    } else {
        i64::from(reader.read_i32_le()?)
    };
    let mut values = Vec::with_capacity(n_values.max(0) as usize);
    for _ in 0..n_values {
        let v = if version > 8 {
            f64::from(reader.read_f32_le()?)
        } else {
            reader.read_f64_le()?
        };
        values.push(v);
    }
    let n_factors = reader.read_i32_le()?;
    let mut scale_factors = Vec::with_capacity(n_factors.max(0) as usize);
    for _ in 0..n_factors {
        let chrom_id = reader.read_i32_le()? as u32;
        let factor = if version > 8 {
            f64::from(reader.read_f32_le()?)
        } else {
            reader.read_f64_le()?
        };
        scale_factors.push((chrom_id, factor));
    }
    Ok(ExpectedValueVector {
        normalization,
        unit,
        bin_size,
        values,
        scale_factors,
    })
}

/// Read one normalization vector from the file body.
pub fn read_norm_vector(
    reader: &mut (impl Read + Seek),
    entry: &NormVectorEntry,
    version: i32,
) -> Result<Vec<f64>> {
    reader.seek(SeekFrom::Start(entry.position as u64))?;
    let n_values = if version > 8 {
        reader.read_i64_le()?
    } else {
        i64::from(reader.read_i32_le()?)
    };
    let mut values = Vec::with_capacity(n_values.max(0) as usize);
    for _ in 0..n_values {
        let v = if version > 8 {
            f64::from(reader.read_f32_le()?)
        } else {
            reader.read_f64_le()?
        };
        values.push(v);
    }
    Ok(values)
}

/// Key of one loaded footer. Selectors over the same region share the
/// cached entry by value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FooterKey {
    pub chrom1_id: u32,
    pub chrom2_id: u32,
    pub matrix_type: MatrixType,
    pub unit: Unit,
    pub resolution: u32,
    pub normalization: String,
}

/// Per-(chrom-pair, unit, resolution) metadata: matrix statistics plus
/// the block directory.
#[derive(Clone, Debug)]
pub struct Footer {
    pub chrom1_id: u32,
    pub chrom2_id: u32,
    pub unit: Unit,
    pub resolution: u32,
    pub sum_counts: f64,
    pub block_bin_count: i32,
    pub block_column_count: i32,
    pub blocks: BTreeMap<i32, BlockIndexEntry>,
}

impl Footer {
    /// Parse the matrix record at `position`, keeping the zoom matching
    /// `(unit, resolution)`.
    pub fn read(
        reader: &mut (impl Read + Seek),
        position: i64,
        unit: Unit,
        resolution: u32,
    ) -> Result<Self> {
        reader.seek(SeekFrom::Start(position as u64))?;
        let chrom1_id = reader.read_i32_le()? as u32;
        let chrom2_id = reader.read_i32_le()? as u32;
        let n_resolutions = reader.read_i32_le()?;

        for _ in 0..n_resolutions {
            let zoom_unit = Unit::parse(&reader.read_cstring_le()?)?;
            let _zoom_index = reader.read_i32_le()?;
            let sum_counts = f64::from(reader.read_f32_le()?);
            let _occupied = reader.read_f32_le()?;
            let _stddev = reader.read_f32_le()?;
            let _p95 = reader.read_f32_le()?;
            let bin_size = reader.read_i32_le()? as u32;
            let block_bin_count = reader.read_i32_le()?;
            let block_column_count = reader.read_i32_le()?;
            let n_blocks = reader.read_i32_le()?;

            if zoom_unit == unit && bin_size == resolution {
                let mut blocks = BTreeMap::new();
                for _ in 0..n_blocks {
                    let block_number = reader.read_i32_le()?;
                    let position = reader.read_i64_le()?;
                    let size = reader.read_i32_le()?;
                    blocks.insert(block_number, BlockIndexEntry { position, size });
                }
                return Ok(Self {
                    chrom1_id,
                    chrom2_id,
                    unit,
                    resolution,
                    sum_counts,
                    block_bin_count,
                    block_column_count,
                    blocks,
                });
            }
            // skip this zoom's block index
            reader.seek(SeekFrom::Current(i64::from(n_blocks) * (4 + 8 + 4)))?;
        }

        Err(HicdexError::NotFound(format!(
            "matrix at {unit}/{resolution} for chromosome pair ({chrom1_id}, {chrom2_id})"
        )))
    }
}
