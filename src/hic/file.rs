// hic/file.rs

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memmap2::Mmap;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::debug;

use super::block::{self, BlockRecord};
use super::footer::{self, Footer, FooterKey, MasterIndex};
use super::header::Header;
use super::selector::{AllSelector, Selector};
use super::{MatrixType, Unit, DEFAULT_BLOCK_CACHE_BYTES, NORM_NONE};
use crate::balancing::{WeightKind, Weights};
use crate::bin_table::BinTable;
use crate::cache::LruCache;
use crate::error::{HicdexError, Result};
use crate::genomic_interval::GenomicInterval;
use crate::pixel::ThinPixel;
use crate::reference::Reference;

type BlockKey = (u32, u32, u32, i32); // chrom1 fid, chrom2 fid, resolution, block id
type NormKey = (String, u32, u32); // normalization, chrom fid, resolution

const FOOTER_CACHE_BYTES: usize = 32 * 1024 * 1024;
const NORM_CACHE_BYTES: usize = 64 * 1024 * 1024;

/// A read-only .hic file. Cloning shares the mapping and every cache,
/// so concurrent selectors over one file reuse loaded metadata.
#[derive(Clone, Debug)]
pub struct File {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    path: PathBuf,
    mmap: Mmap,
    header: Header,
    reference: Arc<Reference>,
    master: MasterIndex,
    bin_tables: Mutex<FxHashMap<u32, Arc<BinTable>>>,
    footer_cache: Mutex<LruCache<FooterKey, Arc<Footer>>>,
    block_cache: Mutex<LruCache<BlockKey, Arc<Vec<ThinPixel<f64>>>>>,
    norm_cache: Mutex<LruCache<NormKey, Arc<Vec<f64>>>>,
}

impl File {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_cache(path, DEFAULT_BLOCK_CACHE_BYTES)
    }

    pub fn open_with_cache(path: impl AsRef<Path>, block_cache_bytes: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(HicdexError::NotFound(format!("file {}", path.display())));
        }
        let file = std::fs::File::open(&path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        let mut cursor = Cursor::new(&mmap[..]);
        let header = Header::read(&mut cursor)?;
        let master = MasterIndex::read(&mut cursor, header.master_index_offset, header.version)?;
        let reference = Arc::new(header.reference()?);

        debug!(
            "opened {} (version {}, {} chromosomes, {} resolutions)",
            path.display(),
            header.version,
            reference.len(),
            header.resolutions.len()
        );
        Ok(Self {
            inner: Arc::new(Inner {
                path,
                mmap,
                header,
                reference,
                master,
                bin_tables: Mutex::new(FxHashMap::default()),
                footer_cache: Mutex::new(LruCache::new(FOOTER_CACHE_BYTES)),
                block_cache: Mutex::new(LruCache::new(block_cache_bytes)),
                norm_cache: Mutex::new(LruCache::new(NORM_CACHE_BYTES)),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn version(&self) -> i32 {
        self.inner.header.version
    }

    pub fn genome_id(&self) -> &str {
        &self.inner.header.genome_id
    }

    /// Chromosomes usable in queries ("All" excluded).
    pub fn reference(&self) -> &Reference {
        &self.inner.reference
    }

    pub(super) fn header(&self) -> &Header {
        &self.inner.header
    }

    /// BP resolutions, ascending.
    pub fn resolutions(&self) -> Vec<u32> {
        let mut res = self.inner.header.resolutions.clone();
        res.sort_unstable();
        res
    }

    pub fn has_resolution(&self, resolution: u32) -> bool {
        self.inner.header.resolutions.contains(&resolution)
    }

    /// Normalization names present in the file.
    pub fn normalizations(&self) -> Vec<String> {
        self.inner.master.normalizations()
    }

    /// The bin table of one resolution, shared across selectors.
    pub fn bins(&self, resolution: u32) -> Result<Arc<BinTable>> {
        if !self.has_resolution(resolution) {
            return Err(HicdexError::NotFound(format!(
                "resolution {resolution} (available: {:?})",
                self.resolutions()
            )));
        }
        let mut tables = self.inner.bin_tables.lock();
        if let Some(bins) = tables.get(&resolution) {
            return Ok(Arc::clone(bins));
        }
        let bins = Arc::new(BinTable::from_shared(
            Arc::clone(&self.inner.reference),
            resolution,
        )?);
        tables.insert(resolution, Arc::clone(&bins));
        Ok(bins)
    }

    /// The genome-wide raw expected-value vector for one resolution,
    /// when the file carries it.
    pub fn expected_values(&self, resolution: u32) -> Option<Vec<f64>> {
        self.inner
            .master
            .expected_values()
            .iter()
            .find(|v| v.normalization.is_none() && v.unit == Unit::Bp && v.bin_size == resolution)
            .map(|v| v.values.clone())
    }

    // --- fetch family ---

    /// Genome-wide selector: every chromosome pair in (chrom1_id,
    /// chrom2_id) order.
    pub fn fetch(&self, resolution: u32) -> Result<AllSelector> {
        let bins = self.bins(resolution)?;
        let mut selectors = Vec::new();
        for c1 in self.inner.reference.iter() {
            for c2 in self.inner.reference.iter() {
                if c1.id() > c2.id() {
                    continue;
                }
                let gi1 = GenomicInterval::whole_chrom(c1.clone());
                let gi2 = GenomicInterval::whole_chrom(c2.clone());
                selectors.push(Selector::new(
                    self.clone(),
                    Arc::clone(&bins),
                    gi1,
                    gi2,
                    None,
                )?);
            }
        }
        Ok(AllSelector::new(selectors, Arc::clone(&bins)))
    }

    /// Cis selector over one UCSC query.
    pub fn fetch_query(&self, resolution: u32, query: &str) -> Result<Selector> {
        let gi = GenomicInterval::parse_ucsc(self.reference(), query)?;
        Selector::new(self.clone(), self.bins(resolution)?, gi.clone(), gi, None)
    }

    /// Arbitrary rectangle from two UCSC queries.
    pub fn fetch2(&self, resolution: u32, range1: &str, range2: &str) -> Result<Selector> {
        let gi1 = GenomicInterval::parse_ucsc(self.reference(), range1)?;
        let gi2 = GenomicInterval::parse_ucsc(self.reference(), range2)?;
        Selector::new(self.clone(), self.bins(resolution)?, gi1, gi2, None)
    }

    /// Rectangle with a normalization applied ("NONE" means raw).
    pub fn fetch_normalized(
        &self,
        resolution: u32,
        range1: &str,
        range2: &str,
        normalization: &str,
    ) -> Result<Selector> {
        let gi1 = GenomicInterval::parse_ucsc(self.reference(), range1)?;
        let gi2 = GenomicInterval::parse_ucsc(self.reference(), range2)?;
        let norm = (normalization != NORM_NONE).then(|| normalization.to_string());
        Selector::new(self.clone(), self.bins(resolution)?, gi1, gi2, norm)
    }

    /// A genome-wide divisive [`Weights`] assembled from the per
    /// -chromosome normalization vectors of one resolution.
    pub fn weights(&self, normalization: &str, resolution: u32) -> Result<Arc<Weights>> {
        let bins = self.bins(resolution)?;
        let mut values = Vec::with_capacity(bins.size() as usize);
        for chrom in self.inner.reference.iter() {
            let fid = self.inner.header.file_id(chrom.name())?;
            let vector = self.norm_vector(normalization, fid, resolution)?;
            let nbins = bins.num_bins(chrom) as usize;
            for i in 0..nbins {
                values.push(vector.get(i).copied().unwrap_or(f64::NAN));
            }
        }
        Ok(Arc::new(Weights::new(values, WeightKind::Divisive)))
    }

    // --- internal lookups shared by the selectors ---

    fn cursor(&self) -> Cursor<&[u8]> {
        Cursor::new(&self.inner.mmap[..])
    }

    /// Load (or reuse) the footer of one chromosome pair. `Ok(None)`
    /// means the file simply has no matrix for the pair.
    pub(super) fn footer(
        &self,
        chrom1_fid: u32,
        chrom2_fid: u32,
        resolution: u32,
        normalization: &str,
    ) -> Result<Option<Arc<Footer>>> {
        let key = FooterKey {
            chrom1_id: chrom1_fid,
            chrom2_id: chrom2_fid,
            matrix_type: MatrixType::Observed,
            unit: Unit::Bp,
            resolution,
            normalization: normalization.to_string(),
        };
        if let Some(footer) = self.inner.footer_cache.lock().get(&key) {
            return Ok(Some(footer));
        }

        let Some((position, _size)) = self.inner.master.matrix_position(chrom1_fid, chrom2_fid)
        else {
            return Ok(None);
        };
        let footer = Arc::new(Footer::read(
            &mut self.cursor(),
            position,
            Unit::Bp,
            resolution,
        )?);

        let weight = footer.blocks.len() * 24 + 64;
        self.inner
            .footer_cache
            .lock()
            .insert(key, Arc::clone(&footer), weight);
        Ok(Some(footer))
    }

    /// Decode (or reuse) one block as absolute-bin-id, sorted pixels.
    pub(super) fn block_pixels(
        &self,
        footer: &Footer,
        block_id: i32,
        bins: &BinTable,
    ) -> Result<Arc<Vec<ThinPixel<f64>>>> {
        let key = (
            footer.chrom1_id,
            footer.chrom2_id,
            footer.resolution,
            block_id,
        );
        if let Some(pixels) = self.inner.block_cache.lock().get(&key) {
            return Ok(pixels);
        }

        let Some(entry) = footer.blocks.get(&block_id) else {
            return Ok(Arc::new(Vec::new()));
        };
        let start = entry.position as usize;
        let end = start + entry.size.max(0) as usize;
        if end > self.inner.mmap.len() {
            return Err(HicdexError::FormatError(format!(
                "block {block_id} points past the end of the file"
            )));
        }
        let records = block::decode_block(&self.inner.mmap[start..end], self.version())?;
        let pixels = Arc::new(self.to_absolute(footer, &records, bins)?);

        let weight = pixels.len() * std::mem::size_of::<ThinPixel<f64>>() + 64;
        self.inner
            .block_cache
            .lock()
            .insert(key, Arc::clone(&pixels), weight);
        Ok(pixels)
    }

    fn to_absolute(
        &self,
        footer: &Footer,
        records: &[BlockRecord],
        bins: &BinTable,
    ) -> Result<Vec<ThinPixel<f64>>> {
        let name1 = self.inner.header.chromosome(footer.chrom1_id)?.name().to_string();
        let name2 = self.inner.header.chromosome(footer.chrom2_id)?.name().to_string();
        let ref1 = self.inner.reference.get_id(&name1)?;
        let ref2 = self.inner.reference.get_id(&name2)?;
        let offset1 = bins.chrom_bin_offset(ref1)?;
        let offset2 = bins.chrom_bin_offset(ref2)?;
        let intra = footer.chrom1_id == footer.chrom2_id;

        let mut pixels = Vec::with_capacity(records.len());
        for r in records {
            let (b1, b2) = if intra {
                let x = offset1 + r.x.max(0) as u64;
                let y = offset1 + r.y.max(0) as u64;
                (x.min(y), x.max(y))
            } else {
                (offset1 + r.x.max(0) as u64, offset2 + r.y.max(0) as u64)
            };
            pixels.push(ThinPixel::new(b1, b2, f64::from(r.count)));
        }
        pixels.sort_by(ThinPixel::cmp_coords);
        Ok(pixels)
    }

    /// Load (or reuse) one per-chromosome normalization vector.
    pub(super) fn norm_vector(
        &self,
        normalization: &str,
        chrom_fid: u32,
        resolution: u32,
    ) -> Result<Arc<Vec<f64>>> {
        let key = (normalization.to_string(), chrom_fid, resolution);
        if let Some(vector) = self.inner.norm_cache.lock().get(&key) {
            return Ok(vector);
        }

        let entry = self
            .inner
            .master
            .norm_vector_entry(normalization, chrom_fid, Unit::Bp, resolution)
            .ok_or_else(|| {
                HicdexError::NotFound(format!(
                    "normalization vector {normalization} for chromosome id {chrom_fid} \
                     at resolution {resolution}"
                ))
            })?
            .clone();
        let vector = Arc::new(footer::read_norm_vector(
            &mut self.cursor(),
            &entry,
            self.version(),
        )?);

        let weight = vector.len() * 8 + 64;
        self.inner
            .norm_cache
            .lock()
            .insert(key, Arc::clone(&vector), weight);
        Ok(vector)
    }
}
