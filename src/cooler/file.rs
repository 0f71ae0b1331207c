// cooler/file.rs

use std::path::Path;
use std::sync::Arc;

use hdf5::types::VarLenUnicode;
use parking_lot::Mutex;
use tracing::{debug, info};

use super::attributes::{self, Attributes, SumValue};
use super::selector::Selector;
use super::uri::CoolerUri;
use super::{CacheSizes, Dataset};
use crate::balancing::{WeightKind, WeightMap, Weights};
use crate::bin_table::BinTable;
use crate::error::{HicdexError, Result};
use crate::genomic_interval::GenomicInterval;
use crate::index::{CsrIndex, IndexBuilder};
use crate::pixel::{Count, ThinPixel};
use crate::reference::Reference;

/// Storage flavor of the `pixels/count` column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountKind {
    Int,
    Float,
}

/// Options accepted by [`File::create`].
#[derive(Clone, Debug, Default)]
pub struct FileOptions {
    pub overwrite: bool,
    pub assembly: Option<String>,
    pub metadata: Option<String>,
    pub cache_sizes: CacheSizes,
}

#[derive(Clone, Debug)]
pub(super) enum CountDataset {
    Int(Dataset<i32>),
    Float(Dataset<f64>),
}

#[derive(Clone, Debug)]
pub(super) struct PixelDatasets {
    pub bin1: Dataset<u64>,
    pub bin2: Dataset<u64>,
    pub count: CountDataset,
}

#[derive(Debug)]
struct WriteState {
    builder: IndexBuilder,
    last_pixel: Option<(u64, u64)>,
    sum: f64,
    cis: f64,
    nnz: u64,
}

#[derive(Debug)]
enum Mode {
    Read,
    Write(WriteState),
}

/// A single-resolution cooler group: either the root of a `.cool` file
/// or one `/resolutions/<N>` (or `/cells/<name>`) group.
#[derive(Debug)]
pub struct File {
    h5: hdf5::File,
    root: hdf5::Group,
    uri: CoolerUri,
    bins: Arc<BinTable>,
    index: Arc<CsrIndex>,
    attrs: Attributes,
    count_kind: CountKind,
    pixels: PixelDatasets,
    weights: Mutex<WeightMap>,
    cache_sizes: CacheSizes,
    writable: bool,
    mode: Mode,
}

impl File {
    /// Open a cooler URI read-only.
    pub fn open(uri: &str) -> Result<Self> {
        Self::open_with(uri, CacheSizes::default())
    }

    pub fn open_with(uri: &str, cache_sizes: CacheSizes) -> Result<Self> {
        Self::open_impl(CoolerUri::parse(uri)?, cache_sizes, false)
    }

    /// Open read-write. Appending pixels is still forbidden (the append
    /// protocol only covers freshly created files); this mode exists for
    /// weight writes.
    pub fn open_rw(uri: &str) -> Result<Self> {
        Self::open_impl(CoolerUri::parse(uri)?, CacheSizes::default(), true)
    }

    fn open_impl(uri: CoolerUri, cache_sizes: CacheSizes, writable: bool) -> Result<Self> {
        if !uri.path.exists() {
            return Err(HicdexError::NotFound(format!(
                "file {}",
                uri.path.display()
            )));
        }
        let h5 = if writable {
            hdf5::File::open_rw(&uri.path)?
        } else {
            hdf5::File::open(&uri.path)?
        };
        let root = resolve_group(&h5, &uri.group)?;
        let attrs = Attributes::read(&root)?;
        validate_layout(&root)?;

        let chroms = read_reference(&root, cache_sizes)?;
        let bins = Arc::new(BinTable::new(chroms, attrs.bin_size)?);
        if bins.size() != attrs.nbins {
            return Err(HicdexError::FormatError(format!(
                "bin table has {} bins but the nbins attribute says {}",
                bins.size(),
                attrs.nbins
            )));
        }
        if bins.reference().len() as u32 != attrs.nchroms {
            return Err(HicdexError::FormatError(format!(
                "chroms table has {} entries but the nchroms attribute says {}",
                bins.reference().len(),
                attrs.nchroms
            )));
        }

        let indexes = root.group("indexes")?;
        let bin1_offset =
            Dataset::<u64>::open(&indexes, "bin1_offset", cache_sizes.generic_bytes)?.read_all()?;
        let chrom_offset =
            Dataset::<u64>::open(&indexes, "chrom_offset", cache_sizes.generic_bytes)?.read_all()?;
        let index = CsrIndex::new(bin1_offset, chrom_offset)?;
        if index.nnz() != attrs.nnz {
            return Err(HicdexError::IndexCorrupt(format!(
                "bin1_offset ends at {} but the nnz attribute says {}",
                index.nnz(),
                attrs.nnz
            )));
        }

        let pixels = open_pixel_datasets(&root, cache_sizes)?;
        let count_kind = match pixels.count {
            CountDataset::Int(_) => CountKind::Int,
            CountDataset::Float(_) => CountKind::Float,
        };

        debug!(
            "opened cooler {uri} ({} bins, {} pixels)",
            bins.size(),
            index.nnz()
        );
        Ok(Self {
            h5,
            root,
            uri,
            bins,
            index: Arc::new(index),
            attrs,
            count_kind,
            pixels,
            weights: Mutex::new(WeightMap::default()),
            cache_sizes,
            writable,
            mode: Mode::Read,
        })
    }

    /// Create a new cooler file. Fails with `AlreadyExists` when the
    /// target path is taken and `overwrite` was not requested.
    pub fn create<N: Count>(uri: &str, bins: BinTable, options: FileOptions) -> Result<Self> {
        let uri = CoolerUri::parse(uri)?;
        if uri.path.exists() && !options.overwrite {
            return Err(HicdexError::AlreadyExists(uri.path.display().to_string()));
        }
        let h5 = hdf5::File::create(&uri.path)?;
        Self::create_impl::<N>(h5, uri, bins, options)
    }

    /// Create a cooler group inside an already-open container (used for
    /// `.mcool` resolutions and `.scool` cells).
    pub fn create_in_container<N: Count>(
        h5: hdf5::File,
        path: &Path,
        group: &str,
        bins: BinTable,
        options: FileOptions,
    ) -> Result<Self> {
        let uri = CoolerUri::from_path(path).with_group(group);
        Self::create_impl::<N>(h5, uri, bins, options)
    }

    fn create_impl<N: Count>(
        h5: hdf5::File,
        uri: CoolerUri,
        bins: BinTable,
        options: FileOptions,
    ) -> Result<Self> {
        let root = if uri.is_root() {
            h5.group("/")?
        } else {
            create_group_path(&h5, &uri.group)?
        };
        let cache_sizes = options.cache_sizes;
        let bins = Arc::new(bins);

        write_reference(&root, bins.reference(), cache_sizes)?;
        write_bin_table(&root, &bins, cache_sizes)?;

        let pixels_group = root.create_group("pixels")?;
        let bin1 = Dataset::<u64>::create(&pixels_group, "bin1_id", cache_sizes.pixel_bytes)?;
        let bin2 = Dataset::<u64>::create(&pixels_group, "bin2_id", cache_sizes.pixel_bytes)?;
        let count = if N::IS_FLOAT {
            CountDataset::Float(Dataset::<f64>::create(
                &pixels_group,
                "count",
                cache_sizes.pixel_bytes,
            )?)
        } else {
            CountDataset::Int(Dataset::<i32>::create(
                &pixels_group,
                "count",
                cache_sizes.pixel_bytes,
            )?)
        };

        let indexes_group = root.create_group("indexes")?;
        Dataset::<u64>::create(&indexes_group, "bin1_offset", cache_sizes.generic_bytes)?;
        Dataset::<u64>::create(&indexes_group, "chrom_offset", cache_sizes.generic_bytes)?;

        let mut attrs = Attributes::new(
            bins.bin_size(),
            bins.size(),
            bins.reference().len() as u32,
        );
        attrs.assembly = options.assembly;
        attrs.metadata = options.metadata;
        if N::IS_FLOAT {
            attrs.sum = Some(SumValue::Float(0.0));
            attrs.cis = Some(SumValue::Float(0.0));
        }
        attrs.write(&root)?;

        let builder = IndexBuilder::new(&bins);
        info!("created cooler {uri}");
        Ok(Self {
            h5,
            root,
            uri,
            index: Arc::new(builder.finalize()?),
            bins: Arc::clone(&bins),
            attrs,
            count_kind: if N::IS_FLOAT {
                CountKind::Float
            } else {
                CountKind::Int
            },
            pixels: PixelDatasets { bin1, bin2, count },
            weights: Mutex::new(WeightMap::default()),
            cache_sizes,
            writable: true,
            mode: Mode::Write(WriteState {
                builder,
                last_pixel: None,
                sum: 0.0,
                cis: 0.0,
                nnz: 0,
            }),
        })
    }

    pub fn uri(&self) -> &CoolerUri {
        &self.uri
    }

    pub fn path(&self) -> &Path {
        &self.uri.path
    }

    pub fn bin_size(&self) -> u32 {
        self.attrs.bin_size
    }

    pub fn bins(&self) -> Arc<BinTable> {
        Arc::clone(&self.bins)
    }

    pub fn reference(&self) -> &Reference {
        self.bins.reference()
    }

    pub fn index(&self) -> Arc<CsrIndex> {
        Arc::clone(&self.index)
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attrs
    }

    pub fn count_kind(&self) -> CountKind {
        self.count_kind
    }

    pub fn nnz(&self) -> u64 {
        match &self.mode {
            Mode::Read => self.attrs.nnz,
            Mode::Write(state) => state.nnz,
        }
    }

    // --- append protocol ---

    /// Append a batch of pre-sorted pixels. The whole batch is validated
    /// up front and rejected in full on the first offending pixel.
    pub fn append_pixels<N, I>(&mut self, pixels: I, validate: bool) -> Result<()>
    where
        N: Count,
        I: IntoIterator<Item = ThinPixel<N>>,
    {
        let batch: Vec<ThinPixel<N>> = pixels.into_iter().collect();
        if batch.is_empty() {
            return Ok(());
        }

        let nbins = self.bins.size();
        let Mode::Write(state) = &mut self.mode else {
            return Err(HicdexError::StringError(
                "appending pixels requires a file created by this process; \
                 reopening an existing cooler for appending is not supported"
                    .into(),
            ));
        };

        if validate {
            let mut last = state.last_pixel;
            for p in &batch {
                if p.count.is_zero() {
                    return Err(HicdexError::InvalidPixel(format!(
                        "({}, {}) has a zero count",
                        p.bin1_id, p.bin2_id
                    )));
                }
                if p.bin1_id >= nbins || p.bin2_id >= nbins {
                    return Err(HicdexError::InvalidPixel(format!(
                        "({}, {}) falls outside the bin table ({nbins} bins)",
                        p.bin1_id, p.bin2_id
                    )));
                }
                if p.bin1_id > p.bin2_id {
                    return Err(HicdexError::InvalidPixel(format!(
                        "({}, {}) is below the diagonal (storage is symmetric-upper)",
                        p.bin1_id, p.bin2_id
                    )));
                }
                if let Some(last) = last {
                    if p.coords() <= last {
                        return Err(HicdexError::InvalidPixel(format!(
                            "({}, {}) does not follow ({}, {}): pixels must be \
                             sorted and unique",
                            p.bin1_id, p.bin2_id, last.0, last.1
                        )));
                    }
                }
                last = Some(p.coords());
            }
        }

        // Convert counts before touching the file so a lossy batch is
        // rejected without a partial write.
        let bin1: Vec<u64> = batch.iter().map(|p| p.bin1_id).collect();
        let bin2: Vec<u64> = batch.iter().map(|p| p.bin2_id).collect();
        enum Converted {
            Int(Vec<i32>),
            Float(Vec<f64>),
        }
        let counts = match self.count_kind {
            CountKind::Int => Converted::Int(
                batch
                    .iter()
                    .map(|p| p.count.to_i32())
                    .collect::<Result<_>>()?,
            ),
            CountKind::Float => {
                Converted::Float(batch.iter().map(|p| p.count.to_f64()).collect())
            }
        };

        self.pixels.bin1.append(&bin1)?;
        self.pixels.bin2.append(&bin2)?;
        match (&self.pixels.count, counts) {
            (CountDataset::Int(ds), Converted::Int(v)) => ds.append(&v)?,
            (CountDataset::Float(ds), Converted::Float(v)) => ds.append(&v)?,
            _ => unreachable!("count dataset flavor matches count_kind"),
        }

        for p in &batch {
            state.builder.record(p.bin1_id, 1)?;
            let c = p.count.to_f64();
            state.sum += c;
            if self.bins.chrom_id(p.bin1_id)? == self.bins.chrom_id(p.bin2_id)? {
                state.cis += c;
            }
        }
        state.nnz += batch.len() as u64;
        state.last_pixel = Some(batch.last().unwrap().coords());
        Ok(())
    }

    /// Write the index datasets and final attributes. Idempotent; called
    /// automatically when a writable file is dropped.
    pub fn finalize(&mut self) -> Result<()> {
        let Mode::Write(state) = &self.mode else {
            return Ok(());
        };

        let index = state.builder.finalize()?;
        let indexes = self.root.group("indexes")?;
        let bin1_offset =
            Dataset::<u64>::open(&indexes, "bin1_offset", self.cache_sizes.generic_bytes)?;
        bin1_offset.resize(0)?;
        bin1_offset.append(index.bin1_offset())?;
        let chrom_offset =
            Dataset::<u64>::open(&indexes, "chrom_offset", self.cache_sizes.generic_bytes)?;
        chrom_offset.resize(0)?;
        chrom_offset.append(index.chrom_offset())?;

        self.attrs.nnz = state.nnz;
        match self.count_kind {
            CountKind::Int => {
                self.attrs.sum = Some(SumValue::Int(state.sum as i64));
                self.attrs.cis = Some(SumValue::Int(state.cis as i64));
            }
            CountKind::Float => {
                self.attrs.sum = Some(SumValue::Float(state.sum));
                self.attrs.cis = Some(SumValue::Float(state.cis));
            }
        }
        self.attrs.write(&self.root)?;
        self.h5.flush()?;

        info!(
            "finalized cooler {} ({} pixels, sum {})",
            self.uri, state.nnz, state.sum
        );
        self.index = Arc::new(index);
        self.mode = Mode::Read;
        Ok(())
    }

    pub fn close(mut self) -> Result<()> {
        self.finalize()
    }

    // --- selectors ---

    /// Genome-wide selector.
    pub fn fetch(&self) -> Result<Selector> {
        self.ensure_readable()?;
        Ok(Selector::genome_wide(
            Arc::clone(&self.bins),
            Arc::clone(&self.index),
            self.pixels.clone(),
        ))
    }

    /// Cis selector over one UCSC query.
    pub fn fetch_query(&self, query: &str) -> Result<Selector> {
        let gi = GenomicInterval::parse_ucsc(self.reference(), query)?;
        self.fetch_intervals(gi.clone(), gi, None)
    }

    /// Arbitrary rectangle from two UCSC queries.
    pub fn fetch2(&self, range1: &str, range2: &str) -> Result<Selector> {
        let gi1 = GenomicInterval::parse_ucsc(self.reference(), range1)?;
        let gi2 = GenomicInterval::parse_ucsc(self.reference(), range2)?;
        self.fetch_intervals(gi1, gi2, None)
    }

    /// Rectangle with balancing weights applied.
    pub fn fetch_normalized(
        &self,
        range1: &str,
        range2: &str,
        normalization: &str,
    ) -> Result<Selector> {
        let gi1 = GenomicInterval::parse_ucsc(self.reference(), range1)?;
        let gi2 = GenomicInterval::parse_ucsc(self.reference(), range2)?;
        let weights = self.weights(normalization)?;
        self.fetch_intervals(gi1, gi2, Some(weights))
    }

    pub fn fetch_intervals(
        &self,
        coord1: GenomicInterval,
        coord2: GenomicInterval,
        weights: Option<Arc<Weights>>,
    ) -> Result<Selector> {
        self.ensure_readable()?;
        // canonical orientation: chrom1 id <= chrom2 id
        let (coord1, coord2) = if coord1.chrom().id() > coord2.chrom().id() {
            (coord2, coord1)
        } else {
            (coord1, coord2)
        };
        Selector::rectangle(
            Arc::clone(&self.bins),
            Arc::clone(&self.index),
            self.pixels.clone(),
            coord1,
            coord2,
            weights,
        )
    }

    fn ensure_readable(&self) -> Result<()> {
        match self.mode {
            Mode::Read => Ok(()),
            Mode::Write(_) => Err(HicdexError::StringError(
                "file is open for writing: call finalize() before querying".into(),
            )),
        }
    }

    // --- weights ---

    /// Names of the weight datasets stored under `/bins`.
    pub fn normalizations(&self) -> Result<Vec<String>> {
        let bins_group = self.root.group("bins")?;
        let mut names: Vec<String> = bins_group
            .member_names()?
            .into_iter()
            .filter(|n| !matches!(n.as_str(), "chrom" | "start" | "end"))
            .collect();
        names.sort();
        Ok(names)
    }

    pub fn has_weights(&self, name: &str) -> bool {
        self.root
            .group("bins")
            .map(|g| g.link_exists(name))
            .unwrap_or(false)
    }

    /// Load (and cache) the weight vector stored as `/bins/<name>`.
    pub fn weights(&self, name: &str) -> Result<Arc<Weights>> {
        if let Some(w) = self.weights.lock().get(name) {
            return Ok(Arc::clone(w));
        }

        let bins_group = self.root.group("bins")?;
        if !bins_group.link_exists(name) {
            return Err(HicdexError::NotFound(format!("weights \"{name}\"")));
        }
        let ds = Dataset::<f64>::open(&bins_group, name, self.cache_sizes.generic_bytes)?;
        let values = ds.read_all()?;
        let kind = match attributes::get_bool(ds.inner(), "divisive_weights")? {
            Some(true) => WeightKind::Divisive,
            Some(false) => WeightKind::Multiplicative,
            None => Weights::infer_kind(name)?,
        };
        let weights = Weights::new(values, kind);
        weights.check_shape(&self.bins)?;

        let weights = Arc::new(weights);
        self.weights
            .lock()
            .insert(name.to_string(), Arc::clone(&weights));
        Ok(weights)
    }

    /// Store a weight vector as `/bins/<name>`.
    pub fn write_weights(&self, name: &str, weights: &Weights, overwrite: bool) -> Result<()> {
        if !self.writable {
            return Err(HicdexError::StringError(format!(
                "cannot write weights \"{name}\": file is read-only"
            )));
        }
        weights.check_shape(&self.bins)?;

        let bins_group = self.root.group("bins")?;
        if bins_group.link_exists(name) {
            if !overwrite {
                return Err(HicdexError::AlreadyExists(format!("weights \"{name}\"")));
            }
            bins_group.unlink(name)?;
        }
        let ds = Dataset::<f64>::create(&bins_group, name, self.cache_sizes.generic_bytes)?;
        ds.append(weights.values())?;
        attributes::put_bool(ds.inner(), "divisive_weights", weights.kind() == WeightKind::Divisive)?;

        self.weights
            .lock()
            .insert(name.to_string(), Arc::new(weights.clone()));
        debug!("wrote weights \"{name}\" to {}", self.uri);
        Ok(())
    }

    /// Stream every pixel and verify it against the loaded index.
    pub fn validate_index(&self) -> Result<()> {
        let selector = self.fetch()?;
        self.index.validate_against(selector.iter::<f64>()?)
    }
}

impl Drop for File {
    fn drop(&mut self) {
        if matches!(self.mode, Mode::Write(_)) {
            if let Err(e) = self.finalize() {
                tracing::error!("failed to finalize cooler {}: {e}", self.uri);
            }
        }
    }
}

// --- layout helpers ---

fn resolve_group(h5: &hdf5::File, group: &str) -> Result<hdf5::Group> {
    if group.is_empty() {
        return Ok(h5.group("/")?);
    }
    h5.group(group)
        .map_err(|_| HicdexError::NotFound(format!("group \"/{group}\"")))
}

fn create_group_path(h5: &hdf5::File, path: &str) -> Result<hdf5::Group> {
    let mut group = h5.group("/")?;
    for part in path.split('/').filter(|p| !p.is_empty()) {
        group = if group.link_exists(part) {
            group.group(part)?
        } else {
            group.create_group(part)?
        };
    }
    Ok(group)
}

fn validate_layout(root: &hdf5::Group) -> Result<()> {
    for group in ["chroms", "bins", "pixels", "indexes"] {
        if root.group(group).is_err() {
            return Err(HicdexError::FormatError(format!(
                "missing mandatory group \"{group}\""
            )));
        }
    }
    for dataset in [
        "chroms/name",
        "chroms/length",
        "bins/chrom",
        "bins/start",
        "bins/end",
        "pixels/bin1_id",
        "pixels/bin2_id",
        "pixels/count",
        "indexes/bin1_offset",
        "indexes/chrom_offset",
    ] {
        if root.dataset(dataset).is_err() {
            return Err(HicdexError::FormatError(format!(
                "missing mandatory dataset \"{dataset}\""
            )));
        }
    }
    Ok(())
}

fn read_reference(root: &hdf5::Group, cache_sizes: CacheSizes) -> Result<Reference> {
    let chroms_group = root.group("chroms")?;
    let names = read_string_dataset(&chroms_group, "name")?;
    let lengths =
        Dataset::<u32>::open(&chroms_group, "length", cache_sizes.generic_bytes)?.read_all()?;
    if names.len() != lengths.len() {
        return Err(HicdexError::FormatError(format!(
            "chroms/name has {} entries but chroms/length has {}",
            names.len(),
            lengths.len()
        )));
    }
    Reference::from_chrom_sizes(names.into_iter().zip(lengths))
}

fn read_string_dataset(group: &hdf5::Group, name: &str) -> Result<Vec<String>> {
    let ds = group.dataset(name)?;
    if let Ok(values) = ds.read_raw::<VarLenUnicode>() {
        return Ok(values.into_iter().map(|v| v.as_str().to_string()).collect());
    }
    let values = ds.read_raw::<hdf5::types::VarLenAscii>()?;
    Ok(values.into_iter().map(|v| v.as_str().to_string()).collect())
}

pub(super) fn write_reference(
    root: &hdf5::Group,
    chroms: &Reference,
    cache_sizes: CacheSizes,
) -> Result<()> {
    let group = root.create_group("chroms")?;
    let names: Vec<VarLenUnicode> = chroms
        .iter()
        .map(|c| {
            c.name()
                .parse::<VarLenUnicode>()
                .map_err(|e| HicdexError::StringError(format!("invalid chromosome name: {e}")))
        })
        .collect::<Result<_>>()?;
    let lengths: Vec<u32> = chroms.iter().map(|c| c.size()).collect();

    Dataset::<VarLenUnicode>::create(&group, "name", cache_sizes.generic_bytes)?.append(&names)?;
    Dataset::<u32>::create(&group, "length", cache_sizes.generic_bytes)?.append(&lengths)?;
    Ok(())
}

pub(super) fn write_bin_table(
    root: &hdf5::Group,
    bins: &BinTable,
    cache_sizes: CacheSizes,
) -> Result<()> {
    let group = root.create_group("bins")?;
    let chrom_ds = Dataset::<u32>::create(&group, "chrom", cache_sizes.generic_bytes)?;
    let start_ds = Dataset::<u32>::create(&group, "start", cache_sizes.generic_bytes)?;
    let end_ds = Dataset::<u32>::create(&group, "end", cache_sizes.generic_bytes)?;

    // Write in bounded slabs so huge bin tables never materialize twice
    const SLAB: usize = 1 << 20;
    let mut chrom = Vec::with_capacity(SLAB.min(bins.size() as usize));
    let mut start = Vec::with_capacity(chrom.capacity());
    let mut end = Vec::with_capacity(chrom.capacity());
    for bin in bins.iter() {
        chrom.push(bin.chrom().id());
        start.push(bin.start());
        end.push(bin.end());
        if chrom.len() == SLAB {
            chrom_ds.append(&chrom)?;
            start_ds.append(&start)?;
            end_ds.append(&end)?;
            chrom.clear();
            start.clear();
            end.clear();
        }
    }
    chrom_ds.append(&chrom)?;
    start_ds.append(&start)?;
    end_ds.append(&end)?;
    Ok(())
}

fn open_pixel_datasets(root: &hdf5::Group, cache_sizes: CacheSizes) -> Result<PixelDatasets> {
    let pixels_group = root.group("pixels")?;
    let bin1 = Dataset::<u64>::open(&pixels_group, "bin1_id", cache_sizes.pixel_bytes)?;
    let bin2 = Dataset::<u64>::open(&pixels_group, "bin2_id", cache_sizes.pixel_bytes)?;

    let descriptor = pixels_group
        .dataset("count")?
        .dtype()?
        .to_descriptor()?;
    let count = match descriptor {
        hdf5::types::TypeDescriptor::Float(_) => CountDataset::Float(Dataset::<f64>::open(
            &pixels_group,
            "count",
            cache_sizes.pixel_bytes,
        )?),
        _ => CountDataset::Int(Dataset::<i32>::open(
            &pixels_group,
            "count",
            cache_sizes.pixel_bytes,
        )?),
    };
    Ok(PixelDatasets { bin1, bin2, count })
}
