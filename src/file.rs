// file.rs

use std::path::Path;
use std::sync::Arc;

use crate::balancing::Weights;
use crate::bin_table::BinTable;
use crate::cooler::{self, CoolerUri, MultiResFile};
use crate::error::{HicdexError, Result};
use crate::genomic_interval::GenomicInterval;
use crate::hic;
use crate::pixel::{Count, ThinPixel};
use crate::reference::Reference;

/// A Hi-C matrix file of either flavor, presented uniformly.
#[derive(Debug)]
pub enum File {
    Cooler(cooler::File),
    Hic { file: hic::File, resolution: u32 },
}

impl File {
    /// Open a `.cool` URI or a single-resolution `.hic` file, detecting
    /// the format from the file itself.
    pub fn open(uri: &str) -> Result<Self> {
        let parsed = CoolerUri::parse(uri)?;
        if is_hic_file(&parsed.path) {
            let file = hic::File::open(&parsed.path)?;
            let resolutions = file.resolutions();
            let [resolution] = resolutions[..] else {
                return Err(HicdexError::StringError(format!(
                    "{} holds {} resolutions: open it with open_with_resolution",
                    parsed.path.display(),
                    resolutions.len()
                )));
            };
            return Ok(File::Hic { file, resolution });
        }

        match cooler::File::open(uri) {
            Ok(file) => Ok(File::Cooler(file)),
            Err(e @ HicdexError::FormatError(_)) => {
                if parsed.is_root() && MultiResFile::open(&parsed.path).is_ok() {
                    Err(HicdexError::StringError(format!(
                        "{} is a multi-resolution container: open it with \
                         open_with_resolution",
                        parsed.path.display()
                    )))
                } else {
                    Err(e)
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Open a `.hic` or `.mcool`/`.cool` at a specific resolution.
    pub fn open_with_resolution(path: &str, resolution: u32) -> Result<Self> {
        let parsed = CoolerUri::parse(path)?;
        if is_hic_file(&parsed.path) {
            let file = hic::File::open(&parsed.path)?;
            if !file.has_resolution(resolution) {
                return Err(HicdexError::NotFound(format!(
                    "resolution {resolution} (available: {:?})",
                    file.resolutions()
                )));
            }
            return Ok(File::Hic { file, resolution });
        }

        if parsed.is_root() {
            if let Ok(mcool) = MultiResFile::open(&parsed.path) {
                return Ok(File::Cooler(mcool.open_resolution(resolution)?));
            }
        }
        let file = cooler::File::open(path)?;
        if file.bin_size() != resolution {
            return Err(HicdexError::NotFound(format!(
                "resolution {resolution} (file is binned at {})",
                file.bin_size()
            )));
        }
        Ok(File::Cooler(file))
    }

    pub fn is_cooler(&self) -> bool {
        matches!(self, File::Cooler(_))
    }

    pub fn is_hic(&self) -> bool {
        matches!(self, File::Hic { .. })
    }

    pub fn into_cooler(self) -> Option<cooler::File> {
        match self {
            File::Cooler(file) => Some(file),
            File::Hic { .. } => None,
        }
    }

    pub fn into_hic(self) -> Option<hic::File> {
        match self {
            File::Cooler(_) => None,
            File::Hic { file, .. } => Some(file),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            File::Cooler(file) => file.path(),
            File::Hic { file, .. } => file.path(),
        }
    }

    /// The resolution this handle is bound to.
    pub fn resolution(&self) -> u32 {
        match self {
            File::Cooler(file) => file.bin_size(),
            File::Hic { resolution, .. } => *resolution,
        }
    }

    pub fn bins(&self) -> Result<Arc<BinTable>> {
        match self {
            File::Cooler(file) => Ok(file.bins()),
            File::Hic { file, resolution } => file.bins(*resolution),
        }
    }

    pub fn reference(&self) -> &Reference {
        match self {
            File::Cooler(file) => file.reference(),
            File::Hic { file, .. } => file.reference(),
        }
    }

    pub fn normalizations(&self) -> Result<Vec<String>> {
        match self {
            File::Cooler(file) => file.normalizations(),
            File::Hic { file, .. } => Ok(file.normalizations()),
        }
    }

    pub fn weights(&self, name: &str) -> Result<Arc<Weights>> {
        match self {
            File::Cooler(file) => file.weights(name),
            File::Hic { file, resolution } => file.weights(name, *resolution),
        }
    }

    /// Genome-wide selector.
    pub fn fetch(&self) -> Result<PixelSelector> {
        match self {
            File::Cooler(file) => Ok(PixelSelector::Cooler(file.fetch()?)),
            File::Hic { file, resolution } => {
                Ok(PixelSelector::HicAll(file.fetch(*resolution)?))
            }
        }
    }

    /// Cis selector over one UCSC query.
    pub fn fetch_query(&self, query: &str) -> Result<PixelSelector> {
        match self {
            File::Cooler(file) => Ok(PixelSelector::Cooler(file.fetch_query(query)?)),
            File::Hic { file, resolution } => {
                Ok(PixelSelector::Hic(file.fetch_query(*resolution, query)?))
            }
        }
    }

    /// Arbitrary rectangle from two UCSC queries.
    pub fn fetch2(&self, range1: &str, range2: &str) -> Result<PixelSelector> {
        match self {
            File::Cooler(file) => Ok(PixelSelector::Cooler(file.fetch2(range1, range2)?)),
            File::Hic { file, resolution } => Ok(PixelSelector::Hic(
                file.fetch2(*resolution, range1, range2)?,
            )),
        }
    }

    /// Rectangle with a normalization applied.
    pub fn fetch_normalized(
        &self,
        range1: &str,
        range2: &str,
        normalization: &str,
    ) -> Result<PixelSelector> {
        match self {
            File::Cooler(file) => Ok(PixelSelector::Cooler(
                file.fetch_normalized(range1, range2, normalization)?,
            )),
            File::Hic { file, resolution } => Ok(PixelSelector::Hic(file.fetch_normalized(
                *resolution,
                range1,
                range2,
                normalization,
            )?)),
        }
    }
}

fn is_hic_file(path: &Path) -> bool {
    std::fs::File::open(path)
        .and_then(|mut f| {
            use std::io::Read;
            let mut buf = [0u8; 4];
            f.read_exact(&mut buf)?;
            Ok(&buf == b"HIC\0")
        })
        .unwrap_or(false)
}

/// A query bound to either engine: the cooler selector, a single .hic
/// chromosome-pair selector, or the genome-wide .hic selector.
#[derive(Debug)]
pub enum PixelSelector {
    Cooler(cooler::Selector),
    Hic(hic::Selector),
    HicAll(hic::AllSelector),
}

/// Iterator over a [`PixelSelector`].
#[derive(Debug)]
pub enum PixelIter<'a, N: Count> {
    Cooler(cooler::SelectorIter<'a, N>),
    Hic(hic::SelectorIter<N>),
    HicAll(hic::AllIter<N>),
}

impl PixelSelector {
    /// Iterate the selected pixels. With `sorted` the emission order is
    /// strictly (bin1_id, bin2_id)-ascending; otherwise it is the
    /// file's natural storage order.
    pub fn iter<N: Count>(&self, sorted: bool) -> Result<PixelIter<'_, N>> {
        match self {
            // cooler storage is already sorted
            PixelSelector::Cooler(sel) => Ok(PixelIter::Cooler(sel.iter::<N>()?)),
            PixelSelector::Hic(sel) => Ok(PixelIter::Hic(sel.iter::<N>(sorted)?)),
            PixelSelector::HicAll(sel) => Ok(PixelIter::HicAll(sel.iter::<N>(sorted))),
        }
    }

    pub fn read_all<N: Count>(&self) -> Result<Vec<ThinPixel<N>>> {
        self.iter::<N>(true)?.collect()
    }

    pub fn bins(&self) -> Arc<BinTable> {
        match self {
            PixelSelector::Cooler(sel) => sel.bins(),
            PixelSelector::Hic(sel) => sel.bins(),
            PixelSelector::HicAll(sel) => sel.bins(),
        }
    }

    pub fn coord1(&self) -> Option<&GenomicInterval> {
        match self {
            PixelSelector::Cooler(sel) => sel.coord1(),
            PixelSelector::Hic(sel) => Some(sel.coord1()),
            PixelSelector::HicAll(_) => None,
        }
    }

    pub fn coord2(&self) -> Option<&GenomicInterval> {
        match self {
            PixelSelector::Cooler(sel) => sel.coord2(),
            PixelSelector::Hic(sel) => Some(sel.coord2()),
            PixelSelector::HicAll(_) => None,
        }
    }

    pub fn into_cooler(self) -> Option<cooler::Selector> {
        match self {
            PixelSelector::Cooler(sel) => Some(sel),
            _ => None,
        }
    }

    pub fn into_hic(self) -> Option<hic::Selector> {
        match self {
            PixelSelector::Hic(sel) => Some(sel),
            _ => None,
        }
    }

    pub fn into_hic_all(self) -> Option<hic::AllSelector> {
        match self {
            PixelSelector::HicAll(sel) => Some(sel),
            _ => None,
        }
    }
}

impl<N: Count> Iterator for PixelIter<'_, N> {
    type Item = Result<ThinPixel<N>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            PixelIter::Cooler(it) => it.next(),
            PixelIter::Hic(it) => it.next(),
            PixelIter::HicAll(it) => it.next(),
        }
    }
}
