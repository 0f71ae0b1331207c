// cooler/multires.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use super::attributes;
use super::file::{self, CountKind, File, FileOptions};
use super::{CacheSizes, MCOOL_FORMAT, SCOOL_FORMAT};
use crate::bin_table::BinTable;
use crate::error::{HicdexError, Result};
use crate::pixel::{Count, ThinPixel};
use crate::transformers::{check_bin_tables, CoarsenPixels, PixelMerger};

const APPEND_CHUNK: usize = 1 << 20;

/// A multi-resolution (`.mcool`) container: sibling cooler groups under
/// `/resolutions/<N>`.
#[derive(Debug)]
pub struct MultiResFile {
    path: PathBuf,
    resolutions: Vec<u32>,
}

impl MultiResFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(HicdexError::NotFound(format!("file {}", path.display())));
        }
        let h5 = hdf5::File::open(&path)?;
        check_format(&h5, MCOOL_FORMAT)?;

        let group = h5.group("resolutions").map_err(|_| {
            HicdexError::FormatError("missing mandatory group \"resolutions\"".into())
        })?;
        let mut resolutions = Vec::new();
        for name in group.member_names()? {
            let res: u32 = name.parse().map_err(|_| {
                HicdexError::FormatError(format!(
                    "\"resolutions/{name}\" is not an integer resolution"
                ))
            })?;
            resolutions.push(res);
        }
        resolutions.sort_unstable();
        Ok(Self { path, resolutions })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Available resolutions, ascending.
    pub fn resolutions(&self) -> &[u32] {
        &self.resolutions
    }

    pub fn open_resolution(&self, resolution: u32) -> Result<File> {
        if !self.resolutions.contains(&resolution) {
            return Err(HicdexError::NotFound(format!(
                "resolution {resolution} (available: {:?})",
                self.resolutions
            )));
        }
        File::open(&format!(
            "{}::/resolutions/{resolution}",
            self.path.display()
        ))
    }
}

/// A single-cell (`.scool`) container: one cooler group per cell under
/// `/cells/<label>`, all sharing one bin table.
#[derive(Debug)]
pub struct SingleCellFile {
    h5: hdf5::File,
    path: PathBuf,
    bins: Option<Arc<BinTable>>,
}

impl SingleCellFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(HicdexError::NotFound(format!("file {}", path.display())));
        }
        let h5 = hdf5::File::open(&path)?;
        check_format(&h5, SCOOL_FORMAT)?;

        let ncells = attributes::get_uint(&h5, "ncells")?.ok_or_else(|| {
            HicdexError::FormatError("missing required attribute \"ncells\"".into())
        })?;
        let actual = h5
            .group("cells")
            .map_err(|_| HicdexError::FormatError("missing mandatory group \"cells\"".into()))?
            .member_names()?
            .len() as u64;
        if ncells != actual {
            return Err(HicdexError::FormatError(format!(
                "ncells attribute says {ncells} but the file holds {actual} cell groups"
            )));
        }
        Ok(Self {
            h5,
            path,
            bins: None,
        })
    }

    /// Create an empty single-cell container.
    pub fn create(path: impl AsRef<Path>, bins: BinTable, overwrite: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if path.exists() && !overwrite {
            return Err(HicdexError::AlreadyExists(path.display().to_string()));
        }
        let h5 = hdf5::File::create(&path)?;
        attributes::put_str(&h5, "format", SCOOL_FORMAT)?;
        attributes::put_uint(&h5, "format-version", u64::from(super::FORMAT_VERSION))?;
        attributes::put_uint(&h5, "ncells", 0)?;
        attributes::put_uint(&h5, "bin-size", u64::from(bins.bin_size()))?;
        attributes::put_uint(&h5, "nbins", bins.size())?;
        attributes::put_uint(&h5, "nchroms", bins.reference().len() as u64)?;

        let root = h5.group("/")?;
        file::write_reference(&root, bins.reference(), CacheSizes::default())?;
        file::write_bin_table(&root, &bins, CacheSizes::default())?;
        h5.create_group("cells")?;

        info!("created scool container {}", path.display());
        Ok(Self {
            h5,
            path,
            bins: Some(Arc::new(bins)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ncells(&self) -> Result<u64> {
        Ok(attributes::get_uint(&self.h5, "ncells")?.unwrap_or(0))
    }

    /// Cell labels, sorted.
    pub fn cells(&self) -> Result<Vec<String>> {
        let mut names = self.h5.group("cells")?.member_names()?;
        names.sort();
        Ok(names)
    }

    pub fn open_cell(&self, name: &str) -> Result<File> {
        if !self.h5.group("cells")?.link_exists(name) {
            return Err(HicdexError::NotFound(format!("cell \"{name}\"")));
        }
        File::open(&format!("{}::/cells/{name}", self.path.display()))
    }

    /// Add a cell group. The returned `File` accepts `append_pixels` and
    /// must be finalized (or dropped) before the cell is read back.
    pub fn create_cell<N: Count>(&mut self, name: &str) -> Result<File> {
        let bins = self.bins.as_ref().ok_or_else(|| {
            HicdexError::StringError(
                "cells can only be added to containers created by this process".into(),
            )
        })?;
        if self.h5.group("cells")?.link_exists(name) {
            return Err(HicdexError::AlreadyExists(format!("cell \"{name}\"")));
        }
        let cell = File::create_in_container::<N>(
            self.h5.clone(),
            &self.path,
            &format!("cells/{name}"),
            bins.as_ref().clone(),
            FileOptions::default(),
        )?;
        let ncells = self.cells()?.len() as u64;
        attributes::put_uint(&self.h5, "ncells", ncells)?;
        Ok(cell)
    }
}

fn check_format(h5: &hdf5::File, expected: &str) -> Result<()> {
    match attributes::get_str(h5, "format")? {
        Some(format) if format == expected => Ok(()),
        Some(format) => Err(HicdexError::FormatError(format!(
            "expected format \"{expected}\", found \"{format}\""
        ))),
        None => Err(HicdexError::FormatError(format!(
            "missing \"format\" attribute (expected \"{expected}\")"
        ))),
    }
}

/// Build an `.mcool` by recursively coarsening `src_uri`. Every target
/// resolution must be a multiple of the source resolution; each level is
/// produced from the coarsest already-written level that divides it.
pub fn zoomify(
    src_uri: &str,
    dst_path: impl AsRef<Path>,
    resolutions: &[u32],
    overwrite: bool,
) -> Result<MultiResFile> {
    let base = File::open(src_uri)?;
    match base.count_kind() {
        CountKind::Int => zoomify_impl::<i32>(base, dst_path.as_ref(), resolutions, overwrite),
        CountKind::Float => zoomify_impl::<f64>(base, dst_path.as_ref(), resolutions, overwrite),
    }
}

fn zoomify_impl<N: Count>(
    base: File,
    dst_path: &Path,
    resolutions: &[u32],
    overwrite: bool,
) -> Result<MultiResFile> {
    let base_res = base.bin_size();
    let mut targets: Vec<u32> = resolutions.iter().copied().filter(|&r| r != base_res).collect();
    targets.sort_unstable();
    targets.dedup();
    for &res in &targets {
        if res % base_res != 0 {
            return Err(HicdexError::StringError(format!(
                "resolution {res} is not a multiple of the base resolution {base_res}"
            )));
        }
    }

    if dst_path.exists() && !overwrite {
        return Err(HicdexError::AlreadyExists(dst_path.display().to_string()));
    }
    let h5 = hdf5::File::create(dst_path)?;
    attributes::put_str(&h5, "format", MCOOL_FORMAT)?;
    attributes::put_uint(&h5, "format-version", u64::from(super::FORMAT_VERSION))?;
    h5.create_group("resolutions")?;

    let reference = base.reference().clone();
    let mut levels: Vec<(u32, File)> = Vec::new();

    // base level: copied verbatim
    {
        let mut dst = File::create_in_container::<N>(
            h5.clone(),
            dst_path,
            &format!("resolutions/{base_res}"),
            BinTable::new(reference.clone(), base_res)?,
            FileOptions::default(),
        )?;
        let selector = base.fetch()?;
        append_stream(&mut dst, selector.iter::<N>()?)?;
        dst.finalize()?;
        levels.push((base_res, dst));
    }

    for &res in &targets {
        let (src_res, src_bins, selector) = {
            let (r, f) = levels
                .iter()
                .rev()
                .find(|(r, _)| res % r == 0)
                .expect("the base resolution divides every target");
            (*r, f.bins(), f.fetch()?)
        };
        info!("zoomify: {src_res} -> {res}");

        let coarsener = CoarsenPixels::new(selector.iter::<N>()?, src_bins, res / src_res)?;
        let mut dst = File::create_in_container::<N>(
            h5.clone(),
            dst_path,
            &format!("resolutions/{res}"),
            BinTable::new(reference.clone(), res)?,
            FileOptions::default(),
        )?;
        append_stream(&mut dst, coarsener)?;
        dst.finalize()?;
        levels.push((res, dst));
    }

    drop(levels);
    drop(base);
    h5.flush()?;
    drop(h5);
    MultiResFile::open(dst_path)
}

/// Merge sorted pixel streams from several coolers sharing one bin table
/// into a new cooler at `dst_uri`.
pub fn merge_coolers(inputs: &[&str], dst_uri: &str, overwrite: bool) -> Result<()> {
    if inputs.is_empty() {
        return Err(HicdexError::StringError("nothing to merge".into()));
    }
    let files: Vec<File> = inputs.iter().map(|uri| File::open(uri)).collect::<Result<_>>()?;
    let tables: Vec<_> = files.iter().map(|f| f.bins()).collect();
    check_bin_tables(&tables)?;

    let float = files
        .iter()
        .any(|f| f.count_kind() == CountKind::Float);
    if float {
        merge_coolers_impl::<f64>(&files, dst_uri, overwrite)
    } else {
        merge_coolers_impl::<i32>(&files, dst_uri, overwrite)
    }
}

fn merge_coolers_impl<N: Count>(files: &[File], dst_uri: &str, overwrite: bool) -> Result<()> {
    let selectors: Vec<_> = files
        .iter()
        .map(|f| f.fetch())
        .collect::<Result<Vec<_>>>()?;
    let iters = selectors
        .iter()
        .map(|s| s.iter::<N>())
        .collect::<Result<Vec<_>>>()?;
    let merger = PixelMerger::new(iters)?;

    let mut dst = File::create::<N>(
        dst_uri,
        files[0].bins().as_ref().clone(),
        FileOptions {
            overwrite,
            ..FileOptions::default()
        },
    )?;
    append_stream(&mut dst, merger)?;
    dst.close()
}

pub(super) fn append_stream<N, I>(file: &mut File, pixels: I) -> Result<()>
where
    N: Count,
    I: Iterator<Item = Result<ThinPixel<N>>>,
{
    let mut buf = Vec::with_capacity(APPEND_CHUNK);
    for pixel in pixels {
        buf.push(pixel?);
        if buf.len() == APPEND_CHUNK {
            file.append_pixels(buf.drain(..), false)?;
        }
    }
    file.append_pixels(buf, false)
}
